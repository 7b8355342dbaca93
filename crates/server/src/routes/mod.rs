pub mod bot;
pub mod health;
pub mod live_eval_ws;
pub mod review;
