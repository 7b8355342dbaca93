pub mod analyzer;
pub mod bot;
pub mod classify;
pub mod coach;
pub mod config;
pub mod engine;
pub mod error;
pub mod review;
pub mod tactics;

pub use error::CoachError;
