//! Game review end to end with a scripted engine.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use coach::classify::MoveTag;
use coach::engine::{EnginePool, Score};
use coach::review::{
    BatchReviewer, GameReviewer, ReviewMode, ReviewRequest, ReviewResponse, ReviewSettings,
};
use coach::tactics::PatternId;
use coach::CoachError;

use common::{fen_after, ScriptedFactory};

const QUEEN_BLUNDER: &str = "1. e4 d5 2. Qg4 Bxg4";

/// White plays Qg4 into Bxg4 and loses the queen for nothing.
fn queen_blunder_engine() -> ScriptedFactory {
    let factory = ScriptedFactory::new();
    factory.script(
        &fen_after(&["e4", "d5"]),
        &[
            ("e4d5 d8d5", Score::Cp(40)),
            ("b1c3", Score::Cp(25)),
            ("d1g4", Score::Cp(-850)),
        ],
    );
    factory.script(&fen_after(&["e4", "d5", "Qg4"]), &[("c8g4", Score::Cp(880))]);
    factory.script(
        &fen_after(&["e4", "d5", "Qg4", "Bxg4"]),
        &[("e4d5", Score::Cp(-880))],
    );
    factory
}

async fn reviewer(factory: ScriptedFactory) -> GameReviewer<ScriptedFactory> {
    let pool = EnginePool::new(factory, 1).await.unwrap();
    GameReviewer::new(pool, ReviewSettings::default())
}

#[tokio::test]
async fn test_queen_blunder_is_tagged_with_material_drop() {
    let reviewer = reviewer(queen_blunder_engine()).await;
    let response = reviewer
        .review(&ReviewRequest::new(QUEEN_BLUNDER))
        .await
        .unwrap();

    assert_eq!(response.moves.len(), 4);
    let blunder = &response.moves[2];
    assert_eq!(blunder.ply, 3);
    assert_eq!(blunder.san, "Qg4");
    assert_eq!(blunder.color, "white");
    assert_eq!(blunder.tag, MoveTag::Blunder);
    assert_eq!(blunder.eval_before, 40);
    assert_eq!(blunder.eval_after, -880);
    assert_eq!(blunder.best_move, "exd5");
    assert_eq!(blunder.pv, vec!["exd5", "Qxd5"]);

    let drop = blunder
        .patterns
        .iter()
        .find(|p| p.id == PatternId::MaterialDrop)
        .expect("material-drop detected");
    let lost = drop.data["lost"].as_f64().unwrap();
    assert!((lost - 9.0).abs() < 0.01, "lost was {lost}");
    assert!(blunder.coach_message.ends_with("Best was exd5."));

    let recapture = &response.moves[3];
    assert_eq!(recapture.san, "Bxg4");
    assert_ne!(recapture.tag, MoveTag::Blunder);

    assert_eq!(response.summary.tags.get("blunder"), Some(&1));
    assert!(response.summary.patterns.get("material-drop").is_some());
    assert!(response.summary.white_accuracy < response.summary.black_accuracy);
    assert!(response.accuracy < 100.0);
    assert_eq!(response.engine, "Scripted");
}

#[tokio::test]
async fn test_empty_game_scores_100() {
    let factory = ScriptedFactory::new();
    let reviewer = reviewer(factory.clone()).await;
    let response = reviewer
        .review(&ReviewRequest::new("[Event \"Casual\"]\n\n*"))
        .await
        .unwrap();
    assert!(response.moves.is_empty());
    assert_eq!(response.accuracy, 100.0);
    assert!(factory.analysed().is_empty());
}

#[tokio::test]
async fn test_headers_are_echoed_with_the_review() {
    let reviewer = reviewer(queen_blunder_engine()).await;
    let pgn = format!(
        "[Event \"Club night\"]\n[White \"Ana\"]\n[Black \"Ben\"]\n[WhiteElo \"1320\"]\n[Result \"0-1\"]\n\n{QUEEN_BLUNDER} 0-1"
    );
    let response = reviewer.review(&ReviewRequest::new(pgn)).await.unwrap();
    assert_eq!(response.moves.len(), 4);
    assert_eq!(response.game.white, "Ana");
    assert_eq!(response.game.event.as_deref(), Some("Club night"));
    assert_eq!(response.game.white_elo, Some(1320));
    assert_eq!(response.game.black_elo, None);

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["game"]["whiteElo"], 1320);
    assert_eq!(json["game"]["result"], "0-1");
}

#[tokio::test]
async fn test_invalid_game_fails_before_engine() {
    let factory = ScriptedFactory::new();
    let reviewer = reviewer(factory.clone()).await;

    let illegal = reviewer.review(&ReviewRequest::new("1. e4 e5 2. Ke3")).await;
    assert!(matches!(illegal, Err(CoachError::InvalidInput(_))));

    let garbage = reviewer.review(&ReviewRequest::new("1. e4 hello")).await;
    assert!(matches!(garbage, Err(CoachError::InvalidInput(_))));

    assert!(factory.analysed().is_empty());
}

#[tokio::test]
async fn test_engine_failure_fails_whole_review() {
    let factory = queen_blunder_engine();
    let reviewer = reviewer(factory.clone()).await;
    factory.kill_next();
    let result = reviewer.review(&ReviewRequest::new(QUEEN_BLUNDER)).await;
    assert!(matches!(result, Err(CoachError::EngineRuntime(_))));
}

#[tokio::test]
async fn test_forced_move_is_marked() {
    // After Rh1+ the knight covers g7, so Kg8 is the only reply.
    let pgn = "[SetUp \"1\"]\n[FEN \"7k/8/4N3/8/8/8/8/KR6 w - - 0 1\"]\n\n1. Rh1+ Kg8 *";
    let reviewer = reviewer(ScriptedFactory::new()).await;
    let response = reviewer.review(&ReviewRequest::new(pgn)).await.unwrap();
    assert_eq!(response.moves.len(), 2);
    assert!(!response.moves[0].forced);
    assert!(response.moves[1].forced);
}

struct CountingDelegate {
    calls: AtomicUsize,
}

#[async_trait]
impl BatchReviewer for CountingDelegate {
    async fn review(&self, request: &ReviewRequest) -> Result<ReviewResponse, CoachError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(request.review_mode, Some(ReviewMode::Local));
        Err(CoachError::Delegate("pipeline offline".into()))
    }
}

#[tokio::test]
async fn test_long_games_are_delegated_in_auto_mode() {
    let delegate = Arc::new(CountingDelegate {
        calls: AtomicUsize::new(0),
    });
    let factory = ScriptedFactory::new();
    let pool = EnginePool::new(factory.clone(), 1).await.unwrap();
    let settings = ReviewSettings {
        local_ply_threshold: 2,
        ..ReviewSettings::default()
    };
    let reviewer = GameReviewer::new(pool, settings).with_delegate(delegate.clone());

    let result = reviewer.review(&ReviewRequest::new(QUEEN_BLUNDER)).await;
    assert!(matches!(result, Err(CoachError::Delegate(_))));
    assert_eq!(delegate.calls.load(Ordering::SeqCst), 1);
    assert!(factory.analysed().is_empty());

    let short = reviewer.review(&ReviewRequest::new("1. e4 e5")).await;
    assert!(short.is_ok());
    assert_eq!(delegate.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_server_mode_without_delegate_is_rejected() {
    let reviewer = reviewer(ScriptedFactory::new()).await;
    let request = ReviewRequest {
        review_mode: Some(ReviewMode::Server),
        ..ReviewRequest::new("1. e4 e5")
    };
    let result = reviewer.review(&request).await;
    assert!(matches!(result, Err(CoachError::InvalidInput(_))));
}

#[tokio::test]
async fn test_review_route() {
    let server = common::spawn_server(queen_blunder_engine(), 1).await;
    let client = common::client();

    let resp = client
        .post(server.url("/api/review"))
        .json(&json!({ "pgn": QUEEN_BLUNDER, "depth": 12, "multiPv": 3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["depth"], 12);
    assert_eq!(body["moves"][2]["tag"], "blunder");
    assert_eq!(body["moves"][2]["fenBefore"], fen_after(&["e4", "d5"]));
    let ids: Vec<&str> = body["moves"][2]["patterns"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|p| p["id"].as_str())
        .collect();
    assert!(ids.contains(&"material-drop"));

    let resp = client
        .post(server.url("/api/review"))
        .json(&json!({ "pgn": "1. e4 e4" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["detail"].as_str().unwrap().contains("ply 2"));
}
