//! EngineProcess against a scripted UCI shell responder.
#![cfg(unix)]

use std::time::Duration;

use coach::engine::process::EngineCommand;
use coach::engine::{
    EngineFactory, EngineOptions, EnginePool, Score, SearchLimits, UciEngine, UciProcessFactory,
};
use coach::CoachError;

const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

fn factory(mode: &str) -> UciProcessFactory {
    let script = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/fake_uci.sh");
    let command = EngineCommand {
        path: "sh".into(),
        args: vec![script.into(), mode.into()],
    };
    UciProcessFactory::new(command, EngineOptions::default())
}

#[tokio::test]
async fn test_handshake_and_multipv_analysis() {
    let mut engine = factory("normal").spawn(0).await.expect("handshake");
    assert_eq!(engine.name(), "FakeFish 1.0");
    assert!(engine.is_alive());

    let output = engine
        .analyse_position(START_FEN, &SearchLimits::depth(2, 2))
        .await
        .expect("analysis");
    assert_eq!(output.best_move, "e2e4");
    assert_eq!(output.depth, 2);
    assert_eq!(output.score, Score::Cp(17));
    assert_eq!(output.lines.len(), 2);
    assert_eq!(output.lines[0].rank, 1);
    assert_eq!(output.lines[0].pv, vec!["e2e4", "e7e5", "g1f3"]);
    assert_eq!(output.lines[1].mv, "d2d4");
    assert_eq!(output.lines[1].score, Score::Cp(9));

    engine.dispose().await;
    assert!(!engine.is_alive());
}

#[tokio::test]
async fn test_deadline_sends_stop() {
    let mut engine = factory("slow").spawn(0).await.expect("handshake");
    let limits = SearchLimits {
        depth: Some(30),
        multipv: 1,
        deadline: Some(Duration::from_millis(100)),
        ..SearchLimits::default()
    };

    let output = tokio::time::timeout(
        Duration::from_secs(5),
        engine.analyse_position(START_FEN, &limits),
    )
    .await
    .expect("engine answers after stop")
    .expect("analysis");
    assert_eq!(output.best_move, "d2d4");
    assert_eq!(output.score, Score::Cp(21));
    assert_eq!(output.depth, 5);
    engine.dispose().await;
}

#[tokio::test]
async fn test_exit_mid_analysis_is_runtime_error() {
    let mut engine = factory("crash").spawn(0).await.expect("handshake");
    let err = engine
        .analyse_position(START_FEN, &SearchLimits::depth(5, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, CoachError::EngineRuntime(_)));
    assert!(!engine.is_alive());
}

#[tokio::test]
async fn test_missing_binary_fails_pool_startup() {
    let command = EngineCommand::new("/nonexistent/engine-binary");
    let result = EnginePool::new(UciProcessFactory::new(command, EngineOptions::default()), 2).await;
    assert!(matches!(result, Err(CoachError::EngineInit(_))));
}

#[tokio::test]
async fn test_reconfigure_between_consumers() {
    let mut engine = factory("normal").spawn(0).await.expect("handshake");
    let weak = EngineOptions {
        skill_level: Some(3),
        elo: Some(1350),
        contempt: Some(10),
        ..EngineOptions::default()
    };
    engine.configure(&weak).await.expect("weak options");
    engine
        .configure(&EngineOptions::default())
        .await
        .expect("full strength again");
    let output = engine
        .analyse_position(START_FEN, &SearchLimits::depth(2, 1))
        .await
        .expect("analysis after reconfigure");
    assert_eq!(output.best_move, "e2e4");
    engine.dispose().await;
}

#[tokio::test]
async fn test_exit_during_handshake_is_init_error() {
    let result = factory("hangup").spawn(0).await;
    assert!(matches!(result, Err(CoachError::EngineInit(_))));
}

#[tokio::test]
async fn test_abandoned_search_does_not_leak_into_next_caller() {
    let pool = EnginePool::new(factory("delayed"), 1).await.expect("pool");

    {
        let mut lease = pool.acquire().await.expect("first lease");
        let gave_up = tokio::time::timeout(
            Duration::from_millis(100),
            lease.analyse_position(START_FEN, &SearchLimits::depth(10, 1)),
        )
        .await;
        assert!(gave_up.is_err(), "search should still be running");
    }

    let mut lease = pool.acquire().await.expect("engine back in the pool");
    assert!(lease.is_alive());
    let output = tokio::time::timeout(
        Duration::from_secs(5),
        lease.analyse_position("4k3/8/8/8/8/8/7P/4K3 w - - 0 1", &SearchLimits::depth(10, 1)),
    )
    .await
    .expect("second search finishes")
    .expect("analysis");
    assert_eq!(output.best_move, "h2h3");
    assert_eq!(output.lines[0].pv, vec!["h2h3"]);
}
