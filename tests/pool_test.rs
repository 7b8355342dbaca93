//! EnginePool capacity, fairness, self-healing and shutdown.

mod common;

use std::time::Duration;

use coach::engine::{EnginePool, SearchLimits, UciEngine};
use coach::CoachError;
use tokio::time::timeout;

use common::ScriptedFactory;

const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[tokio::test]
async fn test_third_acquire_waits_for_release() {
    let pool = EnginePool::new(ScriptedFactory::new(), 2).await.unwrap();
    let first = pool.acquire().await.unwrap();
    let _second = pool.acquire().await.unwrap();
    assert_eq!(pool.idle(), 0);

    let waiter = tokio::spawn({
        let pool = pool.clone();
        async move { pool.acquire().await.map(|lease| lease.id()) }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished(), "third acquire must wait");

    let released = first.id();
    pool.release(first);
    let id = timeout(Duration::from_secs(1), waiter)
        .await
        .expect("third acquire resolves after a release")
        .unwrap()
        .unwrap();
    assert_eq!(id, released);
}

#[tokio::test]
async fn test_waiters_are_served_in_order() {
    let pool = EnginePool::new(ScriptedFactory::new(), 1).await.unwrap();
    let held = pool.acquire().await.unwrap();

    let first_waiter = tokio::spawn({
        let pool = pool.clone();
        async move { pool.acquire().await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second_waiter = tokio::spawn({
        let pool = pool.clone();
        async move { pool.acquire().await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    drop(held);
    let lease = timeout(Duration::from_secs(1), first_waiter)
        .await
        .expect("first waiter served first")
        .unwrap()
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!second_waiter.is_finished());

    drop(lease);
    let second = timeout(Duration::from_secs(1), second_waiter)
        .await
        .expect("second waiter served next")
        .unwrap();
    assert!(second.is_ok());
}

#[tokio::test]
async fn test_dead_engine_is_replaced() {
    let factory = ScriptedFactory::new();
    let pool = EnginePool::new(factory.clone(), 1).await.unwrap();

    let mut lease = pool.acquire().await.unwrap();
    let dead_id = lease.id();
    factory.kill_next();
    let err = lease
        .analyse_position(START_FEN, &SearchLimits::depth(8, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, CoachError::EngineRuntime(_)));
    drop(lease);

    let mut replacement = timeout(Duration::from_secs(2), pool.acquire())
        .await
        .expect("replacement becomes available")
        .unwrap();
    assert_ne!(replacement.id(), dead_id);
    assert_eq!(factory.spawned(), 2);
    assert!(replacement
        .analyse_position(START_FEN, &SearchLimits::depth(8, 1))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_replacement_retries_until_spawn_succeeds() {
    let factory = ScriptedFactory::new();
    let pool = EnginePool::new(factory.clone(), 1).await.unwrap();

    let mut lease = pool.acquire().await.unwrap();
    factory.kill_next();
    factory.fail_spawns(true);
    let _ = lease
        .analyse_position(START_FEN, &SearchLimits::depth(8, 1))
        .await;
    drop(lease);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(pool.idle(), 0);
    factory.fail_spawns(false);

    let lease = timeout(Duration::from_secs(3), pool.acquire())
        .await
        .expect("backoff retry eventually succeeds");
    assert!(lease.is_ok());
}

#[tokio::test]
async fn test_startup_failure_is_fatal() {
    let factory = ScriptedFactory::new();
    factory.fail_spawns(true);
    let result = EnginePool::new(factory, 2).await;
    assert!(matches!(result, Err(CoachError::EngineInit(_))));
}

#[tokio::test]
async fn test_shutdown_rejects_and_disposes() {
    let factory = ScriptedFactory::new();
    let pool = EnginePool::new(factory.clone(), 2).await.unwrap();
    let leased = pool.acquire().await.unwrap();

    pool.shutdown().await;
    assert!(pool.is_closed());
    assert_eq!(factory.disposed(), 1);
    assert!(matches!(pool.acquire().await, Err(CoachError::PoolClosed)));

    drop(leased);
    for _ in 0..50 {
        if factory.disposed() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(factory.disposed(), 2);
}

#[tokio::test]
async fn test_shutdown_wakes_waiters() {
    let pool = EnginePool::new(ScriptedFactory::new(), 1).await.unwrap();
    let _held = pool.acquire().await.unwrap();
    let waiter = tokio::spawn({
        let pool = pool.clone();
        async move { pool.acquire().await.map(|lease| lease.id()) }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    pool.shutdown().await;
    let result = timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
    assert!(matches!(result, Err(CoachError::PoolClosed)));
}
