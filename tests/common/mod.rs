//! Shared helpers for integration tests: a scripted in-process engine and an
//! in-process server bound to an ephemeral port.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;

use chess_core::board::normalize_fen;
use chess_core::GameBoard;
use coach::config::CoachConfig;
use coach::engine::process::EngineCommand;
use coach::engine::{
    AnalysisOutput, EngineFactory, EngineOptions, EnginePool, EvaluationLine, Score, SearchLimits,
    UciEngine,
};
use coach::CoachError;
use server::config::Config;
use server::profiles::BotProfiles;
use server::state::AppState;

#[derive(Default)]
struct Shared {
    scripts: Mutex<HashMap<String, Vec<EvaluationLine>>>,
    analysed: Mutex<Vec<String>>,
    configured: Mutex<Vec<EngineOptions>>,
    delay: Mutex<Duration>,
    spawned: AtomicUsize,
    disposed: AtomicUsize,
    kill_next: AtomicBool,
    fail_spawns: AtomicBool,
}

/// Engine factory whose engines answer from a table keyed by normalized FEN.
/// Unscripted positions answer with their first legal move at 0 cp.
#[derive(Clone, Default)]
pub struct ScriptedFactory {
    shared: Arc<Shared>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines as `(pv, score)`, best first. The pv is space-separated UCI;
    /// scores are from the side to move, as an engine reports them.
    pub fn script(&self, fen: &str, lines: &[(&str, Score)]) {
        let lines = lines
            .iter()
            .enumerate()
            .map(|(i, (pv, score))| {
                let pv: Vec<String> = pv.split_whitespace().map(String::from).collect();
                EvaluationLine {
                    rank: i as u32 + 1,
                    mv: pv.first().cloned().unwrap_or_default(),
                    pv,
                    score: *score,
                }
            })
            .collect();
        self.shared.scripts.lock().insert(normalize_fen(fen), lines);
    }

    /// Delay before every analysis answers.
    pub fn set_delay(&self, delay: Duration) {
        *self.shared.delay.lock() = delay;
    }

    /// The next analysis fails and its engine reports itself dead.
    pub fn kill_next(&self) {
        self.shared.kill_next.store(true, Ordering::SeqCst);
    }

    pub fn fail_spawns(&self, fail: bool) {
        self.shared.fail_spawns.store(fail, Ordering::SeqCst);
    }

    pub fn spawned(&self) -> usize {
        self.shared.spawned.load(Ordering::SeqCst)
    }

    pub fn disposed(&self) -> usize {
        self.shared.disposed.load(Ordering::SeqCst)
    }

    /// FENs analysed so far, in order.
    pub fn analysed(&self) -> Vec<String> {
        self.shared.analysed.lock().clone()
    }

    pub fn configured(&self) -> Vec<EngineOptions> {
        self.shared.configured.lock().clone()
    }
}

pub struct ScriptedEngine {
    id: usize,
    alive: bool,
    shared: Arc<Shared>,
}

#[async_trait]
impl UciEngine for ScriptedEngine {
    fn id(&self) -> usize {
        self.id
    }

    fn name(&self) -> &str {
        "Scripted"
    }

    fn is_alive(&mut self) -> bool {
        self.alive
    }

    async fn configure(&mut self, options: &EngineOptions) -> Result<(), CoachError> {
        self.shared.configured.lock().push(options.clone());
        Ok(())
    }

    async fn analyse_position(
        &mut self,
        fen: &str,
        limits: &SearchLimits,
    ) -> Result<AnalysisOutput, CoachError> {
        let delay = *self.shared.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.shared.analysed.lock().push(fen.to_string());

        if self.shared.kill_next.swap(false, Ordering::SeqCst) {
            self.alive = false;
            return Err(CoachError::EngineRuntime(format!("engine {} exited", self.id)));
        }

        let board = GameBoard::from_fen(fen)?;
        let scripted = self.shared.scripts.lock().get(&normalize_fen(fen)).cloned();
        let mut lines = match scripted {
            Some(lines) => lines,
            None => board
                .legal_moves()
                .first()
                .map(|mv| {
                    vec![EvaluationLine {
                        rank: 1,
                        mv: board.uci(mv),
                        pv: vec![board.uci(mv)],
                        score: Score::Cp(0),
                    }]
                })
                .unwrap_or_default(),
        };
        lines.truncate(limits.multipv.max(1) as usize);

        let (best_move, score) = lines
            .first()
            .map(|l| (l.mv.clone(), l.score))
            .unwrap_or_else(|| ("(none)".to_string(), Score::Cp(0)));
        Ok(AnalysisOutput {
            lines,
            best_move,
            score,
            depth: limits.depth.unwrap_or(1),
            elapsed_ms: delay.as_millis() as u64,
        })
    }

    async fn dispose(&mut self) {
        self.alive = false;
        self.shared.disposed.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl EngineFactory for ScriptedFactory {
    type Engine = ScriptedEngine;

    async fn spawn(&self, id: usize) -> Result<ScriptedEngine, CoachError> {
        if self.shared.fail_spawns.load(Ordering::SeqCst) {
            return Err(CoachError::EngineInit(format!("engine {id} refused to start")));
        }
        self.shared.spawned.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedEngine {
            id,
            alive: true,
            shared: Arc::clone(&self.shared),
        })
    }
}

/// Board after playing SAN/UCI tokens from the start position.
pub fn board_after(tokens: &[&str]) -> GameBoard {
    let mut board = GameBoard::new();
    for token in tokens {
        board.play_token(token).expect("test move is legal");
    }
    board
}

pub fn fen_after(tokens: &[&str]) -> String {
    board_after(tokens).fen()
}

/// Server config that never touches the environment.
pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".into(),
        port: 0,
        bot_profiles_path: String::new(),
        review_batch_url: None,
        live_eval_depth: 12,
        live_eval_movetime_ms: 500,
        coach: CoachConfig {
            engine: EngineCommand::new("scripted"),
            pool_size: 1,
            engine_options: EngineOptions::default(),
            review_depth: 10,
            review_multipv: 3,
            review_local_ply_threshold: 80,
        },
    }
}

pub fn data_profiles() -> BotProfiles {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/data/bot_profiles.json");
    BotProfiles::from_profiles(
        server::profiles::load_profiles(path).expect("bundled bot profiles parse"),
    )
}

pub struct TestServer {
    pub base_url: String,
    pub state: Arc<AppState<ScriptedFactory>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Serve the full router on an ephemeral port.
pub async fn spawn_server(factory: ScriptedFactory, pool_size: usize) -> TestServer {
    let pool = EnginePool::new(factory, pool_size)
        .await
        .expect("scripted pool starts");
    let state = Arc::new(AppState::new(test_config(), pool, data_profiles(), None));
    let app = server::app(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server");
    });

    TestServer {
        base_url: format!("http://{addr}"),
        state,
    }
}

/// Build a reqwest client for tests.
pub fn client() -> Client {
    Client::new()
}
