//! Live evaluation session.
//!
//! One session per connection: `awaiting-worker -> idle <-> evaluating ->
//! closed`, with `error` on engine failure. At most one evaluation runs at a
//! time and at most one request waits behind it; a newer request replaces the
//! waiting one. The session is transport-agnostic: it consumes a stream of
//! [`InboundEvent`]s and pushes [`ServerMessage`]s into a channel.

use std::time::{Duration, Instant};

use chess_core::board::fen_turn;
use chess_core::shakmaty::Color;
use chess_core::GameBoard;
use coach::engine::{
    AnalysisOutput, EngineFactory, EngineLease, EngineOptions, EnginePool, SearchLimits, UciEngine,
};
use coach::CoachError;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Client → Server messages
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Fen {
        fen: String,
        #[serde(default)]
        ply: u32,
    },
}

/// Server → Client messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Ready {
        depth: u32,
        threads: u32,
    },
    #[serde(rename_all = "camelCase")]
    Eval {
        ply: u32,
        best_move: String,
        /// Centipawns from White's side
        evaluation: i32,
        depth: u32,
        engine_time_ms: u64,
        fen: String,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingWorker,
    Idle,
    Evaluating,
    Closed,
    Error,
}

#[derive(Debug, Clone)]
pub struct LiveEvalRequest {
    pub fen: String,
    pub ply: u32,
    pub enqueued_at: Instant,
}

/// What the transport delivered.
#[derive(Debug)]
pub enum InboundEvent {
    Request(LiveEvalRequest),
    /// Undecodable frame or bad FEN; reported, session continues
    Invalid(String),
    /// Frames with no meaning here (ping, binary)
    Ignored,
    Closed,
}

impl InboundEvent {
    /// Decode a client text frame. FENs are validated here so a malformed
    /// position never reaches the engine.
    pub fn from_text(text: &str) -> InboundEvent {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(ClientMessage::Fen { fen, ply }) => match GameBoard::from_fen(&fen) {
                Ok(_) => InboundEvent::Request(LiveEvalRequest {
                    fen,
                    ply,
                    enqueued_at: Instant::now(),
                }),
                Err(e) => InboundEvent::Invalid(e.to_string()),
            },
            Err(e) => InboundEvent::Invalid(format!("Invalid message: {e}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    ClientClosed,
    EngineFailed(String),
    PoolClosed,
}

#[derive(Debug, Clone)]
pub struct LiveEvalSettings {
    pub depth: u32,
    /// Wall-clock budget before the engine is told to `stop`
    pub movetime_ms: u64,
    pub options: EngineOptions,
}

impl LiveEvalSettings {
    fn limits(&self) -> SearchLimits {
        SearchLimits {
            depth: Some(self.depth),
            multipv: 1,
            deadline: Some(Duration::from_millis(self.movetime_ms)),
            ..SearchLimits::default()
        }
    }
}

struct Completed<F: EngineFactory> {
    lease: EngineLease<F>,
    request: LiveEvalRequest,
    result: Result<AnalysisOutput, CoachError>,
}

pub struct LiveEvalSession<F: EngineFactory> {
    pool: EnginePool<F>,
    settings: LiveEvalSettings,
}

impl<F: EngineFactory> LiveEvalSession<F> {
    pub fn new(pool: EnginePool<F>, settings: LiveEvalSettings) -> Self {
        Self { pool, settings }
    }

    /// Drive the session until the client leaves or the engine fails. The
    /// worker is released on return; any waiting request is dropped.
    pub async fn run<S>(self, mut inbound: S, outbound: mpsc::UnboundedSender<ServerMessage>) -> SessionEnd
    where
        S: Stream<Item = InboundEvent> + Unpin,
    {
        let LiveEvalSession { pool, settings } = self;
        // Pinned once so the place in the pool's FIFO queue survives every
        // trip round the loop.
        let acquire = pool.acquire();
        tokio::pin!(acquire);

        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Completed<F>>();
        let mut state = SessionState::AwaitingWorker;
        let mut worker: Option<EngineLease<F>> = None;
        let mut pending: Option<LiveEvalRequest> = None;

        let end = loop {
            if state == SessionState::Idle && pending.is_some() {
                if let (Some(request), Some(lease)) = (pending.take(), worker.take()) {
                    start_evaluation(lease, request, &settings, done_tx.clone());
                    state = SessionState::Evaluating;
                }
            }

            tokio::select! {
                biased;

                event = inbound.next() => match event {
                    Some(InboundEvent::Request(request)) => {
                        if let Some(stale) = pending.replace(request) {
                            debug!(ply = stale.ply, "Superseded pending live eval request");
                        }
                    }
                    Some(InboundEvent::Invalid(message)) => {
                        let _ = outbound.send(ServerMessage::Error { message });
                    }
                    Some(InboundEvent::Ignored) => {}
                    Some(InboundEvent::Closed) | None => {
                        state = SessionState::Closed;
                        break SessionEnd::ClientClosed;
                    }
                },

                Some(done) = done_rx.recv(), if state == SessionState::Evaluating => {
                    match done.result {
                        Ok(output) => {
                            let message = eval_message(&done.request, &output);
                            worker = Some(done.lease);
                            state = SessionState::Idle;
                            let _ = outbound.send(message);
                        }
                        Err(e) => {
                            warn!(error = %e, ply = done.request.ply, "Live eval engine failure");
                            state = SessionState::Error;
                            let _ = outbound.send(ServerMessage::Error {
                                message: format!("Engine failure: {e}"),
                            });
                            break SessionEnd::EngineFailed(e.to_string());
                        }
                    }
                },

                acquired = &mut acquire, if state == SessionState::AwaitingWorker => match acquired {
                    Ok(lease) => {
                        debug!(engine_id = lease.id(), "Live eval worker acquired");
                        let _ = outbound.send(ServerMessage::Ready {
                            depth: settings.depth,
                            threads: settings.options.threads,
                        });
                        worker = Some(lease);
                        state = SessionState::Idle;
                    }
                    Err(e) => {
                        state = SessionState::Error;
                        let _ = outbound.send(ServerMessage::Error { message: e.to_string() });
                        break SessionEnd::PoolClosed;
                    }
                },
            }
        };

        drop(worker);
        info!(state = ?state, end = ?end, "Live eval session finished");
        end
    }
}

/// Run one evaluation off the session loop. If the session has gone by the
/// time it finishes, the send fails and dropping the lease releases it.
fn start_evaluation<F: EngineFactory>(
    mut lease: EngineLease<F>,
    request: LiveEvalRequest,
    settings: &LiveEvalSettings,
    done: mpsc::UnboundedSender<Completed<F>>,
) {
    debug!(
        ply = request.ply,
        queued_ms = request.enqueued_at.elapsed().as_millis() as u64,
        "Starting live eval"
    );
    let options = settings.options.clone();
    let limits = settings.limits();
    tokio::spawn(async move {
        let result = match lease.configure(&options).await {
            Ok(()) => lease.analyse_position(&request.fen, &limits).await,
            Err(e) => Err(e),
        };
        let _ = done.send(Completed {
            lease,
            request,
            result,
        });
    });
}

fn eval_message(request: &LiveEvalRequest, output: &AnalysisOutput) -> ServerMessage {
    ServerMessage::Eval {
        ply: request.ply,
        best_move: output.best_move.clone(),
        evaluation: output
            .score
            .for_mover(fen_turn(&request.fen), Color::White)
            .to_cp(),
        depth: output.depth,
        engine_time_ms: output.elapsed_ms,
        fen: request.fen.clone(),
    }
}
