//! UCI engine subprocess (async I/O)
//!
//! stdout is drained by a pump task into an unbounded channel, so the engine
//! never blocks on a full pipe while nobody is reading and every awaited line
//! arrives in order.

use std::collections::{BTreeMap, HashMap};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::uci::{self, UciEvent};
use super::{
    AnalysisOutput, EngineFactory, EngineOptions, EvaluationLine, Score, SearchLimits, UciEngine,
};
use crate::error::CoachError;

/// How to launch the engine binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    pub path: String,
    pub args: Vec<String>,
}

impl EngineCommand {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
        }
    }
}

/// One running engine.
pub struct EngineProcess {
    id: usize,
    name: String,
    process: Child,
    stdin: Option<ChildStdin>,
    lines: mpsc::UnboundedReceiver<String>,
    pump: JoinHandle<()>,
    /// Option values the engine has accepted, by option name
    applied: HashMap<&'static str, String>,
    alive: bool,
    /// `go` sent, `bestmove` not yet read
    in_search: bool,
}

impl EngineProcess {
    /// Start the subprocess and its stdout pump. No UCI traffic yet.
    pub fn spawn(id: usize, command: &EngineCommand) -> Result<Self, CoachError> {
        let mut process = Command::new(&command.path)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                CoachError::EngineInit(format!("Failed to spawn {}: {e}", command.path))
            })?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| CoachError::EngineInit("engine stdin unavailable".into()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| CoachError::EngineInit("engine stdout unavailable".into()))?;

        let (tx, lines) = mpsc::unbounded_channel();
        let pump = tokio::spawn(async move {
            let mut reader = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            id,
            name: format!("engine-{id}"),
            process,
            stdin: Some(stdin),
            lines,
            pump,
            applied: HashMap::new(),
            alive: true,
            in_search: false,
        })
    }

    /// `uci` / `uciok`, initial options, `isready` / `readyok`.
    pub async fn initialize(&mut self, options: &EngineOptions) -> Result<(), CoachError> {
        self.handshake(options)
            .await
            .map_err(|e| match e {
                CoachError::EngineRuntime(msg) => CoachError::EngineInit(msg),
                other => other,
            })?;
        info!(engine_id = self.id, name = %self.name, "Engine ready");
        Ok(())
    }

    async fn handshake(&mut self, options: &EngineOptions) -> Result<(), CoachError> {
        self.send("uci").await?;
        loop {
            match self.next_event().await? {
                UciEvent::UciOk => break,
                UciEvent::IdName(name) => self.name = name,
                _ => {}
            }
        }
        self.apply_options(options).await?;
        self.sync().await
    }

    async fn send(&mut self, cmd: &str) -> Result<(), CoachError> {
        debug!(engine_id = self.id, cmd, "UCI <");
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(CoachError::EngineRuntime("engine stdin already closed".into()));
        };
        let written = async {
            stdin.write_all(format!("{cmd}\n").as_bytes()).await?;
            stdin.flush().await
        }
        .await;
        written.map_err(|e| {
            self.alive = false;
            CoachError::EngineRuntime(format!("Failed to write to engine: {e}"))
        })
    }

    async fn next_event(&mut self) -> Result<UciEvent, CoachError> {
        match self.lines.recv().await {
            Some(line) => {
                debug!(engine_id = self.id, line = line.trim(), "UCI >");
                Ok(uci::parse_line(&line))
            }
            None => {
                self.alive = false;
                Err(CoachError::EngineRuntime("engine closed its output".into()))
            }
        }
    }

    async fn sync(&mut self) -> Result<(), CoachError> {
        self.send("isready").await?;
        loop {
            if let UciEvent::ReadyOk = self.next_event().await? {
                return Ok(());
            }
        }
    }

    /// Send changed options. Returns whether anything was sent.
    async fn apply_options(&mut self, options: &EngineOptions) -> Result<bool, CoachError> {
        let mut desired = options.uci_options();
        // Contempt has no neutral "unset"; put it back to 0 once a consumer changed it.
        if options.contempt.is_none()
            && self.applied.get("Contempt").is_some_and(|v| v != "0")
        {
            desired.push(("Contempt", "0".to_string()));
        }

        let mut changed = false;
        for (name, value) in desired {
            if self.applied.get(name) == Some(&value) {
                continue;
            }
            self.send(&format!("setoption name {name} value {value}"))
                .await?;
            self.applied.insert(name, value);
            changed = true;
        }
        Ok(changed)
    }

    async fn set_multipv(&mut self, multipv: u32) -> Result<(), CoachError> {
        let value = multipv.max(1).to_string();
        if self.applied.get("MultiPV") != Some(&value) {
            self.send(&format!("setoption name MultiPV value {value}"))
                .await?;
            self.applied.insert("MultiPV", value);
        }
        Ok(())
    }

    /// A caller that gave up mid-search leaves its `go` running. Stop it and
    /// drop its output so the next search reads only its own lines.
    async fn settle(&mut self) -> Result<(), CoachError> {
        if !self.in_search {
            return Ok(());
        }
        info!(engine_id = self.id, "Stopping abandoned search");
        self.send("stop").await?;
        loop {
            if let UciEvent::BestMove { .. } = self.next_event().await? {
                break;
            }
        }
        self.in_search = false;
        self.sync().await
    }

    fn ensure_alive(&mut self) -> Result<(), CoachError> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(CoachError::EngineRuntime(format!(
                "engine {} is not running",
                self.id
            )))
        }
    }
}

enum Next {
    Line(Option<String>),
    Deadline,
}

#[async_trait]
impl UciEngine for EngineProcess {
    fn id(&self) -> usize {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_alive(&mut self) -> bool {
        if !self.alive {
            return false;
        }
        match self.process.try_wait() {
            Ok(None) => true,
            _ => {
                self.alive = false;
                false
            }
        }
    }

    async fn configure(&mut self, options: &EngineOptions) -> Result<(), CoachError> {
        self.ensure_alive()?;
        self.settle().await?;
        if self.apply_options(options).await? {
            self.sync().await?;
        }
        Ok(())
    }

    async fn analyse_position(
        &mut self,
        fen: &str,
        limits: &SearchLimits,
    ) -> Result<AnalysisOutput, CoachError> {
        self.ensure_alive()?;
        self.settle().await?;
        self.set_multipv(limits.multipv).await?;
        self.send("ucinewgame").await?;
        self.send(&format!("position fen {fen}")).await?;
        self.in_search = true;
        self.send(&limits.go_command()).await?;

        let started = Instant::now();
        let deadline = limits
            .deadline
            .map(|d| tokio::time::Instant::now() + d);
        let mut stop_sent = false;
        let mut table: BTreeMap<u32, EvaluationLine> = BTreeMap::new();
        let mut depth = 0;

        let best_move = loop {
            let next = match deadline {
                Some(at) if !stop_sent => tokio::select! {
                    line = self.lines.recv() => Next::Line(line),
                    _ = tokio::time::sleep_until(at) => Next::Deadline,
                },
                _ => Next::Line(self.lines.recv().await),
            };

            let line = match next {
                Next::Deadline => {
                    self.send("stop").await?;
                    stop_sent = true;
                    continue;
                }
                Next::Line(Some(line)) => line,
                Next::Line(None) => {
                    self.alive = false;
                    warn!(engine_id = self.id, fen, "Engine exited during analysis");
                    return Err(CoachError::EngineRuntime(
                        "engine exited during analysis".into(),
                    ));
                }
            };
            debug!(engine_id = self.id, line = line.trim(), "UCI >");

            match uci::parse_line(&line) {
                UciEvent::Info(info) => {
                    if let Some(d) = info.depth {
                        depth = depth.max(d);
                    }
                    if let (Some(score), Some(first)) = (info.score, info.pv.first()) {
                        table.insert(
                            info.multipv,
                            EvaluationLine {
                                rank: info.multipv,
                                mv: first.clone(),
                                pv: info.pv.clone(),
                                score,
                            },
                        );
                    }
                }
                UciEvent::BestMove { best, .. } => break best,
                _ => {}
            }
        };
        self.in_search = false;

        let lines: Vec<EvaluationLine> = table.into_values().collect();
        let score = lines
            .iter()
            .find(|l| l.rank == 1)
            .map(|l| l.score)
            .unwrap_or(Score::Cp(0));

        Ok(AnalysisOutput {
            lines,
            best_move,
            score,
            depth,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn dispose(&mut self) {
        let _ = self.send("quit").await;
        // Closing stdin is the second signal for engines that ignore `quit`.
        self.stdin.take();
        let _ = self.process.wait().await;
        self.pump.abort();
        self.alive = false;
        debug!(engine_id = self.id, "Engine disposed");
    }
}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        // Best-effort synchronous kill in drop
        let _ = self.process.start_kill();
        self.pump.abort();
    }
}

/// Spawns and initializes [`EngineProcess`]es with fixed startup options.
#[derive(Debug, Clone)]
pub struct UciProcessFactory {
    command: EngineCommand,
    options: EngineOptions,
}

impl UciProcessFactory {
    pub fn new(command: EngineCommand, options: EngineOptions) -> Self {
        Self { command, options }
    }
}

#[async_trait]
impl EngineFactory for UciProcessFactory {
    type Engine = EngineProcess;

    async fn spawn(&self, id: usize) -> Result<EngineProcess, CoachError> {
        let mut engine = EngineProcess::spawn(id, &self.command)?;
        // A binary that never answers `uci` must not hang pool startup.
        match tokio::time::timeout(HANDSHAKE_TIMEOUT, engine.initialize(&self.options)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(CoachError::EngineInit(format!(
                    "{} did not complete the UCI handshake",
                    self.command.path
                )))
            }
        }
        Ok(engine)
    }
}

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
