//! UCI output tokenizer. Every stdout line becomes one [`UciEvent`].

use super::Score;

/// One line of engine output.
#[derive(Debug, Clone, PartialEq)]
pub enum UciEvent {
    IdName(String),
    UciOk,
    ReadyOk,
    Info(InfoLine),
    BestMove { best: String, ponder: Option<String> },
    Unknown(String),
}

/// Parsed `info` line. Fields the engine did not send stay `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct InfoLine {
    pub depth: Option<u32>,
    pub seldepth: Option<u32>,
    /// 1 when the engine omits it
    pub multipv: u32,
    pub score: Option<Score>,
    pub nodes: Option<u64>,
    pub time_ms: Option<u64>,
    pub pv: Vec<String>,
}

impl Default for InfoLine {
    fn default() -> Self {
        Self {
            depth: None,
            seldepth: None,
            multipv: 1,
            score: None,
            nodes: None,
            time_ms: None,
            pv: Vec::new(),
        }
    }
}

pub fn parse_line(line: &str) -> UciEvent {
    let trimmed = line.trim();
    let mut parts = trimmed.split_whitespace();
    match parts.next() {
        Some("uciok") => UciEvent::UciOk,
        Some("readyok") => UciEvent::ReadyOk,
        Some("bestmove") => match parts.next() {
            Some(best) => {
                let ponder = match (parts.next(), parts.next()) {
                    (Some("ponder"), Some(p)) => Some(p.to_string()),
                    _ => None,
                };
                UciEvent::BestMove {
                    best: best.to_string(),
                    ponder,
                }
            }
            None => UciEvent::Unknown(trimmed.to_string()),
        },
        Some("id") => match parts.next() {
            Some("name") => UciEvent::IdName(parts.collect::<Vec<_>>().join(" ")),
            _ => UciEvent::Unknown(trimmed.to_string()),
        },
        Some("info") => UciEvent::Info(parse_info(&parts.collect::<Vec<_>>())),
        _ => UciEvent::Unknown(trimmed.to_string()),
    }
}

fn parse_info(tokens: &[&str]) -> InfoLine {
    let mut info = InfoLine::default();
    let mut i = 0;
    while i < tokens.len() {
        let next = tokens.get(i + 1).copied();
        match tokens[i] {
            "depth" => {
                info.depth = next.and_then(|v| v.parse().ok());
                i += 2;
            }
            "seldepth" => {
                info.seldepth = next.and_then(|v| v.parse().ok());
                i += 2;
            }
            "multipv" => {
                info.multipv = next.and_then(|v| v.parse().ok()).unwrap_or(1);
                i += 2;
            }
            "nodes" => {
                info.nodes = next.and_then(|v| v.parse().ok());
                i += 2;
            }
            "time" => {
                info.time_ms = next.and_then(|v| v.parse().ok());
                i += 2;
            }
            "score" => {
                let value = tokens.get(i + 2).and_then(|v| v.parse::<i32>().ok());
                info.score = match (next, value) {
                    (Some("cp"), Some(v)) => Some(Score::Cp(v)),
                    (Some("mate"), Some(v)) => Some(Score::Mate(v)),
                    _ => None,
                };
                i += 3;
            }
            "lowerbound" | "upperbound" => i += 1,
            "wdl" => i += 4,
            "pv" => {
                info.pv = tokens[i + 1..]
                    .iter()
                    .take_while(|t| !t.starts_with("bmc") && **t != "string")
                    .map(|t| t.to_string())
                    .collect();
                break;
            }
            // Free text to end of line
            "string" => break,
            _ => i += 2,
        }
    }
    info
}
