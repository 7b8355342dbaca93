//! Move-quality classification and accuracy.
//!
//! Pure functions only: everything a tag depends on is passed in.

use serde::{Deserialize, Serialize};

use crate::engine::EvaluationLine;

/// Minimum material (points) given up for a move to count as a sacrifice.
pub const BRILLIANT_MIN_SACRIFICE: i32 = 4;

/// Centipawn loss at which a move scores zero accuracy.
const ACCURACY_CAP_CP: f64 = 300.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveTag {
    Brilliant,
    Great,
    Ok,
    Inaccuracy,
    Mistake,
    Blunder,
}

impl MoveTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoveTag::Brilliant => "brilliant",
            MoveTag::Great => "great",
            MoveTag::Ok => "ok",
            MoveTag::Inaccuracy => "inaccuracy",
            MoveTag::Mistake => "mistake",
            MoveTag::Blunder => "blunder",
        }
    }

    /// 0 for good moves, rising with how bad the move was.
    pub fn severity(&self) -> u8 {
        match self {
            MoveTag::Brilliant | MoveTag::Great | MoveTag::Ok => 0,
            MoveTag::Inaccuracy => 1,
            MoveTag::Mistake => 2,
            MoveTag::Blunder => 3,
        }
    }
}

/// Upper bounds in pawns; anything above `mistake` is a blunder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cutoffs {
    pub ok: f64,
    pub inaccuracy: f64,
    pub mistake: f64,
}

impl Cutoffs {
    pub fn ok_cp(&self) -> i32 {
        (self.ok * 100.0).round() as i32
    }
}

/// Cutoffs by ascending elo bracket.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdTable {
    /// `(max elo inclusive, cutoffs)`, ascending
    pub brackets: Vec<(u32, Cutoffs)>,
    pub default: Cutoffs,
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self {
            brackets: vec![
                (1200, Cutoffs { ok: 0.7, inaccuracy: 1.5, mistake: 3.0 }),
                (1600, Cutoffs { ok: 0.5, inaccuracy: 1.2, mistake: 2.5 }),
                (2000, Cutoffs { ok: 0.4, inaccuracy: 1.0, mistake: 2.2 }),
            ],
            default: Cutoffs { ok: 0.3, inaccuracy: 0.9, mistake: 2.0 },
        }
    }
}

impl ThresholdTable {
    pub fn for_elo(&self, elo: Option<u32>) -> &Cutoffs {
        elo.and_then(|elo| {
            self.brackets
                .iter()
                .find(|(max, _)| elo <= *max)
                .map(|(_, c)| c)
        })
        .unwrap_or(&self.default)
    }
}

/// Tag from the size of the eval change alone.
pub fn base_tag(delta_cp: i32, cutoffs: &Cutoffs) -> MoveTag {
    let pawns = delta_cp.unsigned_abs() as f64 / 100.0;
    if pawns <= cutoffs.ok {
        MoveTag::Ok
    } else if pawns <= cutoffs.inaccuracy {
        MoveTag::Inaccuracy
    } else if pawns <= cutoffs.mistake {
        MoveTag::Mistake
    } else {
        MoveTag::Blunder
    }
}

/// Everything [`classify`] looks at, scores from the mover's side.
#[derive(Debug, Clone)]
pub struct ClassifyInput<'a> {
    /// `eval_after - eval_before`
    pub delta_cp: i32,
    pub elo: Option<u32>,
    pub played_uci: &'a str,
    /// Engine lines of the position before the move, rank ascending
    pub lines: &'a [EvaluationLine],
    pub eval_before_cp: i32,
    pub eval_after_cp: i32,
    /// Net material given up by the move after the expected reply
    pub sacrificed: i32,
}

pub fn classify(input: &ClassifyInput, table: &ThresholdTable) -> MoveTag {
    let cutoffs = table.for_elo(input.elo);
    let base = base_tag(input.delta_cp, cutoffs);
    let ok_cp = cutoffs.ok_cp();

    if is_brilliant(input, base, ok_cp) {
        return MoveTag::Brilliant;
    }
    if is_great(input, base, ok_cp) {
        return MoveTag::Great;
    }
    base
}

fn is_brilliant(input: &ClassifyInput, base: MoveTag, ok_cp: i32) -> bool {
    if !matches!(base, MoveTag::Ok | MoveTag::Inaccuracy) {
        return false;
    }
    if input.sacrificed < BRILLIANT_MIN_SACRIFICE {
        return false;
    }
    let Some(played) = input
        .lines
        .iter()
        .find(|l| l.mv == input.played_uci && l.rank <= 2)
    else {
        return false;
    };
    let Some(best) = input.lines.first() else {
        return false;
    };
    let best_cp = best.score.to_cp();
    let played_cp = played.score.to_cp();
    // No alternative inside the ok window may do better than the sacrifice.
    input
        .lines
        .iter()
        .filter(|l| l.mv != input.played_uci && best_cp - l.score.to_cp() <= ok_cp)
        .all(|l| l.score.to_cp() <= played_cp)
}

fn is_great(input: &ClassifyInput, base: MoveTag, ok_cp: i32) -> bool {
    if base == MoveTag::Blunder {
        return false;
    }
    let Some(best) = input.lines.first() else {
        return false;
    };
    if best.mv != input.played_uci {
        return false;
    }
    let best_cp = best.score.to_cp();
    let only_move = input.lines.len() >= 2
        && input.lines[1..]
            .iter()
            .all(|l| best_cp - l.score.to_cp() > ok_cp);
    let flips_sign = input.eval_before_cp < 0
        && input.eval_after_cp > 0
        && (input.eval_after_cp - input.eval_before_cp) <= ok_cp;
    only_move || flips_sign
}

/// Per-move accuracy loss in `[0, 1]`.
pub fn accuracy_loss(delta_cp: i32) -> f64 {
    (delta_cp.unsigned_abs() as f64 / ACCURACY_CAP_CP).min(1.0)
}

/// 100 x (1 - mean loss), two decimals. No moves scores 100.
pub fn accuracy(deltas: &[i32]) -> f64 {
    if deltas.is_empty() {
        return 100.0;
    }
    let mean = deltas.iter().map(|d| accuracy_loss(*d)).sum::<f64>() / deltas.len() as f64;
    ((100.0 * (1.0 - mean)) * 100.0).round() / 100.0
}
