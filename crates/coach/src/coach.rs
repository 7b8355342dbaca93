//! Coach message templates keyed by pattern id and move tag.

use serde_json::Value;

use crate::classify::MoveTag;
use crate::tactics::{dominant, DetectedPattern, PatternId, Severity};

const BEST_MOVE_SUFFIX: &str = " Best was {best}.";

fn pattern_template(id: PatternId) -> &'static str {
    match id {
        PatternId::MissedMate => "You had a forced mate in {mate} here.",
        PatternId::MateThreat => "This allows a forced mate in {mate}.",
        PatternId::HangingPiece => "Your {piece} on {square} can be taken for free.",
        PatternId::MaterialDrop => "This gives away about {lost} points of material.",
        PatternId::ForkThreat => "The knight on {square} is forking your pieces.",
        PatternId::Pin => "Your {piece} on {square} is pinned to your king.",
    }
}

fn tag_template(tag: MoveTag) -> &'static str {
    match tag {
        MoveTag::Brilliant => "Brilliant! A sound sacrifice.",
        MoveTag::Great => "Great move, it keeps everything together.",
        MoveTag::Ok => "Solid move.",
        MoveTag::Inaccuracy => "An inaccuracy.",
        MoveTag::Mistake => "A mistake.",
        MoveTag::Blunder => "A blunder.",
    }
}

fn placeholder(data: &Value, key: &str) -> String {
    match data.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 => format!("{}", f as i64),
            Some(f) => format!("{f:.1}"),
            None => n.to_string(),
        },
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

fn render(template: &str, data: &Value) -> String {
    ["piece", "square", "lost", "mate"]
        .iter()
        .fold(template.to_string(), |text, key| {
            let token = format!("{{{key}}}");
            if text.contains(&token) {
                text.replace(&token, &placeholder(data, key))
            } else {
                text
            }
        })
}

/// Coach text for one move. Good moves are praised by tag; otherwise the most
/// severe pattern (warning or above) speaks, falling back to the tag. Tags
/// worse than ok get the engine's move appended when it differs.
pub fn coach_message(
    tag: MoveTag,
    patterns: &[DetectedPattern],
    best_san: Option<&str>,
    played_is_best: bool,
) -> String {
    let mut message = match tag {
        MoveTag::Brilliant | MoveTag::Great => tag_template(tag).to_string(),
        _ => match dominant(patterns).filter(|p| p.severity >= Severity::Warning) {
            Some(p) => render(pattern_template(p.id), &p.data),
            None => tag_template(tag).to_string(),
        },
    };

    if tag.severity() > 0 && !played_is_best {
        if let Some(best) = best_san.filter(|b| !b.is_empty()) {
            message.push_str(&BEST_MOVE_SUFFIX.replace("{best}", best));
        }
    }
    message
}
