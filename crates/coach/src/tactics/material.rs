/// Material drop: net balance before the move vs after the expected reply
use chess_core::material::material_balance;
use serde_json::json;

use super::{DetectedPattern, PatternContext, PatternId, PatternThresholds, Severity};

/// Points of net material the mover gives up, counting the expected reply.
pub fn material_lost(ctx: &PatternContext) -> i32 {
    let settled = ctx.after_reply.unwrap_or(ctx.after);
    material_balance(ctx.before.board(), ctx.mover) - material_balance(settled.board(), ctx.mover)
}

pub fn material_drop(ctx: &PatternContext, thresholds: &PatternThresholds) -> Option<DetectedPattern> {
    let lost = material_lost(ctx) as f64;
    let severity = if lost >= thresholds.material_drop_critical {
        Severity::Critical
    } else if lost >= thresholds.material_drop_warning
        && ctx.eval_drop_cp > thresholds.material_drop_eval_cp
    {
        Severity::Warning
    } else {
        return None;
    };
    Some(DetectedPattern {
        id: PatternId::MaterialDrop,
        severity,
        data: json!({
            "lost": lost,
            "evalDrop": ctx.eval_drop_cp,
        }),
    })
}
