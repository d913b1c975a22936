//! Human-readable error descriptions and structured JSON error formatting.

use barbot_core::MotionError;

/// Stable kind name for scripts and JSON consumers.
pub fn kind_name(err: &MotionError) -> &'static str {
    match err {
        MotionError::StoreUnavailable(_) => "StoreUnavailable",
        MotionError::NotFound(_) => "NotFound",
        MotionError::InvalidSequence { .. } => "InvalidSequence",
        MotionError::Uncalibrated => "Uncalibrated",
        MotionError::Disabled => "Disabled",
        MotionError::LimitReached { .. } => "LimitReached",
        MotionError::Busy => "Busy",
        MotionError::Cancelled { .. } => "Cancelled",
        MotionError::SequenceAborted { .. } => "SequenceAborted",
        MotionError::Hardware(_) => "Hardware",
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes
/// and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(me) = err.downcast_ref::<MotionError>() {
        return humanize_motion(me);
    }

    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();
    if lower.contains("toml") || lower.contains("missing field") {
        return format!(
            "What happened: The config file could not be parsed.\nLikely causes: Missing [pins] values or a typo in the TOML.\nHow to fix: Edit the config file and rerun. Original: {msg}"
        );
    }

    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

fn humanize_motion(err: &MotionError) -> String {
    match err {
        MotionError::StoreUnavailable(detail) => format!(
            "What happened: The position/recipe store could not be read ({detail}).\nLikely causes: Missing or malformed JSON file, wrong path in [store].\nHow to fix: Check the paths in the config and the file contents, then rerun."
        ),
        MotionError::NotFound(ident) => format!(
            "What happened: No position or recipe named '{ident}'.\nLikely causes: Typo, or the store file does not define it (names are case-sensitive).\nHow to fix: Run `barbot positions` to list known stations, then retry."
        ),
        MotionError::InvalidSequence { sequence, reason } => format!(
            "What happened: Recipe '{sequence}' failed validation ({reason}); nothing was poured.\nLikely causes: The recipe references a station missing from the positions file, or a negative pour time.\nHow to fix: Fix the recipe or add the missing position, then rerun."
        ),
        MotionError::Uncalibrated => "What happened: The carriage position is not trustworthy yet.\nLikely causes: The motor was never homed in this session.\nHow to fix: Run `barbot calibrate`, or pass --assume-at <steps> if you know the true position.".to_string(),
        MotionError::Disabled => "What happened: The motor driver is disabled.\nLikely causes: A previous `barbot disable`, or startup with the driver off.\nHow to fix: Run `barbot enable` and retry.".to_string(),
        MotionError::LimitReached { position, target } => format!(
            "What happened: An end stop interrupted the move at step {position} (target was {target}).\nLikely causes: A stale position offset beyond the physical track, or calibration drift.\nHow to fix: Re-run `barbot calibrate` and check the offsets in the positions file. The move is not retried automatically."
        ),
        MotionError::Busy => "What happened: Another motion operation is already running.\nLikely causes: A concurrent command holds the motor.\nHow to fix: Wait for it to finish and retry.".to_string(),
        MotionError::Cancelled { position } => format!(
            "What happened: Motion was cancelled; the carriage stopped at step {position}.\nHow to fix: Nothing to fix; the tracked position is accurate. Start a new command when ready."
        ),
        MotionError::SequenceAborted { sequence, step, position, source } => format!(
            "What happened: Recipe '{sequence}' aborted at step {step}; the carriage is at step {position}. Remaining steps were not attempted.\nCause: {}\nHow to fix: Resolve the cause, re-home, and pour again.",
            humanize_motion(source).lines().next().unwrap_or("see logs")
        ),
        MotionError::Hardware(detail) => format!(
            "What happened: Hardware fault ({detail}).\nLikely causes: GPIO access failure, wiring, or a missing end stop.\nHow to fix: Check wiring and permissions; recalibrate before trusting positions again."
        ),
    }
}

/// Stable exit codes per error kind; non-motion errors return 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(me) = err.downcast_ref::<MotionError>() {
        return match me {
            MotionError::StoreUnavailable(_) => 3,
            MotionError::NotFound(_) => 4,
            MotionError::InvalidSequence { .. } => 5,
            MotionError::Uncalibrated => 6,
            MotionError::Disabled => 7,
            MotionError::LimitReached { .. } => 8,
            MotionError::Busy => 9,
            MotionError::Cancelled { .. } => 10,
            MotionError::SequenceAborted { .. } => 11,
            MotionError::Hardware(_) => 12,
        };
    }
    1
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    if let Some(me) = err.downcast_ref::<MotionError>() {
        let details = match me {
            MotionError::LimitReached { position, target } => {
                Some(json!({ "position": position, "target": target }))
            }
            MotionError::Cancelled { position } => Some(json!({ "position": position })),
            MotionError::SequenceAborted {
                sequence,
                step,
                position,
                ..
            } => Some(json!({ "sequence": sequence, "step": step, "position": position })),
            _ => None,
        };
        let msg = humanize(err);
        let obj = match details {
            Some(d) => json!({ "kind": kind_name(me), "details": d, "message": msg }),
            None => json!({ "kind": kind_name(me), "message": msg }),
        };
        return obj.to_string();
    }

    json!({ "kind": "Error", "message": humanize(err) }).to_string()
}
