//! Human-readable error descriptions and structured JSON error formatting.

use vbt_core::error::{BuildError, CommandError, VbtError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(BuildError::InvalidConfig(msg)) = err.downcast_ref::<BuildError>() {
        return format!(
            "What happened: Invalid pipeline configuration ({msg}).\nLikely causes: A threshold outside its range in the TOML, or an empty --track name.\nHow to fix: Edit the config file (or run `vbt check-config`), then rerun."
        );
    }

    if let Some(ve) = err.downcast_ref::<VbtError>() {
        return match ve {
            VbtError::SourceStalled(ms) => format!(
                "What happened: Pose source stalled; no frame for {ms} ms.\nLikely causes: The trace source stopped producing frames or --fps is far above what it can deliver.\nHow to fix: Lower --fps, drop --paced, or raise replay.stall_ms in the config."
            ),
            VbtError::Interrupted => "What happened: Run interrupted.\nLikely causes: Ctrl-C or a termination signal.\nHow to fix: Rerun when ready; nothing was saved.".to_string(),
            VbtError::Config(msg) => format!(
                "What happened: Configuration is invalid ({msg}).\nLikely causes: A typo in a section or key, a wrong value type, or an out-of-range value.\nHow to fix: Edit the TOML config and try again."
            ),
            VbtError::Source(msg) => format!(
                "What happened: Pose source failed ({msg}).\nLikely causes: The detector or trace reader returned an error.\nHow to fix: Re-run with --log-level=debug for details."
            ),
        };
    }

    if let Some(ce) = err.downcast_ref::<CommandError>() {
        return match ce {
            CommandError::NotReady { state } => format!(
                "What happened: Recording was requested while the pipeline was {state}.\nLikely causes: The lifter was not yet stable in frame.\nHow to fix: Wait for READY before starting a recording."
            ),
            CommandError::EmptyTrackingPoint => "What happened: Empty tracking point name.\nLikely causes: --track was given an empty string.\nHow to fix: Pass a keypoint name such as right_wrist.".to_string(),
        };
    }

    // String-based heuristics for errors coming from the pose trace loader
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("pose csv must have headers") {
        return "Invalid headers in pose CSV. Expected 'frame,timestamp_ms,keypoint,x,y,score'."
            .to_string();
    }

    if lower.contains("open pose csv") {
        return format!(
            "What happened: Could not open the pose trace.\nLikely causes: Wrong path or missing read permission.\nHow to fix: Check the --frames path. Original: {msg}"
        );
    }

    if lower.contains("invalid csv row") || lower.starts_with("row ") {
        return format!(
            "What happened: The pose trace has a malformed row ({msg}).\nLikely causes: A missing column, a non-numeric value, or frames out of order.\nHow to fix: Fix the listed row and rerun."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 2 config, 3 stalled source, 4 interrupted, 1 anything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 2;
    }
    match err.downcast_ref::<VbtError>() {
        Some(VbtError::Config(_)) => 2,
        Some(VbtError::SourceStalled(_)) => 3,
        Some(VbtError::Interrupted) => 4,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "InvalidConfig";
    }
    if let Some(ve) = err.downcast_ref::<VbtError>() {
        return match ve {
            VbtError::Source(_) => "Source",
            VbtError::SourceStalled(_) => "SourceStalled",
            VbtError::Interrupted => "Interrupted",
            VbtError::Config(_) => "Config",
        };
    }
    if err.downcast_ref::<CommandError>().is_some() {
        return "Command";
    }
    "Error"
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let msg = humanize(err);
    let reason = reason_name(err);
    let obj = match err.downcast_ref::<VbtError>() {
        Some(VbtError::SourceStalled(ms)) => {
            json!({ "reason": reason, "details": { "stalled_ms": ms }, "message": msg })
        }
        _ => json!({ "reason": reason, "message": msg }),
    };
    obj.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(eyre::Report::new(BuildError::InvalidConfig("x")), 2, "InvalidConfig")]
    #[case(eyre::Report::new(VbtError::Config("bad".into())), 2, "Config")]
    #[case(eyre::Report::new(VbtError::SourceStalled(1500)), 3, "SourceStalled")]
    #[case(eyre::Report::new(VbtError::Interrupted), 4, "Interrupted")]
    #[case(eyre::Report::new(VbtError::Source("boom".into())), 1, "Source")]
    #[case(eyre::eyre!("something else"), 1, "Error")]
    fn codes_and_reasons(#[case] err: eyre::Report, #[case] code: i32, #[case] reason: &str) {
        assert_eq!(exit_code_for_error(&err), code);
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).expect("json");
        assert_eq!(v["reason"], reason);
        assert!(v["message"].as_str().is_some_and(|m| !m.is_empty()));
    }

    #[test]
    fn stalled_json_carries_details() {
        let err = eyre::Report::new(VbtError::SourceStalled(1500));
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).expect("json");
        assert_eq!(v["details"]["stalled_ms"], 1500);
        assert!(humanize(&err).contains("1500 ms"));
    }

    #[test]
    fn csv_header_heuristic() {
        let err = eyre::eyre!("pose CSV must have headers 'frame,...', got: a,b");
        assert!(humanize(&err).starts_with("Invalid headers in pose CSV"));
    }
}
