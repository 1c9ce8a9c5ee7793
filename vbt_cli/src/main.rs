#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
//! `vbt` binary: replay pose traces through the detection pipeline.

mod cli;
mod error_fmt;
mod logging;
mod replay;

use clap::Parser;
use cli::{Cli, Commands, JSON_MODE};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if let Err(e) = color_eyre::install() {
        eprintln!("warning: error report hook not installed: {e}");
    }

    let code = match run(cli) {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            if JSON_MODE.get().copied().unwrap_or(false) {
                println!("{}", error_fmt::format_error_json(&e));
            } else {
                eprintln!("{}", error_fmt::humanize(&e));
            }
            error_fmt::exit_code_for_error(&e)
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> eyre::Result<()> {
    let cfg = replay::load_config(cli.config.as_deref())?;

    let level = cli
        .log_level
        .as_deref()
        .or(cfg.logging.level.as_deref())
        .unwrap_or("info");
    logging::init(level, cli.json, &cfg.logging)?;
    tracing::debug!(config = ?cli.config, level, "starting");

    match cli.cmd {
        Commands::Replay {
            frames,
            track,
            record,
            paced,
            fps,
            max_frames,
            diagnostics,
        } => {
            let shutdown = Arc::new(AtomicBool::new(false));
            {
                let flag = Arc::clone(&shutdown);
                if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
                    tracing::warn!(error = %e, "Ctrl-C handler not installed");
                }
            }
            let args = replay::ReplayArgs {
                frames: &frames,
                track: track.as_deref(),
                record,
                paced,
                fps,
                max_frames,
                diagnostics,
            };
            let report = replay::run_replay(&cfg, &args, &shutdown)?;
            if cli.json {
                println!("{}", serde_json::to_string(&report)?);
            } else {
                println!("{}", replay::render_report(&report));
            }
        }
        Commands::CheckConfig => {
            let builder: vbt_core::PipelineBuilder = (&cfg).into();
            let pipeline = builder.build()?;
            if cli.json {
                let v = serde_json::json!({
                    "ok": true,
                    "tracking_point": pipeline.tracking_point(),
                    "thresholds": pipeline.thresholds(),
                });
                println!("{v}");
            } else {
                println!("Config OK");
                println!(
                    "Tracking point: {}",
                    pipeline.tracking_point().unwrap_or("(none)")
                );
            }
        }
    }
    Ok(())
}
