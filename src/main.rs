// src/main.rs
use anyhow::{Context, Result};
use body_com_tracker::config::{AppConfig, Program};
use body_com_tracker::input::StdinKeys;
use body_com_tracker::replay::ReplayBackend;
use body_com_tracker::session::Session;
use body_com_tracker::tracking::FramePipeline;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt::init();

    match run() {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let mut args = std::env::args().skip(1);
    let program: Program = args
        .next()
        .as_deref()
        .unwrap_or("pipe-com")
        .parse()
        .context("usage: com_tracker [stream-com|pipe-com|body-count] [config.toml]")?;
    let config_path = args.next().map(PathBuf::from);

    let mut config =
        AppConfig::load_or_default(config_path.as_deref()).context("failed to load config")?;
    program.apply(&mut config);
    config.validate()?;

    let mut backend =
        ReplayBackend::from_path(config.replay.path.as_deref(), config.calibration.clone())
            .context("failed to load recording")?;

    let mut session = match Session::open(&mut backend, &config) {
        Ok(session) => session,
        Err(e) => {
            error!("Setup failed: {}", e);
            return Ok(ExitCode::from(1));
        }
    };

    let mut pipeline = FramePipeline::from_config(&config, program)?;
    let mut keys = StdinKeys::spawn();
    info!("Running {}: press Enter to set the reference point, q then Enter to quit", program);

    let summary = session.run(&mut pipeline, &mut keys)?;
    session.release();

    info!(
        "Processed {} frames, {} skeletons, wrote {} log rows in {:.1}s ({:.1} fps)",
        summary.frames,
        summary.skeletons,
        summary.log_rows,
        (summary.finished_at - summary.started_at).num_milliseconds() as f64 / 1000.0,
        summary.metrics.avg_fps
    );
    if let Some(displacement) = summary.last_displacement {
        info!("Last displacement: {}", displacement);
    }

    Ok(ExitCode::SUCCESS)
}
