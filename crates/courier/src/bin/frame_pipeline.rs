//! # Frame Pipeline
//!
//! Runs the application and render threads through a full lifecycle:
//! create, resume, attach a surface, present frames, detach, pause, destroy.
//!
//! ## Usage
//!
//! ```bash
//! frame_pipeline --frames 240 --config pipeline.toml
//! RUST_LOG=debug frame_pipeline
//! ```

use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use courier::{AppHandle, AppReport, NullSink, PipelineConfig, PipelineResult, SurfaceId};
use tracing_subscriber::{fmt, EnvFilter};

/// Give up when the pipeline stops making progress.
const STALL_TIMEOUT: Duration = Duration::from_secs(5);

fn main() -> ExitCode {
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         COURIER FRAME PIPELINE                                   ║");
    println!("║         APP THREAD -> RENDER THREAD                              ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    // Parse command line arguments (simple parsing, no external deps)
    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;
    let mut frames = 120u64;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--frames" | "-f" => {
                if i + 1 < args.len() {
                    frames = args[i + 1].parse().unwrap_or(120);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Usage: frame_pipeline [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>    Pipeline config file (TOML)");
                println!("  -f, --frames <NUM>     Frames to present (default: 120)");
                println!("  -h, --help             Show this help");
                println!();
                println!("Log level comes from RUST_LOG (default: info).");
                return ExitCode::SUCCESS;
            }
            other => eprintln!("Ignoring unknown argument '{other}'"),
        }
        i += 1;
    }

    init_tracing();

    let config = match config_path {
        Some(path) => match PipelineConfig::load(&path) {
            Ok(config) => config,
            Err(error) => {
                eprintln!("Failed to load config: {error}");
                return ExitCode::FAILURE;
            }
        },
        None => PipelineConfig::default(),
    };

    println!("┌─ CONFIGURATION ─────────────────────────────────────────────────┐");
    println!("│ App Thread:         {}", config.app_thread.name);
    println!("│ Render Thread:      {}", config.render_thread.name);
    println!("│ Target FPS:         {}", config.target_fps);
    println!("│ Swap Interval:      {}", config.swap_interval);
    println!("│ Frames:             {frames}");
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    let start = Instant::now();
    match run(&config, frames) {
        Ok(report) => {
            print_report(&report, start.elapsed());
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("Pipeline failed: {error}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(env_filter).try_init();
}

fn run(config: &PipelineConfig, frames: u64) -> PipelineResult<AppReport> {
    let mut app = AppHandle::create(config, NullSink)?;
    app.resume();
    app.set_surface(Some(SurfaceId::new(1)));

    let mut progress = (0, Instant::now());
    while app.frames_presented() < frames {
        thread::sleep(Duration::from_millis(1));
        let presented = app.frames_presented();
        if presented != progress.0 {
            progress = (presented, Instant::now());
        } else if progress.1.elapsed() > STALL_TIMEOUT {
            tracing::warn!("No frame presented for {STALL_TIMEOUT:?}, stopping early");
            break;
        }
    }

    app.set_surface(None);
    app.pause();
    app.destroy()
}

fn print_report(report: &AppReport, elapsed: Duration) {
    println!("┌─ REPORT ────────────────────────────────────────────────────────┐");
    println!("│ Frames Presented:   {}", report.frames_presented);
    println!("│ Events Handled:     {}", report.events_handled);
    if let Some(render) = report.render {
        println!("│ Frames Submitted:   {}", render.frames_submitted);
        println!("│ Renderer Flushes:   {}", render.flushes);
    }
    if let Some(error) = &report.render_error {
        println!("│ Render Error:       {error}");
    }
    println!("│ Elapsed:            {:.2?}", elapsed);
    println!("└──────────────────────────────────────────────────────────────────┘");
}
