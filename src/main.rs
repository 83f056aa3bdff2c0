#![cfg(not(target_arch = "wasm32"))]

use std::backtrace::Backtrace;
use std::fs::File;
use std::io::Write;
use std::panic;

use anyhow::Context as _;
use log::{error, info, LevelFilter};
use tiled_cull::{demo, CullingConfig};

/// `tiled_cull [config.json] [--gpu]`
struct Args {
    config: Option<String>,
    gpu: bool,
}

fn parse_args() -> Args {
    let mut args = Args { config: None, gpu: false };
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--gpu" => args.gpu = true,
            _ => args.config = Some(arg),
        }
    }
    args
}

fn main() {
    setup_diagnostics();

    if let Err(e) = run(parse_args()) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => CullingConfig::load(path).with_context(|| format!("loading {path}"))?,
        None => CullingConfig::default(),
    };
    info!(
        "Starting tiled light culling demo: {}x{}, {} lights, {:?} depth",
        config.width, config.height, config.demo.lights, config.camera.depth
    );

    let report = if args.gpu {
        let (report, mismatched) = demo::run_gpu(&config)?;
        info!("GPU cross-check: {mismatched} mismatched tile counts");
        report
    } else {
        demo::run(&config)?
    };

    info!(
        "{} frames, resize round trip {}, mean luminance {:.4}",
        report.frames.len(),
        if report.round_trip_matches { "matched" } else { "DIFFERED" },
        report.mean_luminance
    );
    anyhow::ensure!(report.round_trip_matches, "light lists changed across the resize round trip");
    Ok(())
}

/// Logger plus a panic hook that keeps a crash report on disk.
fn setup_diagnostics() {
    env_logger::Builder::new()
        .filter_level(if cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .filter_module("wgpu_core", LevelFilter::Warn)
        .filter_module("wgpu_hal", LevelFilter::Warn)
        .filter_module("naga", LevelFilter::Warn)
        .format_timestamp_millis()
        .format_target(false)
        .parse_default_env()
        .init();

    panic::set_hook(Box::new(|panic_info| {
        let backtrace = Backtrace::force_capture();

        let msg = match panic_info.payload().downcast_ref::<&'static str>() {
            Some(s) => *s,
            None => match panic_info.payload().downcast_ref::<String>() {
                Some(s) => &s[..],
                None => "Box<dyn Any>",
            },
        };

        let location = panic_info
            .location()
            .map_or("Unknown location".to_string(), |loc| format!("{}:{}", loc.file(), loc.line()));

        let crash_msg = format!(
            "=== TILED_CULL CRASH ===\nReason: {}\nLocation: {}\n\nStack Trace:\n{}",
            msg, location, backtrace
        );
        eprintln!("\x1b[31;1m{}\x1b[0m", crash_msg);

        if let Ok(mut file) = File::create("tiled_cull_crash.log") {
            let _ = file.write_all(crash_msg.as_bytes());
            eprintln!("Crash report saved to tiled_cull_crash.log");
        }
    }));
}
