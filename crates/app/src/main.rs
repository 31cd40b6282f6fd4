//! Posture monitor host binary.
//!
//! Wires adapters into the monitoring pipeline and stands in for the
//! presentation layer: it polls the result slot, logs camera transitions and
//! alerts, and shuts the pipeline down on Ctrl+C. A real deployment embeds
//! the `monitor` module and supplies its own pose-estimation backend; this
//! binary ships with the synthetic estimator so the pipeline can run
//! unattended without a model.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use anyhow::{bail, Result};
use clap::Parser;
use tracing::{debug, info, warn};

use app::monitor::{
    config, telemetry, ConfigFile, FileLiveness, LivenessSink, LogLiveness, Monitor, MonitorConfig,
    MonitorEvent, MonitorParts,
};
use frame_capture::{synthetic::SyntheticSource, FrameEncoder, FrameSource};
use pose_core::{synthetic::SyntheticEstimator, TorsoGeometryClassifier};

mod cli;

/// Poll cadence of the consumer loop standing in for the presentation layer.
const CONSUMER_POLL: Duration = Duration::from_millis(100);
/// Synthetic pose phase length in frames.
const SYNTHETIC_FRAMES_PER_PHASE: u64 = 50;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = cli::Cli::parse();
    telemetry::init_tracing(args.verbose);
    let _prometheus = telemetry::init_metrics_recorder();

    let file = match &args.config {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::default(),
    };
    let config = config::resolve(file, args.overrides());

    let parts = build_parts(&args, &config)?;
    let monitor = Monitor::new(config, parts);
    let results = monitor.results();
    let events = monitor.events();

    if !monitor.start() {
        bail!("failed to start posture monitor (is the camera available?)");
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        if let Err(err) = ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::SeqCst);
        }) {
            warn!("failed to install Ctrl+C handler: {err}");
        }
    }

    info!("posture monitor running; press Ctrl+C to stop");
    while !shutdown.load(Ordering::Relaxed) {
        while let Ok(event) = events.try_recv() {
            let MonitorEvent::CameraState { to, .. } = event;
            match serde_json::to_string(&event) {
                Ok(json) => info!("camera event: {json}"),
                Err(err) => warn!("camera now {}; failed to serialise event: {err}", to.label()),
            }
        }

        if let Some(result) = results.get_nowait() {
            if result.alert.should_alert {
                warn!(
                    duration_secs = result.alert.duration_secs,
                    "bad posture alert"
                );
            }
            if args.verbose {
                match serde_json::to_string(&result) {
                    Ok(json) => debug!("result: {json}"),
                    Err(err) => warn!("failed to serialise result: {err}"),
                }
            }
        }

        thread::sleep(CONSUMER_POLL);
    }

    info!("shutting down");
    monitor.stop();
    Ok(())
}

fn build_parts(args: &cli::Cli, config: &MonitorConfig) -> Result<MonitorParts> {
    let source: Box<dyn FrameSource> = if args.synthetic {
        Box::new(SyntheticSource::new(
            config.capture_width,
            config.capture_height,
        ))
    } else {
        build_camera_source(config)?
    };

    let encoder: Option<Box<dyn FrameEncoder>> = if config.publish_frames {
        build_encoder(config)
    } else {
        None
    };

    let liveness: Box<dyn LivenessSink> = match &config.heartbeat_path {
        Some(path) => Box::new(FileLiveness::new(path.clone())),
        None => Box::new(LogLiveness),
    };

    Ok(MonitorParts {
        source,
        estimator: Box::new(SyntheticEstimator::new(SYNTHETIC_FRAMES_PER_PHASE)),
        classifier: Box::new(TorsoGeometryClassifier::default()),
        encoder,
        liveness,
    })
}

#[cfg(feature = "opencv-backend")]
fn build_camera_source(config: &MonitorConfig) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(frame_capture::camera::CameraSource::new(
        config.camera_index,
        (config.capture_width, config.capture_height),
        f64::from(config.fps_target),
    )))
}

#[cfg(not(feature = "opencv-backend"))]
fn build_camera_source(_config: &MonitorConfig) -> Result<Box<dyn FrameSource>> {
    bail!("built without the opencv-backend feature; run with --synthetic")
}

#[cfg(feature = "opencv-backend")]
fn build_encoder(config: &MonitorConfig) -> Option<Box<dyn FrameEncoder>> {
    Some(Box::new(frame_capture::camera::JpegEncoder::new(
        config.jpeg_quality,
    )))
}

#[cfg(not(feature = "opencv-backend"))]
fn build_encoder(_config: &MonitorConfig) -> Option<Box<dyn FrameEncoder>> {
    warn!("publish_frames requested but no encoder backend is built in");
    None
}
