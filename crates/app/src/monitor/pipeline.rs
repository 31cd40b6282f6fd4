//! Pipeline orchestrator owning the background worker loop.
//!
//! One dedicated thread samples the frame source at the configured rate,
//! runs detection, classification, and alert tracking, and publishes results
//! through the latest-wins slot. Faults never escape an iteration: read
//! failures feed the camera state machine and everything downstream of a
//! successful read is absorbed at the per-iteration boundary.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::Context;
use chrono::Utc;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use frame_capture::{Frame, FrameEncoder, FrameSource};
use pose_core::{PoseEstimator, PostureClassifier, PostureState};
use tracing::{debug, error, info, warn};

use crate::monitor::{
    alert::{AlertStatus, AlertTracker},
    camera::{CameraState, CameraSupervisor, CameraTransition},
    config::MonitorConfig,
    data::{MonitorEvent, PipelineResult},
    heartbeat::{spawn_heartbeat, LivenessSink, WorkerPulse},
    slot::ResultSlot,
    telemetry,
};

/// How long `stop()` waits for the worker before detaching it.
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(5);
/// Capacity of the camera state-change notification channel.
const EVENT_CHANNEL_CAPACITY: usize = 16;
/// Slice for interruptible sleeps, bounding shutdown latency.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Pluggable collaborators consumed by the worker loop.
pub struct MonitorParts {
    pub source: Box<dyn FrameSource>,
    pub estimator: Box<dyn PoseEstimator>,
    pub classifier: Box<dyn PostureClassifier>,
    pub encoder: Option<Box<dyn FrameEncoder>>,
    pub liveness: Box<dyn LivenessSink>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lifecycle {
    NotStarted,
    Running,
    /// Terminal; a fresh instance is required to monitor again.
    Stopped,
}

struct WorkerSet {
    estimator: Box<dyn PoseEstimator>,
    classifier: Box<dyn PostureClassifier>,
    encoder: Option<Box<dyn FrameEncoder>>,
    liveness: Box<dyn LivenessSink>,
}

struct Inner {
    lifecycle: Lifecycle,
    parts: Option<WorkerSet>,
    worker: Option<thread::JoinHandle<()>>,
    heartbeat: Option<thread::JoinHandle<()>>,
    done_rx: Option<Receiver<()>>,
}

/// Background posture monitor.
///
/// Lifecycle: NotStarted → Running → Stopped. The sensor handle is owned for
/// the whole run: opened in `start()`, released in `stop()`, never shared
/// with the embedding application.
pub struct Monitor {
    config: MonitorConfig,
    source: Arc<Mutex<Box<dyn FrameSource>>>,
    slot: ResultSlot,
    alerts: Arc<AlertTracker>,
    pulse: Arc<WorkerPulse>,
    shutdown: Arc<AtomicBool>,
    events_tx: Sender<MonitorEvent>,
    events_rx: Receiver<MonitorEvent>,
    inner: Mutex<Inner>,
}

impl Monitor {
    pub fn new(config: MonitorConfig, parts: MonitorParts) -> Self {
        let (events_tx, events_rx) = bounded(EVENT_CHANNEL_CAPACITY);
        let alerts = Arc::new(AlertTracker::new(
            config.alert_threshold,
            config.alert_cooldown,
        ));
        Self {
            config,
            source: Arc::new(Mutex::new(parts.source)),
            slot: ResultSlot::new(),
            alerts,
            pulse: Arc::new(WorkerPulse::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
            events_tx,
            events_rx,
            inner: Mutex::new(Inner {
                lifecycle: Lifecycle::NotStarted,
                parts: Some(WorkerSet {
                    estimator: parts.estimator,
                    classifier: parts.classifier,
                    encoder: parts.encoder,
                    liveness: parts.liveness,
                }),
                worker: None,
                heartbeat: None,
                done_rx: None,
            }),
        }
    }

    /// Open the sensor and spawn the worker. Returns `false` when the sensor
    /// cannot be opened (logged, never raised). Calling `start()` while
    /// already running is a no-op returning `true`.
    pub fn start(&self) -> bool {
        let mut inner = self.lock_inner();
        match inner.lifecycle {
            Lifecycle::Running => {
                debug!("start() called while running; ignoring");
                return true;
            }
            Lifecycle::Stopped => {
                warn!("start() called on a stopped monitor; create a fresh instance");
                return false;
            }
            Lifecycle::NotStarted => {}
        }

        let opened = {
            let mut source = lock_source(&self.source);
            source.open()
        };
        if !opened {
            error!("failed to open frame source; monitor not started");
            return false;
        }

        let set = inner
            .parts
            .take()
            .expect("worker parts present before first start");
        let (done_tx, done_rx) = bounded::<()>(1);
        let context = WorkerContext {
            config: self.config.clone(),
            source: self.source.clone(),
            estimator: set.estimator,
            classifier: set.classifier,
            encoder: set.encoder,
            slot: self.slot.clone(),
            alerts: self.alerts.clone(),
            pulse: self.pulse.clone(),
            shutdown: self.shutdown.clone(),
            events: self.events_tx.clone(),
        };
        let worker = telemetry::spawn_thread("posture-worker", move || {
            worker_loop(context);
            let _ = done_tx.send(());
        });
        let worker = match worker {
            Ok(handle) => handle,
            Err(err) => {
                error!("failed to spawn worker thread: {err}");
                lock_source(&self.source).release();
                // The worker parts were consumed; this instance cannot start.
                inner.lifecycle = Lifecycle::Stopped;
                return false;
            }
        };

        inner.heartbeat = Some(spawn_heartbeat(
            self.pulse.clone(),
            set.liveness,
            self.config.heartbeat_interval,
            self.shutdown.clone(),
        ));
        inner.worker = Some(worker);
        inner.done_rx = Some(done_rx);
        inner.lifecycle = Lifecycle::Running;
        info!(
            fps = self.config.fps_target,
            threshold_secs = self.config.alert_threshold.as_secs(),
            cooldown_secs = self.config.alert_cooldown.as_secs(),
            "posture monitor started"
        );
        true
    }

    /// Cooperative shutdown: flag the worker, wait up to the join timeout,
    /// then release the sensor handle. Idempotent; safe before `start()`.
    pub fn stop(&self) {
        let mut inner = self.lock_inner();
        if inner.lifecycle == Lifecycle::Stopped {
            debug!("stop() called on a stopped monitor; ignoring");
            return;
        }

        self.shutdown.store(true, Ordering::SeqCst);

        if let Some(done_rx) = inner.done_rx.take() {
            match done_rx.recv_timeout(STOP_JOIN_TIMEOUT) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    if let Some(handle) = inner.worker.take() {
                        let _ = handle.join();
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        "worker did not stop within {:?}; detaching thread",
                        STOP_JOIN_TIMEOUT
                    );
                    inner.worker.take();
                }
            }
        }
        if let Some(handle) = inner.heartbeat.take() {
            let _ = handle.join();
        }

        // Release the sensor regardless of how the join went. A wedged worker
        // may still hold the handle; waiting on it would hang the caller.
        match self.source.try_lock() {
            Ok(mut source) => source.release(),
            Err(_) => warn!("sensor handle still held by the worker; skipping release"),
        }

        inner.lifecycle = Lifecycle::Stopped;
        info!("posture monitor stopped");
    }

    pub fn is_running(&self) -> bool {
        self.lock_inner().lifecycle == Lifecycle::Running
    }

    /// Handle to the latest-wins result slot.
    pub fn results(&self) -> ResultSlot {
        self.slot.clone()
    }

    /// Receiver for camera state-change notifications.
    pub fn events(&self) -> Receiver<MonitorEvent> {
        self.events_rx.clone()
    }

    /// Suspend alerting and clear in-flight tracking. Takes effect within one
    /// frame period.
    pub fn pause(&self) {
        self.alerts.pause();
    }

    pub fn resume(&self) {
        self.alerts.resume();
    }

    pub fn alert_status(&self) -> AlertStatus {
        self.alerts.status()
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock_source<'a>(
    source: &'a Arc<Mutex<Box<dyn FrameSource>>>,
) -> std::sync::MutexGuard<'a, Box<dyn FrameSource>> {
    source.lock().unwrap_or_else(PoisonError::into_inner)
}

struct WorkerContext {
    config: MonitorConfig,
    source: Arc<Mutex<Box<dyn FrameSource>>>,
    estimator: Box<dyn PoseEstimator>,
    classifier: Box<dyn PostureClassifier>,
    encoder: Option<Box<dyn FrameEncoder>>,
    slot: ResultSlot,
    alerts: Arc<AlertTracker>,
    pulse: Arc<WorkerPulse>,
    shutdown: Arc<AtomicBool>,
    events: Sender<MonitorEvent>,
}

fn worker_loop(mut ctx: WorkerContext) {
    let frame_period = ctx.config.frame_period();
    let mut camera = CameraSupervisor::new(ctx.config.retry);
    let mut frame_number: u64 = 0;
    let mut smoothed_fps: f32 = 0.0;
    let mut last_instant = Instant::now();
    debug!("posture worker running");

    while !ctx.shutdown.load(Ordering::Relaxed) {
        let iteration_start = Instant::now();
        ctx.pulse.beat();

        let read_result = {
            let mut source = lock_source(&ctx.source);
            source.read()
        };

        match read_result {
            Ok(frame) => {
                if let Some(transition) = camera.on_success(Instant::now()) {
                    info!(
                        from = transition.from.label(),
                        to = transition.to.label(),
                        "camera recovered"
                    );
                    metrics::counter!("posture_camera_reconnects_total").increment(1);
                    publish_event(&ctx.events, transition);
                }

                frame_number = frame_number.wrapping_add(1);
                let now = Instant::now();
                let elapsed = now.duration_since(last_instant).as_secs_f32();
                last_instant = now;
                if elapsed > 0.0 {
                    let instant = 1.0 / elapsed;
                    smoothed_fps = if smoothed_fps == 0.0 {
                        instant
                    } else {
                        0.9 * smoothed_fps + 0.1 * instant
                    };
                }
                metrics::gauge!("posture_pipeline_fps").set(smoothed_fps as f64);
                metrics::counter!("posture_frames_total").increment(1);
                if frame_number % 100 == 0 {
                    debug!(
                        "worker heartbeat: frame #{frame_number}, {:.1} fps",
                        smoothed_fps
                    );
                }

                // Per-iteration fault boundary: a bad frame must never stop
                // multi-hour unattended monitoring.
                if let Err(err) = process_frame(&mut ctx, &frame, camera.state()) {
                    warn!("frame #{frame_number} dropped at fault boundary: {err:#}");
                    metrics::counter!("posture_frame_errors_total").increment(1);
                }
            }
            Err(err) => {
                let directive = camera.on_failure(Instant::now());
                metrics::counter!("posture_capture_failures_total").increment(1);
                if let Some(transition) = directive.transition {
                    warn!(
                        from = transition.from.label(),
                        to = transition.to.label(),
                        "camera read failed: {err}"
                    );
                    publish_event(&ctx.events, transition);
                } else {
                    debug!("camera read failed while {}: {err}", camera.state().label());
                }

                sleep_interruptibly(directive.delay, &ctx);
                if directive.reopen && !ctx.shutdown.load(Ordering::Relaxed) {
                    reopen_source(&ctx);
                }
                continue;
            }
        }

        let elapsed = iteration_start.elapsed();
        if elapsed < frame_period {
            sleep_interruptibly(frame_period - elapsed, &ctx);
        }
    }

    debug!("posture worker exiting");
}

/// Detection → classification → alert update → publish, all inside the
/// iteration fault boundary.
fn process_frame(
    ctx: &mut WorkerContext,
    frame: &Frame,
    camera_state: CameraState,
) -> anyhow::Result<()> {
    let detect_start = Instant::now();
    let detection = ctx
        .estimator
        .detect(frame)
        .context("pose estimation failed")?;
    metrics::histogram!("posture_stage_latency_seconds", "stage" => "detect")
        .record(detect_start.elapsed().as_secs_f64());

    let posture = match detection.landmarks.as_ref() {
        Some(landmarks) if detection.user_present => ctx.classifier.classify(landmarks),
        _ => PostureState::Unknown,
    };
    metrics::counter!("posture_frames_by_state_total", "state" => posture.label()).increment(1);

    let alert = ctx.alerts.update(posture, detection.user_present);
    if alert.should_alert {
        metrics::counter!("posture_alerts_total").increment(1);
    }

    // Encoding is best-effort: a broken encoder must not suppress the alert
    // that rides on the same result.
    let frame_jpeg = ctx.encoder.as_mut().and_then(|encoder| {
        match encoder.encode(frame) {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                warn!("frame encode failed: {err:#}");
                metrics::counter!("posture_encode_errors_total").increment(1);
                None
            }
        }
    });

    let result = PipelineResult {
        timestamp_ms: Utc::now().timestamp_millis(),
        posture,
        user_present: detection.user_present,
        confidence: detection.confidence,
        frame_jpeg,
        camera_state,
        alert,
    };
    if ctx.slot.put(result) {
        metrics::counter!("posture_results_displaced_total").increment(1);
    }
    Ok(())
}

fn publish_event(events: &Sender<MonitorEvent>, transition: CameraTransition) {
    let event = MonitorEvent::CameraState {
        from: transition.from,
        to: transition.to,
        timestamp_ms: Utc::now().timestamp_millis(),
    };
    match events.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            debug!("event channel full; dropping camera state notification");
            metrics::counter!("posture_events_dropped_total").increment(1);
        }
        Err(TrySendError::Disconnected(_)) => {}
    }
}

fn reopen_source(ctx: &WorkerContext) {
    let mut source = lock_source(&ctx.source);
    source.release();
    if source.open() {
        info!("frame source reopened");
    } else {
        debug!("frame source reopen attempt failed");
    }
}

/// Sleep in slices so shutdown stays responsive, beating the pulse so a long
/// retry delay is not mistaken for a hung worker.
fn sleep_interruptibly(duration: Duration, ctx: &WorkerContext) {
    let mut remaining = duration;
    while remaining > Duration::ZERO {
        if ctx.shutdown.load(Ordering::Relaxed) {
            return;
        }
        ctx.pulse.beat();
        let slice = remaining.min(SLEEP_SLICE);
        thread::sleep(slice);
        remaining = remaining.saturating_sub(slice);
    }
}
