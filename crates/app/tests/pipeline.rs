//! End-to-end pipeline behaviour with scripted adapters.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::{Duration, Instant};

use app::monitor::{
    CameraState, LivenessSink, Monitor, MonitorConfig, MonitorEvent, MonitorParts, RetryPolicy,
};
use frame_capture::{CaptureError, Frame, FrameFormat, FrameSource};
use pose_core::{
    DetectionResult, Landmarks, PoseEstimator, PostureClassifier, PostureState,
};

fn frame() -> Frame {
    Frame {
        data: vec![0; 12],
        width: 2,
        height: 2,
        timestamp_ms: 0,
        format: FrameFormat::Bgr8,
    }
}

/// Source that fails a scripted window of reads and succeeds otherwise.
struct ScriptedSource {
    reads: Arc<AtomicUsize>,
    fail_from: usize,
    fail_count: usize,
    opened: bool,
}

impl ScriptedSource {
    fn new(reads: Arc<AtomicUsize>, fail_from: usize, fail_count: usize) -> Self {
        Self {
            reads,
            fail_from,
            fail_count,
            opened: false,
        }
    }

    fn always_ok(reads: Arc<AtomicUsize>) -> Self {
        Self::new(reads, usize::MAX, 0)
    }
}

impl FrameSource for ScriptedSource {
    fn open(&mut self) -> bool {
        self.opened = true;
        true
    }

    fn read(&mut self) -> Result<Frame, CaptureError> {
        if !self.opened {
            return Err(CaptureError::NotOpen);
        }
        let read_index = self.reads.fetch_add(1, Ordering::SeqCst);
        if read_index >= self.fail_from && read_index < self.fail_from + self.fail_count {
            return Err(CaptureError::ReadFailed);
        }
        Ok(frame())
    }

    fn release(&mut self) {
        self.opened = false;
    }
}

/// Source whose `open` always fails.
struct UnopenableSource;

impl FrameSource for UnopenableSource {
    fn open(&mut self) -> bool {
        false
    }

    fn read(&mut self) -> Result<Frame, CaptureError> {
        Err(CaptureError::NotOpen)
    }

    fn release(&mut self) {}
}

/// Estimator reporting a present user with empty landmarks.
struct PresentEstimator;

impl PoseEstimator for PresentEstimator {
    fn detect(&mut self, _frame: &Frame) -> anyhow::Result<DetectionResult> {
        Ok(DetectionResult {
            landmarks: Some(Landmarks::default()),
            user_present: true,
            confidence: 0.9,
        })
    }
}

/// Classifier returning whatever the test currently dictates.
#[derive(Clone)]
struct SharedClassifier {
    state: Arc<Mutex<PostureState>>,
}

impl SharedClassifier {
    fn new(initial: PostureState) -> Self {
        Self {
            state: Arc::new(Mutex::new(initial)),
        }
    }

    fn set(&self, state: PostureState) {
        *self.state.lock().unwrap() = state;
    }
}

impl PostureClassifier for SharedClassifier {
    fn classify(&self, _landmarks: &Landmarks) -> PostureState {
        *self.state.lock().unwrap()
    }
}

/// Liveness sink counting signals.
#[derive(Clone, Default)]
struct CountingLiveness {
    ready: Arc<AtomicUsize>,
    beats: Arc<AtomicUsize>,
}

impl LivenessSink for CountingLiveness {
    fn ready(&mut self) {
        self.ready.fetch_add(1, Ordering::SeqCst);
    }

    fn beat(&mut self) {
        self.beats.fetch_add(1, Ordering::SeqCst);
    }
}

fn fast_config() -> MonitorConfig {
    MonitorConfig {
        fps_target: 50,
        alert_threshold: Duration::from_millis(1),
        alert_cooldown: Duration::from_millis(1),
        retry: RetryPolicy {
            quick_attempts: 2,
            quick_delay: Duration::from_millis(10),
            long_delay: Duration::from_millis(20),
        },
        heartbeat_interval: Duration::from_millis(50),
        ..MonitorConfig::default()
    }
}

fn parts(
    source: Box<dyn FrameSource>,
    classifier: Box<dyn PostureClassifier>,
    liveness: Box<dyn LivenessSink>,
) -> MonitorParts {
    MonitorParts {
        source,
        estimator: Box::new(PresentEstimator),
        classifier,
        encoder: None,
        liveness,
    }
}

fn wait_for<F: FnMut() -> bool>(mut condition: F, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn publishes_results_and_stops_cleanly() {
    let reads = Arc::new(AtomicUsize::new(0));
    let monitor = Monitor::new(
        fast_config(),
        parts(
            Box::new(ScriptedSource::always_ok(reads)),
            Box::new(SharedClassifier::new(PostureState::Good)),
            Box::new(CountingLiveness::default()),
        ),
    );
    let results = monitor.results();

    assert!(monitor.start());
    assert!(monitor.is_running());
    // start() is idempotent while running.
    assert!(monitor.start());

    let mut latest = None;
    assert!(wait_for(
        || {
            if let Some(result) = results.get_nowait() {
                latest = Some(result);
                return true;
            }
            false
        },
        Duration::from_secs(2),
    ));
    let result = latest.expect("result");
    assert_eq!(result.posture, PostureState::Good);
    assert!(result.user_present);
    assert_eq!(result.camera_state, CameraState::Connected);
    assert!(!result.alert.should_alert);

    monitor.stop();
    assert!(!monitor.is_running());
    // stop() is idempotent and start() after stop requires a fresh instance.
    monitor.stop();
    assert!(!monitor.start());
}

#[test]
fn start_returns_false_when_the_source_cannot_open() {
    let monitor = Monitor::new(
        fast_config(),
        parts(
            Box::new(UnopenableSource),
            Box::new(SharedClassifier::new(PostureState::Good)),
            Box::new(CountingLiveness::default()),
        ),
    );
    assert!(!monitor.start());
    assert!(!monitor.is_running());
    monitor.stop();
}

#[test]
fn camera_failures_walk_the_recovery_tiers_and_emit_events() {
    let reads = Arc::new(AtomicUsize::new(0));
    // Fail reads 2..=8: enough to exhaust two quick attempts and disconnect.
    let source = ScriptedSource::new(reads, 2, 7);
    let monitor = Monitor::new(
        fast_config(),
        parts(
            Box::new(source),
            Box::new(SharedClassifier::new(PostureState::Good)),
            Box::new(CountingLiveness::default()),
        ),
    );
    let events = monitor.events();
    assert!(monitor.start());

    let mut seen = Vec::new();
    assert!(wait_for(
        || {
            while let Ok(event) = events.try_recv() {
                let MonitorEvent::CameraState { from, to, .. } = event;
                seen.push((from, to));
            }
            seen.len() >= 3
        },
        Duration::from_secs(5),
    ));
    monitor.stop();

    assert_eq!(
        seen[..3],
        [
            (CameraState::Connected, CameraState::Degraded),
            (CameraState::Degraded, CameraState::Disconnected),
            (CameraState::Disconnected, CameraState::Connected),
        ]
    );
}

#[test]
fn pause_and_resume_gate_alerts_within_a_frame_period() {
    let reads = Arc::new(AtomicUsize::new(0));
    let classifier = SharedClassifier::new(PostureState::Bad);
    let monitor = Monitor::new(
        fast_config(),
        parts(
            Box::new(ScriptedSource::always_ok(reads)),
            Box::new(classifier.clone()),
            Box::new(CountingLiveness::default()),
        ),
    );
    let results = monitor.results();
    assert!(monitor.start());

    // With a millisecond threshold and cooldown the second bad frame alerts.
    assert!(wait_for(
        || results
            .get_nowait()
            .is_some_and(|result| result.alert.should_alert),
        Duration::from_secs(2),
    ));

    monitor.pause();
    assert!(!monitor.alert_status().monitoring_active);
    // Drain until paused updates flow through: no alert and zero duration.
    assert!(wait_for(
        || results.get_nowait().is_some_and(|result| {
            !result.alert.should_alert && result.alert.duration_secs == 0.0
        }),
        Duration::from_secs(2),
    ));

    monitor.resume();
    assert!(monitor.alert_status().monitoring_active);
    assert!(wait_for(
        || results
            .get_nowait()
            .is_some_and(|result| result.alert.should_alert),
        Duration::from_secs(2),
    ));

    monitor.stop();
}

#[test]
fn user_absence_yields_unknown_posture() {
    struct AbsentEstimator;
    impl PoseEstimator for AbsentEstimator {
        fn detect(&mut self, _frame: &Frame) -> anyhow::Result<DetectionResult> {
            Ok(DetectionResult::absent())
        }
    }

    let reads = Arc::new(AtomicUsize::new(0));
    let monitor = Monitor::new(
        fast_config(),
        MonitorParts {
            source: Box::new(ScriptedSource::always_ok(reads)),
            estimator: Box::new(AbsentEstimator),
            classifier: Box::new(SharedClassifier::new(PostureState::Bad)),
            encoder: None,
            liveness: Box::new(CountingLiveness::default()),
        },
    );
    let results = monitor.results();
    assert!(monitor.start());

    let mut latest = None;
    assert!(wait_for(
        || {
            if let Some(result) = results.get_nowait() {
                latest = Some(result);
                return true;
            }
            false
        },
        Duration::from_secs(2),
    ));
    monitor.stop();

    let result = latest.expect("result");
    assert_eq!(result.posture, PostureState::Unknown);
    assert!(!result.user_present);
    assert!(!result.alert.should_alert);
}

#[test]
fn estimator_errors_are_absorbed_by_the_fault_boundary() {
    struct FlakyEstimator {
        calls: usize,
    }
    impl PoseEstimator for FlakyEstimator {
        fn detect(&mut self, _frame: &Frame) -> anyhow::Result<DetectionResult> {
            self.calls += 1;
            if self.calls % 2 == 1 {
                anyhow::bail!("inference backend hiccup");
            }
            Ok(DetectionResult {
                landmarks: Some(Landmarks::default()),
                user_present: true,
                confidence: 0.8,
            })
        }
    }

    let reads = Arc::new(AtomicUsize::new(0));
    let monitor = Monitor::new(
        fast_config(),
        MonitorParts {
            source: Box::new(ScriptedSource::always_ok(reads)),
            estimator: Box::new(FlakyEstimator { calls: 0 }),
            classifier: Box::new(SharedClassifier::new(PostureState::Good)),
            encoder: None,
            liveness: Box::new(CountingLiveness::default()),
        },
    );
    let results = monitor.results();
    assert!(monitor.start());

    // Every other frame errors, yet results keep flowing.
    let mut count = 0;
    assert!(wait_for(
        || {
            if results.get_nowait().is_some() {
                count += 1;
            }
            count >= 3
        },
        Duration::from_secs(5),
    ));
    monitor.stop();
}

#[test]
fn liveness_sink_receives_ready_and_beats() {
    let reads = Arc::new(AtomicUsize::new(0));
    let liveness = CountingLiveness::default();
    let ready = liveness.ready.clone();
    let beats = liveness.beats.clone();
    let monitor = Monitor::new(
        fast_config(),
        parts(
            Box::new(ScriptedSource::always_ok(reads)),
            Box::new(SharedClassifier::new(PostureState::Good)),
            Box::new(liveness),
        ),
    );
    assert!(monitor.start());

    assert!(wait_for(
        || beats.load(Ordering::SeqCst) >= 2,
        Duration::from_secs(2),
    ));
    monitor.stop();

    assert_eq!(ready.load(Ordering::SeqCst), 1);
}
