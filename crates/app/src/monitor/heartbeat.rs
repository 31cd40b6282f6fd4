//! Worker pulse and supervisor liveness signalling.
//!
//! The worker beats [`WorkerPulse`] every loop slice; a dedicated timer
//! thread forwards a liveness signal to the host supervisor only while the
//! pulse is fresh. A loop hung inside a blocking read therefore silences the
//! signal and the supervisor's own timeout takes over.

use std::{
    fs,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use tracing::{debug, warn};

use crate::monitor::telemetry;

/// Grace period at startup before a silent worker counts as stale.
const PULSE_STARTUP_GRACE_MS: u64 = 5_000;
/// A pulse older than this withholds the outgoing liveness signal.
const PULSE_STALE_THRESHOLD_MS: u64 = 3_000;
/// Slice used to keep the heartbeat thread responsive to shutdown.
const HEARTBEAT_SLEEP_SLICE: Duration = Duration::from_millis(250);

/// Last-beat timestamp shared between the worker and the heartbeat thread.
pub struct WorkerPulse {
    last_beat: AtomicU64,
}

impl WorkerPulse {
    pub fn new() -> Self {
        let grace_deadline = current_millis().saturating_add(PULSE_STARTUP_GRACE_MS);
        Self {
            last_beat: AtomicU64::new(grace_deadline),
        }
    }

    pub fn beat(&self) {
        self.last_beat.store(current_millis(), Ordering::Relaxed);
    }

    pub fn is_fresh(&self, now: u64) -> bool {
        now.saturating_sub(self.last_beat.load(Ordering::Relaxed)) <= PULSE_STALE_THRESHOLD_MS
    }
}

impl Default for WorkerPulse {
    fn default() -> Self {
        Self::new()
    }
}

/// Destination for liveness signals understood by the host supervisor.
pub trait LivenessSink: Send {
    /// One-time startup readiness notification.
    fn ready(&mut self);
    /// Periodic proof-of-life.
    fn beat(&mut self);
}

/// Writes a freshness file the supervisor can watch. Write failures are
/// logged, never propagated: a broken liveness path must not stop monitoring.
pub struct FileLiveness {
    path: PathBuf,
}

impl FileLiveness {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn write(&self, tag: &str) {
        let payload = format!("{tag} {}\n", current_millis());
        if let Err(err) = fs::write(&self.path, payload) {
            warn!("failed to write liveness file {}: {err}", self.path.display());
        }
    }
}

impl LivenessSink for FileLiveness {
    fn ready(&mut self) {
        self.write("ready");
    }

    fn beat(&mut self) {
        self.write("alive");
    }
}

/// Default sink when no liveness path is configured.
pub struct LogLiveness;

impl LivenessSink for LogLiveness {
    fn ready(&mut self) {
        debug!("liveness: ready");
    }

    fn beat(&mut self) {
        debug!("liveness: beat");
    }
}

/// Spawn the heartbeat thread. The cadence must be shorter than half the
/// supervisor's failure-declaration window; picking it is the embedder's
/// responsibility (see `MonitorConfig::heartbeat_interval`).
pub(crate) fn spawn_heartbeat(
    pulse: Arc<WorkerPulse>,
    mut sink: Box<dyn LivenessSink>,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    telemetry::spawn_thread("monitor-heartbeat", move || {
        sink.ready();
        'outer: loop {
            let mut remaining = interval;
            while remaining > Duration::ZERO {
                if shutdown.load(Ordering::Relaxed) {
                    break 'outer;
                }
                let slice = remaining.min(HEARTBEAT_SLEEP_SLICE);
                thread::sleep(slice);
                remaining = remaining.saturating_sub(slice);
            }
            if pulse.is_fresh(current_millis()) {
                sink.beat();
            } else {
                warn!("worker pulse stale; withholding liveness signal");
            }
        }
    })
    .expect("failed to spawn heartbeat thread")
}

pub(crate) fn current_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
