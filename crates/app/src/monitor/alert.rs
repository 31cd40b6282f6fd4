//! Alert duration tracking with threshold and cooldown gating.
//!
//! Written by the worker thread on every frame; `pause`, `resume`, and
//! `status` may be called from any thread, so the scalar state sits behind a
//! mutex held only for the few field updates per call.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use pose_core::PostureState;
use serde::Serialize;
use tracing::{debug, info};

/// Outcome of a single tracker update.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct AlertOutcome {
    pub should_alert: bool,
    pub threshold_reached: bool,
    pub duration_secs: f64,
}

/// Read-only snapshot of the tracker configuration.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct AlertStatus {
    pub monitoring_active: bool,
    pub threshold_secs: u64,
    pub cooldown_secs: u64,
}

struct AlertState {
    paused: bool,
    tracking_start: Option<Instant>,
    last_alert: Option<Instant>,
}

/// Tracks continuous bad-posture duration and decides when to alert.
pub struct AlertTracker {
    threshold: Duration,
    cooldown: Duration,
    state: Mutex<AlertState>,
}

impl AlertTracker {
    pub fn new(threshold: Duration, cooldown: Duration) -> Self {
        Self {
            threshold,
            cooldown,
            state: Mutex::new(AlertState {
                paused: false,
                tracking_start: None,
                last_alert: None,
            }),
        }
    }

    /// Process one frame's observation using the current time.
    pub fn update(&self, posture: PostureState, user_present: bool) -> AlertOutcome {
        self.update_at(Instant::now(), posture, user_present)
    }

    /// Clock-injected update seam.
    ///
    /// Precedence: paused, then user absent / posture unknown, then bad, then
    /// good. An episode reset clears the last-alert mark as well, so a fresh
    /// episode may alert at threshold regardless of a prior episode's
    /// cooldown.
    pub fn update_at(&self, now: Instant, posture: PostureState, user_present: bool) -> AlertOutcome {
        let mut state = self.lock();

        if state.paused {
            return AlertOutcome::default();
        }

        if !user_present || posture == PostureState::Unknown {
            if state.tracking_start.take().is_some() {
                debug!("tracking reset: user absent or posture unknown");
            }
            state.last_alert = None;
            return AlertOutcome::default();
        }

        if posture == PostureState::Bad {
            let start = match state.tracking_start {
                Some(start) => start,
                None => {
                    debug!("bad posture episode started");
                    state.tracking_start = Some(now);
                    now
                }
            };
            let duration = now.duration_since(start);
            let threshold_reached = duration >= self.threshold;
            let cooldown_over = state
                .last_alert
                .map_or(true, |last| now.duration_since(last) >= self.cooldown);
            let should_alert = threshold_reached && cooldown_over;
            if should_alert {
                state.last_alert = Some(now);
                info!(
                    duration_secs = duration.as_secs_f64(),
                    "bad posture alert raised"
                );
            }
            return AlertOutcome {
                should_alert,
                threshold_reached,
                duration_secs: duration.as_secs_f64(),
            };
        }

        // Good posture: end the episode and log what was accumulated.
        if let Some(start) = state.tracking_start.take() {
            let episode = now.duration_since(start);
            info!(
                duration_secs = episode.as_secs_f64(),
                "bad posture episode ended"
            );
        }
        state.last_alert = None;
        AlertOutcome::default()
    }

    /// Stop monitoring and clear in-flight tracking immediately. No residual
    /// duration survives a pause.
    pub fn pause(&self) {
        let mut state = self.lock();
        if !state.paused {
            state.paused = true;
            state.tracking_start = None;
            state.last_alert = None;
            info!("posture monitoring paused");
        }
    }

    /// Resume monitoring; the next bad observation starts a fresh episode.
    pub fn resume(&self) {
        let mut state = self.lock();
        if state.paused {
            state.paused = false;
            info!("posture monitoring resumed");
        }
    }

    pub fn status(&self) -> AlertStatus {
        let state = self.lock();
        AlertStatus {
            monitoring_active: !state.paused,
            threshold_secs: self.threshold.as_secs(),
            cooldown_secs: self.cooldown.as_secs(),
        }
    }

    // The state is a handful of scalars; a poisoned lock cannot leave it
    // inconsistent.
    fn lock(&self) -> MutexGuard<'_, AlertState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> AlertTracker {
        AlertTracker::new(Duration::from_secs(600), Duration::from_secs(300))
    }

    fn at(base: Instant, secs: u64) -> Instant {
        base + Duration::from_secs(secs)
    }

    #[test]
    fn threshold_then_cooldown_then_realert() {
        let tracker = tracker();
        let base = Instant::now();

        let outcome = tracker.update_at(at(base, 0), PostureState::Bad, true);
        assert!(!outcome.should_alert);
        assert!(!outcome.threshold_reached);
        assert_eq!(outcome.duration_secs, 0.0);

        let outcome = tracker.update_at(at(base, 600), PostureState::Bad, true);
        assert!(outcome.should_alert);
        assert!(outcome.threshold_reached);
        assert_eq!(outcome.duration_secs, 600.0);

        // Cooldown active: threshold stays reached but no second alert.
        let outcome = tracker.update_at(at(base, 720), PostureState::Bad, true);
        assert!(!outcome.should_alert);
        assert!(outcome.threshold_reached);

        let outcome = tracker.update_at(at(base, 900), PostureState::Bad, true);
        assert!(outcome.should_alert);
    }

    #[test]
    fn good_resets_duration_and_pending_episode() {
        let tracker = tracker();
        let base = Instant::now();
        tracker.update_at(at(base, 0), PostureState::Bad, true);
        tracker.update_at(at(base, 600), PostureState::Bad, true);

        let outcome = tracker.update_at(at(base, 650), PostureState::Good, true);
        assert!(!outcome.should_alert);
        assert_eq!(outcome.duration_secs, 0.0);

        // Fresh episode counts from zero and may alert at threshold even
        // though the previous alert fired less than a cooldown ago.
        let outcome = tracker.update_at(at(base, 700), PostureState::Bad, true);
        assert_eq!(outcome.duration_secs, 0.0);
        let outcome = tracker.update_at(at(base, 1300), PostureState::Bad, true);
        assert!(outcome.should_alert);
    }

    #[test]
    fn user_absence_resets_like_good_even_mid_cooldown() {
        let tracker = tracker();
        let base = Instant::now();
        tracker.update_at(at(base, 0), PostureState::Bad, true);
        tracker.update_at(at(base, 600), PostureState::Bad, true);

        let outcome = tracker.update_at(at(base, 650), PostureState::Bad, false);
        assert!(!outcome.should_alert);
        assert_eq!(outcome.duration_secs, 0.0);

        let outcome = tracker.update_at(at(base, 700), PostureState::Bad, true);
        assert_eq!(outcome.duration_secs, 0.0);
    }

    #[test]
    fn unknown_posture_resets_tracking() {
        let tracker = tracker();
        let base = Instant::now();
        tracker.update_at(at(base, 0), PostureState::Bad, true);
        tracker.update_at(at(base, 100), PostureState::Unknown, true);
        let outcome = tracker.update_at(at(base, 200), PostureState::Bad, true);
        assert_eq!(outcome.duration_secs, 0.0);
    }

    #[test]
    fn pause_clears_tracking_and_suppresses_updates() {
        let tracker = tracker();
        let base = Instant::now();
        tracker.update_at(at(base, 0), PostureState::Bad, true);
        assert!(tracker.status().monitoring_active);

        tracker.pause();
        assert!(!tracker.status().monitoring_active);

        let outcome = tracker.update_at(at(base, 700), PostureState::Bad, true);
        assert!(!outcome.should_alert);
        assert_eq!(outcome.duration_secs, 0.0);
    }

    #[test]
    fn resume_starts_a_wholly_fresh_episode() {
        let tracker = tracker();
        let base = Instant::now();
        tracker.update_at(at(base, 0), PostureState::Bad, true);
        tracker.update_at(at(base, 500), PostureState::Bad, true);
        tracker.pause();
        tracker.resume();
        assert!(tracker.status().monitoring_active);

        // Pre-pause elapsed time is never reused.
        let outcome = tracker.update_at(at(base, 550), PostureState::Bad, true);
        assert_eq!(outcome.duration_secs, 0.0);
        let outcome = tracker.update_at(at(base, 1150), PostureState::Bad, true);
        assert!(outcome.should_alert);
        assert_eq!(outcome.duration_secs, 600.0);
    }

    #[test]
    fn status_reports_configuration() {
        let status = tracker().status();
        assert!(status.monitoring_active);
        assert_eq!(status.threshold_secs, 600);
        assert_eq!(status.cooldown_secs, 300);
    }
}
