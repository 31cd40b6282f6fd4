//! Camera connection state machine.
//!
//! Pure decision logic: the worker loop reports read outcomes and receives a
//! directive telling it how long to back off and whether to attempt a device
//! reopen. Time is passed in so tier exhaustion is testable without sleeping.

use std::time::{Duration, Instant};

use serde::Serialize;

/// Connection health reported alongside every pipeline result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraState {
    Connected,
    /// Inside the bounded quick-retry sequence.
    Degraded,
    /// Quick retries exhausted; reopening at the long cadence.
    Disconnected,
}

impl CameraState {
    pub fn label(self) -> &'static str {
        match self {
            CameraState::Connected => "connected",
            CameraState::Degraded => "degraded",
            CameraState::Disconnected => "disconnected",
        }
    }
}

/// Retry cadence for the two recovery tiers.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Quick retries attempted before declaring the camera disconnected.
    pub quick_attempts: u32,
    /// Delay between quick retries.
    pub quick_delay: Duration,
    /// Cadence of the unbounded long-retry tier.
    pub long_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            quick_attempts: 3,
            quick_delay: Duration::from_secs(1),
            long_delay: Duration::from_secs(10),
        }
    }
}

/// State transition surfaced to the presentation layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CameraTransition {
    pub from: CameraState,
    pub to: CameraState,
}

/// What the worker loop should do after a failed read.
#[derive(Clone, Copy, Debug)]
pub struct RetryDirective {
    pub transition: Option<CameraTransition>,
    pub delay: Duration,
    pub reopen: bool,
}

/// Tracks connection health and drives the tiered retry schedule.
///
/// Mutated only by the worker thread. Retries never give up: once
/// disconnected, reopen attempts continue at `long_delay` until a read
/// succeeds or the pipeline stops.
pub struct CameraSupervisor {
    state: CameraState,
    policy: RetryPolicy,
    consecutive_failures: u32,
    last_success: Option<Instant>,
}

impl CameraSupervisor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            state: CameraState::Connected,
            policy,
            consecutive_failures: 0,
            last_success: None,
        }
    }

    pub fn state(&self) -> CameraState {
        self.state
    }

    pub fn last_success(&self) -> Option<Instant> {
        self.last_success
    }

    /// Record a successful read. Returns the recovery transition when the
    /// camera was not already connected.
    pub fn on_success(&mut self, now: Instant) -> Option<CameraTransition> {
        self.last_success = Some(now);
        self.consecutive_failures = 0;
        if self.state == CameraState::Connected {
            return None;
        }
        let transition = CameraTransition {
            from: self.state,
            to: CameraState::Connected,
        };
        self.state = CameraState::Connected;
        Some(transition)
    }

    /// Record a failed read and decide the next recovery step.
    ///
    /// The failure that leaves `Connected` counts as the first quick attempt;
    /// the tier switches to `Disconnected` once the quick attempts are spent.
    pub fn on_failure(&mut self, _now: Instant) -> RetryDirective {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        match self.state {
            CameraState::Connected => {
                self.state = CameraState::Degraded;
                RetryDirective {
                    transition: Some(CameraTransition {
                        from: CameraState::Connected,
                        to: CameraState::Degraded,
                    }),
                    delay: self.policy.quick_delay,
                    reopen: false,
                }
            }
            CameraState::Degraded => {
                if self.consecutive_failures > self.policy.quick_attempts {
                    self.state = CameraState::Disconnected;
                    RetryDirective {
                        transition: Some(CameraTransition {
                            from: CameraState::Degraded,
                            to: CameraState::Disconnected,
                        }),
                        delay: self.policy.long_delay,
                        reopen: true,
                    }
                } else {
                    RetryDirective {
                        transition: None,
                        delay: self.policy.quick_delay,
                        reopen: false,
                    }
                }
            }
            CameraState::Disconnected => RetryDirective {
                transition: None,
                delay: self.policy.long_delay,
                reopen: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            quick_attempts: 3,
            quick_delay: Duration::from_secs(1),
            long_delay: Duration::from_secs(10),
        }
    }

    #[test]
    fn short_failure_run_stays_degraded() {
        let mut supervisor = CameraSupervisor::new(policy());
        let now = Instant::now();
        for _ in 0..3 {
            supervisor.on_failure(now);
            assert_ne!(supervisor.state(), CameraState::Disconnected);
        }
        assert_eq!(supervisor.state(), CameraState::Degraded);
    }

    #[test]
    fn exhausted_quick_retries_disconnect_and_keep_retrying() {
        let mut supervisor = CameraSupervisor::new(policy());
        let now = Instant::now();
        for _ in 0..3 {
            supervisor.on_failure(now);
        }
        let directive = supervisor.on_failure(now);
        assert_eq!(supervisor.state(), CameraState::Disconnected);
        assert_eq!(
            directive.transition,
            Some(CameraTransition {
                from: CameraState::Degraded,
                to: CameraState::Disconnected,
            })
        );
        assert!(directive.reopen);
        assert_eq!(directive.delay, Duration::from_secs(10));

        // The long tier never gives up.
        for _ in 0..100 {
            let directive = supervisor.on_failure(now);
            assert_eq!(supervisor.state(), CameraState::Disconnected);
            assert!(directive.reopen);
            assert_eq!(directive.delay, Duration::from_secs(10));
            assert!(directive.transition.is_none());
        }
    }

    #[test]
    fn first_failure_reports_degraded_transition_with_quick_delay() {
        let mut supervisor = CameraSupervisor::new(policy());
        let directive = supervisor.on_failure(Instant::now());
        assert_eq!(
            directive.transition,
            Some(CameraTransition {
                from: CameraState::Connected,
                to: CameraState::Degraded,
            })
        );
        assert!(!directive.reopen);
        assert_eq!(directive.delay, Duration::from_secs(1));
    }

    #[test]
    fn success_recovers_from_any_state() {
        let mut supervisor = CameraSupervisor::new(policy());
        let now = Instant::now();
        for _ in 0..10 {
            supervisor.on_failure(now);
        }
        assert_eq!(supervisor.state(), CameraState::Disconnected);
        let transition = supervisor.on_success(now).expect("transition");
        assert_eq!(transition.to, CameraState::Connected);
        assert_eq!(supervisor.state(), CameraState::Connected);
        assert_eq!(supervisor.last_success(), Some(now));

        // Already connected: no transition to report.
        assert!(supervisor.on_success(now).is_none());
    }

    #[test]
    fn success_resets_the_quick_attempt_counter() {
        let mut supervisor = CameraSupervisor::new(policy());
        let now = Instant::now();
        supervisor.on_failure(now);
        supervisor.on_failure(now);
        supervisor.on_success(now);
        for _ in 0..3 {
            supervisor.on_failure(now);
            assert_ne!(supervisor.state(), CameraState::Disconnected);
        }
    }
}
