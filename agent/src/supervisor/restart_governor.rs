//! Pure restart-governor decision logic (§4.8, P8): at most `max_attempts` restarts per
//! product per process lifetime, `cooldown` between attempts, reset on a healthy tick.
//! Kept separate from [`super::Supervisor`] so the decision table is testable without a
//! `ServiceController`.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartOutcome {
    /// The service is active (and, if a health probe is configured, healthy).
    Healthy,
    /// A restart was attempted.
    Restarted,
    /// The restart attempt itself failed (controller error).
    RestartFailed,
    /// Unhealthy, but within the cooldown window since the last attempt.
    Cooldown,
    /// Unhealthy, but `max_attempts` has already been reached.
    AttemptsExhausted,
    /// The controller could not report a status at all.
    StatusUnknown,
}

#[derive(Debug, Clone, Default)]
pub struct RestartState {
    pub attempts: u32,
    pub last_attempt: Option<Instant>,
}

/// A restart governor decision, without performing any I/O. Returns `None` when the
/// caller should attempt a restart; `Some(outcome)` when it should not, along with why.
pub fn decide(state: &RestartState, healthy: bool, max_attempts: u32, cooldown: Duration) -> Option<RestartOutcome> {
    if healthy {
        return Some(RestartOutcome::Healthy);
    }
    if state.attempts >= max_attempts {
        return Some(RestartOutcome::AttemptsExhausted);
    }
    if let Some(last) = state.last_attempt {
        if last.elapsed() < cooldown {
            return Some(RestartOutcome::Cooldown);
        }
    }
    None
}

#[derive(Debug)]
pub struct RestartGovernor {
    pub max_attempts: u32,
    pub cooldown: Duration,
}

impl RestartGovernor {
    pub fn new(max_attempts: u32, cooldown: Duration) -> Self {
        Self { max_attempts, cooldown }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_healthy_always_resets_regardless_of_attempts() {
        let state = RestartState { attempts: 4, last_attempt: Some(Instant::now()) };
        assert_eq!(decide(&state, true, 5, Duration::from_secs(30)), Some(RestartOutcome::Healthy));
    }

    #[test]
    fn test_unhealthy_under_cap_and_past_cooldown_allows_restart() {
        let state = RestartState::default();
        assert_eq!(decide(&state, false, 5, Duration::from_secs(30)), None);
    }

    #[test]
    fn test_unhealthy_at_cap_is_exhausted() {
        let state = RestartState { attempts: 5, last_attempt: None };
        assert_eq!(decide(&state, false, 5, Duration::from_secs(30)), Some(RestartOutcome::AttemptsExhausted));
    }

    #[test]
    fn test_unhealthy_within_cooldown_is_blocked() {
        let state = RestartState { attempts: 1, last_attempt: Some(Instant::now()) };
        assert_eq!(decide(&state, false, 5, Duration::from_secs(30)), Some(RestartOutcome::Cooldown));
    }
}
