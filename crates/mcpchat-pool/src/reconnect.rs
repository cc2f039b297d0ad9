//! Reconnection strategy: exponential backoff with jitter and a give-up rule

use std::time::Duration;

use mcpchat_core::{ConnectionSettings, MaxAttempts};
use rand::Rng;

/// Outcome of asking the strategy what to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectDecision {
    pub delay: Duration,
    pub give_up: bool,
}

/// Pure decision object: no I/O, no state between calls
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectionStrategy {
    base_delay: Duration,
    max_delay: Duration,
    /// Fraction of the delay applied as ± jitter, in `[0.0, 1.0)`
    jitter: f64,
    max_attempts: MaxAttempts,
}

impl ReconnectionStrategy {
    pub fn new(base_delay: Duration, max_delay: Duration, max_attempts: MaxAttempts) -> Self {
        Self {
            base_delay,
            max_delay: max_delay.max(base_delay),
            jitter: mcpchat_core::domain::config::DEFAULT_RECONNECT_JITTER,
            max_attempts,
        }
    }

    pub fn from_settings(settings: &ConnectionSettings) -> Self {
        Self::new(
            settings.reconnect_base_delay,
            settings.reconnect_max_delay,
            settings.max_reconnect_attempts,
        )
        .with_jitter(settings.reconnect_jitter)
    }

    /// Set jitter ratio (builder pattern)
    pub fn with_jitter(mut self, ratio: f64) -> Self {
        self.jitter = ratio.clamp(0.0, 0.99);
        self
    }

    pub fn max_attempts(&self) -> MaxAttempts {
        self.max_attempts
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Un-jittered delay for a 1-based attempt: `min(base * 2^(attempt-1), max)`
    pub fn backoff(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        // cap the exponent so the multiplication cannot overflow
        let exponent = (attempt - 1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Whether `attempt` failed attempts exhaust the budget
    pub fn should_give_up(&self, attempt: u32) -> bool {
        self.max_attempts.exceeded_by(attempt)
    }

    /// Decide with an explicit jitter sample in `[-1.0, 1.0]`
    ///
    /// The jittered delay never exceeds `max_delay`.
    pub fn decide_with(&self, attempt: u32, sample: f64) -> ReconnectDecision {
        let give_up = self.should_give_up(attempt);
        let backoff = self.backoff(attempt);
        let factor = 1.0 + self.jitter * sample.clamp(-1.0, 1.0);
        let millis = (backoff.as_millis() as f64 * factor).max(0.0).round() as u64;
        let delay = Duration::from_millis(millis).min(self.max_delay);
        ReconnectDecision { delay, give_up }
    }

    /// Decide with a random jitter sample
    pub fn next(&self, attempt: u32) -> ReconnectDecision {
        let sample = if self.jitter > 0.0 {
            rand::thread_rng().gen_range(-1.0..=1.0)
        } else {
            0.0
        };
        self.decide_with(attempt, sample)
    }
}
