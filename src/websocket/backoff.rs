//! Reconnect delay policy.
//!
//! Delays grow as `base * 2^attempts` up to a ceiling. Once the attempt
//! budget is spent, further requests are refused until a cooldown window
//! has passed, after which the budget starts over.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::Result;
use crate::error::GalleyError;

/// Delay before the first reconnect attempt.
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Longest delay between two attempts.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Attempts allowed before cooling down.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Pause after the attempt budget is spent.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

/// Tunables for [`Backoff`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub ceiling: Duration,
    pub max_attempts: u32,
    pub cooldown: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: INITIAL_BACKOFF,
            ceiling: MAX_BACKOFF,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}

/// Reconnect attempt counter with cooldown.
#[derive(Debug)]
pub struct Backoff {
    policy: BackoffPolicy,
    attempts: u32,
    cooldown_until: Option<Instant>,
}

impl Backoff {
    #[must_use]
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
            cooldown_until: None,
        }
    }

    /// Attempts scheduled since the last reset.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Forgets all failures. Called after a successful connect and on a
    /// manual reconnect.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.cooldown_until = None;
    }

    /// Time left in the current cooldown window, if one is running.
    #[must_use]
    pub fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        self.cooldown_until
            .filter(|until| *until > now)
            .map(|until| until - now)
    }

    /// Delay to wait before the next attempt.
    ///
    /// # Errors
    ///
    /// Returns [`GalleyError::ReconnectCooldown`] once the attempt budget
    /// is spent and for every request until the cooldown has elapsed.
    pub fn next_delay(&mut self, now: Instant) -> Result<Duration> {
        if let Some(until) = self.cooldown_until {
            if now < until {
                return Err(cooldown_error(until - now));
            }
            info!("Reconnect cooldown elapsed");
            self.reset();
        }

        if self.attempts >= self.policy.max_attempts {
            self.cooldown_until = Some(now + self.policy.cooldown);
            warn!(
                attempts = self.attempts,
                cooldown_secs = self.policy.cooldown.as_secs(),
                "Reconnect attempts exhausted, cooling down"
            );
            return Err(cooldown_error(self.policy.cooldown));
        }

        let factor = 2u32.checked_pow(self.attempts).unwrap_or(u32::MAX);
        let delay = self
            .policy
            .base
            .checked_mul(factor)
            .unwrap_or(self.policy.ceiling)
            .min(self.policy.ceiling);
        self.attempts += 1;
        Ok(delay)
    }
}

fn cooldown_error(remaining: Duration) -> GalleyError {
    let remaining_secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
    GalleyError::ReconnectCooldown { remaining_secs }
}
