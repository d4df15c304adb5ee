use std::time::Duration;

/// How the delay before each reconnect attempt is computed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BackoffStrategy {
    /// `base * 2^attempt`
    #[default]
    Exponential,
    /// Always `base`
    Fixed,
    /// Fixed delay for the listed close codes (e.g. a server restart), exponential otherwise
    CloseCodeAware { fixed_codes: Vec<u16> },
}

/// `base * 2^attempt`, saturating
pub fn exponential_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// Timer for reconnection logic with configurable backoff
#[derive(Debug, Clone)]
pub struct ReconnectTimer {
    attempts: u32,
    base: Duration,
    strategy: BackoffStrategy,
}

impl ReconnectTimer {
    pub fn new(base: Duration, strategy: BackoffStrategy) -> Self {
        Self {
            attempts: 0,
            base,
            strategy,
        }
    }

    /// Delay before the reconnect that follows `attempt` previous attempts
    pub fn delay_for(&self, attempt: u32, close_code: Option<u16>) -> Duration {
        match &self.strategy {
            BackoffStrategy::Exponential => exponential_delay(self.base, attempt),
            BackoffStrategy::Fixed => self.base,
            BackoffStrategy::CloseCodeAware { fixed_codes } => match close_code {
                Some(code) if fixed_codes.contains(&code) => self.base,
                _ => exponential_delay(self.base, attempt),
            },
        }
    }

    /// Get the next delay duration and count the attempt
    pub fn next_delay(&mut self, close_code: Option<u16>) -> Duration {
        let delay = self.delay_for(self.attempts, close_code);
        self.attempts += 1;
        delay
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Reset the timer
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

impl Default for ReconnectTimer {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(crate::types::DEFAULT_RECONNECT_DELAY),
            BackoffStrategy::Exponential,
        )
    }
}
