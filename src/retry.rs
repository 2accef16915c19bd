//! Retry policy and timeout tiers for provider calls

use std::time::Duration;
use log::debug;

/// Retry policy for transient failures
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy
{   pub max_retries: usize
  , pub backoff_step: Duration
}

impl RetryPolicy
{   /// Create a new retry policy
    pub fn new(
      max_retries: usize
    , backoff_step_ms: u64
    ) -> Self
    {   RetryPolicy
        {   max_retries
          , backoff_step: Duration::from_millis(backoff_step_ms)
        }
    }

    /// Total attempts including the first
    pub fn total_attempts(&self) -> usize
    {   self.max_retries + 1
    }

    /// Linear backoff after a connection failure or read timeout;
    /// `attempt` is 1-based
    pub fn backoff_for_attempt(
      &self
    , attempt: usize
    ) -> Duration
    {   debug!("Calculating backoff for attempt {}", attempt);
        self.backoff_step * attempt as u32
    }

    /// Fixed delay after a 5xx response
    pub fn server_error_delay(&self) -> Duration
    {   self.backoff_step
    }

    /// Same policy with a different retry budget
    pub fn with_max_retries(&self, max_retries: usize) -> Self
    {   RetryPolicy
        {   max_retries
          , backoff_step: self.backoff_step
        }
    }
}

impl Default for RetryPolicy
{   fn default() -> Self
    {   RetryPolicy::new(2, 5_000)
    }
}

impl From<&crate::config::RetryConfig> for RetryPolicy
{   fn from(cfg: &crate::config::RetryConfig) -> Self
    {   RetryPolicy::new(cfg.max_retries, cfg.backoff_step_ms)
    }
}

/// Read-timeout tier picked by the caller per expected latency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutTier
{   Fast
  , Slow
  , Heavy
}

/// Connect + read budget for one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallTimeout
{   pub connect: Duration
  , pub read: Duration
}

impl TimeoutTier
{   pub fn resolve(
      self
    , cfg: &crate::config::TimeoutConfig
    ) -> CallTimeout
    {   let read = match self
        {   TimeoutTier::Fast => cfg.fast_ms
          , TimeoutTier::Slow => cfg.slow_ms
          , TimeoutTier::Heavy => cfg.heavy_ms
        };
        CallTimeout
        {   connect: Duration::from_millis(cfg.connect_ms)
          , read: Duration::from_millis(read)
        }
    }
}
