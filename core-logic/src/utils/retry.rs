use anyhow::{anyhow, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Capped retry with a flat base delay plus random jitter.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    /// Upper bound (exclusive) of the random extra delay
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 500,
            jitter_ms: 100,
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            jitter_ms: 0,
        }
    }

    pub fn with_jitter(mut self, jitter_ms: u64) -> Self {
        self.jitter_ms = jitter_ms;
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter_ms = 0;
        self
    }

    pub fn calculate_delay(&self) -> Duration {
        let extra = if self.jitter_ms > 0 {
            rand::thread_rng().gen_range(0..self.jitter_ms)
        } else {
            0
        };
        Duration::from_millis(self.base_delay_ms + extra)
    }
}

/// What happened on a failed attempt, reported through the `on_event` hook.
#[derive(Debug)]
pub enum RetryEvent<'a> {
    /// About to wait before attempt `attempt` (1-based)
    Retrying { attempt: u32 },
    /// Attempt `attempt` (1-based) failed
    Failed { attempt: u32, error: &'a anyhow::Error },
    Cancelled,
}

/// Runs `operation` up to `max_attempts` times.
///
/// Every attempt after the first is preceded by `calculate_delay()`, cut
/// short if `cancel` fires. Each failure is passed to `on_event` before the
/// next attempt; the last error is returned when all attempts fail.
pub async fn with_retry<T, F, Fut, E>(
    config: RetryConfig,
    operation_name: &str,
    cancel: &CancellationToken,
    mut operation: F,
    mut on_event: E,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    E: FnMut(RetryEvent<'_>),
{
    let mut last_error = None;

    for attempt in 0..config.max_attempts {
        if attempt > 0 {
            on_event(RetryEvent::Retrying { attempt: attempt + 1 });
            let delay = config.calculate_delay();
            tokio::select! {
                _ = cancel.cancelled() => {
                    on_event(RetryEvent::Cancelled);
                    return Err(anyhow!("{} cancelled", operation_name));
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!("{} succeeded on attempt {}", operation_name, attempt + 1);
                }
                return Ok(result);
            }
            Err(e) => {
                debug!(
                    "{} failed (attempt {}/{}): {}",
                    operation_name,
                    attempt + 1,
                    config.max_attempts,
                    e
                );
                on_event(RetryEvent::Failed {
                    attempt: attempt + 1,
                    error: &e,
                });
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow!("{} was never attempted", operation_name)))
}
