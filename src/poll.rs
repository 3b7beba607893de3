use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Backoff schedule for polling a long-running remote job
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay after the first pending response
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Multiplier applied after each pending response
    pub backoff_multiplier: f64,
}

/// Outcome of a single status check
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus<T> {
    Ready(T),
    /// Still running; `hint` is the remote side's own estimate, if it gave one
    Pending { hint: Option<Duration> },
}

impl PollConfig {
    pub fn new(initial_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Preset: DeepL document status checks
    /// Delays: 1s, 1.5s, 2.25s, ... capped at 5s
    pub fn document_status() -> Self {
        Self::new(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_backoff_multiplier(1.5)
    }

    /// Delay after the given pending response (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let delay_ms = self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);

        let delay = Duration::from_millis(delay_ms as u64);
        delay.min(self.max_delay)
    }

    /// Delay to use when the remote side supplied an estimate
    fn delay_for_hint(&self, hint: Duration) -> Duration {
        hint.clamp(self.initial_delay, self.max_delay.max(self.initial_delay))
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::document_status()
    }
}

/// Call `check` until it reports `Ready` or fails
///
/// There is no attempt limit. Callers bound the total time with
/// `tokio::time::timeout`.
pub async fn poll_until<T, E, F, Fut>(
    config: &PollConfig,
    operation_name: &str,
    mut check: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollStatus<T>, E>>,
{
    let mut attempt: u32 = 0;

    loop {
        match check().await? {
            PollStatus::Ready(value) => {
                if attempt > 0 {
                    debug!("{}: Ready after {} checks", operation_name, attempt + 1);
                }
                return Ok(value);
            }
            PollStatus::Pending { hint } => {
                let delay = match hint {
                    Some(hint) => config.delay_for_hint(hint),
                    None => config.delay_for_attempt(attempt),
                };
                debug!(
                    "{}: Still pending (check {}), next check in {:?}",
                    operation_name,
                    attempt + 1,
                    delay
                );
                sleep(delay).await;
                attempt = attempt.saturating_add(1);
            }
        }
    }
}
