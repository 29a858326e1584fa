use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::Result;

// One reusable resilience policy wrapping the extraction call: bounded
// sequential attempts with exponential backoff and jitter. The sleep
// suspends only the calling task, so concurrent requests keep flowing.
pub struct RetryPolicy {
  max_attempts: u32,
  base: f64,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self::new(3, 2.0)
  }
}

impl RetryPolicy {
  pub fn new(max_attempts: u32, base: f64) -> Self {
    assert!(max_attempts >= 1, "at least one attempt is required");
    Self { max_attempts, base }
  }

  pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    let mut attempt = 0;
    loop {
      match op().await {
        Ok(value) => return Ok(value),
        Err(e) if e.retryable() && attempt + 1 < self.max_attempts => {
          let delay = self.backoff(attempt);
          warn!(
            "attempt {}/{} failed ({e}), retrying in {:.1}s",
            attempt + 1,
            self.max_attempts,
            delay.as_secs_f64()
          );
          tokio::time::sleep(delay).await;
          attempt += 1;
        }
        Err(e) => return Err(e),
      }
    }
  }

  // base^attempt seconds plus uniform jitter in [0, 1), so concurrent
  // retriers against the same flaky endpoint desynchronize
  fn backoff(&self, attempt: u32) -> Duration {
    let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
    Duration::from_secs_f64(self.base.powi(attempt as i32) + jitter)
  }
}
