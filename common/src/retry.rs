use std::future::Future;
use std::time::Duration;

use crate::runtime::Scheduler;

/// Fixed-delay retry schedule shared by the route fetcher and the
/// connection probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
}

#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt failed with a retryable error; `last` is the final one.
    Exhausted { attempts: usize, last: E },
    /// An attempt failed with an error the predicate refused to retry.
    Aborted(E),
}

impl RetryPolicy {
    pub const fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Runs `op` (called with the 1-based attempt number) until it succeeds,
    /// fails with a non-retryable error, or the attempts run out. The delay
    /// is only taken between attempts, never after the last one.
    pub async fn run<F, Fut, T, E, P, L>(
        &self,
        scheduler: &dyn Scheduler,
        mut op: F,
        retryable: P,
        mut on_retry: L,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        L: FnMut(usize, &E),
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(v) => return Ok(v),
                Err(e) if !retryable(&e) => return Err(RetryError::Aborted(e)),
                Err(e) if attempt >= attempts => {
                    return Err(RetryError::Exhausted { attempts, last: e })
                }
                Err(e) => {
                    on_retry(attempt, &e);
                    scheduler.sleep(self.delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
