//! Bounded retry with cancellable backoff

use crate::backoff::Backoff;
use crate::context::Context;
use std::fmt::Display;
use std::future::Future;
use tracing::debug;

/// Why a retry sequence ended without success
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every allowed attempt failed; only the final error is kept
    Exhausted { attempts: u32, last: E },
    /// The context finished before or between attempts
    Cancelled { attempts: u32, last: Option<E> },
}

impl<E> RetryError<E> {
    /// Number of attempts actually made
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } | RetryError::Cancelled { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Run `op` up to `retries + 1` times.
///
/// Before attempt `i + 1` the helper waits `backoff.delay(i + 1)`. The context
/// is checked before every attempt and raced against every wait.
pub async fn retry<T, E, F, Fut>(
    ctx: &Context,
    retries: u32,
    backoff: &dyn Backoff,
    mut op: F,
) -> std::result::Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Display,
{
    let mut last = None;
    let mut attempt: u32 = 0;

    loop {
        if ctx.is_done() {
            return Err(RetryError::Cancelled {
                attempts: attempt,
                last,
            });
        }

        let err = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if attempt >= retries {
            return Err(RetryError::Exhausted {
                attempts: attempt + 1,
                last: err,
            });
        }

        attempt += 1;
        let delay = backoff.delay(attempt);
        debug!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "Attempt failed, backing off");
        last = Some(err);

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = ctx.done() => {
                return Err(RetryError::Cancelled { attempts: attempt, last });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::ConstantBackoff;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_failures() {
        let calls = AtomicU32::new(0);
        let result = retry(&Context::new(), 3, &ConstantBackoff(Duration::from_secs(1)), |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(format!("failure {}", n))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_keeps_last_error() {
        let result: Result<(), _> =
            retry(&Context::new(), 2, &ConstantBackoff(Duration::from_secs(1)), |i| async move {
                Err(format!("failure {}", i))
            })
            .await;

        match result {
            Err(RetryError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last, "failure 2");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_tries_once() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> =
            retry(&Context::new(), 0, &ConstantBackoff(Duration::from_secs(1)), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("nope") }
            })
            .await;

        assert_eq!(result.unwrap_err().attempts(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let ctx = Context::new();
        ctx.cancel();
        let calls = AtomicU32::new(0);
        let result: Result<(), RetryError<String>> =
            retry(&ctx, 5, &ConstantBackoff(Duration::from_secs(1)), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;

        assert!(matches!(
            result,
            Err(RetryError::Cancelled { attempts: 0, last: None })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_during_backoff() {
        let ctx = Context::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            canceller.cancel();
        });

        let calls = AtomicU32::new(0);
        let result: Result<(), _> =
            retry(&ctx, 10, &ConstantBackoff(Duration::from_secs(60)), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("down".to_string()) }
            })
            .await;

        match result {
            Err(RetryError::Cancelled { attempts, last }) => {
                assert_eq!(attempts, 1);
                assert_eq!(last.as_deref(), Some("down"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_stops_sequence() {
        let ctx = Context::new().with_timeout(Duration::from_secs(3));
        let result: Result<(), _> =
            retry(&ctx, 10, &ConstantBackoff(Duration::from_secs(2)), |_| async {
                Err("down")
            })
            .await;

        assert!(matches!(result, Err(RetryError::Cancelled { attempts: 2, .. })));
    }
}
