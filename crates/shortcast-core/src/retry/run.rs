//! Retry loop: run a closure until success or policy says stop.

use std::fmt::Display;
use std::time::Duration;

use super::policy::{RetryDecision, RetryPolicy, Retryable};

/// Runs `f` until it succeeds or the retry policy says to stop, calling
/// `sleep` with the backoff delay between attempts.
///
/// `f` receives the 1-based attempt number. The last error is returned when
/// the policy gives up.
pub fn run_with_retry_and_sleep<T, E, F, S>(
    policy: &RetryPolicy,
    mut sleep: S,
    mut f: F,
) -> Result<T, E>
where
    E: Retryable + Display,
    F: FnMut(u32) -> Result<T, E>,
    S: FnMut(Duration),
{
    let mut attempt = 1u32;
    loop {
        match f(attempt) {
            Ok(v) => return Ok(v),
            Err(e) => match policy.decide(attempt, e.error_kind()) {
                RetryDecision::NoRetry => {
                    if attempt > 1 {
                        tracing::warn!(attempt, "giving up: {}", e);
                    }
                    return Err(e);
                }
                RetryDecision::RetryAfter(d) => {
                    tracing::warn!(
                        attempt,
                        delay_ms = d.as_millis() as u64,
                        "retrying after transient failure: {}",
                        e
                    );
                    sleep(d);
                    attempt += 1;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::ErrorKind;
    use std::fmt;

    #[derive(Debug)]
    struct Flaky(ErrorKind);

    impl fmt::Display for Flaky {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "flaky {:?}", self.0)
        }
    }

    impl Retryable for Flaky {
        fn error_kind(&self) -> ErrorKind {
            self.0
        }
    }

    #[test]
    fn two_transient_failures_then_success_sleeps_two_then_four() {
        let policy = RetryPolicy::default();
        let mut slept = Vec::new();
        let mut calls = 0;
        let out = run_with_retry_and_sleep(
            &policy,
            |d| slept.push(d),
            |attempt| {
                calls += 1;
                assert_eq!(attempt, calls);
                if attempt < 3 {
                    Err(Flaky(ErrorKind::Connection))
                } else {
                    Ok("receipt")
                }
            },
        );
        assert_eq!(out.unwrap(), "receipt");
        assert_eq!(calls, 3);
        assert_eq!(slept, vec![Duration::from_secs(2), Duration::from_secs(4)]);
    }

    #[test]
    fn exceeding_max_retries_returns_last_error() {
        let policy = RetryPolicy {
            max_retries: 2,
            ..RetryPolicy::default()
        };
        let mut slept = Vec::new();
        let mut calls = 0;
        let out: Result<(), Flaky> = run_with_retry_and_sleep(
            &policy,
            |d| slept.push(d),
            |_| {
                calls += 1;
                Err(Flaky(ErrorKind::Http5xx(503)))
            },
        );
        assert!(matches!(out, Err(Flaky(ErrorKind::Http5xx(503)))));
        assert_eq!(calls, 3);
        assert_eq!(slept, vec![Duration::from_secs(2), Duration::from_secs(4)]);
    }

    #[test]
    fn non_retryable_error_is_returned_immediately() {
        let policy = RetryPolicy::default();
        let mut slept = Vec::new();
        let mut calls = 0;
        let out: Result<(), Flaky> = run_with_retry_and_sleep(
            &policy,
            |d| slept.push(d),
            |_| {
                calls += 1;
                Err(Flaky(ErrorKind::Other))
            },
        );
        assert!(out.is_err());
        assert_eq!(calls, 1);
        assert!(slept.is_empty());
    }
}
