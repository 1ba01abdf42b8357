//! Transient-failure classification and retry.

use crate::error::{Error, Result};
use crate::shim::Outcome;
use regex::RegexSet;
use std::time::Duration;
use tgrun_core::RetryPolicy;

/// Compiled retry policy.
#[derive(Debug)]
pub struct RetrySet {
    max_attempts: u32,
    sleep_between: Duration,
    patterns: Option<RegexSet>,
}

impl RetrySet {
    /// Compile a policy. Patterns were syntax-checked at evaluation time,
    /// but compilation failures are still reported rather than ignored.
    pub fn compile(policy: &RetryPolicy) -> Result<Self> {
        let patterns = if policy.retryable_patterns.is_empty() {
            None
        } else {
            Some(
                RegexSet::new(&policy.retryable_patterns).map_err(|err| {
                    Error::Core(tgrun_core::Error::configuration(format!(
                        "invalid retryable pattern: {err}"
                    )))
                })?,
            )
        };
        Ok(Self {
            max_attempts: policy.max_attempts.max(1),
            sleep_between: Duration::from_secs(policy.sleep_between_seconds),
            patterns,
        })
    }

    /// Whether stderr from a failed invocation marks it transient.
    #[must_use]
    pub fn is_retryable(&self, stderr: &str) -> bool {
        self.patterns
            .as_ref()
            .is_some_and(|patterns| patterns.is_match(stderr))
    }

    /// Drive an invocation through the retry loop.
    ///
    /// `attempt` is called up to `max_attempts` times. A successful outcome
    /// returns immediately; a failure with retryable stderr sleeps and goes
    /// again; anything else is returned to the caller as the final outcome.
    pub async fn run<F, Fut>(&self, mut attempt: F) -> Result<(Outcome, u32)>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<Outcome>>,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let outcome = attempt().await?;
            if outcome.success() {
                return Ok((outcome, attempts));
            }
            if attempts >= self.max_attempts || !self.is_retryable(&outcome.stderr) {
                return Ok((outcome, attempts));
            }
            tracing::warn!(
                attempt = attempts,
                max_attempts = self.max_attempts,
                sleep_s = self.sleep_between.as_secs(),
                "Transient failure; retrying"
            );
            tokio::time::sleep(self.sleep_between).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn outcome(exit_code: i32, stderr: &str) -> Outcome {
        Outcome {
            exit_code,
            stdout: String::new(),
            stderr: stderr.to_string(),
            duration: Duration::from_millis(1),
            changes_pending: false,
        }
    }

    fn policy(max_attempts: u32, patterns: &[&str]) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            sleep_between_seconds: 0,
            retryable_patterns: patterns.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn retries_until_success() {
        let set = RetrySet::compile(&policy(5, &["My own little error"])).unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_ref = calls.clone();

        let (outcome, attempts) = set
            .run(move || {
                let calls = calls_ref.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 5 {
                        Ok(outcome(1, "My own little error"))
                    } else {
                        Ok(outcome(0, ""))
                    }
                }
            })
            .await
            .unwrap();

        assert!(outcome.success());
        assert_eq!(attempts, 5);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn exhaustion_returns_last_failure() {
        let set = RetrySet::compile(&policy(3, &["transient"])).unwrap();
        let (outcome, attempts) = set
            .run(|| async { Ok(outcome(1, "transient glitch")) })
            .await
            .unwrap();
        assert!(!outcome.success());
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn non_matching_failure_does_not_retry() {
        let set = RetrySet::compile(&policy(5, &["timeout"])).unwrap();
        let (outcome, attempts) = set
            .run(|| async { Ok(outcome(1, "syntax error")) })
            .await
            .unwrap();
        assert!(!outcome.success());
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn no_patterns_means_no_retry() {
        let set = RetrySet::compile(&policy(5, &[])).unwrap();
        let (_, attempts) = set.run(|| async { Ok(outcome(1, "anything")) }).await.unwrap();
        assert_eq!(attempts, 1);
    }
}
