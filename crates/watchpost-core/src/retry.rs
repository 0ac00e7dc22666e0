//! Polite, retrying fetches.
//!
//! Wraps any [`Fetcher`] with the [`RequestPolicy`]: a politeness delay
//! before every attempt, a deadline per attempt, and exponential backoff
//! between attempts that failed with a transient error. Every suspension
//! races the caller's [`CancellationToken`].
//!
//! Only cancellation and fatal errors escape as `Err`; everything else the
//! network can throw at us ends up in [`FetchResult::Failure`].

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::models::RequestPolicy;
use crate::traits::Fetcher;

/// Outcome of one polite fetch, retries included.
#[derive(Debug)]
pub enum FetchResult {
    Content(String),
    Failure(FetchFailure),
}

/// The last error seen before the fetcher gave up.
#[derive(Debug)]
pub struct FetchFailure {
    pub error: AppError,
    pub attempts: u32,
}

/// A [`Fetcher`] wrapper that applies the request policy.
#[derive(Clone)]
pub struct RetryingFetcher<F> {
    inner: F,
    policy: RequestPolicy,
}

impl<F: Fetcher> RetryingFetcher<F> {
    pub fn new(inner: F, policy: RequestPolicy) -> Self {
        Self { inner, policy }
    }

    /// Fetch `url`, retrying transient failures.
    pub async fn fetch(
        &self,
        url: &str,
        cancel_token: &CancellationToken,
    ) -> Result<FetchResult, AppError> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            sleep_or_cancel(self.policy.inter_request_delay, cancel_token).await?;

            tracing::debug!(%url, attempt, "Fetching page");
            let error = match self.attempt(url, cancel_token).await {
                Ok(body) => {
                    tracing::debug!(%url, attempt, bytes = body.len(), "Fetched page");
                    return Ok(FetchResult::Content(body));
                }
                Err(e) => e,
            };

            if matches!(error, AppError::Cancelled) || error.is_fatal() {
                return Err(error);
            }

            if !error.is_retryable() {
                tracing::warn!(%url, %error, "Fetch failed with a non-retryable error");
                return Ok(FetchResult::Failure(FetchFailure {
                    error,
                    attempts: attempt,
                }));
            }

            if attempt >= self.policy.max_retries {
                tracing::warn!(%url, %error, attempts = attempt, "Giving up after retries");
                return Ok(FetchResult::Failure(FetchFailure {
                    error,
                    attempts: attempt,
                }));
            }

            let backoff = self.policy.backoff_for_attempt(attempt);
            tracing::warn!(
                %url,
                %error,
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                "Fetch failed, backing off"
            );
            sleep_or_cancel(backoff, cancel_token).await?;
        }
    }

    async fn attempt(&self, url: &str, cancel_token: &CancellationToken) -> Result<String, AppError> {
        tokio::select! {
            biased;
            () = cancel_token.cancelled() => Err(AppError::Cancelled),
            result = tokio::time::timeout(self.policy.timeout, self.inner.fetch(url)) => {
                result.unwrap_or(Err(AppError::Timeout(self.policy.timeout)))
            }
        }
    }

    /// Release the inner fetcher's connections.
    pub async fn close(&self) {
        self.inner.close().await;
    }
}

/// Sleep for `duration` unless the token fires first.
pub(crate) async fn sleep_or_cancel(
    duration: Duration,
    cancel_token: &CancellationToken,
) -> Result<(), AppError> {
    tokio::select! {
        biased;
        () = cancel_token.cancelled() => Err(AppError::Cancelled),
        () = tokio::time::sleep(duration) => Ok(()),
    }
}
