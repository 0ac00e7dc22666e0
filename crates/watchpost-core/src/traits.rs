use std::future::Future;

use crate::error::AppError;

/// Performs a single HTTP GET for a URL and returns the raw body.
///
/// Retries, politeness delays and cancellation are layered on top by
/// [`RetryingFetcher`](crate::retry::RetryingFetcher).
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;

    /// Release all held connections. A later `fetch` reopens them.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// Converts raw HTML into normalized, searchable text.
pub trait Cleaner: Send + Sync + Clone {
    fn clean(&self, html: &str) -> Result<String, AppError>;
}

/// Delivers human-readable alerts.
///
/// Implementations never fail loudly: delivery problems are logged and
/// reported as `false`.
pub trait Notifier: Send + Sync + Clone {
    fn send(&self, message: &str, title: &str) -> impl Future<Output = bool> + Send;

    fn close(&self) -> impl Future<Output = ()> + Send;
}
