pub mod error;
pub mod evaluator;
pub mod models;
pub mod monitor;
pub mod retry;
pub mod traits;

#[cfg(test)]
pub mod testutil;

pub use error::{AppError, ErrorKind};
pub use evaluator::ContentEvaluator;
pub use models::{MatchOutcome, MonitorConfig, PollRule, RequestPolicy, SearchMode};
pub use monitor::{MonitorService, Termination, TracingMonitorReporter};
pub use retry::{FetchFailure, FetchResult, RetryingFetcher};
pub use traits::{Cleaner, Fetcher, Notifier};
