use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::evaluator::ContentEvaluator;
use crate::models::{MatchOutcome, MonitorConfig};
use crate::retry::{FetchResult, RetryingFetcher, sleep_or_cancel};
use crate::traits::{Cleaner, Fetcher, Notifier};

pub const ALERT_TITLE: &str = "Watchpost Alert";
pub const STARTED_TITLE: &str = "Watchpost Started";
pub const FATAL_TITLE: &str = "Watchpost Fatal Error";

/// Why the monitor loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Cancelled,
    Fatal,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Cancelled => write!(f, "cancelled"),
            Termination::Fatal => write!(f, "fatal error"),
        }
    }
}

/// Loop state of the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    /// Number of checks run so far.
    Running(u64),
    /// Cancelled after this many checks.
    Stopping(u64),
    Terminated { reason: Termination, checks: u64 },
}

/// Events emitted by the monitor for logging.
#[derive(Debug, Clone)]
pub enum MonitorEvent<'a> {
    Started {
        url: &'a str,
        rule: &'a str,
    },
    CheckStarted {
        iteration: u64,
        url: &'a str,
        rule: &'a str,
    },
    FetchFailed {
        iteration: u64,
        error: &'a AppError,
        attempts: u32,
    },
    Matched {
        iteration: u64,
        description: &'a str,
    },
    NotMatched {
        iteration: u64,
        description: &'a str,
    },
    Sleeping {
        interval: Duration,
    },
    FatalError {
        error: &'a AppError,
    },
    ShuttingDown {
        reason: Termination,
    },
    Stopped {
        reason: Termination,
        checks: u64,
    },
}

/// Trait for receiving monitor events (decoupled logging).
pub trait MonitorReporter: Send + Sync {
    fn report(&self, event: MonitorEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMonitorReporter;

impl MonitorReporter for TracingMonitorReporter {
    fn report(&self, event: MonitorEvent<'_>) {
        match event {
            MonitorEvent::Started { url, rule } => {
                tracing::info!(%url, %rule, "Monitor started");
            }
            MonitorEvent::CheckStarted {
                iteration,
                url,
                rule,
            } => {
                tracing::info!(iteration, "Checking {url} ({rule})");
            }
            MonitorEvent::FetchFailed {
                iteration,
                error,
                attempts,
            } => {
                tracing::error!(iteration, %error, attempts, "Fetch failed, skipping this check");
            }
            MonitorEvent::Matched {
                iteration,
                description,
            } => {
                tracing::info!(iteration, %description, "Target match found");
            }
            MonitorEvent::NotMatched {
                iteration,
                description,
            } => {
                tracing::info!(iteration, %description, "Target match not found");
            }
            MonitorEvent::Sleeping { interval } => {
                tracing::info!("Waiting {} seconds before next check", interval.as_secs());
            }
            MonitorEvent::FatalError { error } => {
                tracing::error!(%error, "Monitor hit a fatal error");
            }
            MonitorEvent::ShuttingDown { reason } => {
                tracing::info!(%reason, "Monitor shutting down");
            }
            MonitorEvent::Stopped { reason, checks } => {
                tracing::info!(%reason, checks, "Monitor stopped");
            }
        }
    }
}

/// Polls the target, evaluates it and notifies, until cancelled.
///
/// Generic over the fetcher, cleaner and notifier so the whole cycle can be
/// driven by mocks and a paused clock in tests.
pub struct MonitorService<F, C, N>
where
    F: Fetcher,
    C: Cleaner,
    N: Notifier,
{
    fetcher: RetryingFetcher<F>,
    evaluator: ContentEvaluator<C>,
    notifier: N,
    config: MonitorConfig,
}

impl<F, C, N> MonitorService<F, C, N>
where
    F: Fetcher,
    C: Cleaner,
    N: Notifier,
{
    pub fn new(fetcher: F, cleaner: C, notifier: N, config: MonitorConfig) -> Self {
        Self {
            fetcher: RetryingFetcher::new(fetcher, config.policy.clone()),
            evaluator: ContentEvaluator::new(cleaner),
            notifier,
            config,
        }
    }

    /// Run the monitor loop until cancellation or a fatal error.
    ///
    /// The fetcher and the notifier are closed exactly once on every exit
    /// path.
    pub async fn run<R: MonitorReporter>(
        &self,
        cancel_token: CancellationToken,
        reporter: &R,
    ) -> Termination {
        let rule = self.config.rule.describe();
        reporter.report(MonitorEvent::Started {
            url: self.config.target_url.as_str(),
            rule: &rule,
        });

        if self.config.notify_on_start {
            let mut lines = vec!["Starting Watchpost...".to_string()];
            lines.extend(self.config.summary_lines());
            self.notifier.send(&lines.join("\n"), STARTED_TITLE).await;
        }

        let mut state = CycleState::Running(0);
        let (reason, checks) = loop {
            state = match state {
                CycleState::Running(done) => self.step(done + 1, &cancel_token, reporter).await,
                CycleState::Stopping(checks) => CycleState::Terminated {
                    reason: Termination::Cancelled,
                    checks,
                },
                CycleState::Terminated { reason, checks } => break (reason, checks),
            };
        };

        reporter.report(MonitorEvent::ShuttingDown { reason });
        self.fetcher.close().await;
        self.notifier.close().await;
        reporter.report(MonitorEvent::Stopped { reason, checks });

        reason
    }

    /// One iteration followed by the inter-cycle sleep.
    async fn step<R: MonitorReporter>(
        &self,
        iteration: u64,
        cancel_token: &CancellationToken,
        reporter: &R,
    ) -> CycleState {
        let result = AssertUnwindSafe(self.check_once(iteration, cancel_token, reporter))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(AppError::Internal(panic_message(panic.as_ref()))));

        match result {
            Ok(_) => {}
            Err(AppError::Cancelled) => return CycleState::Stopping(iteration),
            Err(error) => {
                self.handle_fatal(&error, reporter).await;
                return CycleState::Terminated {
                    reason: Termination::Fatal,
                    checks: iteration,
                };
            }
        }

        reporter.report(MonitorEvent::Sleeping {
            interval: self.config.check_interval,
        });
        match sleep_or_cancel(self.config.check_interval, cancel_token).await {
            Ok(()) => CycleState::Running(iteration),
            Err(_) => CycleState::Stopping(iteration),
        }
    }

    /// Fetch, evaluate and notify once.
    ///
    /// Returns `Ok(None)` when the fetch failed and evaluation was skipped.
    /// `Err` is either cancellation or a fatal error.
    pub async fn check_once<R: MonitorReporter>(
        &self,
        iteration: u64,
        cancel_token: &CancellationToken,
        reporter: &R,
    ) -> Result<Option<MatchOutcome>, AppError> {
        let url = self.config.target_url.as_str();
        let rule = &self.config.rule;
        reporter.report(MonitorEvent::CheckStarted {
            iteration,
            url,
            rule: &rule.describe(),
        });

        let content = match self.fetcher.fetch(url, cancel_token).await? {
            FetchResult::Content(content) => content,
            FetchResult::Failure(failure) => {
                reporter.report(MonitorEvent::FetchFailed {
                    iteration,
                    error: &failure.error,
                    attempts: failure.attempts,
                });
                self.notifier
                    .send(&failure.error.describe_failure(url), ALERT_TITLE)
                    .await;
                return Ok(None);
            }
        };

        let outcome = self.outcome_for(&content);
        if outcome.matched {
            reporter.report(MonitorEvent::Matched {
                iteration,
                description: &outcome.description,
            });
            self.notifier
                .send(&format!("{} found on {}", outcome.description, url), ALERT_TITLE)
                .await;
        } else {
            reporter.report(MonitorEvent::NotMatched {
                iteration,
                description: &outcome.description,
            });
        }

        Ok(Some(outcome))
    }

    /// Evaluate fetched content and apply negation.
    pub fn outcome_for(&self, content: &str) -> MatchOutcome {
        let rule = &self.config.rule;
        let raw = self.evaluator.evaluate(content, rule);
        MatchOutcome {
            matched: rule.decide(raw),
            description: rule.describe(),
        }
    }

    async fn handle_fatal<R: MonitorReporter>(&self, error: &AppError, reporter: &R) {
        reporter.report(MonitorEvent::FatalError { error });
        let delivered = self
            .notifier
            .send(&format!("Watchpost error: {error}"), FATAL_TITLE)
            .await;
        if !delivered {
            tracing::warn!("Fatal error notification was not delivered");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic with a non-string payload".to_string()
    }
}
