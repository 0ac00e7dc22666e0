//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::sync::{Arc, Mutex};

use crate::error::AppError;
use crate::monitor::{MonitorEvent, MonitorReporter};
use crate::traits::{Cleaner, Fetcher, Notifier};

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

enum Step {
    Respond(Result<String, AppError>),
    Panic(&'static str),
}

/// Mock fetcher that plays back a scripted sequence of responses.
#[derive(Clone)]
pub struct MockFetcher {
    /// Each call pops the first element. If empty, returns a default HTML
    /// string, or hangs forever when built with [`MockFetcher::hanging`].
    steps: Arc<Mutex<Vec<Step>>>,
    hang_when_empty: bool,
    calls: Arc<Mutex<u32>>,
    closes: Arc<Mutex<u32>>,
}

impl MockFetcher {
    fn from_steps(steps: Vec<Step>, hang_when_empty: bool) -> Self {
        Self {
            steps: Arc::new(Mutex::new(steps)),
            hang_when_empty,
            calls: Arc::new(Mutex::new(0)),
            closes: Arc::new(Mutex::new(0)),
        }
    }

    pub fn new(body: &str) -> Self {
        Self::from_steps(vec![Step::Respond(Ok(body.to_string()))], false)
    }

    pub fn with_error(error: AppError) -> Self {
        Self::from_steps(vec![Step::Respond(Err(error))], false)
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self::from_steps(responses.into_iter().map(Step::Respond).collect(), false)
    }

    /// Every call blocks until the caller gives up on it.
    pub fn hanging() -> Self {
        Self::from_steps(Vec::new(), true)
    }

    /// The first call panics with `message`.
    pub fn panicking(message: &'static str) -> Self {
        Self::from_steps(vec![Step::Panic(message)], false)
    }

    pub fn call_count(&self) -> u32 {
        *self.calls.lock().unwrap()
    }

    pub fn close_count(&self) -> u32 {
        *self.closes.lock().unwrap()
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, _url: &str) -> Result<String, AppError> {
        *self.calls.lock().unwrap() += 1;
        let step = {
            let mut steps = self.steps.lock().unwrap();
            if steps.is_empty() {
                None
            } else {
                Some(steps.remove(0))
            }
        };

        match step {
            Some(Step::Respond(result)) => result,
            Some(Step::Panic(message)) => panic!("{message}"),
            None if self.hang_when_empty => std::future::pending().await,
            None => Ok("<html><body>default</body></html>".to_string()),
        }
    }

    async fn close(&self) {
        *self.closes.lock().unwrap() += 1;
    }
}

// ---------------------------------------------------------------------------
// MockCleaner
// ---------------------------------------------------------------------------

/// Mock cleaner that returns its input unchanged.
#[derive(Clone)]
pub struct MockCleaner {
    error: Arc<Mutex<Option<AppError>>>,
}

impl MockCleaner {
    /// Creates a cleaner that returns the input unchanged.
    pub fn passthrough() -> Self {
        Self {
            error: Arc::new(Mutex::new(None)),
        }
    }

    /// Creates a cleaner whose first call returns an error.
    pub fn with_error(error: AppError) -> Self {
        Self {
            error: Arc::new(Mutex::new(Some(error))),
        }
    }
}

impl Cleaner for MockCleaner {
    fn clean(&self, html: &str) -> Result<String, AppError> {
        let mut err = self.error.lock().unwrap();
        if let Some(e) = err.take() {
            return Err(e);
        }
        Ok(html.to_string())
    }
}

// ---------------------------------------------------------------------------
// MockNotifier
// ---------------------------------------------------------------------------

/// Recorded notification: (title, message).
pub type SentNotification = (String, String);

/// Mock notifier that records every message it is asked to deliver.
#[derive(Clone)]
pub struct MockNotifier {
    pub sent: Arc<Mutex<Vec<SentNotification>>>,
    deliver: bool,
    closes: Arc<Mutex<u32>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            deliver: true,
            closes: Arc::new(Mutex::new(0)),
        }
    }

    /// A notifier whose deliveries all fail.
    pub fn failing() -> Self {
        Self {
            deliver: false,
            ..Self::new()
        }
    }

    pub fn messages(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> u32 {
        *self.closes.lock().unwrap()
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for MockNotifier {
    async fn send(&self, message: &str, title: &str) -> bool {
        self.sent
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
        self.deliver
    }

    async fn close(&self) {
        *self.closes.lock().unwrap() += 1;
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Mock monitor reporter that records event labels.
#[derive(Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
    stopped_checks: Arc<Mutex<Option<u64>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, label: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.as_str() == label)
            .count()
    }

    /// Check count carried by the `Stopped` event, if one was reported.
    pub fn stopped_checks(&self) -> Option<u64> {
        *self.stopped_checks.lock().unwrap()
    }
}

impl MonitorReporter for MockReporter {
    fn report(&self, event: MonitorEvent<'_>) {
        let label = match &event {
            MonitorEvent::Started { .. } => "Started",
            MonitorEvent::CheckStarted { .. } => "CheckStarted",
            MonitorEvent::FetchFailed { .. } => "FetchFailed",
            MonitorEvent::Matched { .. } => "Matched",
            MonitorEvent::NotMatched { .. } => "NotMatched",
            MonitorEvent::Sleeping { .. } => "Sleeping",
            MonitorEvent::FatalError { .. } => "FatalError",
            MonitorEvent::ShuttingDown { .. } => "ShuttingDown",
            MonitorEvent::Stopped { checks, .. } => {
                *self.stopped_checks.lock().unwrap() = Some(*checks);
                "Stopped"
            }
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}
