use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde_json_path::JsonPath;
use url::Url;

use crate::error::AppError;

/// How fetched content is matched against the rule target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Substring search over the rendered text of an HTML document.
    TextMatch,
    /// Value comparison on nodes selected by a JSONPath query.
    PathMatch,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::TextMatch => "html",
            SearchMode::PathMatch => "json",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "html" | "text" => Ok(SearchMode::TextMatch),
            "json" | "structured" => Ok(SearchMode::PathMatch),
            _ => Err(AppError::Config(format!(
                "Unsupported search type '{s}' (expected 'html'/'text' or 'json'/'structured')"
            ))),
        }
    }
}

/// The single match rule a monitor evaluates every cycle.
///
/// Construct with [`PollRule::text`] or [`PollRule::path`]; a path rule
/// always carries a compiled JSONPath query.
#[derive(Debug, Clone)]
pub struct PollRule {
    search_mode: SearchMode,
    target: String,
    path: Option<(String, JsonPath)>,
    negate: bool,
    case_sensitive: bool,
}

impl PollRule {
    /// A text-mode rule searching for `target` in the rendered page text.
    pub fn text(target: impl Into<String>) -> Self {
        Self {
            search_mode: SearchMode::TextMatch,
            target: target.into(),
            path: None,
            negate: false,
            case_sensitive: false,
        }
    }

    /// A structured-mode rule comparing nodes selected by `path` to `target`.
    ///
    /// Paths without a leading `$` are taken relative to the document root,
    /// so `status` and `$.status` select the same node.
    pub fn path(target: impl Into<String>, path: &str) -> Result<Self, AppError> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(AppError::Config(
                "JSON search requires a non-empty JSONPath location".into(),
            ));
        }
        let rooted = root_path(trimmed);
        let query = JsonPath::parse(&rooted)
            .map_err(|e| AppError::Config(format!("Invalid JSONPath '{trimmed}': {e}")))?;

        Ok(Self {
            search_mode: SearchMode::PathMatch,
            target: target.into(),
            path: Some((rooted, query)),
            negate: false,
            case_sensitive: false,
        })
    }

    /// Build a rule from loosely typed configuration values.
    ///
    /// The path is ignored for text mode and mandatory for structured mode.
    pub fn from_parts(
        search_mode: SearchMode,
        target: impl Into<String>,
        path: Option<&str>,
    ) -> Result<Self, AppError> {
        match search_mode {
            SearchMode::TextMatch => Ok(Self::text(target)),
            SearchMode::PathMatch => {
                let path = path.ok_or_else(|| {
                    AppError::Config("JSON search requires a JSONPath location".into())
                })?;
                Self::path(target, path)
            }
        }
    }

    /// Invert the match outcome: notify when the target is absent.
    pub fn negated(mut self, negate: bool) -> Self {
        self.negate = negate;
        self
    }

    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn search_mode(&self) -> SearchMode {
        self.search_mode
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn path_str(&self) -> Option<&str> {
        self.path.as_ref().map(|(raw, _)| raw.as_str())
    }

    pub(crate) fn query(&self) -> Option<&JsonPath> {
        self.path.as_ref().map(|(_, query)| query)
    }

    pub fn negate(&self) -> bool {
        self.negate
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Apply negation to a raw match result.
    pub fn decide(&self, raw_match: bool) -> bool {
        raw_match != self.negate
    }

    /// Rule summary used in logs and notification messages.
    pub fn describe(&self) -> String {
        let base = match self.path_str() {
            Some(path) => format!(
                "{} search for '{}' at path '{}'",
                self.search_mode, self.target, path
            ),
            None => format!("{} search for '{}'", self.search_mode, self.target),
        };
        if self.negate {
            format!("Negative {base}")
        } else {
            base
        }
    }
}

fn root_path(path: &str) -> String {
    if path.starts_with('$') {
        path.to_string()
    } else if path.starts_with('[') {
        format!("${path}")
    } else {
        format!("$.{path}")
    }
}

/// Timing and retry policy for fetching the target.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestPolicy {
    /// Deadline for a single HTTP attempt.
    pub timeout: Duration,
    /// Politeness delay slept before every attempt, retries included.
    pub inter_request_delay: Duration,
    /// Total attempts per fetch, the first one included.
    pub max_retries: u32,
    /// Delay after the first failed attempt; doubles on each further failure.
    pub backoff_base: Duration,
    pub max_backoff: Duration,
}

impl Default for RequestPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            inter_request_delay: Duration::from_secs(1),
            max_retries: 5,
            backoff_base: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl RequestPolicy {
    /// Backoff to sleep after failed attempt `attempt` (1-indexed).
    ///
    /// `backoff_base * 2^(attempt - 1)`, capped at `max_backoff`.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self.backoff_base.saturating_mul(1u32 << exponent);
        std::cmp::min(delay, self.max_backoff)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.timeout.is_zero() {
            return Err(AppError::Config("Request timeout must be greater than zero".into()));
        }
        if self.max_retries == 0 {
            return Err(AppError::Config("Max retries must be at least 1".into()));
        }
        Ok(())
    }
}

/// Immutable snapshot of everything the monitor loop needs.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub target_url: Url,
    pub rule: PollRule,
    pub policy: RequestPolicy,
    pub check_interval: Duration,
    /// Send a notification summarising the configuration when the loop starts.
    pub notify_on_start: bool,
}

impl MonitorConfig {
    pub fn new(target_url: &str, rule: PollRule) -> Result<Self, AppError> {
        let target_url = parse_target_url(target_url)?;
        Ok(Self {
            target_url,
            rule,
            policy: RequestPolicy::default(),
            check_interval: Duration::from_secs(900),
            notify_on_start: true,
        })
    }

    pub fn with_policy(mut self, policy: RequestPolicy) -> Result<Self, AppError> {
        policy.validate()?;
        self.policy = policy;
        Ok(self)
    }

    pub fn with_check_interval(mut self, interval: Duration) -> Result<Self, AppError> {
        if interval.is_zero() {
            return Err(AppError::Config("Check interval must be greater than zero".into()));
        }
        self.check_interval = interval;
        Ok(self)
    }

    pub fn with_notify_on_start(mut self, notify: bool) -> Self {
        self.notify_on_start = notify;
        self
    }

    /// Lines describing the configuration, logged and sent at startup.
    pub fn summary_lines(&self) -> Vec<String> {
        vec![
            format!("Target URL: {}", self.target_url),
            format!("Negative search: {}", self.rule.negate()),
            format!("Search type: {}", self.rule.search_mode()),
            format!("Target match: {}", self.rule.target()),
            format!("JSON path: {}", self.rule.path_str().unwrap_or("-")),
            format!("Check interval: {} seconds", self.check_interval.as_secs()),
        ]
    }
}

fn parse_target_url(raw: &str) -> Result<Url, AppError> {
    let url = Url::parse(raw.trim()).map_err(|e| AppError::InvalidUrl(format!("'{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(AppError::InvalidUrl(format!(
            "URL scheme '{scheme}' is not allowed (only http/https)"
        ))),
    }
}

/// Result of evaluating one fetch against the rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Final decision, negation already applied.
    pub matched: bool,
    pub description: String,
}
