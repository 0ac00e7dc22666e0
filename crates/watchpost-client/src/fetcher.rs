use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::Mutex;
use watchpost_core::error::AppError;
use watchpost_core::traits::Fetcher;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

/// HTTP fetcher using reqwest.
///
/// Downloads the raw body of a URL with a browser-like User-Agent and a
/// per-request timeout. The underlying [`Client`] (and its connection pool)
/// is created on first use and dropped by [`Fetcher::close`]; the next
/// fetch after a close builds a fresh one.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Arc<Mutex<Option<Client>>>,
    timeout: Duration,
}

impl ReqwestFetcher {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: Arc::new(Mutex::new(None)),
            timeout,
        }
    }

    /// True while a client (and its pooled connections) is held.
    pub async fn is_open(&self) -> bool {
        self.client.lock().await.is_some()
    }

    async fn client(&self) -> Result<Client, AppError> {
        let mut slot = self.client.lock().await;
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }

        let client = Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .timeout(self.timeout)
            .build()
            .map_err(|e| AppError::Client(e.to_string()))?;
        tracing::debug!("Created HTTP client");
        *slot = Some(client.clone());
        Ok(client)
    }
}

impl Default for ReqwestFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        let client = self.client().await?;

        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| AppError::Network(format!("Failed to read response body: {e}")))
    }

    async fn close(&self) {
        if self.client.lock().await.take().is_some() {
            tracing::debug!("Closed HTTP client");
        }
    }
}

impl ReqwestFetcher {
    fn classify(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(self.timeout)
        } else if e.is_builder() {
            AppError::InvalidUrl(e.to_string())
        } else if e.is_connect() {
            AppError::Network(format!("Connection failed: {e}"))
        } else {
            AppError::Network(e.to_string())
        }
    }
}
