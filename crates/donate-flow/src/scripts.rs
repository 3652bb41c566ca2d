//! Remote Script Source
//!
//! The payment page's markup is owned by a third party and changes without
//! notice, so the snippet that parses it is pulled from a remote endpoint
//! instead of being compiled in. That keeps amount extraction and status
//! detection patchable without shipping a new build.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::error::{FlowError, Result};

/// Entry point the snippet exposes for the displayed donation amount
pub const AMOUNT_ENTRY_POINT: &str = "getDonationAmount()";

/// Entry point the snippet exposes for the payment status token
pub const STATUS_ENTRY_POINT: &str = "paymentStatus()";

/// Sentinel the amount entry point returns when no amount is displayed
pub const INVALID_AMOUNT_SENTINEL: &str = "invalid";

/// Script transport trait (Strategy pattern)
///
/// Production uses [`HttpScriptFetcher`]; tests inject
/// [`StaticScriptFetcher`] or [`FailingScriptFetcher`].
#[async_trait]
pub trait ScriptFetcher: Send + Sync {
    /// Fetch the raw script text
    async fn fetch_script(&self) -> Result<String>;
}

/// Fetches the snippet over HTTP with a single GET
pub struct HttpScriptFetcher {
    client: reqwest::Client,
    url: String,
}

impl HttpScriptFetcher {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl ScriptFetcher for HttpScriptFetcher {
    async fn fetch_script(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?;
        let text = response.text().await?;
        if text.is_empty() {
            return Err(FlowError::ScriptFetch("empty script payload".into()));
        }
        Ok(text)
    }
}

/// Caching wrapper around a [`ScriptFetcher`]
///
/// The first call triggers one fetch; callers arriving before it resolves
/// share the in-flight future, and the terminal result - success or failure -
/// stays cached for the life of the source. One source lives per flow, so a
/// fresh attempt gets a fresh fetch. Retrying a failed fetch is the caller's
/// decision, never this layer's.
pub struct ScriptSource {
    fetcher: Arc<dyn ScriptFetcher>,
    cached: OnceCell<std::result::Result<Arc<str>, Arc<FlowError>>>,
}

impl ScriptSource {
    pub fn new(fetcher: Arc<dyn ScriptFetcher>) -> Self {
        Self {
            fetcher,
            cached: OnceCell::new(),
        }
    }

    /// The script text, fetching it on first use
    pub async fn fetch(&self) -> std::result::Result<Arc<str>, Arc<FlowError>> {
        self.cached
            .get_or_init(|| async {
                self.fetcher
                    .fetch_script()
                    .await
                    .map(Arc::from)
                    .map_err(Arc::new)
            })
            .await
            .clone()
    }

    /// Script with the amount query appended, ready to evaluate
    pub async fn amount_query(&self) -> std::result::Result<String, Arc<FlowError>> {
        let script = self.fetch().await?;
        Ok(format!("{script}\n{AMOUNT_ENTRY_POINT}"))
    }

    /// Script with the status query appended, ready to evaluate
    pub async fn status_query(&self) -> std::result::Result<String, Arc<FlowError>> {
        let script = self.fetch().await?;
        Ok(format!("{script}\n{STATUS_ENTRY_POINT}"))
    }
}

/// Fetcher returning a fixed script (for testing and demo purposes)
pub struct StaticScriptFetcher {
    script: String,
    calls: AtomicUsize,
}

impl StaticScriptFetcher {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            calls: AtomicUsize::new(0),
        }
    }

    /// How many fetches actually reached this fetcher
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScriptFetcher for StaticScriptFetcher {
    async fn fetch_script(&self) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.script.clone())
    }
}

/// Fetcher that always fails with a transport-style error (for testing)
pub struct FailingScriptFetcher;

#[async_trait]
impl ScriptFetcher for FailingScriptFetcher {
    async fn fetch_script(&self) -> Result<String> {
        Err(FlowError::ScriptFetch("connection reset".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_happens_once() {
        let fetcher = Arc::new(StaticScriptFetcher::new("var x = 1;"));
        let source = ScriptSource::new(fetcher.clone());

        let first = source.fetch().await.unwrap();
        let second = source.fetch().await.unwrap();
        assert_eq!(&*first, "var x = 1;");
        assert_eq!(first, second);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_fetches_share_one_request() {
        let fetcher = Arc::new(StaticScriptFetcher::new("var x = 1;"));
        let source = Arc::new(ScriptSource::new(fetcher.clone()));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let source = source.clone();
                tokio::spawn(async move { source.fetch().await.unwrap() })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_cached() {
        let source = ScriptSource::new(Arc::new(FailingScriptFetcher));

        assert!(source.fetch().await.is_err());
        assert!(source.fetch().await.is_err());
    }

    #[tokio::test]
    async fn test_queries_append_entry_points() {
        let source = ScriptSource::new(Arc::new(StaticScriptFetcher::new("var x = 1;")));

        assert_eq!(
            source.amount_query().await.unwrap(),
            "var x = 1;\ngetDonationAmount()"
        );
        assert_eq!(
            source.status_query().await.unwrap(),
            "var x = 1;\npaymentStatus()"
        );
    }
}
