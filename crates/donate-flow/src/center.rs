//! Donation Center
//!
//! Host-facing surface: starts flows and projects the ledger. The hosting
//! application owns presentation; this type owns everything behind it.

use std::sync::Arc;

use donate_core::{AmountUah, Donation, PageSurface};
use donate_ledger::{KeyValueStore, ReceiptLedger};

use crate::config::FlowConfig;
use crate::controller::FlowController;
use crate::scripts::{HttpScriptFetcher, ScriptFetcher, ScriptSource};

/// Entry point for embedding hosts
///
/// One center lives per process, sharing a single ledger across flows. Every
/// [`start_flow`](Self::start_flow) hands back a fresh controller with its
/// own script cache, mirroring the one-attempt-one-session ownership model.
pub struct DonationCenter {
    config: FlowConfig,
    ledger: Arc<ReceiptLedger>,
    fetcher: Arc<dyn ScriptFetcher>,
}

impl DonationCenter {
    /// Create with default configuration on the given durable store
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_config(FlowConfig::default(), store)
    }

    /// Create with explicit configuration
    pub fn with_config(config: FlowConfig, store: Arc<dyn KeyValueStore>) -> Self {
        let fetcher = Arc::new(HttpScriptFetcher::new(config.scripts_url.clone()));
        Self {
            config,
            ledger: Arc::new(ReceiptLedger::new(store)),
            fetcher,
        }
    }

    /// Swap the script transport (tests, offline demos)
    pub fn with_fetcher(mut self, fetcher: Arc<dyn ScriptFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Build a controller for one donation attempt against the given page
    /// surface. `on_complete` fires once, after the receipt is committed.
    pub fn start_flow(
        &self,
        page: Arc<dyn PageSurface>,
        on_complete: impl FnOnce(Donation) + Send + 'static,
    ) -> FlowController {
        FlowController::new(
            self.config.clone(),
            page,
            ScriptSource::new(self.fetcher.clone()),
            self.ledger.clone(),
        )
        .on_complete(on_complete)
    }

    /// Whether any donation has ever been recorded
    pub fn has_donated(&self) -> donate_ledger::Result<bool> {
        self.ledger.has_donated()
    }

    /// Running total over all recorded donations
    pub fn total_donated_uah(&self) -> donate_ledger::Result<AmountUah> {
        self.ledger.total_donated_uah()
    }

    /// All recorded receipts, oldest first
    pub fn donation_receipts(&self) -> donate_ledger::Result<Vec<Donation>> {
        self.ledger.donation_receipts()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use donate_core::{PageEvent, ScriptedPage};
    use donate_ledger::MemoryKeyValueStore;
    use futures::StreamExt;

    use crate::scripts::StaticScriptFetcher;
    use crate::session::FlowOutcome;

    #[tokio::test]
    async fn test_center_accumulates_across_flows() {
        let center = DonationCenter::with_config(
            FlowConfig {
                poll_interval: std::time::Duration::from_millis(1),
                ..FlowConfig::default()
            },
            Arc::new(MemoryKeyValueStore::new()),
        )
        .with_fetcher(Arc::new(StaticScriptFetcher::new("var x = 1;")));

        assert!(!center.has_donated().unwrap());

        for (amount, receipt) in [("₴100", "r1"), ("₴250", "r2")] {
            let page = Arc::new(ScriptedPage::new());
            page.push_result(amount);
            page.push_result("waiting");
            page.set_fallback_result("success");

            let events = futures::stream::iter(vec![
                PageEvent::NavigationFinished {
                    url: "https://uahelp.monobank.ua".into(),
                },
                PageEvent::UserInteraction,
                PageEvent::NavigationFinished {
                    url: "https://uahelp.monobank.ua/payment/done".into(),
                },
                PageEvent::NavigationFinished {
                    url: format!("https://uahelp.monobank.ua/done/{receipt}"),
                },
            ])
            .chain(futures::stream::pending());

            let mut controller = center.start_flow(page, |_| {});
            let outcome = controller.run(Box::pin(events)).await;
            assert!(matches!(outcome, FlowOutcome::Succeeded(_)));
        }

        assert!(center.has_donated().unwrap());
        assert_eq!(center.total_donated_uah().unwrap().uah, 350);
        let receipts = center.donation_receipts().unwrap();
        assert_eq!(receipts.len(), 2);
        assert_eq!(receipts[0].receipt_id, "r1");
        assert_eq!(receipts[1].receipt_id, "r2");
    }
}
