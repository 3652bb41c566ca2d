//! Payment Flow Controller
//!
//! The state machine bridging an opaque third-party payment page to a typed
//! success/failure outcome. Page navigation, injected-script results and a
//! fixed-delay poll are the only observable signals; everything unparseable
//! degrades to "keep waiting" rather than failing fast, and success is only
//! declared when both an amount and a receipt identifier are in hand.

use std::sync::Arc;

use futures::{Stream, StreamExt};

use donate_core::{AmountUah, Donation, NavigationDecision, PageEvent, PageSurface};
use donate_ledger::ReceiptLedger;

use crate::config::FlowConfig;
use crate::scripts::{INVALID_AMOUNT_SENTINEL, ScriptSource};
use crate::session::{FlowOutcome, FlowSession, FlowState};

/// Status token the injected script reports for the payment
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PaymentStatus {
    Success,
    Failure,
    Waiting,
}

impl PaymentStatus {
    /// Parse a status token. Unrecognized tokens are nobody's fault - the
    /// page format is not contract-stable - so they land on `Waiting`.
    fn parse(token: &str) -> Self {
        match token {
            "success" => Self::Success,
            "failure" => Self::Failure,
            "waiting" => Self::Waiting,
            other => {
                tracing::warn!(token = other, "Unrecognized payment status, keep waiting");
                Self::Waiting
            }
        }
    }
}

/// Completion callback invoked with the committed receipt
type CompletionHandler = Box<dyn FnOnce(Donation) + Send>;

/// Drives one donation attempt from page load to a terminal outcome
///
/// The controller owns its [`FlowSession`] exclusively; all transitions go
/// through `&mut self`, so one attempt can never interleave with itself. The
/// hosting surface either calls the fine-grained event entry points directly
/// or hands the controller an event stream via [`run`](Self::run).
pub struct FlowController {
    config: FlowConfig,
    page: Arc<dyn PageSurface>,
    scripts: ScriptSource,
    ledger: Arc<ReceiptLedger>,
    session: FlowSession,
    state: FlowState,
    donation: Option<Donation>,
    on_complete: Option<CompletionHandler>,
}

impl FlowController {
    pub fn new(
        config: FlowConfig,
        page: Arc<dyn PageSurface>,
        scripts: ScriptSource,
        ledger: Arc<ReceiptLedger>,
    ) -> Self {
        Self {
            config,
            page,
            scripts,
            ledger,
            session: FlowSession::default(),
            state: FlowState::Loading,
            donation: None,
            on_complete: None,
        }
    }

    /// Set the completion callback fired once on confirmed success
    pub fn on_complete(mut self, handler: impl FnOnce(Donation) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(handler));
        self
    }

    /// Current state of the attempt
    pub fn state(&self) -> FlowState {
        self.state
    }

    /// Session of the attempt in progress
    pub fn session(&self) -> &FlowSession {
        &self.session
    }

    /// Terminal outcome, once one is reached
    pub fn outcome(&self) -> Option<FlowOutcome> {
        match self.state {
            FlowState::Succeeded => self.donation.clone().map(FlowOutcome::Succeeded),
            FlowState::PaymentFailed => Some(FlowOutcome::PaymentFailed),
            FlowState::ConnectionFailed => Some(FlowOutcome::ConnectionFailed),
            FlowState::Cancelled => Some(FlowOutcome::Cancelled),
            FlowState::Loading | FlowState::ContentVisible | FlowState::Polling => None,
        }
    }

    /// Begin (or restart) the attempt against the configured donation URL
    pub async fn start(&mut self) {
        self.session.reset();
        self.state = FlowState::Loading;
        tracing::debug!(url = %self.config.donate_url, "Starting donation flow");

        if let Err(e) = self.page.load(&self.config.donate_url).await {
            tracing::warn!(error = %e, "Initial page load failed");
            self.state = FlowState::ConnectionFailed;
        }
    }

    /// Restart after a failed attempt. A fresh attempt against the original
    /// URL, never a gateway resume.
    pub async fn retry(&mut self) {
        match self.state {
            FlowState::PaymentFailed | FlowState::ConnectionFailed => self.start().await,
            _ => tracing::debug!(state = ?self.state, "Retry ignored in current state"),
        }
    }

    /// Policy decision for a navigation about to start.
    ///
    /// Entering the gateway domain before an amount has been extracted means
    /// the flow would go in blind; that is an unrecoverable routing failure,
    /// so the navigation is cancelled and the attempt fails.
    pub fn decide_navigation(&mut self, url: &str) -> NavigationDecision {
        if self.state.is_terminal() {
            return NavigationDecision::Allow;
        }
        if url.contains(&self.config.gateway_marker) && self.session.amount_text.is_none() {
            tracing::warn!(url, "Entering gateway without an amount, refusing");
            self.state = FlowState::ConnectionFailed;
            return NavigationDecision::Cancel;
        }
        NavigationDecision::Allow
    }

    /// A navigation finished loading
    pub async fn navigation_finished(&mut self, url: &str) {
        if self.state.is_terminal() {
            return;
        }
        self.session.current_url = Some(url.to_string());

        if self.state == FlowState::Polling {
            // Already watching for the outcome; just track where the page is.
            return;
        }

        if last_path_segment(url)
            .is_some_and(|segment| segment.contains(&self.config.checkpoint_marker))
        {
            tracing::debug!(url, "Completion checkpoint reached, polling status");
            self.state = FlowState::Polling;
            self.session.poll_attempts = 0;
            self.poll_once().await;
            return;
        }

        self.state = FlowState::ContentVisible;
        if !url.contains(&self.config.gateway_marker) && !self.session.observer_installed {
            match self.page.install_click_observer().await {
                Ok(()) => self.session.observer_installed = true,
                Err(e) => tracing::warn!(error = %e, "Click observer installation failed"),
            }
        }
    }

    /// A navigation failed before or after committing
    pub fn navigation_failed(&mut self, reason: &str) {
        if self.state.is_terminal() {
            return;
        }
        tracing::warn!(reason, "Page navigation failed");
        self.state = FlowState::ConnectionFailed;
    }

    /// User interacted with page content; re-extract the displayed amount
    pub async fn page_interaction(&mut self) {
        if self.state != FlowState::ContentVisible {
            return;
        }

        let script = match self.scripts.amount_query().await {
            Ok(script) => script,
            Err(e) => {
                tracing::warn!(error = %e, "Script unavailable, amount stays unknown");
                return;
            }
        };

        match self.page.evaluate(&script).await {
            Ok(result) if result == INVALID_AMOUNT_SENTINEL => {
                tracing::debug!("Page reports no amount displayed");
            }
            Ok(result) => {
                tracing::debug!(amount = %result, "Observed donation amount");
                self.session.amount_text = Some(result);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Amount extraction failed, amount stays unknown");
            }
        }
    }

    /// User dismissed the hosting surface
    pub fn cancel(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        tracing::debug!("Flow cancelled by dismissal");
        self.state = FlowState::Cancelled;
    }

    /// One status poll. Drivers reschedule this after
    /// [`FlowConfig::poll_interval`] for as long as the state stays
    /// `Polling`; [`run`](Self::run) does that internally.
    pub async fn poll_once(&mut self) {
        if self.state != FlowState::Polling {
            return;
        }

        if let Some(max) = self.config.max_poll_attempts {
            if self.session.poll_attempts >= max {
                tracing::warn!(max, "Poll budget exhausted on an ambiguous page");
                self.state = FlowState::ConnectionFailed;
                return;
            }
        }
        self.session.poll_attempts += 1;

        match self.query_status().await {
            PaymentStatus::Success => self.conclude_success(),
            PaymentStatus::Failure => {
                tracing::debug!("Page reports payment failure");
                self.state = FlowState::PaymentFailed;
            }
            PaymentStatus::Waiting => {}
        }
    }

    /// Evaluate the status query, downgrading every failure to `Waiting`
    async fn query_status(&self) -> PaymentStatus {
        let script = match self.scripts.status_query().await {
            Ok(script) => script,
            Err(e) => {
                tracing::warn!(error = %e, "Script unavailable, treating as waiting");
                return PaymentStatus::Waiting;
            }
        };

        match self.page.evaluate(&script).await {
            Ok(token) => PaymentStatus::parse(&token),
            Err(e) => {
                tracing::warn!(error = %e, "Status evaluation failed, treating as waiting");
                PaymentStatus::Waiting
            }
        }
    }

    /// The page claims success. Believe it only with an amount, a receipt
    /// identifier and a parseable amount string in hand; anything missing is
    /// indistinguishable from a failed payment.
    fn conclude_success(&mut self) {
        let receipt_id = self
            .session
            .current_url
            .as_deref()
            .and_then(last_path_segment);
        let amount = self
            .session
            .amount_text
            .as_deref()
            .and_then(AmountUah::parse);

        let (Some(receipt_id), Some(amount)) = (receipt_id, amount) else {
            tracing::warn!("Success signal without amount or receipt id");
            self.state = FlowState::PaymentFailed;
            return;
        };

        let donation = Donation::new(amount, receipt_id);
        if let Err(e) = self.ledger.commit(&donation) {
            tracing::error!(error = %e, "Receipt commit failed");
            self.state = FlowState::PaymentFailed;
            return;
        }

        self.state = FlowState::Succeeded;
        self.donation = Some(donation.clone());
        if let Some(handler) = self.on_complete.take() {
            handler(donation);
        }
    }

    /// Feed one page event into the state machine
    pub async fn handle_event(&mut self, event: PageEvent) {
        match event {
            PageEvent::NavigationRequested { url } => {
                let _ = self.decide_navigation(&url);
            }
            PageEvent::NavigationFinished { url } => self.navigation_finished(&url).await,
            PageEvent::NavigationFailed { reason } => self.navigation_failed(&reason),
            PageEvent::UserInteraction => self.page_interaction().await,
            PageEvent::Dismissed => self.cancel(),
        }
    }

    /// Drive the attempt to its terminal outcome from a stream of page
    /// events. While polling, the poll timer and the event stream race; an
    /// exhausted event stream counts as dismissal.
    pub async fn run(&mut self, events: impl Stream<Item = PageEvent> + Unpin) -> FlowOutcome {
        let mut events = events;
        self.start().await;

        loop {
            if let Some(outcome) = self.outcome() {
                return outcome;
            }

            if self.state == FlowState::Polling {
                tokio::select! {
                    event = events.next() => match event {
                        Some(event) => self.handle_event(event).await,
                        None => self.cancel(),
                    },
                    () = tokio::time::sleep(self.config.poll_interval) => {
                        self.poll_once().await;
                    }
                }
            } else {
                match events.next().await {
                    Some(event) => self.handle_event(event).await,
                    None => self.cancel(),
                }
            }
        }
    }
}

/// Last path segment of a URL, ignoring query, fragment and trailing slash.
/// `None` for URLs without a path.
fn last_path_segment(url: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let after_scheme = without_query
        .split_once("://")
        .map_or(without_query, |(_, rest)| rest);

    let mut parts = after_scheme.trim_end_matches('/').split('/');
    parts.next()?; // authority
    match parts.next_back() {
        Some(segment) if !segment.is_empty() => Some(segment.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use donate_core::ScriptedPage;
    use donate_ledger::MemoryKeyValueStore;

    use crate::scripts::{FailingScriptFetcher, ScriptFetcher, StaticScriptFetcher};

    const DONATE_URL: &str = "https://uahelp.monobank.ua";
    const CHECKPOINT_URL: &str = "https://uahelp.monobank.ua/payment/done";
    const RECEIPT_URL: &str = "https://uahelp.monobank.ua/done/abc123";

    fn test_config() -> FlowConfig {
        FlowConfig {
            poll_interval: Duration::from_millis(1),
            max_poll_attempts: Some(20),
            ..FlowConfig::default()
        }
    }

    struct Harness {
        page: Arc<ScriptedPage>,
        ledger: Arc<ReceiptLedger>,
        controller: FlowController,
    }

    fn harness_with(fetcher: Arc<dyn ScriptFetcher>, config: FlowConfig) -> Harness {
        let page = Arc::new(ScriptedPage::new());
        let ledger = Arc::new(ReceiptLedger::new(Arc::new(MemoryKeyValueStore::new())));
        let controller = FlowController::new(
            config,
            page.clone(),
            ScriptSource::new(fetcher),
            ledger.clone(),
        );
        Harness {
            page,
            ledger,
            controller,
        }
    }

    fn harness() -> Harness {
        harness_with(
            Arc::new(StaticScriptFetcher::new("var x = 1;")),
            test_config(),
        )
    }

    #[tokio::test]
    async fn test_full_success_scenario() {
        let mut h = harness();
        let completed: Arc<Mutex<Option<Donation>>> = Arc::new(Mutex::new(None));
        let completed_clone = completed.clone();
        h.controller = h.controller.on_complete(move |donation| {
            *completed_clone.lock().unwrap() = Some(donation);
        });

        h.page.push_result("₴2,500"); // amount extraction
        h.page.push_result("waiting"); // first status poll
        h.page.push_result("success"); // second status poll

        h.controller.start().await;
        h.controller.navigation_finished(DONATE_URL).await;
        assert_eq!(h.controller.state(), FlowState::ContentVisible);

        h.controller.page_interaction().await;
        assert_eq!(h.controller.session().amount_text.as_deref(), Some("₴2,500"));

        h.controller.navigation_finished(CHECKPOINT_URL).await;
        assert_eq!(h.controller.state(), FlowState::Polling);

        h.controller.navigation_finished(RECEIPT_URL).await;
        assert_eq!(h.controller.state(), FlowState::Polling);

        h.controller.poll_once().await;
        assert_eq!(h.controller.state(), FlowState::Succeeded);

        let donation = match h.controller.outcome().unwrap() {
            FlowOutcome::Succeeded(donation) => donation,
            other => panic!("expected success, got {other:?}"),
        };
        assert_eq!(donation.amount.uah, 2500);
        assert_eq!(donation.receipt_id, "abc123");

        // Receipt committed and callback fired with the same record.
        assert_eq!(h.ledger.total_donated_uah().unwrap().uah, 2500);
        assert_eq!(h.ledger.donation_receipts().unwrap().len(), 1);
        assert_eq!(
            completed.lock().unwrap().as_ref().unwrap().receipt_id,
            "abc123"
        );
    }

    #[tokio::test]
    async fn test_failure_status_leaves_ledger_unchanged() {
        let mut h = harness();
        h.page.push_result("₴500");
        h.page.push_result("failure");

        h.controller.start().await;
        h.controller.navigation_finished(DONATE_URL).await;
        h.controller.page_interaction().await;
        h.controller.navigation_finished(CHECKPOINT_URL).await;

        assert_eq!(h.controller.state(), FlowState::PaymentFailed);
        assert_eq!(h.controller.outcome(), Some(FlowOutcome::PaymentFailed));
        assert!(!h.ledger.has_donated().unwrap());
    }

    #[tokio::test]
    async fn test_gateway_entry_without_amount_fails_connection() {
        let mut h = harness();
        h.controller.start().await;
        h.controller.navigation_finished(DONATE_URL).await;

        let decision = h
            .controller
            .decide_navigation("https://pay.mbnk.biz/checkout");
        assert_eq!(decision, NavigationDecision::Cancel);
        assert_eq!(h.controller.state(), FlowState::ConnectionFailed);
        assert_eq!(h.controller.outcome(), Some(FlowOutcome::ConnectionFailed));
    }

    #[tokio::test]
    async fn test_gateway_entry_with_amount_is_allowed() {
        let mut h = harness();
        h.page.push_result("₴100");

        h.controller.start().await;
        h.controller.navigation_finished(DONATE_URL).await;
        h.controller.page_interaction().await;

        let decision = h
            .controller
            .decide_navigation("https://pay.mbnk.biz/checkout");
        assert_eq!(decision, NavigationDecision::Allow);
        assert_eq!(h.controller.state(), FlowState::ContentVisible);
    }

    #[tokio::test]
    async fn test_waiting_and_unrecognized_tokens_keep_polling() {
        let mut h = harness();
        h.page.push_result("₴100");
        h.page.push_result("waiting");
        h.page.push_result("something-new");

        h.controller.start().await;
        h.controller.navigation_finished(DONATE_URL).await;
        h.controller.page_interaction().await;
        h.controller.navigation_finished(CHECKPOINT_URL).await;
        assert_eq!(h.controller.state(), FlowState::Polling);

        h.controller.poll_once().await;
        assert_eq!(h.controller.state(), FlowState::Polling);
    }

    #[tokio::test]
    async fn test_success_without_amount_is_payment_failure() {
        let mut h = harness();
        h.page.push_result("success");

        h.controller.start().await;
        h.controller.navigation_finished(DONATE_URL).await;
        // No user interaction - amount never extracted.
        h.controller.navigation_finished(CHECKPOINT_URL).await;

        assert_eq!(h.controller.state(), FlowState::PaymentFailed);
        assert!(!h.ledger.has_donated().unwrap());
    }

    #[tokio::test]
    async fn test_success_with_unparseable_amount_is_payment_failure() {
        let mut h = harness();
        h.page.push_result("---"); // accepted (not the sentinel) but digitless
        h.page.push_result("success");

        h.controller.start().await;
        h.controller.navigation_finished(DONATE_URL).await;
        h.controller.page_interaction().await;
        h.controller.navigation_finished(CHECKPOINT_URL).await;

        assert_eq!(h.controller.state(), FlowState::PaymentFailed);
    }

    #[tokio::test]
    async fn test_sentinel_amount_is_not_stored() {
        let mut h = harness();
        h.page.push_result("invalid");

        h.controller.start().await;
        h.controller.navigation_finished(DONATE_URL).await;
        h.controller.page_interaction().await;

        assert!(h.controller.session().amount_text.is_none());
    }

    #[tokio::test]
    async fn test_amount_evaluation_failure_is_soft() {
        let mut h = harness();
        h.page.push_failure("page went away");

        h.controller.start().await;
        h.controller.navigation_finished(DONATE_URL).await;
        h.controller.page_interaction().await;

        assert!(h.controller.session().amount_text.is_none());
        assert_eq!(h.controller.state(), FlowState::ContentVisible);
    }

    #[tokio::test]
    async fn test_script_fetch_failure_degrades_then_exhausts_polls() {
        let config = FlowConfig {
            max_poll_attempts: Some(3),
            ..test_config()
        };
        let mut h = harness_with(Arc::new(FailingScriptFetcher), config);

        h.controller.start().await;
        h.controller.navigation_finished(DONATE_URL).await;
        h.controller.page_interaction().await; // soft failure, no crash
        assert!(h.controller.session().amount_text.is_none());

        h.controller.navigation_finished(CHECKPOINT_URL).await; // poll 1
        h.controller.poll_once().await; // poll 2
        h.controller.poll_once().await; // poll 3
        assert_eq!(h.controller.state(), FlowState::Polling);

        h.controller.poll_once().await; // budget exhausted
        assert_eq!(h.controller.state(), FlowState::ConnectionFailed);
    }

    #[tokio::test]
    async fn test_navigation_failure_fails_connection() {
        let mut h = harness();
        h.controller.start().await;
        h.controller.navigation_failed("dns lookup failed");

        assert_eq!(h.controller.state(), FlowState::ConnectionFailed);
    }

    #[tokio::test]
    async fn test_load_failure_fails_connection() {
        let h = harness();
        h.page.fail_loads();
        let mut controller = h.controller;

        controller.start().await;
        assert_eq!(controller.state(), FlowState::ConnectionFailed);
    }

    #[tokio::test]
    async fn test_retry_resets_session_and_can_succeed() {
        let mut h = harness();
        h.page.push_result("₴300");
        h.page.push_result("failure");

        h.controller.start().await;
        h.controller.navigation_finished(DONATE_URL).await;
        h.controller.page_interaction().await;
        h.controller.navigation_finished(CHECKPOINT_URL).await;
        assert_eq!(h.controller.state(), FlowState::PaymentFailed);

        h.controller.retry().await;
        assert_eq!(h.controller.state(), FlowState::Loading);
        assert!(h.controller.session().amount_text.is_none());

        h.page.push_result("₴300");
        h.page.push_result("waiting");
        h.page.push_result("success");
        h.controller.navigation_finished(DONATE_URL).await;
        h.controller.page_interaction().await;
        h.controller.navigation_finished(CHECKPOINT_URL).await;
        h.controller.navigation_finished(RECEIPT_URL).await;
        h.controller.poll_once().await;

        assert_eq!(h.controller.state(), FlowState::Succeeded);
        assert_eq!(h.ledger.total_donated_uah().unwrap().uah, 300);
    }

    #[tokio::test]
    async fn test_terminal_state_absorbs_events() {
        let mut h = harness();
        h.controller.start().await;
        h.controller.cancel();
        assert_eq!(h.controller.state(), FlowState::Cancelled);

        h.controller.navigation_finished(DONATE_URL).await;
        h.controller.navigation_failed("late failure");
        h.controller.page_interaction().await;
        assert_eq!(h.controller.state(), FlowState::Cancelled);
        assert!(!h.ledger.has_donated().unwrap());
    }

    #[tokio::test]
    async fn test_click_observer_installed_once() {
        let mut h = harness();
        h.controller.start().await;
        h.controller.navigation_finished(DONATE_URL).await;
        h.controller
            .navigation_finished("https://uahelp.monobank.ua/checkout")
            .await;

        assert_eq!(h.page.observer_installs(), 1);
    }

    #[tokio::test]
    async fn test_run_drives_stream_to_success() {
        let mut h = harness();
        h.page.push_result("₴2,500");
        h.page.push_result("waiting");
        h.page.set_fallback_result("success");

        let events = futures::stream::iter(vec![
            PageEvent::NavigationFinished {
                url: DONATE_URL.into(),
            },
            PageEvent::UserInteraction,
            PageEvent::NavigationFinished {
                url: CHECKPOINT_URL.into(),
            },
            PageEvent::NavigationFinished {
                url: RECEIPT_URL.into(),
            },
        ])
        .chain(futures::stream::pending());

        let outcome = h.controller.run(Box::pin(events)).await;
        let FlowOutcome::Succeeded(donation) = outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert_eq!(donation.amount.uah, 2500);
        assert_eq!(donation.receipt_id, "abc123");
    }

    #[tokio::test]
    async fn test_run_dismissal_cancels_without_commit() {
        let mut h = harness();

        let events = futures::stream::iter(vec![
            PageEvent::NavigationFinished {
                url: DONATE_URL.into(),
            },
            PageEvent::Dismissed,
        ])
        .chain(futures::stream::pending());

        let outcome = h.controller.run(Box::pin(events)).await;
        assert_eq!(outcome, FlowOutcome::Cancelled);
        assert!(!h.ledger.has_donated().unwrap());
    }

    #[test]
    fn test_last_path_segment() {
        assert_eq!(
            last_path_segment("https://uahelp.monobank.ua/done/abc123").as_deref(),
            Some("abc123")
        );
        assert_eq!(
            last_path_segment("https://host/path/done/").as_deref(),
            Some("done")
        );
        assert_eq!(
            last_path_segment("https://host/done?ref=1#top").as_deref(),
            Some("done")
        );
        assert_eq!(last_path_segment("https://uahelp.monobank.ua"), None);
        assert_eq!(last_path_segment("https://uahelp.monobank.ua/"), None);
    }
}
