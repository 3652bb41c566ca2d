//! Donation Flow Walkthrough
//!
//! Plays the part of the presentation shell: starts a flow, renders state
//! transitions and the two generic failure surfaces, wires the retry trigger,
//! and prints the ledger afterwards. Runs fully offline against a scripted
//! page so the state machine is observable without a live payment portal.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use donate_core::ScriptedPage;
use donate_flow::{DonationCenter, FlowConfig, FlowController, FlowOutcome, StaticScriptFetcher};
use donate_ledger::JsonFileStore;

const DONATE_URL: &str = "https://uahelp.monobank.ua";
const CHECKPOINT_URL: &str = "https://uahelp.monobank.ua/payment/done";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,donate_flow=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let ledger_path =
        std::env::var("DONATE_LEDGER_PATH").unwrap_or_else(|_| "donations.json".into());
    let store = Arc::new(JsonFileStore::open(&ledger_path)?);

    let config = FlowConfig {
        poll_interval: std::time::Duration::from_millis(100),
        ..FlowConfig::from_env()
    };

    // The real HttpScriptFetcher would pull the parsing snippet from the
    // remote endpoint; the walkthrough stays offline.
    let center = DonationCenter::with_config(config, store)
        .with_fetcher(Arc::new(StaticScriptFetcher::new("// scripted snippet")));

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("Donation flow walkthrough (ledger: {})", ledger_path);
    tracing::info!("══════════════════════════════════════════════════");

    // Attempt 1: the gateway declines the payment.
    let page = Arc::new(ScriptedPage::new());
    page.push_result("₴1,000"); // amount the user picked
    page.push_result("failure"); // gateway says no

    let mut flow = center.start_flow(page.clone(), |donation| {
        tracing::info!(receipt = %donation.receipt_id, "Completion callback fired");
    });

    drive_attempt(&mut flow, "abc123").await;
    render_outcome(&flow);

    if flow
        .outcome()
        .is_some_and(|outcome| outcome.retryable())
    {
        // Attempt 2: user taps "Try again", this time it goes through.
        tracing::info!("User taps the retry affordance");
        page.push_result("₴1,000");
        page.push_result("waiting");
        page.push_result("success");

        flow.retry().await;
        drive_attempt(&mut flow, "abc123").await;
        render_outcome(&flow);
    }

    // The ledger projection the host shows on its own screens.
    tracing::info!("──────────────────────────────────────────────────");
    tracing::info!("Has donated: {}", center.has_donated()?);
    let total = center.total_donated_uah()?;
    tracing::info!("Total donated: {total} (~${} USD)", total.approx_usd());
    for receipt in center.donation_receipts()? {
        tracing::info!(
            "  • ₴{} on {} - {}",
            receipt.amount.uah,
            receipt.donated_at.format("%Y-%m-%d %H:%M"),
            receipt.verification_link()
        );
    }

    Ok(())
}

/// Replay the page events of one attempt: landing page, a click that reveals
/// the amount, the completion checkpoint, then the receipt URL.
async fn drive_attempt(flow: &mut FlowController, receipt: &str) {
    flow.navigation_finished(DONATE_URL).await;
    tracing::info!(state = ?flow.state(), "Donation page visible");

    flow.page_interaction().await;
    tracing::info!(amount = ?flow.session().amount_text, "Amount observed");

    flow.navigation_finished(CHECKPOINT_URL).await;

    // Poll until the attempt settles, the way a scheduler would.
    while flow.outcome().is_none() {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        flow.navigation_finished(&format!("https://uahelp.monobank.ua/done/{receipt}"))
            .await;
        flow.poll_once().await;
    }
}

fn render_outcome(flow: &FlowController) {
    match flow.outcome() {
        Some(FlowOutcome::Succeeded(donation)) => {
            tracing::info!(
                "✓ Donation confirmed: {} (receipt {})",
                donation.amount,
                donation.receipt_id
            );
        }
        Some(outcome) => {
            if let Some((title, body)) = outcome.user_message() {
                tracing::warn!("✗ {title} - {body}");
            }
        }
        None => {}
    }
}
