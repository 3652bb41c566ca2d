//! # donate-flow
//!
//! Web-content-driven payment flow state machine.
//!
//! A donation attempt opens a third-party payment page inside a host-provided
//! web surface and has no API contract with it - the only signals are page
//! navigations, the results of an injected parsing script, and time. This
//! crate turns those signals into a typed terminal outcome:
//!
//! ```text
//! Loading ──▶ ContentVisible ──▶ Polling ──▶ Succeeded(Donation)
//!    │              │               │
//!    │              └──▶────────────┴──▶ PaymentFailed (retry)
//!    └──▶ ConnectionFailed
//! ```
//!
//! Correctness rests on two rules: every unparseable or ambiguous signal
//! means "keep waiting", never "fail"; and success is declared only when both
//! an observed amount and a page-derived receipt identifier are in hand.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use donate_flow::DonationCenter;
//! use donate_ledger::JsonFileStore;
//!
//! let store = Arc::new(JsonFileStore::open("donations.json")?);
//! let center = DonationCenter::new(store);
//!
//! let mut flow = center.start_flow(page, |donation| {
//!     println!("thank you! receipt {}", donation.receipt_id);
//! });
//! let outcome = flow.run(page_events).await;
//! ```

mod center;
mod config;
mod controller;
mod error;
mod scripts;
mod session;

pub use center::DonationCenter;
pub use config::{DONATE_URL, FlowConfig, SCRIPTS_URL};
pub use controller::FlowController;
pub use error::{FlowError, Result};
pub use scripts::{
    FailingScriptFetcher, HttpScriptFetcher, ScriptFetcher, ScriptSource, StaticScriptFetcher,
};
pub use session::{FlowOutcome, FlowSession, FlowState};
