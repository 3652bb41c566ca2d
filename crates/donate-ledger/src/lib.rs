//! # donate-ledger
//!
//! Durable receipt ledger for confirmed donations.
//!
//! The ledger is process-wide shared state with a single mutator path:
//! [`ReceiptLedger::commit`] appends a receipt and bumps the running total as
//! one logical update, keeping the audit invariant
//!
//! ```text
//! total_donated_uah == sum(r.amount.uah for r in donation_receipts)
//! ```
//!
//! Persistence goes through an injected [`KeyValueStore`], never ambient
//! globals, so hosts can back it with whatever durable store they already
//! have. Two stores ship with the crate: an in-memory map for tests and a
//! JSON file store for real use.

mod error;
mod ledger;
mod store;

pub use error::{LedgerError, Result};
pub use ledger::{LedgerState, ReceiptLedger};
pub use store::{JsonFileStore, KeyValueStore, MemoryKeyValueStore};
