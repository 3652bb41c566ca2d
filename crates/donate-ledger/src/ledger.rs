//! Receipt Ledger
//!
//! Idempotent accumulation of confirmed donations with a persisted running
//! total.

use std::sync::{Arc, Mutex};

use donate_core::{AmountUah, Donation};

use crate::error::{LedgerError, Result};
use crate::store::KeyValueStore;

/// Durable key holding the integer running total
const KEY_TOTAL: &str = "__DonateToUkraine.totalDonatedUAH";

/// Durable key holding the JSON-encoded receipt sequence
const KEY_RECEIPTS: &str = "__DonateToUkraine.donationReceipts";

/// Persisted ledger state
///
/// `total_donated_uah` is monotonically non-decreasing and always equals the
/// sum over `donation_receipts`, which is append-only and insertion-ordered.
#[derive(Clone, Debug, Default)]
pub struct LedgerState {
    pub total_donated_uah: u64,
    pub donation_receipts: Vec<Donation>,
}

impl LedgerState {
    fn receipt_sum(&self) -> u64 {
        self.donation_receipts
            .iter()
            .map(|r| r.amount.uah)
            .sum()
    }

    fn check_invariant(&self) -> Result<()> {
        let sum = self.receipt_sum();
        if self.total_donated_uah == sum {
            Ok(())
        } else {
            Err(LedgerError::InvariantViolation {
                total: self.total_donated_uah,
                sum,
            })
        }
    }
}

/// Process-wide donation ledger
///
/// The single mutator path is [`commit`](Self::commit); reads are pure
/// projections safe for concurrent use. State loads lazily from the injected
/// store on first access and stays cached for the process lifetime.
pub struct ReceiptLedger {
    store: Arc<dyn KeyValueStore>,
    state: Mutex<Option<LedgerState>>,
}

impl ReceiptLedger {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            state: Mutex::new(None),
        }
    }

    /// Record a confirmed donation: append the receipt and add its amount to
    /// the running total, persisted together as one logical update.
    ///
    /// Committing a receipt id already present in the ledger is a no-op, so a
    /// double-fired success signal cannot double-count.
    pub fn commit(&self, donation: &Donation) -> Result<()> {
        let mut guard = self.state.lock().unwrap();
        let state = Self::loaded(&*self.store, &mut guard)?;

        if state
            .donation_receipts
            .iter()
            .any(|r| r.receipt_id == donation.receipt_id)
        {
            tracing::warn!(
                receipt_id = %donation.receipt_id,
                "Receipt already committed, ignoring"
            );
            return Ok(());
        }

        let mut next = state.clone();
        next.donation_receipts.push(donation.clone());
        next.total_donated_uah += donation.amount.uah;

        self.persist(&next)?;
        *guard = Some(next);

        tracing::info!(
            receipt_id = %donation.receipt_id,
            uah = donation.amount.uah,
            "Committed donation receipt"
        );
        Ok(())
    }

    /// Whether at least one donation has been recorded
    pub fn has_donated(&self) -> Result<bool> {
        self.with_state(|state| !state.donation_receipts.is_empty())
    }

    /// Running total over all recorded donations
    pub fn total_donated_uah(&self) -> Result<AmountUah> {
        self.with_state(|state| AmountUah::from_uah(state.total_donated_uah))
    }

    /// All recorded receipts, in commit order
    pub fn donation_receipts(&self) -> Result<Vec<Donation>> {
        self.with_state(|state| state.donation_receipts.clone())
    }

    fn with_state<T>(&self, read: impl FnOnce(&LedgerState) -> T) -> Result<T> {
        let mut guard = self.state.lock().unwrap();
        let state = Self::loaded(&*self.store, &mut guard)?;
        Ok(read(state))
    }

    /// Lazy-load from the store, verifying the audit invariant once per load
    fn loaded<'a>(
        store: &dyn KeyValueStore,
        guard: &'a mut Option<LedgerState>,
    ) -> Result<&'a LedgerState> {
        if guard.is_none() {
            let total_donated_uah = store
                .get(KEY_TOTAL)?
                .map(|raw| {
                    raw.parse()
                        .map_err(|_| LedgerError::Storage(format!("bad total: {raw}")))
                })
                .transpose()?
                .unwrap_or(0);

            let donation_receipts = store
                .get(KEY_RECEIPTS)?
                .map(|raw| serde_json::from_str(&raw))
                .transpose()?
                .unwrap_or_default();

            let state = LedgerState {
                total_donated_uah,
                donation_receipts,
            };
            state.check_invariant()?;
            *guard = Some(state);
        }
        Ok(guard.as_ref().unwrap())
    }

    /// Write both durable keys; receipts first so a failure between the two
    /// writes surfaces as an invariant violation on the next load instead of
    /// passing silently.
    fn persist(&self, state: &LedgerState) -> Result<()> {
        let receipts = serde_json::to_string(&state.donation_receipts)?;
        self.store.set(KEY_RECEIPTS, &receipts)?;
        self.store
            .set(KEY_TOTAL, &state.total_donated_uah.to_string())
    }
}
