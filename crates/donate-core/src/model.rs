//! Domain Models
//!
//! Core data types for donation tracking. Amounts are whole integer hryvnia
//! scraped from untrusted page text - parsing is best-effort by contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Base URL for public receipt verification links
pub const VERIFICATION_LINK_BASE: &str = "http://uahelp.monobank.ua/done/";

/// Divisor for the lossy UAH -> USD display approximation
const APPROX_USD_RATE: u64 = 29;

/// A donation amount in Ukrainian hryvnia
///
/// Keeps the original page text alongside the parsed integer, since the
/// display string is the only authoritative thing the page ever showed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountUah {
    /// Original text as displayed by the page (e.g. "₴1,000")
    pub raw_value: String,

    /// Parsed whole-hryvnia value
    pub uah: u64,
}

impl AmountUah {
    /// Parse an amount from freeform page text.
    ///
    /// Filters out every non-numeric character and reads the remaining digit
    /// run as an integer, so `"₴1,000"` parses to `1000`. Returns `None` when
    /// the text carries no digits at all - many intermediate page states show
    /// a placeholder instead of an amount, and that is not an error.
    pub fn parse(raw_value: impl Into<String>) -> Option<Self> {
        let raw_value = raw_value.into();
        let digits: String = raw_value.chars().filter(|c| c.is_numeric()).collect();
        if digits.is_empty() {
            return None;
        }
        // Overflow or non-ASCII numerals degrade to zero rather than failing.
        let uah = digits.parse().unwrap_or(0);
        Some(Self { raw_value, uah })
    }

    /// Construct from an already-known integer amount
    pub fn from_uah(uah: u64) -> Self {
        Self {
            raw_value: uah.to_string(),
            uah,
        }
    }

    /// Rough USD equivalent. Lossy integer division, display-only.
    pub fn approx_usd(&self) -> u64 {
        self.uah / APPROX_USD_RATE
    }
}

impl std::fmt::Display for AmountUah {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "₴{}", self.uah)
    }
}

/// A confirmed donation receipt
///
/// Constructed only when the flow reaches a confirmed success: amount known,
/// receipt identifier derived from the page URL. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Donation {
    /// Amount as observed on the payment page
    pub amount: AmountUah,

    /// Page-supplied receipt token (last path segment at success time).
    /// Opaque - callers must not depend on its format.
    pub receipt_id: String,

    /// When the success was confirmed
    pub donated_at: DateTime<Utc>,
}

impl Donation {
    pub fn new(amount: AmountUah, receipt_id: impl Into<String>) -> Self {
        Self {
            amount,
            receipt_id: receipt_id.into(),
            donated_at: Utc::now(),
        }
    }

    /// Public link where this receipt can be verified
    pub fn verification_link(&self) -> String {
        format!("{VERIFICATION_LINK_BASE}{}", self.receipt_id)
    }
}
