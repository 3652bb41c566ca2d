//! # donate-core
//!
//! Domain models and injected capabilities for the in-app donation flow.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     FlowController                           │
//! │  ┌─────────────┐  ┌──────────────┐  ┌───────────────────┐   │
//! │  │   Flow      │  │ ScriptSource │  │   PageSurface     │   │
//! │  │   States    │──│  (cached)    │──│   (Strategy)      │   │
//! │  └─────────────┘  └──────────────┘  └───────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `PageSurface` trait enables swapping between a real embedded web view
//! bridge and the `ScriptedPage` mock without changing flow logic. This crate
//! never talks to the network itself; it only defines the seams the flow
//! crate drives.

pub mod error;
pub mod model;
pub mod page;

pub use error::{PageError, Result};
pub use model::{AmountUah, Donation};
pub use page::{NavigationDecision, PageEvent, PageSurface, ScriptedPage};
