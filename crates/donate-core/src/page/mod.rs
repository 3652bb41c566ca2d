//! Page Surface Integration
//!
//! Abstraction over the embedded web surface hosting the payment page.

mod mock;

pub use mock::ScriptedPage;

use async_trait::async_trait;

use crate::error::Result;

/// Embedded web surface trait (Strategy pattern)
///
/// Implement this for whatever hosts the payment page: a platform web view
/// bridge, a headless browser, or the [`ScriptedPage`] mock. The flow
/// controller only ever talks to the page through this seam.
#[async_trait]
pub trait PageSurface: Send + Sync {
    /// Begin loading a URL
    async fn load(&self, url: &str) -> Result<()>;

    /// Evaluate a script inside the page context, returning its textual result
    async fn evaluate(&self, script: &str) -> Result<String>;

    /// Install the click-observer bridge so user interaction inside the page
    /// is reported back as [`PageEvent::UserInteraction`]. The bridging
    /// mechanism is host-specific, so the surface owns it.
    async fn install_click_observer(&self) -> Result<()>;

    /// URL the page is currently showing, if any
    fn current_url(&self) -> Option<String>;
}

/// Answer to a navigation-policy question
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavigationDecision {
    Allow,
    Cancel,
}

/// Events the hosting surface reports into the flow controller
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageEvent {
    /// A navigation is about to start; the controller decides its policy
    NavigationRequested { url: String },

    /// A navigation finished loading
    NavigationFinished { url: String },

    /// A navigation failed (provisional or committed)
    NavigationFailed { reason: String },

    /// The user interacted with page content (click-bridge message)
    UserInteraction,

    /// The user dismissed the hosting surface
    Dismissed,
}
