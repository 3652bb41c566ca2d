//! Flow Configuration

use std::time::Duration;

/// Donation portal entry URL
pub const DONATE_URL: &str = "https://uahelp.monobank.ua";

/// Remote endpoint serving the page-parsing script snippet
pub const SCRIPTS_URL: &str =
    "https://raw.githubusercontent.com/dreymonde/uahelp-js-scripts/main/scripts.js";

/// Substring marking the payment gateway's routing domain
pub const GATEWAY_MARKER: &str = "mbnk.biz";

/// Substring of the last path segment marking the completion checkpoint
pub const CHECKPOINT_MARKER: &str = "done";

/// Flow configuration
#[derive(Clone, Debug)]
pub struct FlowConfig {
    /// Payment page to open at flow start
    pub donate_url: String,

    /// Where the remote parsing script is fetched from
    pub scripts_url: String,

    /// Gateway-domain marker, matched by string containment (the gateway's
    /// hostnames are not contract-stable)
    pub gateway_marker: String,

    /// Completion-checkpoint marker, matched as a substring of the last path
    /// segment
    pub checkpoint_marker: String,

    /// Delay between status polls
    pub poll_interval: Duration,

    /// Polls before the flow gives up on a permanently ambiguous page and
    /// reports a connection failure. `None` polls forever.
    pub max_poll_attempts: Option<u32>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            donate_url: DONATE_URL.into(),
            scripts_url: SCRIPTS_URL.into(),
            gateway_marker: GATEWAY_MARKER.into(),
            checkpoint_marker: CHECKPOINT_MARKER.into(),
            poll_interval: Duration::from_millis(100),
            // ~5 minutes at the default interval
            max_poll_attempts: Some(3000),
        }
    }
}

impl FlowConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            donate_url: std::env::var("DONATE_URL").unwrap_or(defaults.donate_url),
            scripts_url: std::env::var("DONATE_SCRIPTS_URL").unwrap_or(defaults.scripts_url),
            gateway_marker: defaults.gateway_marker,
            checkpoint_marker: defaults.checkpoint_marker,
            poll_interval: std::env::var("DONATE_POLL_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map_or(defaults.poll_interval, Duration::from_millis),
            max_poll_attempts: std::env::var("DONATE_MAX_POLL_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map_or(defaults.max_poll_attempts, |n| {
                    if n == 0 { None } else { Some(n) }
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = FlowConfig::default();
        assert_eq!(config.donate_url, "https://uahelp.monobank.ua");
        assert_eq!(config.gateway_marker, "mbnk.biz");
        assert_eq!(config.checkpoint_marker, "done");
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.max_poll_attempts, Some(3000));
    }
}
