//! Metric name and label definitions.
//!
//! This module defines the metric families the bot framework registers and the
//! label keys they share. Centralizing these definitions keeps the write side
//! (instruments) and the read side (query aggregates) agreeing on names.

/// Framework metrics recorded by the hosting bot application
pub mod framework {
    /// Total number of scrape requests served
    pub const METRICS_REQUESTS: &str = "pulse_metrics_requests";
    /// Unix time at which the framework started
    pub const START_AT: &str = "pulse_start_at";
    /// Number of connected bots (labels: bot_id, adapter_name)
    pub const BOTS_CONNECTED: &str = "pulse_bots_connected";
    /// Total number of bot disconnects (labels: bot_id, adapter_name)
    pub const BOT_SHUTDOWN: &str = "pulse_bot_shutdown";
    /// Total number of received messages (labels: bot_id, adapter_name)
    pub const RECEIVED_MESSAGES: &str = "pulse_received_messages";
    /// Total number of sent messages (labels: bot_id, adapter_name, user_id)
    pub const SENT_MESSAGES: &str = "pulse_sent_messages";
    /// Total number of matcher runs (labels: plugin_id, matcher_name, exception)
    pub const MATCHER_CALLING: &str = "pulse_matcher_calling";
    /// Matcher run duration in seconds (labels: plugin_id, matcher_name, exception)
    pub const MATCHER_DURATION: &str = "pulse_matcher_duration_seconds";
}

/// Common label keys used across metrics
pub mod labels {
    pub const BOT_ID: &str = "bot_id";
    pub const ADAPTER_NAME: &str = "adapter_name";
    pub const USER_ID: &str = "user_id";
    pub const PLUGIN_ID: &str = "plugin_id";
    pub const MATCHER_NAME: &str = "matcher_name";
    pub const EXCEPTION: &str = "exception";
    /// Histogram bucket upper bound, reserved for exposition
    pub const LE: &str = "le";
}

/// Exposed sample name suffixes
pub mod suffixes {
    pub const TOTAL: &str = "_total";
    pub const CREATED: &str = "_created";
    pub const BUCKET: &str = "_bucket";
    pub const SUM: &str = "_sum";
    pub const COUNT: &str = "_count";
}

/// Standard histogram buckets for different metric types
pub mod buckets {
    use once_cell::sync::Lazy;

    /// Client library default buckets (in seconds)
    pub static DEFAULT: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0,
        ]
    });

    /// Matcher run duration buckets (in seconds)
    /// Covers 1ms to 60s; handlers that call out to chat APIs can be slow
    pub static MATCHER_DURATION: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
        ]
    });
}

/// Plugin id of the metrics plugin itself; its own matchers are not recorded.
pub const SELF_PLUGIN_ID: &str = "pulse";
