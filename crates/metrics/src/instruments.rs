//! Write surface for the hosting bot framework.
//!
//! [`FrameworkMetrics`] registers the framework families from
//! [`definitions::framework`](crate::definitions::framework) and exposes one
//! method per framework event. Event dispatch itself lives in the host.

use std::{sync::Arc, time::Duration};

use tracing::trace;

use crate::{
    definitions::{SELF_PLUGIN_ID, buckets, framework, labels},
    error::Result,
    store::{FamilyDesc, MetricStore},
};

/// Bot API calls that deliver a message, across the supported adapters.
pub const SEND_MESSAGE_APIS: &[&str] = &[
    // OneBot v11
    "send_msg",
    // OneBot v12, Telegram, Red
    "send_message",
    // Discord
    "create_message",
    // Dodo
    "set_channel_message_send",
    // Feishu
    "im/v1/messages",
    "im/v1/images",
    // QQ
    "post_messages",
    "post_group_messages",
    // Satori
    "message_create",
    // Kaiheila
    "directMessage_create",
];

const UNKNOWN: &str = "unknown";

/// One finished matcher run.
#[derive(Debug, Clone)]
pub struct MatcherRun<'a> {
    pub plugin_id: &'a str,
    /// Stable identifier chosen by the instrumented call site.
    pub matcher_name: &'a str,
    /// Whether the handler raised.
    pub exception: bool,
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub struct FrameworkMetrics {
    store: Arc<MetricStore>,
}

impl FrameworkMetrics {
    /// Family descriptions for every framework metric.
    #[must_use]
    pub fn descriptors() -> Vec<FamilyDesc> {
        let bot = [labels::BOT_ID, labels::ADAPTER_NAME];
        let matcher = [labels::PLUGIN_ID, labels::MATCHER_NAME, labels::EXCEPTION];
        vec![
            FamilyDesc::counter(framework::METRICS_REQUESTS, "Total number of requests", &[]),
            FamilyDesc::gauge(framework::START_AT, "Start time of the bot", &[]),
            FamilyDesc::gauge(framework::BOTS_CONNECTED, "Total number of bots", &bot),
            FamilyDesc::counter(
                framework::BOT_SHUTDOWN,
                "Total number of bots shutdown",
                &bot,
            ),
            FamilyDesc::counter(
                framework::RECEIVED_MESSAGES,
                "Total number of received messages",
                &bot,
            ),
            FamilyDesc::counter(
                framework::SENT_MESSAGES,
                "Total number of sent messages",
                &[labels::BOT_ID, labels::ADAPTER_NAME, labels::USER_ID],
            ),
            FamilyDesc::counter(
                framework::MATCHER_CALLING,
                "Total number of matcher calling",
                &matcher,
            ),
            FamilyDesc::histogram(
                framework::MATCHER_DURATION,
                "Duration of matcher calling in seconds",
                &matcher,
                &buckets::MATCHER_DURATION,
            ),
        ]
    }

    /// Register the framework families on `store`.
    pub fn register(store: Arc<MetricStore>) -> Result<Self> {
        for desc in Self::descriptors() {
            store.register(desc)?;
        }
        Ok(Self { store })
    }

    #[must_use]
    pub fn store(&self) -> &Arc<MetricStore> {
        &self.store
    }

    pub fn mark_started(&self) -> Result<()> {
        self.store.set_to_current_time(framework::START_AT, &[])
    }

    pub fn bot_connected(&self, bot_id: &str, adapter: &str) -> Result<()> {
        self.store
            .inc_dec(framework::BOTS_CONNECTED, &[bot_id, adapter], 1.0)
    }

    pub fn bot_disconnected(&self, bot_id: &str, adapter: &str) -> Result<()> {
        self.store
            .inc_dec(framework::BOTS_CONNECTED, &[bot_id, adapter], -1.0)?;
        self.store.inc(framework::BOT_SHUTDOWN, &[bot_id, adapter])
    }

    pub fn message_received(&self, bot_id: &str, adapter: &str) -> Result<()> {
        trace!(bot_id, adapter, "bot received message");
        self.store
            .inc(framework::RECEIVED_MESSAGES, &[bot_id, adapter])
    }

    /// Count a sent message when `api` is a known send-message API.
    /// Returns whether the call was counted.
    pub fn api_called(
        &self,
        bot_id: &str,
        adapter: &str,
        api: &str,
        user_id: Option<&str>,
    ) -> Result<bool> {
        if !SEND_MESSAGE_APIS.contains(&api) {
            return Ok(false);
        }
        let user_id = user_id.unwrap_or(UNKNOWN);
        self.store
            .inc(framework::SENT_MESSAGES, &[bot_id, adapter, user_id])?;
        Ok(true)
    }

    /// Record a matcher run. Runs of the metrics plugin's own matchers are
    /// skipped; returns whether the run was recorded.
    pub fn matcher_finished(&self, run: &MatcherRun<'_>) -> Result<bool> {
        if run.plugin_id == SELF_PLUGIN_ID {
            return Ok(false);
        }
        let exception = if run.exception { "true" } else { "false" };
        let values = [run.plugin_id, run.matcher_name, exception];
        self.store.inc(framework::MATCHER_CALLING, &values)?;
        self.store.observe(
            framework::MATCHER_DURATION,
            &values,
            run.duration.as_secs_f64(),
        )?;
        Ok(true)
    }

    pub fn metrics_requested(&self) -> Result<()> {
        self.store.inc(framework::METRICS_REQUESTS, &[])
    }
}
