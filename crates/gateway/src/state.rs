use std::sync::Arc;

use {
    pulse_config::PulseConfig,
    pulse_metrics::MetricsHandle,
    pulse_query::{CommandOptions, QueryEngine},
};

/// Shared state handed to every route.
#[derive(Debug)]
pub struct GatewayState {
    pub metrics: MetricsHandle,
    pub engine: QueryEngine,
    pub config: PulseConfig,
    pub version: String,
}

impl GatewayState {
    pub fn new(metrics: MetricsHandle, config: PulseConfig) -> Arc<Self> {
        let engine = QueryEngine::new(Arc::clone(metrics.store()));
        Arc::new(Self {
            metrics,
            engine,
            config,
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    #[must_use]
    pub fn command_options(&self) -> CommandOptions {
        CommandOptions {
            matcher_limit: self.config.query.matcher_limit,
            overview_matcher_limit: self.config.query.overview_matcher_limit,
        }
    }
}
