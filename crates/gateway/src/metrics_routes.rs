//! Metrics routes: Prometheus-style scraping, JSON snapshot and text queries.

use std::panic::{self, AssertUnwindSafe};

use {
    axum::{
        extract::{Query, State},
        http::{StatusCode, header},
        response::{IntoResponse, Json, Response},
    },
    pulse_metrics::exposition,
    pulse_query::commands,
    serde::Deserialize,
    tracing::{debug, error, warn},
};

use crate::server::AppState;

/// Scrape endpoint handler.
///
/// Always answers 200 in text exposition format. A panic while collecting
/// is logged and served as an empty body.
pub async fn prometheus_metrics_handler(State(state): State<AppState>) -> Response {
    let metrics = &state.gateway.metrics;
    if let Err(e) = metrics.framework().metrics_requested() {
        warn!(error = %e, "failed to count scrape request");
    }

    let body = match panic::catch_unwind(AssertUnwindSafe(|| metrics.render())) {
        Ok(body) => body,
        Err(_) => {
            error!("metrics collection panicked, serving empty scrape");
            String::new()
        },
    };
    debug!(bytes = body.len(), "served metrics scrape");

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, exposition::CONTENT_TYPE)],
        body,
    )
        .into_response()
}

/// Current snapshot as JSON.
pub async fn api_metrics_handler(State(state): State<AppState>) -> Response {
    match state.gateway.engine.snapshot() {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    #[serde(default)]
    pub q: String,
}

/// Run a command line such as `matchers` or `query name{label="v"}` and
/// return its replies separated by blank lines.
pub async fn api_metrics_query_handler(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> impl IntoResponse {
    let gateway = &state.gateway;
    let replies = commands::run(&gateway.engine, &params.q, &gateway.command_options());
    replies.join("\n\n")
}
