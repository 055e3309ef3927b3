use std::{net::SocketAddr, sync::Arc};

use {
    axum::{
        Router,
        extract::State,
        response::{IntoResponse, Json},
        routing::get,
    },
    pulse_config::{PulseConfig, schema::routes},
    pulse_metrics::MetricsHandle,
    tower_http::{
        cors::{Any, CorsLayer},
        trace::TraceLayer,
    },
    tracing::info,
};

use crate::{metrics_routes, state::GatewayState};

// ── Shared app state ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<GatewayState>,
}

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the gateway router (shared between production startup and tests).
pub fn build_gateway_app(state: Arc<GatewayState>) -> Router {
    let metrics_config = state.config.metrics.clone();
    let app_state = AppState { gateway: state };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        .route(routes::HEALTH, get(health_handler))
        .route(routes::SNAPSHOT, get(metrics_routes::api_metrics_handler))
        .route(routes::QUERY, get(metrics_routes::api_metrics_query_handler));
    if metrics_config.enabled {
        router = router.route(
            &metrics_config.path,
            get(metrics_routes::prometheus_metrics_handler),
        );
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Start the gateway HTTP server and serve until ctrl-c.
pub async fn start_gateway(config: PulseConfig, metrics: MetricsHandle) -> anyhow::Result<()> {
    config.validate()?;
    let addr: SocketAddr = config.socket_addr()?;
    let state = GatewayState::new(metrics, config);
    let app = build_gateway_app(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Startup banner.
    let scrape = if state.config.metrics.enabled {
        format!("scrape endpoint http://{addr}{}", state.config.metrics.path)
    } else {
        "scrape endpoint disabled".to_string()
    };
    let lines = [
        format!("pulse gateway v{}", state.version),
        format!("listening on {addr}"),
        scrape,
        format!("{} metric families registered", state.metrics.store().len()),
    ];
    let width = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) + 4;
    info!("┌{}┐", "─".repeat(width));
    for line in &lines {
        info!("│  {:<w$}│", line, w = width - 2);
    }
    info!("└{}┘", "─".repeat(width));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": state.gateway.version,
        "families": state.gateway.metrics.store().len(),
    }))
}
