//! API server: journey administration over HTTP plus the Prometheus exporter.

use crate::facade::JourneyApi;
use crate::rest::{self, AppState};
use axum::routing::{get, post, put};
use axum::Router;
use journey_core::config::AppConfig;
use std::net::SocketAddr;
use std::time::Instant;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct ApiServer {
    config: AppConfig,
    api: JourneyApi,
}

/// Route table shared by the server and tests.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Journey administration
        .route(
            "/v1/journeys",
            get(rest::list_journeys).post(rest::create_journey),
        )
        .route("/v1/journeys/:journey_id", get(rest::get_journey))
        .route(
            "/v1/journeys/:journey_id/state",
            put(rest::update_journey_state),
        )
        .route(
            "/v1/journeys/:journey_id/users",
            get(rest::get_users_in_journey),
        )
        // User queries
        .route("/v1/users/:user_id/journeys", get(rest::get_user_journeys))
        .route(
            "/v1/users/:user_id/journeys/:journey_id/stage",
            get(rest::get_user_current_stage),
        )
        .route(
            "/v1/users/:user_id/journeys/:journey_id/onboarded",
            get(rest::is_user_onboarded),
        )
        .route("/v1/users/:user_id/events", post(rest::evaluate_user_event))
        // Operational endpoints
        .route("/health", get(rest::health_check))
        .route("/live", get(rest::liveness))
        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

impl ApiServer {
    pub fn new(config: AppConfig, api: JourneyApi) -> Self {
        Self { config, api }
    }

    /// Start the HTTP REST server.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let app = router(AppState {
            api: self.api.clone(),
            node_id: self.config.node_id.clone(),
            start_time: Instant::now(),
        });

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the metrics server on a separate port.
    pub async fn start_metrics(&self) -> anyhow::Result<()> {
        if !self.config.metrics.enabled {
            info!("Metrics exporter disabled");
            return Ok(());
        }

        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}
