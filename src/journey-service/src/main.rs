//! Journey Service: event-driven user journey tracking.
//!
//! Main entry point that wires the engine, the event queue, the time-window
//! scheduler and the administrative HTTP server.

mod simulate;

use clap::Parser;
use journey_api::{ApiServer, JourneyApi};
use journey_channels::{EventQueue, SmsNotifier};
use journey_core::config::AppConfig;
use journey_engine::{run_event_consumer, JourneyEngine, PredicateRegistry};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "journey-service")]
#[command(about = "Event-driven user journey tracking service")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "JOURNEY_SERVICE__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "JOURNEY_SERVICE__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Time-window sweep interval in milliseconds (overrides config)
    #[arg(long, env = "JOURNEY_SERVICE__JOURNEY__SWEEP_INTERVAL_MS")]
    sweep_interval_ms: Option<u64>,

    /// Start without the demo journeys
    #[arg(long, default_value_t = false)]
    no_seed: bool,

    /// Replay the demo event script through the event queue
    #[arg(long, default_value_t = false)]
    simulate: bool,
}

/// Named predicates available to declaratively created journeys.
fn builtin_predicates() -> PredicateRegistry {
    let mut registry = PredicateRegistry::new();
    registry
        .register("has_positive_amount", |payload: &Value| {
            payload
                .pointer("/details/amount")
                .and_then(Value::as_f64)
                .is_some_and(|amount| amount > 0.0)
        })
        .register("is_recharge", |payload: &Value| {
            payload.pointer("/details/type").and_then(Value::as_str) == Some("recharge")
        });
    registry
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "journey_service=info,journey_engine=info,journey_channels=info,journey_api=info,tower_http=info"
                    .into()
            }),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Journey Service starting up");

    // Load configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(interval) = cli.sweep_interval_ms {
        config.journey.sweep_interval_ms = interval;
    }
    if cli.no_seed {
        config.journey.seed_demo_journeys = false;
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        sweep_interval_ms = config.journey.sweep_interval_ms,
        "Configuration loaded"
    );

    // Initialize engine with the SMS dispatcher
    let sms = Arc::new(SmsNotifier::new(config.sms.clone()));
    let engine = JourneyEngine::new()
        .with_notifier(sms)
        .with_node_id(config.node_id.clone());

    if config.journey.seed_demo_journeys {
        let seeded = engine.seed_demo_journeys()?;
        info!(journeys = ?seeded, "Demo journeys registered");
    }

    // Event ingestion
    let queue = Arc::new(EventQueue::new(config.ingest.queue_capacity));
    let (consumer, receiver) = queue.register_consumer();
    let consumer_engine = engine.clone();
    tokio::spawn(async move {
        let processed = run_event_consumer(consumer_engine, receiver).await;
        info!(consumer = %consumer, processed, "Event consumer stopped");
    });

    if cli.simulate {
        tokio::spawn(simulate::replay_demo_events(queue.clone()));
    }

    // Spawn time-window sweep
    let sweep_engine = engine.clone();
    let sweep_every = Duration::from_millis(config.journey.sweep_interval_ms.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_every);
        loop {
            interval.tick().await;
            info!("Running scheduled check of time-bound journeys");
            let changes = sweep_engine.check_and_update_time_based_journeys();
            if !changes.is_empty() {
                info!(changed = changes.len(), "Journey activation updated by sweep");
            }
        }
    });

    // Start API server
    let api = JourneyApi::new(engine, Arc::new(builtin_predicates()));
    let api_server = ApiServer::new(config.clone(), api);

    // Start metrics exporter
    if let Err(e) = api_server.start_metrics().await {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("Journey Service is ready to serve traffic");

    // Start HTTP server (blocks until shutdown)
    api_server.start_http().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_predicates() {
        let registry = builtin_predicates();
        assert!(registry.contains("has_positive_amount"));
        assert!(registry.contains("is_recharge"));
        assert!(!registry.contains("missing"));
    }

    #[test]
    fn test_cli_overrides_parse() {
        let cli = Cli::parse_from(["journey-service", "--http-port", "9000", "--no-seed"]);
        assert_eq!(cli.http_port, Some(9000));
        assert!(cli.no_seed);
        assert!(!cli.simulate);
    }
}
