use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `JOURNEY_SERVICE__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub journey: JourneyConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub sms: SmsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default functions
fn default_node_id() -> String {
    "node-01".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_enabled() -> bool {
    true
}
fn default_metrics_port() -> u16 {
    9091
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            port: default_metrics_port(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            journey: JourneyConfig::default(),
            ingest: IngestConfig::default(),
            sms: SmsConfig::default(),
        }
    }
}

// ─── Journey Config ─────────────────────────────────────────────────────
#[derive(Debug, Clone, Deserialize)]
pub struct JourneyConfig {
    /// Interval between time-window sweeps.
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    /// Register and activate the bundled demo journeys on start-up.
    #[serde(default = "default_seed_demo_journeys")]
    pub seed_demo_journeys: bool,
}

fn default_sweep_interval_ms() -> u64 { 3_600_000 }
fn default_seed_demo_journeys() -> bool { true }

impl Default for JourneyConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: default_sweep_interval_ms(),
            seed_demo_journeys: default_seed_demo_journeys(),
        }
    }
}

// ─── Ingest Config ──────────────────────────────────────────────────────
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// Per-consumer buffer size of the in-process event queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_queue_capacity() -> usize { 1024 }

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

// ─── SMS Config ─────────────────────────────────────────────────────────
#[derive(Debug, Clone, Deserialize)]
pub struct SmsConfig {
    #[serde(default = "default_sms_enabled")]
    pub enabled: bool,
    #[serde(default = "default_from_number")]
    pub from_number: String,
    /// Messages kept in memory; the oldest are evicted beyond this.
    #[serde(default = "default_max_stored_messages")]
    pub max_stored_messages: usize,
}

fn default_sms_enabled() -> bool { true }
fn default_from_number() -> String { "+10000000000".to_string() }
fn default_max_stored_messages() -> usize { 10_000 }

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            enabled: default_sms_enabled(),
            from_number: default_from_number(),
            max_stored_messages: default_max_stored_messages(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("JOURNEY_SERVICE")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.api.http_port, 8080);
        assert_eq!(cfg.journey.sweep_interval_ms, 3_600_000);
        assert_eq!(cfg.ingest.queue_capacity, 1024);
        assert!(cfg.sms.enabled);
        assert_eq!(cfg.sms.max_stored_messages, 10_000);
    }

    #[test]
    fn test_partial_deserialize_fills_defaults() {
        let cfg: AppConfig =
            serde_json::from_value(serde_json::json!({"journey": {"sweep_interval_ms": 5}}))
                .unwrap();
        assert_eq!(cfg.journey.sweep_interval_ms, 5);
        assert!(cfg.journey.seed_demo_journeys);
        assert_eq!(cfg.node_id, "node-01");
    }
}
