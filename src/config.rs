use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
}

/// Transfer-engine bounds and pacing.
///
/// Rates are expressed against the common reference unit; amounts are in the
/// source economy's currency.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EngineConfig {
    /// Minimum spacing between outbound balance-service calls, in seconds
    pub api_delay_secs: f64,
    pub min_exchange_rate: Decimal,
    pub max_exchange_rate: Decimal,
    pub min_transfer_amount: Decimal,
    pub max_transfer_amount: Decimal,
    /// Currency minor-unit scale (decimal places)
    pub amount_scale: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_delay_secs: 1.0,
            min_exchange_rate: Decimal::new(1, 2),
            max_exchange_rate: Decimal::from(10_000),
            min_transfer_amount: Decimal::ONE,
            max_transfer_amount: Decimal::from(1_000_000),
            amount_scale: crate::money::DEFAULT_SCALE,
        }
    }
}

/// External balance service endpoint.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Bearer token; usually injected via the environment in prod
    pub token: String,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8429/api/v1".to_string(),
            token: String::new(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://clearinghouse.db?mode=rwc".to_string(),
        }
    }
}

/// Ledger retention sweep settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RetentionConfig {
    /// Terminal transfers older than this are eligible for cleanup
    pub days: i64,
    /// How often the sweeper runs
    pub sweep_interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            days: 180,
            sweep_interval_secs: 86_400,
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Self {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .unwrap_or_else(|_| panic!("Failed to read config file: {}", config_path));
        serde_yaml::from_str(&content).expect("Failed to parse config yaml")
    }
}
