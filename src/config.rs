//! Environment-driven configuration: `dotenv()` first, then `std::env::var`
//! with typed defaults.

use std::path::Path;

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub debug: bool,
    pub secret_key: String,
    pub log_level: String,
    pub log_file: String,

    pub websocket_url: String,

    pub default_exchange: String,
    pub default_spot_asset: String,
    pub default_order_type: String,
    pub default_quantity_usd: f64,
    pub default_volatility: f64,
    pub default_fee_tier: String,

    pub max_orderbook_depth: usize,
    pub processing_batch_size: u64,
    pub benchmark_interval: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            debug: false,
            secret_key: "dev_secret_key".to_string(),
            log_level: "info".to_string(),
            log_file: "trade_simulator.log".to_string(),
            websocket_url: "wss://ws.gomarket-cpp.goquant.io/ws/l2-orderbook/okx/BTC-USDT-SWAP"
                .to_string(),
            default_exchange: "OKX".to_string(),
            default_spot_asset: "BTC-USDT".to_string(),
            default_order_type: "market".to_string(),
            default_quantity_usd: 100.0,
            default_volatility: 0.02,
            default_fee_tier: "VIP0".to_string(),
            max_orderbook_depth: 50,
            processing_batch_size: 100,
            benchmark_interval: 100,
        }
    }
}

impl Config {
    /// Load from `.env` (searched from cwd and parents, plus the crate's own
    /// manifest directory) then environment variables, falling back to the
    /// documented defaults.
    pub fn from_env() -> Result<Self> {
        load_env();

        let defaults = Config::default();

        Ok(Self {
            host: env_or("HOST", defaults.host),
            port: env_parsed("PORT", defaults.port).context("invalid PORT")?,
            debug: env_bool("DEBUG", defaults.debug),
            secret_key: env_or("SECRET_KEY", defaults.secret_key),
            log_level: env_or("LOG_LEVEL", defaults.log_level),
            log_file: env_or("LOG_FILE", defaults.log_file),
            websocket_url: env_or("WEBSOCKET_URL", defaults.websocket_url),
            default_exchange: env_or("DEFAULT_EXCHANGE", defaults.default_exchange),
            default_spot_asset: env_or("DEFAULT_SPOT_ASSET", defaults.default_spot_asset),
            default_order_type: env_or("DEFAULT_ORDER_TYPE", defaults.default_order_type),
            default_quantity_usd: env_parsed("DEFAULT_QUANTITY_USD", defaults.default_quantity_usd)
                .context("invalid DEFAULT_QUANTITY_USD")?,
            default_volatility: env_parsed("DEFAULT_VOLATILITY", defaults.default_volatility)
                .context("invalid DEFAULT_VOLATILITY")?,
            default_fee_tier: env_or("DEFAULT_FEE_TIER", defaults.default_fee_tier),
            max_orderbook_depth: env_parsed("MAX_ORDERBOOK_DEPTH", defaults.max_orderbook_depth)
                .context("invalid MAX_ORDERBOOK_DEPTH")?,
            processing_batch_size: env_parsed(
                "PROCESSING_BATCH_SIZE",
                defaults.processing_batch_size,
            )
            .context("invalid PROCESSING_BATCH_SIZE")?,
            benchmark_interval: env_parsed("BENCHMARK_INTERVAL", defaults.benchmark_interval)
                .context("invalid BENCHMARK_INTERVAL")?,
        })
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "true" | "1" | "t"),
        Err(_) => default,
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(v) => v
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("could not parse {key}={v:?}")),
        Err(_) => Ok(default),
    }
}

/// Try the standard dotenv search, then also check the crate's own manifest
/// directory explicitly so `cargo run --manifest-path` from elsewhere still
/// picks up a `.env`.
fn load_env() {
    let _ = dotenv::dotenv();

    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    for candidate in [manifest_dir.join(".env"), manifest_dir.join("../.env")] {
        if candidate.exists() {
            let _ = dotenv::from_path(&candidate);
        }
    }
}
