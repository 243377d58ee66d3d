use std::env;

use chrono::Duration;
use gateway_client::GatewayConfig;
use log::*;

use crate::errors::ServerError;

const DEFAULT_TPC_HOST: &str = "127.0.0.1";
const DEFAULT_TPC_PORT: u16 = 8360;
/// How long a pending transaction may sit without a gateway signal before the expiry sweep abandons it. Matches the
/// gateway's own stream deadline.
const DEFAULT_TXN_TIMEOUT: Duration = Duration::seconds(180);
/// How long finished transactions stay queryable before being evicted from memory.
const DEFAULT_RETENTION: Duration = Duration::minutes(30);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Connection details for the terminal gateway.
    pub gateway: GatewayConfig,
    /// The time before a pending transaction with no terminal activity is expired.
    pub txn_timeout: Duration,
    /// The time a finished transaction remains queryable before eviction.
    pub retention: Duration,
    /// When true, request and response summaries are logged at info level. Never enable in production, since the
    /// logs will contain card metadata.
    pub debug_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_TPC_HOST.to_string(),
            port: DEFAULT_TPC_PORT,
            gateway: GatewayConfig::default(),
            txn_timeout: DEFAULT_TXN_TIMEOUT,
            retention: DEFAULT_RETENTION,
            debug_mode: false,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("TPC_HOST").ok().unwrap_or_else(|| DEFAULT_TPC_HOST.into());
        let port = env::var("TPC_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for TPC_PORT. {e} Using the default, {DEFAULT_TPC_PORT}, instead."
                    );
                    DEFAULT_TPC_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_TPC_PORT);
        let gateway = GatewayConfig::from_env_or_default();
        let (txn_timeout, retention) = configure_timeouts();
        let debug_mode = env::var("TPC_DEBUG_MODE").map(|s| &s == "1" || &s == "true").unwrap_or(false);
        if debug_mode {
            warn!("🚨️ Debug mode is enabled. Request and response logs will contain card metadata.");
        }
        Self { host, port, gateway, txn_timeout, retention, debug_mode }
    }

    pub fn validate(&self) -> Result<(), ServerError> {
        if self.host.trim().is_empty() {
            return Err(ServerError::ConfigurationError("TPC_HOST must not be empty".to_string()));
        }
        if self.txn_timeout <= Duration::zero() {
            return Err(ServerError::ConfigurationError("TPC_TXN_TIMEOUT must be positive".to_string()));
        }
        if self.retention < Duration::zero() {
            return Err(ServerError::ConfigurationError("TPC_RETENTION must not be negative".to_string()));
        }
        self.gateway.validate().map_err(|e| ServerError::ConfigurationError(e.to_string()))
    }
}

fn configure_timeouts() -> (Duration, Duration) {
    let txn_timeout = env::var("TPC_TXN_TIMEOUT")
        .map_err(|_| {
            info!(
                "🪛️ TPC_TXN_TIMEOUT is not set. Using the default value of {}s.",
                DEFAULT_TXN_TIMEOUT.num_seconds()
            )
        })
        .and_then(|s| {
            s.parse::<i64>()
                .map(Duration::seconds)
                .map_err(|e| warn!("🪛️ Invalid configuration value for TPC_TXN_TIMEOUT. {e}"))
        })
        .ok()
        .unwrap_or(DEFAULT_TXN_TIMEOUT);
    let retention = env::var("TPC_RETENTION")
        .map_err(|_| {
            info!("🪛️ TPC_RETENTION is not set. Using the default value of {} min.", DEFAULT_RETENTION.num_minutes())
        })
        .and_then(|s| {
            s.parse::<i64>()
                .map(Duration::minutes)
                .map_err(|e| warn!("🪛️ Invalid configuration value for TPC_RETENTION. {e}"))
        })
        .ok()
        .unwrap_or(DEFAULT_RETENTION);
    (txn_timeout, retention)
}
