use std::env;

use log::*;

use crate::GatewayError;

pub const DEFAULT_GATEWAY_URL: &str = "https://127.0.0.1:8443";

/// How the client validates the gateway's TLS certificate.
///
/// Terminal gateways usually live on the shop LAN with a self-signed certificate, so a blanket "verify against the
/// system roots" default would make every fresh install fail. The policy is explicit configuration: operators either
/// pin the gateway's CA certificate, or consciously opt in to skipping verification.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TrustPolicy {
    /// Validate against the system root store (public CA or corporate-managed certs).
    #[default]
    SystemRoots,
    /// Accept any certificate. Only sensible on an isolated till network, and the client logs a warning at startup.
    AcceptInvalidCerts,
    /// Validate against a single pinned CA certificate (PEM file path).
    PinnedCa(String),
}

#[derive(Clone, Debug, Default)]
pub struct GatewayConfig {
    /// Base URL of the terminal gateway, e.g. "https://192.168.0.20:8443". No trailing slash.
    pub base_url: String,
    /// The physical terminal addressed by sale requests (the `termid` wire field).
    pub terminal_id: String,
    pub trust: TrustPolicy,
    /// When true, log request URLs and payload summaries at info level.
    pub debug_mode: bool,
}

impl GatewayConfig {
    pub fn new(base_url: &str, terminal_id: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            terminal_id: terminal_id.to_string(),
            ..Default::default()
        }
    }

    pub fn from_env_or_default() -> Self {
        let base_url = env::var("TPC_GATEWAY_URL").ok().unwrap_or_else(|| {
            error!("🪛️ TPC_GATEWAY_URL is not set. Please set it to the terminal gateway's base URL.");
            DEFAULT_GATEWAY_URL.into()
        });
        let base_url = base_url.trim_end_matches('/').to_string();
        let terminal_id = env::var("TPC_GATEWAY_TERMINAL_ID").ok().unwrap_or_else(|| {
            error!("🪛️ TPC_GATEWAY_TERMINAL_ID is not set. Please set it to the terminal id the gateway expects.");
            String::default()
        });
        let trust = match env::var("TPC_GATEWAY_TRUST").map(|s| s.to_lowercase()) {
            Ok(s) if s == "insecure" => {
                warn!(
                    "🚨️ TPC_GATEWAY_TRUST is set to 'insecure'. TLS certificate validation for the gateway \
                     connection is DISABLED. Only do this on an isolated till network."
                );
                TrustPolicy::AcceptInvalidCerts
            },
            Ok(s) if s == "pinned" => match env::var("TPC_GATEWAY_CA_CERT") {
                Ok(path) => TrustPolicy::PinnedCa(path),
                Err(_) => {
                    error!(
                        "🪛️ TPC_GATEWAY_TRUST is 'pinned' but TPC_GATEWAY_CA_CERT is not set. Falling back to the \
                         system root store."
                    );
                    TrustPolicy::SystemRoots
                },
            },
            Ok(s) if s == "system" => TrustPolicy::SystemRoots,
            Ok(s) => {
                warn!("🪛️ '{s}' is not a valid value for TPC_GATEWAY_TRUST. Using the system root store.");
                TrustPolicy::SystemRoots
            },
            Err(_) => {
                info!("🪛️ TPC_GATEWAY_TRUST is not set. Using the system root store.");
                TrustPolicy::SystemRoots
            },
        };
        let debug_mode = env::var("TPC_DEBUG_MODE").map(|s| &s == "1" || &s == "true").unwrap_or(false);
        Self { base_url, terminal_id, trust, debug_mode }
    }

    /// Checks the configuration is usable before any network call is made.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.base_url.is_empty() {
            return Err(GatewayError::Initialization("The gateway base URL is not configured".into()));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(GatewayError::Initialization(format!(
                "The gateway URL must start with http:// or https://. Got '{}'",
                self.base_url
            )));
        }
        if self.terminal_id.trim().is_empty() {
            return Err(GatewayError::Initialization("The gateway terminal id is not configured".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{GatewayConfig, TrustPolicy};

    #[test]
    fn validation_catches_malformed_config() {
        let ok = GatewayConfig::new("https://192.168.0.20:8443/", "T1");
        assert_eq!(ok.base_url, "https://192.168.0.20:8443");
        assert!(ok.validate().is_ok());

        let bad_url = GatewayConfig::new("192.168.0.20:8443", "T1");
        assert!(bad_url.validate().is_err());

        let no_terminal = GatewayConfig::new("https://192.168.0.20:8443", "  ");
        assert!(no_terminal.validate().is_err());

        assert_eq!(GatewayConfig::default().trust, TrustPolicy::SystemRoots);
    }
}
