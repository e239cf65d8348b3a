//! Configuration handling for the socket client.
//!
//! This module reads session settings from a YAML config file and environment
//! variables, providing a unified configuration interface. Command-line flags
//! are applied on top by `main`.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use socket_session::{CorrelationMode, SessionConfig};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Socket client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Peer endpoint
    pub address: String,
    /// Heartbeat interval (milliseconds)
    pub heartbeat_interval_ms: u64,
    /// Opaque instance tag forwarded to the peer
    pub instance_id: Option<String>,
    /// Reply matching strategy
    pub correlation: CorrelationMode,
    /// Close confirmation timeout (milliseconds)
    pub close_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let session = SessionConfig::default();
        Self {
            address: session.address,
            heartbeat_interval_ms: session.heartbeat_interval.as_millis() as u64,
            instance_id: None,
            correlation: session.correlation,
            close_timeout_ms: session.close_timeout.as_millis() as u64,
        }
    }
}

/// Root configuration structure (matches the YAML structure)
#[derive(Debug, Deserialize)]
struct RootConfig {
    socket: Option<SocketSection>,
}

#[derive(Debug, Deserialize)]
struct SocketSection {
    address: Option<String>,
    heartbeat_interval_ms: Option<u64>,
    instance_id: Option<String>,
    correlation: Option<CorrelationMode>,
    close_timeout_ms: Option<u64>,
}

impl ClientConfig {
    /// Load configuration from file and environment variables
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let mut config = Self::default();

        match std::fs::read_to_string(&config_path) {
            Ok(content) => match serde_yaml::from_str::<RootConfig>(&content) {
                Ok(root_config) => {
                    config.apply_root_config(root_config);
                    info!("Loaded configuration from {:?}", config_path.as_ref());
                }
                Err(e) => warn!(
                    "Failed to parse config file {:?} ({}), using defaults",
                    config_path.as_ref(),
                    e
                ),
            },
            Err(_) => warn!("Config file {:?} not found, using defaults", config_path.as_ref()),
        }

        config.apply_environment_overrides();
        config.validate()?;

        info!(
            "Final socket configuration: address={}, heartbeat={}ms, instance_id={:?}, correlation={:?}",
            config.address, config.heartbeat_interval_ms, config.instance_id, config.correlation
        );

        Ok(config)
    }

    /// Apply the `socket` section of the root config
    fn apply_root_config(&mut self, root_config: RootConfig) {
        let Some(socket) = root_config.socket else {
            return;
        };

        if let Some(address) = socket.address {
            self.address = address;
        }
        if let Some(interval) = socket.heartbeat_interval_ms {
            self.heartbeat_interval_ms = interval;
        }
        if socket.instance_id.is_some() {
            self.instance_id = socket.instance_id;
        }
        if let Some(correlation) = socket.correlation {
            self.correlation = correlation;
        }
        if let Some(timeout) = socket.close_timeout_ms {
            self.close_timeout_ms = timeout;
        }
    }

    /// Apply environment variable overrides
    fn apply_environment_overrides(&mut self) {
        if let Ok(address) = std::env::var("SOCKET_ADDRESS") {
            self.address = address;
            info!("Address overridden by environment: {}", self.address);
        }

        if let Ok(interval) = std::env::var("SOCKET_HEARTBEAT_INTERVAL_MS") {
            if let Ok(ms) = interval.parse::<u64>() {
                self.heartbeat_interval_ms = ms;
                info!("Heartbeat interval overridden by environment: {}ms", ms);
            }
        }

        if let Ok(instance_id) = std::env::var("SOCKET_INSTANCE_ID") {
            info!("Instance ID overridden by environment: {}", instance_id);
            self.instance_id = Some(instance_id);
        }

        if let Ok(correlation) = std::env::var("SOCKET_CORRELATION") {
            match parse_correlation(&correlation) {
                Some(mode) => {
                    self.correlation = mode;
                    info!("Correlation overridden by environment: {:?}", mode);
                }
                None => warn!("Ignoring unknown SOCKET_CORRELATION value {:?}", correlation),
            }
        }
    }

    /// Reject settings a session cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_interval_ms == 0 {
            bail!("heartbeat_interval_ms must be greater than zero");
        }
        Ok(())
    }

    /// Convert into the session configuration
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            address: self.address.clone(),
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
            instance_id: self.instance_id.clone(),
            correlation: self.correlation,
            close_timeout: Duration::from_millis(self.close_timeout_ms),
        }
    }
}

/// Parse a correlation mode name (`fifo` or `request_id`)
pub fn parse_correlation(value: &str) -> Option<CorrelationMode> {
    match value.trim().to_lowercase().replace('-', "_").as_str() {
        "fifo" => Some(CorrelationMode::Fifo),
        "request_id" => Some(CorrelationMode::RequestId),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.address, "ws://localhost:8080/");
        assert_eq!(config.heartbeat_interval_ms, 30_000);
        assert_eq!(config.correlation, CorrelationMode::Fifo);
        assert!(config.instance_id.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let yaml_content = r#"
socket:
  address: ws://10.0.0.5:9000/
  heartbeat_interval_ms: 300
  instance_id: worker-1
  correlation: request_id
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml_content.as_bytes()).unwrap();

        let config = ClientConfig::load_from_file(temp_file.path()).unwrap();

        assert_eq!(config.address, "ws://10.0.0.5:9000/");
        assert_eq!(config.heartbeat_interval_ms, 300);
        assert_eq!(config.instance_id.as_deref(), Some("worker-1"));
        assert_eq!(config.correlation, CorrelationMode::RequestId);
        assert_eq!(config.close_timeout_ms, 1000);

        let session = config.to_session_config();
        assert_eq!(session.heartbeat_interval, Duration::from_millis(300));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = ClientConfig::load_from_file("/nonexistent/socket.yaml").unwrap();
        assert_eq!(config.heartbeat_interval_ms, ClientConfig::default().heartbeat_interval_ms);
    }

    #[test]
    fn test_zero_heartbeat_interval_rejected() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"socket:\n  heartbeat_interval_ms: 0\n")
            .unwrap();

        let err = ClientConfig::load_from_file(temp_file.path()).unwrap_err();
        assert!(err.to_string().contains("heartbeat_interval_ms"));
    }

    #[test]
    fn test_parse_correlation() {
        assert_eq!(parse_correlation("FIFO"), Some(CorrelationMode::Fifo));
        assert_eq!(parse_correlation("request-id"), Some(CorrelationMode::RequestId));
        assert_eq!(parse_correlation("random"), None);
    }
}
