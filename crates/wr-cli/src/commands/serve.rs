//! Serve command implementation

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use wr_core::config::{self, RelayConfig};

/// Command-line overrides for `serve`
#[derive(Debug, Default)]
pub struct ServeOverrides {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub pairing_code: bool,
    pub phone_number: Option<String>,
    pub mobile: bool,
}

impl ServeOverrides {
    /// Apply the overrides on top of the file configuration
    pub fn apply(self, config: &mut RelayConfig) {
        if let Some(bind) = self.bind {
            config.http.bind_address = bind;
        }
        if let Some(port) = self.port {
            config.http.port = port;
        }
        if self.pairing_code {
            config.pairing.enabled = true;
        }
        if self.phone_number.is_some() {
            config.pairing.phone_number = self.phone_number;
        }
        if self.mobile {
            config.pairing.mobile = true;
        }
    }
}

/// Load the relay configuration.
///
/// An explicit path must load; the default path falls back to defaults
/// with a warning.
pub fn load_relay_config(config_path: Option<&PathBuf>) -> Result<RelayConfig> {
    if let Some(path) = config_path {
        return config::load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path));
    }

    let default_path = config::default_config_path();
    if default_path.exists() {
        Ok(config::load_config(&default_path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
            RelayConfig::default()
        }))
    } else {
        tracing::info!("Using default configuration");
        Ok(RelayConfig::default())
    }
}

/// Run the relay in the foreground until Ctrl+C or SIGTERM
pub async fn serve_command(config_path: Option<&PathBuf>, overrides: ServeOverrides) -> Result<()> {
    let mut config = load_relay_config(config_path)?;
    overrides.apply(&mut config);

    tracing::info!("wa-relay starting...");

    let cancel = CancellationToken::new();
    wr_gateway::shutdown_on_signal(cancel.clone());

    wr_gateway::run(config, cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_applied() {
        let mut config = RelayConfig::default();
        ServeOverrides {
            port: Some(8080),
            phone_number: Some("201148795529".to_string()),
            ..Default::default()
        }
        .apply(&mut config);

        assert_eq!(config.http.port, 8080);
        assert_eq!(config.http.bind_address, "0.0.0.0");
        assert!(config.pairing.is_selected());
        assert!(!config.pairing.mobile);
    }

    #[test]
    fn test_explicit_config_must_exist() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(load_relay_config(Some(&missing)).is_err());
    }
}
