use thiserror::Error;

use crate::client::GcsAuth;
use crate::target::TargetKind;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub target: TargetKind,
    /// Directory holding the persisted deployment state.
    pub state_dir: String,
    pub server: ServerConfig,
    pub gcp: GcpConfig,
    /// Enables dangerous operations like purge. Must never be true in production.
    pub test_mode: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the simulator HTTP service listens on.
    pub bind_address: String,
}

#[derive(Debug, Clone)]
pub struct GcpConfig {
    /// Required when the target is gcp
    pub project_id: Option<String>,
    pub storage_location: String,
    /// Path to a service account JSON key (optional, defaults to the metadata server)
    pub credentials_file: Option<String>,
    /// Alternate GCS API endpoint, e.g. an emulator
    pub endpoint: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:4000".to_string(),
        }
    }
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            storage_location: "US".to_string(),
            credentials_file: None,
            endpoint: None,
        }
    }
}

impl GcpConfig {
    pub fn auth(&self) -> GcsAuth {
        match &self.credentials_file {
            Some(path) => GcsAuth::ServiceAccount(path.clone()),
            None => GcsAuth::MetadataServer,
        }
    }
}

impl Config {
    /// Read environment variables without validating, so command line
    /// overrides can be applied first.
    pub fn from_env() -> Result<Self, ConfigError> {
        let target = match std::env::var("TARGET") {
            Ok(value) => value.parse().map_err(ConfigError::ValidationError)?,
            Err(_) => TargetKind::default(),
        };

        let state_dir = std::env::var("STATE_DIR").unwrap_or_else(|_| "./.state".to_string());

        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "127.0.0.1:4000".to_string());

        let project_id = std::env::var("GCP_PROJECT")
            .or_else(|_| std::env::var("GOOGLE_CLOUD_PROJECT"))
            .ok()
            .filter(|p| !p.trim().is_empty());

        let storage_location =
            std::env::var("GCP_STORAGE_LOCATION").unwrap_or_else(|_| "US".to_string());

        let credentials_file = std::env::var("GCS_CREDENTIALS_FILE").ok();
        let endpoint = std::env::var("GCS_ENDPOINT").ok();

        let test_mode = std::env::var("TEST_MODE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Ok(Config {
            target,
            state_dir,
            server: ServerConfig { bind_address },
            gcp: GcpConfig {
                project_id,
                storage_location,
                credentials_file,
                endpoint,
            },
            test_mode,
        })
    }

    /// Apply command line overrides, then validate the result.
    pub fn with_overrides(
        mut self,
        state_dir: Option<String>,
        target: Option<TargetKind>,
    ) -> Result<Self, ConfigError> {
        if let Some(state_dir) = state_dir {
            self.state_dir = state_dir;
        }
        if let Some(target) = target {
            self.target = target;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check the settings the selected target depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.state_dir.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "STATE_DIR cannot be empty".to_string(),
            ));
        }

        if matches!(self.target, TargetKind::Gcp) && self.gcp.project_id.is_none() {
            return Err(ConfigError::ValidationError(
                "GCP_PROJECT is required when TARGET=gcp".to_string(),
            ));
        }

        if self.test_mode && matches!(self.target, TargetKind::Gcp) {
            tracing::warn!("TEST_MODE only affects the simulator service and is ignored for gcp");
        }

        Ok(())
    }
}
