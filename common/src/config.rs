use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use thiserror::Error;

// UPI virtual payment addresses look like "merchant.name@bank".
static UPI_VPA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9._-]*@[a-z]{2,}$").expect("valid vpa pattern"));

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CommonConfig {
    pub project_name: String,
    pub database_url: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ApiConfig {
    pub server_address: String,
    pub cors_origin: String,
    /// Directory payment proofs are written to.
    pub upload_dir: String,
    /// Public URL prefix under which uploaded proofs are served.
    pub public_base_url: String,
    /// The UPI address shown to customers for manual payment.
    pub upi_vpa: String,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct WorkerConfig {
    pub sleep_ms: u64,
    /// Seconds between membership expiry sweeps.
    #[serde(default = "default_expiry_sweep_secs")]
    pub expiry_sweep_secs: u64,
    pub log_level: String,
}

fn default_expiry_sweep_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    pub common: CommonConfig,
    pub api: ApiConfig,
    pub worker: WorkerConfig,
}

impl Config {
    pub fn load(config_path: &str) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            path: config_path.to_string(),
            source,
        })?;
        let config: Config = serde_yml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.common.database_url.is_empty() {
            return Err(ConfigError::Invalid("common.database_url is empty".into()));
        }
        if !self.api.upi_vpa.is_empty() && !UPI_VPA_RE.is_match(&self.api.upi_vpa) {
            return Err(ConfigError::Invalid(format!(
                "api.upi_vpa {:?} is not a valid UPI address",
                self.api.upi_vpa
            )));
        }
        Ok(())
    }
}
