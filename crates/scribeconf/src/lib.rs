//! Minimal configuration loading for tunescribe.
//!
//! Every value has a compiled default, so the server starts with no config
//! file at all. The one value without a usable default is the generation
//! service credential: prompt conversion stays disabled until it is set.
//!
//! # Usage
//!
//! ```rust,no_run
//! use scribeconf::ScribeConfig;
//!
//! let config = ScribeConfig::load().expect("Failed to load config");
//! println!("Scratch dir: {}", config.paths.scratch_dir.display());
//! println!("HTTP: {}", config.bind.addr());
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/tunescribe/config.toml` (system)
//! 2. `~/.config/tunescribe/config.toml` (user)
//! 3. `./tunescribe.toml` (local override, or the `--config` path)
//! 4. Environment variables (`TUNESCRIBE_*`, `ELEVENLABS_API_KEY`, `RUST_LOG`)
//!
//! # Example Config
//!
//! ```toml
//! [paths]
//! scratch_dir = "/var/tmp/midi-converter"
//!
//! [bind]
//! http_port = 3000
//!
//! [generation]
//! api_key = "sk_..."
//!
//! [transcription]
//! command = "/opt/basic-pitch/bin/basic-pitch"
//! timeout_secs = 120
//! ```

pub mod infra;
pub mod loader;
pub mod services;

pub use infra::{BindConfig, LimitsConfig, PathsConfig, TelemetryConfig};
pub use loader::{discover_config_files_with_override, ConfigSources};
pub use services::{GenerationConfig, TranscriptionConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete tunescribe configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ScribeConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub bind: BindConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub transcription: TranscriptionConfig,
}

impl ScribeConfig {
    /// Load configuration from all sources.
    ///
    /// Load order (later wins):
    /// 1. Compiled defaults
    /// 2. `/etc/tunescribe/config.toml`
    /// 3. `~/.config/tunescribe/config.toml`
    /// 4. `./tunescribe.toml`
    /// 5. Environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration with `config_path` replacing the local override.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and report where values came from.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let files = loader::discover_config_files_with_override(config_path);
        let (mut config, mut sources) = loader::load_files(&files)?;

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Serialize the effective config to TOML, with the credential redacted.
    pub fn to_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# tunescribe configuration\n\n");

        output.push_str("[paths]\n");
        output.push_str(&format!(
            "scratch_dir = \"{}\"\n",
            self.paths.scratch_dir.display()
        ));

        output.push_str("\n[bind]\n");
        output.push_str(&format!("host = \"{}\"\n", self.bind.host));
        output.push_str(&format!("http_port = {}\n", self.bind.http_port));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!(
            "otlp_endpoint = \"{}\"\n",
            self.telemetry.otlp_endpoint
        ));
        output.push_str(&format!("log_level = \"{}\"\n", self.telemetry.log_level));

        output.push_str("\n[limits]\n");
        output.push_str(&format!(
            "max_upload_bytes = {}\n",
            self.limits.max_upload_bytes
        ));

        output.push_str("\n[generation]\n");
        match self.generation.credential() {
            Some(_) => output.push_str("api_key = \"<redacted>\"\n"),
            None => output.push_str("# api_key is not set; prompt conversion is disabled\n"),
        }
        output.push_str(&format!("base_url = \"{}\"\n", self.generation.base_url));
        output.push_str(&format!("model_id = \"{}\"\n", self.generation.model_id));
        output.push_str(&format!(
            "output_format = \"{}\"\n",
            self.generation.output_format
        ));
        output.push_str(&format!(
            "request_timeout_secs = {}\n",
            self.generation.request_timeout_secs
        ));

        output.push_str("\n[transcription]\n");
        output.push_str(&format!("command = \"{}\"\n", self.transcription.command));
        output.push_str(&format!(
            "timeout_secs = {}\n",
            self.transcription.timeout_secs
        ));

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ScribeConfig::default();
        assert_eq!(config.bind.http_port, 3000);
        assert_eq!(config.transcription.timeout_secs, 120);
        assert!(config.generation.credential().is_none());
    }

    #[test]
    fn test_to_toml_redacts_key() {
        let mut config = ScribeConfig::default();
        config.generation.api_key = Some("sk-very-secret".to_string());

        let toml = config.to_toml();
        assert!(toml.contains("[paths]"));
        assert!(toml.contains("[transcription]"));
        assert!(toml.contains("<redacted>"));
        assert!(!toml.contains("sk-very-secret"));
    }

    #[test]
    fn test_to_toml_parses_back() {
        let config = ScribeConfig::default();
        let parsed: ScribeConfig = toml::from_str(&config.to_toml()).unwrap();
        assert_eq!(parsed.bind, config.bind);
        assert_eq!(parsed.transcription, config.transcription);
        assert_eq!(parsed.limits, config.limits);
    }
}
