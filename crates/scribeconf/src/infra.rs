//! Infrastructure configuration - things that cannot change at runtime.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Filesystem paths used by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root under which each request gets its own scratch directory.
    /// Default: <system temp>/midi-converter
    #[serde(default = "PathsConfig::default_scratch_dir")]
    pub scratch_dir: PathBuf,
}

impl PathsConfig {
    fn default_scratch_dir() -> PathBuf {
        std::env::temp_dir().join("midi-converter")
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            scratch_dir: Self::default_scratch_dir(),
        }
    }
}

/// Network bind address for the HTTP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindConfig {
    /// Interface to listen on.
    /// Default: 0.0.0.0
    #[serde(default = "BindConfig::default_host")]
    pub host: String,

    /// HTTP port for the conversion and health endpoints.
    /// Default: 3000
    #[serde(default = "BindConfig::default_http_port")]
    pub http_port: u16,
}

impl BindConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_http_port() -> u16 {
        3000
    }

    /// `host:port` string suitable for a TCP listener.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            http_port: Self::default_http_port(),
        }
    }
}

/// Telemetry and observability configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint for OpenTelemetry trace export.
    /// Empty disables export; logs still go to stderr.
    #[serde(default)]
    pub otlp_endpoint: String,

    /// Log level or filter directive (trace, debug, info, warn, error).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }

    /// The OTLP endpoint, if export is enabled.
    pub fn otlp(&self) -> Option<&str> {
        let endpoint = self.otlp_endpoint.trim();
        (!endpoint.is_empty()).then_some(endpoint)
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: String::new(),
            log_level: Self::default_log_level(),
        }
    }
}

/// Request size limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Largest accepted request body, in bytes. Applies to uploads.
    /// Default: 100 MiB
    #[serde(default = "LimitsConfig::default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl LimitsConfig {
    fn default_max_upload_bytes() -> usize {
        100 * 1024 * 1024
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: Self::default_max_upload_bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_defaults() {
        let paths = PathsConfig::default();
        assert!(paths.scratch_dir.ends_with("midi-converter"));
    }

    #[test]
    fn test_bind_defaults() {
        let bind = BindConfig::default();
        assert_eq!(bind.http_port, 3000);
        assert_eq!(bind.addr(), "0.0.0.0:3000");
    }

    #[test]
    fn test_telemetry_defaults() {
        let telemetry = TelemetryConfig::default();
        assert_eq!(telemetry.otlp(), None);
        assert_eq!(telemetry.log_level, "info");

        let enabled = TelemetryConfig {
            otlp_endpoint: " 127.0.0.1:4317 ".to_string(),
            ..Default::default()
        };
        assert_eq!(enabled.otlp(), Some("127.0.0.1:4317"));
    }

    #[test]
    fn test_limits_defaults() {
        assert_eq!(LimitsConfig::default().max_upload_bytes, 104_857_600);
    }
}
