//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, ScribeConfig};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli).
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/tunescribe/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("tunescribe/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("tunescribe.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Load and merge config files in order, later files winning key by key.
pub fn load_files(files: &[PathBuf]) -> Result<(ScribeConfig, ConfigSources), ConfigError> {
    let mut sources = ConfigSources::default();
    let mut merged = toml::Table::new();

    for path in files {
        let table = load_table(path)?;
        merge_tables(&mut merged, table);
        sources.files.push(path.clone());
    }

    let origin = files.last().cloned().unwrap_or_default();
    let mut config: ScribeConfig = toml::Value::Table(merged)
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: origin,
            message: e.to_string(),
        })?;

    config.paths.scratch_dir = expand_path(&config.paths.scratch_dir.to_string_lossy());

    Ok((config, sources))
}

/// Read one config file as a raw TOML table.
pub fn load_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_toml(&contents, path)
}

/// Parse a TOML string, checking it against the config schema on its own so
/// type errors point at the file that caused them.
fn parse_toml(contents: &str, path: &Path) -> Result<toml::Table, ConfigError> {
    let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    toml::Value::Table(table.clone())
        .try_into::<ScribeConfig>()
        .map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    Ok(table)
}

/// Merge `overlay` into `base`. Nested tables merge recursively; any other
/// value in `overlay` replaces the one in `base`.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut ScribeConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, |key| env::var(key).ok());
}

/// Apply overrides from an arbitrary lookup; `apply_env_overrides` passes the
/// process environment.
pub fn apply_overrides_from<F>(config: &mut ScribeConfig, sources: &mut ConfigSources, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let mut env = Overrides {
        lookup,
        sources,
    };

    if let Some(v) = env.take::<String>("TUNESCRIBE_SCRATCH_DIR") {
        config.paths.scratch_dir = expand_path(&v);
    }

    if let Some(v) = env.take("TUNESCRIBE_HOST") {
        config.bind.host = v;
    }
    if let Some(port) = env.take("TUNESCRIBE_HTTP_PORT") {
        config.bind.http_port = port;
    }

    if let Some(v) = env.take("TUNESCRIBE_OTLP_ENDPOINT") {
        config.telemetry.otlp_endpoint = v;
    }
    // Also support standard OTEL env var
    if let Some(v) = env.take("OTEL_EXPORTER_OTLP_ENDPOINT") {
        config.telemetry.otlp_endpoint = v;
    }
    if let Some(v) = env.take("TUNESCRIBE_LOG_LEVEL") {
        config.telemetry.log_level = v;
    }
    if let Some(v) = env.take("RUST_LOG") {
        config.telemetry.log_level = v;
    }

    if let Some(bytes) = env.take("TUNESCRIBE_MAX_UPLOAD_BYTES") {
        config.limits.max_upload_bytes = bytes;
    }

    if let Some(v) = env.take("ELEVENLABS_API_KEY") {
        config.generation.api_key = Some(v);
    }
    if let Some(v) = env.take("TUNESCRIBE_GENERATION_URL") {
        config.generation.base_url = v;
    }

    if let Some(v) = env.take("TUNESCRIBE_BASIC_PITCH") {
        config.transcription.command = v;
    }
    if let Some(secs) = env.take("TUNESCRIBE_TRANSCRIBE_TIMEOUT_SECS") {
        config.transcription.timeout_secs = secs;
    }
}

/// Variable lookup that records each override it hands out.
struct Overrides<'a, F> {
    lookup: F,
    sources: &'a mut ConfigSources,
}

impl<F> Overrides<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Parsed value of `key`. Unparseable values are skipped and not recorded.
    fn take<T: FromStr>(&mut self, key: &str) -> Option<T> {
        let value = (self.lookup)(key)?.parse().ok()?;
        self.sources.env_overrides.push(key.to_string());
        Some(value)
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            home.join(stripped)
        } else {
            PathBuf::from(path)
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // Handle $VAR/rest/of/path
        if let Some(slash_pos) = stripped.find('/') {
            let var_name = &stripped[..slash_pos];
            if let Ok(var_value) = env::var(var_name) {
                PathBuf::from(var_value).join(&stripped[slash_pos + 1..])
            } else {
                PathBuf::from(path)
            }
        } else {
            env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path))
        }
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path("~/test/path");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().contains("test/path"));
    }

    #[test]
    fn test_expand_path_absolute() {
        let expanded = expand_path("/absolute/path");
        assert_eq!(expanded, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_discover_config_files() {
        // Just verify it doesn't panic
        let _files = discover_config_files();
    }

    #[test]
    fn test_parse_rejects_wrong_types() {
        let toml = r#"
[bind]
http_port = "not a number"
"#;
        let err = parse_toml(toml, Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { ref path, .. } if path == Path::new("bad.toml")));
    }

    #[test]
    fn test_load_files_later_wins() {
        let dir = tempfile::TempDir::new().unwrap();
        let system = dir.path().join("system.toml");
        let local = dir.path().join("local.toml");
        std::fs::write(
            &system,
            r#"
[bind]
host = "127.0.0.1"
http_port = 4000

[generation]
api_key = "from-system"
"#,
        )
        .unwrap();
        std::fs::write(&local, "[bind]\nhttp_port = 5000\n").unwrap();

        let (config, sources) = load_files(&[system.clone(), local.clone()]).unwrap();

        assert_eq!(config.bind.host, "127.0.0.1");
        assert_eq!(config.bind.http_port, 5000);
        assert_eq!(config.generation.credential(), Some("from-system"));
        assert_eq!(config.transcription.command, "basic-pitch");
        assert_eq!(sources.files, vec![system, local]);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_table(Path::new("/nonexistent/tunescribe.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }

    #[test]
    fn test_merge_tables_nested() {
        let mut base: toml::Table = r#"
[bind]
host = "127.0.0.1"
http_port = 3000
"#
        .parse()
        .unwrap();
        let overlay: toml::Table = r#"
[bind]
http_port = 9000

[transcription]
timeout_secs = 30
"#
        .parse()
        .unwrap();

        merge_tables(&mut base, overlay);

        let bind = base["bind"].as_table().unwrap();
        assert_eq!(bind["host"].as_str(), Some("127.0.0.1"));
        assert_eq!(bind["http_port"].as_integer(), Some(9000));
        assert_eq!(base["transcription"]["timeout_secs"].as_integer(), Some(30));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("ELEVENLABS_API_KEY", "sk-test"),
            ("TUNESCRIBE_HTTP_PORT", "8123"),
            ("TUNESCRIBE_HTTP_PORT_IGNORED", "1"),
            ("TUNESCRIBE_BASIC_PITCH", "/usr/local/bin/basic-pitch"),
            ("TUNESCRIBE_TRANSCRIBE_TIMEOUT_SECS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = ScribeConfig::default();
        let mut sources = ConfigSources::default();
        apply_overrides_from(&mut config, &mut sources, |key| {
            vars.get(key).map(|v| v.to_string())
        });

        assert_eq!(config.generation.credential(), Some("sk-test"));
        assert_eq!(config.bind.http_port, 8123);
        assert_eq!(config.transcription.command, "/usr/local/bin/basic-pitch");
        // Unparseable values leave the default in place
        assert_eq!(config.transcription.timeout_secs, 120);
        assert!(sources.env_overrides.contains(&"ELEVENLABS_API_KEY".to_string()));
        assert!(!sources
            .env_overrides
            .contains(&"TUNESCRIBE_TRANSCRIBE_TIMEOUT_SECS".to_string()));
    }

    #[test]
    fn test_unparseable_env_not_recorded() {
        let vars: HashMap<&str, &str> = [
            ("TUNESCRIBE_HTTP_PORT", "abc"),
            ("TUNESCRIBE_MAX_UPLOAD_BYTES", "-5"),
            ("TUNESCRIBE_HOST", "0.0.0.0"),
        ]
        .into_iter()
        .collect();

        let mut config = ScribeConfig::default();
        let mut sources = ConfigSources::default();
        apply_overrides_from(&mut config, &mut sources, |key| {
            vars.get(key).map(|v| v.to_string())
        });

        assert_eq!(config.bind.http_port, ScribeConfig::default().bind.http_port);
        assert_eq!(sources.env_overrides, vec!["TUNESCRIBE_HOST".to_string()]);
    }
}
