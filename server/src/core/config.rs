use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::data::queues::{QueueCapacities, QueueKind};
use crate::utils::file::expand_path;

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_HOST, DEFAULT_MAX_BODY_BYTES,
    DEFAULT_MAX_DECOMPRESSED_BYTES, DEFAULT_PORT, DEFAULT_RETRY_AFTER_SECS, DEFAULT_WRITE_PATH,
    HEALTH_PATH,
};

// =============================================================================
// File Config Structs (JSON, every field optional)
// =============================================================================

/// Server configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub write_path: Option<String>,
}

/// Dispatch queue capacities. `capacity` applies to every kind not set
/// explicitly.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct QueuesFileConfig {
    pub capacity: Option<usize>,
    pub series: Option<usize>,
    pub samples: Option<usize>,
    pub exemplars: Option<usize>,
    pub histograms: Option<usize>,
}

/// Ingestion limits and advisories
#[derive(Debug, Default, Clone, Deserialize)]
pub struct IngestFileConfig {
    pub retry_after_secs: Option<u64>,
    pub max_body_bytes: Option<usize>,
    pub max_decompressed_bytes: Option<usize>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerFileConfig>,
    pub queues: Option<QueuesFileConfig>,
    pub ingest: Option<IngestFileConfig>,
    pub debug: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        if let Some(server) = other.server {
            let current = self.server.get_or_insert_with(ServerFileConfig::default);
            if server.host.is_some() {
                tracing::trace!(host = ?server.host, "Merging server.host");
                current.host = server.host;
            }
            if server.port.is_some() {
                tracing::trace!(port = ?server.port, "Merging server.port");
                current.port = server.port;
            }
            if server.write_path.is_some() {
                tracing::trace!(write_path = ?server.write_path, "Merging server.write_path");
                current.write_path = server.write_path;
            }
        }

        if let Some(queues) = other.queues {
            let current = self.queues.get_or_insert_with(QueuesFileConfig::default);
            if queues.capacity.is_some() {
                current.capacity = queues.capacity;
            }
            if queues.series.is_some() {
                current.series = queues.series;
            }
            if queues.samples.is_some() {
                current.samples = queues.samples;
            }
            if queues.exemplars.is_some() {
                current.exemplars = queues.exemplars;
            }
            if queues.histograms.is_some() {
                current.histograms = queues.histograms;
            }
            tracing::trace!(queues = ?current, "Merged queues");
        }

        if let Some(ingest) = other.ingest {
            let current = self.ingest.get_or_insert_with(IngestFileConfig::default);
            if ingest.retry_after_secs.is_some() {
                current.retry_after_secs = ingest.retry_after_secs;
            }
            if ingest.max_body_bytes.is_some() {
                current.max_body_bytes = ingest.max_body_bytes;
            }
            if ingest.max_decompressed_bytes.is_some() {
                current.max_decompressed_bytes = ingest.max_decompressed_bytes;
            }
            tracing::trace!(ingest = ?current, "Merged ingest");
        }

        if other.debug.is_some() {
            self.debug = other.debug;
        }
    }
}

// =============================================================================
// Runtime Config Structs (final merged configuration)
// =============================================================================

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub write_path: String,
}

/// Ingestion configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestConfig {
    pub retry_after_secs: u64,
    pub max_body_bytes: usize,
    pub max_decompressed_bytes: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            retry_after_secs: DEFAULT_RETRY_AFTER_SECS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            max_decompressed_bytes: DEFAULT_MAX_DECOMPRESSED_BYTES,
        }
    }
}

/// Final merged application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub queues: QueueCapacities,
    pub ingest: IngestConfig,
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_HOST.to_string(),
                port: DEFAULT_PORT,
                write_path: DEFAULT_WRITE_PATH.to_string(),
            },
            queues: QueueCapacities::default(),
            ingest: IngestConfig::default(),
            debug: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.promwrite/promwrite.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        Self::load_from(cli, get_profile_config_path().as_deref())
    }

    fn load_from(cli: &CliConfig, profile_path: Option<&Path>) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        // 1. Profile dir - skip if not exists
        if let Some(profile_path) = profile_path
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        // 2. CLI-specified path OR local directory
        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_path(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        // 3. Layer: defaults -> file config -> CLI/env overrides
        let defaults = AppConfig::default();
        let file_server = file_config.server.unwrap_or_default();
        let file_queues = file_config.queues.unwrap_or_default();
        let file_ingest = file_config.ingest.unwrap_or_default();

        let server = ServerConfig {
            host: cli
                .host
                .clone()
                .or(file_server.host)
                .unwrap_or(defaults.server.host),
            port: cli.port.or(file_server.port).unwrap_or(defaults.server.port),
            write_path: cli
                .write_path
                .clone()
                .or(file_server.write_path)
                .unwrap_or(defaults.server.write_path),
        };

        let capacity = |kind: QueueKind, cli_kind: Option<usize>, file_kind: Option<usize>| {
            cli_kind
                .or(cli.queue_capacity)
                .or(file_kind)
                .or(file_queues.capacity)
                .unwrap_or(defaults.queues.get(kind))
        };
        let queues = QueueCapacities {
            series: capacity(QueueKind::Series, cli.series_queue, file_queues.series),
            samples: capacity(QueueKind::Samples, cli.samples_queue, file_queues.samples),
            exemplars: capacity(
                QueueKind::Exemplars,
                cli.exemplars_queue,
                file_queues.exemplars,
            ),
            histograms: capacity(
                QueueKind::Histograms,
                cli.histograms_queue,
                file_queues.histograms,
            ),
        };

        let ingest = IngestConfig {
            retry_after_secs: cli
                .retry_after
                .or(file_ingest.retry_after_secs)
                .unwrap_or(defaults.ingest.retry_after_secs),
            max_body_bytes: file_ingest
                .max_body_bytes
                .unwrap_or(defaults.ingest.max_body_bytes),
            max_decompressed_bytes: file_ingest
                .max_decompressed_bytes
                .unwrap_or(defaults.ingest.max_decompressed_bytes),
        };

        // debug: CLI/env flag takes precedence, then file config, default false
        let debug = cli.debug || file_config.debug.unwrap_or(false);

        let config = AppConfig {
            server,
            queues,
            ingest,
            debug,
        };

        config.validate()?;

        tracing::debug!(
            host = %config.server.host,
            port = config.server.port,
            write_path = %config.server.write_path,
            series_queue = config.queues.series,
            samples_queue = config.queues.samples,
            exemplars_queue = config.queues.exemplars,
            histograms_queue = config.queues.histograms,
            retry_after_secs = config.ingest.retry_after_secs,
            max_body_bytes = config.ingest.max_body_bytes,
            max_decompressed_bytes = config.ingest.max_decompressed_bytes,
            debug = config.debug,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            anyhow::bail!("Configuration error: server.host must not be empty");
        }

        // Port 0 is only useful for tests, which build the server directly
        if self.server.port == 0 {
            anyhow::bail!("Configuration error: server.port must be greater than 0");
        }

        if !self.server.write_path.starts_with('/') {
            anyhow::bail!(
                "Configuration error: server.write_path must start with '/' (got '{}')",
                self.server.write_path
            );
        }

        if self.server.write_path == HEALTH_PATH {
            anyhow::bail!(
                "Configuration error: server.write_path must not be {}",
                HEALTH_PATH
            );
        }

        if self.ingest.max_body_bytes == 0 || self.ingest.max_decompressed_bytes == 0 {
            anyhow::bail!("Configuration error: ingest body limits must be greater than 0");
        }

        for kind in QueueKind::ALL {
            if self.queues.get(kind) == 0 {
                tracing::warn!(
                    queue = %kind,
                    "Queue capacity is 0, every write carrying this kind will be rejected"
                );
            }
        }

        if self.ingest.retry_after_secs == 0 {
            tracing::warn!("ingest.retry_after_secs is 0, clients will retry immediately");
        }

        Ok(())
    }
}

/// Get the profile config path (~/.promwrite/promwrite.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(dir: &tempfile::TempDir, name: &str, json: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(json.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_file_config_parse_full() {
        let json = r#"{
            "server": { "host": "0.0.0.0", "port": 8080, "write_path": "/receive" },
            "queues": { "capacity": 10, "samples": 50 },
            "ingest": { "retry_after_secs": 5 },
            "debug": true
        }"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();

        let server = config.server.as_ref().unwrap();
        assert_eq!(server.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(server.port, Some(8080));
        assert_eq!(server.write_path.as_deref(), Some("/receive"));
        assert_eq!(config.queues.as_ref().unwrap().samples, Some(50));
        assert_eq!(config.ingest.as_ref().unwrap().retry_after_secs, Some(5));
        assert_eq!(config.debug, Some(true));
    }

    #[test]
    fn test_file_config_parse_extra_fields() {
        let json = r#"{ "server": { "host": "localhost" }, "unknown_field": 123 }"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.extra.get("unknown_field").unwrap(), 123);
    }

    #[test]
    fn test_file_config_merge() {
        let mut base: FileConfig =
            serde_json::from_str(r#"{ "server": { "host": "a", "port": 1 }, "queues": { "series": 5 } }"#)
                .unwrap();
        let overlay: FileConfig =
            serde_json::from_str(r#"{ "server": { "port": 2 }, "queues": { "samples": 7 } }"#)
                .unwrap();

        base.merge(overlay);

        let server = base.server.unwrap();
        assert_eq!(server.host.as_deref(), Some("a"));
        assert_eq!(server.port, Some(2));
        let queues = base.queues.unwrap();
        assert_eq!(queues.series, Some(5));
        assert_eq!(queues.samples, Some(7));
    }

    #[test]
    fn test_load_defaults() {
        let config = AppConfig::load_from(&CliConfig::default(), None).unwrap();

        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.server.write_path, DEFAULT_WRITE_PATH);
        assert_eq!(config.queues, QueueCapacities::default());
        assert_eq!(config.ingest.retry_after_secs, 30);
    }

    #[test]
    fn test_load_layers_profile_overlay_and_cli() {
        let dir = tempfile::tempdir().unwrap();
        let profile = write_config(
            &dir,
            "profile.json",
            r#"{ "server": { "host": "10.0.0.1", "port": 7000 }, "queues": { "capacity": 100 } }"#,
        );
        let overlay = write_config(
            &dir,
            "overlay.json",
            r#"{ "server": { "port": 7001 }, "queues": { "histograms": 3 }, "ingest": { "retry_after_secs": 10 } }"#,
        );
        let cli = CliConfig {
            config: Some(overlay),
            samples_queue: Some(9),
            retry_after: Some(15),
            ..Default::default()
        };

        let config = AppConfig::load_from(&cli, Some(&profile)).unwrap();

        assert_eq!(config.server.host, "10.0.0.1");
        assert_eq!(config.server.port, 7001);
        assert_eq!(
            config.queues,
            QueueCapacities {
                series: 100,
                samples: 9,
                exemplars: 100,
                histograms: 3,
            }
        );
        assert_eq!(config.ingest.retry_after_secs, 15);
    }

    #[test]
    fn test_cli_queue_capacity_overrides_file_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "c.json", r#"{ "queues": { "samples": 500 } }"#);
        let cli = CliConfig {
            config: Some(path),
            queue_capacity: Some(0),
            ..Default::default()
        };

        let config = AppConfig::load_from(&cli, None).unwrap();
        assert_eq!(config.queues, QueueCapacities::uniform(0));
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let cli = CliConfig {
            config: Some(PathBuf::from("/nonexistent/promwrite.json")),
            ..Default::default()
        };
        let err = AppConfig::load_from(&cli, None).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "bad.json", "{ not json");
        let cli = CliConfig {
            config: Some(path),
            ..Default::default()
        };
        let err = AppConfig::load_from(&cli, None).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.server.host.clear();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.server.write_path = "api/v1/write".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.server.write_path.clear();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.server.write_path = "/health".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.ingest.max_body_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_allows_zero_capacity() {
        let config = AppConfig {
            queues: QueueCapacities::uniform(0),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
