//! Layered configuration for otel-snap.
//!
//! Resolution order (later wins): built-in defaults, optional global config
//! file, optional project config file (nearest `.otlp-mcp.json` walking up
//! to the first repository root marker), an explicit `--config` path, then
//! CLI flag overrides. Each layer is a sparse [`ConfigFile`] — only fields
//! actually present in the source override the accumulated value.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Transport used for the agent tool RPC surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Stdio,
    Http,
}

impl Default for Transport {
    fn default() -> Self {
        Self::Stdio
    }
}

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub trace_buffer_size: usize,
    pub log_buffer_size: usize,
    pub metric_buffer_size: usize,

    pub otlp_host: String,
    pub otlp_port: u16,

    pub transport: Transport,
    pub http_host: String,
    pub http_port: u16,
    pub allowed_origins: Vec<String>,
    pub session_timeout: String,
    pub stateless: bool,

    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trace_buffer_size: 10_000,
            log_buffer_size: 50_000,
            metric_buffer_size: 100_000,
            otlp_host: "127.0.0.1".to_string(),
            otlp_port: 0,
            transport: Transport::Stdio,
            http_host: "127.0.0.1".to_string(),
            http_port: 4380,
            allowed_origins: vec![
                "http://localhost:*".to_string(),
                "http://127.0.0.1:*".to_string(),
            ],
            session_timeout: "30m".to_string(),
            stateless: false,
            verbose: false,
        }
    }
}

/// A sparse on-disk or CLI representation of [`Config`]: every field is
/// optional so a layer only overrides what it actually sets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub trace_buffer_size: Option<usize>,
    pub log_buffer_size: Option<usize>,
    pub metric_buffer_size: Option<usize>,
    pub otlp_host: Option<String>,
    pub otlp_port: Option<u16>,
    pub transport: Option<Transport>,
    pub http_host: Option<String>,
    pub http_port: Option<u16>,
    pub allowed_origins: Option<Vec<String>>,
    pub session_timeout: Option<String>,
    pub stateless: Option<bool>,
    pub verbose: Option<bool>,
}

impl ConfigFile {
    fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    fn merge_into(&self, config: &mut Config) {
        macro_rules! overlay {
            ($field:ident) => {
                if let Some(v) = self.$field.clone() {
                    config.$field = v;
                }
            };
        }
        overlay!(trace_buffer_size);
        overlay!(log_buffer_size);
        overlay!(metric_buffer_size);
        overlay!(otlp_host);
        overlay!(otlp_port);
        overlay!(transport);
        overlay!(http_host);
        overlay!(http_port);
        overlay!(allowed_origins);
        overlay!(session_timeout);
        overlay!(stateless);
        overlay!(verbose);
    }
}

/// File name looked for as the project-local config layer.
const PROJECT_CONFIG_FILE_NAME: &str = ".otlp-mcp.json";

/// Where a [`Config`] value ultimately came from; used for startup logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Default,
    GlobalFile,
    ProjectFile,
    ConfigFlag,
    CliArg,
}

impl ConfigSource {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::GlobalFile => "global config",
            Self::ProjectFile => "project config",
            Self::ConfigFlag => "--config",
            Self::CliArg => "cli",
        }
    }
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Path to the user-global config file (`~/.config/otel-snap/config.json`).
#[must_use]
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("otel-snap").join("config.json"))
}

/// Walk up from `start` looking for `.otlp-mcp.json`, stopping once a
/// repository root marker (`.git`) is reached. The config file found at the
/// root itself still counts.
#[must_use]
pub fn find_project_config(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(PROJECT_CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        if dir.join(".git").exists() {
            return None;
        }
        if !dir.pop() {
            return None;
        }
    }
}

impl Config {
    /// Resolve configuration through all layers.
    ///
    /// `explicit_config` is the `--config` flag, if given. `cli_overrides`
    /// carries flags parsed directly on the command line, applied last.
    pub fn resolve(
        explicit_config: Option<&Path>,
        cli_overrides: &ConfigFile,
    ) -> Result<Self> {
        let mut config = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.is_file() {
                ConfigFile::from_path(&global_path)?.merge_into(&mut config);
            }
        }

        let cwd = env::current_dir()?;
        if let Some(project_path) = find_project_config(&cwd) {
            ConfigFile::from_path(&project_path)?.merge_into(&mut config);
        }

        if let Some(path) = explicit_config {
            ConfigFile::from_path(path)?.merge_into(&mut config);
        }

        cli_overrides.merge_into(&mut config);

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_design_doc() {
        let config = Config::default();
        assert_eq!(config.trace_buffer_size, 10_000);
        assert_eq!(config.log_buffer_size, 50_000);
        assert_eq!(config.metric_buffer_size, 100_000);
        assert_eq!(config.transport, Transport::Stdio);
        assert_eq!(config.http_port, 4380);
        assert!(!config.stateless);
    }

    #[test]
    fn layers_overlay_only_present_fields() {
        let mut config = Config::default();
        let layer = ConfigFile {
            http_port: Some(9999),
            ..Default::default()
        };
        layer.merge_into(&mut config);
        assert_eq!(config.http_port, 9999);
        assert_eq!(config.trace_buffer_size, 10_000);
    }

    #[test]
    fn project_config_search_stops_at_repo_root() {
        let tmp = tempfile::tempdir().unwrap();
        let repo_root = tmp.path().join("repo");
        let nested = repo_root.join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::create_dir_all(repo_root.join(".git")).unwrap();
        // No .otlp-mcp.json anywhere: search must stop at the .git marker
        // instead of climbing into the tempdir's ancestors.
        assert_eq!(find_project_config(&nested), None);

        fs::write(repo_root.join(PROJECT_CONFIG_FILE_NAME), "{}").unwrap();
        assert_eq!(
            find_project_config(&nested),
            Some(repo_root.join(PROJECT_CONFIG_FILE_NAME))
        );
    }
}
