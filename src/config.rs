//! Ambient configuration (SPEC_FULL.md §3, §6).
//!
//! Loads tool identity and controller connection details from a TOML file.
//! The path is resolved, highest precedence first: an explicit `--config`
//! flag, the `OUTPOST_CONFIG` environment variable, then the platform
//! config directory via `directories::ProjectDirs`.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub ip: String,
    pub port: u16,
    pub default_sleep_secs: u32,
}

#[derive(Debug, Clone)]
pub struct Tool {
    pub name: [u8; 4],
    pub config: ToolConfig,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub tool: Tool,
    pub log_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    tool: RawTool,
    controller: RawController,
    #[serde(default)]
    log: Option<RawLog>,
}

#[derive(Debug, Deserialize)]
struct RawTool {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawController {
    ip: String,
    port: u16,
    default_sleep_secs: u32,
}

#[derive(Debug, Deserialize)]
struct RawLog {
    path: Option<String>,
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "outpost")
}

/// Resolves the config file path, honoring `--config` first, then
/// `OUTPOST_CONFIG`, then the platform config directory.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Ok(path) = std::env::var("OUTPOST_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    project_dirs()
        .map(|dirs| dirs.config_dir().join("outpost.toml"))
        .ok_or(ConfigError::NoConfigDir)
}

fn default_log_path() -> PathBuf {
    match project_dirs() {
        Some(dirs) => dirs
            .runtime_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| dirs.cache_dir().join("outpost.log")),
        None => PathBuf::from("/tmp/outpost.log"),
    }
}

/// Reads and parses the config file at `path`.
pub fn load(path: &Path) -> Result<ResolvedConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw: RawConfig = toml::from_str(&contents)?;

    let name_bytes = raw.tool.name.as_bytes();
    if name_bytes.len() != 4 {
        return Err(ConfigError::ToolNameLength(name_bytes.len()));
    }
    let mut name = [0u8; 4];
    name.copy_from_slice(name_bytes);

    let log_path = raw
        .log
        .and_then(|l| l.path)
        .map(PathBuf::from)
        .unwrap_or_else(default_log_path);

    Ok(ResolvedConfig {
        tool: Tool {
            name,
            config: ToolConfig {
                ip: raw.controller.ip,
                port: raw.controller.port,
                default_sleep_secs: raw.controller.default_sleep_secs,
            },
        },
        log_path,
    })
}
