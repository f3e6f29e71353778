use partdb_kernel::{SpecRegistry, TypedValue, builtin_registry, parse};
use partdb_store::{JsonlDriver, PartRepository, RepoError};
use serde::Deserialize;
use serde_json::Value;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_CONFIG: &str = include_str!("default_config.toml");
pub const LOCAL_CONFIG_PATH: &str = "partdb.toml";
pub const LOG_ENV: &str = "PARTDB_LOG";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CliConfig {
    pub store: StoreSection,
    pub log: LogSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogSection {
    pub filter: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

fn parse_config(text: &str, origin: &str) -> Result<CliConfig, ConfigError> {
    toml::from_str(text).map_err(|source| ConfigError::Parse {
        path: origin.to_string(),
        source,
    })
}

/// `--config`, then `./partdb.toml`, then the embedded default.
pub fn load_config(explicit: Option<&str>) -> Result<CliConfig, ConfigError> {
    let path = match explicit {
        Some(path) => Some(PathBuf::from(path)),
        None => Some(PathBuf::from(LOCAL_CONFIG_PATH)).filter(|p| p.is_file()),
    };
    let Some(path) = path else {
        return parse_config(DEFAULT_CONFIG, "<default>");
    };
    let origin = path.display().to_string();
    let text = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: origin.clone(),
        source,
    })?;
    parse_config(&text, &origin)
}

pub fn load_config_or_exit(explicit: Option<&str>) -> CliConfig {
    load_config(explicit).unwrap_or_else(|e| exit_with(e))
}

/// Install the stderr subscriber. `PARTDB_LOG` wins over the config filter.
pub fn init_tracing(config: &CliConfig) {
    let filter = std::env::var(LOG_ENV)
        .ok()
        .filter(|f| !f.trim().is_empty())
        .unwrap_or_else(|| config.log.filter.clone());
    let filter = EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub fn exit_with(error: impl Display) -> ! {
    eprintln!("error: {error}");
    std::process::exit(1);
}

pub fn store_root(config: &CliConfig, override_path: Option<&str>) -> PathBuf {
    PathBuf::from(override_path.unwrap_or(&config.store.path))
}

pub fn existing_driver_or_exit(root: &Path) -> JsonlDriver {
    if !root.is_dir() {
        exit_with(format!(
            "store not found: {}; run `partdb init`",
            root.display()
        ));
    }
    JsonlDriver::new(root)
}

/// Open the repository, refusing while a migration is pending.
pub fn open_repo_or_exit(root: &Path) -> PartRepository<'static, JsonlDriver> {
    let driver = existing_driver_or_exit(root);
    debug!(store = %root.display(), "opening repository");
    PartRepository::open(builtin_registry(), driver).unwrap_or_else(|e| exit_with(e))
}

pub fn repo_or_exit<T>(result: Result<T, RepoError>) -> T {
    result.unwrap_or_else(|e| match e {
        RepoError::DuplicateIpn(_) => exit_with(format!("{e}; use `stock add` instead")),
        RepoError::DuplicatePcb { .. } => exit_with(format!("{e}; use `pcb stock add` instead")),
        other => exit_with(other),
    })
}

/// Split `name=value`.
pub fn split_assignment(raw: &str) -> Result<(&str, &str), String> {
    raw.split_once('=')
        .map(|(name, value)| (name.trim(), value))
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| format!("expected FIELD=VALUE, got `{raw}`"))
}

/// Parse one `--set` value against the field's declared kind and units.
pub fn parse_assignment(
    registry: &SpecRegistry,
    type_name: &str,
    name: &str,
    raw: &str,
) -> Result<Option<TypedValue>, String> {
    let field = registry
        .field(type_name, name)
        .map_err(|e| e.to_string())?;
    let (value, _) = parse(raw, field, false).map_err(|e| e.to_string())?;
    Ok(value)
}

pub fn print_json(payload: &Value) {
    match serde_json::to_string_pretty(payload) {
        Ok(text) => println!("{text}"),
        Err(e) => exit_with(format!("json serialization: {e}")),
    }
}

pub fn to_json_or_exit(value: &impl serde::Serialize) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| exit_with(format!("json serialization: {e}")))
}
