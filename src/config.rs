use crate::model::Settings;
use anyhow::{Context, Result};
use std::env;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const APP_DIR: &str = "battlr";
const SETTINGS_FILE: &str = "settings.json";
const LOG_FILE: &str = "battlr.log";
const DEFAULT_LOG_FILTER: &str = "battlr=info";

pub fn config_root() -> Result<PathBuf> {
    if let Ok(override_dir) = env::var("BATTLR_CONFIG_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .context("neither HOME nor USERPROFILE is set")?;
    Ok(PathBuf::from(home).join(".config").join(APP_DIR))
}

pub fn settings_path() -> Result<PathBuf> {
    Ok(config_root()?.join(SETTINGS_FILE))
}

pub fn ensure_config_dir() -> Result<PathBuf> {
    let root = config_root()?;
    fs::create_dir_all(&root).with_context(|| format!("failed to create {}", root.display()))?;
    Ok(root)
}

pub fn load_settings() -> Result<Settings> {
    let path = settings_path()?;
    if !path.exists() {
        return Ok(Settings::default());
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    let settings: Settings = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse settings file {}", path.display()))?;
    Ok(settings)
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    ensure_config_dir()?;
    let path = settings_path()?;
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Logs go to a file in the config root; the terminal belongs to the UI.
/// `RUST_LOG` overrides the default filter.
pub fn init_logging() -> Result<PathBuf> {
    let path = ensure_config_dir()?.join(LOG_FILE);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to install logger: {err}"))?;
    Ok(path)
}

pub fn normalize_path(path: &Path) -> PathBuf {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    strip_windows_verbatim_prefix(&canonical)
}

pub fn strip_windows_verbatim_prefix(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();

    if let Some(trimmed) = raw.strip_prefix(r"\\?\UNC\") {
        return PathBuf::from(format!(r"\\{trimmed}"));
    }

    if let Some(trimmed) = raw.strip_prefix(r"\\?\") {
        return PathBuf::from(trimmed);
    }

    path.to_path_buf()
}
