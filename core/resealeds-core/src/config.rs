//! Configuration loading and saving utilities.
//!
//! Handles paths and persistence for:
//! - View policies (sign-out behaviour, duplicate ids on add)
//! - The default catalog database and log locations

use std::env;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs_err as fs;
use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result};

/// Overrides the base directory (`~/.resealeds`).
pub const HOME_ENV: &str = "RESEALEDS_HOME";

/// What a sign-out does to the cached catalog.
///
/// The catalog is not user-scoped, so clearing it is a product decision
/// rather than a data requirement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignOutPolicy {
    #[default]
    ClearCatalog,
    /// Keep showing the catalog; only the ability to add is revoked.
    KeepCatalog,
}

/// What happens when a confirmed record carries an id already in the list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    #[default]
    Reject,
    Overwrite,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub sign_out_policy: SignOutPolicy,
    pub duplicate_policy: DuplicatePolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
}

impl ViewConfig {
    /// The configured database path, falling back to the default location.
    pub fn resolve_db_path(&self) -> Option<PathBuf> {
        self.db_path.clone().or_else(get_default_db_path)
    }
}

/// Returns the base directory (~/.resealeds, or `$RESEALEDS_HOME`).
pub fn get_resealeds_dir() -> Option<PathBuf> {
    match env::var_os(HOME_ENV) {
        Some(value) if !value.is_empty() => Some(PathBuf::from(value)),
        _ => dirs::home_dir().map(|h| h.join(".resealeds")),
    }
}

pub fn get_config_path() -> Option<PathBuf> {
    get_resealeds_dir().map(|d| d.join("config.json"))
}

pub fn get_default_db_path() -> Option<PathBuf> {
    get_resealeds_dir().map(|d| d.join("catalog.db"))
}

pub fn get_log_dir() -> Option<PathBuf> {
    get_resealeds_dir().map(|d| d.join("logs"))
}

/// Loads the view configuration, returning defaults if the file is missing
/// or unreadable.
pub fn load_view_config() -> ViewConfig {
    get_config_path()
        .map(|path| load_view_config_from(&path))
        .unwrap_or_default()
}

pub fn load_view_config_from(path: &Path) -> ViewConfig {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return ViewConfig::default(),
        Err(err) => {
            tracing::warn!(error = %err, "Failed to read view config; using defaults");
            return ViewConfig::default();
        }
    };

    serde_json::from_str(&content).unwrap_or_else(|err| {
        tracing::warn!(
            path = %path.display(),
            error = %err,
            "View config malformed; using defaults"
        );
        ViewConfig::default()
    })
}

/// Saves the view configuration to the default location.
pub fn save_view_config(config: &ViewConfig) -> Result<()> {
    let path = get_config_path().ok_or(CatalogError::HomeDirNotFound)?;
    save_view_config_to(&path, config)
}

pub fn save_view_config_to(path: &Path, config: &ViewConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| CatalogError::Io {
            context: "create config dir".to_string(),
            source,
        })?;
    }

    let payload = serde_json::to_vec_pretty(config).map_err(|source| CatalogError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, payload).map_err(|source| CatalogError::Io {
        context: "write view config".to_string(),
        source,
    })?;
    fs::rename(&tmp_path, path).map_err(|source| CatalogError::Io {
        context: "commit view config".to_string(),
        source,
    })?;
    Ok(())
}
