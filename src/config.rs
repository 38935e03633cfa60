//! Runtime settings loaded from the environment.

use crate::error::ConfigError;
use crate::taxonomy::{DEFAULT_FIXED_GRID_COLLECTIONS, DEFAULT_SENSORS};
use regex::Regex;
use std::{env, path::PathBuf};

pub const ENV_DATABASE: &str = "COLLECTION_PUBLISHER_DATABASE";
pub const ENV_PREFIX: &str = "COLLECTION_PUBLISHER_PREFIX";
pub const ENV_PREFIX_DATA: &str = "COLLECTION_PUBLISHER_PREFIX_DATA";
pub const ENV_PROCESSED_DIR: &str = "COLLECTION_PUBLISHER_CONTAINER_FILE_PROCESSED";
pub const ENV_LOG_DIR: &str = "COLLECTION_PUBLISHER_CONTAINER_LOG_DIR";
pub const ENV_LOCK_DIR: &str = "COLLECTION_PUBLISHER_LOCK_DIR";
pub const ENV_SENSORS: &str = "COLLECTION_PUBLISHER_LIST";
pub const ENV_FIXED_GRID: &str = "COLLECTION_PUBLISHER_FIXED_GRID";
pub const ENV_TARGET_CRS: &str = "COLLECTION_PUBLISHER_TARGET_CRS";

pub const DEFAULT_TARGET_CRS: &str = "EPSG:4326";

/// Publisher settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Catalog database file
    pub database: PathBuf,
    /// Pattern removed from asset paths before building hrefs
    pub path_prefix: Option<Regex>,
    /// Prefix prepended to every href
    pub href_prefix: String,
    pub processed_dir: PathBuf,
    pub log_dir: PathBuf,
    pub lock_dir: PathBuf,
    /// Sensor codes accepted for families that require sensor validation
    pub sensors: Vec<String>,
    /// Collection identifiers whose geometry comes from the sidecar extent
    pub fixed_grid_collections: Vec<String>,
    pub target_crs: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: PathBuf::from("catalog.sqlite"),
            path_prefix: None,
            href_prefix: String::new(),
            processed_dir: PathBuf::from("processed"),
            log_dir: PathBuf::from("log"),
            lock_dir: env::temp_dir(),
            sensors: DEFAULT_SENSORS.iter().map(|s| s.to_string()).collect(),
            fixed_grid_collections: DEFAULT_FIXED_GRID_COLLECTIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            target_crs: DEFAULT_TARGET_CRS.to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the process environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let path_prefix = match non_empty(ENV_PREFIX) {
            Some(pattern) => Some(Regex::new(&pattern).map_err(|source| ConfigError::Prefix {
                pattern: pattern.clone(),
                source,
            })?),
            None => None,
        };

        Ok(Self {
            database: non_empty(ENV_DATABASE).map(PathBuf::from).unwrap_or(defaults.database),
            path_prefix,
            href_prefix: lookup(ENV_PREFIX_DATA).unwrap_or(defaults.href_prefix),
            processed_dir: non_empty(ENV_PROCESSED_DIR)
                .map(PathBuf::from)
                .unwrap_or(defaults.processed_dir),
            log_dir: non_empty(ENV_LOG_DIR).map(PathBuf::from).unwrap_or(defaults.log_dir),
            lock_dir: non_empty(ENV_LOCK_DIR).map(PathBuf::from).unwrap_or(defaults.lock_dir),
            sensors: non_empty(ENV_SENSORS)
                .map(|v| split_list(&v))
                .unwrap_or(defaults.sensors),
            fixed_grid_collections: non_empty(ENV_FIXED_GRID)
                .map(|v| split_list(&v))
                .unwrap_or(defaults.fixed_grid_collections),
            target_crs: non_empty(ENV_TARGET_CRS).unwrap_or(defaults.target_crs),
        })
    }

    /// Build the catalog href for an absolute asset path.
    pub fn href_for(&self, path: &str) -> String {
        let stripped = match &self.path_prefix {
            Some(re) => re.replace_all(path, ""),
            None => path.into(),
        };
        format!("{}{}", self.href_prefix, stripped)
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
