//! Configuration for the profile store.
//!
//! Every value has a compiled default and can be overridden at runtime via a
//! dedicated environment variable. The database path is resolved with the
//! following precedence:
//! 1. PROFILE_STORE_DB_PATH environment variable
//! 2. ~/.config/profile-store/players.db (production default)
//! 3. ./data/players.db (fallback for development)

use std::path::PathBuf;

use crate::model::ChatColors;
use crate::sqlite::codec;

const DEFAULT_CONFIG_DIR: &str = ".config/profile-store";
const DEV_DATA_DIR: &str = "./data";
const DATABASE_FILE: &str = "players.db";

/// Default size of the connection pool.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Get the path of the SQLite database file.
pub fn get_database_path() -> PathBuf {
    if let Ok(path) = std::env::var("PROFILE_STORE_DB_PATH") {
        return PathBuf::from(path);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(DEFAULT_CONFIG_DIR).join(DATABASE_FILE);
    }

    PathBuf::from(DEV_DATA_DIR).join(DATABASE_FILE)
}

/// Get the maximum number of pooled connections.
///
/// Priority:
/// 1. `PROFILE_STORE_MAX_CONNECTIONS` if set and a positive integer
/// 2. `5` as fallback
pub fn get_max_connections() -> u32 {
    std::env::var("PROFILE_STORE_MAX_CONNECTIONS")
        .ok()
        .and_then(|raw| parse_max_connections(&raw))
        .unwrap_or(DEFAULT_MAX_CONNECTIONS)
}

/// Get the colors given to players whose row has none stored.
///
/// `PROFILE_STORE_DEFAULT_COLORS` uses the same `fg,bg` encoding as the
/// `colors` column; anything else falls back to `&f,&7`.
pub fn get_default_colors() -> ChatColors {
    let fallback = ChatColors::default();
    match std::env::var("PROFILE_STORE_DEFAULT_COLORS") {
        Ok(raw) => codec::decode_colors(Some(&raw), &fallback),
        Err(_) => fallback,
    }
}

/// Get the operator override of the legacy-schema probe.
///
/// `None` means the schema is inspected at startup.
pub fn get_legacy_schema_override() -> Option<bool> {
    std::env::var("PROFILE_STORE_LEGACY_SCHEMA")
        .ok()
        .and_then(|raw| parse_legacy_flag(&raw))
}

fn parse_max_connections(raw: &str) -> Option<u32> {
    raw.trim().parse().ok().filter(|n| *n > 0)
}

fn parse_legacy_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Runtime settings for opening the stores.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database_path: PathBuf,
    pub max_connections: u32,
    pub default_colors: ChatColors,
    /// Forces the legacy probe result when set.
    pub legacy_schema: Option<bool>,
}

impl StoreConfig {
    pub fn from_env() -> Self {
        Self {
            database_path: get_database_path(),
            max_connections: get_max_connections(),
            default_colors: get_default_colors(),
            legacy_schema: get_legacy_schema_override(),
        }
    }

    /// Defaults for everything except the database location.
    pub fn at_path(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            default_colors: ChatColors::default(),
            legacy_schema: None,
        }
    }
}
