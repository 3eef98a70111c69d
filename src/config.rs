use crate::import::pool::DEFAULT_CONCURRENCY;
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_LOG_FILE: &str = "dcp-import.log";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("'{0}' is not a valid table name")]
    InvalidTableName(String),
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Table names used by the candidate query, the insert and the server check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub metadata: String,
    pub presentations: String,
    /// `None` reads the server version instead of an info table.
    pub db_info: Option<String>,
}

impl TableNames {
    pub fn from_env() -> Result<Self, ConfigError> {
        let db_info = env_string("DCP_DB_INFO_TABLE", "tds_db_info");
        Self {
            metadata: env_string("DCP_METADATA_TABLE", "component_pres_meta_data"),
            presentations: env_string("DCP_PRESENTATIONS_TABLE", "component_presentations"),
            db_info: (!db_info.trim().is_empty()).then_some(db_info),
        }
        .validated()
    }

    /// Names are interpolated into SQL, so only plain (optionally
    /// schema-qualified) identifiers are accepted.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let names = [Some(&self.metadata), Some(&self.presentations), self.db_info.as_ref()];
        for name in names.into_iter().flatten() {
            if !is_table_name(name) {
                return Err(ConfigError::InvalidTableName(name.clone()));
            }
        }
        Ok(self)
    }
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            metadata: "component_pres_meta_data".to_string(),
            presentations: "component_presentations".to_string(),
            db_info: Some("tds_db_info".to_string()),
        }
    }
}

fn is_table_name(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() <= 2 && parts.iter().all(|part| is_identifier(part))
}

fn is_identifier(part: &str) -> bool {
    let mut chars = part.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Runtime configuration for one import run.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub root_path: PathBuf,
    pub concurrency: usize,
    pub log_path: PathBuf,
    pub tables: TableNames,
}

impl ImportConfig {
    /// Build a config for `root_path`, taking everything else from the environment.
    pub fn from_env(root_path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let log_path = env::var("DCP_IMPORT_LOG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_log_path());

        Self {
            root_path: root_path.into(),
            concurrency: env_usize("DCP_IMPORT_CONCURRENCY", DEFAULT_CONCURRENCY),
            log_path,
            tables: TableNames::from_env()?,
        }
        .validated()
    }

    pub fn validated(self) -> Result<Self, ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        Ok(Self {
            tables: self.tables.validated()?,
            ..self
        })
    }

    /// Whether the root path exists and is a directory.
    pub fn root_exists(&self) -> bool {
        self.root_path.is_dir()
    }
}

/// `dcp-import.log` next to the running executable, or in the working
/// directory when the executable path is unavailable.
pub fn default_log_path() -> PathBuf {
    env::current_exe()
        .ok()
        .as_deref()
        .and_then(Path::parent)
        .map(|dir| dir.join(DEFAULT_LOG_FILE))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
}
