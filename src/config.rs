use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Writable directory on hosts that set `RENDER`.
pub const HOSTED_DATA_DIR: &str = "/var/data";
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {variable} '{value}': {reason}")]
    Invalid {
        variable: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Json,
    Sqlite,
}

impl BackendKind {
    /// Snapshot file name used when no path is configured.
    pub fn default_file_name(self) -> &'static str {
        match self {
            BackendKind::Json => "timetable.json",
            BackendKind::Sqlite => "timetable.sqlite3",
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(BackendKind::Json),
            "sqlite" => Ok(BackendKind::Sqlite),
            other => Err(format!("unknown backend '{other}' (expected json or sqlite)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimetableConfig {
    pub snapshot_path: PathBuf,
    pub backend: BackendKind,
    pub http_addr: SocketAddr,
}

impl TimetableConfig {
    /// Reads `TIMETABLE_DB_PATH`, `TIMETABLE_BACKEND`, `TIMETABLE_HTTP_ADDR`,
    /// `PORT`, and `RENDER` from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("TIMETABLE_BACKEND") {
            Some(value) => value.parse().map_err(|reason| ConfigError::Invalid {
                variable: "TIMETABLE_BACKEND",
                value,
                reason,
            })?,
            None => BackendKind::default(),
        };

        let snapshot_path = match lookup("TIMETABLE_DB_PATH") {
            Some(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ if lookup("RENDER").is_some() => {
                PathBuf::from(HOSTED_DATA_DIR).join(backend.default_file_name())
            }
            _ => PathBuf::from(backend.default_file_name()),
        };

        let http_addr = match lookup("TIMETABLE_HTTP_ADDR") {
            Some(value) => value.parse().map_err(|err: std::net::AddrParseError| {
                ConfigError::Invalid {
                    variable: "TIMETABLE_HTTP_ADDR",
                    value: value.clone(),
                    reason: err.to_string(),
                }
            })?,
            None => {
                let port = match lookup("PORT") {
                    Some(value) => value.parse::<u16>().map_err(|err| ConfigError::Invalid {
                        variable: "PORT",
                        value: value.clone(),
                        reason: err.to_string(),
                    })?,
                    None => DEFAULT_PORT,
                };
                SocketAddr::from(([0, 0, 0, 0], port))
            }
        };

        Ok(Self {
            snapshot_path,
            backend,
            http_addr,
        })
    }
}

impl Default for TimetableConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from(BackendKind::Json.default_file_name()),
            backend: BackendKind::Json,
            http_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
        }
    }
}
