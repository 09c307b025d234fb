//! Runtime settings from environment variables (optionally loaded from `.env` by the binary).

use crate::error::ConfigError;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost/school";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_MEDIA_ROOT: &str = "./media";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub media_root: PathBuf,
    pub store: StoreKind,
    pub max_upload_bytes: usize,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: DEFAULT_DATABASE_URL.into(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            media_root: PathBuf::from(DEFAULT_MEDIA_ROOT),
            store: StoreKind::Postgres,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            bootstrap_admin: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from any variable source; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into());
        let bind_addr = bind.parse::<SocketAddr>().map_err(|e| ConfigError::Invalid {
            name: "BIND_ADDR",
            message: format!("{}: {}", bind, e),
        })?;

        let store = match get("STORE").as_deref() {
            None | Some("postgres") => StoreKind::Postgres,
            Some("memory") => StoreKind::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "STORE",
                    message: format!("expected postgres or memory, got {}", other),
                })
            }
        };

        let max_upload_bytes = match get("MAX_UPLOAD_BYTES") {
            None => DEFAULT_MAX_UPLOAD_BYTES,
            Some(v) => v.parse::<usize>().map_err(|e| ConfigError::Invalid {
                name: "MAX_UPLOAD_BYTES",
                message: format!("{}: {}", v, e),
            })?,
        };

        let bootstrap_admin = match (get("BOOTSTRAP_ADMIN_USERNAME"), get("BOOTSTRAP_ADMIN_PASSWORD")) {
            (Some(username), Some(password)) => Some(BootstrapAdmin { username, password }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::Incomplete("BOOTSTRAP_ADMIN_USERNAME", "BOOTSTRAP_ADMIN_PASSWORD"))
            }
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete("BOOTSTRAP_ADMIN_PASSWORD", "BOOTSTRAP_ADMIN_USERNAME"))
            }
        };

        Ok(Settings {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.into()),
            bind_addr,
            media_root: get("MEDIA_ROOT").map(PathBuf::from).unwrap_or_else(|| PathBuf::from(DEFAULT_MEDIA_ROOT)),
            store,
            max_upload_bytes,
            bootstrap_admin,
        })
    }
}
