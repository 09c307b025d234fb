//! School administration backend: accounts, classes, attendance, grades, coursework and
//! messaging behind role-checked routes, over PostgreSQL or an in-memory store.

pub mod access;
pub mod auth;
pub mod blob;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod migration;
pub mod model;
pub mod response;
pub mod routes;
pub mod service;
pub mod state;
pub mod store;

pub use access::Operation;
pub use blob::{BlobStore, LocalBlobStore};
pub use config::{Settings, StoreKind};
pub use error::{AppError, ConfigError};
pub use migration::{apply_migrations, ensure_database_exists};
pub use response::{error_body, success_many, success_one};
pub use routes::{app, common_routes, manage_routes, school_routes};
pub use state::AppState;
pub use store::{MemoryStore, PgStore, Store};
