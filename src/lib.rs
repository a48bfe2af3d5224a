//! Register folders of CSV files as databases, query them with SQL, and
//! write the results back as CSV.
//!
//! A [`ConnectionManager`] maps connection names to folders and caches one
//! Polars SQL session per connection. [`TableLoader`] turns a folder's CSV
//! files into tables, [`TablePublisher`] writes tables back, and
//! [`QueryExecutor`] runs ad-hoc statements. [`Workbench`] bundles these with
//! the state a host UI needs.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod connection;
pub mod error;
pub mod error_display;
pub mod loader;
pub mod publisher;
pub mod query;
pub mod session;
pub mod workbench;

pub use cache::{CacheManager, QueryHistory};
pub use catalog::CatalogStore;
pub use config::{AppConfig, ConfigManager};
pub use connection::ConnectionManager;
pub use error::{
    CatalogError, ConnectionError, FileLoadError, LoadError, NotFoundError, PublishFailure,
    QueryError, ValidationError,
};
pub use loader::{LoadOptions, LoadReport, TableLoader};
pub use publisher::{PublishReport, TablePublisher};
pub use query::{QueryExecutor, QueryResult};
pub use session::{ColumnInfo, Session, SessionHandle};
pub use workbench::Workbench;

/// Application name used for cache and config directories
pub const APP_NAME: &str = "csvstudio";
