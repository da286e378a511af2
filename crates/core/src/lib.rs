pub mod config;
pub mod db;

pub use config::{AppConfig, AuthConfig, DatabaseConfig, ServerConfig, StorageConfig};
pub use db::connect;
