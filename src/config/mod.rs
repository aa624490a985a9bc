//! Scan configuration: YAML schema and loading.

pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_str, CONFIG_FILE};
pub use schema::ScanConfig;
