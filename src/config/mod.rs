//! Loading and persisting the Clash configuration document.

pub mod store;
pub mod template;

use std::io;

use thiserror::Error;

pub use store::ConfigStore;
pub use template::{default_template, ENTRY_SELECTOR};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
