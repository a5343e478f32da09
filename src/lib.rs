pub mod aggregator;
pub mod api;
pub mod cache;
pub mod config;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod settings;
pub mod tester;
pub mod utils;

// Re-export the main node types for easier access
pub use models::{ClashConfig, Node, ProxyType};

// Re-export the entry points of a run
pub use pipeline::{Outcome, Pipeline, PipelineError, RunReport};
pub use settings::Settings;
