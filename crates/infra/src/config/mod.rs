//! Configuration loading
//!
//! Builds a [`PipelineConfig`](courier_domain::PipelineConfig) from
//! environment variables and TOML or JSON files.

pub mod loader;

// Re-export commonly used items
pub use loader::{load, load_from_env, load_from_file, probe_config_paths};
