// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - [`model`] is the serde data model of one config file.
//! - [`loader`] reads YAML/TOML, applies overrides and validates.
//! - [`overrides`] handles `--override OPTION.SUB=VALUE`.
//! - [`paths`] expands `~`, normalizes repositories and finds config files.
//! - [`validate`] holds the semantic checks and repository matching.
//! - [`generate`] renders a sample configuration.

pub mod generate;
pub mod loader;
pub mod model;
pub mod overrides;
pub mod paths;
pub mod validate;

pub use loader::{load_and_validate, load_configurations, LoadedConfig};
pub use model::{Configuration, DatabaseConfig, Hooks, MonitorConfig, Repository};
pub use validate::repositories_match;
