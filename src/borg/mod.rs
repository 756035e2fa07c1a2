// src/borg/mod.rs

//! Everything specific to the backup engine's command line.

pub mod archive_name;
pub mod commands;
pub mod environment;
pub mod flags;

pub use archive_name::expand_archive_name;
pub use environment::make_environment;
