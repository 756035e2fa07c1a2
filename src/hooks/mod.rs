// src/hooks/mod.rs

//! Extension points around engine actions: user shell commands, database
//! dumps, monitoring pings and credential lookups.

pub mod command;
pub mod credential;
pub mod data_source;
pub mod monitor;

pub use command::execute_hook;
