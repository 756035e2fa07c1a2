// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`backend`] defines [`CommandSpec`] and the [`CommandRunner`] trait the
//!   rest of the crate talks to.
//! - [`command`] holds [`RealRunner`], the `tokio::process` implementation.
//! - [`process`] wraps background children in [`ProcessHandle`]s.
//! - [`exit_code`] interprets exit codes (soft failures, engine warnings).

pub mod backend;
pub mod command;
pub mod exit_code;
pub mod process;

pub use backend::{BoxFuture, CommandRunner, CommandSpec};
pub use command::RealRunner;
pub use exit_code::ExitCodePolicy;
pub use process::ProcessHandle;
