// crates/test-utils/src/lib.rs

//! Fakes and builders shared by borgkeeper's integration tests.
//!
//! Nothing here touches a real repository, database or network: commands
//! go to [`FakeRunner`], monitor pings to [`FakeTransport`].

pub mod builders;
pub mod fake_runner;
pub mod fake_transport;

use std::sync::Once;
use tracing_subscriber::{fmt, EnvFilter};

pub use builders::{arguments, ConfigBuilder};
pub use fake_runner::FakeRunner;
pub use fake_transport::FakeTransport;

static INIT: Once = Once::new();

/// Route `tracing` output through the test harness, once per binary.
///
/// Defaults to INFO; override with `RUST_LOG=borgkeeper=debug`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(false)
            .init();
    });
}
