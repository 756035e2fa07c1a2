// src/signals.rs

//! Forward termination signals to our process group so child processes
//! (the engine, database dumps, hooks) die with us.

use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{killpg, Signal};
use nix::unistd::getpgrp;
use tokio::signal::unix::{signal, SignalKind};
use tracing::debug;

/// Exit status after SIGTERM: 128 + signal number.
pub const SIGTERM_EXIT_CODE: i32 = 128 + 15;

/// Tracks one signal kind. `killpg` delivers a forwarded signal to us as
/// well; that copy must not be forwarded again.
#[derive(Debug, Default)]
struct ForwardGuard {
    in_flight: AtomicBool,
}

impl ForwardGuard {
    /// The first receipt is ours to forward; the echo that follows is
    /// swallowed.
    fn should_forward(&self) -> bool {
        !self.in_flight.swap(true, Ordering::SeqCst) || {
            self.in_flight.store(false, Ordering::SeqCst);
            false
        }
    }

    fn forward(&self, signal: Signal) {
        if !self.should_forward() {
            debug!(?signal, "ignoring our own forwarded signal");
            return;
        }
        debug!(?signal, "forwarding signal to process group");
        if let Err(errno) = killpg(getpgrp(), signal) {
            tracing::error!(?signal, %errno, "could not forward signal");
            self.in_flight.store(false, Ordering::SeqCst);
        }
    }
}

/// Install the forwarding handlers. Must be called inside the runtime.
pub fn configure_signals() -> std::io::Result<()> {
    let kinds = [
        (SignalKind::hangup(), Signal::SIGHUP),
        (SignalKind::terminate(), Signal::SIGTERM),
        (SignalKind::user_defined1(), Signal::SIGUSR1),
        (SignalKind::user_defined2(), Signal::SIGUSR2),
    ];

    for (kind, nix_signal) in kinds {
        let mut stream = signal(kind)?;
        let guard = ForwardGuard::default();
        tokio::spawn(async move {
            while stream.recv().await.is_some() {
                guard.forward(nix_signal);
                if nix_signal == Signal::SIGTERM {
                    tracing::error!(critical = true, "Exiting due to TERM signal");
                    std::process::exit(SIGTERM_EXIT_CODE);
                }
            }
        });
    }
    Ok(())
}
