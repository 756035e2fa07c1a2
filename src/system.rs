// src/system.rs

//! Host facts and process-wide state that needs careful handling.

use nix::sys::stat::{umask, Mode};
use tracing::debug;

use crate::config::model::Umask;

/// Short hostname, or `localhost` if it can't be read.
pub fn hostname() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Sets the process umask and restores the previous one when dropped.
pub struct UmaskGuard {
    previous: Mode,
}

impl UmaskGuard {
    pub fn set(mask: Umask) -> Self {
        let previous = umask(Mode::from_bits_truncate(mask.0 as nix::libc::mode_t));
        debug!(umask = format!("{:o}", mask.0), "set hook umask");
        Self { previous }
    }
}

impl Drop for UmaskGuard {
    fn drop(&mut self) {
        umask(self.previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hostname_is_never_empty() {
        assert!(!hostname().is_empty());
    }

    #[test]
    fn umask_guard_restores_previous_mask() {
        let before = umask(Mode::from_bits_truncate(0o022));
        umask(before);

        {
            let _guard = UmaskGuard::set(Umask(0o077));
            let current = umask(Mode::from_bits_truncate(0o077));
            assert_eq!(current.bits(), 0o077);
        }

        let after = umask(before);
        assert_eq!(after, before);
    }
}
