//! Process Supervisor (C8).
//!
//! Installs handlers for the fatal termination signal, the interactive
//! interrupt, and an uncaught-panic backstop, all driving one idempotent
//! shutdown sequence. Re-entrant triggers are ignored (§4.8).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Exit codes per §6: 0 for clean shutdown, 1 for startup failure or a fatal
/// uncaught error.
pub const EXIT_CLEAN: i32 = 0;
pub const EXIT_FATAL: i32 = 1;

#[derive(Clone, Default)]
pub struct Supervisor {
    shutting_down: Arc<AtomicBool>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if this call performed the transition from running to
    /// shutting-down; false if shutdown was already in progress (idempotence,
    /// §4.8).
    fn begin_shutdown(&self) -> bool {
        self.shutting_down
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Wait for SIGTERM or (once) SIGINT, log which one fired, and return.
    /// The caller is expected to stop serving and exit with [`EXIT_CLEAN`]
    /// after this resolves. A second SIGINT while the first is still being
    /// handled is a no-op because [`Self::begin_shutdown`] only transitions
    /// once.
    #[cfg(unix)]
    pub async fn wait_for_shutdown_signal(&self) {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                if self.begin_shutdown() {
                    tracing::info!("received SIGTERM, shutting down gracefully");
                }
            }
            _ = sigint.recv() => {
                if self.begin_shutdown() {
                    tracing::info!("received SIGINT, shutting down gracefully");
                }
            }
        }
    }

    #[cfg(not(unix))]
    pub async fn wait_for_shutdown_signal(&self) {
        if tokio::signal::ctrl_c().await.is_ok() && self.begin_shutdown() {
            tracing::info!("received ctrl-c, shutting down gracefully");
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Install a panic hook that logs the classified failure and marks the
    /// process as shutting down with the fatal exit code, per §4.8: "after
    /// such an event the process is in an indeterminate state and must not
    /// continue serving." The hook does not itself call `std::process::exit`
    /// — `main` observes [`Self::is_shutting_down`]/the default hook's abort
    /// and exits via [`EXIT_FATAL`] at its own boundary.
    pub fn install_panic_hook(&self) {
        let shutting_down = self.shutting_down.clone();
        let default_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            shutting_down.store(true, Ordering::SeqCst);
            tracing::error!(panic = %info, "uncaught panic, process entering indeterminate state");
            default_hook(info);
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_shutdown_is_idempotent() {
        let supervisor = Supervisor::new();
        assert!(supervisor.begin_shutdown());
        assert!(!supervisor.begin_shutdown());
        assert!(supervisor.is_shutting_down());
    }

    #[test]
    fn fresh_supervisor_is_not_shutting_down() {
        let supervisor = Supervisor::new();
        assert!(!supervisor.is_shutting_down());
    }
}
