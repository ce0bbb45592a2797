//! Cooperative cancellation for a crawl run

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Shared cancellation signal
///
/// Cloned into the signal handler and the coordinator. The coordinator checks
/// it between queries and during the inter-query pause; in-flight fetches are
/// left to finish so their audit lines are written.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation and wakes every waiter
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Triggers on Ctrl-C, or on SIGTERM where available
    ///
    /// The dashboard sends SIGINT and follows up with SIGTERM shortly after,
    /// so both start the drain. Handlers are installed before this returns
    /// and stay installed, so a second signal does not kill the process
    /// mid-write. Must be called from within a Tokio runtime.
    pub fn listen_for_signals(&self) -> std::io::Result<JoinHandle<()>> {
        #[cfg(unix)]
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

        let handle = self.clone();
        Ok(tokio::spawn(async move {
            #[cfg(unix)]
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
            #[cfg(not(unix))]
            let _ = tokio::signal::ctrl_c().await;

            tracing::warn!("[INFO] Stop requested; stopping after the current query");
            handle.trigger();
        }))
    }

    /// Resolves once cancellation has been requested
    pub async fn wait(&self) {
        loop {
            // Register before checking the flag so a trigger in between is not lost
            let notified = self.notify.notified();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }
}
