//! Cooperative cancellation for a probe run

use tokio::sync::watch;

/// Fires the shutdown signal. Dropping it without firing leaves the run
/// uncancelled.
#[derive(Debug)]
pub struct ShutdownTrigger(watch::Sender<bool>);

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.0.send_replace(true);
    }
}

/// Receiving side of the shutdown signal, cloned into every worker
#[derive(Debug, Clone)]
pub struct Shutdown(watch::Receiver<bool>);

impl Shutdown {
    pub fn channel() -> (ShutdownTrigger, Shutdown) {
        let (tx, rx) = watch::channel(false);
        (ShutdownTrigger(tx), Shutdown(rx))
    }

    /// A signal that never fires
    pub fn never() -> Shutdown {
        Self::channel().1
    }

    pub fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once the signal fires; pends forever if it never can.
    pub async fn wait(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                break;
            }
        }
        std::future::pending::<()>().await
    }
}
