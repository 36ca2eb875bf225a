//! Process-wide interrupt notification.
//!
//! A [`ShutdownTrigger`] fires once; every cloned [`Shutdown`] observes it.
//! Nothing is stopped here: loops check the signal between iterations and
//! run their own drain.

use tokio::sync::watch;
use tracing::info;

/// Fires the process-wide interrupt.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// Observes the process-wide interrupt.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Create a linked trigger/observer pair.
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
    /// Signal shutdown. Returns false if it had already been signalled.
    pub fn trigger(&self) -> bool {
        self.tx.send_if_modified(|fired| !std::mem::replace(fired, true))
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until shutdown is signalled.
    ///
    /// Returns immediately if it already was. A dropped trigger counts as
    /// never firing.
    pub async fn recv(&mut self) {
        if self.rx.wait_for(|fired| *fired).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Fire `trigger` on the first Ctrl+C (or SIGTERM on unix).
///
/// Later interrupts are absorbed by the installed handler and have no
/// further effect.
pub fn listen_for_interrupt(trigger: ShutdownTrigger) {
    tokio::spawn(async move {
        if wait_for_signal().await.is_err() {
            return;
        }
        info!("Interrupt received, shutting down");
        trigger.trigger();
    });
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_trigger_fires_once() {
        let (trigger, shutdown) = channel();
        assert!(!shutdown.is_triggered());

        assert!(trigger.trigger());
        assert!(!trigger.trigger());

        assert!(trigger.is_triggered());
        assert!(shutdown.is_triggered());
    }

    #[test]
    fn test_clones_observe_same_signal() {
        let (trigger, shutdown) = channel();
        let other = shutdown.clone();
        trigger.trigger();
        assert!(shutdown.is_triggered());
        assert!(other.is_triggered());
    }

    #[tokio::test]
    async fn test_recv_after_trigger_returns_immediately() {
        let (trigger, mut shutdown) = channel();
        trigger.trigger();
        tokio::time::timeout(Duration::from_millis(10), shutdown.recv())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_recv_wakes_on_trigger() {
        let (trigger, mut shutdown) = channel();
        let waiter = tokio::spawn(async move { shutdown.recv().await });

        tokio::task::yield_now().await;
        trigger.trigger();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_recv_pending_when_trigger_dropped() {
        let (trigger, mut shutdown) = channel();
        drop(trigger);
        let result = tokio::time::timeout(Duration::from_secs(1), shutdown.recv()).await;
        assert!(result.is_err());
    }
}
