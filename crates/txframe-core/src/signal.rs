//! Readiness signaling and OS shutdown-signal waiting.

use tokio::sync::oneshot;

/// A one-shot "listener bound and accept loop entered" signal a server uses
/// to report readiness back to its own `start`, before that `start` call
/// returns to its caller.
pub struct ReadySignal {
    tx: Option<oneshot::Sender<()>>,
}

pub struct ReadyWaiter {
    rx: oneshot::Receiver<()>,
}

impl ReadySignal {
    #[must_use]
    pub fn pair() -> (Self, ReadyWaiter) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, ReadyWaiter { rx })
    }

    /// Notify the waiter. Idempotent: a second call is a no-op.
    pub fn notify(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

impl ReadyWaiter {
    /// # Errors
    /// Returns an error if the `ReadySignal` half was dropped without
    /// notifying (the server task died before reaching its accept loop).
    pub async fn wait(self) -> anyhow::Result<()> {
        self.rx
            .await
            .map_err(|_| anyhow::anyhow!("server task exited before reaching ready state"))
    }
}

/// Wait for SIGINT (Ctrl+C) or, on unix, SIGTERM.
///
/// # Errors
/// Returns an error if installing a signal handler fails.
pub async fn wait_for_shutdown() -> anyhow::Result<()> {
    tokio::select! {
        result = wait_ctrl_c() => result?,
        result = wait_sigterm() => result?,
    }
    tracing::info!("shutdown signal received, initiating graceful shutdown");
    Ok(())
}

async fn wait_ctrl_c() -> anyhow::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!("received ctrl-c");
    Ok(())
}

#[cfg(unix)]
async fn wait_sigterm() -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut handler = signal(SignalKind::terminate())?;
    handler.recv().await;
    tracing::info!("received SIGTERM");
    Ok(())
}

#[cfg(not(unix))]
async fn wait_sigterm() -> anyhow::Result<()> {
    std::future::pending::<()>().await;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ready_signal_wakes_waiter() {
        let (mut signal, waiter) = ReadySignal::pair();
        signal.notify();
        waiter.wait().await.unwrap();
    }

    #[tokio::test]
    async fn dropped_signal_without_notify_is_an_error() {
        let (signal, waiter) = ReadySignal::pair();
        drop(signal);
        assert!(waiter.wait().await.is_err());
    }
}
