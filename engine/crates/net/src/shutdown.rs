use tokio::sync::watch;

/// Sender side, held by the server owner; triggers shutdown.
#[derive(Clone)]
pub struct ShutdownTx(watch::Sender<bool>);

/// Receiver side, cloned into the listener, every connection and the
/// simulation loop.
#[derive(Clone)]
pub struct ShutdownRx(watch::Receiver<bool>);

/// Create a shutdown channel pair.
pub fn shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTx(tx), ShutdownRx(rx))
}

impl ShutdownTx {
    /// Signal all receivers to shut down.
    pub fn trigger(&self) {
        let _ = self.0.send(true);
    }

    pub fn subscribe(&self) -> ShutdownRx {
        ShutdownRx(self.0.subscribe())
    }
}

impl ShutdownRx {
    /// Wait until shutdown is signaled. Cancel-safe.
    pub async fn wait(&mut self) {
        while !*self.0.borrow_and_update() {
            if self.0.changed().await.is_err() {
                // Sender dropped: nobody can trigger any more.
                std::future::pending::<()>().await;
            }
        }
    }

    /// Non-blocking check.
    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_channel_default_not_shutdown() {
        let (_tx, rx) = shutdown_channel();
        assert!(!rx.is_shutdown());
    }

    #[test]
    fn shutdown_channel_trigger() {
        let (tx, rx) = shutdown_channel();
        tx.trigger();
        assert!(rx.is_shutdown());
    }

    #[tokio::test]
    async fn shutdown_channel_async_wait() {
        let (tx, mut rx) = shutdown_channel();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            tx.trigger();
        });
        rx.wait().await;
        assert!(rx.is_shutdown());
    }

    #[tokio::test]
    async fn wait_never_fires_after_sender_dropped() {
        let (tx, mut rx) = shutdown_channel();
        drop(tx);
        let waited =
            tokio::time::timeout(std::time::Duration::from_millis(20), rx.wait()).await;
        assert!(waited.is_err());
        assert!(!rx.is_shutdown());
    }

    #[test]
    fn subscribers_see_trigger() {
        let (tx, rx) = shutdown_channel();
        let rx2 = rx.clone();
        let rx3 = tx.subscribe();
        tx.trigger();
        assert!(rx.is_shutdown());
        assert!(rx2.is_shutdown());
        assert!(rx3.is_shutdown());
    }
}
