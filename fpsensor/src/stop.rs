//! Stop signal for continuous workflows

use tokio::sync::watch;

/// Create a connected stop handle and token
pub fn stop_signal() -> (StopHandle, StopToken) {
    let (tx, rx) = watch::channel(false);
    (StopHandle(tx), StopToken(rx))
}

/// Fires the stop signal
#[derive(Debug)]
pub struct StopHandle(watch::Sender<bool>);

impl StopHandle {
    /// Ask every token to stop
    pub fn stop(&self) {
        let _ = self.0.send(true);
    }
}

/// Observed by continuous workflows between and during attempts
#[derive(Debug, Clone)]
pub struct StopToken(watch::Receiver<bool>);

impl StopToken {
    /// A token that never fires
    pub fn never() -> Self {
        let (_, rx) = watch::channel(false);
        Self(rx)
    }

    /// Check if stop was requested
    pub fn is_stopped(&self) -> bool {
        *self.0.borrow()
    }

    /// Wait until stop is requested
    ///
    /// Pends forever if the handle is dropped without stopping.
    pub async fn stopped(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
