// Cancellation - Lets the caller stop a run between polls and bursts
use tokio::sync::watch;

/// Caller side. Cancelling is sticky and may be repeated.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Task side, handed to the sequencer and the stimulus driver.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_, signal) = cancel_pair();
        signal
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled. Pends forever if the handle is dropped
    /// without cancelling.
    pub async fn cancelled(&mut self) {
        let closed = self.rx.wait_for(|cancelled| *cancelled).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}
