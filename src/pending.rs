//! Pending acquisition requests.
//!
//! A `PendingAcquire` represents one caller blocked on capacity. It completes
//! at most once: the first `resolve` or `reject` takes the underlying sender,
//! every later call is a no-op. The matching receiver lives in the suspended
//! `acquire` call, wrapped in its timeout.

use tokio::sync::oneshot;

use crate::error::{Error, Result};

/// One-shot completion record for a caller queued behind a key's capacity.
pub(crate) struct PendingAcquire<T> {
    id: u64,
    tx: Option<oneshot::Sender<Result<T>>>,
}

impl<T> PendingAcquire<T> {
    /// Create a request and the receiver its caller will await.
    pub(crate) fn new(id: u64) -> (Self, oneshot::Receiver<Result<T>>) {
        let (tx, rx) = oneshot::channel();
        (Self { id, tx: Some(tx) }, rx)
    }

    /// Identifier used by the caller to withdraw itself from the queue on
    /// timeout.
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Complete the request with a resource.
    ///
    /// Returns the resource back when it could not be delivered — the request
    /// was already completed, or the waiting caller is gone — so the pool can
    /// cycle it through the release protocol instead of losing it.
    pub(crate) fn resolve(&mut self, resource: T) -> Option<T> {
        match self.tx.take() {
            Some(tx) => match tx.send(Ok(resource)) {
                Ok(()) => None,
                Err(Ok(resource)) => Some(resource),
                // We sent `Ok`, so a failed send can only hand back `Ok`.
                Err(Err(_)) => None,
            },
            None => Some(resource),
        }
    }

    /// Fail the request. No-op if already completed or the caller is gone.
    pub(crate) fn reject(&mut self, error: Error) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Err(error));
        }
    }
}
