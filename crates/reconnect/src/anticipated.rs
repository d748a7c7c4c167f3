use tokio::sync::{mpsc, oneshot};

use crate::error::{SyncError, SyncResult};

/// The reading half of an anticipated-message stream: posts a slot for
/// the next message it expects and suspends until the writer fulfills
/// it (or the stream closes).
pub struct AnticipatedReceiver<T> {
    slots: mpsc::Sender<oneshot::Sender<T>>,
}

/// The writing half: fulfills the oldest outstanding slot with each
/// call. Because slots are served strictly in the order they were
/// posted, the writer cannot get ahead of or behind what the reader
/// anticipated without the channel itself closing.
pub struct AnticipatedWriter<T> {
    slots: mpsc::Receiver<oneshot::Sender<T>>,
}

/// Creates one anticipated-message stream with `capacity` outstanding
/// slots before `post` backpressures.
pub fn anticipated_channel<T>(capacity: usize) -> (AnticipatedReceiver<T>, AnticipatedWriter<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    (AnticipatedReceiver { slots: tx }, AnticipatedWriter { slots: rx })
}

impl<T: Send + 'static> AnticipatedReceiver<T> {
    pub async fn recv_anticipated(&self) -> SyncResult<T> {
        let (tx, rx) = oneshot::channel();
        self.slots
            .send(tx)
            .await
            .map_err(|_| SyncError::StreamClosed)?;
        rx.await.map_err(|_| SyncError::StreamClosed)
    }
}

impl<T: Send + 'static> AnticipatedWriter<T> {
    pub async fn write_next(&mut self, value: T) -> SyncResult<()> {
        let slot = self.slots.recv().await.ok_or(SyncError::StreamClosed)?;
        slot.send(value).map_err(|_| SyncError::StreamClosed)
    }
}
