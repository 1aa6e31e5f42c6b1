//! Per-user outbound queue
//!
//! Bounded many-producer/one-consumer buffer of encoded frames awaiting
//! transmission. Any actor may enqueue; only the owning write pump drains
//! it, and only the owning session's disconnect path shuts it down.
//!
//! Enqueueing never blocks: a full queue drops the new frame and reports
//! `QueueFull` so a slow reader stalls nobody else. A send after shutdown
//! returns `QueueClosed` instead of panicking the producer.

use tokio::sync::mpsc;

use crate::error::AppError;

/// Capacity of each user's outbound queue
pub const OUTBOUND_CAPACITY: usize = 256;

/// Item drained by the write pump
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// An encoded envelope ready for the wire
    Frame(String),
    /// Disconnect marker; the write pump sends a Close frame and returns
    Shutdown,
}

/// Producer half of an outbound queue, cloned into every actor that may
/// deliver to this user
#[derive(Debug, Clone)]
pub struct OutboundSender {
    tx: mpsc::Sender<Outbound>,
}

/// Create an outbound queue pair at the standard capacity
pub fn outbound_queue() -> (OutboundSender, mpsc::Receiver<Outbound>) {
    outbound_queue_with_capacity(OUTBOUND_CAPACITY)
}

fn outbound_queue_with_capacity(capacity: usize) -> (OutboundSender, mpsc::Receiver<Outbound>) {
    let (tx, rx) = mpsc::channel(capacity);
    (OutboundSender { tx }, rx)
}

impl OutboundSender {
    /// Queue an encoded frame for transmission (drop-newest when full)
    pub fn enqueue(&self, frame: String) -> Result<(), AppError> {
        match self.tx.try_send(Outbound::Frame(frame)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(AppError::QueueFull),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(AppError::QueueClosed),
        }
    }

    /// Signal the write pump to send a Close frame and stop
    ///
    /// Waits for queue space so the marker is never lost behind a full
    /// buffer; returns immediately if the pump is already gone.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(Outbound::Shutdown).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_enqueue_then_drain() {
        let (tx, mut rx) = outbound_queue();
        tx.enqueue("a".to_string()).unwrap();
        tx.enqueue("b".to_string()).unwrap();
        assert_eq!(rx.recv().await, Some(Outbound::Frame("a".to_string())));
        assert_eq!(rx.recv().await, Some(Outbound::Frame("b".to_string())));
    }

    #[tokio::test]
    async fn test_full_queue_drops_newest() {
        let (tx, mut rx) = outbound_queue_with_capacity(1);
        tx.enqueue("kept".to_string()).unwrap();
        assert!(matches!(
            tx.enqueue("dropped".to_string()),
            Err(AppError::QueueFull)
        ));
        assert_eq!(rx.recv().await, Some(Outbound::Frame("kept".to_string())));
    }

    #[tokio::test]
    async fn test_send_after_close_does_not_panic() {
        let (tx, rx) = outbound_queue();
        drop(rx);
        assert!(matches!(
            tx.enqueue("late".to_string()),
            Err(AppError::QueueClosed)
        ));
        // shutdown on a dead pump is a quiet no-op
        tx.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_delivered_after_pending_frames() {
        let (tx, mut rx) = outbound_queue();
        tx.enqueue("pending".to_string()).unwrap();
        tx.shutdown().await;
        assert_eq!(rx.recv().await, Some(Outbound::Frame("pending".to_string())));
        assert_eq!(rx.recv().await, Some(Outbound::Shutdown));
    }
}
