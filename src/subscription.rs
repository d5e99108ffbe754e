use crate::error::{GuardianError, Result};
use tokio::sync::broadcast;

/// Capacity of every event channel in the crate
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Receiver for events published by a connection, the observer or the monitor
pub struct EventReceiver<T> {
    rx: broadcast::Receiver<T>,
}

impl<T: Clone> EventReceiver<T> {
    /// Create a new event receiver
    pub(crate) fn new(rx: broadcast::Receiver<T>) -> Self {
        Self { rx }
    }

    /// Receive the next event
    ///
    /// Returns `ChannelClosed` once every sender has been dropped.
    pub async fn recv(&mut self) -> Result<T> {
        self.rx.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => GuardianError::ChannelClosed,
            broadcast::error::RecvError::Lagged(n) => {
                GuardianError::ChannelError(format!("Lagged by {} messages", n))
            }
        })
    }

    /// Try to receive an event without blocking
    ///
    /// Returns `None` if no event is available.
    pub fn try_recv(&mut self) -> Result<Option<T>> {
        match self.rx.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Closed) => Err(GuardianError::ChannelClosed),
            Err(broadcast::error::TryRecvError::Lagged(n)) => {
                Err(GuardianError::ChannelError(format!("Lagged by {} messages", n)))
            }
        }
    }

    /// Drain every event currently queued
    pub fn drain(&mut self) -> Vec<T> {
        let mut events = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(event) => events.push(event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    tracing::warn!("Event receiver lagged by {} messages", n);
                }
                Err(_) => break,
            }
        }
        events
    }
}
