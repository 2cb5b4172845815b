//! Background refresh ticker
//!
//! Sends a `Tick` on a fixed interval. On every tick the app revalidates all
//! cards, and each card only fetches once its own TTL has run out.

use std::time::Duration;
use tokio::sync::mpsc;

/// Messages sent from the background ticker to the main app
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMessage {
    /// Time to revalidate every card
    Tick,
}

/// Handle for controlling the background refresh task
pub struct RefreshHandle {
    /// Channel for receiving refresh messages
    pub receiver: mpsc::Receiver<RefreshMessage>,
    shutdown_tx: mpsc::Sender<()>,
}

impl RefreshHandle {
    /// Spawns the ticker task
    ///
    /// # Arguments
    /// * `interval` - Time between ticks; the first tick comes one interval after start
    ///
    /// # Returns
    /// A RefreshHandle that receives ticks via the `receiver` channel
    pub fn spawn(interval: Duration) -> Self {
        let (msg_tx, msg_rx) = mpsc::channel(8);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // Skip the first tick (immediate)
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // A full channel means the app has not caught up; drop the tick
                        if let Err(mpsc::error::TrySendError::Closed(_)) =
                            msg_tx.try_send(RefreshMessage::Tick)
                        {
                            break;
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
            tracing::debug!("refresh ticker stopped");
        });

        Self {
            receiver: msg_rx,
            shutdown_tx,
        }
    }

    /// Stops the ticker task
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// Checks for a pending refresh message without blocking
///
/// # Returns
/// * `Some(RefreshMessage)` if a message was available
/// * `None` if no messages are pending
pub fn try_recv(handle: &mut RefreshHandle) -> Option<RefreshMessage> {
    handle.receiver.try_recv().ok()
}
