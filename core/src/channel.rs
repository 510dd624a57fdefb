use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::state::PlaybackState;

/// The real-time channel a party's playback record travels over.
///
/// Publishing is an upsert of a single record: no history, no deltas.
/// Conflicting writes resolve last-write-wins on `updated_at`.
#[async_trait]
pub trait PlaybackChannel: Send + Sync {
    async fn publish(&self, state: PlaybackState) -> Result<()>;

    /// Every record written after the call
    fn subscribe(&self) -> broadcast::Receiver<PlaybackState>;

    /// The current record, if any host has written one
    fn latest(&self) -> Option<PlaybackState>;
}

/// In-process channel, for a single device or a simulated party
pub struct LocalChannel {
    latest: Mutex<Option<PlaybackState>>,
    tx: broadcast::Sender<PlaybackState>,
}

impl LocalChannel {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            latest: Mutex::new(None),
            tx,
        }
    }
}

impl Default for LocalChannel {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl PlaybackChannel for LocalChannel {
    async fn publish(&self, state: PlaybackState) -> Result<()> {
        {
            let mut latest = self.latest.lock();
            if let Some(current) = *latest {
                if current.updated_at > state.updated_at {
                    debug!(
                        "Dropping stale playback record ({} < {})",
                        state.updated_at, current.updated_at
                    );
                    return Ok(());
                }
            }
            *latest = Some(state);
        }
        // No subscribers is fine: nobody else has joined yet
        let _ = self.tx.send(state);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<PlaybackState> {
        self.tx.subscribe()
    }

    fn latest(&self) -> Option<PlaybackState> {
        *self.latest.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_and_broadcast() {
        let channel = LocalChannel::default();
        let mut rx = channel.subscribe();

        let state = PlaybackState::new(true, 10.0, 1_000);
        channel.publish(state).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), state);
        assert_eq!(channel.latest(), Some(state));
    }

    #[tokio::test]
    async fn test_last_write_wins_by_timestamp() {
        let channel = LocalChannel::default();
        let newer = PlaybackState::new(false, 45.0, 2_000);
        let older = PlaybackState::new(true, 40.0, 1_500);

        channel.publish(newer).await.unwrap();
        let mut rx = channel.subscribe();
        channel.publish(older).await.unwrap();

        assert_eq!(channel.latest(), Some(newer));
        assert!(rx.try_recv().is_err());
    }
}
