mod clocked;
mod native;
mod tubi;
mod youtube;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::state::{AdapterStatus, PhaseEvent, PlayerPhase};

pub use clocked::{ClockedElement, spawn_ticker};
pub use native::{ElementEvent, MediaElement, NativeAdapter};
pub use tubi::{TubiAdapter, tubi_embed_url};
pub use youtube::{PageMessage, PlayerCommand, YouTubeAdapter, embed_html};

/// Which adapter drives playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    Native,
    YouTube,
    Tubi,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Native => write!(f, "native"),
            BackendKind::YouTube => write!(f, "youtube"),
            BackendKind::Tubi => write!(f, "tubi"),
        }
    }
}

/// What an adapter lets callers do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Whether play/pause/seek reach the player. Hosts must hide their
    /// controls and guests skip reconciliation when this is false.
    pub can_control: bool,
}

/// Message boundary to a web view hosting an embedded player page
#[async_trait]
pub trait EmbedBridge: Send + Sync {
    /// Replace the web view content with an inline page
    async fn load_html(&self, html: &str) -> Result<()>;

    /// Point the web view at a remote embed
    async fn load_url(&self, url: &str) -> Result<()>;

    /// Post a serialized message into the page. Delivery is best-effort and
    /// the page never acknowledges.
    async fn post(&self, message: &str) -> Result<()>;
}

/// Common for all backends
#[async_trait]
pub trait VideoAdapter: Send + Sync {
    fn backend(&self) -> BackendKind;

    fn capabilities(&self) -> Capabilities;

    /// Start loading the source. Readiness arrives later as a status change.
    async fn load(&self) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn seek_to(&self, seconds: f64) -> Result<()>;

    /// Current status (pull)
    fn status(&self) -> AdapterStatus;

    /// Status changes (push)
    fn subscribe(&self) -> watch::Receiver<AdapterStatus>;
}

/// Call `callback` on every status change of `adapter` until the adapter is
/// dropped or the returned task is aborted.
pub fn on_status_change<F>(adapter: &Arc<dyn VideoAdapter>, mut callback: F) -> JoinHandle<()>
where
    F: FnMut(AdapterStatus) + Send + 'static,
{
    let mut rx = adapter.subscribe();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let status = *rx.borrow_and_update();
            callback(status);
        }
    })
}

/// Status storage shared by the adapters. Subscribers are only woken when
/// something actually changed.
#[derive(Debug)]
pub(crate) struct StatusCell {
    tx: watch::Sender<AdapterStatus>,
}

impl StatusCell {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(AdapterStatus::default());
        Self { tx }
    }

    pub(crate) fn get(&self) -> AdapterStatus {
        *self.tx.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<AdapterStatus> {
        self.tx.subscribe()
    }

    pub(crate) fn update<F>(&self, modify: F)
    where
        F: FnOnce(&mut AdapterStatus),
    {
        self.tx.send_if_modified(|status| {
            let before = *status;
            modify(status);
            *status != before
        });
    }

    pub(crate) fn apply(&self, event: PhaseEvent) {
        self.update(|status| {
            status.apply(event);
        });
    }

    /// Playing again, whether from a pause or after the end
    pub(crate) fn mark_playing(&self) {
        self.update(|status| {
            let event = if status.phase == PlayerPhase::Ended {
                PhaseEvent::Restart
            } else {
                PhaseEvent::Play
            };
            status.apply(event);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingElement;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_on_status_change_sees_each_transition() {
        let native = Arc::new(NativeAdapter::new(
            "https://cdn.example.com/a.mp4",
            Arc::new(RecordingElement::default()),
        ));
        let adapter: Arc<dyn VideoAdapter> = native.clone();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = on_status_change(&adapter, move |status| {
            let _ = tx.send(status.phase);
        });

        adapter.load().await.unwrap();
        assert_eq!(rx.recv().await, Some(PlayerPhase::Loading));
        native.handle_event(ElementEvent::Loaded { duration: 5.0 }).await;
        assert_eq!(rx.recv().await, Some(PlayerPhase::Ready));

        task.abort();
    }

    #[test]
    fn test_status_cell_skips_no_op_updates() {
        let cell = StatusCell::new();
        let rx = cell.subscribe();
        cell.update(|status| status.position_seconds = 0.0);
        assert!(!rx.has_changed().unwrap());
        cell.update(|status| status.position_seconds = 1.0);
        assert!(rx.has_changed().unwrap());
    }
}
