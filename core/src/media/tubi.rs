use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, info};
use tokio::sync::watch;

use super::{BackendKind, Capabilities, EmbedBridge, StatusCell, VideoAdapter};
use crate::error::{Result, SyncError};
use crate::state::{AdapterStatus, PhaseEvent};

pub fn tubi_embed_url(content_id: &str) -> String {
    format!("https://tubitv.com/embed/{}", content_id)
}

/// Adapter for the Tubi embed, which exposes no control surface.
///
/// Commands are accepted and ignored, and the status only ever says whether
/// the embed has loaded. Sync for Tubi parties means everyone opened the same
/// title; there is no position to correct.
pub struct TubiAdapter {
    content_id: String,
    bridge: Arc<dyn EmbedBridge>,
    status: StatusCell,
}

impl TubiAdapter {
    pub fn new(content_id: impl Into<String>, bridge: Arc<dyn EmbedBridge>) -> Self {
        Self {
            content_id: content_id.into(),
            bridge,
            status: StatusCell::new(),
        }
    }

    pub fn embed_url(&self) -> String {
        tubi_embed_url(&self.content_id)
    }

    /// The web view finished loading the embed
    pub fn handle_embed_loaded(&self) {
        info!("Tubi embed loaded for {}", self.content_id);
        self.status.apply(PhaseEvent::Loaded);
    }

    /// The web view failed to load the embed
    pub fn handle_embed_error(&self, reason: &str) {
        error!("Tubi embed failed for {}: {}", self.content_id, reason);
        self.status.apply(PhaseEvent::Fail);
    }
}

#[async_trait]
impl VideoAdapter for TubiAdapter {
    fn backend(&self) -> BackendKind {
        BackendKind::Tubi
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities { can_control: false }
    }

    async fn load(&self) -> Result<()> {
        self.status.apply(PhaseEvent::Load);
        if let Err(e) = self.bridge.load_url(&self.embed_url()).await {
            self.status.apply(PhaseEvent::Fail);
            return Err(SyncError::Load(e.to_string()));
        }
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        debug!("Ignoring play: Tubi embed is not controllable");
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        debug!("Ignoring pause: Tubi embed is not controllable");
        Ok(())
    }

    async fn seek_to(&self, _seconds: f64) -> Result<()> {
        debug!("Ignoring seek: Tubi embed is not controllable");
        Ok(())
    }

    fn status(&self) -> AdapterStatus {
        self.status.get()
    }

    fn subscribe(&self) -> watch::Receiver<AdapterStatus> {
        self.status.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PlayerPhase;
    use crate::testing::RecordingBridge;

    #[tokio::test]
    async fn test_tubi_only_reports_loaded() {
        let bridge = Arc::new(RecordingBridge::default());
        let adapter = TubiAdapter::new("100098", bridge.clone());
        assert!(!adapter.capabilities().can_control);

        adapter.load().await.unwrap();
        assert_eq!(
            bridge.loaded_url.lock().as_deref(),
            Some("https://tubitv.com/embed/100098")
        );
        adapter.handle_embed_loaded();

        adapter.play().await.unwrap();
        adapter.seek_to(300.0).await.unwrap();

        let status = adapter.status();
        assert!(status.is_ready);
        assert!(!status.is_playing);
        assert_eq!(status.position_seconds, 0.0);
        assert!(bridge.posted().is_empty());
    }

    #[tokio::test]
    async fn test_tubi_load_error() {
        let adapter = TubiAdapter::new("1", Arc::new(RecordingBridge::default()));
        adapter.load().await.unwrap();
        adapter.handle_embed_error("blocked");
        assert_eq!(adapter.status().phase, PlayerPhase::Error);
    }
}
