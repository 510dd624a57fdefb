pub mod channel;
pub mod clock;
pub mod config;
pub mod error;
pub mod media;
pub mod publisher;
pub mod reconciler;
pub mod session;
pub mod source;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

// Re-exports
pub use channel::{LocalChannel, PlaybackChannel};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use media::{
    BackendKind, Capabilities, EmbedBridge, MediaElement, NativeAdapter, TubiAdapter, VideoAdapter,
    YouTubeAdapter,
};
pub use publisher::{HostPublisher, PublishReason};
pub use reconciler::{ClientReconciler, Correction};
pub use session::{PartySession, Role};
pub use source::{VideoKind, VideoSource, classify};
pub use state::{AdapterStatus, PlaybackState, PlayerPhase, SyncedPlaybackState};

/// Platform handles the adapters are built on
#[derive(Clone)]
pub struct PlatformBackends {
    /// Media element for direct playback
    pub element: Arc<dyn MediaElement>,
    /// Web view for embedded players
    pub embed: Arc<dyn EmbedBridge>,
}

/// The adapter for a party's source. Must be called inside a tokio runtime.
pub fn create_adapter(
    source: &VideoSource,
    backends: &PlatformBackends,
    config: &SyncConfig,
) -> Arc<dyn VideoAdapter> {
    match source.kind() {
        VideoKind::Native | VideoKind::Vimeo { .. } => Arc::new(NativeAdapter::new(
            source.playback_url(),
            backends.element.clone(),
        )),
        VideoKind::YouTube { id } => Arc::new(YouTubeAdapter::new(
            id,
            backends.embed.clone(),
            config.youtube_poll_interval(),
        )),
        VideoKind::Tubi { id } => Arc::new(TubiAdapter::new(id, backends.embed.clone())),
    }
}
