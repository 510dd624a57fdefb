use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use tokio::sync::watch;

use super::{BackendKind, Capabilities, StatusCell, VideoAdapter};
use crate::error::{Result, SyncError};
use crate::state::{AdapterStatus, PhaseEvent, PlayerPhase};

/// The platform's media element (video tag, AVPlayer, ExoPlayer, ...).
/// Each call resolves once the element has carried it out.
#[async_trait]
pub trait MediaElement: Send + Sync {
    async fn load(&self, url: &str) -> Result<()>;
    async fn play(&self) -> Result<()>;
    async fn pause(&self) -> Result<()>;
    async fn seek(&self, seconds: f64) -> Result<()>;
}

/// Events the platform forwards from its media element
#[derive(Debug, Clone, PartialEq)]
pub enum ElementEvent {
    Loaded { duration: f64 },
    /// Playback tick, sub-second
    Tick { position: f64, playing: bool },
    Buffering(bool),
    Ended,
    Failed(String),
}

/// Adapter for anything the device can play directly
pub struct NativeAdapter {
    url: String,
    element: Arc<dyn MediaElement>,
    status: StatusCell,
}

impl NativeAdapter {
    pub fn new(url: impl Into<String>, element: Arc<dyn MediaElement>) -> Self {
        Self {
            url: url.into(),
            element,
            status: StatusCell::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Feed an element event into the adapter
    pub async fn handle_event(&self, event: ElementEvent) {
        match event {
            ElementEvent::Loaded { duration } => {
                info!("Native player loaded {} ({:.1}s)", self.url, duration);
                self.status.update(|status| {
                    status.duration_seconds = duration.max(0.0);
                    status.apply(PhaseEvent::Loaded);
                });
            }
            ElementEvent::Tick { position, playing } => {
                self.status.update(|status| {
                    status.set_position(position);
                    if playing != status.is_playing {
                        // Someone used the element's own controls
                        status.apply(if playing {
                            PhaseEvent::Play
                        } else {
                            PhaseEvent::Pause
                        });
                    }
                });
            }
            ElementEvent::Buffering(buffering) => {
                self.status.update(|status| status.is_buffering = buffering);
            }
            ElementEvent::Ended => {
                debug!("End of video reached, restarting");
                self.restart().await;
            }
            ElementEvent::Failed(reason) => {
                error!("Native player failed to load {}: {}", self.url, reason);
                self.status.apply(PhaseEvent::Fail);
            }
        }
    }

    /// Loop back to the start. The end, the jump to 0 and resuming land in
    /// one status update, so observers see a playing jump back rather than
    /// a pause at the end.
    async fn restart(&self) {
        if let Err(e) = self.element.seek(0.0).await {
            warn!("Restart seek failed: {}", e);
            self.status.apply(PhaseEvent::Ended);
            return;
        }
        let resumed = match self.element.play().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Restart play failed: {}", e);
                false
            }
        };
        self.status.update(|status| {
            status.apply(PhaseEvent::Ended);
            status.set_position(0.0);
            let event = match (resumed, status.phase) {
                (true, PlayerPhase::Ended) => PhaseEvent::Restart,
                (true, _) => PhaseEvent::Play,
                (false, _) => PhaseEvent::Pause,
            };
            status.apply(event);
        });
    }

    fn accepts_commands(&self, command: &str) -> bool {
        let ready = self.status.get().is_ready;
        if !ready {
            debug!("Dropping {} on native player: not ready", command);
        }
        ready
    }
}

#[async_trait]
impl VideoAdapter for NativeAdapter {
    fn backend(&self) -> BackendKind {
        BackendKind::Native
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities { can_control: true }
    }

    async fn load(&self) -> Result<()> {
        self.status.apply(PhaseEvent::Load);
        if let Err(e) = self.element.load(&self.url).await {
            self.status.apply(PhaseEvent::Fail);
            return Err(SyncError::Load(e.to_string()));
        }
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        if !self.accepts_commands("play") {
            return Ok(());
        }
        self.element
            .play()
            .await
            .map_err(|e| SyncError::command("play", e.to_string()))?;
        self.status.mark_playing();
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        if !self.accepts_commands("pause") {
            return Ok(());
        }
        self.element
            .pause()
            .await
            .map_err(|e| SyncError::command("pause", e.to_string()))?;
        self.status.apply(PhaseEvent::Pause);
        Ok(())
    }

    async fn seek_to(&self, seconds: f64) -> Result<()> {
        if !self.accepts_commands("seek") {
            return Ok(());
        }
        self.element
            .seek(seconds)
            .await
            .map_err(|e| SyncError::command("seek", e.to_string()))?;
        self.status.update(|status| {
            status.set_position(seconds);
            // Seeking out of the end state leaves the player paused
            if status.phase == PlayerPhase::Ended {
                status.apply(PhaseEvent::Pause);
            }
        });
        Ok(())
    }

    fn status(&self) -> AdapterStatus {
        self.status.get()
    }

    fn subscribe(&self) -> watch::Receiver<AdapterStatus> {
        self.status.subscribe()
    }
}
