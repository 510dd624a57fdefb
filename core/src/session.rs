use std::sync::Arc;

use log::{info, warn};
use tokio::task::JoinHandle;

use crate::channel::PlaybackChannel;
use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::media::VideoAdapter;
use crate::publisher::HostPublisher;
use crate::reconciler::ClientReconciler;
use crate::source::VideoSource;
use crate::state::{AdapterStatus, PlayerPhase};

/// This device's part in the party. Assigned by room metadata, never
/// negotiated here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Guest,
}

/// One device's view of a watch party.
///
/// Owns the adapter for the party's video and whichever of the publisher or
/// reconciler its role calls for. Leaving (or dropping the session) stops
/// the task; commands still in flight finish unobserved.
pub struct PartySession {
    source: VideoSource,
    role: Role,
    adapter: Arc<dyn VideoAdapter>,
    config: SyncConfig,
    task: Option<JoinHandle<()>>,
}

impl PartySession {
    pub fn new(
        source: VideoSource,
        role: Role,
        adapter: Arc<dyn VideoAdapter>,
        config: SyncConfig,
    ) -> Self {
        Self {
            source,
            role,
            adapter,
            config,
            task: None,
        }
    }

    pub fn source(&self) -> &VideoSource {
        &self.source
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn adapter(&self) -> &Arc<dyn VideoAdapter> {
        &self.adapter
    }

    /// Whether host playback controls should be offered
    pub fn shows_host_controls(&self) -> bool {
        self.role == Role::Host && self.adapter.capabilities().can_control
    }

    /// Wait for the adapter to become ready, at most `ready_timeout`.
    pub async fn wait_until_ready(&self) -> Result<AdapterStatus> {
        let timeout = self.config.ready_timeout();
        let mut rx = self.adapter.subscribe();

        let status = tokio::time::timeout(
            timeout,
            rx.wait_for(|status| status.is_ready || status.phase == PlayerPhase::Error),
        )
        .await
        .map_err(|_| SyncError::ReadyTimeout(timeout))?
        .map(|status| *status)
        .map_err(|_| SyncError::Load("player went away".into()))?;

        if status.phase == PlayerPhase::Error {
            return Err(SyncError::Load(format!("{} failed to load", self.source.url())));
        }
        Ok(status)
    }

    /// Start publishing (host) or reconciling (guest)
    pub fn start(&mut self, channel: Arc<dyn PlaybackChannel>, clock: Arc<dyn Clock>) {
        self.leave();

        let task = match self.role {
            Role::Host => {
                let publisher =
                    HostPublisher::new(self.adapter.clone(), channel, clock, &self.config);
                tokio::spawn(publisher.run())
            }
            Role::Guest => {
                let reconciler = ClientReconciler::new(self.adapter.clone(), clock, &self.config);
                // Subscribe before reading the current record so nothing
                // written in between is lost
                let rx = channel.subscribe();
                let latest = channel.latest();
                tokio::spawn(async move {
                    if let Some(state) = latest {
                        reconciler.reconcile(&state).await;
                    }
                    reconciler.run(rx).await;
                })
            }
        };

        info!("Joined party for {} as {:?}", self.source.url(), self.role);
        self.task = Some(task);
    }

    /// Load the video, wait for it, then start syncing
    pub async fn join(
        &mut self,
        channel: Arc<dyn PlaybackChannel>,
        clock: Arc<dyn Clock>,
    ) -> Result<()> {
        self.adapter.load().await?;
        if let Err(e) = self.wait_until_ready().await {
            warn!("Couldn't load video {}: {}", self.source.url(), e);
            return Err(e);
        }
        self.start(channel, clock);
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn leave(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("Left party for {}", self.source.url());
        }
    }
}

impl Drop for PartySession {
    fn drop(&mut self) {
        self.leave();
    }
}
