//! Host side: turn the local adapter's status into channel records.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::channel::PlaybackChannel;
use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::media::VideoAdapter;
use crate::state::{AdapterStatus, PlaybackState};

/// Why a record was published
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishReason {
    /// First record once the host's player is ready
    Initial,
    Play,
    Pause,
    Seek,
    /// Jumped back to the start after the end of the video
    LoopRestart,
    /// Throttled sample during continuous playback
    Sample,
}

impl PublishReason {
    pub fn is_discrete(self) -> bool {
        !matches!(self, PublishReason::Sample)
    }
}

/// Decides which host samples are worth publishing.
///
/// Discrete events go out immediately; continuous playback is sampled at
/// most once per `interval_ms`.
#[derive(Debug, Clone)]
pub struct PublishGate {
    interval_ms: i64,
    seek_tolerance: f64,
    last: Option<PlaybackState>,
}

impl PublishGate {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            interval_ms: config.publish_interval_ms as i64,
            seek_tolerance: config.seek_tolerance,
            last: None,
        }
    }

    /// The last record this gate let through and that was published
    pub fn last(&self) -> Option<PlaybackState> {
        self.last
    }

    pub fn evaluate(
        &self,
        status: &AdapterStatus,
        now_millis: i64,
    ) -> Option<(PlaybackState, PublishReason)> {
        if !status.is_ready {
            return None;
        }
        let candidate = PlaybackState::from_status(status, now_millis);

        let Some(last) = self.last else {
            return Some((candidate, PublishReason::Initial));
        };

        if last.is_playing != candidate.is_playing {
            let reason = if candidate.is_playing {
                PublishReason::Play
            } else {
                PublishReason::Pause
            };
            return Some((candidate, reason));
        }

        let offset = candidate.position_seconds - last.expected_position(now_millis);
        if offset.abs() > self.seek_tolerance {
            let reason = if offset < 0.0 && candidate.position_seconds <= self.seek_tolerance {
                PublishReason::LoopRestart
            } else {
                PublishReason::Seek
            };
            return Some((candidate, reason));
        }

        if candidate.is_playing && now_millis - last.updated_at >= self.interval_ms {
            return Some((candidate, PublishReason::Sample));
        }

        None
    }

    /// Record a successful publish
    pub fn commit(&mut self, state: PlaybackState) {
        self.last = Some(state);
    }
}

/// Callback the host screen hands in as `onPlaybackUpdate(isPlaying, positionSeconds)`
pub type PlaybackUpdateFn = Box<dyn Fn(bool, f64) + Send + Sync>;

/// Publishes the host's playback to the channel. Never reads the channel
/// back: the host does not reconcile against itself.
pub struct HostPublisher {
    adapter: Arc<dyn VideoAdapter>,
    channel: Arc<dyn PlaybackChannel>,
    clock: Arc<dyn Clock>,
    gate: PublishGate,
    on_update: Option<PlaybackUpdateFn>,
}

impl HostPublisher {
    pub fn new(
        adapter: Arc<dyn VideoAdapter>,
        channel: Arc<dyn PlaybackChannel>,
        clock: Arc<dyn Clock>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            adapter,
            channel,
            clock,
            gate: PublishGate::new(config),
            on_update: None,
        }
    }

    /// Also report every published update to the host screen
    pub fn on_playback_update<F>(mut self, callback: F) -> Self
    where
        F: Fn(bool, f64) + Send + Sync + 'static,
    {
        self.on_update = Some(Box::new(callback));
        self
    }

    /// Handle one status sample. Returns why it was published, if it was.
    pub async fn observe(&mut self, status: &AdapterStatus) -> Option<PublishReason> {
        let now = self.clock.now_millis();
        let (state, reason) = self.gate.evaluate(status, now)?;

        if let Err(e) = self.channel.publish(state).await {
            // Not committed, so the next sample tries again
            warn!("Failed to publish playback state: {}", e);
            return None;
        }
        self.gate.commit(state);

        if reason.is_discrete() {
            info!(
                "Published {:?}: playing={} position={:.2}s",
                reason, state.is_playing, state.position_seconds
            );
        } else {
            debug!("Published sample at {:.2}s", state.position_seconds);
        }
        if let Some(callback) = &self.on_update {
            callback(state.is_playing, state.position_seconds);
        }
        Some(reason)
    }

    /// Follow the adapter until it goes away
    pub async fn run(mut self) {
        if !self.adapter.capabilities().can_control {
            info!(
                "{} player exposes no playback position, nothing to publish",
                self.adapter.backend()
            );
            return;
        }

        let mut rx = self.adapter.subscribe();
        let current = *rx.borrow_and_update();
        self.observe(&current).await;

        while rx.changed().await.is_ok() {
            let status = *rx.borrow_and_update();
            self.observe(&status).await;
        }
        debug!("Host publisher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::LocalChannel;
    use crate::clock::ManualClock;
    use crate::media::{ElementEvent, NativeAdapter};
    use crate::state::PlayerPhase;
    use crate::testing::RecordingElement;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn playing(position: f64) -> AdapterStatus {
        AdapterStatus {
            is_playing: true,
            position_seconds: position,
            duration_seconds: 600.0,
            is_buffering: false,
            is_ready: true,
            phase: PlayerPhase::Playing,
        }
    }

    fn paused(position: f64) -> AdapterStatus {
        AdapterStatus {
            is_playing: false,
            phase: PlayerPhase::Paused,
            ..playing(position)
        }
    }

    fn gate_at(last: PlaybackState) -> PublishGate {
        let mut gate = PublishGate::new(&SyncConfig::default());
        gate.commit(last);
        gate
    }

    #[test]
    fn test_nothing_before_ready() {
        let gate = PublishGate::new(&SyncConfig::default());
        let status = AdapterStatus::default();
        assert_eq!(gate.evaluate(&status, 0), None);
    }

    #[test]
    fn test_first_ready_sample_is_published() {
        let gate = PublishGate::new(&SyncConfig::default());
        let (state, reason) = gate.evaluate(&paused(0.0), 1_000).unwrap();
        assert_eq!(reason, PublishReason::Initial);
        assert_eq!(state, PlaybackState::new(false, 0.0, 1_000));
    }

    #[test]
    fn test_play_and_pause_publish_immediately() {
        let gate = gate_at(PlaybackState::new(false, 10.0, 1_000));
        let (_, reason) = gate.evaluate(&playing(10.0), 1_010).unwrap();
        assert_eq!(reason, PublishReason::Play);

        let gate = gate_at(PlaybackState::new(true, 10.0, 1_000));
        let (state, reason) = gate.evaluate(&paused(10.1), 1_100).unwrap();
        assert_eq!(reason, PublishReason::Pause);
        assert_eq!(state.position_seconds, 10.1);
    }

    #[test]
    fn test_continuous_playback_is_throttled() {
        let gate = gate_at(PlaybackState::new(true, 10.0, 1_000));
        assert_eq!(gate.evaluate(&playing(10.25), 1_250), None);
        let (_, reason) = gate.evaluate(&playing(10.5), 1_500).unwrap();
        assert_eq!(reason, PublishReason::Sample);
    }

    #[test]
    fn test_idle_pause_publishes_nothing() {
        let gate = gate_at(PlaybackState::new(false, 45.0, 1_000));
        assert_eq!(gate.evaluate(&paused(45.0), 60_000), None);
    }

    #[test]
    fn test_seek_detected_against_extrapolation() {
        let gate = gate_at(PlaybackState::new(true, 10.0, 1_000));
        // 0.3s later the player jumped to 60s
        let (_, reason) = gate.evaluate(&playing(60.0), 1_300).unwrap();
        assert_eq!(reason, PublishReason::Seek);

        // Seeking while paused
        let gate = gate_at(PlaybackState::new(false, 10.0, 1_000));
        let (_, reason) = gate.evaluate(&paused(5.0), 1_300).unwrap();
        assert_eq!(reason, PublishReason::Seek);
    }

    #[test]
    fn test_loop_restart_detected() {
        let gate = gate_at(PlaybackState::new(true, 599.8, 1_000));
        let (state, reason) = gate.evaluate(&playing(0.1), 1_250).unwrap();
        assert_eq!(reason, PublishReason::LoopRestart);
        assert!(state.is_playing);
    }

    #[tokio::test]
    async fn test_observe_publishes_and_calls_back() {
        let clock = Arc::new(ManualClock::new(5_000));
        let channel = Arc::new(LocalChannel::default());
        let element = Arc::new(RecordingElement::default());
        let adapter: Arc<dyn VideoAdapter> =
            Arc::new(NativeAdapter::new("https://cdn.example.com/a.mp4", element));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut publisher = HostPublisher::new(
            adapter,
            channel.clone(),
            clock.clone(),
            &SyncConfig::default(),
        )
        .on_playback_update(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(publisher.observe(&playing(120.0)).await, Some(PublishReason::Initial));
        clock.advance_millis(100);
        assert_eq!(publisher.observe(&playing(120.1)).await, None);
        clock.advance_millis(100);
        assert_eq!(publisher.observe(&paused(120.2)).await, Some(PublishReason::Pause));

        assert_eq!(channel.latest(), Some(PlaybackState::new(false, 120.2, 5_200)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_run_follows_adapter() {
        let clock = Arc::new(ManualClock::new(0));
        let channel = Arc::new(LocalChannel::default());
        let element = Arc::new(RecordingElement::default());
        let native = Arc::new(NativeAdapter::new("https://cdn.example.com/a.mp4", element));
        let adapter: Arc<dyn VideoAdapter> = native.clone();
        let mut rx = channel.subscribe();

        let task = tokio::spawn(
            HostPublisher::new(adapter.clone(), channel.clone(), clock.clone(), &SyncConfig::default())
                .run(),
        );
        tokio::task::yield_now().await;

        adapter.load().await.unwrap();
        native.handle_event(ElementEvent::Loaded { duration: 60.0 }).await;
        let first = rx.recv().await.unwrap();
        assert_eq!(first, PlaybackState::new(false, 0.0, 0));

        clock.advance_millis(50);
        adapter.play().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(second.is_playing);
        assert_eq!(second.updated_at, 50);

        task.abort();
    }

    #[tokio::test]
    async fn test_end_of_video_goes_out_as_loop_restart() {
        let clock = Arc::new(ManualClock::new(0));
        let channel = Arc::new(LocalChannel::default());
        let element = Arc::new(RecordingElement::yielding());
        let native = Arc::new(NativeAdapter::new("https://cdn.example.com/a.mp4", element));
        let adapter: Arc<dyn VideoAdapter> = native.clone();
        let mut rx = channel.subscribe();

        let task = tokio::spawn(
            HostPublisher::new(adapter.clone(), channel.clone(), clock.clone(), &SyncConfig::default())
                .run(),
        );
        tokio::task::yield_now().await;

        adapter.load().await.unwrap();
        native.handle_event(ElementEvent::Loaded { duration: 60.0 }).await;
        assert_eq!(rx.recv().await.unwrap(), PlaybackState::new(false, 0.0, 0));
        adapter.play().await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), PlaybackState::new(true, 0.0, 0));

        clock.advance_millis(59_900);
        native
            .handle_event(ElementEvent::Tick { position: 59.9, playing: true })
            .await;
        assert_eq!(rx.recv().await.unwrap(), PlaybackState::new(true, 59.9, 59_900));

        native.handle_event(ElementEvent::Ended).await;
        assert_eq!(rx.recv().await.unwrap(), PlaybackState::new(true, 0.0, 59_900));
        assert!(rx.try_recv().is_err());

        task.abort();
    }

    #[tokio::test]
    async fn test_uncontrollable_host_publishes_nothing() {
        use crate::media::TubiAdapter;
        use crate::testing::RecordingBridge;

        let channel = Arc::new(LocalChannel::default());
        let tubi = Arc::new(TubiAdapter::new("100098", Arc::new(RecordingBridge::default())));
        tubi.handle_embed_loaded();
        let adapter: Arc<dyn VideoAdapter> = tubi;

        HostPublisher::new(
            adapter,
            channel.clone(),
            Arc::new(ManualClock::new(0)),
            &SyncConfig::default(),
        )
        .run()
        .await;

        assert_eq!(channel.latest(), None);
    }
}
