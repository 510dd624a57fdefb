use log::debug;
use serde::{Deserialize, Serialize};

/// The shared playback record. The host owns the authoritative copy; every
/// other device holds a replica.
///
/// Serialized exactly as the real-time channel stores it:
/// `{"isPlaying": bool, "positionSeconds": number, "updatedAt": epoch-millis}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub is_playing: bool,
    pub position_seconds: f64,
    pub updated_at: i64,
}

impl PlaybackState {
    pub fn new(is_playing: bool, position_seconds: f64, updated_at: i64) -> Self {
        Self {
            is_playing,
            position_seconds: clamp_position(position_seconds),
            updated_at,
        }
    }

    /// Snapshot a host adapter's status at `now_millis`
    pub fn from_status(status: &AdapterStatus, now_millis: i64) -> Self {
        Self::new(status.is_playing, status.position_seconds, now_millis)
    }

    /// Where the host's player should be at `now_millis`, assuming it kept
    /// playing at normal speed since the record was written.
    pub fn expected_position(&self, now_millis: i64) -> f64 {
        if !self.is_playing {
            return self.position_seconds;
        }
        let elapsed = (now_millis - self.updated_at).max(0) as f64 / 1000.0;
        self.position_seconds + elapsed
    }
}

/// Playback state as handed to a guest player by the screen. Carries no
/// timestamp, so it is taken to be current as of receipt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedPlaybackState {
    pub is_playing: bool,
    pub position_seconds: f64,
}

impl SyncedPlaybackState {
    pub fn at(self, received_at: i64) -> PlaybackState {
        PlaybackState::new(self.is_playing, self.position_seconds, received_at)
    }
}

impl From<PlaybackState> for SyncedPlaybackState {
    fn from(state: PlaybackState) -> Self {
        Self {
            is_playing: state.is_playing,
            position_seconds: state.position_seconds,
        }
    }
}

fn clamp_position(position: f64) -> f64 {
    if position.is_finite() && position > 0.0 {
        position
    } else {
        0.0
    }
}

/// Lifecycle of one adapter instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlayerPhase {
    #[default]
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Ended,
    /// Terminal for this attempt. Recovering means picking the source again.
    Error,
}

/// Inputs to the phase machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    Load,
    Loaded,
    Play,
    Pause,
    Ended,
    Restart,
    Fail,
}

impl PlayerPhase {
    /// Next phase, or `None` when the event does not apply in this phase.
    pub fn next(self, event: PhaseEvent) -> Option<PlayerPhase> {
        use PhaseEvent as E;
        use PlayerPhase as P;

        match (self, event) {
            (P::Error, _) => None,
            (_, E::Fail) => Some(P::Error),
            (P::Idle, E::Load) => Some(P::Loading),
            (P::Idle | P::Loading, E::Loaded) => Some(P::Ready),
            (P::Ready | P::Paused | P::Playing, E::Play) => Some(P::Playing),
            (P::Ready | P::Playing | P::Paused | P::Ended, E::Pause) => Some(P::Paused),
            (P::Playing | P::Paused, E::Ended) => Some(P::Ended),
            (P::Ended, E::Restart) => Some(P::Playing),
            _ => None,
        }
    }

    /// Whether the player has loaded and can accept commands
    pub fn is_ready(self) -> bool {
        matches!(
            self,
            PlayerPhase::Ready | PlayerPhase::Playing | PlayerPhase::Paused | PlayerPhase::Ended
        )
    }
}

/// Backend-local status. Input to the published state on the host, and the
/// comparison target for reconciliation on guests. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AdapterStatus {
    pub is_playing: bool,
    pub position_seconds: f64,
    pub duration_seconds: f64,
    pub is_buffering: bool,
    pub is_ready: bool,
    pub phase: PlayerPhase,
}

impl AdapterStatus {
    /// Drive the phase machine and keep the derived flags in line with it.
    /// Returns false when the event was ignored.
    pub fn apply(&mut self, event: PhaseEvent) -> bool {
        match self.phase.next(event) {
            Some(phase) => {
                self.phase = phase;
                self.is_ready = phase.is_ready();
                self.is_playing = phase == PlayerPhase::Playing;
                if phase == PlayerPhase::Error {
                    self.is_buffering = false;
                }
                true
            }
            None => {
                debug!("Ignoring {:?} in phase {:?}", event, self.phase);
                false
            }
        }
    }

    pub fn set_position(&mut self, position_seconds: f64) {
        self.position_seconds = clamp_position(position_seconds);
    }
}
