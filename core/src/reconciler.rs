//! Guest side: converge the local player onto the host's published state.


use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::broadcast;

use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::media::VideoAdapter;
use crate::state::{AdapterStatus, PlaybackState, SyncedPlaybackState};

/// A command issued to bring the local player in line
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correction {
    Play,
    Pause,
    Seek(f64),
}

/// Drives a guest's adapter from incoming playback records.
///
/// Each record is handled on its own. A correction may still be in flight
/// when the next record arrives and be computed against a stale position;
/// the cycle after that fixes it.
pub struct ClientReconciler {
    adapter: Arc<dyn VideoAdapter>,
    clock: Arc<dyn Clock>,
    threshold: Option<f64>,
}

impl ClientReconciler {
    pub fn new(adapter: Arc<dyn VideoAdapter>, clock: Arc<dyn Clock>, config: &SyncConfig) -> Self {
        let threshold = if adapter.capabilities().can_control {
            config.drift_threshold(adapter.backend())
        } else {
            None
        };
        Self {
            adapter,
            clock,
            threshold,
        }
    }

    /// Seconds of drift tolerated, `None` when reconciliation is disabled
    pub fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    /// Corrections needed to move `local` onto `state` at `now_millis`.
    ///
    /// When resuming, the seek goes before play; when pausing, pause goes
    /// before the seek so the player settles on the paused position.
    pub fn plan(&self, state: &PlaybackState, local: &AdapterStatus, now_millis: i64) -> Vec<Correction> {
        let Some(threshold) = self.threshold else {
            return Vec::new();
        };
        if !local.is_ready {
            return Vec::new();
        }

        let expected = state.expected_position(now_millis);
        let drift = (local.position_seconds - expected).abs();
        let seek = (drift > threshold).then_some(Correction::Seek(expected));

        let mut corrections = Vec::with_capacity(2);
        match (state.is_playing, local.is_playing) {
            (true, false) => {
                corrections.extend(seek);
                corrections.push(Correction::Play);
            }
            (false, true) => {
                corrections.push(Correction::Pause);
                corrections.extend(seek);
            }
            _ => corrections.extend(seek),
        }
        corrections
    }

    /// Run one reconciliation cycle. Returns the corrections issued; failed
    /// commands are logged and left for the next cycle.
    pub async fn reconcile(&self, state: &PlaybackState) -> Vec<Correction> {
        let local = self.adapter.status();
        let now = self.clock.now_millis();
        let corrections = self.plan(state, &local, now);

        for correction in &corrections {
            let result = match *correction {
                Correction::Play => self.adapter.play().await,
                Correction::Pause => self.adapter.pause().await,
                Correction::Seek(position) => {
                    info!(
                        "Drift {:.2}s, seeking {} player to {:.2}s",
                        (local.position_seconds - position).abs(),
                        self.adapter.backend(),
                        position
                    );
                    self.adapter.seek_to(position).await
                }
            };
            if let Err(e) = result {
                warn!("Correction {:?} failed: {}", correction, e);
            }
        }
        corrections
    }

    /// Reconcile against the screen-provided state. `None` means this
    /// device is the host and there is nothing to follow.
    pub async fn reconcile_synced(&self, synced: Option<SyncedPlaybackState>) -> Vec<Correction> {
        match synced {
            Some(synced) => {
                let state = synced.at(self.clock.now_millis());
                self.reconcile(&state).await
            }
            None => Vec::new(),
        }
    }

    /// Reconcile every record from `rx` until the channel closes
    pub async fn run(self, mut rx: broadcast::Receiver<PlaybackState>) {
        if self.threshold.is_none() {
            info!(
                "{} player cannot be controlled, not reconciling",
                self.adapter.backend()
            );
            return;
        }

        loop {
            match rx.recv().await {
                Ok(state) => {
                    let state = newest_queued(&mut rx, state);
                    self.reconcile(&state).await;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Skipped {} playback records", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        debug!("Client reconciler stopped");
    }
}

/// The last record already waiting behind `state`. Older ones are stale.
fn newest_queued(rx: &mut broadcast::Receiver<PlaybackState>, mut state: PlaybackState) -> PlaybackState {
    loop {
        match rx.try_recv() {
            Ok(next) => state = next,
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                debug!("Skipped {} playback records", skipped);
            }
            Err(_) => return state,
        }
    }
}
