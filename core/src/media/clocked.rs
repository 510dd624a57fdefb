use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::native::{ElementEvent, MediaElement, NativeAdapter};
use crate::clock::Clock;
use crate::error::Result;

struct ClockedState {
    loaded: bool,
    reported_loaded: bool,
    playing: bool,
    anchor_position: f64,
    anchor_millis: i64,
}

/// A software media element whose position advances with a [`Clock`].
///
/// Stands in for a real player when simulating a party. `rate` lets a
/// simulated device run fast or slow so drift builds up over time.
pub struct ClockedElement {
    clock: Arc<dyn Clock>,
    duration: f64,
    rate: f64,
    state: Mutex<ClockedState>,
}

impl ClockedElement {
    pub fn new(clock: Arc<dyn Clock>, duration: f64) -> Self {
        let now = clock.now_millis();
        Self {
            clock,
            duration: duration.max(0.0),
            rate: 1.0,
            state: Mutex::new(ClockedState {
                loaded: false,
                reported_loaded: false,
                playing: false,
                anchor_position: 0.0,
                anchor_millis: now,
            }),
        }
    }

    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = rate.max(0.0);
        self
    }

    pub fn position(&self) -> f64 {
        let state = self.state.lock();
        self.position_locked(&state)
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    fn position_locked(&self, state: &ClockedState) -> f64 {
        if !state.playing {
            return state.anchor_position;
        }
        let elapsed = (self.clock.now_millis() - state.anchor_millis).max(0) as f64 / 1000.0;
        (state.anchor_position + elapsed * self.rate).min(self.duration)
    }

    fn reanchor(&self, state: &mut ClockedState, position: f64) {
        state.anchor_position = position.clamp(0.0, self.duration);
        state.anchor_millis = self.clock.now_millis();
    }

    /// The event a real element would fire right now
    pub fn next_event(&self) -> Option<ElementEvent> {
        let mut state = self.state.lock();
        if !state.loaded {
            return None;
        }
        if !state.reported_loaded {
            state.reported_loaded = true;
            return Some(ElementEvent::Loaded {
                duration: self.duration,
            });
        }

        let position = self.position_locked(&state);
        if state.playing && position >= self.duration {
            state.playing = false;
            self.reanchor(&mut state, self.duration);
            return Some(ElementEvent::Ended);
        }
        Some(ElementEvent::Tick {
            position,
            playing: state.playing,
        })
    }
}

#[async_trait]
impl MediaElement for ClockedElement {
    async fn load(&self, _url: &str) -> Result<()> {
        self.state.lock().loaded = true;
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        let mut state = self.state.lock();
        if !state.playing {
            let position = self.position_locked(&state);
            self.reanchor(&mut state, position);
            state.playing = true;
        }
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        let mut state = self.state.lock();
        let position = self.position_locked(&state);
        self.reanchor(&mut state, position);
        state.playing = false;
        Ok(())
    }

    async fn seek(&self, seconds: f64) -> Result<()> {
        let mut state = self.state.lock();
        self.reanchor(&mut state, seconds);
        Ok(())
    }
}

/// Forward the element's events into the adapter every `interval`
pub fn spawn_ticker(
    adapter: Arc<NativeAdapter>,
    element: Arc<ClockedElement>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Some(event) = element.next_event() {
                adapter.handle_event(event).await;
            }
        }
    })
}
