//! Recording fakes for the platform seams

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Result, SyncError};
use crate::media::{EmbedBridge, MediaElement};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ElementCall {
    Load(String),
    Play,
    Pause,
    Seek(f64),
}

#[derive(Default)]
pub(crate) struct RecordingElement {
    calls: Mutex<Vec<ElementCall>>,
    fail_next: Mutex<Option<String>>,
    fail_after: Mutex<Option<String>>,
    yielding: bool,
}

impl RecordingElement {
    /// An element that hands control back to the runtime inside every call,
    /// the way a real player's bridge does
    pub(crate) fn yielding() -> Self {
        Self {
            yielding: true,
            ..Default::default()
        }
    }

    pub(crate) fn calls(&self) -> Vec<ElementCall> {
        self.calls.lock().clone()
    }

    /// Calls after the initial load
    pub(crate) fn commands(&self) -> Vec<ElementCall> {
        self.calls()
            .into_iter()
            .filter(|call| !matches!(call, ElementCall::Load(_)))
            .collect()
    }

    pub(crate) fn clear(&self) {
        self.calls.lock().clear();
    }

    pub(crate) fn fail_next(&self, reason: &str) {
        *self.fail_next.lock() = Some(reason.to_string());
    }

    /// Let the next call succeed and the one after it fail
    pub(crate) fn fail_after_next(&self, reason: &str) {
        *self.fail_after.lock() = Some(reason.to_string());
    }

    async fn record(&self, call: ElementCall) -> Result<()> {
        if self.yielding {
            tokio::task::yield_now().await;
        }
        if let Some(reason) = self.fail_next.lock().take() {
            return Err(SyncError::Bridge(reason));
        }
        if let Some(reason) = self.fail_after.lock().take() {
            *self.fail_next.lock() = Some(reason);
        }
        self.calls.lock().push(call);
        Ok(())
    }
}

#[async_trait]
impl MediaElement for RecordingElement {
    async fn load(&self, url: &str) -> Result<()> {
        self.record(ElementCall::Load(url.to_string())).await
    }

    async fn play(&self) -> Result<()> {
        self.record(ElementCall::Play).await
    }

    async fn pause(&self) -> Result<()> {
        self.record(ElementCall::Pause).await
    }

    async fn seek(&self, seconds: f64) -> Result<()> {
        self.record(ElementCall::Seek(seconds)).await
    }
}

#[derive(Default)]
pub(crate) struct RecordingBridge {
    pub(crate) loaded_html: Mutex<Option<String>>,
    pub(crate) loaded_url: Mutex<Option<String>>,
    posted: Mutex<Vec<String>>,
}

impl RecordingBridge {
    pub(crate) fn posted(&self) -> Vec<serde_json::Value> {
        self.posted
            .lock()
            .iter()
            .map(|raw| serde_json::from_str(raw).expect("posted message is json"))
            .collect()
    }
}

#[async_trait]
impl EmbedBridge for RecordingBridge {
    async fn load_html(&self, html: &str) -> Result<()> {
        *self.loaded_html.lock() = Some(html.to_string());
        Ok(())
    }

    async fn load_url(&self, url: &str) -> Result<()> {
        *self.loaded_url.lock() = Some(url.to_string());
        Ok(())
    }

    async fn post(&self, message: &str) -> Result<()> {
        self.posted.lock().push(message.to_string());
        Ok(())
    }
}
