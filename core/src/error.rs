use std::time::Duration;

use thiserror::Error;

/// Errors produced by the sync subsystem.
///
/// None of these ever travel through the playback channel: a guest that fails
/// to load or to execute a command keeps the error to itself.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The backend never reported ready within the bounded wait
    #[error("video did not become ready within {0:?}")]
    ReadyTimeout(Duration),

    /// The backend reported a load failure
    #[error("couldn't load video: {0}")]
    Load(String),

    /// A play/pause/seek command was rejected by the player
    #[error("{command} failed: {reason}")]
    Command { command: &'static str, reason: String },

    /// The message bridge to an embedded page is gone
    #[error("embed bridge error: {0}")]
    Bridge(String),

    /// Publishing to or subscribing from the playback channel failed
    #[error("playback channel error: {0}")]
    Channel(String),

    /// A message from an embedded page could not be decoded
    #[error("malformed message: {0}")]
    Decode(#[from] serde_json::Error),

    /// Invalid configuration value
    #[error("invalid config: {0}")]
    Config(String),
}

impl SyncError {
    pub fn command(command: &'static str, reason: impl Into<String>) -> Self {
        SyncError::Command {
            command,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
