use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};

use super::{BackendKind, Capabilities, EmbedBridge, StatusCell, VideoAdapter};
use crate::error::{Result, SyncError};
use crate::state::{AdapterStatus, PhaseEvent, PlayerPhase};

// IFrame Player API state codes
const YT_ENDED: i32 = 0;
const YT_PLAYING: i32 = 1;
const YT_PAUSED: i32 = 2;
const YT_BUFFERING: i32 = 3;

/// Commands posted into the embed page
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum PlayerCommand {
    Play,
    Pause,
    SeekTo { seconds: f64 },
}

impl PlayerCommand {
    fn name(&self) -> &'static str {
        match self {
            PlayerCommand::Play => "play",
            PlayerCommand::Pause => "pause",
            PlayerCommand::SeekTo { .. } => "seek",
        }
    }
}

/// Messages the embed page posts back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum PageMessage {
    /// The IFrame player exists and accepts commands
    Ready {
        #[serde(default)]
        duration: f64,
    },
    /// Polled sample
    #[serde(rename_all = "camelCase")]
    Status {
        current_time: f64,
        duration: f64,
        player_state: i32,
    },
    Error { code: i32 },
}

struct QueuedCommand {
    command: PlayerCommand,
    done: oneshot::Sender<Result<()>>,
}

/// Adapter for YouTube, driven through an IFrame API page inside a web view.
///
/// Commands go through a queue that a dispatcher task drains into the bridge.
/// Until the page reports `ready` nothing is enqueued at all: commands are
/// dropped so a late-loading player never replays stale instructions.
/// Status is polled inside the page and arrives through
/// [`YouTubeAdapter::handle_page_message`].
pub struct YouTubeAdapter {
    video_id: String,
    bridge: Arc<dyn EmbedBridge>,
    poll_interval: Duration,
    status: StatusCell,
    queue: mpsc::UnboundedSender<QueuedCommand>,
}

impl YouTubeAdapter {
    /// Create the adapter and its dispatcher. Must be called inside a tokio
    /// runtime. The dispatcher stops when the adapter is dropped.
    pub fn new(
        video_id: impl Into<String>,
        bridge: Arc<dyn EmbedBridge>,
        poll_interval: Duration,
    ) -> Self {
        let (queue, rx) = mpsc::unbounded_channel();
        tokio::spawn(dispatch(rx, bridge.clone()));

        Self {
            video_id: video_id.into(),
            bridge,
            poll_interval,
            status: StatusCell::new(),
            queue,
        }
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    /// Feed a raw message posted by the embed page
    pub async fn handle_page_message(&self, raw: &str) -> Result<()> {
        let message: PageMessage = serde_json::from_str(raw)?;
        self.handle_message(message).await;
        Ok(())
    }

    pub async fn handle_message(&self, message: PageMessage) {
        match message {
            PageMessage::Ready { duration } => {
                info!("YouTube player ready for {}", self.video_id);
                self.status.update(|status| {
                    status.duration_seconds = duration.max(0.0);
                    status.apply(PhaseEvent::Loaded);
                });
            }
            PageMessage::Status {
                current_time,
                duration,
                player_state,
            } => {
                let mut ended = false;
                self.status.update(|status| {
                    if !status.is_ready {
                        return;
                    }
                    status.set_position(current_time);
                    status.duration_seconds = duration.max(0.0);
                    status.is_buffering = player_state == YT_BUFFERING;
                    match player_state {
                        YT_PLAYING => {
                            if status.phase == PlayerPhase::Ended {
                                status.apply(PhaseEvent::Restart);
                            } else {
                                status.apply(PhaseEvent::Play);
                            }
                        }
                        YT_PAUSED => {
                            status.apply(PhaseEvent::Pause);
                        }
                        YT_ENDED => {
                            ended = status.apply(PhaseEvent::Ended);
                        }
                        _ => {}
                    }
                });
                if ended {
                    self.restart().await;
                }
            }
            PageMessage::Error { code } => {
                error!("YouTube player error {} for {}", code, self.video_id);
                self.status.apply(PhaseEvent::Fail);
            }
        }
    }

    async fn restart(&self) {
        debug!("YouTube video ended, restarting");
        if let Err(e) = self.seek_to(0.0).await {
            warn!("Restart seek failed: {}", e);
            return;
        }
        if let Err(e) = self.play().await {
            warn!("Restart play failed: {}", e);
        }
    }

    async fn send(&self, command: PlayerCommand) -> Result<bool> {
        if !self.status.get().is_ready {
            warn!(
                "Dropping {} for {}: player not ready",
                command.name(),
                self.video_id
            );
            return Ok(false);
        }

        let (done, ack) = oneshot::channel();
        self.queue
            .send(QueuedCommand { command, done })
            .map_err(|_| SyncError::Bridge("command queue closed".into()))?;
        ack.await
            .map_err(|_| SyncError::Bridge("dispatcher stopped".into()))?
            .map_err(|e| SyncError::command(command.name(), e.to_string()))?;
        Ok(true)
    }
}

async fn dispatch(mut rx: mpsc::UnboundedReceiver<QueuedCommand>, bridge: Arc<dyn EmbedBridge>) {
    while let Some(queued) = rx.recv().await {
        let result = match serde_json::to_string(&queued.command) {
            Ok(message) => bridge.post(&message).await,
            Err(e) => Err(e.into()),
        };
        // The caller may have given up waiting
        let _ = queued.done.send(result);
    }
    debug!("YouTube command dispatcher stopped");
}

#[async_trait]
impl VideoAdapter for YouTubeAdapter {
    fn backend(&self) -> BackendKind {
        BackendKind::YouTube
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities { can_control: true }
    }

    async fn load(&self) -> Result<()> {
        self.status.apply(PhaseEvent::Load);
        let html = embed_html(&self.video_id, self.poll_interval);
        if let Err(e) = self.bridge.load_html(&html).await {
            self.status.apply(PhaseEvent::Fail);
            return Err(SyncError::Load(e.to_string()));
        }
        Ok(())
    }

    // No acknowledgement comes back for play/pause, so the status is updated
    // optimistically and the next polled sample corrects it.
    async fn play(&self) -> Result<()> {
        if self.send(PlayerCommand::Play).await? {
            self.status.mark_playing();
        }
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        if self.send(PlayerCommand::Pause).await? {
            self.status.apply(PhaseEvent::Pause);
        }
        Ok(())
    }

    async fn seek_to(&self, seconds: f64) -> Result<()> {
        if self.send(PlayerCommand::SeekTo { seconds }).await? {
            self.status.update(|status| status.set_position(seconds));
        }
        Ok(())
    }

    fn status(&self) -> AdapterStatus {
        self.status.get()
    }

    fn subscribe(&self) -> watch::Receiver<AdapterStatus> {
        self.status.subscribe()
    }
}

/// The page loaded into the web view. It hosts the IFrame player, executes
/// posted commands, and posts a status sample every `poll_interval` since the
/// IFrame API does not push position updates on its own.
pub fn embed_html(video_id: &str, poll_interval: Duration) -> String {
    // Ids come from the classifier but still end up inside a script literal
    let video_id: String = video_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    let poll_ms = poll_interval.as_millis().max(50);

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta name="viewport" content="width=device-width, initial-scale=1, maximum-scale=1">
<style>html, body, #player {{ margin: 0; width: 100%; height: 100%; background: #000; }}</style>
</head>
<body>
<div id="player"></div>
<script src="https://www.youtube.com/iframe_api"></script>
<script>
  var player = null;
  var poller = null;

  function postToHost(message) {{
    var raw = JSON.stringify(message);
    if (window.ipc && window.ipc.postMessage) {{
      window.ipc.postMessage(raw);
    }} else if (window.ReactNativeWebView) {{
      window.ReactNativeWebView.postMessage(raw);
    }} else {{
      window.parent.postMessage(raw, "*");
    }}
  }}

  function onYouTubeIframeAPIReady() {{
    player = new YT.Player("player", {{
      videoId: "{video_id}",
      playerVars: {{ playsinline: 1, controls: 1, rel: 0 }},
      events: {{
        onReady: function () {{
          postToHost({{ event: "ready", duration: player.getDuration() || 0 }});
          poller = setInterval(function () {{
            postToHost({{
              event: "status",
              currentTime: player.getCurrentTime() || 0,
              duration: player.getDuration() || 0,
              playerState: player.getPlayerState()
            }});
          }}, {poll_ms});
        }},
        onError: function (e) {{
          postToHost({{ event: "error", code: e.data }});
        }}
      }}
    }});
  }}

  function handleCommand(raw) {{
    if (!player) {{ return; }}
    var command = typeof raw === "string" ? JSON.parse(raw) : raw;
    switch (command.command) {{
      case "play": player.playVideo(); break;
      case "pause": player.pauseVideo(); break;
      case "seekTo": player.seekTo(command.seconds, true); break;
    }}
  }}

  window.addEventListener("message", function (e) {{ handleCommand(e.data); }});
  document.addEventListener("message", function (e) {{ handleCommand(e.data); }});
</script>
</body>
</html>
"#
    )
}
