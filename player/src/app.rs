use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use log::{info, warn};
use tokio::task::JoinHandle;
use watchsync_core::media::{ClockedElement, on_status_change, spawn_ticker};
use watchsync_core::{
    BackendKind, Clock, LocalChannel, NativeAdapter, PartySession, PlaybackChannel, PlayerPhase,
    Role, SyncConfig, SystemClock, VideoAdapter, VideoSource,
};

use crate::commands::HostCommand;

/// Settings for one simulated party
#[derive(Debug, Clone)]
pub struct SimulationOptions {
    /// Direct media URL the party watches
    pub url: String,
    /// Length of the simulated video
    pub duration: f64,
    /// Number of guests
    pub guests: usize,
    /// How long to run
    pub run_for: Duration,
    /// Delay between the host starting and each guest joining
    pub late_join: Duration,
    /// Playback rate error of each guest, alternating fast and slow
    pub skew: f64,
    /// Host actions, run while the party plays
    pub script: Vec<HostCommand>,
}

/// One simulated device
struct Device {
    name: String,
    element: Arc<ClockedElement>,
    adapter: Arc<NativeAdapter>,
    session: PartySession,
    ticker: JoinHandle<()>,
}

impl Device {
    fn position(&self) -> f64 {
        self.element.position()
    }

    fn shutdown(mut self) {
        self.session.leave();
        self.ticker.abort();
    }
}

/// A watch party running entirely in this process: one host and several
/// guests with software players, all sharing a local channel.
pub struct App {
    config: SyncConfig,
    clock: Arc<SystemClock>,
    channel: Arc<LocalChannel>,
    host: Option<Device>,
    guests: Vec<Device>,
}

impl App {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            channel: Arc::new(LocalChannel::default()),
            host: None,
            guests: Vec::new(),
        }
    }

    async fn spawn_device(
        &self,
        name: String,
        role: Role,
        rate: f64,
        source: &VideoSource,
        duration: f64,
    ) -> Result<Device> {
        let element = Arc::new(ClockedElement::new(self.clock.clone(), duration).with_rate(rate));
        let adapter = Arc::new(NativeAdapter::new(source.playback_url(), element.clone()));
        let ticker = spawn_ticker(adapter.clone(), element.clone(), self.config.tick_interval());

        let mut session =
            PartySession::new(source.clone(), role, adapter.clone(), self.config.clone());
        session
            .join(self.channel.clone(), self.clock.clone())
            .await
            .with_context(|| format!("{} couldn't join the party", name))?;

        info!("{} joined as {:?} (rate {:.3})", name, role, rate);
        Ok(Device {
            name,
            element,
            adapter,
            session,
            ticker,
        })
    }

    /// Run a simulated party to completion
    pub async fn run(&mut self, options: SimulationOptions) -> Result<()> {
        let source = VideoSource::new(&options.url);
        if source.kind().backend() != BackendKind::Native {
            bail!(
                "Simulation drives software players only; {} is a {} source",
                source.url(),
                source.kind()
            );
        }

        let host = self
            .spawn_device("host".into(), Role::Host, 1.0, &source, options.duration)
            .await?;
        let host_adapter: Arc<dyn VideoAdapter> = host.adapter.clone();
        let mut last_phase = PlayerPhase::Idle;
        let phase_log = on_status_change(&host_adapter, move |status| {
            if status.phase != last_phase {
                info!("Host player: {:?} -> {:?}", last_phase, status.phase);
                last_phase = status.phase;
            }
        });
        host.adapter.play().await.context("host couldn't start playback")?;
        self.host = Some(host);

        let script = tokio::spawn(run_script(host_adapter.clone(), options.script.clone()));
        let started = Instant::now();

        for index in 0..options.guests {
            tokio::time::sleep(options.late_join).await;
            let sign = if index % 2 == 0 { 1.0 } else { -1.0 };
            let rate = 1.0 + sign * options.skew * (index / 2 + 1) as f64;
            let guest = self
                .spawn_device(
                    format!("guest-{}", index + 1),
                    Role::Guest,
                    rate,
                    &source,
                    options.duration,
                )
                .await?;
            self.guests.push(guest);
        }

        let mut report = tokio::time::interval(Duration::from_secs(1));
        while started.elapsed() < options.run_for {
            report.tick().await;
            self.report();
        }

        script.abort();
        phase_log.abort();
        self.shutdown();
        Ok(())
    }

    fn report(&self) {
        let Some(host) = &self.host else {
            return;
        };
        let now = chrono::Local::now().format("%H:%M:%S%.3f");
        let host_position = host.position();
        let published = self
            .channel
            .latest()
            .map(|state| format!("{:.2}s playing={}", state.position_seconds, state.is_playing))
            .unwrap_or_else(|| "-".into());
        println!(
            "[{}] {}: {:>8.2}s  (record {})",
            now, host.name, host_position, published
        );

        for guest in &self.guests {
            let status = guest.adapter.status();
            println!(
                "[{}] {}: {:>8.2}s  drift {:+.2}s  {:?}",
                now,
                guest.name,
                guest.position(),
                guest.position() - host_position,
                status.phase
            );
        }
    }

    fn shutdown(&mut self) {
        for guest in self.guests.drain(..) {
            guest.shutdown();
        }
        if let Some(host) = self.host.take() {
            host.shutdown();
        }
        info!("Party ended after clock reached {}", self.clock.now_millis());
    }
}

async fn run_script(adapter: Arc<dyn VideoAdapter>, script: Vec<HostCommand>) {
    for step in script {
        let result = match step {
            HostCommand::Play => adapter.play().await,
            HostCommand::Pause => adapter.pause().await,
            HostCommand::Seek(position) => adapter.seek_to(position).await,
            HostCommand::Skip(delta) => {
                let target = (adapter.status().position_seconds + delta).max(0.0);
                adapter.seek_to(target).await
            }
            HostCommand::Restart => match adapter.seek_to(0.0).await {
                Ok(()) => adapter.play().await,
                Err(e) => Err(e),
            },
            HostCommand::Wait(duration) => {
                tokio::time::sleep(duration).await;
                Ok(())
            }
        };
        match result {
            Ok(()) => info!("Host: {:?}", step),
            Err(e) => warn!("Host command {:?} failed: {}", step, e),
        }
    }
}
