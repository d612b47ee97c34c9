use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::TrackingConfig,
    db::Database,
    overlay::OverlayHandle,
    sensing::{foreground_poll_loop, Clock, ForegroundSampler},
    settings::{settings_refresh_loop, SettingsStore},
};

use super::{
    state::{ActiveSession, ClosedSession, OverlayEffect, Transition},
    tick::display_tick_loop,
    TrackingState,
};

const COMMAND_BUFFER: usize = 32;

/// Messages accepted by the tracking actor. Every change to tracking state
/// goes through this channel.
#[derive(Debug)]
pub enum TrackingCommand {
    Sample {
        at: DateTime<Utc>,
        package: Option<String>,
    },
    Snapshot {
        reply: oneshot::Sender<Option<ActiveSession>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
}

/// Collaborators the tracking service runs against.
pub struct TrackingDeps {
    pub db: Database,
    pub settings: Arc<SettingsStore>,
    pub sampler: Arc<dyn ForegroundSampler>,
    pub clock: Arc<dyn Clock>,
    pub overlay: OverlayHandle,
}

/// Handle to a running tracking service: the state actor plus the
/// foreground poller and the display tick.
pub struct TrackingController {
    commands: mpsc::Sender<TrackingCommand>,
    active_rx: watch::Receiver<Option<ActiveSession>>,
    cancel_token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl TrackingController {
    /// Starts tracking. Fails when no packages are selected.
    pub fn start(deps: TrackingDeps, config: TrackingConfig) -> Result<Self> {
        let mut tracked_rx = deps.settings.subscribe_tracked_packages();
        let tracked = tracked_rx.borrow_and_update().clone();
        if tracked.is_empty() {
            bail!("no apps selected for tracking");
        }

        deps.settings
            .set_tracking_active(true)
            .context("failed to record tracking as active")?;

        let cancel_token = CancellationToken::new();
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (active_tx, active_rx) = watch::channel(None);

        info!(
            "tracking {} package(s): {:?}",
            tracked.len(),
            tracked
        );

        let actor = TrackingActor {
            state: TrackingState::new(tracked, config.min_session_ms),
            db: deps.db,
            settings: Arc::clone(&deps.settings),
            clock: Arc::clone(&deps.clock),
            overlay: deps.overlay.clone(),
            active_tx,
            cancel_token: cancel_token.clone(),
        };

        let poller = tokio::spawn(foreground_poll_loop(
            deps.sampler,
            Arc::clone(&deps.clock),
            commands_tx.clone(),
            config.poll_interval,
            config.lookback,
            cancel_token.child_token(),
        ));

        let tick = tokio::spawn(display_tick_loop(
            active_rx.clone(),
            deps.clock,
            deps.overlay,
            config.tick_interval,
            cancel_token.child_token(),
        ));

        let refresh = tokio::spawn(settings_refresh_loop(
            Arc::clone(&deps.settings),
            config.settings_refresh,
            cancel_token.child_token(),
        ));

        let actor = tokio::spawn(actor.run(commands_rx, tracked_rx));

        Ok(Self {
            commands: commands_tx,
            active_rx,
            cancel_token,
            tasks: vec![actor, poller, tick, refresh],
        })
    }

    /// Feeds one foreground observation into the state machine.
    pub async fn report_sample(&self, at: DateTime<Utc>, package: Option<String>) -> Result<()> {
        self.commands
            .send(TrackingCommand::Sample { at, package })
            .await
            .map_err(|_| anyhow!("tracking has stopped"))
    }

    /// Active session as seen by the actor once every earlier command has
    /// been applied.
    pub async fn snapshot(&self) -> Result<Option<ActiveSession>> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(TrackingCommand::Snapshot { reply })
            .await
            .map_err(|_| anyhow!("tracking has stopped"))?;
        rx.await.map_err(|_| anyhow!("tracking stopped before replying"))
    }

    pub fn subscribe_active(&self) -> watch::Receiver<Option<ActiveSession>> {
        self.active_rx.clone()
    }

    /// Resolves once tracking has shut down, whether by `stop` or because the
    /// tracked set became empty.
    pub async fn closed(&self) {
        self.cancel_token.cancelled().await
    }

    /// Graceful stop: flushes the open session, marks tracking inactive,
    /// hides the overlay and cancels the drivers, then waits for every task.
    pub async fn stop(&mut self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        if self
            .commands
            .send(TrackingCommand::Stop { reply })
            .await
            .is_ok()
        {
            // A dropped reply means the actor had already shut itself down.
            let _ = rx.await;
        }

        for task in self.tasks.drain(..) {
            task.await.context("tracking task failed to join")?;
        }
        Ok(())
    }
}

struct TrackingActor {
    state: TrackingState,
    db: Database,
    settings: Arc<SettingsStore>,
    clock: Arc<dyn Clock>,
    overlay: OverlayHandle,
    active_tx: watch::Sender<Option<ActiveSession>>,
    cancel_token: CancellationToken,
}

impl TrackingActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<TrackingCommand>,
        mut tracked_rx: watch::Receiver<BTreeSet<String>>,
    ) {
        let mut watching_settings = true;

        loop {
            tokio::select! {
                // Preference changes win over queued samples so an emptied
                // set shuts down before anything else is applied.
                biased;

                changed = tracked_rx.changed(), if watching_settings => {
                    if changed.is_err() {
                        warn!("tracked package subscription closed");
                        watching_settings = false;
                        continue;
                    }
                    let packages = tracked_rx.borrow_and_update().clone();
                    info!("tracked packages updated: {:?}", packages);
                    if self.state.set_tracked_packages(packages) {
                        info!("tracked set is empty, stopping");
                        self.shutdown().await;
                        break;
                    }
                }
                command = commands.recv() => match command {
                    Some(TrackingCommand::Sample { at, package }) => {
                        let transition = self.state.on_sample(package.as_deref(), at, &*self.settings);
                        self.apply(transition).await;
                    }
                    Some(TrackingCommand::Snapshot { reply }) => {
                        let _ = reply.send(self.state.active().cloned());
                    }
                    Some(TrackingCommand::Stop { reply }) => {
                        info!("stop requested");
                        self.shutdown().await;
                        let _ = reply.send(());
                        break;
                    }
                    None => {
                        self.shutdown().await;
                        break;
                    }
                },
            }
        }

        self.state.reset();
        info!("tracking actor finished");
    }

    async fn apply(&mut self, transition: Transition) {
        if transition.is_noop() {
            return;
        }

        if let Some(closed) = transition.closed {
            self.persist(closed).await;
        }

        // The overlay hears about a new label before the tick can render
        // elapsed time against it.
        match transition.overlay {
            OverlayEffect::Show { label } => self.overlay.show(label),
            OverlayEffect::Hide => self.overlay.hide(),
            OverlayEffect::None => {}
        }
        self.publish();
    }

    /// Store failures are logged and the session is dropped; tracking keeps
    /// going either way.
    async fn persist(&self, closed: ClosedSession) {
        let session = match closed {
            ClosedSession::Persist(session) => session,
            ClosedSession::Discarded { .. } => return,
        };

        if let Err(err) = self.db.insert_tracked_session(&session).await {
            error!(
                "failed to store session for {} ({}ms from {}): {err:?}",
                session.package_id, session.duration_ms, session.start_time
            );
        }
    }

    fn publish(&self) {
        self.active_tx.send_replace(self.state.active().cloned());
    }

    /// flush, then deactivate, then hide, then cancel the drivers.
    async fn shutdown(&mut self) {
        let now = self.clock.now();
        if let Some(closed) = self.state.close_active(now) {
            self.persist(closed).await;
        }
        self.publish();

        if let Err(err) = self.settings.set_tracking_active(false) {
            error!("failed to record tracking as inactive: {err:?}");
        }

        self.overlay.hide();
        self.overlay.shutdown();
        self.cancel_token.cancel();
    }
}
