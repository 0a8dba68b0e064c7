//! The cache manager serializes refresh, periodic update, and clear-cache.
//!
//! All state-affecting inputs funnel through one `tokio::select!` loop, so
//! transitions are naturally serialized and there is exactly one in-flight
//! dispatch at a time. The long-running work itself runs in a spawned task
//! holding a cancellation token; its terminal outcome is delivered back to
//! the loop, which drains deferred work (clear-cache before refresh) and
//! publishes exactly one [`CacheUpdate`] per dispatch.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use adosync_client::AuthEvent;
use adosync_types::{SyncConfig, UpdateKind, UpdateParams};

use crate::error::{SyncError, SyncResult};
use crate::events::{CacheUpdate, UpdateBus, UpdateOutcome, UpdateSource};
use crate::machine::{transition, MachineAction, MachineInput, ManagerState};
use crate::service::{DataUpdateService, TerminalOutcome};

enum ManagerCommand {
    Refresh(UpdateParams),
    ClearCache,
    Stop,
}

/// Cloneable handle to a running [`CacheManager`].
#[derive(Clone)]
pub struct CacheManagerHandle {
    command_tx: mpsc::Sender<ManagerCommand>,
    bus: UpdateBus,
}

impl CacheManagerHandle {
    /// Request a refresh for one search. A no-op if the search is within
    /// its cooldown.
    pub async fn refresh(&self, params: UpdateParams) -> SyncResult<()> {
        self.command_tx
            .send(ManagerCommand::Refresh(params))
            .await
            .map_err(|_| SyncError::Internal("cache manager stopped".into()))
    }

    /// Purge all cached data, deferring until any in-flight update ends.
    pub async fn clear_cache(&self) -> SyncResult<()> {
        self.command_tx
            .send(ManagerCommand::ClearCache)
            .await
            .map_err(|_| SyncError::Internal("cache manager stopped".into()))
    }

    /// Stop the run loop, cancelling any in-flight update.
    pub async fn stop(&self) -> SyncResult<()> {
        self.command_tx
            .send(ManagerCommand::Stop)
            .await
            .map_err(|_| SyncError::Internal("cache manager stopped".into()))
    }

    /// Watch terminal events; dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheUpdate> {
        self.bus.subscribe()
    }
}

/// Owns the state machine and the periodic timer.
pub struct CacheManager {
    service: Arc<DataUpdateService>,
    config: SyncConfig,
    auth_rx: Option<broadcast::Receiver<AuthEvent>>,
}

impl CacheManager {
    pub fn new(service: Arc<DataUpdateService>, config: SyncConfig) -> Self {
        Self {
            service,
            config,
            auth_rx: None,
        }
    }

    /// Subscribe the manager to sign-out events; a sign-out behaves like a
    /// clear-cache request.
    pub fn with_auth_events(mut self, rx: broadcast::Receiver<AuthEvent>) -> Self {
        self.auth_rx = Some(rx);
        self
    }

    /// Spawn the run loop and return its handle. The periodic timer fires
    /// immediately on start (cold start included), then on every interval.
    pub fn start(self) -> CacheManagerHandle {
        let (command_tx, command_rx) = mpsc::channel(32);
        let bus = UpdateBus::new();
        let handle = CacheManagerHandle {
            command_tx,
            bus: bus.clone(),
        };

        let (run, terminal_rx) = RunLoop::new(self.service, self.config, bus);
        tokio::spawn(run.run(command_rx, terminal_rx, self.auth_rx));
        handle
    }
}

type Terminal = (TerminalOutcome, UpdateSource, UpdateParams);

struct RunLoop {
    service: Arc<DataUpdateService>,
    config: SyncConfig,
    bus: UpdateBus,
    state: ManagerState,
    stashed: Option<UpdateParams>,
    inflight_cancel: Option<CancellationToken>,
    terminal_tx: mpsc::Sender<Terminal>,
}

impl RunLoop {
    fn new(
        service: Arc<DataUpdateService>,
        config: SyncConfig,
        bus: UpdateBus,
    ) -> (Self, mpsc::Receiver<Terminal>) {
        let (terminal_tx, terminal_rx) = mpsc::channel(8);
        let run = Self {
            service,
            config,
            bus,
            state: ManagerState::Idle,
            stashed: None,
            inflight_cancel: None,
            terminal_tx,
        };
        (run, terminal_rx)
    }

    async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<ManagerCommand>,
        mut terminal_rx: mpsc::Receiver<Terminal>,
        mut auth_rx: Option<broadcast::Receiver<AuthEvent>>,
    ) {
        let mut periodic = tokio::time::interval(self.config.periodic_interval);
        periodic.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("[SYNC] cache manager started");
        loop {
            tokio::select! {
                cmd = command_rx.recv() => match cmd {
                    Some(ManagerCommand::Refresh(params)) => self.on_refresh(params).await,
                    Some(ManagerCommand::ClearCache) => self.on_clear_cache().await,
                    Some(ManagerCommand::Stop) | None => {
                        if let Some(token) = self.inflight_cancel.take() {
                            token.cancel();
                        }
                        info!("[SYNC] cache manager stopped");
                        break;
                    }
                },
                Some((outcome, source, params)) = terminal_rx.recv() => {
                    self.on_terminal(outcome, source, params).await;
                }
                _ = periodic.tick() => self.on_periodic_tick(),
                event = recv_auth(&mut auth_rx) => {
                    if matches!(event, Some(AuthEvent::SignedOut)) {
                        debug!("[SYNC] sign-out observed, clearing cache");
                        self.on_clear_cache().await;
                    }
                }
            }
        }
    }

    async fn on_refresh(&mut self, params: UpdateParams) {
        if !self
            .service
            .is_new_or_stale(&params, self.config.refresh_cooldown)
        {
            debug!("[SYNC] refresh {} dropped, within cooldown", params.kind);
            return;
        }

        let (next, action) = transition(self.state, MachineInput::Refresh);
        self.state = next;
        match action {
            MachineAction::StartRefresh => self.start_dispatch(params, UpdateSource::Refresh),
            MachineAction::CancelAndStash => {
                if let Some(token) = &self.inflight_cancel {
                    token.cancel();
                }
                self.stashed = Some(params);
            }
            MachineAction::ReplaceStash => {
                self.stashed = Some(params);
            }
            MachineAction::None => {
                debug!("[SYNC] refresh ignored while clear-cache is pending");
            }
            other => warn!("[SYNC] unexpected action {other:?} for refresh input"),
        }
    }

    fn on_periodic_tick(&mut self) {
        let (next, action) = transition(self.state, MachineInput::PeriodicTick);
        self.state = next;
        if action == MachineAction::StartPeriodic {
            self.start_dispatch(UpdateParams::all(), UpdateSource::Periodic);
        }
    }

    async fn on_clear_cache(&mut self) {
        let (next, action) = transition(self.state, MachineInput::ClearCache);
        self.state = next;
        match action {
            MachineAction::Purge => self.purge().await,
            MachineAction::CancelInFlight => {
                self.stashed = None;
                if let Some(token) = &self.inflight_cancel {
                    token.cancel();
                }
            }
            MachineAction::None => {}
            other => warn!("[SYNC] unexpected action {other:?} for clear-cache input"),
        }
    }

    async fn on_terminal(
        &mut self,
        outcome: TerminalOutcome,
        source: UpdateSource,
        params: UpdateParams,
    ) {
        self.inflight_cancel = None;
        let (next, action) = transition(self.state, MachineInput::Terminal);
        self.state = next;

        // Observers see terminal events in transition order.
        self.publish(source, &params, &outcome);

        match action {
            MachineAction::None => {}
            MachineAction::StartStashedRefresh => match self.stashed.take() {
                Some(stashed) => {
                    if self
                        .service
                        .is_new_or_stale(&stashed, self.config.refresh_cooldown)
                    {
                        self.start_dispatch(stashed, UpdateSource::Refresh);
                    } else {
                        debug!("[SYNC] stashed refresh no longer stale, dropping");
                        self.state = ManagerState::Idle;
                    }
                }
                None => {
                    warn!("[SYNC] pending refresh with nothing stashed");
                    self.state = ManagerState::Idle;
                }
            },
            MachineAction::PurgeDeferred => self.purge().await,
            MachineAction::Invalid => warn!("[SYNC] terminal event with nothing in flight"),
            other => warn!("[SYNC] unexpected action {other:?} for terminal input"),
        }
    }

    fn start_dispatch(&mut self, params: UpdateParams, source: UpdateSource) {
        let token = CancellationToken::new();
        self.inflight_cancel = Some(token.clone());

        debug!("[SYNC] dispatching {} ({source:?})", params.kind);
        let service = self.service.clone();
        let terminal_tx = self.terminal_tx.clone();
        tokio::spawn(async move {
            let outcome = service.dispatch(&params, &token).await;
            // The loop owns the receiver; a send failure means shutdown.
            let _ = terminal_tx.send((outcome, source, params)).await;
        });
    }

    async fn purge(&mut self) {
        match self.service.purge_all_data().await {
            Ok(()) => self.bus.publish(CacheUpdate {
                source: UpdateSource::ClearCache,
                kind: UpdateKind::All,
                outcome: UpdateOutcome::Updated,
                params: None,
            }),
            Err(e) => {
                warn!("[SYNC] purge failed: {e}");
                self.bus.publish(CacheUpdate {
                    source: UpdateSource::ClearCache,
                    kind: UpdateKind::All,
                    outcome: UpdateOutcome::Error(Arc::new(e)),
                    params: None,
                });
            }
        }
    }

    fn publish(&self, source: UpdateSource, params: &UpdateParams, outcome: &TerminalOutcome) {
        let outcome = match outcome {
            TerminalOutcome::Success => UpdateOutcome::Updated,
            TerminalOutcome::Cancelled => UpdateOutcome::Cancelled,
            TerminalOutcome::Error(e) => UpdateOutcome::Error(e.clone()),
        };
        self.bus.publish(CacheUpdate {
            source,
            kind: params.kind,
            outcome,
            params: Some(params.clone()),
        });
    }
}

/// Await the next auth event, or pend forever when not subscribed.
async fn recv_auth(rx: &mut Option<broadcast::Receiver<AuthEvent>>) -> Option<AuthEvent> {
    match rx {
        Some(rx) => match rx.recv().await {
            Ok(event) => Some(event),
            Err(broadcast::error::RecvError::Lagged(_)) => None,
            Err(broadcast::error::RecvError::Closed) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        },
        None => {
            std::future::pending::<()>().await;
            unreachable!()
        }
    }
}
