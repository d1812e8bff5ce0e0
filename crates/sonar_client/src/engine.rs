//! Presence broadcast engine.
//!
//! Samples the eligibility snapshot on a fixed tick, and immediately whenever
//! `connected` or one of the enable flags flips, then decides between
//! publishing, retracting, or doing nothing:
//!
//! 1. Inactive (either flag off, disconnected, or upgrade demanded): retract
//!    if the server may hold a record.
//! 2. In a housing district: retract if the server may hold a record, never
//!    publish.
//! 3. Ineligible: retract if the server may hold a record.
//! 4. Eligible: publish when idle, or when moved beyond the threshold.
//!
//! The server may hold a record from the moment a publish is issued, whether
//! or not it reports success, until a retract is issued.
//!
//! At most one publish/retract call is outstanding. Triggers that arrive while
//! one is in flight refresh the snapshot and are evaluated once it completes.

use std::sync::Arc;
use std::time::Duration;

use glam::DVec2;
use sonar_net::RemoteChannel;
use sonar_net::messages::{LocationUpdate, NO_ARGS};
use sonar_net::methods::{PUBLISH_LOCATION, REMOVE_LOCATION};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::eligibility;
use crate::error::ConnectionError;
use crate::manager::ConnectionManager;
use crate::notice::PresenceNotice;
use crate::settings::Settings;
use crate::snapshot::{ActorSource, EligibilitySnapshot, GameData};

/// Default evaluation period.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(10);

/// Default minimum movement, in world units, before re-publishing.
pub const DEFAULT_MOVEMENT_THRESHOLD: f64 = 5.0;

/// Default time budget for one publish/retract call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time budget for each teardown step.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Engine timing and debounce configuration.
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    pub tick_interval: Duration,
    /// Minimum distance between the last reported and the current position
    /// before a broadcasting engine publishes again.
    pub movement_threshold: f64,
    pub call_timeout: Duration,
    /// Budget for waiting on an outstanding call, and again for the final
    /// retract, when the client is disabled.
    pub shutdown_timeout: Duration,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            movement_threshold: DEFAULT_MOVEMENT_THRESHOLD,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl BroadcastConfig {
    #[must_use]
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    #[must_use]
    pub fn with_movement_threshold(mut self, movement_threshold: f64) -> Self {
        self.movement_threshold = movement_threshold;
        self
    }

    #[must_use]
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, shutdown_timeout: Duration) -> Self {
        self.shutdown_timeout = shutdown_timeout;
        self
    }

    /// Longest a stopping engine takes: the outstanding call, then the final
    /// retract.
    #[must_use]
    pub fn teardown_budget(&self) -> Duration {
        self.shutdown_timeout * 2
    }
}

/// Whether the last publish/retract issued was a publish that went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastState {
    Idle,
    Broadcasting,
}

/// What was last reported. Only written after a publish or retract completes.
#[derive(Debug, Clone, PartialEq)]
pub struct LastReportedSample {
    /// Raw actor position at the last successful publish.
    pub position: DVec2,
    /// Whether the last retract was caused by entering a housing district.
    pub in_housing_district: bool,
    /// Whether the user has been told that sharing is on.
    pub notified_user: bool,
}

/// Why a retract was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetractReason {
    /// A flag is off, the connection is gone, or an update was demanded.
    Inactive,
    Housing,
    Ineligible,
    /// The client is being disabled.
    Shutdown,
}

/// A decided remote call.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Publish {
        update: LocationUpdate,
        /// Raw position the update was derived from.
        position: DVec2,
    },
    Retract(RetractReason),
}

impl Action {
    fn method(&self) -> &'static str {
        match self {
            Self::Publish { .. } => PUBLISH_LOCATION,
            Self::Retract(_) => REMOVE_LOCATION,
        }
    }
}

/// A completed call, applied back onto the engine state.
#[derive(Debug)]
struct CallOutcome {
    action: Action,
    result: Result<(), ConnectionError>,
}

/// Issue one publish/retract through the manager within `limit`.
async fn perform<C: RemoteChannel>(
    manager: Arc<ConnectionManager<C>>,
    action: Action,
    limit: Duration,
) -> CallOutcome {
    let method = action.method();
    let call = async {
        match &action {
            Action::Publish { update, .. } => manager.send(PUBLISH_LOCATION, update).await,
            Action::Retract(_) => manager.send(REMOVE_LOCATION, &NO_ARGS).await,
        }
    };
    let result = match time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ConnectionError::Timeout {
            method: method.to_string(),
        }),
    };
    CallOutcome { action, result }
}

/// The two enable flags the engine consumes.
#[derive(Debug, Clone)]
pub struct EngineInputs {
    pub client_enabled: watch::Receiver<bool>,
    pub broadcast_enabled: watch::Receiver<bool>,
}

impl EngineInputs {
    /// Subscribe to both flags.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            client_enabled: settings.subscribe_client_enabled(),
            broadcast_enabled: settings.subscribe_broadcast_enabled(),
        }
    }
}

/// Decides and issues presence publish/retract calls.
pub struct BroadcastEngine<C: RemoteChannel> {
    manager: Arc<ConnectionManager<C>>,
    actors: Arc<dyn ActorSource>,
    game_data: Arc<dyn GameData>,
    config: BroadcastConfig,
    notices: mpsc::UnboundedSender<PresenceNotice>,
    client_enabled: watch::Receiver<bool>,
    broadcast_enabled: watch::Receiver<bool>,
    connected: watch::Receiver<bool>,
    upgrade: watch::Receiver<Option<String>>,
    state: BroadcastState,
    last_reported: Option<LastReportedSample>,
    last_snapshot: Option<EligibilitySnapshot>,
    upgrade_blocked: bool,
    /// A publish was issued and no retract since.
    record_may_exist: bool,
    /// A trigger arrived while a call was in flight.
    deferred: bool,
}

impl<C: RemoteChannel> BroadcastEngine<C> {
    /// Create an idle engine with the default configuration.
    #[must_use]
    pub fn new(
        manager: Arc<ConnectionManager<C>>,
        actors: Arc<dyn ActorSource>,
        game_data: Arc<dyn GameData>,
        inputs: EngineInputs,
        notices: mpsc::UnboundedSender<PresenceNotice>,
    ) -> Self {
        let connected = manager.subscribe_connected();
        let upgrade = manager.subscribe_upgrade();
        Self {
            manager,
            actors,
            game_data,
            config: BroadcastConfig::default(),
            notices,
            client_enabled: inputs.client_enabled,
            broadcast_enabled: inputs.broadcast_enabled,
            connected,
            upgrade,
            state: BroadcastState::Idle,
            last_reported: None,
            last_snapshot: None,
            upgrade_blocked: false,
            record_may_exist: false,
            deferred: false,
        }
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: BroadcastConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn state(&self) -> BroadcastState {
        self.state
    }

    /// Whether the server may still hold a record from this engine.
    #[must_use]
    pub fn record_may_exist(&self) -> bool {
        self.record_may_exist
    }

    #[must_use]
    pub fn last_reported(&self) -> Option<&LastReportedSample> {
        self.last_reported.as_ref()
    }

    /// The snapshot taken by the most recent evaluation or skipped tick.
    #[must_use]
    pub fn last_snapshot(&self) -> Option<&EligibilitySnapshot> {
        self.last_snapshot.as_ref()
    }

    fn notify(&self, notice: PresenceNotice) {
        debug!(%notice, "presence notice");
        if self.notices.send(notice).is_err() {
            debug!("notice receiver dropped");
        }
    }

    fn is_active(&self) -> bool {
        *self.client_enabled.borrow()
            && *self.broadcast_enabled.borrow()
            && *self.connected.borrow()
            && !self.upgrade_blocked
    }

    fn refresh_snapshot(&mut self) -> EligibilitySnapshot {
        let snapshot = EligibilitySnapshot::capture(&*self.actors, &*self.game_data);
        self.last_snapshot = Some(snapshot.clone());
        snapshot
    }

    /// Enter idle, telling the user once if they were told sharing was on.
    fn mark_idle(&mut self, in_housing_district: bool) {
        let was_broadcasting = self.state == BroadcastState::Broadcasting;
        self.state = BroadcastState::Idle;

        let mut notified = false;
        if let Some(sample) = self.last_reported.as_mut() {
            notified = sample.notified_user;
            sample.in_housing_district = in_housing_district;
            sample.notified_user = false;
        }
        if was_broadcasting && notified {
            self.notify(PresenceNotice::SharingStopped);
        }
    }

    /// Latch a forced upgrade: idle for good, and tell the user.
    fn sync_upgrade(&mut self) {
        if self.upgrade_blocked {
            return;
        }
        let Some(message) = self.upgrade.borrow_and_update().clone() else {
            return;
        };
        self.upgrade_blocked = true;
        warn!(%message, "client update required, broadcasting blocked");
        self.mark_idle(false);
        self.notify(PresenceNotice::UpgradeRequired { message });
    }

    /// Decide what, if anything, to call for `snapshot`.
    #[must_use]
    pub fn decide(&self, snapshot: &EligibilitySnapshot) -> Option<Action> {
        let retract = |reason| self.record_may_exist.then_some(Action::Retract(reason));

        if !self.is_active() {
            return retract(RetractReason::Inactive);
        }
        // Housing overrides zone eligibility.
        if snapshot.in_housing_district {
            return retract(RetractReason::Housing);
        }
        if !eligibility::is_eligible(snapshot) {
            return retract(RetractReason::Ineligible);
        }

        let Some(placement) = &snapshot.placement else {
            debug!("no map for the current territory");
            return None;
        };
        let moved = match (&self.state, &self.last_reported) {
            (BroadcastState::Broadcasting, Some(last)) => {
                last.position.distance(snapshot.position) > self.config.movement_threshold
            }
            _ => true,
        };

        moved.then(|| Action::Publish {
            update: LocationUpdate {
                world_id: placement.world_id,
                map_id: placement.map_id.clone(),
                x: placement.position.x,
                z: placement.position.y,
            },
            position: snapshot.position,
        })
    }

    /// Record what issuing `action` means for the server's record.
    fn issue(&mut self, action: &Action) {
        self.record_may_exist = matches!(action, Action::Publish { .. });
    }

    fn apply(&mut self, outcome: CallOutcome) {
        match (outcome.action, outcome.result) {
            (Action::Publish { update, position }, Ok(())) => {
                if self.upgrade_blocked {
                    debug!("publish completed after update demand, ignoring");
                    return;
                }
                info!(
                    world_id = update.world_id,
                    map_id = %update.map_id,
                    "presence published"
                );
                let notified = self.last_reported.as_ref().is_some_and(|s| s.notified_user);
                self.state = BroadcastState::Broadcasting;
                self.last_reported = Some(LastReportedSample {
                    position,
                    in_housing_district: false,
                    notified_user: true,
                });
                if !notified {
                    self.notify(PresenceNotice::SharingStarted {
                        world_id: update.world_id,
                        map_id: update.map_id,
                    });
                }
            }
            (Action::Publish { .. }, Err(e)) => {
                // Broadcasting only ever follows a publish that went through.
                warn!(error = %e, state = ?self.state, "publish failed, will retry");
                self.mark_idle(false);
            }
            (Action::Retract(reason), result) => {
                match result {
                    Ok(()) => info!(?reason, "presence retracted"),
                    Err(e) => warn!(?reason, error = %e, "retract failed, assuming removed"),
                }
                self.mark_idle(reason == RetractReason::Housing);
            }
        }
    }

    /// Evaluate once and wait for the resulting call, if any.
    pub async fn evaluate(&mut self) {
        self.sync_upgrade();
        let snapshot = self.refresh_snapshot();
        if let Some(action) = self.decide(&snapshot) {
            self.issue(&action);
            let outcome = perform(
                Arc::clone(&self.manager),
                action,
                self.config.call_timeout,
            )
            .await;
            self.apply(outcome);
        }
    }

    /// Evaluate once, dispatching the resulting call onto `calls`.
    fn trigger(&mut self, calls: &mut JoinSet<CallOutcome>) {
        self.sync_upgrade();
        let snapshot = self.refresh_snapshot();
        if !calls.is_empty() {
            debug!("broadcast call in flight, deferring evaluation");
            self.deferred = true;
            return;
        }
        if let Some(action) = self.decide(&snapshot) {
            debug!(?action, "dispatching broadcast call");
            self.issue(&action);
            calls.spawn(perform(
                Arc::clone(&self.manager),
                action,
                self.config.call_timeout,
            ));
        }
    }

    /// Wait out the outstanding call and retract, each step bounded.
    async fn shutdown(&mut self, calls: &mut JoinSet<CallOutcome>) {
        info!("stopping broadcast engine");
        let mut must_retract = false;

        if !calls.is_empty() {
            match time::timeout(self.config.shutdown_timeout, calls.join_next()).await {
                Ok(Some(Ok(outcome))) => self.apply(outcome),
                Ok(Some(Err(e))) => error!(error = %e, "broadcast call task failed"),
                Ok(None) => {}
                Err(_) => {
                    // The abandoned call may have been a publish that landed.
                    warn!("abandoning in-flight broadcast call");
                    calls.abort_all();
                    must_retract = true;
                }
            }
        }

        if must_retract || self.record_may_exist {
            let action = Action::Retract(RetractReason::Shutdown);
            self.issue(&action);
            let outcome = perform(Arc::clone(&self.manager), action, self.config.shutdown_timeout).await;
            self.apply(outcome);
        }
        info!("broadcast engine stopped");
    }

    /// Run until the client is disabled, then retract and return.
    pub async fn run(mut self) {
        let mut ticker = time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut calls = JoinSet::new();
        let mut inputs_closed = false;

        info!(
            tick_ms = self.config.tick_interval.as_millis() as u64,
            threshold = self.config.movement_threshold,
            "broadcast engine started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                Some(joined) = calls.join_next() => {
                    match joined {
                        Ok(outcome) => self.apply(outcome),
                        Err(e) => error!(error = %e, "broadcast call task failed"),
                    }
                    if !std::mem::take(&mut self.deferred) {
                        continue;
                    }
                }
                changed = self.client_enabled.changed() => inputs_closed |= changed.is_err(),
                changed = self.broadcast_enabled.changed() => inputs_closed |= changed.is_err(),
                changed = self.connected.changed() => inputs_closed |= changed.is_err(),
                changed = self.upgrade.changed() => inputs_closed |= changed.is_err(),
            }

            if inputs_closed || !*self.client_enabled.borrow() {
                self.shutdown(&mut calls).await;
                break;
            }
            self.trigger(&mut calls);
        }
    }
}
