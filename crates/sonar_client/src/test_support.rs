//! Scripted collaborators for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use glam::DVec2;
use serde::Serialize;
use sonar_net::{ChannelEvent, ConnectionConfig, NetError, RemoteChannel, codec};
use tokio::sync::mpsc;

use crate::snapshot::{ActorSource, ActorState, MapInfo, ROLEPLAYING_STATUS, TerritoryInfo, ZoneUse};
use crate::tables::GameTables;

/// A remote call as the channel saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: String,
    pub args: Vec<u8>,
}

#[derive(Debug, Default)]
struct Script {
    opens: usize,
    closes: usize,
    fail_opens: bool,
    fail_sends: bool,
    delay: Duration,
    events: Option<mpsc::UnboundedSender<ChannelEvent>>,
    calls: Vec<RecordedCall>,
    replies: HashMap<String, Vec<u8>>,
}

/// An in-memory [`RemoteChannel`] driven by the test.
#[derive(Debug, Default)]
pub struct ScriptedChannel {
    script: Mutex<Script>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: AtomicUsize,
}

/// Decrements the in-flight counter even when the call is aborted.
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    pub fn opens(&self) -> usize {
        self.script().opens
    }

    pub fn closes(&self) -> usize {
        self.script().closes
    }

    pub fn fail_opens(&self, fail: bool) {
        self.script().fail_opens = fail;
    }

    pub fn fail_sends(&self, fail: bool) {
        self.script().fail_sends = fail;
    }

    /// Make every call and send take `delay`.
    pub fn set_delay(&self, delay: Duration) {
        self.script().delay = delay;
    }

    /// Deliver a transport event to the current open, if any.
    pub fn push(&self, event: ChannelEvent) {
        if let Some(events) = &self.script().events {
            let _ = events.send(event);
        }
    }

    /// Script the result of `call` for `method`.
    pub fn reply<T: Serialize + ?Sized>(&self, method: &str, value: &T) {
        let payload = codec::encode(value).unwrap();
        self.script().replies.insert(method.to_string(), payload);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.script().calls.clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.script().calls.iter().map(|c| c.method.clone()).collect()
    }

    pub fn count(&self, method: &str) -> usize {
        self.script().calls.iter().filter(|c| c.method == method).count()
    }

    /// Highest number of calls that were outstanding at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Record a call and return its scripted delay and failure flag.
    fn record(&self, method: &str, args: Vec<u8>) -> (Duration, bool) {
        let mut script = self.script();
        script.calls.push(RecordedCall {
            method: method.to_string(),
            args,
        });
        (script.delay, script.fail_sends)
    }

    async fn perform(&self, method: &str, args: Vec<u8>) -> Result<(), NetError> {
        let (delay, fail) = self.record(method, args);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(Arc::clone(&self.in_flight));
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(NetError::Transport(format!("scripted failure of {method}")));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteChannel for ScriptedChannel {
    async fn open(
        &self,
        _config: &ConnectionConfig,
        events: mpsc::UnboundedSender<ChannelEvent>,
    ) -> Result<(), NetError> {
        let mut script = self.script();
        script.opens += 1;
        if script.fail_opens {
            return Err(NetError::Transport("scripted open failure".to_string()));
        }
        script.events = Some(events);
        Ok(())
    }

    async fn close(&self) -> Result<(), NetError> {
        let mut script = self.script();
        script.closes += 1;
        script.events = None;
        Ok(())
    }

    async fn call(&self, method: &str, args: Vec<u8>) -> Result<Vec<u8>, NetError> {
        self.perform(method, args).await?;
        self.script()
            .replies
            .get(method)
            .cloned()
            .ok_or_else(|| NetError::Transport(format!("no reply scripted for {method}")))
    }

    async fn send(&self, method: &str, args: Vec<u8>) -> Result<(), NetError> {
        self.perform(method, args).await
    }
}

/// An [`ActorSource`] whose actor the test edits in place.
#[derive(Debug)]
pub struct ScriptedActor {
    logged_in: AtomicBool,
    actor: Mutex<Option<ActorState>>,
    /// Added to `x` on every read.
    drift: Mutex<f64>,
}

impl ScriptedActor {
    pub fn new(actor: Option<ActorState>) -> Self {
        Self {
            logged_in: AtomicBool::new(true),
            actor: Mutex::new(actor),
            drift: Mutex::new(0.0),
        }
    }

    pub fn set(&self, actor: Option<ActorState>) {
        *self.actor.lock().unwrap() = actor;
    }

    /// Edit the current actor. Does nothing while no actor is present.
    pub fn update(&self, edit: impl FnOnce(&mut ActorState)) {
        if let Some(actor) = self.actor.lock().unwrap().as_mut() {
            edit(actor);
        }
    }

    pub fn set_logged_in(&self, logged_in: bool) {
        self.logged_in.store(logged_in, Ordering::SeqCst);
    }

    pub fn set_drift(&self, drift: f64) {
        *self.drift.lock().unwrap() = drift;
    }
}

impl ActorSource for ScriptedActor {
    fn logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    fn local_actor(&self) -> Option<ActorState> {
        let drift = *self.drift.lock().unwrap();
        let mut actor = self.actor.lock().unwrap();
        if let Some(actor) = actor.as_mut() {
            actor.position.x += drift;
        }
        actor.clone()
    }
}

fn territory(map_id: &str, offset_x: f64, offset_z: f64, zone_use: ZoneUse) -> TerritoryInfo {
    TerritoryInfo {
        map: MapInfo {
            id: map_id.to_string(),
            offset_x,
            offset_z,
        },
        zone_use,
    }
}

/// Territories: 1 open world (offset 100, -50), 2 housing ward, 3 dungeon,
/// 4 pvp. World 73 is Balmung.
pub fn sample_tables() -> GameTables {
    GameTables {
        territories: HashMap::from([
            (1, territory("s1f1/00", 100.0, -50.0, ZoneUse::OpenWorld)),
            (2, territory("s1h1/00", 0.0, 0.0, ZoneUse::HousingWard)),
            (3, territory("d1d1/00", 0.0, 0.0, ZoneUse::Dungeon)),
            (4, territory("w1p1/00", 0.0, 0.0, ZoneUse::Pvp)),
        ]),
        worlds: HashMap::from([(73, "Balmung".to_string())]),
        maps: HashMap::from([
            ("s1f1/00".to_string(), "Central Shroud".to_string()),
            ("s1h1/00".to_string(), "The Lavender Beds".to_string()),
        ]),
    }
}

/// A role-playing actor on world 73.
pub fn roleplayer(territory_id: u32, position: DVec2) -> ActorState {
    ActorState {
        world_id: 73,
        territory_id,
        position,
        online_status: ROLEPLAYING_STATUS.to_string(),
        in_pvp: false,
        housing_ward: None,
    }
}
