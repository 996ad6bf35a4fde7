//! In-memory stand-in for the DAW's RPC object tree, plus a recording sink.
//!
//! `FakeObject::set` stores the value and fires property listeners
//! synchronously, mimicking the DAW's push notifications: a write from the
//! core comes back as the confirming push, and a test calling `set`
//! directly simulates an external mutation (the DAW's own GUI).

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use ringproto::{
    Color, ListenerCallback, ListenerHandle, ObjectRef, RemoteObject, RemoteValue, SurfaceEvent,
    SurfaceSink,
};
use ringside::{DawSession, RingConfig, RingManager};

type ListenerMap = Arc<Mutex<HashMap<String, Vec<(u64, ListenerCallback)>>>>;

pub struct FakeObject {
    id: String,
    props: Mutex<HashMap<String, RemoteValue>>,
    listeners: ListenerMap,
    next_listener: AtomicU64,
    calls: Mutex<Vec<(String, Vec<RemoteValue>)>>,
    fail_gets: Mutex<HashSet<String>>,
    delay_gets: Mutex<HashMap<String, Duration>>,
}

impl FakeObject {
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            props: Mutex::new(HashMap::new()),
            listeners: Arc::new(Mutex::new(HashMap::new())),
            next_listener: AtomicU64::new(0),
            calls: Mutex::new(Vec::new()),
            fail_gets: Mutex::new(HashSet::new()),
            delay_gets: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_props(id: impl Into<String>, props: Vec<(&str, RemoteValue)>) -> Arc<Self> {
        let object = Self::new(id);
        for (prop, value) in props {
            object.put(prop, value);
        }
        object
    }

    /// Store a value without firing listeners (seed state).
    pub fn put(&self, prop: &str, value: RemoteValue) {
        self.props.lock().unwrap().insert(prop.to_string(), value);
    }

    pub fn prop(&self, prop: &str) -> Option<RemoteValue> {
        self.props.lock().unwrap().get(prop).cloned()
    }

    pub fn prop_f64(&self, prop: &str) -> f64 {
        self.prop(prop).and_then(|v| v.as_f64()).unwrap()
    }

    pub fn listener_count(&self, prop: &str) -> usize {
        self.listeners
            .lock()
            .unwrap()
            .get(prop)
            .map(|v| v.len())
            .unwrap_or(0)
    }

    pub fn total_listeners(&self) -> usize {
        self.listeners.lock().unwrap().values().map(|v| v.len()).sum()
    }

    pub fn calls(&self) -> Vec<(String, Vec<RemoteValue>)> {
        self.calls.lock().unwrap().clone()
    }

    /// Make subsequent `get` calls for `prop` fail.
    pub fn fail_get(&self, prop: &str) {
        self.fail_gets.lock().unwrap().insert(prop.to_string());
    }

    /// Make subsequent `get` calls for `prop` take a while, so tests can
    /// race commands against in-flight fetches deterministically.
    pub fn delay_get(&self, prop: &str, delay: Duration) {
        self.delay_gets
            .lock()
            .unwrap()
            .insert(prop.to_string(), delay);
    }

    fn fire(&self, prop: &str, value: RemoteValue) {
        let callbacks: Vec<ListenerCallback> = self
            .listeners
            .lock()
            .unwrap()
            .get(prop)
            .map(|v| v.iter().map(|(_, cb)| cb.clone()).collect())
            .unwrap_or_default();
        for callback in callbacks {
            callback(value.clone());
        }
    }
}

#[async_trait]
impl RemoteObject for FakeObject {
    fn id(&self) -> &str {
        &self.id
    }

    async fn get(&self, prop: &str) -> Result<RemoteValue> {
        let delay = self.delay_gets.lock().unwrap().get(prop).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_gets.lock().unwrap().contains(prop) {
            return Err(anyhow!("{}: injected failure on {}", self.id, prop));
        }
        self.props
            .lock()
            .unwrap()
            .get(prop)
            .cloned()
            .ok_or_else(|| anyhow!("{}: no such property {}", self.id, prop))
    }

    async fn set(&self, prop: &str, value: RemoteValue) -> Result<()> {
        self.props
            .lock()
            .unwrap()
            .insert(prop.to_string(), value.clone());
        self.fire(prop, value);
        Ok(())
    }

    async fn call(&self, method: &str, args: Vec<RemoteValue>) -> Result<RemoteValue> {
        self.calls.lock().unwrap().push((method.to_string(), args));
        Ok(RemoteValue::Null)
    }

    async fn listen(&self, prop: &str, callback: ListenerCallback) -> Result<ListenerHandle> {
        let token = self.next_listener.fetch_add(1, Ordering::SeqCst);
        self.listeners
            .lock()
            .unwrap()
            .entry(prop.to_string())
            .or_default()
            .push((token, callback));

        let listeners = self.listeners.clone();
        let prop = prop.to_string();
        Ok(ListenerHandle::new(move || {
            Box::pin(async move {
                if let Some(list) = listeners.lock().unwrap().get_mut(&prop) {
                    list.retain(|(t, _)| *t != token);
                }
                Ok(())
            })
        }))
    }
}

pub fn obj(object: &Arc<FakeObject>) -> ObjectRef {
    object.clone()
}

/// One fake track with its mixer tree.
pub struct FakeTrack {
    pub track: Arc<FakeObject>,
    pub mixer: Arc<FakeObject>,
    pub volume: Arc<FakeObject>,
    pub panning: Arc<FakeObject>,
    pub sends: Vec<Arc<FakeObject>>,
    pub slots: Vec<Arc<FakeObject>>,
}

impl FakeTrack {
    /// Listeners attached anywhere in this track's tree.
    pub fn total_listeners(&self) -> usize {
        self.track.total_listeners()
            + self.volume.total_listeners()
            + self.panning.total_listeners()
            + self.sends.iter().map(|s| s.total_listeners()).sum::<usize>()
    }
}

fn value_param(id: String, value: f64) -> Arc<FakeObject> {
    FakeObject::with_props(id, vec![("value", RemoteValue::Float(value))])
}

fn build_track(id: &str, name: &str, is_midi: bool, send_count: usize) -> FakeTrack {
    let volume = value_param(format!("{}-volume", id), 0.5);
    let panning = value_param(format!("{}-panning", id), 0.0);
    let sends: Vec<Arc<FakeObject>> = (0..send_count)
        .map(|i| value_param(format!("{}-send{}", id, i), 0.0))
        .collect();

    let mixer = FakeObject::with_props(
        format!("{}-mixer", id),
        vec![
            ("volume", RemoteValue::Object(obj(&volume))),
            ("panning", RemoteValue::Object(obj(&panning))),
            (
                "sends",
                RemoteValue::List(sends.iter().map(|s| RemoteValue::Object(obj(s))).collect()),
            ),
        ],
    );

    let track = FakeObject::with_props(
        id,
        vec![
            ("name", RemoteValue::Str(name.to_string())),
            ("color", RemoteValue::Int(0x0040FF)),
            ("mute", RemoteValue::Bool(false)),
            ("solo", RemoteValue::Bool(false)),
            ("arm", RemoteValue::Bool(false)),
            ("can_be_armed", RemoteValue::Bool(true)),
            ("has_midi_input", RemoteValue::Bool(is_midi)),
            ("has_audio_input", RemoteValue::Bool(!is_midi)),
            ("playing_slot_index", RemoteValue::Int(-1)),
            ("clip_slots", RemoteValue::List(Vec::new())),
            ("mixer_device", RemoteValue::Object(obj(&mixer))),
        ],
    );

    FakeTrack {
        track,
        mixer,
        volume,
        panning,
        sends,
        slots: Vec::new(),
    }
}

pub fn audio_track(id: &str, name: &str, send_count: usize) -> FakeTrack {
    build_track(id, name, false, send_count)
}

pub fn midi_track(id: &str, name: &str, send_count: usize) -> FakeTrack {
    build_track(id, name, true, send_count)
}

/// Give a track a clip slot at `index`, optionally holding a clip.
pub fn put_clip_slot(track: &mut FakeTrack, index: usize, clip: Option<Arc<FakeObject>>) {
    while track.slots.len() <= index {
        let slot = FakeObject::with_props(
            format!("{}-slot{}", track.track.id(), track.slots.len()),
            vec![("clip", RemoteValue::Null)],
        );
        track.slots.push(slot);
    }
    if let Some(clip) = clip {
        track.slots[index].put("clip", RemoteValue::Object(obj(&clip)));
    }
    track.track.put(
        "clip_slots",
        RemoteValue::List(
            track
                .slots
                .iter()
                .map(|s| RemoteValue::Object(obj(s)))
                .collect(),
        ),
    );
}

pub fn clip(id: &str, name: &str, color: i64) -> Arc<FakeObject> {
    FakeObject::with_props(
        id,
        vec![
            ("name", RemoteValue::Str(name.to_string())),
            ("color", RemoteValue::Int(color)),
        ],
    )
}

pub fn parameter(id: &str, name: &str, value: f64, min: f64, max: f64, default: f64) -> Arc<FakeObject> {
    FakeObject::with_props(
        id,
        vec![
            ("name", RemoteValue::Str(name.to_string())),
            ("value", RemoteValue::Float(value)),
            ("min", RemoteValue::Float(min)),
            ("max", RemoteValue::Float(max)),
            ("default_value", RemoteValue::Float(default)),
        ],
    )
}

/// The whole fake session.
pub struct FakeDaw {
    pub song: Arc<FakeObject>,
    pub view: Arc<FakeObject>,
    pub master: Arc<FakeObject>,
    pub tracks: Vec<FakeTrack>,
}

impl FakeDaw {
    pub fn new(tracks: Vec<FakeTrack>, scene_count: usize) -> Self {
        let master = FakeObject::with_props(
            "master",
            vec![
                ("name", RemoteValue::Str("Master".to_string())),
                ("color", RemoteValue::Int(0x808080)),
                ("has_midi_input", RemoteValue::Bool(false)),
                ("has_audio_input", RemoteValue::Bool(true)),
                ("can_be_armed", RemoteValue::Bool(false)),
            ],
        );
        let scenes: Vec<RemoteValue> = (0..scene_count)
            .map(|i| RemoteValue::Object(obj(&FakeObject::new(format!("scene-{}", i)))))
            .collect();
        let track_refs: Vec<RemoteValue> = tracks
            .iter()
            .map(|t| RemoteValue::Object(obj(&t.track)))
            .collect();

        let song = FakeObject::with_props(
            "song",
            vec![
                ("tracks", RemoteValue::List(track_refs.clone())),
                ("visible_tracks", RemoteValue::List(track_refs)),
                ("return_tracks", RemoteValue::List(Vec::new())),
                ("scenes", RemoteValue::List(scenes)),
                ("master_track", RemoteValue::Object(obj(&master))),
                ("is_playing", RemoteValue::Bool(false)),
                ("record_mode", RemoteValue::Bool(false)),
            ],
        );
        let view = FakeObject::with_props(
            "view",
            vec![
                ("selected_track", RemoteValue::Null),
                ("selected_parameter", RemoteValue::Null),
            ],
        );

        Self {
            song,
            view,
            master,
            tracks,
        }
    }

    pub fn session(&self) -> DawSession {
        DawSession {
            song: obj(&self.song),
            view: obj(&self.view),
        }
    }

    /// Replace the visible track list and fire the `tracks` push.
    pub async fn replace_tracks(&mut self, tracks: Vec<FakeTrack>) {
        let track_refs: Vec<RemoteValue> = tracks
            .iter()
            .map(|t| RemoteValue::Object(obj(&t.track)))
            .collect();
        self.tracks = tracks;
        self.song.put("visible_tracks", RemoteValue::List(track_refs.clone()));
        self.song
            .set("tracks", RemoteValue::List(track_refs))
            .await
            .unwrap();
    }

    pub async fn select_track(&self, track: &FakeTrack) {
        self.view
            .set("selected_track", RemoteValue::Object(obj(&track.track)))
            .await
            .unwrap();
    }

    pub async fn select_parameter(&self, param: &Arc<FakeObject>) {
        self.view
            .set("selected_parameter", RemoteValue::Object(obj(param)))
            .await
            .unwrap();
    }
}

/// Sink that records every emission.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<SurfaceEvent>>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<SurfaceEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    pub fn count_kind(&self, kind: &str) -> usize {
        self.events().iter().filter(|e| e.kind() == kind).count()
    }
}

impl SurfaceSink for Recorder {
    fn send(&self, event: SurfaceEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// A spawned bridge wired to a fake DAW and a recorder.
pub struct Harness {
    pub daw: FakeDaw,
    pub recorder: Recorder,
    pub manager: RingManager,
}

impl Harness {
    /// Two barriers: one for the commands themselves, one for the
    /// confirmation pushes their writes fired back into the queue.
    pub async fn drain(&self) {
        self.manager.settle().await;
        self.manager.settle().await;
    }
}

fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

pub async fn spawn_bridge(daw: FakeDaw) -> Harness {
    spawn_bridge_with(daw, RingConfig::default()).await
}

pub async fn spawn_bridge_with(daw: FakeDaw, config: RingConfig) -> Harness {
    init_tracing();
    let recorder = Recorder::default();
    let manager = RingManager::spawn(daw.session(), Arc::new(recorder.clone()), config);
    manager.init();
    manager.settle().await;
    Harness {
        daw,
        recorder,
        manager,
    }
}

/// Five audio tracks T0..T4 with ids "a".."e" and `send_count` sends each.
pub fn five_track_daw(send_count: usize, scene_count: usize) -> FakeDaw {
    let ids = ["a", "b", "c", "d", "e"];
    let tracks = ids
        .iter()
        .enumerate()
        .map(|(i, id)| audio_track(id, &format!("T{}", i), send_count))
        .collect();
    FakeDaw::new(tracks, scene_count)
}

/// Poll until `pred` holds over the recorded events, or panic after ~1s.
pub async fn wait_for(recorder: &Recorder, pred: impl Fn(&[SurfaceEvent]) -> bool) {
    for _ in 0..500 {
        if pred(&recorder.events()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition not met; events: {:#?}", recorder.events());
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {} to be close to {}",
        actual,
        expected
    );
}

/// Close enough for hand-computed expectations like 0.2815.
pub fn assert_near(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "expected {} within {} of {}",
        actual,
        epsilon,
        expected
    );
}

#[allow(unused)]
pub fn color(packed: i64) -> Color {
    Color::from_remote(&RemoteValue::Int(packed)).unwrap()
}
