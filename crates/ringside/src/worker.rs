//! The ring worker: single owner of all bridge state.
//!
//! The worker loops over one command channel fed by three producers: the
//! surface dispatch (through [`crate::RingManager`]), DAW property
//! listeners, and spawned fetches completing. RPC calls inside a command
//! handler are the only suspension points; commands never interleave, so
//! every map and focus field is single-worker by construction.

use std::collections::HashMap;
use std::sync::Arc;

use ringproto::{Color, ListenerCallback, ObjectRef, RemoteValue, SurfaceSink, TrackId};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::RingConfig;
use crate::emitter::Emitter;
use crate::focus::FocusState;
use crate::manager::{Command, DawSession};
use crate::ring::RingState;
use crate::subs::SubscriptionGroup;
use crate::track::TrackEntry;

pub(crate) struct RingWorker {
    pub(crate) song: ObjectRef,
    pub(crate) view: ObjectRef,
    pub(crate) config: RingConfig,
    pub(crate) emitter: Emitter,
    /// Handle back into our own queue, cloned into listener callbacks and
    /// spawned fetches.
    pub(crate) tx: mpsc::UnboundedSender<Command>,

    pub(crate) ring: RingState,
    /// Visible-track snapshot; refreshed at init, on `tracks` pushes, and
    /// before a navigation.
    pub(crate) tracks: Vec<ObjectRef>,
    pub(crate) scene_count: usize,
    pub(crate) master_id: Option<TrackId>,

    pub(crate) current_ring_ids: Vec<TrackId>,
    pub(crate) ring_index: HashMap<TrackId, usize>,
    pub(crate) entries: HashMap<TrackId, TrackEntry>,

    pub(crate) ring_subs: SubscriptionGroup,
    pub(crate) focus_subs: SubscriptionGroup,

    pub(crate) focus: FocusState,
}

impl RingWorker {
    pub(crate) fn new(
        session: DawSession,
        sink: Arc<dyn SurfaceSink>,
        config: RingConfig,
        tx: mpsc::UnboundedSender<Command>,
    ) -> Self {
        Self {
            song: session.song,
            view: session.view,
            config,
            emitter: Emitter::new(sink),
            tx,
            ring: RingState::default(),
            tracks: Vec::new(),
            scene_count: 0,
            master_id: None,
            current_ring_ids: Vec::new(),
            ring_index: HashMap::new(),
            entries: HashMap::new(),
            ring_subs: SubscriptionGroup::new("ring"),
            focus_subs: SubscriptionGroup::new("focus"),
            focus: FocusState::default(),
        }
    }

    pub(crate) async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        debug!("ring worker started");
        while let Some(command) = rx.recv().await {
            match command {
                Command::Settle { ack } => {
                    let _ = ack.send(());
                }
                Command::Destroy { ack } => {
                    self.teardown().await;
                    let _ = ack.send(());
                    break;
                }
                command => self.dispatch(command).await,
            }
        }
        debug!("ring worker exiting");
    }

    async fn dispatch(&mut self, command: Command) {
        match command {
            Command::Init => self.init().await,
            Command::SetupRing {
                width,
                scenes,
                track_offset,
                scene_offset,
            } => {
                self.setup_ring(width, scenes, track_offset, scene_offset)
                    .await
            }
            Command::SetOffset {
                track_offset,
                scene_offset,
            } => self.set_offset(track_offset, scene_offset).await,
            Command::NavigateRing { direction } => self.navigate_ring(direction).await,
            Command::NavigateScenes { direction } => self.navigate_scenes(direction).await,

            Command::ToggleMute { ring_index } => self.toggle_mute(ring_index).await,
            Command::ToggleSolo { ring_index } => self.toggle_solo(ring_index).await,
            Command::ToggleArm { ring_index } => self.toggle_arm(ring_index).await,
            Command::SetVolume { ring_index, value } => self.set_volume(ring_index, value).await,
            Command::SetPanning { ring_index, value } => self.set_panning(ring_index, value).await,
            Command::SetSend {
                ring_index,
                send_index,
                value,
            } => self.set_send(ring_index, send_index, value).await,
            Command::SelectTrack { ring_index } => self.select_track_in_ring(ring_index).await,
            Command::LaunchClip {
                ring_index,
                scene_index,
            } => self.launch_clip(ring_index, scene_index).await,

            Command::StartPlaying => self.call_song("start_playing").await,
            Command::StopPlaying => self.call_song("stop_playing").await,

            Command::SetActiveProperty { property } => self.set_active_property(property),
            Command::SendActivePropertyState => self.send_active_property_state(),
            Command::SetActivePropertyValue { ring_index, raw } => {
                self.set_active_property_value(ring_index, raw).await
            }
            Command::AdjustActivePropertyValue { ring_index, delta } => {
                self.adjust_active_property_value(ring_index, delta).await
            }
            Command::AdjustSelectedParameter { delta } => {
                self.adjust_selected_parameter(delta).await
            }
            Command::ResetActivePropertyValue { ring_index } => {
                self.reset_active_property_value(ring_index).await
            }
            Command::ResetSelectedParameter => self.reset_selected_parameter().await,
            Command::RequestFullState => self.request_full_state(),

            Command::TracksChanged => {
                self.refresh_tracks().await;
                self.sync_ring_listeners().await;
            }
            Command::ReturnTracksChanged => self.rebuild_sends().await,
            Command::TrackProperty { id, prop, value } => {
                self.apply_track_property(id, prop, value)
            }
            Command::SelectedTrackChanged { value } => self.apply_selected_track(value).await,
            Command::SelectedTrackProperty { prop, value } => {
                self.apply_selected_track_property(prop, value)
            }
            Command::PlayingSlotChanged { value } => {
                self.refresh_playing_clip(value.as_i64().unwrap_or(-1)).await
            }
            Command::ClipProperty { prop, value } => self.apply_clip_property(prop, value),
            Command::ParameterSelected { value } => self.apply_parameter_selected(value).await,
            Command::ParameterMetadata { generation, result } => {
                self.apply_parameter_metadata(generation, result).await
            }
            Command::ParameterValue { value } => self.apply_parameter_value(value),
            Command::TransportChanged { field, value } => self.apply_transport(field, value),

            // handled in run()
            Command::Settle { .. } | Command::Destroy { .. } => {}
        }
    }

    /// Create focus subscriptions and global list listeners; the ring
    /// stays empty until `setup_ring`.
    async fn init(&mut self) {
        info!("initializing ring bridge");

        match self.song.get("master_track").await {
            Ok(RemoteValue::Object(master)) => {
                self.master_id = Some(TrackId::from(master.id()));
            }
            Ok(other) => warn!("master_track is {}", other.kind()),
            Err(e) => warn!("master_track fetch failed: {:#}", e),
        }

        self.refresh_tracks().await;
        self.refresh_scene_count().await;

        let listeners: [(&str, fn(RemoteValue) -> Command); 2] = [
            ("tracks", |_| Command::TracksChanged),
            ("return_tracks", |_| Command::ReturnTracksChanged),
        ];
        for (prop, make) in listeners {
            let callback = self.command_listener(make);
            match self.song.listen(prop, callback).await {
                Ok(handle) => self.focus_subs.add(format!("song:{}", prop), handle).await,
                Err(e) => warn!("subscribe song {} failed: {:#}", prop, e),
            }
        }

        let callback = self.command_listener(|value| Command::SelectedTrackChanged { value });
        match self.view.listen("selected_track", callback).await {
            Ok(handle) => self.focus_subs.add("view:selected_track", handle).await,
            Err(e) => warn!("subscribe selected_track failed: {:#}", e),
        }

        let callback = self.command_listener(|value| Command::ParameterSelected { value });
        match self.view.listen("selected_parameter", callback).await {
            Ok(handle) => {
                self.focus_subs
                    .add("view:selected_parameter", handle)
                    .await
            }
            Err(e) => warn!("subscribe selected_parameter failed: {:#}", e),
        }

        self.init_transport().await;

        // Prime the focus snapshot from whatever is selected right now.
        match self.view.get("selected_track").await {
            Ok(value) => self.apply_selected_track(value).await,
            Err(e) => warn!("selected_track fetch failed: {:#}", e),
        }

        info!(
            "ring bridge initialized ({} visible tracks, {} scenes)",
            self.tracks.len(),
            self.scene_count
        );
    }

    async fn teardown(&mut self) {
        info!("destroying ring bridge");
        self.focus_subs.clear().await;
        self.ring_subs.clear().await;
        self.entries.clear();
        self.ring_index.clear();
        self.current_ring_ids.clear();
        self.tracks.clear();
        self.focus = FocusState::default();
    }

    pub(crate) async fn refresh_tracks(&mut self) {
        match self.song.get("visible_tracks").await {
            Ok(RemoteValue::List(items)) => {
                self.tracks = items
                    .into_iter()
                    .filter_map(|v| match v {
                        RemoteValue::Object(o) => Some(o),
                        _ => None,
                    })
                    .collect();
            }
            Ok(other) => warn!("visible_tracks is {}", other.kind()),
            Err(e) => warn!("visible_tracks fetch failed: {:#}", e),
        }
    }

    async fn refresh_scene_count(&mut self) {
        match self.song.get("scenes").await {
            Ok(RemoteValue::List(scenes)) => self.scene_count = scenes.len(),
            Ok(other) => warn!("scenes is {}", other.kind()),
            Err(e) => warn!("scenes fetch failed: {:#}", e),
        }
    }

    async fn call_song(&self, method: &str) {
        if let Err(e) = self.song.call(method, Vec::new()).await {
            warn!("song.{} failed: {:#}", method, e);
        }
    }

    /// Wrap a command constructor into a listener callback. Callbacks only
    /// enqueue; all mutation happens on this worker.
    pub(crate) fn command_listener<F>(&self, make: F) -> ListenerCallback
    where
        F: Fn(RemoteValue) -> Command + Send + Sync + 'static,
    {
        let tx = self.tx.clone();
        Arc::new(move |value| {
            let _ = tx.send(make(value));
        })
    }

    pub(crate) async fn get_bool(&self, object: &ObjectRef, prop: &str) -> bool {
        match object.get(prop).await {
            Ok(v) => v.as_bool().unwrap_or_else(|| {
                warn!("{}: {} is {}, expected bool", object.id(), prop, v.kind());
                false
            }),
            Err(e) => {
                warn!("{}: {} fetch failed: {:#}", object.id(), prop, e);
                false
            }
        }
    }

    pub(crate) async fn get_f64(&self, object: &ObjectRef, prop: &str) -> f64 {
        match object.get(prop).await {
            Ok(v) => v.as_f64().unwrap_or_else(|| {
                warn!("{}: {} is {}, expected number", object.id(), prop, v.kind());
                0.0
            }),
            Err(e) => {
                warn!("{}: {} fetch failed: {:#}", object.id(), prop, e);
                0.0
            }
        }
    }

    pub(crate) async fn get_color(&self, object: &ObjectRef, prop: &str) -> Color {
        match object.get(prop).await {
            Ok(v) => Color::from_remote(&v).unwrap_or_else(|| {
                warn!("{}: unrecognized color shape {}", object.id(), v.kind());
                Color::default()
            }),
            Err(e) => {
                warn!("{}: {} fetch failed: {:#}", object.id(), prop, e);
                Color::default()
            }
        }
    }

    /// Re-emit the complete ring snapshot. The surface consumes one event
    /// grammar for both live and snapshot paths, so it can always redraw
    /// from the most recent emission.
    pub(crate) fn send_full_sync(&self) {
        debug!("full sync: {} resident tracks", self.current_ring_ids.len());
        for (position, id) in self.current_ring_ids.iter().enumerate() {
            let Some(entry) = self.entries.get(id) else {
                continue;
            };
            let state = &entry.state;
            self.emitter.mute(position, state.mute);
            self.emitter.solo(position, state.solo);
            self.emitter.arm(position, state.arm);
            if !state.is_midi {
                self.emitter.volume(position, state.volume);
                self.emitter.panning(position, state.panning);
            }
            self.emitter.info(position, state);
            for (send_index, value) in state.sends.iter().enumerate() {
                self.emitter.send(position, send_index, *value);
            }
        }
    }
}
