//! Public handle over the ring worker.
//!
//! Reactor architecture: all state is owned by a background worker task,
//! callers enqueue commands over an unbounded channel and return
//! immediately. Surface commands are fire-and-forget by contract; only
//! `settle` and `destroy` are acknowledged, via oneshot.
//!
//! DAW property listeners feed the same channel, which is what makes the
//! core single-worker: there is exactly one consumer of every mutation.

use std::sync::Arc;

use anyhow::Result;
use ringproto::{ObjectRef, RemoteValue, SurfaceSink, TrackId};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::active::{ActiveProperty, RingDirection, SceneDirection};
use crate::config::RingConfig;
use crate::focus::{FocusProp, ParameterSnapshot, TransportField};
use crate::track::TrackProp;
use crate::worker::RingWorker;

/// The two RPC roots the core needs: the song object and its view.
#[derive(Clone)]
pub struct DawSession {
    pub song: ObjectRef,
    pub view: ObjectRef,
}

/// Command processed by the worker. External variants map 1:1 onto the
/// surface dispatch table; the push variants are enqueued by DAW listeners
/// and by spawned fetches completing.
pub(crate) enum Command {
    // lifecycle
    Init,
    Destroy { ack: oneshot::Sender<()> },
    Settle { ack: oneshot::Sender<()> },

    // ring window
    SetupRing {
        width: usize,
        scenes: usize,
        track_offset: usize,
        scene_offset: usize,
    },
    SetOffset {
        track_offset: usize,
        scene_offset: usize,
    },
    NavigateRing { direction: RingDirection },
    NavigateScenes { direction: SceneDirection },

    // per-track intents
    ToggleMute { ring_index: usize },
    ToggleSolo { ring_index: usize },
    ToggleArm { ring_index: usize },
    SetVolume { ring_index: usize, value: f64 },
    SetPanning { ring_index: usize, value: f64 },
    SetSend {
        ring_index: usize,
        send_index: usize,
        value: f64,
    },
    SelectTrack { ring_index: usize },
    LaunchClip {
        ring_index: usize,
        scene_index: usize,
    },

    // transport control
    StartPlaying,
    StopPlaying,

    // active property
    SetActiveProperty { property: ActiveProperty },
    SendActivePropertyState,
    SetActivePropertyValue { ring_index: usize, raw: u8 },
    AdjustActivePropertyValue { ring_index: usize, delta: i32 },
    AdjustSelectedParameter { delta: i32 },
    ResetActivePropertyValue { ring_index: usize },
    ResetSelectedParameter,
    RequestFullState,

    // DAW pushes
    TracksChanged,
    ReturnTracksChanged,
    TrackProperty {
        id: TrackId,
        prop: TrackProp,
        value: RemoteValue,
    },
    SelectedTrackChanged { value: RemoteValue },
    SelectedTrackProperty { prop: FocusProp, value: RemoteValue },
    PlayingSlotChanged { value: RemoteValue },
    ClipProperty { prop: FocusProp, value: RemoteValue },
    ParameterSelected { value: RemoteValue },
    ParameterMetadata {
        generation: u64,
        result: Result<ParameterSnapshot>,
    },
    ParameterValue { value: RemoteValue },
    TransportChanged {
        field: TransportField,
        value: RemoteValue,
    },
}

/// Handle to a running ring bridge.
///
/// Cheap to clone conceptually but deliberately not `Clone`: the command
/// dispatch layer owns exactly one handle, and dropping it (after
/// `destroy`) ends the worker.
pub struct RingManager {
    tx: mpsc::UnboundedSender<Command>,
}

impl RingManager {
    /// Spawn the worker task and return its handle. The core holds no
    /// global state; spawning twice gives two independent bridges.
    pub fn spawn(session: DawSession, sink: Arc<dyn SurfaceSink>, config: RingConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = RingWorker::new(session, sink, config, tx.clone());
        tokio::spawn(worker.run(rx));
        Self { tx }
    }

    fn send(&self, command: Command) {
        // A closed channel means the bridge was destroyed; late commands
        // are dropped, matching the fire-and-forget contract.
        let _ = self.tx.send(command);
    }

    /// Create focus subscriptions and global list listeners. The ring
    /// stays empty until `setup_ring`.
    pub fn init(&self) {
        self.send(Command::Init);
    }

    pub fn setup_ring(&self, width: usize, scenes: usize, track_offset: usize, scene_offset: usize) {
        self.send(Command::SetupRing {
            width,
            scenes,
            track_offset,
            scene_offset,
        });
    }

    pub fn set_offset(&self, track_offset: usize, scene_offset: usize) {
        self.send(Command::SetOffset {
            track_offset,
            scene_offset,
        });
    }

    pub fn navigate_ring(&self, direction: RingDirection) {
        self.send(Command::NavigateRing { direction });
    }

    pub fn navigate_scenes(&self, direction: SceneDirection) {
        self.send(Command::NavigateScenes { direction });
    }

    pub fn toggle_mute(&self, ring_index: usize) {
        self.send(Command::ToggleMute { ring_index });
    }

    pub fn toggle_solo(&self, ring_index: usize) {
        self.send(Command::ToggleSolo { ring_index });
    }

    pub fn toggle_arm(&self, ring_index: usize) {
        self.send(Command::ToggleArm { ring_index });
    }

    pub fn set_volume(&self, ring_index: usize, value: f64) {
        self.send(Command::SetVolume { ring_index, value });
    }

    pub fn set_panning(&self, ring_index: usize, value: f64) {
        self.send(Command::SetPanning { ring_index, value });
    }

    pub fn set_send(&self, ring_index: usize, send_index: usize, value: f64) {
        self.send(Command::SetSend {
            ring_index,
            send_index,
            value,
        });
    }

    pub fn select_track_in_ring(&self, ring_index: usize) {
        self.send(Command::SelectTrack { ring_index });
    }

    pub fn launch_clip(&self, ring_index: usize, scene_index: usize) {
        self.send(Command::LaunchClip {
            ring_index,
            scene_index,
        });
    }

    pub fn start_playing(&self) {
        self.send(Command::StartPlaying);
    }

    pub fn stop_playing(&self) {
        self.send(Command::StopPlaying);
    }

    pub fn set_active_property(&self, property: ActiveProperty) {
        self.send(Command::SetActiveProperty { property });
    }

    pub fn send_active_property_state(&self) {
        self.send(Command::SendActivePropertyState);
    }

    pub fn set_active_property_value(&self, ring_index: usize, raw: u8) {
        self.send(Command::SetActivePropertyValue { ring_index, raw });
    }

    pub fn adjust_active_property_value(&self, ring_index: usize, delta: i32) {
        self.send(Command::AdjustActivePropertyValue { ring_index, delta });
    }

    pub fn adjust_selected_parameter(&self, delta: i32) {
        self.send(Command::AdjustSelectedParameter { delta });
    }

    pub fn reset_active_property_value(&self, ring_index: usize) {
        self.send(Command::ResetActivePropertyValue { ring_index });
    }

    pub fn reset_selected_parameter(&self) {
        self.send(Command::ResetSelectedParameter);
    }

    pub fn request_full_state(&self) {
        self.send(Command::RequestFullState);
    }

    /// Wait until every command enqueued before this call has been
    /// processed. Commands are handled in order, so this is a barrier.
    pub async fn settle(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Command::Settle { ack }).is_ok() {
            let _ = done.await;
        }
    }

    /// Tear down every subscription in both groups, clear all caches, and
    /// stop the worker. Awaits unsubscribe completion. Reuse after destroy
    /// is undefined; spawn a fresh core instead.
    pub async fn destroy(&self) {
        debug!("destroy requested");
        let (ack, done) = oneshot::channel();
        if self.tx.send(Command::Destroy { ack }).is_ok() {
            let _ = done.await;
        }
    }
}
