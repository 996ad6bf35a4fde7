//! Outbound event records pushed toward the hardware surface.
//!
//! One grammar serves both live property changes and snapshot resyncs: the
//! surface can always be redrawn from the most recent emission without
//! bookkeeping of its own. Records serialize as tagged JSON; the far side of
//! the sink owns any further re-encoding.
//!
//! Indices are ring-relative except `SelectedTrack::index`, which is the
//! absolute position in the visible track list (`-1` when the selection is
//! not a visible track). `SelectedTrack::ring_index` is `-1` when the
//! selection sits outside the window.

use serde::{Deserialize, Serialize};

use crate::color::Color;

/// One record on the surface-bound channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SurfaceEvent {
    TrackMute {
        ring_index: usize,
        value: bool,
    },
    TrackSolo {
        ring_index: usize,
        value: bool,
    },
    TrackArm {
        ring_index: usize,
        value: bool,
    },
    TrackVolume {
        ring_index: usize,
        value: f64,
        normalized: f64,
    },
    TrackPanning {
        ring_index: usize,
        /// Native pan position, -1..1.
        value: f64,
        normalized: f64,
    },
    TrackSend {
        ring_index: usize,
        send_index: usize,
        value: f64,
        normalized: f64,
    },
    TrackInfo {
        ring_index: usize,
        name: String,
        color: Color,
        is_midi: bool,
    },
    SelectedTrack {
        index: i64,
        ring_index: i64,
        name: String,
        color: Color,
    },
    /// Blank (`name` empty, color black) when the playing slot is negative
    /// or the slot holds no clip.
    PlayingClip {
        name: String,
        color: Color,
    },
    /// Blank (all fields zero) when no parameter is selected.
    SelectedParameter {
        name: String,
        value: f64,
        normalized: f64,
        min: f64,
        max: f64,
    },
    Transport {
        playing: bool,
        recording: bool,
    },
}

impl SurfaceEvent {
    /// Stable type name, matching the serialized tag.
    pub fn kind(&self) -> &'static str {
        match self {
            SurfaceEvent::TrackMute { .. } => "track_mute",
            SurfaceEvent::TrackSolo { .. } => "track_solo",
            SurfaceEvent::TrackArm { .. } => "track_arm",
            SurfaceEvent::TrackVolume { .. } => "track_volume",
            SurfaceEvent::TrackPanning { .. } => "track_panning",
            SurfaceEvent::TrackSend { .. } => "track_send",
            SurfaceEvent::TrackInfo { .. } => "track_info",
            SurfaceEvent::SelectedTrack { .. } => "selected_track",
            SurfaceEvent::PlayingClip { .. } => "playing_clip",
            SurfaceEvent::SelectedParameter { .. } => "selected_parameter",
            SurfaceEvent::Transport { .. } => "transport",
        }
    }
}

/// The single outbound channel toward the surface.
///
/// Implementations must be synchronous and must not panic; delivery errors
/// are the sink's responsibility, not the core's.
pub trait SurfaceSink: Send + Sync {
    fn send(&self, event: SurfaceEvent);
}

impl<F> SurfaceSink for F
where
    F: Fn(SurfaceEvent) + Send + Sync,
{
    fn send(&self, event: SurfaceEvent) {
        self(event)
    }
}

/// Channel-backed sink. Send errors (receiver dropped) are ignored: a
/// surface that went away simply stops consuming.
impl SurfaceSink for tokio::sync::mpsc::UnboundedSender<SurfaceEvent> {
    fn send(&self, event: SurfaceEvent) {
        let _ = tokio::sync::mpsc::UnboundedSender::send(self, event);
    }
}
