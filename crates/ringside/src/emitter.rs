//! Outbound emission toward the surface.
//!
//! Thin typed facade over the injected [`SurfaceSink`]. Normalization rules
//! live here so live emissions and snapshot resyncs cannot drift apart:
//! volume and sends are already 0..1, panning maps -1..1 onto 0..1.

use std::sync::Arc;

use ringproto::{SurfaceEvent, SurfaceSink};
use tracing::trace;

use crate::track::TrackState;

#[derive(Clone)]
pub(crate) struct Emitter {
    sink: Arc<dyn SurfaceSink>,
}

impl Emitter {
    pub(crate) fn new(sink: Arc<dyn SurfaceSink>) -> Self {
        Self { sink }
    }

    pub(crate) fn emit(&self, event: SurfaceEvent) {
        trace!("emit {}", event.kind());
        self.sink.send(event);
    }

    pub(crate) fn mute(&self, ring_index: usize, value: bool) {
        self.emit(SurfaceEvent::TrackMute { ring_index, value });
    }

    pub(crate) fn solo(&self, ring_index: usize, value: bool) {
        self.emit(SurfaceEvent::TrackSolo { ring_index, value });
    }

    pub(crate) fn arm(&self, ring_index: usize, value: bool) {
        self.emit(SurfaceEvent::TrackArm { ring_index, value });
    }

    pub(crate) fn volume(&self, ring_index: usize, value: f64) {
        self.emit(SurfaceEvent::TrackVolume {
            ring_index,
            value,
            normalized: value,
        });
    }

    pub(crate) fn panning(&self, ring_index: usize, value: f64) {
        self.emit(SurfaceEvent::TrackPanning {
            ring_index,
            value,
            normalized: (value + 1.0) / 2.0,
        });
    }

    pub(crate) fn send(&self, ring_index: usize, send_index: usize, value: f64) {
        self.emit(SurfaceEvent::TrackSend {
            ring_index,
            send_index,
            value,
            normalized: value,
        });
    }

    pub(crate) fn info(&self, ring_index: usize, state: &TrackState) {
        self.emit(SurfaceEvent::TrackInfo {
            ring_index,
            name: state.name.clone(),
            color: state.color,
            is_midi: state.is_midi,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn capture() -> (Emitter, Arc<Mutex<Vec<SurfaceEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let captured = events.clone();
        let sink: Arc<dyn SurfaceSink> = Arc::new(move |event: SurfaceEvent| {
            captured.lock().unwrap().push(event);
        });
        (Emitter::new(sink), events)
    }

    #[test]
    fn test_panning_normalization() {
        let (emitter, events) = capture();
        emitter.panning(1, -1.0);
        emitter.panning(1, 0.0);
        emitter.panning(1, 1.0);

        let events = events.lock().unwrap();
        let normalized: Vec<f64> = events
            .iter()
            .map(|e| match e {
                SurfaceEvent::TrackPanning { normalized, .. } => *normalized,
                other => panic!("unexpected event {:?}", other),
            })
            .collect();
        assert_eq!(normalized, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_volume_passes_through() {
        let (emitter, events) = capture();
        emitter.volume(0, 0.85);
        let events = events.lock().unwrap();
        match &events[0] {
            SurfaceEvent::TrackVolume {
                value, normalized, ..
            } => {
                assert_eq!(*value, 0.85);
                assert_eq!(*normalized, 0.85);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
