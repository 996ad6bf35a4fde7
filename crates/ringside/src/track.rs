//! Per-track ring entries: cached state, mixer handles, the entry builder,
//! and the track-addressed write paths.
//!
//! The builder reads every mutable field through explicit RPC gets. Handle
//! snapshots carried with `tracks` pushes can be stale by the time a track
//! enters the window, so they are never trusted. A failure on any one
//! property is logged and the rest of the track is still built; listeners
//! correct partial state as notifications arrive.

use ringproto::{Color, ObjectRef, RemoteValue, TrackId};
use tracing::{debug, warn};

use crate::manager::Command;
use crate::worker::RingWorker;

/// Cached mirror of one ring-resident track, the subset the surface renders.
#[derive(Debug, Clone, Default)]
pub struct TrackState {
    pub name: String,
    pub color: Color,
    /// Has MIDI input and no audio input.
    pub is_midi: bool,
    pub mute: bool,
    pub solo: bool,
    pub arm: bool,
    pub can_be_armed: bool,
    pub volume: f64,
    pub panning: f64,
    /// One level per return track, in return-track order.
    pub sends: Vec<f64>,
}

/// Remote-object handles used to issue mixer writes without re-traversing
/// the mixer device on every call.
pub(crate) struct MixerHandles {
    pub device: ObjectRef,
    pub volume: ObjectRef,
    pub panning: ObjectRef,
    pub sends: Vec<ObjectRef>,
}

/// Everything the ring holds for one resident track.
pub(crate) struct TrackEntry {
    pub track: ObjectRef,
    pub state: TrackState,
    /// `None` when the mixer device could not be resolved; mixer writes
    /// no-op until the track re-enters the ring.
    pub mixer: Option<MixerHandles>,
}

/// Which mirrored property a listener notification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TrackProp {
    Name,
    Color,
    Mute,
    Solo,
    Arm,
    Volume,
    Panning,
    Send(usize),
}

impl TrackProp {
    /// Subscription-key suffix under `track:{id}:`.
    pub(crate) fn key_suffix(&self) -> String {
        match self {
            TrackProp::Name => "name".to_string(),
            TrackProp::Color => "color".to_string(),
            TrackProp::Mute => "mute".to_string(),
            TrackProp::Solo => "solo".to_string(),
            TrackProp::Arm => "arm".to_string(),
            TrackProp::Volume => "volume".to_string(),
            TrackProp::Panning => "panning".to_string(),
            TrackProp::Send(i) => format!("send:{}", i),
        }
    }
}

impl RingWorker {
    /// Build the cache entry and listener set for a track entering the ring.
    pub(crate) async fn build_track_entry(&mut self, track: ObjectRef) {
        let id = TrackId::from(track.id());
        let is_master = self.master_id.as_ref() == Some(&id);
        let mut state = TrackState::default();

        let has_midi_input = self.get_bool(&track, "has_midi_input").await;
        let has_audio_input = self.get_bool(&track, "has_audio_input").await;
        state.is_midi = has_midi_input && !has_audio_input;

        state.name = match track.get("name").await {
            Ok(v) => v.as_str().unwrap_or_default().to_string(),
            Err(e) => {
                warn!("track {}: name fetch failed: {:#}", id, e);
                String::new()
            }
        };
        state.color = self.get_color(&track, "color").await;

        if !is_master {
            state.mute = self.get_bool(&track, "mute").await;
            state.solo = self.get_bool(&track, "solo").await;
        }
        state.can_be_armed = !is_master && self.get_bool(&track, "can_be_armed").await;
        if state.can_be_armed {
            state.arm = self.get_bool(&track, "arm").await;
        }

        let mixer = self.resolve_mixer(&track, &id, is_master).await;
        if let Some(m) = &mixer {
            if !state.is_midi {
                state.volume = self.get_f64(&m.volume, "value").await;
                state.panning = self.get_f64(&m.panning, "value").await;
            }
            let mut sends = Vec::with_capacity(m.sends.len());
            for send in &m.sends {
                sends.push(self.get_f64(send, "value").await);
            }
            state.sends = sends;
        }

        self.subscribe_track_listener(&track, "name", &id, TrackProp::Name).await;
        self.subscribe_track_listener(&track, "color", &id, TrackProp::Color).await;
        if !is_master {
            self.subscribe_track_listener(&track, "mute", &id, TrackProp::Mute).await;
            self.subscribe_track_listener(&track, "solo", &id, TrackProp::Solo).await;
        }
        if state.can_be_armed {
            self.subscribe_track_listener(&track, "arm", &id, TrackProp::Arm).await;
        }
        if let Some(m) = &mixer {
            let volume = m.volume.clone();
            let panning = m.panning.clone();
            let sends = m.sends.clone();
            if !state.is_midi {
                self.subscribe_track_listener(&volume, "value", &id, TrackProp::Volume).await;
                self.subscribe_track_listener(&panning, "value", &id, TrackProp::Panning).await;
            }
            if !is_master {
                for (i, send) in sends.iter().enumerate() {
                    self.subscribe_track_listener(send, "value", &id, TrackProp::Send(i)).await;
                }
            }
        }

        debug!("built ring entry for track {} ({:?})", id, state.name);
        self.entries.insert(id, TrackEntry { track, state, mixer });
    }

    async fn resolve_mixer(
        &self,
        track: &ObjectRef,
        id: &TrackId,
        is_master: bool,
    ) -> Option<MixerHandles> {
        let device = match track.get("mixer_device").await {
            Ok(RemoteValue::Object(device)) => device,
            Ok(other) => {
                warn!("track {}: mixer_device is {}", id, other.kind());
                return None;
            }
            Err(e) => {
                warn!("track {}: mixer_device fetch failed: {:#}", id, e);
                return None;
            }
        };

        let volume = match device.get("volume").await {
            Ok(RemoteValue::Object(p)) => p,
            Ok(other) => {
                warn!("track {}: mixer volume is {}", id, other.kind());
                return None;
            }
            Err(e) => {
                warn!("track {}: mixer volume fetch failed: {:#}", id, e);
                return None;
            }
        };
        let panning = match device.get("panning").await {
            Ok(RemoteValue::Object(p)) => p,
            Ok(other) => {
                warn!("track {}: mixer panning is {}", id, other.kind());
                return None;
            }
            Err(e) => {
                warn!("track {}: mixer panning fetch failed: {:#}", id, e);
                return None;
            }
        };

        let sends = if is_master {
            Vec::new()
        } else {
            match device.get("sends").await {
                Ok(RemoteValue::List(items)) => items
                    .into_iter()
                    .filter_map(|v| match v {
                        RemoteValue::Object(o) => Some(o),
                        _ => None,
                    })
                    .collect(),
                Ok(other) => {
                    warn!("track {}: sends is {}", id, other.kind());
                    Vec::new()
                }
                Err(e) => {
                    warn!("track {}: sends fetch failed: {:#}", id, e);
                    Vec::new()
                }
            }
        };

        Some(MixerHandles {
            device,
            volume,
            panning,
            sends,
        })
    }

    /// Register one property listener for a ring-resident track. The
    /// callback captures the track id, never a ring index: indices are
    /// resolved through the live map at emission time, so a window shift
    /// does not require re-subscription.
    pub(crate) async fn subscribe_track_listener(
        &mut self,
        object: &ObjectRef,
        remote_prop: &str,
        id: &TrackId,
        prop: TrackProp,
    ) {
        let key = format!("track:{}:{}", id, prop.key_suffix());
        let id_for_cb = id.clone();
        let callback = self.command_listener(move |value| Command::TrackProperty {
            id: id_for_cb.clone(),
            prop,
            value,
        });
        match object.listen(remote_prop, callback).await {
            Ok(handle) => self.ring_subs.add(key, handle).await,
            Err(e) => warn!(
                "track {}: subscribe {} failed: {:#}",
                id,
                prop.key_suffix(),
                e
            ),
        }
    }

    /// Write-through from a property push: update the cache, resolve the
    /// live ring index, emit. Pushes for tracks that already left the ring
    /// are dropped.
    pub(crate) fn apply_track_property(&mut self, id: TrackId, prop: TrackProp, value: RemoteValue) {
        let Some(position) = self.ring_index.get(&id).copied() else {
            return;
        };
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };

        match prop {
            TrackProp::Name => {
                match value.as_str() {
                    Some(s) => entry.state.name = s.to_string(),
                    None => warn!("track {}: name push is {}", id, value.kind()),
                }
                self.emitter.info(position, &entry.state);
            }
            TrackProp::Color => {
                match Color::from_remote(&value) {
                    Some(c) => entry.state.color = c,
                    None => warn!("track {}: unrecognized color shape {}", id, value.kind()),
                }
                self.emitter.info(position, &entry.state);
            }
            TrackProp::Mute => {
                let Some(v) = value.as_bool() else { return };
                entry.state.mute = v;
                self.emitter.mute(position, v);
            }
            TrackProp::Solo => {
                let Some(v) = value.as_bool() else { return };
                entry.state.solo = v;
                self.emitter.solo(position, v);
            }
            TrackProp::Arm => {
                let Some(v) = value.as_bool() else { return };
                entry.state.arm = v;
                self.emitter.arm(position, v);
            }
            TrackProp::Volume => {
                let Some(v) = value.as_f64() else { return };
                entry.state.volume = v;
                self.emitter.volume(position, v);
            }
            TrackProp::Panning => {
                let Some(v) = value.as_f64() else { return };
                entry.state.panning = v;
                self.emitter.panning(position, v);
            }
            TrackProp::Send(send_index) => {
                let Some(v) = value.as_f64() else { return };
                if send_index >= entry.state.sends.len() {
                    entry.state.sends.resize(send_index + 1, 0.0);
                }
                entry.state.sends[send_index] = v;
                self.emitter.send(position, send_index, v);
            }
        }
    }

    /// Resident lookup by ring index. Unknown indices are absorbed
    /// silently; the surface can race the window.
    pub(crate) fn resident_entry(&self, ring_index: usize) -> Option<(&TrackId, &TrackEntry)> {
        let id = self.current_ring_ids.get(ring_index)?;
        let entry = self.entries.get(id)?;
        Some((id, entry))
    }

    pub(crate) async fn toggle_mute(&self, ring_index: usize) {
        let Some((id, entry)) = self.resident_entry(ring_index) else {
            return;
        };
        if self.master_id.as_ref() == Some(id) {
            return;
        }
        let id = id.clone();
        let track = entry.track.clone();
        let target = !entry.state.mute;
        if let Err(e) = track.set("mute", RemoteValue::Bool(target)).await {
            warn!("track {}: mute write failed: {:#}", id, e);
        }
    }

    pub(crate) async fn toggle_solo(&self, ring_index: usize) {
        let Some((id, entry)) = self.resident_entry(ring_index) else {
            return;
        };
        if self.master_id.as_ref() == Some(id) {
            return;
        }
        let id = id.clone();
        let track = entry.track.clone();
        let target = !entry.state.solo;
        if let Err(e) = track.set("solo", RemoteValue::Bool(target)).await {
            warn!("track {}: solo write failed: {:#}", id, e);
        }
    }

    pub(crate) async fn toggle_arm(&self, ring_index: usize) {
        let Some((id, entry)) = self.resident_entry(ring_index) else {
            return;
        };
        if !entry.state.can_be_armed {
            return;
        }
        let id = id.clone();
        let track = entry.track.clone();
        let target = !entry.state.arm;
        if let Err(e) = track.set("arm", RemoteValue::Bool(target)).await {
            warn!("track {}: arm write failed: {:#}", id, e);
        }
    }

    pub(crate) async fn set_volume(&self, ring_index: usize, value: f64) {
        let Some((id, entry)) = self.resident_entry(ring_index) else {
            return;
        };
        let Some(mixer) = entry.mixer.as_ref() else {
            return;
        };
        let id = id.clone();
        let param = mixer.volume.clone();
        if let Err(e) = param
            .set("value", RemoteValue::Float(value.clamp(0.0, 1.0)))
            .await
        {
            warn!("track {}: volume write failed: {:#}", id, e);
        }
    }

    pub(crate) async fn set_panning(&self, ring_index: usize, value: f64) {
        let Some((id, entry)) = self.resident_entry(ring_index) else {
            return;
        };
        let Some(mixer) = entry.mixer.as_ref() else {
            return;
        };
        let id = id.clone();
        let param = mixer.panning.clone();
        if let Err(e) = param
            .set("value", RemoteValue::Float(value.clamp(-1.0, 1.0)))
            .await
        {
            warn!("track {}: panning write failed: {:#}", id, e);
        }
    }

    pub(crate) async fn set_send(&self, ring_index: usize, send_index: usize, value: f64) {
        let Some((id, entry)) = self.resident_entry(ring_index) else {
            return;
        };
        let Some(param) = entry
            .mixer
            .as_ref()
            .and_then(|m| m.sends.get(send_index))
            .cloned()
        else {
            return;
        };
        let id = id.clone();
        if let Err(e) = param
            .set("value", RemoteValue::Float(value.clamp(0.0, 1.0)))
            .await
        {
            warn!("track {}: send {} write failed: {:#}", id, send_index, e);
        }
    }

    pub(crate) async fn select_track_in_ring(&self, ring_index: usize) {
        let Some((id, entry)) = self.resident_entry(ring_index) else {
            return;
        };
        let id = id.clone();
        let track = entry.track.clone();
        if let Err(e) = self
            .view
            .set("selected_track", RemoteValue::Object(track))
            .await
        {
            warn!("track {}: select failed: {:#}", id, e);
        }
    }

    /// Fire the clip slot at `scene_offset + scene_index` on a resident
    /// track. Missing slots no-op.
    pub(crate) async fn launch_clip(&self, ring_index: usize, scene_index: usize) {
        let Some((id, entry)) = self.resident_entry(ring_index) else {
            return;
        };
        let id = id.clone();
        let track = entry.track.clone();
        let slot_index = self.ring.scene_offset + scene_index;

        let slots = match track.get("clip_slots").await {
            Ok(RemoteValue::List(slots)) => slots,
            Ok(other) => {
                warn!("track {}: clip_slots is {}", id, other.kind());
                return;
            }
            Err(e) => {
                warn!("track {}: clip_slots fetch failed: {:#}", id, e);
                return;
            }
        };
        match slots.into_iter().nth(slot_index) {
            Some(RemoteValue::Object(slot)) => {
                if let Err(e) = slot.call("fire", Vec::new()).await {
                    warn!("track {}: clip fire failed: {:#}", id, e);
                }
            }
            _ => debug!("track {}: no clip slot at {}", id, slot_index),
        }
    }

    /// Return tracks changed: every resident's send handles, values, and
    /// listeners are rebuilt, then the surface gets a fresh snapshot.
    pub(crate) async fn rebuild_sends(&mut self) {
        debug!(
            "return tracks changed, rebuilding sends for {} residents",
            self.current_ring_ids.len()
        );
        let ids: Vec<TrackId> = self.current_ring_ids.clone();
        for id in ids {
            self.ring_subs
                .remove_by_prefix(&format!("track:{}:send:", id))
                .await;
            if self.master_id.as_ref() == Some(&id) {
                continue;
            }
            let Some(device) = self
                .entries
                .get(&id)
                .and_then(|e| e.mixer.as_ref())
                .map(|m| m.device.clone())
            else {
                continue;
            };

            let sends: Vec<ObjectRef> = match device.get("sends").await {
                Ok(RemoteValue::List(items)) => items
                    .into_iter()
                    .filter_map(|v| match v {
                        RemoteValue::Object(o) => Some(o),
                        _ => None,
                    })
                    .collect(),
                Ok(other) => {
                    warn!("track {}: sends is {}", id, other.kind());
                    Vec::new()
                }
                Err(e) => {
                    warn!("track {}: sends refetch failed: {:#}", id, e);
                    Vec::new()
                }
            };

            let mut values = Vec::with_capacity(sends.len());
            for send in &sends {
                values.push(self.get_f64(send, "value").await);
            }
            for (i, send) in sends.iter().enumerate() {
                self.subscribe_track_listener(send, "value", &id, TrackProp::Send(i))
                    .await;
            }
            if let Some(entry) = self.entries.get_mut(&id) {
                entry.state.sends = values;
                if let Some(m) = entry.mixer.as_mut() {
                    m.sends = sends;
                }
            }
        }
        self.send_full_sync();
    }
}
