//! Focus subsystem: selected track, playing clip, selected parameter,
//! transport, and the active encoder property.
//!
//! The selected-parameter path is a small state machine. A selection push
//! raises the `switching` guard, tears down the old value listener, and
//! hands the five-way metadata fetch to a spawned task; the result comes
//! back through the command channel stamped with a generation counter, so a
//! rapid re-selection simply orphans the older fetch. While the guard is
//! up, every write targeting the selected parameter is dropped: a value
//! scaled against stale bounds must never reach the DAW.

use anyhow::{Context, Result};
use ringproto::{Color, ObjectRef, RemoteValue, SurfaceEvent, TrackId};
use tracing::{debug, warn};

use crate::active::ActiveProperty;
use crate::manager::Command;
use crate::worker::RingWorker;

/// Selected-track / clip property addressed by a focus listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FocusProp {
    Name,
    Color,
}

/// Transport field addressed by a listener push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransportField {
    Playing,
    Recording,
}

/// Result of the five-way parameter metadata fetch, published atomically.
pub(crate) struct ParameterSnapshot {
    pub param: ObjectRef,
    pub name: String,
    pub value: f64,
    pub min: f64,
    pub max: f64,
    pub default_value: f64,
}

/// All focus-side state. Reset wholesale on destroy.
pub(crate) struct FocusState {
    pub selected_track: Option<ObjectRef>,
    /// Absolute index in the visible track list, -1 when not visible.
    pub selected_index: i64,
    pub selected_name: String,
    pub selected_color: Color,

    pub clip_name: String,
    pub clip_color: Color,

    pub param: Option<ObjectRef>,
    pub param_name: String,
    pub param_value: f64,
    pub param_min: f64,
    pub param_max: f64,
    pub param_default: f64,
    pub param_switching: bool,
    pub param_generation: u64,

    pub active_property: ActiveProperty,

    pub playing: bool,
    pub recording: bool,
}

impl Default for FocusState {
    fn default() -> Self {
        Self {
            selected_track: None,
            selected_index: -1,
            selected_name: String::new(),
            selected_color: Color::default(),
            clip_name: String::new(),
            clip_color: Color::default(),
            param: None,
            param_name: String::new(),
            param_value: 0.0,
            param_min: 0.0,
            param_max: 0.0,
            param_default: 0.0,
            param_switching: false,
            param_generation: 0,
            active_property: ActiveProperty::default(),
            playing: false,
            recording: false,
        }
    }
}

fn clamp_between(value: f64, lo: f64, hi: f64) -> f64 {
    value.max(lo).min(hi)
}

async fn fetch_parameter_snapshot(param: ObjectRef) -> Result<ParameterSnapshot> {
    let (name, value, min, max, default_value) = tokio::try_join!(
        param.get("name"),
        param.get("value"),
        param.get("min"),
        param.get("max"),
        param.get("default_value"),
    )?;
    Ok(ParameterSnapshot {
        name: name.as_str().unwrap_or_default().to_string(),
        value: value.as_f64().context("parameter value is not numeric")?,
        min: min.as_f64().context("parameter min is not numeric")?,
        max: max.as_f64().context("parameter max is not numeric")?,
        default_value: default_value.as_f64().unwrap_or(0.0),
        param,
    })
}

impl RingWorker {
    // ------------------------------------------------------------------
    // selected track
    // ------------------------------------------------------------------

    pub(crate) async fn apply_selected_track(&mut self, value: RemoteValue) {
        self.focus_subs.remove("selected_track_prop:name").await;
        self.focus_subs.remove("selected_track_prop:color").await;
        self.focus_subs.remove("selected_track:playing_slot").await;

        let track = match value {
            RemoteValue::Object(t) => Some(t),
            _ => None,
        };
        self.focus.selected_track = track.clone();

        let Some(track) = track else {
            self.focus.selected_index = -1;
            self.focus.selected_name.clear();
            self.focus.selected_color = Color::default();
            self.emit_selected();
            self.refresh_playing_clip(-1).await;
            return;
        };

        let selected_id = TrackId::from(track.id());
        let absolute = self
            .tracks
            .iter()
            .position(|t| t.id() == selected_id.as_str())
            .map(|p| p as i64)
            .unwrap_or(-1);
        self.focus.selected_index = absolute;
        debug!("selected track {} at index {}", selected_id, absolute);

        // Follow: keep the selection inside the window.
        if self.config.follow_selection && self.ring.width > 0 && absolute >= 0 {
            let absolute = absolute as usize;
            let offset = self.ring.track_offset;
            if absolute < offset || absolute >= offset + self.ring.width {
                let target = absolute.min(self.max_track_offset());
                self.set_offset(target, self.ring.scene_offset).await;
            }
        }

        self.focus.selected_name = match track.get("name").await {
            Ok(v) => v.as_str().unwrap_or_default().to_string(),
            Err(e) => {
                warn!("selected track name fetch failed: {:#}", e);
                String::new()
            }
        };
        self.focus.selected_color = self.get_color(&track, "color").await;

        let callback = self.command_listener(|value| Command::SelectedTrackProperty {
            prop: FocusProp::Name,
            value,
        });
        match track.listen("name", callback).await {
            Ok(handle) => self.focus_subs.add("selected_track_prop:name", handle).await,
            Err(e) => warn!("subscribe selected track name failed: {:#}", e),
        }
        let callback = self.command_listener(|value| Command::SelectedTrackProperty {
            prop: FocusProp::Color,
            value,
        });
        match track.listen("color", callback).await {
            Ok(handle) => {
                self.focus_subs
                    .add("selected_track_prop:color", handle)
                    .await
            }
            Err(e) => warn!("subscribe selected track color failed: {:#}", e),
        }

        self.emit_selected();

        let callback = self.command_listener(|value| Command::PlayingSlotChanged { value });
        match track.listen("playing_slot_index", callback).await {
            Ok(handle) => {
                self.focus_subs
                    .add("selected_track:playing_slot", handle)
                    .await
            }
            Err(e) => warn!("subscribe playing_slot_index failed: {:#}", e),
        }
        let slot = match track.get("playing_slot_index").await {
            Ok(v) => v.as_i64().unwrap_or(-1),
            Err(e) => {
                warn!("playing_slot_index fetch failed: {:#}", e);
                -1
            }
        };
        self.refresh_playing_clip(slot).await;
    }

    pub(crate) fn apply_selected_track_property(&mut self, prop: FocusProp, value: RemoteValue) {
        match prop {
            FocusProp::Name => match value.as_str() {
                Some(s) => self.focus.selected_name = s.to_string(),
                None => warn!("selected track name push is {}", value.kind()),
            },
            FocusProp::Color => match Color::from_remote(&value) {
                Some(c) => self.focus.selected_color = c,
                None => warn!("selected track color shape {}", value.kind()),
            },
        }
        self.emit_selected();
    }

    pub(crate) fn emit_selected(&self) {
        let ring_index = self
            .focus
            .selected_track
            .as_ref()
            .and_then(|t| self.ring_index.get(&TrackId::from(t.id())))
            .map(|i| *i as i64)
            .unwrap_or(-1);
        self.emitter.emit(SurfaceEvent::SelectedTrack {
            index: self.focus.selected_index,
            ring_index,
            name: self.focus.selected_name.clone(),
            color: self.focus.selected_color,
        });
    }

    // ------------------------------------------------------------------
    // playing clip
    // ------------------------------------------------------------------

    /// Re-resolve the playing clip after a selection change or a
    /// `playing_slot_index` push. A negative slot or an empty slot blanks
    /// the clip mirror.
    pub(crate) async fn refresh_playing_clip(&mut self, slot_index: i64) {
        self.focus_subs
            .remove_by_prefix("selected_track_clip:props")
            .await;

        let clip = if slot_index < 0 {
            None
        } else {
            self.lookup_playing_clip(slot_index as usize).await
        };

        let Some(clip) = clip else {
            self.focus.clip_name.clear();
            self.focus.clip_color = Color::default();
            self.emit_playing_clip();
            return;
        };

        self.focus.clip_name = match clip.get("name").await {
            Ok(v) => v.as_str().unwrap_or_default().to_string(),
            Err(e) => {
                warn!("clip name fetch failed: {:#}", e);
                String::new()
            }
        };
        self.focus.clip_color = self.get_color(&clip, "color").await;

        let callback = self.command_listener(|value| Command::ClipProperty {
            prop: FocusProp::Name,
            value,
        });
        match clip.listen("name", callback).await {
            Ok(handle) => {
                self.focus_subs
                    .add("selected_track_clip:props:name", handle)
                    .await
            }
            Err(e) => warn!("subscribe clip name failed: {:#}", e),
        }
        let callback = self.command_listener(|value| Command::ClipProperty {
            prop: FocusProp::Color,
            value,
        });
        match clip.listen("color", callback).await {
            Ok(handle) => {
                self.focus_subs
                    .add("selected_track_clip:props:color", handle)
                    .await
            }
            Err(e) => warn!("subscribe clip color failed: {:#}", e),
        }

        self.emit_playing_clip();
    }

    async fn lookup_playing_clip(&self, slot_index: usize) -> Option<ObjectRef> {
        let track = self.focus.selected_track.clone()?;
        let slots = match track.get("clip_slots").await {
            Ok(RemoteValue::List(slots)) => slots,
            Ok(other) => {
                warn!("clip_slots is {}", other.kind());
                return None;
            }
            Err(e) => {
                warn!("clip_slots fetch failed: {:#}", e);
                return None;
            }
        };
        let slot = match slots.into_iter().nth(slot_index) {
            Some(RemoteValue::Object(slot)) => slot,
            _ => return None,
        };
        match slot.get("clip").await {
            Ok(RemoteValue::Object(clip)) => Some(clip),
            Ok(_) => None,
            Err(e) => {
                warn!("clip fetch failed: {:#}", e);
                None
            }
        }
    }

    pub(crate) fn apply_clip_property(&mut self, prop: FocusProp, value: RemoteValue) {
        match prop {
            FocusProp::Name => match value.as_str() {
                Some(s) => self.focus.clip_name = s.to_string(),
                None => warn!("clip name push is {}", value.kind()),
            },
            FocusProp::Color => match Color::from_remote(&value) {
                Some(c) => self.focus.clip_color = c,
                None => warn!("clip color shape {}", value.kind()),
            },
        }
        self.emit_playing_clip();
    }

    pub(crate) fn emit_playing_clip(&self) {
        self.emitter.emit(SurfaceEvent::PlayingClip {
            name: self.focus.clip_name.clone(),
            color: self.focus.clip_color,
        });
    }

    // ------------------------------------------------------------------
    // selected parameter
    // ------------------------------------------------------------------

    pub(crate) async fn apply_parameter_selected(&mut self, value: RemoteValue) {
        self.focus.param_generation += 1;
        let generation = self.focus.param_generation;
        self.focus.param_switching = true;
        self.focus_subs.remove("selected_param:value").await;

        let Some(param) = value.as_object().cloned() else {
            debug!("parameter deselected");
            self.clear_selected_parameter();
            return;
        };

        debug!("parameter selected: {} (generation {})", param.id(), generation);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = fetch_parameter_snapshot(param).await;
            let _ = tx.send(Command::ParameterMetadata { generation, result });
        });
    }

    pub(crate) async fn apply_parameter_metadata(
        &mut self,
        generation: u64,
        result: Result<ParameterSnapshot>,
    ) {
        if generation != self.focus.param_generation {
            debug!("discarding stale parameter fetch (generation {})", generation);
            return;
        }
        match result {
            Ok(snapshot) => {
                self.focus.param = Some(snapshot.param.clone());
                self.focus.param_name = snapshot.name;
                self.focus.param_value = snapshot.value;
                self.focus.param_min = snapshot.min;
                self.focus.param_max = snapshot.max;
                self.focus.param_default = snapshot.default_value;

                let callback = self.command_listener(|value| Command::ParameterValue { value });
                match snapshot.param.listen("value", callback).await {
                    Ok(handle) => self.focus_subs.add("selected_param:value", handle).await,
                    Err(e) => warn!("subscribe parameter value failed: {:#}", e),
                }

                self.emit_parameter();
                self.focus.param_switching = false;
            }
            Err(e) => {
                warn!("parameter metadata fetch failed: {:#}", e);
                self.clear_selected_parameter();
            }
        }
    }

    /// Zero the parameter mirror, emit a blank record, drop the guard.
    pub(crate) fn clear_selected_parameter(&mut self) {
        self.focus.param = None;
        self.focus.param_name.clear();
        self.focus.param_value = 0.0;
        self.focus.param_min = 0.0;
        self.focus.param_max = 0.0;
        self.focus.param_default = 0.0;
        self.emit_parameter();
        self.focus.param_switching = false;
    }

    pub(crate) fn apply_parameter_value(&mut self, value: RemoteValue) {
        let Some(v) = value.as_f64() else {
            warn!("parameter value push is {}", value.kind());
            return;
        };
        self.focus.param_value = v;
        self.emit_parameter();
    }

    pub(crate) fn emit_parameter(&self) {
        let span = self.focus.param_max - self.focus.param_min;
        let normalized = if span.abs() > f64::EPSILON {
            (self.focus.param_value - self.focus.param_min) / span
        } else {
            0.0
        };
        self.emitter.emit(SurfaceEvent::SelectedParameter {
            name: self.focus.param_name.clone(),
            value: self.focus.param_value,
            normalized,
            min: self.focus.param_min,
            max: self.focus.param_max,
        });
    }

    /// All parameter writes funnel through here; the switching guard makes
    /// sure no value scaled against stale bounds reaches the DAW.
    async fn write_selected_parameter(&self, value: f64) {
        if self.focus.param_switching {
            debug!("selected parameter switching, write dropped");
            return;
        }
        let Some(param) = self.focus.param.clone() else {
            return;
        };
        let value = clamp_between(value, self.focus.param_min, self.focus.param_max);
        if let Err(e) = param.set("value", RemoteValue::Float(value)).await {
            warn!("parameter write failed: {:#}", e);
        }
    }

    // ------------------------------------------------------------------
    // transport
    // ------------------------------------------------------------------

    pub(crate) async fn init_transport(&mut self) {
        let song = self.song.clone();
        self.focus.playing = self.get_bool(&song, "is_playing").await;
        self.focus.recording = self.get_bool(&song, "record_mode").await;

        let callback = self.command_listener(|value| Command::TransportChanged {
            field: TransportField::Playing,
            value,
        });
        match self.song.listen("is_playing", callback).await {
            Ok(handle) => self.focus_subs.add("transport:is_playing", handle).await,
            Err(e) => warn!("subscribe is_playing failed: {:#}", e),
        }
        let callback = self.command_listener(|value| Command::TransportChanged {
            field: TransportField::Recording,
            value,
        });
        match self.song.listen("record_mode", callback).await {
            Ok(handle) => self.focus_subs.add("transport:record_mode", handle).await,
            Err(e) => warn!("subscribe record_mode failed: {:#}", e),
        }

        self.emit_transport();
    }

    pub(crate) fn apply_transport(&mut self, field: TransportField, value: RemoteValue) {
        let Some(v) = value.as_bool() else {
            warn!("transport push is {}", value.kind());
            return;
        };
        match field {
            TransportField::Playing => self.focus.playing = v,
            TransportField::Recording => self.focus.recording = v,
        }
        self.emit_transport();
    }

    pub(crate) fn emit_transport(&self) {
        self.emitter.emit(SurfaceEvent::Transport {
            playing: self.focus.playing,
            recording: self.focus.recording,
        });
    }

    // ------------------------------------------------------------------
    // active property
    // ------------------------------------------------------------------

    pub(crate) fn set_active_property(&mut self, property: ActiveProperty) {
        debug!("active property -> {}", property);
        self.focus.active_property = property;
    }

    /// Emit the active property's current value for every resident (one
    /// record when the parameter is active). Used when the surface switches
    /// encoder banks.
    pub(crate) fn send_active_property_state(&self) {
        let property = self.focus.active_property;
        if property == ActiveProperty::SelectedParameter {
            self.emit_parameter();
            return;
        }
        for (position, id) in self.current_ring_ids.iter().enumerate() {
            let Some(entry) = self.entries.get(id) else {
                continue;
            };
            match property {
                ActiveProperty::Volume => {
                    if !entry.state.is_midi {
                        self.emitter.volume(position, entry.state.volume);
                    }
                }
                ActiveProperty::Panning => {
                    if !entry.state.is_midi {
                        self.emitter.panning(position, entry.state.panning);
                    }
                }
                ActiveProperty::Send(send_index) => {
                    if let Some(value) = entry.state.sends.get(send_index) {
                        self.emitter.send(position, send_index, *value);
                    }
                }
                ActiveProperty::SelectedParameter => {}
            }
        }
    }

    /// Absolute write from a 0..255 surface byte, scaled to the active
    /// property's native range.
    pub(crate) async fn set_active_property_value(&mut self, ring_index: usize, raw: u8) {
        let normalized = raw as f64 / 255.0;
        match self.focus.active_property {
            ActiveProperty::Volume => self.set_volume(ring_index, normalized).await,
            ActiveProperty::Panning => {
                self.set_panning(ring_index, normalized * 2.0 - 1.0).await
            }
            ActiveProperty::Send(send_index) => {
                self.set_send(ring_index, send_index, normalized).await
            }
            ActiveProperty::SelectedParameter => {
                let lo = self.focus.param_min;
                let hi = self.focus.param_max;
                self.write_selected_parameter(lo + normalized * (hi - lo))
                    .await;
            }
        }
    }

    /// Relative write from an encoder detent. The new value is computed
    /// from the cache, not from the DAW, so switching the active track
    /// never causes a value jump.
    pub(crate) async fn adjust_active_property_value(&mut self, ring_index: usize, delta: i32) {
        if self.focus.active_property == ActiveProperty::SelectedParameter {
            self.adjust_selected_parameter(delta).await;
            return;
        }
        let step = self.config.encoder_step;
        let delta = delta as f64;
        match self.focus.active_property {
            ActiveProperty::Volume => {
                let Some((_, entry)) = self.resident_entry(ring_index) else {
                    return;
                };
                let target = (entry.state.volume + delta * step).clamp(0.0, 1.0);
                self.set_volume(ring_index, target).await;
            }
            ActiveProperty::Panning => {
                let Some((_, entry)) = self.resident_entry(ring_index) else {
                    return;
                };
                // Panning is 2 wide, so a detent covers twice the step.
                let target = (entry.state.panning + delta * step * 2.0).clamp(-1.0, 1.0);
                self.set_panning(ring_index, target).await;
            }
            ActiveProperty::Send(send_index) => {
                let Some((_, entry)) = self.resident_entry(ring_index) else {
                    return;
                };
                let Some(current) = entry.state.sends.get(send_index).copied() else {
                    return;
                };
                let target = (current + delta * step).clamp(0.0, 1.0);
                self.set_send(ring_index, send_index, target).await;
            }
            ActiveProperty::SelectedParameter => {}
        }
    }

    pub(crate) async fn adjust_selected_parameter(&mut self, delta: i32) {
        if self.focus.param_switching {
            debug!("selected parameter switching, adjustment dropped");
            return;
        }
        if self.focus.param.is_none() {
            return;
        }
        let span = self.focus.param_max - self.focus.param_min;
        let target = self.focus.param_value + delta as f64 * self.config.encoder_step * span;
        self.write_selected_parameter(target).await;
    }

    pub(crate) async fn reset_active_property_value(&mut self, ring_index: usize) {
        match self.focus.active_property {
            ActiveProperty::Volume => {
                self.set_volume(ring_index, self.config.volume_reset).await
            }
            ActiveProperty::Panning => self.set_panning(ring_index, 0.0).await,
            ActiveProperty::Send(send_index) => {
                self.set_send(ring_index, send_index, 0.0).await
            }
            ActiveProperty::SelectedParameter => self.reset_selected_parameter().await,
        }
    }

    pub(crate) async fn reset_selected_parameter(&mut self) {
        if self.focus.param.is_none() {
            return;
        }
        self.write_selected_parameter(self.focus.param_default).await;
    }

    /// One-shot cold-boot snapshot: ring, selection, clip, parameter,
    /// transport.
    pub(crate) fn request_full_state(&self) {
        debug!("full state requested");
        self.send_full_sync();
        self.emit_selected();
        self.emit_playing_clip();
        self.emit_parameter();
        self.emit_transport();
    }
}
