//! The window diff engine.
//!
//! `sync_ring_listeners` is the central operation: given the visible-track
//! snapshot and the current window, it tears down listeners for tracks that
//! left, rebuilds the id→index map, builds entries for tracks that entered
//! (sequentially, to bound RPC pressure on the DAW), and finishes with a
//! full sync. Teardown completes before any build starts, and the index map
//! is published before any new listener registers, so the first callback
//! after subscription already resolves to a correct index.

use std::collections::HashSet;

use ringproto::{ObjectRef, RemoteValue, TrackId};
use tracing::{debug, info, warn};

use crate::active::{RingDirection, SceneDirection};
use crate::worker::RingWorker;

/// Window geometry over the session view.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct RingState {
    pub width: usize,
    /// Scene rows the surface shows; opaque to the ring logic itself.
    pub scenes: usize,
    pub track_offset: usize,
    pub scene_offset: usize,
}

impl RingWorker {
    pub(crate) fn max_track_offset(&self) -> usize {
        self.tracks.len().saturating_sub(self.ring.width)
    }

    pub(crate) fn max_scene_offset(&self) -> usize {
        self.scene_count.saturating_sub(self.ring.scenes)
    }

    pub(crate) async fn sync_ring_listeners(&mut self) {
        let start = self.ring.track_offset.min(self.tracks.len());
        let end = (self.ring.track_offset + self.ring.width).min(self.tracks.len());
        let window: Vec<ObjectRef> = self.tracks[start..end].to_vec();
        let new_ids: Vec<TrackId> = window.iter().map(|t| TrackId::from(t.id())).collect();
        let new_set: HashSet<TrackId> = new_ids.iter().cloned().collect();

        let removed: Vec<TrackId> = self
            .current_ring_ids
            .iter()
            .filter(|id| !new_set.contains(id))
            .cloned()
            .collect();
        for id in &removed {
            self.ring_subs
                .remove_by_prefix(&format!("track:{}:", id))
                .await;
            self.ring_index.remove(id);
            self.entries.remove(id);
        }

        self.ring_index.clear();
        for (position, id) in new_ids.iter().enumerate() {
            self.ring_index.insert(id.clone(), position);
        }

        let mut entered = 0usize;
        for track in window {
            let id = TrackId::from(track.id());
            if !self.entries.contains_key(&id) {
                self.build_track_entry(track).await;
                entered += 1;
            }
        }

        debug!(
            "ring diff: {} left, {} entered, {} resident at offset {}",
            removed.len(),
            entered,
            new_ids.len(),
            self.ring.track_offset
        );
        self.current_ring_ids = new_ids;
        self.send_full_sync();
    }

    pub(crate) async fn setup_ring(
        &mut self,
        width: usize,
        scenes: usize,
        track_offset: usize,
        scene_offset: usize,
    ) {
        info!(
            "setting up ring {}x{} at ({}, {})",
            width, scenes, track_offset, scene_offset
        );
        self.ring.width = width;
        self.ring.scenes = scenes;
        self.ring.track_offset = track_offset.min(self.max_track_offset());
        self.ring.scene_offset = scene_offset.min(self.max_scene_offset());

        if let Err(e) = self
            .song
            .call(
                "setup_session_box",
                vec![
                    RemoteValue::Int(width as i64),
                    RemoteValue::Int(scenes as i64),
                ],
            )
            .await
        {
            warn!("setup_session_box failed: {:#}", e);
        }
        self.push_session_offset().await;
        self.sync_ring_listeners().await;
    }

    pub(crate) async fn set_offset(&mut self, track_offset: usize, scene_offset: usize) {
        self.ring.track_offset = track_offset.min(self.max_track_offset());
        self.ring.scene_offset = scene_offset.min(self.max_scene_offset());
        self.push_session_offset().await;
        self.sync_ring_listeners().await;
    }

    /// Align the DAW's session box with our window so its push
    /// notifications stay scoped to what we mirror.
    pub(crate) async fn push_session_offset(&self) {
        if let Err(e) = self
            .song
            .call(
                "set_session_offset",
                vec![
                    RemoteValue::Int(self.ring.track_offset as i64),
                    RemoteValue::Int(self.ring.scene_offset as i64),
                ],
            )
            .await
        {
            warn!("set_session_offset failed: {:#}", e);
        }
    }

    pub(crate) async fn navigate_ring(&mut self, direction: RingDirection) {
        // Fold/unfold may have changed the visible list since we last saw it.
        self.refresh_tracks().await;

        let current = self.ring.track_offset as i64;
        let target = (current + direction.delta()).clamp(0, self.max_track_offset() as i64) as usize;
        if target == self.ring.track_offset {
            debug!("ring navigation at boundary, staying at {}", target);
            return;
        }
        self.set_offset(target, self.ring.scene_offset).await;

        // Keep the DAW's selection on the track now at ring index 0.
        if let Some(track) = self.tracks.get(self.ring.track_offset).cloned() {
            if let Err(e) = self
                .view
                .set("selected_track", RemoteValue::Object(track))
                .await
            {
                warn!("selecting navigated track failed: {:#}", e);
            }
        }
    }

    pub(crate) async fn navigate_scenes(&mut self, direction: SceneDirection) {
        let current = self.ring.scene_offset as i64;
        let target = (current + direction.delta()).clamp(0, self.max_scene_offset() as i64) as usize;
        if target == self.ring.scene_offset {
            debug!("scene navigation at boundary, staying at {}", target);
            return;
        }
        self.ring.scene_offset = target;
        self.push_session_offset().await;
    }
}
