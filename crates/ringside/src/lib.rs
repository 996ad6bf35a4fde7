//! ringside - the session-ring bridge core
//!
//! A long-lived bridge between a DAW and an external hardware surface. The
//! core watches a sliding rectangular window (the "ring") over the DAW's
//! visible track list, mirrors every resident track's state to the surface
//! in near-real-time, and routes surface intents (toggles, faders, encoder
//! deltas, navigation) back into the DAW. Alongside the ring it mirrors the
//! selected track, that track's playing clip, the last-touched device
//! parameter, and global transport state.
//!
//! ## Architecture
//!
//! All mutable state lives in a single worker task; the public
//! [`RingManager`] handle enqueues commands over an unbounded channel and
//! returns immediately (commands are fire-and-forget, like every control
//! surface message). DAW property listeners feed the same channel, so cache
//! mutation is single-worker by construction:
//!
//! ```text
//! surface dispatch ──► RingManager ──┐
//!                                    ├──► command channel ──► worker ──► SurfaceSink
//! DAW listeners ─────────────────────┘        (owns all state)
//! ```
//!
//! Writes to the DAW never update the cache speculatively; the confirming
//! listener notification is the sole source of cache truth. That is how the
//! surface and the DAW's own GUI converge without echo suppression.
//!
//! ## Usage
//!
//! ```ignore
//! let session = DawSession { song, view };              // RPC handles
//! let manager = RingManager::spawn(session, sink, RingConfig::default());
//! manager.init();
//! manager.setup_ring(8, 8, 0, 0);
//! // ... dispatch surface commands onto manager ...
//! manager.destroy().await;
//! ```

pub mod active;
pub mod config;
pub mod manager;
pub mod subs;

mod emitter;
mod focus;
mod ring;
mod track;
mod worker;

pub use active::{ActiveProperty, RingDirection, SceneDirection};
pub use config::RingConfig;
pub use manager::{DawSession, RingManager};
pub use subs::SubscriptionGroup;
pub use track::TrackState;
