//! ringproto - Boundary types for the ringside DAW bridge
//!
//! This crate defines the two contracts the core has with the outside world:
//!
//! - **Inbound**: a reactive RPC surface over the DAW, expressed as the
//!   [`RemoteObject`] trait. Remote properties carry [`RemoteValue`]s, which
//!   can be scalars, lists, maps, or handles to further remote objects.
//!   Property listeners are registered through the trait and torn down via
//!   [`ListenerHandle`]s.
//! - **Outbound**: the [`SurfaceEvent`] taxonomy pushed toward the hardware
//!   surface through a [`SurfaceSink`]. Events serialize as tagged JSON
//!   records; the serializer on the far side of the sink is not our concern.
//!
//! ringproto is deliberately transport-agnostic: the DAW-side RPC library and
//! the surface-side message pipe are collaborators that implement these
//! traits. The `ringside` crate holds the engine that connects the two.

pub mod color;
pub mod domain;
pub mod events;
pub mod rpc;
pub mod value;

pub use color::Color;
pub use domain::TrackId;
pub use events::{SurfaceEvent, SurfaceSink};
pub use rpc::{ListenerCallback, ListenerHandle, RemoteObject};
pub use value::{ObjectRef, RemoteValue};
