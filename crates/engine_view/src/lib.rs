//! # engine_view
//!
//! Server-side view replication on top of [`engine_ecs`] and [`engine_net`].
//!
//! - [`ClientOpEmitter`] turns world changes into per-client ops, asking an
//!   [`EmitterAdapter`] who should receive them.
//! - [`ViewState`] records each client's interest, authority and
//!   activations.
//! - [`ServerController`] delegates authority and drives per-client
//!   activation.
//! - [`ViewSynchronizer`] ties the world, the emitter and the connection
//!   manager together.
//! - [`Replica`] is the client-side counterpart.

pub mod controller;
pub mod emitter;
pub mod error;
pub mod replica;
pub mod state;
pub mod synchronizer;

pub use controller::ServerController;
pub use emitter::{ClientOpEmitter, EmitterAdapter, OutgoingOp};
pub use error::ReplicaError;
pub use replica::{LOCAL_CLIENT, Replica};
pub use state::{ClientRecords, ViewState};
pub use synchronizer::{ViewCallbacks, ViewSynchronizer};
