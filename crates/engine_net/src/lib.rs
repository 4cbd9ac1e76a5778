//! # engine_net
//!
//! Wire format and transport layer for view replication.
//!
//! This crate provides:
//!
//! - [`op`]: the [`ClientOp`] / [`ServerOp`] op stream and its binary codec.
//! - [`wire`]: little-endian primitives and field values.
//! - [`adapter`]: the [`NetworkAdapter`] transport seam.
//! - [`connection`]: [`ClientConnectionManager`], mapping transport handles to
//!   client ids.
//! - [`local`]: an in-memory transport.
//! - [`nats`]: a NATS transport.
//! - [`subjects`] and [`control`]: the NATS subject layout and its
//!   MessagePack control messages.
//! - [`error`]: network-layer error types.

pub mod adapter;
pub mod connection;
pub mod control;
pub mod error;
pub mod local;
pub mod nats;
pub mod op;
pub mod subjects;
pub mod wire;

pub use adapter::{ClientHandle, NetworkAdapter, NetworkEvent};
pub use connection::{ClientConnectionManager, ConnectionHandler};
pub use error::{CodecError, NetError};
pub use local::LocalNetwork;
pub use nats::NatsNetworkAdapter;
pub use op::{ClientOp, ServerOp};
