// libs/realtime-channel-cell/src/lib.rs
//! # Realtime Channel Cell
//!
//! One persistent, session-scoped WebSocket connection to the consultation
//! coordination server.
//!
//! ```text
//! +-----------------------------------------------------+
//! |                 Realtime Channel                    |
//! +-----------------------------------------------------+
//! |  models.rs      |  Inbound/outbound event union     |
//! |  error.rs       |  ChannelError                     |
//! |  services/      |                                   |
//! |    channel.rs   |  RealtimeChannel seam             |
//! |    client.rs    |  WebSocket client, acks, backoff  |
//! |    stream.rs    |  Ordered fan-out, ack barrier     |
//! |  testing.rs     |  Scripted channel for other cells |
//! +-----------------------------------------------------+
//! ```
//!
//! Subscriptions live on the client, not on the socket, so they survive
//! reconnects and callers register exactly once. An acknowledgment is only
//! handed back after the events that arrived ahead of it were handled, so a
//! cancellation that beat an ack on the wire also beats it in the store.

pub mod error;
pub mod models;
pub mod services;
pub mod testing;

pub use error::ChannelError;
pub use models::*;
pub use services::{EventStream, RealtimeChannel, RealtimeChannelClient};
