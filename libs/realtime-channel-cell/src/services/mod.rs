// libs/realtime-channel-cell/src/services/mod.rs

pub mod channel;
pub mod client;
pub mod stream;

pub use channel::RealtimeChannel;
pub use client::RealtimeChannelClient;
pub use stream::EventStream;
