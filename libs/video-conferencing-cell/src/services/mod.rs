// libs/video-conferencing-cell/src/services/mod.rs

pub mod bridge;
pub mod controller;
pub mod provider;

pub use bridge::MediaBridge;
pub use controller::MediaSessionController;
pub use provider::{CallObject, MediaProvider};
