// libs/video-conferencing-cell/src/lib.rs
//! # Video Conferencing Cell
//!
//! Owns the audio/video call of a consultation. The media transport itself is
//! an external provider; this cell drives it through a call object and keeps
//! the observable state in one place.
//!
//! ```text
//! +-----------------------------------------------------+
//! |                   Video Cell                        |
//! +-----------------------------------------------------+
//! |  models.rs        |  Rooms, provider protocol, state|
//! |  error.rs         |  MediaError                     |
//! |  services/        |                                 |
//! |    provider.rs    |  MediaProvider / CallObject     |
//! |    controller.rs  |  MediaSessionController         |
//! |    bridge.rs      |  Provider bridged to the UI     |
//! |  handlers.rs      |  HTTP handlers                  |
//! |  router.rs        |  Route definitions              |
//! |  testing.rs       |  In-memory provider             |
//! +-----------------------------------------------------+
//! ```
//!
//! ## API Endpoints
//!
//! - `GET /state` - Current media state
//! - `POST /mic`, `POST /camera`, `POST /screen-share` - Device toggles
//! - `POST /error/clear` - Dismiss the last media error
//! - `GET /commands` - Command stream for the attached media client (SSE)
//! - `POST /events` - Provider events reported by the media client
//!
//! Device flags are never set optimistically. A toggle only issues the
//! command; the flags follow once the provider reports the change.

pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod testing;

pub use error::MediaError;
pub use models::*;
pub use router::{media_routes, MediaCellState};
pub use services::{CallObject, MediaBridge, MediaProvider, MediaSessionController};
