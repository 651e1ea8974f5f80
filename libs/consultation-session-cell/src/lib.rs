// libs/consultation-session-cell/src/lib.rs
//! # Consultation Session Cell
//!
//! Sequences a consultation from the accepted offer to its close:
//! fetch the record, re-check access, join the media session, edit clinical
//! notes during the call, then exit or end.
//!
//! ```text
//! +-----------------------------------------------------+
//! |               Consultation Session                  |
//! +-----------------------------------------------------+
//! |  models.rs          |  Consultation, notes, views   |
//! |  error.rs           |  SessionError                 |
//! |  services/          |                               |
//! |    resources.rs     |  Consultation/appointment REST|
//! |    lifecycle.rs     |  Status transitions           |
//! |    orchestrator.rs  |  Session sequencing + events  |
//! |  handlers.rs        |  HTTP handlers                |
//! |  router.rs          |  Route definitions            |
//! +-----------------------------------------------------+
//! ```
//!
//! ## Exit vs. End
//!
//! Exit only leaves the call and keeps the record open. End saves edited
//! notes, tells the patient over the realtime channel and then leaves the
//! call; only the notes save can fail it in the user's eyes.

pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use error::SessionError;
pub use models::*;
pub use router::{consultation_session_routes, SessionCellState};
pub use services::*;
