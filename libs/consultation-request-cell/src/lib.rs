// libs/consultation-request-cell/src/lib.rs
//! # Consultation Request Cell
//!
//! Inbound instant-consultation offers for the signed-in doctor: buffering
//! with a countdown, expiry, and the accept/reject exchange with the
//! coordination server.
//!
//! ```text
//! +-----------------------------------------------------+
//! |               Consultation Requests                 |
//! +-----------------------------------------------------+
//! |  models.rs        |  Offers, notifications, signals |
//! |  error.rs         |  OfferError                     |
//! |  services/        |                                 |
//! |    store.rs       |  Pure notification store        |
//! |    center.rs      |  Shared store + signals         |
//! |    resolution.rs  |  respond(requestId, accept)     |
//! |    dispatcher.rs  |  Realtime events -> store       |
//! |    ticker.rs      |  Fixed-cadence expiry           |
//! |  handlers.rs      |  HTTP handlers                  |
//! |  router.rs        |  Route definitions              |
//! +-----------------------------------------------------+
//! ```
//!
//! Local state is provisional. Only the server acknowledgment decides who won
//! an accept race.

pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use error::OfferError;
pub use models::*;
pub use services::*;
pub use router::{consultation_request_routes, RequestCellState};
