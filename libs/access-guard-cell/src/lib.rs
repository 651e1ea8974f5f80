// libs/access-guard-cell/src/lib.rs
//! # Access Guard Cell
//!
//! Navigation gate for the portal. A route is reachable only once every
//! applicable check (authentication, email verification, role, onboarding
//! status) has resolved; while a status lookup is pending the guard answers
//! `Loading` instead of letting protected content through.

pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use error::GuardError;
pub use models::*;
pub use router::{access_guard_routes, GuardCellState};
pub use services::{AccessGuard, AccessGuardService, OnboardingStatusSource, RestOnboardingStatusSource};
