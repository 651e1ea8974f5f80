// libs/consultation-session-cell/src/services/mod.rs

pub mod lifecycle;
pub mod orchestrator;
pub mod resources;

pub use lifecycle::ConsultationLifecycle;
pub use orchestrator::{consultation_path, ConsultationSessionOrchestrator};
pub use resources::{AppointmentResource, ConsultationResource, RestAppointmentResource, RestConsultationResource};
