pub mod center;
pub mod dispatcher;
pub mod resolution;
pub mod store;
pub mod ticker;

pub use center::{toast_for, NotificationCenter};
pub use dispatcher::RequestEventDispatcher;
pub use resolution::OfferResolutionService;
pub use store::RequestNotificationStore;
pub use ticker::spawn_expiry_ticker;
