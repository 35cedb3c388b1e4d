// Messaging module - Event names and incoming frame routing
pub mod event;
pub mod router;

pub use event::RealtimeEvent;
pub use router::EventRouter;
