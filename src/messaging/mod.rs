// Messaging module - Event handling, envelope decoding and message routing
pub mod envelope;
pub mod event;
pub mod router;

pub use envelope::Envelope;
pub use event::{ChannelEvent, CloseInfo, describe_close_code};
pub use router::MessageRouter;
