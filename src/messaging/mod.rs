// Messaging module - Event handling, wire formats and message routing
pub mod event;
pub mod router;
pub mod serializer;

pub use event::{ChannelEvent, SystemEvent};
pub(crate) use router::MessageRouter;
pub use serializer::{ArraySerializer, JsonSerializer, Serializer};
