mod factory;
mod transport;

pub use factory::WebSocketTransport;
pub use transport::{Transport, TransportCommand, TransportEvent, TransportHandle};
