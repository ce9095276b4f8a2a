mod logger;
mod transport;

pub use logger::{TransportLogLevel, TransportLogger};
pub use transport::{DiscordTransport, DiscordTransportFactory};
