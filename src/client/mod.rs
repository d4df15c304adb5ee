// Module declarations
mod builder;
mod connection;
mod core;
mod guard;
mod state;

// Public API exports
pub use builder::{ChannelCallbacks, ChannelOptions, RealtimeClientBuilder};
pub use connection::{ConnectionManager, ConnectionState, ConnectionStatus};
pub use self::core::RealtimeClient;
pub use guard::ChannelGuard;
pub use state::ClientState;
