mod factory;

pub use factory::{WebSocketFactory, WsStream, http_to_ws_endpoint};
