//! Reverse-proxy forwarding to a single backend.

mod forwarder;

pub use forwarder::{error_response, ForwardError, Forwarder, ProxyBody};
