//! Inbound HTTP handling.
//!
//! The listener accepts client connections; the dispatcher picks a backend
//! for each request and forwards it.

mod dispatcher;
mod listener;

pub use dispatcher::Dispatcher;
pub use listener::FrontendListener;
