//! Backend records and round-robin selection.

mod pool;
mod record;

pub use pool::BackendPool;
pub use record::Backend;
