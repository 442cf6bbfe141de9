//! Per-request dispatch.

use crate::backend::BackendPool;
use crate::proxy::{error_response, ProxyBody};
use hyper::body::Body;
use hyper::{Request, Response, StatusCode};
use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Routes each request to the next live backend.
///
/// Holds no state of its own beyond a handle to the pool.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    pool: Arc<BackendPool>,
}

impl Dispatcher {
    /// Create a dispatcher over `pool`.
    pub fn new(pool: Arc<BackendPool>) -> Self {
        Self { pool }
    }

    /// The pool requests are dispatched to.
    pub fn pool(&self) -> &Arc<BackendPool> {
        &self.pool
    }

    /// Forward `req` to the next live backend.
    ///
    /// Answers `503 Service Unavailable` when no backend is alive.
    /// Forwarding failures are turned into a 503 by the backend's forwarder.
    #[instrument(skip_all, fields(
        request_id = %Uuid::new_v4(),
        method = %req.method(),
        uri = %req.uri(),
        client = %client_addr
    ))]
    pub async fn dispatch<B>(&self, req: Request<B>, client_addr: SocketAddr) -> Response<ProxyBody>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        let Some(backend) = self.pool.next_backend() else {
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "no live backend available");
        };

        let response = backend.forwarder().forward(req, client_addr).await;

        debug!(
            backend = %backend,
            status = response.status().as_u16(),
            "request completed"
        );

        response
    }
}
