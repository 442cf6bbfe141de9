//! HTTP forwarder bound to one backend.
//!
//! Every request goes over a fresh HTTP/1.1 connection to the backend. The
//! backend's status, headers and body are relayed back as-is, minus
//! hop-by-hop headers. Failures are logged and answered with a 503.

use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::body::Body;
use hyper::header::{HeaderMap, HeaderName, HeaderValue, CONNECTION, CONTENT_TYPE, HOST, TE};
use hyper::{Request, Response, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use std::error::Error as StdError;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, error, warn};

/// Response body type produced by the balancer.
pub type ProxyBody = BoxBody<Bytes, hyper::Error>;

/// Headers that only apply to a single connection and are never forwarded.
const HOP_BY_HOP_HEADERS: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Forwarding error.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("failed to connect to backend {0}: {1}")]
    Connect(String, std::io::Error),

    #[error("connection timeout to backend {0}")]
    ConnectTimeout(String),

    #[error("backend handshake failed: {0}")]
    Handshake(#[source] hyper::Error),

    #[error("backend request failed: {0}")]
    Send(#[source] hyper::Error),

    #[error("invalid request target: {0}")]
    InvalidUri(#[from] hyper::http::uri::InvalidUri),
}

/// Stateless forwarding handle for one backend address.
#[derive(Debug, Clone)]
pub struct Forwarder {
    /// `host:port` of the backend.
    address: String,
    /// Path prefix from the backend URL. Empty when the URL has none.
    base_path: String,
    /// Query from the backend URL, merged ahead of the request's own.
    base_query: String,
    /// Upper bound on establishing the backend connection.
    connect_timeout: Duration,
}

impl Forwarder {
    /// Create a forwarder for `address` (`host:port`).
    pub fn new(address: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            address: address.into(),
            base_path: String::new(),
            base_query: String::new(),
            connect_timeout,
        }
    }

    /// Prefix every forwarded path with the path of `url`, and merge in its
    /// query.
    pub fn with_base(mut self, url: &Uri) -> Self {
        self.base_path = match url.path() {
            "" | "/" => String::new(),
            path => path.to_string(),
        };
        self.base_query = url.query().unwrap_or_default().to_string();
        self
    }

    /// The backend address this forwarder sends to.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Forward a request and relay the backend's response.
    ///
    /// Never fails: any error reaching the backend is logged and turned into
    /// a `503 Service Unavailable`.
    pub async fn forward<B>(&self, req: Request<B>, client_addr: SocketAddr) -> Response<ProxyBody>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        match self.try_forward(req, client_addr).await {
            Ok(response) => response,
            Err(e) => {
                error!(
                    backend = %self.address,
                    client = %client_addr,
                    error = %e,
                    "forwarding to backend failed"
                );
                error_response(StatusCode::SERVICE_UNAVAILABLE, "backend request failed")
            }
        }
    }

    async fn try_forward<B>(
        &self,
        req: Request<B>,
        client_addr: SocketAddr,
    ) -> Result<Response<ProxyBody>, ForwardError>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        let req = self.rewrite_request(req, client_addr)?;

        let stream = self.connect().await?;
        let io = TokioIo::new(stream);

        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(ForwardError::Handshake)?;

        // Drive the connection until the response body is fully relayed.
        let backend = self.address.clone();
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                warn!(backend = %backend, error = %e, "backend connection error");
            }
        });

        let response = sender.send_request(req).await.map_err(ForwardError::Send)?;

        let (mut parts, body) = response.into_parts();
        remove_hop_headers(&mut parts.headers);

        debug!(
            backend = %self.address,
            status = parts.status.as_u16(),
            "backend responded"
        );

        Ok(Response::from_parts(parts, body.boxed()))
    }

    async fn connect(&self) -> Result<TcpStream, ForwardError> {
        match timeout(self.connect_timeout, TcpStream::connect(self.address.as_str())).await {
            Ok(Ok(stream)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    warn!(error = %e, "failed to set TCP_NODELAY on backend connection");
                }
                Ok(stream)
            }
            Ok(Err(e)) => Err(ForwardError::Connect(self.address.clone(), e)),
            Err(_) => Err(ForwardError::ConnectTimeout(self.address.clone())),
        }
    }

    /// Point the request at this backend.
    ///
    /// Only the target changes: method, path, query, end-to-end headers and
    /// body go through untouched.
    fn rewrite_request<B>(
        &self,
        req: Request<B>,
        client_addr: SocketAddr,
    ) -> Result<Request<B>, ForwardError> {
        let (mut parts, body) = req.into_parts();

        // Backends expect origin-form ("/path?query").
        parts.uri = self.target_uri(&parts.uri)?;

        let wants_trailers = accepts_trailers(&parts.headers);
        remove_hop_headers(&mut parts.headers);
        if wants_trailers {
            parts.headers.insert(TE, HeaderValue::from_static("trailers"));
        }
        append_forwarded_for(&mut parts.headers, client_addr);

        if !parts.headers.contains_key(HOST) {
            if let Ok(value) = HeaderValue::from_str(&self.address) {
                parts.headers.insert(HOST, value);
            }
        }

        Ok(Request::from_parts(parts, body))
    }

    /// Origin-form target for `uri` on this backend.
    fn target_uri(&self, uri: &Uri) -> Result<Uri, ForwardError> {
        let path = match uri.path() {
            "" => "/",
            path => path,
        };
        let path = if self.base_path.is_empty() {
            path.to_string()
        } else {
            join_paths(&self.base_path, path)
        };

        let query = match (self.base_query.as_str(), uri.query().unwrap_or_default()) {
            ("", query) | (query, "") => query.to_string(),
            (base, query) => format!("{}&{}", base, query),
        };

        let target = if query.is_empty() {
            path
        } else {
            format!("{}?{}", path, query)
        };
        Ok(target.parse::<Uri>()?)
    }
}

/// Join two paths with exactly one slash between them.
fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{}/{}", base, path),
        _ => format!("{}{}", base, path),
    }
}

/// Whether the client's `TE` header lists `trailers`.
fn accepts_trailers(headers: &HeaderMap) -> bool {
    headers
        .get_all(TE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|token| {
            token
                .split(';')
                .next()
                .is_some_and(|name| name.trim().eq_ignore_ascii_case("trailers"))
        })
}

/// Strip hop-by-hop headers, including any named by `Connection`.
fn remove_hop_headers(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named {
        headers.remove(name);
    }

    for name in HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
}

/// Append the client IP to `X-Forwarded-For`.
fn append_forwarded_for(headers: &mut HeaderMap, client_addr: SocketAddr) {
    let client_ip = client_addr.ip().to_string();

    let prior: Vec<&str> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();

    let value = if prior.is_empty() {
        client_ip
    } else {
        format!("{}, {}", prior.join(", "), client_ip)
    };

    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

/// Create a plain-text error response.
pub fn error_response(status: StatusCode, message: &str) -> Response<ProxyBody> {
    let body = Full::new(Bytes::from(format!("{}: {}\n", status, message)))
        .map_err(|never| match never {})
        .boxed();

    let mut response = Response::new(body);
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
