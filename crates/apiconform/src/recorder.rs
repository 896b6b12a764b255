//! Recording HTTP client
//!
//! Wraps a blocking `reqwest` client; each executed exchange replaces the
//! previously captured one, so the adapter always sees the latest pair.

use http::{HeaderMap, Method, Request, Response, StatusCode, Uri};

use crate::transport::Transport;

#[derive(Debug, thiserror::Error)]
#[error("Transport error: {0}")]
pub struct TransportError(pub String);

#[derive(Debug, Clone)]
struct StoredRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Vec<u8>,
}

#[derive(Debug, Clone)]
struct StoredResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

/// Blocking HTTP client that records its last exchange.
#[derive(Debug)]
pub struct RecordingClient {
    client: reqwest::blocking::Client,
    exchange: Option<(StoredRequest, StoredResponse)>,
}

impl RecordingClient {
    /// # Errors
    ///
    /// Returns error if the underlying client fails to build.
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| TransportError(e.to_string()))?;
        Ok(Self {
            client,
            exchange: None,
        })
    }

    /// Execute a request, record the exchange, and return the response.
    ///
    /// # Errors
    ///
    /// Returns error on connection failure or timeout. Transport errors do
    /// not replace the previously captured exchange.
    pub fn send(&mut self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, TransportError> {
        let (parts, body) = request.into_parts();

        let mut builder = self
            .client
            .request(parts.method.clone(), parts.uri.to_string())
            .headers(parts.headers.clone());
        if !body.is_empty() {
            builder = builder.body(body.clone());
        }

        let response = builder.send().map_err(|e| TransportError(e.to_string()))?;
        let status = response.status();
        // Capture headers before consuming the body
        let headers = response.headers().clone();
        let response_body = response
            .bytes()
            .map_err(|e| TransportError(e.to_string()))?
            .to_vec();

        let stored_response = StoredResponse {
            status,
            headers,
            body: response_body,
        };
        let rebuilt = rebuild_response(&stored_response);
        self.exchange = Some((
            StoredRequest {
                method: parts.method,
                uri: parts.uri,
                headers: parts.headers,
                body,
            },
            stored_response,
        ));
        Ok(rebuilt)
    }
}

impl Transport for RecordingClient {
    fn last_request(&self) -> Option<Request<Vec<u8>>> {
        self.exchange.as_ref().map(|(request, _)| rebuild_request(request))
    }

    fn last_response(&self) -> Option<Response<Vec<u8>>> {
        self.exchange.as_ref().map(|(_, response)| rebuild_response(response))
    }

    fn reset(&mut self) {
        self.exchange = None;
    }
}

fn rebuild_request(stored: &StoredRequest) -> Request<Vec<u8>> {
    let (mut parts, ()) = Request::new(()).into_parts();
    parts.method = stored.method.clone();
    parts.uri = stored.uri.clone();
    parts.headers = stored.headers.clone();
    Request::from_parts(parts, stored.body.clone())
}

fn rebuild_response(stored: &StoredResponse) -> Response<Vec<u8>> {
    let (mut parts, ()) = Response::new(()).into_parts();
    parts.status = stored.status;
    parts.headers = stored.headers.clone();
    Response::from_parts(parts, stored.body.clone())
}
