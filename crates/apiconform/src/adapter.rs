//! The conformance assertion adapter
//!
//! Owns the loaded schema and the transport handle, both injected
//! explicitly. Assertions rebuild the captured exchange, resolve the schema
//! operation, delegate to [`MessageValidator`] and fail the test on
//! violations. All validation state lives on the instance; nothing survives
//! a call except the loaded schema.

use std::path::Path;

use http::{Request, Response, header};

use apiconform_core::{Config, TransportKind, ViolationSet, normalize_path, strip_media_type_params};

use crate::schema::{OperationDefinition, Schema, SchemaError};
use crate::transport::Transport;
use crate::validator::MessageValidator;

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("No schema loaded; configure one or call have_openapi_schema first")]
    SchemaNotLoaded,
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("No operation in the schema matches {method} {path}")]
    NoOperationMatch { method: String, path: String },
    #[error("No request/response exchange captured yet")]
    NoExchange,
}

/// Asserts captured HTTP exchanges conform to an OpenAPI/Swagger schema.
pub struct ApiValidator<T: Transport> {
    schema: Option<Schema>,
    validator: MessageValidator,
    transport: T,
    kind: TransportKind,
}

impl<T: Transport> ApiValidator<T> {
    #[must_use]
    pub fn new(transport: T, kind: TransportKind) -> Self {
        Self {
            schema: None,
            validator: MessageValidator::new(),
            transport,
            kind,
        }
    }

    /// Build from configuration, loading the configured schema when one is
    /// set.
    ///
    /// # Errors
    ///
    /// Returns error if the configured schema path is missing or invalid.
    pub fn from_config(config: &Config, transport: T) -> Result<Self, SchemaError> {
        let mut adapter = Self::new(transport, config.transport);
        if config.has_schema() {
            adapter.have_openapi_schema(&config.schema)?;
        }
        Ok(adapter)
    }

    /// Whether the transport is an in-process functional client.
    #[must_use]
    pub fn is_functional(&self) -> bool {
        self.kind == TransportKind::Functional
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable transport access, for driving the client between assertions.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Load (or replace) the active schema.
    ///
    /// # Errors
    ///
    /// `SchemaError::NotFound` when the path does not resolve to a file,
    /// `SchemaError::Parse` when it is not a valid schema document.
    pub fn have_openapi_schema(&mut self, path: impl AsRef<Path>) -> Result<(), SchemaError> {
        self.schema = Some(Schema::from_file(path.as_ref())?);
        Ok(())
    }

    /// Alias for Swagger 2.0 documents.
    ///
    /// # Errors
    ///
    /// Same as [`Self::have_openapi_schema`].
    pub fn have_swagger_schema(&mut self, path: impl AsRef<Path>) -> Result<(), SchemaError> {
        self.have_openapi_schema(path)
    }

    /// Discard captured exchange state between test cases. The loaded
    /// schema is kept.
    pub fn reset(&mut self) {
        self.transport.reset();
    }

    /// Rebuild the last request sent over the transport.
    ///
    /// # Errors
    ///
    /// `AdapterError::NoExchange` before the first exchange.
    pub fn http_request(&self) -> Result<Request<Vec<u8>>, AdapterError> {
        self.transport.last_request().ok_or(AdapterError::NoExchange)
    }

    /// Rebuild the last response received over the transport.
    ///
    /// # Errors
    ///
    /// `AdapterError::NoExchange` before the first exchange.
    pub fn http_response(&self) -> Result<Response<Vec<u8>>, AdapterError> {
        self.transport.last_response().ok_or(AdapterError::NoExchange)
    }

    /// Validate a request against the loaded schema.
    ///
    /// Returns the violation set for inspection; non-empty sets are also
    /// reported at debug level.
    ///
    /// # Errors
    ///
    /// `SchemaNotLoaded` before a schema is loaded, `NoOperationMatch` when
    /// no operation covers (method, path) — never a silent pass.
    pub fn validate_request_against_schema(
        &self,
        request: &Request<Vec<u8>>,
    ) -> Result<ViolationSet, AdapterError> {
        let op = self.operation_for(request)?;
        let violations = self.validator.validate_request(request, op);
        if !violations.is_empty() {
            tracing::debug!(operation = %op.label(), "request violations: {violations}");
        }
        Ok(violations)
    }

    /// Validate a response against the loaded schema; the request resolves
    /// the operation. The response's `Content-Type` parameters are stripped
    /// before validation, schemas declare bare media types.
    ///
    /// # Errors
    ///
    /// Same as [`Self::validate_request_against_schema`].
    pub fn validate_response_against_schema(
        &self,
        request: &Request<Vec<u8>>,
        response: &Response<Vec<u8>>,
    ) -> Result<ViolationSet, AdapterError> {
        let op = self.operation_for(request)?;
        let response = rewrite_content_type(response);
        let violations = self.validator.validate_response(&response, op);
        if !violations.is_empty() {
            tracing::debug!(operation = %op.label(), "response violations: {violations}");
        }
        Ok(violations)
    }

    /// Assert the last captured request conforms to the schema.
    ///
    /// # Panics
    ///
    /// On violations, and on usage errors (no schema loaded, no exchange
    /// captured, no matching operation) with a distinct message.
    pub fn see_request_is_valid(&self) {
        let request = unwrap_usage(self.http_request());
        let violations = unwrap_usage(self.validate_request_against_schema(&request));
        if !violations.is_empty() {
            panic!("request does not conform to schema\n{violations}");
        }
    }

    /// Assert the last captured response conforms to the schema.
    ///
    /// # Panics
    ///
    /// On violations and on usage errors, as for
    /// [`Self::see_request_is_valid`].
    pub fn see_response_is_valid(&self) {
        let request = unwrap_usage(self.http_request());
        let response = unwrap_usage(self.http_response());
        let violations = unwrap_usage(self.validate_response_against_schema(&request, &response));
        if !violations.is_empty() {
            panic!("response does not conform to schema\n{violations}");
        }
    }

    /// Assert both directions; the request is checked first.
    ///
    /// # Panics
    ///
    /// On the first direction that fails.
    pub fn see_request_and_response_are_valid(&self) {
        self.see_request_is_valid();
        self.see_response_is_valid();
    }

    fn operation_for(
        &self,
        request: &Request<Vec<u8>>,
    ) -> Result<&OperationDefinition, AdapterError> {
        let schema = self.schema.as_ref().ok_or(AdapterError::SchemaNotLoaded)?;
        // Query string, scheme and host play no part in operation lookup
        let path = normalize_path(request.uri().path());
        let method = request.method().as_str();
        schema
            .find_operation(method, &path)
            .ok_or_else(|| AdapterError::NoOperationMatch {
                method: method.to_string(),
                path,
            })
    }
}

/// Copy headers, dropping `Content-Type` parameters so media-type-keyed
/// lookups hit the schema's bare declarations. A response without the
/// header is passed through untouched.
fn rewrite_content_type(response: &Response<Vec<u8>>) -> Response<Vec<u8>> {
    let (mut parts, ()) = Response::new(()).into_parts();
    parts.status = response.status();
    parts.version = response.version();
    parts.headers = response.headers().clone();
    if let Some(value) = response.headers().get(header::CONTENT_TYPE) {
        if let Ok(text) = value.to_str() {
            if let Ok(stripped) = header::HeaderValue::from_str(strip_media_type_params(text)) {
                parts.headers.insert(header::CONTENT_TYPE, stripped);
            }
        }
    }
    Response::from_parts(parts, response.body().clone())
}

fn unwrap_usage<V>(result: Result<V, AdapterError>) -> V {
    match result {
        Ok(value) => value,
        Err(e) => panic!("schema assertion usage error: {e}"),
    }
}
