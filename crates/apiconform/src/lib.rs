//! apiconform: assert captured HTTP exchanges conform to an OpenAPI schema
//!
//! Wire a test suite's HTTP transport into an [`ApiValidator`], point it at
//! an OpenAPI 3.x or Swagger 2.0 document, and assert that the most recent
//! request/response pair matches what the document declares. Structural
//! validation is delegated to the `jsonschema` crate; this crate supplies the
//! operation lookup, body decoding, and assertion plumbing around it.

pub mod adapter;
pub mod decode;
pub mod recorder;
pub mod schema;
pub mod transport;
pub mod validator;

pub use adapter::{AdapterError, ApiValidator};
pub use apiconform_core::{Config, ConfigError, TransportKind, Violation, ViolationSet};
pub use recorder::{RecordingClient, TransportError};
pub use schema::{OperationDefinition, Schema, SchemaError};
pub use transport::Transport;
pub use validator::MessageValidator;
