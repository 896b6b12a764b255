//! Transport seam: where captured exchanges come from
//!
//! The adapter never talks to the network itself; it reads the most recent
//! exchange off whatever transport the test harness wired in. Whether that
//! transport is a real HTTP client or an in-process functional one is stated
//! explicitly at construction via [`TransportKind`], not inferred at runtime.

use http::{Request, Response};

pub use apiconform_core::TransportKind;

/// Source of the most recent request/response exchange.
///
/// Implementations rebuild wire-format messages fresh on every call;
/// captured messages are never cached across assertions.
pub trait Transport {
    /// The most recent request sent, if an exchange completed.
    fn last_request(&self) -> Option<Request<Vec<u8>>>;

    /// The most recent response received, if an exchange completed.
    fn last_response(&self) -> Option<Response<Vec<u8>>>;

    /// Discard captured exchange state (start of a new test case).
    fn reset(&mut self);
}
