//! Message validation against operation definitions
//!
//! Pure logic, no I/O. Every check either records violations or explicitly
//! passes through when the schema declares nothing to compare against.

use http::{Request, Response, header};

use apiconform_core::{Violation, ViolationSet, normalize_path, strip_media_type_params};
use serde_json::Value;

use crate::decode;
use crate::schema::{OperationDefinition, ParamLocation};

/// Validates wire-format messages against operation definitions.
///
/// Stateless; one instance serves every assertion in a test run.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageValidator;

impl MessageValidator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Validate a request's path/query/header parameters and body against
    /// the operation it resolved to.
    #[must_use]
    pub fn validate_request(
        &self,
        request: &Request<Vec<u8>>,
        op: &OperationDefinition,
    ) -> ViolationSet {
        let mut violations = ViolationSet::new();
        check_path_params(request, op, &mut violations);
        check_query_params(request, op, &mut violations);
        check_header_params(request, op, &mut violations);
        check_request_body(request, op, &mut violations);
        violations
    }

    /// Validate a response's status, content type and body against the
    /// operation its request resolved to.
    #[must_use]
    pub fn validate_response(
        &self,
        response: &Response<Vec<u8>>,
        op: &OperationDefinition,
    ) -> ViolationSet {
        let mut violations = ViolationSet::new();
        let status = response.status().as_u16();

        if !op.statuses.is_empty() && !op.statuses.contains(&status) {
            let mut declared = op.statuses.clone();
            declared.sort_unstable();
            violations.add("status", format!("{status} not declared (declared: {declared:?})"));
        }

        let Some(def) = op.responses.get(&status) else {
            return violations;
        };
        if def.content.is_empty() {
            // Nothing declared for this status, body passes through
            return violations;
        }

        match header_str(response.headers(), &header::CONTENT_TYPE) {
            None => {
                violations.add(
                    "header/content-type",
                    format!(
                        "missing Content-Type header, expected one of {:?}",
                        sorted_keys(&def.content)
                    ),
                );
            }
            Some(raw) => {
                let media = strip_media_type_params(raw).to_string();
                match def.content.get(&media) {
                    None => violations.add(
                        "header/content-type",
                        format!(
                            "got \"{media}\", expected one of {:?}",
                            sorted_keys(&def.content)
                        ),
                    ),
                    Some(Some(schema)) if !response.body().is_empty() => {
                        check_decoded_body(schema, &media, response.body(), &mut violations);
                    }
                    // Declared without a schema, or empty body: nothing to compare
                    Some(_) => {}
                }
            }
        }

        violations
    }
}

fn check_path_params(
    request: &Request<Vec<u8>>,
    op: &OperationDefinition,
    violations: &mut ViolationSet,
) {
    let path = normalize_path(request.uri().path());
    let values = op.path_param_values(&path);
    for param in op.parameters.iter().filter(|p| p.location == ParamLocation::Path) {
        if let Some(value) = values.get(&param.name) {
            validate_scalar(
                &param.schema,
                value,
                &format!("path/{}", param.name),
                violations,
            );
        }
    }
}

fn check_query_params(
    request: &Request<Vec<u8>>,
    op: &OperationDefinition,
    violations: &mut ViolationSet,
) {
    let pairs = query_pairs(request.uri().query().unwrap_or(""));
    for param in op.parameters.iter().filter(|p| p.location == ParamLocation::Query) {
        let occurrences: Vec<&str> = pairs
            .iter()
            .filter(|(name, _)| name == &param.name)
            .map(|(_, value)| value.as_str())
            .collect();
        if occurrences.is_empty() {
            if param.required {
                violations.add(
                    format!("query/{}", param.name),
                    "required parameter missing",
                );
            }
            continue;
        }
        for value in occurrences {
            validate_scalar(
                &param.schema,
                value,
                &format!("query/{}", param.name),
                violations,
            );
        }
    }
}

fn check_header_params(
    request: &Request<Vec<u8>>,
    op: &OperationDefinition,
    violations: &mut ViolationSet,
) {
    for param in op.parameters.iter().filter(|p| p.location == ParamLocation::Header) {
        let values: Vec<&str> = request
            .headers()
            .get_all(param.name.as_str())
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        if values.is_empty() {
            if param.required {
                violations.add(
                    format!("header/{}", param.name.to_ascii_lowercase()),
                    "required header missing",
                );
            }
            continue;
        }
        for value in values {
            validate_scalar(
                &param.schema,
                value,
                &format!("header/{}", param.name.to_ascii_lowercase()),
                violations,
            );
        }
    }
}

fn check_request_body(
    request: &Request<Vec<u8>>,
    op: &OperationDefinition,
    violations: &mut ViolationSet,
) {
    // A body the operation never declared passes through
    let Some(def) = &op.request_body else {
        return;
    };

    if request.body().is_empty() {
        if def.required {
            violations.add("body", "required request body missing");
        }
        return;
    }

    match header_str(request.headers(), &header::CONTENT_TYPE) {
        None => {
            if !def.content.is_empty() {
                violations.add(
                    "header/content-type",
                    format!(
                        "missing Content-Type header, expected one of {:?}",
                        sorted_keys(&def.content)
                    ),
                );
            }
        }
        Some(raw) => {
            let media = strip_media_type_params(raw).to_string();
            match def.content.get(&media) {
                None if !def.content.is_empty() => violations.add(
                    "header/content-type",
                    format!(
                        "got \"{media}\", expected one of {:?}",
                        sorted_keys(&def.content)
                    ),
                ),
                Some(Some(schema)) => {
                    check_decoded_body(schema, &media, request.body(), violations);
                }
                // Media type declared without a schema, or nothing declared
                _ => {}
            }
        }
    }
}

/// Decode the body per media type and validate it structurally.
fn check_decoded_body(schema: &Value, media: &str, body: &[u8], violations: &mut ViolationSet) {
    match decode::decode_body(media, body) {
        Ok(value) => {
            let Ok(validator) = jsonschema::validator_for(schema) else {
                return;
            };
            for error in validator.iter_errors(&value) {
                violations.push(Violation::new(
                    error.instance_path().to_string(),
                    error.to_string(),
                ));
            }
        }
        Err(e) => {
            violations.add("body", e.to_string());
        }
    }
}

/// Validate a scalar parameter value. Wire values are strings; a value
/// that parses as a number/boolean is accepted for either reading.
fn validate_scalar(schema: &Value, raw: &str, pointer: &str, violations: &mut ViolationSet) {
    let Ok(validator) = jsonschema::validator_for(schema) else {
        return;
    };
    let coerced = decode::coerce_scalar(raw);
    if validator.is_valid(&coerced) {
        return;
    }
    let as_string = Value::String(raw.to_string());
    if !matches!(coerced, Value::String(_)) && validator.is_valid(&as_string) {
        return;
    }
    for error in validator.iter_errors(&coerced) {
        violations.add(pointer, error.to_string());
    }
}

fn header_str<'a>(headers: &'a http::HeaderMap, name: &header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn sorted_keys(content: &std::collections::HashMap<String, Option<Value>>) -> Vec<&str> {
    let mut keys: Vec<&str> = content.keys().map(String::as_str).collect();
    keys.sort_unstable();
    keys
}

fn query_pairs(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((name, value)) => (name.to_string(), value.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}
