//! Schema loading and operation lookup
//!
//! Parses an OpenAPI 3.x or Swagger 2.0 document with plain `serde_json`
//! walking into a flat operation index. `$ref`s are resolved up front so the
//! extracted schemas are self-contained and ready for `jsonschema`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use apiconform_core::normalize_path;

/// Where a declared parameter lives in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamLocation {
    Path,
    Query,
    Header,
}

/// A declared operation parameter.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub location: ParamLocation,
    pub schema: serde_json::Value,
    pub required: bool,
}

/// Expected request body: media type keyed, schemas resolved.
#[derive(Debug, Clone, Default)]
pub struct BodyDefinition {
    pub required: bool,
    /// media type -> JSON Schema (`None`: type declared without a schema)
    pub content: HashMap<String, Option<serde_json::Value>>,
}

/// Expected response shape for one declared status code.
#[derive(Debug, Clone, Default)]
pub struct ResponseDefinition {
    /// media type -> JSON Schema (`None`: type declared without a schema)
    pub content: HashMap<String, Option<serde_json::Value>>,
}

/// Schema fragment describing one (method, path template) operation.
#[derive(Debug, Clone)]
pub struct OperationDefinition {
    /// Uppercase HTTP method
    pub method: String,
    /// Path template with exactly one leading slash, e.g. `/users/{id}`
    pub path: String,
    pub parameters: Vec<Parameter>,
    pub request_body: Option<BodyDefinition>,
    /// Declared response statuses
    pub statuses: Vec<u16>,
    pub responses: HashMap<u16, ResponseDefinition>,
}

impl OperationDefinition {
    /// Operation label, e.g. "GET /users/{id}"
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    /// Extract path parameter values by aligning a concrete path against
    /// this operation's template. The path must have matched the template.
    #[must_use]
    pub fn path_param_values(&self, path: &str) -> HashMap<String, String> {
        let mut values = HashMap::new();
        for (template_seg, concrete_seg) in self.path.split('/').zip(path.split('/')) {
            if let Some(name) = template_param_name(template_seg) {
                values.insert(name.to_string(), concrete_seg.to_string());
            }
        }
        values
    }
}

/// Parsed, queryable OpenAPI/Swagger document.
///
/// Immutable after load; shared read-only across all assertions in a test.
#[derive(Debug, Clone)]
pub struct Schema {
    operations: Vec<OperationDefinition>,
}

impl Schema {
    /// Load and parse a schema document from a file.
    ///
    /// # Errors
    ///
    /// `SchemaError::NotFound` when the path does not resolve to a file,
    /// `SchemaError::Parse` when the content is not a valid document.
    pub fn from_file(path: &Path) -> Result<Self, SchemaError> {
        if !path.is_file() {
            return Err(SchemaError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| SchemaError::Parse(format!("{}: {e}", path.display())))?;
        let doc = parse_document(path, &content)?;
        Self::from_document(&doc)
    }

    /// Build the operation index from an already-parsed document.
    ///
    /// # Errors
    ///
    /// `SchemaError::Parse` when the document carries no `paths` object.
    pub fn from_document(doc: &serde_json::Value) -> Result<Self, SchemaError> {
        if doc.get("paths").and_then(|p| p.as_object()).is_none() {
            return Err(SchemaError::Parse(
                "document has no paths object, not an OpenAPI/Swagger schema".into(),
            ));
        }
        Ok(Self {
            operations: extract_operations(doc),
        })
    }

    #[must_use]
    pub fn operations(&self) -> &[OperationDefinition] {
        &self.operations
    }

    /// Look up the operation matching (method, path).
    ///
    /// The path is normalized to one leading slash; an exact literal path
    /// match wins over a `{param}` template match, so `/users/me` and
    /// `/users/{id}` coexist predictably.
    #[must_use]
    pub fn find_operation(&self, method: &str, path: &str) -> Option<&OperationDefinition> {
        let path = normalize_path(path);
        let method = method.to_ascii_uppercase();
        self.operations
            .iter()
            .find(|op| op.method == method && op.path == path)
            .or_else(|| {
                self.operations
                    .iter()
                    .find(|op| op.method == method && template_matches(&op.path, &path))
            })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Schema {0} not found")]
    NotFound(PathBuf),
    #[error("Schema parse error: {0}")]
    Parse(String),
}

/// Parse a schema document from JSON or YAML.
///
/// Detection strategy: try extension first (`.yaml`/`.yml`), then fall back
/// to content sniffing (leading `{` means JSON, otherwise YAML).
fn parse_document(path: &Path, content: &str) -> Result<serde_json::Value, SchemaError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "yaml" | "yml" => {
            serde_yml::from_str(content).map_err(|e| SchemaError::Parse(format!("Invalid YAML: {e}")))
        }
        "json" => {
            serde_json::from_str(content).map_err(|e| SchemaError::Parse(format!("Invalid JSON: {e}")))
        }
        _ => {
            if content.trim_start().starts_with('{') {
                serde_json::from_str(content)
                    .map_err(|e| SchemaError::Parse(format!("Invalid JSON: {e}")))
            } else {
                serde_yml::from_str(content)
                    .map_err(|e| SchemaError::Parse(format!("Invalid YAML: {e}")))
            }
        }
    }
}

/// `{param}` template segment name, if the segment is one.
fn template_param_name(segment: &str) -> Option<&str> {
    segment
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .filter(|name| !name.is_empty())
}

/// Segment-wise template match: literal segments must be equal, `{param}`
/// segments match any non-empty concrete segment.
fn template_matches(template: &str, path: &str) -> bool {
    let template_segs: Vec<&str> = template.split('/').collect();
    let path_segs: Vec<&str> = path.split('/').collect();
    template_segs.len() == path_segs.len()
        && template_segs.iter().zip(&path_segs).all(|(t, p)| {
            if template_param_name(t).is_some() {
                !p.is_empty()
            } else {
                t == p
            }
        })
}

fn extract_operations(doc: &serde_json::Value) -> Vec<OperationDefinition> {
    let mut ops = Vec::new();
    let swagger_v2 = doc.get("swagger").is_some();

    let paths = match doc.get("paths").and_then(|p| p.as_object()) {
        Some(p) => p,
        None => return ops,
    };

    for (path, path_item) in paths {
        for method in &["get", "post", "put", "delete", "patch"] {
            if let Some(operation) = path_item.get(*method) {
                let mut parameters = Vec::new();
                let mut body_param: Option<serde_json::Value> = None;

                // Collect parameters from path-level + operation-level
                for source in [path_item.get("parameters"), operation.get("parameters")]
                    .iter()
                    .flatten()
                {
                    if let Some(params) = source.as_array() {
                        for param in params {
                            let param = resolve_refs(param, doc);
                            if swagger_v2
                                && param.get("in").and_then(|v| v.as_str()) == Some("body")
                            {
                                body_param = Some(param);
                            } else if let Some(p) = parse_parameter(&param) {
                                parameters.push(p);
                            }
                        }
                    }
                }

                let request_body = if swagger_v2 {
                    extract_body_v2(doc, operation, body_param.as_ref())
                } else {
                    extract_body_v3(doc, operation)
                };

                let responses_obj = operation.get("responses").and_then(|r| r.as_object());

                let statuses: Vec<u16> = responses_obj
                    .map(|r| r.keys().filter_map(|k| k.parse().ok()).collect())
                    .unwrap_or_default();

                let mut responses: HashMap<u16, ResponseDefinition> = HashMap::new();
                if let Some(resp_map) = responses_obj {
                    for (status_str, resp_obj) in resp_map {
                        let Ok(status) = status_str.parse::<u16>() else {
                            continue;
                        };
                        let content = if swagger_v2 {
                            extract_response_content_v2(doc, operation, resp_obj)
                        } else {
                            extract_content_map(doc, resp_obj.get("content"))
                        };
                        responses.insert(status, ResponseDefinition { content });
                    }
                }

                ops.push(OperationDefinition {
                    method: method.to_uppercase(),
                    path: normalize_path(path),
                    parameters,
                    request_body,
                    statuses,
                    responses,
                });
            }
        }
    }

    ops
}

/// OpenAPI 3.x: `requestBody.content.<media>.schema`
fn extract_body_v3(
    doc: &serde_json::Value,
    operation: &serde_json::Value,
) -> Option<BodyDefinition> {
    let request_body = operation.get("requestBody")?;
    let request_body = resolve_refs(request_body, doc);
    let required = request_body
        .get("required")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let content = extract_content_map(doc, request_body.get("content"));
    Some(BodyDefinition { required, content })
}

/// Swagger 2.0: the `in: body` parameter's schema, media types from
/// `consumes` (operation-level first, then root, default JSON).
fn extract_body_v2(
    doc: &serde_json::Value,
    operation: &serde_json::Value,
    body_param: Option<&serde_json::Value>,
) -> Option<BodyDefinition> {
    let body_param = body_param?;
    let required = body_param
        .get("required")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let schema = body_param
        .get("schema")
        .map(|schema| resolve_refs(schema, doc));

    let mut content = HashMap::new();
    for media_type in media_types_v2(doc, operation, "consumes") {
        content.insert(media_type, schema.clone());
    }
    Some(BodyDefinition { required, content })
}

/// Swagger 2.0: `responses.<status>.schema`, media types from `produces`.
fn extract_response_content_v2(
    doc: &serde_json::Value,
    operation: &serde_json::Value,
    resp_obj: &serde_json::Value,
) -> HashMap<String, Option<serde_json::Value>> {
    let schema = resp_obj
        .get("schema")
        .map(|schema| resolve_refs(schema, doc));
    let mut content = HashMap::new();
    // A response without schema still declares its produced media types
    for media_type in media_types_v2(doc, operation, "produces") {
        content.insert(media_type, schema.clone());
    }
    content
}

fn media_types_v2(doc: &serde_json::Value, operation: &serde_json::Value, key: &str) -> Vec<String> {
    let declared = operation
        .get(key)
        .or_else(|| doc.get(key))
        .and_then(|v| v.as_array())
        .map(|list| {
            list.iter()
                .filter_map(|v| v.as_str())
                .map(String::from)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    if declared.is_empty() {
        vec!["application/json".to_string()]
    } else {
        declared
    }
}

/// OpenAPI 3.x content object: media type -> optional resolved schema.
fn extract_content_map(
    doc: &serde_json::Value,
    content: Option<&serde_json::Value>,
) -> HashMap<String, Option<serde_json::Value>> {
    let mut map = HashMap::new();
    if let Some(content) = content.and_then(|c| c.as_object()) {
        for (media_type, media_obj) in content {
            let schema = media_obj
                .get("schema")
                .map(|schema| resolve_refs(schema, doc));
            map.insert(media_type.clone(), schema);
        }
    }
    map
}

fn parse_parameter(param: &serde_json::Value) -> Option<Parameter> {
    let name = param.get("name")?.as_str()?.to_string();
    let location = match param.get("in")?.as_str()? {
        "path" => ParamLocation::Path,
        "query" => ParamLocation::Query,
        "header" => ParamLocation::Header,
        _ => return None,
    };
    // Swagger 2.0 puts schema keywords inline on the parameter object
    let schema = param.get("schema").cloned().unwrap_or_else(|| {
        let mut obj = param.as_object().cloned().unwrap_or_default();
        for key in ["name", "in", "required", "description", "collectionFormat"] {
            obj.remove(key);
        }
        serde_json::Value::Object(obj)
    });
    let required = param
        .get("required")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    Some(Parameter {
        name,
        location,
        schema,
        required,
    })
}

/// Recursively resolve `$ref` in a schema fragment against the document.
///
/// Produces a self-contained schema suitable for `jsonschema` validation.
/// Depth-limited to 20 to prevent infinite recursion on circular refs.
fn resolve_refs(schema: &serde_json::Value, doc: &serde_json::Value) -> serde_json::Value {
    resolve_refs_inner(schema, doc, 0)
}

fn resolve_refs_inner(
    schema: &serde_json::Value,
    doc: &serde_json::Value,
    depth: u32,
) -> serde_json::Value {
    if depth > 20 {
        return schema.clone();
    }
    match schema {
        serde_json::Value::Object(obj) => {
            if let Some(ref_str) = obj.get("$ref").and_then(|v| v.as_str()) {
                if let Some(resolved) = resolve_ref(ref_str, doc) {
                    return resolve_refs_inner(&resolved, doc, depth + 1);
                }
                return schema.clone();
            }
            let new_obj: serde_json::Map<String, serde_json::Value> = obj
                .iter()
                .map(|(k, v)| (k.clone(), resolve_refs_inner(v, doc, depth + 1)))
                .collect();
            serde_json::Value::Object(new_obj)
        }
        serde_json::Value::Array(arr) => serde_json::Value::Array(
            arr.iter()
                .map(|v| resolve_refs_inner(v, doc, depth + 1))
                .collect(),
        ),
        _ => schema.clone(),
    }
}

/// Resolve a local `#/...` reference (`#/components/schemas/X` in OpenAPI 3,
/// `#/definitions/X` in Swagger 2) by pointer walk.
fn resolve_ref(ref_str: &str, doc: &serde_json::Value) -> Option<serde_json::Value> {
    ref_str
        .strip_prefix('#')
        .and_then(|pointer| doc.pointer(pointer))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;

    fn users_doc() -> serde_json::Value {
        serde_json::json!({
            "openapi": "3.0.3",
            "info": {"title": "Users", "version": "1.0"},
            "paths": {
                "/users": {
                    "post": {
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "#/components/schemas/NewUser"}
                                }
                            }
                        },
                        "responses": {"201": {"content": {"application/json": {
                            "schema": {"$ref": "#/components/schemas/User"}
                        }}}}
                    }
                },
                "/users/{id}": {
                    "get": {
                        "parameters": [
                            {"name": "id", "in": "path", "required": true, "schema": {"type": "integer"}}
                        ],
                        "responses": {
                            "200": {"content": {"application/json": {
                                "schema": {"$ref": "#/components/schemas/User"}
                            }}},
                            "404": {"description": "missing"}
                        }
                    }
                },
                "/users/me": {
                    "get": {"responses": {"200": {"description": "OK"}}}
                }
            },
            "components": {"schemas": {
                "NewUser": {
                    "type": "object",
                    "properties": {"name": {"type": "string"}},
                    "required": ["name"]
                },
                "User": {
                    "type": "object",
                    "properties": {"id": {"type": "integer"}, "name": {"type": "string"}},
                    "required": ["id", "name"]
                }
            }}
        })
    }

    // ── extraction ──

    #[test]
    fn extract_operations_from_document() {
        let schema = Schema::from_document(&users_doc()).unwrap();
        assert_eq!(schema.operations().len(), 3);

        let create = schema.find_operation("POST", "/users").unwrap();
        let body = create.request_body.as_ref().unwrap();
        assert!(body.required);
        let user_schema = body.content["application/json"].as_ref().unwrap();
        // $ref resolved inline
        assert_eq!(user_schema["type"], "object");
        assert!(user_schema.get("$ref").is_none());
        assert_eq!(create.statuses, vec![201]);
    }

    #[test]
    fn extract_resolves_response_refs() {
        let schema = Schema::from_document(&users_doc()).unwrap();
        let get = schema.find_operation("GET", "/users/{id}").unwrap();
        let ok = &get.responses[&200];
        let user_schema = ok.content["application/json"].as_ref().unwrap();
        assert_eq!(user_schema["properties"]["id"]["type"], "integer");
        // 404 declares no content
        assert!(get.responses[&404].content.is_empty());
    }

    #[test]
    fn document_without_paths_is_parse_error() {
        let err = Schema::from_document(&serde_json::json!({"foo": 1})).unwrap_err();
        assert!(matches!(err, SchemaError::Parse(_)));
    }

    // ── lookup ──

    #[test]
    fn find_operation_exact_and_template() {
        let schema = Schema::from_document(&users_doc()).unwrap();

        assert!(schema.find_operation("POST", "/users").is_some());
        let by_template = schema.find_operation("GET", "/users/42").unwrap();
        assert_eq!(by_template.path, "/users/{id}");
    }

    #[test]
    fn find_operation_literal_wins_over_template() {
        let schema = Schema::from_document(&users_doc()).unwrap();
        let me = schema.find_operation("GET", "/users/me").unwrap();
        assert_eq!(me.path, "/users/me");
    }

    #[test]
    fn find_operation_normalizes_leading_slash() {
        let schema = Schema::from_document(&users_doc()).unwrap();
        assert!(schema.find_operation("POST", "users").is_some());
        assert!(schema.find_operation("get", "/users/7").is_some());
    }

    #[test]
    fn find_operation_misses() {
        let schema = Schema::from_document(&users_doc()).unwrap();
        assert!(schema.find_operation("DELETE", "/users/1").is_none());
        assert!(schema.find_operation("GET", "/orders/1").is_none());
        // Template segments never match across slashes
        assert!(schema.find_operation("GET", "/users/1/posts").is_none());
    }

    #[test]
    fn path_param_values_aligned() {
        let schema = Schema::from_document(&users_doc()).unwrap();
        let op = schema.find_operation("GET", "/users/42").unwrap();
        let values = op.path_param_values("/users/42");
        assert_eq!(values["id"], "42");
    }

    // ── file loading ──

    #[test]
    fn from_file_missing_is_not_found() {
        let err = Schema::from_file(Path::new("/no/such/schema.yaml")).unwrap_err();
        assert!(matches!(err, SchemaError::NotFound(_)));
    }

    #[test]
    fn from_file_yaml() {
        let yaml = "openapi: '3.0.3'\npaths:\n  /health:\n    get:\n      responses:\n        '200':\n          description: OK\n";
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let schema = Schema::from_file(file.path()).unwrap();
        assert!(schema.find_operation("GET", "/health").is_some());
    }

    #[test]
    fn from_file_invalid_yaml_is_parse_error() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(b":\n  :\n    - [invalid").unwrap();

        let err = Schema::from_file(file.path()).unwrap_err();
        assert!(matches!(err, SchemaError::Parse(_)));
    }

    #[test]
    fn from_file_sniffs_json_without_extension() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"openapi": "3.0.3", "paths": {"/ping": {"get": {"responses": {"200": {"description": "OK"}}}}}}"#)
            .unwrap();

        let schema = Schema::from_file(file.path()).unwrap();
        assert!(schema.find_operation("GET", "/ping").is_some());
    }

    #[test]
    fn from_file_repeated_loads_equivalent() {
        let yaml = "openapi: '3.0.3'\npaths:\n  /a:\n    get:\n      responses: {'200': {description: OK}}\n  /b:\n    post:\n      responses: {'201': {description: Created}}\n";
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let first = Schema::from_file(file.path()).unwrap();
        let second = Schema::from_file(file.path()).unwrap();
        let labels = |s: &Schema| {
            let mut v: Vec<String> = s.operations().iter().map(OperationDefinition::label).collect();
            v.sort();
            v
        };
        assert_eq!(labels(&first), labels(&second));
    }

    // ── Swagger 2.0 ──

    #[test]
    fn extract_swagger_v2_body_and_responses() {
        let doc = serde_json::json!({
            "swagger": "2.0",
            "info": {"title": "Legacy", "version": "1.0"},
            "consumes": ["application/json"],
            "produces": ["application/json", "application/xml"],
            "paths": {
                "/orders": {
                    "post": {
                        "parameters": [
                            {"name": "payload", "in": "body", "required": true,
                             "schema": {"$ref": "#/definitions/Order"}},
                            {"name": "dry_run", "in": "query", "required": false, "type": "boolean"}
                        ],
                        "responses": {"201": {"schema": {"$ref": "#/definitions/Order"}}}
                    }
                }
            },
            "definitions": {
                "Order": {
                    "type": "object",
                    "properties": {"quantity": {"type": "integer"}},
                    "required": ["quantity"]
                }
            }
        });
        let schema = Schema::from_document(&doc).unwrap();
        let op = schema.find_operation("POST", "/orders").unwrap();

        let body = op.request_body.as_ref().unwrap();
        assert!(body.required);
        let order = body.content["application/json"].as_ref().unwrap();
        assert_eq!(order["properties"]["quantity"]["type"], "integer");

        // Body parameter is not an ordinary parameter
        assert_eq!(op.parameters.len(), 1);
        assert_eq!(op.parameters[0].name, "dry_run");

        let created = &op.responses[&201];
        assert!(created.content.contains_key("application/json"));
        assert!(created.content.contains_key("application/xml"));
    }

    // ── template matching ──

    #[test]
    fn template_segment_requires_value() {
        assert!(template_matches("/users/{id}", "/users/1"));
        assert!(!template_matches("/users/{id}", "/users/"));
        assert!(!template_matches("/users/{id}", "/users"));
        assert!(template_matches("/a/{x}/b/{y}", "/a/1/b/2"));
        assert!(!template_matches("/a/{x}/b/{y}", "/a/1/c/2"));
    }

    proptest! {
        // A template rendered with concrete segment values always resolves
        // back to its own operation.
        #[test]
        fn rendered_template_resolves(
            id in "[a-z0-9]{1,12}",
            name in "[a-z0-9]{1,12}",
        ) {
            let doc = serde_json::json!({
                "openapi": "3.0.3",
                "paths": {
                    "/projects/{project}/files/{file}": {
                        "get": {"responses": {"200": {"description": "OK"}}}
                    }
                }
            });
            let schema = Schema::from_document(&doc).unwrap();
            let path = format!("/projects/{id}/files/{name}");
            let op = schema.find_operation("GET", &path);
            prop_assert!(op.is_some());
            let values = op.unwrap().path_param_values(&path);
            prop_assert_eq!(values.get("project"), Some(&id));
            prop_assert_eq!(values.get("file"), Some(&name));
        }
    }
}
