//! Content-type-keyed body decoding
//!
//! Bodies are decoded to `serde_json::Value` so one structural validator
//! covers every supported format. XML decoding follows the usual
//! encoder-chain convention: elements become maps, repeated elements become
//! arrays, scalar text is coerced to numbers/booleans where it parses as
//! one, and the document element itself is dropped. Attributes are ignored.

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use serde_json::Value;

use apiconform_core::strip_media_type_params;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),
    #[error("Invalid {0} body: {1}")]
    Invalid(&'static str, String),
}

/// True when the media type carries JSON (bare or a `+json` suffix).
#[must_use]
pub fn is_json(media_type: &str) -> bool {
    matches!(media_type, "application/json" | "text/json") || media_type.ends_with("+json")
}

/// True when the media type carries XML (bare or a `+xml` suffix).
#[must_use]
pub fn is_xml(media_type: &str) -> bool {
    matches!(media_type, "application/xml" | "text/xml") || media_type.ends_with("+xml")
}

/// Decode a body per its declared media type into a value ready for
/// structural validation. Media type parameters are stripped first.
///
/// # Errors
///
/// `UnsupportedMediaType` for formats outside JSON/XML, `Invalid` for
/// undecodable content.
pub fn decode_body(media_type: &str, body: &[u8]) -> Result<Value, DecodeError> {
    let media_type = strip_media_type_params(media_type);
    if is_json(media_type) {
        serde_json::from_slice(body).map_err(|e| DecodeError::Invalid("JSON", e.to_string()))
    } else if is_xml(media_type) {
        xml_to_value(body)
    } else {
        Err(DecodeError::UnsupportedMediaType(media_type.to_string()))
    }
}

/// Coerce scalar text the way lenient decoders do: integers, floats and
/// booleans where the text parses as one, a string otherwise.
#[must_use]
pub(crate) fn coerce_scalar(text: &str) -> Value {
    if let Ok(n) = text.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Ok(f) = text.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    match text {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(text.to_string()),
    }
}

#[derive(Default)]
struct XmlElement {
    children: serde_json::Map<String, Value>,
    text: String,
}

fn xml_to_value(body: &[u8]) -> Result<Value, DecodeError> {
    let text =
        std::str::from_utf8(body).map_err(|e| DecodeError::Invalid("XML", e.to_string()))?;
    let mut reader = Reader::from_reader(text.as_bytes());
    reader.config_mut().trim_text(true);

    // Bottom of the stack holds the document root's siblings
    let mut stack: Vec<(String, XmlElement)> = vec![(String::new(), XmlElement::default())];

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                stack.push((name, XmlElement::default()));
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if let Some((_, parent)) = stack.last_mut() {
                    insert_child(&mut parent.children, name, Value::Null);
                }
            }
            Ok(Event::Text(t)) => {
                if let Some((_, element)) = stack.last_mut() {
                    element
                        .text
                        .push_str(&unescape_entities(&String::from_utf8_lossy(&t)));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if let Some((_, element)) = stack.last_mut() {
                    element
                        .text
                        .push_str(&resolve_entity(&String::from_utf8_lossy(&e)));
                }
            }
            Ok(Event::End(_)) => {
                if stack.len() < 2 {
                    return Err(DecodeError::Invalid("XML", "unexpected closing tag".into()));
                }
                let Some((name, element)) = stack.pop() else {
                    return Err(DecodeError::Invalid("XML", "unexpected closing tag".into()));
                };
                let value = element_value(element);
                if let Some((_, parent)) = stack.last_mut() {
                    insert_child(&mut parent.children, name, value);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(DecodeError::Invalid("XML", e.to_string())),
            _ => (),
        }
        buf.clear();
    }

    if stack.len() != 1 {
        return Err(DecodeError::Invalid("XML", "unclosed element".into()));
    }
    let Some((_, root)) = stack.pop() else {
        return Err(DecodeError::Invalid("XML", "empty document".into()));
    };
    let children = root.children;
    match children.len() {
        0 => Err(DecodeError::Invalid("XML", "empty document".into())),
        // The document element wraps the payload; return its content
        1 => Ok(children
            .into_iter()
            .next()
            .map_or(Value::Null, |(_, value)| value)),
        _ => Ok(Value::Object(children)),
    }
}

fn element_value(element: XmlElement) -> Value {
    if element.children.is_empty() {
        if element.text.is_empty() {
            Value::Null
        } else {
            coerce_scalar(&element.text)
        }
    } else {
        Value::Object(element.children)
    }
}

/// Repeated sibling elements collapse into an array.
fn insert_child(map: &mut serde_json::Map<String, Value>, name: String, value: Value) {
    match map.entry(name) {
        serde_json::map::Entry::Occupied(mut entry) => {
            let slot = entry.get_mut();
            if let Value::Array(items) = slot {
                items.push(value);
            } else {
                let first = slot.take();
                *slot = Value::Array(vec![first, value]);
            }
        }
        serde_json::map::Entry::Vacant(entry) => {
            entry.insert(value);
        }
    }
}

fn unescape_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Resolve a general entity reference (the content between `&` and `;`).
/// Unknown entities are kept literally.
fn resolve_entity(name: &str) -> String {
    match name {
        "amp" => "&".to_string(),
        "lt" => "<".to_string(),
        "gt" => ">".to_string(),
        "quot" => "\"".to_string(),
        "apos" => "'".to_string(),
        _ => {
            if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                if let Some(c) = u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
                    return c.to_string();
                }
            } else if let Some(dec) = name.strip_prefix('#') {
                if let Some(c) = dec.parse::<u32>().ok().and_then(char::from_u32) {
                    return c.to_string();
                }
            }
            format!("&{name};")
        }
    }
}
