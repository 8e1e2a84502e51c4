//! Canonical normalization across the spec transport forms.
//!
//! Storage layers hand back spec documents as parsed JSON, JSON text, raw
//! bytes, or a base64 string wrapping JSON text. Everything downstream
//! (renderers, hashing, version diffs) wants exactly one representation, so
//! parsing, validation, and re-serialization happen here in one place.
//!
//! The canonical form is the serde serialization of the typed [`SlideSpec`],
//! which fixes field order and drops representation noise, so any two
//! transport forms of the same document normalize to identical bytes.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value;

use crate::model::SlideSpec;
use crate::SpecError;

/// Serialize an already-parsed spec to its canonical byte form.
pub fn canonical_bytes(spec: &SlideSpec) -> Result<Vec<u8>, SpecError> {
    serde_json::to_vec(spec).map_err(|e| SpecError::Malformed(e.to_string()))
}

/// Parse a stored JSON value into a spec.
///
/// Accepts a document object directly, or a string holding either JSON
/// text or base64-encoded JSON text.
pub fn parse_value(value: &Value) -> Result<SlideSpec, SpecError> {
    match value {
        Value::Object(_) => serde_json::from_value(value.clone())
            .map_err(|e| SpecError::Malformed(e.to_string())),
        Value::String(s) => parse_str(s),
        other => Err(SpecError::Malformed(format!(
            "expected object or string, got {}",
            json_type_name(other)
        ))),
    }
}

/// Parse raw stored bytes into a spec.
///
/// Bytes are expected to be JSON; if the JSON is itself a string (a
/// double-marshaled document), the inner text is parsed like any stored
/// string value.
pub fn parse_bytes(raw: &[u8]) -> Result<SlideSpec, SpecError> {
    match serde_json::from_slice::<Value>(raw) {
        Ok(value) => parse_value(&value),
        Err(e) => Err(SpecError::Malformed(e.to_string())),
    }
}

/// Normalize a stored JSON value to validated canonical bytes.
pub fn normalize_value(value: &Value) -> Result<Vec<u8>, SpecError> {
    let spec = parse_value(value)?;
    spec.validate()?;
    canonical_bytes(&spec)
}

/// Normalize raw stored bytes to validated canonical bytes.
pub fn normalize_bytes(raw: &[u8]) -> Result<Vec<u8>, SpecError> {
    let spec = parse_bytes(raw)?;
    spec.validate()?;
    canonical_bytes(&spec)
}

/// Parse a string form: JSON text first, then base64-of-JSON.
///
/// Base64 is tried second so that a document which happens to be valid
/// JSON is never misread. Re-encoding the string itself would
/// double-encode the document; only the decoded content is used.
fn parse_str(s: &str) -> Result<SlideSpec, SpecError> {
    match serde_json::from_str::<SlideSpec>(s) {
        Ok(spec) => Ok(spec),
        Err(text_err) => {
            let decoded = BASE64
                .decode(s.trim())
                .map_err(|_| SpecError::Malformed(text_err.to_string()))?;
            serde_json::from_slice(&decoded).map_err(|e| SpecError::Malformed(e.to_string()))
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SPEC_TEXT: &str = r#"{"layouts":[{"name":"Title","placeholders":[{"id":"title","geometry":{"x":0.1,"y":0.2,"w":0.8,"h":0.2}}]}]}"#;

    fn spec_object() -> Value {
        serde_json::from_str(SPEC_TEXT).unwrap()
    }

    #[test]
    fn all_transport_forms_normalize_identically() {
        let from_object = normalize_value(&spec_object()).unwrap();
        let from_text = normalize_value(&Value::String(SPEC_TEXT.to_string())).unwrap();
        let from_bytes = normalize_bytes(SPEC_TEXT.as_bytes()).unwrap();

        let b64 = BASE64.encode(SPEC_TEXT.as_bytes());
        let from_base64 = normalize_value(&Value::String(b64)).unwrap();

        assert_eq!(from_object, from_text);
        assert_eq!(from_object, from_bytes);
        assert_eq!(from_object, from_base64);
    }

    #[test]
    fn string_spec_is_not_double_encoded() {
        // A string form must parse the content, not re-serialize the string.
        let normalized = normalize_value(&Value::String(SPEC_TEXT.to_string())).unwrap();
        let spec: SlideSpec = serde_json::from_slice(&normalized).unwrap();
        assert_eq!(spec.layouts.len(), 1);
        assert_eq!(spec.layouts[0].name, "Title");
    }

    #[test]
    fn double_marshaled_bytes_are_unwrapped() {
        // json.Marshal of a byte slice produces a base64 JSON string.
        let b64 = BASE64.encode(SPEC_TEXT.as_bytes());
        let wrapped = serde_json::to_vec(&Value::String(b64)).unwrap();
        let normalized = normalize_bytes(&wrapped).unwrap();
        assert_eq!(normalized, normalize_value(&spec_object()).unwrap());
    }

    #[test]
    fn canonical_bytes_are_stable_under_reordering() {
        let reordered = json!({
            "constraints": {"safeMargin": 0.0},
            "layouts": [{"placeholders": [{"geometry": {"h": 0.2, "w": 0.8, "x": 0.1, "y": 0.2}, "id": "title"}], "name": "Title"}],
            "tokens": {}
        });
        assert_eq!(
            normalize_value(&reordered).unwrap(),
            normalize_value(&spec_object()).unwrap()
        );
    }

    #[test]
    fn garbage_string_is_malformed() {
        let err = normalize_value(&Value::String("not json, not base64!".into())).unwrap_err();
        assert!(matches!(err, SpecError::Malformed(_)));
    }

    #[test]
    fn non_document_value_is_malformed() {
        let err = normalize_value(&json!(42)).unwrap_err();
        assert!(err.to_string().contains("number"));
    }

    #[test]
    fn invalid_document_fails_validation() {
        let doc = json!({"layouts": []});
        let err = normalize_value(&doc).unwrap_err();
        assert!(matches!(err, SpecError::Validation(_)));
    }
}
