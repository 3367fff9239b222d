//! JSON reading and writing for document values.
//!
//! Writing is deterministic: 4-space indent, members in tree order, one
//! trailing newline. Loading a file and saving it unchanged reproduces the
//! input byte for byte, which the save path relies on.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::error::ParseResult;
use crate::value::Value;

/// Parse one document file into a value tree
pub fn parse_document(text: &str) -> ParseResult<Value> {
    Ok(serde_json::from_str(text)?)
}

/// Serialize a value tree in the engine's on-disk format
pub fn to_json_pretty(value: &Value) -> String {
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut buffer = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value
        .serialize(&mut serializer)
        .expect("value serialization is infallible");
    let mut text = String::from_utf8(buffer).expect("serializer emits UTF-8");
    text.push('\n');
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Scalar;

    #[test]
    fn test_parse_preserves_member_order() {
        let text = r#"{"zeta": 1, "alpha": 2, "mid": {"b": true, "a": false}}"#;
        let value = parse_document(text).unwrap();

        let members = value.as_object().unwrap();
        let names: Vec<&str> = members.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);

        let nested = value.member("mid").unwrap().as_object().unwrap();
        assert_eq!(nested[0].0, "b");
        assert_eq!(nested[1].0, "a");
    }

    #[test]
    fn test_parse_number_kinds() {
        let value = parse_document(r#"{"count": 3, "ratio": 0.5}"#).unwrap();
        assert_eq!(value.member("count"), Some(&Value::Scalar(Scalar::Int(3))));
        assert_eq!(
            value.member("ratio"),
            Some(&Value::Scalar(Scalar::Float(0.5)))
        );
    }

    #[test]
    fn test_write_is_stable() {
        let text = "{\n    \"name\": \"fighter\",\n    \"tags\": [\n        \"small\",\n        \"strike\"\n    ]\n}\n";
        let value = parse_document(text).unwrap();
        assert_eq!(to_json_pretty(&value), text);
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        let err = parse_document("{\"name\": ").unwrap_err();
        assert!(err.to_string().contains("line"));
    }
}
