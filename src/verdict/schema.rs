//! The JSON schema the model's output is constrained to.

use serde_json::{Value, json};

use super::types::{Rating, VerdictKind};

/// Name reported to the provider alongside the schema.
pub const SCHEMA_NAME: &str = "verdict";

/// Object schema with all three fields required and nothing else allowed.
pub fn response_schema() -> Value {
    let verdicts: Vec<&str> = VerdictKind::ALL.iter().map(|v| v.as_str()).collect();
    let ratings: Vec<String> = Rating::tokens().collect();
    json!({
        "type": "object",
        "properties": {
            "verdict": {
                "type": "string",
                "enum": verdicts,
                "description": "The verdict on the image."
            },
            "rating": {
                "type": "string",
                "enum": ratings,
                "description": "The rating of the image from 1 to 10."
            },
            "explanation": {
                "type": "string",
                "description": "The straightforward explanation"
            }
        },
        "required": ["verdict", "rating", "explanation"],
        "additionalProperties": false
    })
}

/// `response_format` block for an OpenAI-compatible chat completion request.
pub fn response_format() -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": SCHEMA_NAME,
            "strict": true,
            "schema": response_schema()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_fields_exist_in_properties() {
        let schema = response_schema();
        let properties = schema["properties"].as_object().unwrap();
        for field in schema["required"].as_array().unwrap() {
            assert!(properties.contains_key(field.as_str().unwrap()), "{field}");
        }
        assert_eq!(properties.len(), 3);
    }

    #[test]
    fn test_enums() {
        let schema = response_schema();
        assert_eq!(schema["properties"]["verdict"]["enum"], json!(["smash", "pass"]));
        let ratings = schema["properties"]["rating"]["enum"].as_array().unwrap();
        assert_eq!(ratings.first().unwrap(), "1");
        assert_eq!(ratings.last().unwrap(), "10");
        assert_eq!(ratings.len(), 10);
    }

    #[test]
    fn test_response_format_wraps_schema() {
        let format = response_format();
        assert_eq!(format["type"], "json_schema");
        assert_eq!(format["json_schema"]["name"], SCHEMA_NAME);
        assert_eq!(format["json_schema"]["schema"], response_schema());
    }
}
