//! Structured-output JSON Schemas for the pipeline agents
//!
//! Every schema closes `additionalProperties` and lists `required`
//! explicitly so the service enforces the shape instead of the parser.

use serde_json::{json, Value};

/// Planner schema: exactly one slide outline, 3..6 bullets, up to 8 queries
pub fn planner_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["slideCount", "outline", "searchQueries", "keyConstraints"],
        "properties": {
            "slideCount": { "type": "integer", "minimum": 1, "maximum": 1 },
            "outline": {
                "type": "array",
                "minItems": 1,
                "maxItems": 1,
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["title", "bullets"],
                    "properties": {
                        "title": { "type": "string" },
                        "bullets": {
                            "type": "array",
                            "minItems": 3,
                            "maxItems": 6,
                            "items": { "type": "string" }
                        }
                    }
                }
            },
            "searchQueries": {
                "type": "array",
                "maxItems": 8,
                "items": { "type": "string" }
            },
            "keyConstraints": {
                "type": "array",
                "items": { "type": "string" }
            }
        }
    })
}

pub fn web_research_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["findings", "citations", "usedQueries"],
        "properties": {
            "findings": { "type": "string" },
            "citations": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["title", "url", "quote"],
                    "properties": {
                        "title": { "type": "string" },
                        "url": { "type": "string" },
                        "quote": { "type": "string" }
                    }
                }
            },
            "usedQueries": {
                "type": "array",
                "items": { "type": "string" }
            }
        }
    })
}

pub fn file_research_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["snippets", "citations"],
        "properties": {
            "snippets": {
                "type": "array",
                "items": { "type": "string" }
            },
            "citations": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["fileId", "filename", "snippet"],
                    "properties": {
                        "fileId": { "type": "string" },
                        "filename": { "type": "string" },
                        "snippet": { "type": "string" }
                    }
                }
            }
        }
    })
}

pub fn validator_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["ok", "issues", "fixedPromptAppendix"],
        "properties": {
            "ok": { "type": "boolean" },
            "issues": {
                "type": "array",
                "items": { "type": "string" }
            },
            "fixedPromptAppendix": { "type": "string" }
        }
    })
}

/// The `text.format` block requesting schema-constrained output
pub fn structured_format(name: &str, schema: Value) -> Value {
    json!({
        "format": {
            "type": "json_schema",
            "name": name,
            "strict": true,
            "schema": schema
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schemas_are_closed() {
        for schema in [
            planner_schema(),
            web_research_schema(),
            file_research_schema(),
            validator_schema(),
        ] {
            assert_eq!(schema["additionalProperties"], false);
            assert!(schema["required"].is_array());
        }
    }

    #[test]
    fn test_planner_bounds() {
        let schema = planner_schema();
        assert_eq!(schema["properties"]["slideCount"]["minimum"], 1);
        assert_eq!(schema["properties"]["slideCount"]["maximum"], 1);
        assert_eq!(schema["properties"]["outline"]["maxItems"], 1);
        let bullets = &schema["properties"]["outline"]["items"]["properties"]["bullets"];
        assert_eq!(bullets["minItems"], 3);
        assert_eq!(bullets["maxItems"], 6);
        assert_eq!(schema["properties"]["searchQueries"]["maxItems"], 8);
    }

    #[test]
    fn test_structured_format_wraps_schema() {
        let format = structured_format("validator", validator_schema());
        assert_eq!(format["format"]["type"], "json_schema");
        assert_eq!(format["format"]["name"], "validator");
        assert_eq!(format["format"]["strict"], true);
        assert_eq!(format["format"]["schema"]["properties"]["ok"]["type"], "boolean");
    }
}
