//! Verifier (spec §4.3): a subset JSON-schema checker over `object`
//! schemas — required fields and primitive type mismatches only. Not a
//! general-purpose JSON Schema implementation.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct VerificationResult {
    pub pass: bool,
    pub score: f64,
    pub missing_fields: Vec<String>,
    pub type_mismatches: Vec<String>,
    pub reason: Option<String>,
}

/// Checks `value` against an `object` schema of the shape
/// `{"type": "object", "required": [...], "properties": {field: {"type": ...}}}`.
/// Non-object schemas (or a non-object `value`) always pass: the subset
/// checker only has an opinion about object shapes.
pub fn verify(schema: &Value, value: &Value) -> VerificationResult {
    let Some(schema_type) = schema.get("type").and_then(|v| v.as_str()) else {
        return passing();
    };
    if schema_type != "object" {
        return passing();
    }

    let Some(obj) = value.as_object() else {
        return VerificationResult {
            pass: false,
            score: 0.0,
            missing_fields: Vec::new(),
            type_mismatches: Vec::new(),
            reason: Some("expected a JSON object".to_string()),
        };
    };

    let required: Vec<String> = schema
        .get("required")
        .and_then(|v| v.as_array())
        .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();

    let properties = schema.get("properties").and_then(|v| v.as_object());

    let mut missing_fields = Vec::new();
    let mut type_mismatches = Vec::new();

    for field in &required {
        if !obj.contains_key(field) {
            missing_fields.push(field.clone());
        }
    }

    if let Some(properties) = properties {
        for (field, field_schema) in properties {
            let Some(actual) = obj.get(field) else { continue };
            if let Some(expected_type) = field_schema.get("type").and_then(|v| v.as_str()) {
                if !matches_json_type(actual, expected_type) {
                    type_mismatches.push(field.clone());
                }
            }
        }
    }

    let total_checks = required.len().max(1) + properties.map(|p| p.len()).unwrap_or(0);
    let failed = missing_fields.len() + type_mismatches.len();
    let score = if total_checks == 0 {
        1.0
    } else {
        (1.0 - failed as f64 / total_checks as f64).max(0.0)
    };

    let pass = missing_fields.is_empty() && type_mismatches.is_empty();
    let reason = if pass {
        None
    } else {
        Some(format!(
            "missing fields: {missing_fields:?}, type mismatches: {type_mismatches:?}"
        ))
    };

    VerificationResult {
        pass,
        score,
        missing_fields,
        type_mismatches,
        reason,
    }
}

fn passing() -> VerificationResult {
    VerificationResult {
        pass: true,
        score: 1.0,
        missing_fields: Vec::new(),
        type_mismatches: Vec::new(),
        reason: None,
    }
}

fn matches_json_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn price_schema() -> Value {
        json!({
            "type": "object",
            "required": ["price"],
            "properties": {"price": {"type": "number"}}
        })
    }

    #[test]
    fn passes_when_all_required_fields_present_with_correct_types() {
        let result = verify(&price_schema(), &json!({"price": 12.99}));
        assert!(result.pass);
        assert_eq!(result.score, 1.0);
    }

    #[test]
    fn reports_type_mismatch_for_string_instead_of_number() {
        let result = verify(&price_schema(), &json!({"price": "12.99"}));
        assert!(!result.pass);
        assert_eq!(result.type_mismatches, vec!["price".to_string()]);
        assert!(result.missing_fields.is_empty());
    }

    #[test]
    fn reports_missing_required_field() {
        let result = verify(&price_schema(), &json!({}));
        assert!(!result.pass);
        assert_eq!(result.missing_fields, vec!["price".to_string()]);
    }

    #[test]
    fn non_object_schema_always_passes() {
        let result = verify(&json!({"type": "string"}), &json!(42));
        assert!(result.pass);
    }

    #[test]
    fn non_object_value_against_object_schema_fails_with_reason() {
        let result = verify(&price_schema(), &json!("not an object"));
        assert!(!result.pass);
        assert!(result.reason.is_some());
    }
}
