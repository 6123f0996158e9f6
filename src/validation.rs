//! Schema validation helpers.
//!
//! Checks a `serde_json::Value` against a [`Schema`] and reports every
//! problem as a [`Diagnostic`].
//!
//! # Example
//!
//! ```
//! use backup_provider::schema::{Attribute, Schema};
//! use backup_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::new()
//!     .with_attribute("name", Attribute::required_string())
//!     .with_attribute("activation_status", Attribute::optional_string()
//!         .with_one_of(["activated", "deactivated"]));
//!
//! assert!(validate(&schema, &json!({"name": "gold"})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"activation_status": "paused"}));
//! assert_eq!(diagnostics.len(), 2);
//! ```

use crate::error::ProviderError;
use crate::schema::{
    Attribute, AttributeType, Block, BlockNestingMode, Diagnostic, NestedBlock, Schema,
};
use serde_json::Value;

/// Validate a JSON value against a schema.
///
/// Returns a list of diagnostics; empty means the value is valid.
///
/// - Required attributes must be present and non-null
/// - Read-only computed attributes are skipped
/// - Attribute types and `one_of` restrictions must match
/// - Nested blocks are validated recursively with min/max item constraints
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// Validate and collapse the diagnostics into a single [`ProviderError::Validation`].
pub fn ensure_valid(schema: &Schema, value: &Value) -> Result<(), ProviderError> {
    into_result(validate(schema, value))
}

/// Turn error diagnostics into a single [`ProviderError::Validation`].
///
/// Warnings are ignored.
pub fn into_result(diagnostics: Vec<Diagnostic>) -> Result<(), ProviderError> {
    let diagnostics: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    if diagnostics.is_empty() {
        return Ok(());
    }
    let message = diagnostics
        .iter()
        .map(|d| match &d.detail {
            Some(detail) => format!("{} ({})", d.summary, detail),
            None => d.summary.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ");
    Err(ProviderError::Validation(message))
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return,
        _ => {
            let mut diag = Diagnostic::error("Expected object")
                .with_detail(format!("Got {}", type_name(value)));
            if !path.is_empty() {
                diag = diag.with_attribute(path);
            }
            diagnostics.push(diag);
            return;
        },
    };

    for (name, attr) in &block.attributes {
        let attr_path = join_path(path, name);
        validate_attribute(attr, obj.get(name), &attr_path, diagnostics);
    }

    for (name, nested) in &block.blocks {
        let block_path = join_path(path, name);
        validate_nested_block(nested, obj.get(name), &block_path, diagnostics);
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.flags.is_read_only() {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => {
            if !matches_type(&attr.attr_type, v) {
                diagnostics.push(
                    Diagnostic::error(format!("Invalid type for '{}'", path))
                        .with_detail(format!(
                            "Expected {:?}, got {}",
                            attr.attr_type,
                            type_name(v)
                        ))
                        .with_attribute(path),
                );
                return;
            }
            if let (false, Some(s)) = (attr.one_of.is_empty(), v.as_str()) {
                if !attr.one_of.iter().any(|allowed| allowed == s) {
                    diagnostics.push(
                        Diagnostic::error(format!("Invalid value for '{}'", path))
                            .with_detail(format!(
                                "'{}' is not one of: {}",
                                s,
                                attr.one_of.join(", ")
                            ))
                            .with_attribute(path),
                    );
                }
            }
        },
    }
}

fn matches_type(attr_type: &AttributeType, value: &Value) -> bool {
    match attr_type {
        AttributeType::String => value.is_string(),
        AttributeType::Int64 => value.is_i64(),
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let items: Vec<&Value> = match (nested.nesting_mode, value) {
        (_, None | Some(Value::Null)) => Vec::new(),
        (_, Some(Value::Array(arr))) => arr.iter().collect(),
        (BlockNestingMode::Single, Some(v @ Value::Object(_))) => vec![v],
        (_, Some(v)) => {
            diagnostics.push(
                Diagnostic::error(format!("Expected list for block '{}'", path))
                    .with_detail(format!("Got {}", type_name(v)))
                    .with_attribute(path),
            );
            return;
        },
    };

    let len = items.len() as u32;
    if len < nested.min_items {
        diagnostics.push(
            Diagnostic::error(format!(
                "Block '{}' requires at least {} item(s), got {}",
                path, nested.min_items, len
            ))
            .with_attribute(path),
        );
    }
    if nested.max_items > 0 && len > nested.max_items {
        diagnostics.push(
            Diagnostic::error(format!(
                "Block '{}' allows at most {} item(s), got {}",
                path, nested.max_items, len
            ))
            .with_attribute(path),
        );
    }

    for (i, item) in items.into_iter().enumerate() {
        let item_path = match nested.nesting_mode {
            BlockNestingMode::Single => path.to_string(),
            BlockNestingMode::List => format!("{}.{}", path, i),
        };
        validate_block(&nested.block, item, &item_path, diagnostics);
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn type_name(value: &Value) -> &'static str {
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

    fn schema() -> Schema {
        Schema::new()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute(
                "action_setting",
                Attribute::optional_string().with_one_of(["immediate", "window"]),
            )
            .with_block(
                "slas",
                NestedBlock::list(
                    Block::new().with_block(
                        "retention_duration",
                        NestedBlock::single(
                            Block::new()
                                .with_attribute("unit", Attribute::required_string())
                                .with_attribute("value", Attribute::required_int64()),
                        )
                        .with_min_items(1),
                    ),
                )
                .with_min_items(1),
            )
    }

    #[test]
    fn test_valid_input() {
        let input = json!({
            "name": "gold",
            "action_setting": "window",
            "slas": [{"retention_duration": {"unit": "days", "value": 7}}]
        });
        assert!(validate(&schema(), &input).is_empty());
        assert!(ensure_valid(&schema(), &input).is_ok());
    }

    #[test]
    fn test_computed_attribute_is_ignored() {
        let input = json!({
            "id": 12,
            "name": "gold",
            "slas": [{"retention_duration": {"unit": "days", "value": 7}}]
        });
        assert!(validate(&schema(), &input).is_empty());
    }

    #[test]
    fn test_missing_required_attribute_and_block() {
        let diagnostics = validate(&schema(), &json!({}));
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics
            .iter()
            .any(|d| d.attribute.as_deref() == Some("name")));
        assert!(diagnostics
            .iter()
            .any(|d| d.attribute.as_deref() == Some("slas")));
    }

    #[test]
    fn test_one_of_violation() {
        let input = json!({
            "name": "gold",
            "action_setting": "later",
            "slas": [{"retention_duration": {"unit": "days", "value": 7}}]
        });
        let diagnostics = validate(&schema(), &input);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("action_setting"));
    }

    #[test]
    fn test_nested_type_error_path() {
        let input = json!({
            "name": "gold",
            "slas": [{"retention_duration": {"unit": "days", "value": "seven"}}]
        });
        let diagnostics = validate(&schema(), &input);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute.as_deref(),
            Some("slas.0.retention_duration.value")
        );
    }

    #[test]
    fn test_single_block_allows_one_item() {
        let input = json!({
            "name": "gold",
            "slas": [{"retention_duration": [
                {"unit": "days", "value": 7},
                {"unit": "days", "value": 8}
            ]}]
        });
        let diagnostics = validate(&schema(), &input);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].summary,
            "Block 'slas.0.retention_duration' allows at most 1 item(s), got 2"
        );
    }

    #[test]
    fn test_into_result_ignores_warnings() {
        assert!(into_result(vec![Diagnostic::warning("deprecated")]).is_ok());
        assert!(into_result(vec![Diagnostic::error("broken")]).is_err());
    }

    #[test]
    fn test_ensure_valid_joins_messages() {
        let err = ensure_valid(&schema(), &json!({"slas": []})).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Missing required attribute 'name'"));
        assert!(msg.contains("Block 'slas' requires at least 1 item(s), got 0"));
    }
}
