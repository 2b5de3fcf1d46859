//! Canonical, language-neutral value model for a JSON-Schema-shaped document.
//!
//! A [`SchemaNode`] is a plain struct, not an inheritance hierarchy (see the
//! "Deep polymorphism over schema nodes" design note): the differ dispatches
//! on its fields directly rather than on a trait object.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unresolved $ref: {0}")]
    UnresolvedRef(String),

    #[error("malformed schema at {path}: {reason}")]
    Malformed { path: String, reason: String },
}

/// Permitted JSON types, any non-empty subset. Order is irrelevant for
/// comparison — `BTreeSet` gives us a canonical iteration order for free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    Null,
}

impl PrimitiveType {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(Self::String),
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            "null" => Some(Self::Null),
            _ => None,
        }
    }
}

/// A canonical schema node. Unknown keys are preserved in `extra` but are
/// never inspected by the differ.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaNode {
    pub types: BTreeSet<PrimitiveType>,
    pub properties: BTreeMap<String, SchemaNode>,
    pub required: BTreeSet<String>,
    pub items: Option<Box<SchemaNode>>,
    pub enum_values: Option<Vec<Value>>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<f64>,
    pub exclusive_maximum: Option<f64>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<String>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub nullable: bool,
    pub default: Option<Value>,
    pub format: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl SchemaNode {
    /// Parse a node from a `serde_json::Value`, resolving `$ref` against
    /// `definitions`. Unresolved refs surface as [`SchemaError::UnresolvedRef`].
    pub fn parse(value: &Value, definitions: &Map<String, Value>) -> Result<Self, SchemaError> {
        Self::parse_at(value, definitions, "$")
    }

    /// Parse a root document, pulling its local `definitions`/`$defs` table
    /// out of the document itself before resolving `$ref`s against it.
    pub fn parse_root(value: &Value) -> Result<Self, SchemaError> {
        let empty = Map::new();
        let definitions = value
            .get("definitions")
            .or_else(|| value.get("$defs"))
            .and_then(Value::as_object)
            .unwrap_or(&empty);
        Self::parse(value, definitions)
    }

    fn parse_at(
        value: &Value,
        definitions: &Map<String, Value>,
        path: &str,
    ) -> Result<Self, SchemaError> {
        let obj = match value {
            Value::Object(o) => o,
            Value::Bool(_) => return Ok(SchemaNode::default()),
            other => {
                return Err(SchemaError::Malformed {
                    path: path.to_string(),
                    reason: format!("expected a schema object, found {other}"),
                })
            }
        };

        if let Some(Value::String(reference)) = obj.get("$ref") {
            let resolved = resolve_ref(reference, definitions)?;
            return Self::parse_at(&resolved, definitions, path);
        }

        let mut node = SchemaNode::default();

        node.types = match obj.get("type") {
            Some(Value::String(s)) => PrimitiveType::parse(s).into_iter().collect(),
            Some(Value::Array(arr)) => arr
                .iter()
                .filter_map(|v| v.as_str())
                .filter_map(PrimitiveType::parse)
                .collect(),
            _ => BTreeSet::new(),
        };

        if let Some(Value::Object(props)) = obj.get("properties") {
            for (name, child) in props {
                let child_path = format!("{path}.properties.{name}");
                node.properties.insert(
                    name.clone(),
                    Self::parse_at(child, definitions, &child_path)?,
                );
            }
        }

        if let Some(Value::Array(req)) = obj.get("required") {
            node.required = req
                .iter()
                .filter_map(|v| v.as_str())
                .map(String::from)
                .collect();
        }

        if let Some(items) = obj.get("items") {
            let child_path = format!("{path}.items");
            node.items = Some(Box::new(Self::parse_at(items, definitions, &child_path)?));
        }

        if let Some(Value::Array(values)) = obj.get("enum") {
            node.enum_values = Some(values.clone());
        }

        node.minimum = obj.get("minimum").and_then(Value::as_f64);
        node.maximum = obj.get("maximum").and_then(Value::as_f64);
        node.exclusive_minimum = obj.get("exclusiveMinimum").and_then(Value::as_f64);
        node.exclusive_maximum = obj.get("exclusiveMaximum").and_then(Value::as_f64);
        node.min_length = obj.get("minLength").and_then(Value::as_u64);
        node.max_length = obj.get("maxLength").and_then(Value::as_u64);
        node.pattern = obj
            .get("pattern")
            .and_then(Value::as_str)
            .map(String::from);
        node.min_items = obj.get("minItems").and_then(Value::as_u64);
        node.max_items = obj.get("maxItems").and_then(Value::as_u64);
        node.default = obj.get("default").cloned();
        node.format = obj.get("format").and_then(Value::as_str).map(String::from);
        node.description = obj
            .get("description")
            .and_then(Value::as_str)
            .map(String::from);

        let nullable_flag = matches!(obj.get("nullable"), Some(Value::Bool(true)));
        node.nullable = nullable_flag || node.types.contains(&PrimitiveType::Null);

        let known_keys = [
            "$ref", "type", "properties", "required", "items", "enum", "minimum", "maximum",
            "exclusiveMinimum", "exclusiveMaximum", "minLength", "maxLength", "pattern",
            "minItems", "maxItems", "nullable", "default", "format", "description",
        ];
        for (key, value) in obj {
            if !known_keys.contains(&key.as_str()) {
                node.extra.insert(key.clone(), value.clone());
            }
        }

        Ok(node)
    }
}

fn resolve_ref(reference: &str, definitions: &Map<String, Value>) -> Result<Value, SchemaError> {
    // Supports the common local-definitions shape: "#/definitions/Name" or "#/$defs/Name".
    let name = reference
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SchemaError::UnresolvedRef(reference.to_string()))?;

    definitions
        .get(name)
        .cloned()
        .ok_or_else(|| SchemaError::UnresolvedRef(reference.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn defs() -> Map<String, Value> {
        Map::new()
    }

    #[test]
    fn parses_simple_object() {
        let schema = json!({
            "type": "object",
            "properties": { "id": { "type": "integer" } },
            "required": ["id"]
        });
        let node = SchemaNode::parse(&schema, &defs()).unwrap();
        assert_eq!(node.types, BTreeSet::from([PrimitiveType::Object]));
        assert!(node.properties.contains_key("id"));
        assert!(node.required.contains("id"));
    }

    #[test]
    fn nullable_via_type_array() {
        let schema = json!({ "type": ["string", "null"] });
        let node = SchemaNode::parse(&schema, &defs()).unwrap();
        assert!(node.nullable);
        assert!(node.types.contains(&PrimitiveType::Null));
    }

    #[test]
    fn unresolved_ref_is_an_error() {
        let schema = json!({ "$ref": "#/definitions/Missing" });
        let err = SchemaNode::parse(&schema, &defs()).unwrap_err();
        assert!(matches!(err, SchemaError::UnresolvedRef(_)));
    }

    #[test]
    fn resolves_local_ref() {
        let mut definitions = Map::new();
        definitions.insert("Money".to_string(), json!({ "type": "number" }));
        let schema = json!({ "$ref": "#/definitions/Money" });
        let node = SchemaNode::parse(&schema, &definitions).unwrap();
        assert_eq!(node.types, BTreeSet::from([PrimitiveType::Number]));
    }

    #[test]
    fn parse_root_pulls_definitions_from_document() {
        let schema = json!({
            "type": "object",
            "properties": { "amount": { "$ref": "#/definitions/Money" } },
            "definitions": { "Money": { "type": "number" } }
        });
        let node = SchemaNode::parse_root(&schema).unwrap();
        let amount = node.properties.get("amount").unwrap();
        assert_eq!(amount.types, BTreeSet::from([PrimitiveType::Number]));
    }

    #[test]
    fn unknown_keys_preserved_verbatim() {
        let schema = json!({ "type": "string", "x-custom": "value" });
        let node = SchemaNode::parse(&schema, &defs()).unwrap();
        assert_eq!(node.extra.get("x-custom"), Some(&json!("value")));
    }
}
