//! Structural diff between two [`SchemaNode`]s.
//!
//! The traversal is deterministic: properties are visited in lexicographic
//! order and constraints in a fixed order, so `diff(old, new)` yields
//! identical output across runs given the same inputs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::SchemaNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    PropertyAdded,
    PropertyRemoved,
    TypeWidened,
    TypeNarrowed,
    TypeChanged,
    RequiredAdded,
    RequiredRemoved,
    EnumValuesAdded,
    EnumValuesRemoved,
    EnumValuesChanged,
    ConstraintTightened,
    ConstraintRelaxed,
    DefaultAdded,
    DefaultRemoved,
    DefaultChanged,
    NullableAdded,
    NullableRemoved,
}

/// One atomic, path-qualified difference between two schema nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub path: String,
    pub kind: ChangeKind,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

impl Change {
    fn new(path: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            old_value: None,
            new_value: None,
        }
    }

    fn with_values(mut self, old: Option<Value>, new: Option<Value>) -> Self {
        self.old_value = old;
        self.new_value = new;
        self
    }
}

/// Diff two schema nodes, producing a deterministically ordered change list.
pub fn diff(old: &SchemaNode, new: &SchemaNode) -> Vec<Change> {
    let mut changes = Vec::new();
    diff_node("$", old, new, &mut changes);
    changes
}

fn diff_node(path: &str, old: &SchemaNode, new: &SchemaNode, out: &mut Vec<Change>) {
    diff_types(path, old, new, out);
    diff_required(path, old, new, out);
    diff_enum(path, old, new, out);
    diff_numeric_bound(path, "minimum", old.minimum, new.minimum, true, out);
    diff_numeric_bound(path, "maximum", old.maximum, new.maximum, false, out);
    diff_numeric_bound(
        path,
        "exclusiveMinimum",
        old.exclusive_minimum,
        new.exclusive_minimum,
        true,
        out,
    );
    diff_numeric_bound(
        path,
        "exclusiveMaximum",
        old.exclusive_maximum,
        new.exclusive_maximum,
        false,
        out,
    );
    diff_length_bound(path, old.min_length, new.min_length, true, out);
    diff_length_bound(path, old.max_length, new.max_length, false, out);
    diff_pattern(path, &old.pattern, &new.pattern, out);
    diff_length_bound(path, old.min_items, new.min_items, true, out);
    diff_length_bound(path, old.max_items, new.max_items, false, out);
    diff_default(path, old, new, out);
    diff_nullable(path, old, new, out);
    diff_properties(path, old, new, out);
    diff_items(path, old, new, out);
}

fn diff_types(path: &str, old: &SchemaNode, new: &SchemaNode, out: &mut Vec<Change>) {
    if old.types == new.types {
        return;
    }
    let kind = if new.types.is_superset(&old.types) {
        ChangeKind::TypeWidened
    } else if old.types.is_superset(&new.types) {
        ChangeKind::TypeNarrowed
    } else {
        ChangeKind::TypeChanged
    };
    out.push(Change::new(path, kind).with_values(
        Some(serde_json::json!(old.types)),
        Some(serde_json::json!(new.types)),
    ));
}

fn diff_required(path: &str, old: &SchemaNode, new: &SchemaNode, out: &mut Vec<Change>) {
    for name in &new.required {
        if !old.required.contains(name) {
            out.push(Change::new(
                format!("{path}.properties.{name}"),
                ChangeKind::RequiredAdded,
            ));
        }
    }
    for name in &old.required {
        if !new.required.contains(name) {
            out.push(Change::new(
                format!("{path}.properties.{name}"),
                ChangeKind::RequiredRemoved,
            ));
        }
    }
}

fn diff_enum(path: &str, old: &SchemaNode, new: &SchemaNode, out: &mut Vec<Change>) {
    // `None` is treated as "unconstrained" (the universal set), so adding an
    // enum where none existed narrows the value space (values_removed) and
    // lifting an enum widens it (values_added).
    match (&old.enum_values, &new.enum_values) {
        (None, None) => {}
        (Some(old_vals), None) => {
            out.push(
                Change::new(path, ChangeKind::EnumValuesAdded)
                    .with_values(Some(serde_json::json!(old_vals)), None),
            );
        }
        (None, Some(new_vals)) => {
            out.push(
                Change::new(path, ChangeKind::EnumValuesRemoved)
                    .with_values(None, Some(serde_json::json!(new_vals))),
            );
        }
        (Some(old_vals), Some(new_vals)) => {
            if old_vals == new_vals {
                return;
            }
            let is_superset = new_vals.iter().all(|v| old_vals.contains(v));
            let is_subset = old_vals.iter().all(|v| new_vals.contains(v));
            let kind = if is_subset && !is_superset {
                ChangeKind::EnumValuesAdded
            } else if is_superset && !is_subset {
                ChangeKind::EnumValuesRemoved
            } else {
                ChangeKind::EnumValuesChanged
            };
            out.push(
                Change::new(path, kind)
                    .with_values(Some(serde_json::json!(old_vals)), Some(serde_json::json!(new_vals))),
            );
        }
    }
}

/// `is_lower`: true for minimum-style bounds (tightening raises the bound),
/// false for maximum-style bounds (tightening lowers the bound).
fn diff_numeric_bound(
    path: &str,
    label: &str,
    old: Option<f64>,
    new: Option<f64>,
    is_lower: bool,
    out: &mut Vec<Change>,
) {
    let kind = match (old, new) {
        (None, None) => return,
        (None, Some(_)) => Some(ChangeKind::ConstraintTightened),
        (Some(_), None) => Some(ChangeKind::ConstraintRelaxed),
        (Some(o), Some(n)) if o == n => None,
        (Some(o), Some(n)) => {
            let tightened = if is_lower { n > o } else { n < o };
            Some(if tightened {
                ChangeKind::ConstraintTightened
            } else {
                ChangeKind::ConstraintRelaxed
            })
        }
    };
    if let Some(kind) = kind {
        out.push(
            Change::new(format!("{path}.{label}"), kind)
                .with_values(old.map(|v| v.into()), new.map(|v| v.into())),
        );
    }
}

fn diff_length_bound(
    path: &str,
    old: Option<u64>,
    new: Option<u64>,
    is_lower: bool,
    out: &mut Vec<Change>,
) {
    let kind = match (old, new) {
        (None, None) => return,
        (None, Some(_)) => Some(ChangeKind::ConstraintTightened),
        (Some(_), None) => Some(ChangeKind::ConstraintRelaxed),
        (Some(o), Some(n)) if o == n => None,
        (Some(o), Some(n)) => {
            let tightened = if is_lower { n > o } else { n < o };
            Some(if tightened {
                ChangeKind::ConstraintTightened
            } else {
                ChangeKind::ConstraintRelaxed
            })
        }
    };
    if let Some(kind) = kind {
        out.push(
            Change::new(path, kind).with_values(old.map(Value::from), new.map(Value::from)),
        );
    }
}

fn diff_pattern(path: &str, old: &Option<String>, new: &Option<String>, out: &mut Vec<Change>) {
    if old == new {
        return;
    }
    // Conservative: any pattern change — add, remove, or rewrite — is
    // reported as a tightening.
    out.push(
        Change::new(format!("{path}.pattern"), ChangeKind::ConstraintTightened).with_values(
            old.clone().map(Value::from),
            new.clone().map(Value::from),
        ),
    );
}

fn diff_default(path: &str, old: &SchemaNode, new: &SchemaNode, out: &mut Vec<Change>) {
    let kind = match (&old.default, &new.default) {
        (None, None) => return,
        (None, Some(_)) => ChangeKind::DefaultAdded,
        (Some(_), None) => ChangeKind::DefaultRemoved,
        (Some(o), Some(n)) if o == n => return,
        (Some(_), Some(_)) => ChangeKind::DefaultChanged,
    };
    out.push(
        Change::new(format!("{path}.default"), kind)
            .with_values(old.default.clone(), new.default.clone()),
    );
}

fn diff_nullable(path: &str, old: &SchemaNode, new: &SchemaNode, out: &mut Vec<Change>) {
    if !old.nullable && new.nullable {
        out.push(Change::new(path, ChangeKind::NullableAdded));
    } else if old.nullable && !new.nullable {
        out.push(Change::new(path, ChangeKind::NullableRemoved));
    }
}

fn diff_properties(path: &str, old: &SchemaNode, new: &SchemaNode, out: &mut Vec<Change>) {
    let mut names: Vec<&String> = old
        .properties
        .keys()
        .chain(new.properties.keys())
        .collect();
    names.sort();
    names.dedup();

    for name in names {
        let child_path = format!("{path}.properties.{name}");
        match (old.properties.get(name), new.properties.get(name)) {
            (None, Some(_)) => out.push(Change::new(child_path, ChangeKind::PropertyAdded)),
            (Some(_), None) => out.push(Change::new(child_path, ChangeKind::PropertyRemoved)),
            (Some(o), Some(n)) => diff_node(&child_path, o, n, out),
            (None, None) => unreachable!(),
        }
    }
}

fn diff_items(path: &str, old: &SchemaNode, new: &SchemaNode, out: &mut Vec<Change>) {
    if let (Some(o), Some(n)) = (&old.items, &new.items) {
        diff_node(&format!("{path}.items"), o, n, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn node(schema: Value) -> SchemaNode {
        SchemaNode::parse(&schema, &Map::new()).unwrap()
    }

    #[test]
    fn identical_schemas_produce_no_changes() {
        let schema = node(json!({ "type": "object", "properties": { "id": { "type": "integer" } } }));
        assert_eq!(diff(&schema, &schema), Vec::new());
    }

    #[test]
    fn detects_property_added() {
        let old = node(json!({ "type": "object", "properties": { "id": { "type": "integer" } } }));
        let new = node(json!({
            "type": "object",
            "properties": { "id": { "type": "integer" }, "name": { "type": "string" } }
        }));
        let changes = diff(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::PropertyAdded);
        assert_eq!(changes[0].path, "$.properties.name");
    }

    #[test]
    fn detects_type_narrowed_precedence_over_changed() {
        let old = node(json!({ "type": ["string", "integer"] }));
        let new = node(json!({ "type": "string" }));
        let changes = diff(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::TypeNarrowed);
    }

    #[test]
    fn detects_type_changed_when_disjoint() {
        let old = node(json!({ "type": "integer" }));
        let new = node(json!({ "type": "string" }));
        let changes = diff(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::TypeChanged);
    }

    #[test]
    fn required_added_for_existing_property() {
        let old = node(json!({
            "type": "object",
            "properties": { "id": { "type": "integer" } }
        }));
        let new = node(json!({
            "type": "object",
            "properties": { "id": { "type": "integer" } },
            "required": ["id"]
        }));
        let changes = diff(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::RequiredAdded);
        assert_eq!(changes[0].path, "$.properties.id");
    }

    #[test]
    fn constraint_tightened_on_minimum_increase() {
        let old = node(json!({ "type": "integer", "minimum": 0 }));
        let new = node(json!({ "type": "integer", "minimum": 5 }));
        let changes = diff(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::ConstraintTightened);
    }

    #[test]
    fn constraint_relaxed_on_maximum_increase() {
        let old = node(json!({ "type": "integer", "maximum": 10 }));
        let new = node(json!({ "type": "integer", "maximum": 20 }));
        let changes = diff(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::ConstraintRelaxed);
    }

    #[test]
    fn nested_property_diff_yields_one_change_per_path_no_aggregation() {
        let old = node(json!({
            "type": "object",
            "properties": {
                "address": {
                    "type": "object",
                    "properties": {
                        "city": { "type": "string" },
                        "zip": { "type": "string" }
                    }
                }
            }
        }));
        let new = node(json!({
            "type": "object",
            "properties": {
                "address": {
                    "type": "object",
                    "properties": {
                        "city": { "type": "integer" },
                        "zip": { "type": "string", "minLength": 5 }
                    }
                }
            }
        }));
        let changes = diff(&old, &new);
        assert_eq!(changes.len(), 2);
        assert!(changes
            .iter()
            .any(|c| c.path == "$.properties.address.properties.city"
                && c.kind == ChangeKind::TypeChanged));
        assert!(changes
            .iter()
            .any(|c| c.path == "$.properties.address.properties.zip"
                && c.kind == ChangeKind::ConstraintTightened));
    }

    #[test]
    fn items_diff_is_path_qualified() {
        let old = node(json!({ "type": "array", "items": { "type": "string" } }));
        let new = node(json!({ "type": "array", "items": { "type": "integer" } }));
        let changes = diff(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "$.items");
        assert_eq!(changes[0].kind, ChangeKind::TypeChanged);
    }

    #[test]
    fn diff_is_deterministic_across_runs() {
        let old = node(json!({
            "type": "object",
            "properties": { "a": {"type": "string"}, "b": {"type": "integer"} }
        }));
        let new = node(json!({
            "type": "object",
            "properties": { "a": {"type": "number"}, "b": {"type": "number"}, "c": {"type": "boolean"} }
        }));
        let first = diff(&old, &new);
        let second = diff(&old, &new);
        assert_eq!(first, second);
    }

    #[test]
    fn nullable_toggle_detected() {
        let old = node(json!({ "type": "string" }));
        let new = node(json!({ "type": "string", "nullable": true }));
        let changes = diff(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::NullableAdded);
    }
}
