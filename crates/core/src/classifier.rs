//! Folds a change list into a severity under a compatibility mode.

use serde::{Deserialize, Serialize};

use crate::differ::{Change, ChangeKind};
use crate::entities::{ChangeType, CompatibilityMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Patch,
    Minor,
    Major,
}

impl From<Severity> for ChangeType {
    fn from(s: Severity) -> Self {
        match s {
            Severity::Patch => ChangeType::Patch,
            Severity::Minor => ChangeType::Minor,
            Severity::Major => ChangeType::Major,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub severity: Severity,
    pub breaking: Vec<Change>,
}

/// Whether a change of `kind` is breaking under compatibility mode `mode`.
///
/// A brand-new required property produces two changes at the same path
/// (`property_added` and `required_added`); their breaking-ness is decided
/// independently and the severity table's "property_added (required)" row
/// falls out of that combination without special-casing.
fn is_breaking(kind: ChangeKind, mode: CompatibilityMode) -> bool {
    use ChangeKind::*;
    use CompatibilityMode::*;

    if mode == CompatibilityMode::None {
        return false;
    }
    if mode == CompatibilityMode::Full {
        return !matches!(kind, DefaultAdded | DefaultRemoved | DefaultChanged);
    }

    match (kind, mode) {
        (PropertyAdded, Backward) => false,
        (PropertyAdded, Forward) => true,
        (PropertyRemoved, Backward) => true,
        (PropertyRemoved, Forward) => false,
        (RequiredAdded, Backward) => true,
        (RequiredAdded, Forward) => false,
        (RequiredRemoved, Backward) => false,
        (RequiredRemoved, Forward) => true,
        (TypeWidened, Backward) => false,
        (TypeWidened, Forward) => true,
        (TypeNarrowed, Backward) => true,
        (TypeNarrowed, Forward) => false,
        (TypeChanged, Backward) => true,
        (TypeChanged, Forward) => true,
        (EnumValuesAdded, Backward) => false,
        (EnumValuesAdded, Forward) => true,
        (EnumValuesRemoved, Backward) => true,
        (EnumValuesRemoved, Forward) => false,
        (EnumValuesChanged, Backward) => true,
        (EnumValuesChanged, Forward) => true,
        (ConstraintTightened, Backward) => true,
        (ConstraintTightened, Forward) => false,
        (ConstraintRelaxed, Backward) => false,
        (ConstraintRelaxed, Forward) => true,
        (NullableAdded, Backward) => false,
        (NullableAdded, Forward) => true,
        (NullableRemoved, Backward) => true,
        (NullableRemoved, Forward) => false,
        (DefaultAdded | DefaultRemoved | DefaultChanged, _) => false,
        (_, None) => false,
        (_, Full) => unreachable!("Full handled above"),
    }
}

/// A change is "structural" (promotes a non-breaking severity from patch to
/// minor) when it is a property/required/type/enum/nullable change, as
/// opposed to a mere constraint or default tweak.
fn is_structural(kind: ChangeKind) -> bool {
    use ChangeKind::*;
    matches!(
        kind,
        PropertyAdded
            | PropertyRemoved
            | RequiredAdded
            | RequiredRemoved
            | TypeWidened
            | TypeNarrowed
            | TypeChanged
            | EnumValuesAdded
            | EnumValuesRemoved
            | EnumValuesChanged
            | NullableAdded
            | NullableRemoved
    )
}

/// Classify a change list under a compatibility mode.
pub fn classify(changes: &[Change], mode: CompatibilityMode) -> Classification {
    let breaking: Vec<Change> = changes
        .iter()
        .filter(|c| is_breaking(c.kind, mode))
        .cloned()
        .collect();

    let severity = if !breaking.is_empty() {
        Severity::Major
    } else if changes.iter().any(|c| is_structural(c.kind)) {
        Severity::Minor
    } else if changes.is_empty() {
        Severity::Patch
    } else {
        Severity::Patch
    };

    Classification { severity, breaking }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::differ::diff;
    use crate::schema::SchemaNode;
    use serde_json::{json, Map};

    fn node(schema: serde_json::Value) -> SchemaNode {
        SchemaNode::parse(&schema, &Map::new()).unwrap()
    }

    #[test]
    fn no_changes_is_patch_with_no_breaking() {
        let schema = node(json!({ "type": "object" }));
        let result = classify(&diff(&schema, &schema), CompatibilityMode::Backward);
        assert_eq!(result.severity, Severity::Patch);
        assert!(result.breaking.is_empty());
    }

    #[test]
    fn optional_property_added_backward_is_minor_not_breaking() {
        let old = node(json!({ "type": "object", "properties": { "id": {"type": "integer"} } }));
        let new = node(json!({
            "type": "object",
            "properties": { "id": {"type": "integer"}, "name": {"type": "string"} }
        }));
        let result = classify(&diff(&old, &new), CompatibilityMode::Backward);
        assert_eq!(result.severity, Severity::Minor);
        assert!(result.breaking.is_empty());
    }

    #[test]
    fn type_changed_is_major_under_every_mode_but_none() {
        let old = node(json!({ "type": "integer" }));
        let new = node(json!({ "type": "string" }));
        let changes = diff(&old, &new);
        for mode in [
            CompatibilityMode::Backward,
            CompatibilityMode::Forward,
            CompatibilityMode::Full,
        ] {
            let result = classify(&changes, mode);
            assert_eq!(result.severity, Severity::Major);
            assert_eq!(result.breaking.len(), 1);
        }
        let result = classify(&changes, CompatibilityMode::None);
        assert_eq!(result.severity, Severity::Patch);
        assert!(result.breaking.is_empty());
    }

    #[test]
    fn property_removal_breaking_under_backward_not_forward() {
        let old = node(json!({
            "type": "object",
            "properties": { "id": {"type": "integer"}, "extra": {"type": "string"} }
        }));
        let new = node(json!({ "type": "object", "properties": { "id": {"type": "integer"} } }));
        let changes = diff(&old, &new);

        let backward = classify(&changes, CompatibilityMode::Backward);
        assert_eq!(backward.severity, Severity::Major);

        let forward = classify(&changes, CompatibilityMode::Forward);
        assert_eq!(forward.severity, Severity::Minor);
        assert!(forward.breaking.is_empty());
    }

    #[test]
    fn non_major_severity_implies_no_breaking_changes() {
        // Property-based sanity check (invariant 5 of the testable properties).
        let old = node(json!({ "type": "integer", "minimum": 0 }));
        let new = node(json!({ "type": "integer", "minimum": 1 }));
        let changes = diff(&old, &new);
        for mode in [
            CompatibilityMode::Backward,
            CompatibilityMode::Forward,
            CompatibilityMode::Full,
            CompatibilityMode::None,
        ] {
            let result = classify(&changes, mode);
            if result.severity != Severity::Major {
                assert!(result.breaking.is_empty());
            }
        }
    }

    #[test]
    fn default_only_change_is_patch() {
        let old = node(json!({ "type": "integer", "default": 1 }));
        let new = node(json!({ "type": "integer", "default": 2 }));
        let changes = diff(&old, &new);
        let result = classify(&changes, CompatibilityMode::Full);
        assert_eq!(result.severity, Severity::Patch);
        assert!(result.breaking.is_empty());
    }
}
