//! Metadata matching for the event delegate.

use serde::{Deserialize, Serialize};

/// An attribute/value/units triple attached to a namespace entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub attribute: String,
    pub value: String,
    #[serde(default)]
    pub units: String,
}

impl MetadataEntry {
    pub fn new(
        attribute: impl Into<String>,
        value: impl Into<String>,
        units: impl Into<String>,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
            units: units.into(),
        }
    }
}

/// A match rule sourced from a policy descriptor. Each field is optional;
/// only non-empty fields participate in the comparison. `entity_type` is
/// evaluated by the delegate against the triggering parameters, not against
/// candidate metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSpec {
    #[serde(default)]
    pub attribute: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default)]
    pub entity_type: Option<String>,
}

/// Which fields of a [`MatchSpec`] are populated and must compare equal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComparisonFields {
    pub attribute: bool,
    pub value: bool,
    pub units: bool,
}

impl ComparisonFields {
    pub fn is_empty(&self) -> bool {
        !(self.attribute || self.value || self.units)
    }
}

impl MatchSpec {
    /// Build the comparison mask from the populated fields.
    pub fn comparison_fields(&self) -> ComparisonFields {
        let populated = |field: &Option<String>| field.as_deref().is_some_and(|s| !s.is_empty());
        ComparisonFields {
            attribute: populated(&self.attribute),
            value: populated(&self.value),
            units: populated(&self.units),
        }
    }
}

/// Return the first candidate whose masked fields equal the specification's.
///
/// An empty specification never matches; without this rule a descriptor with
/// no populated fields would fire on every ancestor carrying any metadata.
pub fn match_metadata<'a>(
    spec: &MatchSpec,
    candidates: &'a [MetadataEntry],
) -> Option<&'a MetadataEntry> {
    let fields = spec.comparison_fields();
    if fields.is_empty() {
        return None;
    }

    candidates.iter().find(|entry| {
        (!fields.attribute || spec.attribute.as_deref() == Some(entry.attribute.as_str()))
            && (!fields.value || spec.value.as_deref() == Some(entry.value.as_str()))
            && (!fields.units || spec.units.as_deref() == Some(entry.units.as_str()))
    })
}
