//! The fixed, versioned base metamodel.
//!
//! Application elements, attributes and relations derive from the entries of
//! a [`BaseModel`]. The model is data: it is deserialized from JSON, and a
//! subset of the ASAM ODS base model is bundled with the crate
//! ([`BaseModel::asam_ods`]).
//!
//! A base relation may target a choice of base elements. Such a relation
//! appears once per target in the owning element's relation list, all
//! entries sharing the same name (e.g. `AoSubTest.parent_test` targets
//! `AoTest` or `AoSubTest`).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::datatype::DataType;
use crate::error::{AtfxError, AtfxResult};

const ASAM_ODS_BASE: &str = include_str!("asam_ods_base.json");

/// Relation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RelationType {
    /// Informational relation.
    #[default]
    #[serde(rename = "INFO")]
    Info,
    /// Father/child (composition) relation.
    #[serde(rename = "FATHER_CHILD")]
    FatherChild,
    /// Inheritance relation.
    #[serde(rename = "INHERITANCE")]
    Inheritance,
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationType::Info => write!(f, "INFO"),
            RelationType::FatherChild => write!(f, "FATHER_CHILD"),
            RelationType::Inheritance => write!(f, "INHERITANCE"),
        }
    }
}

/// Cardinality range of a relation; `max == -1` means to-many.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationRange {
    /// Minimum number of related instances.
    pub min: i16,
    /// Maximum number of related instances, `-1` for unbounded.
    pub max: i16,
}

impl RelationRange {
    /// Creates a range.
    pub fn new(min: i16, max: i16) -> Self {
        Self { min, max }
    }

    /// `[0..1]`
    pub fn to_one() -> Self {
        Self { min: 0, max: 1 }
    }

    /// `[0..*]`
    pub fn to_many() -> Self {
        Self { min: 0, max: -1 }
    }

    /// Returns true if at most one instance may be related.
    pub fn is_to_one(&self) -> bool {
        self.max == 1
    }

    /// Returns true if the maximum is unbounded.
    pub fn is_to_many(&self) -> bool {
        self.max == -1
    }
}

impl Default for RelationRange {
    fn default() -> Self {
        Self::to_many()
    }
}

impl fmt::Display for RelationRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.max < 0 {
            write!(f, "[{}..*]", self.min)
        } else {
            write!(f, "[{}..{}]", self.min, self.max)
        }
    }
}

/// Attribute of a base element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseAttribute {
    /// Base attribute name, e.g. `name`.
    pub name: String,
    /// Data type.
    pub data_type: DataType,
    /// Whether an application element must map this attribute.
    #[serde(default)]
    pub obligatory: bool,
    /// Whether values must be unique.
    #[serde(default)]
    pub unique: bool,
}

/// One target branch of a base relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseRelation {
    /// Relation name.
    pub name: String,
    /// Name of the inverse base relation on the target element.
    #[serde(default)]
    pub inverse_name: Option<String>,
    /// Target base element name.
    pub target: String,
    /// Relation type.
    pub relation_type: RelationType,
    /// Minimum cardinality.
    pub min: i16,
    /// Maximum cardinality, `-1` for unbounded.
    pub max: i16,
}

impl BaseRelation {
    /// Returns the default cardinality range.
    pub fn range(&self) -> RelationRange {
        RelationRange::new(self.min, self.max)
    }
}

/// A base element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseElement {
    /// Base element name, e.g. `AoMeasurement`.
    pub name: String,
    /// Whether instances may exist without a parent.
    #[serde(default)]
    pub top_level: bool,
    /// Base attributes.
    #[serde(default)]
    pub attributes: Vec<BaseAttribute>,
    /// Base relations, one entry per target branch.
    #[serde(default)]
    pub relations: Vec<BaseRelation>,
}

impl BaseElement {
    /// Looks up a base attribute (case-insensitive).
    pub fn attribute(&self, name: &str) -> Option<&BaseAttribute> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// Returns all branches of the named base relation.
    pub fn relations_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a BaseRelation> {
        self.relations
            .iter()
            .filter(move |r| r.name.eq_ignore_ascii_case(name))
    }

    /// Resolves the branch of a base relation that targets `target_base`.
    ///
    /// Linear search over the relation list matching name and target.
    pub fn resolve_relation(&self, name: &str, target_base: &str) -> Option<&BaseRelation> {
        self.relations.iter().find(|r| {
            r.name.eq_ignore_ascii_case(name) && r.target.eq_ignore_ascii_case(target_base)
        })
    }
}

/// The base metamodel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseModel {
    /// Base model version, e.g. `asam31`.
    pub version: String,
    /// Attributes shared by all base elements.
    #[serde(default)]
    pub common_attributes: Vec<BaseAttribute>,
    /// Base elements.
    pub elements: Vec<BaseElement>,
}

impl BaseModel {
    /// Parses a base model from JSON.
    ///
    /// Common attributes are merged into every element that does not declare
    /// an attribute of the same name itself.
    pub fn from_json(json: &str) -> AtfxResult<Self> {
        let mut model: BaseModel = serde_json::from_str(json)
            .map_err(|e| AtfxError::bad_parameter(format!("invalid base model: {}", e)))?;
        let common = model.common_attributes.clone();
        for element in &mut model.elements {
            let mut merged: Vec<BaseAttribute> = common
                .iter()
                .filter(|c| element.attribute(&c.name).is_none())
                .cloned()
                .collect();
            merged.append(&mut element.attributes);
            element.attributes = merged;
        }
        Ok(model)
    }

    /// Returns the bundled ASAM ODS base model subset.
    pub fn asam_ods() -> AtfxResult<Self> {
        Self::from_json(ASAM_ODS_BASE)
    }

    /// Looks up a base element (case-insensitive).
    pub fn element(&self, name: &str) -> Option<&BaseElement> {
        self.elements
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_model_parses() {
        let model = BaseModel::asam_ods().unwrap();
        assert_eq!(model.version, "asam31");
        let ec = model.element("aoexternalcomponent").unwrap();
        assert_eq!(ec.name, "AoExternalComponent");
        assert!(ec.attribute("start_offset").is_some());
        // common attributes merged in front
        assert_eq!(ec.attributes[0].name, "id");
        assert!(ec.attribute("name").unwrap().obligatory);
    }

    #[test]
    fn test_resolve_branch_by_target() {
        let model = BaseModel::asam_ods().unwrap();
        let sub_test = model.element("AoSubTest").unwrap();
        assert_eq!(sub_test.relations_named("parent_test").count(), 2);

        let to_test = sub_test.resolve_relation("parent_test", "AoTest").unwrap();
        assert_eq!(to_test.target, "AoTest");
        let to_meas = sub_test.resolve_relation("children", "AoMeasurement").unwrap();
        assert_eq!(to_meas.inverse_name.as_deref(), Some("test"));
        assert!(sub_test.resolve_relation("children", "AoUnit").is_none());
    }

    #[test]
    fn test_resolved_branch_outlives_lookup_names() {
        let model = BaseModel::asam_ods().unwrap();
        let sub_test = model.element("AoSubTest").unwrap();
        let branch = {
            let name = String::from("PARENT_TEST");
            let target = String::from("aosubtest");
            sub_test.resolve_relation(&name, &target)
        };
        assert_eq!(branch.map(|r| r.target.as_str()), Some("AoSubTest"));
    }

    #[test]
    fn test_invalid_json() {
        let err = BaseModel::from_json("{").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::BadParameter);
    }

    #[test]
    fn test_relation_range() {
        assert!(RelationRange::to_one().is_to_one());
        assert!(RelationRange::to_many().is_to_many());
        assert_eq!(RelationRange::new(1, 1).to_string(), "[1..1]");
        assert_eq!(RelationRange::to_many().to_string(), "[0..*]");
    }
}
