//! Application schema entities: elements, attributes and relations.

use std::fmt;

use crate::base_model::{BaseRelation, RelationRange, RelationType};
use crate::datatype::DataType;

/// Application element id.
pub type Aid = u64;

/// Instance id, unique per application element.
pub type Iid = u64;

/// Attribute number, unique per application element and used as storage key.
pub type AttrNo = u32;

/// Index of a relation in the cache's relation arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelId(pub(crate) usize);

impl RelId {
    /// Returns the arena index.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for RelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An application attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationAttribute {
    pub(crate) attr_no: AttrNo,
    pub(crate) name: String,
    pub(crate) base_name: Option<String>,
    pub(crate) data_type: DataType,
    pub(crate) length: i32,
    pub(crate) obligatory: bool,
    pub(crate) unique: bool,
}

impl ApplicationAttribute {
    /// Attribute number (storage key).
    pub fn attr_no(&self) -> AttrNo {
        self.attr_no
    }

    /// Attribute name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the base attribute this attribute maps, if any.
    pub fn base_name(&self) -> Option<&str> {
        self.base_name.as_deref()
    }

    /// Returns true if this attribute maps the given base attribute.
    pub fn is_base(&self, base_name: &str) -> bool {
        self.base_name
            .as_deref()
            .is_some_and(|b| b.eq_ignore_ascii_case(base_name))
    }

    /// Data type.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Maximum length (strings), 0 when unrestricted.
    pub fn length(&self) -> i32 {
        self.length
    }

    /// Whether a value is mandatory.
    pub fn is_obligatory(&self) -> bool {
        self.obligatory
    }

    /// Whether values must be unique.
    pub fn is_unique(&self) -> bool {
        self.unique
    }
}

/// An application element.
#[derive(Debug, Clone)]
pub struct ApplicationElement {
    pub(crate) aid: Aid,
    pub(crate) name: String,
    pub(crate) base_name: String,
    pub(crate) attributes: Vec<ApplicationAttribute>,
    pub(crate) relations: Vec<RelId>,
    pub(crate) next_attr_no: AttrNo,
}

impl ApplicationElement {
    pub(crate) fn new(aid: Aid, name: String, base_name: String) -> Self {
        Self {
            aid,
            name,
            base_name,
            attributes: Vec::new(),
            relations: Vec::new(),
            next_attr_no: 1,
        }
    }

    /// Element id.
    pub fn aid(&self) -> Aid {
        self.aid
    }

    /// Element name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the base element, e.g. `AoMeasurement`.
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Attributes in creation order.
    pub fn attributes(&self) -> &[ApplicationAttribute] {
        &self.attributes
    }

    /// Relations where this element is the source, in creation order.
    pub fn relation_ids(&self) -> &[RelId] {
        &self.relations
    }

    /// Looks up an attribute by number.
    pub fn attribute(&self, attr_no: AttrNo) -> Option<&ApplicationAttribute> {
        self.attributes.iter().find(|a| a.attr_no == attr_no)
    }

    /// Looks up an attribute by name.
    pub fn attribute_by_name(&self, name: &str) -> Option<&ApplicationAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Looks up the attribute mapping a base attribute (case-insensitive).
    pub fn attribute_by_base_name(&self, base_name: &str) -> Option<&ApplicationAttribute> {
        self.attributes.iter().find(|a| a.is_base(base_name))
    }

    pub(crate) fn attribute_mut(&mut self, attr_no: AttrNo) -> Option<&mut ApplicationAttribute> {
        self.attributes.iter_mut().find(|a| a.attr_no == attr_no)
    }
}

/// Binding state of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationState {
    /// Neither element is set.
    Unbound,
    /// Exactly one element is set (transient during schema construction).
    HalfBound,
    /// Both elements are set; only bound relations carry instance links.
    Bound,
}

/// A directed application relation `elem1 -> elem2`.
///
/// Every relation lives in the arena together with its inverse.
#[derive(Debug, Clone)]
pub struct ApplicationRelation {
    pub(crate) id: RelId,
    pub(crate) inverse: RelId,
    pub(crate) name: String,
    pub(crate) elem1: Option<Aid>,
    pub(crate) elem2: Option<Aid>,
    pub(crate) base_name: Option<String>,
    pub(crate) base_relation: Option<BaseRelation>,
    pub(crate) relation_type: RelationType,
    pub(crate) range: RelationRange,
    pub(crate) explicit_range: bool,
}

impl ApplicationRelation {
    /// Arena id.
    pub fn id(&self) -> RelId {
        self.id
    }

    /// Arena id of the inverse relation.
    pub fn inverse(&self) -> RelId {
        self.inverse
    }

    /// Relation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source element.
    pub fn elem1(&self) -> Option<Aid> {
        self.elem1
    }

    /// Target element.
    pub fn elem2(&self) -> Option<Aid> {
        self.elem2
    }

    /// Requested base relation name, if any.
    pub fn base_name(&self) -> Option<&str> {
        self.base_name.as_deref()
    }

    /// Resolved base relation branch, if any.
    pub fn base_relation(&self) -> Option<&BaseRelation> {
        self.base_relation.as_ref()
    }

    /// Relation type.
    pub fn relation_type(&self) -> RelationType {
        self.relation_type
    }

    /// Cardinality range.
    pub fn range(&self) -> RelationRange {
        self.range
    }

    /// Returns true if at most one instance may be related.
    pub fn is_to_one(&self) -> bool {
        self.range.is_to_one()
    }

    /// Binding state.
    pub fn state(&self) -> RelationState {
        match (self.elem1, self.elem2) {
            (Some(_), Some(_)) => RelationState::Bound,
            (None, None) => RelationState::Unbound,
            _ => RelationState::HalfBound,
        }
    }

    /// Returns true if both elements are set.
    pub fn is_bound(&self) -> bool {
        self.state() == RelationState::Bound
    }
}

/// Definition of a relation pair passed to
/// [`AtfxCache::add_relation`](crate::AtfxCache::add_relation).
#[derive(Debug, Clone, Default)]
pub struct RelationDef {
    /// Relation name on `elem1`.
    pub name: String,
    /// Name of the inverse relation on `elem2`.
    pub inverse_name: String,
    /// Source element.
    pub elem1: Option<Aid>,
    /// Target element.
    pub elem2: Option<Aid>,
    /// Base relation name, resolved once the relation is bound.
    pub base_relation: Option<String>,
    /// Relation type; taken from the base relation when unset.
    pub relation_type: Option<RelationType>,
    /// Cardinality; taken from the base relation when unset.
    pub range: Option<RelationRange>,
    /// Cardinality of the inverse; taken from the inverse base relation when unset.
    pub inverse_range: Option<RelationRange>,
}

impl RelationDef {
    /// Creates a bound relation definition.
    pub fn new(
        name: impl Into<String>,
        inverse_name: impl Into<String>,
        elem1: Aid,
        elem2: Aid,
    ) -> Self {
        Self {
            name: name.into(),
            inverse_name: inverse_name.into(),
            elem1: Some(elem1),
            elem2: Some(elem2),
            ..Default::default()
        }
    }

    /// Creates a definition without elements; bind it later with
    /// [`AtfxCache::bind_relation`](crate::AtfxCache::bind_relation).
    pub fn unbound(name: impl Into<String>, inverse_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inverse_name: inverse_name.into(),
            ..Default::default()
        }
    }

    /// Derives the relation from a base relation.
    pub fn with_base(mut self, base_relation: impl Into<String>) -> Self {
        self.base_relation = Some(base_relation.into());
        self
    }

    /// Sets the relation type.
    pub fn with_type(mut self, relation_type: RelationType) -> Self {
        self.relation_type = Some(relation_type);
        self
    }

    /// Sets the cardinality range.
    pub fn with_range(mut self, range: RelationRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Sets the cardinality range of the inverse.
    pub fn with_inverse_range(mut self, range: RelationRange) -> Self {
        self.inverse_range = Some(range);
        self
    }
}
