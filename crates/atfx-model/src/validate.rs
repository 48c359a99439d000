//! Explicit model validation.
//!
//! Validation is never run implicitly; schema construction accepts
//! half-finished models (unbound relations, unnamed attributes) and
//! [`AtfxCache::validate`] is called once loading is complete.

use crate::cache::AtfxCache;
use crate::error::{AtfxError, AtfxResult};
use crate::schema::ApplicationRelation;

/// Maximum length of element, attribute and relation names.
pub const MAX_NAME_LENGTH: usize = 30;

impl AtfxCache {
    /// Validates the application model and reports the first violation.
    ///
    /// Checks, per element in aid order:
    /// - name lengths of the element, its attributes and relations
    ///   (`1..=MAX_NAME_LENGTH` characters);
    /// - every obligatory base attribute is mapped by an application attribute;
    /// - every relation is bound, has a back-pointing inverse and, when a base
    ///   relation was requested, resolved to a branch.
    pub fn validate(&self) -> AtfxResult<()> {
        for element in self.elements() {
            check_name("application element", &element.name, &element.name)?;

            for attr in element.attributes() {
                check_name("application attribute", &element.name, attr.name())?;
            }

            let base = self.base_element_of(element.aid())?;
            for base_attr in base.attributes.iter().filter(|a| a.obligatory) {
                if element.attribute_by_base_name(&base_attr.name).is_none() {
                    return Err(AtfxError::not_found(format!(
                        "obligatory base attribute '{}' of '{}' is not mapped",
                        base_attr.name, element.name
                    )));
                }
            }

            for rel in element.relation_ids() {
                let relation = self.relation(*rel)?;
                check_name("application relation", &element.name, relation.name())?;
                self.check_relation(relation)?;
            }
        }

        // relations without a source element are not reachable through elements
        for relation in self.all_relations().filter(|r| r.elem1().is_none()) {
            self.check_relation(relation)?;
        }
        Ok(())
    }

    fn check_relation(&self, relation: &ApplicationRelation) -> AtfxResult<()> {
        if !relation.is_bound() {
            return Err(AtfxError::invalid_relation(format!(
                "relation '{}' is not bound to two elements",
                relation.name()
            )));
        }
        let inverse = self.relation(relation.inverse()).map_err(|_| {
            AtfxError::invalid_relation(format!(
                "inverse of relation '{}' is missing",
                relation.name()
            ))
        })?;
        if inverse.inverse() != relation.id()
            || inverse.elem1() != relation.elem2()
            || inverse.elem2() != relation.elem1()
        {
            return Err(AtfxError::invalid_relation(format!(
                "inverse '{}' does not point back to relation '{}'",
                inverse.name(),
                relation.name()
            )));
        }
        if let (Some(base_name), None) = (relation.base_name(), relation.base_relation()) {
            return Err(AtfxError::invalid_relation(format!(
                "base relation '{}' of relation '{}' has no branch for the bound target",
                base_name,
                relation.name()
            )));
        }
        Ok(())
    }
}

fn check_name(what: &str, owner: &str, name: &str) -> AtfxResult<()> {
    let len = name.chars().count();
    if len == 0 || len > MAX_NAME_LENGTH {
        return Err(AtfxError::bad_parameter(format!(
            "{} name '{}' of '{}' must have 1 to {} characters",
            what, name, owner, MAX_NAME_LENGTH
        )));
    }
    Ok(())
}
