//! Relation engine.
//!
//! Relations are stored in an arena indexed by [`RelId`]; every relation is
//! created together with its inverse. Instance links are only ever changed
//! through the crate-private `connect` and `disconnect` primitives, which always
//! update both directions, so for every relation `R` with inverse `R'`:
//!
//! ```text
//! j ∈ related_ids(A, i, R)  <=>  i ∈ related_ids(B, j, R')
//! ```
//!
//! Relations with a maximum cardinality of one replace their target instead
//! of accumulating, on either side of the pair.

use tracing::{debug, warn};

use crate::base_model::{RelationRange, RelationType};
use crate::cache::AtfxCache;
use crate::error::{AtfxError, AtfxResult};
use crate::schema::{Aid, ApplicationRelation, Iid, RelId, RelationDef};

impl AtfxCache {
    /// Adds a relation together with its inverse.
    ///
    /// Both elements are optional; a relation missing one or both elements
    /// can be completed later with [`bind_relation`](Self::bind_relation).
    /// Once bound, every existing instance of both elements gets an empty link
    /// set for its side of the pair.
    pub fn add_relation(&mut self, def: RelationDef) -> AtfxResult<RelId> {
        for aid in [def.elem1, def.elem2].into_iter().flatten() {
            self.element(aid)?;
        }
        if let Some(elem1) = def.elem1 {
            self.check_relation_name(elem1, &def.name)?;
        }
        if let Some(elem2) = def.elem2 {
            self.check_relation_name(elem2, &def.inverse_name)?;
        }

        let rel = RelId(self.relations.len());
        let inv = RelId(self.relations.len() + 1);
        let relation_type = def.relation_type.unwrap_or_default();
        self.relations.push(Some(ApplicationRelation {
            id: rel,
            inverse: inv,
            name: def.name,
            elem1: def.elem1,
            elem2: def.elem2,
            base_name: def.base_relation,
            base_relation: None,
            relation_type,
            range: def.range.unwrap_or_default(),
            explicit_range: def.range.is_some(),
        }));
        self.relations.push(Some(ApplicationRelation {
            id: inv,
            inverse: rel,
            name: def.inverse_name,
            elem1: def.elem2,
            elem2: def.elem1,
            base_name: None,
            base_relation: None,
            relation_type,
            range: def.inverse_range.unwrap_or_default(),
            explicit_range: def.inverse_range.is_some(),
        }));

        self.attach(rel)?;
        self.attach(inv)?;
        if self.relation(rel)?.is_bound() {
            self.complete_binding(rel)?;
        }
        Ok(rel)
    }

    /// Sets the missing element(s) of an unbound or half-bound relation.
    ///
    /// When the relation becomes bound its base relation is resolved against
    /// the concrete base types of both elements and link sets are prepared.
    pub fn bind_relation(
        &mut self,
        rel: RelId,
        elem1: Option<Aid>,
        elem2: Option<Aid>,
    ) -> AtfxResult<()> {
        let relation = self.relation(rel)?;
        if relation.is_bound() {
            return Err(AtfxError::invalid_relation(format!(
                "relation '{}' is already bound",
                relation.name
            )));
        }
        let (name, inverse, inverse_name) = (
            relation.name.clone(),
            relation.inverse,
            self.relation(relation.inverse)?.name.clone(),
        );
        let new_elem1 = elem1.or(relation.elem1);
        let new_elem2 = elem2.or(relation.elem2);
        if let Some(aid) = elem1.filter(|a| relation.elem1 != Some(*a)) {
            self.element(aid)?;
            self.check_relation_name(aid, &name)?;
        }
        if let Some(aid) = elem2.filter(|a| relation.elem2 != Some(*a)) {
            self.element(aid)?;
            self.check_relation_name(aid, &inverse_name)?;
        }

        self.detach(rel);
        self.detach(inverse);
        if let Some(r) = self.relations[rel.0].as_mut() {
            r.elem1 = new_elem1;
            r.elem2 = new_elem2;
        }
        if let Some(r) = self.relations[inverse.0].as_mut() {
            r.elem1 = new_elem2;
            r.elem2 = new_elem1;
        }
        self.attach(rel)?;
        self.attach(inverse)?;
        if self.relation(rel)?.is_bound() {
            self.complete_binding(rel)?;
        }
        Ok(())
    }

    /// Removes a relation, its inverse and all their instance links.
    pub fn remove_relation(&mut self, rel: RelId) -> AtfxResult<()> {
        let relation = self.relation(rel)?;
        let inverse = relation.inverse;
        let name = relation.name.clone();
        for id in [rel, inverse] {
            let owner = self.relation(id)?.elem1;
            if let Some(owner) = owner {
                if let Some(instances) = self.instances.get_mut(&owner) {
                    for inst in instances.values_mut() {
                        inst.links.remove(&id);
                    }
                }
            }
            self.detach(id);
        }
        self.relations[rel.0] = None;
        self.relations[inverse.0] = None;
        debug!(relation = %name, "removed relation pair");
        Ok(())
    }

    /// Returns a relation.
    pub fn relation(&self, rel: RelId) -> AtfxResult<&ApplicationRelation> {
        self.relations
            .get(rel.0)
            .and_then(|r| r.as_ref())
            .ok_or_else(|| AtfxError::not_found(format!("relation {}", rel)))
    }

    /// Returns the inverse of a relation.
    pub fn inverse_of(&self, rel: RelId) -> AtfxResult<&ApplicationRelation> {
        let inverse = self.relation(rel)?.inverse;
        self.relation(inverse)
    }

    /// Returns all live relations in arena order.
    pub fn all_relations(&self) -> impl Iterator<Item = &ApplicationRelation> {
        self.relations.iter().flatten()
    }

    /// Returns the relations where `aid` is the source element.
    pub fn relations_of(&self, aid: Aid) -> AtfxResult<Vec<&ApplicationRelation>> {
        let element = self.element(aid)?;
        element.relations.iter().map(|r| self.relation(*r)).collect()
    }

    /// Looks up a relation of `aid` by name.
    pub fn relation_by_name(&self, aid: Aid, name: &str) -> AtfxResult<&ApplicationRelation> {
        self.relations_of(aid)?
            .into_iter()
            .find(|r| r.name == name)
            .ok_or_else(|| {
                AtfxError::not_found(format!("relation '{}' of element {}", name, aid))
            })
    }

    /// Returns the bound relations leading from `from` to `to`.
    pub fn relations_between(&self, from: Aid, to: Aid) -> Vec<&ApplicationRelation> {
        self.relations
            .iter()
            .flatten()
            .filter(|r| r.elem1 == Some(from) && r.elem2 == Some(to))
            .collect()
    }

    // =========================================================================
    // Links
    // =========================================================================

    /// Links an instance to target instances via a relation.
    ///
    /// On a to-one relation the new target replaces the existing one.
    pub fn link(&mut self, aid: Aid, iid: Iid, rel: RelId, targets: &[Iid]) -> AtfxResult<()> {
        let relation = self.checked_link_relation(aid, iid, rel, targets)?;
        if relation.is_to_one() && targets.len() > 1 {
            return Err(AtfxError::bad_parameter(format!(
                "relation '{}' is to-one, got {} targets",
                relation.name,
                targets.len()
            )));
        }
        for &target in targets {
            self.connect(rel, iid, target)?;
        }
        Ok(())
    }

    /// Removes links to the given target instances; unlinked targets are ignored.
    pub fn unlink(&mut self, aid: Aid, iid: Iid, rel: RelId, targets: &[Iid]) -> AtfxResult<()> {
        self.checked_link_relation(aid, iid, rel, &[])?;
        for &target in targets {
            self.disconnect(rel, iid, target)?;
        }
        Ok(())
    }

    /// Replaces the complete set of targets of an instance.
    pub fn set_links(&mut self, aid: Aid, iid: Iid, rel: RelId, targets: &[Iid]) -> AtfxResult<()> {
        let current = self.related_ids(aid, iid, rel)?;
        self.checked_link_relation(aid, iid, rel, targets)?;
        let stale: Vec<Iid> = current
            .into_iter()
            .filter(|c| !targets.contains(c))
            .collect();
        self.unlink(aid, iid, rel, &stale)?;
        self.link(aid, iid, rel, targets)
    }

    /// Returns the sorted ids of the instances related via `rel`.
    pub fn related_ids(&self, aid: Aid, iid: Iid, rel: RelId) -> AtfxResult<Vec<Iid>> {
        let relation = self.relation(rel)?;
        if relation.elem1 != Some(aid) {
            return Err(AtfxError::not_found(format!(
                "relation '{}' of element {}",
                relation.name, aid
            )));
        }
        Ok(self
            .instance(aid, iid)?
            .links
            .get(&rel)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default())
    }

    /// Single mutation entry point adding a link in both directions.
    pub(crate) fn connect(&mut self, rel: RelId, source: Iid, target: Iid) -> AtfxResult<()> {
        let relation = self.relation(rel)?;
        let inverse = self.relation(relation.inverse)?;
        let (inv, forward_to_one, inverse_to_one) =
            (relation.inverse, relation.is_to_one(), inverse.is_to_one());
        let (a, b) = bound_elements(relation)?;

        if forward_to_one {
            for old in self.link_targets(a, source, rel) {
                if old != target {
                    self.disconnect(rel, source, old)?;
                }
            }
        }
        if inverse_to_one {
            for old in self.link_targets(b, target, inv) {
                if old != source {
                    self.disconnect(inv, target, old)?;
                }
            }
        }

        self.instance_mut(a, source)?
            .links
            .entry(rel)
            .or_default()
            .insert(target);
        self.instance_mut(b, target)?
            .links
            .entry(inv)
            .or_default()
            .insert(source);
        Ok(())
    }

    /// Single mutation entry point removing a link in both directions.
    pub(crate) fn disconnect(&mut self, rel: RelId, source: Iid, target: Iid) -> AtfxResult<()> {
        let relation = self.relation(rel)?;
        let inv = relation.inverse;
        let (a, b) = bound_elements(relation)?;
        if let Ok(inst) = self.instance_mut(a, source) {
            if let Some(set) = inst.links.get_mut(&rel) {
                set.remove(&target);
            }
        }
        if let Ok(inst) = self.instance_mut(b, target) {
            if let Some(set) = inst.links.get_mut(&inv) {
                set.remove(&source);
            }
        }
        Ok(())
    }

    fn link_targets(&self, aid: Aid, iid: Iid, rel: RelId) -> Vec<Iid> {
        self.instance(aid, iid)
            .ok()
            .and_then(|inst| inst.links.get(&rel))
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    fn checked_link_relation(
        &self,
        aid: Aid,
        iid: Iid,
        rel: RelId,
        targets: &[Iid],
    ) -> AtfxResult<&ApplicationRelation> {
        let relation = self.relation(rel)?;
        if relation.elem1 != Some(aid) {
            return Err(AtfxError::invalid_relation(format!(
                "relation '{}' does not start at element {}",
                relation.name, aid
            )));
        }
        let (_, target_aid) = bound_elements(relation)?;
        self.instance(aid, iid)?;
        for &target in targets {
            if !self.instance_exists(target_aid, target) {
                return Err(AtfxError::not_found(format!(
                    "instance {} of element {}",
                    target, target_aid
                )));
            }
        }
        Ok(relation)
    }

    // =========================================================================
    // Binding
    // =========================================================================

    fn check_relation_name(&self, aid: Aid, name: &str) -> AtfxResult<()> {
        let element = self.element(aid)?;
        let clash = element
            .relations
            .iter()
            .filter_map(|r| self.relation(*r).ok())
            .any(|r| r.name == name);
        if clash {
            return Err(AtfxError::duplicate(format!(
                "relation '{}' of '{}'",
                name, element.name
            )));
        }
        Ok(())
    }

    /// Registers a relation with its source element.
    fn attach(&mut self, rel: RelId) -> AtfxResult<()> {
        if let Some(elem1) = self.relation(rel)?.elem1 {
            let element = self.element_mut(elem1)?;
            if !element.relations.contains(&rel) {
                element.relations.push(rel);
            }
        }
        Ok(())
    }

    fn detach(&mut self, rel: RelId) {
        let owner = self.relation(rel).ok().and_then(|r| r.elem1);
        if let Some(element) = owner.and_then(|aid| self.elements.get_mut(&aid)) {
            element.relations.retain(|r| *r != rel);
        }
    }

    /// Resolves base relations of a freshly bound pair and back-fills link sets.
    fn complete_binding(&mut self, rel: RelId) -> AtfxResult<()> {
        self.resolve_base_relation(rel)?;
        let relation = self.relation(rel)?;
        let inv = relation.inverse;
        let (a, b) = bound_elements(relation)?;
        for (owner, id) in [(a, rel), (b, inv)] {
            if let Some(instances) = self.instances.get_mut(&owner) {
                for inst in instances.values_mut() {
                    inst.links.entry(id).or_default();
                }
            }
        }
        debug!(
            relation = %self.relation(rel)?.name,
            inverse = %self.relation(inv)?.name,
            elem1 = a,
            elem2 = b,
            "bound relation pair"
        );
        Ok(())
    }

    /// Matches the requested base relation to the branch whose target equals
    /// the base type of the bound target element, then derives the inverse.
    fn resolve_base_relation(&mut self, rel: RelId) -> AtfxResult<()> {
        let relation = self.relation(rel)?;
        let Some(base_name) = relation.base_name.clone() else {
            return Ok(());
        };
        let inv = relation.inverse;
        let (a, b) = bound_elements(relation)?;
        let base_a = self.base_element_of(a)?;
        let base_b = self.base_element_of(b)?;

        let Some(branch) = base_a.resolve_relation(&base_name, &base_b.name).cloned() else {
            warn!(
                relation = %relation.name,
                base_relation = %base_name,
                target = %base_b.name,
                "no base relation branch matches the bound target"
            );
            if let Some(r) = self.relations[rel.0].as_mut() {
                r.base_relation = None;
            }
            return Ok(());
        };
        let inverse_branch = branch
            .inverse_name
            .as_deref()
            .and_then(|n| base_b.resolve_relation(n, &base_a.name))
            .cloned();

        let forward_type = branch.relation_type;
        if let Some(r) = self.relations[rel.0].as_mut() {
            r.relation_type = branch.relation_type;
            if !r.explicit_range {
                r.range = branch.range();
            }
            r.base_relation = Some(branch);
        }
        if let Some(r) = self.relations[inv.0].as_mut() {
            if let Some(ref ib) = inverse_branch {
                r.base_name = Some(ib.name.clone());
                r.relation_type = ib.relation_type;
                if !r.explicit_range {
                    r.range = ib.range();
                }
            } else {
                r.relation_type = forward_type;
            }
            r.base_relation = inverse_branch;
        }
        Ok(())
    }
}

fn bound_elements(relation: &ApplicationRelation) -> AtfxResult<(Aid, Aid)> {
    match (relation.elem1, relation.elem2) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(AtfxError::invalid_relation(format!(
            "relation '{}' is not bound to two elements",
            relation.name
        ))),
    }
}

/// Convenience for building father/child relation definitions.
pub fn father_child(
    name: &str,
    inverse_name: &str,
    father: Aid,
    child: Aid,
) -> RelationDef {
    RelationDef::new(name, inverse_name, father, child)
        .with_type(RelationType::FatherChild)
        .with_range(RelationRange::to_many())
        .with_inverse_range(RelationRange::new(0, 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base_model::BaseModel;
    use crate::error::ErrorKind;

    fn cache() -> AtfxCache {
        AtfxCache::new(BaseModel::asam_ods().unwrap())
    }

    #[test]
    fn test_add_relation_stores_inverse() {
        let mut cache = cache();
        let test = cache.create_element("AoTest", "Test").unwrap();
        let sub = cache.create_element("AoSubTest", "SubTest").unwrap();
        let rel = cache
            .add_relation(RelationDef::new("children", "parent_test", test, sub).with_base("children"))
            .unwrap();

        let inverse = cache.inverse_of(rel).unwrap();
        assert_eq!(inverse.name(), "parent_test");
        assert_eq!(inverse.elem1(), Some(sub));
        assert_eq!(inverse.elem2(), Some(test));
        assert_eq!(cache.relation(inverse.inverse()).unwrap().id(), rel);
        assert_eq!(cache.relation(rel).unwrap().relation_type(), RelationType::FatherChild);
        assert!(inverse.is_to_one(), "range taken from base relation");
    }

    #[test]
    fn test_backfill_link_sets() {
        let mut cache = cache();
        let test = cache.create_element("AoTest", "Test").unwrap();
        let sub = cache.create_element("AoSubTest", "SubTest").unwrap();
        let t = cache.create_instance(test).unwrap();
        let s = cache.create_instance(sub).unwrap();

        let rel = cache
            .add_relation(RelationDef::new("children", "parent_test", test, sub))
            .unwrap();
        let inv = cache.relation(rel).unwrap().inverse();
        assert!(cache.instance(test, t).unwrap().links.contains_key(&rel));
        assert!(cache.instance(sub, s).unwrap().links.contains_key(&inv));
    }

    #[test]
    fn test_link_mirrors_inverse() {
        let mut cache = cache();
        let test = cache.create_element("AoTest", "Test").unwrap();
        let sub = cache.create_element("AoSubTest", "SubTest").unwrap();
        let rel = cache.add_relation(father_child("children", "parent_test", test, sub)).unwrap();
        let inv = cache.relation(rel).unwrap().inverse();
        let t = cache.create_instance(test).unwrap();
        let s1 = cache.create_instance(sub).unwrap();
        let s2 = cache.create_instance(sub).unwrap();

        cache.link(test, t, rel, &[s1, s2]).unwrap();
        assert_eq!(cache.related_ids(test, t, rel).unwrap(), vec![s1, s2]);
        assert_eq!(cache.related_ids(sub, s1, inv).unwrap(), vec![t]);

        cache.unlink(sub, s1, inv, &[t]).unwrap();
        assert_eq!(cache.related_ids(test, t, rel).unwrap(), vec![s2]);
        assert!(cache.related_ids(sub, s1, inv).unwrap().is_empty());
    }

    #[test]
    fn test_to_one_replaces_target_on_both_sides() {
        let mut cache = cache();
        let test = cache.create_element("AoTest", "Test").unwrap();
        let sub = cache.create_element("AoSubTest", "SubTest").unwrap();
        let rel = cache.add_relation(father_child("children", "parent_test", test, sub)).unwrap();
        let inv = cache.relation(rel).unwrap().inverse();
        let t1 = cache.create_instance(test).unwrap();
        let t2 = cache.create_instance(test).unwrap();
        let s = cache.create_instance(sub).unwrap();

        cache.link(sub, s, inv, &[t1]).unwrap();
        cache.link(sub, s, inv, &[t2]).unwrap();
        assert_eq!(cache.related_ids(sub, s, inv).unwrap(), vec![t2]);
        assert!(cache.related_ids(test, t1, rel).unwrap().is_empty());

        // linking from the to-many side also moves the child
        cache.link(test, t1, rel, &[s]).unwrap();
        assert_eq!(cache.related_ids(sub, s, inv).unwrap(), vec![t1]);
        assert!(cache.related_ids(test, t2, rel).unwrap().is_empty());

        let err = cache.link(sub, s, inv, &[t1, t2]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadParameter);
    }

    #[test]
    fn test_set_links_replaces_set() {
        let mut cache = cache();
        let test = cache.create_element("AoTest", "Test").unwrap();
        let sub = cache.create_element("AoSubTest", "SubTest").unwrap();
        let rel = cache.add_relation(father_child("children", "parent_test", test, sub)).unwrap();
        let t = cache.create_instance(test).unwrap();
        let subs: Vec<Iid> = (0..3).map(|_| cache.create_instance(sub).unwrap()).collect();

        cache.link(test, t, rel, &subs[..2]).unwrap();
        cache.set_links(test, t, rel, &subs[1..]).unwrap();
        assert_eq!(cache.related_ids(test, t, rel).unwrap(), subs[1..].to_vec());
    }

    #[test]
    fn test_link_errors() {
        let mut cache = cache();
        let test = cache.create_element("AoTest", "Test").unwrap();
        let sub = cache.create_element("AoSubTest", "SubTest").unwrap();
        let rel = cache.add_relation(father_child("children", "parent_test", test, sub)).unwrap();
        let t = cache.create_instance(test).unwrap();

        assert_eq!(cache.link(test, t, rel, &[99]).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(
            cache.link(sub, t, rel, &[]).unwrap_err().kind(),
            ErrorKind::InvalidRelation
        );

        let half = cache
            .add_relation(RelationDef {
                name: "loose".into(),
                inverse_name: "loose_inv".into(),
                elem1: Some(test),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(
            cache.link(test, t, half, &[]).unwrap_err().kind(),
            ErrorKind::InvalidRelation
        );
    }

    #[test]
    fn test_duplicate_relation_name() {
        let mut cache = cache();
        let test = cache.create_element("AoTest", "Test").unwrap();
        let sub = cache.create_element("AoSubTest", "SubTest").unwrap();
        cache.add_relation(RelationDef::new("children", "parent_test", test, sub)).unwrap();
        let err = cache
            .add_relation(RelationDef::new("children", "other", test, sub))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateName);
    }

    #[test]
    fn test_bind_resolves_branch_by_target_base_type() {
        let mut cache = cache();
        let test = cache.create_element("AoTest", "Test").unwrap();
        let sub = cache.create_element("AoSubTest", "SubTest").unwrap();
        let sub2 = cache.create_element("AoSubTest", "SubSubTest").unwrap();

        let to_test = cache
            .add_relation(RelationDef::unbound("parent_test", "children").with_base("parent_test"))
            .unwrap();
        cache.bind_relation(to_test, Some(sub), None).unwrap();
        assert!(!cache.relation(to_test).unwrap().is_bound());
        cache.bind_relation(to_test, None, Some(test)).unwrap();
        let branch = cache.relation(to_test).unwrap().base_relation().unwrap();
        assert_eq!(branch.target, "AoTest");

        let to_sub = cache
            .add_relation(
                RelationDef::new("parent_sub", "children_sub", sub2, sub).with_base("parent_test"),
            )
            .unwrap();
        let branch = cache.relation(to_sub).unwrap().base_relation().unwrap();
        assert_eq!(branch.target, "AoSubTest");
        assert_eq!(
            cache.inverse_of(to_sub).unwrap().base_relation().unwrap().target,
            "AoSubTest"
        );
    }

    #[test]
    fn test_remove_instance_severs_links() {
        let mut cache = cache();
        let test = cache.create_element("AoTest", "Test").unwrap();
        let sub = cache.create_element("AoSubTest", "SubTest").unwrap();
        let rel = cache.add_relation(father_child("children", "parent_test", test, sub)).unwrap();
        let t = cache.create_instance(test).unwrap();
        let s = cache.create_instance(sub).unwrap();
        cache.link(test, t, rel, &[s]).unwrap();

        cache.remove_instance(sub, s).unwrap();
        assert!(cache.related_ids(test, t, rel).unwrap().is_empty());
    }

    #[test]
    fn test_remove_element_cascades() {
        let mut cache = cache();
        let test = cache.create_element("AoTest", "Test").unwrap();
        let sub = cache.create_element("AoSubTest", "SubTest").unwrap();
        let rel = cache.add_relation(father_child("children", "parent_test", test, sub)).unwrap();
        let t = cache.create_instance(test).unwrap();
        let s = cache.create_instance(sub).unwrap();
        cache.link(test, t, rel, &[s]).unwrap();

        cache.remove_element(sub).unwrap();
        assert!(cache.relation(rel).is_err());
        assert!(cache.relations_of(test).unwrap().is_empty());
        assert!(cache.instance(test, t).unwrap().links.is_empty());
        assert_eq!(cache.remove_element(sub).unwrap_err().kind(), ErrorKind::NotFound);
    }
}
