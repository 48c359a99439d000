//! Bounded relation path search between application elements.
//!
//! A condition on a foreign element is evaluated by following a path of at
//! most two relations. Direct relations are preferred; two-hop paths are only
//! considered when no direct relation exists. Ties that survive the
//! preference rules are reported as [`PathSearch::Ambiguous`], never resolved
//! arbitrarily.

use std::collections::BTreeSet;

use atfx_model::{Aid, ApplicationRelation, AtfxCache, Iid, RelId, RelationType};

use crate::error::QueryResult;

/// Maximum number of relation hops.
pub const MAX_PATH_LENGTH: usize = 2;

/// A resolved path of one or two relations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationPath {
    from: Aid,
    to: Aid,
    hops: Vec<RelId>,
}

impl RelationPath {
    /// Start element.
    pub fn from(&self) -> Aid {
        self.from
    }

    /// Destination element.
    pub fn to(&self) -> Aid {
        self.to
    }

    /// Relations followed, in order.
    pub fn hops(&self) -> &[RelId] {
        &self.hops
    }

    /// Number of hops.
    pub fn len(&self) -> usize {
        self.hops.len()
    }

    /// Returns true for the degenerate path of an element to itself.
    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    /// Follows the path from one instance, fanning out at every hop.
    ///
    /// Returns the sorted, de-duplicated ids reached on the destination
    /// element.
    pub fn follow(&self, cache: &AtfxCache, iid: Iid) -> QueryResult<Vec<Iid>> {
        let mut frontier: BTreeSet<Iid> = BTreeSet::from([iid]);
        let mut aid = self.from;
        for rel in &self.hops {
            let relation = cache.relation(*rel)?;
            let mut next = BTreeSet::new();
            for current in &frontier {
                next.extend(cache.related_ids(aid, *current, *rel)?);
            }
            frontier = next;
            aid = relation.elem2().unwrap_or(aid);
            if frontier.is_empty() {
                break;
            }
        }
        Ok(frontier.into_iter().collect())
    }
}

/// Outcome of a relation path search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSearch {
    /// Exactly one path qualifies.
    Found(RelationPath),
    /// More than one path qualifies after applying the preference rules.
    Ambiguous(Vec<RelationPath>),
    /// No path of at most [`MAX_PATH_LENGTH`] hops exists.
    NotFound,
}

/// Searches the relation path from `from` to `to`.
///
/// Among several direct relations, base-derived ones are preferred, then
/// father/child ones. Without a direct relation every intermediate element is
/// tried; each hop applies the same preference, and more than one resulting
/// two-hop path is ambiguous.
///
/// # Arguments
///
/// * `cache` - Model holding both elements and their relations
/// * `from` - Element the path starts at
/// * `to` - Element the path ends at
///
/// # Returns
///
/// * [`PathSearch::Found`] - The single qualifying path
/// * [`PathSearch::Ambiguous`] - Every qualifying path when more than one remains
/// * [`PathSearch::NotFound`] - No path within [`MAX_PATH_LENGTH`] hops
pub fn find_relation_path(cache: &AtfxCache, from: Aid, to: Aid) -> PathSearch {
    if from == to {
        return PathSearch::Found(RelationPath {
            from,
            to,
            hops: Vec::new(),
        });
    }

    match select_direct(cache, from, to) {
        Hop::One(rel) => {
            return PathSearch::Found(RelationPath {
                from,
                to,
                hops: vec![rel],
            })
        }
        Hop::Many(rels) => {
            return PathSearch::Ambiguous(
                rels.into_iter()
                    .map(|rel| RelationPath {
                        from,
                        to,
                        hops: vec![rel],
                    })
                    .collect(),
            )
        }
        Hop::None => {}
    }

    let mut found = Vec::new();
    let mut ambiguous = false;
    for middle in cache.elements().map(|e| e.aid()) {
        if middle == from || middle == to {
            continue;
        }
        let first = match select_direct(cache, from, middle) {
            Hop::None => continue,
            hop => hop,
        };
        let second = match select_direct(cache, middle, to) {
            Hop::None => continue,
            hop => hop,
        };
        match (first, second) {
            (Hop::One(a), Hop::One(b)) => found.push(RelationPath {
                from,
                to,
                hops: vec![a, b],
            }),
            (first, second) => {
                ambiguous = true;
                for a in first.into_vec() {
                    for b in second.clone().into_vec() {
                        found.push(RelationPath {
                            from,
                            to,
                            hops: vec![a, b],
                        });
                    }
                }
            }
        }
    }

    match found.len() {
        0 => PathSearch::NotFound,
        1 if !ambiguous => PathSearch::Found(found.remove(0)),
        _ => PathSearch::Ambiguous(found),
    }
}

#[derive(Debug, Clone)]
enum Hop {
    None,
    One(RelId),
    Many(Vec<RelId>),
}

impl Hop {
    fn into_vec(self) -> Vec<RelId> {
        match self {
            Hop::None => Vec::new(),
            Hop::One(rel) => vec![rel],
            Hop::Many(rels) => rels,
        }
    }
}

/// Picks the direct relation between two elements.
fn select_direct(cache: &AtfxCache, from: Aid, to: Aid) -> Hop {
    let mut candidates: Vec<&ApplicationRelation> = cache.relations_between(from, to);
    if candidates.len() > 1 {
        narrow(&mut candidates, |r| r.base_relation().is_some());
    }
    if candidates.len() > 1 {
        narrow(&mut candidates, |r| r.relation_type() == RelationType::FatherChild);
    }
    match candidates.as_slice() {
        [] => Hop::None,
        [single] => Hop::One(single.id()),
        many => Hop::Many(many.iter().map(|r| r.id()).collect()),
    }
}

/// Keeps the candidates matching `preferred`, unless none does.
fn narrow<F>(candidates: &mut Vec<&ApplicationRelation>, preferred: F)
where
    F: Fn(&ApplicationRelation) -> bool,
{
    if candidates.iter().any(|r| preferred(r)) {
        candidates.retain(|r| preferred(r));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atfx_model::{father_child, BaseModel, RelationDef};

    fn cache() -> AtfxCache {
        AtfxCache::new(BaseModel::asam_ods().unwrap())
    }

    #[test]
    fn test_single_direct_relation() {
        let mut cache = cache();
        let a = cache.create_element("AoAny", "A").unwrap();
        let b = cache.create_element("AoAny", "B").unwrap();
        let rel = cache.add_relation(RelationDef::new("to_b", "to_a", a, b)).unwrap();
        let inv = cache.relation(rel).unwrap().inverse();

        match find_relation_path(&cache, a, b) {
            PathSearch::Found(path) => assert_eq!(path.hops(), &[rel]),
            other => panic!("unexpected {:?}", other),
        }
        match find_relation_path(&cache, b, a) {
            PathSearch::Found(path) => assert_eq!(path.hops(), &[inv]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_father_child_preferred() {
        let mut cache = cache();
        let a = cache.create_element("AoAny", "A").unwrap();
        let b = cache.create_element("AoAny", "B").unwrap();
        cache.add_relation(RelationDef::new("info", "info_inv", a, b)).unwrap();
        let fc = cache.add_relation(father_child("children", "parent", a, b)).unwrap();

        assert_eq!(
            find_relation_path(&cache, a, b),
            PathSearch::Found(RelationPath {
                from: a,
                to: b,
                hops: vec![fc]
            })
        );
    }

    #[test]
    fn test_base_derived_preferred_over_father_child() {
        let mut cache = cache();
        let q = cache.create_element("AoMeasurementQuantity", "Quantity").unwrap();
        let u = cache.create_element("AoUnit", "Unit").unwrap();
        let base = cache
            .add_relation(RelationDef::new("unit", "quantities", q, u).with_base("unit"))
            .unwrap();
        cache.add_relation(father_child("owned_units", "owner", q, u)).unwrap();

        match find_relation_path(&cache, q, u) {
            PathSearch::Found(path) => assert_eq!(path.hops(), &[base]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_two_info_relations_are_ambiguous() {
        let mut cache = cache();
        let a = cache.create_element("AoAny", "A").unwrap();
        let b = cache.create_element("AoAny", "B").unwrap();
        cache.add_relation(RelationDef::new("r1", "r1_inv", a, b)).unwrap();
        cache.add_relation(RelationDef::new("r2", "r2_inv", a, b)).unwrap();

        match find_relation_path(&cache, a, b) {
            PathSearch::Ambiguous(paths) => assert_eq!(paths.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_two_hop_path() {
        let mut cache = cache();
        let a = cache.create_element("AoAny", "A").unwrap();
        let b = cache.create_element("AoAny", "B").unwrap();
        let c = cache.create_element("AoAny", "C").unwrap();
        let ab = cache.add_relation(father_child("bs", "a", a, b)).unwrap();
        let bc = cache.add_relation(father_child("cs", "b", b, c)).unwrap();

        match find_relation_path(&cache, a, c) {
            PathSearch::Found(path) => {
                assert_eq!(path.hops(), &[ab, bc]);
                assert_eq!(path.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_two_equal_two_hop_paths_are_ambiguous() {
        let mut cache = cache();
        let a = cache.create_element("AoAny", "A").unwrap();
        let b1 = cache.create_element("AoAny", "B1").unwrap();
        let b2 = cache.create_element("AoAny", "B2").unwrap();
        let c = cache.create_element("AoAny", "C").unwrap();
        cache.add_relation(father_child("b1s", "a", a, b1)).unwrap();
        cache.add_relation(father_child("b2s", "a", a, b2)).unwrap();
        cache.add_relation(father_child("cs", "b1", b1, c)).unwrap();
        cache.add_relation(father_child("cs", "b2", b2, c)).unwrap();

        assert!(matches!(
            find_relation_path(&cache, a, c),
            PathSearch::Ambiguous(paths) if paths.len() == 2
        ));
    }

    #[test]
    fn test_no_path_beyond_two_hops() {
        let mut cache = cache();
        let ids: Vec<Aid> = ["A", "B", "C", "D"]
            .iter()
            .map(|n| cache.create_element("AoAny", n).unwrap())
            .collect();
        for w in ids.windows(2) {
            cache
                .add_relation(father_child(&format!("to_{}", w[1]), &format!("from_{}", w[0]), w[0], w[1]))
                .unwrap();
        }
        assert_eq!(find_relation_path(&cache, ids[0], ids[3]), PathSearch::NotFound);
    }

    #[test]
    fn test_follow_fans_out() {
        let mut cache = cache();
        let a = cache.create_element("AoAny", "A").unwrap();
        let b = cache.create_element("AoAny", "B").unwrap();
        let c = cache.create_element("AoAny", "C").unwrap();
        let ab = cache.add_relation(father_child("bs", "a", a, b)).unwrap();
        let bc = cache.add_relation(RelationDef::new("cs", "bs", b, c)).unwrap();

        let ai = cache.create_instance(a).unwrap();
        let bs: Vec<Iid> = (0..2).map(|_| cache.create_instance(b).unwrap()).collect();
        let cs: Vec<Iid> = (0..3).map(|_| cache.create_instance(c).unwrap()).collect();
        cache.link(a, ai, ab, &bs).unwrap();
        cache.link(b, bs[0], bc, &cs[..2]).unwrap();
        cache.link(b, bs[1], bc, &cs[1..]).unwrap();

        let path = RelationPath {
            from: a,
            to: c,
            hops: vec![ab, bc],
        };
        assert_eq!(path.follow(&cache, ai).unwrap(), cs);
    }
}
