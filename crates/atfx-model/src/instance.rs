//! Instance storage and snapshot cursors.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::schema::{Aid, AttrNo, Iid, RelId};
use crate::value::Value;

/// Stored state of one instance element.
#[derive(Debug, Clone, Default)]
pub(crate) struct Instance {
    /// Set values keyed by attribute number; absent means unset.
    pub(crate) values: BTreeMap<AttrNo, Value>,
    /// Schema-free instance attributes in insertion order.
    pub(crate) instance_attrs: Vec<(String, Value)>,
    /// Related instance ids on the opposite element, per relation.
    pub(crate) links: HashMap<RelId, BTreeSet<Iid>>,
}

impl Instance {
    pub(crate) fn with_relations(relations: impl IntoIterator<Item = RelId>) -> Self {
        Self {
            links: relations.into_iter().map(|r| (r, BTreeSet::new())).collect(),
            ..Default::default()
        }
    }
}

/// Position cursor over a materialized snapshot of instance ids.
///
/// The snapshot is taken when the cursor is created; later cache mutations
/// are not reflected.
#[derive(Debug, Clone)]
pub struct InstanceCursor {
    aid: Aid,
    iids: Vec<Iid>,
    pos: usize,
}

impl InstanceCursor {
    pub(crate) fn new(aid: Aid, iids: Vec<Iid>) -> Self {
        Self { aid, iids, pos: 0 }
    }

    /// Element the instances belong to.
    pub fn aid(&self) -> Aid {
        self.aid
    }

    /// Total number of instances in the snapshot.
    pub fn count(&self) -> usize {
        self.iids.len()
    }

    /// Number of instances not yet returned.
    pub fn remaining(&self) -> usize {
        self.iids.len() - self.pos
    }

    /// Returns the next instance id.
    pub fn next_one(&mut self) -> Option<Iid> {
        let iid = self.iids.get(self.pos).copied()?;
        self.pos += 1;
        Some(iid)
    }

    /// Returns up to `n` next instance ids.
    pub fn next_n(&mut self, n: usize) -> Vec<Iid> {
        let end = self.pos.saturating_add(n).min(self.iids.len());
        let batch = self.iids[self.pos..end].to_vec();
        self.pos = end;
        batch
    }

    /// Moves the cursor back to the first instance.
    pub fn reset(&mut self) {
        self.pos = 0;
    }
}

impl Iterator for InstanceCursor {
    type Item = Iid;

    fn next(&mut self) -> Option<Iid> {
        self.next_one()
    }
}
