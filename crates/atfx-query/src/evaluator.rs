//! Condition evaluator implementation.

use std::collections::HashSet;
use std::time::Instant;

use atfx_model::{Aid, AtfxCache, AttrNo, Iid, RelId, Value};
use tracing::{debug, warn};

use crate::cache::PathCache;
use crate::condition::Condition;
use crate::config::QueryConfig;
use crate::error::{QueryError, QueryResult};
use crate::path::{find_relation_path, PathSearch, RelationPath};
use crate::result::{ExecutionStats, FilterResult};

/// What a condition compares against on its element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Target {
    /// Stored attribute value.
    Attribute(AttrNo),
    /// Ids of the instances related via a relation.
    Relation(RelId),
}

impl Target {
    /// Resolves an attribute or relation name of an element; attributes win.
    pub(crate) fn resolve(cache: &AtfxCache, aid: Aid, name: &str) -> QueryResult<Self> {
        if let Some(attr) = cache.element(aid)?.attribute_by_name(name) {
            return Ok(Target::Attribute(attr.attr_no()));
        }
        Ok(Target::Relation(cache.relation_by_name(aid, name)?.id()))
    }
}

/// A condition with its target and relation path resolved.
struct Resolved<'c> {
    condition: &'c Condition,
    target: Target,
    path: RelationPath,
}

/// Filters instance id sets of an [`AtfxCache`] by AND-combined conditions.
///
/// The evaluator borrows the cache immutably, so the schema cannot change
/// while resolved relation paths are cached.
///
/// # Example
///
/// ```ignore
/// use atfx_query::{Condition, ConditionEvaluator, SelOperator, SelValue};
///
/// let evaluator = ConditionEvaluator::new(&cache);
/// let candidates = cache.instance_iids(test)?;
/// let result = evaluator.filter(
///     test,
///     &candidates,
///     &[Condition::new(test, "iname", SelOperator::Like, SelValue::String("f*".into()))],
/// )?;
/// ```
pub struct ConditionEvaluator<'a> {
    cache: &'a AtfxCache,
    config: QueryConfig,
    paths: Option<PathCache>,
}

impl<'a> ConditionEvaluator<'a> {
    /// Creates an evaluator with default configuration.
    pub fn new(cache: &'a AtfxCache) -> Self {
        Self::with_config(cache, QueryConfig::default())
    }

    /// Creates an evaluator with custom configuration.
    pub fn with_config(cache: &'a AtfxCache, config: QueryConfig) -> Self {
        let paths = config.path_cache.clone().map(PathCache::new);
        Self {
            cache,
            config,
            paths,
        }
    }

    /// Returns the evaluator configuration.
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Returns the path cache if enabled.
    pub fn path_cache(&self) -> Option<&PathCache> {
        self.paths.as_ref()
    }

    /// Resolves the relation path between two elements.
    ///
    /// Returns the path and whether it was served from the path cache.
    ///
    /// # Errors
    ///
    /// [`QueryError::AmbiguousRelationPath`] when several paths qualify,
    /// [`QueryError::NoRelationPath`] when none of at most two hops exists.
    pub fn resolve_path(&self, from: Aid, to: Aid) -> QueryResult<(RelationPath, bool)> {
        let cached = self.paths.as_ref().and_then(|c| c.get((from, to)));
        let hit = cached.is_some();
        let search = match cached {
            Some(search) => search,
            None => {
                let search = find_relation_path(self.cache, from, to);
                if let Some(ref paths) = self.paths {
                    paths.set((from, to), search.clone());
                }
                search
            }
        };

        match search {
            PathSearch::Found(path) => {
                debug!(from, to, hops = path.len(), cache_hit = hit, "resolved relation path");
                Ok((path, hit))
            }
            PathSearch::Ambiguous(paths) => {
                warn!(from, to, candidates = paths.len(), "ambiguous relation path");
                Err(QueryError::AmbiguousRelationPath {
                    from: self.element_name(from),
                    to: self.element_name(to),
                })
            }
            PathSearch::NotFound => Err(QueryError::NoRelationPath {
                from: self.element_name(from),
                to: self.element_name(to),
            }),
        }
    }

    /// Filters `candidates` of element `aid`, keeping the instances that
    /// satisfy every condition.
    ///
    /// Conditions on `aid` compare stored values (or related ids when the
    /// name is a relation). Conditions on other elements follow the relation
    /// path to that element and match if any reached instance matches.
    /// Duplicate candidates are reported once; order is preserved.
    pub fn filter(
        &self,
        aid: Aid,
        candidates: &[Iid],
        conditions: &[Condition],
    ) -> QueryResult<FilterResult> {
        let start = Instant::now();
        self.cache.element(aid)?;

        let mut path_cache_hits = 0;
        let mut resolved = Vec::with_capacity(conditions.len());
        for condition in conditions {
            condition.check()?;
            let target = Target::resolve(self.cache, condition.aid, &condition.attribute)?;
            let (path, hit) = self.resolve_path(aid, condition.aid)?;
            path_cache_hits += usize::from(hit);
            resolved.push(Resolved {
                condition,
                target,
                path,
            });
        }

        let mut seen = HashSet::with_capacity(candidates.len());
        let mut iids = Vec::new();
        let mut visited = 0;
        'candidates: for &iid in candidates {
            if !seen.insert(iid) {
                continue;
            }
            for r in &resolved {
                let reached = r.path.follow(self.cache, iid)?;
                visited += reached.len();
                if !self.any_matches(r, &reached)? {
                    continue 'candidates;
                }
            }
            iids.push(iid);
        }

        if let Some(limit) = self.config.max_results {
            if iids.len() > limit {
                return Err(QueryError::ResultTooLarge {
                    count: iids.len(),
                    limit,
                });
            }
        }

        debug!(
            aid,
            candidates = candidates.len(),
            conditions = conditions.len(),
            matched = iids.len(),
            "filtered instances"
        );
        let stats = ExecutionStats::new(start.elapsed(), visited, path_cache_hits);
        Ok(FilterResult::new(aid, iids, stats))
    }

    fn any_matches(&self, r: &Resolved<'_>, reached: &[Iid]) -> QueryResult<bool> {
        let aid = r.path.to();
        for &iid in reached {
            let matched = match r.target {
                Target::Attribute(attr_no) => r
                    .condition
                    .matches(self.cache.get_value(aid, iid, attr_no)?),
                Target::Relation(rel) => {
                    let related = self.cache.related_ids(aid, iid, rel)?;
                    if related.is_empty() {
                        r.condition.matches(None)
                    } else {
                        related.into_iter().any(|target| {
                            let id = Value::LongLong(i64::try_from(target).unwrap_or(i64::MAX));
                            r.condition.matches(Some(&id))
                        })
                    }
                }
            };
            if matched {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn element_name(&self, aid: Aid) -> String {
        self.cache
            .element(aid)
            .map(|e| e.name().to_string())
            .unwrap_or_else(|_| aid.to_string())
    }
}

impl std::fmt::Debug for ConditionEvaluator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionEvaluator")
            .field("config", &self.config)
            .field("paths", &self.paths)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{SelOperator, SelValue};
    use crate::config::PathCacheConfig;
    use atfx_model::{father_child, BaseModel};

    fn setup() -> (AtfxCache, Aid, Aid, RelId) {
        let mut cache = AtfxCache::new(BaseModel::asam_ods().unwrap());
        let a = cache.create_element("AoAny", "A").unwrap();
        let b = cache.create_element("AoAny", "B").unwrap();
        cache.add_attribute(a, "name", Some("name")).unwrap();
        let code = cache.add_attribute(b, "code", None).unwrap();
        cache.set_attribute_data_type(b, code, atfx_model::DataType::DtLong).unwrap();
        let rel = cache.add_relation(father_child("bs", "a", a, b)).unwrap();
        (cache, a, b, rel)
    }

    #[test]
    fn test_relation_name_condition() {
        let (mut cache, a, b, rel) = setup();
        let inv = cache.relation(rel).unwrap().inverse();
        let a1 = cache.create_instance(a).unwrap();
        let a2 = cache.create_instance(a).unwrap();
        let b1 = cache.create_instance(b).unwrap();
        let b2 = cache.create_instance(b).unwrap();
        cache.link(b, b1, inv, &[a2]).unwrap();

        let evaluator = ConditionEvaluator::new(&cache);
        let cond = Condition::new(b, "a", SelOperator::Eq, SelValue::LongLong(a2 as i64));
        let result = evaluator.filter(b, &[b1, b2], &[cond]).unwrap();
        assert_eq!(result.iids, vec![b1]);

        // unlinked b2 has no value, so even NEQ does not match it
        let cond = Condition::new(b, "a", SelOperator::Neq, SelValue::LongLong(a1 as i64));
        let result = evaluator.filter(b, &[b1, b2], &[cond]).unwrap();
        assert_eq!(result.iids, vec![b1]);
    }

    #[test]
    fn test_unknown_attribute() {
        let (cache, a, _, _) = setup();
        let evaluator = ConditionEvaluator::new(&cache);
        let cond = Condition::new(a, "nope", SelOperator::Eq, SelValue::String("x".into()));
        let err = evaluator.filter(a, &[], &[cond]).unwrap_err();
        assert_eq!(err.kind(), atfx_model::ErrorKind::NotFound);
    }

    #[test]
    fn test_path_cache_hits() {
        let (mut cache, a, b, rel) = setup();
        let a1 = cache.create_instance(a).unwrap();
        let b1 = cache.create_instance(b).unwrap();
        cache.link(a, a1, rel, &[b1]).unwrap();
        let code = cache.attr_no_by_name(b, "code").unwrap();
        cache.set_value(b, b1, code, Value::Long(5)).unwrap();

        let config = QueryConfig::builder()
            .with_path_cache(PathCacheConfig { max_entries: 8 })
            .build();
        let evaluator = ConditionEvaluator::with_config(&cache, config);
        let cond = Condition::new(b, "code", SelOperator::Eq, SelValue::LongLong(5));

        let first = evaluator.filter(a, &[a1], std::slice::from_ref(&cond)).unwrap();
        assert_eq!(first.stats.path_cache_hits, 0);
        let second = evaluator.filter(a, &[a1], &[cond]).unwrap();
        assert_eq!(second.stats.path_cache_hits, 1);
        assert_eq!(second.iids, vec![a1]);
        assert_eq!(evaluator.path_cache().map(|c| c.len()), Some(1));
    }

    #[test]
    fn test_max_results() {
        let (mut cache, a, _, _) = setup();
        let ids: Vec<Iid> = (0..3).map(|_| cache.create_instance(a).unwrap()).collect();
        let name = cache.attr_no_by_name(a, "name").unwrap();
        for iid in &ids {
            cache.set_value(a, *iid, name, Value::String("x".into())).unwrap();
        }
        let evaluator =
            ConditionEvaluator::with_config(&cache, QueryConfig::builder().with_max_results(2).build());
        let cond = Condition::new(a, "name", SelOperator::Eq, SelValue::String("x".into()));
        assert!(matches!(
            evaluator.filter(a, &ids, &[cond]),
            Err(QueryError::ResultTooLarge { count: 3, limit: 2 })
        ));
    }

    #[test]
    fn test_duplicate_candidates_reported_once() {
        let (mut cache, a, _, _) = setup();
        let a1 = cache.create_instance(a).unwrap();
        let evaluator = ConditionEvaluator::new(&cache);
        let result = evaluator.filter(a, &[a1, a1], &[]).unwrap();
        assert_eq!(result.iids, vec![a1]);
    }
}
