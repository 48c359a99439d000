//! Filter result types.

use std::time::Duration;

use atfx_model::{Aid, Iid};

/// Result of filtering an instance id set.
///
/// Ids keep the order of the candidate set they were taken from.
///
/// # Example
///
/// ```ignore
/// let result = evaluator.filter(aid, &candidates, &conditions)?;
///
/// println!("{} of {} instances match", result.count(), candidates.len());
/// for iid in result.iter() {
///     println!("instance {}", iid);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FilterResult {
    /// Element the ids belong to.
    pub aid: Aid,
    /// Matching instance ids.
    pub iids: Vec<Iid>,
    /// Execution statistics.
    pub stats: ExecutionStats,
}

impl FilterResult {
    /// Creates a new FilterResult.
    pub fn new(aid: Aid, iids: Vec<Iid>, stats: ExecutionStats) -> Self {
        Self { aid, iids, stats }
    }

    /// Creates an empty FilterResult.
    pub fn empty(aid: Aid) -> Self {
        Self {
            aid,
            iids: Vec::new(),
            stats: ExecutionStats::default(),
        }
    }

    /// Returns the number of matching instances.
    pub fn count(&self) -> usize {
        self.iids.len()
    }

    /// Returns true if nothing matched.
    pub fn is_empty(&self) -> bool {
        self.iids.is_empty()
    }

    /// Checks if an instance is in the result.
    pub fn contains(&self, iid: Iid) -> bool {
        self.iids.contains(&iid)
    }

    /// Returns an iterator over matching ids.
    pub fn iter(&self) -> impl Iterator<Item = &Iid> {
        self.iids.iter()
    }

    /// Returns the matching ids sorted ascending.
    pub fn to_sorted_vec(&self) -> Vec<Iid> {
        let mut vec = self.iids.clone();
        vec.sort_unstable();
        vec
    }
}

impl IntoIterator for FilterResult {
    type Item = Iid;
    type IntoIter = std::vec::IntoIter<Iid>;

    fn into_iter(self) -> Self::IntoIter {
        self.iids.into_iter()
    }
}

impl<'a> IntoIterator for &'a FilterResult {
    type Item = &'a Iid;
    type IntoIter = std::slice::Iter<'a, Iid>;

    fn into_iter(self) -> Self::IntoIter {
        self.iids.iter()
    }
}

/// Statistics from a filter run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionStats {
    /// Total execution duration.
    pub duration: Duration,
    /// Number of instances whose values were inspected, including
    /// instances reached over relation paths.
    pub instances_visited: usize,
    /// Number of relation paths served from the path cache.
    pub path_cache_hits: usize,
}

impl ExecutionStats {
    /// Creates new execution stats.
    pub fn new(duration: Duration, instances_visited: usize, path_cache_hits: usize) -> Self {
        Self {
            duration,
            instances_visited,
            path_cache_hits,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_result_empty() {
        let result = FilterResult::empty(1);
        assert_eq!(result.count(), 0);
        assert!(result.is_empty());
    }

    #[test]
    fn test_filter_result_keeps_order() {
        let result = FilterResult::new(1, vec![5, 2, 9], ExecutionStats::default());
        assert!(result.contains(2));
        assert!(!result.contains(3));
        assert_eq!(result.iter().copied().collect::<Vec<_>>(), vec![5, 2, 9]);
        assert_eq!(result.to_sorted_vec(), vec![2, 5, 9]);
        assert_eq!(result.into_iter().count(), 3);
    }

    #[test]
    fn test_execution_stats() {
        let stats = ExecutionStats::new(Duration::from_millis(3), 10, 1);
        assert_eq!(stats.instances_visited, 10);
        assert_eq!(stats.path_cache_hits, 1);
    }
}
