//! Aggregation over filtered instance sets.

use std::fmt;

use atfx_model::{Aid, AtfxCache, DataType, Iid, TypedValue, Value};

use crate::error::{QueryError, QueryResult};
use crate::evaluator::Target;

/// Aggregate functions of a selection; only [`AggregateFunction::Max`] is
/// implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AggregateFunction {
    /// Plain value, no aggregation.
    #[default]
    None,
    /// Number of values.
    Count,
    /// Number of distinct values.
    DCount,
    /// Minimum.
    Min,
    /// Maximum.
    Max,
    /// Average.
    Avg,
    /// Standard deviation.
    StdDev,
    /// Sum.
    Sum,
    /// Distinct values.
    Distinct,
    /// Point (values of one sample).
    Point,
}

impl AggregateFunction {
    /// Function name, e.g. `MAX`.
    pub fn name(self) -> &'static str {
        match self {
            AggregateFunction::None => "NONE",
            AggregateFunction::Count => "COUNT",
            AggregateFunction::DCount => "DCOUNT",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::StdDev => "STDDEV",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Distinct => "DISTINCT",
            AggregateFunction::Point => "POINT",
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reduces the values of `target` over `iids` with `function`.
///
/// `target` names an attribute or a to-one relation of `aid`. Integer types
/// compare as `i64` and float types as `f64`; the first maximum wins on ties.
/// Unset values are skipped, and an empty (or all-unset) input yields the
/// unset value of the attribute's type. A to-one relation yields the largest
/// related instance id as `DT_LONGLONG`.
///
/// # Arguments
///
/// * `cache` - Model holding the instances
/// * `aid` - Element whose instances are reduced
/// * `iids` - Instances to reduce
/// * `target` - Attribute or to-one relation name
/// * `function` - Reduction to apply; only `MAX` is supported
///
/// # Returns
///
/// * `Ok(TypedValue)` - The reduced value with its data type
/// * `Err(QueryError)` - If the function is not `MAX`, `target` is unknown,
///   the attribute is not numeric, or the relation is to-many
///
/// # Example
///
/// ```ignore
/// let max = aggregate(&cache, meas, &iids, "run_no", AggregateFunction::Max)?;
/// assert_eq!(max.value, Some(Value::LongLong(7)));
/// ```
pub fn aggregate(
    cache: &AtfxCache,
    aid: Aid,
    iids: &[Iid],
    target: &str,
    function: AggregateFunction,
) -> QueryResult<TypedValue> {
    if function != AggregateFunction::Max {
        return Err(QueryError::NotImplemented(format!(
            "aggregate function {}",
            function
        )));
    }

    match Target::resolve(cache, aid, target)? {
        Target::Attribute(attr_no) => {
            let data_type = cache.attribute(aid, attr_no)?.data_type();
            if !(data_type.is_integer() || data_type.is_float()) {
                return Err(QueryError::NotImplemented(format!(
                    "MAX over {} attribute '{}'",
                    data_type, target
                )));
            }
            let mut best: Option<&Value> = None;
            for &iid in iids {
                let Some(value) = cache.get_value(aid, iid, attr_no)? else {
                    continue;
                };
                if best.map_or(true, |b| greater(value, b, data_type)) {
                    best = Some(value);
                }
            }
            Ok(TypedValue {
                data_type,
                value: best.cloned(),
            })
        }
        Target::Relation(rel) => {
            let relation = cache.relation(rel)?;
            if !relation.is_to_one() {
                return Err(QueryError::UnsupportedCondition(format!(
                    "MAX over to-many relation '{}'",
                    relation.name()
                )));
            }
            let mut best: Option<Iid> = None;
            for &iid in iids {
                for related in cache.related_ids(aid, iid, rel)? {
                    if best.map_or(true, |b| related > b) {
                        best = Some(related);
                    }
                }
            }
            Ok(TypedValue {
                data_type: DataType::DtLongLong,
                value: best.map(|b| Value::LongLong(i64::try_from(b).unwrap_or(i64::MAX))),
            })
        }
    }
}

fn greater(value: &Value, current: &Value, data_type: DataType) -> bool {
    if data_type.is_integer() {
        matches!((value.as_i64(), current.as_i64()), (Some(v), Some(c)) if v > c)
    } else {
        matches!((value.as_f64(), current.as_f64()), (Some(v), Some(c)) if v > c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atfx_model::BaseModel;

    #[test]
    fn test_max_float_keeps_first_on_tie() {
        let mut cache = AtfxCache::new(BaseModel::asam_ods().unwrap());
        let aid = cache.create_element("AoAny", "A").unwrap();
        let attr = cache.add_attribute(aid, "level", None).unwrap();
        cache.set_attribute_data_type(aid, attr, DataType::DtDouble).unwrap();
        let ids: Vec<Iid> = (0..4).map(|_| cache.create_instance(aid).unwrap()).collect();
        for (iid, v) in ids.iter().zip([1.5, 4.0, 4.0, -2.0]) {
            cache.set_value(aid, *iid, attr, Value::Double(v)).unwrap();
        }

        let max = aggregate(&cache, aid, &ids, "level", AggregateFunction::Max).unwrap();
        assert_eq!(max.value, Some(Value::Double(4.0)));
        assert_eq!(max.data_type, DataType::DtDouble);
    }

    #[test]
    fn test_max_skips_unset() {
        let mut cache = AtfxCache::new(BaseModel::asam_ods().unwrap());
        let aid = cache.create_element("AoAny", "A").unwrap();
        let attr = cache.add_attribute(aid, "n", None).unwrap();
        cache.set_attribute_data_type(aid, attr, DataType::DtShort).unwrap();
        let a = cache.create_instance(aid).unwrap();
        let b = cache.create_instance(aid).unwrap();
        cache.set_value(aid, b, attr, Value::Short(-4)).unwrap();

        let max = aggregate(&cache, aid, &[a, b], "n", AggregateFunction::Max).unwrap();
        assert_eq!(max.value, Some(Value::Short(-4)));
        let unset = aggregate(&cache, aid, &[a], "n", AggregateFunction::Max).unwrap();
        assert!(!unset.is_set());
    }

    #[test]
    fn test_non_numeric_not_implemented() {
        let mut cache = AtfxCache::new(BaseModel::asam_ods().unwrap());
        let aid = cache.create_element("AoAny", "A").unwrap();
        cache.add_attribute(aid, "label", None).unwrap();
        assert!(matches!(
            aggregate(&cache, aid, &[], "label", AggregateFunction::Max),
            Err(QueryError::NotImplemented(_))
        ));
    }

    #[test]
    fn test_other_functions_not_implemented() {
        let mut cache = AtfxCache::new(BaseModel::asam_ods().unwrap());
        let aid = cache.create_element("AoAny", "A").unwrap();
        for function in [AggregateFunction::Count, AggregateFunction::Min, AggregateFunction::None] {
            assert!(matches!(
                aggregate(&cache, aid, &[], "x", function),
                Err(QueryError::NotImplemented(msg)) if msg.contains(function.name())
            ));
        }
    }
}
