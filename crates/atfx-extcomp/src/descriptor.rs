//! External-component descriptors.

use atfx_model::{Aid, AtfxCache, DataType, Iid, RelId, Value};

use crate::error::{ExtCompError, ExtCompResult};
use crate::layout::{byte_extent, BitField, BlockLayout};
use crate::typespec::TypeSpec;

/// Base element of descriptor instances.
pub const EXTERNAL_COMPONENT_BASE: &str = "AoExternalComponent";

/// Base relation from a local column to its descriptors.
pub const EXTERNAL_COMPONENT_RELATION: &str = "external_component";

/// Relation from a column element to its descriptor element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentRelation {
    /// Relation on the column element.
    pub rel: RelId,
    /// Descriptor element.
    pub target: Aid,
}

/// Finds the relation of `aid` leading to an `AoExternalComponent` element.
///
/// When several qualify, the one derived from the `external_component` base
/// relation (or carrying that name) is preferred.
pub fn find_component_relation(
    cache: &AtfxCache,
    aid: Aid,
) -> ExtCompResult<Option<ComponentRelation>> {
    let mut candidates = Vec::new();
    for relation in cache.relations_of(aid)? {
        let Some(target) = relation.elem2() else {
            continue;
        };
        if relation.elem1().is_none() {
            continue;
        }
        if cache
            .element(target)?
            .base_name()
            .eq_ignore_ascii_case(EXTERNAL_COMPONENT_BASE)
        {
            candidates.push((relation, target));
        }
    }
    let preferred = candidates.iter().find(|(r, _)| {
        r.base_name()
            .is_some_and(|b| b.eq_ignore_ascii_case(EXTERNAL_COMPONENT_RELATION))
            || r.name().eq_ignore_ascii_case(EXTERNAL_COMPONENT_RELATION)
    });
    Ok(preferred.or(candidates.first()).map(|(r, target)| ComponentRelation {
        rel: r.id(),
        target: *target,
    }))
}

/// Descriptor of one byte range of an external component file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtCompDescriptor {
    /// Descriptor element.
    pub aid: Aid,
    /// Descriptor instance.
    pub iid: Iid,
    /// File reference, relative to the file root unless absolute.
    pub filename_url: String,
    /// Stored value type.
    pub value_type: TypeSpec,
    /// Number of values, or the byte extent for string value types.
    pub component_length: usize,
    /// File position of the first block.
    pub start_offset: u64,
    /// Block layout of the values.
    pub layout: BlockLayout,
    /// Ordering key of split columns.
    pub ordinal_number: Option<i32>,
    /// File holding the flags, if any.
    pub flags_filename_url: Option<String>,
    /// File position of the flags.
    pub flags_start_offset: Option<u64>,
}

impl ExtCompDescriptor {
    /// Reads a descriptor instance through its base attribute names.
    ///
    /// `start_offset` and `flags_start_offset` may be `DT_LONG` or
    /// `DT_LONGLONG`. Optional attributes that the element does not map are
    /// treated as unset.
    pub fn from_instance(cache: &AtfxCache, aid: Aid, iid: Iid) -> ExtCompResult<Self> {
        let code = integer(required(cache, aid, iid, "value_type")?, "value_type")?;
        let value_type = i32::try_from(code)
            .map_err(|_| ExtCompError::bad_parameter(format!("value_type {}", code)))
            .and_then(TypeSpec::try_from_code)?;

        let bit_count = optional(cache, aid, iid, "ao_bit_count")?
            .map(|v| small(v, "ao_bit_count"))
            .transpose()?;
        let bit_offset = optional(cache, aid, iid, "ao_bit_offset")?
            .map(|v| small(v, "ao_bit_offset"))
            .transpose()?;
        let bits = bit_count.map(|count| BitField::new(count, bit_offset.unwrap_or(0)));

        let layout = BlockLayout {
            block_size: size(required(cache, aid, iid, "block_size")?, "block_size")?,
            values_per_block: size(required(cache, aid, iid, "valuesperblock")?, "valuesperblock")?,
            value_offset: size(required(cache, aid, iid, "value_offset")?, "value_offset")?,
            bits,
        };

        let ordinal_number = optional(cache, aid, iid, "ordinal_number")?
            .map(|v| {
                integer(v, "ordinal_number").and_then(|n| {
                    i32::try_from(n).map_err(|_| {
                        ExtCompError::bad_parameter(format!("ordinal_number {}", n))
                    })
                })
            })
            .transpose()?;

        Ok(Self {
            aid,
            iid,
            filename_url: text(required(cache, aid, iid, "filename_url")?, "filename_url")?,
            value_type,
            component_length: size(
                required(cache, aid, iid, "component_length")?,
                "component_length",
            )?,
            start_offset: offset(required(cache, aid, iid, "start_offset")?, "start_offset")?,
            layout,
            ordinal_number,
            flags_filename_url: optional(cache, aid, iid, "flags_filename_url")?
                .map(|v| text(v, "flags_filename_url"))
                .transpose()?,
            flags_start_offset: optional(cache, aid, iid, "flags_start_offset")?
                .map(|v| offset(v, "flags_start_offset"))
                .transpose()?,
        })
    }

    /// Bytes to read from the start offset.
    pub fn byte_extent(&self) -> ExtCompResult<usize> {
        byte_extent(self.value_type, &self.layout, self.component_length)
    }

    /// Returns the flags file and offset when both are set.
    pub fn flags_location(&self) -> Option<(&str, u64)> {
        match (&self.flags_filename_url, self.flags_start_offset) {
            (Some(url), Some(offset)) => Some((url.as_str(), offset)),
            _ => None,
        }
    }
}

/// Returns the descriptors of a column instance, ordered by ordinal number.
///
/// The sort is stable, so descriptors with equal (or missing, sorted as 0)
/// ordinal numbers keep their instance id order.
pub fn descriptors_of(
    cache: &AtfxCache,
    aid: Aid,
    iid: Iid,
) -> ExtCompResult<Vec<ExtCompDescriptor>> {
    let Some(component) = find_component_relation(cache, aid)? else {
        return Ok(Vec::new());
    };
    let mut descriptors = cache
        .related_ids(aid, iid, component.rel)?
        .into_iter()
        .map(|d| ExtCompDescriptor::from_instance(cache, component.target, d))
        .collect::<ExtCompResult<Vec<_>>>()?;
    descriptors.sort_by_key(|d| d.ordinal_number.unwrap_or(0));
    Ok(descriptors)
}

// ============================================================================
// Attribute access
// ============================================================================

fn required<'c>(cache: &'c AtfxCache, aid: Aid, iid: Iid, base: &str) -> ExtCompResult<&'c Value> {
    cache
        .get_value_by_base_name(aid, iid, base)?
        .ok_or_else(|| ExtCompError::NotFound(format!("'{}' of external component {}", base, iid)))
}

/// Value of a base attribute; unmapped attributes read as unset.
pub(crate) fn optional<'c>(
    cache: &'c AtfxCache,
    aid: Aid,
    iid: Iid,
    base: &str,
) -> ExtCompResult<Option<&'c Value>> {
    if cache.element(aid)?.attribute_by_base_name(base).is_none() {
        return Ok(None);
    }
    Ok(cache.get_value_by_base_name(aid, iid, base)?)
}

/// Declared `raw_datatype` of a column instance.
pub(crate) fn raw_datatype(cache: &AtfxCache, aid: Aid, iid: Iid) -> ExtCompResult<Option<DataType>> {
    match optional(cache, aid, iid, "raw_datatype")? {
        Some(value) => {
            let code = integer(value, "raw_datatype")?;
            let data_type = i32::try_from(code)
                .ok()
                .and_then(DataType::from_code)
                .ok_or_else(|| ExtCompError::bad_parameter(format!("raw_datatype {}", code)))?;
            Ok(Some(data_type))
        }
        None => Ok(None),
    }
}

/// True for complex scalar and sequence data types.
pub(crate) fn is_complex(data_type: Option<DataType>) -> bool {
    matches!(
        data_type,
        Some(DataType::DtComplex | DataType::DsComplex | DataType::DtDComplex | DataType::DsDComplex)
    )
}

fn integer(value: &Value, base: &str) -> ExtCompResult<i64> {
    value
        .as_i64()
        .ok_or_else(|| ExtCompError::bad_parameter(format!("'{}' is not an integer: {}", base, value)))
}

fn offset(value: &Value, base: &str) -> ExtCompResult<u64> {
    let n = integer(value, base)?;
    u64::try_from(n).map_err(|_| ExtCompError::bad_parameter(format!("negative '{}': {}", base, n)))
}

fn size(value: &Value, base: &str) -> ExtCompResult<usize> {
    let n = offset(value, base)?;
    usize::try_from(n).map_err(|_| ExtCompError::bad_parameter(format!("'{}' too large: {}", base, n)))
}

fn small(value: &Value, base: &str) -> ExtCompResult<u16> {
    let n = integer(value, base)?;
    u16::try_from(n).map_err(|_| ExtCompError::bad_parameter(format!("'{}' out of range: {}", base, n)))
}

fn text(value: &Value, base: &str) -> ExtCompResult<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ExtCompError::bad_parameter(format!("'{}' is not a string", base)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use atfx_model::{BaseModel, RelationDef};

    fn model() -> (AtfxCache, Aid, Aid, RelId) {
        let mut cache = AtfxCache::new(BaseModel::asam_ods().unwrap());
        let lc = cache.create_element("AoLocalColumn", "LocalColumn").unwrap();
        let ec = cache.create_element("AoExternalComponent", "ExtComp").unwrap();
        for base in [
            "filename_url",
            "value_type",
            "component_length",
            "start_offset",
            "block_size",
            "valuesperblock",
            "value_offset",
            "ordinal_number",
        ] {
            cache.add_attribute(ec, base, Some(base)).unwrap();
        }
        let rel = cache
            .add_relation(
                RelationDef::new("external_component", "local_column", lc, ec)
                    .with_base("external_component"),
            )
            .unwrap();
        (cache, lc, ec, rel)
    }

    fn set(cache: &mut AtfxCache, ec: Aid, iid: Iid, base: &str, value: Value) {
        let attr = cache.attr_no_by_base_name(ec, base).unwrap();
        cache.set_value(ec, iid, attr, value).unwrap();
    }

    fn descriptor(cache: &mut AtfxCache, ec: Aid, ordinal: Option<i32>) -> Iid {
        let iid = cache.create_instance(ec).unwrap();
        set(cache, ec, iid, "filename_url", Value::String("a.btf".into()));
        set(cache, ec, iid, "value_type", Value::Enum(TypeSpec::Double.code()));
        set(cache, ec, iid, "component_length", Value::Long(3));
        set(cache, ec, iid, "start_offset", Value::Long(16));
        set(cache, ec, iid, "block_size", Value::Long(8));
        set(cache, ec, iid, "valuesperblock", Value::Long(1));
        set(cache, ec, iid, "value_offset", Value::Long(0));
        if let Some(n) = ordinal {
            set(cache, ec, iid, "ordinal_number", Value::Long(n));
        }
        iid
    }

    #[test]
    fn test_from_instance() {
        let (mut cache, _, ec, _) = model();
        let iid = descriptor(&mut cache, ec, Some(2));
        let d = ExtCompDescriptor::from_instance(&cache, ec, iid).unwrap();
        assert_eq!(d.value_type, TypeSpec::Double);
        assert_eq!(d.component_length, 3);
        assert_eq!(d.start_offset, 16);
        assert_eq!(d.ordinal_number, Some(2));
        assert_eq!(d.byte_extent().unwrap(), 24);
        assert!(d.flags_location().is_none());
    }

    #[test]
    fn test_longlong_start_offset() {
        let (mut cache, _, ec, _) = model();
        let iid = descriptor(&mut cache, ec, None);
        let attr = cache.attr_no_by_base_name(ec, "start_offset").unwrap();
        cache
            .set_attribute_data_type(ec, attr, atfx_model::DataType::DtLongLong)
            .unwrap();
        cache.set_value(ec, iid, attr, Value::LongLong(5_000_000_000)).unwrap();
        let d = ExtCompDescriptor::from_instance(&cache, ec, iid).unwrap();
        assert_eq!(d.start_offset, 5_000_000_000);
    }

    #[test]
    fn test_missing_required_value() {
        let (mut cache, _, ec, _) = model();
        let iid = cache.create_instance(ec).unwrap();
        assert!(matches!(
            ExtCompDescriptor::from_instance(&cache, ec, iid),
            Err(ExtCompError::NotFound(_))
        ));
    }

    #[test]
    fn test_descriptors_sorted_by_ordinal() {
        let (mut cache, lc, ec, rel) = model();
        let column = cache.create_instance(lc).unwrap();
        let second = descriptor(&mut cache, ec, Some(2));
        let first = descriptor(&mut cache, ec, Some(1));
        let also_second = descriptor(&mut cache, ec, Some(2));
        cache.link(lc, column, rel, &[second, first, also_second]).unwrap();

        let order: Vec<Iid> = descriptors_of(&cache, lc, column)
            .unwrap()
            .into_iter()
            .map(|d| d.iid)
            .collect();
        assert_eq!(order, vec![first, second, also_second]);
    }

    #[test]
    fn test_find_component_relation() {
        let (cache, lc, ec, rel) = model();
        let found = find_component_relation(&cache, lc).unwrap().unwrap();
        assert_eq!(found, ComponentRelation { rel, target: ec });
        assert!(find_component_relation(&cache, ec).unwrap().is_none());
    }
}
