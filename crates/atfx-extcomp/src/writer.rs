//! Write path of the external-component codec.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::PathBuf;

use atfx_model::{Aid, AtfxCache, DataType, Iid, Value};
use tracing::{debug, info, warn};

use crate::column::SequenceRepresentation;
use crate::config::SessionContext;
use crate::descriptor::{
    descriptors_of, find_component_relation, is_complex, optional, raw_datatype, ComponentRelation,
};
use crate::error::{ExtCompError, ExtCompResult};
use crate::layout::{encode_flags, encode_values, encoding_for};

/// Base attributes a written descriptor must map.
const DESCRIPTOR_ATTRIBUTES: [&str; 7] = [
    "filename_url",
    "value_type",
    "component_length",
    "start_offset",
    "block_size",
    "valuesperblock",
    "value_offset",
];

/// Kind of data a written file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileCategory {
    /// Fixed-width numeric values.
    Numeric,
    /// NUL-terminated string records.
    String,
    /// 16-bit flags.
    Flags,
}

impl FileCategory {
    /// File name of segment `n` (starting at 1).
    pub fn file_name(self, stem: &str, n: u32) -> String {
        match self {
            FileCategory::Numeric => format!("{}_{}.btf", stem, n),
            FileCategory::String => format!("{}_string_{}.btf", stem, n),
            FileCategory::Flags => format!("{}_flags_{}.btf", stem, n),
        }
    }
}

/// File and position an append will land at.
struct AppendTarget {
    name: String,
    path: PathBuf,
    offset: u64,
}

/// Appends column values and flags to per-session files and records them in
/// external-component descriptors.
///
/// One file per [`FileCategory`] is active at a time; an append that would
/// grow a non-empty file beyond the segment size rolls over to the next
/// numbered file.
///
/// # Example
///
/// ```ignore
/// use atfx_extcomp::{ExtCompWriter, SessionContext};
///
/// let mut writer = ExtCompWriter::new(SessionContext::builder().with_file_root(dir).build());
/// let descriptor = writer.write_values(&mut cache, local_column, iid, &Value::DoubleSeq(samples))?;
/// writer.write_flags(&mut cache, local_column, iid, &flags)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExtCompWriter {
    context: SessionContext,
    segments: HashMap<FileCategory, u32>,
}

impl ExtCompWriter {
    /// Creates a writer for a session.
    pub fn new(context: SessionContext) -> Self {
        Self {
            context,
            segments: HashMap::new(),
        }
    }

    /// Returns the session context.
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Writes a column's values and replaces its descriptors by one new
    /// descriptor, which is returned.
    ///
    /// The descriptor's `start_offset` is the file length before the append,
    /// written as `DT_LONG` or `DT_LONGLONG` per the attribute's declared type.
    /// When the descriptor cannot be recorded, the appended bytes are cut off
    /// again and the column keeps its previous descriptors.
    ///
    /// # Arguments
    ///
    /// * `cache` - The cache holding the column and its descriptors
    /// * `aid` - The local column element, related to an `AoExternalComponent` element
    /// * `iid` - The local column instance
    /// * `value` - A sequence value; strings and dates are written as `dt_string_utf8`
    ///
    /// # Returns
    ///
    /// * `Ok(Iid)` - The new descriptor instance
    /// * `Err(ExtCompError)` - If the column has no component relation, the
    ///   value type cannot be stored, an offset overflows its attribute type
    ///   or the file cannot be written
    pub fn write_values(
        &mut self,
        cache: &mut AtfxCache,
        aid: Aid,
        iid: Iid,
        value: &Value,
    ) -> ExtCompResult<Iid> {
        let component = find_component_relation(cache, aid)?.ok_or_else(|| {
            ExtCompError::NotFound(format!(
                "external component relation of element {}",
                aid
            ))
        })?;
        let ec = component.target;
        let previous = cache.related_ids(aid, iid, component.rel)?;
        for base in DESCRIPTOR_ATTRIBUTES {
            cache.attr_no_by_base_name(ec, base)?;
        }

        let spec = encoding_for(value)?;
        let bytes = encode_values(spec, value)?;
        let count = match spec.width() {
            Some(width) => bytes.len() / width,
            None => bytes.len(),
        };
        let category = if spec.is_string() {
            FileCategory::String
        } else {
            FileCategory::Numeric
        };

        let target = self.select_file(category, bytes.len())?;
        let fields = [
            ("filename_url", Value::String(target.name.clone())),
            ("value_type", integer_value(cache, ec, "value_type", i64::from(spec.code()))?),
            ("component_length", integer_value(cache, ec, "component_length", to_i64(count as u64)?)?),
            ("start_offset", integer_value(cache, ec, "start_offset", to_i64(target.offset)?)?),
            (
                "block_size",
                integer_value(cache, ec, "block_size", to_i64(spec.width().unwrap_or(bytes.len()) as u64)?)?,
            ),
            ("valuesperblock", integer_value(cache, ec, "valuesperblock", 1)?),
            ("value_offset", integer_value(cache, ec, "value_offset", 0)?),
        ];
        let ordinal = match cache.attr_no_by_base_name(ec, "ordinal_number") {
            Ok(_) => Some(("ordinal_number", integer_value(cache, ec, "ordinal_number", 1)?)),
            Err(_) => None,
        };
        self.append(&target, &bytes)?;

        let fields = fields.into_iter().chain(ordinal);
        let descriptor = match replace_descriptors(cache, aid, iid, component, &previous, fields) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                self.discard(&target);
                return Err(e);
            }
        };

        debug!(
            aid,
            iid,
            descriptor,
            file = %target.name,
            offset = target.offset,
            count,
            "wrote external component"
        );
        Ok(descriptor)
    }

    /// Writes a column's flags and records them on its descriptor.
    ///
    /// The column must have exactly one descriptor; flags use its byte order.
    pub fn write_flags(
        &mut self,
        cache: &mut AtfxCache,
        aid: Aid,
        iid: Iid,
        flags: &[i16],
    ) -> ExtCompResult<()> {
        let descriptors = descriptors_of(cache, aid, iid)?;
        let [descriptor] = descriptors.as_slice() else {
            return Err(ExtCompError::bad_parameter(format!(
                "flags need exactly one external component, column {} has {}",
                iid,
                descriptors.len()
            )));
        };
        if !descriptor.value_type.is_string() {
            let samples = if is_complex(raw_datatype(cache, aid, iid)?) {
                descriptor.component_length / 2
            } else {
                descriptor.component_length
            };
            if flags.len() != samples {
                return Err(ExtCompError::bad_parameter(format!(
                    "{} flags for {} values",
                    flags.len(),
                    samples
                )));
            }
        }

        let ec = descriptor.aid;
        let url_attr = cache.attr_no_by_base_name(ec, "flags_filename_url")?;
        cache.attr_no_by_base_name(ec, "flags_start_offset")?;

        let bytes = encode_flags(descriptor.value_type.byte_order(), flags);
        let target = self.select_file(FileCategory::Flags, bytes.len())?;
        let offset = integer_value(cache, ec, "flags_start_offset", to_i64(target.offset)?)?;
        let previous_url = cache.get_value(ec, descriptor.iid, url_attr)?.cloned();
        self.append(&target, &bytes)?;

        let recorded = cache
            .set_value(ec, descriptor.iid, url_attr, Value::String(target.name.clone()))
            .map_err(ExtCompError::from)
            .and_then(|()| set(cache, ec, descriptor.iid, "flags_start_offset", offset));
        if let Err(e) = recorded {
            let restored = match previous_url {
                Some(url) => cache.set_value(ec, descriptor.iid, url_attr, url),
                None => cache.unset_value(ec, descriptor.iid, url_attr),
            };
            if let Err(restore) = restored {
                warn!(descriptor = descriptor.iid, error = %restore, "could not restore flags file reference");
            }
            self.discard(&target);
            return Err(e);
        }
        debug!(aid, iid, file = %target.name, offset = target.offset, "wrote flags");
        Ok(())
    }

    /// Moves the `values` (and `flags`) of a local column into external
    /// components and switches its sequence representation to the external
    /// counterpart.
    ///
    /// Returns the new descriptor, or `None` when the column is already
    /// external or has no values.
    pub fn externalize_column(
        &mut self,
        cache: &mut AtfxCache,
        aid: Aid,
        iid: Iid,
    ) -> ExtCompResult<Option<Iid>> {
        let representation = SequenceRepresentation::of_column(cache, aid, iid)?;
        if representation.is_external() {
            return Ok(None);
        }
        let external = representation.to_external().ok_or_else(|| {
            ExtCompError::bad_parameter(format!("{} columns have no stored values", representation))
        })?;
        let repr_attr = cache.attr_no_by_base_name(aid, "sequence_representation")?;
        let values_attr = cache.attr_no_by_base_name(aid, "values")?;
        let Some(values) = cache.get_value(aid, iid, values_attr)?.cloned() else {
            return Ok(None);
        };
        let flags = match optional(cache, aid, iid, "flags")? {
            Some(Value::ShortSeq(flags)) => Some(flags.clone()),
            _ => None,
        };

        let descriptor = self.write_values(cache, aid, iid, &values)?;
        if let Some(flags) = flags {
            self.write_flags(cache, aid, iid, &flags)?;
            let flags_attr = cache.attr_no_by_base_name(aid, "flags")?;
            cache.unset_value(aid, iid, flags_attr)?;
        }
        cache.unset_value(aid, iid, values_attr)?;
        cache.set_value(aid, iid, repr_attr, Value::Enum(external.code()))?;
        info!(aid, iid, from = %representation, to = %external, "externalized column");
        Ok(Some(descriptor))
    }

    /// Picks the file of `category` that can take `len` more bytes.
    fn select_file(&mut self, category: FileCategory, len: usize) -> ExtCompResult<AppendTarget> {
        let mut n = self.segments.get(&category).copied().unwrap_or(1);
        loop {
            let name = category.file_name(&self.context.ext_comp_filename_stem, n);
            let path = self.context.file_root.join(&name);
            let offset = match fs::metadata(&path) {
                Ok(meta) => meta.len(),
                Err(e) if e.kind() == IoErrorKind::NotFound => 0,
                Err(e) => return Err(ExtCompError::io_error(&path, e)),
            };
            if offset > 0 && offset.saturating_add(len as u64) > self.context.ext_comp_segsize {
                info!(file = %name, size = offset, "external component segment full, rolling over");
                n += 1;
                continue;
            }
            self.segments.insert(category, n);
            return Ok(AppendTarget { name, path, offset });
        }
    }

    /// Cuts a file back to its length before a failed append.
    fn discard(&self, target: &AppendTarget) {
        let truncated = OpenOptions::new()
            .write(true)
            .open(&target.path)
            .and_then(|file| file.set_len(target.offset));
        match truncated {
            Ok(()) => debug!(file = %target.name, offset = target.offset, "discarded appended bytes"),
            Err(e) => warn!(file = %target.name, error = %e, "could not discard appended bytes"),
        }
    }

    fn append(&self, target: &AppendTarget, bytes: &[u8]) -> ExtCompResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&target.path)
            .map_err(|e| ExtCompError::io_error(&target.path, e))?;
        file.write_all(bytes)
            .map_err(|e| ExtCompError::io_error(&target.path, e))?;
        Ok(())
    }
}

/// Creates and links a descriptor holding `fields`, then removes the
/// column's `previous` descriptors. A descriptor that cannot be completed is
/// removed again and the previous ones stay in place.
fn replace_descriptors<'a>(
    cache: &mut AtfxCache,
    aid: Aid,
    iid: Iid,
    component: ComponentRelation,
    previous: &[Iid],
    fields: impl IntoIterator<Item = (&'a str, Value)>,
) -> ExtCompResult<Iid> {
    let ec = component.target;
    let descriptor = cache.create_instance(ec)?;
    let filled = fields
        .into_iter()
        .try_for_each(|(base, value)| set(cache, ec, descriptor, base, value))
        .and_then(|()| Ok(cache.link(aid, iid, component.rel, &[descriptor])?));
    if let Err(e) = filled {
        if let Err(cleanup) = cache.remove_instance(ec, descriptor) {
            warn!(descriptor, error = %cleanup, "could not remove incomplete descriptor");
        }
        return Err(e);
    }
    for &old in previous {
        cache.remove_instance(ec, old)?;
    }
    Ok(descriptor)
}

fn to_i64(n: u64) -> ExtCompResult<i64> {
    i64::try_from(n).map_err(|_| ExtCompError::bad_parameter(format!("{} exceeds 64-bit range", n)))
}

/// Converts `n` to the declared integer type of a descriptor attribute.
fn integer_value(cache: &AtfxCache, aid: Aid, base: &str, n: i64) -> ExtCompResult<Value> {
    let attr_no = cache.attr_no_by_base_name(aid, base)?;
    let data_type = cache.attribute(aid, attr_no)?.data_type();
    let overflow = || {
        ExtCompError::bad_parameter(format!(
            "{} does not fit {} attribute '{}'",
            n, data_type, base
        ))
    };
    let value = match data_type {
        DataType::DtShort => Value::Short(i16::try_from(n).map_err(|_| overflow())?),
        DataType::DtLong => Value::Long(i32::try_from(n).map_err(|_| overflow())?),
        DataType::DtEnum => Value::Enum(i32::try_from(n).map_err(|_| overflow())?),
        DataType::DtLongLong | DataType::DtUnknown => Value::LongLong(n),
        other => {
            return Err(ExtCompError::bad_parameter(format!(
                "{} attribute '{}' cannot hold an integer",
                other, base
            )))
        }
    };
    Ok(value)
}

fn set(cache: &mut AtfxCache, aid: Aid, iid: Iid, base: &str, value: Value) -> ExtCompResult<()> {
    let attr_no = cache.attr_no_by_base_name(aid, base)?;
    cache.set_value(aid, iid, attr_no, value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use atfx_model::BaseModel;

    #[test]
    fn test_file_names() {
        assert_eq!(FileCategory::Numeric.file_name("extcomp", 1), "extcomp_1.btf");
        assert_eq!(FileCategory::String.file_name("run", 2), "run_string_2.btf");
        assert_eq!(FileCategory::Flags.file_name("run", 3), "run_flags_3.btf");
    }

    #[test]
    fn test_integer_value_respects_declared_width() {
        let mut cache = AtfxCache::new(BaseModel::asam_ods().unwrap());
        let ec = cache.create_element("AoExternalComponent", "ExtComp").unwrap();
        let attr = cache.add_attribute(ec, "start_offset", Some("start_offset")).unwrap();

        assert_eq!(integer_value(&cache, ec, "start_offset", 7).unwrap(), Value::Long(7));
        let err = integer_value(&cache, ec, "start_offset", 3_000_000_000).unwrap_err();
        assert!(matches!(err, ExtCompError::BadParameter(_)));

        cache.set_attribute_data_type(ec, attr, DataType::DtLongLong).unwrap();
        assert_eq!(
            integer_value(&cache, ec, "start_offset", 3_000_000_000).unwrap(),
            Value::LongLong(3_000_000_000)
        );
    }

    #[test]
    fn test_select_file_rolls_over() {
        let dir = tempfile::tempdir().unwrap();
        let context = SessionContext::builder()
            .with_file_root(dir.path())
            .with_segment_size(10)
            .build();
        let mut writer = ExtCompWriter::new(context);

        let first = writer.select_file(FileCategory::Numeric, 8).unwrap();
        assert_eq!((first.name.as_str(), first.offset), ("extcomp_1.btf", 0));
        writer.append(&first, &[0; 8]).unwrap();

        let second = writer.select_file(FileCategory::Numeric, 8).unwrap();
        assert_eq!((second.name.as_str(), second.offset), ("extcomp_2.btf", 0));

        // oversized writes still go to an empty file
        let third = writer.select_file(FileCategory::Flags, 64).unwrap();
        assert_eq!((third.name.as_str(), third.offset), ("extcomp_flags_1.btf", 0));
    }
}
