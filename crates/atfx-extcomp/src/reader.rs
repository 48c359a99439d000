//! Read path of the external-component codec.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use atfx_model::{Aid, AtfxCache, Complex32, Complex64, DataType, Iid, Value};
use tracing::debug;

use crate::config::SessionContext;
use crate::descriptor::{descriptors_of, is_complex, optional, raw_datatype, ExtCompDescriptor};
use crate::error::{ExtCompError, ExtCompResult};
use crate::layout::{decode_flags, decode_values};

/// Reads column values and flags from external component files.
///
/// Each call opens one short-lived read-only handle per descriptor.
///
/// # Example
///
/// ```ignore
/// use atfx_extcomp::{ExtCompReader, SessionContext};
///
/// let reader = ExtCompReader::new(SessionContext::builder().with_file_root(dir).build());
/// let values = reader.read_values(&cache, local_column, iid)?;
/// let flags = reader.read_flags(&cache, local_column, iid)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExtCompReader {
    context: SessionContext,
}

impl ExtCompReader {
    /// Creates a reader resolving files against the context's file root.
    pub fn new(context: SessionContext) -> Self {
        Self { context }
    }

    /// Returns the session context.
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Reads the values of a column instance.
    ///
    /// Descriptors are read in ordinal order and concatenated. A column
    /// without descriptors yields an empty sequence of its `raw_datatype`
    /// (`DS_DOUBLE` when unknown). Interleaved floats of complex columns are
    /// paired, string records of date columns become `DS_DATE` and 32-bit
    /// integers of enum columns become `DS_ENUM`.
    ///
    /// # Arguments
    ///
    /// * `cache` - The cache holding the column and its descriptors
    /// * `aid` - The local column element
    /// * `iid` - The local column instance
    ///
    /// # Returns
    ///
    /// * `Ok(Value)` - A sequence value of the column's type
    /// * `Err(ExtCompError)` - If a descriptor is incomplete, a file cannot be
    ///   read or its bytes do not hold the described values
    pub fn read_values(&self, cache: &AtfxCache, aid: Aid, iid: Iid) -> ExtCompResult<Value> {
        let descriptors = descriptors_of(cache, aid, iid)?;
        let raw = raw_datatype(cache, aid, iid)?;
        if descriptors.is_empty() {
            return Ok(empty_column(raw));
        }

        let mut values: Option<Value> = None;
        for descriptor in &descriptors {
            let part = self.read_descriptor(descriptor)?;
            values = Some(match values {
                Some(acc) => concat(acc, part)?,
                None => part,
            });
        }
        debug!(aid, iid, descriptors = descriptors.len(), "read external column");
        match values {
            Some(values) => shape(values, raw),
            None => Ok(empty_column(raw)),
        }
    }

    /// Reads the flags of a column instance.
    ///
    /// Returns `None` when any descriptor has no flags file or offset, or
    /// when a column without descriptors has no local flags.
    pub fn read_flags(
        &self,
        cache: &AtfxCache,
        aid: Aid,
        iid: Iid,
    ) -> ExtCompResult<Option<Vec<i16>>> {
        let descriptors = descriptors_of(cache, aid, iid)?;
        if descriptors.is_empty() {
            return match optional(cache, aid, iid, "flags")? {
                Some(Value::ShortSeq(flags)) => Ok(Some(flags.clone())),
                _ => Ok(None),
            };
        }

        let raw = raw_datatype(cache, aid, iid)?;
        let mut flags = Vec::new();
        for descriptor in &descriptors {
            let Some((url, offset)) = descriptor.flags_location() else {
                debug!(aid, iid, descriptor = descriptor.iid, "no flags");
                return Ok(None);
            };
            let count = self.sample_count(descriptor, raw)?;
            let bytes = self.read_range(url, offset, count * 2)?;
            flags.extend(decode_flags(descriptor.value_type.byte_order(), &bytes, count)?);
        }
        Ok(Some(flags))
    }

    /// Decodes the values of a single descriptor.
    pub fn read_descriptor(&self, descriptor: &ExtCompDescriptor) -> ExtCompResult<Value> {
        let extent = descriptor.byte_extent()?;
        let bytes = self.read_range(&descriptor.filename_url, descriptor.start_offset, extent)?;
        decode_values(
            descriptor.value_type,
            &bytes,
            &descriptor.layout,
            descriptor.component_length,
        )
    }

    fn sample_count(&self, descriptor: &ExtCompDescriptor, raw: Option<DataType>) -> ExtCompResult<usize> {
        if descriptor.value_type.is_string() {
            return Ok(self
                .read_descriptor(descriptor)?
                .sequence_len()
                .unwrap_or(0));
        }
        if is_complex(raw) {
            Ok(descriptor.component_length / 2)
        } else {
            Ok(descriptor.component_length)
        }
    }

    fn read_range(&self, url: &str, offset: u64, len: usize) -> ExtCompResult<Vec<u8>> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let path = self.context.resolve(url);
        let mut file = File::open(&path).map_err(|e| ExtCompError::io_error(&path, e))?;
        let file_len = file
            .metadata()
            .map_err(|e| ExtCompError::io_error(&path, e))?
            .len();
        let end = offset.saturating_add(len as u64);
        if end > file_len {
            return Err(ExtCompError::bad_parameter(format!(
                "{}: bytes {}..{} beyond end of file ({} bytes)",
                path.display(),
                offset,
                end,
                file_len
            )));
        }

        file.seek(SeekFrom::Start(offset))
            .map_err(|e| ExtCompError::io_error(&path, e))?;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf)
            .map_err(|e| ExtCompError::io_error(&path, e))?;
        debug!(path = %path.display(), offset, len, "read external component range");
        Ok(buf)
    }
}

/// Empty sequence of a column's raw data type, `DS_DOUBLE` when unknown.
pub(crate) fn empty_column(raw: Option<DataType>) -> Value {
    raw.and_then(sequence_type)
        .and_then(Value::empty_sequence)
        .unwrap_or(Value::DoubleSeq(Vec::new()))
}

fn sequence_type(data_type: DataType) -> Option<DataType> {
    let sequence = match data_type {
        DataType::DtString | DataType::DsString => DataType::DsString,
        DataType::DtShort | DataType::DsShort => DataType::DsShort,
        DataType::DtFloat | DataType::DsFloat => DataType::DsFloat,
        DataType::DtBoolean | DataType::DsBoolean => DataType::DsBoolean,
        DataType::DtByte | DataType::DsByte => DataType::DsByte,
        DataType::DtLong | DataType::DsLong => DataType::DsLong,
        DataType::DtDouble | DataType::DsDouble => DataType::DsDouble,
        DataType::DtLongLong | DataType::DsLongLong => DataType::DsLongLong,
        DataType::DtComplex | DataType::DsComplex => DataType::DsComplex,
        DataType::DtDComplex | DataType::DsDComplex => DataType::DsDComplex,
        DataType::DtDate | DataType::DsDate => DataType::DsDate,
        DataType::DtByteStr | DataType::DsByteStr => DataType::DsByteStr,
        DataType::DtEnum | DataType::DsEnum => DataType::DsEnum,
        _ => return None,
    };
    Some(sequence)
}

fn concat(acc: Value, part: Value) -> ExtCompResult<Value> {
    let joined = match (acc, part) {
        (Value::BooleanSeq(mut a), Value::BooleanSeq(b)) => {
            a.extend(b);
            Value::BooleanSeq(a)
        }
        (Value::ByteSeq(mut a), Value::ByteSeq(b)) => {
            a.extend(b);
            Value::ByteSeq(a)
        }
        (Value::ShortSeq(mut a), Value::ShortSeq(b)) => {
            a.extend(b);
            Value::ShortSeq(a)
        }
        (Value::LongSeq(mut a), Value::LongSeq(b)) => {
            a.extend(b);
            Value::LongSeq(a)
        }
        (Value::LongLongSeq(mut a), Value::LongLongSeq(b)) => {
            a.extend(b);
            Value::LongLongSeq(a)
        }
        (Value::FloatSeq(mut a), Value::FloatSeq(b)) => {
            a.extend(b);
            Value::FloatSeq(a)
        }
        (Value::DoubleSeq(mut a), Value::DoubleSeq(b)) => {
            a.extend(b);
            Value::DoubleSeq(a)
        }
        (Value::StringSeq(mut a), Value::StringSeq(b)) => {
            a.extend(b);
            Value::StringSeq(a)
        }
        (a, b) => {
            return Err(ExtCompError::bad_parameter(format!(
                "descriptors of one column decode to {} and {}",
                a.data_type(),
                b.data_type()
            )))
        }
    };
    Ok(joined)
}

/// Applies the column's raw data type to decoded values.
fn shape(values: Value, raw: Option<DataType>) -> ExtCompResult<Value> {
    let shaped = match (raw, values) {
        (Some(DataType::DtComplex | DataType::DsComplex), Value::FloatSeq(v)) => {
            Value::ComplexSeq(pairs(&v)?.map(|[re, im]| Complex32 { re, im }).collect())
        }
        (Some(DataType::DtDComplex | DataType::DsDComplex), Value::DoubleSeq(v)) => {
            Value::DComplexSeq(pairs(&v)?.map(|[re, im]| Complex64 { re, im }).collect())
        }
        (Some(DataType::DtDate | DataType::DsDate), Value::StringSeq(v)) => Value::DateSeq(v),
        (Some(DataType::DtEnum | DataType::DsEnum), Value::LongSeq(v)) => Value::EnumSeq(v),
        (_, values) => values,
    };
    Ok(shaped)
}

fn pairs<T: Copy>(values: &[T]) -> ExtCompResult<impl Iterator<Item = [T; 2]> + '_> {
    if values.len() % 2 != 0 {
        return Err(ExtCompError::bad_parameter(format!(
            "complex column with odd number of parts ({})",
            values.len()
        )));
    }
    Ok(values.chunks_exact(2).map(|c| [c[0], c[1]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_column_types() {
        assert_eq!(empty_column(None), Value::DoubleSeq(Vec::new()));
        assert_eq!(empty_column(Some(DataType::DtLong)), Value::LongSeq(Vec::new()));
        assert_eq!(empty_column(Some(DataType::DsDate)), Value::DateSeq(Vec::new()));
        assert_eq!(empty_column(Some(DataType::DtUnknown)), Value::DoubleSeq(Vec::new()));
    }

    #[test]
    fn test_concat_mismatch() {
        let err = concat(Value::LongSeq(vec![1]), Value::DoubleSeq(vec![2.0])).unwrap_err();
        assert!(matches!(err, ExtCompError::BadParameter(_)));
        assert_eq!(
            concat(Value::LongSeq(vec![1]), Value::LongSeq(vec![2])).unwrap(),
            Value::LongSeq(vec![1, 2])
        );
    }

    #[test]
    fn test_shape_complex_and_dates() {
        let shaped = shape(Value::FloatSeq(vec![1.0, 2.0, 3.0, 4.0]), Some(DataType::DsComplex)).unwrap();
        assert_eq!(
            shaped,
            Value::ComplexSeq(vec![Complex32 { re: 1.0, im: 2.0 }, Complex32 { re: 3.0, im: 4.0 }])
        );
        assert!(shape(Value::FloatSeq(vec![1.0]), Some(DataType::DtComplex)).is_err());

        let shaped = shape(Value::StringSeq(vec!["20240101".into()]), Some(DataType::DtDate)).unwrap();
        assert_eq!(shaped, Value::DateSeq(vec!["20240101".into()]));
        assert_eq!(
            shape(Value::LongSeq(vec![1]), Some(DataType::DsDouble)).unwrap(),
            Value::LongSeq(vec![1])
        );
    }

    #[test]
    fn test_shape_enum_columns() {
        assert_eq!(
            shape(Value::LongSeq(vec![1, 2, 3]), Some(DataType::DtEnum)).unwrap(),
            Value::EnumSeq(vec![1, 2, 3])
        );
        assert_eq!(
            shape(Value::LongSeq(vec![4]), Some(DataType::DsEnum)).unwrap(),
            Value::EnumSeq(vec![4])
        );
        assert_eq!(
            shape(Value::LongSeq(vec![5]), None).unwrap(),
            Value::LongSeq(vec![5])
        );
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let reader = ExtCompReader::new(SessionContext::builder().with_file_root(dir.path()).build());
        let err = reader.read_range("missing.btf", 0, 8).unwrap_err();
        assert_eq!(err.kind(), atfx_model::ErrorKind::Io);
    }

    #[test]
    fn test_range_beyond_end() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("short.btf"), [1u8, 2, 3]).unwrap();
        let reader = ExtCompReader::new(SessionContext::builder().with_file_root(dir.path()).build());
        assert!(matches!(
            reader.read_range("short.btf", 1, 4),
            Err(ExtCompError::BadParameter(_))
        ));
        assert_eq!(reader.read_range("short.btf", 1, 2).unwrap(), vec![2, 3]);
    }
}
