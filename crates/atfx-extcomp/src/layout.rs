//! Binary layout of external-component records.
//!
//! Fixed-width values are laid out in blocks of `block_size` bytes, each
//! holding `values_per_block` consecutive values starting at byte
//! `value_offset`. Bit-packed integers occupy a window of
//! `ceil((bit_count + bit_offset) / 8)` bytes per value slot. Strings are
//! NUL-terminated records stored contiguously. Flags are contiguous 16-bit
//! signed integers.

use atfx_model::{Complex32, Complex64, DataType, Value};

use crate::error::{ExtCompError, ExtCompResult};
use crate::typespec::{ByteOrder, Charset, TypeSpec};

/// Widest bit-packed window the decoder handles.
const MAX_BIT_WINDOW: usize = 16;

/// Position of a bit-packed integer inside its byte window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField {
    /// Number of significant bits.
    pub bit_count: u16,
    /// Bits to skip from the start of the window.
    pub bit_offset: u16,
}

impl BitField {
    /// Creates a bit field.
    pub fn new(bit_count: u16, bit_offset: u16) -> Self {
        Self {
            bit_count,
            bit_offset,
        }
    }

    /// Size of the minimal enclosing byte window.
    pub fn window(&self) -> usize {
        (usize::from(self.bit_count) + usize::from(self.bit_offset)).div_ceil(8)
    }
}

/// Block layout of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    /// Bytes per block.
    pub block_size: usize,
    /// Consecutive values per block.
    pub values_per_block: usize,
    /// Offset of the first value within a block.
    pub value_offset: usize,
    /// Bit field of bit-packed typespecs.
    pub bits: Option<BitField>,
}

impl BlockLayout {
    /// Layout of densely packed values of `width` bytes.
    pub fn contiguous(width: usize) -> Self {
        Self {
            block_size: width,
            values_per_block: 1,
            value_offset: 0,
            bits: None,
        }
    }

    /// Byte position of value `index` relative to the start offset.
    pub fn position(&self, index: usize, width: usize) -> usize {
        (index / self.values_per_block) * self.block_size
            + self.value_offset
            + (index % self.values_per_block) * width
    }

    /// Number of bytes spanned by `count` values.
    pub fn byte_extent(&self, count: usize, width: usize) -> usize {
        match count {
            0 => 0,
            n => self.position(n - 1, width) + width,
        }
    }

    /// Checks that `values_per_block` values of `width` bytes fit a block.
    pub fn check(&self, width: usize) -> ExtCompResult<()> {
        if self.values_per_block == 0 {
            return Err(ExtCompError::bad_parameter("valuesperblock must be at least 1"));
        }
        let needed = self.value_offset + self.values_per_block * width;
        if needed > self.block_size {
            return Err(ExtCompError::bad_parameter(format!(
                "block of {} bytes cannot hold {} values of {} bytes at offset {}",
                self.block_size, self.values_per_block, width, self.value_offset
            )));
        }
        Ok(())
    }
}

/// Returns the bytes occupied by one value slot of `spec`.
pub fn slot_width(spec: TypeSpec, layout: &BlockLayout) -> ExtCompResult<usize> {
    if let Some(width) = spec.width() {
        return Ok(width);
    }
    if spec.is_bit_packed() {
        let bits = layout.bits.ok_or_else(|| {
            ExtCompError::bad_parameter(format!("{} requires a bit count", spec))
        })?;
        return Ok(bits.window());
    }
    Err(ExtCompError::not_implemented(format!("typespec {}", spec)))
}

/// Number of bytes to read from the start offset for `count` values.
///
/// For string typespecs `count` already is the byte extent.
pub fn byte_extent(spec: TypeSpec, layout: &BlockLayout, count: usize) -> ExtCompResult<usize> {
    if spec.is_string() {
        return Ok(count);
    }
    let width = slot_width(spec, layout)?;
    layout.check(width)?;
    Ok(layout.byte_extent(count, width))
}

// ============================================================================
// Decoding
// ============================================================================

/// Decodes `count` values of `spec` from `bytes`, which start at the
/// component's start offset.
///
/// String typespecs treat `count` as the byte extent of the records.
///
/// # Example
///
/// ```rust
/// use atfx_extcomp::{decode_values, BlockLayout, TypeSpec};
/// use atfx_model::Value;
///
/// let bytes = [0x00, 0x01, 0x00, 0x02];
/// let value = decode_values(TypeSpec::ShortBeo, &bytes, &BlockLayout::contiguous(2), 2).unwrap();
/// assert_eq!(value, Value::ShortSeq(vec![1, 2]));
/// ```
pub fn decode_values(
    spec: TypeSpec,
    bytes: &[u8],
    layout: &BlockLayout,
    count: usize,
) -> ExtCompResult<Value> {
    if let Some(charset) = spec.charset() {
        let records = bytes
            .get(..count)
            .ok_or_else(|| short_buffer(count, bytes.len()))?;
        return Ok(Value::StringSeq(decode_strings(charset, records)?));
    }

    let width = slot_width(spec, layout)?;
    layout.check(width)?;
    let order = spec.byte_order();
    let value = match spec {
        TypeSpec::Boolean => Value::BooleanSeq(collect(
            bytes,
            layout,
            count,
            order,
            |b: [u8; 1]| b[0] != 0,
            |b: [u8; 1]| b[0] != 0,
        )?),
        TypeSpec::Byte => Value::ByteSeq(collect(
            bytes,
            layout,
            count,
            order,
            u8::from_le_bytes,
            u8::from_be_bytes,
        )?),
        TypeSpec::SByte => Value::ShortSeq(collect(
            bytes,
            layout,
            count,
            order,
            |b: [u8; 1]| i16::from(i8::from_le_bytes(b)),
            |b: [u8; 1]| i16::from(i8::from_be_bytes(b)),
        )?),
        TypeSpec::Short | TypeSpec::ShortBeo => Value::ShortSeq(collect(
            bytes,
            layout,
            count,
            order,
            i16::from_le_bytes,
            i16::from_be_bytes,
        )?),
        TypeSpec::UShort | TypeSpec::UShortBeo => Value::LongSeq(collect(
            bytes,
            layout,
            count,
            order,
            |b: [u8; 2]| i32::from(u16::from_le_bytes(b)),
            |b: [u8; 2]| i32::from(u16::from_be_bytes(b)),
        )?),
        TypeSpec::Long | TypeSpec::LongBeo => Value::LongSeq(collect(
            bytes,
            layout,
            count,
            order,
            i32::from_le_bytes,
            i32::from_be_bytes,
        )?),
        TypeSpec::ULong | TypeSpec::ULongBeo => Value::LongLongSeq(collect(
            bytes,
            layout,
            count,
            order,
            |b: [u8; 4]| i64::from(u32::from_le_bytes(b)),
            |b: [u8; 4]| i64::from(u32::from_be_bytes(b)),
        )?),
        TypeSpec::LongLong | TypeSpec::LongLongBeo => Value::LongLongSeq(collect(
            bytes,
            layout,
            count,
            order,
            i64::from_le_bytes,
            i64::from_be_bytes,
        )?),
        TypeSpec::Float | TypeSpec::FloatBeo => Value::FloatSeq(collect(
            bytes,
            layout,
            count,
            order,
            f32::from_le_bytes,
            f32::from_be_bytes,
        )?),
        TypeSpec::Double | TypeSpec::DoubleBeo => Value::DoubleSeq(collect(
            bytes,
            layout,
            count,
            order,
            f64::from_le_bytes,
            f64::from_be_bytes,
        )?),
        spec if spec.is_bit_packed() => decode_bits(spec, bytes, layout, count)?,
        spec => return Err(ExtCompError::not_implemented(format!("typespec {}", spec))),
    };
    Ok(value)
}

fn collect<T, const N: usize>(
    bytes: &[u8],
    layout: &BlockLayout,
    count: usize,
    order: ByteOrder,
    little: fn([u8; N]) -> T,
    big: fn([u8; N]) -> T,
) -> ExtCompResult<Vec<T>> {
    let decode = match order {
        ByteOrder::Little => little,
        ByteOrder::Big => big,
    };
    let mut values = Vec::with_capacity(count);
    for index in 0..count {
        let pos = layout.position(index, N);
        let chunk = bytes
            .get(pos..pos + N)
            .ok_or_else(|| short_buffer(pos + N, bytes.len()))?;
        let mut raw = [0u8; N];
        raw.copy_from_slice(chunk);
        values.push(decode(raw));
    }
    Ok(values)
}

fn decode_bits(
    spec: TypeSpec,
    bytes: &[u8],
    layout: &BlockLayout,
    count: usize,
) -> ExtCompResult<Value> {
    let bits = layout
        .bits
        .ok_or_else(|| ExtCompError::bad_parameter(format!("{} requires a bit count", spec)))?;
    let data_type = spec.decoded_type(Some(bits.bit_count))?;
    let window = bits.window();
    if window > MAX_BIT_WINDOW {
        return Err(ExtCompError::bad_parameter(format!(
            "bit window of {} bytes exceeds {}",
            window, MAX_BIT_WINDOW
        )));
    }

    let signed = spec.is_signed_bits();
    let width = u32::from(bits.bit_count);
    let mut values = Vec::with_capacity(count);
    for index in 0..count {
        let pos = layout.position(index, window);
        let chunk = bytes
            .get(pos..pos + window)
            .ok_or_else(|| short_buffer(pos + window, bytes.len()))?;
        let raw = match spec.byte_order() {
            ByteOrder::Little => chunk
                .iter()
                .rev()
                .fold(0u128, |acc, b| (acc << 8) | u128::from(*b)),
            ByteOrder::Big => chunk.iter().fold(0u128, |acc, b| (acc << 8) | u128::from(*b)),
        };
        let mask = (1u128 << width) - 1;
        let unsigned = (raw >> bits.bit_offset) & mask;
        let value = if signed && (unsigned >> (width - 1)) & 1 == 1 {
            (unsigned | !mask) as i128
        } else {
            unsigned as i128
        };
        values.push(value);
    }

    if data_type == DataType::DsLong {
        let narrowed = values
            .into_iter()
            .map(|v| i32::try_from(v).map_err(|_| ExtCompError::bad_parameter("bit value out of range")))
            .collect::<ExtCompResult<Vec<_>>>()?;
        Ok(Value::LongSeq(narrowed))
    } else {
        let widened = values
            .into_iter()
            .map(|v| i64::try_from(v).map_err(|_| ExtCompError::bad_parameter("bit value out of range")))
            .collect::<ExtCompResult<Vec<_>>>()?;
        Ok(Value::LongLongSeq(widened))
    }
}

/// Splits NUL-terminated records.
///
/// A trailing record without terminator is kept. Invalid UTF-8 is an error.
pub fn decode_strings(charset: Charset, bytes: &[u8]) -> ExtCompResult<Vec<String>> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    let body = bytes.strip_suffix(&[0]).unwrap_or(bytes);
    body.split(|b| *b == 0)
        .map(|record| match charset {
            Charset::Latin1 => Ok(record.iter().map(|b| char::from(*b)).collect()),
            Charset::Utf8 => String::from_utf8(record.to_vec())
                .map_err(|e| ExtCompError::bad_parameter(format!("invalid UTF-8 record: {}", e))),
        })
        .collect()
}

/// Decodes `count` contiguous 16-bit flags.
pub fn decode_flags(order: ByteOrder, bytes: &[u8], count: usize) -> ExtCompResult<Vec<i16>> {
    collect(
        bytes,
        &BlockLayout::contiguous(2),
        count,
        order,
        i16::from_le_bytes,
        i16::from_be_bytes,
    )
}

// ============================================================================
// Encoding
// ============================================================================

/// Typespec a sequence value is written with.
pub fn encoding_for(value: &Value) -> ExtCompResult<TypeSpec> {
    let spec = match value {
        Value::BooleanSeq(_) => TypeSpec::Boolean,
        Value::ByteSeq(_) => TypeSpec::Byte,
        Value::ShortSeq(_) => TypeSpec::Short,
        Value::LongSeq(_) | Value::EnumSeq(_) => TypeSpec::Long,
        Value::LongLongSeq(_) => TypeSpec::LongLong,
        Value::FloatSeq(_) | Value::ComplexSeq(_) => TypeSpec::Float,
        Value::DoubleSeq(_) | Value::DComplexSeq(_) => TypeSpec::Double,
        Value::StringSeq(_) | Value::DateSeq(_) => TypeSpec::StringUtf8,
        other => {
            return Err(ExtCompError::not_implemented(format!(
                "external storage of {}",
                other.data_type()
            )))
        }
    };
    Ok(spec)
}

/// Encodes a sequence value contiguously with `spec`.
///
/// Complex values are written as interleaved real/imaginary pairs; strings
/// and dates as NUL-terminated records.
pub fn encode_values(spec: TypeSpec, value: &Value) -> ExtCompResult<Vec<u8>> {
    let order = spec.byte_order();
    let mut out = Vec::new();
    match (spec, value) {
        (TypeSpec::Boolean, Value::BooleanSeq(v)) => out.extend(v.iter().map(|b| u8::from(*b))),
        (TypeSpec::Byte, Value::ByteSeq(v)) => out.extend_from_slice(v),
        (TypeSpec::Short | TypeSpec::ShortBeo, Value::ShortSeq(v)) => {
            put_all(&mut out, v, order, i16::to_le_bytes, i16::to_be_bytes)
        }
        (TypeSpec::Long | TypeSpec::LongBeo, Value::LongSeq(v) | Value::EnumSeq(v)) => {
            put_all(&mut out, v, order, i32::to_le_bytes, i32::to_be_bytes)
        }
        (TypeSpec::LongLong | TypeSpec::LongLongBeo, Value::LongLongSeq(v)) => {
            put_all(&mut out, v, order, i64::to_le_bytes, i64::to_be_bytes)
        }
        (TypeSpec::Float | TypeSpec::FloatBeo, Value::FloatSeq(v)) => {
            put_all(&mut out, v, order, f32::to_le_bytes, f32::to_be_bytes)
        }
        (TypeSpec::Float | TypeSpec::FloatBeo, Value::ComplexSeq(v)) => {
            let parts: Vec<f32> = v.iter().flat_map(|c: &Complex32| [c.re, c.im]).collect();
            put_all(&mut out, &parts, order, f32::to_le_bytes, f32::to_be_bytes)
        }
        (TypeSpec::Double | TypeSpec::DoubleBeo, Value::DoubleSeq(v)) => {
            put_all(&mut out, v, order, f64::to_le_bytes, f64::to_be_bytes)
        }
        (TypeSpec::Double | TypeSpec::DoubleBeo, Value::DComplexSeq(v)) => {
            let parts: Vec<f64> = v.iter().flat_map(|c: &Complex64| [c.re, c.im]).collect();
            put_all(&mut out, &parts, order, f64::to_le_bytes, f64::to_be_bytes)
        }
        (spec, Value::StringSeq(v) | Value::DateSeq(v)) if spec.is_string() => {
            for record in v {
                if record.contains('\0') {
                    return Err(ExtCompError::bad_parameter("string record contains NUL"));
                }
                match spec.charset() {
                    Some(Charset::Latin1) => {
                        for c in record.chars() {
                            let byte = u8::try_from(u32::from(c)).map_err(|_| {
                                ExtCompError::bad_parameter(format!(
                                    "character '{}' not representable in ISO-8859-1",
                                    c
                                ))
                            })?;
                            out.push(byte);
                        }
                    }
                    _ => out.extend_from_slice(record.as_bytes()),
                }
                out.push(0);
            }
        }
        (spec, value) => {
            return Err(ExtCompError::not_implemented(format!(
                "encoding {} as {}",
                value.data_type(),
                spec
            )))
        }
    }
    Ok(out)
}

/// Encodes flags contiguously.
pub fn encode_flags(order: ByteOrder, flags: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(flags.len() * 2);
    put_all(&mut out, flags, order, i16::to_le_bytes, i16::to_be_bytes);
    out
}

fn put_all<T: Copy, const N: usize>(
    out: &mut Vec<u8>,
    values: &[T],
    order: ByteOrder,
    little: fn(T) -> [u8; N],
    big: fn(T) -> [u8; N],
) {
    let encode = match order {
        ByteOrder::Little => little,
        ByteOrder::Big => big,
    };
    out.reserve(values.len() * N);
    for v in values {
        out.extend_from_slice(&encode(*v));
    }
}

fn short_buffer(needed: usize, available: usize) -> ExtCompError {
    ExtCompError::bad_parameter(format!(
        "component needs {} bytes, only {} available",
        needed, available
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_packed_uint12_at_offset_3() {
        let layout = BlockLayout {
            bits: Some(BitField::new(12, 3)),
            ..BlockLayout::contiguous(3)
        };
        let value = decode_values(TypeSpec::BitUInt, &[0x98, 0x57, 0x00], &layout, 1).unwrap();
        assert_eq!(value, Value::LongSeq(vec![2803]));
    }

    #[test]
    fn test_bit_packed_signed_extends() {
        // 4-bit 0b1110 at offset 0 is -2
        let layout = BlockLayout {
            bits: Some(BitField::new(4, 0)),
            ..BlockLayout::contiguous(1)
        };
        let value = decode_values(TypeSpec::BitInt, &[0x0E, 0x03], &layout, 2).unwrap();
        assert_eq!(value, Value::LongSeq(vec![-2, 3]));
    }

    #[test]
    fn test_bit_packed_big_endian_window() {
        let layout = BlockLayout {
            bits: Some(BitField::new(12, 0)),
            ..BlockLayout::contiguous(2)
        };
        let value = decode_values(TypeSpec::BitUIntBeo, &[0x0A, 0xF3], &layout, 1).unwrap();
        assert_eq!(value, Value::LongSeq(vec![0xAF3]));
    }

    #[test]
    fn test_block_layout() {
        // two values per 8-byte block starting at byte 2
        let layout = BlockLayout {
            block_size: 8,
            values_per_block: 2,
            value_offset: 2,
            bits: None,
        };
        assert_eq!(layout.position(0, 2), 2);
        assert_eq!(layout.position(1, 2), 4);
        assert_eq!(layout.position(2, 2), 10);
        assert_eq!(layout.byte_extent(3, 2), 12);

        let bytes = [0, 0, 1, 0, 2, 0, 9, 9, 0, 0, 3, 0];
        let value = decode_values(TypeSpec::Short, &bytes, &layout, 3).unwrap();
        assert_eq!(value, Value::ShortSeq(vec![1, 2, 3]));
    }

    #[test]
    fn test_block_layout_overflow_rejected() {
        let layout = BlockLayout {
            block_size: 4,
            values_per_block: 2,
            value_offset: 1,
            bits: None,
        };
        assert!(matches!(
            decode_values(TypeSpec::Short, &[0; 8], &layout, 2),
            Err(ExtCompError::BadParameter(_))
        ));
    }

    #[test]
    fn test_unsigned_widening() {
        let value = decode_values(TypeSpec::UShort, &[0xFF, 0xFF], &BlockLayout::contiguous(2), 1).unwrap();
        assert_eq!(value, Value::LongSeq(vec![65535]));
        let value =
            decode_values(TypeSpec::ULongBeo, &[0xFF, 0xFF, 0xFF, 0xFE], &BlockLayout::contiguous(4), 1)
                .unwrap();
        assert_eq!(value, Value::LongLongSeq(vec![4_294_967_294]));
        let value = decode_values(TypeSpec::SByte, &[0x80], &BlockLayout::contiguous(1), 1).unwrap();
        assert_eq!(value, Value::ShortSeq(vec![-128]));
    }

    #[test]
    fn test_short_buffer() {
        let err = decode_values(TypeSpec::Double, &[0; 12], &BlockLayout::contiguous(8), 2).unwrap_err();
        assert!(matches!(err, ExtCompError::BadParameter(_)));
    }

    #[test]
    fn test_unsupported_typespec() {
        let err = decode_values(TypeSpec::Blob, &[0; 4], &BlockLayout::contiguous(4), 1).unwrap_err();
        assert!(matches!(err, ExtCompError::NotImplemented(_)));
    }

    #[test]
    fn test_strings() {
        let latin1 = decode_strings(Charset::Latin1, b"gr\xfc\x00ok\x00").unwrap();
        assert_eq!(latin1, vec!["grü".to_string(), "ok".to_string()]);
        let utf8 = decode_strings(Charset::Utf8, "grü\0\0x".as_bytes()).unwrap();
        assert_eq!(utf8, vec!["grü".to_string(), String::new(), "x".to_string()]);
        assert!(decode_strings(Charset::Utf8, b"\xff\x00").is_err());
        assert!(decode_strings(Charset::Utf8, b"").unwrap().is_empty());
    }

    #[test]
    fn test_encode_strings_and_complex() {
        let value = Value::StringSeq(vec!["grü".into(), "x".into()]);
        assert_eq!(encode_values(TypeSpec::String, &value).unwrap(), b"gr\xfc\x00x\x00");
        assert!(encode_values(TypeSpec::String, &Value::StringSeq(vec!["€".into()])).is_err());

        let value = Value::ComplexSeq(vec![Complex32 { re: 1.0, im: -1.0 }]);
        let bytes = encode_values(TypeSpec::Float, &value).unwrap();
        assert_eq!(
            decode_values(TypeSpec::Float, &bytes, &BlockLayout::contiguous(4), 2).unwrap(),
            Value::FloatSeq(vec![1.0, -1.0])
        );
    }

    #[test]
    fn test_encode_mismatch_not_implemented() {
        let err = encode_values(TypeSpec::Short, &Value::DoubleSeq(vec![1.0])).unwrap_err();
        assert!(matches!(err, ExtCompError::NotImplemented(_)));
        assert!(encoding_for(&Value::ByteStrSeq(vec![])).is_err());
    }

    #[test]
    fn test_flags_big_endian() {
        let bytes = encode_flags(ByteOrder::Big, &[15, -1]);
        assert_eq!(bytes, vec![0x00, 0x0F, 0xFF, 0xFF]);
        assert_eq!(decode_flags(ByteOrder::Big, &bytes, 2).unwrap(), vec![15, -1]);
    }
}
