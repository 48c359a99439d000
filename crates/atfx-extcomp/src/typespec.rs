//! Value type codes of external-component descriptors.

use std::fmt;

use atfx_model::DataType;

use crate::error::{ExtCompError, ExtCompResult};

/// Byte order of stored values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    /// Least significant byte first.
    Little,
    /// Most significant byte first (`*_beo` typespecs).
    Big,
}

/// Character set of NUL-terminated string records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Charset {
    /// ISO-8859-1, one byte per character.
    Latin1,
    /// UTF-8.
    Utf8,
}

/// Value type (`typespec_enum`) of an external component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum TypeSpec {
    /// `dt_boolean`
    Boolean = 0,
    /// `dt_byte`
    Byte = 1,
    /// `dt_short`
    Short = 2,
    /// `dt_long`
    Long = 3,
    /// `dt_longlong`
    LongLong = 4,
    /// `ieeefloat4`
    Float = 5,
    /// `ieeefloat8`
    Double = 6,
    /// `dt_short_beo`
    ShortBeo = 7,
    /// `dt_long_beo`
    LongBeo = 8,
    /// `dt_longlong_beo`
    LongLongBeo = 9,
    /// `ieeefloat4_beo`
    FloatBeo = 10,
    /// `ieeefloat8_beo`
    DoubleBeo = 11,
    /// `dt_string`
    String = 12,
    /// `dt_bytestr`
    ByteStr = 13,
    /// `dt_blob`
    Blob = 14,
    /// `dt_boolean_flags_beo`
    BooleanFlagsBeo = 15,
    /// `dt_byte_flags_beo`
    ByteFlagsBeo = 16,
    /// `dt_string_flags_beo`
    StringFlagsBeo = 17,
    /// `dt_bytestr_beo`
    ByteStrBeo = 18,
    /// `dt_sbyte`
    SByte = 19,
    /// `dt_sbyte_flags_beo`
    SByteFlagsBeo = 20,
    /// `dt_ushort`
    UShort = 21,
    /// `dt_ushort_beo`
    UShortBeo = 22,
    /// `dt_ulong`
    ULong = 23,
    /// `dt_ulong_beo`
    ULongBeo = 24,
    /// `dt_string_utf8`
    StringUtf8 = 25,
    /// `dt_string_utf8_beo`
    StringUtf8Beo = 26,
    /// `dt_bit_int`
    BitInt = 27,
    /// `dt_bit_int_beo`
    BitIntBeo = 28,
    /// `dt_bit_uint`
    BitUInt = 29,
    /// `dt_bit_uint_beo`
    BitUIntBeo = 30,
    /// `dt_bit_ieeefloat`
    BitFloat = 31,
    /// `dt_bit_ieeefloat_beo`
    BitFloatBeo = 32,
}

impl TypeSpec {
    /// All typespecs in code order.
    pub const ALL: [TypeSpec; 33] = [
        TypeSpec::Boolean,
        TypeSpec::Byte,
        TypeSpec::Short,
        TypeSpec::Long,
        TypeSpec::LongLong,
        TypeSpec::Float,
        TypeSpec::Double,
        TypeSpec::ShortBeo,
        TypeSpec::LongBeo,
        TypeSpec::LongLongBeo,
        TypeSpec::FloatBeo,
        TypeSpec::DoubleBeo,
        TypeSpec::String,
        TypeSpec::ByteStr,
        TypeSpec::Blob,
        TypeSpec::BooleanFlagsBeo,
        TypeSpec::ByteFlagsBeo,
        TypeSpec::StringFlagsBeo,
        TypeSpec::ByteStrBeo,
        TypeSpec::SByte,
        TypeSpec::SByteFlagsBeo,
        TypeSpec::UShort,
        TypeSpec::UShortBeo,
        TypeSpec::ULong,
        TypeSpec::ULongBeo,
        TypeSpec::StringUtf8,
        TypeSpec::StringUtf8Beo,
        TypeSpec::BitInt,
        TypeSpec::BitIntBeo,
        TypeSpec::BitUInt,
        TypeSpec::BitUIntBeo,
        TypeSpec::BitFloat,
        TypeSpec::BitFloatBeo,
    ];

    /// Returns the enumeration code.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Looks up a typespec by code.
    pub fn from_code(code: i32) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| Self::ALL.get(idx))
            .copied()
    }

    /// Looks up a typespec by code, failing for unknown codes.
    pub fn try_from_code(code: i32) -> ExtCompResult<Self> {
        Self::from_code(code)
            .ok_or_else(|| ExtCompError::not_implemented(format!("typespec code {}", code)))
    }

    /// Returns the enumeration item name, e.g. `ieeefloat8_beo`.
    pub fn name(self) -> &'static str {
        match self {
            TypeSpec::Boolean => "dt_boolean",
            TypeSpec::Byte => "dt_byte",
            TypeSpec::Short => "dt_short",
            TypeSpec::Long => "dt_long",
            TypeSpec::LongLong => "dt_longlong",
            TypeSpec::Float => "ieeefloat4",
            TypeSpec::Double => "ieeefloat8",
            TypeSpec::ShortBeo => "dt_short_beo",
            TypeSpec::LongBeo => "dt_long_beo",
            TypeSpec::LongLongBeo => "dt_longlong_beo",
            TypeSpec::FloatBeo => "ieeefloat4_beo",
            TypeSpec::DoubleBeo => "ieeefloat8_beo",
            TypeSpec::String => "dt_string",
            TypeSpec::ByteStr => "dt_bytestr",
            TypeSpec::Blob => "dt_blob",
            TypeSpec::BooleanFlagsBeo => "dt_boolean_flags_beo",
            TypeSpec::ByteFlagsBeo => "dt_byte_flags_beo",
            TypeSpec::StringFlagsBeo => "dt_string_flags_beo",
            TypeSpec::ByteStrBeo => "dt_bytestr_beo",
            TypeSpec::SByte => "dt_sbyte",
            TypeSpec::SByteFlagsBeo => "dt_sbyte_flags_beo",
            TypeSpec::UShort => "dt_ushort",
            TypeSpec::UShortBeo => "dt_ushort_beo",
            TypeSpec::ULong => "dt_ulong",
            TypeSpec::ULongBeo => "dt_ulong_beo",
            TypeSpec::StringUtf8 => "dt_string_utf8",
            TypeSpec::StringUtf8Beo => "dt_string_utf8_beo",
            TypeSpec::BitInt => "dt_bit_int",
            TypeSpec::BitIntBeo => "dt_bit_int_beo",
            TypeSpec::BitUInt => "dt_bit_uint",
            TypeSpec::BitUIntBeo => "dt_bit_uint_beo",
            TypeSpec::BitFloat => "dt_bit_ieeefloat",
            TypeSpec::BitFloatBeo => "dt_bit_ieeefloat_beo",
        }
    }

    /// Returns the byte order of stored values.
    pub fn byte_order(self) -> ByteOrder {
        match self {
            TypeSpec::ShortBeo
            | TypeSpec::LongBeo
            | TypeSpec::LongLongBeo
            | TypeSpec::FloatBeo
            | TypeSpec::DoubleBeo
            | TypeSpec::BooleanFlagsBeo
            | TypeSpec::ByteFlagsBeo
            | TypeSpec::StringFlagsBeo
            | TypeSpec::ByteStrBeo
            | TypeSpec::SByteFlagsBeo
            | TypeSpec::UShortBeo
            | TypeSpec::ULongBeo
            | TypeSpec::StringUtf8Beo
            | TypeSpec::BitIntBeo
            | TypeSpec::BitUIntBeo
            | TypeSpec::BitFloatBeo => ByteOrder::Big,
            _ => ByteOrder::Little,
        }
    }

    /// Returns the width in bytes of a fixed-width value, `None` for strings,
    /// byte streams and bit-packed values.
    pub fn width(self) -> Option<usize> {
        match self {
            TypeSpec::Boolean | TypeSpec::Byte | TypeSpec::SByte => Some(1),
            TypeSpec::Short | TypeSpec::ShortBeo | TypeSpec::UShort | TypeSpec::UShortBeo => Some(2),
            TypeSpec::Long
            | TypeSpec::LongBeo
            | TypeSpec::ULong
            | TypeSpec::ULongBeo
            | TypeSpec::Float
            | TypeSpec::FloatBeo => Some(4),
            TypeSpec::LongLong | TypeSpec::LongLongBeo | TypeSpec::Double | TypeSpec::DoubleBeo => {
                Some(8)
            }
            _ => None,
        }
    }

    /// Returns the charset of NUL-terminated string typespecs.
    pub fn charset(self) -> Option<Charset> {
        match self {
            TypeSpec::String => Some(Charset::Latin1),
            TypeSpec::StringUtf8 | TypeSpec::StringUtf8Beo => Some(Charset::Utf8),
            _ => None,
        }
    }

    /// Returns true for NUL-terminated string typespecs.
    pub fn is_string(self) -> bool {
        self.charset().is_some()
    }

    /// Returns true for bit-packed integer typespecs.
    pub fn is_bit_packed(self) -> bool {
        matches!(
            self,
            TypeSpec::BitInt | TypeSpec::BitIntBeo | TypeSpec::BitUInt | TypeSpec::BitUIntBeo
        )
    }

    /// Returns true for signed bit-packed integer typespecs.
    pub fn is_signed_bits(self) -> bool {
        matches!(self, TypeSpec::BitInt | TypeSpec::BitIntBeo)
    }

    /// Returns true if the codec can decode this typespec.
    pub fn is_supported(self) -> bool {
        self.width().is_some() || self.is_string() || self.is_bit_packed()
    }

    /// Sequence type values of this typespec decode to.
    ///
    /// Unsigned types widen to the next signed type (`dt_ushort` to
    /// `DS_LONG`, `dt_ulong` to `DS_LONGLONG`) and `dt_sbyte` decodes to
    /// `DS_SHORT`. Bit-packed values need `bit_count` to pick `DS_LONG` or
    /// `DS_LONGLONG`.
    pub fn decoded_type(self, bit_count: Option<u16>) -> ExtCompResult<DataType> {
        let data_type = match self {
            TypeSpec::Boolean => DataType::DsBoolean,
            TypeSpec::Byte => DataType::DsByte,
            TypeSpec::Short | TypeSpec::ShortBeo | TypeSpec::SByte => DataType::DsShort,
            TypeSpec::Long | TypeSpec::LongBeo | TypeSpec::UShort | TypeSpec::UShortBeo => {
                DataType::DsLong
            }
            TypeSpec::LongLong | TypeSpec::LongLongBeo | TypeSpec::ULong | TypeSpec::ULongBeo => {
                DataType::DsLongLong
            }
            TypeSpec::Float | TypeSpec::FloatBeo => DataType::DsFloat,
            TypeSpec::Double | TypeSpec::DoubleBeo => DataType::DsDouble,
            TypeSpec::String | TypeSpec::StringUtf8 | TypeSpec::StringUtf8Beo => DataType::DsString,
            TypeSpec::BitInt | TypeSpec::BitIntBeo | TypeSpec::BitUInt | TypeSpec::BitUIntBeo => {
                let bits = bit_count.ok_or_else(|| {
                    ExtCompError::bad_parameter(format!("{} requires a bit count", self))
                })?;
                let limit = if self.is_signed_bits() { 32 } else { 31 };
                match bits {
                    0 => {
                        return Err(ExtCompError::bad_parameter(format!(
                            "{} with bit count 0",
                            self
                        )))
                    }
                    b if b <= limit => DataType::DsLong,
                    b if b < 64 || (b == 64 && self.is_signed_bits()) => DataType::DsLongLong,
                    b => {
                        return Err(ExtCompError::not_implemented(format!(
                            "{} with {} bits",
                            self, b
                        )))
                    }
                }
            }
            _ => {
                return Err(ExtCompError::not_implemented(format!("typespec {}", self)));
            }
        };
        Ok(data_type)
    }
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_dense() {
        for (idx, spec) in TypeSpec::ALL.iter().enumerate() {
            assert_eq!(spec.code(), idx as i32);
        }
        assert_eq!(TypeSpec::from_code(6), Some(TypeSpec::Double));
        assert_eq!(TypeSpec::from_code(33), None);
        assert!(TypeSpec::try_from_code(-1).is_err());
    }

    #[test]
    fn test_classification() {
        assert_eq!(TypeSpec::DoubleBeo.byte_order(), ByteOrder::Big);
        assert_eq!(TypeSpec::Double.byte_order(), ByteOrder::Little);
        assert_eq!(TypeSpec::UShortBeo.width(), Some(2));
        assert_eq!(TypeSpec::StringUtf8.width(), None);
        assert_eq!(TypeSpec::String.charset(), Some(Charset::Latin1));
        assert!(TypeSpec::BitUIntBeo.is_bit_packed());
        assert!(!TypeSpec::BitFloat.is_supported());
        assert!(!TypeSpec::ByteStr.is_supported());
    }

    #[test]
    fn test_decoded_type() {
        assert_eq!(TypeSpec::SByte.decoded_type(None).unwrap(), DataType::DsShort);
        assert_eq!(TypeSpec::ULong.decoded_type(None).unwrap(), DataType::DsLongLong);
        assert_eq!(TypeSpec::BitInt.decoded_type(Some(32)).unwrap(), DataType::DsLong);
        assert_eq!(TypeSpec::BitUInt.decoded_type(Some(32)).unwrap(), DataType::DsLongLong);
        assert_eq!(TypeSpec::BitInt.decoded_type(Some(64)).unwrap(), DataType::DsLongLong);
        assert!(TypeSpec::BitUInt.decoded_type(Some(64)).is_err());
        assert!(TypeSpec::BitUInt.decoded_type(None).is_err());
        assert!(TypeSpec::Blob.decoded_type(None).is_err());
    }
}
