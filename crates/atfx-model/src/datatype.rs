//! ODS data type enumeration.

use std::fmt;

use serde::{Deserialize, Serialize};

/// ASAM ODS attribute data types.
///
/// The discriminants are the numeric codes used in the exchange format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum DataType {
    /// Unknown (used by the `values` attribute of local columns).
    #[serde(rename = "DT_UNKNOWN")]
    DtUnknown = 0,
    /// String.
    #[serde(rename = "DT_STRING")]
    DtString = 1,
    /// 16-bit signed integer.
    #[serde(rename = "DT_SHORT")]
    DtShort = 2,
    /// 32-bit float.
    #[serde(rename = "DT_FLOAT")]
    DtFloat = 3,
    /// Boolean.
    #[serde(rename = "DT_BOOLEAN")]
    DtBoolean = 4,
    /// Unsigned byte.
    #[serde(rename = "DT_BYTE")]
    DtByte = 5,
    /// 32-bit signed integer.
    #[serde(rename = "DT_LONG")]
    DtLong = 6,
    /// 64-bit float.
    #[serde(rename = "DT_DOUBLE")]
    DtDouble = 7,
    /// 64-bit signed integer.
    #[serde(rename = "DT_LONGLONG")]
    DtLongLong = 8,
    /// Instance id.
    #[serde(rename = "DT_ID")]
    DtId = 9,
    /// Date string (`YYYYMMDDhhmmss...`).
    #[serde(rename = "DT_DATE")]
    DtDate = 10,
    /// Byte string.
    #[serde(rename = "DT_BYTESTR")]
    DtByteStr = 11,
    /// Binary large object.
    #[serde(rename = "DT_BLOB")]
    DtBlob = 12,
    /// Complex of two 32-bit floats.
    #[serde(rename = "DT_COMPLEX")]
    DtComplex = 13,
    /// Complex of two 64-bit floats.
    #[serde(rename = "DT_DCOMPLEX")]
    DtDComplex = 14,
    /// Sequence of strings.
    #[serde(rename = "DS_STRING")]
    DsString = 15,
    /// Sequence of shorts.
    #[serde(rename = "DS_SHORT")]
    DsShort = 16,
    /// Sequence of floats.
    #[serde(rename = "DS_FLOAT")]
    DsFloat = 17,
    /// Sequence of booleans.
    #[serde(rename = "DS_BOOLEAN")]
    DsBoolean = 18,
    /// Sequence of bytes.
    #[serde(rename = "DS_BYTE")]
    DsByte = 19,
    /// Sequence of longs.
    #[serde(rename = "DS_LONG")]
    DsLong = 20,
    /// Sequence of doubles.
    #[serde(rename = "DS_DOUBLE")]
    DsDouble = 21,
    /// Sequence of longlongs.
    #[serde(rename = "DS_LONGLONG")]
    DsLongLong = 22,
    /// Sequence of complex values.
    #[serde(rename = "DS_COMPLEX")]
    DsComplex = 23,
    /// Sequence of double complex values.
    #[serde(rename = "DS_DCOMPLEX")]
    DsDComplex = 24,
    /// Sequence of ids.
    #[serde(rename = "DS_ID")]
    DsId = 25,
    /// Sequence of dates.
    #[serde(rename = "DS_DATE")]
    DsDate = 26,
    /// Sequence of byte strings.
    #[serde(rename = "DS_BYTESTR")]
    DsByteStr = 27,
    /// External reference.
    #[serde(rename = "DT_EXTERNALREFERENCE")]
    DtExternalReference = 28,
    /// Sequence of external references.
    #[serde(rename = "DS_EXTERNALREFERENCE")]
    DsExternalReference = 29,
    /// Enumeration item.
    #[serde(rename = "DT_ENUM")]
    DtEnum = 30,
    /// Sequence of enumeration items.
    #[serde(rename = "DS_ENUM")]
    DsEnum = 31,
}

impl DataType {
    const ALL: [DataType; 32] = [
        DataType::DtUnknown,
        DataType::DtString,
        DataType::DtShort,
        DataType::DtFloat,
        DataType::DtBoolean,
        DataType::DtByte,
        DataType::DtLong,
        DataType::DtDouble,
        DataType::DtLongLong,
        DataType::DtId,
        DataType::DtDate,
        DataType::DtByteStr,
        DataType::DtBlob,
        DataType::DtComplex,
        DataType::DtDComplex,
        DataType::DsString,
        DataType::DsShort,
        DataType::DsFloat,
        DataType::DsBoolean,
        DataType::DsByte,
        DataType::DsLong,
        DataType::DsDouble,
        DataType::DsLongLong,
        DataType::DsComplex,
        DataType::DsDComplex,
        DataType::DsId,
        DataType::DsDate,
        DataType::DsByteStr,
        DataType::DtExternalReference,
        DataType::DsExternalReference,
        DataType::DtEnum,
        DataType::DsEnum,
    ];

    /// Returns the numeric code of this data type.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Looks up a data type by its numeric code.
    pub fn from_code(code: i32) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| Self::ALL.get(idx))
            .copied()
    }

    /// Returns the exchange-format name, e.g. `DT_STRING`.
    pub fn name(self) -> &'static str {
        match self {
            DataType::DtUnknown => "DT_UNKNOWN",
            DataType::DtString => "DT_STRING",
            DataType::DtShort => "DT_SHORT",
            DataType::DtFloat => "DT_FLOAT",
            DataType::DtBoolean => "DT_BOOLEAN",
            DataType::DtByte => "DT_BYTE",
            DataType::DtLong => "DT_LONG",
            DataType::DtDouble => "DT_DOUBLE",
            DataType::DtLongLong => "DT_LONGLONG",
            DataType::DtId => "DT_ID",
            DataType::DtDate => "DT_DATE",
            DataType::DtByteStr => "DT_BYTESTR",
            DataType::DtBlob => "DT_BLOB",
            DataType::DtComplex => "DT_COMPLEX",
            DataType::DtDComplex => "DT_DCOMPLEX",
            DataType::DsString => "DS_STRING",
            DataType::DsShort => "DS_SHORT",
            DataType::DsFloat => "DS_FLOAT",
            DataType::DsBoolean => "DS_BOOLEAN",
            DataType::DsByte => "DS_BYTE",
            DataType::DsLong => "DS_LONG",
            DataType::DsDouble => "DS_DOUBLE",
            DataType::DsLongLong => "DS_LONGLONG",
            DataType::DsComplex => "DS_COMPLEX",
            DataType::DsDComplex => "DS_DCOMPLEX",
            DataType::DsId => "DS_ID",
            DataType::DsDate => "DS_DATE",
            DataType::DsByteStr => "DS_BYTESTR",
            DataType::DtExternalReference => "DT_EXTERNALREFERENCE",
            DataType::DsExternalReference => "DS_EXTERNALREFERENCE",
            DataType::DtEnum => "DT_ENUM",
            DataType::DsEnum => "DS_ENUM",
        }
    }

    /// Returns true for the `DS_*` sequence types.
    pub fn is_sequence(self) -> bool {
        matches!(
            self,
            DataType::DsString
                | DataType::DsShort
                | DataType::DsFloat
                | DataType::DsBoolean
                | DataType::DsByte
                | DataType::DsLong
                | DataType::DsDouble
                | DataType::DsLongLong
                | DataType::DsComplex
                | DataType::DsDComplex
                | DataType::DsId
                | DataType::DsDate
                | DataType::DsByteStr
                | DataType::DsExternalReference
                | DataType::DsEnum
        )
    }

    /// Returns true for integer scalar types (ordered as 64-bit integers).
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            DataType::DtByte
                | DataType::DtShort
                | DataType::DtLong
                | DataType::DtLongLong
                | DataType::DtId
                | DataType::DtEnum
        )
    }

    /// Returns true for floating point scalar types.
    pub fn is_float(self) -> bool {
        matches!(self, DataType::DtFloat | DataType::DtDouble)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_dense() {
        for (idx, dt) in DataType::ALL.iter().enumerate() {
            assert_eq!(dt.code(), idx as i32);
            assert_eq!(DataType::from_code(idx as i32), Some(*dt));
        }
        assert_eq!(DataType::from_code(32), None);
        assert_eq!(DataType::from_code(-1), None);
    }

    #[test]
    fn test_serde_names() {
        let dt: DataType = serde_json::from_str("\"DS_DOUBLE\"").unwrap();
        assert_eq!(dt, DataType::DsDouble);
        assert_eq!(dt.name(), "DS_DOUBLE");
        assert_eq!(
            serde_json::to_string(&DataType::DtLongLong).unwrap(),
            "\"DT_LONGLONG\""
        );
    }

    #[test]
    fn test_classification() {
        assert!(DataType::DsEnum.is_sequence());
        assert!(!DataType::DtEnum.is_sequence());
        assert!(DataType::DtLongLong.is_integer());
        assert!(DataType::DtFloat.is_float());
        assert!(!DataType::DtString.is_integer());
    }
}
