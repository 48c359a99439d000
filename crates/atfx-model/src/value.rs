//! Typed attribute values.

use std::fmt;

use crate::datatype::DataType;

/// Complex number of two 32-bit floats.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Complex32 {
    /// Real part.
    pub re: f32,
    /// Imaginary part.
    pub im: f32,
}

/// Complex number of two 64-bit floats.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Complex64 {
    /// Real part.
    pub re: f64,
    /// Imaginary part.
    pub im: f64,
}

/// Reference to a document outside the data model.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExternalReference {
    /// Human readable description.
    pub description: String,
    /// MIME type of the referenced document.
    pub mime_type: String,
    /// Location (URL or relative path).
    pub location: String,
}

/// A set attribute value.
///
/// Each variant corresponds to exactly one [`DataType`]; an unset value is
/// represented by the absence of a `Value` (see [`TypedValue`]).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `DT_STRING`
    String(String),
    /// `DT_SHORT`
    Short(i16),
    /// `DT_FLOAT`
    Float(f32),
    /// `DT_BOOLEAN`
    Boolean(bool),
    /// `DT_BYTE`
    Byte(u8),
    /// `DT_LONG`
    Long(i32),
    /// `DT_DOUBLE`
    Double(f64),
    /// `DT_LONGLONG`
    LongLong(i64),
    /// `DT_DATE`
    Date(String),
    /// `DT_BYTESTR`
    ByteStr(Vec<u8>),
    /// `DT_COMPLEX`
    Complex(Complex32),
    /// `DT_DCOMPLEX`
    DComplex(Complex64),
    /// `DT_ENUM`
    Enum(i32),
    /// `DT_EXTERNALREFERENCE`
    ExternalReference(ExternalReference),
    /// `DS_STRING`
    StringSeq(Vec<String>),
    /// `DS_SHORT`
    ShortSeq(Vec<i16>),
    /// `DS_FLOAT`
    FloatSeq(Vec<f32>),
    /// `DS_BOOLEAN`
    BooleanSeq(Vec<bool>),
    /// `DS_BYTE`
    ByteSeq(Vec<u8>),
    /// `DS_LONG`
    LongSeq(Vec<i32>),
    /// `DS_DOUBLE`
    DoubleSeq(Vec<f64>),
    /// `DS_LONGLONG`
    LongLongSeq(Vec<i64>),
    /// `DS_COMPLEX`
    ComplexSeq(Vec<Complex32>),
    /// `DS_DCOMPLEX`
    DComplexSeq(Vec<Complex64>),
    /// `DS_DATE`
    DateSeq(Vec<String>),
    /// `DS_BYTESTR`
    ByteStrSeq(Vec<Vec<u8>>),
    /// `DS_ENUM`
    EnumSeq(Vec<i32>),
    /// `DS_EXTERNALREFERENCE`
    ExternalReferenceSeq(Vec<ExternalReference>),
}

impl Value {
    /// Returns the data type this value carries.
    pub fn data_type(&self) -> DataType {
        match self {
            Value::String(_) => DataType::DtString,
            Value::Short(_) => DataType::DtShort,
            Value::Float(_) => DataType::DtFloat,
            Value::Boolean(_) => DataType::DtBoolean,
            Value::Byte(_) => DataType::DtByte,
            Value::Long(_) => DataType::DtLong,
            Value::Double(_) => DataType::DtDouble,
            Value::LongLong(_) => DataType::DtLongLong,
            Value::Date(_) => DataType::DtDate,
            Value::ByteStr(_) => DataType::DtByteStr,
            Value::Complex(_) => DataType::DtComplex,
            Value::DComplex(_) => DataType::DtDComplex,
            Value::Enum(_) => DataType::DtEnum,
            Value::ExternalReference(_) => DataType::DtExternalReference,
            Value::StringSeq(_) => DataType::DsString,
            Value::ShortSeq(_) => DataType::DsShort,
            Value::FloatSeq(_) => DataType::DsFloat,
            Value::BooleanSeq(_) => DataType::DsBoolean,
            Value::ByteSeq(_) => DataType::DsByte,
            Value::LongSeq(_) => DataType::DsLong,
            Value::DoubleSeq(_) => DataType::DsDouble,
            Value::LongLongSeq(_) => DataType::DsLongLong,
            Value::ComplexSeq(_) => DataType::DsComplex,
            Value::DComplexSeq(_) => DataType::DsDComplex,
            Value::DateSeq(_) => DataType::DsDate,
            Value::ByteStrSeq(_) => DataType::DsByteStr,
            Value::EnumSeq(_) => DataType::DsEnum,
            Value::ExternalReferenceSeq(_) => DataType::DsExternalReference,
        }
    }

    /// Returns an empty sequence of the given sequence data type.
    ///
    /// Returns `None` for scalar types and sequence types without a variant.
    pub fn empty_sequence(data_type: DataType) -> Option<Value> {
        let value = match data_type {
            DataType::DsString => Value::StringSeq(Vec::new()),
            DataType::DsShort => Value::ShortSeq(Vec::new()),
            DataType::DsFloat => Value::FloatSeq(Vec::new()),
            DataType::DsBoolean => Value::BooleanSeq(Vec::new()),
            DataType::DsByte => Value::ByteSeq(Vec::new()),
            DataType::DsLong => Value::LongSeq(Vec::new()),
            DataType::DsDouble => Value::DoubleSeq(Vec::new()),
            DataType::DsLongLong => Value::LongLongSeq(Vec::new()),
            DataType::DsComplex => Value::ComplexSeq(Vec::new()),
            DataType::DsDComplex => Value::DComplexSeq(Vec::new()),
            DataType::DsDate => Value::DateSeq(Vec::new()),
            DataType::DsByteStr => Value::ByteStrSeq(Vec::new()),
            DataType::DsEnum => Value::EnumSeq(Vec::new()),
            DataType::DsExternalReference => Value::ExternalReferenceSeq(Vec::new()),
            _ => return None,
        };
        Some(value)
    }

    /// Returns the number of elements of a sequence value, `None` for scalars.
    pub fn sequence_len(&self) -> Option<usize> {
        let len = match self {
            Value::StringSeq(v) | Value::DateSeq(v) => v.len(),
            Value::ShortSeq(v) => v.len(),
            Value::FloatSeq(v) => v.len(),
            Value::BooleanSeq(v) => v.len(),
            Value::ByteSeq(v) => v.len(),
            Value::LongSeq(v) | Value::EnumSeq(v) => v.len(),
            Value::DoubleSeq(v) => v.len(),
            Value::LongLongSeq(v) => v.len(),
            Value::ComplexSeq(v) => v.len(),
            Value::DComplexSeq(v) => v.len(),
            Value::ByteStrSeq(v) => v.len(),
            Value::ExternalReferenceSeq(v) => v.len(),
            _ => return None,
        };
        Some(len)
    }

    /// Returns the value as a 64-bit integer for integer-like scalars.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Byte(v) => Some(i64::from(*v)),
            Value::Short(v) => Some(i64::from(*v)),
            Value::Long(v) | Value::Enum(v) => Some(i64::from(*v)),
            Value::LongLong(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as a 64-bit float for numeric scalars.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    /// Returns the string content of string and date scalars.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Date(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) | Value::Date(s) => write!(f, "\"{}\"", s),
            Value::Short(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Long(v) | Value::Enum(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::LongLong(v) => write!(f, "{}", v),
            Value::Complex(c) => write!(f, "({}, {})", c.re, c.im),
            Value::DComplex(c) => write!(f, "({}, {})", c.re, c.im),
            Value::ExternalReference(r) => write!(f, "<{}>", r.location),
            other => match other.sequence_len() {
                Some(len) => write!(f, "{}[{}]", other.data_type(), len),
                None => write!(f, "{}", other.data_type()),
            },
        }
    }
}

/// A value together with its declared data type; `value == None` means unset.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    /// Declared data type.
    pub data_type: DataType,
    /// The value, `None` when unset.
    pub value: Option<Value>,
}

impl TypedValue {
    /// Creates a set typed value.
    pub fn new(value: Value) -> Self {
        Self {
            data_type: value.data_type(),
            value: Some(value),
        }
    }

    /// Creates the unset value of a data type.
    pub fn unset(data_type: DataType) -> Self {
        Self {
            data_type,
            value: None,
        }
    }

    /// Returns true if a value is present.
    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }
}
