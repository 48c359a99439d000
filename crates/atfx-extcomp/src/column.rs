//! Local column values in storage or calculated presentation.

use std::fmt;

use atfx_model::{Aid, AtfxCache, Iid, Value};
use tracing::debug;

use crate::config::{SessionContext, ValueMatrixMode};
use crate::descriptor::{optional, raw_datatype};
use crate::error::{ExtCompError, ExtCompResult};
use crate::reader::{empty_column, ExtCompReader};

/// `seq_rep_enum` of a local column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum SequenceRepresentation {
    /// Values stored in the `values` attribute.
    #[default]
    Explicit = 0,
    /// One value repeated.
    ImplicitConstant = 1,
    /// Start and increment.
    ImplicitLinear = 2,
    /// Repeating linear ramp.
    ImplicitSaw = 3,
    /// `p0 + p1 * raw`
    RawLinear = 4,
    /// Polynomial of raw values.
    RawPolynomial = 5,
    /// Formula over other columns.
    Formula = 6,
    /// Values stored in external components.
    ExternalComponent = 7,
    /// `raw_linear` with external raw values.
    RawLinearExternal = 8,
    /// `raw_polynomial` with external raw values.
    RawPolynomialExternal = 9,
    /// `(p0 + p1 * raw) * p2`
    RawLinearCalibrated = 10,
    /// `raw_linear_calibrated` with external raw values.
    RawLinearCalibratedExternal = 11,
    /// Rational function of raw values.
    RawRational = 12,
    /// `raw_rational` with external raw values.
    RawRationalExternal = 13,
}

impl SequenceRepresentation {
    const ALL: [SequenceRepresentation; 14] = [
        SequenceRepresentation::Explicit,
        SequenceRepresentation::ImplicitConstant,
        SequenceRepresentation::ImplicitLinear,
        SequenceRepresentation::ImplicitSaw,
        SequenceRepresentation::RawLinear,
        SequenceRepresentation::RawPolynomial,
        SequenceRepresentation::Formula,
        SequenceRepresentation::ExternalComponent,
        SequenceRepresentation::RawLinearExternal,
        SequenceRepresentation::RawPolynomialExternal,
        SequenceRepresentation::RawLinearCalibrated,
        SequenceRepresentation::RawLinearCalibratedExternal,
        SequenceRepresentation::RawRational,
        SequenceRepresentation::RawRationalExternal,
    ];

    /// Returns the enumeration code.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Looks up a representation by code.
    pub fn from_code(code: i32) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| Self::ALL.get(idx))
            .copied()
    }

    /// Returns the enumeration item name, e.g. `raw_linear_external`.
    pub fn name(self) -> &'static str {
        match self {
            SequenceRepresentation::Explicit => "explicit",
            SequenceRepresentation::ImplicitConstant => "implicit_constant",
            SequenceRepresentation::ImplicitLinear => "implicit_linear",
            SequenceRepresentation::ImplicitSaw => "implicit_saw",
            SequenceRepresentation::RawLinear => "raw_linear",
            SequenceRepresentation::RawPolynomial => "raw_polynomial",
            SequenceRepresentation::Formula => "formula",
            SequenceRepresentation::ExternalComponent => "external_component",
            SequenceRepresentation::RawLinearExternal => "raw_linear_external",
            SequenceRepresentation::RawPolynomialExternal => "raw_polynomial_external",
            SequenceRepresentation::RawLinearCalibrated => "raw_linear_calibrated",
            SequenceRepresentation::RawLinearCalibratedExternal => "raw_linear_calibrated_external",
            SequenceRepresentation::RawRational => "raw_rational",
            SequenceRepresentation::RawRationalExternal => "raw_rational_external",
        }
    }

    /// Returns true if values live in external components.
    pub fn is_external(self) -> bool {
        matches!(
            self,
            SequenceRepresentation::ExternalComponent
                | SequenceRepresentation::RawLinearExternal
                | SequenceRepresentation::RawPolynomialExternal
                | SequenceRepresentation::RawLinearCalibratedExternal
                | SequenceRepresentation::RawRationalExternal
        )
    }

    /// External counterpart of a representation with stored values.
    ///
    /// Returns `None` for implicit and formula representations, which have
    /// no stored values to move.
    pub fn to_external(self) -> Option<Self> {
        let external = match self {
            SequenceRepresentation::Explicit => SequenceRepresentation::ExternalComponent,
            SequenceRepresentation::RawLinear => SequenceRepresentation::RawLinearExternal,
            SequenceRepresentation::RawPolynomial => SequenceRepresentation::RawPolynomialExternal,
            SequenceRepresentation::RawLinearCalibrated => {
                SequenceRepresentation::RawLinearCalibratedExternal
            }
            SequenceRepresentation::RawRational => SequenceRepresentation::RawRationalExternal,
            external if external.is_external() => external,
            _ => return None,
        };
        Some(external)
    }

    /// Reads the representation of a column instance; unset means explicit.
    pub fn of_column(cache: &AtfxCache, aid: Aid, iid: Iid) -> ExtCompResult<Self> {
        let Some(value) = optional(cache, aid, iid, "sequence_representation")? else {
            return Ok(SequenceRepresentation::Explicit);
        };
        value
            .as_i64()
            .and_then(|code| i32::try_from(code).ok())
            .and_then(Self::from_code)
            .ok_or_else(|| {
                ExtCompError::bad_parameter(format!("sequence_representation {}", value))
            })
    }
}

impl fmt::Display for SequenceRepresentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Reads local column values honoring the value matrix mode.
///
/// In [`ValueMatrixMode::Storage`] raw values are returned as stored. In
/// [`ValueMatrixMode::Calculated`] the generation parameters of
/// `raw_linear`, `raw_polynomial` and `raw_linear_calibrated` columns (local
/// or external) are applied, producing `DS_DOUBLE`. Other representations
/// are returned raw.
#[derive(Debug, Clone, Default)]
pub struct ColumnReader {
    reader: ExtCompReader,
    mode: ValueMatrixMode,
}

impl ColumnReader {
    /// Creates a column reader for a session.
    pub fn new(context: SessionContext) -> Self {
        let mode = context.valuematrix_mode;
        Self {
            reader: ExtCompReader::new(context),
            mode,
        }
    }

    /// Returns the value matrix mode.
    pub fn mode(&self) -> ValueMatrixMode {
        self.mode
    }

    /// Reads the stored (raw) values of a column instance.
    pub fn read_raw(&self, cache: &AtfxCache, aid: Aid, iid: Iid) -> ExtCompResult<Value> {
        if SequenceRepresentation::of_column(cache, aid, iid)?.is_external() {
            return self.reader.read_values(cache, aid, iid);
        }
        match optional(cache, aid, iid, "values")? {
            Some(values) => Ok(values.clone()),
            None => Ok(empty_column(raw_datatype(cache, aid, iid)?)),
        }
    }

    /// Reads the values of a column instance in the configured mode.
    pub fn read(&self, cache: &AtfxCache, aid: Aid, iid: Iid) -> ExtCompResult<Value> {
        let raw = self.read_raw(cache, aid, iid)?;
        if self.mode == ValueMatrixMode::Storage {
            return Ok(raw);
        }

        let representation = SequenceRepresentation::of_column(cache, aid, iid)?;
        let calculated = match representation {
            SequenceRepresentation::RawLinear | SequenceRepresentation::RawLinearExternal => {
                let p = parameters(cache, aid, iid, 2)?;
                numbers(&raw)?.map(|x| p[0] + p[1] * x).collect()
            }
            SequenceRepresentation::RawPolynomial | SequenceRepresentation::RawPolynomialExternal => {
                let coefficients = polynomial(&parameters(cache, aid, iid, 1)?)?;
                numbers(&raw)?
                    .map(|x| coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c))
                    .collect()
            }
            SequenceRepresentation::RawLinearCalibrated
            | SequenceRepresentation::RawLinearCalibratedExternal => {
                let p = parameters(cache, aid, iid, 3)?;
                numbers(&raw)?.map(|x| (p[0] + p[1] * x) * p[2]).collect()
            }
            _ => return Ok(raw),
        };
        debug!(aid, iid, %representation, "calculated column values");
        Ok(Value::DoubleSeq(calculated))
    }
}

/// Generation parameters with at least `min` entries.
fn parameters(cache: &AtfxCache, aid: Aid, iid: Iid, min: usize) -> ExtCompResult<Vec<f64>> {
    let params = match optional(cache, aid, iid, "generation_parameters")? {
        Some(Value::DoubleSeq(p)) => p.clone(),
        Some(other) => {
            return Err(ExtCompError::bad_parameter(format!(
                "generation_parameters of type {}",
                other.data_type()
            )))
        }
        None => Vec::new(),
    };
    if params.len() < min {
        return Err(ExtCompError::bad_parameter(format!(
            "{} generation parameters, at least {} required",
            params.len(),
            min
        )));
    }
    Ok(params)
}

/// Splits `[degree, c0, c1, ..., c_degree]` into its coefficients.
fn polynomial(params: &[f64]) -> ExtCompResult<Vec<f64>> {
    let degree = params[0];
    if degree < 0.0 || degree.fract() != 0.0 {
        return Err(ExtCompError::bad_parameter(format!(
            "polynomial degree {}",
            degree
        )));
    }
    let count = degree as usize + 1;
    params
        .get(1..=count)
        .map(<[f64]>::to_vec)
        .ok_or_else(|| {
            ExtCompError::bad_parameter(format!(
                "polynomial of degree {} needs {} coefficients, got {}",
                degree,
                count,
                params.len() - 1
            ))
        })
}

fn numbers(raw: &Value) -> ExtCompResult<Box<dyn Iterator<Item = f64> + '_>> {
    let iter: Box<dyn Iterator<Item = f64> + '_> = match raw {
        Value::ShortSeq(v) => Box::new(v.iter().map(|x| f64::from(*x))),
        Value::ByteSeq(v) => Box::new(v.iter().map(|x| f64::from(*x))),
        Value::LongSeq(v) => Box::new(v.iter().map(|x| f64::from(*x))),
        Value::LongLongSeq(v) => Box::new(v.iter().map(|x| *x as f64)),
        Value::FloatSeq(v) => Box::new(v.iter().map(|x| f64::from(*x))),
        Value::DoubleSeq(v) => Box::new(v.iter().copied()),
        other => {
            return Err(ExtCompError::bad_parameter(format!(
                "cannot calculate values from {}",
                other.data_type()
            )))
        }
    };
    Ok(iter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_representation_codes() {
        assert_eq!(SequenceRepresentation::from_code(8), Some(SequenceRepresentation::RawLinearExternal));
        assert_eq!(SequenceRepresentation::from_code(14), None);
        assert_eq!(SequenceRepresentation::RawRationalExternal.code(), 13);
    }

    #[test]
    fn test_to_external() {
        use SequenceRepresentation::*;
        assert_eq!(Explicit.to_external(), Some(ExternalComponent));
        assert_eq!(RawLinear.to_external(), Some(RawLinearExternal));
        assert_eq!(RawPolynomial.to_external(), Some(RawPolynomialExternal));
        assert_eq!(RawLinearCalibrated.to_external(), Some(RawLinearCalibratedExternal));
        assert_eq!(RawLinearExternal.to_external(), Some(RawLinearExternal));
        assert_eq!(ImplicitLinear.to_external(), None);
        assert_eq!(Formula.to_external(), None);
    }

    #[test]
    fn test_polynomial_coefficients() {
        assert_eq!(polynomial(&[2.0, 1.0, 0.5, 0.25]).unwrap(), vec![1.0, 0.5, 0.25]);
        assert!(polynomial(&[2.0, 1.0, 0.5]).is_err());
        assert!(polynomial(&[1.5, 1.0, 0.5]).is_err());
    }

    #[test]
    fn test_numbers_rejects_strings() {
        assert!(numbers(&Value::StringSeq(vec![])).is_err());
        let sum: f64 = numbers(&Value::LongSeq(vec![1, 2])).unwrap().sum();
        assert_eq!(sum, 3.0);
    }
}
