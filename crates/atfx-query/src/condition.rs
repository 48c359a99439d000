//! Selection conditions and their matching rules.
//!
//! A [`Condition`] compares one attribute (or relation) of an element with a
//! literal. Matching is defined on set values only: an unset value matches no
//! operator, negated ones included.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use atfx_model::{Aid, Value};

use crate::error::{QueryError, QueryResult};

/// Selection operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelOperator {
    /// Equal.
    Eq,
    /// Not equal.
    Neq,
    /// Pattern match (`*` any sequence, `?` one character, `\` escape).
    Like,
    /// Negated pattern match.
    NotLike,
    /// Case-insensitive equal.
    CiEq,
    /// Case-insensitive not equal.
    CiNeq,
    /// Case-insensitive pattern match.
    CiLike,
    /// Case-insensitive negated pattern match.
    CiNotLike,
    /// Member of a set.
    InSet,
    /// Not a member of a set.
    NotInSet,
    /// Case-insensitive member of a set.
    CiInSet,
    /// Case-insensitive not a member of a set.
    CiNotInSet,
    /// Less than (not implemented).
    Lt,
    /// Greater than (not implemented).
    Gt,
    /// Less than or equal (not implemented).
    Lte,
    /// Greater than or equal (not implemented).
    Gte,
}

impl SelOperator {
    /// Operator name as used in query definitions, e.g. `CI_NOTLIKE`.
    pub fn name(self) -> &'static str {
        match self {
            SelOperator::Eq => "EQ",
            SelOperator::Neq => "NEQ",
            SelOperator::Like => "LIKE",
            SelOperator::NotLike => "NOTLIKE",
            SelOperator::CiEq => "CI_EQ",
            SelOperator::CiNeq => "CI_NEQ",
            SelOperator::CiLike => "CI_LIKE",
            SelOperator::CiNotLike => "CI_NOTLIKE",
            SelOperator::InSet => "INSET",
            SelOperator::NotInSet => "NOTINSET",
            SelOperator::CiInSet => "CI_INSET",
            SelOperator::CiNotInSet => "CI_NOTINSET",
            SelOperator::Lt => "LT",
            SelOperator::Gt => "GT",
            SelOperator::Lte => "LTE",
            SelOperator::Gte => "GTE",
        }
    }

    /// Returns true for the `CI_` operators.
    pub fn is_case_insensitive(self) -> bool {
        matches!(
            self,
            SelOperator::CiEq
                | SelOperator::CiNeq
                | SelOperator::CiLike
                | SelOperator::CiNotLike
                | SelOperator::CiInSet
                | SelOperator::CiNotInSet
        )
    }

    /// Returns true for operators that invert their positive counterpart.
    pub fn is_negated(self) -> bool {
        matches!(
            self,
            SelOperator::Neq
                | SelOperator::NotLike
                | SelOperator::CiNeq
                | SelOperator::CiNotLike
                | SelOperator::NotInSet
                | SelOperator::CiNotInSet
        )
    }

    /// Returns true for the set membership operators.
    pub fn is_set(self) -> bool {
        matches!(
            self,
            SelOperator::InSet
                | SelOperator::NotInSet
                | SelOperator::CiInSet
                | SelOperator::CiNotInSet
        )
    }

    /// Returns true for the pattern operators.
    pub fn is_like(self) -> bool {
        matches!(
            self,
            SelOperator::Like | SelOperator::NotLike | SelOperator::CiLike | SelOperator::CiNotLike
        )
    }

    /// Returns true for the ordering operators, which are not implemented.
    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            SelOperator::Lt | SelOperator::Gt | SelOperator::Lte | SelOperator::Gte
        )
    }
}

impl fmt::Display for SelOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SelOperator {
    type Err = QueryError;

    fn from_str(s: &str) -> QueryResult<Self> {
        let op = match s.to_ascii_uppercase().as_str() {
            "EQ" => SelOperator::Eq,
            "NEQ" => SelOperator::Neq,
            "LIKE" => SelOperator::Like,
            "NOTLIKE" => SelOperator::NotLike,
            "CI_EQ" => SelOperator::CiEq,
            "CI_NEQ" => SelOperator::CiNeq,
            "CI_LIKE" => SelOperator::CiLike,
            "CI_NOTLIKE" => SelOperator::CiNotLike,
            "INSET" => SelOperator::InSet,
            "NOTINSET" => SelOperator::NotInSet,
            "CI_INSET" => SelOperator::CiInSet,
            "CI_NOTINSET" => SelOperator::CiNotInSet,
            "LT" => SelOperator::Lt,
            "GT" => SelOperator::Gt,
            "LTE" => SelOperator::Lte,
            "GTE" => SelOperator::Gte,
            other => {
                return Err(QueryError::UnsupportedCondition(format!(
                    "unknown operator '{}'",
                    other
                )))
            }
        };
        Ok(op)
    }
}

/// Literal operand of a condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelValue {
    /// String literal.
    String(String),
    /// Enumeration literal.
    Enum(i32),
    /// 64-bit integer literal.
    LongLong(i64),
    /// String set.
    StringSeq(Vec<String>),
    /// Enumeration set.
    EnumSeq(Vec<i32>),
    /// 64-bit integer set.
    LongLongSeq(Vec<i64>),
}

impl SelValue {
    /// Returns true for the set shapes.
    pub fn is_sequence(&self) -> bool {
        matches!(
            self,
            SelValue::StringSeq(_) | SelValue::EnumSeq(_) | SelValue::LongLongSeq(_)
        )
    }

    fn scalars(&self) -> Vec<Scalar<'_>> {
        match self {
            SelValue::String(s) => vec![Scalar::Text(Cow::Borrowed(s))],
            SelValue::Enum(v) => vec![Scalar::Int(i64::from(*v))],
            SelValue::LongLong(v) => vec![Scalar::Int(*v)],
            SelValue::StringSeq(v) => v.iter().map(|s| Scalar::Text(Cow::Borrowed(s))).collect(),
            SelValue::EnumSeq(v) => v.iter().map(|i| Scalar::Int(i64::from(*i))).collect(),
            SelValue::LongLongSeq(v) => v.iter().map(|i| Scalar::Int(*i)).collect(),
        }
    }
}

impl fmt::Display for SelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelValue::String(s) => write!(f, "\"{}\"", s),
            SelValue::Enum(v) => write!(f, "{}", v),
            SelValue::LongLong(v) => write!(f, "{}", v),
            SelValue::StringSeq(v) => write!(f, "{:?}", v),
            SelValue::EnumSeq(v) => write!(f, "{:?}", v),
            SelValue::LongLongSeq(v) => write!(f, "{:?}", v),
        }
    }
}

/// A single selection condition.
///
/// `attribute` names an application attribute or a relation of `aid`. When
/// `aid` differs from the element being filtered, the condition is evaluated
/// across a relation path.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Element the attribute belongs to.
    pub aid: Aid,
    /// Attribute or relation name.
    pub attribute: String,
    /// Operator.
    pub operator: SelOperator,
    /// Literal operand.
    pub value: SelValue,
}

impl Condition {
    /// Creates a condition.
    pub fn new(aid: Aid, attribute: impl Into<String>, operator: SelOperator, value: SelValue) -> Self {
        Self {
            aid,
            attribute: attribute.into(),
            operator,
            value,
        }
    }

    /// Checks that operator and literal shape fit together.
    pub fn check(&self) -> QueryResult<()> {
        let op = self.operator;
        if op.is_ordering() {
            return Err(QueryError::NotImplemented(format!("operator {}", op)));
        }
        if op.is_set() != self.value.is_sequence() {
            return Err(QueryError::UnsupportedCondition(format!(
                "operator {} does not accept literal {}",
                op, self.value
            )));
        }
        if op.is_like() && !matches!(self.value, SelValue::String(_)) {
            return Err(QueryError::UnsupportedCondition(format!(
                "operator {} requires a string pattern",
                op
            )));
        }
        Ok(())
    }

    /// Matches a stored value; `None` (unset) never matches.
    ///
    /// Sequence and complex values have no scalar form and never match.
    pub fn matches(&self, stored: Option<&Value>) -> bool {
        let Some(stored) = stored.and_then(Scalar::of) else {
            return false;
        };
        let ci = self.operator.is_case_insensitive();
        let positive = if self.operator.is_like() {
            match &self.value {
                SelValue::String(pattern) => like_match(pattern, &stored.to_text(), ci),
                _ => false,
            }
        } else {
            self.value
                .scalars()
                .iter()
                .any(|literal| stored.equals(literal, ci))
        };
        positive != self.operator.is_negated()
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.attribute, self.operator, self.value)
    }
}

/// Comparable scalar form of a value.
#[derive(Debug, Clone)]
enum Scalar<'a> {
    Text(Cow<'a, str>),
    Int(i64),
    Float(f64),
}

impl<'a> Scalar<'a> {
    fn of(value: &'a Value) -> Option<Self> {
        match value {
            Value::String(s) | Value::Date(s) => Some(Scalar::Text(Cow::Borrowed(s))),
            Value::Boolean(b) => Some(Scalar::Text(Cow::Owned(b.to_string()))),
            Value::Float(_) | Value::Double(_) => value.as_f64().map(Scalar::Float),
            other => other.as_i64().map(Scalar::Int),
        }
    }

    fn to_text(&self) -> Cow<'_, str> {
        match self {
            Scalar::Text(s) => Cow::Borrowed(s.as_ref()),
            Scalar::Int(v) => Cow::Owned(v.to_string()),
            Scalar::Float(v) => Cow::Owned(v.to_string()),
        }
    }

    fn equals(&self, literal: &Scalar<'_>, case_insensitive: bool) -> bool {
        match (self, literal) {
            (Scalar::Text(a), Scalar::Text(b)) => {
                if case_insensitive {
                    a.to_lowercase() == b.to_lowercase()
                } else {
                    a == b
                }
            }
            (Scalar::Int(a), Scalar::Int(b)) => a == b,
            (Scalar::Float(a), Scalar::Int(b)) => *a == *b as f64,
            (Scalar::Text(a), Scalar::Int(b)) => a.trim().parse::<i64>().is_ok_and(|a| a == *b),
            (Scalar::Int(a), Scalar::Text(b)) => b.trim().parse::<i64>().is_ok_and(|b| b == *a),
            (Scalar::Float(a), Scalar::Text(b)) => b.trim().parse::<f64>().is_ok_and(|b| b == *a),
            (_, Scalar::Float(_)) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Any,
    One,
    Lit(char),
}

fn tokenize(pattern: &str) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '*' => Token::Any,
            '?' => Token::One,
            // a trailing backslash stands for itself
            '\\' => Token::Lit(chars.next().unwrap_or('\\')),
            c => Token::Lit(c),
        });
    }
    tokens
}

/// Matches `text` against a LIKE pattern.
///
/// `*` matches any sequence (including none), `?` exactly one character and
/// `\` escapes the following character.
///
/// # Example
///
/// ```rust
/// use atfx_query::like_match;
///
/// assert!(like_match("f*", "foo", false));
/// assert!(like_match("F?O", "foo", true));
/// assert!(like_match(r"100\%*", "100%", false));
/// assert!(!like_match(r"a\*", "abc", false));
/// ```
pub fn like_match(pattern: &str, text: &str, case_insensitive: bool) -> bool {
    let (pattern, text) = if case_insensitive {
        (Cow::Owned(pattern.to_lowercase()), Cow::Owned(text.to_lowercase()))
    } else {
        (Cow::Borrowed(pattern), Cow::Borrowed(text))
    };
    let tokens = tokenize(&pattern);
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    // position of the last `*` and the text index it currently absorbs up to
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        match tokens.get(p) {
            Some(Token::Lit(c)) if *c == text[t] => {
                p += 1;
                t += 1;
            }
            Some(Token::One) => {
                p += 1;
                t += 1;
            }
            Some(Token::Any) => {
                star = Some((p, t));
                p += 1;
            }
            _ => match star {
                Some((sp, st)) => {
                    p = sp + 1;
                    t = st + 1;
                    star = Some((sp, st + 1));
                }
                None => return false,
            },
        }
    }
    tokens[p..].iter().all(|t| *t == Token::Any)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cond(op: SelOperator, value: SelValue) -> Condition {
        Condition::new(1, "name", op, value)
    }

    #[test]
    fn test_like_patterns() {
        assert!(like_match("f*", "foo", false));
        assert!(!like_match("f*", "bar", false));
        assert!(like_match("*", "", false));
        assert!(like_match("a*c*e", "abcde", false));
        assert!(!like_match("a*c*e", "abcdf", false));
        assert!(like_match("??o", "foo", false));
        assert!(!like_match("??", "foo", false));
        assert!(like_match(r"a\*b", "a*b", false));
        assert!(!like_match(r"a\*b", "axb", false));
        assert!(like_match(r"a\?", "a?", false));
        assert!(like_match("ab\\", "ab\\", false));
        assert!(like_match("F*", "foo", true));
        assert!(!like_match("F*", "foo", false));
    }

    #[test]
    fn test_eq_and_ci_eq() {
        let stored = Value::String("foo".into());
        assert!(cond(SelOperator::Eq, SelValue::String("foo".into())).matches(Some(&stored)));
        assert!(!cond(SelOperator::Eq, SelValue::String("FOO".into())).matches(Some(&stored)));
        assert!(cond(SelOperator::CiEq, SelValue::String("FOO".into())).matches(Some(&stored)));
        assert!(cond(SelOperator::CiNeq, SelValue::String("bar".into())).matches(Some(&stored)));
    }

    #[test]
    fn test_unset_never_matches() {
        for op in [SelOperator::Eq, SelOperator::Neq, SelOperator::NotLike] {
            assert!(!cond(op, SelValue::String("x".into())).matches(None));
        }
        assert!(!cond(SelOperator::NotInSet, SelValue::LongLongSeq(vec![1])).matches(None));
    }

    #[test]
    fn test_numeric_comparisons() {
        let stored = Value::Long(5);
        assert!(cond(SelOperator::Eq, SelValue::LongLong(5)).matches(Some(&stored)));
        assert!(cond(SelOperator::Eq, SelValue::String("5".into())).matches(Some(&stored)));
        assert!(cond(SelOperator::Like, SelValue::String("5*".into())).matches(Some(&stored)));
        assert!(cond(SelOperator::Eq, SelValue::Enum(2)).matches(Some(&Value::Enum(2))));
        assert!(cond(SelOperator::Eq, SelValue::LongLong(2)).matches(Some(&Value::Double(2.0))));
        assert!(!cond(SelOperator::Eq, SelValue::LongLong(2)).matches(Some(&Value::DoubleSeq(vec![2.0]))));
    }

    #[test]
    fn test_inset() {
        let stored = Value::String("Bar".into());
        let set = SelValue::StringSeq(vec!["foo".into(), "bar".into()]);
        assert!(!cond(SelOperator::InSet, set.clone()).matches(Some(&stored)));
        assert!(cond(SelOperator::CiInSet, set.clone()).matches(Some(&stored)));
        assert!(cond(SelOperator::NotInSet, set.clone()).matches(Some(&stored)));
        assert!(!cond(SelOperator::CiNotInSet, set).matches(Some(&stored)));
        assert!(cond(SelOperator::InSet, SelValue::EnumSeq(vec![1, 3])).matches(Some(&Value::Enum(3))));
    }

    #[test]
    fn test_check_shapes() {
        assert!(cond(SelOperator::Eq, SelValue::String("a".into())).check().is_ok());
        assert!(matches!(
            cond(SelOperator::Lt, SelValue::LongLong(1)).check(),
            Err(QueryError::NotImplemented(_))
        ));
        assert!(matches!(
            cond(SelOperator::InSet, SelValue::LongLong(1)).check(),
            Err(QueryError::UnsupportedCondition(_))
        ));
        assert!(matches!(
            cond(SelOperator::Eq, SelValue::LongLongSeq(vec![1])).check(),
            Err(QueryError::UnsupportedCondition(_))
        ));
        assert!(matches!(
            cond(SelOperator::Like, SelValue::LongLong(1)).check(),
            Err(QueryError::UnsupportedCondition(_))
        ));
    }

    #[test]
    fn test_operator_names() {
        for op in [SelOperator::CiNotLike, SelOperator::NotInSet, SelOperator::Gte] {
            assert_eq!(op.name().parse::<SelOperator>().unwrap(), op);
        }
        assert!("ci_eq".parse::<SelOperator>().is_ok());
        assert!("BETWEEN".parse::<SelOperator>().is_err());
    }
}
