//! Typed literals crossing the harness boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A concrete input value bound to one function parameter in a test case.
///
/// Values are kept in their C-typed form so both the C and the C# harness
/// can render them as source literals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum CValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    /// Null pointer input.
    Null,
}

impl CValue {
    /// Render as a C source literal.
    pub fn to_c_literal(&self) -> String {
        match self {
            CValue::Int(n) => n.to_string(),
            CValue::UInt(n) => format!("{n}U"),
            CValue::Float(f) => format_float_literal(*f),
            CValue::Str(s) => format!("\"{}\"", escape_literal(s)),
            CValue::Null => "NULL".to_string(),
        }
    }

    /// Render as a C# source literal.
    pub fn to_csharp_literal(&self) -> String {
        match self {
            CValue::Int(n) => n.to_string(),
            CValue::UInt(n) => format!("{n}U"),
            CValue::Float(f) => {
                if f.is_infinite() {
                    if *f > 0.0 {
                        "double.PositiveInfinity".to_string()
                    } else {
                        "double.NegativeInfinity".to_string()
                    }
                } else {
                    format_float_literal(*f)
                }
            }
            CValue::Str(s) => format!("\"{}\"", escape_literal(s)),
            CValue::Null => "default".to_string(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CValue::Null)
    }
}

impl fmt::Display for CValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_c_literal())
    }
}

fn escape_literal(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Floats must keep a `.` so the output protocol can tell them from ints.
fn format_float_literal(f: f64) -> String {
    if f.is_infinite() {
        // C harnesses inject infinity through the math library.
        return if f > 0.0 { "INFINITY" } else { "-INFINITY" }.to_string();
    }
    if f == f.trunc() && f.abs() < 1e15 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

/// One value parsed back out of a harness stdout line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum OutputValue {
    Int(i64),
    Float(f64),
    Text(String),
    /// A void-return test that printed `completed`.
    Completed,
}

impl OutputValue {
    /// Parse the right-hand side of a `result = <literal>` line.
    ///
    /// Textual rule from the output protocol: a literal containing `.`
    /// (or an exponent / special float token) is a float, a plain integer
    /// parses as an integer, anything else is kept as text.
    pub fn parse_literal(raw: &str) -> OutputValue {
        let trimmed = raw.trim();
        let looks_float = trimmed.contains('.')
            || trimmed.eq_ignore_ascii_case("nan")
            || trimmed.eq_ignore_ascii_case("inf")
            || trimmed.eq_ignore_ascii_case("-inf")
            || trimmed.eq_ignore_ascii_case("infinity")
            || trimmed.eq_ignore_ascii_case("-infinity");
        if looks_float {
            if let Ok(f) = parse_float_token(trimmed) {
                return OutputValue::Float(f);
            }
        }
        if let Ok(n) = trimmed.parse::<i64>() {
            return OutputValue::Int(n);
        }
        // Scientific notation without a dot still parses as float.
        if let Ok(f) = trimmed.parse::<f64>() {
            return OutputValue::Float(f);
        }
        OutputValue::Text(trimmed.trim_matches('"').to_string())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            OutputValue::Int(n) => Some(*n as f64),
            OutputValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, OutputValue::Int(_) | OutputValue::Float(_))
    }
}

fn parse_float_token(s: &str) -> Result<f64, std::num::ParseFloatError> {
    match s.to_ascii_lowercase().as_str() {
        "inf" | "infinity" => Ok(f64::INFINITY),
        "-inf" | "-infinity" => Ok(f64::NEG_INFINITY),
        "nan" | "-nan" => Ok(f64::NAN),
        _ => s.parse::<f64>(),
    }
}

impl fmt::Display for OutputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputValue::Int(n) => write!(f, "{n}"),
            OutputValue::Float(x) => write!(f, "{x}"),
            OutputValue::Text(s) => write!(f, "{s}"),
            OutputValue::Completed => write!(f, "completed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---------------------------------------------------------------
    // CValue literal rendering
    // ---------------------------------------------------------------

    #[test]
    fn int_literal_renders_verbatim() {
        assert_eq!(CValue::Int(-2147483648).to_c_literal(), "-2147483648");
        assert_eq!(CValue::Int(0).to_csharp_literal(), "0");
    }

    #[test]
    fn uint_literal_gets_suffix() {
        assert_eq!(CValue::UInt(4294967295).to_c_literal(), "4294967295U");
    }

    #[test]
    fn whole_float_keeps_a_dot() {
        assert_eq!(CValue::Float(1.0).to_c_literal(), "1.0");
        assert_eq!(CValue::Float(-1000.5).to_c_literal(), "-1000.5");
    }

    #[test]
    fn infinity_renders_per_language() {
        assert_eq!(CValue::Float(f64::INFINITY).to_c_literal(), "INFINITY");
        assert_eq!(
            CValue::Float(f64::NEG_INFINITY).to_csharp_literal(),
            "double.NegativeInfinity"
        );
    }

    #[test]
    fn null_renders_per_language() {
        assert_eq!(CValue::Null.to_c_literal(), "NULL");
        assert_eq!(CValue::Null.to_csharp_literal(), "default");
    }

    #[test]
    fn string_literal_is_escaped() {
        assert_eq!(
            CValue::Str("a\"b".to_string()).to_c_literal(),
            "\"a\\\"b\""
        );
    }

    // ---------------------------------------------------------------
    // OutputValue literal parsing
    // ---------------------------------------------------------------

    #[test]
    fn integer_literal_round_trips_exactly() {
        assert_eq!(OutputValue::parse_literal("42"), OutputValue::Int(42));
        assert_eq!(OutputValue::parse_literal("-7"), OutputValue::Int(-7));
        assert_eq!(
            OutputValue::parse_literal("2147483647"),
            OutputValue::Int(2147483647)
        );
    }

    #[test]
    fn dotted_literal_parses_as_float() {
        assert_eq!(
            OutputValue::parse_literal("0.30000000000000004"),
            OutputValue::Float(0.30000000000000004)
        );
        assert_eq!(OutputValue::parse_literal("-0.5"), OutputValue::Float(-0.5));
    }

    #[test]
    fn special_float_tokens_parse() {
        assert!(matches!(
            OutputValue::parse_literal("nan"),
            OutputValue::Float(f) if f.is_nan()
        ));
        assert_eq!(
            OutputValue::parse_literal("inf"),
            OutputValue::Float(f64::INFINITY)
        );
        assert_eq!(
            OutputValue::parse_literal("-inf"),
            OutputValue::Float(f64::NEG_INFINITY)
        );
    }

    #[test]
    fn non_numeric_literal_falls_back_to_text() {
        assert_eq!(
            OutputValue::parse_literal("\"hello\""),
            OutputValue::Text("hello".to_string())
        );
    }

    #[test]
    fn numeric_promotion_accessor() {
        assert_eq!(OutputValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(OutputValue::Float(0.5).as_f64(), Some(0.5));
        assert_eq!(OutputValue::Completed.as_f64(), None);
    }
}
