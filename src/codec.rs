//! Value codec: datatype-aware defaults, parsing, coercion and rendering of values.
//!
//! The compiler and the evaluator both read rule values through this module, so a stored
//! value has exactly one interpretation. Coercions follow browser conventions
//! (`Number(x)`, truthiness, `String(x)`) because records and rule values arrive from an
//! editor that produced them that way.

use crate::operators::{DateFamily, Operator, ValueShape};
use crate::query::{Interval, IntervalUnit, RuleValue};
use crate::types::{format_number, DataType, ElementType, Value};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

/// Display format of calendar dates in compiled text and in stored values.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

static FLOAT_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:Infinity|(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)").expect("static regex")
});

static INT_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?\d+").expect("static regex"));

/// Placeholder emitted when a rule value cannot be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidMarker {
    Date,
    DateRange,
    Interval,
    /// A numeric range that is not a `[min, max]` pair.
    Range,
}

impl InvalidMarker {
    pub fn as_str(self) -> &'static str {
        match self {
            InvalidMarker::Date => "INVALID_DATE",
            InvalidMarker::DateRange => "INVALID_DATE_RANGE",
            InvalidMarker::Interval => "INVALID_INTERVAL",
            InvalidMarker::Range => "INVALID_RANGE",
        }
    }
}

impl fmt::Display for InvalidMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of rendering a rule value as SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    Text(String),
    Invalid(InvalidMarker),
}

impl Rendered {
    pub fn is_invalid(&self) -> bool {
        matches!(self, Rendered::Invalid(_))
    }
}

impl fmt::Display for Rendered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rendered::Text(s) => f.write_str(s),
            Rendered::Invalid(marker) => marker.fmt(f),
        }
    }
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Canonical default cell value for a data type.
pub fn default_for(data_type: DataType, today: NaiveDate) -> Value {
    match data_type {
        DataType::String => Value::String(String::new()),
        DataType::Number => Value::Number(0.0),
        DataType::Date => Value::String(today.format(DATE_FORMAT).to_string()),
        DataType::Boolean => Value::Bool(false),
        DataType::Array(_) => Value::Array(Vec::new()),
    }
}

/// A correctly shaped starting value for a rule once its operator is chosen.
pub fn default_value(data_type: DataType, shape: ValueShape, today: NaiveDate) -> RuleValue {
    let date = || Value::String(today.format(DATE_FORMAT).to_string());
    match shape {
        ValueShape::None => RuleValue::Scalar(default_for(data_type, today)),
        ValueShape::Text => RuleValue::Scalar(Value::String(String::new())),
        ValueShape::Number => RuleValue::Scalar(Value::Number(0.0)),
        ValueShape::List => RuleValue::List(Vec::new()),
        ValueShape::NumberRange => RuleValue::range(0, 0),
        ValueShape::Date => RuleValue::Scalar(date()),
        ValueShape::DateRange => RuleValue::Range {
            from: date(),
            to: date(),
        },
        ValueShape::Interval => RuleValue::Interval(Interval::new(1, IntervalUnit::Days)),
    }
}

/// Parses free-text input into an array element of the declared element type.
pub fn parse_element(input: &str, element_type: ElementType) -> Value {
    match element_type {
        ElementType::Number => Value::Number(parse_float(input)),
        ElementType::Boolean => Value::Bool(input.to_lowercase() == "true"),
        ElementType::Date => match parse_datetime(input) {
            Some(dt) => Value::String(dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
            // unparsable dates are kept verbatim so the user can fix them
            None => Value::String(input.to_string()),
        },
        ElementType::Object => {
            serde_json::from_str(input).unwrap_or_else(|_| Value::Object(BTreeMap::new()))
        }
        ElementType::String => Value::String(input.to_string()),
    }
}

/// Leading-prefix float parse: `"12px"` is 12, `"px"` is NaN.
pub fn parse_float(input: &str) -> f64 {
    let trimmed = input.trim_start();
    FLOAT_PREFIX
        .find(trimmed)
        .map(|m| m.as_str())
        .and_then(|s| match s.trim_start_matches('+') {
            "Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            other => other.parse().ok(),
        })
        .unwrap_or(f64::NAN)
}

/// Leading-prefix integer parse: `"5 days"` is 5, `"abc"` and `""` are `None`.
pub fn parse_int(input: &str) -> Option<i64> {
    INT_PREFIX
        .find(input.trim_start())
        .and_then(|m| m.as_str().parse().ok())
}

/// Reads an interval amount typed into the editor. Numbers truncate toward zero;
/// strings go through [`parse_int`].
pub fn interval_amount(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) if n.is_finite() && n.abs() < i64::MAX as f64 => Some(n.trunc() as i64),
        Value::String(s) => parse_int(s),
        _ => None,
    }
}

/// Builds an interval from the two editor inputs. Unparsable parts are left missing.
pub fn parse_interval(amount: &str, unit: &str) -> Interval {
    Interval {
        amount: parse_int(amount),
        unit: IntervalUnit::from_name(unit.trim()),
    }
}

/// Parses an ISO-8601 date or date-time. Date-only and zone-less values are read as UTC.
pub fn parse_datetime(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Reads a stored value as an instant: strings are parsed, numbers are epoch milliseconds.
pub fn to_datetime(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_datetime(s),
        Value::Number(n) if n.is_finite() => DateTime::from_timestamp_millis(*n as i64),
        _ => None,
    }
}

pub fn format_date(dt: &DateTime<Utc>) -> String {
    dt.format(DATE_FORMAT).to_string()
}

/// `Number(x)`.
pub fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => *n,
        Value::String(s) => string_to_number(s),
        Value::Array(items) => match items.as_slice() {
            [] => 0.0,
            [single] => string_to_number(&single.to_string()),
            _ => f64::NAN,
        },
        Value::Object(_) => f64::NAN,
    }
}

fn string_to_number(s: &str) -> f64 {
    let s = s.trim();
    match s {
        "" => 0.0,
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if s.chars().any(|c| c.is_ascii_alphabetic() && !matches!(c, 'e' | 'E')) => f64::NAN,
        _ => s.parse().unwrap_or(f64::NAN),
    }
}

/// Truthiness.
pub fn to_bool(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => *n != 0.0 && !n.is_nan(),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Whether a value may be stored in a cell of the given type. `Null` always may.
pub fn conforms(data_type: DataType, value: &Value) -> bool {
    match (data_type, value) {
        (_, Value::Null) => true,
        (DataType::String, Value::String(_)) => true,
        (DataType::Number, Value::Number(_)) => true,
        (DataType::Boolean, Value::Bool(_)) => true,
        (DataType::Date, Value::String(_) | Value::Number(_)) => to_datetime(value).is_some(),
        (DataType::Array(elem), Value::Array(items)) => {
            items.iter().all(|item| element_conforms(elem, item))
        }
        _ => false,
    }
}

fn element_conforms(element_type: ElementType, value: &Value) -> bool {
    match element_type {
        ElementType::String => conforms(DataType::String, value),
        ElementType::Number => conforms(DataType::Number, value),
        ElementType::Boolean => conforms(DataType::Boolean, value),
        ElementType::Date => conforms(DataType::Date, value),
        ElementType::Object => true,
    }
}

/// Quoted SQL string literal.
pub fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Text of a value as it appears inside a `LIKE` pattern.
pub fn pattern_text(value: &RuleValue) -> String {
    match value {
        RuleValue::Scalar(v) => v.to_string(),
        other => other
            .elements()
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(","),
    }
}

fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => quote(s),
        other => other.to_string(),
    }
}

fn literal_list(items: &[&Value]) -> String {
    let parts: Vec<_> = items.iter().map(|v| literal(v)).collect();
    format!("({})", parts.join(", "))
}

fn raw_number(value: &Value) -> String {
    match value {
        Value::Number(n) => format_number(*n),
        other => other.to_string(),
    }
}

/// Renders a single date as `'yyyy-MM-dd'`. Empty, zero and unparsable values are invalid.
pub fn render_date(value: &Value) -> Rendered {
    let empty = match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => *n == 0.0 || n.is_nan(),
        _ => false,
    };
    if empty {
        return Rendered::Invalid(InvalidMarker::Date);
    }
    match to_datetime(value) {
        Some(dt) => Rendered::Text(quote(&format_date(&dt))),
        None => Rendered::Invalid(InvalidMarker::Date),
    }
}

pub fn render_date_range(value: &RuleValue) -> Rendered {
    let RuleValue::Range { from, to } = value else {
        return Rendered::Invalid(InvalidMarker::DateRange);
    };
    match (render_date(from), render_date(to)) {
        (Rendered::Text(from), Rendered::Text(to)) => Rendered::Text(format!("{} AND {}", from, to)),
        _ => Rendered::Invalid(InvalidMarker::DateRange),
    }
}

/// Renders `INTERVAL <amount> <UNIT>`. A missing or zero amount, or a missing unit, is invalid.
pub fn render_interval(value: &RuleValue) -> Rendered {
    match value {
        RuleValue::Interval(Interval {
            amount: Some(amount),
            unit: Some(unit),
        }) if *amount != 0 => Rendered::Text(format!(
            "INTERVAL {} {}",
            amount,
            unit.name().to_uppercase()
        )),
        _ => Rendered::Invalid(InvalidMarker::Interval),
    }
}

/// The `[min, max]` pair of a numeric range, from either a range or a two-element list.
pub fn number_bounds(value: &RuleValue) -> Option<(&Value, &Value)> {
    match value {
        RuleValue::Range { from, to } => Some((from, to)),
        RuleValue::List(items) | RuleValue::Scalar(Value::Array(items)) => match items.as_slice() {
            [min, max] => Some((min, max)),
            _ => None,
        },
        _ => None,
    }
}

/// Renders a rule value for a field of `data_type` used with `op`.
pub fn render_value(data_type: DataType, op: Operator, value: &RuleValue) -> Rendered {
    match data_type {
        DataType::Boolean => {
            let truthy = value.as_scalar().map(to_bool).unwrap_or(false);
            Rendered::Text(if truthy { "TRUE" } else { "FALSE" }.to_string())
        }
        DataType::Date => match op.date_family() {
            Some(DateFamily::Range) => render_date_range(value),
            Some(DateFamily::Point) => match value {
                RuleValue::Scalar(v) => render_date(v),
                _ => Rendered::Invalid(InvalidMarker::Date),
            },
            Some(DateFamily::Interval) => render_interval(value),
            None => Rendered::Invalid(InvalidMarker::Date),
        },
        DataType::Number => match op {
            Operator::Between | Operator::NotBetween => match number_bounds(value) {
                Some((min, max)) => Rendered::Text(format!("{} AND {}", raw_number(min), raw_number(max))),
                None => Rendered::Invalid(InvalidMarker::Range),
            },
            _ => Rendered::Text(match value {
                RuleValue::Scalar(v) => raw_number(v),
                other => pattern_text(other),
            }),
        },
        DataType::Array(_) => match value {
            RuleValue::Scalar(v) if v.as_array().is_none() => Rendered::Text(literal(v)),
            other => Rendered::Text(literal_list(&other.elements())),
        },
        DataType::String => match value {
            RuleValue::Scalar(v) if v.as_array().is_none() => Rendered::Text(literal(v)),
            other => Rendered::Text(literal_list(&other.elements())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::operators_for_type;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    #[test]
    fn test_defaults_per_type() {
        assert_eq!(default_for(DataType::String, day()), Value::from(""));
        assert_eq!(default_for(DataType::Number, day()), Value::Number(0.0));
        assert_eq!(default_for(DataType::Date, day()), Value::from("2024-03-09"));
        assert_eq!(default_for(DataType::Boolean, day()), Value::Bool(false));
        assert_eq!(
            default_for(DataType::Array(ElementType::Number), day()),
            Value::Array(vec![])
        );
    }

    #[test]
    fn test_default_values_never_render_invalid() {
        for dt in [
            DataType::String,
            DataType::Number,
            DataType::Date,
            DataType::Boolean,
            DataType::Array(ElementType::String),
            DataType::Array(ElementType::Boolean),
        ] {
            for def in operators_for_type(dt) {
                let value = default_value(dt, def.shape, day());
                let rendered = render_value(dt, def.op, &value);
                assert!(!rendered.is_invalid(), "{} {} rendered {}", dt, def.name(), rendered);
            }
        }
    }

    #[test]
    fn test_parse_element() {
        assert_eq!(parse_element("42.5", ElementType::Number), Value::Number(42.5));
        assert_eq!(parse_element("12px", ElementType::Number), Value::Number(12.0));
        assert!(matches!(parse_element("px", ElementType::Number), Value::Number(n) if n.is_nan()));
        assert_eq!(parse_element("TRUE", ElementType::Boolean), Value::Bool(true));
        assert_eq!(parse_element("yes", ElementType::Boolean), Value::Bool(false));
        assert_eq!(
            parse_element("2023-01-05", ElementType::Date),
            Value::from("2023-01-05T00:00:00.000Z")
        );
        assert_eq!(parse_element("soon", ElementType::Date), Value::from("soon"));
        assert_eq!(parse_element("dark mode", ElementType::String), Value::from("dark mode"));
    }

    #[test]
    fn test_parse_object_is_permissive() {
        let obj = parse_element(r#"{"a": 1}"#, ElementType::Object);
        match obj {
            Value::Object(map) => assert_eq!(map["a"], Value::Number(1.0)),
            other => panic!("Expected object, got {:?}", other),
        }
        assert_eq!(
            parse_element("{not json", ElementType::Object),
            Value::Object(BTreeMap::new())
        );
    }

    #[test]
    fn test_number_coercion() {
        assert_eq!(to_number(&Value::from("30")), 30.0);
        assert_eq!(to_number(&Value::from(" 2.5 ")), 2.5);
        assert_eq!(to_number(&Value::from("")), 0.0);
        assert_eq!(to_number(&Value::Null), 0.0);
        assert_eq!(to_number(&Value::Bool(true)), 1.0);
        assert_eq!(to_number(&Value::from("1e3")), 1000.0);
        assert!(to_number(&Value::from("abc")).is_nan());
        assert!(to_number(&Value::from("nan")).is_nan());
        assert_eq!(to_number(&Value::from(vec![7])), 7.0);
        assert!(to_number(&Value::from(vec![1, 2])).is_nan());
    }

    #[test]
    fn test_truthiness() {
        assert!(!to_bool(&Value::from("")));
        assert!(to_bool(&Value::from("false")));
        assert!(!to_bool(&Value::Number(0.0)));
        assert!(!to_bool(&Value::Number(f64::NAN)));
        assert!(to_bool(&Value::Array(vec![])));
    }

    #[test]
    fn test_parse_datetime_forms() {
        let midnight = parse_datetime("2023-05-01").unwrap();
        assert_eq!(format_date(&midnight), "2023-05-01");
        let with_zone = parse_datetime("2023-05-01T23:30:00+02:00").unwrap();
        assert_eq!(format_date(&with_zone), "2023-05-01");
        assert!(parse_datetime("2023-05-01T10:15").is_some());
        assert!(parse_datetime("2023-13-01").is_none());
        assert!(parse_datetime("").is_none());
        assert_eq!(
            to_datetime(&Value::Number(0.0)).map(|d| format_date(&d)),
            Some("1970-01-01".to_string())
        );
    }

    #[test]
    fn test_render_dates() {
        assert_eq!(render_date(&Value::from("2023-05-01")), Rendered::Text("'2023-05-01'".into()));
        assert_eq!(render_date(&Value::from("")), Rendered::Invalid(InvalidMarker::Date));
        assert_eq!(render_date(&Value::from("nope")), Rendered::Invalid(InvalidMarker::Date));
        assert_eq!(
            render_date_range(&RuleValue::range("2023-01-01", "2023-02-01")).to_string(),
            "'2023-01-01' AND '2023-02-01'"
        );
        assert_eq!(
            render_date_range(&RuleValue::range("2023-01-01", Value::Null)).to_string(),
            "INVALID_DATE_RANGE"
        );
        assert_eq!(
            render_date_range(&RuleValue::from("2023-01-01")).to_string(),
            "INVALID_DATE_RANGE"
        );
    }

    #[test]
    fn test_render_interval() {
        let weeks = RuleValue::Interval(Interval::new(3, IntervalUnit::Weeks));
        assert_eq!(render_interval(&weeks).to_string(), "INTERVAL 3 WEEKS");
        let no_unit = RuleValue::Interval(Interval {
            amount: Some(3),
            unit: None,
        });
        assert_eq!(render_interval(&no_unit), Rendered::Invalid(InvalidMarker::Interval));
        let zero = RuleValue::Interval(Interval::new(0, IntervalUnit::Days));
        assert!(render_interval(&zero).is_invalid());
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("5", "weeks"), Interval::new(5, IntervalUnit::Weeks));
        assert_eq!(parse_interval(" 12 days", "Days"), Interval::new(12, IntervalUnit::Days));
        assert_eq!(parse_interval("-2", "months").amount, Some(-2));
        assert_eq!(parse_interval("", "days").amount, None);
        assert_eq!(parse_interval("abc", "days").amount, None);
        assert_eq!(parse_interval("3", "fortnights").unit, None);
        assert_eq!(parse_int("99999999999999999999"), None);
        assert_eq!(interval_amount(&Value::Number(4.9)), Some(4));
        assert_eq!(interval_amount(&Value::Number(f64::NAN)), None);
        assert_eq!(interval_amount(&Value::Null), None);
        assert!(render_interval(&RuleValue::Interval(parse_interval("abc", "days"))).is_invalid());
    }

    #[test]
    fn test_render_value_matrix() {
        let r = |dt, op, v: RuleValue| render_value(dt, op, &v).to_string();
        assert_eq!(r(DataType::String, Operator::Is, "O'Brien".into()), "'O''Brien'");
        assert_eq!(r(DataType::Number, Operator::Equals, 30.into()), "30");
        assert_eq!(r(DataType::Number, Operator::Between, RuleValue::range(30, 40)), "30 AND 40");
        assert_eq!(
            r(DataType::Number, Operator::NotBetween, RuleValue::list(["1", "9"])),
            "1 AND 9"
        );
        assert_eq!(r(DataType::Number, Operator::Between, 5.into()), "INVALID_RANGE");
        assert_eq!(r(DataType::Boolean, Operator::IsTrue, true.into()), "TRUE");
        assert_eq!(
            r(DataType::Array(ElementType::String), Operator::Contains, RuleValue::list(["a", "b"])),
            "('a', 'b')"
        );
        assert_eq!(
            r(DataType::Array(ElementType::Number), Operator::Contains, RuleValue::list([1, 2])),
            "(1, 2)"
        );
        assert_eq!(r(DataType::String, Operator::In, RuleValue::list(["x"])), "('x')");
        assert_eq!(r(DataType::Date, Operator::On, "2023-05-01".into()), "'2023-05-01'");
        assert_eq!(r(DataType::Date, Operator::On, RuleValue::range("a", "b")), "INVALID_DATE");
    }

    #[test]
    fn test_conforms() {
        assert!(conforms(DataType::Date, &Value::from("2023-01-01")));
        assert!(!conforms(DataType::Date, &Value::from("someday")));
        assert!(conforms(DataType::Number, &Value::Null));
        assert!(!conforms(DataType::Boolean, &Value::from("true")));
        assert!(conforms(
            DataType::Array(ElementType::Boolean),
            &Value::from(vec![true, false])
        ));
        assert!(!conforms(DataType::Array(ElementType::Number), &Value::from(vec!["1"])));
    }
}
