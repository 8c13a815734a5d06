//! Operators module: the per-type catalog of legal operators.
//!
//! The catalog is pure data. It drives the editor's choices, and both the compiler and the
//! evaluator consult it to decide whether a rule is meaningful for its field: an operator
//! outside the field's catalog makes the rule inert in both passes.

use crate::schema::Field;
use crate::types::{DataType, ElementType};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Operator {
    // text
    Is,
    IsNot,
    Contains,
    DoesNotContain,
    BeginsWith,
    EndsWith,
    In,
    NotIn,
    IsSet,
    IsNotSet,
    // boolean
    IsTrue,
    IsFalse,
    // boolean arrays
    AllTrue,
    AllFalse,
    AnyTrue,
    AnyFalse,
    // number
    Equals,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Between,
    NotBetween,
    IsNumeric,
    IsNotNumeric,
    // date
    Last,
    NotInLast,
    On,
    NotOn,
    BeforeLast,
    Before,
    Since,
    InNext,
}

const ALL_OPERATORS: [Operator; 34] = [
    Operator::Is,
    Operator::IsNot,
    Operator::Contains,
    Operator::DoesNotContain,
    Operator::BeginsWith,
    Operator::EndsWith,
    Operator::In,
    Operator::NotIn,
    Operator::IsSet,
    Operator::IsNotSet,
    Operator::IsTrue,
    Operator::IsFalse,
    Operator::AllTrue,
    Operator::AllFalse,
    Operator::AnyTrue,
    Operator::AnyFalse,
    Operator::Equals,
    Operator::NotEqual,
    Operator::GreaterThan,
    Operator::GreaterThanOrEqual,
    Operator::LessThan,
    Operator::LessThanOrEqual,
    Operator::Between,
    Operator::NotBetween,
    Operator::IsNumeric,
    Operator::IsNotNumeric,
    Operator::Last,
    Operator::NotInLast,
    Operator::On,
    Operator::NotOn,
    Operator::BeforeLast,
    Operator::Before,
    Operator::Since,
    Operator::InNext,
];

impl Operator {
    /// The wire name stored in a rule's `operator` string.
    pub const fn name(self) -> &'static str {
        match self {
            Operator::Is => "is",
            Operator::IsNot => "isNot",
            Operator::Contains => "contains",
            Operator::DoesNotContain => "doesNotContain",
            Operator::BeginsWith => "beginsWith",
            Operator::EndsWith => "endsWith",
            Operator::In => "in",
            Operator::NotIn => "notIn",
            Operator::IsSet => "isSet",
            Operator::IsNotSet => "isNotSet",
            Operator::IsTrue => "isTrue",
            Operator::IsFalse => "isFalse",
            Operator::AllTrue => "allTrue",
            Operator::AllFalse => "allFalse",
            Operator::AnyTrue => "anyTrue",
            Operator::AnyFalse => "anyFalse",
            Operator::Equals => "equals",
            Operator::NotEqual => "notEqual",
            Operator::GreaterThan => "greaterThan",
            Operator::GreaterThanOrEqual => "greaterThanOrEqual",
            Operator::LessThan => "lessThan",
            Operator::LessThanOrEqual => "lessThanOrEqual",
            Operator::Between => "between",
            Operator::NotBetween => "notBetween",
            Operator::IsNumeric => "isNumeric",
            Operator::IsNotNumeric => "isNotNumeric",
            Operator::Last => "last",
            Operator::NotInLast => "notInLast",
            Operator::On => "on",
            Operator::NotOn => "notOn",
            Operator::BeforeLast => "beforeLast",
            Operator::Before => "before",
            Operator::Since => "since",
            Operator::InNext => "inNext",
        }
    }

    pub fn all() -> &'static [Operator] {
        &ALL_OPERATORS
    }

    /// How a date operator reads its value.
    pub fn date_family(self) -> Option<DateFamily> {
        match self {
            Operator::Between | Operator::NotBetween => Some(DateFamily::Range),
            Operator::On | Operator::NotOn | Operator::Before | Operator::Since => {
                Some(DateFamily::Point)
            }
            Operator::Last | Operator::NotInLast | Operator::InNext | Operator::BeforeLast => {
                Some(DateFamily::Interval)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown operator '{0}'")]
pub struct UnknownOperator(pub String);

impl FromStr for Operator {
    type Err = UnknownOperator;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_OPERATORS
            .iter()
            .copied()
            .find(|op| op.name() == s)
            .ok_or_else(|| UnknownOperator(s.to_string()))
    }
}

/// Date operator families. Each family expects one value shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFamily {
    /// `between`, `notBetween`: explicit from/to bounds.
    Range,
    /// `on`, `notOn`, `before`, `since`: a single calendar date.
    Point,
    /// `last`, `notInLast`, `inNext`, `beforeLast`: an amount of days/weeks/months/years.
    Interval,
}

/// The value an operator expects from the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    /// The operator takes no value (`isSet`, `isTrue`, `anyFalse`, ...).
    None,
    Text,
    Number,
    /// A list of elements (`in`, array `contains`).
    List,
    /// `[min, max]` numbers.
    NumberRange,
    Date,
    DateRange,
    Interval,
}

/// One catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorDef {
    pub op: Operator,
    pub label: &'static str,
    pub shape: ValueShape,
}

impl OperatorDef {
    const fn new(op: Operator, label: &'static str, shape: ValueShape) -> Self {
        Self { op, label, shape }
    }

    pub fn name(&self) -> &'static str {
        self.op.name()
    }
}

const TEXT_OPERATORS: &[OperatorDef] = &[
    OperatorDef::new(Operator::Is, "Is", ValueShape::Text),
    OperatorDef::new(Operator::IsNot, "Is not", ValueShape::Text),
    OperatorDef::new(Operator::Contains, "Contains", ValueShape::Text),
    OperatorDef::new(Operator::DoesNotContain, "Does not contain", ValueShape::Text),
    OperatorDef::new(Operator::BeginsWith, "Begins with", ValueShape::Text),
    OperatorDef::new(Operator::EndsWith, "Ends with", ValueShape::Text),
    OperatorDef::new(Operator::In, "In", ValueShape::List),
    OperatorDef::new(Operator::NotIn, "Not in", ValueShape::List),
    OperatorDef::new(Operator::IsSet, "Is set", ValueShape::None),
    OperatorDef::new(Operator::IsNotSet, "Is not set", ValueShape::None),
];

const NUMBER_OPERATORS: &[OperatorDef] = &[
    OperatorDef::new(Operator::Equals, "Equals", ValueShape::Number),
    OperatorDef::new(Operator::NotEqual, "Not equal", ValueShape::Number),
    OperatorDef::new(Operator::GreaterThan, "Greater than", ValueShape::Number),
    OperatorDef::new(Operator::GreaterThanOrEqual, "Greater than or equal to", ValueShape::Number),
    OperatorDef::new(Operator::LessThan, "Less than", ValueShape::Number),
    OperatorDef::new(Operator::LessThanOrEqual, "Less than or equal to", ValueShape::Number),
    OperatorDef::new(Operator::Between, "Between", ValueShape::NumberRange),
    OperatorDef::new(Operator::NotBetween, "Not between", ValueShape::NumberRange),
    OperatorDef::new(Operator::IsNumeric, "Is numeric", ValueShape::None),
    OperatorDef::new(Operator::IsNotNumeric, "Is not numeric", ValueShape::None),
];

const DATE_OPERATORS: &[OperatorDef] = &[
    OperatorDef::new(Operator::Last, "Last", ValueShape::Interval),
    OperatorDef::new(Operator::NotInLast, "Not in the last", ValueShape::Interval),
    OperatorDef::new(Operator::Between, "Between", ValueShape::DateRange),
    OperatorDef::new(Operator::NotBetween, "Not between", ValueShape::DateRange),
    OperatorDef::new(Operator::On, "On", ValueShape::Date),
    OperatorDef::new(Operator::NotOn, "Not on", ValueShape::Date),
    OperatorDef::new(Operator::BeforeLast, "Before the last", ValueShape::Interval),
    OperatorDef::new(Operator::Before, "Before", ValueShape::Date),
    OperatorDef::new(Operator::Since, "Since", ValueShape::Date),
    OperatorDef::new(Operator::InNext, "In the next", ValueShape::Interval),
];

const BOOLEAN_OPERATORS: &[OperatorDef] = &[
    OperatorDef::new(Operator::IsTrue, "Is True", ValueShape::None),
    OperatorDef::new(Operator::IsFalse, "Is False", ValueShape::None),
];

const ARRAY_OPERATORS: &[OperatorDef] = &[
    OperatorDef::new(Operator::Contains, "Contains", ValueShape::List),
    OperatorDef::new(Operator::DoesNotContain, "Does not contain", ValueShape::List),
];

const BOOLEAN_ARRAY_OPERATORS: &[OperatorDef] = &[
    OperatorDef::new(Operator::AllTrue, "All True", ValueShape::None),
    OperatorDef::new(Operator::AllFalse, "All False", ValueShape::None),
    OperatorDef::new(Operator::AnyTrue, "Any True", ValueShape::None),
    OperatorDef::new(Operator::AnyFalse, "Any False", ValueShape::None),
];

/// Legal operators for a data type, in the order the editor lists them.
pub fn operators_for_type(data_type: DataType) -> &'static [OperatorDef] {
    match data_type {
        DataType::String => TEXT_OPERATORS,
        DataType::Number => NUMBER_OPERATORS,
        DataType::Date => DATE_OPERATORS,
        DataType::Boolean => BOOLEAN_OPERATORS,
        DataType::Array(ElementType::Boolean) => BOOLEAN_ARRAY_OPERATORS,
        DataType::Array(_) => ARRAY_OPERATORS,
    }
}

pub fn operators_for(field: &Field) -> &'static [OperatorDef] {
    operators_for_type(field.data_type)
}

/// Catalog lookup by raw type names. `None` signals an unrecognized data type.
pub fn operators_for_names(
    data_type: &str,
    element_type: Option<&str>,
) -> Option<&'static [OperatorDef]> {
    DataType::from_names(data_type, element_type).map(operators_for_type)
}

/// Resolves an operator name against a type's catalog.
pub fn lookup_operator(data_type: DataType, name: &str) -> Option<&'static OperatorDef> {
    operators_for_type(data_type).iter().find(|def| def.name() == name)
}
