//! Evaluator module: applies a rule tree directly to in-memory records.
//!
//! The evaluator walks the same tree as the [`SqlCompiler`](crate::SqlCompiler) and reads
//! values through the same [`codec`] functions, so every operator means the same thing in
//! both passes. Inert rules (incomplete, unknown field, operator outside the field's catalog)
//! are skipped rather than failing.

use crate::codec;
use crate::operators::{lookup_operator, DateFamily, Operator};
use crate::query::{Group, Interval, IntervalUnit, Query, Rule, RuleNode, RuleValue};
use crate::record::Record;
use crate::schema::FieldSchema;
use crate::types::{Combinator, DataType, ElementType, Value};
use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Which combinator semantics the evaluator applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvalMode {
    /// Reproduces the established behavior of the query builder: children of a group are
    /// always ANDed regardless of the group's combinator, an `or` between top-level groups
    /// leaves the result unchanged, and `inNext` always counts days.
    ///
    /// The ignored combinators are known defects kept for fidelity; use `Strict` for
    /// results that agree with the compiled text.
    #[default]
    Compatible,
    /// Honors every combinator. The top-level chain uses SQL precedence (AND binds tighter
    /// than OR), matching the compiled text, and `inNext` honors its unit.
    Strict,
}

pub struct Evaluator<'a> {
    schema: &'a FieldSchema,
    now: DateTime<Utc>,
    mode: EvalMode,
}

impl<'a> Evaluator<'a> {
    pub fn new(schema: &'a FieldSchema) -> Self {
        Self {
            schema,
            now: Utc::now(),
            mode: EvalMode::default(),
        }
    }

    /// Pins the instant relative date operators are measured from.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn with_mode(mut self, mode: EvalMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> EvalMode {
        self.mode
    }

    /// Whether `record` satisfies the whole top-level chain.
    pub fn matches(&self, record: &Record, query: &Query) -> bool {
        let groups = query.groups();
        let combinators = query.combinators();
        match self.mode {
            EvalMode::Compatible => groups.iter().enumerate().all(|(i, group)| {
                let group_matches = self.group_matches(record, group);
                match i.checked_sub(1).map(|c| combinators[c]) {
                    None | Some(Combinator::And) => group_matches,
                    Some(Combinator::Or) => true,
                }
            }),
            EvalMode::Strict => {
                // OR of AND-runs
                let Some((first, rest)) = groups.split_first() else {
                    return true;
                };
                let mut any = false;
                let mut run = self.group_matches(record, first);
                for (group, combinator) in rest.iter().zip(combinators) {
                    let group_matches = self.group_matches(record, group);
                    match combinator {
                        Combinator::And => run = run && group_matches,
                        Combinator::Or => {
                            any = any || run;
                            run = group_matches;
                        }
                    }
                }
                any || run
            }
        }
    }

    /// Whether `record` satisfies one group. A group without effective rules matches.
    pub fn group_matches(&self, record: &Record, group: &Group) -> bool {
        let results: Vec<bool> = group
            .rules
            .iter()
            .filter_map(|node| match node {
                RuleNode::Rule(rule) => self.rule_matches(record, rule),
                RuleNode::Group(inner) => Some(self.group_matches(record, inner)),
            })
            .collect();
        if results.is_empty() {
            return true;
        }
        match (self.mode, group.combinator) {
            (EvalMode::Strict, Combinator::Or) => results.into_iter().any(|r| r),
            _ => results.into_iter().all(|r| r),
        }
    }

    /// Evaluates one rule. `None` means the rule is inert and takes no part in its group.
    pub fn rule_matches(&self, record: &Record, rule: &Rule) -> Option<bool> {
        if rule.is_incomplete() {
            return None;
        }
        let Some(field) = self.schema.get(&rule.field) else {
            trace!(field = %rule.field, "rule on unknown field is inert");
            return None;
        };
        let def = lookup_operator(field.data_type, &rule.operator)?;
        let op = def.op;

        let Some(a) = record.get(&rule.field).filter(|v| !v.is_null()) else {
            return Some(op == Operator::IsNotSet);
        };
        let b = &rule.value;
        let matched = match field.data_type {
            DataType::Boolean => compare_boolean(codec::to_bool(a), op),
            DataType::Array(ElementType::Boolean) => compare_boolean_array(a, op),
            DataType::Array(_) => compare_array(a, b, op),
            DataType::Date => match codec::to_datetime(a) {
                Some(a) => self.compare_date(a, b, op),
                None => false,
            },
            DataType::Number => compare_number(codec::to_number(a), b, op),
            DataType::String => compare_string(&a.to_string(), b, op),
        };
        Some(matched)
    }

    /// Records matching both the query and the free-text search, in input order.
    pub fn filter_all<'r>(&self, records: &'r [Record], query: &Query, search: &str) -> Vec<&'r Record> {
        self.filter_indices(records, query, search)
            .into_iter()
            .map(|i| &records[i])
            .collect()
    }

    /// Positions of the matching records, in input order.
    pub fn filter_indices(&self, records: &[Record], query: &Query, search: &str) -> Vec<usize> {
        let indices: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, record)| self.matches(record, query) && matches_search(record, search))
            .map(|(i, _)| i)
            .collect();
        debug!(
            total = records.len(),
            matched = indices.len(),
            mode = ?self.mode,
            "filtered records"
        );
        indices
    }

    fn compare_date(&self, a: DateTime<Utc>, b: &RuleValue, op: Operator) -> bool {
        let now = self.now;
        match op.date_family() {
            Some(DateFamily::Interval) => {
                let RuleValue::Interval(Interval {
                    amount: Some(amount),
                    unit,
                }) = b
                else {
                    return false;
                };
                let unit = unit.unwrap_or_default();
                let Some(cutoff) = amount.checked_neg().and_then(|back| shift(now, back, unit)) else {
                    return false;
                };
                match op {
                    Operator::Last => a >= cutoff,
                    Operator::NotInLast | Operator::BeforeLast => a < cutoff,
                    Operator::InNext => {
                        let unit = match self.mode {
                            EvalMode::Compatible => IntervalUnit::Days,
                            EvalMode::Strict => unit,
                        };
                        match shift(now, *amount, unit) {
                            Some(horizon) => now <= a && a <= horizon,
                            None => false,
                        }
                    }
                    _ => false,
                }
            }
            Some(DateFamily::Range) => {
                let RuleValue::Range { from, to } = b else {
                    return false;
                };
                let (Some(from), Some(to)) = (codec::to_datetime(from), codec::to_datetime(to)) else {
                    return false;
                };
                match op {
                    Operator::Between => from <= a && a <= to,
                    Operator::NotBetween => a < from || a > to,
                    _ => false,
                }
            }
            Some(DateFamily::Point) => {
                let Some(b) = b.as_scalar().and_then(codec::to_datetime) else {
                    return false;
                };
                let ordering = a.date_naive().cmp(&b.date_naive());
                match op {
                    Operator::On => ordering.is_eq(),
                    Operator::NotOn => ordering.is_ne(),
                    Operator::Before => ordering.is_lt(),
                    Operator::Since => ordering.is_ge() && a <= now,
                    _ => false,
                }
            }
            None => false,
        }
    }
}

/// `amount` units after `now` (before, for negative amounts).
fn shift(now: DateTime<Utc>, amount: i64, unit: IntervalUnit) -> Option<DateTime<Utc>> {
    match unit {
        IntervalUnit::Days => now.checked_add_signed(Duration::try_days(amount)?),
        IntervalUnit::Weeks => now.checked_add_signed(Duration::try_weeks(amount)?),
        IntervalUnit::Months => shift_months(now, amount),
        IntervalUnit::Years => shift_months(now, amount.checked_mul(12)?),
    }
}

fn shift_months(now: DateTime<Utc>, months: i64) -> Option<DateTime<Utc>> {
    let span = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        now.checked_add_months(span)
    } else {
        now.checked_sub_months(span)
    }
}

fn compare_boolean(a: bool, op: Operator) -> bool {
    match op {
        Operator::IsTrue => a,
        Operator::IsFalse => !a,
        _ => false,
    }
}

// A scalar stored in an array field is read as a one-element array.
fn array_items(a: &Value) -> &[Value] {
    match a {
        Value::Array(items) => items,
        other => std::slice::from_ref(other),
    }
}

fn compare_boolean_array(a: &Value, op: Operator) -> bool {
    let mut flags = array_items(a).iter().map(codec::to_bool);
    match op {
        Operator::AllTrue => flags.all(|f| f),
        Operator::AllFalse => flags.all(|f| !f),
        Operator::AnyTrue => flags.any(|f| f),
        Operator::AnyFalse => flags.any(|f| !f),
        _ => false,
    }
}

fn compare_array(a: &Value, b: &RuleValue, op: Operator) -> bool {
    let wanted = b.elements();
    let intersects = array_items(a).iter().any(|item| wanted.contains(&item));
    match op {
        Operator::Contains => intersects,
        Operator::DoesNotContain => !intersects,
        _ => false,
    }
}

fn rule_number(b: &RuleValue) -> f64 {
    match b {
        RuleValue::Scalar(v) => codec::to_number(v),
        RuleValue::List(items) => codec::to_number(&Value::Array(items.clone())),
        _ => f64::NAN,
    }
}

fn compare_number(a: f64, b: &RuleValue, op: Operator) -> bool {
    match op {
        Operator::Equals => a == rule_number(b),
        Operator::NotEqual => a != rule_number(b),
        Operator::GreaterThan => a > rule_number(b),
        Operator::GreaterThanOrEqual => a >= rule_number(b),
        Operator::LessThan => a < rule_number(b),
        Operator::LessThanOrEqual => a <= rule_number(b),
        Operator::Between | Operator::NotBetween => {
            let Some((min, max)) = codec::number_bounds(b) else {
                return false;
            };
            let (min, max) = (codec::to_number(min), codec::to_number(max));
            if op == Operator::Between {
                min <= a && a <= max
            } else {
                a < min || a > max
            }
        }
        Operator::IsNumeric => !a.is_nan(),
        Operator::IsNotNumeric => a.is_nan(),
        _ => false,
    }
}

fn compare_string(a: &str, b: &RuleValue, op: Operator) -> bool {
    let str_a = a.to_lowercase();
    let str_b = codec::pattern_text(b).to_lowercase();
    match op {
        Operator::Is => str_a == str_b,
        Operator::IsNot => str_a != str_b,
        Operator::Contains => str_a.contains(&str_b),
        Operator::DoesNotContain => !str_a.contains(&str_b),
        Operator::BeginsWith => str_a.starts_with(&str_b),
        Operator::EndsWith => str_a.ends_with(&str_b),
        Operator::In | Operator::NotIn => {
            let found = b
                .elements()
                .iter()
                .any(|v| v.to_string().to_lowercase() == str_a);
            found == (op == Operator::In)
        }
        Operator::IsSet => !a.is_empty(),
        Operator::IsNotSet => a.is_empty(),
        _ => false,
    }
}

/// Free-text search: any value of the record contains `term`, case-insensitively.
/// An empty term matches everything.
pub fn matches_search(record: &Record, term: &str) -> bool {
    if term.is_empty() {
        return true;
    }
    let term = term.to_lowercase();
    record
        .values()
        .values()
        .any(|v| v.to_string().to_lowercase().contains(&term))
}

/// Evaluates `query` for one record with the default evaluator.
pub fn matches(record: &Record, query: &Query, schema: &FieldSchema) -> bool {
    Evaluator::new(schema).matches(record, query)
}

/// Filters `records` by `query` and the free-text `search`, keeping input order.
pub fn filter_all<'r>(
    records: &'r [Record],
    query: &Query,
    schema: &FieldSchema,
    search: &str,
) -> Vec<&'r Record> {
    Evaluator::new(schema).filter_all(records, query, search)
}
