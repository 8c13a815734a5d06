//! Compiler module: renders a rule tree as a SQL-flavored predicate string.
//!
//! The output is display text and is never executed. Values are rendered through the
//! [`codec`](crate::codec); a value that cannot be rendered turns its rule into the inert
//! self-comparison `field = field` instead of failing.

use crate::codec::{self, Rendered};
use crate::operators::{lookup_operator, Operator};
use crate::query::{Group, Query, Rule, RuleNode};
use crate::schema::FieldSchema;
use crate::types::DataType;
use tracing::{debug, trace};

/// Fragment emitted for a group with no effective rules.
const TAUTOLOGY: &str = "(1 = 1)";
const NUMERIC_PATTERN: &str = "'^[0-9]+$'";

pub struct SqlCompiler<'a> {
    schema: &'a FieldSchema,
}

impl<'a> SqlCompiler<'a> {
    pub fn new(schema: &'a FieldSchema) -> Self {
        Self { schema }
    }

    /// Compiles every top-level group and joins them with the query's own combinator chain.
    pub fn compile(&self, query: &Query) -> String {
        let mut parts = Vec::with_capacity(query.groups().len());
        for (i, group) in query.groups().iter().enumerate() {
            let sql = self.compile_group(group);
            if i == 0 {
                parts.push(sql);
            } else {
                let combinator = query.combinators()[i - 1];
                parts.push(format!("{} {}", combinator.sql_keyword(), sql));
            }
        }
        let sql = parts.join(" ");
        debug!(groups = query.groups().len(), sql = %sql, "compiled query");
        sql
    }

    pub fn compile_group(&self, group: &Group) -> String {
        let fragments: Vec<String> = group
            .rules
            .iter()
            .map(|node| match node {
                RuleNode::Rule(rule) => self.compile_rule(rule),
                RuleNode::Group(inner) => self.compile_group(inner),
            })
            .filter(|sql| !sql.is_empty())
            .collect();
        if fragments.is_empty() {
            return TAUTOLOGY.to_string();
        }
        let joiner = format!(" {} ", group.combinator.sql_keyword());
        format!("({})", fragments.join(&joiner))
    }

    /// Compiles one rule. Incomplete rules, unknown fields and operators outside the
    /// field's catalog compile to an empty fragment.
    pub fn compile_rule(&self, rule: &Rule) -> String {
        if rule.is_incomplete() {
            return String::new();
        }
        let Some(field) = self.schema.get(&rule.field) else {
            trace!(field = %rule.field, "skipping rule on unknown field");
            return String::new();
        };
        let Some(def) = lookup_operator(field.data_type, &rule.operator) else {
            trace!(field = %rule.field, operator = %rule.operator, "skipping operator outside catalog");
            return String::new();
        };
        trace!(field = %rule.field, operator = %rule.operator, "compiling rule");
        render_rule(&rule.field, field.data_type, def.op, rule)
    }
}

fn render_rule(f: &str, data_type: DataType, op: Operator, rule: &Rule) -> String {
    let value = || codec::render_value(data_type, op, &rule.value);
    let pattern = || codec::pattern_text(&rule.value).replace('\'', "''");
    match op {
        Operator::Is => with_value(f, value(), |v| format!("{f} = {v}")),
        Operator::IsNot => with_value(f, value(), |v| format!("{f} != {v}")),
        Operator::Contains => format!("{f} LIKE '%{}%'", pattern()),
        Operator::DoesNotContain => format!("{f} NOT LIKE '%{}%'", pattern()),
        Operator::BeginsWith => format!("{f} LIKE '{}%'", pattern()),
        Operator::EndsWith => format!("{f} LIKE '%{}'", pattern()),
        Operator::In => with_value(f, value(), |v| format!("{f} IN {v}")),
        Operator::NotIn => with_value(f, value(), |v| format!("{f} NOT IN {v}")),
        Operator::IsSet => format!("{f} IS NOT NULL AND {f} != ''"),
        Operator::IsNotSet => format!("{f} IS NULL OR {f} = ''"),
        Operator::IsTrue | Operator::AllTrue => format!("{f} = TRUE"),
        Operator::IsFalse | Operator::AllFalse => format!("{f} = FALSE"),
        Operator::AnyTrue => format!("TRUE = ANY({f})"),
        Operator::AnyFalse => format!("FALSE = ANY({f})"),
        Operator::Equals | Operator::On => with_value(f, value(), |v| format!("{f} = {v}")),
        Operator::NotEqual | Operator::NotOn => with_value(f, value(), |v| format!("{f} != {v}")),
        Operator::GreaterThan => with_value(f, value(), |v| format!("{f} > {v}")),
        Operator::GreaterThanOrEqual | Operator::Since => {
            with_value(f, value(), |v| format!("{f} >= {v}"))
        }
        Operator::LessThan | Operator::Before => with_value(f, value(), |v| format!("{f} < {v}")),
        Operator::LessThanOrEqual => with_value(f, value(), |v| format!("{f} <= {v}")),
        Operator::Between => with_value(f, value(), |v| format!("{f} BETWEEN {v}")),
        Operator::NotBetween => with_value(f, value(), |v| format!("{f} NOT BETWEEN {v}")),
        Operator::IsNumeric => format!("{f} REGEXP {NUMERIC_PATTERN}"),
        Operator::IsNotNumeric => format!("{f} NOT REGEXP {NUMERIC_PATTERN}"),
        Operator::Last => with_value(f, value(), |v| format!("{f} >= DATE_SUB(CURRENT_DATE, {v})")),
        Operator::NotInLast | Operator::BeforeLast => {
            with_value(f, value(), |v| format!("{f} < DATE_SUB(CURRENT_DATE, {v})"))
        }
        Operator::InNext => with_value(f, value(), |v| format!("{f} <= DATE_ADD(CURRENT_DATE, {v})")),
    }
}

// Bad input makes the rule inert rather than dropping it.
fn with_value(f: &str, rendered: Rendered, shape: impl FnOnce(&str) -> String) -> String {
    match rendered {
        Rendered::Text(v) => shape(&v),
        Rendered::Invalid(marker) => {
            trace!(field = %f, %marker, "value did not render");
            format!("{f} = {f}")
        }
    }
}

/// Compiles `query` against `schema`.
pub fn compile(query: &Query, schema: &FieldSchema) -> String {
    SqlCompiler::new(schema).compile(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Interval, IntervalUnit, RuleValue};
    use crate::schema::FieldSchemaBuilder;
    use crate::types::{Combinator, ElementType, Value};

    fn schema() -> FieldSchema {
        FieldSchemaBuilder::new()
            .field("lastName", "Last Name", DataType::String)
            .field("age", "Age", DataType::Number)
            .field("created", "Created", DataType::Date)
            .field("isActive", "Is Active", DataType::Boolean)
            .field("preferences", "Preferences", DataType::Array(ElementType::String))
            .field("notifications", "Notifications", DataType::Array(ElementType::Boolean))
            .build()
    }

    fn rule_sql(rule: Rule) -> String {
        SqlCompiler::new(&schema()).compile_rule(&rule)
    }

    #[test]
    fn test_compile_string_operators() {
        assert_eq!(rule_sql(Rule::new("lastName", Operator::Is, "Doe")), "lastName = 'Doe'");
        assert_eq!(rule_sql(Rule::new("lastName", Operator::IsNot, "Doe")), "lastName != 'Doe'");
        assert_eq!(rule_sql(Rule::new("lastName", Operator::Contains, "son")), "lastName LIKE '%son%'");
        assert_eq!(
            rule_sql(Rule::new("lastName", Operator::DoesNotContain, "son")),
            "lastName NOT LIKE '%son%'"
        );
        assert_eq!(rule_sql(Rule::new("lastName", Operator::BeginsWith, "Jo")), "lastName LIKE 'Jo%'");
        assert_eq!(rule_sql(Rule::new("lastName", Operator::EndsWith, "th")), "lastName LIKE '%th'");
        assert_eq!(
            rule_sql(Rule::new("lastName", Operator::In, RuleValue::list(["Doe", "Brown"]))),
            "lastName IN ('Doe', 'Brown')"
        );
        assert_eq!(
            rule_sql(Rule::new("lastName", Operator::NotIn, RuleValue::list(["Doe"]))),
            "lastName NOT IN ('Doe')"
        );
        assert_eq!(
            rule_sql(Rule::new("lastName", Operator::IsSet, "")),
            "lastName IS NOT NULL AND lastName != ''"
        );
        assert_eq!(
            rule_sql(Rule::new("lastName", Operator::IsNotSet, "")),
            "lastName IS NULL OR lastName = ''"
        );
    }

    #[test]
    fn test_compile_number_operators() {
        assert_eq!(rule_sql(Rule::new("age", Operator::Equals, 30)), "age = 30");
        assert_eq!(rule_sql(Rule::new("age", Operator::NotEqual, "30")), "age != 30");
        assert_eq!(rule_sql(Rule::new("age", Operator::GreaterThanOrEqual, 2.5)), "age >= 2.5");
        assert_eq!(rule_sql(Rule::new("age", Operator::LessThan, 18)), "age < 18");
        assert_eq!(
            rule_sql(Rule::new("age", Operator::Between, RuleValue::range(30, 40))),
            "age BETWEEN 30 AND 40"
        );
        assert_eq!(
            rule_sql(Rule::new("age", Operator::NotBetween, RuleValue::list([30, 40]))),
            "age NOT BETWEEN 30 AND 40"
        );
        assert_eq!(rule_sql(Rule::new("age", Operator::Between, 30)), "age = age");
        assert_eq!(rule_sql(Rule::new("age", Operator::Equals, 1e20)), "age = 100000000000000000000");
        assert_eq!(rule_sql(Rule::new("age", Operator::IsNumeric, "")), "age REGEXP '^[0-9]+$'");
        assert_eq!(
            rule_sql(Rule::new("age", Operator::IsNotNumeric, "")),
            "age NOT REGEXP '^[0-9]+$'"
        );
    }

    #[test]
    fn test_compile_boolean_operators() {
        assert_eq!(rule_sql(Rule::new("isActive", Operator::IsTrue, "")), "isActive = TRUE");
        assert_eq!(rule_sql(Rule::new("isActive", Operator::IsFalse, "")), "isActive = FALSE");
        // allTrue/allFalse keep the scalar form
        assert_eq!(rule_sql(Rule::new("notifications", Operator::AllTrue, "")), "notifications = TRUE");
        assert_eq!(rule_sql(Rule::new("notifications", Operator::AllFalse, "")), "notifications = FALSE");
        assert_eq!(rule_sql(Rule::new("notifications", Operator::AnyTrue, "")), "TRUE = ANY(notifications)");
        assert_eq!(rule_sql(Rule::new("notifications", Operator::AnyFalse, "")), "FALSE = ANY(notifications)");
    }

    #[test]
    fn test_compile_array_contains() {
        assert_eq!(
            rule_sql(Rule::new("preferences", Operator::Contains, "dark mode")),
            "preferences LIKE '%dark mode%'"
        );
        assert_eq!(
            rule_sql(Rule::new("preferences", Operator::DoesNotContain, RuleValue::list(["a", "b"]))),
            "preferences NOT LIKE '%a,b%'"
        );
    }

    #[test]
    fn test_compile_date_operators() {
        assert_eq!(rule_sql(Rule::new("created", Operator::On, "2023-05-01")), "created = '2023-05-01'");
        assert_eq!(rule_sql(Rule::new("created", Operator::NotOn, "2023-05-01")), "created != '2023-05-01'");
        assert_eq!(rule_sql(Rule::new("created", Operator::Before, "2023-05-01")), "created < '2023-05-01'");
        assert_eq!(rule_sql(Rule::new("created", Operator::Since, "2023-05-01")), "created >= '2023-05-01'");
        assert_eq!(
            rule_sql(Rule::new("created", Operator::Between, RuleValue::range("2023-01-01", "2023-03-01"))),
            "created BETWEEN '2023-01-01' AND '2023-03-01'"
        );
        assert_eq!(
            rule_sql(Rule::new("created", Operator::NotBetween, RuleValue::range("2023-01-01", "2023-03-01"))),
            "created NOT BETWEEN '2023-01-01' AND '2023-03-01'"
        );
        let weeks = Interval::new(2, IntervalUnit::Weeks);
        assert_eq!(
            rule_sql(Rule::new("created", Operator::Last, weeks)),
            "created >= DATE_SUB(CURRENT_DATE, INTERVAL 2 WEEKS)"
        );
        assert_eq!(
            rule_sql(Rule::new("created", Operator::NotInLast, weeks)),
            "created < DATE_SUB(CURRENT_DATE, INTERVAL 2 WEEKS)"
        );
        assert_eq!(
            rule_sql(Rule::new("created", Operator::BeforeLast, weeks)),
            "created < DATE_SUB(CURRENT_DATE, INTERVAL 2 WEEKS)"
        );
        assert_eq!(
            rule_sql(Rule::new("created", Operator::InNext, Interval::new(5, IntervalUnit::Days))),
            "created <= DATE_ADD(CURRENT_DATE, INTERVAL 5 DAYS)"
        );
    }

    #[test]
    fn test_invalid_values_become_self_comparison() {
        assert_eq!(rule_sql(Rule::new("created", Operator::On, "not a date")), "created = created");
        assert_eq!(rule_sql(Rule::new("created", Operator::Between, "2023-01-01")), "created = created");
        assert_eq!(
            rule_sql(Rule::new("created", Operator::Last, Interval { amount: None, unit: Some(IntervalUnit::Days) })),
            "created = created"
        );
    }

    #[test]
    fn test_inert_rules_compile_to_nothing() {
        assert_eq!(rule_sql(Rule::empty()), "");
        assert_eq!(rule_sql(Rule::new("deleted", Operator::Is, "x")), "");
        // operator outside the field's catalog
        assert_eq!(rule_sql(Rule::new("age", Operator::Contains, "3")), "");
        let unknown_op = Rule {
            field: "age".into(),
            operator: "matches".into(),
            value: Value::from("x").into(),
        };
        assert_eq!(rule_sql(unknown_op), "");
    }

    #[test]
    fn test_compile_groups_and_chain() {
        let g0 = Group::new(Combinator::Or)
            .with(Rule::new("age", Operator::GreaterThan, 30))
            .with(Rule::empty())
            .with(Rule::new("lastName", Operator::Is, "Doe"));
        let g1 = Group::new(Combinator::And)
            .with(Rule::new("isActive", Operator::IsTrue, ""))
            .with(Group::new(Combinator::Or).with(Rule::new("age", Operator::LessThan, 20)));
        let query = Query::from_groups([g0, g1], Combinator::And)
            .add_group()
            .toggle_combinator(1)
            .unwrap();
        assert_eq!(
            compile(&query, &schema()),
            "(age > 30 OR lastName = 'Doe') AND (isActive = TRUE AND (age < 20)) OR (1 = 1)"
        );
    }

    #[test]
    fn test_empty_query() {
        assert_eq!(compile(&Query::new(), &schema()), "(1 = 1)");
        let no_groups = Query::new().delete_group(0).unwrap();
        assert_eq!(compile(&no_groups, &schema()), "");
    }

    #[test]
    fn test_compile_is_idempotent() {
        let query = Query::new()
            .add_rule(0)
            .unwrap()
            .update_rule(0, &[0], Rule::new("lastName", Operator::Contains, "son"))
            .unwrap();
        let sch = schema();
        assert_eq!(compile(&query, &sch), compile(&query, &sch));
    }
}
