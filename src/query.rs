//! Query module: the rule tree.
//!
//! A [`Query`] is a flat chain of top-level [`Group`]s joined by combinators. Groups nest
//! rules and further groups to any depth. Every structural operation takes `&self` and
//! returns a new snapshot; groups that were not touched are shared with the previous
//! snapshot through `Arc`, so callers can detect changes by pointer identity.

use crate::codec;
use crate::operators::Operator;
use crate::types::{Combinator, Value};
use crate::{QueryError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;

/// Unit of a relative date interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    #[default]
    Days,
    Weeks,
    Months,
    Years,
}

impl IntervalUnit {
    pub fn name(self) -> &'static str {
        match self {
            IntervalUnit::Days => "days",
            IntervalUnit::Weeks => "weeks",
            IntervalUnit::Months => "months",
            IntervalUnit::Years => "years",
        }
    }

    /// Case-insensitive inverse of [`IntervalUnit::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "days" => Some(IntervalUnit::Days),
            "weeks" => Some(IntervalUnit::Weeks),
            "months" => Some(IntervalUnit::Months),
            "years" => Some(IntervalUnit::Years),
            _ => None,
        }
    }
}

/// `amount` units relative to now. Either part may be missing while the user is typing.
///
/// Deserialization is lenient: the amount may arrive as a number or as the raw input
/// text, and anything unparsable in either part reads as missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Interval {
    #[serde(default, deserialize_with = "lenient_amount")]
    pub amount: Option<i64>,
    #[serde(default, deserialize_with = "lenient_unit")]
    pub unit: Option<IntervalUnit>,
}

fn lenient_amount<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(codec::interval_amount(&Value::deserialize(deserializer)?))
}

fn lenient_unit<'de, D>(deserializer: D) -> std::result::Result<Option<IntervalUnit>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(name) => IntervalUnit::from_name(&name),
        _ => None,
    })
}

impl Interval {
    pub fn new(amount: i64, unit: IntervalUnit) -> Self {
        Self {
            amount: Some(amount),
            unit: Some(unit),
        }
    }
}

/// The value carried by a rule, tagged by shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum RuleValue {
    Scalar(Value),
    List(Vec<Value>),
    Range { from: Value, to: Value },
    Interval(Interval),
}

impl RuleValue {
    pub fn range(from: impl Into<Value>, to: impl Into<Value>) -> Self {
        RuleValue::Range {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn list<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Self {
        RuleValue::List(items.into_iter().map(Into::into).collect())
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            RuleValue::Scalar(v) => Some(v),
            _ => None,
        }
    }

    /// The value viewed as a list of elements: lists as-is, a scalar as one element.
    pub fn elements(&self) -> Vec<&Value> {
        match self {
            RuleValue::Scalar(Value::Array(items)) | RuleValue::List(items) => items.iter().collect(),
            RuleValue::Scalar(v) => vec![v],
            RuleValue::Range { from, to } => vec![from, to],
            RuleValue::Interval(_) => Vec::new(),
        }
    }
}

impl Default for RuleValue {
    fn default() -> Self {
        RuleValue::Scalar(Value::String(String::new()))
    }
}

impl From<Value> for RuleValue {
    fn from(v: Value) -> Self {
        RuleValue::Scalar(v)
    }
}

impl From<&str> for RuleValue {
    fn from(s: &str) -> Self {
        RuleValue::Scalar(Value::from(s))
    }
}

impl From<f64> for RuleValue {
    fn from(n: f64) -> Self {
        RuleValue::Scalar(Value::Number(n))
    }
}

impl From<i32> for RuleValue {
    fn from(n: i32) -> Self {
        RuleValue::Scalar(Value::from(n))
    }
}

impl From<bool> for RuleValue {
    fn from(b: bool) -> Self {
        RuleValue::Scalar(Value::Bool(b))
    }
}

impl From<Interval> for RuleValue {
    fn from(i: Interval) -> Self {
        RuleValue::Interval(i)
    }
}

/// A leaf filter condition. An empty field or operator marks the rule incomplete.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Rule {
    pub field: String,
    pub operator: String,
    #[serde(default)]
    pub value: RuleValue,
}

impl Rule {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<RuleValue>) -> Self {
        Self {
            field: field.into(),
            operator: operator.name().to_string(),
            value: value.into(),
        }
    }

    /// The rule the editor inserts before the user picks anything.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_incomplete(&self) -> bool {
        self.field.is_empty() || self.operator.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleNode {
    Group(Group),
    Rule(Rule),
}

impl From<Rule> for RuleNode {
    fn from(rule: Rule) -> Self {
        RuleNode::Rule(rule)
    }
}

impl From<Group> for RuleNode {
    fn from(group: Group) -> Self {
        RuleNode::Group(group)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Group {
    pub combinator: Combinator,
    #[serde(default)]
    pub rules: Vec<RuleNode>,
}

impl Group {
    pub fn new(combinator: Combinator) -> Self {
        Self {
            combinator,
            rules: Vec::new(),
        }
    }

    /// Builder-style append of a rule or nested group.
    pub fn with(mut self, node: impl Into<RuleNode>) -> Self {
        self.rules.push(node.into());
        self
    }

    pub fn node_at(&self, path: &[usize]) -> Option<&RuleNode> {
        let (&first, rest) = path.split_first()?;
        let node = self.rules.get(first)?;
        match (node, rest.is_empty()) {
            (_, true) => Some(node),
            (RuleNode::Group(g), false) => g.node_at(rest),
            (RuleNode::Rule(_), false) => None,
        }
    }

    fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut RuleNode> {
        let (&first, rest) = path.split_first()?;
        let node = self.rules.get_mut(first)?;
        if rest.is_empty() {
            return Some(node);
        }
        match node {
            RuleNode::Group(g) => g.node_at_mut(rest),
            RuleNode::Rule(_) => None,
        }
    }

    fn group_at_mut(&mut self, path: &[usize]) -> Option<&mut Group> {
        if path.is_empty() {
            return Some(self);
        }
        match self.node_at_mut(path)? {
            RuleNode::Group(g) => Some(g),
            RuleNode::Rule(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct QueryRepr {
    groups: Vec<Arc<Group>>,
    combinators: Vec<Combinator>,
}

impl TryFrom<QueryRepr> for Query {
    type Error = QueryError;

    fn try_from(repr: QueryRepr) -> Result<Self> {
        Query::from_parts(repr.groups, repr.combinators)
    }
}

/// The whole filter: top-level groups joined left to right by `combinators`.
/// `combinators.len()` is always `groups.len() - 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "QueryRepr")]
pub struct Query {
    groups: Vec<Arc<Group>>,
    combinators: Vec<Combinator>,
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}

impl Query {
    /// A query holding one empty `and` group.
    pub fn new() -> Self {
        Self {
            groups: vec![Arc::new(Group::new(Combinator::And))],
            combinators: Vec::new(),
        }
    }

    pub fn from_parts(groups: Vec<Arc<Group>>, combinators: Vec<Combinator>) -> Result<Self> {
        if combinators.len() + 1 != groups.len() && !(groups.is_empty() && combinators.is_empty()) {
            return Err(QueryError::ChainLength {
                groups: groups.len(),
                combinators: combinators.len(),
            });
        }
        Ok(Self {
            groups,
            combinators,
        })
    }

    /// Builds a query from groups, joining them all with `combinator`.
    pub fn from_groups(groups: impl IntoIterator<Item = Group>, combinator: Combinator) -> Self {
        let groups: Vec<_> = groups.into_iter().map(Arc::new).collect();
        let combinators = vec![combinator; groups.len().saturating_sub(1)];
        Self {
            groups,
            combinators,
        }
    }

    pub fn groups(&self) -> &[Arc<Group>] {
        &self.groups
    }

    pub fn group(&self, index: usize) -> Option<&Group> {
        self.groups.get(index).map(|g| g.as_ref())
    }

    pub fn combinators(&self) -> &[Combinator] {
        &self.combinators
    }

    /// Appends an empty `and` group, joined with `and` unless it is the first group.
    pub fn add_group(&self) -> Query {
        let mut next = self.clone();
        if !next.groups.is_empty() {
            next.combinators.push(Combinator::And);
        }
        next.groups.push(Arc::new(Group::new(Combinator::And)));
        next.check_chain();
        next
    }

    /// Removes group `index` along with the combinator that joined it to its predecessor
    /// (or to its successor, for the first group).
    pub fn delete_group(&self, index: usize) -> Result<Query> {
        self.check_group_index(index)?;
        let mut next = self.clone();
        next.groups.remove(index);
        if !next.combinators.is_empty() {
            next.combinators.remove(index.saturating_sub(1));
        }
        next.check_chain();
        Ok(next)
    }

    pub fn toggle_combinator(&self, index: usize) -> Result<Query> {
        let len = self.combinators.len();
        if index >= len {
            return Err(QueryError::CombinatorIndexOutOfRange { index, len });
        }
        let mut next = self.clone();
        next.combinators[index] = next.combinators[index].toggled();
        Ok(next)
    }

    /// Appends an incomplete rule to a top-level group.
    pub fn add_rule(&self, group_index: usize) -> Result<Query> {
        self.add_rule_in(group_index, &[])
    }

    /// Appends an incomplete rule to the group found at `path` inside a top-level group.
    pub fn add_rule_in(&self, group_index: usize, path: &[usize]) -> Result<Query> {
        self.edit_group(group_index, path, |g| g.rules.push(RuleNode::Rule(Rule::empty())))
    }

    /// Appends an empty `and` sub-group to the group found at `path`.
    pub fn add_subgroup(&self, group_index: usize, path: &[usize]) -> Result<Query> {
        self.edit_group(group_index, path, |g| {
            g.rules.push(RuleNode::Group(Group::new(Combinator::And)))
        })
    }

    /// Flips the combinator of a group (a top-level group when `path` is empty).
    pub fn toggle_group_combinator(&self, group_index: usize, path: &[usize]) -> Result<Query> {
        self.edit_group(group_index, path, |g| g.combinator = g.combinator.toggled())
    }

    /// Replaces the rule at `path`.
    pub fn update_rule(&self, group_index: usize, path: &[usize], rule: Rule) -> Result<Query> {
        self.edit_top(group_index, |group| match group.node_at_mut(path) {
            Some(RuleNode::Rule(existing)) => {
                *existing = rule;
                Ok(())
            }
            _ => Err(QueryError::RulePathInvalid(path.to_vec())),
        })
    }

    /// Removes the rule or group at `path`.
    pub fn remove_node(&self, group_index: usize, path: &[usize]) -> Result<Query> {
        let invalid = || QueryError::RulePathInvalid(path.to_vec());
        let (&last, parent) = path.split_last().ok_or_else(invalid)?;
        self.edit_top(group_index, |group| {
            let parent = group.group_at_mut(parent).ok_or_else(invalid)?;
            if last >= parent.rules.len() {
                return Err(invalid());
            }
            parent.rules.remove(last);
            Ok(())
        })
    }

    fn edit_group(
        &self,
        group_index: usize,
        path: &[usize],
        f: impl FnOnce(&mut Group),
    ) -> Result<Query> {
        self.edit_top(group_index, |group| {
            let target = group
                .group_at_mut(path)
                .ok_or_else(|| QueryError::RulePathInvalid(path.to_vec()))?;
            f(target);
            Ok(())
        })
    }

    // Copy-on-write: only the edited top-level group is cloned.
    fn edit_top(
        &self,
        group_index: usize,
        f: impl FnOnce(&mut Group) -> Result<()>,
    ) -> Result<Query> {
        self.check_group_index(group_index)?;
        let mut next = self.clone();
        f(Arc::make_mut(&mut next.groups[group_index]))?;
        Ok(next)
    }

    fn check_group_index(&self, index: usize) -> Result<()> {
        if index >= self.groups.len() {
            return Err(QueryError::GroupIndexOutOfRange {
                index,
                len: self.groups.len(),
            });
        }
        Ok(())
    }

    fn check_chain(&self) {
        debug_assert!(
            self.combinators.len() + 1 == self.groups.len()
                || (self.groups.is_empty() && self.combinators.is_empty()),
            "combinator chain out of step with groups"
        );
    }
}
