//! Condition compiler.
//!
//! Turns the `where` list of a [`Filter`](super::Filter) into a [`CompiledWhere`]:
//!
//! 1. Conditions without alternatives are merged into one shared AND-group.
//! 2. Every condition carrying `or` becomes an OR group: the condition itself,
//!    followed by the compiled groups of each alternative.
//! 3. The result is the shared group combined with one alternative from each
//!    OR group, for every combination.
//!
//! `n` OR-bearing conditions with `k` alternatives each therefore compile to
//! `k^n` groups. An empty list compiles to "match all".

use serde_json::Value;

use super::{
    Comparison, CompiledWhere, Condition, ConditionValue, FieldPath, Operator, Predicate,
    WhereGroup, normalize_datetime,
};

/// Which operator set a compiler accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Vocabulary {
    Standard,
    Permission,
}

/// Compile a `where` list with the cartesian OR strategy.
#[must_use]
pub fn compile_where(conditions: &[Condition]) -> CompiledWhere {
    let groups = compile_groups(conditions);
    tracing::debug!(
        conditions = conditions.len(),
        groups = groups.len(),
        "Compiled filter conditions"
    );
    CompiledWhere { groups }
}

fn compile_groups(conditions: &[Condition]) -> Vec<WhereGroup> {
    if conditions.is_empty() {
        return Vec::new();
    }

    let (plain, branching): (Vec<&Condition>, Vec<&Condition>) =
        conditions.iter().partition(|c| c.or.is_empty());

    let mut main = WhereGroup::new();
    for condition in plain {
        let (field, predicate) = compile_condition(condition, Vocabulary::Standard);
        main.insert(field, predicate);
    }

    let mut groups = vec![main];
    for alternatives in branching.into_iter().map(or_group) {
        groups = groups
            .iter()
            .flat_map(|partial| alternatives.iter().map(move |alt| partial.merged(alt)))
            .collect();
    }
    groups
}

/// The alternatives contributed by one OR-bearing condition.
fn or_group(condition: &Condition) -> Vec<WhereGroup> {
    let mut alternatives = Vec::with_capacity(condition.or.len() + 1);

    let (field, predicate) = compile_condition(condition, Vocabulary::Standard);
    let mut own = WhereGroup::new();
    own.insert(field, predicate);
    alternatives.push(own);

    for alternative in &condition.or {
        alternatives.extend(compile_groups(std::slice::from_ref(alternative)));
    }
    alternatives
}

/// Compile one condition, ignoring its alternatives.
///
/// Returns the key it is stored under in a [`WhereGroup`]: the column, the JSON
/// column, or the first relation of a dot path.
pub(crate) fn compile_condition(condition: &Condition, vocabulary: Vocabulary) -> (String, Predicate) {
    let operator = match (condition.operator, vocabulary) {
        (Operator::JsonContains, Vocabulary::Standard) => {
            tracing::warn!(field = %condition.by, "jsonContains is only supported for permission queries, using '='");
            Operator::Eq
        }
        (operator, _) => operator,
    };
    let comparison = normalize(operator, &condition.value);

    match &condition.by {
        FieldPath::Field(name) => (name.clone(), Predicate::Compare(comparison)),
        FieldPath::Json { field, pointer } => (
            field.clone(),
            Predicate::Json {
                pointer: pointer.clone(),
                comparison,
            },
        ),
        FieldPath::Relation(segments) => nest(segments, Predicate::Compare(comparison)),
    }
}

/// Wrap `leaf` in one relation group per path segment: `a.b.c` becomes
/// `a: { b: { c: leaf } }`.
fn nest(segments: &[String], leaf: Predicate) -> (String, Predicate) {
    let Some((column, relations)) = segments.split_last() else {
        return (String::new(), leaf);
    };

    let mut key = column.clone();
    let mut predicate = leaf;
    for relation in relations.iter().rev() {
        let mut group = WhereGroup::new();
        group.insert(key, predicate);
        predicate = Predicate::Relation(group);
        key = relation.clone();
    }
    (key, predicate)
}

fn normalize(operator: Operator, value: &ConditionValue) -> Comparison {
    let value = match (operator, value) {
        (op, ConditionValue::Scalar(v)) if op.is_pattern() => {
            ConditionValue::Scalar(Value::String(format!("%{}%", scalar_text(v))))
        }
        (Operator::Between, ConditionValue::Range(low, high)) => {
            ConditionValue::Range(normalize_bound(low), normalize_bound(high))
        }
        (_, v) => v.clone(),
    };

    let operator = match (operator, &value) {
        (Operator::Eq, ConditionValue::Null) => Operator::IsNull,
        (Operator::Ne | Operator::Not, ConditionValue::Null) => Operator::IsNotNull,
        (op, _) => op,
    };

    Comparison { operator, value }
}

fn normalize_bound(bound: &Value) -> Value {
    match bound {
        Value::String(s) => normalize_datetime(s).map_or_else(|| bound.clone(), Value::String),
        other => other.clone(),
    }
}

pub(crate) fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
