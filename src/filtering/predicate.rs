//! Compiled predicate structure.
//!
//! A [`CompiledWhere`] is a disjunction of [`WhereGroup`]s. Each group is a
//! conjunction keyed by logical field name, where a relation key holds a nested
//! group evaluated against the related record:
//!
//! ```text
//! [ { age: {>=: 18}, profile: { city: {=: "Oslo"} } },
//!   { age: {>=: 18}, name: {=: "root"} } ]
//! ```
//!
//! The structure is backend independent; [`super::lowering`] turns it into a
//! `sea_orm::Condition`.

use serde_json::{Map, Value};

use super::{ConditionValue, Operator};

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub operator: Operator,
    pub value: ConditionValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Compare the column itself
    Compare(Comparison),
    /// Compare the scalar found at `pointer` inside a JSON column
    Json { pointer: String, comparison: Comparison },
    /// Conditions on a related record
    Relation(WhereGroup),
}

/// A conjunction of predicates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereGroup {
    entries: Vec<(String, Predicate)>,
}

impl WhereGroup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predicate. Relation predicates on a relation already present are
    /// merged into the existing nested group.
    pub fn insert(&mut self, field: String, predicate: Predicate) {
        if let Predicate::Relation(inner) = predicate {
            let existing = self
                .entries
                .iter_mut()
                .find(|(f, p)| *f == field && matches!(p, Predicate::Relation(_)));
            if let Some((_, Predicate::Relation(group))) = existing {
                group.extend(inner);
            } else {
                self.entries.push((field, Predicate::Relation(inner)));
            }
            return;
        }
        self.entries.push((field, predicate));
    }

    pub fn extend(&mut self, other: WhereGroup) {
        for (field, predicate) in other.entries {
            self.insert(field, predicate);
        }
    }

    /// A new group holding this group's predicates followed by `other`'s.
    #[must_use]
    pub fn merged(&self, other: &WhereGroup) -> WhereGroup {
        let mut group = self.clone();
        group.extend(other.clone());
        group
    }

    /// The first predicate registered for `field`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Predicate> {
        self.entries.iter().find(|(f, _)| f == field).map(|(_, p)| p)
    }

    #[must_use]
    pub fn entries(&self) -> &[(String, Predicate)] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render as a nested JSON object, mostly useful for logs and tests.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (field, predicate) in &self.entries {
            let rendered = match predicate {
                Predicate::Compare(comparison) => comparison_json(comparison),
                Predicate::Json { pointer, comparison } => {
                    let mut inner = Map::new();
                    inner.insert(pointer.clone(), comparison_json(comparison));
                    Value::Object(inner)
                }
                Predicate::Relation(group) => group.to_json(),
            };
            merge_json(&mut map, field, rendered);
        }
        Value::Object(map)
    }
}

fn comparison_json(comparison: &Comparison) -> Value {
    let mut map = Map::new();
    map.insert(
        comparison.operator.token().to_string(),
        comparison.value.clone().into(),
    );
    Value::Object(map)
}

fn merge_json(map: &mut Map<String, Value>, field: &str, rendered: Value) {
    if let (Some(Value::Object(existing)), Value::Object(incoming)) = (map.get_mut(field), &rendered) {
        for (key, value) in incoming {
            merge_json(existing, key, value.clone());
        }
        return;
    }
    map.insert(field.to_string(), rendered);
}

/// OR of AND-groups. No groups means no filtering at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledWhere {
    pub groups: Vec<WhereGroup>,
}

impl CompiledWhere {
    #[must_use]
    pub fn match_all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_match_all(&self) -> bool {
        self.groups.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Array(self.groups.iter().map(WhereGroup::to_json).collect())
    }
}
