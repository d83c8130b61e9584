//! Condition compiler for permission-style queries.
//!
//! Differs from [`compile_where`](super::compile_where) in two ways:
//!
//! - each OR-bearing condition contributes its alternatives as a flat list
//!   (nested `or` inside an alternative is ignored), and every alternative is
//!   merged with the shared AND-group; alternatives of different conditions
//!   are concatenated, not multiplied
//! - the `jsonContains` operator is honoured
//!
//! Both strategies are kept on purpose: permission checks and listing queries
//! have been observed to rely on their respective semantics.

use super::conditions::{Vocabulary, compile_condition};
use super::{CompiledWhere, Condition, WhereGroup};

#[must_use]
pub fn compile_permission_where(conditions: &[Condition]) -> CompiledWhere {
    if conditions.is_empty() {
        return CompiledWhere::match_all();
    }

    let (plain, branching): (Vec<&Condition>, Vec<&Condition>) =
        conditions.iter().partition(|c| c.or.is_empty());

    let mut main = WhereGroup::new();
    for condition in plain {
        let (field, predicate) = compile_condition(condition, Vocabulary::Permission);
        main.insert(field, predicate);
    }

    if branching.is_empty() {
        return CompiledWhere { groups: vec![main] };
    }

    let mut groups = Vec::new();
    for condition in branching {
        for alternative in std::iter::once(condition).chain(condition.or.iter()) {
            if !std::ptr::eq(alternative, condition) && !alternative.or.is_empty() {
                tracing::debug!(field = %alternative.by, "Nested alternatives are ignored in permission queries");
            }
            let (field, predicate) = compile_condition(alternative, Vocabulary::Permission);
            let mut group = main.clone();
            group.insert(field, predicate);
            groups.push(group);
        }
    }

    tracing::debug!(groups = groups.len(), "Compiled permission conditions");
    CompiledWhere { groups }
}
