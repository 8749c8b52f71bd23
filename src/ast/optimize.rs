use super::condition::{CompoundCondition, Condition};

/// Combine `conditions` under `operator`, producing the smallest equivalent node.
///
/// A single condition is returned as is. Otherwise every child that is a compound
/// with the same operator is spliced into the result, recursively, so nested
/// groups like `and(and(a, b), c)` become `and(a, b, c)`. Compounds with a different
/// operator are kept intact to preserve precedence.
pub fn optimized_compound(operator: &str, mut conditions: Vec<Condition>) -> Condition {
    if conditions.len() == 1
        && let Some(only) = conditions.pop()
    {
        return only;
    }

    let mut node = CompoundCondition::new(operator, Vec::with_capacity(conditions.len()));
    flatten_into(operator, conditions, &mut node);
    Condition::Compound(node)
}

fn flatten_into(operator: &str, conditions: Vec<Condition>, node: &mut CompoundCondition) {
    for condition in conditions {
        match condition {
            Condition::Compound(inner) if inner.operator() == operator => {
                flatten_into(operator, inner.into_children(), node);
            }
            other => node.push(other),
        }
    }
}

pub fn and(conditions: Vec<Condition>) -> Condition {
    optimized_compound("and", conditions)
}

pub fn or(conditions: Vec<Condition>) -> Condition {
    optimized_compound("or", conditions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::FieldCondition;

    fn child() -> Condition {
        FieldCondition::new("eq", "x", 1).into()
    }

    #[test]
    fn single_condition_is_returned_unchanged() {
        assert_eq!(optimized_compound("and", vec![child()]), child());
    }

    #[test]
    fn single_compound_of_other_operator_is_not_wrapped() {
        let inner: Condition = CompoundCondition::new("or", vec![child(), child()]).into();
        assert_eq!(and(vec![inner.clone()]), inner);
    }

    #[test]
    fn empty_list_builds_empty_compound() {
        assert_eq!(and(vec![]), Condition::Compound(CompoundCondition::new("and", vec![])));
    }

    #[test]
    fn flattens_later_siblings_too() {
        let nested: Condition = CompoundCondition::new("and", vec![child(), child()]).into();
        let ast = and(vec![child(), nested]);
        assert_eq!(ast, CompoundCondition::new("and", vec![child(), child(), child()]).into());
    }
}
