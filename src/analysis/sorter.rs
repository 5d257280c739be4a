//! Orders a batch so every formula runs after the formulas producing its inputs.

use tracing::{debug, warn};

use crate::analysis::expr_info::ExprInfo;
use crate::analysis::graph::DependencyGraph;
use crate::error::AnalysisError;

/// Sort a batch topologically.
///
/// Assignments come first in dependency order, followed by every other formula
/// in input order. A batch without assignments is returned untouched.
pub fn sort(infos: Vec<ExprInfo>) -> Result<Vec<ExprInfo>, AnalysisError> {
    let dependency = DependencyGraph::build(&infos);
    if !dependency.has_assign() {
        return Ok(infos);
    }

    let order = dependency.graph().topological_order().map_err(|remaining| {
        let remaining: Vec<String> = remaining
            .into_iter()
            .map(|v| dependency.name_of(v).to_string())
            .collect();
        warn!(variables = ?remaining, "circular reference in formula batch");
        AnalysisError::CircularReference { remaining }
    })?;

    let mut emitted = vec![false; infos.len()];
    let mut positions = Vec::with_capacity(infos.len());
    for vertex in order {
        let Some((_, node)) = dependency.nodes().by_index(vertex) else {
            continue;
        };
        for &position in &node.formulas {
            if !emitted[position] {
                emitted[position] = true;
                positions.push(position);
            }
        }
    }
    // Assignments with no named target, such as `f(a).x = 1`, own no node.
    for (position, info) in infos.iter().enumerate() {
        if info.is_assign() && !emitted[position] {
            positions.push(position);
        }
    }
    for (position, info) in infos.iter().enumerate() {
        if !info.is_assign() {
            positions.push(position);
        }
    }

    debug!(
        formulas = infos.len(),
        vertices = dependency.graph().vertex_count(),
        edges = dependency.graph().edge_count(),
        "sorted formula batch"
    );

    let mut slots: Vec<Option<ExprInfo>> = infos.into_iter().map(Some).collect();
    Ok(positions
        .into_iter()
        .filter_map(|position| slots[position].take())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use pretty_assertions::assert_eq;

    fn infos(sources: &[&str]) -> Vec<ExprInfo> {
        sources
            .iter()
            .enumerate()
            .map(|(i, s)| ExprInfo::new(Parser::parse_source(s).unwrap(), i))
            .collect()
    }

    fn sorted_indexes(sources: &[&str]) -> Vec<usize> {
        sort(infos(sources))
            .unwrap()
            .iter()
            .map(ExprInfo::index)
            .collect()
    }

    #[test]
    fn test_producers_run_first() {
        assert_eq!(
            sorted_indexes(&["x = y = a + b * c", "a = m + n", "b = a * 2", "c = n + w + b"]),
            vec![1, 2, 3, 0]
        );
    }

    #[test]
    fn test_plain_formulas_follow_assignments() {
        assert_eq!(
            sorted_indexes(&[
                "b * 2 + 1",
                "a * b + c",
                "x = y = a + b * c",
                "a = m + n",
                "b = a * 2",
                "c = n + w + b",
            ]),
            vec![3, 4, 5, 2, 0, 1]
        );
    }

    #[test]
    fn test_batch_without_assignments_keeps_order() {
        assert_eq!(sorted_indexes(&["c + 1", "a", "b * 2"]), vec![0, 1, 2]);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let err = sort(infos(&["a = b", "b = a"])).unwrap_err();
        match err {
            AnalysisError::CircularReference { remaining } => {
                assert_eq!(remaining, vec!["b".to_string(), "a".to_string()]);
            }
        }
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        assert!(sort(infos(&["a = a + 1"])).is_err());
    }

    #[test]
    fn test_formula_emitted_once() {
        let sorted = sort(infos(&["x = y = a", "z = x + y"])).unwrap();
        assert_eq!(sorted.len(), 2);
    }

    #[test]
    fn test_reader_of_secondary_target_runs_after_producer() {
        // `q` only reads `y`, the second target of the chained assignment.
        assert_eq!(
            sorted_indexes(&["q = y * 2", "x = y = a + 1", "a = 5"]),
            vec![2, 1, 0]
        );
    }
}
