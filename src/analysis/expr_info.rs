use std::collections::BTreeSet;

use crate::analysis::variables::{analyze, VariableSet};
use crate::ast::Expr;

/// A parsed formula together with its batch index and variable sets.
///
/// `index` is the formula's position in the caller's input and never changes,
/// so results can be put back in place after the batch is reordered.
#[derive(Debug, Clone)]
pub struct ExprInfo {
    expr: Expr,
    index: usize,
    variables: VariableSet,
}

impl ExprInfo {
    pub fn new(expr: Expr, index: usize) -> Self {
        let variables = analyze(&expr);
        Self {
            expr,
            index,
            variables,
        }
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn variables(&self) -> &VariableSet {
        &self.variables
    }

    /// Variables read by the formula.
    pub fn precursors(&self) -> &BTreeSet<String> {
        self.variables.depends()
    }

    /// Variables written by the formula.
    pub fn successors(&self) -> &BTreeSet<String> {
        self.variables.assigns()
    }

    pub fn is_assign(&self) -> bool {
        self.expr.is_assign()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    #[test]
    fn test_info_keeps_index_and_sets() {
        let info = ExprInfo::new(Parser::parse_source("x = a + b").unwrap(), 3);
        assert_eq!(info.index(), 3);
        assert!(info.is_assign());
        assert_eq!(
            info.precursors().iter().cloned().collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        assert!(info.successors().contains("x"));
    }

    #[test]
    fn test_plain_formula_is_not_assign() {
        let info = ExprInfo::new(Parser::parse_source("a > 1").unwrap(), 0);
        assert!(!info.is_assign());
        assert!(info.successors().is_empty());
    }
}
