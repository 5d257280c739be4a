//! Read/write variable sets of a formula.

use std::collections::BTreeSet;
use std::fmt;

use crate::ast::{Expr, ExprKind};

/// Variables a formula reads (`depends`) and writes (`assigns`).
///
/// Property paths are stored dotted, so `A.B.c` is one entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableSet {
    depends: BTreeSet<String>,
    assigns: BTreeSet<String>,
}

impl VariableSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depends(&self) -> &BTreeSet<String> {
        &self.depends
    }

    pub fn assigns(&self) -> &BTreeSet<String> {
        &self.assigns
    }

    pub fn add_depend(&mut self, name: impl Into<String>) {
        self.depends.insert(name.into());
    }

    pub fn add_assign(&mut self, name: impl Into<String>) {
        self.assigns.insert(name.into());
    }

    /// Merge another set into this one.
    pub fn union(&mut self, other: VariableSet) {
        self.depends.extend(other.depends);
        self.assigns.extend(other.assigns);
    }

    pub fn is_empty(&self) -> bool {
        self.depends.is_empty() && self.assigns.is_empty()
    }
}

impl fmt::Display for VariableSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let assigns: Vec<&str> = self.assigns.iter().map(String::as_str).collect();
        let depends: Vec<&str> = self.depends.iter().map(String::as_str).collect();
        write!(f, "{} = {}", assigns.join(","), depends.join(","))
    }
}

/// Walk a formula and compute the variables it reads and writes.
///
/// Function names are not variables, so `abs(x)` only depends on `x`.
pub fn analyze(expr: &Expr) -> VariableSet {
    match &expr.kind {
        ExprKind::Literal(_) => VariableSet::new(),

        ExprKind::Identifier(name) => {
            let mut set = VariableSet::new();
            set.add_depend(name.as_str());
            set
        }

        ExprKind::Unary { operand, .. } => analyze(operand),

        ExprKind::Binary { left, right, .. } | ExprKind::Logic { left, right, .. } => {
            let mut set = analyze(left);
            set.union(analyze(right));
            set
        }

        ExprKind::Assign { target, value } => {
            let mut set = VariableSet::new();
            match &target.kind {
                ExprKind::Identifier(name) => set.add_assign(name.as_str()),
                _ => {
                    // Whatever the target reads is what gets written.
                    let target_vars = analyze(target);
                    set.assigns.extend(target_vars.depends);
                    set.assigns.extend(target_vars.assigns);
                }
            }
            set.union(analyze(value));
            set
        }

        ExprKind::Call { arguments, .. } => {
            let mut set = VariableSet::new();
            for argument in arguments {
                set.union(analyze(argument));
            }
            set
        }

        ExprKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            let mut set = analyze(condition);
            set.union(analyze(then_branch));
            if let Some(else_branch) = else_branch {
                set.union(analyze(else_branch));
            }
            set
        }

        ExprKind::Get { object, name } => {
            let mut set = VariableSet::new();
            match property_path(object, name) {
                Some(path) => set.add_depend(path),
                None => set.union(analyze(object)),
            }
            set
        }

        ExprKind::Set {
            object,
            name,
            value,
        } => {
            let mut set = VariableSet::new();
            match property_path(object, name) {
                Some(path) => set.add_assign(path),
                None => set.union(analyze(object)),
            }
            set.union(analyze(value));
            set
        }
    }
}

/// Dotted path of `object.name` when the object is a chain of identifiers.
pub fn property_path(object: &Expr, name: &str) -> Option<String> {
    let mut segments = vec![name];
    let mut current = object;
    loop {
        match &current.kind {
            ExprKind::Identifier(root) => {
                segments.push(root);
                break;
            }
            ExprKind::Get { object, name } => {
                segments.push(name);
                current = object;
            }
            _ => return None,
        }
    }
    segments.reverse();
    Some(segments.join("."))
}
