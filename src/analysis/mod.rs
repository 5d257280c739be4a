//! Dependency analysis of formula batches.
//!
//! Each formula is reduced to the variables it reads and writes. Batches that
//! contain assignments are ordered through a variable graph so that producers
//! run before their readers.

pub mod expr_info;
pub mod graph;
pub mod sorter;
pub mod variables;

pub use expr_info::ExprInfo;
pub use graph::{DependencyGraph, Digraph, Node, NodeSet};
pub use sorter::sort;
pub use variables::{analyze, property_path, VariableSet};
