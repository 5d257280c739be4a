//! Callable functions and the registry formulas look them up in.

pub mod builtins;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::value::Value;

pub const NUMBER_GROUP: &str = "number";
pub const SYSTEM_GROUP: &str = "system";

type NativeFn = dyn Fn(Vec<Value>) -> Result<Value, String> + Send + Sync;

/// A named function with a fixed arity.
#[derive(Clone)]
pub struct Callable {
    pub name: String,
    /// Display name shown to formula authors
    pub title: String,
    pub group: String,
    pub arity: usize,
    pub func: Arc<NativeFn>,
}

impl Callable {
    pub fn new<F>(name: impl Into<String>, arity: usize, func: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, String> + Send + Sync + 'static,
    {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            group: String::new(),
            arity,
            func: Arc::new(func),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn call(&self, arguments: Vec<Value>) -> Result<Value, String> {
        (self.func)(arguments)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callable({}/{})", self.name, self.arity)
    }
}

/// Functions available to formulas, keyed by name.
///
/// Lookups take a read lock, so a registry can be shared between threads and
/// still accept the occasional registration.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: RwLock<HashMap<String, Callable>>,
}

impl FunctionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding `abs` and `clock`.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        builtins::register_builtins(&registry);
        registry
    }

    /// Add a function, replacing any function with the same name.
    pub fn register(&self, callable: Callable) {
        self.write().insert(callable.name.clone(), callable);
    }

    pub fn lookup(&self, name: &str) -> Option<Callable> {
        self.read().get(name).cloned()
    }

    pub fn remove(&self, name: &str) -> Option<Callable> {
        self.write().remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // No function runs while the lock is held, so a poisoned map is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Callable>> {
        self.functions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Callable>> {
        self.functions.write().unwrap_or_else(PoisonError::into_inner)
    }
}
