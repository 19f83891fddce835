//! Builtin registry and evaluation context.
//!
//! Builtins are the procedural escape hatch of the rule language: in a
//! rule body a call such as `lessThan(?x, 5)` acts as a guard, in a head
//! it acts as a side effect (`table(p)`, `print(?x)`). Each builtin is a
//! [`Builtin`] trait object registered by name in a [`BuiltinRegistry`];
//! contexts share one registry through an `Arc` rather than a process
//! global, so tests can run isolated registries side by side.

pub mod library;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::bindings::BindingStack;
use crate::error::BuiltinError;
use crate::symbol::{SymbolId, SymbolTable};
use crate::term::Term;

/// What a builtin invocation may read and mutate.
///
/// Engines assemble this from split borrows of their state right before
/// dispatch, so a builtin can bind variables, consult the symbol table,
/// and (as a head action) adjust tabling or the instance cache without
/// the builtin ever seeing the engine itself.
pub struct BuiltinContext<'a> {
    pub env: &'a mut BindingStack,
    pub symbols: &'a SymbolTable,
    /// Label of the rule being evaluated, for diagnostics.
    pub rule: &'a str,
    /// Index of the clause within the rule, for diagnostics.
    pub clause: usize,
    /// Predicates the backward engine tables; `table` head actions add here.
    pub tabled: &'a mut HashSet<SymbolId>,
    /// Set by the `tableAll` head action.
    pub table_all: &'a mut bool,
    /// Deterministic blanks minted by `makeInstance`, keyed by
    /// (subject, property, class).
    pub instance_cache: &'a mut HashMap<(SymbolId, SymbolId, SymbolId), SymbolId>,
}

impl BuiltinContext<'_> {
    /// A `Failed` error carrying the invocation site.
    pub fn fail(&self, name: &str, message: impl Into<String>) -> BuiltinError {
        BuiltinError::Failed {
            name: name.to_string(),
            rule: self.rule.to_string(),
            clause: self.clause,
            message: message.into(),
        }
    }
}

/// One named builtin.
///
/// `eval` runs the builtin as a body guard and reports success or
/// failure; `head_action` runs it as a head side effect. Most builtins
/// implement only one of the two — the defaults make a body-only builtin
/// reject head use and vice versa.
pub trait Builtin: Send + Sync {
    fn name(&self) -> &'static str;

    /// Evaluate as a body guard. `Ok(false)` is ordinary match failure;
    /// `Err` aborts the run with a diagnostic.
    fn eval(&self, args: &[Term], ctx: &mut BuiltinContext<'_>) -> Result<bool, BuiltinError> {
        let _ = args;
        Err(BuiltinError::UndefinedAction {
            name: self.name().to_string(),
            rule: ctx.rule.to_string(),
        })
    }

    /// Execute as a head action after the rule body matched.
    fn head_action(&self, args: &[Term], ctx: &mut BuiltinContext<'_>) -> Result<(), BuiltinError> {
        let _ = args;
        Err(BuiltinError::UndefinedAction {
            name: self.name().to_string(),
            rule: ctx.rule.to_string(),
        })
    }
}

/// Arity guard shared by the library implementations.
pub(crate) fn check_arity(name: &str, args: &[Term], expected: usize) -> Result<(), BuiltinError> {
    if args.len() != expected {
        return Err(BuiltinError::Arity {
            name: name.to_string(),
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

/// Name-indexed set of builtins shared by the engines of a context.
#[derive(Default)]
pub struct BuiltinRegistry {
    by_name: HashMap<&'static str, Arc<dyn Builtin>>,
}

impl BuiltinRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry with the standard library installed.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        library::install(&mut registry);
        registry
    }

    /// Register a builtin under its own name, replacing any previous one.
    pub fn register(&mut self, builtin: Arc<dyn Builtin>) {
        self.by_name.insert(builtin.name(), builtin);
    }

    pub fn lookup(&self, name: &str) -> Option<&Arc<dyn Builtin>> {
        self.by_name.get(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl std::fmt::Debug for BuiltinRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.by_name.keys().collect();
        names.sort();
        f.debug_struct("BuiltinRegistry").field("names", &names).finish()
    }
}
