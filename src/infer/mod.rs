//! Inference engines: shared state, rule arena, and chaining modes.
//!
//! The submodules implement the three engines — [`forward`] (naive
//! closure), [`network`] (incremental RETE-style propagation), and
//! [`backward`] (goal-directed tabled resolution). They all operate on an
//! [`InferState`]: the rule arena, the layered fact stores, the builtin
//! registry, the derivation log, and the bounded-work counters.

pub mod backward;
pub mod forward;
pub mod network;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::builtins::BuiltinRegistry;
use crate::derivation::DerivationLog;
use crate::error::{EngineError, HekaResult};
use crate::store::{FactQuery, Finder, MemFactStore, UnionFinder};
use crate::symbol::{SymbolId, SymbolTable};
use crate::term::{Fact, Rule};

/// Chaining strategy for an inference context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    /// Eager closure only; queries read raw + derived facts.
    Forward,
    /// Goal-directed only; no closure is computed up front.
    Backward,
    /// Forward closure whose firings may synthesize backward rules,
    /// then goal-directed resolution over the live rule union.
    #[default]
    Hybrid,
}

// ---------------------------------------------------------------------------
// Rule arena
// ---------------------------------------------------------------------------

/// Handle into a [`RuleArena`].
///
/// Rules, synthesized rules, table entries and derivations reference each
/// other by these integer handles, so cyclic rule graphs need no
/// ownership cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleId(pub usize);

/// Arena of rules with structural deduplication.
///
/// Registration is idempotent: adding a rule structurally equal to an
/// existing one returns the existing handle. The hybrid coordinator
/// relies on this to avoid re-registering a synthesized backward rule for
/// bindings already seen.
#[derive(Debug, Clone, Default)]
pub struct RuleArena {
    rules: Vec<Rule>,
    index: HashMap<Rule, RuleId>,
}

impl RuleArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule, returning its handle and whether it was new.
    pub fn add(&mut self, rule: Rule) -> (RuleId, bool) {
        if let Some(&id) = self.index.get(&rule) {
            return (id, false);
        }
        let id = RuleId(self.rules.len());
        self.index.insert(rule.clone(), id);
        self.rules.push(rule);
        (id, true)
    }

    pub fn get(&self, id: RuleId) -> &Rule {
        &self.rules[id.0]
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RuleId, &Rule)> {
        self.rules.iter().enumerate().map(|(i, r)| (RuleId(i), r))
    }

    /// Backward rules only (static plus synthesized).
    pub fn backward(&self) -> impl Iterator<Item = (RuleId, &Rule)> {
        self.iter().filter(|(_, r)| r.backward)
    }

    /// Forward rules only.
    pub fn forward(&self) -> impl Iterator<Item = (RuleId, &Rule)> {
        self.iter().filter(|(_, r)| !r.backward)
    }
}

// ---------------------------------------------------------------------------
// Shared engine state
// ---------------------------------------------------------------------------

/// Mutable state shared by the engines of one inference context.
///
/// Strictly sequential: a context runs one resolution at a time, so no
/// interior locking is needed. The optional preload store is shared
/// read-only between contexts built from the same reasoner.
pub struct InferState {
    pub symbols: Arc<SymbolTable>,
    pub registry: Arc<BuiltinRegistry>,
    pub rules: RuleArena,
    /// Shared, immutable axiom closure (never mutated after construction).
    pub preload: Option<Arc<MemFactStore>>,
    /// Context-private asserted facts.
    pub base: MemFactStore,
    /// Context-private forward deductions.
    pub deductions: MemFactStore,
    pub derivations: DerivationLog,
    pub record_derivations: bool,
    pub trace: bool,
    /// Predicates the backward engine tables.
    pub tabled: HashSet<SymbolId>,
    /// Table every predicate (set by the `tableAll` head action).
    pub table_all: bool,
    pub rules_fired: u64,
    pub rules_triggered: u64,
    pub firing_limit: u64,
    /// `makeInstance` determinism cache: (subject, property, class) → blank.
    pub instance_cache: HashMap<(SymbolId, SymbolId, SymbolId), SymbolId>,
}

impl InferState {
    pub fn new(symbols: Arc<SymbolTable>, registry: Arc<BuiltinRegistry>) -> Self {
        Self {
            symbols,
            registry,
            rules: RuleArena::new(),
            preload: None,
            base: MemFactStore::new(),
            deductions: MemFactStore::new(),
            derivations: DerivationLog::new(),
            record_derivations: false,
            trace: false,
            tabled: HashSet::new(),
            table_all: false,
            rules_fired: 0,
            rules_triggered: 0,
            firing_limit: u64::MAX,
            instance_cache: HashMap::new(),
        }
    }

    /// All facts visible to the engines matching a query: preload, base,
    /// then deductions, deduplicated.
    pub fn find(&self, query: &FactQuery) -> Vec<Fact> {
        let mut parts: Vec<&dyn Finder> = Vec::with_capacity(3);
        if let Some(preload) = &self.preload {
            parts.push(preload.as_ref());
        }
        parts.push(&self.base);
        parts.push(&self.deductions);
        UnionFinder::new(parts).find(query)
    }

    /// Membership across all layers.
    pub fn contains(&self, fact: &Fact) -> bool {
        self.preload.as_ref().is_some_and(|p| p.contains(fact))
            || self.base.contains(fact)
            || self.deductions.contains(fact)
    }

    /// Record one rule firing against the bounded-work threshold.
    pub fn count_firing(&mut self) -> HekaResult<()> {
        self.rules_fired += 1;
        if self.rules_fired > self.firing_limit {
            return Err(EngineError::FiringLimitExceeded {
                limit: self.firing_limit,
            }
            .into());
        }
        Ok(())
    }

    /// Register a synthesized (or static) backward rule. Idempotent.
    /// Returns the handle and whether registration was new.
    pub fn add_backward_rule(&mut self, rule: Rule) -> (RuleId, bool) {
        debug_assert!(rule.backward);
        let label = rule.label().to_string();
        let (id, fresh) = self.rules.add(rule);
        if fresh {
            debug!(rule = %label, id = id.0, "registered backward rule");
        }
        (id, fresh)
    }

    /// Whether the backward engine should table goals on this predicate.
    pub fn is_tabled(&self, predicate: SymbolId) -> bool {
        self.table_all || self.tabled.contains(&predicate)
    }
}
