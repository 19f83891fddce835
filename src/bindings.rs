//! Binding environment and trail for backtracking search.
//!
//! A [`BindingStack`] holds one frame of variable bindings (indexed by the
//! variable indices the parser assigned to a rule) plus a trail of saved
//! frames. Matching code follows a strict checkpoint discipline: `push`
//! before a speculative match, then `commit` on success or `unwind` on
//! failure. The unifier itself never unwinds — only the caller's
//! checkpoints do — so partial bindings from a failed sub-match stay
//! visible until the caller rolls them back.

use crate::symbol::{SymbolId, SymbolTable};
use crate::term::{ClauseEntry, Fact, Functor, Rule, Term, TriplePattern};

type Frame = Vec<Option<Term>>;

/// Variable binding frame with a checkpoint trail.
///
/// Frames are pooled: `unwind`/`commit` return retired buffers to a free
/// list so a long join over many facts allocates only during its first few
/// checkpoints.
#[derive(Debug, Default)]
pub struct BindingStack {
    env: Frame,
    trail: Vec<Frame>,
    pool: Vec<Frame>,
}

impl BindingStack {
    /// Create a frame with `num_vars` unbound slots.
    pub fn new(num_vars: usize) -> Self {
        Self {
            env: vec![None; num_vars],
            trail: Vec::new(),
            pool: Vec::new(),
        }
    }

    /// Clear to an empty, fully-unbound frame of the given size.
    ///
    /// Discards the trail; any outstanding checkpoints are forgotten.
    pub fn reset(&mut self, num_vars: usize) {
        self.env.clear();
        self.env.resize(num_vars, None);
        while let Some(frame) = self.trail.pop() {
            self.pool.push(frame);
        }
    }

    /// Number of variable slots in the current frame.
    pub fn num_vars(&self) -> usize {
        self.env.len()
    }

    /// Current checkpoint depth.
    pub fn depth(&self) -> usize {
        self.trail.len()
    }

    /// Save the current frame state onto the trail.
    pub fn push(&mut self) {
        let mut frame = self.pool.pop().unwrap_or_default();
        frame.clear();
        frame.extend(self.env.iter().cloned());
        self.trail.push(frame);
    }

    /// Restore the most recently pushed frame.
    ///
    /// Panics on an empty trail: unwinding without a matching push is a
    /// programming defect, not a recoverable condition.
    pub fn unwind(&mut self) {
        let frame = self.trail.pop().expect("trail underflow: unwind without matching push");
        let retired = std::mem::replace(&mut self.env, frame);
        self.pool.push(retired);
    }

    /// Keep the current frame and discard the saved-but-stale one,
    /// collapsing two checkpoint levels into one.
    ///
    /// Panics on an empty trail, like [`BindingStack::unwind`].
    pub fn commit(&mut self) {
        let frame = self.trail.pop().expect("trail underflow: commit without matching push");
        self.pool.push(frame);
    }

    /// Bind a slot, or check consistency if it is already bound.
    ///
    /// Returns `false` without mutating anything when the slot holds a
    /// different value.
    pub fn bind(&mut self, index: usize, value: Term) -> bool {
        debug_assert!(!matches!(value, Term::Wildcard), "wildcards never bind");
        match &self.env[index] {
            None => {
                self.env[index] = Some(value);
                true
            }
            Some(existing) => *existing == value,
        }
    }

    /// The raw binding of a slot, if any.
    pub fn get(&self, index: usize) -> Option<&Term> {
        self.env.get(index).and_then(|slot| slot.as_ref())
    }

    /// Resolve a term through the current bindings.
    ///
    /// Variable chains (a variable bound to another variable) are chased;
    /// the result may still contain unbound variables. Terms are acyclic,
    /// so no occurs-check is needed.
    pub fn resolve(&self, term: &Term) -> Term {
        match term {
            Term::Var(i) => match self.get(*i) {
                Some(bound) => self.resolve(bound),
                None => term.clone(),
            },
            Term::Functor(f) => Term::Functor(Functor {
                name: f.name,
                args: f.args.iter().map(|a| self.resolve(a)).collect(),
            }),
            other => other.clone(),
        }
    }

    /// Resolve a term all the way to a constant, if its chain ends in one.
    pub fn ground_const(&self, term: &Term) -> Option<SymbolId> {
        match self.resolve(term) {
            Term::Const(id) => Some(id),
            _ => None,
        }
    }

    /// Instantiate a pattern into a ground fact.
    ///
    /// Unbound variables and wildcards become fresh existential blanks; a
    /// variable appearing in several positions receives the same blank
    /// within one call.
    pub fn instantiate(&self, pattern: &TriplePattern, symbols: &SymbolTable) -> Fact {
        let mut fresh: Vec<(usize, SymbolId)> = Vec::new();
        let mut ground = |term: &Term| -> SymbolId {
            match self.resolve(term) {
                Term::Const(id) => id,
                Term::Var(i) => {
                    if let Some((_, id)) = fresh.iter().find(|(v, _)| *v == i) {
                        *id
                    } else {
                        let id = symbols.fresh_blank();
                        fresh.push((i, id));
                        id
                    }
                }
                // Wildcards and residual functors have no fact-level
                // representation; mint an existential stand-in.
                _ => symbols.fresh_blank(),
            }
        };
        Fact::new(
            ground(&pattern.subject),
            ground(&pattern.predicate),
            ground(&pattern.object),
        )
    }

    /// Substitute the current bindings into a rule, leaving unbound
    /// variables in place.
    ///
    /// This is how the hybrid coordinator scopes a nested backward rule to
    /// the bindings of the forward firing that spawned it.
    pub fn instantiate_rule(&self, rule: &Rule) -> Rule {
        let subst_clause = |clause: &ClauseEntry| -> ClauseEntry {
            match clause {
                ClauseEntry::Pattern(p) => ClauseEntry::Pattern(TriplePattern {
                    subject: self.resolve(&p.subject),
                    predicate: self.resolve(&p.predicate),
                    object: self.resolve(&p.object),
                }),
                ClauseEntry::Call(f) => ClauseEntry::Call(Functor {
                    name: f.name,
                    args: f.args.iter().map(|a| self.resolve(a)).collect(),
                }),
                ClauseEntry::NestedRule(r) => ClauseEntry::NestedRule(Box::new(self.instantiate_rule(r))),
            }
        };
        let head: Vec<ClauseEntry> = rule.head.iter().map(subst_clause).collect();
        let body: Vec<ClauseEntry> = rule.body.iter().map(subst_clause).collect();
        let num_vars = rule.num_vars;
        Rule {
            name: rule.name.clone(),
            head,
            body,
            backward: rule.backward,
            num_vars,
        }
    }

    /// Snapshot the frame contents (test support and network tokens).
    pub fn snapshot(&self) -> Vec<Option<Term>> {
        self.env.clone()
    }
}
