//! Naive forward-chaining engine.
//!
//! Computes the closure of the forward rules by agenda: every fact added
//! (asserted or derived) is matched against a clause index keyed by
//! predicate, and each triggered rule body is completed by a recursive
//! join that always extends the most-bound remaining clause first. Guards
//! run after the patterns; a satisfied body fires the head, which may
//! assert deductions, run head actions, or register nested backward
//! rules scoped to the firing's bindings.
//!
//! Retraction is handled by full recomputation — correct and simple; the
//! incremental network engine exists for workloads where that is too
//! expensive.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::bindings::BindingStack;
use crate::builtins::BuiltinContext;
use crate::derivation::Derivation;
use crate::error::{BuiltinError, HekaResult};
use crate::store::{FactQuery, FactStore};
use crate::symbol::SymbolId;
use crate::term::{ClauseEntry, Fact, Functor, Rule, Term, TriplePattern};
use crate::unify::match_fact;

use super::{InferState, RuleId};

/// Weights for ordering body clauses by boundness. Subject and object
/// discriminate more than predicate in typical rule sets.
const SUBJECT_WEIGHT: u32 = 3;
const PREDICATE_WEIGHT: u32 = 2;
const OBJECT_WEIGHT: u32 = 3;

/// The naive forward engine. Holds only the compiled clause index; all
/// mutable inference state lives in [`InferState`].
#[derive(Debug, Default)]
pub struct ForwardEngine {
    /// Body pattern predicate (`None` for variable/wildcard predicates)
    /// to the (rule, body clause) pairs it can trigger.
    clause_index: HashMap<Option<SymbolId>, Vec<(RuleId, usize)>>,
}

impl ForwardEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the clause index from the current forward rules.
    pub fn compile(&mut self, state: &InferState) {
        self.clause_index.clear();
        for (rule_id, rule) in state.rules.forward() {
            for (clause_idx, pattern) in rule.body_patterns() {
                let key = pattern.predicate.as_const();
                self.clause_index
                    .entry(key)
                    .or_default()
                    .push((rule_id, clause_idx));
            }
        }
    }

    /// Recompute the deduction closure from scratch: clear previous
    /// deductions, fire axioms, then run every current fact through the
    /// agenda.
    pub fn run(&mut self, state: &mut InferState) -> HekaResult<()> {
        state.deductions.clear();
        state.derivations.clear();
        state.rules_fired = 0;

        let mut agenda: VecDeque<Fact> = VecDeque::new();

        let axioms: Vec<(RuleId, Rule)> = state
            .rules
            .forward()
            .filter(|(_, r)| r.is_axiom())
            .map(|(id, r)| (id, r.clone()))
            .collect();
        for (rule_id, rule) in axioms {
            let mut env = BindingStack::new(rule.num_vars);
            self.fire(state, &rule, rule_id, &mut env, &[], &mut agenda)?;
        }

        // Without variable-predicate clauses, a fact whose predicate no
        // rule body mentions can never trigger anything; skip seeding it.
        let selective = !self.clause_index.contains_key(&None);
        {
            let relevant =
                |f: &Fact| !selective || self.clause_index.contains_key(&Some(f.predicate));
            if let Some(preload) = state.preload.clone() {
                agenda.extend(preload.iter().copied().filter(|f| relevant(f)));
            }
            agenda.extend(state.base.iter().copied().filter(|f| relevant(f)));
        }

        self.process(state, agenda)
    }

    /// Assert one fact and propagate its consequences.
    pub fn add(&mut self, state: &mut InferState, fact: Fact) -> HekaResult<bool> {
        if state.contains(&fact) {
            return Ok(false);
        }
        state.base.add(fact);
        self.process(state, VecDeque::from([fact]))?;
        Ok(true)
    }

    /// Retract one asserted fact. Deductions are rebuilt by full
    /// recomputation.
    pub fn remove(&mut self, state: &mut InferState, fact: &Fact) -> HekaResult<bool> {
        if !state.base.remove(fact) {
            return Ok(false);
        }
        self.run(state)?;
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Agenda loop
    // -----------------------------------------------------------------------

    fn process(&mut self, state: &mut InferState, mut agenda: VecDeque<Fact>) -> HekaResult<()> {
        while let Some(fact) = agenda.pop_front() {
            let mut entries: Vec<(RuleId, usize)> = Vec::new();
            if let Some(list) = self.clause_index.get(&Some(fact.predicate)) {
                entries.extend_from_slice(list);
            }
            if let Some(list) = self.clause_index.get(&None) {
                entries.extend_from_slice(list);
            }
            for (rule_id, clause_idx) in entries {
                self.match_rule(state, rule_id, clause_idx, fact, &mut agenda)?;
            }
        }
        Ok(())
    }

    /// Try one rule with one body clause bound to the triggering fact.
    fn match_rule(
        &mut self,
        state: &mut InferState,
        rule_id: RuleId,
        clause_idx: usize,
        fact: Fact,
        agenda: &mut VecDeque<Fact>,
    ) -> HekaResult<()> {
        let rule = state.rules.get(rule_id).clone();
        let ClauseEntry::Pattern(trigger) = &rule.body[clause_idx] else {
            return Ok(());
        };
        let mut env = BindingStack::new(rule.num_vars);
        if !match_fact(trigger, &fact, &mut env) {
            return Ok(());
        }
        state.rules_triggered += 1;
        trace!(rule = rule.label(), fact = %fact, "rule triggered");

        let mut remaining: Vec<usize> = rule
            .body_patterns()
            .map(|(i, _)| i)
            .filter(|&i| i != clause_idx)
            .collect();
        let mut matched = vec![(clause_idx, fact)];
        self.join(state, &rule, rule_id, &mut remaining, &mut env, &mut matched, agenda)
    }

    /// Recursive join over the unmatched body patterns, most-bound first.
    #[allow(clippy::too_many_arguments)]
    fn join(
        &mut self,
        state: &mut InferState,
        rule: &Rule,
        rule_id: RuleId,
        remaining: &mut Vec<usize>,
        env: &mut BindingStack,
        matched: &mut Vec<(usize, Fact)>,
        agenda: &mut VecDeque<Fact>,
    ) -> HekaResult<()> {
        if remaining.is_empty() {
            env.push();
            let pass = eval_guards(state, rule, env)?;
            if pass {
                let mut ordered = matched.clone();
                ordered.sort_by_key(|(i, _)| *i);
                let antecedents: Vec<Fact> = ordered.into_iter().map(|(_, f)| f).collect();
                self.fire(state, rule, rule_id, env, &antecedents, agenda)?;
            }
            env.unwind();
            return Ok(());
        }

        let pos = best_clause(rule, remaining, env);
        let clause_idx = remaining.remove(pos);
        let ClauseEntry::Pattern(pattern) = &rule.body[clause_idx] else {
            unreachable!("remaining holds only pattern clauses");
        };

        let query = query_for(pattern, env);
        let candidates = state.find(&query);
        for fact in candidates {
            env.push();
            if match_fact(pattern, &fact, env) {
                matched.push((clause_idx, fact));
                let outcome = self.join(state, rule, rule_id, remaining, env, matched, agenda);
                matched.pop();
                outcome?;
            }
            env.unwind();
        }
        remaining.push(clause_idx);
        Ok(())
    }

    /// Fire a fully matched rule: assert head patterns, run head actions,
    /// register nested backward rules.
    fn fire(
        &mut self,
        state: &mut InferState,
        rule: &Rule,
        rule_id: RuleId,
        env: &mut BindingStack,
        antecedents: &[Fact],
        agenda: &mut VecDeque<Fact>,
    ) -> HekaResult<()> {
        state.count_firing()?;
        if state.trace {
            debug!(rule = rule.label(), "firing");
        }
        for (clause_idx, clause) in rule.head.iter().enumerate() {
            match clause {
                ClauseEntry::Pattern(pattern) => {
                    let fact = env.instantiate(pattern, &state.symbols);
                    if state.record_derivations {
                        state
                            .derivations
                            .record(Derivation::new(rule_id, fact, antecedents.to_vec()));
                    }
                    if !state.contains(&fact) {
                        state.deductions.add(fact);
                        agenda.push_back(fact);
                    }
                }
                ClauseEntry::Call(call) => {
                    run_head_action(state, rule, clause_idx, call, env)?;
                }
                ClauseEntry::NestedRule(nested) => {
                    let instantiated = env.instantiate_rule(nested);
                    state.add_backward_rule(instantiated);
                }
            }
        }
        Ok(())
    }
}

/// Evaluate a rule body's guard calls in clause order. A guard naming an
/// unregistered builtin fails the match with a warning rather than
/// erroring, matching how an unknown predicate simply never matches.
pub(super) fn eval_guards(
    state: &mut InferState,
    rule: &Rule,
    env: &mut BindingStack,
) -> HekaResult<bool> {
    let registry = Arc::clone(&state.registry);
    for (clause_idx, clause) in rule.body.iter().enumerate() {
        let ClauseEntry::Call(call) = clause else {
            continue;
        };
        let name = state.symbols.render(call.name);
        let Some(builtin) = registry.lookup(&name) else {
            warn!(rule = rule.label(), builtin = %name, "unknown builtin in rule body, clause fails");
            return Ok(false);
        };
        let mut ctx = BuiltinContext {
            env,
            symbols: &state.symbols,
            rule: rule.label(),
            clause: clause_idx,
            tabled: &mut state.tabled,
            table_all: &mut state.table_all,
            instance_cache: &mut state.instance_cache,
        };
        if !builtin.eval(&call.args, &mut ctx)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Run one head-position builtin. An unregistered head builtin is an
/// error, unlike its body counterpart.
pub(super) fn run_head_action(
    state: &mut InferState,
    rule: &Rule,
    clause_idx: usize,
    call: &Functor,
    env: &mut BindingStack,
) -> HekaResult<()> {
    let registry = Arc::clone(&state.registry);
    let name = state.symbols.render(call.name);
    let Some(builtin) = registry.lookup(&name) else {
        return Err(BuiltinError::UndefinedAction {
            name,
            rule: rule.label().to_string(),
        }
        .into());
    };
    let mut ctx = BuiltinContext {
        env,
        symbols: &state.symbols,
        rule: rule.label(),
        clause: clause_idx,
        tabled: &mut state.tabled,
        table_all: &mut state.table_all,
        instance_cache: &mut state.instance_cache,
    };
    builtin.head_action(&call.args, &mut ctx)?;
    Ok(())
}

/// Pick the remaining clause with the most bound positions.
fn best_clause(rule: &Rule, remaining: &[usize], env: &BindingStack) -> usize {
    let mut best = 0;
    let mut best_score = 0;
    for (pos, &clause_idx) in remaining.iter().enumerate() {
        let ClauseEntry::Pattern(pattern) = &rule.body[clause_idx] else {
            continue;
        };
        let score = term_score(&pattern.subject, env) * SUBJECT_WEIGHT
            + term_score(&pattern.predicate, env) * PREDICATE_WEIGHT
            + term_score(&pattern.object, env) * OBJECT_WEIGHT;
        if pos == 0 || score > best_score {
            best = pos;
            best_score = score;
        }
    }
    best
}

/// Boundness of one pattern position: 3 for a constant or bound
/// variable, 1 for an unbound variable, 0 for a wildcard.
fn term_score(term: &Term, env: &BindingStack) -> u32 {
    match term {
        Term::Wildcard => 0,
        _ if env.ground_const(term).is_some() => 3,
        _ => 1,
    }
}

/// Build the narrowest store query the current bindings allow.
fn query_for(pattern: &TriplePattern, env: &BindingStack) -> FactQuery {
    FactQuery::new(
        env.ground_const(&pattern.subject),
        env.ground_const(&pattern.predicate),
        env.ground_const(&pattern.object),
    )
}
