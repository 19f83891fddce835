//! Incremental forward engine with a RETE-flavored network.
//!
//! Each forward rule compiles to a row of alpha memories, one per body
//! pattern, holding the facts that pass that pattern's constant tests.
//! A full assignment of memory facts to body patterns that also passes
//! the guards is a token; tokens are retained, and every deduction
//! carries a support count of the live tokens concluding it.
//!
//! Assertion inserts the fact into its alpha memories and enumerates
//! only the new tokens (those containing the fact). Retraction removes
//! the fact's tokens and cascades: a deduction whose support drops to
//! zero is itself retracted. Head actions and nested-rule registration
//! run when a token is created and are not undone by retraction.

use std::collections::{BTreeSet, HashMap, VecDeque};

use tracing::trace;

use crate::bindings::BindingStack;
use crate::derivation::Derivation;
use crate::error::HekaResult;
use crate::store::FactStore;
use crate::term::{ClauseEntry, Fact, Rule};
use crate::unify::match_fact;

use super::forward::{eval_guards, run_head_action};
use super::{InferState, RuleId};

/// One live full match of a rule body.
#[derive(Debug, Clone)]
struct Token {
    rule: RuleId,
    /// Matched body facts in pattern order. Empty for axiom tokens.
    antecedents: Vec<Fact>,
    /// Instantiated head patterns.
    conclusions: Vec<Fact>,
}

/// The incremental engine. Compiled rule snapshot plus network memories.
#[derive(Debug, Default)]
pub struct ReteEngine {
    /// Forward rules captured at compile time, with their body pattern
    /// clause indices.
    rules: Vec<(RuleId, Rule, Vec<usize>)>,
    /// Alpha memory per (rule, body clause): facts passing the pattern's
    /// constant tests.
    alpha: HashMap<(RuleId, usize), BTreeSet<Fact>>,
    tokens: Vec<Token>,
    /// Deduction to number of live tokens concluding it.
    support: HashMap<Fact, usize>,
}

impl ReteEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the forward rules and reset the network.
    pub fn compile(&mut self, state: &InferState) {
        self.rules = state
            .rules
            .forward()
            .map(|(id, r)| {
                let patterns: Vec<usize> = r.body_patterns().map(|(i, _)| i).collect();
                (id, r.clone(), patterns)
            })
            .collect();
        self.alpha.clear();
        self.tokens.clear();
        self.support.clear();
    }

    /// Build the network and closure from scratch.
    pub fn run(&mut self, state: &mut InferState) -> HekaResult<()> {
        self.alpha.clear();
        self.tokens.clear();
        self.support.clear();
        state.deductions.clear();
        state.derivations.clear();
        state.rules_fired = 0;

        let axioms: Vec<(RuleId, Rule)> = self
            .rules
            .iter()
            .filter(|(_, r, _)| r.is_axiom())
            .map(|(id, r, _)| (*id, r.clone()))
            .collect();
        let mut agenda: VecDeque<Fact> = VecDeque::new();
        for (rule_id, rule) in axioms {
            let mut env = BindingStack::new(rule.num_vars);
            self.create_token(state, &rule, rule_id, &mut env, Vec::new(), &mut agenda)?;
        }

        if let Some(preload) = state.preload.clone() {
            agenda.extend(preload.iter().copied());
        }
        agenda.extend(state.base.iter().copied());
        self.propagate(state, agenda)
    }

    /// Assert one fact and integrate it incrementally.
    pub fn add(&mut self, state: &mut InferState, fact: Fact) -> HekaResult<bool> {
        if state.contains(&fact) {
            return Ok(false);
        }
        state.base.add(fact);
        self.propagate(state, VecDeque::from([fact]))?;
        Ok(true)
    }

    /// Retract one asserted fact, cascading through unsupported
    /// deductions. No recomputation of the surviving closure.
    pub fn remove(&mut self, state: &mut InferState, fact: &Fact) -> HekaResult<bool> {
        if !state.base.remove(fact) {
            return Ok(false);
        }
        // Still concluded by a live token: the fact stays in the closure
        // as a deduction and nothing downstream changes.
        if self.support_of(fact) > 0 {
            state.deductions.add(*fact);
            return Ok(true);
        }
        let mut queue = VecDeque::from([*fact]);
        while let Some(f) = queue.pop_front() {
            trace!(fact = %f, "retracting");
            for memory in self.alpha.values_mut() {
                memory.remove(&f);
            }
            state.derivations.forget_citing(&f);

            let mut dead = Vec::new();
            self.tokens.retain(|t| {
                if t.antecedents.contains(&f) {
                    dead.push(t.clone());
                    false
                } else {
                    true
                }
            });
            for token in dead {
                trace!(rule = token.rule.0, "token retracted");
                for conclusion in token.conclusions {
                    let Some(count) = self.support.get_mut(&conclusion) else {
                        continue;
                    };
                    *count -= 1;
                    if *count == 0 {
                        self.support.remove(&conclusion);
                        if state.deductions.remove(&conclusion) {
                            state.derivations.forget(&conclusion);
                            queue.push_back(conclusion);
                        }
                    }
                }
            }
        }
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Propagation
    // -----------------------------------------------------------------------

    fn propagate(&mut self, state: &mut InferState, mut agenda: VecDeque<Fact>) -> HekaResult<()> {
        while let Some(fact) = agenda.pop_front() {
            // Insert into every matching alpha memory first so joins see
            // the fact at the other positions too.
            let mut hits: Vec<(usize, usize)> = Vec::new();
            for (rule_pos, (rule_id, rule, patterns)) in self.rules.iter().enumerate() {
                for (slot, &clause_idx) in patterns.iter().enumerate() {
                    let ClauseEntry::Pattern(pattern) = &rule.body[clause_idx] else {
                        continue;
                    };
                    let mut scratch = BindingStack::new(rule.num_vars);
                    if match_fact(pattern, &fact, &mut scratch) {
                        let fresh = self
                            .alpha
                            .entry((*rule_id, clause_idx))
                            .or_default()
                            .insert(fact);
                        if fresh {
                            state.rules_triggered += 1;
                            hits.push((rule_pos, slot));
                        }
                    }
                }
            }
            for (rule_pos, slot) in hits {
                let (rule_id, rule) = {
                    let (id, r, _) = &self.rules[rule_pos];
                    (*id, r.clone())
                };
                let patterns = self.rules[rule_pos].2.clone();
                let mut env = BindingStack::new(rule.num_vars);
                let mut acc = Vec::with_capacity(patterns.len());
                self.join(
                    state, &rule, rule_id, &patterns, slot, fact, 0, &mut env, &mut acc,
                    &mut agenda,
                )?;
            }
        }
        Ok(())
    }

    /// Enumerate the tokens that contain `fixed_fact` at `fixed_slot`.
    ///
    /// Slots before the fixed one exclude the fact, so a token holding it
    /// at several positions is produced exactly once (at the first).
    #[allow(clippy::too_many_arguments)]
    fn join(
        &mut self,
        state: &mut InferState,
        rule: &Rule,
        rule_id: RuleId,
        patterns: &[usize],
        fixed_slot: usize,
        fixed_fact: Fact,
        slot: usize,
        env: &mut BindingStack,
        acc: &mut Vec<Fact>,
        agenda: &mut VecDeque<Fact>,
    ) -> HekaResult<()> {
        if slot == patterns.len() {
            env.push();
            let pass = eval_guards(state, rule, env)?;
            if pass {
                self.create_token(state, rule, rule_id, env, acc.clone(), agenda)?;
            }
            env.unwind();
            return Ok(());
        }

        let clause_idx = patterns[slot];
        let ClauseEntry::Pattern(pattern) = &rule.body[clause_idx] else {
            unreachable!("patterns holds only pattern clause indices");
        };

        let candidates: Vec<Fact> = if slot == fixed_slot {
            vec![fixed_fact]
        } else {
            self.alpha
                .get(&(rule_id, clause_idx))
                .map(|m| {
                    m.iter()
                        .copied()
                        .filter(|f| slot > fixed_slot || *f != fixed_fact)
                        .collect()
                })
                .unwrap_or_default()
        };

        for fact in candidates {
            env.push();
            if match_fact(pattern, &fact, env) {
                acc.push(fact);
                let outcome = self.join(
                    state, rule, rule_id, patterns, fixed_slot, fixed_fact, slot + 1, env, acc,
                    agenda,
                );
                acc.pop();
                outcome?;
            }
            env.unwind();
        }
        Ok(())
    }

    /// Record a new token and apply its effects: support counting,
    /// deduction assertion, derivation logging, head actions.
    fn create_token(
        &mut self,
        state: &mut InferState,
        rule: &Rule,
        rule_id: RuleId,
        env: &mut BindingStack,
        antecedents: Vec<Fact>,
        agenda: &mut VecDeque<Fact>,
    ) -> HekaResult<()> {
        state.count_firing()?;
        let mut conclusions = Vec::new();
        for (clause_idx, clause) in rule.head.iter().enumerate() {
            match clause {
                ClauseEntry::Pattern(pattern) => {
                    let fact = env.instantiate(pattern, &state.symbols);
                    if state.record_derivations {
                        state
                            .derivations
                            .record(Derivation::new(rule_id, fact, antecedents.clone()));
                    }
                    *self.support.entry(fact).or_insert(0) += 1;
                    if !state.contains(&fact) {
                        state.deductions.add(fact);
                        agenda.push_back(fact);
                    }
                    conclusions.push(fact);
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
        self.tokens.push(Token {
            rule: rule_id,
            antecedents,
            conclusions,
        });
        Ok(())
    }

    /// Number of live tokens (test and stats support).
    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Support count for a deduction, if any token concludes it.
    pub fn support_of(&self, fact: &Fact) -> usize {
        self.support.get(fact).copied().unwrap_or(0)
    }
}
