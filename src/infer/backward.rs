//! Goal-directed backward engine with tabling.
//!
//! Goals are canonicalized (variables renamed to first-occurrence order)
//! and resolved against the fact stores and the backward rules. Every
//! goal gets an answer table; recursive subgoals consume the answers
//! already in their table instead of re-entering resolution, and an
//! outer round loop re-runs resolution until no table grows. That is a
//! round-based rendition of SLG tabling: cyclic rule sets (transitive
//! closure over a cyclic graph) terminate with the full answer set.
//!
//! Tables for predicates marked by `table`/`tableAll` persist across
//! queries until [`BackwardEngine::reset`]; the rest are discarded when
//! their query finishes. Rule variables are renamed apart from goal
//! variables by index shifting, so one binding frame serves both.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use tracing::{trace, warn};

use crate::bindings::BindingStack;
use crate::builtins::BuiltinContext;
use crate::derivation::Derivation;
use crate::error::HekaResult;
use crate::store::FactQuery;
use crate::term::{ClauseEntry, Fact, Functor, Rule, Term, TriplePattern};
use crate::unify::{match_fact, unify_patterns};

use super::{InferState, RuleId};

#[derive(Debug, Default)]
struct TableEntry {
    answers: Vec<Fact>,
    seen: BTreeSet<Fact>,
    complete: bool,
}

impl TableEntry {
    fn add(&mut self, fact: Fact) -> bool {
        if self.seen.insert(fact) {
            self.answers.push(fact);
            true
        } else {
            false
        }
    }
}

/// The tabled backward engine. Holds only answer tables; rules and facts
/// live in [`InferState`].
#[derive(Debug, Default)]
pub struct BackwardEngine {
    tables: HashMap<TriplePattern, TableEntry>,
}

impl BackwardEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all answer tables. Must be called when the facts or rules
    /// change, since completed tables would otherwise serve stale answers.
    pub fn reset(&mut self) {
        self.tables.clear();
    }

    /// Number of retained tables (stats and test support).
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Solve a goal to completion and return its ground answers.
    pub fn solve(&mut self, state: &mut InferState, goal: &TriplePattern) -> HekaResult<Vec<Fact>> {
        self.stream(state, goal).collect()
    }

    /// Resolve a goal on demand: answers already tabled come out
    /// immediately, further ones as resolution passes produce them.
    /// Dropping the stream abandons the remaining passes.
    pub fn stream<'a>(
        &'a mut self,
        state: &'a mut InferState,
        goal: &TriplePattern,
    ) -> AnswerStream<'a> {
        AnswerStream {
            engine: self,
            state,
            canonical: canonicalize(goal),
            cursor: 0,
            exhausted: false,
            failed: false,
        }
    }

    fn total_answers(&self) -> usize {
        self.tables.values().map(|t| t.answers.len()).sum()
    }

    /// One resolution pass for a canonical goal: fact-store matches plus
    /// every backward rule whose head unifies. Goals already being
    /// resolved higher in the call stack contribute only their current
    /// table answers, which is what makes cycles terminate.
    fn resolve(
        &mut self,
        state: &mut InferState,
        canonical: &TriplePattern,
        active: &mut HashSet<TriplePattern>,
        touched: &mut HashSet<TriplePattern>,
    ) -> HekaResult<()> {
        touched.insert(canonical.clone());
        if self.tables.get(canonical).is_some_and(|t| t.complete) {
            return Ok(());
        }
        if !active.insert(canonical.clone()) {
            return Ok(());
        }
        trace!(goal = %canonical, "resolving goal");

        let goal_vars = canonical.var_span();

        // Direct store matches.
        let query = FactQuery::new(
            canonical.subject.as_const(),
            canonical.predicate.as_const(),
            canonical.object.as_const(),
        );
        for fact in state.find(&query) {
            let mut env = BindingStack::new(goal_vars);
            if match_fact(canonical, &fact, &mut env) {
                self.table(canonical).add(fact);
            }
        }

        // Rule resolution, head by head.
        let rules: Vec<(RuleId, Rule)> = state
            .rules
            .backward()
            .map(|(id, r)| (id, r.clone()))
            .collect();
        for (rule_id, rule) in rules {
            for head in &rule.head {
                let ClauseEntry::Pattern(head_pattern) = head else {
                    continue;
                };
                let shifted_head = head_pattern.shift_vars(goal_vars);
                let mut env = BindingStack::new(goal_vars + rule.num_vars);
                if !unify_patterns(canonical, &shifted_head, &mut env) {
                    continue;
                }
                let mut antecedents = Vec::new();
                self.solve_body(
                    state,
                    canonical,
                    &rule,
                    rule_id,
                    goal_vars,
                    0,
                    &mut env,
                    &mut antecedents,
                    active,
                    touched,
                )?;
            }
        }

        active.remove(canonical);
        Ok(())
    }

    /// Resolve a rule body left to right, clause by clause.
    #[allow(clippy::too_many_arguments)]
    fn solve_body(
        &mut self,
        state: &mut InferState,
        canonical: &TriplePattern,
        rule: &Rule,
        rule_id: RuleId,
        goal_vars: usize,
        clause: usize,
        env: &mut BindingStack,
        antecedents: &mut Vec<Fact>,
        active: &mut HashSet<TriplePattern>,
        touched: &mut HashSet<TriplePattern>,
    ) -> HekaResult<()> {
        if clause == rule.body.len() {
            let answer = env.instantiate(canonical, &state.symbols);
            if self.table(canonical).add(answer) {
                state.count_firing()?;
                if state.record_derivations {
                    state
                        .derivations
                        .record(Derivation::new(rule_id, answer, antecedents.clone()));
                }
                trace!(rule = rule.label(), answer = %answer, "goal answered");
            }
            return Ok(());
        }

        match &rule.body[clause] {
            ClauseEntry::Pattern(pattern) => {
                let shifted = pattern.shift_vars(goal_vars);
                let subgoal = TriplePattern {
                    subject: env.resolve(&shifted.subject),
                    predicate: env.resolve(&shifted.predicate),
                    object: env.resolve(&shifted.object),
                };
                self.resolve(state, &canonicalize(&subgoal), active, touched)?;
                let answers: Vec<Fact> = self
                    .tables
                    .get(&canonicalize(&subgoal))
                    .map(|t| t.answers.clone())
                    .unwrap_or_default();
                for fact in answers {
                    env.push();
                    if match_fact(&shifted, &fact, env) {
                        antecedents.push(fact);
                        let outcome = self.solve_body(
                            state,
                            canonical,
                            rule,
                            rule_id,
                            goal_vars,
                            clause + 1,
                            env,
                            antecedents,
                            active,
                            touched,
                        );
                        antecedents.pop();
                        outcome?;
                    }
                    env.unwind();
                }
            }
            ClauseEntry::Call(call) => {
                let shifted = Functor {
                    name: call.name,
                    args: call.args.iter().map(|a| a.shift_vars(goal_vars)).collect(),
                };
                env.push();
                let pass = eval_call(state, rule, clause, &shifted, env)?;
                if pass {
                    self.solve_body(
                        state,
                        canonical,
                        rule,
                        rule_id,
                        goal_vars,
                        clause + 1,
                        env,
                        antecedents,
                        active,
                        touched,
                    )?;
                }
                env.unwind();
            }
            // Rejected by the parser; nothing to resolve.
            ClauseEntry::NestedRule(_) => {}
        }
        Ok(())
    }

    fn table(&mut self, canonical: &TriplePattern) -> &mut TableEntry {
        self.tables.entry(canonical.clone()).or_default()
    }
}

/// Pull-based answers for one goal.
///
/// Each `next` first drains answers already in the goal's table; when
/// they run out it pumps one resolution pass, and it reports exhaustion
/// only once a pass adds nothing anywhere (the tabling fixpoint), at
/// which point the touched tables are marked complete. A consumer that
/// stops early never pays for the remaining passes.
pub struct AnswerStream<'a> {
    engine: &'a mut BackwardEngine,
    state: &'a mut InferState,
    canonical: TriplePattern,
    cursor: usize,
    exhausted: bool,
    failed: bool,
}

impl Iterator for AnswerStream<'_> {
    type Item = HekaResult<Fact>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.engine.tables.get(&self.canonical) {
                if self.cursor < entry.answers.len() {
                    let fact = entry.answers[self.cursor];
                    self.cursor += 1;
                    return Some(Ok(fact));
                }
                if entry.complete {
                    return None;
                }
            }
            if self.exhausted || self.failed {
                return None;
            }

            let before = self.engine.total_answers();
            let mut active = HashSet::new();
            let mut touched = HashSet::new();
            if let Err(e) =
                self.engine
                    .resolve(&mut *self.state, &self.canonical, &mut active, &mut touched)
            {
                self.failed = true;
                return Some(Err(e));
            }
            if self.engine.total_answers() == before {
                // The pass added nothing, so every table it touched has
                // its full answer set.
                for key in &touched {
                    if let Some(entry) = self.engine.tables.get_mut(key) {
                        entry.complete = true;
                    }
                }
                self.exhausted = true;
            }
        }
    }
}

impl Drop for AnswerStream<'_> {
    fn drop(&mut self) {
        let state = &*self.state;
        self.engine.tables.retain(|key, _| is_tabled_goal(state, key));
    }
}

/// Evaluate one guard call in a backward body. Unknown builtins fail the
/// clause with a warning, as in the forward engine.
fn eval_call(
    state: &mut InferState,
    rule: &Rule,
    clause: usize,
    call: &Functor,
    env: &mut BindingStack,
) -> HekaResult<bool> {
    let registry = Arc::clone(&state.registry);
    let name = state.symbols.render(call.name);
    let Some(builtin) = registry.lookup(&name) else {
        warn!(rule = rule.label(), builtin = %name, "unknown builtin in rule body, clause fails");
        return Ok(false);
    };
    let mut ctx = BuiltinContext {
        env,
        symbols: &state.symbols,
        rule: rule.label(),
        clause,
        tabled: &mut state.tabled,
        table_all: &mut state.table_all,
        instance_cache: &mut state.instance_cache,
    };
    Ok(builtin.eval(&call.args, &mut ctx)?)
}

/// Rename a goal's variables to first-occurrence order so structurally
/// equal goals share one table.
fn canonicalize(goal: &TriplePattern) -> TriplePattern {
    let mut map: HashMap<usize, usize> = HashMap::new();
    let mut walk = |term: &Term| -> Term { canonical_term(term, &mut map) };
    TriplePattern {
        subject: walk(&goal.subject),
        predicate: walk(&goal.predicate),
        object: walk(&goal.object),
    }
}

fn canonical_term(term: &Term, map: &mut HashMap<usize, usize>) -> Term {
    match term {
        Term::Var(i) => {
            let next = map.len();
            Term::Var(*map.entry(*i).or_insert(next))
        }
        Term::Functor(f) => Term::Functor(Functor {
            name: f.name,
            args: f.args.iter().map(|a| canonical_term(a, map)).collect(),
        }),
        other => other.clone(),
    }
}

/// A goal's table is retained across queries when its predicate is
/// marked for tabling (ground predicates only; variable-predicate goals
/// are kept under `tableAll`).
fn is_tabled_goal(state: &InferState, goal: &TriplePattern) -> bool {
    match goal.predicate.as_const() {
        Some(p) => state.is_tabled(p),
        None => state.table_all,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::BuiltinRegistry;
    use crate::parser::parse_rules;
    use crate::store::FactStore;
    use crate::symbol::SymbolTable;

    fn setup(rule_src: &str, facts: &[(&str, &str, &str)]) -> (InferState, BackwardEngine) {
        let symbols = Arc::new(SymbolTable::new());
        let mut state = InferState::new(
            Arc::clone(&symbols),
            Arc::new(BuiltinRegistry::standard()),
        );
        for rule in parse_rules(rule_src, &symbols).expect("rules parse") {
            state.rules.add(rule);
        }
        for (s, p, o) in facts {
            state
                .base
                .add(Fact::new(symbols.named(*s), symbols.named(*p), symbols.named(*o)));
        }
        (state, BackwardEngine::new())
    }

    fn goal(state: &InferState, s: Term, p: &str, o: Term) -> TriplePattern {
        TriplePattern::new(s, Term::Const(state.symbols.named(p)), o)
    }

    fn fact(state: &InferState, s: &str, p: &str, o: &str) -> Fact {
        Fact::new(
            state.symbols.named(s),
            state.symbols.named(p),
            state.symbols.named(o),
        )
    }

    #[test]
    fn ground_goal_checks_the_store() {
        let (mut state, mut engine) = setup("", &[("a", "p", "b")]);
        let present = goal(
            &state,
            Term::Const(state.symbols.named("a")),
            "p",
            Term::Const(state.symbols.named("b")),
        );
        let answers = engine.solve(&mut state, &present).unwrap();
        assert_eq!(answers, vec![fact(&state, "a", "p", "b")]);

        let absent = goal(
            &state,
            Term::Const(state.symbols.named("b")),
            "p",
            Term::Const(state.symbols.named("a")),
        );
        assert!(engine.solve(&mut state, &absent).unwrap().is_empty());
    }

    #[test]
    fn open_goal_enumerates_store_matches() {
        let (mut state, mut engine) = setup("", &[("a", "p", "b"), ("c", "p", "d"), ("a", "q", "e")]);
        let g = goal(&state, Term::Var(0), "p", Term::Var(1));
        let mut answers = engine.solve(&mut state, &g).unwrap();
        answers.sort();
        assert_eq!(answers, vec![fact(&state, "a", "p", "b"), fact(&state, "c", "p", "d")]);
    }

    #[test]
    fn single_step_rule_resolution() {
        let (mut state, mut engine) = setup(
            "[(?a ancestor ?b) <- (?a parent ?b)]",
            &[("ida", "parent", "joe")],
        );
        let g = goal(&state, Term::Var(0), "ancestor", Term::Var(1));
        let answers = engine.solve(&mut state, &g).unwrap();
        assert_eq!(answers, vec![fact(&state, "ida", "ancestor", "joe")]);
    }

    #[test]
    fn recursive_rules_reach_fixpoint() {
        let (mut state, mut engine) = setup(
            "[(?a ancestor ?b) <- (?a parent ?b)]
             [(?a ancestor ?b) <- (?a parent ?c) (?c ancestor ?b)]",
            &[
                ("ida", "parent", "joe"),
                ("joe", "parent", "tom"),
                ("tom", "parent", "ann"),
            ],
        );
        let g = goal(&state, Term::Var(0), "ancestor", Term::Var(1));
        let answers = engine.solve(&mut state, &g).unwrap();
        assert_eq!(answers.len(), 6);
        assert!(answers.contains(&fact(&state, "ida", "ancestor", "ann")));
    }

    #[test]
    fn cyclic_graph_terminates_with_full_closure() {
        let (mut state, mut engine) = setup(
            "[(?a reaches ?b) <- (?a edge ?b)]
             [(?a reaches ?b) <- (?a edge ?c) (?c reaches ?b)]",
            &[("a", "edge", "b"), ("b", "edge", "c"), ("c", "edge", "a")],
        );
        let reaches = state.symbols.named("reaches");
        state.tabled.insert(reaches);
        let g = goal(&state, Term::Var(0), "reaches", Term::Var(1));
        let answers = engine.solve(&mut state, &g).unwrap();
        // Every node reaches every node, including itself.
        assert_eq!(answers.len(), 9);
        assert!(answers.contains(&fact(&state, "a", "reaches", "a")));
    }

    #[test]
    fn streams_abandon_unconsumed_resolution_rounds() {
        let rules = "[(?a reaches ?b) <- (?a edge ?b)]
                     [(?a reaches ?b) <- (?a edge ?c) (?c reaches ?b)]";
        let facts = [("a", "edge", "b"), ("b", "edge", "c"), ("c", "edge", "a")];

        // Reference run: full fixpoint over the cyclic graph.
        let (mut full_state, mut full_engine) = setup(rules, &facts);
        full_state.tabled.insert(full_state.symbols.named("reaches"));
        let g = goal(&full_state, Term::Var(0), "reaches", Term::Var(1));
        assert_eq!(full_engine.solve(&mut full_state, &g).unwrap().len(), 9);

        // Taking one answer and dropping the stream must skip the later
        // rounds the cycle needs to saturate.
        let (mut state, mut engine) = setup(rules, &facts);
        state.tabled.insert(state.symbols.named("reaches"));
        let g = goal(&state, Term::Var(0), "reaches", Term::Var(1));
        let mut stream = engine.stream(&mut state, &g);
        assert!(matches!(stream.next(), Some(Ok(_))));
        drop(stream);
        assert!(
            state.rules_fired < full_state.rules_fired,
            "one answer must not cost the full fixpoint"
        );
    }

    #[test]
    fn completed_tables_serve_streams_without_resolution() {
        let (mut state, mut engine) = setup(
            "[(?a ancestor ?b) <- (?a parent ?b)]",
            &[("ida", "parent", "joe")],
        );
        state.tabled.insert(state.symbols.named("ancestor"));
        let g = goal(&state, Term::Var(0), "ancestor", Term::Var(1));
        engine.solve(&mut state, &g).unwrap();
        let fired = state.rules_fired;

        let answers: Vec<Fact> = engine
            .stream(&mut state, &g)
            .collect::<HekaResult<Vec<_>>>()
            .unwrap();
        assert_eq!(answers, vec![fact(&state, "ida", "ancestor", "joe")]);
        assert_eq!(state.rules_fired, fired, "no re-resolution of a complete table");
    }

    #[test]
    fn half_bound_goal_filters_answers() {
        let (mut state, mut engine) = setup(
            "[(?a ancestor ?b) <- (?a parent ?b)]
             [(?a ancestor ?b) <- (?a parent ?c) (?c ancestor ?b)]",
            &[("ida", "parent", "joe"), ("joe", "parent", "tom")],
        );
        let g = goal(
            &state,
            Term::Const(state.symbols.named("ida")),
            "ancestor",
            Term::Var(0),
        );
        let answers = engine.solve(&mut state, &g).unwrap();
        assert_eq!(answers.len(), 2);
        assert!(answers.iter().all(|f| f.subject == state.symbols.named("ida")));
    }

    #[test]
    fn guards_run_in_backward_bodies() {
        let symbols = Arc::new(SymbolTable::new());
        let mut state = InferState::new(
            Arc::clone(&symbols),
            Arc::new(BuiltinRegistry::standard()),
        );
        for rule in
            parse_rules("[(?x tall yes) <- (?x height ?h) greaterThan(?h, 180)]", &symbols).unwrap()
        {
            state.rules.add(rule);
        }
        let height = symbols.named("height");
        state.base.add(Fact::new(symbols.named("abe"), height, symbols.int(190)));
        state.base.add(Fact::new(symbols.named("bob"), height, symbols.int(160)));
        let mut engine = BackwardEngine::new();
        let g = TriplePattern::new(
            Term::Var(0),
            Term::Const(symbols.named("tall")),
            Term::Const(symbols.named("yes")),
        );
        let answers = engine.solve(&mut state, &g).unwrap();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].subject, symbols.named("abe"));
    }

    #[test]
    fn repeated_variable_goal_requires_agreement() {
        let (mut state, mut engine) = setup("", &[("a", "p", "a"), ("a", "p", "b")]);
        let g = goal(&state, Term::Var(0), "p", Term::Var(0));
        let answers = engine.solve(&mut state, &g).unwrap();
        assert_eq!(answers, vec![fact(&state, "a", "p", "a")]);
    }

    #[test]
    fn untabled_tables_are_discarded_after_solve() {
        let (mut state, mut engine) = setup(
            "[(?a ancestor ?b) <- (?a parent ?b)]",
            &[("ida", "parent", "joe")],
        );
        let g = goal(&state, Term::Var(0), "ancestor", Term::Var(1));
        engine.solve(&mut state, &g).unwrap();
        assert_eq!(engine.table_count(), 0);

        let ancestor = state.symbols.named("ancestor");
        state.tabled.insert(ancestor);
        engine.solve(&mut state, &g).unwrap();
        assert_eq!(engine.table_count(), 1);
        engine.reset();
        assert_eq!(engine.table_count(), 0);
    }

    #[test]
    fn backward_derivations_carry_antecedents() {
        let (mut state, mut engine) = setup(
            "[(?a ancestor ?b) <- (?a parent ?b)]",
            &[("ida", "parent", "joe")],
        );
        state.record_derivations = true;
        let g = goal(&state, Term::Var(0), "ancestor", Term::Var(1));
        engine.solve(&mut state, &g).unwrap();
        let conclusion = fact(&state, "ida", "ancestor", "joe");
        let records = state.derivations.derivations_of(&conclusion);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].antecedents, vec![fact(&state, "ida", "parent", "joe")]);
    }
}
