//! Reasoner factory and inference contexts.
//!
//! A [`Reasoner`] is built once from a configuration and a rule set; it
//! owns the shared symbol table, the builtin registry, and a lazily
//! computed axiom closure (facts and directives derivable from the rules
//! alone). [`Reasoner::bind`] attaches it to data, yielding an
//! [`InfContext`] that owns its private fact layers and engines. Contexts
//! are independent: each can assert, retract, and query without touching
//! the others, while the preload and symbols stay shared.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bindings::BindingStack;
use crate::builtins::BuiltinRegistry;
use crate::derivation::Derivation;
use crate::error::{EngineError, HekaResult};
use crate::infer::backward::{AnswerStream, BackwardEngine};
use crate::infer::forward::ForwardEngine;
use crate::infer::network::ReteEngine;
use crate::infer::{InferState, Mode};
use crate::parser;
use crate::store::{FactQuery, FactStore, MemFactStore};
use crate::symbol::{SymbolId, SymbolTable};
use crate::term::{Fact, Rule, TriplePattern};
use crate::unify::match_fact;

/// Default bound on rule firings per closure computation.
pub const DEFAULT_FIRING_LIMIT: u64 = 1_000_000;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Reasoner configuration. Deserializable from TOML for the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReasonerConfig {
    /// Chaining strategy.
    pub mode: Mode,
    /// Use the incremental network engine for forward closure instead of
    /// the naive recompute engine.
    pub incremental: bool,
    /// Abort closure computation after this many rule firings.
    pub firing_limit: u64,
    /// Log a derivation record for every firing.
    pub record_derivations: bool,
    /// Per-firing debug logging.
    pub trace: bool,
    /// Predicates to table in the backward engine (by name).
    pub tabled: Vec<String>,
    /// Cap on variables per rule frame.
    pub max_rule_vars: usize,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Hybrid,
            incremental: false,
            firing_limit: DEFAULT_FIRING_LIMIT,
            record_derivations: false,
            trace: false,
            tabled: Vec::new(),
            max_rule_vars: parser::DEFAULT_MAX_VARS,
        }
    }
}

impl ReasonerConfig {
    /// Parse a TOML configuration document.
    pub fn from_toml_str(src: &str) -> HekaResult<Self> {
        let config: ReasonerConfig = toml::from_str(src).map_err(|e| EngineError::InvalidConfig {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> HekaResult<()> {
        if self.firing_limit == 0 {
            return Err(EngineError::InvalidConfig {
                message: "firing_limit must be at least 1".into(),
            }
            .into());
        }
        if self.max_rule_vars == 0 {
            return Err(EngineError::InvalidConfig {
                message: "max_rule_vars must be at least 1".into(),
            }
            .into());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Reasoner
// ---------------------------------------------------------------------------

/// Axiom closure shared by all contexts of one reasoner.
#[derive(Debug, Default)]
struct SharedPreload {
    facts: Arc<MemFactStore>,
    tabled: HashSet<SymbolId>,
    table_all: bool,
    /// Backward rules synthesized while firing axioms.
    extra_rules: Vec<Rule>,
}

/// Rule-set factory for inference contexts.
pub struct Reasoner {
    config: ReasonerConfig,
    symbols: Arc<SymbolTable>,
    registry: Arc<BuiltinRegistry>,
    rules: Vec<Rule>,
    preload: OnceLock<Arc<SharedPreload>>,
}

impl Reasoner {
    pub fn new(config: ReasonerConfig) -> HekaResult<Self> {
        Self::with_registry(config, Arc::new(BuiltinRegistry::standard()))
    }

    /// Build with a custom builtin registry (tests, host extensions).
    pub fn with_registry(
        config: ReasonerConfig,
        registry: Arc<BuiltinRegistry>,
    ) -> HekaResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            symbols: Arc::new(SymbolTable::new()),
            registry,
            rules: Vec::new(),
            preload: OnceLock::new(),
        })
    }

    pub fn config(&self) -> &ReasonerConfig {
        &self.config
    }

    pub fn symbols(&self) -> &Arc<SymbolTable> {
        &self.symbols
    }

    /// Parse rule text and append the rules. Returns how many were added.
    ///
    /// Must be called before the first [`Reasoner::bind`]; later calls
    /// would not reach the already-shared preload.
    pub fn add_rules(&mut self, src: &str) -> HekaResult<usize> {
        let rules = parser::parse_rules_with_limit(src, &self.symbols, self.config.max_rule_vars)?;
        let count = rules.len();
        self.rules.extend(rules);
        Ok(count)
    }

    /// Append one already-built rule.
    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Attach the reasoner to (initially empty) data.
    pub fn bind(&self) -> HekaResult<InfContext> {
        let shared = self.shared_preload()?;
        let mut state = InferState::new(Arc::clone(&self.symbols), Arc::clone(&self.registry));
        for rule in &self.rules {
            state.rules.add(rule.clone());
        }
        for rule in &shared.extra_rules {
            state.rules.add(rule.clone());
        }
        state.preload = Some(Arc::clone(&shared.facts));
        state.tabled = shared.tabled.clone();
        state.table_all = shared.table_all;
        for name in &self.config.tabled {
            let id = self.symbols.named(name.clone());
            state.tabled.insert(id);
        }
        state.firing_limit = self.config.firing_limit;
        state.record_derivations = self.config.record_derivations;
        state.trace = self.config.trace;

        let closure = if self.config.incremental {
            let mut engine = ReteEngine::new();
            engine.compile(&state);
            ClosureEngine::Incremental(engine)
        } else {
            let mut engine = ForwardEngine::new();
            engine.compile(&state);
            ClosureEngine::Naive(engine)
        };

        Ok(InfContext {
            mode: self.config.mode,
            state,
            closure,
            backward: BackwardEngine::new(),
            prepared: false,
        })
    }

    /// Compute the axiom closure once and share it between contexts.
    fn shared_preload(&self) -> HekaResult<Arc<SharedPreload>> {
        if let Some(shared) = self.preload.get() {
            return Ok(Arc::clone(shared));
        }
        let built = Arc::new(self.build_preload()?);
        // A racing builder may have won; the OnceLock keeps one.
        let _ = self.preload.set(built);
        Ok(Arc::clone(self.preload.get().expect("preload initialized")))
    }

    fn build_preload(&self) -> HekaResult<SharedPreload> {
        let mut state = InferState::new(Arc::clone(&self.symbols), Arc::clone(&self.registry));
        let static_rules = self.rules.len();
        for rule in &self.rules {
            state.rules.add(rule.clone());
        }
        state.firing_limit = self.config.firing_limit;

        let mut engine = ForwardEngine::new();
        engine.compile(&state);
        engine.run(&mut state)?;
        debug!(
            facts = state.deductions.len(),
            tabled = state.tabled.len(),
            "axiom preload computed"
        );

        let extra_rules: Vec<Rule> = state
            .rules
            .iter()
            .skip(static_rules)
            .map(|(_, r)| r.clone())
            .collect();
        Ok(SharedPreload {
            facts: Arc::new(std::mem::take(&mut state.deductions)),
            tabled: std::mem::take(&mut state.tabled),
            table_all: state.table_all,
            extra_rules,
        })
    }
}

// ---------------------------------------------------------------------------
// Inference context
// ---------------------------------------------------------------------------

/// The forward engine variant a context runs.
enum ClosureEngine {
    Naive(ForwardEngine),
    Incremental(ReteEngine),
}

/// A reasoner bound to one mutable set of facts.
///
/// Sequential by design: one resolution at a time, `&mut self`
/// throughout. Share-nothing except the symbol table, registry, and
/// preload facts.
pub struct InfContext {
    mode: Mode,
    state: InferState,
    closure: ClosureEngine,
    backward: BackwardEngine,
    prepared: bool,
}

/// Ground answers to one inference query.
///
/// Forward-mode answers are materialized closure matches; backward and
/// hybrid answers are pumped out of goal resolution on demand, so a
/// consumer that stops early (or drops the iterator) abandons the
/// remaining resolution work.
pub enum Answers<'a> {
    /// Matches read from the computed closure.
    Closure(std::vec::IntoIter<Fact>),
    /// Lazily resolved goal answers.
    Goal(AnswerStream<'a>),
}

impl Iterator for Answers<'_> {
    type Item = HekaResult<Fact>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Answers::Closure(inner) => inner.next().map(Ok),
            Answers::Goal(stream) => stream.next(),
        }
    }
}

/// Counters exposed for stats output.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct InfStats {
    pub rules_fired: u64,
    pub rules_triggered: u64,
    pub base_facts: usize,
    pub deductions: usize,
}

impl InfContext {
    /// Assert one fact. After [`InfContext::prepare`] the closure is
    /// maintained incrementally; backward answer tables are invalidated
    /// either way.
    pub fn add_fact(&mut self, fact: Fact) -> HekaResult<bool> {
        self.backward.reset();
        if self.prepared && self.mode != Mode::Backward {
            return match &mut self.closure {
                ClosureEngine::Naive(e) => e.add(&mut self.state, fact),
                ClosureEngine::Incremental(e) => e.add(&mut self.state, fact),
            };
        }
        Ok(self.state.base.add(fact))
    }

    /// Retract one asserted fact (derived facts cannot be retracted
    /// directly). The closure is rebuilt or, with the incremental engine,
    /// repaired.
    pub fn remove_fact(&mut self, fact: &Fact) -> HekaResult<bool> {
        self.backward.reset();
        if self.prepared && self.mode != Mode::Backward {
            return match &mut self.closure {
                ClosureEngine::Naive(e) => e.remove(&mut self.state, fact),
                ClosureEngine::Incremental(e) => e.remove(&mut self.state, fact),
            };
        }
        Ok(self.state.base.remove(fact))
    }

    /// Compute the forward closure (no-op in backward mode, idempotent
    /// otherwise). Queries call this implicitly.
    pub fn prepare(&mut self) -> HekaResult<()> {
        if self.prepared {
            return Ok(());
        }
        if self.mode != Mode::Backward {
            match &mut self.closure {
                ClosureEngine::Naive(e) => e.run(&mut self.state)?,
                ClosureEngine::Incremental(e) => e.run(&mut self.state)?,
            }
        }
        self.prepared = true;
        Ok(())
    }

    /// Answer a triple-pattern query under the configured mode.
    pub fn infer(&mut self, goal: &TriplePattern) -> HekaResult<Answers<'_>> {
        self.prepare()?;
        match self.mode {
            Mode::Forward => {
                let query = FactQuery::new(
                    goal.subject.as_const(),
                    goal.predicate.as_const(),
                    goal.object.as_const(),
                );
                let mut answers = Vec::new();
                for fact in self.state.find(&query) {
                    let mut env = BindingStack::new(goal.var_span());
                    if match_fact(goal, &fact, &mut env) {
                        answers.push(fact);
                    }
                }
                Ok(Answers::Closure(answers.into_iter()))
            }
            Mode::Backward | Mode::Hybrid => {
                Ok(Answers::Goal(self.backward.stream(&mut self.state, goal)))
            }
        }
    }

    /// Whether the fact is asserted or derivable. Resolution stops at the
    /// first answer.
    pub fn holds(&mut self, fact: &Fact) -> HekaResult<bool> {
        if self.state.contains(fact) {
            return Ok(true);
        }
        let goal = TriplePattern::from(*fact);
        match self.infer(&goal)?.next() {
            Some(Ok(_)) => Ok(true),
            Some(Err(e)) => Err(e),
            None => Ok(false),
        }
    }

    /// Derivation records concluding a fact (only populated when
    /// `record_derivations` is on).
    pub fn derivations_of(&self, fact: &Fact) -> &[Derivation] {
        self.state.derivations.derivations_of(fact)
    }

    /// Render a proof tree for a fact, one line per derivation step.
    pub fn explain(&self, fact: &Fact) -> String {
        let mut out = String::new();
        let mut seen = HashSet::new();
        self.explain_into(fact, 0, &mut seen, &mut out);
        if out.is_empty() {
            out = format!("{}: asserted or unknown\n", fact.render(&self.state.symbols));
        }
        out
    }

    fn explain_into(
        &self,
        fact: &Fact,
        depth: usize,
        seen: &mut HashSet<Fact>,
        out: &mut String,
    ) {
        if !seen.insert(*fact) {
            return;
        }
        for derivation in self.state.derivations.derivations_of(fact) {
            let label = self.state.rules.get(derivation.rule).label().to_string();
            out.push_str(&"  ".repeat(depth));
            out.push_str(&derivation.render(&self.state.symbols, &label));
            out.push('\n');
            for antecedent in &derivation.antecedents {
                self.explain_into(antecedent, depth + 1, seen, out);
            }
        }
    }

    pub fn stats(&self) -> InfStats {
        InfStats {
            rules_fired: self.state.rules_fired,
            rules_triggered: self.state.rules_triggered,
            base_facts: self.state.base.len(),
            deductions: self.state.deductions.len(),
        }
    }

    pub fn symbols(&self) -> &Arc<SymbolTable> {
        &self.state.symbols
    }

    /// All facts (asserted, preloaded, derived) matching a raw query.
    /// Forward closure is computed first.
    pub fn find(&mut self, query: &FactQuery) -> HekaResult<Vec<Fact>> {
        self.prepare()?;
        Ok(self.state.find(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Term;

    fn reasoner(mode: Mode, rules: &str) -> Reasoner {
        let config = ReasonerConfig {
            mode,
            record_derivations: true,
            ..ReasonerConfig::default()
        };
        let mut r = Reasoner::new(config).unwrap();
        r.add_rules(rules).unwrap();
        r
    }

    fn add(ctx: &mut InfContext, s: &str, p: &str, o: &str) -> Fact {
        let symbols = Arc::clone(ctx.symbols());
        let fact = Fact::new(symbols.named(s), symbols.named(p), symbols.named(o));
        ctx.add_fact(fact).unwrap();
        fact
    }

    fn open_goal(ctx: &InfContext, p: &str) -> TriplePattern {
        TriplePattern::new(
            Term::Var(0),
            Term::Const(ctx.symbols().named(p)),
            Term::Var(1),
        )
    }

    fn all(ctx: &mut InfContext, goal: &TriplePattern) -> Vec<Fact> {
        ctx.infer(goal)
            .unwrap()
            .collect::<HekaResult<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn forward_mode_answers_from_closure() {
        let r = reasoner(Mode::Forward, "[trans: (?a p ?b) (?b p ?c) -> (?a p ?c)]");
        let mut ctx = r.bind().unwrap();
        add(&mut ctx, "a", "p", "b");
        add(&mut ctx, "b", "p", "c");
        let g = open_goal(&ctx, "p");
        assert_eq!(all(&mut ctx, &g).len(), 3);
    }

    #[test]
    fn backward_mode_computes_no_closure() {
        let r = reasoner(Mode::Backward, "[(?a anc ?b) <- (?a parent ?b)]");
        let mut ctx = r.bind().unwrap();
        add(&mut ctx, "ida", "parent", "joe");
        ctx.prepare().unwrap();
        assert_eq!(ctx.stats().deductions, 0);
        let g = open_goal(&ctx, "anc");
        assert_eq!(all(&mut ctx, &g).len(), 1);
    }

    #[test]
    fn hybrid_mode_layers_backward_over_forward() {
        // The forward rule derives (x q y); the backward rule proves r
        // goals from q facts, derived ones included.
        let r = reasoner(
            Mode::Hybrid,
            "[fwd: (?x p ?y) -> (?x q ?y)]
             [(?x r ?y) <- (?x q ?y)]",
        );
        let mut ctx = r.bind().unwrap();
        add(&mut ctx, "a", "p", "b");
        let g = open_goal(&ctx, "r");
        let answers = all(&mut ctx, &g);
        let symbols = ctx.symbols();
        assert_eq!(
            answers,
            vec![Fact::new(symbols.named("a"), symbols.named("r"), symbols.named("b"))]
        );
    }

    #[test]
    fn rule_synthesis_scopes_backward_rules_to_bindings() {
        // Firing the forward rule for each owner synthesizes a backward
        // rule specialized to that owner's plot.
        let r = reasoner(
            Mode::Hybrid,
            "[setup: (?c owns ?p) -> [(?p taxedTo ?c) <- (?p zoned yes)]]",
        );
        let mut ctx = r.bind().unwrap();
        add(&mut ctx, "alice", "owns", "plot1");
        add(&mut ctx, "bob", "owns", "plot2");
        add(&mut ctx, "plot1", "zoned", "yes");
        let g = open_goal(&ctx, "taxedTo");
        let answers = all(&mut ctx, &g);
        let symbols = Arc::clone(ctx.symbols());
        // plot1 is zoned, so only alice's synthesized rule produces.
        assert_eq!(
            answers,
            vec![Fact::new(
                symbols.named("plot1"),
                symbols.named("taxedTo"),
                symbols.named("alice")
            )]
        );
    }

    #[test]
    fn incremental_config_uses_the_network_engine() {
        let config = ReasonerConfig {
            mode: Mode::Forward,
            incremental: true,
            ..ReasonerConfig::default()
        };
        let mut r = Reasoner::new(config).unwrap();
        r.add_rules("[trans: (?a p ?b) (?b p ?c) -> (?a p ?c)]").unwrap();
        let mut ctx = r.bind().unwrap();
        add(&mut ctx, "a", "p", "b");
        add(&mut ctx, "b", "p", "c");
        ctx.prepare().unwrap();
        let ac = {
            let symbols = ctx.symbols();
            Fact::new(symbols.named("a"), symbols.named("p"), symbols.named("c"))
        };
        assert!(ctx.holds(&ac).unwrap());
        let bc = {
            let symbols = ctx.symbols();
            Fact::new(symbols.named("b"), symbols.named("p"), symbols.named("c"))
        };
        ctx.remove_fact(&bc).unwrap();
        assert!(!ctx.holds(&ac).unwrap());
    }

    #[test]
    fn axiom_preload_is_shared_between_contexts() {
        let r = reasoner(Mode::Forward, "[-> (sky color blue)]");
        let mut ctx1 = r.bind().unwrap();
        let mut ctx2 = r.bind().unwrap();
        let sky = {
            let symbols = r.symbols();
            Fact::new(symbols.named("sky"), symbols.named("color"), symbols.named("blue"))
        };
        assert!(ctx1.holds(&sky).unwrap());
        assert!(ctx2.holds(&sky).unwrap());
        // Context-private facts stay private.
        add(&mut ctx1, "a", "p", "b");
        let ab = {
            let symbols = r.symbols();
            Fact::new(symbols.named("a"), symbols.named("p"), symbols.named("b"))
        };
        assert!(ctx1.holds(&ab).unwrap());
        assert!(!ctx2.holds(&ab).unwrap());
    }

    #[test]
    fn table_directive_from_axiom_reaches_contexts() {
        let r = reasoner(Mode::Hybrid, "[-> table(reaches)]");
        let ctx = r.bind().unwrap();
        let reaches = ctx.symbols().named("reaches");
        assert!(ctx.state.is_tabled(reaches));
    }

    #[test]
    fn explain_renders_a_proof_tree() {
        let r = reasoner(Mode::Forward, "[trans: (?a p ?b) (?b p ?c) -> (?a p ?c)]");
        let mut ctx = r.bind().unwrap();
        add(&mut ctx, "a", "p", "b");
        add(&mut ctx, "b", "p", "c");
        ctx.prepare().unwrap();
        let symbols = Arc::clone(ctx.symbols());
        let ac = Fact::new(symbols.named("a"), symbols.named("p"), symbols.named("c"));
        let text = ctx.explain(&ac);
        assert!(text.contains("trans"), "explanation was: {text}");
        assert!(text.contains("(a p c)"));
    }

    #[test]
    fn config_validation_and_toml() {
        let err = ReasonerConfig::from_toml_str("firing_limit = 0").unwrap_err();
        assert!(matches!(
            err,
            crate::error::HekaError::Engine(EngineError::InvalidConfig { .. })
        ));
        let config =
            ReasonerConfig::from_toml_str("mode = \"Forward\"\nincremental = true\ntabled = [\"anc\"]")
                .unwrap();
        assert_eq!(config.mode, Mode::Forward);
        assert!(config.incremental);
        assert_eq!(config.tabled, vec!["anc".to_string()]);
        // Unknown keys are rejected.
        assert!(ReasonerConfig::from_toml_str("firing_limt = 10").is_err());
    }

    #[test]
    fn firing_limit_surfaces_from_prepare() {
        let config = ReasonerConfig {
            mode: Mode::Forward,
            firing_limit: 5,
            ..ReasonerConfig::default()
        };
        let mut r = Reasoner::new(config).unwrap();
        r.add_rules("[mint: (?x p ?y) -> (?y p ?z)]").unwrap();
        let mut ctx = r.bind().unwrap();
        add(&mut ctx, "a", "p", "b");
        let err = ctx.prepare().unwrap_err();
        assert!(matches!(
            err,
            crate::error::HekaError::Engine(EngineError::FiringLimitExceeded { limit: 5 })
        ));
    }
}
