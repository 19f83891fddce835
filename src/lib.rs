//! # heka
//!
//! A rule-based inference engine over subject/predicate/object triples,
//! with forward chaining, backward (goal-driven) resolution with tabling,
//! and a hybrid mode that lets forward rules synthesize backward rules.
//!
//! ## Architecture
//!
//! - **Terms and rules** (`term`, `parser`): interned triple patterns, guard
//!   calls, and a textual rule language with nested backward rules
//! - **Unification** (`bindings`, `unify`): a trail-based binding environment
//!   with pooled frames and undo-on-mismatch
//! - **Closure engines** (`infer`): naive fixpoint forward chaining plus an
//!   incremental network that supports fact retraction
//! - **Goal resolution** (`infer::backward`): tabled SLD-style resolution that
//!   terminates on cyclic rule sets
//! - **Builtins** (`builtins`): guard predicates, checked arithmetic, and
//!   head actions such as deterministic instance minting
//! - **Provenance** (`derivation`): per-deduction records and proof trees
//!
//! ## Library usage
//!
//! ```no_run
//! use heka::engine::{Reasoner, ReasonerConfig};
//! use heka::term::{Fact, Term, TriplePattern};
//!
//! let mut reasoner = Reasoner::new(ReasonerConfig::default()).unwrap();
//! reasoner
//!     .add_rules("[trans: (?a path ?b) (?b path ?c) -> (?a path ?c)]")
//!     .unwrap();
//!
//! let mut ctx = reasoner.bind().unwrap();
//! let symbols = std::sync::Arc::clone(ctx.symbols());
//! let (a, b, c) = (symbols.named("a"), symbols.named("b"), symbols.named("c"));
//! let path = symbols.named("path");
//! ctx.add_fact(Fact::new(a, path, b)).unwrap();
//! ctx.add_fact(Fact::new(b, path, c)).unwrap();
//!
//! let goal = TriplePattern::new(Term::Const(a), Term::Const(path), Term::Var(0));
//! for fact in ctx.infer(&goal).unwrap() {
//!     println!("{}", fact.unwrap().render(&symbols));
//! }
//! ```

pub mod bindings;
pub mod builtins;
pub mod derivation;
pub mod engine;
pub mod error;
pub mod infer;
pub mod parser;
pub mod store;
pub mod symbol;
pub mod term;
pub mod unify;
