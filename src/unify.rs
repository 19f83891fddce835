//! Pattern unification and fact matching.
//!
//! Two layers. The raw unifier ([`unify`], [`unify_patterns`]) walks terms
//! position-wise and records bindings in the caller's [`BindingStack`]; it
//! never unwinds, so a failed sub-unification leaves its partial bindings
//! visible until the caller rolls back to its own checkpoint. The
//! checkpointed helper [`match_fact`] wraps one pattern-vs-fact attempt in
//! a push/commit/unwind cycle, which is what the engines call in their
//! inner loops.

use crate::bindings::BindingStack;
use crate::term::{Fact, Term, TriplePattern};

/// Unify two terms under the current bindings.
///
/// - constants unify with equal constants;
/// - a wildcard unifies with anything and never binds;
/// - an unbound variable binds to the other side; a bound one is resolved
///   and unified recursively (terms are acyclic, no occurs-check);
/// - two distinct unbound variables are aliased: the higher frame index is
///   bound to the lower, deterministically;
/// - functors unify per-name, per-arity, then argument-wise in order.
///
/// Returns `false` on mismatch without undoing bindings already made.
pub fn unify(a: &Term, b: &Term, env: &mut BindingStack) -> bool {
    let ra = env.resolve(a);
    let rb = env.resolve(b);
    match (&ra, &rb) {
        (Term::Wildcard, _) | (_, Term::Wildcard) => true,
        (Term::Const(x), Term::Const(y)) => x == y,
        (Term::Var(i), Term::Var(j)) => {
            if i == j {
                // A bound variable against itself, or the same unbound slot.
                true
            } else if i < j {
                env.bind(*j, Term::Var(*i))
            } else {
                env.bind(*i, Term::Var(*j))
            }
        }
        (Term::Var(i), other) => env.bind(*i, other.clone()),
        (other, Term::Var(j)) => env.bind(*j, other.clone()),
        (Term::Functor(fa), Term::Functor(fb)) => {
            if fa.name != fb.name || fa.args.len() != fb.args.len() {
                return false;
            }
            fa.args
                .iter()
                .zip(fb.args.iter())
                .all(|(x, y)| unify(x, y, env))
        }
        (Term::Functor(_), Term::Const(_)) | (Term::Const(_), Term::Functor(_)) => false,
    }
}

/// Unify two triple patterns position-wise.
///
/// Follows the same no-unwind contract as [`unify`]: the caller owns the
/// checkpoint.
pub fn unify_patterns(a: &TriplePattern, b: &TriplePattern, env: &mut BindingStack) -> bool {
    unify(&a.predicate, &b.predicate, env)
        && unify(&a.object, &b.object, env)
        && unify(&a.subject, &b.subject, env)
}

/// Match one pattern position against a ground symbol.
pub fn match_term(pattern: &Term, value: crate::symbol::SymbolId, env: &mut BindingStack) -> bool {
    match pattern {
        Term::Wildcard => true,
        Term::Const(id) => *id == value,
        Term::Var(i) => match env.get(*i).cloned() {
            None => env.bind(*i, Term::Const(value)),
            Some(bound) => match env.resolve(&bound) {
                Term::Const(id) => id == value,
                // Bound to another still-unbound variable: ground that one.
                Term::Var(j) => env.bind(j, Term::Const(value)),
                _ => false,
            },
        },
        // Facts hold plain symbols; a functor pattern never matches one.
        Term::Functor(_) => false,
    }
}

/// Test a pattern against a ground fact with checkpoint discipline:
/// bindings are committed on success and unwound on failure.
///
/// Predicate is matched first, then object, then subject — predicates
/// discriminate fastest in rule bodies.
pub fn match_fact(pattern: &TriplePattern, fact: &Fact, env: &mut BindingStack) -> bool {
    env.push();
    let ok = match_term(&pattern.predicate, fact.predicate, env)
        && match_term(&pattern.object, fact.object, env)
        && match_term(&pattern.subject, fact.subject, env);
    if ok {
        env.commit();
    } else {
        env.unwind();
    }
    ok
}
