//! The standard builtin library.
//!
//! Guards (`bound`, `equal`, `lessThan`, ...) test the current bindings;
//! the arithmetic functors (`sum`, `difference`, `product`) compute over
//! integer literals and unify the result with their last argument; the
//! head actions (`table`, `tableAll`, `makeInstance`, `print`) adjust
//! engine state when a rule fires. `print` and `makeInstance` work in
//! both positions.

use std::sync::Arc;

use tracing::info;

use crate::error::BuiltinError;
use crate::symbol::SymbolId;
use crate::term::Term;
use crate::unify::unify;

use super::{Builtin, BuiltinContext, BuiltinRegistry, check_arity};

/// Register the whole library.
pub fn install(registry: &mut BuiltinRegistry) {
    registry.register(Arc::new(Bound));
    registry.register(Arc::new(Unbound));
    registry.register(Arc::new(Equal));
    registry.register(Arc::new(NotEqual));
    registry.register(Arc::new(LessThan));
    registry.register(Arc::new(GreaterThan));
    registry.register(Arc::new(Sum));
    registry.register(Arc::new(Difference));
    registry.register(Arc::new(Product));
    registry.register(Arc::new(MakeInstance));
    registry.register(Arc::new(Table));
    registry.register(Arc::new(TableAll));
    registry.register(Arc::new(Print));
}

/// Resolve an argument to an integer literal or fail with a diagnostic.
fn resolve_int(
    name: &str,
    arg: &Term,
    ctx: &BuiltinContext<'_>,
) -> Result<i64, BuiltinError> {
    let id = ctx
        .env
        .ground_const(arg)
        .ok_or_else(|| ctx.fail(name, format!("argument {arg} is not bound to a constant")))?;
    ctx.symbols.int_of(id).ok_or_else(|| {
        ctx.fail(
            name,
            format!("argument resolves to {} which is not an integer", ctx.symbols.render(id)),
        )
    })
}

/// Resolve an argument to any ground constant or fail.
fn resolve_const(
    name: &str,
    arg: &Term,
    ctx: &BuiltinContext<'_>,
) -> Result<SymbolId, BuiltinError> {
    ctx.env
        .ground_const(arg)
        .ok_or_else(|| ctx.fail(name, format!("argument {arg} is not bound to a constant")))
}

// ---------------------------------------------------------------------------
// Binding guards
// ---------------------------------------------------------------------------

/// `bound(?x, ...)` — true when every argument is ground under the
/// current bindings.
pub struct Bound;

impl Builtin for Bound {
    fn name(&self) -> &'static str {
        "bound"
    }

    fn eval(&self, args: &[Term], ctx: &mut BuiltinContext<'_>) -> Result<bool, BuiltinError> {
        Ok(args.iter().all(|a| ctx.env.resolve(a).is_ground()))
    }
}

/// `unbound(?x, ...)` — true when no argument is ground.
pub struct Unbound;

impl Builtin for Unbound {
    fn name(&self) -> &'static str {
        "unbound"
    }

    fn eval(&self, args: &[Term], ctx: &mut BuiltinContext<'_>) -> Result<bool, BuiltinError> {
        Ok(args.iter().all(|a| !ctx.env.resolve(a).is_ground()))
    }
}

// ---------------------------------------------------------------------------
// Comparison guards
// ---------------------------------------------------------------------------

/// `equal(?x, ?y)` — both arguments ground and identical.
pub struct Equal;

impl Builtin for Equal {
    fn name(&self) -> &'static str {
        "equal"
    }

    fn eval(&self, args: &[Term], ctx: &mut BuiltinContext<'_>) -> Result<bool, BuiltinError> {
        check_arity(self.name(), args, 2)?;
        let a = ctx.env.resolve(&args[0]);
        let b = ctx.env.resolve(&args[1]);
        Ok(a.is_ground() && b.is_ground() && a == b)
    }
}

/// `notEqual(?x, ?y)` — both arguments ground and distinct.
pub struct NotEqual;

impl Builtin for NotEqual {
    fn name(&self) -> &'static str {
        "notEqual"
    }

    fn eval(&self, args: &[Term], ctx: &mut BuiltinContext<'_>) -> Result<bool, BuiltinError> {
        check_arity(self.name(), args, 2)?;
        let a = ctx.env.resolve(&args[0]);
        let b = ctx.env.resolve(&args[1]);
        Ok(a.is_ground() && b.is_ground() && a != b)
    }
}

/// `lessThan(?x, ?y)` over integer literals.
pub struct LessThan;

impl Builtin for LessThan {
    fn name(&self) -> &'static str {
        "lessThan"
    }

    fn eval(&self, args: &[Term], ctx: &mut BuiltinContext<'_>) -> Result<bool, BuiltinError> {
        check_arity(self.name(), args, 2)?;
        let a = resolve_int(self.name(), &args[0], ctx)?;
        let b = resolve_int(self.name(), &args[1], ctx)?;
        Ok(a < b)
    }
}

/// `greaterThan(?x, ?y)` over integer literals.
pub struct GreaterThan;

impl Builtin for GreaterThan {
    fn name(&self) -> &'static str {
        "greaterThan"
    }

    fn eval(&self, args: &[Term], ctx: &mut BuiltinContext<'_>) -> Result<bool, BuiltinError> {
        check_arity(self.name(), args, 2)?;
        let a = resolve_int(self.name(), &args[0], ctx)?;
        let b = resolve_int(self.name(), &args[1], ctx)?;
        Ok(a > b)
    }
}

// ---------------------------------------------------------------------------
// Arithmetic
// ---------------------------------------------------------------------------

/// Shared shape of the three binary arithmetic builtins: compute over the
/// first two (ground integer) arguments and unify the result with the
/// third.
fn arith(
    name: &'static str,
    op: impl Fn(i64, i64) -> Option<i64>,
    args: &[Term],
    ctx: &mut BuiltinContext<'_>,
) -> Result<bool, BuiltinError> {
    check_arity(name, args, 3)?;
    let a = resolve_int(name, &args[0], ctx)?;
    let b = resolve_int(name, &args[1], ctx)?;
    let r = op(a, b).ok_or_else(|| ctx.fail(name, format!("integer overflow on {a} and {b}")))?;
    let result = Term::Const(ctx.symbols.int(r));
    Ok(unify(&args[2], &result, ctx.env))
}

/// `sum(?a, ?b, ?c)` — c = a + b.
pub struct Sum;

impl Builtin for Sum {
    fn name(&self) -> &'static str {
        "sum"
    }

    fn eval(&self, args: &[Term], ctx: &mut BuiltinContext<'_>) -> Result<bool, BuiltinError> {
        arith(self.name(), i64::checked_add, args, ctx)
    }
}

/// `difference(?a, ?b, ?c)` — c = a - b.
pub struct Difference;

impl Builtin for Difference {
    fn name(&self) -> &'static str {
        "difference"
    }

    fn eval(&self, args: &[Term], ctx: &mut BuiltinContext<'_>) -> Result<bool, BuiltinError> {
        arith(self.name(), i64::checked_sub, args, ctx)
    }
}

/// `product(?a, ?b, ?c)` — c = a * b.
pub struct Product;

impl Builtin for Product {
    fn name(&self) -> &'static str {
        "product"
    }

    fn eval(&self, args: &[Term], ctx: &mut BuiltinContext<'_>) -> Result<bool, BuiltinError> {
        arith(self.name(), i64::checked_mul, args, ctx)
    }
}

// ---------------------------------------------------------------------------
// Instance minting
// ---------------------------------------------------------------------------

/// `makeInstance(?subject, ?property, ?class, ?instance)` (the three-arg
/// form omits the class).
///
/// Binds the instance argument to a blank node that is deterministic per
/// (subject, property, class): asking twice yields the same blank, so
/// re-running a rule never mints duplicate instances.
pub struct MakeInstance;

impl MakeInstance {
    fn mint(
        &self,
        args: &[Term],
        ctx: &mut BuiltinContext<'_>,
    ) -> Result<bool, BuiltinError> {
        if args.len() != 3 && args.len() != 4 {
            return Err(BuiltinError::Arity {
                name: self.name().to_string(),
                expected: 4,
                got: args.len(),
            });
        }
        let subject = resolve_const(self.name(), &args[0], ctx)?;
        let property = resolve_const(self.name(), &args[1], ctx)?;
        // Without a class argument the property doubles as the cache key's
        // class slot.
        let class = if args.len() == 4 {
            resolve_const(self.name(), &args[2], ctx)?
        } else {
            property
        };
        let instance_arg = args.last().expect("arity checked above");

        let key = (subject, property, class);
        let blank = match ctx.instance_cache.get(&key) {
            Some(&id) => id,
            None => {
                let id = ctx.symbols.fresh_blank();
                ctx.instance_cache.insert(key, id);
                id
            }
        };
        Ok(unify(instance_arg, &Term::Const(blank), ctx.env))
    }
}

impl Builtin for MakeInstance {
    fn name(&self) -> &'static str {
        "makeInstance"
    }

    fn eval(&self, args: &[Term], ctx: &mut BuiltinContext<'_>) -> Result<bool, BuiltinError> {
        self.mint(args, ctx)
    }

    fn head_action(&self, args: &[Term], ctx: &mut BuiltinContext<'_>) -> Result<(), BuiltinError> {
        if self.mint(args, ctx)? {
            Ok(())
        } else {
            Err(ctx.fail(self.name(), "instance argument is bound to a different value"))
        }
    }
}

// ---------------------------------------------------------------------------
// Tabling directives
// ---------------------------------------------------------------------------

/// `table(p, ...)` head action — mark predicates for tabling in the
/// backward engine.
pub struct Table;

impl Builtin for Table {
    fn name(&self) -> &'static str {
        "table"
    }

    fn head_action(&self, args: &[Term], ctx: &mut BuiltinContext<'_>) -> Result<(), BuiltinError> {
        for arg in args {
            let id = resolve_const(self.name(), arg, ctx)?;
            ctx.tabled.insert(id);
        }
        Ok(())
    }
}

/// `tableAll()` head action — table every predicate.
pub struct TableAll;

impl Builtin for TableAll {
    fn name(&self) -> &'static str {
        "tableAll"
    }

    fn head_action(&self, args: &[Term], ctx: &mut BuiltinContext<'_>) -> Result<(), BuiltinError> {
        check_arity(self.name(), args, 0)?;
        *ctx.table_all = true;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// `print(?x, ...)` — log the resolved arguments. Always succeeds.
pub struct Print;

impl Print {
    fn render(&self, args: &[Term], ctx: &BuiltinContext<'_>) -> String {
        args.iter()
            .map(|a| match ctx.env.resolve(a) {
                Term::Const(id) => ctx.symbols.render(id),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Builtin for Print {
    fn name(&self) -> &'static str {
        "print"
    }

    fn eval(&self, args: &[Term], ctx: &mut BuiltinContext<'_>) -> Result<bool, BuiltinError> {
        info!(rule = ctx.rule, "print: {}", self.render(args, ctx));
        Ok(true)
    }

    fn head_action(&self, args: &[Term], ctx: &mut BuiltinContext<'_>) -> Result<(), BuiltinError> {
        info!(rule = ctx.rule, "print: {}", self.render(args, ctx));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::test_support::ContextParts;

    #[test]
    fn bound_and_unbound_track_bindings() {
        let mut parts = ContextParts::new(2);
        let a = parts.symbols.named("a");
        parts.env.bind(0, Term::Const(a));
        let mut ctx = parts.ctx();
        assert!(Bound.eval(&[Term::Var(0)], &mut ctx).unwrap());
        assert!(!Bound.eval(&[Term::Var(0), Term::Var(1)], &mut ctx).unwrap());
        assert!(Unbound.eval(&[Term::Var(1)], &mut ctx).unwrap());
        assert!(!Unbound.eval(&[Term::Var(0)], &mut ctx).unwrap());
    }

    #[test]
    fn equality_guards_require_ground_args() {
        let mut parts = ContextParts::new(1);
        let a = Term::Const(parts.symbols.named("a"));
        let b = Term::Const(parts.symbols.named("b"));
        let mut ctx = parts.ctx();
        assert!(Equal.eval(&[a.clone(), a.clone()], &mut ctx).unwrap());
        assert!(!Equal.eval(&[a.clone(), b.clone()], &mut ctx).unwrap());
        assert!(NotEqual.eval(&[a.clone(), b.clone()], &mut ctx).unwrap());
        // An unbound variable satisfies neither guard.
        assert!(!Equal.eval(&[a.clone(), Term::Var(0)], &mut ctx).unwrap());
        assert!(!NotEqual.eval(&[a, Term::Var(0)], &mut ctx).unwrap());
    }

    #[test]
    fn comparisons_are_integer_only() {
        let mut parts = ContextParts::new(0);
        let one = Term::Const(parts.symbols.int(1));
        let two = Term::Const(parts.symbols.int(2));
        let name = Term::Const(parts.symbols.named("two"));
        let mut ctx = parts.ctx();
        assert!(LessThan.eval(&[one.clone(), two.clone()], &mut ctx).unwrap());
        assert!(!GreaterThan.eval(&[one.clone(), two.clone()], &mut ctx).unwrap());
        let err = LessThan.eval(&[one, name], &mut ctx).unwrap_err();
        assert!(matches!(err, BuiltinError::Failed { .. }));
    }

    #[test]
    fn sum_binds_or_checks_result() {
        let mut parts = ContextParts::new(1);
        let two = Term::Const(parts.symbols.int(2));
        let three = Term::Const(parts.symbols.int(3));
        let five = Term::Const(parts.symbols.int(5));
        {
            let mut ctx = parts.ctx();
            assert!(Sum.eval(&[two.clone(), three.clone(), Term::Var(0)], &mut ctx).unwrap());
        }
        assert_eq!(parts.env.resolve(&Term::Var(0)), five);
        let mut ctx = parts.ctx();
        // Re-checking against the bound result succeeds; a wrong constant fails.
        assert!(Sum.eval(&[two.clone(), three.clone(), five], &mut ctx).unwrap());
        assert!(!Sum.eval(&[two.clone(), three, two], &mut ctx).unwrap());
    }

    #[test]
    fn difference_and_product_compute() {
        let mut parts = ContextParts::new(2);
        let seven = Term::Const(parts.symbols.int(7));
        let three = Term::Const(parts.symbols.int(3));
        {
            let mut ctx = parts.ctx();
            assert!(
                Difference
                    .eval(&[seven.clone(), three.clone(), Term::Var(0)], &mut ctx)
                    .unwrap()
            );
            assert!(Product.eval(&[seven, three, Term::Var(1)], &mut ctx).unwrap());
        }
        assert_eq!(parts.env.resolve(&Term::Var(0)), Term::Const(parts.symbols.int(4)));
        assert_eq!(parts.env.resolve(&Term::Var(1)), Term::Const(parts.symbols.int(21)));
    }

    #[test]
    fn arity_errors_are_reported() {
        let mut parts = ContextParts::new(0);
        let mut ctx = parts.ctx();
        let err = Sum.eval(&[Term::Wildcard], &mut ctx).unwrap_err();
        assert!(matches!(err, BuiltinError::Arity { got: 1, .. }));
    }

    #[test]
    fn make_instance_is_deterministic_per_key() {
        let mut parts = ContextParts::new(3);
        let s = Term::Const(parts.symbols.named("widget"));
        let p = Term::Const(parts.symbols.named("hasColor"));
        let c = Term::Const(parts.symbols.named("Color"));
        {
            let mut ctx = parts.ctx();
            assert!(
                MakeInstance
                    .mint(&[s.clone(), p.clone(), c.clone(), Term::Var(0)], &mut ctx)
                    .unwrap()
            );
            assert!(
                MakeInstance
                    .mint(&[s.clone(), p.clone(), c.clone(), Term::Var(1)], &mut ctx)
                    .unwrap()
            );
            // The three-arg form keys differently from the four-arg form.
            assert!(
                MakeInstance
                    .mint(&[s.clone(), p.clone(), Term::Var(2)], &mut ctx)
                    .unwrap()
            );
        }
        let first = parts.env.resolve(&Term::Var(0));
        assert_eq!(first, parts.env.resolve(&Term::Var(1)));
        assert_ne!(first, parts.env.resolve(&Term::Var(2)));
    }

    #[test]
    fn make_instance_requires_bound_subject() {
        let mut parts = ContextParts::new(2);
        let p = Term::Const(parts.symbols.named("hasColor"));
        let mut ctx = parts.ctx();
        let err = MakeInstance
            .mint(&[Term::Var(0), p, Term::Var(1)], &mut ctx)
            .unwrap_err();
        assert!(matches!(err, BuiltinError::Failed { .. }));
    }

    #[test]
    fn table_directives_mutate_engine_state() {
        let mut parts = ContextParts::new(0);
        let p = parts.symbols.named("ancestor");
        let arg = Term::Const(p);
        {
            let mut ctx = parts.ctx();
            Table.head_action(&[arg], &mut ctx).unwrap();
            TableAll.head_action(&[], &mut ctx).unwrap();
        }
        assert!(parts.tabled.contains(&p));
        assert!(parts.table_all);
    }

    #[test]
    fn table_rejects_body_use() {
        let mut parts = ContextParts::new(0);
        let mut ctx = parts.ctx();
        let err = Table.eval(&[], &mut ctx).unwrap_err();
        assert!(matches!(err, BuiltinError::UndefinedAction { .. }));
    }

    #[test]
    fn print_always_succeeds() {
        let mut parts = ContextParts::new(1);
        let a = Term::Const(parts.symbols.named("a"));
        let mut ctx = parts.ctx();
        assert!(Print.eval(&[a.clone(), Term::Var(0)], &mut ctx).unwrap());
        Print.head_action(&[a], &mut ctx).unwrap();
    }
}
