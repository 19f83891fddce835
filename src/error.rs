//! Rich diagnostic error types for the heka engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]`
//! derives, providing error codes and help text. Unification failure is
//! deliberately *not* an error anywhere in this crate — it is ordinary
//! control flow signalled by `bool` returns and handled by backtracking.
//! Only resource exhaustion and structural problems reach these types.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the heka engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full
/// diagnostic chain (error codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum HekaError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Symbol(#[from] SymbolError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Builtin(#[from] BuiltinError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Engine(#[from] EngineError),
}

// ---------------------------------------------------------------------------
// Symbol errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SymbolError {
    #[error("symbol allocator exhausted: cannot allocate more than u64::MAX symbols")]
    #[diagnostic(
        code(heka::symbol::exhausted),
        help(
            "The symbol ID space is exhausted. This requires 2^64 allocations \
             and indicates an allocation loop rather than real usage."
        )
    )]
    AllocatorExhausted,
}

// ---------------------------------------------------------------------------
// Rule errors (parse / structure)
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum RuleError {
    #[error("malformed rule at line {line}, column {column}: {message}")]
    #[diagnostic(
        code(heka::rule::malformed),
        help(
            "Rules look like `[name: (?a p ?b) (?b p ?c) -> (?a p ?c)]`. \
             Backward rules put the head on the left of `<-`. Check for \
             unbalanced brackets, a missing arrow, or a stray token."
        )
    )]
    Malformed {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("rule {rule} uses {used} variables but the frame limit is {limit}")]
    #[diagnostic(
        code(heka::rule::too_many_vars),
        help(
            "Each rule's variables live in a fixed-capacity binding frame. \
             Split the rule or raise `max_rule_vars` in the reasoner config."
        )
    )]
    TooManyVars {
        rule: String,
        used: usize,
        limit: usize,
    },

    #[error("nested rule in an illegal position in {rule}")]
    #[diagnostic(
        code(heka::rule::nested_rule_position),
        help(
            "A nested rule may only appear in the head of a forward rule, \
             and must itself be a backward rule."
        )
    )]
    NestedRulePosition { rule: String },
}

// ---------------------------------------------------------------------------
// Builtin errors
// ---------------------------------------------------------------------------

/// A builtin raised a genuine error (not a mere match failure) while a rule
/// was firing. Fatal to that firing and surfaced to the caller of the
/// enclosing inference operation.
#[derive(Debug, Error, Diagnostic)]
pub enum BuiltinError {
    #[error("builtin {name} failed in rule {rule}, clause {clause}: {message}")]
    #[diagnostic(
        code(heka::builtin::failed),
        help(
            "The builtin hit an unrecoverable condition (bad argument type, \
             arithmetic overflow, ...). Fix the rule or the data it matched."
        )
    )]
    Failed {
        name: String,
        rule: String,
        clause: usize,
        message: String,
    },

    #[error("builtin {name} invoked with {got} arguments, expected {expected}")]
    #[diagnostic(
        code(heka::builtin::arity),
        help("Check the functor call in the rule against the builtin's documented arity.")
    )]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("undefined builtin {name} invoked as a head action in rule {rule}")]
    #[diagnostic(
        code(heka::builtin::undefined_action),
        help(
            "Head-position functors must name a registered builtin. Register \
             one on the BuiltinRegistry or remove the head action. (An \
             undefined builtin in a *body* clause merely fails the clause.)"
        )
    )]
    UndefinedAction { name: String, rule: String },
}

// ---------------------------------------------------------------------------
// Engine errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("rule firing limit of {limit} exceeded during closure computation")]
    #[diagnostic(
        code(heka::engine::firing_limit),
        help(
            "The forward engine fired more rules than the configured \
             threshold, which usually means a non-terminating rule set \
             (e.g. rules that keep minting fresh blank nodes). Raise \
             `firing_limit` in ReasonerConfig if the rule set is genuinely \
             that large."
        )
    )]
    FiringLimitExceeded { limit: u64 },

    #[error("invalid configuration: {message}")]
    #[diagnostic(
        code(heka::engine::invalid_config),
        help("Check the ReasonerConfig fields. {message}")
    )]
    InvalidConfig { message: String },
}

/// Convenience alias for functions returning heka results.
pub type HekaResult<T> = std::result::Result<T, HekaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subsystem_errors_convert_to_heka_error() {
        let err = EngineError::FiringLimitExceeded { limit: 1 };
        let heka: HekaError = err.into();
        assert!(matches!(
            heka,
            HekaError::Engine(EngineError::FiringLimitExceeded { limit: 1 })
        ));
    }

    #[test]
    fn rule_error_display_carries_position() {
        let err = RuleError::Malformed {
            message: "expected '->'".into(),
            line: 3,
            column: 14,
        };
        let msg = format!("{err}");
        assert!(msg.contains("line 3"));
        assert!(msg.contains("column 14"));
    }

    #[test]
    fn builtin_error_identifies_rule_and_clause() {
        let err = BuiltinError::Failed {
            name: "sum".into(),
            rule: "r1".into(),
            clause: 2,
            message: "non-numeric argument".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("sum"));
        assert!(msg.contains("r1"));
        assert!(msg.contains("clause 2"));
    }
}
