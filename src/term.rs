//! Core term and rule model.
//!
//! A [`Term`] is a tagged union over interned constants, rule variables
//! (indices into a rule's binding frame), wildcards, and flat compound
//! terms ([`Functor`]s). Patterns over terms form [`TriplePattern`]s;
//! fully ground patterns collapse to [`Fact`]s, which are what the stores
//! index and the engines derive. [`Rule`]s are head/body sequences of
//! [`ClauseEntry`]s with a shared variable frame.

use serde::{Deserialize, Serialize};

use crate::symbol::{SymbolId, SymbolTable};

// ---------------------------------------------------------------------------
// Terms
// ---------------------------------------------------------------------------

/// A term in a pattern or rule clause.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Term {
    /// An interned constant (named resource, literal, or blank node).
    Const(SymbolId),
    /// A rule variable, identified by its index in the rule's binding frame.
    Var(usize),
    /// Matches anything, never binds.
    Wildcard,
    /// A flat compound term, used as structured literal data or as a
    /// builtin invocation.
    Functor(Functor),
}

impl Term {
    /// True if this term contains no variables or wildcards.
    pub fn is_ground(&self) -> bool {
        match self {
            Term::Const(_) => true,
            Term::Var(_) | Term::Wildcard => false,
            Term::Functor(f) => f.args.iter().all(Term::is_ground),
        }
    }

    /// The constant behind this term, if it is one.
    pub fn as_const(&self) -> Option<SymbolId> {
        match self {
            Term::Const(id) => Some(*id),
            _ => None,
        }
    }

    /// Shift every variable index in this term by `offset`.
    ///
    /// Used to rename one rule's variables apart from another's when both
    /// share a binding frame (goal/rule-head unification in the backward
    /// engine).
    pub fn shift_vars(&self, offset: usize) -> Term {
        match self {
            Term::Var(i) => Term::Var(i + offset),
            Term::Functor(f) => Term::Functor(Functor {
                name: f.name,
                args: f.args.iter().map(|a| a.shift_vars(offset)).collect(),
            }),
            other => other.clone(),
        }
    }

    /// Largest variable index in this term plus one, or 0 if none.
    pub fn var_span(&self) -> usize {
        match self {
            Term::Var(i) => i + 1,
            Term::Functor(f) => f.args.iter().map(Term::var_span).max().unwrap_or(0),
            _ => 0,
        }
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Term::Const(id) => write!(f, "{id}"),
            Term::Var(i) => write!(f, "?v{i}"),
            Term::Wildcard => write!(f, "_"),
            Term::Functor(func) => write!(f, "{func}"),
        }
    }
}

/// A named, flat compound term.
///
/// Arguments are never themselves functors when the functor is dispatched
/// as a builtin; one level of nesting is tolerated for structured literal
/// data only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Functor {
    /// Interned functor name (doubles as the builtin lookup key).
    pub name: SymbolId,
    /// Positional arguments.
    pub args: Vec<Term>,
}

impl Functor {
    pub fn new(name: SymbolId, args: Vec<Term>) -> Self {
        Self { name, args }
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }
}

impl std::fmt::Display for Functor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ")")
    }
}

// ---------------------------------------------------------------------------
// Patterns and facts
// ---------------------------------------------------------------------------

/// A subject/predicate/object pattern over [`Term`]s.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriplePattern {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl TriplePattern {
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    /// True if all three positions are ground.
    pub fn is_ground(&self) -> bool {
        self.subject.is_ground() && self.predicate.is_ground() && self.object.is_ground()
    }

    /// Collapse to a [`Fact`] if every position is a plain constant.
    pub fn to_fact(&self) -> Option<Fact> {
        Some(Fact::new(
            self.subject.as_const()?,
            self.predicate.as_const()?,
            self.object.as_const()?,
        ))
    }

    /// Shift every variable index by `offset` (see [`Term::shift_vars`]).
    pub fn shift_vars(&self, offset: usize) -> TriplePattern {
        TriplePattern {
            subject: self.subject.shift_vars(offset),
            predicate: self.predicate.shift_vars(offset),
            object: self.object.shift_vars(offset),
        }
    }

    /// Largest variable index used plus one.
    pub fn var_span(&self) -> usize {
        self.subject
            .var_span()
            .max(self.predicate.var_span())
            .max(self.object.var_span())
    }
}

impl std::fmt::Display for TriplePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} {} {})", self.subject, self.predicate, self.object)
    }
}

impl From<Fact> for TriplePattern {
    fn from(fact: Fact) -> Self {
        TriplePattern::new(
            Term::Const(fact.subject),
            Term::Const(fact.predicate),
            Term::Const(fact.object),
        )
    }
}

/// A ground triple: the unit of storage and derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fact {
    pub subject: SymbolId,
    pub predicate: SymbolId,
    pub object: SymbolId,
}

impl Fact {
    pub fn new(subject: SymbolId, predicate: SymbolId, object: SymbolId) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    /// Render using the symbol table's labels.
    pub fn render(&self, symbols: &SymbolTable) -> String {
        format!(
            "({} {} {})",
            symbols.render(self.subject),
            symbols.render(self.predicate),
            symbols.render(self.object)
        )
    }
}

impl std::fmt::Display for Fact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} {} {})", self.subject, self.predicate, self.object)
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// One entry in a rule head or body.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClauseEntry {
    /// A triple pattern to match (body) or assert (head).
    Pattern(TriplePattern),
    /// A builtin invocation: guard in a body, action in a head.
    Call(Functor),
    /// A rule embedded in a forward rule's head; when the enclosing rule
    /// fires, the nested rule is instantiated with the firing's bindings
    /// and registered as a backward rule.
    NestedRule(Box<Rule>),
}

impl std::fmt::Display for ClauseEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClauseEntry::Pattern(p) => write!(f, "{p}"),
            ClauseEntry::Call(c) => write!(f, "{c}"),
            ClauseEntry::NestedRule(r) => write!(f, "{r}"),
        }
    }
}

/// An inference rule.
///
/// Variable indices are unique per rule and consistent between head and
/// body (the parser assigns them in first-occurrence order). Multiple head
/// entries are shorthand for multiple single-head rules sharing one body.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    /// Optional rule name, used in traces, stats and error messages.
    pub name: Option<String>,
    pub head: Vec<ClauseEntry>,
    pub body: Vec<ClauseEntry>,
    /// True for goal-directed rules (`head <- body` notation).
    pub backward: bool,
    /// Size of the binding frame this rule needs.
    pub num_vars: usize,
}

impl Rule {
    /// Display name for traces and diagnostics.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<anon>")
    }

    /// True if the rule has no body clauses (an axiom).
    pub fn is_axiom(&self) -> bool {
        self.body.is_empty()
    }

    /// Iterate the body triple patterns with their clause indices.
    pub fn body_patterns(&self) -> impl Iterator<Item = (usize, &TriplePattern)> {
        self.body.iter().enumerate().filter_map(|(i, c)| match c {
            ClauseEntry::Pattern(p) => Some((i, p)),
            _ => None,
        })
    }
}

fn write_clauses(f: &mut std::fmt::Formatter<'_>, clauses: &[ClauseEntry]) -> std::fmt::Result {
    for (i, c) in clauses.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{c}")?;
    }
    Ok(())
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        if let Some(name) = &self.name {
            write!(f, "{name}: ")?;
        }
        if self.backward {
            write_clauses(f, &self.head)?;
            write!(f, " <- ")?;
            write_clauses(f, &self.body)?;
        } else {
            write_clauses(f, &self.body)?;
            write!(f, " -> ")?;
            write_clauses(f, &self.head)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::SymbolTable;

    fn sym(table: &SymbolTable, name: &str) -> SymbolId {
        table.named(name)
    }

    #[test]
    fn ground_pattern_collapses_to_fact() {
        let t = SymbolTable::new();
        let (a, p, b) = (sym(&t, "a"), sym(&t, "p"), sym(&t, "b"));
        let pat = TriplePattern::new(Term::Const(a), Term::Const(p), Term::Const(b));
        assert!(pat.is_ground());
        assert_eq!(pat.to_fact(), Some(Fact::new(a, p, b)));
    }

    #[test]
    fn variable_pattern_is_not_ground() {
        let t = SymbolTable::new();
        let p = sym(&t, "p");
        let pat = TriplePattern::new(Term::Var(0), Term::Const(p), Term::Wildcard);
        assert!(!pat.is_ground());
        assert_eq!(pat.to_fact(), None);
    }

    #[test]
    fn shift_vars_renames_apart() {
        let pat = TriplePattern::new(Term::Var(0), Term::Var(1), Term::Wildcard);
        let shifted = pat.shift_vars(5);
        assert_eq!(shifted.subject, Term::Var(5));
        assert_eq!(shifted.predicate, Term::Var(6));
        assert_eq!(shifted.object, Term::Wildcard);
        assert_eq!(shifted.var_span(), 7);
    }

    #[test]
    fn functor_ground_check_recurses() {
        let t = SymbolTable::new();
        let f = Functor::new(sym(&t, "sum"), vec![Term::Const(t.int(1)), Term::Var(0)]);
        assert!(!Term::Functor(f.clone()).is_ground());
        let g = Functor::new(sym(&t, "sum"), vec![Term::Const(t.int(1))]);
        assert!(Term::Functor(g).is_ground());
    }

    #[test]
    fn rule_display_round_trips_notation() {
        let t = SymbolTable::new();
        let p = sym(&t, "p");
        let body = vec![ClauseEntry::Pattern(TriplePattern::new(
            Term::Var(0),
            Term::Const(p),
            Term::Var(1),
        ))];
        let head = vec![ClauseEntry::Pattern(TriplePattern::new(
            Term::Var(1),
            Term::Const(p),
            Term::Var(0),
        ))];
        let fwd = Rule {
            name: Some("sym".into()),
            head: head.clone(),
            body: body.clone(),
            backward: false,
            num_vars: 2,
        };
        assert!(fwd.to_string().contains(" -> "));
        let bwd = Rule {
            name: None,
            head,
            body,
            backward: true,
            num_vars: 2,
        };
        assert!(bwd.to_string().contains(" <- "));
    }

    #[test]
    fn axiom_detection() {
        let t = SymbolTable::new();
        let (a, p, b) = (sym(&t, "a"), sym(&t, "p"), sym(&t, "b"));
        let rule = Rule {
            name: None,
            head: vec![ClauseEntry::Pattern(TriplePattern::new(
                Term::Const(a),
                Term::Const(p),
                Term::Const(b),
            ))],
            body: vec![],
            backward: false,
            num_vars: 0,
        };
        assert!(rule.is_axiom());
    }
}
