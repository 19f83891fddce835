//! Rule text parser.
//!
//! Grammar (whitespace and commas separate tokens, `#` and `//` start
//! line comments):
//!
//! ```text
//! [transitive: (?a p ?b) (?b p ?c) -> (?a p ?c)]
//! [ancestor:   (?a ancestor ?b) <- (?a parent ?c) (?c ancestor ?b)]
//! [adults:     (?x age ?n) greaterThan(?n, 17) -> (?x status adult)]
//! [setup:      (?c owns ?p) -> [(?p ownedBy ?c) <- (?p exists yes)]]
//! ```
//!
//! Forward rules read body `->` head; backward rules put the head on the
//! LEFT of `<-`. `?name` is a variable, `_` a wildcard, bare identifiers
//! (optionally namespaced like `rdf:type`) are named constants, and
//! integer or quoted-string tokens are literals. A bracketed rule inside
//! a forward head is a nested backward rule sharing the enclosing rule's
//! variable frame.

use std::collections::HashMap;

use crate::error::RuleError;
use crate::symbol::SymbolTable;
use crate::term::{ClauseEntry, Fact, Functor, Rule, Term, TriplePattern};

/// Default cap on variables per rule frame.
pub const DEFAULT_MAX_VARS: usize = 64;

/// Parse a rule source text with the default variable limit.
pub fn parse_rules(src: &str, symbols: &SymbolTable) -> Result<Vec<Rule>, RuleError> {
    parse_rules_with_limit(src, symbols, DEFAULT_MAX_VARS)
}

/// Parse a rule source text, capping each rule's variable frame.
pub fn parse_rules_with_limit(
    src: &str,
    symbols: &SymbolTable,
    max_vars: usize,
) -> Result<Vec<Rule>, RuleError> {
    let tokens = lex(src)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        symbols,
        max_vars,
    };
    parser.parse_all()
}

/// Parse a single triple pattern such as `(?x ancestor ?y)`.
///
/// Variables are numbered in first-occurrence order, so the result can be
/// fed straight to a query.
pub fn parse_pattern(src: &str, symbols: &SymbolTable) -> Result<TriplePattern, RuleError> {
    let tokens = lex(src)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        symbols,
        max_vars: DEFAULT_MAX_VARS,
    };
    let mut vars = VarMap::new();
    parser.expect(&Tok::LParen)?;
    let subject = parser.parse_term(&mut vars)?;
    let predicate = parser.parse_term(&mut vars)?;
    let object = parser.parse_term(&mut vars)?;
    parser.expect(&Tok::RParen)?;
    if parser.peek().is_some() {
        return Err(parser.error("trailing input after pattern"));
    }
    Ok(TriplePattern::new(subject, predicate, object))
}

/// Parse a fact file: a sequence of ground patterns, one per triple,
/// with the same comment syntax as rule files.
pub fn parse_facts(src: &str, symbols: &SymbolTable) -> Result<Vec<Fact>, RuleError> {
    let tokens = lex(src)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        symbols,
        max_vars: DEFAULT_MAX_VARS,
    };
    let mut facts = Vec::new();
    while parser.peek().is_some() {
        let mut vars = VarMap::new();
        parser.expect(&Tok::LParen)?;
        let subject = parser.parse_term(&mut vars)?;
        let predicate = parser.parse_term(&mut vars)?;
        let object = parser.parse_term(&mut vars)?;
        parser.expect(&Tok::RParen)?;
        let pattern = TriplePattern::new(subject, predicate, object);
        let Some(fact) = pattern.to_fact() else {
            return Err(parser.error("facts must be ground (no variables or wildcards)"));
        };
        facts.push(fact);
    }
    Ok(facts)
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    LBracket,
    RBracket,
    LParen,
    RParen,
    Arrow,
    BackArrow,
    Colon,
    Ident(String),
    Var(String),
    Wildcard,
    Int(i64),
    Str(String),
}

impl std::fmt::Display for Tok {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tok::LBracket => write!(f, "'['"),
            Tok::RBracket => write!(f, "']'"),
            Tok::LParen => write!(f, "'('"),
            Tok::RParen => write!(f, "')'"),
            Tok::Arrow => write!(f, "'->'"),
            Tok::BackArrow => write!(f, "'<-'"),
            Tok::Colon => write!(f, "':'"),
            Tok::Ident(s) => write!(f, "'{s}'"),
            Tok::Var(v) => write!(f, "'?{v}'"),
            Tok::Wildcard => write!(f, "'_'"),
            Tok::Int(n) => write!(f, "'{n}'"),
            Tok::Str(s) => write!(f, "{s:?}"),
        }
    }
}

#[derive(Debug, Clone)]
struct Spanned {
    tok: Tok,
    line: usize,
    column: usize,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
}

impl Lexer<'_> {
    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> RuleError {
        RuleError::Malformed {
            message: message.into(),
            line: self.line,
            column: self.column,
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn lex(src: &str) -> Result<Vec<Spanned>, RuleError> {
    let mut lx = Lexer {
        chars: src.chars().peekable(),
        line: 1,
        column: 1,
    };
    let mut out = Vec::new();
    while let Some(&c) = lx.chars.peek() {
        let (line, column) = (lx.line, lx.column);
        let mut emit = |tok| {
            out.push(Spanned { tok, line, column });
        };
        match c {
            ' ' | '\t' | '\r' | '\n' | ',' => {
                lx.bump();
            }
            '#' => {
                while lx.chars.peek().is_some_and(|&c| c != '\n') {
                    lx.bump();
                }
            }
            '/' => {
                lx.bump();
                if lx.chars.peek() == Some(&'/') {
                    while lx.chars.peek().is_some_and(|&c| c != '\n') {
                        lx.bump();
                    }
                } else {
                    return Err(lx.error("unexpected '/': comments start with '//' or '#'"));
                }
            }
            '[' => {
                lx.bump();
                emit(Tok::LBracket);
            }
            ']' => {
                lx.bump();
                emit(Tok::RBracket);
            }
            '(' => {
                lx.bump();
                emit(Tok::LParen);
            }
            ')' => {
                lx.bump();
                emit(Tok::RParen);
            }
            ':' => {
                lx.bump();
                emit(Tok::Colon);
            }
            '<' => {
                lx.bump();
                if lx.chars.peek() == Some(&'-') {
                    lx.bump();
                    emit(Tok::BackArrow);
                } else {
                    return Err(lx.error("unexpected '<': expected '<-'"));
                }
            }
            '-' => {
                lx.bump();
                match lx.chars.peek() {
                    Some('>') => {
                        lx.bump();
                        emit(Tok::Arrow);
                    }
                    Some(d) if d.is_ascii_digit() => {
                        let n = lex_int(&mut lx)?;
                        emit(Tok::Int(-n));
                    }
                    _ => return Err(lx.error("unexpected '-': expected '->' or a negative integer")),
                }
            }
            '?' => {
                lx.bump();
                let name = lex_ident(&mut lx);
                if name.is_empty() {
                    return Err(lx.error("expected a variable name after '?'"));
                }
                emit(Tok::Var(name));
            }
            '\'' | '"' => {
                let quote = c;
                lx.bump();
                let s = lex_string(&mut lx, quote)?;
                emit(Tok::Str(s));
            }
            c if c.is_ascii_digit() => {
                let n = lex_int(&mut lx)?;
                emit(Tok::Int(n));
            }
            c if is_ident_start(c) => {
                let name = lex_ident(&mut lx);
                if name == "_" {
                    emit(Tok::Wildcard);
                } else {
                    emit(Tok::Ident(name));
                }
            }
            other => {
                return Err(lx.error(format!("unexpected character {other:?}")));
            }
        }
    }
    Ok(out)
}

fn lex_ident(lx: &mut Lexer<'_>) -> String {
    let mut name = String::new();
    while let Some(&c) = lx.chars.peek() {
        if is_ident_char(c) {
            name.push(c);
            lx.bump();
        } else if c == ':' {
            // Namespaced names like `rdf:type`: the colon joins the ident
            // only when an ident character follows, otherwise it is the
            // rule-name separator.
            let mut ahead = lx.chars.clone();
            ahead.next();
            if ahead.peek().is_some_and(|&c| is_ident_char(c)) {
                name.push(':');
                lx.bump();
            } else {
                break;
            }
        } else {
            break;
        }
    }
    name
}

fn lex_int(lx: &mut Lexer<'_>) -> Result<i64, RuleError> {
    let mut digits = String::new();
    while let Some(&c) = lx.chars.peek() {
        if c.is_ascii_digit() {
            digits.push(c);
            lx.bump();
        } else {
            break;
        }
    }
    digits
        .parse::<i64>()
        .map_err(|_| lx.error(format!("integer literal {digits} out of range")))
}

fn lex_string(lx: &mut Lexer<'_>, quote: char) -> Result<String, RuleError> {
    let mut s = String::new();
    loop {
        match lx.bump() {
            None => return Err(lx.error("unterminated string literal")),
            Some(c) if c == quote => return Ok(s),
            Some('\\') => match lx.bump() {
                Some('n') => s.push('\n'),
                Some('t') => s.push('\t'),
                Some('\\') => s.push('\\'),
                Some(c) if c == quote => s.push(c),
                _ => return Err(lx.error("unsupported escape in string literal")),
            },
            Some(c) => s.push(c),
        }
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser<'a> {
    tokens: Vec<Spanned>,
    pos: usize,
    symbols: &'a SymbolTable,
    max_vars: usize,
}

/// Variable name to frame index, in first-occurrence order. Shared by a
/// top-level rule and any rules nested in its head.
type VarMap = HashMap<String, usize>;

impl Parser<'_> {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|s| &s.tok)
    }

    fn peek2(&self) -> Option<&Tok> {
        self.tokens.get(self.pos + 1).map(|s| &s.tok)
    }

    fn next(&mut self) -> Option<Spanned> {
        let s = self.tokens.get(self.pos).cloned();
        if s.is_some() {
            self.pos += 1;
        }
        s
    }

    fn here(&self) -> (usize, usize) {
        match self.tokens.get(self.pos).or_else(|| self.tokens.last()) {
            Some(s) => (s.line, s.column),
            None => (1, 1),
        }
    }

    fn error(&self, message: impl Into<String>) -> RuleError {
        let (line, column) = self.here();
        RuleError::Malformed {
            message: message.into(),
            line,
            column,
        }
    }

    fn expect(&mut self, want: &Tok) -> Result<(), RuleError> {
        match self.next() {
            Some(s) if s.tok == *want => Ok(()),
            Some(s) => Err(RuleError::Malformed {
                message: format!("expected {want}, found {}", s.tok),
                line: s.line,
                column: s.column,
            }),
            None => Err(self.error(format!("expected {want}, found end of input"))),
        }
    }

    fn parse_all(&mut self) -> Result<Vec<Rule>, RuleError> {
        let mut rules = Vec::new();
        while self.peek().is_some() {
            self.expect(&Tok::LBracket)?;
            let mut vars = VarMap::new();
            let rule = self.parse_rule(&mut vars)?;
            if rule.num_vars > self.max_vars {
                return Err(RuleError::TooManyVars {
                    rule: rule.label().to_string(),
                    used: rule.num_vars,
                    limit: self.max_vars,
                });
            }
            rules.push(rule);
        }
        Ok(rules)
    }

    /// Parse the inside of a `[...]` rule; the opening bracket is already
    /// consumed.
    fn parse_rule(&mut self, vars: &mut VarMap) -> Result<Rule, RuleError> {
        let name = match (self.peek(), self.peek2()) {
            (Some(Tok::Ident(n)), Some(Tok::Colon)) => {
                let n = n.clone();
                self.next();
                self.next();
                Some(n)
            }
            _ => None,
        };

        let first = self.parse_clause_list(vars)?;
        let backward = match self.next() {
            Some(s) if s.tok == Tok::Arrow => false,
            Some(s) if s.tok == Tok::BackArrow => true,
            Some(s) => {
                return Err(RuleError::Malformed {
                    message: format!("expected '->' or '<-', found {}", s.tok),
                    line: s.line,
                    column: s.column,
                });
            }
            None => return Err(self.error("expected '->' or '<-', found end of input")),
        };
        let second = self.parse_clause_list(vars)?;
        self.expect(&Tok::RBracket)?;

        let (head, body) = if backward { (first, second) } else { (second, first) };
        let rule = Rule {
            name,
            head,
            body,
            backward,
            num_vars: vars.len(),
        };
        validate_nested(&rule)?;
        Ok(rule)
    }

    fn parse_clause_list(&mut self, vars: &mut VarMap) -> Result<Vec<ClauseEntry>, RuleError> {
        let mut clauses = Vec::new();
        loop {
            match self.peek() {
                Some(Tok::LParen) => {
                    self.next();
                    let subject = self.parse_term(vars)?;
                    let predicate = self.parse_term(vars)?;
                    let object = self.parse_term(vars)?;
                    self.expect(&Tok::RParen)?;
                    clauses.push(ClauseEntry::Pattern(TriplePattern::new(
                        subject, predicate, object,
                    )));
                }
                Some(Tok::LBracket) => {
                    self.next();
                    let nested = self.parse_rule(vars)?;
                    clauses.push(ClauseEntry::NestedRule(Box::new(nested)));
                }
                Some(Tok::Ident(_)) if self.peek2() == Some(&Tok::LParen) => {
                    let functor = self.parse_functor(vars)?;
                    clauses.push(ClauseEntry::Call(functor));
                }
                _ => break,
            }
        }
        if clauses.is_empty() {
            // An axiom rule has an empty left side (`-> (a p b)`), which is
            // legal; an empty right side is caught by the bracket check.
            match self.peek() {
                Some(Tok::Arrow) | Some(Tok::BackArrow) | Some(Tok::RBracket) => {}
                _ => return Err(self.error("expected a clause, '->', '<-', or ']'")),
            }
        }
        Ok(clauses)
    }

    fn parse_functor(&mut self, vars: &mut VarMap) -> Result<Functor, RuleError> {
        let name = match self.next() {
            Some(Spanned {
                tok: Tok::Ident(n), ..
            }) => self.symbols.named(n),
            _ => return Err(self.error("expected a functor name")),
        };
        self.expect(&Tok::LParen)?;
        let mut args = Vec::new();
        while self.peek() != Some(&Tok::RParen) {
            if self.peek().is_none() {
                return Err(self.error("unterminated functor argument list"));
            }
            args.push(self.parse_term(vars)?);
        }
        self.next();
        Ok(Functor::new(name, args))
    }

    fn parse_term(&mut self, vars: &mut VarMap) -> Result<Term, RuleError> {
        match self.peek() {
            Some(Tok::Var(_)) => {
                let Some(Spanned {
                    tok: Tok::Var(name), ..
                }) = self.next()
                else {
                    unreachable!("peeked variable token");
                };
                let next_index = vars.len();
                let index = *vars.entry(name).or_insert(next_index);
                Ok(Term::Var(index))
            }
            Some(Tok::Wildcard) => {
                self.next();
                Ok(Term::Wildcard)
            }
            Some(Tok::Int(n)) => {
                let id = self.symbols.int(*n);
                self.next();
                Ok(Term::Const(id))
            }
            Some(Tok::Str(s)) => {
                let id = self.symbols.str(s.clone());
                self.next();
                Ok(Term::Const(id))
            }
            Some(Tok::Ident(_)) if self.peek2() == Some(&Tok::LParen) => {
                Ok(Term::Functor(self.parse_functor(vars)?))
            }
            Some(Tok::Ident(n)) => {
                let id = self.symbols.named(n.clone());
                self.next();
                Ok(Term::Const(id))
            }
            Some(other) => Err(self.error(format!("expected a term, found {other}"))),
            None => Err(self.error("expected a term, found end of input")),
        }
    }
}

/// Nested rules may only appear in the head of a forward rule, and must
/// themselves be backward rules.
fn validate_nested(rule: &Rule) -> Result<(), RuleError> {
    let illegal = |r: &Rule| RuleError::NestedRulePosition {
        rule: r.label().to_string(),
    };
    for clause in &rule.body {
        if matches!(clause, ClauseEntry::NestedRule(_)) {
            return Err(illegal(rule));
        }
    }
    for clause in &rule.head {
        if let ClauseEntry::NestedRule(nested) = clause {
            if rule.backward || !nested.backward {
                return Err(illegal(rule));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(src: &str, symbols: &SymbolTable) -> Rule {
        let mut rules = parse_rules(src, symbols).expect("parse failed");
        assert_eq!(rules.len(), 1);
        rules.pop().unwrap()
    }

    #[test]
    fn forward_rule_with_shared_variables() {
        let t = SymbolTable::new();
        let rule = parse_one("[trans: (?a p ?b) (?b p ?c) -> (?a p ?c)]", &t);
        assert_eq!(rule.name.as_deref(), Some("trans"));
        assert!(!rule.backward);
        assert_eq!(rule.num_vars, 3);
        assert_eq!(rule.body.len(), 2);
        // ?b gets the same index in both body clauses.
        let (Some(ClauseEntry::Pattern(first)), Some(ClauseEntry::Pattern(second))) =
            (rule.body.first(), rule.body.get(1))
        else {
            panic!("expected two body patterns");
        };
        assert_eq!(first.object, second.subject);
        let Some(ClauseEntry::Pattern(head)) = rule.head.first() else {
            panic!("expected a pattern head");
        };
        assert_eq!(head.subject, first.subject);
        assert_eq!(head.object, second.object);
    }

    #[test]
    fn backward_rule_head_is_left_of_arrow() {
        let t = SymbolTable::new();
        let rule = parse_one("[(?a ancestor ?b) <- (?a parent ?b)]", &t);
        assert!(rule.backward);
        assert!(rule.name.is_none());
        let anc = t.lookup_named("ancestor").unwrap();
        let Some(ClauseEntry::Pattern(head)) = rule.head.first() else {
            panic!("expected a pattern head");
        };
        assert_eq!(head.predicate, Term::Const(anc));
    }

    #[test]
    fn guards_literals_and_wildcards() {
        let t = SymbolTable::new();
        let rule = parse_one(
            "[adult: (?x age ?n) greaterThan(?n, 17) (_ class 'person') -> (?x status adult)]",
            &t,
        );
        assert_eq!(rule.body.len(), 3);
        let Some(ClauseEntry::Call(guard)) = rule.body.get(1) else {
            panic!("expected a guard clause");
        };
        assert_eq!(guard.name, t.lookup_named("greaterThan").unwrap());
        assert_eq!(guard.args[1], Term::Const(t.int(17)));
        let Some(ClauseEntry::Pattern(third)) = rule.body.get(2) else {
            panic!("expected a pattern");
        };
        assert_eq!(third.subject, Term::Wildcard);
        assert_eq!(third.object, Term::Const(t.str("person")));
    }

    #[test]
    fn comments_and_multiple_rules() {
        let t = SymbolTable::new();
        let src = "
            # transitivity
            [r1: (?a p ?b) (?b p ?c) -> (?a p ?c)]
            // symmetry
            [r2: (?a p ?b) -> (?b p ?a)]
        ";
        let rules = parse_rules(src, &t).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[1].name.as_deref(), Some("r2"));
    }

    #[test]
    fn namespaced_names_and_negative_ints() {
        let t = SymbolTable::new();
        let rule = parse_one("[(?x rdf:type Thing) sum(?n -3 ?m) -> (?x ok yes)]", &t);
        assert!(t.lookup_named("rdf:type").is_some());
        let Some(ClauseEntry::Call(call)) = rule.body.get(1) else {
            panic!("expected a call");
        };
        assert_eq!(call.args[1], Term::Const(t.int(-3)));
    }

    #[test]
    fn axiom_has_empty_body() {
        let t = SymbolTable::new();
        let rule = parse_one("[-> (sky color blue)]", &t);
        assert!(rule.is_axiom());
        assert!(!rule.backward);
        assert_eq!(rule.num_vars, 0);
    }

    #[test]
    fn nested_backward_rule_in_forward_head() {
        let t = SymbolTable::new();
        let rule = parse_one(
            "[setup: (?c owns ?p) -> [(?p ownedBy ?c) <- (?p exists yes)]]",
            &t,
        );
        assert!(!rule.backward);
        let Some(ClauseEntry::NestedRule(nested)) = rule.head.first() else {
            panic!("expected a nested rule head");
        };
        assert!(nested.backward);
        // The nested rule shares the enclosing frame: ?c and ?p keep their
        // outer indices.
        assert_eq!(rule.num_vars, 2);
        assert_eq!(nested.num_vars, 2);
    }

    #[test]
    fn nested_rule_in_body_is_rejected() {
        let t = SymbolTable::new();
        let err = parse_rules("[bad: [(?a q ?b) <- (?a r ?b)] -> (?a s ?b)]", &t).unwrap_err();
        assert!(matches!(err, RuleError::NestedRulePosition { .. }));
    }

    #[test]
    fn nested_forward_rule_is_rejected() {
        let t = SymbolTable::new();
        let err = parse_rules("[bad: (?a p ?b) -> [(?a q ?b) -> (?a r ?b)]]", &t).unwrap_err();
        assert!(matches!(err, RuleError::NestedRulePosition { .. }));
    }

    #[test]
    fn malformed_rule_reports_position() {
        let t = SymbolTable::new();
        let err = parse_rules("[r1: (?a p ?b) (?a q ?b)]", &t).unwrap_err();
        match err {
            RuleError::Malformed { message, line, .. } => {
                assert!(message.contains("'->'"), "message was: {message}");
                assert_eq!(line, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unterminated_string_is_rejected() {
        let t = SymbolTable::new();
        let err = parse_rules("[(?x p 'oops) -> (?x q ok)]", &t).unwrap_err();
        assert!(matches!(err, RuleError::Malformed { .. }));
    }

    #[test]
    fn variable_limit_is_enforced() {
        let t = SymbolTable::new();
        let err =
            parse_rules_with_limit("[big: (?a p ?b) (?c p ?d) -> (?a p ?d)]", &t, 3).unwrap_err();
        match err {
            RuleError::TooManyVars { rule, used, limit } => {
                assert_eq!(rule, "big");
                assert_eq!(used, 4);
                assert_eq!(limit, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn display_round_trip_reparses() {
        let t = SymbolTable::new();
        let rule = parse_one("[trans: (?a p ?b) (?b p ?c) -> (?a p ?c)]", &t);
        // Display uses ?vN variable names and sym:N constants, so a strict
        // round trip is not possible; check the shape instead.
        let text = rule.to_string();
        assert!(text.starts_with("[trans: "));
        assert!(text.contains(" -> "));
    }

    #[test]
    fn pattern_numbers_variables_in_order() {
        let t = SymbolTable::new();
        let p = parse_pattern("(?x knows ?y)", &t).unwrap();
        assert_eq!(p.subject, Term::Var(0));
        assert_eq!(p.predicate, Term::Const(t.named("knows")));
        assert_eq!(p.object, Term::Var(1));

        let err = parse_pattern("(?x knows ?y) extra", &t).unwrap_err();
        assert!(matches!(err, RuleError::Malformed { .. }));
    }

    #[test]
    fn fact_files_must_be_ground() {
        let t = SymbolTable::new();
        let facts = parse_facts("# people\n(ida mother joe)\n(joe age 41)", &t).unwrap();
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0].subject, t.named("ida"));
        assert_eq!(facts[1].object, t.int(41));

        let err = parse_facts("(ida mother ?who)", &t).unwrap_err();
        assert!(matches!(err, RuleError::Malformed { .. }));
    }
}
