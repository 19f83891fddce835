//! Derivation provenance: which rule produced a fact, from what.
//!
//! When derivation logging is enabled, every rule firing that asserts a
//! new fact records a [`Derivation`]. Records are keyed by conclusion and
//! never mutated; a fact reachable through several proofs carries several
//! records. The log forms a DAG over facts — antecedents are either base
//! facts or conclusions of earlier records.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::infer::RuleId;
use crate::store::Finder;
use crate::symbol::SymbolTable;
use crate::term::Fact;

/// Provenance record for one rule firing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Derivation {
    /// Handle of the rule that fired.
    pub rule: RuleId,
    /// The fact the firing asserted.
    pub conclusion: Fact,
    /// The ground body matches, in body-clause order.
    pub antecedents: Vec<Fact>,
}

impl Derivation {
    pub fn new(rule: RuleId, conclusion: Fact, antecedents: Vec<Fact>) -> Self {
        Self {
            rule,
            conclusion,
            antecedents,
        }
    }

    /// Render for traces and the CLI `explain` command.
    pub fn render(&self, symbols: &SymbolTable, rule_label: &str) -> String {
        let ants: Vec<String> = self.antecedents.iter().map(|f| f.render(symbols)).collect();
        format!(
            "{} <- {} [{}]",
            self.conclusion.render(symbols),
            ants.join(", "),
            rule_label
        )
    }
}

/// Append-only log of derivations, keyed by conclusion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DerivationLog {
    by_conclusion: HashMap<Fact, Vec<Derivation>>,
}

impl DerivationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a derivation. Duplicate records (same rule, same
    /// antecedents) are dropped so re-derivation during incremental
    /// maintenance does not inflate the log.
    pub fn record(&mut self, derivation: Derivation) {
        let entry = self.by_conclusion.entry(derivation.conclusion).or_default();
        if !entry.contains(&derivation) {
            entry.push(derivation);
        }
    }

    /// All derivations concluding the given fact.
    pub fn derivations_of(&self, fact: &Fact) -> &[Derivation] {
        self.by_conclusion
            .get(fact)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// True if at least one derivation concludes the fact.
    pub fn is_derived(&self, fact: &Fact) -> bool {
        self.by_conclusion.contains_key(fact)
    }

    /// Drop every record concluding the fact (used when a deduction is
    /// retracted).
    pub fn forget(&mut self, fact: &Fact) {
        self.by_conclusion.remove(fact);
    }

    /// Drop records that cite the fact as an antecedent, returning the
    /// conclusions that lost records.
    pub fn forget_citing(&mut self, fact: &Fact) -> Vec<Fact> {
        let mut touched = Vec::new();
        self.by_conclusion.retain(|conclusion, records| {
            let before = records.len();
            records.retain(|d| !d.antecedents.contains(fact));
            if records.len() != before {
                touched.push(*conclusion);
            }
            !records.is_empty()
        });
        touched
    }

    pub fn len(&self) -> usize {
        self.by_conclusion.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_conclusion.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_conclusion.clear();
    }

    /// Soundness check: every antecedent of every record is either a base
    /// fact or itself the conclusion of some record. Test support.
    pub fn is_sound(&self, base: &dyn Finder) -> bool {
        self.by_conclusion.values().flatten().all(|d| {
            d.antecedents
                .iter()
                .all(|a| base.contains(a) || self.is_derived(a))
        })
    }
}
