//! Fact storage boundary.
//!
//! The engines consume a graph-like store only through the [`Finder`]
//! capability (indexed partial-pattern lookup) and mutate one through
//! [`FactStore`]. The bundled [`MemFactStore`] is a triple-indexed
//! in-memory implementation; a context typically layers several stores —
//! shared preload, base facts, private deductions — behind a
//! [`UnionFinder`].

use std::collections::{BTreeSet, HashMap};

use crate::symbol::SymbolId;
use crate::term::Fact;

/// A partial lookup pattern: any subset of subject/predicate/object bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FactQuery {
    pub subject: Option<SymbolId>,
    pub predicate: Option<SymbolId>,
    pub object: Option<SymbolId>,
}

impl FactQuery {
    pub fn new(
        subject: Option<SymbolId>,
        predicate: Option<SymbolId>,
        object: Option<SymbolId>,
    ) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    /// Query matching every fact.
    pub fn any() -> Self {
        Self::default()
    }

    /// True if the fact agrees with every bound position.
    pub fn matches(&self, fact: &Fact) -> bool {
        self.subject.is_none_or(|s| s == fact.subject)
            && self.predicate.is_none_or(|p| p == fact.predicate)
            && self.object.is_none_or(|o| o == fact.object)
    }
}

impl From<Fact> for FactQuery {
    fn from(fact: Fact) -> Self {
        FactQuery::new(Some(fact.subject), Some(fact.predicate), Some(fact.object))
    }
}

/// Indexed pattern lookup over a set of facts.
pub trait Finder {
    /// All facts matching the query. Deterministic order (subject,
    /// predicate, object ascending) so engine runs are reproducible.
    fn find(&self, query: &FactQuery) -> Vec<Fact>;

    /// Membership test; implementations with indexes should override.
    fn contains(&self, fact: &Fact) -> bool {
        !self.find(&FactQuery::from(*fact)).is_empty()
    }
}

/// A mutable fact store: the add/remove capability used by forward
/// assertion, retraction, and side-effecting builtins.
pub trait FactStore: Finder {
    /// Insert a fact. Returns `false` if it was already present.
    fn add(&mut self, fact: Fact) -> bool;

    /// Remove a fact. Returns `false` if it was absent.
    fn remove(&mut self, fact: &Fact) -> bool;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Triple-indexed in-memory fact store.
///
/// Maintains per-position indexes so a `find` can start from the most
/// selective bound position. `BTreeSet`s keep iteration order stable.
#[derive(Debug, Clone, Default)]
pub struct MemFactStore {
    facts: BTreeSet<Fact>,
    by_subject: HashMap<SymbolId, BTreeSet<Fact>>,
    by_predicate: HashMap<SymbolId, BTreeSet<Fact>>,
    by_object: HashMap<SymbolId, BTreeSet<Fact>>,
}

impl MemFactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Iterate every stored fact in order.
    pub fn iter(&self) -> impl Iterator<Item = &Fact> {
        self.facts.iter()
    }

    /// Drop all facts and indexes.
    pub fn clear(&mut self) {
        self.facts.clear();
        self.by_subject.clear();
        self.by_predicate.clear();
        self.by_object.clear();
    }

    fn narrowest_index(&self, query: &FactQuery) -> Option<&BTreeSet<Fact>> {
        let mut candidates: Vec<&BTreeSet<Fact>> = Vec::with_capacity(3);
        if let Some(s) = query.subject {
            candidates.push(self.by_subject.get(&s).unwrap_or(&EMPTY));
        }
        if let Some(p) = query.predicate {
            candidates.push(self.by_predicate.get(&p).unwrap_or(&EMPTY));
        }
        if let Some(o) = query.object {
            candidates.push(self.by_object.get(&o).unwrap_or(&EMPTY));
        }
        candidates.into_iter().min_by_key(|set| set.len())
    }
}

static EMPTY: BTreeSet<Fact> = BTreeSet::new();

impl Finder for MemFactStore {
    fn find(&self, query: &FactQuery) -> Vec<Fact> {
        match self.narrowest_index(query) {
            Some(index) => index
                .iter()
                .filter(|f| query.matches(f))
                .copied()
                .collect(),
            None => self.facts.iter().copied().collect(),
        }
    }

    fn contains(&self, fact: &Fact) -> bool {
        self.facts.contains(fact)
    }
}

impl FactStore for MemFactStore {
    fn add(&mut self, fact: Fact) -> bool {
        if !self.facts.insert(fact) {
            return false;
        }
        self.by_subject.entry(fact.subject).or_default().insert(fact);
        self.by_predicate
            .entry(fact.predicate)
            .or_default()
            .insert(fact);
        self.by_object.entry(fact.object).or_default().insert(fact);
        true
    }

    fn remove(&mut self, fact: &Fact) -> bool {
        if !self.facts.remove(fact) {
            return false;
        }
        if let Some(set) = self.by_subject.get_mut(&fact.subject) {
            set.remove(fact);
        }
        if let Some(set) = self.by_predicate.get_mut(&fact.predicate) {
            set.remove(fact);
        }
        if let Some(set) = self.by_object.get_mut(&fact.object) {
            set.remove(fact);
        }
        true
    }
}

impl FromIterator<Fact> for MemFactStore {
    fn from_iter<I: IntoIterator<Item = Fact>>(iter: I) -> Self {
        let mut store = MemFactStore::new();
        for fact in iter {
            store.add(fact);
        }
        store
    }
}

// ---------------------------------------------------------------------------
// Union view
// ---------------------------------------------------------------------------

/// Read-only union of several finders, deduplicated.
///
/// Parts are consulted in registration order; the first occurrence of a
/// fact wins, so preload facts shadow identical base/deduction copies.
pub struct UnionFinder<'a> {
    parts: Vec<&'a dyn Finder>,
}

impl<'a> UnionFinder<'a> {
    pub fn new(parts: Vec<&'a dyn Finder>) -> Self {
        Self { parts }
    }
}

impl Finder for UnionFinder<'_> {
    fn find(&self, query: &FactQuery) -> Vec<Fact> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for part in &self.parts {
            for fact in part.find(query) {
                if seen.insert(fact) {
                    out.push(fact);
                }
            }
        }
        out
    }

    fn contains(&self, fact: &Fact) -> bool {
        self.parts.iter().any(|p| p.contains(fact))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::SymbolTable;

    fn facts(table: &SymbolTable, triples: &[(&str, &str, &str)]) -> Vec<Fact> {
        triples
            .iter()
            .map(|(s, p, o)| Fact::new(table.named(*s), table.named(*p), table.named(*o)))
            .collect()
    }

    #[test]
    fn add_is_idempotent() {
        let t = SymbolTable::new();
        let mut store = MemFactStore::new();
        let f = facts(&t, &[("a", "p", "b")])[0];
        assert!(store.add(f));
        assert!(!store.add(f));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn find_supports_all_partial_patterns() {
        let t = SymbolTable::new();
        let store: MemFactStore = facts(&t, &[("a", "p", "b"), ("a", "q", "c"), ("d", "p", "b")])
            .into_iter()
            .collect();
        let a = t.named("a");
        let p = t.named("p");
        let b = t.named("b");

        assert_eq!(store.find(&FactQuery::any()).len(), 3);
        assert_eq!(store.find(&FactQuery::new(Some(a), None, None)).len(), 2);
        assert_eq!(store.find(&FactQuery::new(None, Some(p), None)).len(), 2);
        assert_eq!(store.find(&FactQuery::new(None, None, Some(b))).len(), 2);
        assert_eq!(
            store.find(&FactQuery::new(Some(a), Some(p), Some(b))).len(),
            1
        );
        assert_eq!(
            store
                .find(&FactQuery::new(Some(a), Some(p), Some(t.named("zzz"))))
                .len(),
            0
        );
    }

    #[test]
    fn multi_bound_queries_scan_the_smallest_index() {
        let t = SymbolTable::new();
        let store: MemFactStore = facts(
            &t,
            &[("a", "p", "b"), ("a", "p", "c"), ("a", "q", "b"), ("d", "p", "c")],
        )
        .into_iter()
        .collect();
        // Subject index for `a` holds three facts, object index for `c`
        // holds two; either way the filtered result must be the same.
        let q = FactQuery::new(Some(t.named("a")), None, Some(t.named("c")));
        assert_eq!(store.find(&q), facts(&t, &[("a", "p", "c")]));
        // All three positions bound, one of them unindexed.
        let q = FactQuery::new(Some(t.named("a")), Some(t.named("p")), Some(t.named("nope")));
        assert!(store.find(&q).is_empty());
    }

    #[test]
    fn remove_updates_indexes() {
        let t = SymbolTable::new();
        let all = facts(&t, &[("a", "p", "b"), ("a", "p", "c")]);
        let mut store: MemFactStore = all.iter().copied().collect();
        assert!(store.remove(&all[0]));
        assert!(!store.remove(&all[0]));
        let a = t.named("a");
        assert_eq!(store.find(&FactQuery::new(Some(a), None, None)), vec![all[1]]);
    }

    #[test]
    fn union_finder_deduplicates() {
        let t = SymbolTable::new();
        let shared = facts(&t, &[("a", "p", "b")]);
        let base: MemFactStore = shared.iter().copied().collect();
        let deductions: MemFactStore = facts(&t, &[("a", "p", "b"), ("b", "p", "c")])
            .into_iter()
            .collect();
        let union = UnionFinder::new(vec![&base, &deductions]);
        assert_eq!(union.find(&FactQuery::any()).len(), 2);
        assert!(union.contains(&shared[0]));
    }

    #[test]
    fn find_order_is_deterministic() {
        let t = SymbolTable::new();
        let all = facts(&t, &[("c", "p", "d"), ("a", "p", "b"), ("b", "p", "c")]);
        let store: MemFactStore = all.iter().copied().collect();
        let first = store.find(&FactQuery::any());
        let second = store.find(&FactQuery::any());
        assert_eq!(first, second);
        let mut sorted = first.clone();
        sorted.sort();
        assert_eq!(first, sorted, "results come back in fact order");
    }
}
