//! Symbol interning for the heka engine.
//!
//! Every constant that can appear in a fact — named resources, integer and
//! string literals, and blank (existential) nodes — is interned to a
//! [`SymbolId`]. The engines only ever compare and hash ids; the
//! [`SymbolTable`] maps back to the underlying value for builtins and for
//! rendering. The [`AtomicSymbolAllocator`] provides thread-safe id
//! generation so a table can be shared across inference contexts.

use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::{HekaResult, SymbolError};

/// Unique, niche-optimized identifier for an interned constant.
///
/// Uses `NonZeroU64` so that `Option<SymbolId>` is the same size as
/// `SymbolId` (0 serves as the `None` discriminant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct SymbolId(NonZeroU64);

impl SymbolId {
    /// Create a `SymbolId` from a raw `u64`.
    ///
    /// Returns `None` if `raw` is zero.
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(SymbolId)
    }

    /// Get the underlying `u64` value.
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl std::fmt::Display for SymbolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sym:{}", self.0)
    }
}

/// The value an interned symbol stands for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolValue {
    /// A named resource (predicate, class, individual).
    Named(String),
    /// An integer literal.
    Int(i64),
    /// A string literal.
    Str(String),
    /// A blank node, minted for existential head variables and
    /// `makeInstance`-style builtins.
    Blank(u64),
}

impl std::fmt::Display for SymbolValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SymbolValue::Named(name) => write!(f, "{name}"),
            SymbolValue::Int(n) => write!(f, "{n}"),
            SymbolValue::Str(s) => write!(f, "{s:?}"),
            SymbolValue::Blank(n) => write!(f, "_:b{n}"),
        }
    }
}

/// Thread-safe symbol ID allocator.
///
/// Produces monotonically increasing IDs starting from 1.
#[derive(Debug)]
pub struct AtomicSymbolAllocator {
    next: AtomicU64,
}

impl AtomicSymbolAllocator {
    /// Create a new allocator that starts from ID 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocate the next symbol ID.
    ///
    /// Returns an error if the ID space is exhausted (after 2^64 - 1
    /// allocations).
    pub fn next_id(&self) -> HekaResult<SymbolId> {
        let raw = self.next.fetch_add(1, Ordering::Relaxed);
        SymbolId::new(raw).ok_or_else(|| SymbolError::AllocatorExhausted.into())
    }
}

impl Default for AtomicSymbolAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Two-way interning table mapping [`SymbolValue`]s to [`SymbolId`]s.
///
/// Interning is idempotent for named resources and literals: the same value
/// always yields the same id. Blank nodes are never looked up by value —
/// each call to [`SymbolTable::fresh_blank`] mints a new one.
#[derive(Debug, Default)]
pub struct SymbolTable {
    by_value: DashMap<SymbolValue, SymbolId>,
    by_id: DashMap<SymbolId, SymbolValue>,
    alloc: AtomicSymbolAllocator,
    next_blank: AtomicU64,
}

impl SymbolTable {
    /// Create a new empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a value, returning its stable id.
    pub fn intern(&self, value: SymbolValue) -> SymbolId {
        if let Some(id) = self.by_value.get(&value) {
            return *id.value();
        }
        // Racing interns of the same value may allocate two ids; the entry
        // API makes the first writer win so lookups stay consistent.
        let candidate = self.alloc.next_id().expect("symbol id space exhausted");
        let id = *self
            .by_value
            .entry(value.clone())
            .or_insert(candidate)
            .value();
        if id == candidate {
            self.by_id.insert(id, value);
        }
        id
    }

    /// Intern a named resource.
    pub fn named(&self, name: impl Into<String>) -> SymbolId {
        self.intern(SymbolValue::Named(name.into()))
    }

    /// Intern an integer literal.
    pub fn int(&self, n: i64) -> SymbolId {
        self.intern(SymbolValue::Int(n))
    }

    /// Intern a string literal.
    pub fn str(&self, s: impl Into<String>) -> SymbolId {
        self.intern(SymbolValue::Str(s.into()))
    }

    /// Mint a fresh blank node id (never equal to any previous symbol).
    pub fn fresh_blank(&self) -> SymbolId {
        let n = self.next_blank.fetch_add(1, Ordering::Relaxed);
        let value = SymbolValue::Blank(n);
        let id = self.alloc.next_id().expect("symbol id space exhausted");
        self.by_value.insert(value.clone(), id);
        self.by_id.insert(id, value);
        id
    }

    /// Look up the value behind an id.
    pub fn value_of(&self, id: SymbolId) -> Option<SymbolValue> {
        self.by_id.get(&id).map(|v| v.value().clone())
    }

    /// Look up the integer value behind an id, if it is an `Int` literal.
    pub fn int_of(&self, id: SymbolId) -> Option<i64> {
        match self.by_id.get(&id).map(|v| v.value().clone()) {
            Some(SymbolValue::Int(n)) => Some(n),
            _ => None,
        }
    }

    /// Look up an already-interned named resource without creating it.
    pub fn lookup_named(&self, name: &str) -> Option<SymbolId> {
        self.by_value
            .get(&SymbolValue::Named(name.to_string()))
            .map(|id| *id.value())
    }

    /// Render an id for display, falling back to `sym:N` for unknown ids.
    pub fn render(&self, id: SymbolId) -> String {
        match self.value_of(id) {
            Some(value) => value.to_string(),
            None => id.to_string(),
        }
    }

    /// Number of interned symbols.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// True if nothing has been interned yet.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_id_niche_optimization() {
        assert_eq!(
            std::mem::size_of::<Option<SymbolId>>(),
            std::mem::size_of::<SymbolId>()
        );
    }

    #[test]
    fn symbol_id_zero_is_none() {
        assert!(SymbolId::new(0).is_none());
        assert_eq!(SymbolId::new(42).unwrap().get(), 42);
    }

    #[test]
    fn intern_is_idempotent() {
        let table = SymbolTable::new();
        let a = table.named("parent");
        let b = table.named("parent");
        assert_eq!(a, b);
        assert_eq!(table.value_of(a), Some(SymbolValue::Named("parent".into())));
    }

    #[test]
    fn distinct_values_get_distinct_ids() {
        let table = SymbolTable::new();
        assert_ne!(table.named("a"), table.named("b"));
        assert_ne!(table.int(1), table.named("1"));
        assert_ne!(table.int(1), table.str("1"));
    }

    #[test]
    fn fresh_blanks_are_unique() {
        let table = SymbolTable::new();
        let a = table.fresh_blank();
        let b = table.fresh_blank();
        assert_ne!(a, b);
        assert!(matches!(table.value_of(a), Some(SymbolValue::Blank(_))));
    }

    #[test]
    fn int_of_round_trips() {
        let table = SymbolTable::new();
        let id = table.int(-7);
        assert_eq!(table.int_of(id), Some(-7));
        assert_eq!(table.int_of(table.named("x")), None);
    }

    #[test]
    fn lookup_named_does_not_create() {
        let table = SymbolTable::new();
        assert!(table.lookup_named("ghost").is_none());
        let id = table.named("ghost");
        assert_eq!(table.lookup_named("ghost"), Some(id));
    }

    #[test]
    fn render_falls_back_to_raw_id() {
        let table = SymbolTable::new();
        let unknown = SymbolId::new(9999).unwrap();
        assert_eq!(table.render(unknown), "sym:9999");
        let named = table.named("sky");
        assert_eq!(table.render(named), "sky");
    }
}
