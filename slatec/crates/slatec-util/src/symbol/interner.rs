//! Global string table backed by `DashMap`.
//!
//! The table maps string hashes to interned entries and keeps a reverse
//! index-to-string map so [`Symbol::as_str`] stays O(1). Interned strings
//! are heap-allocated once and leaked to obtain the `'static` lifetime;
//! the table lives for the whole process, so nothing is ever reclaimed.

use ahash::AHasher;
use dashmap::DashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::LazyLock;

use super::Symbol;

/// The global string table, initialized on first use.
///
/// Language keywords, builtin type names, and operator spellings are
/// pre-interned so they carry stable low indices across runs.
pub static STRING_TABLE: LazyLock<StringTable> = LazyLock::new(|| {
    let table = StringTable::new();
    table.intern_known_strings();
    table
});

/// Strings the compiler interns eagerly at startup.
///
/// Covers the Slate keywords, the builtin type names bound in the root
/// scope, the overloadable operator spellings (operator methods are bound
/// under their spelling), and the handful of well-known member names.
const KNOWN_STRINGS: &[&str] = &[
    // Keywords
    "fn", "let", "const", "class", "extends", "namespace", "alias", "static",
    "if", "else", "while", "for", "in", "return", "break", "as", "asm",
    "true", "false", "null", "this",
    // Builtin type names
    "void", "bool", "i8", "i16", "i32", "i64", "u8", "u16", "u32", "u64",
    "f32", "f64",
    // Overloadable operator spellings
    "+", "-", "*", "/", "%", "!", "~", "^", "|", "&",
    "+=", "-=", "*=", "/=", "%=", "^=", "|=", "&=",
    "==", "!=", "<", "<=", ">", ">=",
    "[]", "->", ".",
    "<<", ">>", ">>>", "<<=", ">>=", ">>>=",
    // Well-known member names
    "@constructor", "@destructor", "cast", "next",
];

/// Thread-safe string table.
///
/// Forward lookups go hash -> (string, index); collisions are resolved by
/// probing with a golden-ratio offset. The reverse map keeps index -> str.
pub struct StringTable {
    map: DashMap<u64, (&'static str, u32)>,
    by_index: DashMap<u32, &'static str>,
    next_index: AtomicU32,
}

impl StringTable {
    fn new() -> Self {
        Self {
            map: DashMap::with_capacity(256),
            by_index: DashMap::with_capacity(256),
            next_index: AtomicU32::new(0),
        }
    }

    fn intern_known_strings(&self) {
        for s in KNOWN_STRINGS {
            self.intern(s);
        }
    }

    /// Intern a string, returning its symbol.
    pub fn intern(&self, string: &str) -> Symbol {
        let hash = Self::hash_string(string);

        // Fast path: already interned under its primary hash.
        if let Some(entry) = self.map.get(&hash) {
            if entry.value().0 == string {
                return Symbol::from_index(entry.value().1);
            }
            // Hash collision with a different string.
            return self.intern_probed(string, hash);
        }

        match self.map.entry(hash) {
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                if entry.get().0 == string {
                    Symbol::from_index(entry.get().1)
                } else {
                    self.intern_probed(string, hash)
                }
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let (interned, idx) = self.allocate(string);
                entry.insert((interned, idx));
                Symbol::from_index(idx)
            }
        }
    }

    /// Look up the string behind a symbol.
    ///
    /// # Panics
    ///
    /// Panics if the symbol did not come from this table.
    pub fn get(&self, symbol: Symbol) -> &'static str {
        self.by_index
            .get(&symbol.index())
            .map(|entry| *entry.value())
            .expect("symbol index not present in string table")
    }

    /// Number of distinct interned strings.
    pub fn len(&self) -> usize {
        self.by_index.len()
    }

    /// Collision path: probe alternative slots derived from the hash.
    fn intern_probed(&self, string: &str, original_hash: u64) -> Symbol {
        const PROBE_OFFSET: u64 = 0x9e37_79b9_7f4a_7c15;

        for i in 1u64.. {
            let probe_hash = original_hash.wrapping_add(i.wrapping_mul(PROBE_OFFSET));

            match self.map.entry(probe_hash) {
                dashmap::mapref::entry::Entry::Occupied(entry) => {
                    if entry.get().0 == string {
                        return Symbol::from_index(entry.get().1);
                    }
                }
                dashmap::mapref::entry::Entry::Vacant(entry) => {
                    let (interned, idx) = self.allocate(string);
                    entry.insert((interned, idx));
                    return Symbol::from_index(idx);
                }
            }
        }
        unreachable!("probe sequence is unbounded")
    }

    fn allocate(&self, string: &str) -> (&'static str, u32) {
        let interned: &'static str = Box::leak(string.to_string().into_boxed_str());
        let idx = self.next_index.fetch_add(1, Ordering::Relaxed);
        self.by_index.insert(idx, interned);
        (interned, idx)
    }

    fn hash_string(string: &str) -> u64 {
        let mut hasher = AHasher::default();
        string.hash(&mut hasher);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_grows_on_new_strings() {
        let before = STRING_TABLE.len();
        STRING_TABLE.intern("definitely_a_fresh_string_for_this_test");
        assert!(STRING_TABLE.len() > before.saturating_sub(1));
    }

    #[test]
    fn known_strings_resolve() {
        for s in KNOWN_STRINGS {
            assert_eq!(STRING_TABLE.intern(s).as_str(), *s);
        }
    }
}
