use crate::Symbol;
use std::fmt::Display;

pub const TEMPORARY_PREFIX: &str = "tmp";

pub type BuildHasher = std::hash::BuildHasherDefault<rustc_hash::FxHasher>;
pub(crate) type HashMap<K, V> = hashbrown::HashMap<K, V, BuildHasher>;
pub(crate) type HEntry<'a, A, B> = hashbrown::hash_map::Entry<'a, A, B, BuildHasher>;
pub type IndexSet<K> = indexmap::IndexSet<K, BuildHasher>;

/// Displays the items of a list separated by the given string.
pub(crate) struct ListDisplay<'a, TS>(pub TS, pub &'a str);

impl<TS> Display for ListDisplay<'_, TS>
where
    TS: Clone + IntoIterator,
    TS::Item: Display,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut did_something = false;
        for item in self.0.clone().into_iter() {
            if did_something {
                f.write_str(self.1)?;
            }
            Display::fmt(&item, f)?;
            did_something = true;
        }
        Ok(())
    }
}

/// Generates the names of the intermediate arrays introduced while lowering,
/// `tmp0`, `tmp1`, ... in allocation order.
///
/// One table lives for one run, so every temporary in the emitted text is
/// distinct. The most recent name is remembered so that a following step can
/// read from the array the previous step wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTable {
    count: usize,
    reserved_string: String,
    last_emitted: Option<Symbol>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new(TEMPORARY_PREFIX.to_string())
    }
}

impl SymbolTable {
    pub fn new(reserved_string: String) -> Self {
        Self {
            count: 0,
            reserved_string,
            last_emitted: None,
        }
    }

    pub fn fresh(&mut self) -> Symbol {
        let name = Symbol::from(format!("{}{}", self.reserved_string, self.count).as_str());
        self.count += 1;
        self.last_emitted = Some(name);
        name
    }

    pub fn last_emitted(&self) -> Option<Symbol> {
        self.last_emitted
    }

    /// Whether `symbol` has the shape of a name this table hands out.
    pub fn is_reserved(&self, symbol: &str) -> bool {
        symbol
            .strip_prefix(self.reserved_string.as_str())
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
    }
}
