//! Identifier names and fresh-name generation.
//!
//! Names are [`SmolStr`]s: cheap to clone, inline for short identifiers.
//! Passes that introduce support declarations (mspw signals, lifted
//! processes, loop-unroll suffixes) draw fresh names from a [`NameTable`]
//! handle that is created per pass and threaded explicitly, so name
//! generation stays deterministic and free of global state.

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

/// An identifier name. Cheap to clone and compare.
pub type Name = SmolStr;

/// Fresh-name generator.
///
/// `fresh("sig_mspw")` returns `sig_mspw` the first time and
/// `sig_mspw_1`, `sig_mspw_2`, … afterwards. Counters are per prefix.
#[derive(Debug, Default, Clone)]
pub struct NameTable {
    counters: FxHashMap<SmolStr, u32>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a name based on `prefix` that this table has not handed out
    /// before.
    pub fn fresh(&mut self, prefix: &str) -> Name {
        let counter = self.counters.entry(SmolStr::new(prefix)).or_insert(0);
        let name = if *counter == 0 {
            SmolStr::new(prefix)
        } else {
            SmolStr::new(format!("{prefix}_{counter}"))
        };
        *counter += 1;
        name
    }

    /// Like [`fresh`](Self::fresh) but always appends `suffix` to the base
    /// name first (`fresh_suffixed("sig", "_var")` → `sig_var`,
    /// `sig_var_1`, …).
    pub fn fresh_suffixed(&mut self, base: &str, suffix: &str) -> Name {
        let prefix = format!("{base}{suffix}");
        self.fresh(&prefix)
    }

    /// Mark a name as taken without handing it out.
    pub fn reserve(&mut self, name: &str) {
        self.counters.entry(SmolStr::new(name)).or_insert(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_names_do_not_repeat() {
        let mut table = NameTable::new();
        let a = table.fresh("sig_mspw");
        let b = table.fresh("sig_mspw");
        let c = table.fresh("sig_mspw");
        assert_eq!(a, "sig_mspw");
        assert_eq!(b, "sig_mspw_1");
        assert_eq!(c, "sig_mspw_2");
    }

    #[test]
    fn counters_are_per_prefix() {
        let mut table = NameTable::new();
        assert_eq!(table.fresh("a"), "a");
        assert_eq!(table.fresh("b"), "b");
        assert_eq!(table.fresh("a"), "a_1");
    }

    #[test]
    fn reserved_names_are_skipped() {
        let mut table = NameTable::new();
        table.reserve("state");
        assert_eq!(table.fresh("state"), "state_1");
    }
}
