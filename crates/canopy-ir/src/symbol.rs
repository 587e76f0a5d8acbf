//! Interned names for dialects, operations and attribute keys.
//!
//! Names live in one process-wide table, so a snapshot frozen from one
//! `IrContext` compares names with any other context directly.

use std::borrow::Cow;
use std::fmt;
use std::sync::LazyLock;

use lasso::{Rodeo, Spur};
use parking_lot::RwLock;

static NAMES: LazyLock<RwLock<Rodeo>> = LazyLock::new(Default::default);

/// A name interned in the global table. Comparison and hashing are by key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(Spur);

impl Symbol {
    /// Intern a literal. The table borrows `name` instead of copying it.
    pub fn new(name: &'static str) -> Self {
        intern(name, |table| table.get_or_intern_static(name))
    }

    /// Intern a name built at runtime.
    pub fn from_dynamic(name: &str) -> Self {
        intern(name, |table| table.get_or_intern(name))
    }

    /// Run `f` on the interned text.
    ///
    /// The table is read recursively, so `f` may format or compare other
    /// symbols.
    pub fn with_str<R>(&self, f: impl FnOnce(&str) -> R) -> R {
        let table = NAMES.read_recursive();
        f(table.resolve(&self.0))
    }
}

/// Look `name` up under a shared lock and only upgrade when it is new.
fn intern(name: &str, insert: impl FnOnce(&mut Rodeo) -> Spur) -> Symbol {
    let mut table = NAMES.upgradable_read();
    match table.get(name) {
        Some(key) => Symbol(key),
        None => Symbol(table.with_upgraded(insert)),
    }
}

impl From<&'static str> for Symbol {
    fn from(name: &'static str) -> Self {
        Symbol::new(name)
    }
}

impl From<Cow<'_, str>> for Symbol {
    fn from(name: Cow<'_, str>) -> Self {
        match name {
            Cow::Borrowed(s) => Symbol::from_dynamic(s),
            Cow::Owned(s) => Symbol::from_dynamic(&s),
        }
    }
}

/// Define zero-argument functions returning well-known symbols.
///
/// ```
/// canopy_ir::symbols! {
///     ATTR_VALUE => "value",
///     ATTR_SYM_NAME => "sym_name",
/// }
/// assert_eq!(ATTR_VALUE(), "value");
/// ```
#[macro_export]
macro_rules! symbols {
    ($($(#[$meta:meta])* $func:ident => $name:literal),* $(,)?) => {$(
        $(#[$meta])*
        #[allow(non_snake_case)]
        #[inline]
        pub fn $func() -> $crate::Symbol {
            $crate::Symbol::new($name)
        }
    )*};
}

impl PartialEq<str> for Symbol {
    fn eq(&self, text: &str) -> bool {
        self.with_str(|name| name == text)
    }
}

impl PartialEq<&str> for Symbol {
    fn eq(&self, text: &&str) -> bool {
        *self == **text
    }
}

impl PartialEq<Symbol> for &str {
    fn eq(&self, sym: &Symbol) -> bool {
        *sym == **self
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with_str(|name| f.write_str(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_and_dynamic_agree() {
        let owned = String::from("arith");
        assert_eq!(Symbol::new("arith"), Symbol::from_dynamic(&owned));
        assert_eq!(Symbol::from(Cow::Owned(owned)), Symbol::new("arith"));
    }

    #[test]
    fn compares_with_str() {
        let sym = Symbol::new("addi");
        assert_eq!(sym, "addi");
        assert_ne!(sym, "muli");
        assert!("addi" == sym);
        assert_eq!(sym.to_string(), "addi");
    }

    #[test]
    fn nested_access_does_not_deadlock() {
        let a = Symbol::new("outer");
        let b = Symbol::new("inner");
        let joined = a.with_str(|s| format!("{s}.{b}"));
        assert_eq!(joined, "outer.inner");
    }
}
