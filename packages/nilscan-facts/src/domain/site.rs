//! Annotation site identity
//!
//! A site is a named program location whose nilability is a unit of
//! inference: a parameter, a receiver, a result, a struct field or a
//! package-level variable. Identity is derived from the containing package
//! path plus declared names and signature indices; two sites are equal iff
//! their identities are equal, which lets upstream and downstream packages
//! agree on a site without sharing any in-memory state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Nilability of a site or value.
///
/// `Undetermined` is the state of a site before inference fixes it; once a
/// site is determined the value is immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Nilability {
    Nilable,
    Nonnil,
    Undetermined,
}

impl Nilability {
    pub fn is_determined(&self) -> bool {
        !matches!(self, Nilability::Undetermined)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Nilability::Nilable => "nilable",
            Nilability::Nonnil => "nonnil",
            Nilability::Undetermined => "undetermined",
        }
    }
}

impl fmt::Display for Nilability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stable identity of an annotation site.
///
/// Function-scoped variants name the function by its package-qualified
/// declared name; `index` is the position within the signature. The
/// distinguished receiver is its own variant rather than parameter -1.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SiteKey {
    /// k-th parameter of a function
    Param { pkg: String, func: String, index: u8 },
    /// Method receiver
    Receiver { pkg: String, func: String },
    /// k-th result of a function
    Result { pkg: String, func: String, index: u8 },
    /// Struct field, named by owning type
    Field {
        pkg: String,
        owner: String,
        name: String,
    },
    /// Package-level variable
    Global { pkg: String, name: String },
}

impl SiteKey {
    /// Package path that declares this site.
    pub fn pkg(&self) -> &str {
        match self {
            SiteKey::Param { pkg, .. }
            | SiteKey::Receiver { pkg, .. }
            | SiteKey::Result { pkg, .. }
            | SiteKey::Field { pkg, .. }
            | SiteKey::Global { pkg, .. } => pkg,
        }
    }

    /// True when the site is declared in `pkg`.
    pub fn declared_in(&self, pkg: &str) -> bool {
        self.pkg() == pkg
    }
}

impl fmt::Display for SiteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiteKey::Param { pkg, func, index } => {
                write!(f, "{}.{} param {}", pkg, func, index)
            }
            SiteKey::Receiver { pkg, func } => write!(f, "{}.{} receiver", pkg, func),
            SiteKey::Result { pkg, func, index } => {
                write!(f, "{}.{} result {}", pkg, func, index)
            }
            SiteKey::Field { pkg, owner, name } => write!(f, "{}.{}.{}", pkg, owner, name),
            SiteKey::Global { pkg, name } => write!(f, "{}.{}", pkg, name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(pkg: &str, func: &str, index: u8) -> SiteKey {
        SiteKey::Param {
            pkg: pkg.into(),
            func: func.into(),
            index,
        }
    }

    #[test]
    fn test_site_identity_equality() {
        assert_eq!(param("a/b", "Foo", 0), param("a/b", "Foo", 0));
        assert_ne!(param("a/b", "Foo", 0), param("a/b", "Foo", 1));
        assert_ne!(param("a/b", "Foo", 0), param("a/c", "Foo", 0));
    }

    #[test]
    fn test_site_pkg() {
        let site = SiteKey::Field {
            pkg: "a/b".into(),
            owner: "T".into(),
            name: "next".into(),
        };
        assert_eq!(site.pkg(), "a/b");
        assert!(site.declared_in("a/b"));
        assert!(!site.declared_in("a"));
    }

    #[test]
    fn test_site_display() {
        assert_eq!(param("a/b", "Foo", 2).to_string(), "a/b.Foo param 2");
        let recv = SiteKey::Receiver {
            pkg: "a".into(),
            func: "T.Get".into(),
        };
        assert_eq!(recv.to_string(), "a.T.Get receiver");
    }

    #[test]
    fn test_nilability_determined() {
        assert!(Nilability::Nilable.is_determined());
        assert!(Nilability::Nonnil.is_determined());
        assert!(!Nilability::Undetermined.is_determined());
    }
}
