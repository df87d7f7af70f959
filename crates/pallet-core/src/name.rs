//! Validated names: packages, slots, repositories and sets.

use std::fmt;
use std::str::FromStr;

use pallet_util::errors::PalletError;

fn valid_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '+' | '_' | '.' | '-')
}

fn validate(kind: &str, s: &str) -> Result<(), PalletError> {
    if s.is_empty() || !s.chars().all(valid_name_char) || s.starts_with('-') {
        return Err(PalletError::malformed_spec(s, format!("invalid {kind} name")));
    }
    Ok(())
}

/// A `category/package` name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QualifiedPackageName {
    pub category: String,
    pub package: String,
}

impl QualifiedPackageName {
    pub fn new(category: &str, package: &str) -> Result<Self, PalletError> {
        validate("category", category)?;
        validate("package", package)?;
        Ok(Self {
            category: category.to_string(),
            package: package.to_string(),
        })
    }
}

impl FromStr for QualifiedPackageName {
    type Err = PalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((c, p)) => Self::new(c, p),
            None => Err(PalletError::malformed_spec(s, "expected category/package")),
        }
    }
}

impl fmt::Display for QualifiedPackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.package)
    }
}

macro_rules! simple_name {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: &str) -> Result<Self, PalletError> {
                validate($kind, s)?;
                Ok(Self(s.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = PalletError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

simple_name!(
    /// A slot, allowing several versions of one package to be installed side by side.
    SlotName,
    "slot"
);
simple_name!(
    /// The name of a repository in the universe.
    RepositoryName,
    "repository"
);
simple_name!(
    /// The name of a package set such as `world` or `system`.
    SetName,
    "set"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_qualified_name() {
        let n: QualifiedPackageName = "dev-libs/openssl".parse().unwrap();
        assert_eq!(n.category, "dev-libs");
        assert_eq!(n.package, "openssl");
        assert_eq!(n.to_string(), "dev-libs/openssl");
    }

    #[test]
    fn reject_bad_names() {
        assert!("nocategory".parse::<QualifiedPackageName>().is_err());
        assert!("cat/".parse::<QualifiedPackageName>().is_err());
        assert!("cat/-pkg".parse::<QualifiedPackageName>().is_err());
        assert!("ca t/pkg".parse::<QualifiedPackageName>().is_err());
        assert!(SlotName::new("").is_err());
    }

    #[test]
    fn names_order_by_category_first() {
        let a: QualifiedPackageName = "a/z".parse().unwrap();
        let b: QualifiedPackageName = "b/a".parse().unwrap();
        assert!(a < b);
    }
}
