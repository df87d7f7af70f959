//! Repositories and destination types.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use pallet_util::errors::PalletError;
use serde::{Deserialize, Serialize};

use crate::name::RepositoryName;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryKind {
    /// Installable ids built from source.
    Source,
    /// Installable prebuilt ids; also the destination for `create-binary`.
    Binary,
    /// Ids installed below `root`.
    Installed { root: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub name: RepositoryName,
    /// Higher is preferred when versions tie.
    pub importance: i32,
    pub kind: RepositoryKind,
}

impl Repository {
    pub fn is_installed(&self) -> bool {
        matches!(self.kind, RepositoryKind::Installed { .. })
    }

    pub fn installed_root(&self) -> Option<&Path> {
        match &self.kind {
            RepositoryKind::Installed { root } => Some(root),
            _ => None,
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self.kind, RepositoryKind::Binary)
    }
}

/// Where a resolvent's chosen id ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DestinationType {
    #[default]
    InstallToSlash,
    CreateBinary,
    InstallToChroot,
}

impl DestinationType {
    pub const ALL: [DestinationType; 3] = [
        DestinationType::InstallToSlash,
        DestinationType::CreateBinary,
        DestinationType::InstallToChroot,
    ];

    /// Stable identifier used in plans and job ids.
    pub fn as_str(self) -> &'static str {
        match self {
            DestinationType::InstallToSlash => "install_to_slash",
            DestinationType::CreateBinary => "create_binary",
            DestinationType::InstallToChroot => "install_to_chroot",
        }
    }

    /// Whether `repo` can receive ids for this destination type.
    pub fn accepts(self, repo: &Repository) -> bool {
        match (self, &repo.kind) {
            (DestinationType::InstallToSlash, RepositoryKind::Installed { root }) => {
                root == Path::new("/")
            }
            (DestinationType::InstallToChroot, RepositoryKind::Installed { root }) => {
                root != Path::new("/")
            }
            (DestinationType::CreateBinary, RepositoryKind::Binary) => true,
            _ => false,
        }
    }
}

impl fmt::Display for DestinationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DestinationType {
    type Err = PalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DestinationType::ALL
            .into_iter()
            .find(|d| d.as_str() == s || d.as_str().replace('_', "-") == s)
            .ok_or_else(|| PalletError::Generic {
                message: format!("unknown destination type '{s}'"),
            })
    }
}
