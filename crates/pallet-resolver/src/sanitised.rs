//! Flattening an id's dependency trees into a list of concrete dependencies.

use std::fmt;

use pallet_core::dep_spec::PackageOrBlockDepSpec;
use pallet_core::dep_tree::{ActiveLabels, DepTree};
use pallet_core::environment::Environment;
use pallet_core::package_id::{DependencyKey, PackageId};
use pallet_util::errors::PalletError;

use crate::error::{ResolveError, ResolveResult};

/// One leaf of an id's dependency trees, with the labels in force there.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SanitisedDependency {
    pub spec: PackageOrBlockDepSpec,
    pub active_labels: ActiveLabels,
    pub metadata_key: DependencyKey,
    /// The leaf as written, or the whole `|| ( ... )` group it was picked from.
    pub original_specification: String,
}

impl fmt::Display for SanitisedDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.active_labels, self.spec)
    }
}

/// Scores a candidate leaf of an any-of group; higher is preferred.
pub type ScoreFn<'s> = dyn FnMut(&SanitisedDependency) -> ResolveResult<i32> + 's;

/// Collect every dependency of `id`, evaluating conditionals and picking one
/// child of each any-of group with `score`.
pub fn sanitised_dependencies(
    env: &dyn Environment,
    id: &PackageId,
    score: &mut ScoreFn<'_>,
) -> ResolveResult<Vec<SanitisedDependency>> {
    let mut out = Vec::new();
    for key in DependencyKey::ALL {
        let Some(tree) = id.dependencies(key) else {
            continue;
        };
        let mut walker = Walker {
            env,
            id,
            key,
            score: &mut *score,
        };
        walker.walk(tree, &ActiveLabels::new(key.initial_labels()), None, &mut out)?;
    }
    Ok(out)
}

struct Walker<'w, 's> {
    env: &'w dyn Environment,
    id: &'w PackageId,
    key: DependencyKey,
    score: &'w mut ScoreFn<'s>,
}

impl Walker<'_, '_> {
    /// Walk `node`. `any_of` is the text of the enclosing `||` group, if any.
    fn walk(
        &mut self,
        node: &DepTree,
        labels: &ActiveLabels,
        any_of: Option<&str>,
        out: &mut Vec<SanitisedDependency>,
    ) -> ResolveResult<()> {
        match node {
            DepTree::All(children) => self.walk_children(children, labels, any_of, out),
            DepTree::Conditional {
                flag,
                inverse,
                children,
            } => {
                if self.env.condition_met(self.id, flag) != *inverse {
                    self.walk_children(children, labels, any_of, out)?;
                }
                Ok(())
            }
            DepTree::AnyOf(children) => {
                let text = node.to_string();
                let chosen = self.pick_any_of(children, labels, &text)?;
                out.extend(chosen);
                Ok(())
            }
            DepTree::Package(spec) => {
                out.push(SanitisedDependency {
                    spec: PackageOrBlockDepSpec::Package(spec.clone()),
                    active_labels: labels.clone(),
                    metadata_key: self.key,
                    original_specification: any_of.map_or_else(|| spec.to_string(), str::to_string),
                });
                Ok(())
            }
            DepTree::Block(block) => {
                if let Some(group) = any_of {
                    return Err(malformed(group, "blockers are not allowed inside '||' groups"));
                }
                out.push(SanitisedDependency {
                    spec: PackageOrBlockDepSpec::Block(block.clone()),
                    active_labels: labels.clone(),
                    metadata_key: self.key,
                    original_specification: block.to_string(),
                });
                Ok(())
            }
            DepTree::NamedSet(name) => Err(malformed(
                &format!("@{name}"),
                "named sets are not allowed in dependencies",
            )),
            // Labels only take effect through walk_children.
            DepTree::Labels(_) => Ok(()),
        }
    }

    fn walk_children(
        &mut self,
        children: &[DepTree],
        labels: &ActiveLabels,
        any_of: Option<&str>,
        out: &mut Vec<SanitisedDependency>,
    ) -> ResolveResult<()> {
        let mut labels = labels.clone();
        for child in children {
            match child {
                DepTree::Labels(l) => labels = labels.with(l),
                _ => self.walk(child, &labels, any_of, out)?,
            }
        }
        Ok(())
    }

    /// Pick the child of a `||` group whose worst leaf scores best. A child
    /// with no leaves at all (e.g. a disabled conditional) wins outright.
    fn pick_any_of(
        &mut self,
        children: &[DepTree],
        labels: &ActiveLabels,
        text: &str,
    ) -> ResolveResult<Vec<SanitisedDependency>> {
        let mut best: Option<(i32, Vec<SanitisedDependency>)> = None;
        let mut labels = labels.clone();

        for child in children {
            if let DepTree::Labels(l) = child {
                labels = labels.with(l);
                continue;
            }
            let mut leaves = Vec::new();
            self.walk(child, &labels, Some(text), &mut leaves)?;
            if leaves.is_empty() {
                return Ok(Vec::new());
            }

            let mut worst = i32::MAX;
            for leaf in &leaves {
                worst = worst.min((self.score)(leaf)?);
            }
            if best.as_ref().map_or(true, |(score, _)| worst > *score) {
                best = Some((worst, leaves));
            }
        }

        Ok(best.map(|(_, leaves)| leaves).unwrap_or_default())
    }
}

fn malformed(text: &str, message: &str) -> ResolveError {
    PalletError::MalformedDependency {
        text: text.to_string(),
        message: message.to_string(),
    }
    .into()
}
