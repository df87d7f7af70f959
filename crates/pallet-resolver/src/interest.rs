//! Deciding whether a dependency of a decided id is followed.

use pallet_core::config::ResolverConfig;
use pallet_core::package_id::PackageId;

use crate::context::{ResolverContext, IGNORE_CHOICES};
use crate::decision::Decision;
use crate::sanitised::SanitisedDependency;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    /// Follow the dependency.
    Take,
    /// Record the dependency as a suggestion without acting on it.
    Untaken,
    Ignore,
}

pub fn interest_in(
    ctx: &ResolverContext<'_>,
    decision: &Decision,
    id: &PackageId,
    dep: &SanitisedDependency,
) -> Interest {
    if !care_about(ctx, decision, dep) {
        return Interest::Ignore;
    }

    let labels = &dep.active_labels;
    let suggestion = labels.is_suggestion();
    let recommendation = labels.is_recommendation();
    if !(suggestion || recommendation) {
        return Interest::Take;
    }

    let config = ctx.config;
    let package = dep.spec.as_package();
    if let Some(spec) = package {
        if ResolverConfig::names_package(&config.take, &spec.package) {
            return Interest::Take;
        }
        if ResolverConfig::names_package(&config.ignore, &spec.package) {
            return Interest::Ignore;
        }
    }

    if suggestion {
        match config.take_suggestions {
            Some(true) => return Interest::Take,
            Some(false) => return Interest::Ignore,
            None => {}
        }
    }
    if recommendation {
        return if config.take_recommendations.unwrap_or(true) {
            Interest::Take
        } else {
            Interest::Ignore
        };
    }

    // Suggestions that are already installed are kept.
    match package {
        Some(spec) if ctx.any_installed_matching(spec, Default::default()) => Interest::Take,
        _ => {
            tracing::debug!("{id}: leaving suggestion {dep} untaken");
            Interest::Untaken
        }
    }
}

fn care_about(ctx: &ResolverContext<'_>, decision: &Decision, dep: &SanitisedDependency) -> bool {
    let config = ctx.config;
    let ignored_from = |id: &PackageId| {
        let list = if dep.spec.is_block() {
            &config.no_blockers_from
        } else {
            &config.no_dependencies_from
        };
        ResolverConfig::matches_any(list, id)
    };

    match decision {
        Decision::ExistingNoChange { existing_id, .. } => {
            if ignored_from(existing_id) {
                return false;
            }
            if !config.follow_installed_build_dependencies && dep.active_labels.is_just_build() {
                return false;
            }
            let labels = &dep.active_labels;
            if labels.is_suggestion() || labels.is_recommendation() {
                // Only suggestions an installed id already has are followed.
                return match dep.spec.as_package() {
                    Some(spec) => ctx.any_installed_matching(spec, IGNORE_CHOICES),
                    None => false,
                };
            }
            true
        }
        Decision::ChangesToMake { origin_id, .. } => !ignored_from(origin_id),
        Decision::NothingNoChange { .. }
        | Decision::Remove { .. }
        | Decision::UnableToMake { .. }
        | Decision::Break { .. } => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pallet_core::dep_spec::PackageOrBlockDepSpec;
    use pallet_core::dep_tree::{ActiveLabels, DependencyLabel};
    use pallet_core::environment::Environment;
    use pallet_core::package_id::DependencyKey;
    use pallet_core::repository::DestinationType;
    use pallet_core::universe::Universe;

    use crate::decision::ChangeType;
    use crate::resolvent::Resolvent;

    fn universe() -> Universe {
        Universe::from_toml_str(
            r#"
[[repository]]
name = "repo"
kind = "source"

[[repository]]
name = "installed"
kind = "installed"

[[package]]
name = "cat/a"
version = "1"
repository = "repo"

[[package]]
name = "cat/have"
version = "1"
repository = "installed"
"#,
        )
        .unwrap()
    }

    fn dep(spec: &str, labels: &[DependencyLabel]) -> SanitisedDependency {
        SanitisedDependency {
            spec: PackageOrBlockDepSpec::parse(spec).unwrap(),
            active_labels: ActiveLabels::new(labels),
            metadata_key: DependencyKey::Dependencies,
            original_specification: spec.to_string(),
        }
    }

    fn decide(existing: bool, u: &Universe) -> (Decision, std::sync::Arc<PackageId>) {
        let id = u.package_ids(&"cat/a".parse().unwrap()).pop().unwrap();
        let resolvent = Resolvent::for_id(&id, DestinationType::InstallToSlash);
        let decision = if existing {
            Decision::ExistingNoChange {
                resolvent,
                existing_id: id.clone(),
                is_same: true,
                is_same_version: true,
                is_transient: false,
                taken: true,
            }
        } else {
            Decision::ChangesToMake {
                resolvent,
                origin_id: id.clone(),
                best: true,
                change_type: ChangeType::NewPackage,
                destination: None,
                taken: true,
            }
        };
        (decision, id)
    }

    fn interest(config: &str, existing: bool, d: &SanitisedDependency) -> Interest {
        let u = universe();
        let config = ResolverConfig::from_toml_str(config).unwrap();
        let ctx = ResolverContext::new(&u, &config);
        let (decision, id) = decide(existing, &u);
        interest_in(&ctx, &decision, &id, d)
    }

    use DependencyLabel::*;

    #[test]
    fn plain_dependencies_are_taken() {
        assert_eq!(interest("", false, &dep("cat/x", &[Build])), Interest::Take);
        assert_eq!(interest("", true, &dep("cat/x", &[Run])), Interest::Take);
    }

    #[test]
    fn installed_ids_skip_build_dependencies() {
        assert_eq!(interest("", true, &dep("cat/x", &[Build])), Interest::Ignore);
        assert_eq!(
            interest("follow-installed-build-dependencies = true", true, &dep("cat/x", &[Build])),
            Interest::Take
        );
    }

    #[test]
    fn suggestions() {
        let s = dep("cat/x", &[Post, Suggestion]);
        assert_eq!(interest("", false, &s), Interest::Untaken);
        assert_eq!(interest("take-suggestions = true", false, &s), Interest::Take);
        assert_eq!(interest("take-suggestions = false", false, &s), Interest::Ignore);
        assert_eq!(interest(r#"take = ["cat/x"]"#, false, &s), Interest::Take);
        assert_eq!(
            interest(r#"ignore = ["cat/x"]
take-suggestions = true"#, false, &s),
            Interest::Ignore
        );
        let have = dep("cat/have", &[Post, Suggestion]);
        assert_eq!(interest("", false, &have), Interest::Take);
        assert_eq!(interest("", true, &s), Interest::Ignore);
        assert_eq!(interest("", true, &have), Interest::Take);
    }

    #[test]
    fn recommendations_default_to_taken() {
        let r = dep("cat/x", &[Run, Recommendation]);
        assert_eq!(interest("", false, &r), Interest::Take);
        assert_eq!(interest("take-recommendations = false", false, &r), Interest::Ignore);
    }

    #[test]
    fn no_dependencies_from() {
        let config = r#"no-dependencies-from = ["cat/a"]"#;
        assert_eq!(interest(config, false, &dep("cat/x", &[Run])), Interest::Ignore);
        assert_eq!(interest(config, false, &dep("!cat/x", &[Run])), Interest::Take);
        let config = r#"no-blockers-from = ["cat/a"]"#;
        assert_eq!(interest(config, false, &dep("!cat/x", &[Run])), Interest::Ignore);
    }
}
