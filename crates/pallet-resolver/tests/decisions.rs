use pallet_core::config::ResolverConfig;
use pallet_core::universe::Universe;
use pallet_resolver::decider::check_constraint;
use pallet_resolver::{Decision, Resolver, ResolverLists, Target};

const REPOS: &str = r#"
now = "2026-03-01T00:00:00Z"

[[repository]]
name = "repo"
kind = "source"

[[repository]]
name = "installed"
kind = "installed"
"#;

fn resolve(packages: &str, config: &str, targets: &[&str]) -> ResolverLists {
    let universe = Universe::from_toml_str(&format!("{REPOS}{packages}")).unwrap();
    let config = ResolverConfig::from_toml_str(config).unwrap();
    let mut resolver = Resolver::new(&universe, &config);
    for t in targets {
        resolver.add(Target::parse(t).unwrap()).unwrap();
    }
    resolver.resolve().unwrap().clone()
}

fn decision<'a>(lists: &'a ResolverLists, package: &str) -> &'a Decision {
    lists
        .resolutions
        .iter()
        .find(|r| r.resolvent.package.to_string() == package)
        .and_then(|r| r.decision.as_ref())
        .unwrap_or_else(|| panic!("no decision for {package}"))
}

fn chosen(lists: &ResolverLists, package: &str) -> String {
    decision(lists, package)
        .chosen_id()
        .map(|id| id.to_string())
        .unwrap_or_default()
}

#[test]
fn test_masked_build_dependency_is_unable() {
    let lists = resolve(
        r#"
[[package]]
name = "cat/target"
version = "1"
repository = "repo"
build-dependencies = "cat/masked"

[[package]]
name = "cat/masked"
version = "1"
repository = "repo"
masked = true
"#,
        "",
        &["cat/target"],
    );

    assert_eq!(decision(&lists, "cat/target").kind_name(), "changes_to_make");
    let Decision::UnableToMake {
        unsuitable_candidates,
        taken,
        ..
    } = decision(&lists, "cat/masked")
    else {
        panic!("expected unable_to_make");
    };
    assert!(*taken);
    assert_eq!(unsuitable_candidates.len(), 1);
    assert_eq!(unsuitable_candidates[0].id.to_string(), "cat/masked-1:0::repo");

    let errors: Vec<String> = lists.taken_error_resolvents.iter().map(|r| r.to_string()).collect();
    assert_eq!(errors, vec!["cat/masked -> install_to_slash"]);
    let error_jobs: Vec<&str> = lists.job_lists.error_job_ids.iter().map(|j| j.as_str()).collect();
    assert_eq!(error_jobs, vec!["e:cat/masked -> install_to_slash"]);

    let masked = lists
        .resolutions
        .iter()
        .find(|r| r.resolvent.package.to_string() == "cat/masked")
        .unwrap();
    let from = masked.constraints.iter().next().and_then(|c| c.reason.as_dependency()).unwrap();
    assert_eq!(from.from_resolvent.to_string(), "cat/target:0 -> install_to_slash");

    for job in lists.job_lists.jobs.iter() {
        let mentions_masked = job.id.as_str().contains("cat/masked")
            || job.arrows.iter().any(|a| a.comes_after.as_str().contains("cat/masked"));
        if mentions_masked {
            assert_eq!(job.id.as_str(), "e:cat/masked -> install_to_slash");
        }
    }
}

#[test]
fn test_set_containing_a_package_and_its_blocker_is_unable() {
    let lists = resolve(
        r#"
[[package]]
name = "cat/a"
version = "1"
repository = "repo"

[[set]]
name = "world"
specs = ["cat/a", "!cat/a"]
"#,
        "",
        &["@world"],
    );
    let d = decision(&lists, "cat/a");
    assert!(d.is_unable());
    assert!(d.taken());
    assert_eq!(lists.resolutions.len(), 1);
}

const SCM: &str = r#"
[[package]]
name = "cat/app"
version = "1"
repository = "repo"
run-dependencies = "cat/tool-git"

[[package]]
name = "cat/tool-git"
version = "1"
repository = "repo"

[[package]]
name = "cat/tool-git"
version = "1"
repository = "installed"
installed-time = "2026-01-30T00:00:00Z"
"#;

#[test]
fn test_stale_scm_dependency_is_reinstalled() {
    let lists = resolve(SCM, "reinstall-scm-days = 14", &["cat/app"]);
    assert_eq!(decision(&lists, "cat/tool-git").kind_name(), "changes_to_make");
    assert_eq!(chosen(&lists, "cat/tool-git"), "cat/tool-git-1:0::repo");
}

#[test]
fn test_recent_scm_dependency_is_kept() {
    let lists = resolve(SCM, "reinstall-scm-days = 60", &["cat/app"]);
    assert_eq!(decision(&lists, "cat/tool-git").kind_name(), "existing_no_change");

    let lists = resolve(SCM, "", &["cat/app"]);
    assert_eq!(decision(&lists, "cat/tool-git").kind_name(), "existing_no_change");
}

const BLOCKED: &str = r#"
[[package]]
name = "cat/a"
version = "1"
repository = "repo"
run-dependencies = "!<cat/b-2"

[[package]]
name = "cat/b"
version = "1"
repository = "installed"
"#;

#[test]
fn test_blocker_is_fixed_by_upgrading() {
    let packages = format!(
        r#"{BLOCKED}
[[package]]
name = "cat/b"
version = "2"
repository = "repo"
"#
    );
    let lists = resolve(&packages, "", &["cat/a"]);
    assert_eq!(decision(&lists, "cat/b").kind_name(), "changes_to_make");
    assert_eq!(chosen(&lists, "cat/b"), "cat/b-2:0::repo");
    assert!(!lists.has_errors());
}

#[test]
fn test_blocker_is_fixed_by_removing_when_allowed() {
    let lists = resolve(BLOCKED, r#"allowed-to-remove = ["cat/b"]"#, &["cat/a"]);
    let Decision::Remove { ids, taken, .. } = decision(&lists, "cat/b") else {
        panic!("expected remove");
    };
    assert!(*taken);
    assert_eq!(ids.len(), 1);
    assert!(!lists.has_errors());
}

#[test]
fn test_blocker_can_be_broken_when_allowed() {
    let lists = resolve(BLOCKED, r#"allowed-to-break = ["cat/b"]"#, &["cat/a"]);
    assert_eq!(decision(&lists, "cat/b").kind_name(), "break");
}

#[test]
fn test_unfixable_blocker_is_unable() {
    let lists = resolve(BLOCKED, "", &["cat/a"]);
    assert!(decision(&lists, "cat/b").is_unable());
    assert!(lists.has_errors());
}

#[test]
fn test_package_both_depended_upon_and_blocked_is_unable() {
    let packages = r#"
[[package]]
name = "cat/a"
version = "1"
repository = "repo"
run-dependencies = "cat/b"

[[package]]
name = "cat/b"
version = "1"
repository = "repo"

[[package]]
name = "cat/c"
version = "1"
repository = "repo"
run-dependencies = "!cat/b"
"#;
    let lists = resolve(packages, "", &["cat/a", "cat/c"]);
    let d = decision(&lists, "cat/b");
    assert!(d.is_unable());
    assert!(d.taken());
}

#[test]
fn test_block_target_removes_installed_package() {
    let packages = r#"
[[package]]
name = "cat/b"
version = "1"
repository = "installed"
"#;
    let lists = resolve(packages, r#"allowed-to-remove = ["cat/b"]"#, &["!cat/b"]);
    assert_eq!(decision(&lists, "cat/b").kind_name(), "remove");

    let lists = resolve(packages, "", &["!cat/b"]);
    assert!(decision(&lists, "cat/b").is_unable());
}

#[test]
fn test_block_on_nothing_installed_needs_nothing() {
    let packages = r#"
[[package]]
name = "cat/b"
version = "1"
repository = "repo"
"#;
    let lists = resolve(packages, "", &["!cat/b"]);
    assert_eq!(decision(&lists, "cat/b").kind_name(), "nothing_no_change");
    assert!(lists.job_lists.error_job_ids.is_empty());
}

const SUGGESTS: &str = r#"
[[package]]
name = "cat/a"
version = "1"
repository = "repo"
suggested-dependencies = "cat/extra"

[[package]]
name = "cat/extra"
version = "1"
repository = "repo"
"#;

#[test]
fn test_suggestions_are_untaken_by_default() {
    let lists = resolve(SUGGESTS, "", &["cat/a"]);
    let d = decision(&lists, "cat/extra");
    assert_eq!(d.kind_name(), "changes_to_make");
    assert!(!d.taken());
    let untaken: Vec<&str> = lists.job_lists.untaken_job_ids.iter().map(|j| j.as_str()).collect();
    assert_eq!(untaken, vec!["n:cat/extra:0 -> install_to_slash"]);
}

#[test]
fn test_suggestions_follow_configuration() {
    let lists = resolve(SUGGESTS, "take-suggestions = true", &["cat/a"]);
    assert!(decision(&lists, "cat/extra").taken());

    let lists = resolve(SUGGESTS, "take-suggestions = false", &["cat/a"]);
    assert_eq!(lists.resolutions.len(), 1);

    let lists = resolve(SUGGESTS, r#"take = ["cat/extra"]"#, &["cat/a"]);
    assert!(decision(&lists, "cat/extra").taken());
}

const REINSTALLABLE: &str = r#"
[[package]]
name = "cat/a"
version = "1"
repository = "repo"
run-dependencies = "cat/b"

[[package]]
name = "cat/b"
version = "1"
repository = "repo"

[[package]]
name = "cat/b"
version = "1"
repository = "installed"
"#;

#[test]
fn test_with_forces_a_rebuild_of_dependencies() {
    let lists = resolve(REINSTALLABLE, "", &["cat/a"]);
    assert_eq!(decision(&lists, "cat/b").kind_name(), "existing_no_change");

    let lists = resolve(REINSTALLABLE, r#"with = ["cat/b"]"#, &["cat/a"]);
    assert_eq!(decision(&lists, "cat/b").kind_name(), "changes_to_make");
}

#[test]
fn test_without_keeps_installed_targets() {
    let lists = resolve(REINSTALLABLE, "", &["cat/b"]);
    assert_eq!(decision(&lists, "cat/b").kind_name(), "changes_to_make");

    let lists = resolve(REINSTALLABLE, r#"without = ["cat/b"]"#, &["cat/b"]);
    assert_eq!(decision(&lists, "cat/b").kind_name(), "existing_no_change");
}

#[test]
fn test_forbidden_dependency_is_unable() {
    let packages = r#"
[[package]]
name = "cat/a"
version = "1"
repository = "repo"
run-dependencies = "cat/b"

[[package]]
name = "cat/b"
version = "1"
repository = "repo"
"#;
    let lists = resolve(packages, r#"forbid = ["cat/b"]"#, &["cat/a"]);
    let d = decision(&lists, "cat/b");
    assert!(d.is_unable());
    assert!(d.taken());

    // Neither list lifts a forbid.
    for list in ["with", "without"] {
        let config = format!("forbid = [\"cat/b\"]\n{list} = [\"cat/b\"]\n");
        let lists = resolve(packages, &config, &["cat/a"]);
        assert!(decision(&lists, "cat/b").is_unable(), "{list}");
    }
}

#[test]
fn test_any_of_prefers_installed_leaf() {
    let packages = r#"
[[package]]
name = "cat/a"
version = "1"
repository = "repo"
run-dependencies = "|| ( cat/x cat/y )"

[[package]]
name = "cat/x"
version = "1"
repository = "repo"

[[package]]
name = "cat/y"
version = "1"
repository = "installed"
"#;
    let lists = resolve(packages, "", &["cat/a"]);
    assert_eq!(decision(&lists, "cat/y").kind_name(), "existing_no_change");
    assert!(lists.resolutions.iter().all(|r| r.resolvent.package.to_string() != "cat/x"));
}

#[test]
fn test_taken_decisions_satisfy_their_constraints() {
    let packages = r#"
[[package]]
name = "cat/a"
version = "1"
repository = "repo"
build-dependencies = ">=cat/b-1"
run-dependencies = "cat/c cat/b[=1|=2]"

[[package]]
name = "cat/b"
version = "1"
repository = "installed"

[[package]]
name = "cat/b"
version = "2"
repository = "repo"

[[package]]
name = "cat/c"
version = "1"
repository = "repo"
run-dependencies = "cat/b"
"#;
    let lists = resolve(packages, "", &["cat/a"]);
    let mut seen = std::collections::HashSet::new();
    for resolution in &lists.resolutions {
        assert!(seen.insert(resolution.resolvent.clone()), "duplicate resolvent");
        let decision = resolution.decision.as_ref().unwrap();
        if decision.taken() && !decision.is_unable() {
            for c in &resolution.constraints {
                assert!(check_constraint(c, decision), "{decision} fails {c}");
            }
        }
    }
}

#[test]
fn test_uninstallable_versions_are_skipped() {
    let lists = resolve(
        r#"
[[package]]
name = "cat/x"
version = "1"
repository = "repo"

[[package]]
name = "cat/x"
version = "2"
repository = "repo"
behaviours = ["uninstallable"]
"#,
        "",
        &["cat/x"],
    );

    assert_eq!(chosen(&lists, "cat/x"), "cat/x-1:0::repo");
    assert!(lists.taken_error_resolvents.is_empty());
}

#[test]
fn test_unbinaryable_target_gets_no_binary_jobs() {
    let lists = resolve(
        r#"
[[repository]]
name = "bins"
kind = "binary"

[[package]]
name = "cat/nobin"
version = "1"
repository = "repo"
behaviours = ["unbinaryable"]
"#,
        r#"target-destination-type = "create-binary""#,
        &["cat/nobin"],
    );

    assert_eq!(decision(&lists, "cat/nobin").kind_name(), "unable_to_make");
    let errors: Vec<String> = lists.taken_error_resolvents.iter().map(|r| r.to_string()).collect();
    assert_eq!(errors, vec!["cat/nobin:0 -> create_binary"]);
    assert!(lists
        .job_lists
        .ordered_job_ids
        .iter()
        .all(|j| !j.as_str().contains("cat/nobin")));
}
