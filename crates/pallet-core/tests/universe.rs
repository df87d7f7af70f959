use std::path::Path;

use pallet_core::config::{ResolverConfig, UseExisting};
use pallet_core::dep_spec::{MatchOptions, PackageDepSpec, PackageOrBlockDepSpec};
use pallet_core::environment::Environment;
use pallet_core::name::SetName;
use pallet_core::package_id::DependencyKey;
use pallet_core::universe::Universe;

const UNIVERSE: &str = r#"
now = "2026-03-01T00:00:00Z"

[[repository]]
name = "gentoo"
kind = "source"

[[repository]]
name = "overlay"
kind = "source"
importance = 10

[[repository]]
name = "installed"
kind = "installed"
root = "/mnt/target"

[[package]]
name = "dev-libs/openssl"
version = "3.0.1"
repository = "gentoo"
use = ["ssl", "-static"]
run-dependencies = "sys-libs/zlib static? ( sys-libs/zlib[static] )"

[[package.choices]]
prefix = "python_targets"
values = ["3_12", "-3_11"]
implicit = ["3_13"]

[[package]]
name = "dev-libs/openssl"
version = "3.0.1"
repository = "overlay"
behaviours = ["transient"]

[[package]]
name = "dev-libs/openssl"
version = "1.1.1"
repository = "installed"
installed-time = "2026-01-01T00:00:00Z"

[[package]]
name = "sys-libs/zlib"
version = "1.3"
repository = "gentoo"

[[set]]
name = "world"
specs = ["dev-libs/openssl", "!dev-libs/libressl"]
"#;

fn universe() -> Universe {
    Universe::from_toml_str(UNIVERSE).unwrap()
}

fn spec(s: &str) -> PackageDepSpec {
    PackageDepSpec::parse(s).unwrap()
}

#[test]
fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("universe.toml");
    std::fs::write(&path, UNIVERSE).unwrap();

    let u = Universe::load(&path).unwrap();
    assert_eq!(u.repositories().len(), 3);
    assert_eq!(u.package_names().count(), 2);
    assert_eq!(u.id_count(), 4);
    assert_eq!(u.set_count(), 1);
    assert_eq!(u.now().to_rfc3339(), "2026-03-01T00:00:00+00:00");
}

#[test]
fn test_load_missing_file_fails() {
    assert!(Universe::load(Path::new("/nonexistent/universe.toml")).is_err());
}

#[test]
fn test_installed_repository_keeps_its_root() {
    let u = universe();
    let repo = u.repository(&"installed".parse().unwrap()).unwrap();
    assert_eq!(repo.installed_root(), Some(Path::new("/mnt/target")));
    assert!(u.repository(&"nowhere".parse().unwrap()).is_err());
}

#[test]
fn test_package_metadata_is_carried() {
    let u = universe();
    let gentoo = u.find_id(&spec("=dev-libs/openssl-3.0.1::gentoo")).unwrap();
    let run = gentoo.dependencies(DependencyKey::Run).unwrap();
    assert!(!run.is_empty());
    assert!(gentoo.dependencies(DependencyKey::Build).is_none());
    assert!(!gentoo.is_transient());

    let overlay = u.find_id(&spec("=dev-libs/openssl-3.0.1::overlay")).unwrap();
    assert!(overlay.is_transient());

    let installed = u.find_id(&spec("dev-libs/openssl::installed")).unwrap();
    assert!(installed.installed_time.is_some());
    assert!(u.is_installed(&installed));
}

#[test]
fn test_prefixed_choices() {
    let u = universe();
    let id = u.find_id(&spec("=dev-libs/openssl-3.0.1::gentoo")).unwrap();
    assert!(u.condition_met(&id, "python_targets_3_12"));
    assert!(!u.condition_met(&id, "python_targets_3_11"));
    assert!(u.condition_met(&id, "python_targets_3_13"));
    assert!(!id.choice_value("python_targets_3_13").unwrap().explicitly_listed);
    assert!(!u.condition_met(&id, "static"));
}

#[test]
fn test_matching_respects_choices() {
    let u = universe();
    let with_ssl = spec("dev-libs/openssl[ssl]");
    let ids = u.matching_ids(&with_ssl, MatchOptions::default());
    assert_eq!(ids.len(), 1);
    assert_eq!(ids[0].repository.as_str(), "gentoo");

    let ignoring = MatchOptions {
        ignore_choice_requirements: true,
    };
    assert_eq!(u.matching_ids(&with_ssl, ignoring).len(), 3);
    assert!(u
        .matching_ids(&spec("dev-libs/openssl[-ssl]"), MatchOptions::default())
        .is_empty());
}

#[test]
fn test_sets_hold_blockers() {
    let u = universe();
    let specs = u.expand_set(&SetName::new("world").unwrap()).unwrap();
    assert_eq!(specs.len(), 2);
    assert!(matches!(specs[0], PackageOrBlockDepSpec::Package(_)));
    assert!(matches!(specs[1], PackageOrBlockDepSpec::Block(_)));
    assert!(u.expand_set(&SetName::new("system").unwrap()).is_err());
}

#[test]
fn test_rejects_duplicates() {
    let twice = format!(
        "{UNIVERSE}
[[repository]]
name = \"gentoo\"
kind = \"binary\"
"
    );
    assert!(Universe::from_toml_str(&twice).is_err());

    let dup_id = format!(
        "{UNIVERSE}
[[package]]
name = \"sys-libs/zlib\"
version = \"1.3\"
repository = \"gentoo\"
"
    );
    assert!(Universe::from_toml_str(&dup_id).is_err());
}

#[test]
fn test_rejects_bad_entries() {
    let unknown_key = r#"
[[repository]]
name = "gentoo"
kind = "source"
colour = "blue"
"#;
    assert!(Universe::from_toml_str(unknown_key).is_err());

    let unknown_repo = r#"
[[package]]
name = "cat/pkg"
version = "1"
repository = "missing"
"#;
    assert!(Universe::from_toml_str(unknown_repo).is_err());

    let bad_deps = r#"
[[repository]]
name = "gentoo"
kind = "source"

[[package]]
name = "cat/pkg"
version = "1"
repository = "gentoo"
dependencies = "|| ( cat/a"
"#;
    assert!(Universe::from_toml_str(bad_deps).is_err());
}

#[test]
fn test_config_file_keys() {
    let config = ResolverConfig::from_toml_str(
        r#"
with = ["dev-libs/openssl"]
forbid = ["<sys-libs/zlib-1.2"]
reinstall-scm-days = 14
use-existing-for-dependencies = "if-same"
"#,
    )
    .unwrap();
    assert_eq!(config.with[0].to_string(), "dev-libs/openssl");
    assert_eq!(config.forbid[0].to_string(), "<sys-libs/zlib-1.2");
    assert_eq!(config.reinstall_scm_days, Some(14));
    assert_eq!(config.use_existing_for_dependencies, UseExisting::IfSame);
    assert_eq!(config.use_existing_for_targets, UseExisting::Never);

    assert!(ResolverConfig::from_toml_str("with = [\">=\"]").is_err());
    assert!(ResolverConfig::from_toml_str("no-such-key = 1").is_err());
}
