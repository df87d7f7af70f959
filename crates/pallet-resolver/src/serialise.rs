//! The plan codec.
//!
//! Every value is written as a tagged object, a quoted string or `null`,
//! each terminated by `;`:
//!
//! ```text
//! Resolvent(package="cat/a";slot="0";destination_type="install_to_slash";);
//! ```
//!
//! Strings escape `\`, `"`, `;`, `(` and `)` with a backslash. Sequences are
//! objects of class `c` whose members are keyed `1`, `2`, ... followed by
//! `count`. Package ids are written as their uniquely identifying spec and
//! looked up in the environment when read back.

use std::sync::Arc;

use pallet_core::config::UseExisting;
use pallet_core::dep_spec::{PackageDepSpec, PackageOrBlockDepSpec};
use pallet_core::dep_tree::{ActiveLabels, DependencyLabel};
use pallet_core::environment::Environment;
use pallet_core::name::{QualifiedPackageName, RepositoryName, SetName, SlotName};
use pallet_core::package_id::{DependencyKey, PackageId, PackageIdRef};
use pallet_core::repository::DestinationType;
use pallet_util::errors::PalletError;

use crate::constraint::{Constraint, Constraints};
use crate::decision::{ChangeType, Decision, Destination, UnsuitableCandidate};
use crate::error::{ResolveError, ResolveResult};
use crate::job::{
    Arrow, ErrorJob, FetchJob, Job, JobId, JobKind, Jobs, PretendJob, SimpleInstallJob,
    SyncPoint, SyncPointJob, UntakenInstallJob, UsableGroupJob, UsableJob, WorkItem,
};
use crate::orderer::JobLists;
use crate::reason::Reason;
use crate::resolution::{Resolution, Resolutions};
use crate::resolvent::Resolvent;
use crate::resolver::ResolverLists;
use crate::sanitised::SanitisedDependency;

const CONTAINER: &str = "c";

/// Encode `value` as a plan string.
pub fn serialise<T: Serialise + ?Sized>(value: &T) -> String {
    let mut s = Serialiser::new();
    value.serialise(&mut s);
    s.into_string()
}

/// Decode a plan string, resolving package ids against `env`.
pub fn deserialise<T: Deserialise>(env: &dyn Environment, text: &str) -> ResolveResult<T> {
    let node = parse(text)?;
    T::deserialise(Deserialisation { env, node: &node })
}

fn error(message: impl Into<String>) -> ResolveError {
    PalletError::serialisation(message).into()
}

pub trait Serialise {
    fn serialise(&self, s: &mut Serialiser);
}

pub trait Deserialise: Sized {
    fn deserialise(d: Deserialisation<'_>) -> ResolveResult<Self>;
}

#[derive(Debug, Default)]
pub struct Serialiser {
    out: String,
}

impl Serialiser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an object; finish it with [`ObjectWriter::end`].
    pub fn object(&mut self, class: &str) -> ObjectWriter<'_> {
        debug_assert!(is_class_name(class), "bad class name {class:?}");
        self.out.push_str(class);
        self.out.push('(');
        ObjectWriter { s: self }
    }

    pub fn null(&mut self) {
        self.out.push_str("null;");
    }

    pub fn string(&mut self, value: &str) {
        self.out.push('"');
        for c in value.chars() {
            if matches!(c, '\\' | '"' | ';' | '(' | ')') {
                self.out.push('\\');
            }
            self.out.push(c);
        }
        self.out.push_str("\";");
    }

    pub fn into_string(self) -> String {
        self.out
    }
}

pub struct ObjectWriter<'s> {
    s: &'s mut Serialiser,
}

impl<'s> ObjectWriter<'s> {
    fn key(&mut self, key: &str) {
        debug_assert!(is_key(key), "bad key {key:?}");
        self.s.out.push_str(key);
        self.s.out.push('=');
    }

    pub fn member<T: Serialise + ?Sized>(mut self, key: &str, value: &T) -> Self {
        self.key(key);
        value.serialise(self.s);
        self
    }

    pub fn string(mut self, key: &str, value: &str) -> Self {
        self.key(key);
        self.s.string(value);
        self
    }

    pub fn boolean(self, key: &str, value: bool) -> Self {
        self.string(key, if value { "true" } else { "false" })
    }

    pub fn optional<T: Serialise + ?Sized>(mut self, key: &str, value: Option<&T>) -> Self {
        self.key(key);
        match value {
            Some(v) => v.serialise(self.s),
            None => self.s.null(),
        }
        self
    }

    pub fn sequence<'i, T, I>(mut self, key: &str, items: I) -> Self
    where
        T: Serialise + ?Sized + 'i,
        I: IntoIterator<Item = &'i T>,
    {
        self.key(key);
        let mut c = self.s.object(CONTAINER);
        let mut count = 0usize;
        for item in items {
            count += 1;
            c = c.member(&count.to_string(), item);
        }
        c.string("count", &count.to_string()).end();
        self
    }

    pub fn end(self) {
        self.s.out.push_str(");");
    }
}

fn is_class_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphabetic() || c == '_')
}

fn is_key(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// A parsed value, before it is given a type.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    String(String),
    Object {
        class: String,
        members: Vec<(String, Node)>,
    },
}

/// Parse one complete value. Trailing input is an error.
pub fn parse(text: &str) -> ResolveResult<Node> {
    let mut p = Parser { text, pos: 0 };
    let node = p.value()?;
    if p.pos != text.len() {
        return Err(error(format!("trailing text at offset {}", p.pos)));
    }
    Ok(node)
}

struct Parser<'t> {
    text: &'t str,
    pos: usize,
}

impl Parser<'_> {
    fn rest(&self) -> &str {
        &self.text[self.pos..]
    }

    fn expect(&mut self, token: &str) -> ResolveResult<()> {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            Ok(())
        } else {
            Err(error(format!("expected '{token}' at offset {}", self.pos)))
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &str {
        let start = self.pos;
        let len = self
            .rest()
            .find(|c: char| !pred(c))
            .unwrap_or(self.rest().len());
        self.pos += len;
        &self.text[start..self.pos]
    }

    fn value(&mut self) -> ResolveResult<Node> {
        if self.rest().starts_with("null;") {
            self.pos += "null;".len();
            return Ok(Node::Null);
        }
        if self.rest().starts_with('"') {
            return self.string();
        }

        let class = self
            .take_while(|c| c.is_ascii_alphabetic() || c == '_')
            .to_string();
        if class.is_empty() {
            return Err(error(format!("expected a value at offset {}", self.pos)));
        }
        self.expect("(")?;
        let mut members = Vec::new();
        loop {
            if self.rest().starts_with(')') {
                self.expect(");")?;
                return Ok(Node::Object { class, members });
            }
            let key = self
                .take_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
                .to_string();
            if key.is_empty() {
                return Err(error(format!(
                    "expected a key in '{class}' at offset {}",
                    self.pos
                )));
            }
            self.expect("=")?;
            let value = self.value()?;
            members.push((key, value));
        }
    }

    fn string(&mut self) -> ResolveResult<Node> {
        self.expect("\"")?;
        let mut out = String::new();
        let mut chars = self.rest().char_indices();
        loop {
            match chars.next() {
                Some((_, '\\')) => match chars.next() {
                    Some((_, c)) => out.push(c),
                    None => break,
                },
                Some((i, '"')) => {
                    self.pos += i + 1;
                    self.expect(";")?;
                    return Ok(Node::String(out));
                }
                Some((_, c)) => out.push(c),
                None => break,
            }
        }
        Err(error("unterminated string"))
    }
}

/// A node being read, with the environment ids are looked up in.
#[derive(Clone, Copy)]
pub struct Deserialisation<'a> {
    env: &'a dyn Environment,
    node: &'a Node,
}

impl<'a> Deserialisation<'a> {
    pub fn class(&self) -> Option<&'a str> {
        match self.node {
            Node::Object { class, .. } => Some(class),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.node, Node::Null)
    }

    pub fn as_str(&self) -> ResolveResult<&'a str> {
        match self.node {
            Node::String(s) => Ok(s),
            Node::Null => Err(error("expected a string, found null")),
            Node::Object { class, .. } => {
                Err(error(format!("expected a string, found a '{class}'")))
            }
        }
    }

    /// Open an object whose class is one of `classes`.
    pub fn object(self, classes: &[&str]) -> ResolveResult<Deserialisator<'a>> {
        let Node::Object { class, members } = self.node else {
            return Err(error(format!("expected one of {}", classes.join(", "))));
        };
        if !classes.contains(&class.as_str()) {
            return Err(error(format!(
                "unexpected class '{class}', expected one of {}",
                classes.join(", ")
            )));
        }
        Ok(Deserialisator {
            env: self.env,
            class,
            members,
            used: vec![false; members.len()],
        })
    }

    pub fn sequence<T: Deserialise>(self) -> ResolveResult<Vec<T>> {
        let mut c = self.object(&[CONTAINER])?;
        let count = c.count("count")?;
        let held = c.members.len().saturating_sub(1);
        if count != held {
            return Err(error(format!("container claims {count} items but holds {held}")));
        }
        let mut out = Vec::with_capacity(count);
        for i in 1..=count {
            out.push(c.member(&i.to_string())?);
        }
        c.finish()?;
        Ok(out)
    }
}

/// Reads the members of one object. Every member must be read exactly once.
pub struct Deserialisator<'a> {
    env: &'a dyn Environment,
    class: &'a str,
    members: &'a [(String, Node)],
    used: Vec<bool>,
}

impl<'a> Deserialisator<'a> {
    pub fn class(&self) -> &'a str {
        self.class
    }

    pub fn take(&mut self, key: &str) -> ResolveResult<Deserialisation<'a>> {
        let members: &'a [(String, Node)] = self.members;
        let found = members
            .iter()
            .enumerate()
            .find(|(i, (k, _))| !self.used[*i] && k == key)
            .map(|(i, (_, node))| (i, node));
        match found {
            Some((i, node)) => {
                self.used[i] = true;
                Ok(Deserialisation {
                    env: self.env,
                    node,
                })
            }
            None => Err(error(format!("'{}' has no member '{key}'", self.class))),
        }
    }

    pub fn member<T: Deserialise>(&mut self, key: &str) -> ResolveResult<T> {
        T::deserialise(self.take(key)?)
    }

    pub fn string(&mut self, key: &str) -> ResolveResult<String> {
        Ok(self.take(key)?.as_str()?.to_string())
    }

    pub fn boolean(&mut self, key: &str) -> ResolveResult<bool> {
        match self.take(key)?.as_str()? {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(error(format!("'{other}' is not a boolean"))),
        }
    }

    pub fn count(&mut self, key: &str) -> ResolveResult<usize> {
        let s = self.take(key)?.as_str()?;
        s.parse()
            .map_err(|_| error(format!("'{s}' is not a count")))
    }

    pub fn optional<T: Deserialise>(&mut self, key: &str) -> ResolveResult<Option<T>> {
        let d = self.take(key)?;
        if d.is_null() {
            Ok(None)
        } else {
            T::deserialise(d).map(Some)
        }
    }

    pub fn sequence<T: Deserialise>(&mut self, key: &str) -> ResolveResult<Vec<T>> {
        self.take(key)?.sequence()
    }

    /// Fail if any member was not read.
    pub fn finish(self) -> ResolveResult<()> {
        let leftover: Vec<&str> = self
            .members
            .iter()
            .zip(&self.used)
            .filter(|(_, used)| !**used)
            .map(|((k, _), _)| k.as_str())
            .collect();
        if leftover.is_empty() {
            Ok(())
        } else {
            Err(error(format!(
                "'{}' has unexpected members: {}",
                self.class,
                leftover.join(", ")
            )))
        }
    }
}

fn parse_with<T>(
    d: Deserialisation<'_>,
    what: &str,
    f: impl FnOnce(&str) -> Option<T>,
) -> ResolveResult<T> {
    let s = d.as_str()?;
    f(s).ok_or_else(|| error(format!("'{s}' is not a valid {what}")))
}

// Scalars

impl Serialise for str {
    fn serialise(&self, s: &mut Serialiser) {
        s.string(self);
    }
}

impl Serialise for String {
    fn serialise(&self, s: &mut Serialiser) {
        s.string(self);
    }
}

impl Deserialise for String {
    fn deserialise(d: Deserialisation<'_>) -> ResolveResult<Self> {
        Ok(d.as_str()?.to_string())
    }
}

impl Serialise for PackageId {
    fn serialise(&self, s: &mut Serialiser) {
        s.string(&self.uniquely_identifying_spec().to_string());
    }
}

impl Deserialise for PackageIdRef {
    fn deserialise(d: Deserialisation<'_>) -> ResolveResult<Self> {
        let spec = PackageDepSpec::parse(d.as_str()?)?;
        Ok(d.env.find_id(&spec)?)
    }
}

impl Serialise for PackageOrBlockDepSpec {
    fn serialise(&self, s: &mut Serialiser) {
        s.string(&self.to_string());
    }
}

impl Deserialise for PackageOrBlockDepSpec {
    fn deserialise(d: Deserialisation<'_>) -> ResolveResult<Self> {
        Ok(PackageOrBlockDepSpec::parse(d.as_str()?)?)
    }
}

impl Serialise for JobId {
    fn serialise(&self, s: &mut Serialiser) {
        s.string(self.as_str());
    }
}

impl Deserialise for JobId {
    fn deserialise(d: Deserialisation<'_>) -> ResolveResult<Self> {
        Ok(JobId::new(d.as_str()?))
    }
}

impl Deserialise for UseExisting {
    fn deserialise(d: Deserialisation<'_>) -> ResolveResult<Self> {
        parse_with(d, "use existing value", UseExisting::from_str_opt)
    }
}

impl Deserialise for DestinationType {
    fn deserialise(d: Deserialisation<'_>) -> ResolveResult<Self> {
        Ok(d.as_str()?.parse()?)
    }
}

impl Deserialise for ChangeType {
    fn deserialise(d: Deserialisation<'_>) -> ResolveResult<Self> {
        parse_with(d, "change type", ChangeType::from_str_opt)
    }
}

impl Deserialise for RepositoryName {
    fn deserialise(d: Deserialisation<'_>) -> ResolveResult<Self> {
        Ok(RepositoryName::new(d.as_str()?)?)
    }
}

impl Deserialise for SlotName {
    fn deserialise(d: Deserialisation<'_>) -> ResolveResult<Self> {
        Ok(SlotName::new(d.as_str()?)?)
    }
}

impl Deserialise for SetName {
    fn deserialise(d: Deserialisation<'_>) -> ResolveResult<Self> {
        Ok(SetName::new(d.as_str()?)?)
    }
}

impl Deserialise for QualifiedPackageName {
    fn deserialise(d: Deserialisation<'_>) -> ResolveResult<Self> {
        Ok(d.as_str()?.parse()?)
    }
}

// Resolvents, reasons and constraints

impl Serialise for Resolvent {
    fn serialise(&self, s: &mut Serialiser) {
        s.object("Resolvent")
            .string("package", &self.package.to_string())
            .optional("slot", self.slot.as_ref().map(|x| x.as_str()))
            .string("destination_type", self.destination_type.as_str())
            .end();
    }
}

impl Deserialise for Resolvent {
    fn deserialise(d: Deserialisation<'_>) -> ResolveResult<Self> {
        let mut v = d.object(&["Resolvent"])?;
        let resolvent = Resolvent::new(
            v.member("package")?,
            v.optional("slot")?,
            v.member("destination_type")?,
        );
        v.finish()?;
        Ok(resolvent)
    }
}

impl Serialise for SanitisedDependency {
    fn serialise(&self, s: &mut Serialiser) {
        s.object("SanitisedDependency")
            .member("spec", &self.spec)
            .string("active_labels", &self.active_labels.to_string())
            .string("metadata_key", self.metadata_key.raw_name())
            .string("original_specification", &self.original_specification)
            .end();
    }
}

impl Deserialise for SanitisedDependency {
    fn deserialise(d: Deserialisation<'_>) -> ResolveResult<Self> {
        let mut v = d.object(&["SanitisedDependency"])?;
        let spec = v.member("spec")?;
        let labels = v.string("active_labels")?;
        let labels = labels
            .split('+')
            .filter(|l| !l.is_empty())
            .map(|l| DependencyLabel::parse(l).ok_or_else(|| error(format!("unknown label '{l}'"))))
            .collect::<ResolveResult<Vec<_>>>()?;
        let metadata_key = parse_with(v.take("metadata_key")?, "dependency key", |k| {
            DependencyKey::ALL.into_iter().find(|x| x.raw_name() == k)
        })?;
        let original_specification = v.string("original_specification")?;
        v.finish()?;
        Ok(SanitisedDependency {
            spec,
            active_labels: ActiveLabels::new(&labels),
            metadata_key,
            original_specification,
        })
    }
}

const REASON_CLASSES: &[&str] = &[
    "TargetReason",
    "DependencyReason",
    "PresetReason",
    "SetReason",
    "DependentReason",
    "WasUsedByReason",
    "ViaBinaryReason",
    "LikeOtherDestinationTypeReason",
];

impl Serialise for Reason {
    fn serialise(&self, s: &mut Serialiser) {
        match self {
            Reason::Target => s.object("TargetReason").end(),
            Reason::Dependency(d) => s
                .object("DependencyReason")
                .member("from_resolvent", &d.from_resolvent)
                .member("from_id", &*d.from_id)
                .member("sanitised_dependency", &d.dependency)
                .boolean("already_met", d.already_met)
                .end(),
            Reason::Preset { explanation, inner } => s
                .object("PresetReason")
                .string("explanation", explanation)
                .optional("maybe_reason_for_preset", inner.as_deref())
                .end(),
            Reason::Set { set, inner } => s
                .object("SetReason")
                .string("set_name", set.as_str())
                .member("reason_for_set", &**inner)
                .end(),
            Reason::Dependent { id, dependency } => s
                .object("DependentReason")
                .member("id_being_removed", &**id)
                .member("dependency", dependency)
                .end(),
            Reason::WasUsedBy { ids } => s
                .object("WasUsedByReason")
                .sequence("ids_being_removed", ids.iter().map(|i| &**i))
                .end(),
            Reason::ViaBinary { other } => s
                .object("ViaBinaryReason")
                .member("other_resolvent", other)
                .end(),
            Reason::LikeOtherDestinationType { other, inner } => s
                .object("LikeOtherDestinationTypeReason")
                .member("other_resolvent", other)
                .member("reason_for_other", &**inner)
                .end(),
        }
    }
}

impl Deserialise for Reason {
    fn deserialise(d: Deserialisation<'_>) -> ResolveResult<Self> {
        let mut v = d.object(REASON_CLASSES)?;
        let reason = match v.class() {
            "TargetReason" => Reason::Target,
            "DependencyReason" => Reason::dependency(
                v.member("from_resolvent")?,
                v.member("from_id")?,
                v.member("sanitised_dependency")?,
                v.boolean("already_met")?,
            ),
            "PresetReason" => Reason::preset(
                v.string("explanation")?,
                v.optional("maybe_reason_for_preset")?,
            )?,
            "SetReason" => Reason::set(v.member("set_name")?, v.member("reason_for_set")?)?,
            "DependentReason" => Reason::Dependent {
                id: v.member("id_being_removed")?,
                dependency: v.member("dependency")?,
            },
            "WasUsedByReason" => Reason::WasUsedBy {
                ids: v.sequence("ids_being_removed")?,
            },
            "ViaBinaryReason" => Reason::ViaBinary {
                other: v.member("other_resolvent")?,
            },
            _ => Reason::like_other_destination_type(
                v.member("other_resolvent")?,
                v.member("reason_for_other")?,
            )?,
        };
        v.finish()?;
        Ok(reason)
    }
}

impl Serialise for Constraint {
    fn serialise(&self, s: &mut Serialiser) {
        s.object("Constraint")
            .member("spec", &self.spec)
            .member("reason", &self.reason)
            .string("use_existing", self.use_existing.as_str())
            .boolean("nothing_is_fine_too", self.nothing_is_fine_too)
            .boolean("untaken", self.untaken)
            .boolean("force_unable", self.force_unable)
            .string("destination_type", self.destination_type.as_str())
            .end();
    }
}

impl Deserialise for Constraint {
    fn deserialise(d: Deserialisation<'_>) -> ResolveResult<Self> {
        let mut v = d.object(&["Constraint"])?;
        let constraint = Constraint {
            spec: v.member("spec")?,
            reason: v.member("reason")?,
            use_existing: v.member("use_existing")?,
            nothing_is_fine_too: v.boolean("nothing_is_fine_too")?,
            untaken: v.boolean("untaken")?,
            force_unable: v.boolean("force_unable")?,
            destination_type: v.member("destination_type")?,
        };
        v.finish()?;
        Ok(constraint)
    }
}

impl Serialise for Constraints {
    fn serialise(&self, s: &mut Serialiser) {
        s.object("Constraints").sequence("items", self.iter()).end();
    }
}

impl Deserialise for Constraints {
    fn deserialise(d: Deserialisation<'_>) -> ResolveResult<Self> {
        let mut v = d.object(&["Constraints"])?;
        let items: Vec<Constraint> = v.sequence("items")?;
        v.finish()?;
        Ok(items.into_iter().collect())
    }
}

// Decisions and resolutions

impl Serialise for Destination {
    fn serialise(&self, s: &mut Serialiser) {
        s.object("Destination")
            .string("repository", self.repository.as_str())
            .sequence("replacing", self.replacing.iter().map(|i| &**i))
            .end();
    }
}

impl Deserialise for Destination {
    fn deserialise(d: Deserialisation<'_>) -> ResolveResult<Self> {
        let mut v = d.object(&["Destination"])?;
        let destination = Destination {
            repository: v.member("repository")?,
            replacing: v.sequence("replacing")?,
        };
        v.finish()?;
        Ok(destination)
    }
}

impl Serialise for UnsuitableCandidate {
    fn serialise(&self, s: &mut Serialiser) {
        s.object("UnsuitableCandidate")
            .member("package_id", &*self.id)
            .member("unmet_constraints", &self.unmet_constraints)
            .end();
    }
}

impl Deserialise for UnsuitableCandidate {
    fn deserialise(d: Deserialisation<'_>) -> ResolveResult<Self> {
        let mut v = d.object(&["UnsuitableCandidate"])?;
        let candidate = UnsuitableCandidate {
            id: v.member("package_id")?,
            unmet_constraints: v.member("unmet_constraints")?,
        };
        v.finish()?;
        Ok(candidate)
    }
}

const DECISION_CLASSES: &[&str] = &[
    "NothingNoChangeDecision",
    "ExistingNoChangeDecision",
    "ChangesToMakeDecision",
    "RemoveDecision",
    "UnableToMakeDecision",
    "BreakDecision",
];

impl Serialise for Decision {
    fn serialise(&self, s: &mut Serialiser) {
        match self {
            Decision::NothingNoChange { resolvent, taken } => s
                .object("NothingNoChangeDecision")
                .member("resolvent", resolvent)
                .boolean("taken", *taken)
                .end(),
            Decision::ExistingNoChange {
                resolvent,
                existing_id,
                is_same,
                is_same_version,
                is_transient,
                taken,
            } => s
                .object("ExistingNoChangeDecision")
                .member("resolvent", resolvent)
                .member("existing_id", &**existing_id)
                .boolean("is_same", *is_same)
                .boolean("is_same_version", *is_same_version)
                .boolean("is_transient", *is_transient)
                .boolean("taken", *taken)
                .end(),
            Decision::ChangesToMake {
                resolvent,
                origin_id,
                best,
                change_type,
                destination,
                taken,
            } => s
                .object("ChangesToMakeDecision")
                .member("resolvent", resolvent)
                .member("origin_id", &**origin_id)
                .boolean("best", *best)
                .string("change_type", change_type.as_str())
                .optional("destination", destination.as_ref())
                .boolean("taken", *taken)
                .end(),
            Decision::Remove {
                resolvent,
                ids,
                taken,
            } => s
                .object("RemoveDecision")
                .member("resolvent", resolvent)
                .sequence("ids", ids.iter().map(|i| &**i))
                .boolean("taken", *taken)
                .end(),
            Decision::UnableToMake {
                resolvent,
                unsuitable_candidates,
                taken,
            } => s
                .object("UnableToMakeDecision")
                .member("resolvent", resolvent)
                .sequence("unsuitable_candidates", unsuitable_candidates)
                .boolean("taken", *taken)
                .end(),
            Decision::Break {
                resolvent,
                existing_id,
                taken,
            } => s
                .object("BreakDecision")
                .member("resolvent", resolvent)
                .member("existing_id", &**existing_id)
                .boolean("taken", *taken)
                .end(),
        }
    }
}

impl Deserialise for Decision {
    fn deserialise(d: Deserialisation<'_>) -> ResolveResult<Self> {
        let mut v = d.object(DECISION_CLASSES)?;
        let decision = match v.class() {
            "NothingNoChangeDecision" => Decision::NothingNoChange {
                resolvent: v.member("resolvent")?,
                taken: v.boolean("taken")?,
            },
            "ExistingNoChangeDecision" => Decision::ExistingNoChange {
                resolvent: v.member("resolvent")?,
                existing_id: v.member("existing_id")?,
                is_same: v.boolean("is_same")?,
                is_same_version: v.boolean("is_same_version")?,
                is_transient: v.boolean("is_transient")?,
                taken: v.boolean("taken")?,
            },
            "ChangesToMakeDecision" => Decision::ChangesToMake {
                resolvent: v.member("resolvent")?,
                origin_id: v.member("origin_id")?,
                best: v.boolean("best")?,
                change_type: v.member("change_type")?,
                destination: v.optional("destination")?,
                taken: v.boolean("taken")?,
            },
            "RemoveDecision" => Decision::Remove {
                resolvent: v.member("resolvent")?,
                ids: v.sequence("ids")?,
                taken: v.boolean("taken")?,
            },
            "UnableToMakeDecision" => Decision::UnableToMake {
                resolvent: v.member("resolvent")?,
                unsuitable_candidates: v.sequence("unsuitable_candidates")?,
                taken: v.boolean("taken")?,
            },
            _ => Decision::Break {
                resolvent: v.member("resolvent")?,
                existing_id: v.member("existing_id")?,
                taken: v.boolean("taken")?,
            },
        };
        v.finish()?;
        Ok(decision)
    }
}

impl Serialise for Resolution {
    fn serialise(&self, s: &mut Serialiser) {
        s.object("Resolution")
            .member("resolvent", &self.resolvent)
            .member("constraints", &self.constraints)
            .optional("decision", self.decision.as_ref())
            .end();
    }
}

impl Deserialise for Resolution {
    fn deserialise(d: Deserialisation<'_>) -> ResolveResult<Self> {
        let mut v = d.object(&["Resolution"])?;
        let resolution = Resolution {
            resolvent: v.member("resolvent")?,
            constraints: v.member("constraints")?,
            decision: v.optional("decision")?,
        };
        v.finish()?;
        Ok(resolution)
    }
}

impl Serialise for Resolutions {
    fn serialise(&self, s: &mut Serialiser) {
        s.object("Resolutions").sequence("items", self.iter()).end();
    }
}

impl Deserialise for Resolutions {
    fn deserialise(d: Deserialisation<'_>) -> ResolveResult<Self> {
        let mut v = d.object(&["Resolutions"])?;
        let items: Vec<Resolution> = v.sequence("items")?;
        v.finish()?;
        let mut out = Resolutions::new();
        for r in items {
            if out.contains(&r.resolvent) {
                return Err(error(format!("resolvent {} appears twice", r.resolvent)));
            }
            out.insert(r);
        }
        Ok(out)
    }
}

// Jobs

const WORK_ITEM_CLASSES: &[&str] = &[
    "PretendWorkItem",
    "FetchWorkItem",
    "InstallWorkItem",
    "UninstallWorkItem",
];

impl Serialise for WorkItem {
    fn serialise(&self, s: &mut Serialiser) {
        match self {
            WorkItem::Pretend { origin_id } => s
                .object("PretendWorkItem")
                .member("origin_id", &**origin_id)
                .end(),
            WorkItem::Fetch { origin_id } => s
                .object("FetchWorkItem")
                .member("origin_id", &**origin_id)
                .end(),
            WorkItem::Install {
                origin_id,
                destination,
                replacing,
            } => s
                .object("InstallWorkItem")
                .member("origin_id", &**origin_id)
                .string("destination_repository_name", destination.as_str())
                .sequence("replacing", replacing.iter().map(|i| &**i))
                .end(),
            WorkItem::Uninstall { ids } => s
                .object("UninstallWorkItem")
                .sequence("ids_to_remove", ids.iter().map(|i| &**i))
                .end(),
        }
    }
}

impl Deserialise for WorkItem {
    fn deserialise(d: Deserialisation<'_>) -> ResolveResult<Self> {
        let mut v = d.object(WORK_ITEM_CLASSES)?;
        let item = match v.class() {
            "PretendWorkItem" => WorkItem::Pretend {
                origin_id: v.member("origin_id")?,
            },
            "FetchWorkItem" => WorkItem::Fetch {
                origin_id: v.member("origin_id")?,
            },
            "InstallWorkItem" => WorkItem::Install {
                origin_id: v.member("origin_id")?,
                destination: v.member("destination_repository_name")?,
                replacing: v.sequence("replacing")?,
            },
            _ => WorkItem::Uninstall {
                ids: v.sequence("ids_to_remove")?,
            },
        };
        v.finish()?;
        Ok(item)
    }
}

impl Serialise for Arrow {
    fn serialise(&self, s: &mut Serialiser) {
        s.object("Arrow")
            .member("comes_after", &self.comes_after)
            .boolean("ignorable_if_satisfied", self.ignorable_if_satisfied)
            .optional("reason", self.reason.as_ref())
            .end();
    }
}

impl Deserialise for Arrow {
    fn deserialise(d: Deserialisation<'_>) -> ResolveResult<Self> {
        let mut v = d.object(&["Arrow"])?;
        let arrow = Arrow {
            comes_after: v.member("comes_after")?,
            ignorable_if_satisfied: v.boolean("ignorable_if_satisfied")?,
            reason: v.optional("reason")?,
        };
        v.finish()?;
        Ok(arrow)
    }
}

const JOB_CLASSES: &[&str] = &[
    "PretendJob",
    "FetchJob",
    "SimpleInstallJob",
    "UsableJob",
    "UsableGroupJob",
    "ErrorJob",
    "UntakenInstallJob",
    "SyncPointJob",
];

impl Serialise for Job {
    fn serialise(&self, s: &mut Serialiser) {
        let (class, resolvent, work_item) = match &self.kind {
            JobKind::Pretend(j) => ("PretendJob", Some(&j.resolvent), Some(&j.work_item)),
            JobKind::Fetch(j) => ("FetchJob", Some(&j.resolvent), Some(&j.work_item)),
            JobKind::SimpleInstall(j) => {
                ("SimpleInstallJob", Some(&j.resolvent), Some(&j.work_item))
            }
            JobKind::Usable(j) => ("UsableJob", Some(&j.resolvent), None),
            JobKind::UsableGroup(_) => ("UsableGroupJob", None, None),
            JobKind::Error(j) => ("ErrorJob", Some(&j.resolvent), None),
            JobKind::UntakenInstall(j) => ("UntakenInstallJob", Some(&j.resolvent), None),
            JobKind::SyncPoint(_) => ("SyncPointJob", None, None),
        };

        let mut o = s.object(class).member("id", &self.id);
        if let Some(r) = resolvent {
            o = o.member("resolvent", r);
        }
        if let Some(w) = work_item {
            o = o.member("work_item", w);
        }
        match &self.kind {
            JobKind::UsableGroup(g) => o = o.sequence("job_ids", &g.job_ids),
            JobKind::SyncPoint(p) => o = o.string("sync_point", p.sync_point.as_str()),
            _ => {}
        }
        o.sequence("arrows", &self.arrows).end();
    }
}

impl Deserialise for Job {
    fn deserialise(d: Deserialisation<'_>) -> ResolveResult<Self> {
        let mut v = d.object(JOB_CLASSES)?;
        let id: JobId = v.member("id")?;
        let kind = match v.class() {
            "PretendJob" => JobKind::Pretend(PretendJob {
                resolvent: v.member("resolvent")?,
                work_item: v.member("work_item")?,
            }),
            "FetchJob" => JobKind::Fetch(FetchJob {
                resolvent: v.member("resolvent")?,
                work_item: v.member("work_item")?,
            }),
            "SimpleInstallJob" => JobKind::SimpleInstall(SimpleInstallJob {
                resolvent: v.member("resolvent")?,
                work_item: v.member("work_item")?,
            }),
            "UsableJob" => JobKind::Usable(UsableJob {
                resolvent: v.member("resolvent")?,
            }),
            "UsableGroupJob" => JobKind::UsableGroup(UsableGroupJob {
                job_ids: v.sequence("job_ids")?,
            }),
            "ErrorJob" => JobKind::Error(ErrorJob {
                resolvent: v.member("resolvent")?,
            }),
            "UntakenInstallJob" => JobKind::UntakenInstall(UntakenInstallJob {
                resolvent: v.member("resolvent")?,
            }),
            _ => JobKind::SyncPoint(SyncPointJob {
                sync_point: parse_with(v.take("sync_point")?, "sync point", SyncPoint::from_str_opt)?,
            }),
        };
        let arrows = v.sequence("arrows")?;
        v.finish()?;
        Ok(Job { id, kind, arrows })
    }
}

impl Serialise for JobLists {
    fn serialise(&self, s: &mut Serialiser) {
        s.object("JobLists")
            .sequence("jobs", self.jobs.iter())
            .sequence("ordered_job_ids", &self.ordered_job_ids)
            .sequence("untaken_job_ids", &self.untaken_job_ids)
            .sequence("error_job_ids", &self.error_job_ids)
            .end();
    }
}

impl Deserialise for JobLists {
    fn deserialise(d: Deserialisation<'_>) -> ResolveResult<Self> {
        let mut v = d.object(&["JobLists"])?;
        let mut jobs = Jobs::new();
        for job in v.sequence::<Job>("jobs")? {
            jobs.add(job)?;
        }
        let lists = JobLists {
            jobs,
            ordered_job_ids: v.sequence("ordered_job_ids")?,
            untaken_job_ids: v.sequence("untaken_job_ids")?,
            error_job_ids: v.sequence("error_job_ids")?,
        };
        v.finish()?;
        for id in lists
            .ordered_job_ids
            .iter()
            .chain(&lists.untaken_job_ids)
            .chain(&lists.error_job_ids)
        {
            if !lists.jobs.contains(id) {
                return Err(error(format!("job list names unknown job '{id}'")));
            }
        }
        Ok(lists)
    }
}

impl Serialise for ResolverLists {
    fn serialise(&self, s: &mut Serialiser) {
        s.object("ResolverLists")
            .member("resolutions", &self.resolutions)
            .member("job_lists", &self.job_lists)
            .sequence("taken_error_resolvents", &self.taken_error_resolvents)
            .end();
    }
}

impl Deserialise for ResolverLists {
    fn deserialise(d: Deserialisation<'_>) -> ResolveResult<Self> {
        let mut v = d.object(&["ResolverLists"])?;
        let lists = ResolverLists {
            resolutions: v.member("resolutions")?,
            job_lists: v.member("job_lists")?,
            taken_error_resolvents: v.sequence("taken_error_resolvents")?,
        };
        v.finish()?;
        Ok(lists)
    }
}

impl<T: Serialise + ?Sized> Serialise for Arc<T> {
    fn serialise(&self, s: &mut Serialiser) {
        (**self).serialise(s);
    }
}
