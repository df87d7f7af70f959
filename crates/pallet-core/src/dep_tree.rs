//! Dependency trees: parsing, display and canonicalisation.
//!
//! The textual syntax is whitespace separated:
//!
//! ```text
//! build: dev-util/cmake
//! run: ssl? ( dev-libs/openssl:= ) || ( app-a/one app-a/two ) !!app-b/old
//! suggestion: @extras
//! ```

use std::collections::BTreeSet;
use std::fmt;

use pallet_util::errors::PalletError;

use crate::dep_spec::{BlockDepSpec, PackageDepSpec, SlotRequirement};
use crate::name::SetName;

/// A dependency label, changing how the dependencies after it are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DependencyLabel {
    Build,
    Run,
    Post,
    Install,
    Fetch,
    Test,
    CompileAgainst,
    Suggestion,
    Recommendation,
    Required,
}

impl DependencyLabel {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "build" => DependencyLabel::Build,
            "run" => DependencyLabel::Run,
            "post" => DependencyLabel::Post,
            "install" => DependencyLabel::Install,
            "fetch" => DependencyLabel::Fetch,
            "test" => DependencyLabel::Test,
            "compile-against" => DependencyLabel::CompileAgainst,
            "suggestion" => DependencyLabel::Suggestion,
            "recommendation" => DependencyLabel::Recommendation,
            "required" => DependencyLabel::Required,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DependencyLabel::Build => "build",
            DependencyLabel::Run => "run",
            DependencyLabel::Post => "post",
            DependencyLabel::Install => "install",
            DependencyLabel::Fetch => "fetch",
            DependencyLabel::Test => "test",
            DependencyLabel::CompileAgainst => "compile-against",
            DependencyLabel::Suggestion => "suggestion",
            DependencyLabel::Recommendation => "recommendation",
            DependencyLabel::Required => "required",
        }
    }

    /// Suggestion labels say how strongly something is wanted; the others
    /// say when it is needed.
    pub fn is_suggestion_label(self) -> bool {
        matches!(
            self,
            DependencyLabel::Suggestion | DependencyLabel::Recommendation | DependencyLabel::Required
        )
    }

    /// Labels whose dependencies must be usable before building.
    pub fn is_build_class(self) -> bool {
        matches!(
            self,
            DependencyLabel::Build
                | DependencyLabel::Install
                | DependencyLabel::Fetch
                | DependencyLabel::Test
                | DependencyLabel::CompileAgainst
        )
    }
}

impl fmt::Display for DependencyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The labels in force at some point of a dependency tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ActiveLabels {
    pub type_labels: Vec<DependencyLabel>,
    pub suggestion_labels: Vec<DependencyLabel>,
}

impl ActiveLabels {
    pub fn new(initial: &[DependencyLabel]) -> Self {
        Self::default().with(initial)
    }

    /// Apply a label node: each kind of label present replaces the active
    /// labels of that kind.
    pub fn with(&self, labels: &[DependencyLabel]) -> Self {
        let (suggest, types): (Vec<_>, Vec<_>) =
            labels.iter().copied().partition(|l| l.is_suggestion_label());
        Self {
            type_labels: if types.is_empty() {
                self.type_labels.clone()
            } else {
                types
            },
            suggestion_labels: if suggest.is_empty() {
                self.suggestion_labels.clone()
            } else {
                suggest
            },
        }
    }

    pub fn all(&self) -> impl Iterator<Item = DependencyLabel> + '_ {
        self.type_labels
            .iter()
            .chain(self.suggestion_labels.iter())
            .copied()
    }

    pub fn is_suggestion(&self) -> bool {
        !self.suggestion_labels.is_empty()
            && self
                .suggestion_labels
                .iter()
                .all(|l| *l == DependencyLabel::Suggestion)
    }

    pub fn is_recommendation(&self) -> bool {
        !self.suggestion_labels.is_empty()
            && !self.suggestion_labels.contains(&DependencyLabel::Required)
            && self
                .suggestion_labels
                .contains(&DependencyLabel::Recommendation)
    }

    /// Only needed at build time: no run or post labels are active.
    pub fn is_just_build(&self) -> bool {
        !self.type_labels.is_empty() && self.type_labels.iter().all(|l| l.is_build_class())
    }

    pub fn is_run_or_post(&self) -> bool {
        self.type_labels
            .iter()
            .any(|l| matches!(l, DependencyLabel::Run | DependencyLabel::Post))
    }

    pub fn is_compile_against(&self) -> bool {
        self.type_labels.contains(&DependencyLabel::CompileAgainst)
    }
}

impl fmt::Display for ActiveLabels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.all().map(|l| l.as_str()).collect();
        f.write_str(&names.join("+"))
    }
}

/// A node of a dependency tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DepTree {
    All(Vec<DepTree>),
    AnyOf(Vec<DepTree>),
    Conditional {
        flag: String,
        inverse: bool,
        children: Vec<DepTree>,
    },
    Package(PackageDepSpec),
    Block(BlockDepSpec),
    Labels(Vec<DependencyLabel>),
    NamedSet(SetName),
}

impl DepTree {
    pub fn empty() -> Self {
        DepTree::All(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, DepTree::All(c) if c.is_empty())
    }

    /// Parse a whitespace separated dependency string into an `All` node.
    pub fn parse(text: &str) -> Result<Self, PalletError> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let mut pos = 0;
        let children = parse_sequence(text, &tokens, &mut pos, false)?;
        Ok(DepTree::All(children))
    }

    /// A normalised string for comparing trees for sameness.
    ///
    /// Locked slot requirements (`:3=` and `:=`) collapse to one token,
    /// nested conditionals become an order-independent set of conditions,
    /// nested all-groups are flattened and sibling entries are sorted.
    pub fn canonical_form(&self) -> String {
        let mut entries = BTreeSet::new();
        collect_canonical(self, &BTreeSet::new(), &ActiveLabels::default(), &mut entries);
        entries.into_iter().collect::<Vec<_>>().join(" ")
    }
}

fn parse_sequence(
    text: &str,
    tokens: &[&str],
    pos: &mut usize,
    nested: bool,
) -> Result<Vec<DepTree>, PalletError> {
    let err = |m: &str| PalletError::MalformedDependency {
        text: text.to_string(),
        message: m.to_string(),
    };
    let mut out = Vec::new();

    while *pos < tokens.len() {
        let tok = tokens[*pos];
        *pos += 1;
        match tok {
            ")" => {
                if nested {
                    return Ok(out);
                }
                return Err(err("unexpected ')'"));
            }
            "(" => {
                let children = parse_sequence(text, tokens, pos, true)?;
                out.push(DepTree::All(children));
            }
            "||" => {
                expect_open(tokens, pos).ok_or_else(|| err("expected '(' after '||'"))?;
                let children = parse_sequence(text, tokens, pos, true)?;
                out.push(DepTree::AnyOf(children));
            }
            t if t.ends_with('?') => {
                let cond = &t[..t.len() - 1];
                let (flag, inverse) = match cond.strip_prefix('!') {
                    Some(f) => (f, true),
                    None => (cond, false),
                };
                if flag.is_empty() {
                    return Err(err("empty condition"));
                }
                expect_open(tokens, pos).ok_or_else(|| err("expected '(' after condition"))?;
                let children = parse_sequence(text, tokens, pos, true)?;
                out.push(DepTree::Conditional {
                    flag: flag.to_string(),
                    inverse,
                    children,
                });
            }
            t if t.ends_with(':') => {
                let labels = t[..t.len() - 1]
                    .split('+')
                    .map(|l| DependencyLabel::parse(l).ok_or_else(|| err("unknown label")))
                    .collect::<Result<Vec<_>, _>>()?;
                out.push(DepTree::Labels(labels));
            }
            t if t.starts_with('@') => {
                out.push(DepTree::NamedSet(SetName::new(&t[1..])?));
            }
            t if t.starts_with('!') => {
                out.push(DepTree::Block(BlockDepSpec::parse(t)?));
            }
            t => {
                out.push(DepTree::Package(PackageDepSpec::parse(t)?));
            }
        }
    }

    if nested {
        Err(err("missing ')'"))
    } else {
        Ok(out)
    }
}

fn expect_open(tokens: &[&str], pos: &mut usize) -> Option<()> {
    if tokens.get(*pos) == Some(&"(") {
        *pos += 1;
        Some(())
    } else {
        None
    }
}

fn canonical_spec(spec: &PackageDepSpec) -> String {
    let mut spec = spec.clone();
    if let Some(SlotRequirement::ExactLocked(_)) = spec.slot {
        spec.slot = Some(SlotRequirement::AnyLocked);
    }
    spec.to_string()
}

fn collect_canonical(
    node: &DepTree,
    conditions: &BTreeSet<String>,
    labels: &ActiveLabels,
    out: &mut BTreeSet<String>,
) {
    let prefix = || {
        let mut p = String::new();
        for c in conditions {
            p.push_str(c);
            p.push(' ');
        }
        if labels.all().next().is_some() {
            p.push_str(&format!("{labels}: "));
        }
        p
    };

    match node {
        DepTree::All(children) => collect_children(children, conditions, labels, out),
        DepTree::Conditional {
            flag,
            inverse,
            children,
        } => {
            let mut conditions = conditions.clone();
            conditions.insert(format!("{}{flag}?", if *inverse { "!" } else { "" }));
            collect_children(children, &conditions, labels, out);
        }
        DepTree::AnyOf(children) => {
            let inner: Vec<String> = children
                .iter()
                .map(|c| c.canonical_form())
                .filter(|s| !s.is_empty())
                .collect();
            out.insert(format!("{}|| ( {} )", prefix(), inner.join(" ) ( ")));
        }
        DepTree::Package(spec) => {
            out.insert(format!("{}{}", prefix(), canonical_spec(spec)));
        }
        DepTree::Block(block) => {
            let bangs = if block.strong { "!!" } else { "!" };
            out.insert(format!("{}{bangs}{}", prefix(), canonical_spec(&block.blocking)));
        }
        DepTree::NamedSet(name) => {
            out.insert(format!("{}@{name}", prefix()));
        }
        DepTree::Labels(_) => {}
    }
}

fn collect_children(
    children: &[DepTree],
    conditions: &BTreeSet<String>,
    labels: &ActiveLabels,
    out: &mut BTreeSet<String>,
) {
    let mut labels = labels.clone();
    for child in children {
        if let DepTree::Labels(l) = child {
            labels = labels.with(l);
        } else {
            collect_canonical(child, conditions, &labels, out);
        }
    }
}

impl fmt::Display for DepTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(children: &[DepTree]) -> String {
            children
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        }

        match self {
            DepTree::All(children) => write!(f, "{}", join(children)),
            DepTree::AnyOf(children) => write!(f, "|| ( {} )", join(children)),
            DepTree::Conditional {
                flag,
                inverse,
                children,
            } => {
                let bang = if *inverse { "!" } else { "" };
                write!(f, "{bang}{flag}? ( {} )", join(children))
            }
            DepTree::Package(spec) => write!(f, "{spec}"),
            DepTree::Block(spec) => write!(f, "{spec}"),
            DepTree::Labels(labels) => {
                let names: Vec<&str> = labels.iter().map(|l| l.as_str()).collect();
                write!(f, "{}:", names.join("+"))
            }
            DepTree::NamedSet(name) => write!(f, "@{name}"),
        }
    }
}
