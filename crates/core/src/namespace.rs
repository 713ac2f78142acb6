//! Closed predicate vocabulary.
//!
//! Every relation in a [`KnowledgeGraph`](crate::KnowledgeGraph) is named by
//! an [`Ns`]: a prefix followed by a dotted path, e.g.
//! `ns:fx.mc.file.path`. Checked identifiers must resolve to a node of the
//! static vocabulary tree below; the root `ns` is always known.
//!
//! ```rust
//! use mozdep::{vocab, Ns};
//!
//! let path = Ns::root().child("fx")?.child("mc")?.child("file")?.child("path")?;
//! assert_eq!(path, vocab::FILE_PATH);
//! assert!(Ns::root().child("fx")?.child("nope").is_err());
//! # Ok::<(), mozdep::NamespaceError>(())
//! ```

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

const ROOT: &str = "ns";

/// A predicate path was not found in the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid namespace identifier `{0}`")]
pub struct NamespaceError(pub String);

struct Node {
    name: &'static str,
    children: &'static [Node],
}

const fn leaf(name: &'static str) -> Node {
    Node {
        name,
        children: &[],
    }
}

const fn node(name: &'static str, children: &'static [Node]) -> Node {
    Node { name, children }
}

/// Children of the `ns` root.
static VOCABULARY: &[Node] = &[
    node(
        "bz",
        &[node(
            "product",
            &[leaf("name"), node("component", &[leaf("name")])],
        )],
    ),
    node(
        "fx",
        &[node(
            "mc",
            &[
                node("dir", &[leaf("path")]),
                node(
                    "file",
                    &[
                        leaf("path"),
                        leaf("part_of"),
                        leaf("in_component"),
                        leaf("top_dependency"),
                    ],
                ),
                leaf("file_set"),
                node(
                    "lib",
                    &[
                        leaf("name"),
                        leaf("description"),
                        node("dep", &[leaf("name"), leaf("detected_by")]),
                    ],
                ),
                node("detector", &[leaf("name")]),
            ],
        )],
    ),
    node("gh", &[node("repo", &[leaf("url"), leaf("version")])]),
    node("id", &[leaf("label"), leaf("name")]),
    node("language", &[leaf("name")]),
    node("rel", &[leaf("contains"), leaf("part_of"), leaf("same_as")]),
    node("t", &[leaf("generic_type")]),
    node("version", &[leaf("spec"), leaf("type")]),
    node(
        "vuln",
        &[
            leaf("affects"),
            leaf("class"),
            leaf("database"),
            leaf("description"),
            leaf("detector_name"),
            leaf("id"),
            leaf("info_link"),
            leaf("severity"),
            leaf("summary"),
            leaf("title"),
            leaf("version_match"),
            leaf("weakness_id"),
        ],
    ),
];

/// Hierarchical predicate identifier.
///
/// Equality and hashing follow the path string only. The partial order is
/// ancestry, not lexicographic: `a < b` iff `a` is a proper ancestor of `b`,
/// and unrelated paths are incomparable.
#[derive(Clone)]
pub struct Ns {
    path: Cow<'static, str>,
    checked: bool,
}

impl Ns {
    const fn from_static(path: &'static str) -> Self {
        Self {
            path: Cow::Borrowed(path),
            checked: true,
        }
    }

    /// The vocabulary root, `ns`.
    pub const fn root() -> Self {
        Self::from_static(ROOT)
    }

    /// The root of an unchecked namespace. Children derived from it are
    /// never validated.
    pub const fn unchecked_root() -> Self {
        Self {
            path: Cow::Borrowed(ROOT),
            checked: false,
        }
    }

    /// Parse and validate a full identifier such as `ns:fx.mc.file.path`.
    pub fn parse(path: &str) -> Result<Self, NamespaceError> {
        let ns = Self::parse_unchecked(path);
        if ns.is_known() {
            Ok(Self {
                checked: true,
                ..ns
            })
        } else {
            Err(NamespaceError(path.to_string()))
        }
    }

    /// Wrap a path without consulting the vocabulary.
    pub fn parse_unchecked(path: &str) -> Self {
        Self {
            path: Cow::Owned(path.to_string()),
            checked: false,
        }
    }

    /// One level deeper. Fails if this identifier is checked and the child
    /// is not in the vocabulary.
    pub fn child(&self, segment: &str) -> Result<Self, NamespaceError> {
        let separator = if self.path.contains(':') { '.' } else { ':' };
        let path = format!("{}{separator}{segment}", self.path);
        let ns = Self {
            path: Cow::Owned(path),
            checked: self.checked,
        };
        if ns.checked && !ns.is_known() {
            return Err(NamespaceError(ns.path.into_owned()));
        }
        Ok(ns)
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Whether this identifier was validated on construction.
    pub fn is_checked(&self) -> bool {
        self.checked
    }

    /// The part before the colon (`ns` for every vocabulary entry).
    pub fn prefix(&self) -> &str {
        self.path.split(':').next().unwrap_or_default()
    }

    /// The dotted path segments after the colon; empty for a bare prefix.
    pub fn segments(&self) -> Vec<&str> {
        match self.path.split_once(':') {
            Some((_, rest)) => rest.split('.').collect(),
            None => Vec::new(),
        }
    }

    /// Walk the vocabulary tree segment by segment.
    pub fn is_known(&self) -> bool {
        if self.prefix() != ROOT {
            return false;
        }
        let mut level = VOCABULARY;
        for segment in self.segments() {
            match level.iter().find(|n| n.name == segment) {
                Some(found) => level = found.children,
                None => return false,
            }
        }
        true
    }

    /// True iff `self` is a proper ancestor of `other`, segment-wise.
    pub fn is_ancestor_of(&self, other: &Ns) -> bool {
        if self.prefix() != other.prefix() {
            return false;
        }
        let mine = self.segments();
        let theirs = other.segments();
        mine.len() < theirs.len() && theirs.starts_with(&mine)
    }

    /// Every vocabulary entry below the root, breadth first.
    pub fn iter_all() -> impl Iterator<Item = Ns> {
        let mut queue: VecDeque<(String, &'static [Node])> = VecDeque::new();
        queue.push_back((ROOT.to_string(), VOCABULARY));
        let mut pending: VecDeque<Ns> = VecDeque::new();
        std::iter::from_fn(move || loop {
            if let Some(next) = pending.pop_front() {
                return Some(next);
            }
            let (parent, children) = queue.pop_front()?;
            for child in children {
                let separator = if parent.contains(':') { '.' } else { ':' };
                let path = format!("{parent}{separator}{}", child.name);
                if !child.children.is_empty() {
                    queue.push_back((path.clone(), child.children));
                }
                pending.push_back(Ns {
                    path: Cow::Owned(path),
                    checked: true,
                });
            }
        })
    }

    /// Number of entries yielded by [`Ns::iter_all`].
    pub fn vocabulary_len() -> usize {
        enumeration().len()
    }

    /// Position of `ns` in the vocabulary enumeration.
    ///
    /// The index is only meaningful within one build of this crate. Do not
    /// persist it or use it for identification.
    pub fn index_of(ns: &Ns) -> Option<usize> {
        enumeration().iter().position(|candidate| candidate == ns)
    }

    /// Inverse of [`Ns::index_of`]. Same stability caveat applies.
    pub fn by_index(index: usize) -> Option<Ns> {
        enumeration().get(index).cloned()
    }
}

fn enumeration() -> &'static [Ns] {
    static INDEX: OnceLock<Vec<Ns>> = OnceLock::new();
    INDEX.get_or_init(|| Ns::iter_all().collect())
}

impl PartialEq for Ns {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for Ns {}

impl Hash for Ns {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl PartialOrd for Ns {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self == other {
            Some(Ordering::Equal)
        } else if self.is_ancestor_of(other) {
            Some(Ordering::Less)
        } else if other.is_ancestor_of(self) {
            Some(Ordering::Greater)
        } else {
            None
        }
    }
}

impl fmt::Display for Ns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl fmt::Debug for Ns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ns({:?})", self.path)
    }
}

impl FromStr for Ns {
    type Err = NamespaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Ns {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.path)
    }
}

// Validation is left to the graph that receives the predicate, so that dumps
// of permissive graphs can be read back.
impl<'de> Deserialize<'de> for Ns {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let path = String::deserialize(deserializer)?;
        Ok(Ns::parse_unchecked(&path))
    }
}

/// Predicates used by the dependency schema.
pub mod vocab {
    use super::Ns;

    pub const BZ_PRODUCT_NAME: Ns = Ns::from_static("ns:bz.product.name");
    pub const BZ_COMPONENT_NAME: Ns = Ns::from_static("ns:bz.product.component.name");

    pub const DIR_PATH: Ns = Ns::from_static("ns:fx.mc.dir.path");
    pub const FILE_PATH: Ns = Ns::from_static("ns:fx.mc.file.path");
    pub const FILE_PART_OF: Ns = Ns::from_static("ns:fx.mc.file.part_of");
    pub const FILE_IN_COMPONENT: Ns = Ns::from_static("ns:fx.mc.file.in_component");
    pub const FILE_TOP_DEPENDENCY: Ns = Ns::from_static("ns:fx.mc.file.top_dependency");
    pub const FILE_SET: Ns = Ns::from_static("ns:fx.mc.file_set");

    /// Relates a dependency subject to its library subject.
    pub const LIB: Ns = Ns::from_static("ns:fx.mc.lib");
    pub const LIB_NAME: Ns = Ns::from_static("ns:fx.mc.lib.name");
    pub const LIB_DESCRIPTION: Ns = Ns::from_static("ns:fx.mc.lib.description");
    pub const DEP_NAME: Ns = Ns::from_static("ns:fx.mc.lib.dep.name");
    pub const DEP_DETECTED_BY: Ns = Ns::from_static("ns:fx.mc.lib.dep.detected_by");
    pub const DETECTOR_NAME: Ns = Ns::from_static("ns:fx.mc.detector.name");

    pub const REPO_URL: Ns = Ns::from_static("ns:gh.repo.url");
    pub const REPO_VERSION: Ns = Ns::from_static("ns:gh.repo.version");

    pub const ID_LABEL: Ns = Ns::from_static("ns:id.label");
    pub const ID_NAME: Ns = Ns::from_static("ns:id.name");
    pub const LANGUAGE_NAME: Ns = Ns::from_static("ns:language.name");

    pub const REL_CONTAINS: Ns = Ns::from_static("ns:rel.contains");
    pub const REL_PART_OF: Ns = Ns::from_static("ns:rel.part_of");
    pub const REL_SAME_AS: Ns = Ns::from_static("ns:rel.same_as");
    pub const GENERIC_TYPE: Ns = Ns::from_static("ns:t.generic_type");

    pub const VERSION_SPEC: Ns = Ns::from_static("ns:version.spec");
    pub const VERSION_TYPE: Ns = Ns::from_static("ns:version.type");

    pub const VULN_AFFECTS: Ns = Ns::from_static("ns:vuln.affects");
    pub const VULN_CLASS: Ns = Ns::from_static("ns:vuln.class");
    pub const VULN_DATABASE: Ns = Ns::from_static("ns:vuln.database");
    pub const VULN_DESCRIPTION: Ns = Ns::from_static("ns:vuln.description");
    pub const VULN_DETECTOR_NAME: Ns = Ns::from_static("ns:vuln.detector_name");
    pub const VULN_ID: Ns = Ns::from_static("ns:vuln.id");
    pub const VULN_INFO_LINK: Ns = Ns::from_static("ns:vuln.info_link");
    pub const VULN_SEVERITY: Ns = Ns::from_static("ns:vuln.severity");
    pub const VULN_SUMMARY: Ns = Ns::from_static("ns:vuln.summary");
    pub const VULN_TITLE: Ns = Ns::from_static("ns:vuln.title");
    pub const VULN_VERSION_MATCH: Ns = Ns::from_static("ns:vuln.version_match");
    pub const VULN_WEAKNESS_ID: Ns = Ns::from_static("ns:vuln.weakness_id");

    #[cfg(test)]
    pub(super) const ALL: &[Ns] = &[
        BZ_PRODUCT_NAME,
        BZ_COMPONENT_NAME,
        DIR_PATH,
        FILE_PATH,
        FILE_PART_OF,
        FILE_IN_COMPONENT,
        FILE_TOP_DEPENDENCY,
        FILE_SET,
        LIB,
        LIB_NAME,
        LIB_DESCRIPTION,
        DEP_NAME,
        DEP_DETECTED_BY,
        DETECTOR_NAME,
        REPO_URL,
        REPO_VERSION,
        ID_LABEL,
        ID_NAME,
        LANGUAGE_NAME,
        REL_CONTAINS,
        REL_PART_OF,
        REL_SAME_AS,
        GENERIC_TYPE,
        VERSION_SPEC,
        VERSION_TYPE,
        VULN_AFFECTS,
        VULN_CLASS,
        VULN_DATABASE,
        VULN_DESCRIPTION,
        VULN_DETECTOR_NAME,
        VULN_ID,
        VULN_INFO_LINK,
        VULN_SEVERITY,
        VULN_SUMMARY,
        VULN_TITLE,
        VULN_VERSION_MATCH,
        VULN_WEAKNESS_ID,
    ];
}
