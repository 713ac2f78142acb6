//! Dependency facts on top of the mozdep knowledge graph.
//!
//! Detectors never touch the graph's indexes directly. They describe what
//! they found with a [`DependencyFacts`] or [`VulnerabilityFacts`] and hand
//! it to [`learn_dependency`] / [`learn_vulnerability`], which look the
//! matching subject up first and only create it when it is missing. Calling
//! them twice with the same facts leaves the graph as it was.
//!
//! # Usage
//!
//! ```rust,no_run
//! use mozdep::KnowledgeGraph;
//! use mozdep_knowledge::{learn_dependency, recall_dependencies, DependencyFacts};
//!
//! let mut g = KnowledgeGraph::new();
//! let facts = DependencyFacts {
//!     repository_url: Some("https://github.com/serde-rs/serde".into()),
//!     ..DependencyFacts::new("serde", "1.0.0", "cargotoml", "rust")
//! };
//! let dep = learn_dependency(&mut g, &facts)?;
//! assert_eq!(recall_dependencies(&g, "rust", "serde", "1.0.0"), vec![dep]);
//! # Ok::<(), mozdep_knowledge::KnowledgeError>(())
//! ```

mod component;
mod export;

pub use component::{chunked, detect_components, Chunked, FileClassifier};
pub use export::{dependency_rows, write_csv, DependencyRow, CSV_HEADER, UNKNOWN};

use std::path::{Component, Path, PathBuf};

use mozdep::{vocab, Entity, KnowledgeGraph, MozdepError, NamespaceError, Ns, Subject};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    #[error(transparent)]
    Graph(#[from] MozdepError),
    #[error("`{}` is not inside tree `{}`", .path.display(), .tree.display())]
    OutsideTree { path: PathBuf, tree: PathBuf },
    #[error("component classifier failed: {0}")]
    Classifier(String),
}

impl From<NamespaceError> for KnowledgeError {
    fn from(e: NamespaceError) -> Self {
        KnowledgeError::Graph(e.into())
    }
}

pub type Result<T> = std::result::Result<T, KnowledgeError>;

/// Version recorded when a detector could not tell.
pub const UNKNOWN_VERSION: &str = "_unknown";
/// Version scheme recorded when none was given.
pub const GENERIC_VERSION_TYPE: &str = "_generic";

// ---------------------------------------------------------------------------
// Fact bundles
// ---------------------------------------------------------------------------

/// What a detector knows about one vendored dependency.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyFacts {
    pub name: String,
    pub version: String,
    pub version_type: String,
    pub detector: String,
    pub language: String,
    /// Version of the upstream project the vendored copy tracks.
    pub upstream_version: Option<String>,
    /// Directory holding the vendored copy.
    pub top_path: Option<PathBuf>,
    /// Dependency that pulled this one into the tree.
    pub top_dependency: Option<Subject>,
    /// Root of the source tree; recorded paths are relative to it.
    pub tree_path: Option<PathBuf>,
    pub repository_url: Option<String>,
    pub files: Option<Vec<PathBuf>>,
    /// Learned as well, each affecting this dependency.
    pub vulnerabilities: Vec<VulnerabilityFacts>,
}

impl DependencyFacts {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        detector: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            version_type: GENERIC_VERSION_TYPE.to_string(),
            detector: detector.into(),
            language: language.into(),
            upstream_version: None,
            top_path: None,
            top_dependency: None,
            tree_path: None,
            repository_url: None,
            files: None,
            vulnerabilities: Vec::new(),
        }
    }

    /// Same as [`DependencyFacts::new`] with the version left unknown.
    pub fn unversioned(
        name: impl Into<String>,
        detector: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self::new(name, UNKNOWN_VERSION, detector, language)
    }
}

/// A vulnerability record and the dependencies it affects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityFacts {
    pub identifier: String,
    pub database: String,
    #[serde(default)]
    pub info_links: Vec<String>,
    #[serde(default)]
    pub affects: Vec<Subject>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub weakness_identifier: Option<String>,
    pub severity: Option<String>,
}

impl VulnerabilityFacts {
    pub fn new(identifier: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            database: database.into(),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

/// `path` relative to `tree`, `/`-separated. The tree root itself is `.`.
///
/// With an empty `tree` only relative paths are accepted. A path that
/// starts outside the tree or climbs out of it with `..` is an
/// [`KnowledgeError::OutsideTree`].
pub fn relative(path: &Path, tree: &Path) -> Result<String> {
    let outside = || KnowledgeError::OutsideTree {
        path: path.to_path_buf(),
        tree: tree.to_path_buf(),
    };
    let rel = path.strip_prefix(tree).map_err(|_| outside())?;
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy()),
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) | Component::ParentDir => {
                return Err(outside())
            }
        }
    }
    if parts.is_empty() {
        Ok(".".to_string())
    } else {
        Ok(parts.join("/"))
    }
}

/// Record a dependency, its library and optionally its files and
/// vulnerabilities. Returns the dependency subject.
///
/// The library is keyed on `(name, language)` and the dependency on
/// `(name, version, language)`. An existing dependency is returned as is,
/// enriched with any repository URL, upstream version, directory or top
/// dependency it did not carry yet.
pub fn learn_dependency(g: &mut KnowledgeGraph, facts: &DependencyFacts) -> Result<Subject> {
    let tree = facts.tree_path.as_deref().unwrap_or(Path::new(""));
    let dir = facts
        .top_path
        .as_deref()
        .map(|top| relative(top, tree))
        .transpose()?;

    debug!(
        language = %facts.language,
        name = %facts.name,
        version = %facts.version,
        "learning dependency"
    );

    let existing_lib = g
        .v_from([facts.name.as_str()])
        .in_(&vocab::LIB_NAME)
        .has_value(&vocab::LANGUAGE_NAME, facts.language.as_str())
        .subjects()
        .next();
    let lib = match existing_lib {
        Some(lib) => lib,
        None => g.new_subject_with([
            (vocab::LIB_NAME, facts.name.as_str()),
            (vocab::LANGUAGE_NAME, facts.language.as_str()),
        ])?,
    };

    // Enrichment shared by the library and the dependency.
    let mut optional: Vec<(Ns, Entity)> = Vec::new();
    if let Some(url) = &facts.repository_url {
        optional.push((vocab::REPO_URL, url.into()));
    }
    if let Some(upstream) = &facts.upstream_version {
        optional.push((vocab::REPO_VERSION, upstream.into()));
    }
    for (predicate, object) in &optional {
        g.add_relation(&lib, predicate, object)?;
    }

    if let Some(dir) = dir {
        optional.push((vocab::DIR_PATH, dir.into()));
    }
    if let Some(top) = &facts.top_dependency {
        optional.push((vocab::FILE_TOP_DEPENDENCY, top.into()));
    }

    let dep = match recall_dependencies(g, &facts.language, &facts.name, &facts.version)
        .into_iter()
        .next()
    {
        Some(dep) => {
            debug!(dependency = %dep, "dependency already known");
            for (predicate, object) in &optional {
                g.add_relation(&dep, predicate, object)?;
            }
            dep
        }
        None => {
            let mut seed: Vec<(Ns, Entity)> = vec![
                (vocab::DEP_NAME, facts.name.as_str().into()),
                (vocab::LIB, (&lib).into()),
                (vocab::LANGUAGE_NAME, facts.language.as_str().into()),
                (vocab::DETECTOR_NAME, facts.detector.as_str().into()),
                (vocab::VERSION_SPEC, facts.version.as_str().into()),
                (vocab::VERSION_TYPE, facts.version_type.as_str().into()),
            ];
            seed.extend(optional);
            g.new_subject_with(seed)?
        }
    };

    if let Some(files) = &facts.files {
        learn_file_set(g, files.as_slice(), tree, &dep)?;
    }

    for vulnerability in &facts.vulnerabilities {
        let mut vulnerability = vulnerability.clone();
        if !vulnerability.affects.contains(&dep) {
            vulnerability.affects.push(dep.clone());
        }
        learn_vulnerability(g, &vulnerability)?;
    }

    Ok(dep)
}

/// Mark every file in `files` as part of `belongs_to`.
///
/// File subjects are keyed on their tree-relative path: a path seen before
/// reuses its subject and gains one more `part_of` relation, so a file can
/// belong to several dependencies.
pub fn learn_file_set<P: AsRef<Path>>(
    g: &mut KnowledgeGraph,
    files: &[P],
    tree_path: &Path,
    belongs_to: &Subject,
) -> Result<Subject> {
    for file in files {
        let rel_path = relative(file.as_ref(), tree_path)?;
        let existing = g
            .v_from([rel_path.as_str()])
            .in_(&vocab::FILE_PATH)
            .subjects()
            .next();
        let file_subject = match existing {
            Some(s) => s,
            None => {
                debug!(path = %rel_path, "adding file reference");
                g.new_subject_with([(vocab::FILE_PATH, rel_path.as_str())])?
            }
        };
        g.add_relation(&file_subject, &vocab::FILE_PART_OF, belongs_to)?;
    }
    Ok(belongs_to.clone())
}

/// Record a vulnerability, keyed on its identifier, and what it affects.
pub fn learn_vulnerability(g: &mut KnowledgeGraph, facts: &VulnerabilityFacts) -> Result<Subject> {
    let existing = g
        .v_from([facts.identifier.as_str()])
        .in_(&vocab::VULN_ID)
        .subjects()
        .next();
    let vuln = match existing {
        Some(v) => {
            debug!(id = %facts.identifier, "updating existing vulnerability node");
            v
        }
        None => {
            debug!(id = %facts.identifier, "creating new vulnerability node");
            g.new_subject_with([
                (vocab::VULN_ID, facts.identifier.as_str()),
                (vocab::VULN_DATABASE, facts.database.as_str()),
            ])?
        }
    };

    let optional = [
        (vocab::VULN_TITLE, &facts.title),
        (vocab::VULN_DESCRIPTION, &facts.description),
        (vocab::VULN_WEAKNESS_ID, &facts.weakness_identifier),
        (vocab::VULN_SEVERITY, &facts.severity),
    ];
    for (predicate, value) in optional {
        if let Some(value) = value {
            g.add_relation(&vuln, &predicate, value)?;
        }
    }
    if !facts.info_links.is_empty() {
        g.add_relation(&vuln, &vocab::VULN_INFO_LINK, facts.info_links.join(";"))?;
    }
    for dep in &facts.affects {
        g.add_relation(&vuln, &vocab::VULN_AFFECTS, dep)?;
    }
    Ok(vuln)
}

/// Dependencies matching `(language, name, version)`.
pub fn recall_dependencies(
    g: &KnowledgeGraph,
    language: &str,
    name: &str,
    version: &str,
) -> Vec<Subject> {
    g.v_from([name])
        .in_(&vocab::DEP_NAME)
        .has_value(&vocab::VERSION_SPEC, version)
        .has_value(&vocab::LANGUAGE_NAME, language)
        .subjects()
        .collect()
}

/// Every dependency subject in the graph.
pub fn enumerate_dependencies(g: &KnowledgeGraph) -> impl Iterator<Item = Subject> + '_ {
    g.v().has(&vocab::DEP_NAME).subjects()
}
