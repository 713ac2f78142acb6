use std::path::Path;

use anyhow::{Context, Result};
use mozdep::KnowledgeGraph;
use mozdep_knowledge::{learn_dependency, relative, DependencyFacts, UNKNOWN_VERSION};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{find_named, walk, Detector};
use crate::config::DetectorContext;

/// In-tree crates recorded even though they are neither vendored nor
/// declare an upstream repository.
const MANUAL_LIST: &[&str] = &["gfx/wr/wrench"];

#[derive(Debug, Deserialize)]
struct Manifest {
    package: Option<Package>,
}

#[derive(Debug, Deserialize)]
struct Package {
    name: String,
    /// A string, or a `{ workspace = true }` table.
    version: Option<toml::Value>,
    repository: Option<String>,
}

/// Rust crates, found through their `Cargo.toml`.
#[derive(Debug, Default)]
pub struct CargoToml {
    learned: usize,
}

impl CargoToml {
    fn process(&mut self, ctx: &DetectorContext, graph: &mut KnowledgeGraph, manifest: &Path) -> Result<()> {
        let content = std::fs::read_to_string(manifest)
            .with_context(|| format!("failed to read {}", manifest.display()))?;
        let parsed: Manifest = toml::from_str(&content)
            .with_context(|| format!("invalid TOML in {}", manifest.display()))?;
        let Some(package) = parsed.package else {
            debug!(path = %manifest.display(), "no [package] section");
            return Ok(());
        };

        let Some(dir) = manifest.parent() else {
            return Ok(());
        };
        let rel_dir = relative(dir, &ctx.tree)?;
        if !rel_dir.starts_with("third_party/")
            && package.repository.is_none()
            && !MANUAL_LIST.contains(&rel_dir.as_str())
        {
            debug!("skipping `{rel_dir}/Cargo.toml`");
            return Ok(());
        }
        info!("adding `{rel_dir}/Cargo.toml`");

        let version = package
            .version
            .as_ref()
            .and_then(toml::Value::as_str)
            .unwrap_or(UNKNOWN_VERSION);
        let facts = DependencyFacts {
            top_path: Some(dir.to_path_buf()),
            tree_path: Some(ctx.tree.clone()),
            repository_url: package.repository.as_deref().map(normalize_repository),
            files: Some(walk(dir).collect()),
            ..DependencyFacts::new(&package.name, version, self.name(), "rust")
        };
        learn_dependency(graph, &facts)?;
        self.learned += 1;
        Ok(())
    }
}

/// Bare `owner/repo` references point at GitHub.
fn normalize_repository(repo: &str) -> String {
    if repo.starts_with("http") {
        repo.to_string()
    } else {
        format!("https://github.com/{}", repo.trim_start_matches('/'))
    }
}

impl Detector for CargoToml {
    fn name(&self) -> &'static str {
        "cargotoml"
    }

    fn priority(&self) -> i32 {
        80
    }

    fn run(&mut self, ctx: &DetectorContext, graph: &mut KnowledgeGraph) -> Result<()> {
        for manifest in find_named(&ctx.tree, "Cargo.toml") {
            debug!(path = %manifest.display(), "parsing");
            if let Err(e) = self.process(ctx, graph, &manifest) {
                warn!("ignoring {}: {e:#}", manifest.display());
            }
        }
        Ok(())
    }

    fn teardown(&mut self, _ctx: &DetectorContext) {
        info!(crates = self.learned, "cargotoml done");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use mozdep::vocab;
    use std::fs;
    use tempfile::TempDir;

    fn put(root: &Path, rel: &str, content: &str) {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, content).unwrap();
    }

    fn scan(root: &Path) -> KnowledgeGraph {
        let ctx = DetectorContext::new(root.to_path_buf(), Config::default());
        let mut g = KnowledgeGraph::new();
        let mut d = CargoToml::default();
        d.setup(&ctx).unwrap();
        d.run(&ctx, &mut g).unwrap();
        g
    }

    #[test]
    fn repository_normalization() {
        assert_eq!(normalize_repository("servo/rust-smallvec"), "https://github.com/servo/rust-smallvec");
        assert_eq!(normalize_repository("/a/b"), "https://github.com/a/b");
        assert_eq!(normalize_repository("https://gitlab.com/x/y"), "https://gitlab.com/x/y");
    }

    #[test]
    fn manifests_outside_the_tree_are_refused() {
        let tree = TempDir::new().unwrap();
        let elsewhere = TempDir::new().unwrap();
        put(
            elsewhere.path(),
            "third_party/rust/stray/Cargo.toml",
            "[package]\nname = \"stray\"\nversion = \"1.0.0\"\n",
        );
        let ctx = DetectorContext::new(tree.path().to_path_buf(), Config::default());
        let mut g = KnowledgeGraph::new();
        let mut d = CargoToml::default();
        let manifest = elsewhere.path().join("third_party/rust/stray/Cargo.toml");
        let err = d.process(&ctx, &mut g, &manifest).unwrap_err();
        assert!(err.to_string().contains("is not inside tree"), "{err:#}");
        assert_eq!(g.relation_count(), 0);
        assert_eq!(d.learned, 0);
    }

    #[test]
    fn keeps_vendored_and_declared_crates() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        put(root, "Cargo.toml", "[workspace]\nmembers = []\n");
        put(
            root,
            "third_party/rust/smallvec/Cargo.toml",
            "[package]\nname = \"smallvec\"\nversion = \"1.11.0\"\nrepository = \"servo/rust-smallvec\"\n",
        );
        put(root, "third_party/rust/smallvec/src/lib.rs", "");
        put(
            root,
            "toolkit/library/rust/Cargo.toml",
            "[package]\nname = \"gkrust\"\nversion = \"0.1.0\"\n",
        );
        put(
            root,
            "gfx/wr/wrench/Cargo.toml",
            "[package]\nname = \"wrench\"\nversion.workspace = true\n",
        );
        put(root, "third_party/rust/broken/Cargo.toml", "[package\nname = ");

        let g = scan(root);
        let mut names = g.v().has(&vocab::DEP_NAME).out(&vocab::DEP_NAME).values();
        names.sort();
        assert_eq!(names, vec!["smallvec".to_string(), "wrench".to_string()]);

        let url = g
            .v_from(["smallvec"])
            .in_(&vocab::DEP_NAME)
            .out(&vocab::REPO_URL)
            .values();
        assert_eq!(url, vec!["https://github.com/servo/rust-smallvec".to_string()]);

        let wrench_version = g
            .v_from(["wrench"])
            .in_(&vocab::DEP_NAME)
            .out(&vocab::VERSION_SPEC)
            .values();
        assert_eq!(wrench_version, vec![UNKNOWN_VERSION.to_string()]);

        let mut files = g
            .v_from(["smallvec"])
            .in_(&vocab::DEP_NAME)
            .in_(&vocab::FILE_PART_OF)
            .out(&vocab::FILE_PATH)
            .values();
        files.sort();
        assert_eq!(
            files,
            vec![
                "third_party/rust/smallvec/Cargo.toml".to_string(),
                "third_party/rust/smallvec/src/lib.rs".to_string()
            ]
        );
    }
}
