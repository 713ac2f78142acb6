use std::path::Path;

use anyhow::{Context, Result};
use mozdep::KnowledgeGraph;
use mozdep_knowledge::{learn_dependency, relative, DependencyFacts, UNKNOWN_VERSION};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{find_named, walk, Detector};
use crate::config::DetectorContext;

#[derive(Debug, Deserialize)]
struct VendorManifest {
    origin: Origin,
}

#[derive(Debug, Deserialize)]
struct Origin {
    name: String,
    /// Often a bare number or date in the wild, so kept untyped.
    release: Option<serde_yaml::Value>,
    url: Option<String>,
}

fn scalar(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Vendored C/C++ libraries described by a `moz.yaml`.
#[derive(Debug, Default)]
pub struct MozYaml {
    learned: usize,
}

impl MozYaml {
    fn process(&mut self, ctx: &DetectorContext, graph: &mut KnowledgeGraph, manifest: &Path) -> Result<()> {
        let content = std::fs::read_to_string(manifest)
            .with_context(|| format!("failed to read {}", manifest.display()))?;
        let parsed: VendorManifest = serde_yaml::from_str(&content)
            .with_context(|| format!("broken YAML in {}", manifest.display()))?;
        let Some(dir) = manifest.parent() else {
            return Ok(());
        };
        info!("adding `{}/moz.yaml`", relative(dir, &ctx.tree)?);

        let origin = parsed.origin;
        let version = origin
            .release
            .as_ref()
            .and_then(scalar)
            .unwrap_or_else(|| UNKNOWN_VERSION.to_string());
        let facts = DependencyFacts {
            top_path: Some(dir.to_path_buf()),
            tree_path: Some(ctx.tree.clone()),
            repository_url: origin.url,
            files: Some(walk(dir).collect()),
            ..DependencyFacts::new(origin.name, version, self.name(), "cpp")
        };
        learn_dependency(graph, &facts)?;
        self.learned += 1;
        Ok(())
    }
}

impl Detector for MozYaml {
    fn name(&self) -> &'static str {
        "mozyaml"
    }

    fn priority(&self) -> i32 {
        60
    }

    fn run(&mut self, ctx: &DetectorContext, graph: &mut KnowledgeGraph) -> Result<()> {
        for manifest in find_named(&ctx.tree, "moz.yaml") {
            debug!(path = %manifest.display(), "parsing as YAML");
            if let Err(e) = self.process(ctx, graph, &manifest) {
                warn!("ignoring {}: {e:#}", manifest.display());
            }
        }
        Ok(())
    }

    fn teardown(&mut self, _ctx: &DetectorContext) {
        info!(libraries = self.learned, "mozyaml done");
    }
}
