//! Dependency detectors and the registry that runs them.

mod cargotoml;
mod mozyaml;

pub use cargotoml::CargoToml;
pub use mozyaml::MozYaml;

use std::cmp::Reverse;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use mozdep::KnowledgeGraph;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::config::DetectorContext;

/// Directories never descended into.
const PRUNED: &[&str] = &[".hg", ".git", "target"];

/// Scans a source tree and records what it finds in the graph.
///
/// A detector should log and skip inputs it cannot read rather than fail
/// the whole run; an error from [`Detector::run`] aborts every detector
/// after it.
pub trait Detector {
    fn name(&self) -> &'static str;

    /// Higher runs first.
    fn priority(&self) -> i32;

    fn setup(&mut self, ctx: &DetectorContext) -> Result<()> {
        anyhow::ensure!(
            ctx.tree.is_dir(),
            "`{}` is not a directory",
            ctx.tree.display()
        );
        Ok(())
    }

    fn run(&mut self, ctx: &DetectorContext, graph: &mut KnowledgeGraph) -> Result<()>;

    fn teardown(&mut self, _ctx: &DetectorContext) {}
}

/// Every available detector, highest priority first.
pub fn registry() -> Vec<Box<dyn Detector>> {
    let mut detectors: Vec<Box<dyn Detector>> =
        vec![Box::new(CargoToml::default()), Box::new(MozYaml::default())];
    detectors.sort_by_key(|d| Reverse(d.priority()));
    detectors
}

/// Run the detectors named in `choice` (all of them if empty) in priority
/// order. Returns how many ran.
pub fn run_all(ctx: &DetectorContext, graph: &mut KnowledgeGraph, choice: &[String]) -> Result<usize> {
    let detectors = registry();
    for name in choice {
        if !detectors.iter().any(|d| d.name() == name) {
            error!("ignoring unknown detector `{name}`");
        }
    }

    let mut ran = 0;
    for mut detector in detectors {
        let name = detector.name();
        if !choice.is_empty() && !choice.iter().any(|c| c == name) {
            warn!("not running detector `{name}`");
            continue;
        }
        debug!("running `{name}` setup");
        detector
            .setup(ctx)
            .with_context(|| format!("detector `{name}` setup failed"))?;
        debug!("running `{name}`");
        detector
            .run(ctx, graph)
            .with_context(|| format!("detector `{name}` failed"))?;
        detector.teardown(ctx);
        info!(detector = name, subjects = graph.subject_count(), "detector finished");
        ran += 1;
    }
    Ok(ran)
}

/// Every file named `file_name` below `start`, skipping VCS and build dirs.
pub(crate) fn find_named(start: &Path, file_name: &str) -> Vec<PathBuf> {
    walk(start)
        .filter(|p| p.file_name().is_some_and(|n| n == file_name))
        .collect()
}

/// Every regular file below `start`, skipping VCS and build dirs.
pub(crate) fn walk(start: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(start)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || !PRUNED.iter().any(|p| e.file_name() == *p)
        })
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("skipping unreadable entry: {e}");
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
}
