use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Command;

use mozdep_knowledge::{FileClassifier, KnowledgeError};
use tracing::debug;

/// Asks the tree's `mach file-info bugzilla-component` which Bugzilla
/// component owns each path.
#[derive(Debug, Clone)]
pub struct MachClassifier {
    mach: PathBuf,
    tree: PathBuf,
}

impl MachClassifier {
    pub fn new(mach: PathBuf, tree: PathBuf) -> Self {
        Self { mach, tree }
    }
}

impl FileClassifier for MachClassifier {
    fn classify(&self, paths: &[String]) -> mozdep_knowledge::Result<HashMap<String, String>> {
        debug!(mach = %self.mach.display(), paths = paths.len(), "running mach file-info");
        let output = Command::new(&self.mach)
            .args(["file-info", "bugzilla-component"])
            .args(paths)
            .current_dir(&self.tree)
            .output()
            .map_err(|e| {
                KnowledgeError::Classifier(format!("cannot run {}: {e}", self.mach.display()))
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(KnowledgeError::Classifier(format!(
                "{} exited with {}: {}",
                self.mach.display(),
                output.status,
                stderr.trim()
            )));
        }
        Ok(parse_file_info(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse `mach file-info` output: each unindented line names a component
/// and the indented lines after it are the paths it owns.
fn parse_file_info(stdout: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    let mut current: Option<&str> = None;
    for line in stdout.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if line.starts_with(char::is_whitespace) {
            match current {
                Some(component) => {
                    out.insert(line.trim().to_string(), component.to_string());
                }
                None => debug!(line, "path before any component"),
            }
        } else {
            current = Some(line.trim());
        }
    }
    out
}
