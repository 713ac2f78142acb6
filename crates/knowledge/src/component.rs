//! Attach product components to file subjects.
//!
//! Classifiers are usually slow external tools, so paths are sent to them
//! in batches.

use std::collections::{BTreeMap, HashMap};

use mozdep::{vocab, Entity, KnowledgeGraph, Subject};
use tracing::{debug, info};

use crate::Result;

/// Iterator adapter produced by [`chunked`].
#[derive(Debug, Clone)]
pub struct Chunked<I> {
    inner: I,
    size: usize,
}

impl<I: Iterator> Iterator for Chunked<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk: Vec<_> = self.inner.by_ref().take(self.size).collect();
        (!chunk.is_empty()).then_some(chunk)
    }
}

/// Split `iter` into `Vec`s of `size` items; the last may be shorter.
/// A `size` of zero is treated as one.
pub fn chunked<I: IntoIterator>(iter: I, size: usize) -> Chunked<I::IntoIter> {
    Chunked {
        inner: iter.into_iter(),
        size: size.max(1),
    }
}

/// Maps repository-relative file paths to human-readable component labels.
///
/// Paths the classifier knows nothing about are simply left out of the
/// returned map.
pub trait FileClassifier {
    fn classify(&self, paths: &[String]) -> Result<HashMap<String, String>>;
}

impl<C: FileClassifier + ?Sized> FileClassifier for &C {
    fn classify(&self, paths: &[String]) -> Result<HashMap<String, String>> {
        (**self).classify(paths)
    }
}

/// Label every file subject with its `bz.product.component.name`.
///
/// Returns how many file subjects received a label.
pub fn detect_components<C>(
    g: &mut KnowledgeGraph,
    classifier: &C,
    chunk_size: usize,
) -> Result<usize>
where
    C: FileClassifier + ?Sized,
{
    let mut by_path: BTreeMap<String, Vec<Subject>> = BTreeMap::new();
    for relation in g.relations(Some(&vocab::FILE_PATH)) {
        if let Entity::Literal(path) = relation.object {
            by_path
                .entry(path.value().to_string())
                .or_default()
                .push(relation.subject);
        }
    }
    info!(files = by_path.len(), chunk_size, "classifying files into components");

    let mut labelled = 0;
    for chunk in chunked(by_path.keys().cloned(), chunk_size) {
        let components = classifier.classify(&chunk)?;
        debug!(asked = chunk.len(), answered = components.len(), "classified chunk");
        for (path, component) in components {
            let Some(files) = by_path.get(&path) else {
                debug!(%path, "classifier answered for a path it was not asked about");
                continue;
            };
            for file in files {
                g.add_relation(file, &vocab::BZ_COMPONENT_NAME, component.as_str())?;
                labelled += 1;
            }
        }
    }
    info!(labelled, "component mapping done");
    Ok(labelled)
}
