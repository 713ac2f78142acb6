//! Gremlin-style traversals.
//!
//! A [`Query`] is a plan, not a cursor: each step returns a new query and
//! leaves the receiver untouched, so a partial traversal can be branched.
//! Nothing touches the graph until [`Query::iter`] (or one of the
//! materializing helpers) runs. Every step deduplicates its frontier.
//!
//! ```rust
//! use mozdep::{vocab, KnowledgeGraph};
//!
//! let mut g = KnowledgeGraph::new();
//! let one = g.new_subject_with([(vocab::ID_NAME, "One")])?;
//! let two = g.new_subject_with([(vocab::ID_NAME, "Two")])?;
//! g.add_relation(&two, &vocab::REL_CONTAINS, &one)?;
//!
//! let names = g
//!     .v_from(["Two"])
//!     .in_(&vocab::ID_NAME)
//!     .out(&vocab::REL_CONTAINS)
//!     .out(&vocab::ID_NAME)
//!     .values();
//! assert_eq!(names, vec!["One".to_string()]);
//! # Ok::<(), mozdep::MozdepError>(())
//! ```

use std::collections::HashSet;
use std::fmt;

use crate::{Entity, KnowledgeGraph, Ns, Subject};

#[derive(Debug, Clone)]
enum Start {
    All,
    Entities(Vec<Entity>),
}

#[derive(Debug, Clone)]
enum Step {
    Has(Ns, Option<Entity>),
    Out(Option<Ns>),
    In(Option<Ns>),
}

type Frontier<'g> = Box<dyn Iterator<Item = Entity> + 'g>;

/// A lazily evaluated traversal over a [`KnowledgeGraph`].
#[derive(Clone)]
pub struct Query<'g> {
    graph: &'g KnowledgeGraph,
    start: Start,
    steps: Vec<Step>,
}

impl<'g> Query<'g> {
    pub(crate) fn all_entities(graph: &'g KnowledgeGraph) -> Self {
        Self {
            graph,
            start: Start::All,
            steps: Vec::new(),
        }
    }

    /// Start from the given entities, keeping only those present in `graph`.
    pub(crate) fn from_entities(graph: &'g KnowledgeGraph, start: Vec<Entity>) -> Self {
        let mut seen = HashSet::new();
        let start = start
            .into_iter()
            .filter(|e| graph.contains(e) && seen.insert(e.clone()))
            .collect();
        Self {
            graph,
            start: Start::Entities(start),
            steps: Vec::new(),
        }
    }

    fn then(&self, step: Step) -> Self {
        let mut next = self.clone();
        next.steps.push(step);
        next
    }

    /// Keep subjects with at least one outgoing `predicate` relation.
    pub fn has(&self, predicate: &Ns) -> Self {
        self.then(Step::Has(predicate.clone(), None))
    }

    /// Keep subjects related to `value` via `predicate`.
    pub fn has_value(&self, predicate: &Ns, value: impl Into<Entity>) -> Self {
        self.then(Step::Has(predicate.clone(), Some(value.into())))
    }

    /// Move to the objects of `predicate` relations.
    pub fn out(&self, predicate: &Ns) -> Self {
        self.then(Step::Out(Some(predicate.clone())))
    }

    /// Move to the objects of every outgoing relation.
    pub fn out_any(&self) -> Self {
        self.then(Step::Out(None))
    }

    /// Move to the subjects pointing here via `predicate`.
    pub fn in_(&self, predicate: &Ns) -> Self {
        self.then(Step::In(Some(predicate.clone())))
    }

    /// Move to the subjects pointing here via any predicate.
    pub fn in_any(&self) -> Self {
        self.then(Step::In(None))
    }

    /// Compile the plan into a lazy iterator over the final frontier.
    pub fn iter(&self) -> impl Iterator<Item = Entity> + 'g {
        self.run(self.source())
    }

    fn source(&self) -> Frontier<'g> {
        match &self.start {
            Start::All => Box::new(self.graph.entities()),
            Start::Entities(list) => Box::new(list.clone().into_iter()),
        }
    }

    /// Apply every step to `frontier`, lazily.
    fn run(&self, mut frontier: Frontier<'g>) -> Frontier<'g> {
        let graph = self.graph;
        for step in self.steps.iter().cloned() {
            frontier = match step {
                Step::Has(predicate, value) => Box::new(frontier.filter(move |e| match e {
                    Entity::Subject(s) => graph.has_relation(s, &predicate, value.as_ref()),
                    Entity::Literal(_) => false,
                })),
                Step::Out(predicate) => Box::new(dedup(frontier.flat_map(move |e| -> Frontier<'g> {
                    match e {
                        Entity::Subject(s) => {
                            Box::new(graph.objects_of(&s, predicate.as_ref()).cloned())
                        }
                        Entity::Literal(_) => Box::new(std::iter::empty()),
                    }
                }))),
                Step::In(predicate) => Box::new(dedup(frontier.flat_map(move |e| {
                    graph
                        .subjects_pointing_to(&e, predicate.as_ref())
                        .cloned()
                        .map(Entity::Subject)
                }))),
            };
        }
        frontier
    }

    /// Materialize the whole frontier. Treat the order as unspecified.
    pub fn all(&self) -> Vec<Entity> {
        self.iter().collect()
    }

    /// Materialize at most `n` entities, stopping evaluation early.
    pub fn get_limit(&self, n: usize) -> Vec<Entity> {
        self.limit_over(self.source(), n)
    }

    fn limit_over(&self, source: Frontier<'g>, n: usize) -> Vec<Entity> {
        self.run(source).take(n).collect()
    }

    /// The subjects in the frontier, literals skipped.
    pub fn subjects(&self) -> impl Iterator<Item = Subject> + 'g {
        self.iter().filter_map(|e| match e {
            Entity::Subject(s) => Some(s),
            Entity::Literal(_) => None,
        })
    }

    /// The literal values in the frontier, subjects skipped.
    pub fn values(&self) -> Vec<String> {
        self.iter()
            .filter_map(|e| match e {
                Entity::Literal(l) => Some(l.value().to_string()),
                Entity::Subject(_) => None,
            })
            .collect()
    }

    pub fn first(&self) -> Option<Entity> {
        self.iter().next()
    }

    pub fn count(&self) -> usize {
        self.iter().count()
    }
}

impl fmt::Debug for Query<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("start", &self.start)
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

fn dedup<'g>(inner: impl Iterator<Item = Entity> + 'g) -> impl Iterator<Item = Entity> + 'g {
    let mut seen = HashSet::new();
    inner.filter(move |e| seen.insert(e.clone()))
}
