//! mozdep: in-memory knowledge graph of third-party dependencies.
//!
//! The core primitive is a [`Relation`]: a `(subject, predicate, object)`
//! triple. Subjects are opaque nodes minted by the graph; objects are either
//! other subjects or string [`Literal`]s. Predicates come from a closed
//! vocabulary ([`Ns`]) and are validated on every write.
//!
//! The store keeps a forward index (subject → predicate → objects) and a
//! reverse index (object → predicate → subjects). Both are updated together
//! on every mutation, and empty buckets are pruned, so lookups in either
//! direction cost O(result) and a removed entity leaves nothing behind.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use mozdep::{vocab, KnowledgeGraph};
//!
//! let mut g = KnowledgeGraph::new();
//!
//! // Mint a subject and describe it
//! let lib = g.new_subject_with([(vocab::LIB_NAME, "serde"), (vocab::LANGUAGE_NAME, "rust")])?;
//!
//! // Walk back from a literal to the subjects that carry it
//! let found: Vec<_> = g.v_from(["serde"]).in_(&vocab::LIB_NAME).subjects().collect();
//! assert_eq!(found, vec![lib]);
//!
//! // Persist and reload
//! g.save("deps.json")?;
//! let again = mozdep::KnowledgeGraph::open("deps.json")?;
//! # Ok::<(), mozdep::MozdepError>(())
//! ```

mod entity;
mod namespace;
mod query;

pub use entity::{Entity, Literal, Relation, Subject, MID_PREFIX};
pub use namespace::{vocab, NamespaceError, Ns};
pub use query::Query;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, info, trace};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum MozdepError {
    #[error(transparent)]
    Namespace(#[from] NamespaceError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("entropy source failed: {0}")]
    Entropy(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<getrandom::Error> for MozdepError {
    fn from(e: getrandom::Error) -> Self {
        MozdepError::Entropy(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MozdepError>;

/// Lazy sequence of relations borrowed from a graph.
pub type Relations<'a> = Box<dyn Iterator<Item = Relation> + 'a>;

// ---------------------------------------------------------------------------
// Dump format
// ---------------------------------------------------------------------------

/// Plain-data image of a graph.
///
/// `subjects` lists every subject, including ones with no relations, so that
/// IDs survive a round trip even for isolated nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDump {
    pub subjects: Vec<Subject>,
    pub relations: Vec<Relation>,
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

const MID_LEN: usize = 10;
const MID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Triple store with forward and reverse indexes.
#[derive(Debug, Default, Clone)]
pub struct KnowledgeGraph {
    forward: BTreeMap<Subject, HashMap<Ns, BTreeSet<Entity>>>,
    reverse: BTreeMap<Entity, HashMap<Ns, BTreeSet<Subject>>>,
    permissive: bool,
}

impl KnowledgeGraph {
    /// An empty graph that only accepts vocabulary predicates.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty graph that accepts any predicate, known or not.
    pub fn permissive() -> Self {
        Self {
            permissive: true,
            ..Self::default()
        }
    }

    pub fn is_permissive(&self) -> bool {
        self.permissive
    }

    fn validate(&self, predicate: &Ns) -> Result<()> {
        if self.permissive || predicate.is_known() {
            Ok(())
        } else {
            Err(NamespaceError(predicate.to_string()).into())
        }
    }

    fn fresh_mid(&self) -> Result<Subject> {
        // 248 is the largest multiple of the alphabet size that fits a byte;
        // anything above it would bias the draw.
        let limit = (u8::MAX as usize + 1) / MID_ALPHABET.len() * MID_ALPHABET.len();
        loop {
            let mut mid = String::with_capacity(MID_PREFIX.len() + MID_LEN);
            mid.push_str(MID_PREFIX);
            let mut buf = [0u8; 32];
            while mid.len() < MID_PREFIX.len() + MID_LEN {
                getrandom::fill(&mut buf)?;
                for b in buf.iter().map(|&b| b as usize).filter(|&b| b < limit) {
                    if mid.len() == MID_PREFIX.len() + MID_LEN {
                        break;
                    }
                    mid.push(MID_ALPHABET[b % MID_ALPHABET.len()] as char);
                }
            }
            if !self.forward.contains_key(mid.as_str()) {
                return Ok(Subject::from_mid(mid));
            }
            debug!(%mid, "subject id collision, drawing again");
        }
    }

    /// Mint a subject with a fresh, collision-checked ID.
    ///
    /// The subject is registered immediately: it is [`contains`]-visible
    /// and answers relation lookups with an empty sequence.
    ///
    /// [`contains`]: KnowledgeGraph::contains
    pub fn new_subject(&mut self) -> Result<Subject> {
        let subject = self.fresh_mid()?;
        self.forward.insert(subject.clone(), HashMap::new());
        trace!(subject = %subject, "new subject");
        Ok(subject)
    }

    /// Mint a subject seeded with `relations`.
    ///
    /// Every predicate is validated before anything is written, so a
    /// rejected call leaves the graph unchanged.
    pub fn new_subject_with<I, E>(&mut self, relations: I) -> Result<Subject>
    where
        I: IntoIterator<Item = (Ns, E)>,
        E: Into<Entity>,
    {
        let relations: Vec<(Ns, Entity)> = relations
            .into_iter()
            .map(|(p, o)| (p, o.into()))
            .collect();
        for (predicate, _) in &relations {
            self.validate(predicate)?;
        }
        let subject = self.new_subject()?;
        for (predicate, object) in relations {
            self.insert(&subject, predicate, object);
        }
        Ok(subject)
    }

    pub fn literal(&self, value: impl Into<std::sync::Arc<str>>) -> Literal {
        Literal::new(value)
    }

    /// Record `subject --predicate--> object`. Adding an existing triple is a
    /// no-op. Strings convert to literals.
    pub fn add_relation(
        &mut self,
        subject: &Subject,
        predicate: &Ns,
        object: impl Into<Entity>,
    ) -> Result<Subject> {
        self.validate(predicate)?;
        self.insert(subject, predicate.clone(), object.into());
        Ok(subject.clone())
    }

    fn insert(&mut self, subject: &Subject, predicate: Ns, object: Entity) {
        if let Entity::Subject(target) = &object {
            self.forward.entry(target.clone()).or_default();
        }
        let added = self
            .forward
            .entry(subject.clone())
            .or_default()
            .entry(predicate.clone())
            .or_default()
            .insert(object.clone());
        if added {
            trace!(%subject, %predicate, %object, "add relation");
            self.reverse
                .entry(object)
                .or_default()
                .entry(predicate)
                .or_default()
                .insert(subject.clone());
        }
    }

    /// Remove one triple from both indexes.
    ///
    /// Returns [`MozdepError::NotFound`] if the triple is absent. The subject
    /// itself stays registered.
    pub fn remove_relation(
        &mut self,
        subject: &Subject,
        predicate: &Ns,
        object: impl Into<Entity>,
    ) -> Result<()> {
        let object = object.into();
        let removed = self
            .forward
            .get_mut(subject)
            .and_then(|buckets| {
                let objects = buckets.get_mut(predicate)?;
                let removed = objects.remove(&object);
                if objects.is_empty() {
                    buckets.remove(predicate);
                }
                Some(removed)
            })
            .unwrap_or(false);
        if !removed {
            return Err(MozdepError::NotFound(format!(
                "relation <{subject}> {predicate} {object}"
            )));
        }
        trace!(%subject, %predicate, %object, "remove relation");
        unlink_reverse(&mut self.reverse, &object, predicate, subject);
        Ok(())
    }

    /// Remove an entity together with every relation that mentions it.
    pub fn remove_entity(&mut self, entity: &Entity) -> Result<()> {
        if !self.contains(entity) {
            return Err(MozdepError::NotFound(format!("entity {entity}")));
        }
        if let Entity::Subject(subject) = entity {
            if let Some(buckets) = self.forward.remove(subject) {
                for (predicate, objects) in buckets {
                    for object in objects {
                        unlink_reverse(&mut self.reverse, &object, &predicate, subject);
                    }
                }
            }
        }
        if let Some(incoming) = self.reverse.remove(entity) {
            for (predicate, subjects) in incoming {
                for source in subjects {
                    // Already gone for a self-loop.
                    let Some(buckets) = self.forward.get_mut(&source) else {
                        continue;
                    };
                    if let Some(objects) = buckets.get_mut(&predicate) {
                        objects.remove(entity);
                        if objects.is_empty() {
                            buckets.remove(&predicate);
                        }
                    }
                }
            }
        }
        debug!(%entity, "removed entity");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    /// Whether `entity` is a node of this graph. Literals are nodes only while
    /// some relation points at them.
    pub fn contains(&self, entity: &Entity) -> bool {
        match entity {
            Entity::Subject(s) => self.forward.contains_key(s),
            Entity::Literal(_) => self.reverse.contains_key(entity),
        }
    }

    pub fn subject_count(&self) -> usize {
        self.forward.len()
    }

    pub fn relation_count(&self) -> usize {
        self.forward
            .values()
            .flat_map(HashMap::values)
            .map(BTreeSet::len)
            .sum()
    }

    /// Whether `subject` has a `predicate` relation, to `object` if given.
    pub fn has_relation(&self, subject: &Subject, predicate: &Ns, object: Option<&Entity>) -> bool {
        let Some(objects) = self.forward.get(subject).and_then(|b| b.get(predicate)) else {
            return false;
        };
        match object {
            Some(o) => objects.contains(o),
            None => !objects.is_empty(),
        }
    }

    /// Every subject, then every literal.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.subjects().map(Entity::Subject).chain(
            self.reverse
                .keys()
                .filter(|e| !e.is_subject())
                .cloned(),
        )
    }

    pub fn subjects(&self) -> impl Iterator<Item = Subject> + '_ {
        self.forward.keys().cloned()
    }

    /// Every relation in the graph, optionally restricted to one predicate.
    pub fn relations(&self, predicate: Option<&Ns>) -> Relations<'_> {
        let predicate = predicate.cloned();
        Box::new(self.forward.iter().flat_map(move |(subject, buckets)| {
            let selected: Box<dyn Iterator<Item = (&Ns, &BTreeSet<Entity>)> + '_> = match &predicate {
                Some(p) => Box::new(buckets.get_key_value(p).into_iter()),
                None => Box::new(buckets.iter()),
            };
            fan_out(subject.clone(), selected)
        }))
    }

    /// Relations whose subject is `entity`.
    ///
    /// Fails with [`MozdepError::NotFound`] if `entity` is not in the graph.
    /// A literal in the graph has no outgoing relations.
    pub fn relations_from(&self, entity: &Entity, predicate: Option<&Ns>) -> Result<Relations<'_>> {
        match entity {
            Entity::Subject(subject) => {
                let buckets = self
                    .forward
                    .get(subject)
                    .ok_or_else(|| MozdepError::NotFound(format!("subject {subject}")))?;
                Ok(match predicate {
                    Some(p) => fan_out(subject.clone(), buckets.get_key_value(p).into_iter()),
                    None => fan_out(subject.clone(), buckets.iter()),
                })
            }
            Entity::Literal(literal) if self.contains(entity) => {
                trace!(%literal, "literals have no outgoing relations");
                Ok(Box::new(std::iter::empty()))
            }
            Entity::Literal(literal) => Err(MozdepError::NotFound(format!("literal {literal:?}"))),
        }
    }

    /// Relations whose object is `entity`.
    ///
    /// Fails with [`MozdepError::NotFound`] if `entity` is not in the graph.
    pub fn relations_to(&self, entity: &Entity, predicate: Option<&Ns>) -> Result<Relations<'_>> {
        if !self.contains(entity) {
            return Err(MozdepError::NotFound(format!("entity {entity}")));
        }
        let Some(buckets) = self.reverse.get(entity) else {
            return Ok(Box::new(std::iter::empty()));
        };
        Ok(match predicate {
            Some(p) => fan_in(entity.clone(), buckets.get_key_value(p).into_iter()),
            None => fan_in(entity.clone(), buckets.iter()),
        })
    }

    pub(crate) fn objects_of<'a>(
        &'a self,
        subject: &Subject,
        predicate: Option<&Ns>,
    ) -> Box<dyn Iterator<Item = &'a Entity> + 'a> {
        let Some(buckets) = self.forward.get(subject) else {
            return Box::new(std::iter::empty());
        };
        match predicate {
            Some(p) => Box::new(buckets.get(p).into_iter().flatten()),
            None => Box::new(buckets.values().flatten()),
        }
    }

    pub(crate) fn subjects_pointing_to<'a>(
        &'a self,
        object: &Entity,
        predicate: Option<&Ns>,
    ) -> Box<dyn Iterator<Item = &'a Subject> + 'a> {
        let Some(buckets) = self.reverse.get(object) else {
            return Box::new(std::iter::empty());
        };
        match predicate {
            Some(p) => Box::new(buckets.get(p).into_iter().flatten()),
            None => Box::new(buckets.values().flatten()),
        }
    }

    // -----------------------------------------------------------------------
    // Traversal entry points
    // -----------------------------------------------------------------------

    /// A query starting from every entity.
    pub fn v(&self) -> Query<'_> {
        Query::all_entities(self)
    }

    /// A query starting from `start`. Entities not in the graph are dropped,
    /// and plain strings are taken as literals.
    pub fn v_from<I>(&self, start: I) -> Query<'_>
    where
        I: IntoIterator,
        I::Item: Into<Entity>,
    {
        Query::from_entities(self, start.into_iter().map(Into::into).collect())
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    pub fn to_dump(&self) -> GraphDump {
        GraphDump {
            subjects: self.subjects().collect(),
            relations: self.relations(None).collect(),
        }
    }

    /// Rebuild a strict graph from a dump, validating every predicate.
    pub fn from_dump(dump: GraphDump) -> Result<Self> {
        let mut graph = Self::new();
        graph.load_dump(dump)?;
        Ok(graph)
    }

    /// Merge a dump into this graph. Subject IDs are kept as they are.
    pub fn load_dump(&mut self, dump: GraphDump) -> Result<()> {
        for relation in &dump.relations {
            self.validate(&relation.predicate)?;
        }
        for subject in dump.subjects {
            self.forward.entry(subject).or_default();
        }
        let count = dump.relations.len();
        for Relation {
            subject,
            predicate,
            object,
        } in dump.relations
        {
            self.insert(&subject, predicate, object);
        }
        debug!(relations = count, "loaded dump");
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_dump())?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_dump(serde_json::from_str(json)?)
    }

    /// Write the JSON dump to `path`, replacing any existing file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?)?;
        info!(
            path = %path.display(),
            subjects = self.subject_count(),
            relations = self.relation_count(),
            "saved graph"
        );
        Ok(())
    }

    /// Read a graph previously written with [`KnowledgeGraph::save`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let graph = Self::from_json(&std::fs::read_to_string(path)?)?;
        info!(
            path = %path.display(),
            subjects = graph.subject_count(),
            relations = graph.relation_count(),
            "opened graph"
        );
        Ok(graph)
    }
}

fn unlink_reverse(
    reverse: &mut BTreeMap<Entity, HashMap<Ns, BTreeSet<Subject>>>,
    object: &Entity,
    predicate: &Ns,
    subject: &Subject,
) {
    let Some(buckets) = reverse.get_mut(object) else {
        return;
    };
    if let Some(subjects) = buckets.get_mut(predicate) {
        subjects.remove(subject);
        if subjects.is_empty() {
            buckets.remove(predicate);
        }
    }
    if buckets.is_empty() {
        reverse.remove(object);
    }
}

fn fan_out<'a>(
    subject: Subject,
    buckets: impl Iterator<Item = (&'a Ns, &'a BTreeSet<Entity>)> + 'a,
) -> Relations<'a> {
    Box::new(buckets.flat_map(move |(predicate, objects)| {
        let subject = subject.clone();
        objects
            .iter()
            .map(move |object| Relation::new(subject.clone(), predicate.clone(), object.clone()))
    }))
}

fn fan_in<'a>(
    object: Entity,
    buckets: impl Iterator<Item = (&'a Ns, &'a BTreeSet<Subject>)> + 'a,
) -> Relations<'a> {
    Box::new(buckets.flat_map(move |(predicate, subjects)| {
        let object = object.clone();
        subjects
            .iter()
            .map(move |subject| Relation::new(subject.clone(), predicate.clone(), object.clone()))
    }))
}

// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::NamedTempFile;

    fn rels(r: Result<Relations<'_>>) -> HashSet<(Subject, Ns, Entity)> {
        r.unwrap()
            .map(|r| (r.subject, r.predicate, r.object))
            .collect()
    }

    /// s1 contains s2 and s3, s2 contains s3, each has a name.
    fn three() -> (KnowledgeGraph, Subject, Subject, Subject) {
        let mut g = KnowledgeGraph::new();
        let s1 = g.new_subject_with([(vocab::ID_NAME, "s1")]).unwrap();
        let s2 = g.new_subject_with([(vocab::ID_NAME, "s2")]).unwrap();
        let s3 = g.new_subject_with([(vocab::ID_NAME, "s3")]).unwrap();
        g.add_relation(&s1, &vocab::REL_CONTAINS, &s2).unwrap();
        g.add_relation(&s1, &vocab::REL_CONTAINS, &s3).unwrap();
        g.add_relation(&s2, &vocab::REL_CONTAINS, &s3).unwrap();
        (g, s1, s2, s3)
    }

    #[test]
    fn mints_prefixed_unique_ids() {
        let mut g = KnowledgeGraph::new();
        let mut seen = HashSet::new();
        for _ in 0..500 {
            let s = g.new_subject().unwrap();
            assert!(s.mid().starts_with(MID_PREFIX));
            assert_eq!(s.mid().len(), MID_PREFIX.len() + MID_LEN);
            assert!(s.mid()[MID_PREFIX.len()..].bytes().all(|b| b.is_ascii_alphanumeric()));
            assert!(seen.insert(s));
        }
        assert_eq!(g.subject_count(), 500);
    }

    #[test]
    fn fresh_subject_is_known_but_empty() {
        let mut g = KnowledgeGraph::new();
        let s = Entity::from(g.new_subject().unwrap());
        assert!(g.contains(&s));
        assert_eq!(g.relations_from(&s, None).unwrap().count(), 0);
        assert_eq!(g.relations_to(&s, None).unwrap().count(), 0);
    }

    #[test]
    fn relation_indexes_agree() {
        let (mut g, s1, s2, s3) = three();
        let before = g.relation_count();
        g.add_relation(&s1, &vocab::REL_CONTAINS, &s2).unwrap();
        assert_eq!(g.relation_count(), before, "duplicate add must be a no-op");
        assert_eq!(before, 6);

        let contains = vocab::REL_CONTAINS;
        let from_s1 = rels(g.relations_from(&Entity::from(&s1), Some(&contains)));
        assert_eq!(
            from_s1,
            HashSet::from([
                (s1.clone(), contains.clone(), Entity::from(&s2)),
                (s1.clone(), contains.clone(), Entity::from(&s3)),
            ])
        );
        let to_s3 = rels(g.relations_to(&Entity::from(&s3), None));
        assert_eq!(
            to_s3,
            HashSet::from([
                (s1.clone(), contains.clone(), Entity::from(&s3)),
                (s2.clone(), contains.clone(), Entity::from(&s3)),
            ])
        );
        let to_s1 = rels(g.relations_to(&Entity::from(&s1), None));
        assert!(to_s1.is_empty());

        let all_from_s2 = rels(g.relations_from(&Entity::from(&s2), None));
        assert_eq!(
            all_from_s2,
            HashSet::from([
                (s2.clone(), vocab::ID_NAME, Entity::from("s2")),
                (s2.clone(), contains.clone(), Entity::from(&s3)),
            ])
        );

        let name = rels(g.relations_to(&Entity::from("s3"), Some(&vocab::ID_NAME)));
        assert_eq!(name, HashSet::from([(s3, vocab::ID_NAME, Entity::from("s3"))]));
    }

    #[test]
    fn literals_have_no_outgoing_relations() {
        let (g, _, _, _) = three();
        assert_eq!(g.relations_from(&Entity::from("s1"), None).unwrap().count(), 0);
    }

    #[test]
    fn unknown_entities_are_not_found() {
        let (g, _, _, _) = three();
        let ghost = Entity::from(Subject::from_mid("mid:neveradded"));
        assert!(matches!(g.relations_from(&ghost, None), Err(MozdepError::NotFound(_))));
        assert!(matches!(g.relations_to(&ghost, None), Err(MozdepError::NotFound(_))));
        let missing = Entity::from("nobody says this");
        assert!(matches!(g.relations_from(&missing, None), Err(MozdepError::NotFound(_))));
        assert!(matches!(g.relations_to(&missing, None), Err(MozdepError::NotFound(_))));
    }

    #[test]
    fn unknown_predicates_are_rejected() {
        let mut g = KnowledgeGraph::new();
        let s = g.new_subject().unwrap();
        let bogus = Ns::parse_unchecked("ns:fx.mc.file.foo");
        let err = g.add_relation(&s, &bogus, "x").unwrap_err();
        assert!(matches!(err, MozdepError::Namespace(_)));
        assert_eq!(err.to_string(), "invalid namespace identifier `ns:fx.mc.file.foo`");
        assert_eq!(g.relation_count(), 0);

        let before = g.subject_count();
        let seeded = g.new_subject_with([(vocab::ID_NAME, "ok"), (bogus.clone(), "bad")]);
        assert!(seeded.is_err());
        assert_eq!(g.subject_count(), before, "rejected seed must not mint a subject");
        assert!(!g.contains(&Entity::from("ok")));
    }

    #[test]
    fn permissive_graph_accepts_anything() {
        let mut g = KnowledgeGraph::permissive();
        let s = g.new_subject().unwrap();
        let custom = Ns::parse_unchecked("test:anything.goes");
        g.add_relation(&s, &custom, "yes").unwrap();
        assert!(g.has_relation(&s, &custom, Some(&Entity::from("yes"))));
    }

    #[test]
    fn remove_relation_prunes_literals() {
        let (mut g, s1, _, _) = three();
        g.remove_relation(&s1, &vocab::ID_NAME, "s1").unwrap();
        assert!(!g.contains(&Entity::from("s1")), "orphaned literal must disappear");
        assert!(g.contains(&Entity::from(&s1)), "subject stays registered");
        assert!(!g.has_relation(&s1, &vocab::ID_NAME, None));

        let again = g.remove_relation(&s1, &vocab::ID_NAME, "s1");
        assert!(matches!(again, Err(MozdepError::NotFound(_))));
    }

    #[test]
    fn remove_entity_is_complete() {
        let (mut g, s1, s2, s3) = three();
        g.add_relation(&s2, &vocab::REL_SAME_AS, &s2).unwrap();
        g.remove_entity(&Entity::from(&s2)).unwrap();

        let gone = Entity::from(&s2);
        assert!(!g.contains(&gone));
        assert!(g.entities().all(|e| e != gone));
        assert!(g
            .relations(None)
            .all(|r| r.subject != s2 && r.object != gone));
        assert!(!g.contains(&Entity::from("s2")));
        assert_eq!(g.relation_count(), 3);
        assert_eq!(
            rels(g.relations_to(&Entity::from(&s3), None)),
            HashSet::from([(s1, vocab::REL_CONTAINS, Entity::from(&s3))])
        );
        assert!(g.reverse.values().all(|b| !b.is_empty() && b.values().all(|s| !s.is_empty())));
        assert!(g.forward.values().all(|b| b.values().all(|o| !o.is_empty())));

        let twice = g.remove_entity(&gone);
        assert!(matches!(twice, Err(MozdepError::NotFound(_))));
    }

    #[test]
    fn remove_literal_drops_incoming() {
        let mut g = KnowledgeGraph::new();
        let a = g.new_subject_with([(vocab::ID_LABEL, "shared")]).unwrap();
        let b = g.new_subject_with([(vocab::ID_LABEL, "shared")]).unwrap();
        g.remove_entity(&Entity::from("shared")).unwrap();
        assert!(!g.has_relation(&a, &vocab::ID_LABEL, None));
        assert!(!g.has_relation(&b, &vocab::ID_LABEL, None));
        assert_eq!(g.relation_count(), 0);
        assert_eq!(g.subject_count(), 2);
    }

    #[test]
    fn reattach_by_mid() {
        let mut g = KnowledgeGraph::new();
        let s = g.new_subject().unwrap();
        let same = Subject::from_mid(s.mid().to_string());
        g.add_relation(&same, &vocab::ID_NAME, "later").unwrap();
        assert!(g.has_relation(&s, &vocab::ID_NAME, Some(&Entity::from("later"))));
        assert_eq!(g.subject_count(), 1);
    }

    #[test]
    fn relations_filter_by_predicate() {
        let (g, _, _, _) = three();
        assert_eq!(g.relations(None).count(), 6);
        assert_eq!(g.relations(Some(&vocab::REL_CONTAINS)).count(), 3);
        assert_eq!(g.relations(Some(&vocab::ID_LABEL)).count(), 0);
        assert_eq!(g.entities().filter(|e| !e.is_subject()).count(), 3);
    }

    #[test]
    fn json_round_trip_preserves_queries() {
        let (mut g, s1, _, _) = three();
        let isolated = g.new_subject().unwrap();
        let file = NamedTempFile::new().unwrap();
        g.save(file.path()).unwrap();
        let back = KnowledgeGraph::open(file.path()).unwrap();

        assert!(back.contains(&Entity::from(&isolated)));
        assert_eq!(back.subject_count(), g.subject_count());
        assert_eq!(back.relation_count(), g.relation_count());
        let q = |graph: &KnowledgeGraph| -> HashSet<Entity> {
            graph
                .v_from([&s1])
                .has(&vocab::REL_CONTAINS)
                .out(&vocab::REL_CONTAINS)
                .out(&vocab::ID_NAME)
                .iter()
                .collect()
        };
        assert_eq!(q(&g), q(&back));
        assert_eq!(q(&back).len(), 2);
    }

    #[test]
    fn dump_layout() {
        let mut g = KnowledgeGraph::new();
        let s = g.new_subject_with([(vocab::ID_NAME, "x")]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&g.to_json().unwrap()).unwrap();
        assert_eq!(value["subjects"][0], s.mid());
        assert_eq!(value["relations"][0]["predicate"], "ns:id.name");
        assert_eq!(value["relations"][0]["object"]["literal"], "x");
    }

    #[test]
    fn strict_load_rejects_unknown_predicates() {
        let json = r#"{"subjects":["mid:aaaaaaaaaa"],"relations":[
            {"subject":"mid:aaaaaaaaaa","predicate":"ns:nope","object":{"literal":"x"}}]}"#;
        assert!(matches!(KnowledgeGraph::from_json(json), Err(MozdepError::Namespace(_))));

        let mut loose = KnowledgeGraph::permissive();
        let dump: GraphDump = serde_json::from_str(json).unwrap();
        loose.load_dump(dump).unwrap();
        assert_eq!(loose.relation_count(), 1);
    }
}
