//! Graph nodes: opaque [`Subject`]s and value-typed [`Literal`]s.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{KnowledgeGraph, Ns, Relations, Result};

/// Every minted subject ID starts with this tag.
pub const MID_PREFIX: &str = "mid:";

/// A structural node, identified only by its opaque ID.
///
/// Two `Subject`s built from the same ID are the same node, which is how
/// callers re-attach to a subject they no longer hold (see
/// [`Subject::from_mid`]).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subject(Arc<str>);

impl Subject {
    pub fn from_mid(mid: impl Into<Arc<str>>) -> Self {
        Self(mid.into())
    }

    pub fn mid(&self) -> &str {
        &self.0
    }

    /// Shorthand for [`KnowledgeGraph::add_relation`] with `self` as subject.
    pub fn add_relation(
        &self,
        graph: &mut KnowledgeGraph,
        predicate: &Ns,
        object: impl Into<Entity>,
    ) -> Result<Subject> {
        graph.add_relation(self, predicate, object)
    }

    /// Relations with `self` as subject. See [`KnowledgeGraph::relations_from`].
    pub fn relations_from<'g>(
        &self,
        graph: &'g KnowledgeGraph,
        predicate: Option<&Ns>,
    ) -> Result<Relations<'g>> {
        graph.relations_from(&Entity::Subject(self.clone()), predicate)
    }

    /// Relations pointing at `self`.
    pub fn relations_to<'g>(
        &self,
        graph: &'g KnowledgeGraph,
        predicate: Option<&Ns>,
    ) -> Result<Relations<'g>> {
        graph.relations_to(&Entity::Subject(self.clone()), predicate)
    }
}

impl Borrow<str> for Subject {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A plain string value. Equal strings are the same node, and a `Literal`
/// hashes exactly like the `str` it wraps.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Literal(Arc<str>);

impl Literal {
    pub fn new(value: impl Into<Arc<str>>) -> Self {
        Self(value.into())
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Literal {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Anything that can sit in the object position of a relation.
///
/// Serialized externally tagged: `{"subject": "mid:…"}` or
/// `{"literal": "…"}`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Subject(Subject),
    Literal(Literal),
}

impl Entity {
    pub fn as_subject(&self) -> Option<&Subject> {
        match self {
            Entity::Subject(s) => Some(s),
            Entity::Literal(_) => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Entity::Literal(l) => Some(l),
            Entity::Subject(_) => None,
        }
    }

    pub fn is_subject(&self) -> bool {
        matches!(self, Entity::Subject(_))
    }

    /// The subject ID or the literal value.
    pub fn as_str(&self) -> &str {
        match self {
            Entity::Subject(s) => s.mid(),
            Entity::Literal(l) => l.value(),
        }
    }

    /// Outgoing relations. Always empty for a literal that is in the graph.
    pub fn relations_from<'g>(
        &self,
        graph: &'g KnowledgeGraph,
        predicate: Option<&Ns>,
    ) -> Result<Relations<'g>> {
        graph.relations_from(self, predicate)
    }

    pub fn relations_to<'g>(
        &self,
        graph: &'g KnowledgeGraph,
        predicate: Option<&Ns>,
    ) -> Result<Relations<'g>> {
        graph.relations_to(self, predicate)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Subject(s) => write!(f, "<{s}>"),
            Entity::Literal(l) => write!(f, "{:?}", l.value()),
        }
    }
}

impl From<Subject> for Entity {
    fn from(s: Subject) -> Self {
        Entity::Subject(s)
    }
}
impl From<&Subject> for Entity {
    fn from(s: &Subject) -> Self {
        Entity::Subject(s.clone())
    }
}
impl From<Literal> for Entity {
    fn from(l: Literal) -> Self {
        Entity::Literal(l)
    }
}
impl From<&Literal> for Entity {
    fn from(l: &Literal) -> Self {
        Entity::Literal(l.clone())
    }
}
impl From<&Entity> for Entity {
    fn from(e: &Entity) -> Self {
        e.clone()
    }
}
impl From<&str> for Entity {
    fn from(s: &str) -> Self {
        Entity::Literal(Literal::new(s))
    }
}
impl From<String> for Entity {
    fn from(s: String) -> Self {
        Entity::Literal(Literal::new(s))
    }
}
impl From<&String> for Entity {
    fn from(s: &String) -> Self {
        Entity::Literal(Literal::new(s.as_str()))
    }
}

/// A single `(subject, predicate, object)` fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relation {
    pub subject: Subject,
    pub predicate: Ns,
    pub object: Entity,
}

impl Relation {
    pub fn new(subject: Subject, predicate: Ns, object: Entity) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}> {} {}", self.subject, self.predicate, self.object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab;
    use std::collections::hash_map::RandomState;
    use std::collections::HashSet;
    use std::hash::BuildHasher;

    #[test]
    fn literal_has_value_semantics() {
        let a = Literal::new("x");
        let b = Literal::new(String::from("x"));
        assert_eq!(a, b);

        let state = RandomState::new();
        assert_eq!(state.hash_one(&a), state.hash_one("x"));
        assert_eq!(state.hash_one(&a), state.hash_one(&b));

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains("x"), "lookup by &str must find the literal");
    }

    #[test]
    fn subjects_compare_by_mid() {
        let a = Subject::from_mid("mid:abcdefghij");
        let b = Subject::from_mid(String::from("mid:abcdefghij"));
        assert_eq!(a, b);
        assert_ne!(a, Subject::from_mid("mid:0123456789"));
        assert_ne!(Entity::from(&a), Entity::from("mid:abcdefghij"));
    }

    #[test]
    fn subject_walks_its_own_relations() {
        let mut g = KnowledgeGraph::new();
        let lib = g.new_subject().unwrap();
        let dep = g.new_subject().unwrap();
        dep.add_relation(&mut g, &vocab::LIB, &lib).unwrap();
        dep.add_relation(&mut g, &vocab::DEP_NAME, "zlib").unwrap();

        let out: Vec<Relation> = dep.relations_from(&g, None).unwrap().collect();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r.subject == dep));
        let names: Vec<Relation> = dep.relations_from(&g, Some(&vocab::DEP_NAME)).unwrap().collect();
        assert_eq!(names, vec![Relation::new(dep.clone(), vocab::DEP_NAME, "zlib".into())]);

        let inbound: Vec<Relation> = lib.relations_to(&g, None).unwrap().collect();
        assert_eq!(inbound, vec![Relation::new(dep.clone(), vocab::LIB, (&lib).into())]);
        assert_eq!(dep.relations_to(&g, None).unwrap().count(), 0);

        let stranger = Subject::from_mid("mid:0000000000");
        assert!(stranger.relations_from(&g, None).is_err());
        assert!(stranger.relations_to(&g, None).is_err());
    }

    #[test]
    fn strings_become_literals() {
        let e: Entity = "hello".into();
        assert_eq!(e.as_literal().map(Literal::value), Some("hello"));
        assert!(e.as_subject().is_none());
        assert!(!e.is_subject());
        assert_eq!(e.as_str(), "hello");
    }

    #[test]
    fn entity_serializes_tagged() {
        let s = Entity::from(Subject::from_mid("mid:abc"));
        let l = Entity::from("value");
        assert_eq!(serde_json::to_string(&s).unwrap(), r#"{"subject":"mid:abc"}"#);
        assert_eq!(serde_json::to_string(&l).unwrap(), r#"{"literal":"value"}"#);
        let back: Entity = serde_json::from_str(r#"{"literal":"value"}"#).unwrap();
        assert_eq!(back, l);
    }

    #[test]
    fn display_forms() {
        let rel = Relation::new(
            Subject::from_mid("mid:abc"),
            crate::vocab::ID_NAME,
            Entity::from("One"),
        );
        assert_eq!(rel.to_string(), "<mid:abc> ns:id.name \"One\"");
    }
}
