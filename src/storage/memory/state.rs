//! Graph state held by the memory backend, and query evaluation over it.

use hashbrown::{HashMap, HashSet};
use tracing::trace;

use crate::model::{CanonicalPath, Direction, Entity, Relationship, WellKnown};
use crate::query::{FragmentMode, Filter, Query, QueryFragment, Related, With};
use crate::{Error, Result};

/// One recorded write. Transactions log these so that a commit racing
/// another commit can be replayed, and re-validated, on the newer state.
#[derive(Debug, Clone)]
pub(super) enum Op {
    InsertEntity(Entity),
    ReplaceEntity(Entity),
    RemoveEntity(CanonicalPath),
    InsertRelationship(Relationship),
    ReplaceRelationship(Relationship),
    RemoveRelationship(String),
}

#[derive(Debug, Clone, Default)]
pub(super) struct GraphState {
    pub entities: HashMap<CanonicalPath, Entity>,
    pub relationships: HashMap<String, Relationship>,
    /// entity path → ids of relationships touching it
    pub adjacency: HashMap<CanonicalPath, Vec<String>>,
}

impl GraphState {
    // ========================================================================
    // Writes
    // ========================================================================

    /// Apply a write, failing with [`Error::Conflict`] if the state no
    /// longer admits it.
    pub fn apply(&mut self, op: &Op) -> Result<()> {
        match op {
            Op::InsertEntity(entity) => {
                let path = entity.path();
                if self.entities.contains_key(path) {
                    return Err(Error::Conflict(format!("entity '{path}' already exists")));
                }
                self.entities.insert(path.clone(), entity.clone());
                self.adjacency.insert(path.clone(), Vec::new());
            }
            Op::ReplaceEntity(entity) => {
                let slot = self
                    .entities
                    .get_mut(entity.path())
                    .ok_or_else(|| Error::Conflict(format!("entity '{}' no longer exists", entity.path())))?;
                *slot = entity.clone();
            }
            Op::RemoveEntity(path) => {
                if self.entities.remove(path).is_none() {
                    return Err(Error::Conflict(format!("entity '{path}' no longer exists")));
                }
                if let Some(ids) = self.adjacency.remove(path) {
                    if !ids.is_empty() {
                        return Err(Error::Conflict(format!(
                            "entity '{path}' gained {} relationships concurrently",
                            ids.len()
                        )));
                    }
                }
            }
            Op::InsertRelationship(rel) => {
                for end in [&rel.source, &rel.target] {
                    if !self.entities.contains_key(end) {
                        return Err(Error::Conflict(format!(
                            "cannot relate '{end}': entity no longer exists"
                        )));
                    }
                }
                if WellKnown::is_well_known(&rel.name)
                    && self.relationship_between(&rel.source, &rel.target, &rel.name).is_some()
                {
                    return Err(Error::Conflict(format!(
                        "relationship {} --{}--> {} already exists",
                        rel.source, rel.name, rel.target
                    )));
                }
                self.adjacency.entry(rel.source.clone()).or_default().push(rel.id.clone());
                if rel.source != rel.target {
                    self.adjacency.entry(rel.target.clone()).or_default().push(rel.id.clone());
                }
                self.relationships.insert(rel.id.clone(), rel.clone());
            }
            Op::ReplaceRelationship(rel) => {
                let slot = self
                    .relationships
                    .get_mut(&rel.id)
                    .ok_or_else(|| Error::Conflict(format!("relationship '{}' no longer exists", rel.id)))?;
                *slot = rel.clone();
            }
            Op::RemoveRelationship(id) => {
                let rel = self
                    .relationships
                    .remove(id)
                    .ok_or_else(|| Error::Conflict(format!("relationship '{id}' no longer exists")))?;
                for end in [&rel.source, &rel.target] {
                    if let Some(ids) = self.adjacency.get_mut(end) {
                        ids.retain(|rid| rid != id);
                    }
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    pub fn relationship_between(
        &self,
        source: &CanonicalPath,
        target: &CanonicalPath,
        name: &str,
    ) -> Option<&Relationship> {
        self.adjacency
            .get(source)?
            .iter()
            .filter_map(|id| self.relationships.get(id))
            .find(|r| r.source == *source && r.target == *target && r.name == name)
    }

    pub fn relationships_of(
        &self,
        at: &CanonicalPath,
        direction: Direction,
        name: Option<&str>,
    ) -> Vec<&Relationship> {
        let Some(ids) = self.adjacency.get(at) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| self.relationships.get(id))
            .filter(|r| r.touches(at, direction))
            .filter(|r| name.is_none_or(|n| r.name == n))
            .collect()
    }

    /// Whether `at` still has an outgoing `contains` edge.
    pub fn contains_children(&self, at: &CanonicalPath) -> bool {
        !self
            .relationships_of(at, Direction::Outgoing, Some(WellKnown::Contains.as_str()))
            .is_empty()
    }

    // ========================================================================
    // Query evaluation
    // ========================================================================

    /// Paths of all entities `query` reaches, sorted and de-duplicated.
    pub fn evaluate(&self, query: &Query) -> Vec<CanonicalPath> {
        let start: Vec<&CanonicalPath> = self.entities.keys().collect();
        let mut reached = self.eval_tree(query, start);
        reached.sort();
        reached.dedup();
        trace!(%query, hits = reached.len(), "evaluated query");
        reached.into_iter().cloned().collect()
    }

    fn eval_tree<'a>(&'a self, query: &Query, mut current: Vec<&'a CanonicalPath>) -> Vec<&'a CanonicalPath> {
        for fragment in query.fragments() {
            if current.is_empty() {
                return current;
            }
            current = self.apply_fragment(fragment, current);
        }
        if query.sub_trees().is_empty() {
            return current;
        }
        let mut reached = Vec::new();
        for sub in query.sub_trees() {
            reached.extend(self.eval_tree(sub, current.clone()));
        }
        reached
    }

    fn apply_fragment<'a>(
        &'a self,
        fragment: &QueryFragment,
        mut current: Vec<&'a CanonicalPath>,
    ) -> Vec<&'a CanonicalPath> {
        match (fragment.mode(), fragment.filter()) {
            (FragmentMode::Path, Filter::Related(related)) => {
                let mut seen = HashSet::new();
                let mut next = Vec::new();
                for at in current {
                    for rel in self.matching_edges(at, related) {
                        let Some(other) = rel.other_end(at) else { continue };
                        if let Some((landed, _)) = self.entities.get_key_value(other) {
                            if seen.insert(landed) {
                                next.push(landed);
                            }
                        }
                    }
                }
                next
            }
            (FragmentMode::Filter, Filter::Related(related)) => {
                current.retain(|at| !self.matching_edges(at, related).is_empty());
                current
            }
            (_, Filter::With(with)) => {
                current.retain(|at| self.matches(at, with));
                current
            }
        }
    }

    fn matching_edges(&self, at: &CanonicalPath, related: &Related) -> Vec<&Relationship> {
        self.relationships_of(at, related.direction, Some(&related.name))
            .into_iter()
            .filter(|rel| {
                related
                    .other_end
                    .as_ref()
                    .is_none_or(|end| rel.other_end(at) == Some(end))
            })
            .collect()
    }

    fn matches(&self, at: &CanonicalPath, with: &With) -> bool {
        match with {
            With::Kinds(kinds) => kinds.contains(&at.kind()),
            With::Ids(ids) => ids.iter().any(|id| id == at.id()),
            With::Paths(paths) => paths.contains(at),
            With::PropertyValues { name, values } => self
                .entities
                .get(at)
                .and_then(|e| e.properties().get(name))
                .is_some_and(|v| values.contains(v)),
        }
    }
}
