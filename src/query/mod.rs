//! Query algebra: backend-agnostic description of "where to go".
//!
//! A [`Query`] is an ordered list of [`QueryFragment`]s followed by zero or
//! more alternative sub-trees. Fragments are evaluated left to right against
//! a node set that starts as "every entity":
//!
//! - a *path* fragment moves: `Related` hops across matching edges, `With`
//!   narrows the set it lands on;
//! - a *filter* fragment only narrows: `Related` keeps nodes that have a
//!   matching edge, `With` keeps nodes matching the predicate.
//!
//! Sub-trees are OR-ed: each is evaluated from the node set reached so far
//! and the results are unioned. Queries are immutable values; every
//! extension produces a new query.

pub mod filter;
pub mod paging;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use filter::{Filter, Related, With};
pub use paging::{Page, Pager};

use crate::model::Direction;

/// How a fragment is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentMode {
    Path,
    Filter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryFragment {
    Path(Filter),
    Filter(Filter),
}

impl QueryFragment {
    pub fn new(mode: FragmentMode, filter: Filter) -> Self {
        match mode {
            FragmentMode::Path => QueryFragment::Path(filter),
            FragmentMode::Filter => QueryFragment::Filter(filter),
        }
    }

    pub fn filter(&self) -> &Filter {
        match self {
            QueryFragment::Path(f) | QueryFragment::Filter(f) => f,
        }
    }

    pub fn mode(&self) -> FragmentMode {
        match self {
            QueryFragment::Path(_) => FragmentMode::Path,
            QueryFragment::Filter(_) => FragmentMode::Filter,
        }
    }
}

/// Immutable tree of query fragments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    fragments: Vec<QueryFragment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    sub_trees: Vec<Query>,
}

impl Query {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A builder appending path fragments to the empty query.
    pub fn path() -> QueryBuilder {
        QueryBuilder::new(Query::empty(), FragmentMode::Path)
    }

    /// A builder appending filter fragments to the empty query.
    pub fn filter() -> QueryBuilder {
        QueryBuilder::new(Query::empty(), FragmentMode::Filter)
    }

    /// A builder seeded with this query. `self` is not modified.
    pub fn extend(&self) -> QueryBuilder {
        QueryBuilder::new(self.clone(), FragmentMode::Path)
    }

    /// A linear query of `filters` applied in `mode`.
    pub fn of(mode: FragmentMode, filters: impl IntoIterator<Item = Filter>) -> Self {
        Self {
            fragments: filters.into_iter().map(|f| QueryFragment::new(mode, f)).collect(),
            sub_trees: Vec::new(),
        }
    }

    pub fn fragments(&self) -> &[QueryFragment] {
        &self.fragments
    }

    pub fn sub_trees(&self) -> &[Query] {
        &self.sub_trees
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty() && self.sub_trees.iter().all(Query::is_empty)
    }

    /// Graft `other` onto every leaf of `self`.
    ///
    /// Composition is associative and never reorders fragments:
    /// `a.then(&b).then(&c) == a.then(&b.then(&c))`.
    pub fn then(&self, other: &Query) -> Query {
        if self.sub_trees.is_empty() {
            let mut fragments = self.fragments.clone();
            fragments.extend(other.fragments.iter().cloned());
            Query { fragments, sub_trees: other.sub_trees.clone() }
        } else {
            Query {
                fragments: self.fragments.clone(),
                sub_trees: self.sub_trees.iter().map(|s| s.then(other)).collect(),
            }
        }
    }

    /// Number of distinct root-to-leaf walks.
    pub fn branch_count(&self) -> usize {
        if self.sub_trees.is_empty() {
            1
        } else {
            self.sub_trees.iter().map(Query::branch_count).sum()
        }
    }
}

// ============================================================================
// QueryBuilder
// ============================================================================

/// Mutable accumulator producing an immutable [`Query`].
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    seed: Query,
    tail: Query,
    mode: FragmentMode,
}

impl QueryBuilder {
    fn new(seed: Query, mode: FragmentMode) -> Self {
        Self { seed, tail: Query::empty(), mode }
    }

    /// Subsequent filters move along the graph.
    pub fn path(mut self) -> Self {
        self.mode = FragmentMode::Path;
        self
    }

    /// Subsequent filters only narrow the current set.
    pub fn filter(mut self) -> Self {
        self.mode = FragmentMode::Filter;
        self
    }

    /// Append `filters`, all of which must hold, in order.
    pub fn with(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        let next = Query::of(self.mode, filters);
        self.tail = self.tail.then(&next);
        self
    }

    /// Append alternatives: any one of the AND-groups may hold.
    pub fn where_all(mut self, groups: &[Vec<Filter>]) -> Self {
        match groups {
            [] => self,
            [only] => self.with(only.iter().cloned()),
            _ => {
                let branch = Query {
                    fragments: Vec::new(),
                    sub_trees: groups
                        .iter()
                        .map(|g| Query::of(self.mode, g.iter().cloned()))
                        .collect(),
                };
                self.tail = self.tail.then(&branch);
                self
            }
        }
    }

    /// Append a complete query.
    pub fn then(mut self, query: &Query) -> Self {
        self.tail = self.tail.then(query);
        self
    }

    pub fn build(self) -> Query {
        self.seed.then(&self.tail)
    }
}

// ============================================================================
// Display (used in error messages)
// ============================================================================

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Related(r) => {
                match r.direction {
                    Direction::Outgoing => write!(f, "-{}->", r.name)?,
                    Direction::Incoming => write!(f, "<-{}-", r.name)?,
                    Direction::Both => write!(f, "-{}-", r.name)?,
                }
                if let Some(other) = &r.other_end {
                    write!(f, "({other})")?;
                }
                Ok(())
            }
            Filter::With(With::Kinds(kinds)) => {
                let names: Vec<&str> = kinds.iter().map(|k| k.name()).collect();
                write!(f, "kind in [{}]", names.join(", "))
            }
            Filter::With(With::Ids(ids)) => write!(f, "id in [{}]", ids.join(", ")),
            Filter::With(With::Paths(paths)) => {
                let paths: Vec<String> = paths.iter().map(ToString::to_string).collect();
                write!(f, "path in [{}]", paths.join(", "))
            }
            Filter::With(With::PropertyValues { name, values }) => {
                let values: Vec<String> = values.iter().map(ToString::to_string).collect();
                write!(f, "{name} in [{}]", values.join(", "))
            }
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, frag) in self.fragments.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            match frag {
                QueryFragment::Path(filter) => write!(f, "/{filter}")?,
                QueryFragment::Filter(filter) => write!(f, "[{filter}]")?,
            }
        }
        if !self.sub_trees.is_empty() {
            write!(f, " (")?;
            for (i, sub) in self.sub_trees.iter().enumerate() {
                if i > 0 {
                    write!(f, " | ")?;
                }
                write!(f, "{sub}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}
