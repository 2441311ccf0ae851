//! The relationship graph over sources, and the join planner.
//!
//! Vertices are source names; edges carry the INNER JOIN equality that
//! connects two adjacent sources. Parent edges point parent -> child, link
//! edges point child -> linked source. The combined edge set must be
//! acyclic.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use petgraph::algo::astar;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::{EqlError, EqlResult};

/// A `<table>.<key>` operand within a join equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableKey {
    pub table: String,
    pub key: String,
}

impl TableKey {
    pub fn new(table: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.key)
    }
}

/// One INNER JOIN step: join `table` on `left = right`, where `left` is the
/// surrogate-id side and `right` the foreign-key side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceJoin {
    pub table: String,
    pub left: TableKey,
    pub right: TableKey,
}

impl SourceJoin {
    /// The join recorded on a parented source: `parent.id = child.<parent>_id`.
    pub fn parent_of(child: &str, parent: &str) -> Self {
        Self {
            table: child.to_string(),
            left: TableKey::new(parent, crate::schema::SOURCE_ID_KEY),
            right: TableKey::new(child, format!("{parent}_{}", crate::schema::SOURCE_ID_KEY)),
        }
    }

    /// The join recorded for a linked value: `other.<key> = self.<other>_<key>`.
    pub fn link_to(source: &str, other: &str, key: &str) -> Self {
        Self {
            table: other.to_string(),
            left: TableKey::new(other, key),
            right: TableKey::new(source, format!("{other}_{key}")),
        }
    }
}

impl fmt::Display for SourceJoin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.left, self.right)
    }
}

/// An ordered join plan: a top table plus the INNER JOINs reaching every
/// required source.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub top: String,
    pub joins: Vec<SourceJoin>,
    pub require: Vec<String>,
    pub top_note: &'static str,
}

impl Plan {
    fn new(top: String, top_note: &'static str, require: Vec<String>) -> Self {
        Self {
            top,
            joins: Vec::new(),
            require,
            top_note,
        }
    }

    /// Whether the named source is already covered by this plan.
    pub fn has(&self, name: &str) -> bool {
        self.top == name || self.joins.iter().any(|j| j.table == name)
    }

    fn add(&mut self, join: SourceJoin) {
        if !self.has(&join.table) {
            self.joins.push(join);
        }
    }

    /// Brief one-line summary: `[top, a.b=c.d, …]`.
    pub fn brief(&self) -> String {
        let mut out = format!("[{}", self.top);
        for join in &self.joins {
            out.push_str(", ");
            out.push_str(&join.to_string());
        }
        out.push(']');
        out
    }

    /// Verbose multi-line summary with one row per join step.
    pub fn verbose(&self) -> String {
        let mut out = format!("SRC\tquery sources\t{:?}\n", self.require);
        out.push_str(&format!("TOP\t{}\t{}\n", self.top_note, self.top));
        for (idx, join) in self.joins.iter().enumerate() {
            out.push_str(&format!("JOIN[{}]\tadd {}\t{}\n", idx + 1, join.table, join));
        }
        out
    }
}

/// Directed graph of sources with name-addressable vertices.
#[derive(Debug, Default)]
pub struct SourceGraph {
    graph: DiGraph<String, SourceJoin>,
    index: HashMap<String, NodeIndex>,
    order: Vec<String>,
    parents: HashMap<String, String>,
    links: HashMap<String, Vec<String>>,
}

impl SourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vertex with its parent edge and link edges. The first vertex
    /// added is the primary source. Duplicate names are ignored.
    pub fn add(
        &mut self,
        name: &str,
        parent: Option<(String, SourceJoin)>,
        links: Vec<(String, SourceJoin)>,
    ) -> EqlResult<()> {
        if self.index.contains_key(name) {
            return Ok(());
        }
        let idx = self.graph.add_node(name.to_string());
        self.index.insert(name.to_string(), idx);
        self.order.push(name.to_string());

        if let Some((parent_name, join)) = parent {
            let pidx = *self
                .index
                .get(&parent_name)
                .ok_or_else(|| EqlError::SourceNotFound(parent_name.clone()))?;
            self.graph.add_edge(pidx, idx, join);
            self.parents.insert(name.to_string(), parent_name);
        }

        for (other, join) in links {
            let oidx = *self
                .index
                .get(&other)
                .ok_or_else(|| EqlError::SourceNotFound(other.clone()))?;
            self.graph.add_edge(idx, oidx, join);
            self.links.entry(name.to_string()).or_default().push(other);
        }

        Ok(())
    }

    /// The first source added; the default table for unqualified references.
    pub fn primary(&self) -> Option<&str> {
        self.order.first().map(String::as_str)
    }

    fn is_data(&self, name: &str) -> bool {
        !self.parents.contains_key(name)
            && self.links.get(name).map_or(true, |l| l.is_empty())
    }

    /// Kahn's algorithm over the parent/link dependency sets; reports the
    /// sorted names left pending when no sink remains.
    pub fn validate(&self) -> EqlResult<()> {
        let mut pending: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for name in &self.order {
            let mut deps: BTreeSet<&str> = BTreeSet::new();
            if let Some(parent) = self.parents.get(name) {
                deps.insert(parent.as_str());
            }
            if let Some(links) = self.links.get(name) {
                for other in links {
                    deps.insert(other.as_str());
                }
            }
            pending.insert(name.as_str(), deps);
        }

        while !pending.is_empty() {
            let empties: Vec<&str> = pending
                .iter()
                .filter(|(_, deps)| deps.is_empty())
                .map(|(name, _)| *name)
                .collect();
            if empties.is_empty() {
                return Err(EqlError::CircularDependency(
                    pending.keys().map(|k| k.to_string()).collect(),
                ));
            }
            for name in &empties {
                pending.remove(name);
            }
            for deps in pending.values_mut() {
                for name in &empties {
                    deps.remove(name);
                }
            }
        }
        Ok(())
    }

    fn search(&self, start: &str, end: &str) -> Option<Vec<String>> {
        let s = *self.index.get(start)?;
        let e = *self.index.get(end)?;
        let (_, path) = astar(&self.graph, s, |n| n == e, |_| 1u32, |_| 0u32)?;
        Some(path.into_iter().map(|i| self.graph[i].clone()).collect())
    }

    /// Compute the join plan covering every required source.
    pub fn plan(&self, required: &[String]) -> EqlResult<Plan> {
        let mut require: Vec<String> = Vec::new();
        for name in required {
            if !require.contains(name) {
                require.push(name.clone());
            }
        }
        if require.is_empty() {
            if let Some(primary) = self.primary() {
                require.push(primary.to_string());
            }
        }

        self.validate()?;

        for name in &require {
            if !self.index.contains_key(name) {
                return Err(EqlError::SourceNotFound(name.clone()));
            }
        }

        if require.len() == 1 {
            let top = require[0].clone();
            return Ok(Plan::new(top, "only table", require));
        }

        let primary = self
            .primary()
            .ok_or_else(|| EqlError::SourceNotFound(String::new()))?
            .to_string();

        let mut tops: Vec<String> = Vec::new();
        let mut parents: Vec<String> = Vec::new();
        for name in &require {
            if self.is_data(name) && !tops.contains(name) {
                tops.push(name.clone());
            }
            if let Some(parent) = self.parents.get(name) {
                if !parents.contains(parent) {
                    parents.push(parent.clone());
                }
            }
        }

        let mut pending = require.clone();
        let (top, top_note): (String, &'static str) = if tops.is_empty() {
            if parents.len() == 1 {
                (parents[0].clone(), "first parent")
            } else if parents.contains(&primary) {
                (primary, "primary source")
            } else {
                (pending[0].clone(), "first required")
            }
        } else if tops.contains(&primary) || parents.contains(&primary) {
            (primary, "primary source")
        } else {
            (tops[0].clone(), "first required")
        };
        pending.retain(|name| name != &top);

        let mut plan = Plan::new(top, top_note, require);
        for source in pending {
            let path = match self.search(&plan.top, &source) {
                Some(path) => path,
                None => {
                    return Err(EqlError::UnresolvedPlan {
                        pending: vec![source],
                        plan: plan.brief(),
                    })
                }
            };
            for window in path.windows(2) {
                let a = self.index[&window[0]];
                let b = self.index[&window[1]];
                if let Some(edge) = self.graph.find_edge(a, b) {
                    plan.add(self.graph[edge].clone());
                }
            }
        }

        Ok(plan)
    }
}
