/*!
# Links

Social and spatial networks between actors and cells. Links are directed
and typed by name; a mutual link is a pair of links of the same name in
both directions. The human subsystem owns one [`LinkContainer`] for the
whole model.
 */

use crate::actor::{ActorId, Breed};
use crate::cells::CellRef;
use crate::error::{AbsesError, Result};
use crate::model::MainModel;
use crate::sequences::ActorsList;
use petgraph::graph::{DiGraph, Graph, NodeIndex, UnGraph};
use petgraph::EdgeType;
use rustc_hash::FxHashMap;
use serde_derive::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Anything that can be linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Node {
    Actor(ActorId),
    Cell(CellRef),
}

impl From<ActorId> for Node {
    fn from(id: ActorId) -> Node {
        Node::Actor(id)
    }
}

impl From<CellRef> for Node {
    fn from(cell: CellRef) -> Node {
        Node::Cell(cell)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Actor(id) => write!(f, "<Actor [{}]>", id),
            Node::Cell(c) => write!(f, "{}", c),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDirection {
    Out,
    In,
    Both,
}

#[derive(Debug, Default, Clone)]
struct LinkSet {
    out: FxHashMap<Node, BTreeSet<Node>>,
    inc: FxHashMap<Node, BTreeSet<Node>>,
}

impl LinkSet {
    fn add(&mut self, source: Node, target: Node) {
        self.out.entry(source).or_default().insert(target);
        self.inc.entry(target).or_default().insert(source);
    }

    fn remove(&mut self, source: Node, target: Node) {
        if let Some(targets) = self.out.get_mut(&source) {
            targets.remove(&target);
            if targets.is_empty() {
                self.out.remove(&source);
            }
        }
        if let Some(sources) = self.inc.get_mut(&target) {
            sources.remove(&source);
            if sources.is_empty() {
                self.inc.remove(&target);
            }
        }
    }

    fn has(&self, source: Node, target: Node) -> bool {
        self.out.get(&source).map_or(false, |t| t.contains(&target))
    }

    fn neighbors(&self, node: Node, direction: LinkDirection) -> BTreeSet<Node> {
        let mut result = BTreeSet::new();
        if direction != LinkDirection::In {
            if let Some(targets) = self.out.get(&node) {
                result.extend(targets.iter().copied());
            }
        }
        if direction != LinkDirection::Out {
            if let Some(sources) = self.inc.get(&node) {
                result.extend(sources.iter().copied());
            }
        }
        result
    }

    fn clean(&mut self, node: Node, direction: LinkDirection) {
        if direction != LinkDirection::In {
            for target in self.out.get(&node).cloned().unwrap_or_default() {
                self.remove(node, target);
            }
        }
        if direction != LinkDirection::Out {
            for source in self.inc.get(&node).cloned().unwrap_or_default() {
                self.remove(source, node);
            }
        }
    }

    fn edges(&self) -> Vec<(Node, Node)> {
        let mut edges: Vec<(Node, Node)> = self
            .out
            .iter()
            .flat_map(|(s, targets)| targets.iter().map(move |t| (*s, *t)))
            .collect();
        edges.sort();
        edges
    }
}

#[derive(Debug, Default, Clone)]
pub struct LinkContainer {
    links: BTreeMap<String, LinkSet>,
}

impl LinkContainer {
    /// Names of all link types.
    pub fn links(&self) -> Vec<&str> {
        self.links.keys().map(String::as_str).collect()
    }

    fn link_set(&self, name: &str) -> Result<&LinkSet> {
        self.links
            .get(name)
            .ok_or_else(|| AbsesError::NotFound(format!("Link '{}' not found.", name)))
    }

    pub fn add_a_link(&mut self, name: &str, source: Node, target: Node, mutual: bool) {
        let set = self.links.entry(name.to_string()).or_default();
        set.add(source, target);
        if mutual {
            set.add(target, source);
        }
    }

    pub fn remove_a_link(&mut self, name: &str, source: Node, target: Node, mutual: bool) -> Result<()> {
        let set = self
            .links
            .get_mut(name)
            .ok_or_else(|| AbsesError::NotFound(format!("Link '{}' not found.", name)))?;
        if !set.has(source, target) {
            return Err(AbsesError::NotFound(format!(
                "Link '{}' from {} to {} not found.",
                name, source, target
            )));
        }
        if mutual && !set.has(target, source) {
            return Err(AbsesError::NotFound(format!(
                "Link '{}' from {} to {} not found.",
                name, target, source
            )));
        }
        set.remove(source, target);
        if mutual {
            set.remove(target, source);
        }
        Ok(())
    }

    /// Whether `a` links to `b`, and whether `b` links to `a`.
    pub fn has_link(&self, name: &str, a: Node, b: Node) -> (bool, bool) {
        match self.links.get(name) {
            Some(set) => (set.has(a, b), set.has(b, a)),
            None => (false, false),
        }
    }

    /// Names of the link types `node` takes part in.
    pub fn owns_links(&self, node: Node, direction: LinkDirection) -> Vec<&str> {
        self.links
            .iter()
            .filter(|(_, set)| !set.neighbors(node, direction).is_empty())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Nodes linked with `node` through the link `name`, or through any
    /// link if `name` is `None`.
    pub fn linked(&self, node: Node, name: Option<&str>, direction: LinkDirection) -> Result<Vec<Node>> {
        let mut result = BTreeSet::new();
        match name {
            Some(name) => result.extend(self.link_set(name)?.neighbors(node, direction)),
            None => {
                for set in self.links.values() {
                    result.extend(set.neighbors(node, direction));
                }
            }
        }
        Ok(result.into_iter().collect())
    }

    /// Cut the links of `node`, of one type or of all types.
    pub fn clean_links_of(&mut self, node: Node, name: Option<&str>, direction: LinkDirection) {
        match name {
            Some(name) => {
                if let Some(set) = self.links.get_mut(name) {
                    set.clean(node, direction);
                }
            }
            None => {
                for set in self.links.values_mut() {
                    set.clean(node, direction);
                }
            }
        }
    }

    pub fn edges(&self, name: &str) -> Result<Vec<(Node, Node)>> {
        Ok(self.link_set(name)?.edges())
    }

    /// The link `name` as a directed graph.
    pub fn get_graph(&self, name: &str) -> Result<DiGraph<Node, ()>> {
        let mut graph = DiGraph::new();
        self.fill_graph(&mut graph, name, false)?;
        Ok(graph)
    }

    /// The link `name` as an undirected graph; mutual links become one edge.
    pub fn get_undirected_graph(&self, name: &str) -> Result<UnGraph<Node, ()>> {
        let mut graph = UnGraph::new_undirected();
        self.fill_graph(&mut graph, name, true)?;
        Ok(graph)
    }

    fn fill_graph<Ty: EdgeType>(&self, graph: &mut Graph<Node, (), Ty>, name: &str, collapse: bool) -> Result<()> {
        let mut index: FxHashMap<Node, NodeIndex> = FxHashMap::default();
        for (s, t) in self.edges(name)? {
            if collapse && s > t && self.has_link(name, t, s).0 {
                continue;
            }
            let si = *index.entry(s).or_insert_with(|| graph.add_node(s));
            let ti = *index.entry(t).or_insert_with(|| graph.add_node(t));
            graph.add_edge(si, ti, ());
        }
        Ok(())
    }

    /// Link operations from the point of view of one node.
    pub fn of(&mut self, node: Node) -> LinkProxy<'_> {
        LinkProxy { links: self, node }
    }

    /// Edges of every link type, for storing the state.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<(Node, Node)>> {
        self.links
            .iter()
            .map(|(name, set)| (name.clone(), set.edges()))
            .collect()
    }
}

pub struct LinkProxy<'a> {
    links: &'a mut LinkContainer,
    node: Node,
}

impl<'a> LinkProxy<'a> {
    /// Link this node to `target`.
    pub fn to(&mut self, name: &str, target: Node, mutual: bool) {
        self.links.add_a_link(name, self.node, target, mutual);
    }

    /// Let `source` link to this node.
    pub fn by(&mut self, name: &str, source: Node, mutual: bool) {
        self.links.add_a_link(name, source, self.node, mutual);
    }

    pub fn has(&self, name: &str, other: Node) -> (bool, bool) {
        self.links.has_link(name, self.node, other)
    }

    pub fn get(&self, name: Option<&str>, direction: LinkDirection) -> Result<Vec<Node>> {
        self.links.linked(self.node, name, direction)
    }

    pub fn owns(&self, direction: LinkDirection) -> Vec<&str> {
        self.links.owns_links(self.node, direction)
    }

    pub fn unlink(&mut self, name: &str, other: Node, mutual: bool) -> Result<()> {
        self.links.remove_a_link(name, self.node, other, mutual)
    }

    pub fn clean(&mut self, name: Option<&str>, direction: LinkDirection) {
        self.links.clean_links_of(self.node, name, direction)
    }
}

impl MainModel {
    /// Links of one actor or cell.
    pub fn link<N: Into<Node>>(&mut self, node: N) -> LinkProxy<'_> {
        self.human.links.of(node.into())
    }

    /// Actors linked with `id`, as a list.
    pub fn linked_actors(&self, id: ActorId, name: Option<&str>, direction: LinkDirection) -> Result<ActorsList<ActorId>> {
        Ok(self
            .human
            .links
            .linked(Node::Actor(id), name, direction)?
            .into_iter()
            .filter_map(|n| match n {
                Node::Actor(a) => Some(a),
                Node::Cell(_) => None,
            })
            .collect())
    }

    /**
    One new actor per graph node, linked along the graph edges. Edges of
    undirected graphs become mutual links.
     */
    pub fn new_from_graph<B: Breed, N, E, Ty: EdgeType>(
        &mut self,
        graph: &Graph<N, E, Ty>,
        link_name: &str,
    ) -> Result<ActorsList<ActorId>> {
        let actors = self.new_actors::<B>(graph.node_count())?;
        let ids: Vec<ActorId> = actors.iter().copied().collect();
        for edge in graph.raw_edges() {
            let source = ids[edge.source().index()];
            let target = ids[edge.target().index()];
            self.human
                .links
                .add_a_link(link_name, Node::Actor(source), Node::Actor(target), !graph.is_directed());
        }
        Ok(actors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a(i: u64) -> Node {
        Node::Actor(ActorId(i))
    }

    #[test]
    fn test_add_has_remove() {
        let mut links = LinkContainer::default();
        links.add_a_link("friend", a(1), a(2), false);
        assert_eq!(links.has_link("friend", a(1), a(2)), (true, false));
        links.add_a_link("friend", a(2), a(1), false);
        assert_eq!(links.has_link("friend", a(1), a(2)), (true, true));
        links.remove_a_link("friend", a(1), a(2), true).unwrap();
        assert_eq!(links.has_link("friend", a(1), a(2)), (false, false));
        assert!(links.remove_a_link("friend", a(1), a(2), false).is_err());
        assert!(links.remove_a_link("enemy", a(1), a(2), false).is_err());
    }

    #[test]
    fn test_linked_and_clean() {
        let mut links = LinkContainer::default();
        links.add_a_link("friend", a(1), a(2), true);
        links.add_a_link("friend", a(3), a(1), false);
        links.add_a_link("boss", a(1), a(4), false);
        assert_eq!(links.linked(a(1), Some("friend"), LinkDirection::Out).unwrap(), vec![a(2)]);
        assert_eq!(links.linked(a(1), Some("friend"), LinkDirection::In).unwrap(), vec![a(2), a(3)]);
        assert_eq!(links.linked(a(1), None, LinkDirection::Out).unwrap(), vec![a(2), a(4)]);
        assert_eq!(links.owns_links(a(4), LinkDirection::In), vec!["boss"]);
        assert!(links.owns_links(a(4), LinkDirection::Out).is_empty());

        links.clean_links_of(a(1), Some("friend"), LinkDirection::In);
        assert_eq!(links.has_link("friend", a(1), a(2)), (true, false));
        links.clean_links_of(a(1), None, LinkDirection::Both);
        assert!(links.linked(a(1), None, LinkDirection::Both).unwrap().is_empty());
        assert!(links.linked(a(1), Some("nothing"), LinkDirection::Both).is_err());
    }

    #[test]
    fn test_graph_export() {
        let mut links = LinkContainer::default();
        links.add_a_link("friend", a(1), a(2), true);
        links.add_a_link("friend", a(2), a(3), false);
        let directed = links.get_graph("friend").unwrap();
        assert_eq!((directed.node_count(), directed.edge_count()), (3, 3));
        let undirected = links.get_undirected_graph("friend").unwrap();
        assert_eq!((undirected.node_count(), undirected.edge_count()), (3, 2));
    }

    #[test]
    fn test_proxy() {
        let mut links = LinkContainer::default();
        let cell = Node::Cell(CellRef::new(0, 1, 1));
        links.of(a(1)).to("owns", cell, false);
        links.of(a(2)).by("owns", a(1), false);
        assert_eq!(links.of(a(1)).get(Some("owns"), LinkDirection::Out).unwrap(), vec![a(2), cell]);
        assert_eq!(links.of(cell).has("owns", a(1)), (false, true));
    }
}
