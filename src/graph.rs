//! Read-only graph access consumed by the estimators.
//!
//! Node ids are the dense range `0..node_count()`. Out-adjacency is an
//! `id -> weight` mapping per node; estimators read it once per call (see
//! [`OutAdjacency`](crate::transition::OutAdjacency)) and never mutate the graph.

use std::collections::BTreeMap;

use crate::{Error, Result};

/// Weighted directed graph, viewed through its out-adjacency.
pub trait GraphView {
    /// Number of nodes `n`; valid ids are `0..n`.
    fn node_count(&self) -> usize;

    /// Outgoing `(neighbor, weight)` pairs of `node`.
    ///
    /// Returns [`Error::NodeNotFound`] when `node >= node_count()`.
    fn adjacents(&self, node: usize) -> Result<Vec<(usize, f64)>>;
}

impl<G: GraphView + ?Sized> GraphView for &G {
    fn node_count(&self) -> usize {
        (**self).node_count()
    }
    fn adjacents(&self, node: usize) -> Result<Vec<(usize, f64)>> {
        (**self).adjacents(node)
    }
}

/// Dense weight matrix adapter: any nonzero `0[u][v]` is an edge `u -> v`.
///
/// Negative and NaN entries are passed through as edges so that estimators reject
/// them with [`Error::InvalidArgument`] instead of silently dropping them.
pub struct AdjacencyMatrix<'a>(pub &'a [Vec<f64>]);

impl GraphView for AdjacencyMatrix<'_> {
    fn node_count(&self) -> usize {
        self.0.len()
    }

    fn adjacents(&self, node: usize) -> Result<Vec<(usize, f64)>> {
        let row = self.0.get(node).ok_or(Error::NodeNotFound(node))?;
        Ok(row
            .iter()
            .enumerate()
            .filter(|(_, &w)| w != 0.0)
            .map(|(v, &w)| (v, w))
            .collect())
    }
}

/// Arena graph: node `i` lives at `nodes[i]` and owns its `id -> weight` out-map.
///
/// There are no back-references between nodes; an edge exists only as an entry in
/// its source's map.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdjacencyList {
    nodes: Vec<BTreeMap<usize, f64>>,
}

impl AdjacencyList {
    /// Builds a graph with `n` nodes from `(source, target, weight)` triples.
    pub fn from_edges(n: usize, edges: &[(usize, usize, f64)]) -> Result<Self> {
        let mut builder = GraphBuilder::with_nodes(n);
        for &(u, v, w) in edges {
            builder.add_edge(u, v, w)?;
        }
        Ok(builder.build())
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(BTreeMap::len).sum()
    }

    pub fn edge_weight(&self, source: usize, target: usize) -> Option<f64> {
        self.nodes.get(source)?.get(&target).copied()
    }
}

impl GraphView for AdjacencyList {
    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn adjacents(&self, node: usize) -> Result<Vec<(usize, f64)>> {
        let out = self.nodes.get(node).ok_or(Error::NodeNotFound(node))?;
        Ok(out.iter().map(|(&v, &w)| (v, w)).collect())
    }
}

/// Incremental [`AdjacencyList`] construction.
///
/// The builder owns the id counter: ids are handed out in order `0, 1, 2, ...`
/// and are scoped to the graph being built.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    next_id: usize,
    nodes: Vec<BTreeMap<usize, f64>>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder with nodes `0..n` already allocated.
    pub fn with_nodes(n: usize) -> Self {
        let mut builder = Self::new();
        builder.add_nodes(n);
        builder
    }

    /// Allocates the next node id.
    pub fn add_node(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.push(BTreeMap::new());
        id
    }

    /// Allocates `count` consecutive ids and returns them as a range.
    pub fn add_nodes(&mut self, count: usize) -> std::ops::Range<usize> {
        let start = self.next_id;
        for _ in 0..count {
            self.add_node();
        }
        start..self.next_id
    }

    /// Sets the weight of `source -> target`, replacing any previous weight.
    ///
    /// Weights must be finite and non-negative; zero-weight edges are stored but
    /// never traversed.
    pub fn add_edge(&mut self, source: usize, target: usize, weight: f64) -> Result<()> {
        if target >= self.next_id {
            return Err(Error::NodeNotFound(target));
        }
        if !weight.is_finite() || weight < 0.0 {
            return Err(Error::InvalidArgument(format!(
                "edge weight must be finite and non-negative ({source}->{target}: {weight})"
            )));
        }
        self.nodes
            .get_mut(source)
            .ok_or(Error::NodeNotFound(source))?
            .insert(target, weight);
        Ok(())
    }

    pub fn node_count(&self) -> usize {
        self.next_id
    }

    pub fn build(self) -> AdjacencyList {
        AdjacencyList { nodes: self.nodes }
    }
}

#[cfg(feature = "petgraph")]
impl<N, E, Ty, Ix> GraphView for petgraph::Graph<N, E, Ty, Ix>
where
    E: Copy + Into<f64>,
    Ty: petgraph::EdgeType,
    Ix: petgraph::graph::IndexType,
{
    fn node_count(&self) -> usize {
        self.node_count()
    }

    fn adjacents(&self, node: usize) -> Result<Vec<(usize, f64)>> {
        use petgraph::visit::EdgeRef;

        if node >= self.node_count() {
            return Err(Error::NodeNotFound(node));
        }
        Ok(self
            .edges(petgraph::graph::NodeIndex::new(node))
            .map(|e| {
                let other = if e.source().index() == node {
                    e.target()
                } else {
                    e.source()
                };
                (other.index(), (*e.weight()).into())
            })
            .collect())
    }
}
