//! Graph topology
//!
//! Nodes arrive in beamline order. Each setpoint links to every node after
//! it up to and including the next setpoint; readbacks never link out. A
//! master node links to every setpoint after it.
//!
//! ```text
//! SP1 -> SP2
//! SP2 -> RB1, SP3
//! SP3 -> RB2, RB3, SP4
//! SP4 -> RB4
//! ```

use super::node::{GraphNode, NodeId};

/// Position of the link builder in its single pass over the node list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkState {
    /// No node is collecting links yet
    Start,
    /// `current` collects links if it is a setpoint
    Tracking { current: usize },
}

/// Single-pass link computation over an ordered node list
#[derive(Debug)]
pub struct LinkBuilder<'a> {
    nodes: &'a [GraphNode],
    state: LinkState,
    downstream: Vec<Vec<NodeId>>,
}

impl<'a> LinkBuilder<'a> {
    pub fn new(nodes: &'a [GraphNode]) -> Self {
        Self {
            nodes,
            state: LinkState::Start,
            downstream: vec![Vec::new(); nodes.len()],
        }
    }

    fn id(index: usize) -> NodeId {
        NodeId::from_index(index)
    }

    fn step(&mut self, index: usize) {
        let node = &self.nodes[index];

        if node.is_master() {
            self.downstream[index] = self.nodes[index + 1..]
                .iter()
                .enumerate()
                .filter(|(_, n)| n.is_setpoint())
                .map(|(offset, _)| Self::id(index + 1 + offset))
                .collect();
            self.state = LinkState::Start;
            return;
        }

        match self.state {
            LinkState::Start => {
                self.downstream[index].clear();
                self.state = LinkState::Tracking { current: index };
            }
            LinkState::Tracking { current } => {
                if self.nodes[current].is_setpoint() {
                    self.downstream[current].push(Self::id(index));
                }
                if node.is_setpoint() {
                    self.downstream[index].clear();
                    self.state = LinkState::Tracking { current: index };
                }
            }
        }
    }

    /// Downstream lists, indexed like the input nodes
    pub fn build(mut self) -> Vec<Vec<NodeId>> {
        for index in 0..self.nodes.len() {
            self.step(index);
        }
        self.downstream
    }
}

/// Ordered nodes of one run, addressed by [`NodeId`]
#[derive(Debug, Clone, Default)]
pub struct NodeList {
    nodes: Vec<GraphNode>,
    linked: bool,
}

impl NodeList {
    /// Take ownership of nodes in final order and assign their ids
    pub fn new(mut nodes: Vec<GraphNode>) -> Self {
        for (index, node) in nodes.iter_mut().enumerate() {
            node.set_node_id(NodeId::from_index(index));
        }
        Self {
            nodes,
            linked: false,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(id.index())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut GraphNode> {
        self.nodes.get_mut(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut GraphNode> {
        self.nodes.iter_mut()
    }

    pub fn find(&self, name: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.name() == name)
    }

    pub fn is_linked(&self) -> bool {
        self.linked
    }

    /// Compute every node's downstream list. Only the first call has effect.
    pub fn link(&mut self) {
        if self.linked {
            tracing::debug!("Node list already linked");
            return;
        }
        let downstream = LinkBuilder::new(&self.nodes).build();
        for (node, links) in self.nodes.iter_mut().zip(downstream) {
            node.set_downstream(links);
        }
        self.linked = true;
    }

    /// Downstream of `id` extended across `hops` setpoint boundaries.
    ///
    /// Each extra hop appends the downstream of the last node collected so
    /// far. A master's downstream already spans every setpoint and is
    /// returned unchanged.
    pub fn extended_downstream(&self, id: NodeId, hops: usize) -> Vec<NodeId> {
        let Some(node) = self.get(id) else {
            return Vec::new();
        };
        let mut result = node.downstream().to_vec();
        if node.is_master() {
            return result;
        }
        for _ in 1..hops {
            let Some(next) = result.last().and_then(|last| self.get(*last)) else {
                break;
            };
            if next.downstream().is_empty() {
                break;
            }
            result.extend_from_slice(next.downstream());
        }
        result
    }

    /// Every `(start, end)` edge at the given hop distance, in node order
    pub fn edges(&self, hops: usize) -> Vec<(NodeId, NodeId)> {
        self.nodes
            .iter()
            .enumerate()
            .flat_map(|(index, _)| {
                let start = NodeId::from_index(index);
                self.extended_downstream(start, hops)
                    .into_iter()
                    .map(move |end| (start, end))
            })
            .collect()
    }
}
