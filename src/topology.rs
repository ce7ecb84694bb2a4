use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use crate::{
    packet::Packet,
    quantities::{NodeId, TimeSpan},
    registry::KindName,
    simulation::{Kinds, Simulation},
};

pub const SIMPLE_LINK: KindName = "simple";

/// Latency of the standard link kind, in ticks.
const ONE_HOP_DELAY: TimeSpan = TimeSpan::new(10);

/// Handler invoked when a node kind is handed an inbound packet. The
/// packet stays owned by the receive path, which discards it afterwards;
/// handlers must not retain it.
pub type RecvHandler = fn(&mut Simulation, NodeId, &mut Packet);

/// Prototype of a node kind: its reactive behavior.
#[derive(Clone, Copy)]
pub struct NodeProto {
    pub on_recv: RecvHandler,
}

/// Prototype of a link kind: its latency policy.
#[derive(Clone, Copy)]
pub struct LinkProto {
    pub latency: fn(NodeId, NodeId) -> TimeSpan,
}

/// A node of the simulated network.
///
/// The neighbor set is fixed at topology build time and ordered by id, so
/// broadcast fan-out visits neighbors in a reproducible order. The
/// next-hop table is the only mutable state; control packets are its
/// only mutator. Forwarding logic may read the neighbor set but must not
/// treat it as authoritative for routing decisions; only the table is.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    kind: KindName,
    neighbors: BTreeSet<NodeId>,
    table: FxHashMap<NodeId, NodeId>,
}

impl Node {
    pub(crate) fn new(kind: KindName, id: NodeId) -> Node {
        Node {
            id,
            kind,
            neighbors: BTreeSet::new(),
            table: FxHashMap::default(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    #[must_use]
    pub const fn kind(&self) -> KindName {
        self.kind
    }

    pub fn neighbors(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.neighbors.iter().copied()
    }

    #[must_use]
    pub fn next_hop(&self, dst: NodeId) -> Option<NodeId> {
        self.table.get(&dst).copied()
    }

    pub fn set_next_hop(&mut self, dst: NodeId, next: NodeId) {
        self.table.insert(dst, next);
    }

    pub(crate) fn add_neighbor(&mut self, id: NodeId) {
        self.neighbors.insert(id);
    }
}

/// A directed connection with a fixed latency. A bidirectional cable is
/// two links, one per direction; at most one link exists per ordered
/// pair of endpoints.
#[derive(Debug, Clone, Copy)]
pub struct Link {
    pub kind: KindName,
    pub from: NodeId,
    pub to: NodeId,
    pub latency: TimeSpan,
}

/// All nodes and links of one simulation instance.
#[derive(Debug, Default)]
pub struct Topology {
    nodes: FxHashMap<NodeId, Node>,
    links: FxHashMap<(NodeId, NodeId), Link>,
}

impl Topology {
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    #[must_use]
    pub fn link(&self, from: NodeId, to: NodeId) -> Option<&Link> {
        self.links.get(&(from, to))
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Ids directly reachable from `id`, ascending. Empty for an unknown
    /// node.
    pub fn neighbors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .get(&id)
            .into_iter()
            .flat_map(Node::neighbors)
    }

    pub(crate) fn insert_node(&mut self, node: Node) {
        self.nodes.insert(node.id(), node);
    }

    pub(crate) fn insert_link(&mut self, link: Link) {
        if let Some(from) = self.nodes.get_mut(&link.from) {
            from.add_neighbor(link.to);
        }
        self.links.insert((link.from, link.to), link);
    }
}

fn simple_latency(_from: NodeId, _to: NodeId) -> TimeSpan {
    ONE_HOP_DELAY
}

/// Registers the standard constant-latency link kind.
pub fn register(kinds: &mut Kinds) {
    kinds.links.register(
        SIMPLE_LINK,
        LinkProto {
            latency: simple_latency,
        },
    );
}
