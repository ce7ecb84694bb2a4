//! Precomputed routing plans: per-destination next-hop tables under two
//! link metrics, and the control-update schedule that installs them.

use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
};

use serde::{Deserialize, Serialize};
use vec_map::VecMap;

use crate::quantities::{NodeId, Time};

/// One undirected input link, carrying both metrics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LinkSpec {
    pub id: u32,
    pub a: NodeId,
    pub b: NodeId,
    pub old_weight: u64,
    pub new_weight: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    Old,
    New,
}

impl Metric {
    const fn weight(self, edge: &Edge) -> u64 {
        match self {
            Metric::Old => edge.old,
            Metric::New => edge.new,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Edge {
    pub to: NodeId,
    pub old: u64,
    pub new: u64,
}

/// Undirected weighted adjacency built from the input links.
#[derive(Debug)]
pub struct Graph {
    len: usize,
    adj: VecMap<Vec<Edge>>,
}

impl Graph {
    #[must_use]
    pub fn from_links(nodes: u32, links: &[LinkSpec]) -> Graph {
        let mut len = nodes as usize;
        let mut adj = VecMap::new();
        for link in links {
            len = len.max(link.a.index() + 1).max(link.b.index() + 1);
            for (from, to) in [(link.a, link.b), (link.b, link.a)] {
                adj.entry(from.index()).or_insert_with(Vec::new).push(Edge {
                    to,
                    old: link.old_weight,
                    new: link.new_weight,
                });
            }
        }
        Graph { len, adj }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn edges(&self, v: NodeId) -> &[Edge] {
        self.adj.get(v.index()).map_or(&[], Vec::as_slice)
    }
}

/// Shortest-path tree for one (destination, metric) pair: for every
/// reachable node, the first hop toward the destination and the path
/// cost. The destination maps to itself with cost zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingTable {
    dest: NodeId,
    next_hop: VecMap<NodeId>,
    cost: VecMap<u64>,
}

impl RoutingTable {
    #[must_use]
    pub const fn dest(&self) -> NodeId {
        self.dest
    }

    #[must_use]
    pub fn next_hop(&self, v: NodeId) -> Option<NodeId> {
        self.next_hop.get(v.index()).copied()
    }

    #[must_use]
    pub fn cost(&self, v: NodeId) -> Option<u64> {
        self.cost.get(v.index()).copied()
    }

    /// `(node, next hop)` entries in ascending node order.
    pub fn entries(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.next_hop
            .iter()
            .map(|(v, &hop)| (NodeId::new(v as u32), hop))
    }
}

#[derive(PartialEq, Eq)]
struct Frontier {
    cost: u64,
    from: NodeId,
    to: NodeId,
}

// equal costs settle the lower already-reached endpoint first
impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cost
            .cmp(&other.cost)
            .then_with(|| self.from.cmp(&other.from))
            .then_with(|| self.to.cmp(&other.to))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Single-source shortest paths from `dest` outward under one metric.
#[must_use]
pub fn shortest_paths(graph: &Graph, dest: NodeId, metric: Metric) -> RoutingTable {
    let mut table = RoutingTable {
        dest,
        next_hop: VecMap::new(),
        cost: VecMap::new(),
    };
    if dest.is_broadcast() {
        return table;
    }
    table.next_hop.insert(dest.index(), dest);
    table.cost.insert(dest.index(), 0);
    if dest.index() >= graph.len() {
        return table;
    }
    let mut settled = vec![false; graph.len()];
    settled[dest.index()] = true;
    let mut heap = BinaryHeap::new();
    for edge in graph.edges(dest) {
        heap.push(Reverse(Frontier {
            cost: metric.weight(edge),
            from: dest,
            to: edge.to,
        }));
    }
    while let Some(Reverse(Frontier { cost, from, to })) = heap.pop() {
        if settled[to.index()] {
            continue;
        }
        settled[to.index()] = true;
        table.next_hop.insert(to.index(), from);
        table.cost.insert(to.index(), cost);
        for edge in graph.edges(to) {
            if !settled[edge.to.index()] {
                heap.push(Reverse(Frontier {
                    cost: cost + metric.weight(edge),
                    from: to,
                    to: edge.to,
                }));
            }
        }
    }
    table
}

/// One packet to put into the simulation before it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Injection {
    Control {
        time: Time,
        target: NodeId,
        msg: String,
    },
    Data {
        time: Time,
        src: NodeId,
        dst: NodeId,
    },
}

impl Injection {
    const fn time(&self) -> Time {
        match self {
            Injection::Control { time, .. } | Injection::Data { time, .. } => *time,
        }
    }
}

// Fixed pre-injection order: by time; control before data; control by
// (target, message), data by (source, destination). Packet ids are
// assigned in this order, so the scheduler's tie-break is reproducible
// independent of how the plan was assembled.
impl Ord for Injection {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time().cmp(&other.time()).then_with(|| {
            match (self, other) {
                (
                    Injection::Control {
                        target: t1, msg: m1, ..
                    },
                    Injection::Control {
                        target: t2, msg: m2, ..
                    },
                ) => t1.cmp(t2).then_with(|| m1.cmp(m2)),
                (Injection::Control { .. }, Injection::Data { .. }) => Ordering::Less,
                (Injection::Data { .. }, Injection::Control { .. }) => Ordering::Greater,
                (
                    Injection::Data {
                        src: s1, dst: d1, ..
                    },
                    Injection::Data {
                        src: s2, dst: d2, ..
                    },
                ) => s1.cmp(s2).then_with(|| d1.cmp(d2)),
            }
        })
    }
}

impl PartialOrd for Injection {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Control updates realizing the routing plan: every node's initial
/// next-hop entries under the old metric at `install`, and at `update`
/// one retargeting entry per (node, destination) whose next hop differs
/// under the new metric. Unreachable nodes get no entry.
#[must_use]
pub fn plan_updates(
    graph: &Graph,
    destinations: &[NodeId],
    node_count: u32,
    install: Time,
    update: Time,
) -> Vec<Injection> {
    let mut updates = Vec::new();
    for &dest in destinations {
        let old = shortest_paths(graph, dest, Metric::Old);
        let new = shortest_paths(graph, dest, Metric::New);
        for id in 0..node_count {
            let v = NodeId::new(id);
            if v == dest {
                continue;
            }
            let old_hop = old.next_hop(v);
            let new_hop = new.next_hop(v);
            if let Some(hop) = old_hop {
                updates.push(Injection::Control {
                    time: install,
                    target: v,
                    msg: format!("{dest} {hop}"),
                });
            }
            if let Some(hop) = new_hop {
                if new_hop != old_hop {
                    updates.push(Injection::Control {
                        time: update,
                        target: v,
                        msg: format!("{dest} {hop}"),
                    });
                }
            }
        }
    }
    updates
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{plan_updates, shortest_paths, Graph, Injection, LinkSpec, Metric};
    use crate::quantities::{NodeId, Time};

    fn link(id: u32, a: u32, b: u32, old: u64, new: u64) -> LinkSpec {
        LinkSpec {
            id,
            a: NodeId::new(a),
            b: NodeId::new(b),
            old_weight: old,
            new_weight: new,
        }
    }

    const INF: u64 = u64::MAX / 2;

    fn brute_costs(n: usize, links: &[LinkSpec], metric: Metric) -> Vec<Vec<u64>> {
        let mut dist = vec![vec![INF; n]; n];
        for (v, row) in dist.iter_mut().enumerate() {
            row[v] = 0;
        }
        for l in links {
            let w = match metric {
                Metric::Old => l.old_weight,
                Metric::New => l.new_weight,
            };
            let (a, b) = (l.a.index(), l.b.index());
            dist[a][b] = dist[a][b].min(w);
            dist[b][a] = dist[b][a].min(w);
        }
        for k in 0..n {
            for i in 0..n {
                for j in 0..n {
                    dist[i][j] = dist[i][j].min(dist[i][k] + dist[k][j]);
                }
            }
        }
        dist
    }

    #[test]
    fn costs_match_brute_force_under_both_metrics() {
        let links = [
            link(0, 0, 1, 2, 9),
            link(1, 1, 2, 3, 1),
            link(2, 0, 2, 7, 1),
            link(3, 2, 3, 1, 4),
            link(4, 1, 3, 8, 2),
            link(5, 4, 3, 5, 5),
        ];
        let n = 6; // node 5 is isolated
        let graph = Graph::from_links(n as u32, &links);
        for metric in [Metric::Old, Metric::New] {
            let brute = brute_costs(n, &links, metric);
            for dest in 0..n as u32 {
                let table = shortest_paths(&graph, NodeId::new(dest), metric);
                for v in 0..n as u32 {
                    let expected = brute[v as usize][dest as usize];
                    let got = table.cost(NodeId::new(v));
                    if expected >= INF {
                        assert_eq!(got, None, "dest {dest} node {v}");
                    } else {
                        assert_eq!(got, Some(expected), "dest {dest} node {v}");
                    }
                }
            }
        }
    }

    #[test]
    fn equal_cost_paths_prefer_the_lower_neighbor_id() {
        // diamond: 0-1-3 and 0-2-3, all weights equal
        let links = [
            link(0, 0, 1, 1, 1),
            link(1, 0, 2, 1, 1),
            link(2, 1, 3, 1, 1),
            link(3, 2, 3, 1, 1),
        ];
        let graph = Graph::from_links(4, &links);
        let table = shortest_paths(&graph, NodeId::new(3), Metric::Old);
        assert_eq!(table.next_hop(NodeId::new(0)), Some(NodeId::new(1)));
        assert_eq!(table.next_hop(NodeId::new(3)), Some(NodeId::new(3)));
    }

    #[test]
    fn no_alternate_path_means_no_diff_events() {
        // line 0-1-2-3; the new metric makes 0-1 very costly, but it is
        // still the only way out of node 0
        let links = [
            link(0, 0, 1, 1, 100),
            link(1, 1, 2, 1, 1),
            link(2, 2, 3, 1, 1),
        ];
        let graph = Graph::from_links(4, &links);
        let plan = plan_updates(
            &graph,
            &[NodeId::new(3)],
            4,
            Time::from_ticks(0),
            Time::from_ticks(50),
        );
        let installs: Vec<_> = plan
            .iter()
            .filter(|i| i.time() == Time::from_ticks(0))
            .collect();
        assert_eq!(installs.len(), 3);
        assert!(plan.iter().all(|i| i.time() == Time::from_ticks(0)));
    }

    #[test]
    fn metric_change_retargets_through_the_alternate_path() {
        // square: 0-1-3 cheap under the old metric, 0-2-3 cheap under
        // the new one
        let links = [
            link(0, 0, 1, 1, 100),
            link(1, 1, 3, 1, 1),
            link(2, 0, 2, 5, 1),
            link(3, 2, 3, 5, 1),
        ];
        let graph = Graph::from_links(4, &links);
        let plan = plan_updates(
            &graph,
            &[NodeId::new(3)],
            4,
            Time::from_ticks(0),
            Time::from_ticks(50),
        );
        let diffs: Vec<_> = plan
            .iter()
            .filter(|i| i.time() == Time::from_ticks(50))
            .collect();
        assert_eq!(
            diffs,
            vec![&Injection::Control {
                time: Time::from_ticks(50),
                target: NodeId::new(0),
                msg: "3 2".to_owned(),
            }]
        );
    }

    #[test]
    fn injections_sort_control_first_then_by_identity() {
        let mut injections = vec![
            Injection::Data {
                time: Time::from_ticks(5),
                src: NodeId::new(2),
                dst: NodeId::new(0),
            },
            Injection::Control {
                time: Time::from_ticks(5),
                target: NodeId::new(1),
                msg: "0 0".to_owned(),
            },
            Injection::Data {
                time: Time::from_ticks(5),
                src: NodeId::new(1),
                dst: NodeId::new(3),
            },
            Injection::Control {
                time: Time::from_ticks(2),
                target: NodeId::new(9),
                msg: "0 0".to_owned(),
            },
        ];
        injections.sort();
        assert_eq!(injections[0].time(), Time::from_ticks(2));
        assert!(matches!(injections[1], Injection::Control { .. }));
        assert!(matches!(injections[2], Injection::Data { .. }));
        assert_eq!(
            injections[2],
            Injection::Data {
                time: Time::from_ticks(5),
                src: NodeId::new(1),
                dst: NodeId::new(3),
            }
        );
    }
}
