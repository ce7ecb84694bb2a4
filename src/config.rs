//! Scenario description: everything a run consumes, as produced by the
//! external input layer. Loadable as JSON via [`crate::Config`], or
//! parsed from the whitespace text format:
//!
//! ```text
//! <nodes> <destinations> <links>
//! <install-time> <update-time> <end-time>
//! <destination-id> ...
//! <link-id> <a> <b> <old-weight> <new-weight>   (one per link)
//! <time> <src> <dst>                            (data requests, until EOF)
//! ```

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    logging::{Logger, TraceSink},
    packet, protocol,
    quantities::{NodeId, Time},
    routing::{self, Graph, Injection, LinkSpec},
    simulation::Simulation,
    switch,
    topology::{self, SIMPLE_LINK},
};

/// An externally requested data-packet injection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrafficRequest {
    pub time: Time,
    pub src: NodeId,
    pub dst: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub nodes: u32,
    pub destinations: Vec<NodeId>,
    pub links: Vec<LinkSpec>,
    pub install_time: Time,
    pub update_time: Time,
    pub end_time: Time,
    pub traffic: Vec<TrafficRequest>,
}

struct Tokens<'a> {
    iter: std::str::SplitWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    fn next(&mut self, what: &str) -> Result<&'a str> {
        self.iter
            .next()
            .ok_or_else(|| anyhow!("missing {what} in scenario input"))
    }

    fn next_u32(&mut self, what: &str) -> Result<u32> {
        self.next(what)?.parse().with_context(|| format!("bad {what}"))
    }

    fn next_u64(&mut self, what: &str) -> Result<u64> {
        self.next(what)?.parse().with_context(|| format!("bad {what}"))
    }
}

impl Scenario {
    /// Parses the whitespace text format of the original homework input.
    pub fn parse(text: &str) -> Result<Scenario> {
        let mut tokens = Tokens {
            iter: text.split_whitespace(),
        };
        let nodes = tokens.next_u32("node count")?;
        let destination_count = tokens.next_u32("destination count")?;
        let link_count = tokens.next_u32("link count")?;
        let install_time = Time::from_ticks(tokens.next_u64("install time")?);
        let update_time = Time::from_ticks(tokens.next_u64("update time")?);
        let end_time = Time::from_ticks(tokens.next_u64("end time")?);
        let destinations = (0..destination_count)
            .map(|_| tokens.next_u32("destination id").map(NodeId::new))
            .collect::<Result<_>>()?;
        let links = (0..link_count)
            .map(|_| {
                Ok(LinkSpec {
                    id: tokens.next_u32("link id")?,
                    a: NodeId::new(tokens.next_u32("link endpoint")?),
                    b: NodeId::new(tokens.next_u32("link endpoint")?),
                    old_weight: tokens.next_u64("old weight")?,
                    new_weight: tokens.next_u64("new weight")?,
                })
            })
            .collect::<Result<_>>()?;
        let mut traffic = Vec::new();
        while let Some(t) = tokens.iter.next() {
            let time = Time::from_ticks(t.parse().context("bad traffic time")?);
            let src = NodeId::new(tokens.next_u32("traffic source")?);
            let dst = NodeId::new(tokens.next_u32("traffic destination")?);
            traffic.push(TrafficRequest { time, src, dst });
        }
        Ok(Scenario {
            nodes,
            destinations,
            links,
            install_time,
            update_time,
            end_time,
            traffic,
        })
    }

    /// Assembles a ready-to-run simulation: standard kinds registered,
    /// topology built, routing plan computed and every initial packet
    /// injected in the fixed deterministic order. Configuration problems
    /// are logged and skipped, never fatal.
    #[must_use]
    pub fn build(&self, logger: Box<dyn Logger>, trace: Box<dyn TraceSink>) -> Simulation {
        let mut sim = Simulation::new(self.end_time, logger, trace);
        packet::register(sim.kinds_mut());
        topology::register(sim.kinds_mut());
        protocol::register(sim.kinds_mut());
        switch::register(sim.kinds_mut());

        for id in 0..self.nodes {
            if let Err(e) = sim.create_node(switch::SWITCH, NodeId::new(id)) {
                sim.log(&format!("scenario: {e}"));
            }
        }
        for link in &self.links {
            for (from, to) in [(link.a, link.b), (link.b, link.a)] {
                if let Err(e) = sim.connect(from, to, SIMPLE_LINK) {
                    sim.log(&format!("scenario: {e}"));
                }
            }
        }

        let graph = Graph::from_links(self.nodes, &self.links);
        let mut injections = routing::plan_updates(
            &graph,
            &self.destinations,
            self.nodes,
            self.install_time,
            self.update_time,
        );
        injections.extend(self.traffic.iter().map(|t| Injection::Data {
            time: t.time,
            src: t.src,
            dst: t.dst,
        }));
        injections.sort();

        for injection in injections {
            let outcome = match &injection {
                Injection::Control { time, target, msg } => {
                    protocol::inject_control(&mut sim, *time, *target, msg)
                }
                Injection::Data { time, src, dst } => {
                    protocol::inject_data(&mut sim, *time, *src, *dst, "default")
                }
            };
            if let Err(e) = outcome {
                sim.log(&format!("scenario: {e}"));
            }
        }
        sim
    }
}
