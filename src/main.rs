use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use itertools::Itertools;

use sdnsim::{
    config::Scenario,
    logging::{PrintLogger, PrintTrace},
    quantities::NodeId,
    routing::{shortest_paths, Graph, Metric},
    Config,
};

#[derive(ValueEnum, Clone, Copy, Debug)]
enum MetricArg {
    Old,
    New,
}

impl From<MetricArg> for Metric {
    fn from(arg: MetricArg) -> Metric {
        match arg {
            MetricArg::Old => Metric::Old,
            MetricArg::New => Metric::New,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Simulate a scenario and print the event trace
    Run {
        /// Scenario file (.json, or the whitespace text format)
        input: PathBuf,
    },
    /// Print the per-destination routing tables without simulating
    Plan {
        /// Scenario file (.json, or the whitespace text format)
        input: PathBuf,

        /// Which link metric to route on
        #[arg(long, value_enum, default_value_t = MetricArg::Old)]
        metric: MetricArg,
    },
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Deterministic discrete-event simulator for a small software-defined network.", long_about = None)]
struct Args {
    #[command(subcommand)]
    pub command: Command,
}

fn load_scenario(path: &PathBuf) -> Result<Scenario> {
    if Scenario::valid_path(path) {
        Scenario::load(path)
    } else {
        let text = fs::read_to_string(path)
            .with_context(|| format!("could not read scenario {}", path.display()))?;
        Scenario::parse(&text)
    }
}

fn run(path: &PathBuf) -> Result<()> {
    let scenario = load_scenario(path)?;
    let mut sim = scenario.build(
        Box::new(PrintLogger::new("sdnsim".to_owned())),
        Box::new(PrintTrace),
    );
    sim.run()?;
    Ok(())
}

fn plan(path: &PathBuf, metric: Metric) -> Result<()> {
    let scenario = load_scenario(path)?;
    let graph = Graph::from_links(scenario.nodes, &scenario.links);
    for &dest in &scenario.destinations {
        let table = shortest_paths(&graph, dest, metric);
        let entries = (0..scenario.nodes)
            .map(NodeId::new)
            .filter_map(|v| table.next_hop(v).map(|hop| format!("{v}->{hop}")))
            .join("  ");
        println!("dest {dest}: {entries}");
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    match args.command {
        Command::Run { input } => run(&input),
        Command::Plan { input, metric } => plan(&input, metric.into()),
    }
}
