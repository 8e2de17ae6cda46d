//! A command line interface for the regraph typed graph rewriting engine.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use regraph_core::{Hierarchy, Rule, Value};

#[derive(Parser, Debug)]
#[command(name = "regraph")]
struct Options {
    /// Path to a hierarchy JSON document.
    #[arg(short = 'p', long = "hierarchy")]
    hierarchy: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a summary of the hierarchy's graphs, rules, and typings.
    Describe,
    /// List the ids of every graph node.
    Graphs,
    /// List the ids of every rule node.
    Rules,
    /// Print the composed type of one node, under every outgoing typing.
    NodeType { graph: String, node: String },
    /// Print every ancestor reachable from a graph via typing edges.
    Ancestors { graph: String },
    /// Find all matches of a pattern graph (loaded from its own JSON file,
    /// in the `{"nodes": [...], "edges": [...]}` shape) inside a graph.
    Match { graph: String, pattern: PathBuf },
    /// Apply a rule-authoring script to the identity rule of a pattern
    /// graph at `instance` inside `graph`, write the rewritten hierarchy.
    Rewrite {
        graph: String,
        pattern: PathBuf,
        #[arg(long)]
        script: String,
        #[arg(long)]
        instance: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
}

fn parse_value(token: &str) -> Value {
    if let Ok(i) = token.parse::<i64>() {
        return Value::Int(i);
    }
    match token {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::Str(token.to_string()),
    }
}

fn main() -> Result<(), regraph_core::Error> {
    env_logger::init();
    let opt = Options::parse();
    let mut hierarchy = Hierarchy::load(&opt.hierarchy)?;

    match opt.command {
        Command::Describe => {
            print!("{hierarchy}");
        }
        Command::Graphs => {
            for id in hierarchy.node_ids() {
                println!("{id}");
            }
        }
        Command::Rules => {
            for id in hierarchy.rule_ids() {
                println!("{id}");
            }
        }
        Command::NodeType { graph, node } => {
            let types = hierarchy.node_type(&parse_value(&graph), &parse_value(&node))?;
            for t in types {
                println!("{t}");
            }
        }
        Command::Ancestors { graph } => {
            let ancestors = hierarchy.get_ancestors(&parse_value(&graph))?;
            for (id, mapping) in ancestors {
                log::debug!("ancestor {id} reached via {} node mappings", mapping.len());
                println!("{id}");
            }
        }
        Command::Match { graph, pattern } => {
            let pattern_graph = load_pattern(&pattern)?;
            let matches = hierarchy.find_matching(&parse_value(&graph), &pattern_graph, None)?;
            for (i, m) in matches.iter().enumerate() {
                println!("match {i}:");
                for (p, g) in m {
                    println!("  {p} -> {g}");
                }
            }
        }
        Command::Rewrite { graph, pattern, script, instance, out } => {
            let pattern_graph = load_pattern(&pattern)?;
            let instance_map = load_mapping(&instance)?;
            let rule = Rule::from_transform(&pattern_graph, Some(&script))?;
            log::info!("rewriting {graph} with a rule removing {} node(s)", rule.removed_nodes().len());

            hierarchy.rewrite(&parse_value(&graph), &instance_map, &rule, &BTreeMap::new(), &BTreeMap::new())?;
            hierarchy.export(&out)?;
        }
    }

    Ok(())
}

fn load_pattern(path: &PathBuf) -> Result<regraph_core::Graph, regraph_core::Error> {
    let text = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&text)?;
    let mut g = regraph_core::Graph::new(true);
    for n in value["nodes"].as_array().into_iter().flatten() {
        let id = parse_value(n["id"].as_str().unwrap_or_default());
        g.add_node(id, regraph_core::AttrBag::new());
    }
    for e in value["edges"].as_array().into_iter().flatten() {
        let from = parse_value(e["from"].as_str().unwrap_or_default());
        let to = parse_value(e["to"].as_str().unwrap_or_default());
        g.add_edge(from, to, regraph_core::AttrBag::new());
    }
    Ok(g)
}

fn load_mapping(path: &PathBuf) -> Result<regraph_core::Mapping, regraph_core::Error> {
    let text = std::fs::read_to_string(path)?;
    let raw: BTreeMap<String, String> = serde_json::from_str(&text)?;
    Ok(raw.into_iter().map(|(k, v)| (parse_value(&k), parse_value(&v))).collect())
}
