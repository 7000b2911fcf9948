// SPDX-License-Identifier: MIT OR Apache-2.0
//! `ignis` - blueprint command line
//!
//! - `generate`: compile a RON graph document to a Unity C# component
//! - `run`: interpret a graph from its event nodes, printing side effects
//! - `nodes`: list the built-in node library

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ignis_blueprint::interpreter::SuspendReason;
use ignis_blueprint::{
    create_builtin_registry, generate, Graph, Interpreter, NodeCategory, RecordingHost, RunOutcome, RunState,
};
use ignis_editor::settings::SETTINGS_FILE_NAME;
use ignis_editor::{logging, EditorSettings, GraphStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "ignis", version, about = "Ignis blueprint tools")]
struct Cli {
    /// Settings file
    #[arg(long, global = true, default_value = SETTINGS_FILE_NAME)]
    settings: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a C# MonoBehaviour from a graph
    Generate {
        /// Graph document (RON)
        graph: PathBuf,
        /// Class name, defaults to the settings value
        #[arg(long)]
        class: Option<String>,
        /// Output file, stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Interpret a graph from every event node of one type
    Run {
        /// Graph document (RON)
        graph: PathBuf,
        /// Event node type to start from
        #[arg(long, default_value = "Start")]
        event: String,
    },
    /// List node types
    Nodes {
        /// Filter by text
        #[arg(long)]
        search: Option<String>,
        /// Filter by category
        #[arg(long)]
        category: Option<NodeCategory>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = EditorSettings::load(&cli.settings)
        .with_context(|| format!("loading settings from {}", cli.settings.display()))?;
    logging::init(&settings.logging.filter);

    tracing::debug!("Starting ignis v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Generate { graph, class, out } => generate_command(&settings, &graph, class, out),
        Command::Run { graph, event } => run_command(&settings, &graph, &event).await,
        Command::Nodes { search, category } => {
            nodes_command(search.as_deref(), category);
            Ok(())
        }
    }
}

/// Load a graph document and validate it through the store
fn load_graph(store: &GraphStore, path: &Path) -> Result<Arc<Graph>> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let graph: Graph = ron::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
    let graph_id = store
        .import_graph(graph)
        .with_context(|| format!("validating {}", path.display()))?;
    store
        .graph(graph_id)
        .context("imported graph missing from store")
}

fn store(settings: &EditorSettings) -> GraphStore {
    GraphStore::with_history_depth(Arc::new(create_builtin_registry()), settings.history.max_depth)
}

fn generate_command(settings: &EditorSettings, path: &Path, class: Option<String>, out: Option<PathBuf>) -> Result<()> {
    let store = store(settings);
    let graph = load_graph(&store, path)?;
    let class_name = class.unwrap_or_else(|| settings.codegen.default_class_name.clone());

    let source = generate(&graph, store.registry(), &class_name)?;
    match out {
        Some(out) => {
            std::fs::write(&out, &source).with_context(|| format!("writing {}", out.display()))?;
            tracing::info!(path = %out.display(), bytes = source.len(), "C# written");
        }
        None => print!("{source}"),
    }
    Ok(())
}

async fn run_command(settings: &EditorSettings, path: &Path, event: &str) -> Result<()> {
    let store = store(settings);
    let graph = load_graph(&store, path)?;
    let interpreter = Interpreter::with_config(store.registry(), settings.interpreter.config());

    let entries: Vec<_> = graph.event_nodes().filter(|n| n.node_type == event).map(|n| n.id).collect();
    if entries.is_empty() {
        bail!("graph has no {event} event node");
    }

    let mut failed = false;
    for entry in entries {
        let mut host = RecordingHost::default();
        let mut run = interpreter.start(graph.clone(), entry)?;
        interpreter.run_to_end(&mut run, &mut host);

        // Wait out delays so the dry run shows the whole chain
        while let RunState::Suspended {
            reason: SuspendReason::Delay { seconds },
            ..
        } = *run.state()
        {
            tokio::time::sleep(Duration::from_secs_f64(seconds.max(0.0))).await;
            interpreter.resume(&mut run, &mut host);
        }

        for line in &host.printed {
            println!("{line}");
        }
        for message in &host.emitted {
            println!("{}", serde_json::to_string(message)?);
        }
        if let RunState::Terminated(outcome) = run.state() {
            if *outcome != RunOutcome::Completed {
                eprintln!("run from {entry} ended: {outcome:?}");
                failed = true;
            }
        }
    }

    if failed {
        bail!("one or more runs failed");
    }
    Ok(())
}

fn nodes_command(search: Option<&str>, category: Option<NodeCategory>) {
    let registry = create_builtin_registry();
    for definition in registry.search(search.unwrap_or_default()) {
        if category.is_some_and(|c| c != definition.category) {
            continue;
        }
        println!(
            "{:<18} {:<10} {}",
            definition.node_type,
            definition.category.name(),
            definition.description
        );
    }
}
