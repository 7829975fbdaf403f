//! Pattern Detector CLI
//!
//! Runs pattern templates against a system class model and reports solutions
//! with the per-entity feedback.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pattern_detector::graph::{load_patterns, load_system};
use pattern_detector::{detect_all, DetectorConfig, FeedbackCategory};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pattern-detect")]
#[command(about = "Detect design patterns in class-model graphs")]
struct Cli {
    /// Config file layered over the default locations
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match pattern templates against a system graph
    Match {
        /// System graph definition (JSON)
        #[arg(short, long)]
        system: PathBuf,
        /// Pattern file or directory of pattern files
        #[arg(short, long)]
        pattern: PathBuf,
        /// Report every mapping instead of the deduplicated view
        #[arg(long)]
        all: bool,
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Load and validate pattern templates without matching
    Check {
        /// Pattern file or directory of pattern files
        #[arg(short, long)]
        pattern: PathBuf,
    },

    /// Export a system graph in GraphViz DOT format
    Dot {
        /// System graph definition (JSON)
        #[arg(short, long)]
        system: PathBuf,
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_ref().map(|p| p.to_string_lossy().into_owned());
    let config = DetectorConfig::load_from(config_path.as_deref()).context("Failed to load configuration")?;
    config.validate().context("Invalid rule in configuration")?;

    match cli.command {
        Commands::Match {
            system,
            pattern,
            all,
            json,
        } => {
            let system_graph = load_system(&system)
                .with_context(|| format!("Failed to load system graph {}", system.display()))?;
            let patterns = load_patterns(&pattern, &config.rules.extra)
                .with_context(|| format!("Failed to load patterns from {}", pattern.display()))?;

            let mut options = config.search_options();
            if all {
                options.deduplicate = false;
            }

            let results = detect_all(&system_graph, &patterns, options).context("Pattern search failed")?;

            if json {
                let report: serde_json::Map<String, serde_json::Value> = results
                    .iter()
                    .map(|(name, result)| Ok((name.clone(), serde_json::to_value(result)?)))
                    .collect::<Result<_, serde_json::Error>>()?;
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }

            for (name, result) in &results {
                println!("🔍 {} against {}", name, system_graph.name);
                if result.is_empty() {
                    println!("  ❌ no instance found");
                } else {
                    println!("  ✅ {} instance(s)", result.len());
                    for solution in &result.solutions {
                        for line in solution.to_string().lines() {
                            println!("    {}", line);
                        }
                    }
                }
                println!(
                    "  {} match, {} mismatch, {} not analysed",
                    result.feedback.count(FeedbackCategory::Match),
                    result.feedback.count(FeedbackCategory::Mismatch),
                    result.feedback.entities_with(FeedbackCategory::NotAnalysed).len()
                );
                println!();
                print!("{}", result.feedback);
                println!();
            }
            Ok(())
        }

        Commands::Check { pattern } => {
            let patterns = load_patterns(&pattern, &config.rules.extra)
                .with_context(|| format!("Invalid pattern template in {}", pattern.display()))?;
            for template in &patterns {
                println!(
                    "✅ {} ({}) - {} nodes, {} relations, {} node rules, {} relation rules",
                    template.name,
                    template.family,
                    template.graph().node_count(),
                    template.graph().relation_count(),
                    template.node_comparator().len(),
                    template.relation_comparator().len()
                );
            }
            Ok(())
        }

        Commands::Dot { system, output } => {
            let system_graph = load_system(&system)
                .with_context(|| format!("Failed to load system graph {}", system.display()))?;
            let dot = system_graph.graph().to_dot(&system_graph.name);
            match output {
                Some(path) => {
                    std::fs::write(&path, dot)?;
                    println!("✅ Wrote {}", path.display());
                }
                None => print!("{}", dot),
            }
            Ok(())
        }
    }
}
