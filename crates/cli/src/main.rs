mod config;
mod detectors;
mod mach;

use std::env;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mozdep::{vocab, KnowledgeGraph};
use mozdep_knowledge::{dependency_rows, detect_components, write_csv, DependencyRow};
use tracing::{info, warn};

use config::{Config, DetectorContext, REPO_ENV};
use mach::MachClassifier;

#[derive(Parser)]
#[command(name = "mozdep", version, about = "Find third-party dependencies in a Firefox source tree")]
struct Cli {
    /// Log at debug level (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    debug: bool,

    /// Source tree to scan.
    #[arg(short, long, global = true)]
    repo: Option<PathBuf>,

    /// Config file (default: ./mozdep.toml if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run detectors over the tree and report what they found.
    Detect {
        /// Write the CSV report here.
        #[arg(short, long)]
        csv: Option<PathBuf>,
        /// Save the knowledge graph as JSON here.
        #[arg(long)]
        dump: Option<PathBuf>,
        /// Only run this detector (repeatable).
        #[arg(short = 'D', long = "detector")]
        detectors: Vec<String>,
        /// Skip the `mach file-info` component pass.
        #[arg(long)]
        no_components: bool,
    },
    /// Report on a previously saved graph.
    Report {
        #[arg(long)]
        graph: PathBuf,
        /// Output file (default: stdout).
        #[arg(long)]
        csv: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Format::Csv)]
        format: Format,
    },
    /// List available detectors, highest priority first.
    Detectors,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Csv,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match cli.command {
        Commands::Detect {
            csv,
            dump,
            detectors,
            no_components,
        } => {
            let config = Config::load(cli.config.as_deref())?;
            let home = env::var_os("HOME").map(PathBuf::from);
            let Some(tree) =
                config.resolve_repo(cli.repo.as_deref(), env::var_os(REPO_ENV), home.as_deref())
            else {
                bail!("no source tree found; pass --repo or set {REPO_ENV}");
            };
            info!(tree = %tree.display(), "scanning");
            let choice = if detectors.is_empty() {
                config.detectors.clone()
            } else {
                detectors
            };
            let ctx = DetectorContext::new(tree, config);
            let graph = detect(&ctx, &choice, !no_components)?;

            if let Some(path) = &dump {
                graph
                    .save(path)
                    .with_context(|| format!("failed to save graph to {}", path.display()))?;
                info!(path = %path.display(), "graph saved");
            }
            let rows = dependency_rows(&graph);
            match (&csv, &dump) {
                (Some(path), _) => emit(&rows, Format::Csv, Some(path))?,
                (None, None) => emit(&rows, Format::Csv, None)?,
                (None, Some(_)) => {}
            }
        }
        Commands::Report { graph, csv, format } => {
            let g = KnowledgeGraph::open(&graph)
                .with_context(|| format!("failed to load graph from {}", graph.display()))?;
            emit(&dependency_rows(&g), format, csv.as_deref())?;
        }
        Commands::Detectors => {
            for d in detectors::registry() {
                println!("{}\t{}", d.name(), d.priority());
            }
        }
    }
    Ok(())
}

fn init_logging(debug: bool) {
    let fallback = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback)),
        )
        .with_writer(io::stderr)
        .init();
}

fn detect(ctx: &DetectorContext, choice: &[String], components: bool) -> Result<KnowledgeGraph> {
    let mut graph = KnowledgeGraph::new();
    let ran = detectors::run_all(ctx, &mut graph, choice)?;
    let files = graph.relations(Some(&vocab::FILE_PATH)).count();
    let dependencies = graph.v().has(&vocab::DEP_NAME).count();
    info!(detectors = ran, dependencies, files, "detection finished");

    if components {
        let mach = ctx.mach();
        if mach.is_file() {
            let classifier = MachClassifier::new(mach, ctx.tree.clone());
            detect_components(&mut graph, &classifier, ctx.config.chunk_size)
                .context("component detection failed")?;
        } else {
            warn!(mach = %mach.display(), "no mach found; skipping component detection");
        }
    }
    Ok(graph)
}

fn emit(rows: &[DependencyRow], format: Format, path: Option<&Path>) -> Result<()> {
    let out: Box<dyn Write> = match path {
        Some(p) => Box::new(
            File::create(p).with_context(|| format!("failed to create {}", p.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    let mut out = BufWriter::new(out);
    match format {
        Format::Csv => write_csv(&mut out, rows)?,
        Format::Json => {
            serde_json::to_writer_pretty(&mut out, rows)?;
            writeln!(out)?;
        }
    }
    out.flush()?;
    if let Some(p) = path {
        info!(rows = rows.len(), path = %p.display(), "report written");
    }
    Ok(())
}
