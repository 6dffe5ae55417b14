//! Quill module CLI.
//!
//! Commands:
//! - `quill build <entry>` - Resolve every module reachable from an entry file
//! - `quill restore <entry>` - Pull the remote modules an entry file needs
//! - `quill graph <entry>` - Print each module declaration and its target

use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use clap::{Parser, Subcommand};
use quill_common::diagnostics::emit;
use quill_common::{Diagnostic, Label, SourceMap};
use quill_module::{
    FetchError, LoadOutcome, ModuleConfig, ModuleDeclId, ModuleLoader, ResolutionGraph,
};
use termcolor::ColorChoice;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quill")]
#[command(about = "Quill module resolver", long_about = None)]
struct Cli {
    /// Directory restored modules are cached in [env: QUILL_ARTIFACTS]
    #[arg(long, global = true)]
    cache_root: Option<PathBuf>,

    /// Program used to pull OCI artifacts [env: QUILL_ORAS]
    #[arg(long, global = true)]
    oras: Option<PathBuf>,

    /// Log resolution steps (overridden by QUILL_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve all modules and report problems
    Build {
        /// Entry file
        entry: PathBuf,

        /// Do not pull missing remote modules
        #[arg(long)]
        no_restore: bool,
    },

    /// Pull every remote module the entry file needs
    Restore {
        /// Entry file
        entry: PathBuf,
    },

    /// Print the resolved module graph
    Graph {
        /// Entry file
        entry: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = ModuleConfig::from_env();
    if let Some(root) = cli.cache_root {
        config.cache_root = root;
    }
    if let Some(oras) = cli.oras {
        config = config.with_oras_program(oras);
    }
    tracing::debug!(
        cache_root = %config.cache_root.display(),
        oras = %config.oras_program.display(),
        "module configuration"
    );
    let loader = ModuleLoader::from_config(&config);

    let result = match cli.command {
        Commands::Build { entry, no_restore } => cmd_build(&loader, &entry, !no_restore),
        Commands::Restore { entry } => cmd_restore(&loader, &entry),
        Commands::Graph { entry } => cmd_graph(&loader, &entry),
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("error: {:#}", e);
            process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("QUILL_LOG")
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn absolute(path: &Path) -> anyhow::Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("cannot determine the current directory")?;
    Ok(cwd.join(path))
}

/// Resolve all modules; print diagnostics. Returns whether the build is clean.
fn cmd_build(loader: &ModuleLoader, entry: &Path, restore: bool) -> anyhow::Result<bool> {
    let outcome = loader.load(&absolute(entry)?, restore)?;
    let clean = report(&outcome)?;
    if clean {
        println!(
            "{}: {} file(s) resolved",
            outcome.graph.entry_point().display(),
            outcome.graph.file_count()
        );
    }
    Ok(clean)
}

fn cmd_restore(loader: &ModuleLoader, entry: &Path) -> anyhow::Result<bool> {
    let outcome = loader.load(&absolute(entry)?, true)?;
    emit_fetch_errors(&outcome.fetch_errors)?;
    println!("restored {} module(s)", outcome.restored.saturating_sub(outcome.fetch_errors.len()));
    Ok(outcome.fetch_errors.is_empty())
}

fn cmd_graph(loader: &ModuleLoader, entry: &Path) -> anyhow::Result<bool> {
    let graph = loader.build(&absolute(entry)?)?;
    for tree in graph.files() {
        println!("{}", tree.path().display());
        for (index, decl) in tree.module_decls().enumerate() {
            let id = ModuleDeclId::new(tree.path(), index);
            let at = tree.file.line_col(decl.span.start);
            match (graph.resolved_path(&id), graph.failure(&id)) {
                (Some(target), _) => {
                    println!("  {} {} -> {}", at, decl.name.name, target.display())
                }
                (None, Some(failure)) => println!(
                    "  {} {} !! [{}] {}",
                    at,
                    decl.name.name,
                    failure.code(),
                    failure
                ),
                (None, None) => {}
            }
        }
    }
    Ok(!graph.has_failures())
}

/// Emit parse errors, module failures, and fetch errors. Returns whether
/// there were none.
fn report(outcome: &LoadOutcome) -> anyhow::Result<bool> {
    let (map, diagnostics) = graph_diagnostics(&outcome.graph);
    emit(&map, &diagnostics, ColorChoice::Auto).context("failed to render diagnostics")?;
    emit_fetch_errors(&outcome.fetch_errors)?;
    Ok(diagnostics.is_empty() && outcome.fetch_errors.is_empty())
}

fn graph_diagnostics(graph: &ResolutionGraph) -> (SourceMap, Vec<Diagnostic>) {
    let mut map = SourceMap::new();
    let mut diagnostics = Vec::new();

    for tree in graph.files() {
        let file = map.add(tree.file.clone());
        for error in &tree.program.errors {
            diagnostics.push(
                Diagnostic::error()
                    .with_message(&error.message)
                    .with_labels(vec![Label::primary(file, error.span.range())]),
            );
        }
        for (index, decl) in tree.module_decls().enumerate() {
            let id = ModuleDeclId::new(tree.path(), index);
            if let Some(failure) = graph.failure(&id) {
                diagnostics.push(failure.to_diagnostic(file, decl.reference.span));
            }
        }
    }

    (map, diagnostics)
}

fn emit_fetch_errors(errors: &[FetchError]) -> anyhow::Result<()> {
    if errors.is_empty() {
        return Ok(());
    }
    let diagnostics: Vec<Diagnostic> = errors
        .iter()
        .map(|e| Diagnostic::error().with_message(e.to_string()))
        .collect();
    emit(&SourceMap::new(), &diagnostics, ColorChoice::Auto)
        .context("failed to render diagnostics")
}
