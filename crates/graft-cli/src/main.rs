//! Graft CLI - run user scripts over CSV rows

mod config;
mod logging;
mod run;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use config::{Config, OnError};
use logging::{Verbosity, init_logging};
use rhi_graft_core::{EngineOptions, RowBuffer, ScriptEngine, TransformerKind};
use rhi_graft_rhai::RhaiEngine;
use run::{LoadedJob, RunOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "graft")]
#[command(about = "Run user scripts over tabular data", long_about = None)]
struct Cli {
    /// Verbose output (show debug info)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet output (only errors)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to config file (default: ~/.config/graft/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List transformer kinds
    List,

    /// Print the output columns of a job
    Columns {
        /// Job file (YAML, TOML, or JSON)
        job: PathBuf,
    },

    /// Compile and load a job's script without processing rows
    Check {
        /// Job file (YAML, TOML, or JSON)
        job: PathBuf,
    },

    /// Print the example script of a transformer kind
    ShowDefault {
        /// simple, standard or advanced
        kind: TransformerKind,
    },

    /// Run a job over CSV rows
    Run {
        /// Job file (YAML, TOML, or JSON)
        job: PathBuf,
        /// Input CSV (overrides the job's source)
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Output CSV (overrides the job's sink; default stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Worker threads (requires the `parallel` feature)
        #[arg(long)]
        threads: Option<usize>,
        /// What to do when a record fails
        #[arg(long, value_enum)]
        on_error: Option<OnError>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Generate man page
    Manpage,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };
    let (config, config_error) = match config {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    // Config defaults, CLI flags override
    let verbose = cli.verbose || config.defaults.verbose;
    let quiet = cli.quiet || config.defaults.quiet;
    let verbosity = Verbosity::from_flags(verbose, quiet);
    init_logging(verbosity)?;

    if let Some(e) = config_error {
        tracing::warn!("{e:#}; using default settings");
    }

    let engine = config.engine.as_ref();
    match cli.command {
        Commands::List => cmd_list(),
        Commands::Columns { job } => cmd_columns(&job, engine),
        Commands::Check { job } => cmd_check(&job, engine, verbosity),
        Commands::ShowDefault { kind } => cmd_show_default(kind),
        Commands::Run {
            job,
            input,
            output,
            threads,
            on_error,
        } => {
            let options = RunOptions {
                input,
                output,
                threads: threads.or(config.defaults.threads).unwrap_or(1),
                on_error: on_error.or(config.defaults.on_error).unwrap_or_default(),
            };
            let loaded = LoadedJob::load(&job)?;
            run::run(&loaded, engine, &options, verbosity).map(|_| ())
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "graft", &mut std::io::stdout());
            Ok(())
        }
        Commands::Manpage => {
            let cmd = Cli::command();
            let man = clap_mangen::Man::new(cmd);
            man.render(&mut std::io::stdout())?;
            Ok(())
        }
    }
}

fn cmd_list() -> Result<()> {
    println!("Transformer kinds:\n");
    for kind in TransformerKind::ALL {
        println!("  {} ({})", kind.id(), kind.name());
        println!("    {}", kind.description());
    }
    Ok(())
}

fn cmd_columns(job: &Path, engine: Option<&EngineOptions>) -> Result<()> {
    let loaded = LoadedJob::load(job)?;
    let transformer = loaded.transformer(engine, Arc::new(RowBuffer::new()));
    for column in transformer.output_columns() {
        println!("{column}");
    }
    Ok(())
}

fn cmd_check(job: &Path, engine: Option<&EngineOptions>, v: Verbosity) -> Result<()> {
    let loaded = LoadedJob::load(job)?;
    let mut transformer = loaded.transformer(engine, Arc::new(RowBuffer::new()));

    transformer
        .initialize()
        .with_context(|| format!("{} failed to load", job.display()))?;
    transformer
        .close()
        .with_context(|| format!("{} failed to close", job.display()))?;

    v.info(&format!("{}: ok ({})", job.display(), loaded.job.transformer.kind()));
    Ok(())
}

fn cmd_show_default(kind: TransformerKind) -> Result<()> {
    let source = RhaiEngine::new()
        .default_source(kind)
        .with_context(|| format!("no example script for {kind}"))?;
    print!("{source}");
    Ok(())
}
