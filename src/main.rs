//! # Knowledge Compiler CLI (`kc`)
//!
//! Compiles a directory of heterogeneous files into a single structured
//! JSON or Markdown artifact.
//!
//! ## Usage
//!
//! ```bash
//! kc --config ./kc.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kc compile` | Scan, extract, aggregate, and write the artifact |
//! | `kc scan` | Dry run: list what would be compiled, per bucket |

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use knowledge_compiler::config::{self, Config};
use knowledge_compiler::models::ContentType;
use knowledge_compiler::{export, organize, scan};

/// Knowledge Compiler — fold a directory tree into one chunked artifact.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file; `--root` overrides the source directory without one.
#[derive(Parser)]
#[command(
    name = "kc",
    about = "Compiles a directory of heterogeneous files into a single knowledge artifact",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./kc.toml")]
    config: PathBuf,

    /// Source root override; used instead of the config file when set.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile the source tree into the output artifact.
    ///
    /// Scans the source root, extracts every supported file (expanding zip
    /// archives in place), aggregates the results into content-type
    /// buckets with bounded chunks, and writes the artifact.
    Compile {
        /// Write the artifact to this exact path instead of a timestamped
        /// file in the configured output directory.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Artifact format override: `json` or `markdown`.
        #[arg(long)]
        format: Option<String>,
    },

    /// Dry run: scan the source tree and report what would be compiled.
    Scan,
}

fn main() {
    init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = match &cli.root {
        Some(root) => Config::for_root(root.clone()),
        None => config::load_config(&cli.config)?,
    };

    match cli.command {
        Commands::Compile { output, format } => {
            if let Some(format) = format {
                match format.as_str() {
                    "json" | "markdown" => cfg.output.format = format,
                    other => anyhow::bail!("Unknown format: '{}'. Must be json or markdown.", other),
                }
            }

            let results = scan::scan(&cfg)?;
            let store = organize::aggregate(&results, &cfg.chunking);
            let path = export::write_artifact(&store, &cfg, output.as_deref())?;

            let artifact_size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            println!("compile {}", cfg.source.root.display());
            println!("  files processed: {}", results.len());
            println!("  items stored: {}", store.metadata.len());
            println!("  artifact: {} ({} bytes)", path.display(), artifact_size);
            println!("ok");
        }
        Commands::Scan => {
            let results = scan::scan(&cfg)?;
            println!("scan {} (dry-run)", cfg.source.root.display());
            println!("  files found: {}", results.len());
            for ty in ContentType::ALL {
                let count = results.iter().filter(|r| r.content_type == ty).count();
                if count > 0 {
                    println!("  {:<10} {}", ty, count);
                }
            }
        }
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
