use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use statsjob::catalog::DocumentCatalog;
use statsjob::compare::compare;
use statsjob::plan::{OutputAction, Plan, TileIndex};
use statsjob::registry::{FuseRegistry, StatisticRegistry};
use statsjob::spec::{self, KeyPolicy, LoadOptions, Validated, ValidationContext};

use anyhow::Context;

pub type Result<T> = anyhow::Result<T>;

#[derive(Parser)]
#[command(name = "statsjob")]
#[command(about = "Validate and plan temporal statistics jobs", long_about = None)]
struct Cli {
    /// Product definition documents used to resolve sources and masks.
    #[arg(long = "catalog", global = true)]
    catalog: Vec<PathBuf>,

    /// Ignore unknown top-level keys instead of rejecting them.
    #[arg(long, global = true)]
    lenient: bool,

    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate a job document.
    Check { job: PathBuf },

    /// List the time windows a job iterates over.
    Windows { job: PathBuf },

    /// Render every unit's output path for the given tiles.
    Plan {
        job: PathBuf,

        /// Tile index as X,Y; repeatable.
        #[arg(long = "tile", required = true, allow_hyphen_values = true)]
        tiles: Vec<TileIndex>,

        #[arg(short = 'o', long)]
        out: Option<PathBuf>,
    },

    /// Report safe and unsafe changes between two versions of a job.
    Compare {
        old: PathBuf,
        new: PathBuf,

        #[arg(long)]
        allow_unsafe: bool,
    },

    /// Print the job with every default made explicit.
    Normalize { job: PathBuf },
}

struct Session {
    catalog: DocumentCatalog,
    statistics: StatisticRegistry,
    fusers: FuseRegistry,
    options: LoadOptions,
}

impl Session {
    fn load(&self, path: &Path) -> Result<Validated> {
        let ctx = ValidationContext {
            catalog: &self.catalog,
            statistics: &self.statistics,
            fusers: &self.fusers,
        };
        // Warnings are already logged by validation.
        spec::load_file(path, self.options, ctx)
            .with_context(|| format!("invalid job document {}", path.display()))
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let session = Session {
        catalog: DocumentCatalog::load_files(cli.catalog.as_slice()).context("load catalog")?,
        statistics: StatisticRegistry::builtin(),
        fusers: FuseRegistry::builtin(),
        options: LoadOptions {
            key_policy: if cli.lenient {
                KeyPolicy::Lenient
            } else {
                KeyPolicy::Strict
            },
        },
    };

    match cli.cmd {
        Commands::Check { job } => {
            let validated = session.load(&job)?;
            let windows = validated.job.date_ranges.windows().count();
            println!(
                "OK {}: {} sources, {} output products, {} windows",
                job.display(),
                validated.job.sources.len(),
                validated.job.output_products.len(),
                windows
            );
        }
        Commands::Windows { job } => {
            let validated = session.load(&job)?;
            for w in validated.job.date_ranges.windows() {
                let marker = if w.partial { " partial" } else { "" };
                println!("{} {}{}", w.start, w.end, marker);
            }
        }
        Commands::Plan { job, tiles, out } => {
            let validated = session.load(&job)?;
            let plan = Plan::build(&validated.job, &session.statistics, &tiles)?;
            let json = serde_json::to_string_pretty(&plan)?;
            match out {
                Some(out) => {
                    std::fs::write(&out, json)
                        .with_context(|| format!("write plan {}", out.display()))?;
                    println!(
                        "Wrote {} ({} write, {} overwrite, {} skip)",
                        out.display(),
                        plan.count(OutputAction::Write),
                        plan.count(OutputAction::Overwrite),
                        plan.count(OutputAction::Skip)
                    );
                }
                None => println!("{}", json),
            }
        }
        Commands::Compare {
            old,
            new,
            allow_unsafe,
        } => {
            let old_job = session.load(&old)?.job;
            let new_job = session.load(&new)?.job;
            let cmp = compare(&old_job, &new_job);
            for c in &cmp.changes {
                println!("{:?} {}: {} -> {}", c.safety, c.field, c.old, c.new);
            }
            let unsafe_count = cmp.unsafe_changes().count();
            let safe_count = cmp.safe_changes().count();
            if cmp.can_update(allow_unsafe) {
                println!(
                    "Can update {}: {} unsafe changes, {} safe changes",
                    new.display(),
                    unsafe_count,
                    safe_count
                );
            } else {
                anyhow::bail!(
                    "Cannot update {}: {} unsafe changes, {} safe changes",
                    new.display(),
                    unsafe_count,
                    safe_count
                );
            }
        }
        Commands::Normalize { job } => {
            let validated = session.load(&job)?;
            print!("{}", validated.job.to_yaml()?);
        }
    }

    Ok(())
}
