use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{
    io::{self, Write},
    path::PathBuf,
};
use tracing::Level;

mod commands;

use commands::{
    info::{InfoOptions, print_info},
    var::{print_vars, sections},
};
use stagdex_archive::{OpenOptions, Run, ScaleOptions};

#[derive(Parser)]
#[command(name = "stagdex")]
#[command(about = "Indexed access to geodynamics simulation output")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Run directory
    #[arg(long, global = true, default_value = ".")]
    path: PathBuf,

    /// Output file prefix (defaults to par.toml, then "run")
    #[arg(long, global = true)]
    stem: Option<String>,

    /// Fail when a snapshot grid differs from the first one
    #[arg(long, global = true, default_value_t = false)]
    strict_geometry: bool,

    /// Raise log level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Print grid and per-step time-series values of a run
    Info {
        /// Time-series columns to print
        #[arg(
            long,
            value_delimiter = ',',
            default_values = ["t", "Tmean", "vrms", "Nutop", "ftop"]
        )]
        output: Vec<String>,

        /// Convert values to physical units
        #[arg(long, default_value_t = false)]
        dimensional: bool,

        /// Report times in years
        #[arg(long, default_value_t = false)]
        time_in_years: bool,

        /// Report velocities in cm/y
        #[arg(long, default_value_t = false)]
        vel_in_cm_per_year: bool,
    },

    /// List known variables with their description and unit
    Var {
        /// Time-series columns
        #[arg(long, default_value_t = false)]
        time: bool,

        /// Radial-profile columns
        #[arg(long, default_value_t = false)]
        rprof: bool,

        /// Snapshot fields
        #[arg(long, default_value_t = false)]
        field: bool,
    },

    /// Print the version
    Version,
}

impl Cli {
    fn open_run(&self, scale: ScaleOptions) -> Result<Run> {
        let mut opts = OpenOptions::new();
        opts.strict_geometry(self.strict_geometry)
            .scale_options(scale);
        if let Some(stem) = &self.stem {
            opts.stem(stem.as_str());
        }
        opts.open(&self.path)
            .with_context(|| format!("open run in {}", self.path.display()))
    }
}

fn log_level(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(log_level(cli.verbose))
        .with_writer(io::stderr)
        .init();

    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    match &cli.command {
        Commands::Info {
            output,
            dimensional,
            time_in_years,
            vel_in_cm_per_year,
        } => {
            let run = cli.open_run(ScaleOptions {
                time_in_years: *time_in_years,
                vel_in_cm_per_year: *vel_in_cm_per_year,
            })?;
            let opts = InfoOptions {
                output: output.clone(),
                dimensional: *dimensional,
            };
            print_info(&run, &opts, &mut out)?;
        }
        Commands::Var { time, rprof, field } => {
            print_vars(&sections(*time, *rprof, *field), &mut out)?;
        }
        Commands::Version => {
            writeln!(out, "stagdex version {}", env!("CARGO_PKG_VERSION"))?;
        }
    }
    out.flush().context("flush output")?;
    Ok(())
}
