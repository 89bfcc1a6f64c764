use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mth5-metadata")]
#[command(about = "Validate, migrate and summarize MTH5 magnetotelluric metadata")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        help = "Settings file [default: ./mth5-metadata.{toml,yaml,json}]"
    )]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate metadata files (JSON, key = value text, or zip bundles)
    Validate {
        #[arg(required = true, help = "Input files or directories")]
        inputs: Vec<PathBuf>,

        #[arg(short, long, help = "Category for documents that do not name one")]
        category: Option<String>,

        #[arg(long, help = "Treat non-standard fields as errors")]
        strict: bool,

        #[arg(long, help = "Worker threads [default: settings or CPU count]")]
        max_workers: Option<usize>,
    },

    /// Rewrite legacy metadata in the target schema version
    Migrate {
        #[arg(required = true, help = "Input files or directories")]
        inputs: Vec<PathBuf>,

        #[arg(short, long, help = "Category for documents that do not name one")]
        category: Option<String>,

        #[arg(
            short,
            long,
            help = "Output directory [default: next to each input as <name>.v<version>.json]"
        )]
        output_dir: Option<PathBuf>,

        #[arg(long, help = "Target schema version [default: settings or current]")]
        target_version: Option<String>,

        #[arg(long, help = "Report what would change without writing files")]
        dry_run: bool,
    },

    /// Export the attribute standards table as CSV
    Standards {
        #[arg(short, long, help = "Output CSV file [default: stdout]")]
        output_file: Option<PathBuf>,

        #[arg(short, long, help = "Only this category")]
        category: Option<String>,
    },

    /// Write the station/run/channel summary of an archive document to Parquet
    Summarize {
        #[arg(short, long, help = "Archive JSON document")]
        input: PathBuf,

        #[arg(
            short,
            long,
            help = "Output Parquet file path [default: output/mth5-summary-{YYMMDD}.parquet]"
        )]
        output_file: Option<PathBuf>,

        #[arg(long, help = "Parquet compression [default: settings or snappy]")]
        compression: Option<String>,

        #[arg(long, help = "Only one level: station, run or channel")]
        level: Option<String>,
    },

    /// Show the container tree of an archive document and check its integrity
    Inspect {
        #[arg(short, long, help = "Archive JSON document")]
        input: PathBuf,

        #[arg(long, help = "Report non-standard fields as issues")]
        strict: bool,

        #[arg(long, help = "Print each container's metadata")]
        show_metadata: bool,
    },
}
