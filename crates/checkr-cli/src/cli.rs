use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "checkr")]
#[command(about = "Browse the validator catalog and run dataset gates", long_about = None)]
pub struct Cli {
    #[arg(long, global = true, help = "Active content provider (overrides CHECKR_PROVIDER_NAME)")]
    pub provider: Option<String>,

    #[arg(long, global = true, help = "Provider config file (overrides CHECKR_PROVIDER_CONFIG_PATH)")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "List the merged validator catalog")]
    List,

    #[command(about = "Show one catalog entry")]
    Show {
        #[arg(help = "Validator source identifier")]
        source: String,
    },

    #[command(about = "Print the source text of a catalog entry")]
    Source {
        #[arg(help = "Validator source identifier")]
        source: String,
    },

    #[command(about = "Print base validator sources of the active provider")]
    BaseSources,

    #[command(about = "Run backend gates over a dataset")]
    Validate {
        #[arg(short, long, help = "Dataset JSON file, or - for stdin")]
        dataset: PathBuf,

        #[arg(short, long = "gate", help = "Gate source identifier (repeatable)")]
        gates: Vec<String>,

        #[arg(long, help = "Validator options as a JSON object")]
        options: Option<String>,
    },
}
