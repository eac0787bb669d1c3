use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "frota")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative VM fleet management", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Fleet manifest file
    #[arg(short, long, global = true, default_value = "frota.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Preview what apply would change, without touching the fleet
    Plan(PlanArgs),

    /// Reconcile the fleet to match the manifest
    Apply(ApplyArgs),

    /// List observed instances in the manifest's folder
    Instances(InstancesArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser)]
pub struct PlanArgs {
    /// Number of VMs reconciled in parallel
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Classify and report only, execute nothing
    #[arg(short, long)]
    pub dry_run: bool,

    /// Number of VMs reconciled in parallel
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct InstancesArgs {
    /// Print instances as JSON
    #[arg(long)]
    pub json: bool,
}
