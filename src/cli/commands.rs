//! CLI command definitions

use clap::{ArgGroup, Args};
use std::path::PathBuf;

/// Run every registered checker against repositories
#[derive(Debug, Args, Clone)]
pub struct CheckCommand {
    /// Repository directories (defaults to the repositories in the config file)
    pub paths: Vec<PathBuf>,

    /// Maximum number of repositories checked at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Deadline for the whole run, in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Run a pipeline
#[derive(Debug, Args, Clone)]
#[command(group(ArgGroup::new("source").required(true).args(["pipeline", "file"])))]
pub struct RunCommand {
    /// Name of a pipeline from the config file ("standard" for the built-in one)
    #[arg(short, long)]
    pub pipeline: Option<String>,

    /// Path to a pipeline YAML file
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Repository directories (defaults to the repositories in the config file)
    pub paths: Vec<PathBuf>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Validate a pipeline definition
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List checkers, step types and configured pipelines
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}
