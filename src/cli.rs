use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use woof_hosts::parse_duration;
use woof_uploader::OutputFormat;

/// Upload files and folders to anonymous file hosting services, in parallel.
#[derive(Debug, Parser)]
#[command(name = "woof", version, about)]
pub struct Cli {
    /// YAML configuration file (only read when given)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Log what is happening to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
    /// Maximum number of parallel uploads [default: 5]
    #[arg(short, long, global = true, value_name = "N", allow_negative_numbers = true)]
    pub concurrency: Option<i64>,
    /// Output format: text or json [default: text]
    #[arg(short, long, global = true, value_name = "FORMAT")]
    pub output: Option<OutputFormat>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload files and directories to hosting providers
    Upload(UploadArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Args)]
pub struct UploadArgs {
    /// File to upload; repeatable, glob patterns are expanded
    #[arg(short, long = "file", value_name = "PATH")]
    pub files: Vec<String>,
    /// Directory to upload recursively; repeatable
    #[arg(short = 'd', long = "folder", value_name = "DIR")]
    pub folders: Vec<PathBuf>,
    /// Providers to use, in fallback order (comma separated or repeated)
    #[arg(short, long, value_name = "NAME", value_delimiter = ',', conflicts_with = "all")]
    pub providers: Vec<String>,
    /// Use every known provider, whatever the configuration says
    #[arg(long)]
    pub all: bool,
    /// Retries per provider after a retryable failure [default: 3]
    #[arg(long, value_name = "N")]
    pub retry_attempts: Option<u32>,
    /// Base delay between retries, e.g. 500ms, 2s, 1m [default: 2s]
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub retry_delay: Option<Duration>,
    /// Don't report upload progress
    #[arg(long)]
    pub no_progress: bool,
}
