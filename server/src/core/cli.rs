use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::constants::{
    ENV_CONFIG, ENV_DEBUG, ENV_HOST, ENV_PORT, ENV_QUEUE_CAPACITY, ENV_RETRY_AFTER_SECS,
    ENV_WRITE_PATH,
};

#[derive(Parser)]
#[command(name = "promwrite")]
#[command(version, about = "Prometheus remote-write receiver", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Server host address
    #[arg(long, short = 'H', global = true, env = ENV_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', global = true, env = ENV_PORT)]
    pub port: Option<u16>,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Remote-write endpoint path
    #[arg(long, global = true, env = ENV_WRITE_PATH)]
    pub write_path: Option<String>,

    /// Capacity for every dispatch queue (0 rejects all writes)
    #[arg(long, global = true, env = ENV_QUEUE_CAPACITY)]
    pub queue_capacity: Option<usize>,

    /// Series queue capacity
    #[arg(long, global = true)]
    pub series_queue: Option<usize>,

    /// Sample queue capacity
    #[arg(long, global = true)]
    pub samples_queue: Option<usize>,

    /// Exemplar queue capacity
    #[arg(long, global = true)]
    pub exemplars_queue: Option<usize>,

    /// Histogram queue capacity
    #[arg(long, global = true)]
    pub histograms_queue: Option<usize>,

    /// Seconds advertised in Retry-After when a write is rejected
    #[arg(long, global = true, env = ENV_RETRY_AFTER_SECS)]
    pub retry_after: Option<u64>,

    /// Enable debug mode (verbose per-request diagnostics)
    #[arg(long, global = true, env = ENV_DEBUG)]
    pub debug: bool,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Start the server (default command)
    Start,
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub config: Option<PathBuf>,
    pub write_path: Option<String>,
    pub queue_capacity: Option<usize>,
    pub series_queue: Option<usize>,
    pub samples_queue: Option<usize>,
    pub exemplars_queue: Option<usize>,
    pub histograms_queue: Option<usize>,
    pub retry_after: Option<u64>,
    pub debug: bool,
}

impl From<Cli> for CliConfig {
    fn from(cli: Cli) -> Self {
        Self {
            host: cli.host,
            port: cli.port,
            config: cli.config,
            write_path: cli.write_path,
            queue_capacity: cli.queue_capacity,
            series_queue: cli.series_queue,
            samples_queue: cli.samples_queue,
            exemplars_queue: cli.exemplars_queue,
            histograms_queue: cli.histograms_queue,
            retry_after: cli.retry_after,
            debug: cli.debug,
        }
    }
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Option<Commands>) {
    let mut cli = Cli::parse();
    let command = cli.command.take();
    (cli.into(), command)
}
