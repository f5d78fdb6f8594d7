//! Command-line argument parsing for askql.
//!
//! Flags override the config file and the environment.

use crate::config::Config;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Ask questions in plain language about uploaded CSV datasets.
#[derive(Parser, Debug)]
#[command(name = "askql")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short = 'H', long, value_name = "HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short = 'p', long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Directory for uploads, dataset stores and schema sidecars
    #[arg(long, value_name = "DIR")]
    pub upload_dir: Option<PathBuf>,

    /// LLM provider to use (gemini, openai, mock)
    #[arg(long, value_name = "PROVIDER")]
    pub llm: Option<String>,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// What to run. Serving is the default.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Start the HTTP server
    Serve,

    /// Score generated SQL against a file of gold queries
    Evaluate(EvaluateArgs),
}

/// Arguments for `askql evaluate`.
#[derive(Args, Debug, Clone, PartialEq)]
pub struct EvaluateArgs {
    /// JSON array of {"question", "query"} objects
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Dataset to evaluate against (defaults to the active one)
    #[arg(short = 'd', long, value_name = "NAME")]
    pub dataset: Option<String>,

    /// Seconds to wait between questions, to stay under provider rate limits
    #[arg(long, value_name = "SECS", default_value_t = 0)]
    pub pause_secs: u64,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Applies flags on top of an already loaded configuration.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(dir) = &self.upload_dir {
            config.server.upload_dir = dir.clone();
        }
        if let Some(provider) = &self.llm {
            config.llm.provider = provider.clone();
        }
        if let Some(path) = &self.log_file {
            config.logging.file = Some(path.clone());
        }
    }
}
