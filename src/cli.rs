//! # Command Line Interface
//!
//! `synth` prints the deployment plan, `validate` checks configuration only
//! and `url` prints the public entry point.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::{load_config, EdgeConfig};
use crate::edge::{default_backend_routes, DeploymentPlan};
use crate::observability::{init_logging, log_config_info};

#[derive(Parser)]
#[command(name = "edgeplane")]
#[command(about = "Compile a web application's network edge into a deployment plan")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "edge.yaml")]
    pub config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Assemble and print the deployment plan
    Synth {
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate configuration without building anything
    Validate,

    /// Print the public base URL
    Url,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn render<T: Serialize>(self, data: &T) -> anyhow::Result<String> {
        match self {
            OutputFormat::Json => {
                serde_json::to_string_pretty(data).context("Failed to serialize to JSON")
            }
            OutputFormat::Yaml => serde_yaml::to_string(data).context("Failed to serialize to YAML"),
        }
    }
}

/// Run CLI commands
pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(Some(cli.config.as_path()))
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    if cli.verbose {
        config.observability.log_level = "debug".to_string();
    }

    init_logging(&config.observability)?;
    log_config_info(&config);

    match cli.command {
        Commands::Synth { format, output } => synth(&config, format, output.as_deref()),
        Commands::Validate => {
            config.validate()?;
            println!("Configuration is valid");
            Ok(())
        }
        Commands::Url => {
            let plan = DeploymentPlan::assemble(&config, &default_backend_routes()?)?;
            println!("{}", plan.base_url);
            Ok(())
        }
    }
}

fn synth(config: &EdgeConfig, format: OutputFormat, output: Option<&Path>) -> anyhow::Result<()> {
    let plan = DeploymentPlan::assemble(config, &default_backend_routes()?)?;
    let rendered = format.render(&plan)?;

    match output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("Failed to write plan to {}", path.display()))?;
            tracing::info!(path = %path.display(), stacks = plan.stacks.len(), "wrote deployment plan");
        }
        None => println!("{}", rendered),
    }
    Ok(())
}
