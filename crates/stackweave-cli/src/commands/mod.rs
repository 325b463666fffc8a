//! CLI command definitions and dispatch.

pub mod apply;
pub mod destroy;
pub mod outputs;
pub mod plan;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use stackweave_common::constants;
use stackweave_runtime::engine::Engine;
use stackweave_runtime::provider::local::LocalProvider;
use stackweave_sdk::planner::Planner;

/// Stackweave — Declarative infrastructure topology builder.
#[derive(Parser, Debug)]
#[command(name = constants::BIN_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Path to the topology configuration file.
    #[arg(long, global = true, default_value = constants::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Path to the local provider's state file.
    #[arg(long, global = true, default_value = constants::DEFAULT_STATE_FILE)]
    pub state_file: PathBuf,

    /// Image tag to deploy, overriding the configuration.
    #[arg(long, global = true, env = "STACKWEAVE_IMAGE_TAG")]
    pub image_tag: Option<String>,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Synthesize and display the ordered resource plan.
    Plan(plan::PlanArgs),
    /// Realize the plan with the local provider.
    Apply(apply::ApplyArgs),
    /// Tear down every realized resource in reverse order.
    Destroy(destroy::DestroyArgs),
    /// Print the resolved stack exports.
    Outputs(outputs::OutputsArgs),
}

/// Options shared by every subcommand.
#[derive(Debug, Clone)]
pub struct Context {
    /// Configuration file path.
    pub config: PathBuf,
    /// State file path.
    pub state_file: PathBuf,
    /// Image tag override.
    pub image_tag: Option<String>,
}

impl Context {
    /// Loads the configuration and applies the image tag override.
    ///
    /// A missing configuration at the default path falls back to the
    /// built-in defaults; a missing explicit path is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or is invalid.
    pub fn planner(&self) -> anyhow::Result<Planner> {
        let mut planner = Planner::new();
        if self.config.exists() {
            planner.load_config(&self.config)?;
        } else if self.config == Path::new(constants::DEFAULT_CONFIG_FILE) {
            tracing::warn!(
                path = %self.config.display(),
                "configuration file not found, using defaults"
            );
        } else {
            anyhow::bail!("configuration file not found: {}", self.config.display());
        }
        if let Some(tag) = &self.image_tag {
            planner.set_image_tag(tag.as_str())?;
        }
        Ok(planner)
    }

    /// Opens the local provider over the state file and wraps it in an engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the state file exists but cannot be read.
    pub fn engine(&self, planner: &Planner) -> anyhow::Result<Engine> {
        let provider = LocalProvider::open(&self.state_file, &planner.config().provider)?;
        Ok(Engine::new(Box::new(provider)))
    }
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let ctx = Context {
        config: cli.config,
        state_file: cli.state_file,
        image_tag: cli.image_tag,
    };
    match cli.command {
        Command::Plan(args) => plan::execute(&args, &ctx),
        Command::Apply(args) => apply::execute(&args, &ctx),
        Command::Destroy(args) => destroy::execute(&args, &ctx),
        Command::Outputs(args) => outputs::execute(&args, &ctx),
    }
}
