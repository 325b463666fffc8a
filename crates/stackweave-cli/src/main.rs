//! # swv — Stackweave CLI
//!
//! Declarative infrastructure topology builder.
//! Synthesizes the registry and application stacks into one ordered plan
//! and realizes it through the local provider.

mod commands;
mod output;

use clap::Parser;

use crate::commands::Cli;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    commands::execute(cli)
}
