//! `swv outputs` — Print the resolved stack exports.

use clap::Args;

use super::Context;
use crate::output;

/// Arguments for the `outputs` command.
#[derive(Args, Debug)]
pub struct OutputsArgs {
    /// Print exports as a JSON object.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `outputs` command.
///
/// Reads realized outputs from the state file; nothing is created.
///
/// # Errors
///
/// Returns an error if synthesis fails, the state file cannot be read, or a
/// realized resource lacks an exported attribute.
#[allow(clippy::print_stdout)]
pub fn execute(args: &OutputsArgs, ctx: &Context) -> anyhow::Result<()> {
    let planner = ctx.planner()?;
    let plan = planner.plan()?;
    let exports = ctx.engine(&planner)?.outputs(&plan)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&exports)?);
        return Ok(());
    }
    if exports.is_empty() {
        println!("No outputs. Run `swv apply` first.");
        return Ok(());
    }
    for (name, value) in &exports {
        println!("{name} = {}", output::format_value(value));
    }
    Ok(())
}
