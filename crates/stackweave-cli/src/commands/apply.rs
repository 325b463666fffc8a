//! `swv apply` — Realize the plan with the local provider.

use clap::Args;
use stackweave_runtime::provider::Change;

use super::Context;
use crate::output;

/// Arguments for the `apply` command.
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Print realized resources as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `apply` command.
///
/// # Errors
///
/// Returns an error if synthesis fails or the provider rejects a resource.
/// Provider errors keep their retry hint in the message.
#[allow(clippy::print_stdout)]
pub fn execute(args: &ApplyArgs, ctx: &Context) -> anyhow::Result<()> {
    let planner = ctx.planner()?;
    let plan = planner.plan()?;
    let engine = ctx.engine(&planner)?;
    let deployment = engine.apply(&plan)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&deployment.resources)?);
        return Ok(());
    }

    for resource in &deployment.resources {
        println!(
            "  {} {:<28} {:<18} {}",
            output::change_marker(resource.change),
            resource.id,
            resource.kind,
            resource.physical_id
        );
    }
    println!();
    println!(
        "  Apply complete ({}): {} created, {} updated, {} unchanged.",
        engine.provider_name(),
        deployment.count(Change::Created),
        deployment.count(Change::Updated),
        deployment.count(Change::Unchanged)
    );
    if !deployment.exports.is_empty() {
        println!();
        for (name, value) in &deployment.exports {
            println!("  {name} = {}", output::format_value(value));
        }
    }
    Ok(())
}
