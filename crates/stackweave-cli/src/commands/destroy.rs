//! `swv destroy` — Tear down realized resources in reverse plan order.

use clap::Args;

use super::Context;

/// Arguments for the `destroy` command.
#[derive(Args, Debug)]
pub struct DestroyArgs {
    /// Confirm the teardown. Without it only the resources are listed.
    #[arg(short, long)]
    pub yes: bool,
}

/// Executes the `destroy` command.
///
/// # Errors
///
/// Returns an error if synthesis fails or the provider cannot remove a
/// resource.
#[allow(clippy::print_stdout)]
pub fn execute(args: &DestroyArgs, ctx: &Context) -> anyhow::Result<()> {
    let planner = ctx.planner()?;
    let plan = planner.plan()?;

    if !args.yes {
        println!("The following resources would be destroyed (pass --yes to proceed):");
        for step in plan.steps.iter().rev() {
            println!("  - {} ({})", step.descriptor.id(), step.descriptor.kind());
        }
        return Ok(());
    }

    let removed = ctx.engine(&planner)?.destroy(&plan)?;
    for id in &removed {
        println!("  - {id}");
    }
    println!();
    println!("  Destroy complete: {} resource(s) removed.", removed.len());
    Ok(())
}
