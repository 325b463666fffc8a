//! `swv plan` — Display the synthesized resource plan before applying.

use clap::Args;

use super::Context;
use crate::output;

/// Arguments for the `plan` command.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Print the full plan as JSON instead of a summary.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `plan` command.
///
/// Declares both stacks, composes them, and prints the resources in
/// realization order with their dependencies and the plan fingerprint.
///
/// # Errors
///
/// Returns an error if configuration loading or synthesis fails.
#[allow(clippy::print_stdout)]
pub fn execute(args: &PlanArgs, ctx: &Context) -> anyhow::Result<()> {
    let plan = ctx.planner()?.plan()?;
    if args.json {
        println!("{}", plan.to_json()?);
        return Ok(());
    }

    let fingerprint = plan.fingerprint()?;
    println!("Plan {}", fingerprint.short(12));
    println!("{}", output::rule(40));

    for stack in &plan.stack_order {
        println!();
        println!("  stack {stack}");
        for step in plan.steps_for(stack) {
            println!("    + {} ({})", step.descriptor.id(), step.descriptor.kind());
            if !step.depends_on.is_empty() {
                let deps: Vec<&str> = step.depends_on.iter().map(|d| d.as_str()).collect();
                println!("        after: {}", deps.join(", "));
            }
        }
    }

    if !plan.exports.is_empty() {
        println!();
        println!("  Exports:");
        for (name, export) in &plan.exports {
            println!("    {name} <- {}", export.reference);
        }
    }

    println!();
    println!(
        "  {} resource(s) in {} stack(s). {fingerprint}",
        plan.len(),
        plan.stack_order.len()
    );
    Ok(())
}
