//! Terminal rendering of reconciliation results.

use colored::{ColoredString, Colorize};
use reconcile::{ActionTaken, FleetResult, RequiredAction, VmResult};

use crate::ui;

fn required_label(action: RequiredAction) -> ColoredString {
    match action {
        RequiredAction::Unchanged => "unchanged".dimmed(),
        RequiredAction::InPlace => "in-place update".cyan(),
        RequiredAction::Restart => "restart".yellow(),
        RequiredAction::Recreate => "recreate".red(),
        RequiredAction::Create => "create".green(),
    }
}

fn taken_label(action: ActionTaken) -> ColoredString {
    match action {
        ActionTaken::Unchanged => "unchanged".dimmed(),
        ActionTaken::UpdatedInPlace => "updated in place".cyan(),
        ActionTaken::Restarted => "restarted".yellow(),
        ActionTaken::Recreated => "recreated".red(),
        ActionTaken::Created => "created".green(),
        ActionTaken::Error => "error".red().bold(),
    }
}

fn print_changes(vm: &VmResult) {
    for change in &vm.changes {
        println!("      {} {}", "~".yellow(), change.dimmed());
    }
}

/// Render a plan: classified actions and field-level drift, per VM.
pub fn render_plan(result: &FleetResult, quiet: bool) {
    ui::section("Plan");

    for vm in &result.vms {
        match (vm.required, &vm.error) {
            (_, Some(error)) => {
                println!("  {} {}", "✗".red(), vm.name.bold());
                println!("      {}", error.red());
                print_changes(vm);
            }
            (Some(RequiredAction::Unchanged) | None, None) => {
                if !quiet {
                    println!("  {} {} {}", "✓".green(), vm.name.bold(), "unchanged".dimmed());
                }
            }
            (Some(required), None) => {
                println!(
                    "  {} {} {}",
                    "~".yellow(),
                    vm.name.bold(),
                    required_label(required)
                );
                print_changes(vm);
            }
        }
    }

    println!();
    let pending = result.vms.iter().filter(|vm| vm.changed).count();
    let errors = result.errors().count();
    if errors > 0 {
        ui::warn(&format!(
            "{pending} of {} VMs need changes, {errors} failed",
            result.vms.len()
        ));
    } else if pending > 0 {
        ui::info(&format!(
            "{pending} of {} VMs need changes",
            result.vms.len()
        ));
    } else {
        ui::success("Fleet matches the manifest");
    }
}

/// Render an apply run: what actually happened, per VM.
pub fn render_apply(result: &FleetResult, quiet: bool) {
    ui::section("Results");

    for vm in &result.vms {
        match &vm.error {
            Some(error) => {
                println!("  {} {}", "✗".red(), vm.name.bold());
                println!("      {}", error.red());
            }
            None => {
                if vm.action == ActionTaken::Unchanged && quiet {
                    continue;
                }
                let icon = if vm.changed { "~".yellow() } else { "✓".green() };
                println!("  {} {} {}", icon, vm.name.bold(), taken_label(vm.action));
                if !quiet {
                    print_changes(vm);
                }
            }
        }
    }

    println!();
    let changed = result.vms.iter().filter(|vm| vm.changed && !vm.is_err()).count();
    let errors = result.errors().count();
    if errors > 0 {
        ui::warn(&format!(
            "{changed} VMs changed, {errors} failed, {} total",
            result.vms.len()
        ));
    } else {
        ui::success(&format!("{changed} VMs changed, {} total", result.vms.len()));
    }
}
