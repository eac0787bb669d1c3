//! `frota apply` - reconcile the fleet to match the manifest.

use anyhow::{bail, Result};
use computekit::RestBackend;
use dialoguer::Confirm;
use reconcile::{ReconcileOptions, Reconciler};
use std::path::Path;

use crate::cli::ApplyArgs;
use crate::config::FleetConfig;
use crate::output;
use crate::progress;
use crate::ui;
use crate::Context;

pub fn run(ctx: &Context, config_path: &Path, args: ApplyArgs) -> Result<()> {
    if !args.json {
        ui::header("Applying Fleet Manifest");
        if args.dry_run {
            ui::warn("Dry run - no changes will be made");
        }
    }

    let config = FleetConfig::load(config_path)?;
    let specs = config.vm_specs();
    let backend = RestBackend::new(config.resolve_token()?);
    let reconciler = Reconciler::new(&backend, &config.folder_id);

    // Plan first so the operator sees what apply is about to do.
    let preview = reconciler.reconcile(
        &specs,
        ReconcileOptions {
            dry_run: true,
            jobs: args.jobs,
        },
    )?;

    if args.dry_run {
        if args.json {
            println!("{}", serde_json::to_string_pretty(&preview)?);
        } else {
            output::render_plan(&preview, ctx.quiet);
        }
        return Ok(());
    }

    if !args.json {
        output::render_plan(&preview, ctx.quiet);
    }

    if !preview.changed && !preview.has_errors() {
        return Ok(());
    }

    // The prompt goes to the terminal, so it is safe in --json mode too.
    if !args.yes {
        let confirmed = Confirm::new()
            .with_prompt("Apply these changes?")
            .default(false)
            .interact()?;
        if !confirmed {
            ui::warn("Aborted");
            return Ok(());
        }
    }

    let pb = progress::bar(specs.len() as u64, "Reconciling");
    let result = reconciler.reconcile_with(
        &specs,
        ReconcileOptions {
            dry_run: false,
            jobs: args.jobs,
        },
        |vm| {
            pb.set_message(format!("{} {}", vm.name, vm.action));
            pb.inc(1);
        },
    )?;
    pb.finish_and_clear();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        output::render_apply(&result, ctx.quiet);
    }

    if result.has_errors() {
        bail!(
            "apply failed for {} of {} VMs",
            result.errors().count(),
            result.vms.len()
        );
    }
    Ok(())
}
