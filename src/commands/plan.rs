//! `frota plan` - preview what apply would change.

use anyhow::{bail, Result};
use computekit::RestBackend;
use reconcile::{ReconcileOptions, Reconciler};
use std::path::Path;

use crate::cli::PlanArgs;
use crate::config::FleetConfig;
use crate::output;
use crate::ui;
use crate::Context;

pub fn run(ctx: &Context, config_path: &Path, args: PlanArgs) -> Result<()> {
    if !args.json {
        ui::header("Fleet Plan");
    }

    let config = FleetConfig::load(config_path)?;
    let backend = RestBackend::new(config.resolve_token()?);
    let reconciler = Reconciler::new(&backend, &config.folder_id);

    let options = ReconcileOptions {
        dry_run: true,
        jobs: args.jobs,
    };
    let result = reconciler.reconcile(&config.vm_specs(), options)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        ui::kv("Folder", &config.folder_id);
        output::render_plan(&result, ctx.quiet);
    }

    if result.has_errors() {
        bail!(
            "plan failed for {} of {} VMs",
            result.errors().count(),
            result.vms.len()
        );
    }

    // Pending changes get a distinct exit code so scripts can branch on it.
    if result.changed {
        std::process::exit(2);
    }
    Ok(())
}
