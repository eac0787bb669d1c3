//! `frota instances` - list observed instances in the manifest's folder.

use anyhow::Result;
use colored::Colorize;
use computekit::{InstanceStatus, RestBackend, GIB};
use reconcile::Reconciler;
use std::path::Path;

use crate::cli::InstancesArgs;
use crate::config::FleetConfig;
use crate::ui;
use crate::Context;

pub fn run(ctx: &Context, config_path: &Path, args: InstancesArgs) -> Result<()> {
    let config = FleetConfig::load(config_path)?;
    let backend = RestBackend::new(config.resolve_token()?);
    let reconciler = Reconciler::new(&backend, &config.folder_id);

    let instances = reconciler.observe()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&instances)?);
        return Ok(());
    }

    ui::header("Instances");
    ui::kv("Folder", &config.folder_id);

    if instances.is_empty() {
        ui::info("No instances in this folder");
        return Ok(());
    }

    println!();
    for instance in &instances {
        let status = match instance.status {
            InstanceStatus::Running => instance.status.as_str().green(),
            InstanceStatus::Stopped => instance.status.as_str().yellow(),
            InstanceStatus::Error | InstanceStatus::Crashed => instance.status.as_str().red(),
            _ => instance.status.as_str().dimmed(),
        };
        println!(
            "  {} {} {}",
            instance.name.bold(),
            status,
            format!(
                "({} cores, {} GB, {})",
                instance.resources.cores,
                instance.resources.memory / GIB,
                instance.zone_id
            )
            .dimmed()
        );
        if ctx.verbose > 0 {
            ui::dim(&format!("    id: {}", instance.id));
            for nic in &instance.network_interfaces {
                if let Some(address) = &nic.primary_v4_address {
                    let nat = if address.one_to_one_nat.is_some() {
                        " (nat)"
                    } else {
                        ""
                    };
                    ui::dim(&format!("    ip: {}{}", address.address, nat));
                }
            }
        }
    }

    Ok(())
}
