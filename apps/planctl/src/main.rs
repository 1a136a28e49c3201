use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use plan_core::{InMemorySettingsRegistry, PlanEvent, PlanMasterController, ViewMode};
use shared::{
    domain::{FirmwareClass, PlanCategory, VehicleClass},
    plan::PlanDocument,
};
use tokio::time::timeout;
use vehicle_link::SimulatedVehicle;

#[derive(Parser, Debug)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a plan file and print per-category item counts.
    Inspect { plan: PathBuf },
    /// Push a plan file to a simulated vehicle and print the sync events.
    Push {
        plan: PathBuf,
        /// Pretend the vehicle firmware has no geofence support.
        #[arg(long)]
        no_geofence: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let cli = Cli::parse();

    match cli.command {
        Command::Inspect { plan } => {
            let raw = tokio::fs::read_to_string(&plan)
                .await
                .with_context(|| format!("reading {}", plan.display()))?;
            let document = PlanDocument::from_json_str(&raw)?;
            println!(
                "{} v{} saved {}",
                document.ground_station, document.version, document.saved_at
            );
            for category in PlanCategory::ALL {
                println!(
                    "{}: {} items",
                    category.label(),
                    document.section(category).item_count()
                );
            }
        }
        Command::Push { plan, no_geofence } => {
            let mut vehicle = SimulatedVehicle::new(FirmwareClass::Generic, VehicleClass::Generic);
            if no_geofence {
                vehicle = vehicle.with_unsupported(PlanCategory::GeoFence);
            }
            let vehicle = Arc::new(vehicle);

            let settings = Arc::new(InMemorySettingsRegistry::default());
            let controller = PlanMasterController::new(ViewMode::Monitor, settings);
            let mut events = controller.subscribe_events();
            controller.attach_vehicle(Some(vehicle.clone())).await;
            controller.load_from_file(&plan).await?;
            if !controller.send_to_vehicle().await {
                bail!("vehicle refused the plan send");
            }

            loop {
                let event = timeout(Duration::from_secs(5), events.recv())
                    .await
                    .context("timed out waiting for send completion")??;
                match event {
                    PlanEvent::SendToVehicleCompleted => break,
                    other => println!("{other:?}"),
                }
            }
            for category in PlanCategory::ALL {
                let count = vehicle
                    .sent_plan(category)
                    .map(|section| section.item_count())
                    .unwrap_or(0);
                println!("sent {}: {} items", category.label(), count);
            }
        }
    }

    Ok(())
}
