use crate::infra::{
    seed_dev_fixtures, InMemoryFleetStore, InMemoryPenaltyStore, InMemoryStaffDirectory, LogMailer,
};
use clap::Args;
use fleet_ops::error::AppError;
use fleet_ops::workflows::penalties::{
    DeductionRequest, DeductionService, DriverId, FleetRepository, NewPenalty, PenaltyCatalog,
    PenaltyTrigger, TripId, UserId,
};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Override the deduction amount in minor currency units
    #[arg(long)]
    pub(crate) amount_cents: Option<i64>,
    /// Free-text reason recorded on the ledger row
    #[arg(long)]
    pub(crate) reason: Option<String>,
    /// Skip the automatic-block portion of the walkthrough
    #[arg(long)]
    pub(crate) skip_block: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        amount_cents,
        reason,
        skip_block,
    } = args;

    println!("Fleet penalty workflow demo");

    let penalties = Arc::new(InMemoryPenaltyStore::default());
    let fleet = Arc::new(InMemoryFleetStore::default());
    let staff = Arc::new(InMemoryStaffDirectory::default());
    let mailer = Arc::new(LogMailer);
    seed_dev_fixtures(&fleet, &staff);

    let catalog = Arc::new(PenaltyCatalog::new(penalties.clone()));
    let engine = Arc::new(DeductionService::new(
        penalties,
        fleet.clone(),
        staff,
        mailer,
    ));

    let driver_id = DriverId("drv-100".to_string());
    let actor = UserId("usr-ops-1".to_string());

    let late_pickup = match catalog.create(demo_manual_rule()) {
        Ok(penalty) => penalty,
        Err(err) => {
            println!("  Catalog rejected the manual rule: {err}");
            return Ok(());
        }
    };
    println!(
        "- Registered rule '{}' (default deduction {} cents)",
        late_pickup.name, late_pickup.amount_cents
    );

    let outcome = match engine.apply_deduction(DeductionRequest {
        penalty_id: late_pickup.id.clone(),
        driver_id: driver_id.clone(),
        amount_cents,
        reason: reason.clone(),
        trip_id: Some(TripId("trip-501".to_string())),
        applied_by: actor.clone(),
    }) {
        Ok(outcome) => outcome,
        Err(err) => {
            println!("  Deduction failed: {err}");
            return Ok(());
        }
    };
    println!(
        "- Applied '{}': incentive {} -> {} cents",
        late_pickup.name, outcome.previous_incentive_cents, outcome.new_incentive_cents
    );
    match serde_json::to_string_pretty(&outcome) {
        Ok(json) => println!("  Ledger transaction:\n{json}"),
        Err(err) => println!("  Ledger transaction unavailable: {err}"),
    }

    if !skip_block {
        let blocking = match catalog.create(demo_blocking_rule()) {
            Ok(penalty) => penalty,
            Err(err) => {
                println!("  Catalog rejected the blocking rule: {err}");
                return Ok(());
            }
        };
        match engine.apply_deduction(DeductionRequest {
            penalty_id: blocking.id,
            driver_id: driver_id.clone(),
            amount_cents: None,
            reason: None,
            trip_id: None,
            applied_by: actor.clone(),
        }) {
            Ok(outcome) => println!(
                "- Applied blocking rule '{}': incentive now {} cents",
                blocking.name, outcome.new_incentive_cents
            ),
            Err(err) => {
                println!("  Blocking deduction failed: {err}");
                return Ok(());
            }
        }

        match fleet.driver(&driver_id) {
            Ok(Some(driver)) => {
                println!("- Driver {} status: {}", driver.driver_code, driver.status.label())
            }
            Ok(None) => println!("  Driver lookup returned no record"),
            Err(err) => println!("  Driver lookup unavailable: {err}"),
        }

        match fleet.activities_for(&driver_id) {
            Ok(activities) => {
                for entry in activities {
                    println!(
                        "  Audit: {} {} -> {} ({})",
                        entry.action.label(),
                        entry.transition.previous.label(),
                        entry.transition.new.label(),
                        entry.transition.reason
                    );
                }
            }
            Err(err) => println!("  Audit log unavailable: {err}"),
        }
    }

    match engine.driver_penalty_history(&driver_id, None, None) {
        Ok(history) => {
            println!("\nPenalty history ({} entries, newest first)", history.len());
            for entry in history {
                let rule = entry
                    .penalty
                    .map(|p| p.name)
                    .unwrap_or_else(|| "unknown rule".to_string());
                let trip = entry
                    .trip
                    .map(|t| format!(" | trip {} ({})", t.id.0, t.pickup_location))
                    .unwrap_or_default();
                println!(
                    "- {} | {} cents | {}{}",
                    entry.transaction.created_at.to_rfc3339(),
                    entry.transaction.amount_cents,
                    rule,
                    trip
                );
            }
        }
        Err(err) => println!("  History unavailable: {err}"),
    }

    Ok(())
}

fn demo_manual_rule() -> NewPenalty {
    NewPenalty {
        name: "Late Pickup".to_string(),
        description: Some("Driver arrived late to the pickup location".to_string()),
        amount_cents: 10_000,
        kind: Default::default(),
        is_automatic: false,
        trigger: Some(PenaltyTrigger::Manual),
        category: Default::default(),
        severity: Default::default(),
        notifications: None,
        block_driver: false,
    }
}

fn demo_blocking_rule() -> NewPenalty {
    NewPenalty {
        name: "Repeated Complaints".to_string(),
        description: Some("Customer complaint threshold exceeded".to_string()),
        amount_cents: 25_000,
        kind: Default::default(),
        is_automatic: true,
        trigger: Some(PenaltyTrigger::ComplaintThreshold { complaint_count: 3 }),
        category: Default::default(),
        severity: Default::default(),
        notifications: None,
        block_driver: true,
    }
}
