//! In-memory infrastructure behind the library's storage and mail seams.
//!
//! Real persistence and SMTP delivery are external collaborators; these
//! implementations back local development, the CLI demo, and the service's
//! own tests.

use chrono::{DateTime, Utc};
use fleet_ops::workflows::penalties::{
    ActivityLog, Driver, DriverId, DriverStatus, DriverTransaction, FleetRepository, FranchiseId,
    IncentiveAdjustment, LedgerEntryKind, MailError, Penalty, PenaltyFilter, PenaltyId,
    PenaltyMailer, PenaltyNotice, PenaltyRepository, RepositoryError, StaffContact, StaffDirectory,
    TriggerKind, TripId, TripSummary, UserId,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryPenaltyStore {
    records: Arc<Mutex<HashMap<PenaltyId, Penalty>>>,
}

impl PenaltyRepository for InMemoryPenaltyStore {
    fn insert(&self, penalty: Penalty) -> Result<Penalty, RepositoryError> {
        let mut guard = self.records.lock().expect("penalty mutex poisoned");
        if guard.contains_key(&penalty.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(penalty.id.clone(), penalty.clone());
        Ok(penalty)
    }

    fn update(&self, penalty: Penalty) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("penalty mutex poisoned");
        if guard.contains_key(&penalty.id) {
            guard.insert(penalty.id.clone(), penalty);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn fetch(&self, id: &PenaltyId) -> Result<Option<Penalty>, RepositoryError> {
        let guard = self.records.lock().expect("penalty mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn list(&self, filter: &PenaltyFilter) -> Result<Vec<Penalty>, RepositoryError> {
        let guard = self.records.lock().expect("penalty mutex poisoned");
        let mut rows: Vec<Penalty> = guard
            .values()
            .filter(|penalty| filter.matches(penalty))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.0.cmp(&a.id.0))
        });
        Ok(rows)
    }

    fn find_by_name(&self, name: &str) -> Result<Option<Penalty>, RepositoryError> {
        let guard = self.records.lock().expect("penalty mutex poisoned");
        Ok(guard
            .values()
            .find(|penalty| penalty.name.eq_ignore_ascii_case(name))
            .cloned())
    }

    fn find_by_trigger(&self, trigger: TriggerKind) -> Result<Option<Penalty>, RepositoryError> {
        let guard = self.records.lock().expect("penalty mutex poisoned");
        Ok(guard
            .values()
            .filter(|penalty| {
                penalty.is_active && penalty.is_automatic && penalty.trigger.kind() == trigger
            })
            .min_by(|a, b| a.created_at.cmp(&b.created_at))
            .cloned())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryFleetStore {
    drivers: Arc<Mutex<HashMap<DriverId, Driver>>>,
    transactions: Arc<Mutex<Vec<DriverTransaction>>>,
    activities: Arc<Mutex<Vec<ActivityLog>>>,
    trips: Arc<Mutex<HashMap<TripId, TripSummary>>>,
}

impl FleetRepository for InMemoryFleetStore {
    fn insert_driver(&self, driver: Driver) -> Result<Driver, RepositoryError> {
        let mut guard = self.drivers.lock().expect("driver mutex poisoned");
        if guard.contains_key(&driver.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(driver.id.clone(), driver.clone());
        Ok(driver)
    }

    fn driver(&self, id: &DriverId) -> Result<Option<Driver>, RepositoryError> {
        let guard = self.drivers.lock().expect("driver mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn adjust_incentive(
        &self,
        id: &DriverId,
        delta_cents: i64,
    ) -> Result<IncentiveAdjustment, RepositoryError> {
        let mut guard = self.drivers.lock().expect("driver mutex poisoned");
        let driver = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        let previous_cents = driver.incentive_cents;
        driver.incentive_cents += delta_cents;
        Ok(IncentiveAdjustment {
            previous_cents,
            new_cents: driver.incentive_cents,
        })
    }

    fn set_driver_status(
        &self,
        id: &DriverId,
        status: DriverStatus,
    ) -> Result<Driver, RepositoryError> {
        let mut guard = self.drivers.lock().expect("driver mutex poisoned");
        let driver = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        driver.status = status;
        Ok(driver.clone())
    }

    fn append_transaction(
        &self,
        transaction: DriverTransaction,
    ) -> Result<DriverTransaction, RepositoryError> {
        self.transactions
            .lock()
            .expect("ledger mutex poisoned")
            .push(transaction.clone());
        Ok(transaction)
    }

    fn penalty_history(
        &self,
        driver: &DriverId,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<DriverTransaction>, RepositoryError> {
        let guard = self.transactions.lock().expect("ledger mutex poisoned");
        let mut rows: Vec<DriverTransaction> = guard
            .iter()
            .filter(|txn| &txn.driver_id == driver)
            .filter(|txn| txn.kind == LedgerEntryKind::Penalty)
            .filter(|txn| start.map_or(true, |bound| txn.created_at >= bound))
            .filter(|txn| end.map_or(true, |bound| txn.created_at <= bound))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.0.cmp(&a.id.0))
        });
        Ok(rows)
    }

    fn append_activity(&self, entry: ActivityLog) -> Result<ActivityLog, RepositoryError> {
        self.activities
            .lock()
            .expect("activity mutex poisoned")
            .push(entry.clone());
        Ok(entry)
    }

    fn activities_for(&self, driver: &DriverId) -> Result<Vec<ActivityLog>, RepositoryError> {
        let guard = self.activities.lock().expect("activity mutex poisoned");
        Ok(guard
            .iter()
            .filter(|entry| &entry.driver_id == driver)
            .cloned()
            .collect())
    }

    fn insert_trip(&self, trip: TripSummary) -> Result<TripSummary, RepositoryError> {
        let mut guard = self.trips.lock().expect("trip mutex poisoned");
        guard.insert(trip.id.clone(), trip.clone());
        Ok(trip)
    }

    fn trip(&self, id: &TripId) -> Result<Option<TripSummary>, RepositoryError> {
        let guard = self.trips.lock().expect("trip mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryStaffDirectory {
    contacts: Arc<Mutex<HashMap<UserId, StaffContact>>>,
    admins: Arc<Mutex<Vec<UserId>>>,
    managers: Arc<Mutex<HashMap<FranchiseId, Vec<UserId>>>>,
}

impl InMemoryStaffDirectory {
    pub(crate) fn register_admin(&self, contact: StaffContact) {
        self.admins
            .lock()
            .expect("admin mutex poisoned")
            .push(contact.id.clone());
        self.contacts
            .lock()
            .expect("contact mutex poisoned")
            .insert(contact.id.clone(), contact);
    }

    pub(crate) fn register_manager(&self, franchise: FranchiseId, contact: StaffContact) {
        self.managers
            .lock()
            .expect("manager mutex poisoned")
            .entry(franchise)
            .or_default()
            .push(contact.id.clone());
        self.contacts
            .lock()
            .expect("contact mutex poisoned")
            .insert(contact.id.clone(), contact);
    }

    pub(crate) fn register_user(&self, contact: StaffContact) {
        self.contacts
            .lock()
            .expect("contact mutex poisoned")
            .insert(contact.id.clone(), contact);
    }
}

impl StaffDirectory for InMemoryStaffDirectory {
    fn active_admins(&self) -> Result<Vec<StaffContact>, RepositoryError> {
        let contacts = self.contacts.lock().expect("contact mutex poisoned");
        Ok(self
            .admins
            .lock()
            .expect("admin mutex poisoned")
            .iter()
            .filter_map(|id| contacts.get(id).cloned())
            .collect())
    }

    fn active_managers(
        &self,
        franchise: &FranchiseId,
    ) -> Result<Vec<StaffContact>, RepositoryError> {
        let contacts = self.contacts.lock().expect("contact mutex poisoned");
        let guard = self.managers.lock().expect("manager mutex poisoned");
        Ok(guard
            .get(franchise)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| contacts.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn user(&self, id: &UserId) -> Result<Option<StaffContact>, RepositoryError> {
        let guard = self.contacts.lock().expect("contact mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

/// Mail seam that records deliveries in the service log instead of talking
/// to an SMTP relay.
#[derive(Default, Clone)]
pub(crate) struct LogMailer;

impl PenaltyMailer for LogMailer {
    fn send(&self, recipient: &str, notice: &PenaltyNotice) -> Result<(), MailError> {
        info!(
            %recipient,
            penalty = %notice.penalty_name,
            driver = %notice.driver_code,
            amount_cents = notice.amount_cents,
            applied_by = %notice.applied_by,
            "penalty notification dispatched"
        );
        Ok(())
    }
}

/// Development fixture so the deduction and status endpoints are exercisable
/// against the in-memory stores straight after boot.
pub(crate) fn seed_dev_fixtures(fleet: &InMemoryFleetStore, staff: &InMemoryStaffDirectory) {
    staff.register_admin(StaffContact {
        id: UserId("usr-admin-1".to_string()),
        name: "Platform Admin".to_string(),
        email: Some("admin@fleet.example".to_string()),
    });
    staff.register_manager(
        FranchiseId("fr-central".to_string()),
        StaffContact {
            id: UserId("usr-mgr-1".to_string()),
            name: "Central Franchise Manager".to_string(),
            email: Some("manager.central@fleet.example".to_string()),
        },
    );
    staff.register_user(StaffContact {
        id: UserId("usr-ops-1".to_string()),
        name: "Operations Desk".to_string(),
        email: Some("ops@fleet.example".to_string()),
    });

    fleet
        .insert_driver(Driver {
            id: DriverId("drv-100".to_string()),
            driver_code: "FLT-0100".to_string(),
            full_name: "Rashid Kumar".to_string(),
            email: Some("rashid.kumar@fleet.example".to_string()),
            franchise_id: FranchiseId("fr-central".to_string()),
            incentive_cents: 50_000,
            status: DriverStatus::Active,
        })
        .expect("seed driver");
    fleet
        .insert_trip(TripSummary {
            id: TripId("trip-501".to_string()),
            customer_name: "Anita Desai".to_string(),
            pickup_location: "Terminal 2 Departures".to_string(),
        })
        .expect("seed trip");

    info!("seeded in-memory fixtures: 1 driver, 1 trip, 3 staff contacts");
}
