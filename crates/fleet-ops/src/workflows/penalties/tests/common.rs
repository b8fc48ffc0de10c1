use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::workflows::penalties::catalog::PenaltyCatalog;
use crate::workflows::penalties::deduction::DeductionService;
use crate::workflows::penalties::domain::{
    ActivityLog, Driver, DriverId, DriverStatus, DriverTransaction, FranchiseId, LedgerEntryKind,
    NewPenalty, NotificationPolicy, Penalty, PenaltyCategory, PenaltyId, PenaltyKind,
    PenaltySeverity, PenaltyTrigger, StaffContact, TriggerKind, TripId, TripSummary, UserId,
};
use crate::workflows::penalties::repository::{
    FleetRepository, IncentiveAdjustment, MailError, PenaltyFilter, PenaltyMailer, PenaltyNotice,
    PenaltyRepository, RepositoryError, StaffDirectory,
};
use crate::workflows::penalties::router::{penalty_router, PenaltyApi};

#[derive(Default, Clone)]
pub(super) struct MemoryPenalties {
    records: Arc<Mutex<HashMap<PenaltyId, Penalty>>>,
}

impl PenaltyRepository for MemoryPenalties {
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
            .min_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.id.0.cmp(&b.id.0))
            })
            .cloned())
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryFleet {
    drivers: Arc<Mutex<HashMap<DriverId, Driver>>>,
    transactions: Arc<Mutex<Vec<DriverTransaction>>>,
    activities: Arc<Mutex<Vec<ActivityLog>>>,
    trips: Arc<Mutex<HashMap<TripId, TripSummary>>>,
}

impl MemoryFleet {
    pub(super) fn transactions(&self) -> Vec<DriverTransaction> {
        self.transactions
            .lock()
            .expect("ledger mutex poisoned")
            .clone()
    }
}

impl FleetRepository for MemoryFleet {
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
pub(super) struct MemoryDirectory {
    admins: Arc<Mutex<Vec<StaffContact>>>,
    managers: Arc<Mutex<HashMap<FranchiseId, Vec<StaffContact>>>>,
    users: Arc<Mutex<HashMap<UserId, StaffContact>>>,
}

impl MemoryDirectory {
    pub(super) fn add_admin(&self, contact: StaffContact) {
        self.users
            .lock()
            .expect("user mutex poisoned")
            .insert(contact.id.clone(), contact.clone());
        self.admins.lock().expect("admin mutex poisoned").push(contact);
    }

    pub(super) fn add_manager(&self, franchise: FranchiseId, contact: StaffContact) {
        self.users
            .lock()
            .expect("user mutex poisoned")
            .insert(contact.id.clone(), contact.clone());
        self.managers
            .lock()
            .expect("manager mutex poisoned")
            .entry(franchise)
            .or_default()
            .push(contact);
    }

    pub(super) fn add_user(&self, contact: StaffContact) {
        self.users
            .lock()
            .expect("user mutex poisoned")
            .insert(contact.id.clone(), contact);
    }
}

impl StaffDirectory for MemoryDirectory {
    fn active_admins(&self) -> Result<Vec<StaffContact>, RepositoryError> {
        Ok(self.admins.lock().expect("admin mutex poisoned").clone())
    }

    fn active_managers(
        &self,
        franchise: &FranchiseId,
    ) -> Result<Vec<StaffContact>, RepositoryError> {
        let guard = self.managers.lock().expect("manager mutex poisoned");
        Ok(guard.get(franchise).cloned().unwrap_or_default())
    }

    fn user(&self, id: &UserId) -> Result<Option<StaffContact>, RepositoryError> {
        let guard = self.users.lock().expect("user mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

#[derive(Default, Clone)]
pub(super) struct RecordingMailer {
    sent: Arc<Mutex<Vec<(String, PenaltyNotice)>>>,
}

impl RecordingMailer {
    pub(super) fn sent(&self) -> Vec<(String, PenaltyNotice)> {
        self.sent.lock().expect("mailer mutex poisoned").clone()
    }
}

impl PenaltyMailer for RecordingMailer {
    fn send(&self, recipient: &str, notice: &PenaltyNotice) -> Result<(), MailError> {
        self.sent
            .lock()
            .expect("mailer mutex poisoned")
            .push((recipient.to_string(), notice.clone()));
        Ok(())
    }
}

pub(super) struct FailingMailer;

impl PenaltyMailer for FailingMailer {
    fn send(&self, _recipient: &str, _notice: &PenaltyNotice) -> Result<(), MailError> {
        Err(MailError::Transport("smtp relay offline".to_string()))
    }
}

/// Rejects one recipient and records every other delivery, so tests can show
/// a failed send never starves its siblings.
#[derive(Clone)]
pub(super) struct FlakyMailer {
    reject: String,
    delivered: Arc<Mutex<Vec<String>>>,
}

impl FlakyMailer {
    pub(super) fn rejecting(recipient: &str) -> Self {
        Self {
            reject: recipient.to_string(),
            delivered: Arc::default(),
        }
    }

    pub(super) fn delivered(&self) -> Vec<String> {
        self.delivered.lock().expect("mailer mutex poisoned").clone()
    }
}

impl PenaltyMailer for FlakyMailer {
    fn send(&self, recipient: &str, _notice: &PenaltyNotice) -> Result<(), MailError> {
        if recipient == self.reject {
            return Err(MailError::Transport(format!("mailbox {recipient} bounced")));
        }
        self.delivered
            .lock()
            .expect("mailer mutex poisoned")
            .push(recipient.to_string());
        Ok(())
    }
}

pub(super) fn late_pickup() -> NewPenalty {
    NewPenalty {
        name: "Late Pickup".to_string(),
        description: Some("Driver arrived late to the pickup location".to_string()),
        amount_cents: 10_000,
        kind: PenaltyKind::default(),
        is_automatic: false,
        trigger: None,
        category: PenaltyCategory::default(),
        severity: PenaltySeverity::default(),
        notifications: None,
        block_driver: false,
    }
}

pub(super) fn blocking_complaint() -> NewPenalty {
    NewPenalty {
        name: "Repeated Complaints".to_string(),
        description: Some("Customer complaint threshold exceeded".to_string()),
        amount_cents: 25_000,
        kind: PenaltyKind::default(),
        is_automatic: true,
        trigger: Some(PenaltyTrigger::ComplaintThreshold { complaint_count: 3 }),
        category: PenaltyCategory::Conduct,
        severity: PenaltySeverity::High,
        notifications: None,
        block_driver: true,
    }
}

pub(super) fn driver() -> Driver {
    Driver {
        id: DriverId("drv-100".to_string()),
        driver_code: "FLT-0100".to_string(),
        full_name: "Rashid Kumar".to_string(),
        email: Some("rashid.kumar@fleet.example".to_string()),
        franchise_id: FranchiseId("fr-01".to_string()),
        incentive_cents: 50_000,
        status: DriverStatus::Active,
    }
}

pub(super) fn airport_trip() -> TripSummary {
    TripSummary {
        id: TripId("trip-501".to_string()),
        customer_name: "Anita Desai".to_string(),
        pickup_location: "Terminal 2 Departures".to_string(),
    }
}

pub(super) fn actor() -> UserId {
    UserId("usr-ops-1".to_string())
}

/// Fixed instants so ordering assertions never depend on wall-clock
/// resolution.
pub(super) fn instant(offset_minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap() + Duration::minutes(offset_minutes)
}

/// Raw rule row with explicit timestamps for order-sensitive listing tests.
pub(super) fn penalty_row(id: &str, name: &str, created_at: DateTime<Utc>) -> Penalty {
    Penalty {
        id: PenaltyId(id.to_string()),
        name: name.to_string(),
        description: None,
        amount_cents: 5_000,
        kind: PenaltyKind::default(),
        is_active: true,
        is_automatic: false,
        trigger: PenaltyTrigger::Manual,
        category: PenaltyCategory::default(),
        severity: PenaltySeverity::default(),
        notifications: NotificationPolicy::default(),
        block_driver: false,
        created_at,
        updated_at: created_at,
    }
}

pub(super) struct Harness {
    pub(super) catalog: Arc<PenaltyCatalog<MemoryPenalties>>,
    pub(super) engine:
        Arc<DeductionService<MemoryPenalties, MemoryFleet, MemoryDirectory, RecordingMailer>>,
    pub(super) penalties: Arc<MemoryPenalties>,
    pub(super) fleet: Arc<MemoryFleet>,
    pub(super) directory: Arc<MemoryDirectory>,
    pub(super) mailer: Arc<RecordingMailer>,
}

/// Full wiring over in-memory stores: one admin, one manager for the seeded
/// driver's franchise, the acting user, the driver, and one trip.
pub(super) fn harness() -> Harness {
    let penalties = Arc::new(MemoryPenalties::default());
    let fleet = Arc::new(MemoryFleet::default());
    let directory = Arc::new(MemoryDirectory::default());
    let mailer = Arc::new(RecordingMailer::default());

    directory.add_admin(StaffContact {
        id: UserId("usr-admin-1".to_string()),
        name: "Priya Nair".to_string(),
        email: Some("priya.nair@fleet.example".to_string()),
    });
    directory.add_manager(
        FranchiseId("fr-01".to_string()),
        StaffContact {
            id: UserId("usr-mgr-1".to_string()),
            name: "Tomas Eriksson".to_string(),
            email: Some("tomas.eriksson@fleet.example".to_string()),
        },
    );
    directory.add_user(StaffContact {
        id: actor(),
        name: "Operations Desk".to_string(),
        email: Some("ops@fleet.example".to_string()),
    });

    fleet.insert_driver(driver()).expect("seed driver");
    fleet.insert_trip(airport_trip()).expect("seed trip");

    let catalog = Arc::new(PenaltyCatalog::new(penalties.clone()));
    let engine = Arc::new(DeductionService::new(
        penalties.clone(),
        fleet.clone(),
        directory.clone(),
        mailer.clone(),
    ));

    Harness {
        catalog,
        engine,
        penalties,
        fleet,
        directory,
        mailer,
    }
}

/// Same wiring with a caller-supplied mail transport.
pub(super) fn harness_with_mailer<M>(
    mailer: Arc<M>,
) -> (
    Arc<PenaltyCatalog<MemoryPenalties>>,
    Arc<DeductionService<MemoryPenalties, MemoryFleet, MemoryDirectory, M>>,
    Arc<MemoryFleet>,
)
where
    M: PenaltyMailer + 'static,
{
    let base = harness();
    let engine = Arc::new(DeductionService::new(
        base.penalties.clone(),
        base.fleet.clone(),
        base.directory.clone(),
        mailer,
    ));
    (base.catalog, engine, base.fleet)
}

pub(super) fn build_router() -> (axum::Router, Harness) {
    let parts = harness();
    let api = Arc::new(PenaltyApi::new(parts.catalog.clone(), parts.engine.clone()));
    (penalty_router(api), parts)
}
