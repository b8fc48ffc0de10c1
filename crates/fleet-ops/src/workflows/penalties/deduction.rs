use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use super::domain::{
    ActivityAction, ActivityLog, DeductionSnapshot, Driver, DriverId, DriverStatus,
    DriverTransaction, LedgerEntryKind, Penalty, PenaltyId, StaffContact, StatusTransition,
    TransactionDirection, TransactionId, TripId, TripSummary, UserId,
};
use super::repository::{
    FleetRepository, PenaltyMailer, PenaltyNotice, PenaltyRepository, RepositoryError,
    StaffDirectory,
};

static TRANSACTION_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static ACTIVITY_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_transaction_id() -> TransactionId {
    let id = TRANSACTION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    TransactionId(format!("txn-{id:06}"))
}

fn next_activity_id() -> String {
    let id = ACTIVITY_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("act-{id:06}")
}

/// Request to debit a driver against a catalog rule. `amount_cents` overrides
/// the rule's default when provided.
#[derive(Debug, Clone)]
pub struct DeductionRequest {
    pub penalty_id: PenaltyId,
    pub driver_id: DriverId,
    pub amount_cents: Option<i64>,
    pub reason: Option<String>,
    pub trip_id: Option<TripId>,
    pub applied_by: UserId,
}

/// Result of a successful deduction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeductionOutcome {
    pub transaction: DriverTransaction,
    pub previous_incentive_cents: i64,
    pub new_incentive_cents: i64,
}

/// Ledger row joined with the rule, the applying user, and the linked trip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PenaltyHistoryEntry {
    pub transaction: DriverTransaction,
    pub penalty: Option<Penalty>,
    pub applied_by: Option<StaffContact>,
    pub trip: Option<TripSummary>,
}

/// Best-effort email fan-out for applied penalties.
///
/// Nothing here can fail the caller: directory misses degrade to an empty
/// recipient group and each failed send is logged and skipped so one bad
/// address never starves the remaining recipients.
pub struct NotificationDispatcher<S, M> {
    directory: Arc<S>,
    mailer: Arc<M>,
}

impl<S, M> NotificationDispatcher<S, M>
where
    S: StaffDirectory + 'static,
    M: PenaltyMailer + 'static,
{
    pub fn new(directory: Arc<S>, mailer: Arc<M>) -> Self {
        Self { directory, mailer }
    }

    pub fn broadcast(
        &self,
        penalty: &Penalty,
        driver: &Driver,
        amount_cents: i64,
        reason: Option<&str>,
        applied_by: &UserId,
    ) {
        let applied_by_name = match self.directory.user(applied_by) {
            Ok(Some(contact)) => contact.name,
            Ok(None) => applied_by.0.clone(),
            Err(err) => {
                warn!(user = %applied_by.0, error = %err, "actor lookup failed for penalty notice");
                applied_by.0.clone()
            }
        };

        let notice = PenaltyNotice {
            penalty_name: penalty.name.clone(),
            driver_code: driver.driver_code.clone(),
            driver_name: driver.full_name.clone(),
            amount_cents,
            reason: reason.map(str::to_string),
            applied_by: applied_by_name,
            occurred_at: Utc::now(),
        };

        let mut recipients: Vec<String> = Vec::new();
        if penalty.notifications.notify_admin {
            match self.directory.active_admins() {
                Ok(admins) => recipients.extend(admins.into_iter().filter_map(|c| c.email)),
                Err(err) => warn!(error = %err, "admin directory lookup failed"),
            }
        }
        if penalty.notifications.notify_manager {
            match self.directory.active_managers(&driver.franchise_id) {
                Ok(managers) => recipients.extend(managers.into_iter().filter_map(|c| c.email)),
                Err(err) => {
                    warn!(franchise = %driver.franchise_id.0, error = %err, "manager directory lookup failed");
                }
            }
        }
        if penalty.notifications.notify_driver {
            if let Some(email) = &driver.email {
                recipients.push(email.clone());
            }
        }

        for recipient in recipients {
            if let Err(err) = self.mailer.send(&recipient, &notice) {
                warn!(%recipient, penalty = %penalty.name, error = %err, "penalty notification send failed");
            }
        }
    }
}

/// Service applying catalog rules to driver balances: the deduction workflow,
/// the block/unblock status workflow, and the penalty history query.
pub struct DeductionService<P, F, S, M> {
    penalties: Arc<P>,
    fleet: Arc<F>,
    directory: Arc<S>,
    dispatcher: NotificationDispatcher<S, M>,
}

impl<P, F, S, M> DeductionService<P, F, S, M>
where
    P: PenaltyRepository + 'static,
    F: FleetRepository + 'static,
    S: StaffDirectory + 'static,
    M: PenaltyMailer + 'static,
{
    pub fn new(penalties: Arc<P>, fleet: Arc<F>, directory: Arc<S>, mailer: Arc<M>) -> Self {
        let dispatcher = NotificationDispatcher::new(directory.clone(), mailer);
        Self {
            penalties,
            fleet,
            directory,
            dispatcher,
        }
    }

    /// Debit a driver against a catalog rule.
    ///
    /// Writes one ledger row and moves the incentive balance, then runs the
    /// rule's side effects: best-effort notifications and, for blocking
    /// rules, the status workflow. There is no idempotency key; calling twice
    /// with the same inputs deducts twice.
    pub fn apply_deduction(
        &self,
        request: DeductionRequest,
    ) -> Result<DeductionOutcome, DeductionError> {
        let penalty = self
            .penalties
            .fetch(&request.penalty_id)?
            .ok_or(DeductionError::PenaltyNotFound)?;
        if !penalty.is_active {
            return Err(DeductionError::PenaltyInactive(penalty.name));
        }

        let driver = self
            .fleet
            .driver(&request.driver_id)?
            .ok_or(DeductionError::DriverNotFound)?;

        let deduction = request.amount_cents.unwrap_or(penalty.amount_cents);

        // Single atomic balance movement; may go negative.
        let adjustment = self.fleet.adjust_incentive(&driver.id, -deduction)?;

        let applied_at = Utc::now();
        let description = request
            .reason
            .clone()
            .or_else(|| penalty.description.clone())
            .unwrap_or_else(|| format!("Penalty: {}", penalty.name));

        let transaction = self.fleet.append_transaction(DriverTransaction {
            id: next_transaction_id(),
            driver_id: driver.id.clone(),
            amount_cents: -deduction,
            direction: TransactionDirection::Debit,
            kind: LedgerEntryKind::Penalty,
            description,
            trip_id: request.trip_id.clone(),
            penalty_id: Some(penalty.id.clone()),
            applied_by: request.applied_by.clone(),
            metadata: Some(DeductionSnapshot {
                penalty_name: penalty.name.clone(),
                category: penalty.category,
                severity: penalty.severity,
                previous_incentive_cents: adjustment.previous_cents,
                new_incentive_cents: adjustment.new_cents,
                applied_at,
            }),
            created_at: applied_at,
        })?;

        if penalty.notifications.any() {
            self.dispatcher.broadcast(
                &penalty,
                &driver,
                deduction,
                request.reason.as_deref(),
                &request.applied_by,
            );
        }

        if penalty.block_driver && driver.status != DriverStatus::Blocked {
            let reason = format!("Automatic block due to: {}", penalty.name);
            self.block_driver(&driver.id, &reason, &request.applied_by)?;
        }

        Ok(DeductionOutcome {
            transaction,
            previous_incentive_cents: adjustment.previous_cents,
            new_incentive_cents: adjustment.new_cents,
        })
    }

    /// Set the driver to `Blocked` and record the transition. No precondition
    /// on the current status beyond the caller's own checks.
    pub fn block_driver(
        &self,
        driver_id: &DriverId,
        reason: &str,
        actor: &UserId,
    ) -> Result<Driver, DeductionError> {
        self.transition_status(driver_id, DriverStatus::Blocked, reason, actor)
    }

    /// Set the driver back to `Active` and record the transition.
    pub fn unblock_driver(
        &self,
        driver_id: &DriverId,
        reason: &str,
        actor: &UserId,
    ) -> Result<Driver, DeductionError> {
        self.transition_status(driver_id, DriverStatus::Active, reason, actor)
    }

    fn transition_status(
        &self,
        driver_id: &DriverId,
        status: DriverStatus,
        reason: &str,
        actor: &UserId,
    ) -> Result<Driver, DeductionError> {
        let current = self
            .fleet
            .driver(driver_id)?
            .ok_or(DeductionError::DriverNotFound)?;
        let previous = current.status;

        let updated = self.fleet.set_driver_status(driver_id, status)?;

        self.fleet.append_activity(ActivityLog {
            id: next_activity_id(),
            action: ActivityAction::DriverStatusChanged,
            driver_id: driver_id.clone(),
            actor: actor.clone(),
            description: reason.to_string(),
            transition: StatusTransition {
                previous,
                new: status,
                reason: reason.to_string(),
            },
            created_at: Utc::now(),
        })?;

        Ok(updated)
    }

    /// Penalty ledger rows for the driver within the inclusive bounds, newest
    /// first, each joined with the producing rule (resolvable even when soft
    /// deleted), the applying user, and the linked trip.
    pub fn driver_penalty_history(
        &self,
        driver_id: &DriverId,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<PenaltyHistoryEntry>, DeductionError> {
        let rows = self.fleet.penalty_history(driver_id, start, end)?;

        let mut entries = Vec::with_capacity(rows.len());
        for transaction in rows {
            let penalty = match &transaction.penalty_id {
                Some(id) => self.penalties.fetch(id)?,
                None => None,
            };
            let applied_by = self.directory.user(&transaction.applied_by)?;
            let trip = match &transaction.trip_id {
                Some(id) => self.fleet.trip(id)?,
                None => None,
            };
            entries.push(PenaltyHistoryEntry {
                transaction,
                penalty,
                applied_by,
                trip,
            });
        }
        Ok(entries)
    }
}

/// Error raised by the deduction and status workflows.
#[derive(Debug, thiserror::Error)]
pub enum DeductionError {
    #[error("penalty not found")]
    PenaltyNotFound,
    #[error("penalty '{0}' is not active")]
    PenaltyInactive(String),
    #[error("driver not found")]
    DriverNotFound,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
