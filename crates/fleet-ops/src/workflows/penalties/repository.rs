use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ActivityLog, Driver, DriverId, DriverStatus, DriverTransaction, FranchiseId, Penalty,
    PenaltyCategory, PenaltyId, PenaltyKind, PenaltySeverity, StaffContact, TriggerKind, TripId,
    TripSummary, UserId,
};

/// Exact-match filters plus free-text search over the penalty catalog.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PenaltyFilter {
    #[serde(default)]
    pub category: Option<PenaltyCategory>,
    #[serde(default)]
    pub severity: Option<PenaltySeverity>,
    #[serde(default)]
    pub kind: Option<PenaltyKind>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_automatic: Option<bool>,
    #[serde(default)]
    pub trigger: Option<TriggerKind>,
    /// Case-insensitive substring matched against name OR description.
    #[serde(default)]
    pub search: Option<String>,
}

impl PenaltyFilter {
    /// Shared filter semantics so every store backend matches rows the same
    /// way.
    pub fn matches(&self, penalty: &Penalty) -> bool {
        if self.category.is_some_and(|c| c != penalty.category) {
            return false;
        }
        if self.severity.is_some_and(|s| s != penalty.severity) {
            return false;
        }
        if self.kind.is_some_and(|k| k != penalty.kind) {
            return false;
        }
        if self.is_active.is_some_and(|a| a != penalty.is_active) {
            return false;
        }
        if self.is_automatic.is_some_and(|a| a != penalty.is_automatic) {
            return false;
        }
        if self.trigger.is_some_and(|t| t != penalty.trigger.kind()) {
            return false;
        }
        if let Some(needle) = self.search.as_deref() {
            let needle = needle.to_lowercase();
            let in_name = penalty.name.to_lowercase().contains(&needle);
            let in_description = penalty
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle));
            if !in_name && !in_description {
                return false;
            }
        }
        true
    }
}

/// Storage abstraction over the penalty rule table.
pub trait PenaltyRepository: Send + Sync {
    fn insert(&self, penalty: Penalty) -> Result<Penalty, RepositoryError>;
    fn update(&self, penalty: Penalty) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &PenaltyId) -> Result<Option<Penalty>, RepositoryError>;
    /// Rows matching the filter, ordered by `created_at` descending.
    fn list(&self, filter: &PenaltyFilter) -> Result<Vec<Penalty>, RepositoryError>;
    /// Case-insensitive exact match on the rule name.
    fn find_by_name(&self, name: &str) -> Result<Option<Penalty>, RepositoryError>;
    /// At most one active automatic rule for the trigger kind.
    fn find_by_trigger(&self, trigger: TriggerKind) -> Result<Option<Penalty>, RepositoryError>;
}

/// Balance movement returned by an atomic incentive adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IncentiveAdjustment {
    pub previous_cents: i64,
    pub new_cents: i64,
}

/// Storage abstraction over drivers, the incentive ledger, the activity log,
/// and the trip projections joined into history queries.
pub trait FleetRepository: Send + Sync {
    fn insert_driver(&self, driver: Driver) -> Result<Driver, RepositoryError>;
    fn driver(&self, id: &DriverId) -> Result<Option<Driver>, RepositoryError>;
    /// Applies `delta_cents` to the driver's incentive balance as a single
    /// atomic operation and reports the balance before and after. The balance
    /// is allowed to go negative.
    fn adjust_incentive(
        &self,
        id: &DriverId,
        delta_cents: i64,
    ) -> Result<IncentiveAdjustment, RepositoryError>;
    fn set_driver_status(
        &self,
        id: &DriverId,
        status: DriverStatus,
    ) -> Result<Driver, RepositoryError>;
    fn append_transaction(
        &self,
        transaction: DriverTransaction,
    ) -> Result<DriverTransaction, RepositoryError>;
    /// Penalty-kind ledger rows for the driver, bounded inclusively by the
    /// given instants (either bound omittable), ordered by `created_at`
    /// descending.
    fn penalty_history(
        &self,
        driver: &DriverId,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<DriverTransaction>, RepositoryError>;
    fn append_activity(&self, entry: ActivityLog) -> Result<ActivityLog, RepositoryError>;
    fn activities_for(&self, driver: &DriverId) -> Result<Vec<ActivityLog>, RepositoryError>;
    fn insert_trip(&self, trip: TripSummary) -> Result<TripSummary, RepositoryError>;
    fn trip(&self, id: &TripId) -> Result<Option<TripSummary>, RepositoryError>;
}

/// Lookup of platform staff for notification fan-out and attribution.
pub trait StaffDirectory: Send + Sync {
    fn active_admins(&self) -> Result<Vec<StaffContact>, RepositoryError>;
    fn active_managers(
        &self,
        franchise: &FranchiseId,
    ) -> Result<Vec<StaffContact>, RepositoryError>;
    fn user(&self, id: &UserId) -> Result<Option<StaffContact>, RepositoryError>;
}

/// Payload handed to the mail transport for each penalty notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenaltyNotice {
    pub penalty_name: String,
    pub driver_code: String,
    pub driver_name: String,
    pub amount_cents: i64,
    pub reason: Option<String>,
    pub applied_by: String,
    pub occurred_at: DateTime<Utc>,
}

/// Outbound mail seam; the real transport is an external collaborator.
pub trait PenaltyMailer: Send + Sync {
    fn send(&self, recipient: &str, notice: &PenaltyNotice) -> Result<(), MailError>;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Mail dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail transport unavailable: {0}")]
    Transport(String),
}
