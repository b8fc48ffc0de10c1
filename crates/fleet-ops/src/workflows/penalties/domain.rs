use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for penalty rule definitions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PenaltyId(pub String);

/// Identifier wrapper for drivers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DriverId(pub String);

/// Identifier wrapper for trips referenced from ledger entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TripId(pub String);

/// Identifier wrapper for platform users (admins, managers, actors).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Identifier wrapper for franchises that own drivers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FranchiseId(pub String);

/// Identifier wrapper for ledger transactions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub String);

/// Distinguishes penalty rules from reserved adjustment rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyKind {
    #[default]
    Penalty,
    Adjustment,
}

/// Operational grouping for penalty rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyCategory {
    #[default]
    Operational,
    Safety,
    Conduct,
    Financial,
}

impl PenaltyCategory {
    pub const fn label(self) -> &'static str {
        match self {
            PenaltyCategory::Operational => "operational",
            PenaltyCategory::Safety => "safety",
            PenaltyCategory::Conduct => "conduct",
            PenaltyCategory::Financial => "financial",
        }
    }
}

/// Severity attached to a penalty rule, surfaced in notifications and audits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltySeverity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl PenaltySeverity {
    pub const fn label(self) -> &'static str {
        match self {
            PenaltySeverity::Low => "low",
            PenaltySeverity::Medium => "medium",
            PenaltySeverity::High => "high",
            PenaltySeverity::Critical => "critical",
        }
    }
}

/// Trigger configuration for a penalty rule.
///
/// Automatic rules carry the thresholds their out-of-band trigger evaluates;
/// manual rules carry nothing. Replaces an untyped configuration blob so each
/// trigger's parameters are part of the variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "trigger_type", rename_all = "snake_case")]
pub enum PenaltyTrigger {
    Manual,
    LateReport { delay_minutes: u32 },
    ComplaintThreshold { complaint_count: u32 },
}

impl PenaltyTrigger {
    pub const fn kind(&self) -> TriggerKind {
        match self {
            PenaltyTrigger::Manual => TriggerKind::Manual,
            PenaltyTrigger::LateReport { .. } => TriggerKind::LateReport,
            PenaltyTrigger::ComplaintThreshold { .. } => TriggerKind::ComplaintThreshold,
        }
    }
}

/// Discriminant for [`PenaltyTrigger`], used for exact-match filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Manual,
    LateReport,
    ComplaintThreshold,
}

fn notify_default_on() -> bool {
    true
}

/// Which stakeholder groups a penalty notifies when applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPolicy {
    #[serde(default = "notify_default_on")]
    pub notify_admin: bool,
    #[serde(default = "notify_default_on")]
    pub notify_manager: bool,
    #[serde(default)]
    pub notify_driver: bool,
}

impl NotificationPolicy {
    pub const fn any(self) -> bool {
        self.notify_admin || self.notify_manager || self.notify_driver
    }
}

impl Default for NotificationPolicy {
    fn default() -> Self {
        Self {
            notify_admin: true,
            notify_manager: true,
            notify_driver: false,
        }
    }
}

/// Penalty rule definition managed by the catalog.
///
/// Rules are never physically removed; `is_active` is toggled off instead so
/// historical ledger entries keep resolving their producing rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Penalty {
    pub id: PenaltyId,
    pub name: String,
    pub description: Option<String>,
    /// Default deduction in minor currency units.
    pub amount_cents: i64,
    pub kind: PenaltyKind,
    pub is_active: bool,
    pub is_automatic: bool,
    pub trigger: PenaltyTrigger,
    pub category: PenaltyCategory,
    pub severity: PenaltySeverity,
    pub notifications: NotificationPolicy,
    pub block_driver: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Intake payload for creating a penalty rule; omitted fields take the
/// documented defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPenalty {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub amount_cents: i64,
    #[serde(default)]
    pub kind: PenaltyKind,
    #[serde(default)]
    pub is_automatic: bool,
    #[serde(default)]
    pub trigger: Option<PenaltyTrigger>,
    #[serde(default)]
    pub category: PenaltyCategory,
    #[serde(default)]
    pub severity: PenaltySeverity,
    #[serde(default)]
    pub notifications: Option<NotificationPolicy>,
    #[serde(default)]
    pub block_driver: bool,
}

/// Partial update for a penalty rule; only provided fields are merged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PenaltyUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub amount_cents: Option<i64>,
    #[serde(default)]
    pub kind: Option<PenaltyKind>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_automatic: Option<bool>,
    #[serde(default)]
    pub trigger: Option<PenaltyTrigger>,
    #[serde(default)]
    pub category: Option<PenaltyCategory>,
    #[serde(default)]
    pub severity: Option<PenaltySeverity>,
    #[serde(default)]
    pub notifications: Option<NotificationPolicy>,
    #[serde(default)]
    pub block_driver: Option<bool>,
}

/// Driver lifecycle status. No transition table is enforced at this layer;
/// the status workflow sets the requested value and records the change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    Active,
    Blocked,
    Suspended,
    Terminated,
}

impl DriverStatus {
    pub const fn label(self) -> &'static str {
        match self {
            DriverStatus::Active => "active",
            DriverStatus::Blocked => "blocked",
            DriverStatus::Suspended => "suspended",
            DriverStatus::Terminated => "terminated",
        }
    }
}

/// Driver projection consumed by the deduction and status workflows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: DriverId,
    pub driver_code: String,
    pub full_name: String,
    pub email: Option<String>,
    pub franchise_id: FranchiseId,
    /// Running incentive balance in minor currency units.
    pub incentive_cents: i64,
    pub status: DriverStatus,
}

/// Direction of a ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionDirection {
    Debit,
    Credit,
}

/// Business classification of a ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryKind {
    Penalty,
    Incentive,
    Adjustment,
}

impl LedgerEntryKind {
    pub const fn label(self) -> &'static str {
        match self {
            LedgerEntryKind::Penalty => "penalty",
            LedgerEntryKind::Incentive => "incentive",
            LedgerEntryKind::Adjustment => "adjustment",
        }
    }
}

/// Snapshot written alongside a penalty deduction so the ledger row stays
/// meaningful even after the rule or the balance moves on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeductionSnapshot {
    pub penalty_name: String,
    pub category: PenaltyCategory,
    pub severity: PenaltySeverity,
    pub previous_incentive_cents: i64,
    pub new_incentive_cents: i64,
    pub applied_at: DateTime<Utc>,
}

/// Append-only ledger entry against a driver's incentive balance.
///
/// Deductions are stored with a negative `amount_cents`. Rows are immutable
/// once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverTransaction {
    pub id: TransactionId,
    pub driver_id: DriverId,
    pub amount_cents: i64,
    pub direction: TransactionDirection,
    pub kind: LedgerEntryKind,
    pub description: String,
    pub trip_id: Option<TripId>,
    pub penalty_id: Option<PenaltyId>,
    pub applied_by: UserId,
    pub metadata: Option<DeductionSnapshot>,
    pub created_at: DateTime<Utc>,
}

/// Audit actions recorded in the activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityAction {
    DriverStatusChanged,
}

impl ActivityAction {
    pub const fn label(self) -> &'static str {
        match self {
            ActivityAction::DriverStatusChanged => "DRIVER_STATUS_CHANGED",
        }
    }
}

/// Typed record of a status change captured in the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub previous: DriverStatus,
    pub new: DriverStatus,
    pub reason: String,
}

/// Append-only audit record written whenever a driver's status changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLog {
    pub id: String,
    pub action: ActivityAction,
    pub driver_id: DriverId,
    pub actor: UserId,
    pub description: String,
    pub transition: StatusTransition,
    pub created_at: DateTime<Utc>,
}

/// Projection of a platform user for notification fan-out and attribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffContact {
    pub id: UserId,
    pub name: String,
    pub email: Option<String>,
}

/// Trip projection joined into penalty history entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripSummary {
    pub id: TripId,
    pub customer_name: String,
    pub pickup_location: String,
}
