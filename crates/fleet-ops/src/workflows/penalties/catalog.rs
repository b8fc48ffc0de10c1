use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;

use super::domain::{NewPenalty, Penalty, PenaltyId, PenaltyTrigger, PenaltyUpdate, TriggerKind};
use super::repository::{PenaltyFilter, PenaltyRepository, RepositoryError};

static PENALTY_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_penalty_id() -> PenaltyId {
    let id = PENALTY_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    PenaltyId(format!("pen-{id:06}"))
}

/// Catalog service over the penalty rule table.
pub struct PenaltyCatalog<R> {
    repository: Arc<R>,
}

impl<R> PenaltyCatalog<R>
where
    R: PenaltyRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Create a rule, rejecting case-insensitive name collisions and applying
    /// the documented field defaults.
    pub fn create(&self, new: NewPenalty) -> Result<Penalty, CatalogError> {
        if self.repository.find_by_name(&new.name)?.is_some() {
            return Err(CatalogError::NameTaken(new.name));
        }

        let now = Utc::now();
        let penalty = Penalty {
            id: next_penalty_id(),
            name: new.name,
            description: new.description,
            amount_cents: new.amount_cents,
            kind: new.kind,
            is_active: true,
            is_automatic: new.is_automatic,
            trigger: new.trigger.unwrap_or(PenaltyTrigger::Manual),
            category: new.category,
            severity: new.severity,
            notifications: new.notifications.unwrap_or_default(),
            block_driver: new.block_driver,
            created_at: now,
            updated_at: now,
        };

        Ok(self.repository.insert(penalty)?)
    }

    /// Merge the provided fields into an existing rule. A name change re-runs
    /// the uniqueness check, excluding the rule itself.
    pub fn update(&self, id: &PenaltyId, update: PenaltyUpdate) -> Result<Penalty, CatalogError> {
        let mut penalty = self
            .repository
            .fetch(id)?
            .ok_or(CatalogError::NotFound)?;

        if let Some(name) = update.name {
            let collides = self
                .repository
                .find_by_name(&name)?
                .is_some_and(|existing| existing.id != penalty.id);
            if collides {
                return Err(CatalogError::NameTaken(name));
            }
            penalty.name = name;
        }
        if let Some(description) = update.description {
            penalty.description = Some(description);
        }
        if let Some(amount_cents) = update.amount_cents {
            penalty.amount_cents = amount_cents;
        }
        if let Some(kind) = update.kind {
            penalty.kind = kind;
        }
        if let Some(is_active) = update.is_active {
            penalty.is_active = is_active;
        }
        if let Some(is_automatic) = update.is_automatic {
            penalty.is_automatic = is_automatic;
        }
        if let Some(trigger) = update.trigger {
            penalty.trigger = trigger;
        }
        if let Some(category) = update.category {
            penalty.category = category;
        }
        if let Some(severity) = update.severity {
            penalty.severity = severity;
        }
        if let Some(notifications) = update.notifications {
            penalty.notifications = notifications;
        }
        if let Some(block_driver) = update.block_driver {
            penalty.block_driver = block_driver;
        }
        penalty.updated_at = Utc::now();

        self.repository.update(penalty.clone())?;
        Ok(penalty)
    }

    /// Soft delete: the rule stays resolvable for historical ledger joins but
    /// drops out of active listings and deduction eligibility.
    pub fn deactivate(&self, id: &PenaltyId) -> Result<Penalty, CatalogError> {
        let mut penalty = self
            .repository
            .fetch(id)?
            .ok_or(CatalogError::NotFound)?;
        penalty.is_active = false;
        penalty.updated_at = Utc::now();
        self.repository.update(penalty.clone())?;
        Ok(penalty)
    }

    pub fn get(&self, id: &PenaltyId) -> Result<Penalty, CatalogError> {
        self.repository
            .fetch(id)?
            .ok_or(CatalogError::NotFound)
    }

    /// Rules matching the filter, newest first.
    pub fn list(&self, filter: &PenaltyFilter) -> Result<Vec<Penalty>, CatalogError> {
        Ok(self.repository.list(filter)?)
    }

    /// The active automatic rule registered for a trigger kind, if any.
    pub fn find_by_trigger(&self, trigger: TriggerKind) -> Result<Option<Penalty>, CatalogError> {
        Ok(self.repository.find_by_trigger(trigger)?)
    }
}

/// Error raised by the penalty catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("penalty not found")]
    NotFound,
    #[error("penalty '{0}' already exists")]
    NameTaken(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
