//! Database lifecycle status for a tenant's data store.

use serde::{Deserialize, Serialize};

/// Provisioning/migration state of a tenant's database.
///
/// Transitions follow a fixed state machine and are persisted before the
/// causing operation's side effects complete, so a crash mid-provisioning
/// leaves an inspectable `Creating`/`Migrating` state instead of silently
/// reverting to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseStatus {
    /// Tenant exists, no database yet.
    #[default]
    Pending,
    /// Provisioning is underway.
    Creating,
    /// Database is reachable and fully migrated.
    Active,
    /// Provisioning failed; see the tenant's `database_error`.
    Failed,
    /// Administratively disabled.
    Disabled,
    /// A schema migration is underway.
    Migrating,
    /// A migration failed partway; forward-only tooling means this state
    /// requires manual remediation before retrying.
    MigrationFailed,
}

impl DatabaseStatus {
    /// Whether the state machine permits moving from `self` to `next`.
    ///
    /// Any state may be `Disabled` administratively, and re-provisioning is
    /// allowed from `Active` so that an idempotent create can short-circuit.
    pub fn can_transition_to(self, next: DatabaseStatus) -> bool {
        use DatabaseStatus::*;

        if self == next || next == Disabled {
            return true;
        }

        matches!(
            (self, next),
            (Pending, Creating)
                | (Creating, Active)
                | (Creating, Failed)
                | (Active, Creating)
                | (Active, Migrating)
                | (Failed, Creating)
                | (Migrating, Active)
                | (Migrating, MigrationFailed)
                | (MigrationFailed, Migrating)
                | (Disabled, Pending)
                | (Disabled, Creating)
        )
    }

    /// True when a provisioning or migration run is currently in flight.
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Creating | Self::Migrating)
    }

    /// True when the tenant's store is usable for tenant-scoped requests.
    pub fn is_operational(self) -> bool {
        self == Self::Active
    }
}

impl std::fmt::Display for DatabaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Creating => write!(f, "creating"),
            Self::Active => write!(f, "active"),
            Self::Failed => write!(f, "failed"),
            Self::Disabled => write!(f, "disabled"),
            Self::Migrating => write!(f, "migrating"),
            Self::MigrationFailed => write!(f, "migration_failed"),
        }
    }
}
