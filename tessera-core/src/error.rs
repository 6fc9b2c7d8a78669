//! Error taxonomy shared across the workspace.

use uuid::Uuid;

/// Result alias for tenant operations.
pub type TenantResult<T> = Result<T, TenantError>;

/// Tenant operation errors.
///
/// Expected conditions (a missing tenant, a duplicate identifier) are values
/// of this enum, never panics. Display text is safe to surface: connection
/// strings must be masked before they are embedded in a variant.
#[derive(Debug, thiserror::Error)]
pub enum TenantError {
    /// No tenant, domain or setting matched the lookup.
    #[error("Tenant not found: {0}")]
    NotFound(String),

    /// The tenant exists but is deactivated. Distinct from `NotFound` so
    /// callers can answer 403 instead of 404.
    #[error("Tenant is inactive: {0}")]
    Inactive(String),

    /// Duplicate identifier or domain on create, or an illegal state change.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Malformed, empty or unreachable tenant connection string.
    #[error("Invalid connection string: {0}")]
    ConnectionInvalid(String),

    /// Infrastructure-level provisioning failure, with the underlying cause.
    #[error("Provisioning failed: {0}")]
    ProvisioningFailed(String),

    /// Infrastructure-level migration failure, with the underlying cause.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A provisioning or migration run is already underway for this tenant.
    #[error("Provisioning already in progress for tenant {0}")]
    ProvisioningInProgress(Uuid),

    /// A transaction was rolled back; the caller must retry the whole
    /// operation, not resume it.
    #[error("Transaction aborted: {0}")]
    TransactionAborted(String),

    /// Unexpected storage or I/O fault.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl TenantError {
    /// HTTP status code an administrative endpoint should answer with.
    ///
    /// NotFound maps to 404, Inactive to 403, user errors to 400, everything
    /// unexpected to 500. Presentation layers should pair 500 with a generic
    /// message rather than the error text.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Inactive(_) => 403,
            Self::Conflict(_) | Self::ConnectionInvalid(_) => 400,
            Self::ProvisioningInProgress(_) => 409,
            Self::ProvisioningFailed(_)
            | Self::MigrationFailed(_)
            | Self::TransactionAborted(_)
            | Self::Storage(_) => 500,
        }
    }

    /// True for conditions that are worth retrying as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransactionAborted(_) | Self::ProvisioningInProgress(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(TenantError::NotFound("x".into()).status_code(), 404);
        assert_eq!(TenantError::Inactive("x".into()).status_code(), 403);
        assert_eq!(TenantError::Conflict("x".into()).status_code(), 400);
        assert_eq!(
            TenantError::ConnectionInvalid("x".into()).status_code(),
            400
        );
        assert_eq!(TenantError::Storage("x".into()).status_code(), 500);
    }

    #[test]
    fn test_retryable() {
        assert!(TenantError::TransactionAborted("x".into()).is_retryable());
        assert!(!TenantError::NotFound("x".into()).is_retryable());
    }
}
