//! Error handling for the quote/audit core

use rust_decimal::Decimal;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid amount for {field}: {reason}")]
    InvalidAmount { field: &'static str, reason: String },

    #[error("Invalid percentage: {0} (must be greater than zero)")]
    InvalidPercentage(Decimal),

    #[error("Cannot {action} {entity} in status '{from}'")]
    InvalidTransition {
        entity: &'static str,
        from: &'static str,
        action: &'static str,
    },

    #[error("Unsupported entity kind: {0}")]
    UnsupportedEntityKind(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Shorthand for an out-of-domain monetary input.
    pub fn invalid_amount(field: &'static str, reason: impl Into<String>) -> Self {
        AppError::InvalidAmount {
            field,
            reason: reason.into(),
        }
    }

    /// Whether a caller treating auditing as best effort may swallow this error.
    ///
    /// Computation and transition errors are never recoverable: they mean the
    /// caller passed bad data.
    pub fn is_audit_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::UnsupportedEntityKind(_) | AppError::Database(_) | AppError::Serialization(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_display() {
        let err = AppError::invalid_amount("quantity", "must not be negative");
        assert_eq!(
            err.to_string(),
            "Invalid amount for quantity: must not be negative"
        );

        let err = AppError::InvalidPercentage(dec!(-5));
        assert!(err.to_string().contains("-5"));

        let err = AppError::InvalidTransition {
            entity: "deposit",
            from: "cancelado",
            action: "mark paid",
        };
        assert_eq!(err.to_string(), "Cannot mark paid deposit in status 'cancelado'");
    }

    #[test]
    fn test_audit_recoverable() {
        assert!(AppError::UnsupportedEntityKind("account".into()).is_audit_recoverable());
        assert!(!AppError::invalid_amount("quantity", "negative").is_audit_recoverable());
        assert!(!AppError::InvalidPercentage(dec!(0)).is_audit_recoverable());
    }
}
