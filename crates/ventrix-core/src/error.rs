//! # Error Types
//!
//! Domain-specific error types for ventrix-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  ventrix-core errors (this file)                                       │
//! │  ├── CoreError        - Lifecycle/state rule violations                │
//! │  ├── ValidationError  - Input validation failures                      │
//! │  └── ErrorKind        - Stable classification callers branch on       │
//! │                                                                         │
//! │  ventrix-db errors (separate crate)                                    │
//! │  └── DbError          - NotFound, Conflict, wraps CoreError            │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (ids, field names)
//! 3. Errors are enum variants, never String
//! 4. Every error maps to exactly one [`ErrorKind`]

use serde::Serialize;
use thiserror::Error;

use crate::types::EstadoPedido;

// =============================================================================
// Error Kind
// =============================================================================

/// Stable failure classification.
///
/// Every error in the workspace reports one of these through `kind()`.
/// The serialized form (`NOT_FOUND`, `CONFLICT`, ...) is the code clients
/// branch on, so variant names must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Referenced entity or id is absent.
    NotFound,
    /// Uniqueness violation, or the entity is still referenced.
    Conflict,
    /// Operation not permitted in the current lifecycle state.
    InvalidState,
    /// Malformed or out-of-range input.
    ValidationError,
    /// Lock timeout or pool exhaustion; the caller may retry.
    Transient,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// Returns the stable machine-readable code.
    pub const fn code(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::InvalidState => "INVALID_STATE",
            ErrorKind::ValidationError => "VALIDATION_ERROR",
            ErrorKind::Transient => "TRANSIENT",
            ErrorKind::Internal => "INTERNAL",
        }
    }

    /// Whether retrying the same call may succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Transient)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

// =============================================================================
// Core Error
// =============================================================================

/// Domain rule violations.
///
/// These come out of pure checks (state machine, order immutability) and
/// are raised before any row is written.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Order is in a state that forbids touching its lines.
    ///
    /// ## When This Occurs
    /// - Adding, changing or removing a line of a PAGADO order
    /// - Editing or deleting a PAGADO order
    ///
    /// ## User Workflow
    /// ```text
    /// Cashier closes table 4 ──► Pedido #12 PAGADO
    ///      │
    ///      ▼
    /// Waiter adds "Limonada" to #12
    ///      │
    ///      ▼
    /// OrderLocked { id_pedido: 12, estado: Pagado }
    /// ```
    #[error("Pedido {id_pedido} is {estado}, its lines cannot change")]
    OrderLocked { id_pedido: i64, estado: EstadoPedido },

    /// Requested state ranks below the current one.
    #[error("Pedido {id_pedido} cannot move back from {from} to {to}")]
    BackwardTransition {
        id_pedido: i64,
        from: EstadoPedido,
        to: EstadoPedido,
    },

    /// Product is flagged as unavailable.
    #[error("Producto {id_producto} is not available")]
    ProductUnavailable { id_producto: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::OrderLocked { .. }
            | CoreError::BackwardTransition { .. }
            | CoreError::ProductUnavailable { .. } => ErrorKind::InvalidState,
            CoreError::Validation(_) => ErrorKind::ValidationError,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before anything touches the database.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// A non-nullable field was explicitly set to null in a partial update.
    #[error("{field} cannot be null")]
    NotNullable { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., bad email, bad file extension).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// References point into different branches.
    #[error("{field} belongs to sucursal {found}, expected {expected}")]
    WrongSucursal {
        field: String,
        expected: String,
        found: String,
    },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::OrderLocked {
            id_pedido: 12,
            estado: EstadoPedido::Pagado,
        };
        assert_eq!(
            err.to_string(),
            "Pedido 12 is PAGADO, its lines cannot change"
        );

        let err = CoreError::BackwardTransition {
            id_pedido: 3,
            from: EstadoPedido::Comandado,
            to: EstadoPedido::Ordenado,
        };
        assert_eq!(
            err.to_string(),
            "Pedido 3 cannot move back from COMANDADO to ORDENADO"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "nombre".to_string(),
        };
        assert_eq!(err.to_string(), "nombre is required");

        let err = ValidationError::NotNullable {
            field: "precio".to_string(),
        };
        assert_eq!(err.to_string(), "precio cannot be null");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustBePositive {
            field: "cantidad".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.kind(), ErrorKind::ValidationError);
    }

    #[test]
    fn test_kinds_have_distinct_codes() {
        let kinds = [
            ErrorKind::NotFound,
            ErrorKind::Conflict,
            ErrorKind::InvalidState,
            ErrorKind::ValidationError,
            ErrorKind::Transient,
            ErrorKind::Internal,
        ];
        let codes: std::collections::HashSet<_> = kinds.iter().map(|k| k.code()).collect();
        assert_eq!(codes.len(), kinds.len());
        assert_eq!(
            serde_json::to_string(&ErrorKind::InvalidState).unwrap(),
            "\"INVALID_STATE\""
        );
        assert!(ErrorKind::Transient.is_retryable());
        assert!(!ErrorKind::Conflict.is_retryable());
    }
}
