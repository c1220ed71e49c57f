//! # Error Types
//!
//! Domain-specific error types for campus-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  campus-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  campus-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  campus-api errors (in app)                                            │
//! │  └── ApiError         - What the admin frontend sees (JSON + status)   │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Frontend     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Taxonomy
//! Every [`CoreError`] falls into exactly one [`ErrorKind`]: the API layer
//! turns the kind into an HTTP status and sends the message verbatim.

use thiserror::Error;

use crate::money::Money;
use crate::timetable::SlotConflict;

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse classification used for HTTP status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Referenced entity is absent.
    NotFound,
    /// Uniqueness or state violation (double booking, duplicate invoice, paid invoice).
    Conflict,
    /// Missing or malformed input.
    Validation,
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A referenced record does not exist (or was soft-deleted).
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A timetable booking collides with an active entry.
    ///
    /// ## User Workflow
    /// ```text
    /// Book Grade 4 / Maths / Mr. Otieno / Period 2 / Monday
    ///      │
    ///      ▼
    /// Class check ── hit? ──► "Class is already booked for this period"
    ///      │ miss
    ///      ▼
    /// Teacher check ── hit? ──► "Teacher is already booked for this period"
    ///      │ miss
    ///      ▼
    /// Room check (only when a room is given) ── hit? ──► "Room is already occupied ..."
    /// ```
    #[error("{0}")]
    Timetable(SlotConflict),

    /// An invoice for this student and billing month already exists.
    #[error("Invoice already exists for student {student_id} for {month}")]
    DuplicateInvoice { student_id: String, month: String },

    /// Payments cannot be recorded against a settled invoice.
    #[error("Invoice {invoice_number} is already paid")]
    InvoiceAlreadyPaid { invoice_number: String },

    /// The payment would take the balance below zero.
    #[error("Payment amount {amount} exceeds outstanding balance {balance}")]
    PaymentExceedsBalance { amount: Money, balance: Money },

    /// Fee structures are frozen once an invoice line references them.
    #[error("Fee structure {id} is referenced by an invoice and cannot be modified")]
    FeeStructureLocked { id: String },

    /// A unique business field is already taken.
    #[error("{entity} with {field} '{value}' already exists")]
    Duplicate {
        entity: String,
        field: String,
        value: String,
    },

    /// A class-scoped entry (attendance mark) names a student of another class.
    #[error("Student {student_id} is not enrolled in class {class_id}")]
    NotEnrolled { student_id: String, class_id: String },

    /// The record is not in a state that allows the requested operation.
    #[error("{entity} {id} is {status}, cannot perform operation")]
    InvalidState {
        entity: String,
        id: String,
        status: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("{0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a Duplicate error.
    pub fn duplicate(
        entity: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        CoreError::Duplicate {
            entity: entity.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    /// Returns the taxonomy bucket of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::NotFound { .. } => ErrorKind::NotFound,
            CoreError::Timetable(_)
            | CoreError::DuplicateInvoice { .. }
            | CoreError::InvoiceAlreadyPaid { .. }
            | CoreError::FeeStructureLocked { .. }
            | CoreError::Duplicate { .. }
            | CoreError::InvalidState { .. } => ErrorKind::Conflict,
            CoreError::PaymentExceedsBalance { .. }
            | CoreError::NotEnrolled { .. }
            | CoreError::Validation(_) => ErrorKind::Validation,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before any statement is issued.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid month).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A partial update carried no fields.
    #[error("No fields to update")]
    EmptyUpdate,

    /// A bulk request carried more rows than allowed.
    #[error("{field} cannot contain more than {max} rows")]
    TooManyRows { field: String, max: usize },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
