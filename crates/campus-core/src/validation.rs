//! # Validation Module
//!
//! Input validation utilities for Campus.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP handler (axum)                                          │
//! │  └── Type validation (JSON deserialization)                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Repository entry points                                      │
//! │  └── THIS MODULE: field formats, ranges, bulk sizes                    │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  ├── UNIQUE and partial UNIQUE indexes                                 │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use campus_core::validation::{validate_day_of_week, validate_name};
//!
//! validate_name("first_name", "Amina", 100).unwrap();
//! assert!(validate_day_of_week(8).is_err());
//! ```

use crate::error::ValidationError;
use crate::{MAX_AMOUNT_CENTS, MAX_BULK_ROWS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Rejects empty or whitespace-only values.
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a display name (person, class, subject, fee line...).
///
/// ## Rules
/// - Must not be blank
/// - At most `max` characters after trimming
pub fn validate_name(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    validate_required(field, value)?;

    if value.trim().chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Loose email check: one `@`, non-empty local part, dotted domain.
///
/// ## Example
/// ```rust
/// use campus_core::validation::validate_email;
///
/// assert!(validate_email("m.otieno@school.ac.ke").is_ok());
/// assert!(validate_email("otieno@").is_err());
/// ```
pub fn validate_email(email: &str) -> ValidationResult<()> {
    validate_name("email", email, 254)?;

    let invalid = || ValidationError::InvalidFormat {
        field: "email".to_string(),
        reason: "must look like name@domain.tld".to_string(),
    };

    let (local, domain) = email.trim().split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
    {
        return Err(invalid());
    }

    Ok(())
}

/// Phone numbers: digits with an optional leading `+`, 7 to 15 digits.
pub fn validate_phone(field: &str, phone: &str) -> ValidationResult<()> {
    let phone = phone.trim();
    let digits = phone.strip_prefix('+').unwrap_or(phone);

    if digits.len() < 7 || digits.len() > 15 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must be 7-15 digits with optional leading +".to_string(),
        });
    }

    Ok(())
}

/// Academic years are written as a four-digit year, e.g. "2025".
pub fn validate_academic_year(year: &str) -> ValidationResult<()> {
    let year = year.trim();
    if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "academic_year".to_string(),
            reason: "expected a four-digit year".to_string(),
        });
    }
    Ok(())
}

/// Period boundaries are "HH:MM" on a 24-hour clock.
pub fn validate_time_of_day(field: &str, value: &str) -> ValidationResult<()> {
    let invalid = || ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "expected HH:MM".to_string(),
    };

    let (hh, mm) = value.split_once(':').ok_or_else(invalid)?;
    if hh.len() != 2 || mm.len() != 2 {
        return Err(invalid());
    }
    let hh: u32 = hh.parse().map_err(|_| invalid())?;
    let mm: u32 = mm.parse().map_err(|_| invalid())?;
    if hh > 23 || mm > 59 {
        return Err(invalid());
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Day of week, 1 = Monday through 7 = Sunday.
pub fn validate_day_of_week(day: i64) -> ValidationResult<()> {
    if !(1..=7).contains(&day) {
        return Err(ValidationError::OutOfRange {
            field: "day_of_week".to_string(),
            min: 1,
            max: 7,
        });
    }
    Ok(())
}

/// Validates a fee amount in cents. Zero is allowed (waived lines); the
/// ceiling is [`MAX_AMOUNT_CENTS`].
///
/// ## Example
/// ```rust
/// use campus_core::validation::validate_amount_cents;
///
/// assert!(validate_amount_cents("amount", 1_200_000).is_ok());
/// assert!(validate_amount_cents("amount", 0).is_ok());
/// assert!(validate_amount_cents("amount", -100).is_err());
/// assert!(validate_amount_cents("amount", i64::MAX).is_err());
/// ```
pub fn validate_amount_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_AMOUNT_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_AMOUNT_CENTS,
        });
    }
    Ok(())
}

/// Validates a payment amount in cents.
///
/// ## Rules
/// - Must be positive (> 0)
pub fn validate_payment_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }
    Ok(())
}

/// Percentage discounts are basis points between 0 and 10000 (0% to 100%).
pub fn validate_percentage_bps(bps: i64) -> ValidationResult<()> {
    if !(0..=10_000).contains(&bps) {
        return Err(ValidationError::OutOfRange {
            field: "value".to_string(),
            min: 0,
            max: 10_000,
        });
    }
    Ok(())
}

/// Exam scores run from zero to the exam's maximum.
pub fn validate_score(score: i64, max_score: i64) -> ValidationResult<()> {
    if !(0..=max_score).contains(&score) {
        return Err(ValidationError::OutOfRange {
            field: "score".to_string(),
            min: 0,
            max: max_score,
        });
    }
    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Bulk endpoints accept between 1 and [`MAX_BULK_ROWS`] rows.
pub fn validate_bulk_size(field: &str, rows: usize) -> ValidationResult<()> {
    if rows == 0 {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    if rows > MAX_BULK_ROWS {
        return Err(ValidationError::TooManyRows {
            field: field.to_string(),
            max: MAX_BULK_ROWS,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
