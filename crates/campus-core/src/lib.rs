//! # campus-core: Pure Business Logic for Campus
//!
//! School administration rules as pure functions with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Campus Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Admin frontend (external)                       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ JSON over HTTP                         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    campus-api (axum routes)                     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  campus-db (repositories)                       │   │
//! │  │         SQLite statements, transactions, migrations             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ campus-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   types   money   month   timetable   ledger   sequence         │   │
//! │  │   validation   bulk   error                                     │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain row types and status enums
//! - [`money`] - Integer-cents money and basis-point rates
//! - [`month`] - Billing month key and due dates
//! - [`timetable`] - Double-booking detection
//! - [`ledger`] - Invoice totals and payment application
//! - [`sequence`] - Admission / employee / invoice / receipt code formats
//! - [`bulk`] - `{success, failed}` accumulator for bulk endpoints
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use campus_core::ledger::{compute_invoice, FeeLine};
//! use campus_core::money::Money;
//!
//! let lines = vec![FeeLine {
//!     fee_structure_id: None,
//!     description: "Tuition".to_string(),
//!     amount: Money::from_units(10_000),
//! }];
//!
//! let totals = compute_invoice(&lines, &[]);
//! assert_eq!(totals.balance, Money::from_units(10_000));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod bulk;
pub mod error;
pub mod ledger;
pub mod money;
pub mod month;
pub mod sequence;
pub mod timetable;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use bulk::{BulkFailure, BulkResult};
pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use money::{Money, Percentage};
pub use month::BillingMonth;
pub use timetable::{BookingSlot, SlotConflict};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Day of the billing month on which invoices fall due.
pub const INVOICE_DUE_DAY: u32 = 10;

/// Maximum rows accepted by a single bulk request.
///
/// ## Business Reason
/// Large schools mark a few hundred students at a time; anything beyond
/// this is almost certainly a client bug and would hold the write lock.
pub const MAX_BULK_ROWS: usize = 1000;

/// Largest single fee or fixed discount, in cents (10 billion units).
///
/// Keeps invoice totals far from `i64` overflow however many lines a
/// class is billed for.
pub const MAX_AMOUNT_CENTS: i64 = 1_000_000_000_000;

/// Longest accepted person / class / fee name.
pub const MAX_NAME_LEN: usize = 100;
