//! # campus-db: Database Layer for Campus
//!
//! SQLite persistence for the school administration backend, built on
//! sqlx with runtime-checked queries.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Campus Data Flow                                 │
//! │                                                                         │
//! │  axum handler (POST /api/payments)                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     campus-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ student.rs    │    │  (embedded)  │  │   │
//! │  │   │               │    │ timetable.rs  │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ invoice.rs    │    │ 0001_initial │  │   │
//! │  │   │               │    │ payment.rs    │    │ _schema.sql  │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                               │                                 │   │
//! │  │                               ▼                                 │   │
//! │  │                 campus-core (pure rules: ledger, conflicts)     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (CAMPUS_DATABASE_PATH)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - One repository per aggregate
//!
//! ## Usage
//!
//! ```rust,ignore
//! use campus_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("campus.db")).await?;
//!
//! let month = "2025-03".parse()?;
//! let invoice = db.invoices().generate(&student_id, month, None).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::attendance::{AttendanceEntry, AttendanceSummary, MarkAttendance};
pub use repository::catalog::{NewPeriod, NewRoom, NewSubject};
pub use repository::class::NewClass;
pub use repository::exam::{NewExam, ResultEntry};
pub use repository::fee::{
    DiscountAssignment, FeeStructureFilter, FeeStructureUpdate, NewDiscount, NewFeeStructure,
};
pub use repository::invoice::{InvoiceDetail, InvoiceFilter, InvoiceTarget};
pub use repository::notification::NewNotification;
pub use repository::payment::{MobileConfirmation, MobilePaymentRequest, NewPayment, PaymentReceipt};
pub use repository::student::{NewStudent, StudentFilter, StudentUpdate};
pub use repository::teacher::{NewTeacher, TeacherUpdate};
pub use repository::timetable::{NewTimetableEntry, TimetableUpdate};
