//! # Repository Module
//!
//! Database repository implementations for Campus.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  axum handler                                                          │
//! │       │                                                                 │
//! │       │  state.db.invoices().generate(&student_id, month, None)        │
//! │       ▼                                                                 │
//! │  InvoiceRepository                                                     │
//! │  ├── validate input (campus-core)                                      │
//! │  ├── BEGIN                                                             │
//! │  ├── load rows, apply pure rules (campus-core)                         │
//! │  ├── allocate codes (sequence)                                         │
//! │  ├── write rows                                                        │
//! │  └── COMMIT (rollback on drop)                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`StudentRepository`](student::StudentRepository) - Students, admission numbers, bulk import
//! - [`TeacherRepository`](teacher::TeacherRepository) - Teaching staff
//! - [`ClassRepository`](class::ClassRepository) - Classes per academic year
//! - [`CatalogRepository`](catalog::CatalogRepository) - Subjects, rooms, periods
//! - [`TimetableRepository`](timetable::TimetableRepository) - Conflict-checked bookings
//! - [`FeeRepository`](fee::FeeRepository) - Fee structures and discounts
//! - [`InvoiceRepository`](invoice::InvoiceRepository) - Invoice generation and overdue sweep
//! - [`PaymentRepository`](payment::PaymentRepository) - Payments and mobile-money confirmation
//! - [`AttendanceRepository`](attendance::AttendanceRepository) - Daily attendance
//! - [`ExamRepository`](exam::ExamRepository) - Exams and results
//! - [`NotificationRepository`](notification::NotificationRepository) - In-app notifications
//! - [`SequenceRepository`](sequence::SequenceRepository) - Code counters

pub mod attendance;
pub mod catalog;
pub mod class;
pub mod exam;
pub mod fee;
pub mod invoice;
pub mod notification;
pub mod payment;
pub mod sequence;
pub mod student;
pub mod teacher;
pub mod timetable;

pub(crate) mod update;

use sqlx::SqliteConnection;

use crate::error::{DbError, DbResult};

/// Fails with NotFound unless `id` names an active row of `table`.
pub(crate) async fn ensure_active(
    conn: &mut SqliteConnection,
    table: &'static str,
    entity: &'static str,
    id: &str,
) -> DbResult<()> {
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1 AND is_active = 1)",
        table
    );
    let exists: i64 = sqlx::query_scalar(&sql).bind(id).fetch_one(&mut *conn).await?;

    if exists == 0 {
        return Err(DbError::not_found(entity, id));
    }
    Ok(())
}

/// Fails with NotFound unless `id` names a row of `table` (no soft delete).
pub(crate) async fn ensure_exists(
    conn: &mut SqliteConnection,
    table: &'static str,
    entity: &'static str,
    id: &str,
) -> DbResult<()> {
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)", table);
    let exists: i64 = sqlx::query_scalar(&sql).bind(id).fetch_one(&mut *conn).await?;

    if exists == 0 {
        return Err(DbError::not_found(entity, id));
    }
    Ok(())
}

/// Maps a failed statement's unique violation on `column` to a domain duplicate.
pub(crate) fn duplicate_on(
    err: DbError,
    entity: &'static str,
    column: &'static str,
    value: &str,
) -> DbError {
    err.on_unique(|field| {
        if field.contains(column) {
            campus_core::CoreError::duplicate(entity, column, value)
        } else {
            campus_core::CoreError::duplicate(entity, field, value)
        }
    })
}
