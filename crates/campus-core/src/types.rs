//! # Domain Types
//!
//! Row types and status enums shared by every Campus layer.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  People              Academics                 Finance                  │
//! │  ──────              ─────────                 ───────                  │
//! │  Student             SchoolClass               FeeStructure             │
//! │  Teacher             Subject / Room / Period   FeeDiscount              │
//! │                      TimetableEntry            StudentFeeDiscount       │
//! │                      AttendanceRecord          FeeInvoice + Items       │
//! │                      Exam / ExamResult         FeePayment               │
//! │                                                                         │
//! │  Communications: Notification                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for relations
//! - Business code where one exists: admission number, employee id,
//!   invoice number, receipt number
//!
//! ## Soft Delete
//! Entities with an `is_active` flag are never physically removed;
//! deactivation clears the flag and stamps `deleted_at`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// People
// =============================================================================

/// An enrolled (or formerly enrolled) student.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    /// Human-readable code: `STD<yyyy><seq4>`.
    pub admission_number: String,
    pub first_name: String,
    pub last_name: String,
    /// Current class; `None` for students awaiting placement.
    pub class_id: Option<String>,
    #[ts(as = "Option<String>")]
    pub date_of_birth: Option<NaiveDate>,
    pub guardian_name: Option<String>,
    pub guardian_phone: Option<String>,
    #[ts(as = "String")]
    pub admission_date: NaiveDate,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A member of teaching staff.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: String,
    /// Human-readable code: `TCH<yy><seq4>`.
    pub employee_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    #[ts(as = "String")]
    pub hire_date: NaiveDate,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Academics
// =============================================================================

/// A class (stream) for one academic year, e.g. "Grade 4 East" / "2025".
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SchoolClass {
    pub id: String,
    pub name: String,
    pub academic_year: String,
    pub class_teacher_id: Option<String>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub code: String,
    pub name: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub name: String,
    pub capacity: Option<i64>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A teaching period within the school day, e.g. "Period 2" 08:40-09:20.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub id: String,
    pub name: String,
    /// "HH:MM", 24-hour clock.
    pub start_time: String,
    pub end_time: String,
    pub sort_order: i64,
}

/// One booked lesson in the weekly timetable.
///
/// ## Invariants (over active rows)
/// - unique (class_id, period_id, day_of_week, academic_year)
/// - unique (teacher_id, period_id, day_of_week, academic_year)
/// - unique (room_id, period_id, day_of_week, academic_year) when room_id is set
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TimetableEntry {
    pub id: String,
    pub class_id: String,
    pub subject_id: String,
    pub teacher_id: String,
    pub room_id: Option<String>,
    pub period_id: String,
    /// 1 = Monday … 7 = Sunday.
    pub day_of_week: i64,
    pub academic_year: String,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Attendance
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

/// A student's attendance mark for one school day.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub student_id: String,
    pub class_id: String,
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub remarks: Option<String>,
    pub recorded_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Exams
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    pub id: String,
    pub name: String,
    pub class_id: String,
    pub subject_id: String,
    #[ts(as = "String")]
    pub exam_date: NaiveDate,
    pub max_score: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ExamResult {
    pub id: String,
    pub exam_id: String,
    pub student_id: String,
    pub score: i64,
    pub remarks: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Fee Structures & Discounts
// =============================================================================

/// How often a fee recurs. Informational: invoice generation includes every
/// active structure for the class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum FeeFrequency {
    Monthly,
    Termly,
    Annually,
    OneTime,
}

/// A billable fee line, either for one class or (class_id = None) for everyone.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct FeeStructure {
    pub id: String,
    pub class_id: Option<String>,
    pub name: String,
    pub amount_cents: i64,
    pub frequency: FeeFrequency,
    pub academic_year: String,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl FeeStructure {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    /// `value` is basis points of the pre-discount total (500 = 5%).
    Percentage,
    /// `value` is a flat amount in cents.
    Fixed,
}

/// A discount definition, e.g. "Sibling discount 5%".
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct FeeDiscount {
    pub id: String,
    pub name: String,
    pub kind: DiscountKind,
    pub value: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Assignment of a discount to a student over a validity window.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StudentFeeDiscount {
    pub id: String,
    pub student_id: String,
    pub discount_id: String,
    #[ts(as = "String")]
    pub valid_from: NaiveDate,
    /// Open-ended when `None`.
    #[ts(as = "Option<String>")]
    pub valid_until: Option<NaiveDate>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Invoices
// =============================================================================

/// Invoice status.
///
/// ## Transitions
/// ```text
///            payment < balance            payment == balance
/// Pending ───────────────────► Partial ─────────────────────► Paid
///    │                            │
///    └──── due date passes ───────┴──► Overdue ── payment ──► Partial / Paid
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Partial,
    Paid,
    Overdue,
}

impl Default for InvoiceStatus {
    fn default() -> Self {
        InvoiceStatus::Pending
    }
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Partial => "partial",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
        }
    }
}

/// A student's bill for one billing month.
///
/// ## Invariants
/// - `net = total - discount + late_fee + tax`
/// - `balance = net - paid`
/// - `status == Paid` iff `balance <= 0`
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct FeeInvoice {
    pub id: String,
    /// Human-readable code: `INV<yy><mm><seq4>`.
    pub invoice_number: String,
    pub student_id: String,
    /// "YYYY-MM".
    pub billing_month: String,
    pub total_cents: i64,
    pub discount_cents: i64,
    pub late_fee_cents: i64,
    pub tax_cents: i64,
    pub net_cents: i64,
    pub paid_cents: i64,
    pub balance_cents: i64,
    pub status: InvoiceStatus,
    #[ts(as = "String")]
    pub due_date: NaiveDate,
    pub created_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl FeeInvoice {
    #[inline]
    pub fn net(&self) -> Money {
        Money::from_cents(self.net_cents)
    }

    #[inline]
    pub fn paid(&self) -> Money {
        Money::from_cents(self.paid_cents)
    }

    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_cents(self.balance_cents)
    }
}

/// One line of an invoice's breakdown. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct FeeInvoiceItem {
    pub id: String,
    pub invoice_id: String,
    pub fee_structure_id: Option<String>,
    pub description: String,
    pub amount_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Payments
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    MobileMoney,
    Cheque,
    Card,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Mobile-money request sent, awaiting gateway confirmation.
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Success => "success",
            PaymentStatus::Failed => "failed",
        }
    }
}

/// A payment against an invoice. Append-only apart from the
/// pending → success/failed transition of mobile-money payments.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct FeePayment {
    pub id: String,
    pub invoice_id: String,
    /// `REC<yy><seq6>` or `MREC<yy><seq6>` for mobile money.
    pub receipt_number: String,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    pub status: PaymentStatus,
    /// Bank slip, cheque number or gateway transaction code.
    pub reference: Option<String>,
    /// Correlates a mobile-money confirmation with its pending payment.
    pub checkout_reference: Option<String>,
    pub payer_phone: Option<String>,
    pub failure_reason: Option<String>,
    pub recorded_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl FeePayment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Communications
// =============================================================================

/// An in-app notification row. Written as a side effect; delivery over
/// email/SMS is an external concern.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    /// Student, teacher or guardian id.
    pub recipient_id: String,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub read_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Unit Tests
// =============================================================================
