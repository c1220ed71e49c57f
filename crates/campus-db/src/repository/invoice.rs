//! # Invoice Repository
//!
//! Monthly invoice generation, lookup and the overdue sweep.
//!
//! ## Generation
//! ```text
//! generate(student, 2025-03)
//!      │
//!      ▼  BEGIN
//! student active? ─── no ──► NotFound
//!      │
//! invoice for (student, month)? ─── yes ──► Conflict
//!      │
//! structures (student's class + school-wide) ──► FeeLine[]
//! discounts valid during the month ───────────► ApplicableDiscount[]
//!      │
//! compute_invoice() ──► totals
//! next_code(Invoice, 2025-03-01) ──► INV25030001
//! INSERT invoice + one item per structure
//!      │
//!      ▼  COMMIT
//! ```
//!
//! UNIQUE(student_id, billing_month) backs the duplicate check when two
//! generations race; the violation maps to the same Conflict.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::ensure_active;
use super::fee::{applicable_discounts, billable_structures};
use super::payment::payments_for_invoice;
use super::sequence::next_code;
use crate::error::{DbError, DbResult};
use campus_core::ledger::{compute_invoice, FeeLine, PaymentOutcome};
use campus_core::sequence::SequenceKind;
use campus_core::{
    BillingMonth, BulkResult, CoreError, FeeInvoice, FeeInvoiceItem, FeePayment, InvoiceStatus,
};

pub(crate) const INVOICE_COLUMNS: &str = "id, invoice_number, student_id, billing_month, \
     total_cents, discount_cents, late_fee_cents, tax_cents, net_cents, paid_cents, \
     balance_cents, status, due_date, created_by, created_at, updated_at";

// =============================================================================
// Types
// =============================================================================

/// An invoice with its breakdown and payment history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: FeeInvoice,
    pub items: Vec<FeeInvoiceItem>,
    pub payments: Vec<FeePayment>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceFilter {
    pub student_id: Option<String>,
    pub status: Option<InvoiceStatus>,
    pub billing_month: Option<BillingMonth>,
}

/// Identifies a student in class-wide invoicing results.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceTarget {
    pub student_id: String,
    pub admission_number: String,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for fee invoices.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// Bills one student for one month.
    ///
    /// ## Errors
    /// - NotFound: student missing or inactive
    /// - Conflict: invoice already exists for (student, month)
    pub async fn generate(
        &self,
        student_id: &str,
        month: BillingMonth,
        created_by: Option<&str>,
    ) -> DbResult<InvoiceDetail> {
        let mut tx = self.pool.begin().await?;

        let class_id: Option<String> = sqlx::query_scalar::<_, Option<String>>(
            "SELECT class_id FROM students WHERE id = ?1 AND is_active = 1",
        )
        .bind(student_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Student", student_id))?;

        let billing_month = month.to_string();

        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM fee_invoices WHERE student_id = ?1 AND billing_month = ?2)",
        )
        .bind(student_id)
        .bind(&billing_month)
        .fetch_one(&mut *tx)
        .await?;

        if exists != 0 {
            return Err(duplicate_invoice(student_id, &billing_month).into());
        }

        let structures = billable_structures(&mut tx, class_id.as_deref()).await?;
        let discounts = applicable_discounts(&mut tx, student_id, month).await?;

        let lines: Vec<FeeLine> = structures.iter().map(FeeLine::from).collect();
        let totals = compute_invoice(&lines, &discounts);

        debug!(
            student_id = %student_id,
            month = %billing_month,
            lines = lines.len(),
            discounts = discounts.len(),
            net = %totals.net,
            "Computed invoice"
        );

        let invoice_number = next_code(&mut tx, SequenceKind::Invoice, month.first_day()).await?;
        let now = Utc::now();

        let invoice = FeeInvoice {
            id: Uuid::new_v4().to_string(),
            invoice_number,
            student_id: student_id.to_string(),
            billing_month: billing_month.clone(),
            total_cents: totals.total.cents(),
            discount_cents: totals.discount.cents(),
            late_fee_cents: totals.late_fee.cents(),
            tax_cents: totals.tax.cents(),
            net_cents: totals.net.cents(),
            paid_cents: totals.paid.cents(),
            balance_cents: totals.balance.cents(),
            status: totals.status,
            due_date: month.due_date(),
            created_by: created_by.map(str::to_string),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO fee_invoices (
                id, invoice_number, student_id, billing_month,
                total_cents, discount_cents, late_fee_cents, tax_cents,
                net_cents, paid_cents, balance_cents, status,
                due_date, created_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.invoice_number)
        .bind(&invoice.student_id)
        .bind(&invoice.billing_month)
        .bind(invoice.total_cents)
        .bind(invoice.discount_cents)
        .bind(invoice.late_fee_cents)
        .bind(invoice.tax_cents)
        .bind(invoice.net_cents)
        .bind(invoice.paid_cents)
        .bind(invoice.balance_cents)
        .bind(invoice.status)
        .bind(invoice.due_date)
        .bind(&invoice.created_by)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            DbError::from(e).on_unique(|field| {
                if field.contains("billing_month") {
                    duplicate_invoice(student_id, &billing_month)
                } else {
                    CoreError::duplicate("Invoice", field, &billing_month)
                }
            })
        })?;

        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let item = FeeInvoiceItem {
                id: Uuid::new_v4().to_string(),
                invoice_id: invoice.id.clone(),
                fee_structure_id: line.fee_structure_id,
                description: line.description,
                amount_cents: line.amount.cents(),
                created_at: now,
            };

            sqlx::query(
                r#"
                INSERT INTO fee_invoice_items (id, invoice_id, fee_structure_id, description, amount_cents, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&item.id)
            .bind(&item.invoice_id)
            .bind(&item.fee_structure_id)
            .bind(&item.description)
            .bind(item.amount_cents)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;

            items.push(item);
        }

        tx.commit().await?;

        info!(
            id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            student_id = %student_id,
            month = %billing_month,
            net = %invoice.net(),
            "Invoice generated"
        );

        Ok(InvoiceDetail {
            invoice,
            items,
            payments: Vec::new(),
        })
    }

    /// Bills every active student of a class; one student's failure does
    /// not stop the rest.
    pub async fn generate_for_class(
        &self,
        class_id: &str,
        month: BillingMonth,
        created_by: Option<&str>,
    ) -> DbResult<BulkResult<FeeInvoice, InvoiceTarget>> {
        let students: Vec<(String, String)> = {
            let mut conn = self.pool.acquire().await?;
            ensure_active(&mut conn, "classes", "Class", class_id).await?;

            sqlx::query_as(
                r#"
                SELECT id, admission_number
                FROM students
                WHERE class_id = ?1 AND is_active = 1
                ORDER BY admission_number
                "#,
            )
            .bind(class_id)
            .fetch_all(&mut *conn)
            .await?
        };

        let mut result = BulkResult::new();
        for (student_id, admission_number) in students {
            let outcome = self
                .generate(&student_id, month, created_by)
                .await
                .map(|detail| detail.invoice);
            if let Err(e) = &outcome {
                warn!(student_id = %student_id, month = %month, error = %e, "Invoice not generated");
            }
            result.record(
                InvoiceTarget {
                    student_id,
                    admission_number,
                },
                outcome,
            );
        }

        info!(
            class_id = %class_id,
            month = %month,
            generated = result.success.len(),
            failed = result.failed.len(),
            "Class invoicing finished"
        );
        Ok(result)
    }

    /// Gets an invoice with its items and payments.
    pub async fn get(&self, id: &str) -> DbResult<InvoiceDetail> {
        let invoice = {
            let mut conn = self.pool.acquire().await?;
            fetch_invoice(&mut conn, id).await?
        };

        let items = sqlx::query_as::<_, FeeInvoiceItem>(
            r#"
            SELECT id, invoice_id, fee_structure_id, description, amount_cents, created_at
            FROM fee_invoice_items
            WHERE invoice_id = ?1
            ORDER BY created_at, description
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let payments = payments_for_invoice(&self.pool, id).await?;

        Ok(InvoiceDetail {
            invoice,
            items,
            payments,
        })
    }

    /// Lists invoices, newest month first.
    pub async fn list(&self, filter: &InvoiceFilter) -> DbResult<Vec<FeeInvoice>> {
        let sql = format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM fee_invoices
            WHERE (?1 IS NULL OR student_id = ?1)
              AND (?2 IS NULL OR status = ?2)
              AND (?3 IS NULL OR billing_month = ?3)
            ORDER BY billing_month DESC, invoice_number
            "#
        );
        let invoices = sqlx::query_as::<_, FeeInvoice>(&sql)
            .bind(&filter.student_id)
            .bind(filter.status)
            .bind(filter.billing_month.map(|m| m.to_string()))
            .fetch_all(&self.pool)
            .await?;
        Ok(invoices)
    }

    /// Flips open invoices whose due date lies before `as_of` to overdue.
    /// Returns the number of invoices changed.
    pub async fn mark_overdue(&self, as_of: NaiveDate) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE fee_invoices
            SET status = 'overdue', updated_at = ?2
            WHERE status IN ('pending', 'partial')
              AND due_date < ?1
            "#,
        )
        .bind(as_of)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let changed = result.rows_affected();
        if changed > 0 {
            info!(as_of = %as_of, changed, "Invoices marked overdue");
        }
        Ok(changed)
    }
}

fn duplicate_invoice(student_id: &str, month: &str) -> CoreError {
    CoreError::DuplicateInvoice {
        student_id: student_id.to_string(),
        month: month.to_string(),
    }
}

// =============================================================================
// Shared with the payment repository
// =============================================================================

pub(crate) async fn fetch_invoice(conn: &mut SqliteConnection, id: &str) -> DbResult<FeeInvoice> {
    let sql = format!("SELECT {INVOICE_COLUMNS} FROM fee_invoices WHERE id = ?1");
    sqlx::query_as::<_, FeeInvoice>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Invoice", id))
}

/// Persists the amounts produced by `apply_payment`.
pub(crate) async fn store_payment_outcome(
    conn: &mut SqliteConnection,
    invoice_id: &str,
    outcome: &PaymentOutcome,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE fee_invoices
        SET paid_cents = ?2, balance_cents = ?3, status = ?4, updated_at = ?5
        WHERE id = ?1
        "#,
    )
    .bind(invoice_id)
    .bind(outcome.paid.cents())
    .bind(outcome.balance.cents())
    .bind(outcome.status)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::class::NewClass;
    use crate::repository::fee::{DiscountAssignment, FeeStructureUpdate, NewDiscount, NewFeeStructure};
    use crate::repository::student::NewStudent;
    use campus_core::{DiscountKind, ErrorKind, FeeFrequency, Money, Student};

    pub(crate) struct Billing {
        pub db: Database,
        pub class_id: String,
        pub student: Student,
        pub tuition_id: String,
    }

    pub(crate) fn student_in(class_id: &str, first_name: &str) -> NewStudent {
        NewStudent {
            first_name: first_name.to_string(),
            last_name: "Mwangi".to_string(),
            class_id: Some(class_id.to_string()),
            date_of_birth: None,
            guardian_name: None,
            guardian_phone: None,
            admission_date: NaiveDate::from_ymd_opt(2025, 1, 8),
        }
    }

    /// Grade 4 with Tuition 10,000 (class fee), Transport 2,000 (school-wide)
    /// and one student holding a 5% sibling discount from January.
    pub(crate) async fn billing() -> Billing {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let class = db
            .classes()
            .create(&NewClass {
                name: "Grade 4".to_string(),
                academic_year: "2025".to_string(),
                class_teacher_id: None,
            })
            .await
            .unwrap();

        let tuition = db
            .fees()
            .create_structure(&NewFeeStructure {
                class_id: Some(class.id.clone()),
                name: "Tuition".to_string(),
                amount_cents: Money::from_units(10_000).cents(),
                frequency: FeeFrequency::Monthly,
                academic_year: "2025".to_string(),
            })
            .await
            .unwrap();

        db.fees()
            .create_structure(&NewFeeStructure {
                class_id: None,
                name: "Transport".to_string(),
                amount_cents: Money::from_units(2_000).cents(),
                frequency: FeeFrequency::Monthly,
                academic_year: "2025".to_string(),
            })
            .await
            .unwrap();

        let student = db.students().create(&student_in(&class.id, "Juma")).await.unwrap();

        let sibling = db
            .fees()
            .create_discount(&NewDiscount {
                name: "Sibling".to_string(),
                kind: DiscountKind::Percentage,
                value: 500,
            })
            .await
            .unwrap();

        db.fees()
            .assign_discount(
                &student.id,
                &DiscountAssignment {
                    discount_id: sibling.id,
                    valid_from: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                    valid_until: None,
                },
            )
            .await
            .unwrap();

        Billing {
            db,
            class_id: class.id,
            student,
            tuition_id: tuition.id,
        }
    }

    pub(crate) fn march() -> BillingMonth {
        "2025-03".parse().unwrap()
    }

    #[tokio::test]
    async fn test_generate_scenario() {
        let b = billing().await;

        let detail = b.db.invoices().generate(&b.student.id, march(), Some("bursar")).await.unwrap();
        let invoice = &detail.invoice;

        assert_eq!(invoice.invoice_number, "INV25030001");
        assert_eq!(invoice.total_cents, Money::from_units(12_000).cents());
        assert_eq!(invoice.discount_cents, Money::from_units(600).cents());
        assert_eq!(invoice.late_fee_cents, 0);
        assert_eq!(invoice.tax_cents, 0);
        assert_eq!(invoice.net_cents, Money::from_units(11_400).cents());
        assert_eq!(invoice.balance_cents, invoice.net_cents);
        assert_eq!(invoice.paid_cents, 0);
        assert_eq!(invoice.status, InvoiceStatus::Pending);
        assert_eq!(invoice.due_date, NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
        assert_eq!(detail.items.len(), 2);

        let loaded = b.db.invoices().get(&invoice.id).await.unwrap();
        assert_eq!(loaded.items.len(), 2);
        assert!(loaded.payments.is_empty());
        let item_sum: i64 = loaded.items.iter().map(|i| i.amount_cents).sum();
        assert_eq!(item_sum, invoice.total_cents);
    }

    #[tokio::test]
    async fn test_second_generation_conflicts() {
        let b = billing().await;

        b.db.invoices().generate(&b.student.id, march(), None).await.unwrap();
        let err = b.db.invoices().generate(&b.student.id, march(), None).await.unwrap_err();

        assert!(matches!(err, DbError::Domain(CoreError::DuplicateInvoice { .. })));
        assert_eq!(err.kind(), Some(ErrorKind::Conflict));

        // Next month is independent and continues its own sequence.
        let april = b
            .db
            .invoices()
            .generate(&b.student.id, "2025-04".parse().unwrap(), None)
            .await
            .unwrap();
        assert_eq!(april.invoice.invoice_number, "INV25040001");
    }

    #[tokio::test]
    async fn test_unknown_student() {
        let b = billing().await;
        let err = b.db.invoices().generate("missing", march(), None).await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_billed_structure_is_locked() {
        let b = billing().await;
        b.db.invoices().generate(&b.student.id, march(), None).await.unwrap();

        let err = b
            .db
            .fees()
            .update_structure(
                &b.tuition_id,
                &FeeStructureUpdate {
                    amount_cents: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::FeeStructureLocked { .. })));
    }

    #[tokio::test]
    async fn test_class_invoicing_collects_failures() {
        let b = billing().await;
        b.db.students().create(&student_in(&b.class_id, "Wanjiku")).await.unwrap();

        // Juma already has March.
        b.db.invoices().generate(&b.student.id, march(), None).await.unwrap();

        let result = b.db.invoices().generate_for_class(&b.class_id, march(), None).await.unwrap();
        assert_eq!(result.success.len(), 1);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].data.student_id, b.student.id);

        // Wanjiku has no discount.
        assert_eq!(result.success[0].net_cents, Money::from_units(12_000).cents());
    }

    #[tokio::test]
    async fn test_list_and_mark_overdue() {
        let b = billing().await;
        let march_invoice = b.db.invoices().generate(&b.student.id, march(), None).await.unwrap();

        let changed = b
            .db
            .invoices()
            .mark_overdue(NaiveDate::from_ymd_opt(2025, 3, 10).unwrap())
            .await
            .unwrap();
        assert_eq!(changed, 0);

        let changed = b
            .db
            .invoices()
            .mark_overdue(NaiveDate::from_ymd_opt(2025, 3, 11).unwrap())
            .await
            .unwrap();
        assert_eq!(changed, 1);

        let overdue = b
            .db
            .invoices()
            .list(&InvoiceFilter {
                status: Some(InvoiceStatus::Overdue),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, march_invoice.invoice.id);

        let april = b
            .db
            .invoices()
            .list(&InvoiceFilter {
                billing_month: Some("2025-04".parse().unwrap()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(april.is_empty());
    }

    #[tokio::test]
    async fn test_fully_discounted_invoice_is_settled() {
        let b = billing().await;
        let bursary = b
            .db
            .fees()
            .create_discount(&NewDiscount {
                name: "Full bursary".to_string(),
                kind: DiscountKind::Percentage,
                value: 10_000,
            })
            .await
            .unwrap();
        b.db.fees()
            .assign_discount(
                &b.student.id,
                &DiscountAssignment {
                    discount_id: bursary.id,
                    valid_from: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                    valid_until: None,
                },
            )
            .await
            .unwrap();

        let detail = b.db.invoices().generate(&b.student.id, march(), None).await.unwrap();
        assert_eq!(detail.invoice.net_cents, 0);
        assert_eq!(detail.invoice.balance_cents, 0);
        assert_eq!(detail.invoice.status, InvoiceStatus::Paid);

        let changed = b
            .db
            .invoices()
            .mark_overdue(NaiveDate::from_ymd_opt(2025, 4, 1).unwrap())
            .await
            .unwrap();
        assert_eq!(changed, 0);
        let loaded = b.db.invoices().get(&detail.invoice.id).await.unwrap();
        assert_eq!(loaded.invoice.status, InvoiceStatus::Paid);
    }
}
