//! # Fee Repository
//!
//! Fee structures and discount definitions: the inputs to invoice generation.
//!
//! ## Structure Lock
//! ```text
//! FeeStructure ──referenced by──► FeeInvoiceItem
//!      │
//!      └── once referenced, content is frozen (FeeStructureLocked);
//!          deactivation is still allowed and only stops future billing.
//! ```

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use super::ensure_active;
use super::update::UpdateBuilder;
use crate::error::{DbError, DbResult};
use campus_core::ledger::ApplicableDiscount;
use campus_core::validation::{
    validate_academic_year, validate_amount_cents, validate_name, validate_percentage_bps,
};
use campus_core::{
    BillingMonth, CoreError, DiscountKind, FeeDiscount, FeeFrequency, FeeStructure,
    StudentFeeDiscount, ValidationError, MAX_NAME_LEN,
};

const STRUCTURE_COLUMNS: &str = "id, class_id, name, amount_cents, frequency, academic_year, \
                                 is_active, created_at, updated_at, deleted_at";

// =============================================================================
// Inputs
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFeeStructure {
    /// `None` applies the fee to every class.
    #[serde(default)]
    pub class_id: Option<String>,
    pub name: String,
    pub amount_cents: i64,
    pub frequency: FeeFrequency,
    pub academic_year: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeStructureUpdate {
    pub name: Option<String>,
    pub amount_cents: Option<i64>,
    pub frequency: Option<FeeFrequency>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeStructureFilter {
    pub class_id: Option<String>,
    pub academic_year: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDiscount {
    pub name: String,
    pub kind: DiscountKind,
    /// Basis points for `percentage`, cents for `fixed`.
    pub value: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountAssignment {
    pub discount_id: String,
    pub valid_from: NaiveDate,
    #[serde(default)]
    pub valid_until: Option<NaiveDate>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for fee structures and discounts.
#[derive(Debug, Clone)]
pub struct FeeRepository {
    pool: SqlitePool,
}

impl FeeRepository {
    /// Creates a new FeeRepository.
    pub fn new(pool: SqlitePool) -> Self {
        FeeRepository { pool }
    }

    /// Defines a fee line.
    pub async fn create_structure(&self, input: &NewFeeStructure) -> DbResult<FeeStructure> {
        validate_name("name", &input.name, MAX_NAME_LEN)?;
        validate_amount_cents("amount", input.amount_cents)?;
        validate_academic_year(&input.academic_year)?;

        let mut tx = self.pool.begin().await?;

        if let Some(class_id) = &input.class_id {
            ensure_active(&mut tx, "classes", "Class", class_id).await?;
        }

        let now = Utc::now();
        let structure = FeeStructure {
            id: Uuid::new_v4().to_string(),
            class_id: input.class_id.clone(),
            name: input.name.trim().to_string(),
            amount_cents: input.amount_cents,
            frequency: input.frequency,
            academic_year: input.academic_year.trim().to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO fee_structures (
                id, class_id, name, amount_cents, frequency, academic_year,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7)
            "#,
        )
        .bind(&structure.id)
        .bind(&structure.class_id)
        .bind(&structure.name)
        .bind(structure.amount_cents)
        .bind(structure.frequency)
        .bind(&structure.academic_year)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(id = %structure.id, name = %structure.name, amount = %structure.amount(), "Fee structure created");
        Ok(structure)
    }

    pub async fn get_structure(&self, id: &str) -> DbResult<FeeStructure> {
        let sql = format!("SELECT {STRUCTURE_COLUMNS} FROM fee_structures WHERE id = ?1");
        sqlx::query_as::<_, FeeStructure>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("FeeStructure", id))
    }

    pub async fn list_structures(&self, filter: &FeeStructureFilter) -> DbResult<Vec<FeeStructure>> {
        let sql = format!(
            r#"
            SELECT {STRUCTURE_COLUMNS}
            FROM fee_structures
            WHERE (?1 IS NULL OR class_id = ?1)
              AND (?2 IS NULL OR academic_year = ?2)
              AND (?3 OR is_active = 1)
            ORDER BY academic_year DESC, name
            "#
        );
        let structures = sqlx::query_as::<_, FeeStructure>(&sql)
            .bind(&filter.class_id)
            .bind(&filter.academic_year)
            .bind(filter.include_inactive)
            .fetch_all(&self.pool)
            .await?;
        Ok(structures)
    }

    /// Edits a fee line that no invoice has billed yet.
    ///
    /// ## Errors
    /// - Validation: nothing to update or malformed value
    /// - NotFound: structure missing or inactive
    /// - Conflict: structure referenced by an invoice item
    pub async fn update_structure(&self, id: &str, changes: &FeeStructureUpdate) -> DbResult<FeeStructure> {
        if let Some(name) = &changes.name {
            validate_name("name", name, MAX_NAME_LEN)?;
        }
        if let Some(amount) = changes.amount_cents {
            validate_amount_cents("amount", amount)?;
        }

        let mut update = UpdateBuilder::new("fee_structures");
        update
            .set("name", changes.name.as_deref().map(str::trim))
            .set("amount_cents", changes.amount_cents)
            .set("frequency", changes.frequency);

        if update.is_empty() {
            return Err(ValidationError::EmptyUpdate.into());
        }

        let mut tx = self.pool.begin().await?;

        ensure_active(&mut tx, "fee_structures", "FeeStructure", id).await?;

        let referenced: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM fee_invoice_items WHERE fee_structure_id = ?1)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if referenced != 0 {
            return Err(CoreError::FeeStructureLocked { id: id.to_string() }.into());
        }

        update
            .finish(Some(("updated_at", Utc::now())), id, "is_active = 1")
            .build()
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(id = %id, "Fee structure updated");
        self.get_structure(id).await
    }

    /// Stops billing a fee line. Already-issued invoices keep their items.
    pub async fn deactivate_structure(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE fee_structures SET is_active = 0, deleted_at = ?2, updated_at = ?2 WHERE id = ?1 AND is_active = 1",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("FeeStructure", id));
        }

        info!(id = %id, "Fee structure deactivated");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Discounts
    // -------------------------------------------------------------------------

    pub async fn create_discount(&self, input: &NewDiscount) -> DbResult<FeeDiscount> {
        validate_name("name", &input.name, MAX_NAME_LEN)?;
        match input.kind {
            DiscountKind::Percentage => validate_percentage_bps(input.value)?,
            DiscountKind::Fixed => validate_amount_cents("value", input.value)?,
        }

        let discount = FeeDiscount {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            kind: input.kind,
            value: input.value,
            is_active: true,
            created_at: Utc::now(),
            deleted_at: None,
        };

        sqlx::query(
            "INSERT INTO fee_discounts (id, name, kind, value, is_active, created_at) VALUES (?1, ?2, ?3, ?4, 1, ?5)",
        )
        .bind(&discount.id)
        .bind(&discount.name)
        .bind(discount.kind)
        .bind(discount.value)
        .bind(discount.created_at)
        .execute(&self.pool)
        .await?;

        info!(id = %discount.id, name = %discount.name, "Discount created");
        Ok(discount)
    }

    pub async fn list_discounts(&self) -> DbResult<Vec<FeeDiscount>> {
        let discounts = sqlx::query_as::<_, FeeDiscount>(
            "SELECT id, name, kind, value, is_active, created_at, deleted_at FROM fee_discounts WHERE is_active = 1 ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(discounts)
    }

    pub async fn deactivate_discount(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE fee_discounts SET is_active = 0, deleted_at = ?2 WHERE id = ?1 AND is_active = 1",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("FeeDiscount", id));
        }
        Ok(())
    }

    /// Grants a discount to a student over a validity window.
    pub async fn assign_discount(
        &self,
        student_id: &str,
        input: &DiscountAssignment,
    ) -> DbResult<StudentFeeDiscount> {
        if let Some(until) = input.valid_until {
            if until < input.valid_from {
                return Err(ValidationError::InvalidFormat {
                    field: "valid_until".to_string(),
                    reason: "must not be before valid_from".to_string(),
                }
                .into());
            }
        }

        let mut tx = self.pool.begin().await?;
        ensure_active(&mut tx, "students", "Student", student_id).await?;
        ensure_active(&mut tx, "fee_discounts", "FeeDiscount", &input.discount_id).await?;

        let assignment = StudentFeeDiscount {
            id: Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            discount_id: input.discount_id.clone(),
            valid_from: input.valid_from,
            valid_until: input.valid_until,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO student_fee_discounts (id, student_id, discount_id, valid_from, valid_until, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&assignment.id)
        .bind(&assignment.student_id)
        .bind(&assignment.discount_id)
        .bind(assignment.valid_from)
        .bind(assignment.valid_until)
        .bind(assignment.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(student_id = %student_id, discount_id = %input.discount_id, "Discount assigned");
        Ok(assignment)
    }

    pub async fn student_discounts(&self, student_id: &str) -> DbResult<Vec<StudentFeeDiscount>> {
        let rows = sqlx::query_as::<_, StudentFeeDiscount>(
            r#"
            SELECT id, student_id, discount_id, valid_from, valid_until, created_at
            FROM student_fee_discounts
            WHERE student_id = ?1
            ORDER BY valid_from
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

// =============================================================================
// Invoice inputs (used inside the invoice transaction)
// =============================================================================

/// Active structures billed to a class, plus the school-wide ones.
pub(crate) async fn billable_structures(
    conn: &mut SqliteConnection,
    class_id: Option<&str>,
) -> DbResult<Vec<FeeStructure>> {
    let sql = format!(
        r#"
        SELECT {STRUCTURE_COLUMNS}
        FROM fee_structures
        WHERE is_active = 1
          AND (class_id IS NULL OR class_id = ?1)
        ORDER BY created_at, name
        "#
    );
    let structures = sqlx::query_as::<_, FeeStructure>(&sql)
        .bind(class_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(structures)
}

/// Active discounts whose window overlaps the billing month.
pub(crate) async fn applicable_discounts(
    conn: &mut SqliteConnection,
    student_id: &str,
    month: BillingMonth,
) -> DbResult<Vec<ApplicableDiscount>> {
    let rows: Vec<(String, String, DiscountKind, i64)> = sqlx::query_as(
        r#"
        SELECT d.id, d.name, d.kind, d.value
        FROM student_fee_discounts sd
        JOIN fee_discounts d ON d.id = sd.discount_id
        WHERE sd.student_id = ?1
          AND d.is_active = 1
          AND sd.valid_from <= ?3
          AND (sd.valid_until IS NULL OR sd.valid_until >= ?2)
        ORDER BY sd.created_at
        "#,
    )
    .bind(student_id)
    .bind(month.first_day())
    .bind(month.last_day())
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(discount_id, name, kind, value)| ApplicableDiscount {
            discount_id,
            name,
            kind,
            value,
        })
        .collect())
}
