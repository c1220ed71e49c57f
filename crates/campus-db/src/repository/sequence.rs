//! # Sequence Repository
//!
//! Atomic allocation of human-readable codes.
//!
//! ## Allocation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  next_code(conn, Invoice, 2025-03-01)                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  prefix = "INV2503"                                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  INSERT INTO code_sequences (prefix, last_value)                       │
//! │  VALUES ("INV2503", <highest issued suffix in fee_invoices> + 1)       │
//! │  ON CONFLICT(prefix) DO UPDATE SET last_value = last_value + 1         │
//! │  RETURNING last_value                                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  "INV2503" + 0001  →  "INV25030001"                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The upsert runs on the caller's connection, so inside a transaction the
//! counter advance commits or rolls back with the row that uses the code.

use chrono::NaiveDate;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use campus_core::sequence::{format_code, SequenceKind};

/// Table and column that hold codes of each kind.
fn owner(kind: SequenceKind) -> (&'static str, &'static str) {
    match kind {
        SequenceKind::Admission => ("students", "admission_number"),
        SequenceKind::Employee => ("teachers", "employee_id"),
        SequenceKind::Invoice => ("fee_invoices", "invoice_number"),
        SequenceKind::Receipt | SequenceKind::MobileReceipt => ("fee_payments", "receipt_number"),
    }
}

/// Allocates the next code of `kind` for `date` on `conn`.
pub async fn next_code(
    conn: &mut SqliteConnection,
    kind: SequenceKind,
    date: NaiveDate,
) -> DbResult<String> {
    let prefix = kind.prefix(date);
    let (table, column) = owner(kind);

    // First use of a prefix seeds from codes already issued in the owning table.
    let sql = format!(
        r#"
        INSERT INTO code_sequences (prefix, last_value)
        VALUES (
            ?1,
            COALESCE(
                (SELECT MAX(CAST(substr({column}, length(?1) + 1) AS INTEGER))
                 FROM {table}
                 WHERE {column} LIKE ?1 || '%'),
                0
            ) + 1
        )
        ON CONFLICT(prefix) DO UPDATE SET last_value = last_value + 1
        RETURNING last_value
        "#
    );

    let value: i64 = sqlx::query_scalar(&sql)
        .bind(&prefix)
        .fetch_one(&mut *conn)
        .await?;

    let code = format_code(kind, &prefix, value);
    debug!(prefix = %prefix, code = %code, "Allocated sequence code");

    Ok(code)
}

/// Repository wrapper for standalone allocation (outside a larger transaction).
#[derive(Debug, Clone)]
pub struct SequenceRepository {
    pool: SqlitePool,
}

impl SequenceRepository {
    /// Creates a new SequenceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SequenceRepository { pool }
    }

    /// Allocates and commits the next code for `kind` on `date`.
    pub async fn next(&self, kind: SequenceKind, date: NaiveDate) -> DbResult<String> {
        let mut tx = self.pool.begin().await?;
        let code = next_code(&mut *tx, kind, date).await?;
        tx.commit().await?;
        Ok(code)
    }

    /// Last value handed out for a prefix, if any.
    pub async fn current(&self, prefix: &str) -> DbResult<Option<i64>> {
        let value: Option<i64> =
            sqlx::query_scalar("SELECT last_value FROM code_sequences WHERE prefix = ?1")
                .bind(prefix)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use campus_core::sequence::parse_suffix;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_strictly_increasing_per_prefix() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let seq = db.sequences();
        let march = date(2025, 3, 1);

        let mut last = 0;
        for _ in 0..5 {
            let code = seq.next(SequenceKind::Invoice, march).await.unwrap();
            let value = parse_suffix("INV2503", &code).unwrap();
            assert!(value > last);
            last = value;
        }
        assert_eq!(last, 5);
        assert_eq!(seq.current("INV2503").await.unwrap(), Some(5));
    }

    #[tokio::test]
    async fn test_prefixes_are_independent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let seq = db.sequences();

        assert_eq!(
            seq.next(SequenceKind::Invoice, date(2025, 3, 1)).await.unwrap(),
            "INV25030001"
        );
        assert_eq!(
            seq.next(SequenceKind::Invoice, date(2025, 4, 1)).await.unwrap(),
            "INV25040001"
        );
        assert_eq!(
            seq.next(SequenceKind::Receipt, date(2025, 4, 1)).await.unwrap(),
            "REC25000001"
        );
        assert_eq!(
            seq.next(SequenceKind::MobileReceipt, date(2025, 4, 1)).await.unwrap(),
            "MREC25000001"
        );
        assert_eq!(
            seq.next(SequenceKind::Receipt, date(2025, 9, 1)).await.unwrap(),
            "REC25000002"
        );
    }

    #[tokio::test]
    async fn test_seeds_from_existing_codes() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = chrono::Utc::now();

        sqlx::query(
            "INSERT INTO teachers (id, employee_id, first_name, last_name, email, hire_date, created_at, updated_at)
             VALUES ('t-legacy', 'TCH250041', 'Legacy', 'Import', 'legacy@school.test', '2025-01-06', ?1, ?1)",
        )
        .bind(now)
        .execute(db.pool())
        .await
        .unwrap();

        let code = db
            .sequences()
            .next(SequenceKind::Employee, date(2025, 2, 1))
            .await
            .unwrap();
        assert_eq!(code, "TCH250042");
    }
}
