//! # Class Repository
//!
//! Classes (streams) per academic year. A class name is unique among the
//! active classes of a year; deactivated classes free their name.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use super::{duplicate_on, ensure_active};
use crate::error::{DbError, DbResult};
use campus_core::validation::{validate_academic_year, validate_name};
use campus_core::{SchoolClass, MAX_NAME_LEN};

const CLASS_COLUMNS: &str = "id, name, academic_year, class_teacher_id, is_active, created_at, deleted_at";

/// Input for [`ClassRepository::create`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClass {
    pub name: String,
    pub academic_year: String,
    #[serde(default)]
    pub class_teacher_id: Option<String>,
}

/// Repository for class database operations.
#[derive(Debug, Clone)]
pub struct ClassRepository {
    pool: SqlitePool,
}

impl ClassRepository {
    /// Creates a new ClassRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ClassRepository { pool }
    }

    /// Creates a class.
    ///
    /// ## Errors
    /// - Validation: blank name, malformed year
    /// - NotFound: class teacher missing or inactive
    /// - Conflict: an active class with this name exists for the year
    pub async fn create(&self, input: &NewClass) -> DbResult<SchoolClass> {
        validate_name("name", &input.name, MAX_NAME_LEN)?;
        validate_academic_year(&input.academic_year)?;

        let mut tx = self.pool.begin().await?;

        if let Some(teacher_id) = &input.class_teacher_id {
            ensure_active(&mut tx, "teachers", "Teacher", teacher_id).await?;
        }

        let class = SchoolClass {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            academic_year: input.academic_year.trim().to_string(),
            class_teacher_id: input.class_teacher_id.clone(),
            is_active: true,
            created_at: Utc::now(),
            deleted_at: None,
        };

        debug!(id = %class.id, name = %class.name, year = %class.academic_year, "Creating class");

        sqlx::query(
            r#"
            INSERT INTO classes (id, name, academic_year, class_teacher_id, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, 1, ?5)
            "#,
        )
        .bind(&class.id)
        .bind(&class.name)
        .bind(&class.academic_year)
        .bind(&class.class_teacher_id)
        .bind(class.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| duplicate_on(e.into(), "Class", "name", &class.name))?;

        tx.commit().await?;

        info!(id = %class.id, name = %class.name, "Class created");
        Ok(class)
    }

    /// Gets an active class by ID.
    pub async fn get(&self, id: &str) -> DbResult<SchoolClass> {
        let sql = format!("SELECT {CLASS_COLUMNS} FROM classes WHERE id = ?1 AND is_active = 1");
        sqlx::query_as::<_, SchoolClass>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Class", id))
    }

    /// Lists active classes, optionally for one academic year.
    pub async fn list(&self, academic_year: Option<&str>) -> DbResult<Vec<SchoolClass>> {
        let sql = format!(
            r#"
            SELECT {CLASS_COLUMNS}
            FROM classes
            WHERE is_active = 1
              AND (?1 IS NULL OR academic_year = ?1)
            ORDER BY academic_year DESC, name
            "#
        );
        let classes = sqlx::query_as::<_, SchoolClass>(&sql)
            .bind(academic_year)
            .fetch_all(&self.pool)
            .await?;
        Ok(classes)
    }

    /// Soft-deletes a class.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE classes SET is_active = 0, deleted_at = ?2 WHERE id = ?1 AND is_active = 1",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Class", id));
        }

        info!(id = %id, "Class deactivated");
        Ok(())
    }
}
