//! # Student Repository
//!
//! Student records, admission numbers and bulk import.
//!
//! ## Admission
//! ```text
//! create(NewStudent)
//!      │
//!      ├── validate names / phone
//!      ├── BEGIN
//!      ├── class given? must be active
//!      ├── admission number STD<yyyy><seq4> (year of admission date)
//!      ├── INSERT students
//!      └── COMMIT
//! ```

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::ensure_active;
use super::sequence::next_code;
use super::update::UpdateBuilder;
use crate::error::{DbError, DbResult};
use campus_core::sequence::SequenceKind;
use campus_core::validation::{validate_bulk_size, validate_name, validate_phone};
use campus_core::{BulkResult, Student, ValidationError, MAX_NAME_LEN};

const STUDENT_COLUMNS: &str = "id, admission_number, first_name, last_name, class_id, date_of_birth, \
                               guardian_name, guardian_phone, admission_date, is_active, \
                               created_at, updated_at, deleted_at";

/// Input for [`StudentRepository::create`] and bulk import rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub class_id: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub guardian_name: Option<String>,
    #[serde(default)]
    pub guardian_phone: Option<String>,
    /// Defaults to today.
    #[serde(default)]
    pub admission_date: Option<NaiveDate>,
}

impl NewStudent {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_name("first_name", &self.first_name, MAX_NAME_LEN)?;
        validate_name("last_name", &self.last_name, MAX_NAME_LEN)?;
        if let Some(name) = &self.guardian_name {
            validate_name("guardian_name", name, MAX_NAME_LEN)?;
        }
        if let Some(phone) = &self.guardian_phone {
            validate_phone("guardian_phone", phone)?;
        }
        Ok(())
    }
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub class_id: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub guardian_name: Option<String>,
    pub guardian_phone: Option<String>,
}

impl StudentUpdate {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.first_name {
            validate_name("first_name", name, MAX_NAME_LEN)?;
        }
        if let Some(name) = &self.last_name {
            validate_name("last_name", name, MAX_NAME_LEN)?;
        }
        if let Some(name) = &self.guardian_name {
            validate_name("guardian_name", name, MAX_NAME_LEN)?;
        }
        if let Some(phone) = &self.guardian_phone {
            validate_phone("guardian_phone", phone)?;
        }
        Ok(())
    }
}

/// Filter for [`StudentRepository::list`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentFilter {
    pub class_id: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}

/// Repository for student database operations.
#[derive(Debug, Clone)]
pub struct StudentRepository {
    pool: SqlitePool,
}

impl StudentRepository {
    /// Creates a new StudentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StudentRepository { pool }
    }

    /// Admits a student and allocates an admission number.
    ///
    /// ## Errors
    /// - Validation: names or guardian phone malformed
    /// - NotFound: class missing or inactive
    pub async fn create(&self, input: &NewStudent) -> DbResult<Student> {
        input.validate()?;

        let now = Utc::now();
        let admission_date = input.admission_date.unwrap_or_else(|| now.date_naive());

        let mut tx = self.pool.begin().await?;

        if let Some(class_id) = &input.class_id {
            ensure_active(&mut tx, "classes", "Class", class_id).await?;
        }

        let admission_number = next_code(&mut tx, SequenceKind::Admission, admission_date).await?;

        let student = Student {
            id: Uuid::new_v4().to_string(),
            admission_number,
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            class_id: input.class_id.clone(),
            date_of_birth: input.date_of_birth,
            guardian_name: input.guardian_name.clone(),
            guardian_phone: input.guardian_phone.clone(),
            admission_date,
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        debug!(id = %student.id, admission_number = %student.admission_number, "Creating student");

        sqlx::query(
            r#"
            INSERT INTO students (
                id, admission_number, first_name, last_name, class_id,
                date_of_birth, guardian_name, guardian_phone, admission_date,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, ?10, ?10)
            "#,
        )
        .bind(&student.id)
        .bind(&student.admission_number)
        .bind(&student.first_name)
        .bind(&student.last_name)
        .bind(&student.class_id)
        .bind(student.date_of_birth)
        .bind(&student.guardian_name)
        .bind(&student.guardian_phone)
        .bind(student.admission_date)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(id = %student.id, admission_number = %student.admission_number, "Student admitted");
        Ok(student)
    }

    /// Gets an active student by ID.
    pub async fn get(&self, id: &str) -> DbResult<Student> {
        let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?1 AND is_active = 1");
        sqlx::query_as::<_, Student>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Student", id))
    }

    /// Gets a student by admission number (active or not).
    pub async fn get_by_admission_number(&self, admission_number: &str) -> DbResult<Option<Student>> {
        let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE admission_number = ?1");
        let student = sqlx::query_as::<_, Student>(&sql)
            .bind(admission_number)
            .fetch_optional(&self.pool)
            .await?;
        Ok(student)
    }

    /// Lists students ordered by name.
    pub async fn list(&self, filter: &StudentFilter) -> DbResult<Vec<Student>> {
        let sql = format!(
            r#"
            SELECT {STUDENT_COLUMNS}
            FROM students
            WHERE (?1 IS NULL OR class_id = ?1)
              AND (?2 OR is_active = 1)
            ORDER BY last_name, first_name
            "#
        );
        let students = sqlx::query_as::<_, Student>(&sql)
            .bind(&filter.class_id)
            .bind(filter.include_inactive)
            .fetch_all(&self.pool)
            .await?;
        Ok(students)
    }

    /// Applies a partial update.
    ///
    /// ## Errors
    /// - Validation: nothing to update, or a field is malformed
    /// - NotFound: student (or new class) missing or inactive
    pub async fn update(&self, id: &str, changes: &StudentUpdate) -> DbResult<Student> {
        changes.validate()?;

        let mut update = UpdateBuilder::new("students");
        update
            .set("first_name", changes.first_name.as_deref().map(str::trim))
            .set("last_name", changes.last_name.as_deref().map(str::trim))
            .set("class_id", changes.class_id.as_deref())
            .set("date_of_birth", changes.date_of_birth)
            .set("guardian_name", changes.guardian_name.as_deref())
            .set("guardian_phone", changes.guardian_phone.as_deref());

        if update.is_empty() {
            return Err(ValidationError::EmptyUpdate.into());
        }

        let mut tx = self.pool.begin().await?;

        if let Some(class_id) = &changes.class_id {
            ensure_active(&mut tx, "classes", "Class", class_id).await?;
        }

        let result = update
            .finish(Some(("updated_at", Utc::now())), id, "is_active = 1")
            .build()
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Student", id));
        }

        tx.commit().await?;

        debug!(id = %id, "Student updated");
        self.get(id).await
    }

    /// Soft-deletes a student. Invoices and attendance history are kept.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE students SET is_active = 0, deleted_at = ?2, updated_at = ?2 WHERE id = ?1 AND is_active = 1",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Student", id));
        }

        info!(id = %id, "Student deactivated");
        Ok(())
    }

    /// Admits many students; each row commits or fails on its own.
    pub async fn import(&self, rows: Vec<NewStudent>) -> DbResult<BulkResult<Student, NewStudent>> {
        validate_bulk_size("students", rows.len())?;

        let mut result = BulkResult::new();
        for row in rows {
            let outcome = self.create(&row).await;
            if let Err(e) = &outcome {
                warn!(first_name = %row.first_name, last_name = %row.last_name, error = %e, "Student import row rejected");
            }
            result.record(row, outcome);
        }

        info!(
            imported = result.success.len(),
            failed = result.failed.len(),
            "Student import finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::class::NewClass;
    use campus_core::ErrorKind;

    fn amina() -> NewStudent {
        NewStudent {
            first_name: "Amina".to_string(),
            last_name: "Hassan".to_string(),
            class_id: None,
            date_of_birth: NaiveDate::from_ymd_opt(2016, 5, 2),
            guardian_name: Some("Fatuma Hassan".to_string()),
            guardian_phone: Some("0712345678".to_string()),
            admission_date: NaiveDate::from_ymd_opt(2025, 1, 8),
        }
    }

    #[tokio::test]
    async fn test_admission_numbers() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let first = db.students().create(&amina()).await.unwrap();
        let second = db.students().create(&amina()).await.unwrap();
        assert_eq!(first.admission_number, "STD20250001");
        assert_eq!(second.admission_number, "STD20250002");

        let found = db
            .students()
            .get_by_admission_number("STD20250002")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, second.id);
    }

    #[tokio::test]
    async fn test_unknown_class_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut input = amina();
        input.class_id = Some("no-such-class".to_string());

        let err = db.students().create(&input).await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_update_and_filter_by_class() {
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
        let student = db.students().create(&amina()).await.unwrap();

        let updated = db
            .students()
            .update(
                &student.id,
                &StudentUpdate {
                    class_id: Some(class.id.clone()),
                    last_name: Some("  Hassan-Ali ".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.class_id.as_deref(), Some(class.id.as_str()));
        assert_eq!(updated.last_name, "Hassan-Ali");

        let in_class = db
            .students()
            .list(&StudentFilter {
                class_id: Some(class.id.clone()),
                include_inactive: false,
            })
            .await
            .unwrap();
        assert_eq!(in_class.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_update_and_deactivate() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let student = db.students().create(&amina()).await.unwrap();

        let err = db
            .students()
            .update(&student.id, &StudentUpdate::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Validation));

        db.students().deactivate(&student.id).await.unwrap();
        assert!(db.students().list(&StudentFilter::default()).await.unwrap().is_empty());
        let all = db
            .students()
            .list(&StudentFilter {
                class_id: None,
                include_inactive: true,
            })
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert!(!all[0].is_active);
    }

    #[tokio::test]
    async fn test_import_collects_failures() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut blank = amina();
        blank.first_name = "  ".to_string();

        let result = db
            .students()
            .import(vec![amina(), blank, amina()])
            .await
            .unwrap();

        assert_eq!(result.success.len(), 2);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].error, "first_name is required");
    }
}
