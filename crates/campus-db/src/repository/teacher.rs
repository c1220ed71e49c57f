//! # Teacher Repository
//!
//! Teaching staff records. Each teacher gets an employee id
//! (`TCH<yy><seq4>`, year of hire) and a unique email.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use super::duplicate_on;
use super::sequence::next_code;
use super::update::UpdateBuilder;
use crate::error::{DbError, DbResult};
use campus_core::sequence::SequenceKind;
use campus_core::validation::{validate_email, validate_name, validate_phone};
use campus_core::{Teacher, ValidationError, MAX_NAME_LEN};

const TEACHER_COLUMNS: &str = "id, employee_id, first_name, last_name, email, phone, hire_date, \
                               is_active, created_at, updated_at, deleted_at";

/// Input for [`TeacherRepository::create`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTeacher {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    /// Defaults to today.
    #[serde(default)]
    pub hire_date: Option<NaiveDate>,
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl NewTeacher {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_name("first_name", &self.first_name, MAX_NAME_LEN)?;
        validate_name("last_name", &self.last_name, MAX_NAME_LEN)?;
        validate_email(&self.email)?;
        if let Some(phone) = &self.phone {
            validate_phone("phone", phone)?;
        }
        Ok(())
    }
}

impl TeacherUpdate {
    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.first_name {
            validate_name("first_name", name, MAX_NAME_LEN)?;
        }
        if let Some(name) = &self.last_name {
            validate_name("last_name", name, MAX_NAME_LEN)?;
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if let Some(phone) = &self.phone {
            validate_phone("phone", phone)?;
        }
        Ok(())
    }
}

/// Repository for teacher database operations.
#[derive(Debug, Clone)]
pub struct TeacherRepository {
    pool: SqlitePool,
}

impl TeacherRepository {
    /// Creates a new TeacherRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TeacherRepository { pool }
    }

    /// Creates a teacher and allocates an employee id.
    ///
    /// ## Errors
    /// - Validation: names, email or phone malformed
    /// - Conflict: email already registered
    pub async fn create(&self, input: &NewTeacher) -> DbResult<Teacher> {
        input.validate()?;

        let now = Utc::now();
        let hire_date = input.hire_date.unwrap_or_else(|| now.date_naive());
        let email = input.email.trim().to_lowercase();

        let mut tx = self.pool.begin().await?;
        let employee_id = next_code(&mut tx, SequenceKind::Employee, hire_date).await?;

        let teacher = Teacher {
            id: Uuid::new_v4().to_string(),
            employee_id,
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            email,
            phone: input.phone.clone(),
            hire_date,
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        debug!(id = %teacher.id, employee_id = %teacher.employee_id, "Creating teacher");

        sqlx::query(
            r#"
            INSERT INTO teachers (
                id, employee_id, first_name, last_name, email, phone,
                hire_date, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?8)
            "#,
        )
        .bind(&teacher.id)
        .bind(&teacher.employee_id)
        .bind(&teacher.first_name)
        .bind(&teacher.last_name)
        .bind(&teacher.email)
        .bind(&teacher.phone)
        .bind(teacher.hire_date)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| duplicate_on(e.into(), "Teacher", "email", &teacher.email))?;

        tx.commit().await?;

        info!(id = %teacher.id, employee_id = %teacher.employee_id, "Teacher created");
        Ok(teacher)
    }

    /// Gets an active teacher by ID.
    pub async fn get(&self, id: &str) -> DbResult<Teacher> {
        let sql = format!("SELECT {TEACHER_COLUMNS} FROM teachers WHERE id = ?1 AND is_active = 1");
        sqlx::query_as::<_, Teacher>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Teacher", id))
    }

    /// Lists teachers ordered by name.
    pub async fn list(&self, include_inactive: bool) -> DbResult<Vec<Teacher>> {
        let sql = format!(
            r#"
            SELECT {TEACHER_COLUMNS}
            FROM teachers
            WHERE (?1 OR is_active = 1)
            ORDER BY last_name, first_name
            "#
        );
        let teachers = sqlx::query_as::<_, Teacher>(&sql)
            .bind(include_inactive)
            .fetch_all(&self.pool)
            .await?;
        Ok(teachers)
    }

    /// Applies a partial update.
    pub async fn update(&self, id: &str, changes: &TeacherUpdate) -> DbResult<Teacher> {
        changes.validate()?;

        let email = changes.email.as_ref().map(|e| e.trim().to_lowercase());

        let mut update = UpdateBuilder::new("teachers");
        update
            .set("first_name", changes.first_name.as_deref().map(str::trim))
            .set("last_name", changes.last_name.as_deref().map(str::trim))
            .set("email", email.clone())
            .set("phone", changes.phone.clone());

        if update.is_empty() {
            return Err(ValidationError::EmptyUpdate.into());
        }

        let result = update
            .finish(Some(("updated_at", Utc::now())), id, "is_active = 1")
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| duplicate_on(e.into(), "Teacher", "email", email.as_deref().unwrap_or("")))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Teacher", id));
        }

        debug!(id = %id, "Teacher updated");
        self.get(id).await
    }

    /// Soft-deletes a teacher. Existing timetable entries are left as they are.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE teachers SET is_active = 0, deleted_at = ?2, updated_at = ?2 WHERE id = ?1 AND is_active = 1",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Teacher", id));
        }

        info!(id = %id, "Teacher deactivated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use campus_core::{CoreError, ErrorKind};

    fn otieno() -> NewTeacher {
        NewTeacher {
            first_name: "Mark".to_string(),
            last_name: "Otieno".to_string(),
            email: "M.Otieno@School.test".to_string(),
            phone: Some("+254712345678".to_string()),
            hire_date: NaiveDate::from_ymd_opt(2025, 1, 6),
        }
    }

    #[tokio::test]
    async fn test_create_assigns_employee_id() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let first = db.teachers().create(&otieno()).await.unwrap();
        assert_eq!(first.employee_id, "TCH250001");
        assert_eq!(first.email, "m.otieno@school.test");

        let mut other = otieno();
        other.email = "wanjiru@school.test".to_string();
        let second = db.teachers().create(&other).await.unwrap();
        assert_eq!(second.employee_id, "TCH250002");
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.teachers().create(&otieno()).await.unwrap();

        let err = db.teachers().create(&otieno()).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Duplicate { .. })));
    }

    #[tokio::test]
    async fn test_partial_update() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let teacher = db.teachers().create(&otieno()).await.unwrap();

        let updated = db
            .teachers()
            .update(
                &teacher.id,
                &TeacherUpdate {
                    phone: Some("0722000111".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.phone.as_deref(), Some("0722000111"));
        assert_eq!(updated.first_name, "Mark");

        let err = db
            .teachers()
            .update(&teacher.id, &TeacherUpdate::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Validation));
    }

    #[tokio::test]
    async fn test_deactivate() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let teacher = db.teachers().create(&otieno()).await.unwrap();

        db.teachers().deactivate(&teacher.id).await.unwrap();
        assert!(db.teachers().list(false).await.unwrap().is_empty());
        assert_eq!(db.teachers().list(true).await.unwrap().len(), 1);
        assert_eq!(db.teachers().get(&teacher.id).await.unwrap_err().kind(), Some(ErrorKind::NotFound));
    }
}
