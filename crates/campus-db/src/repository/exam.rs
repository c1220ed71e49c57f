//! # Exam Repository
//!
//! Exams per class and subject, and the scores students earn in them.
//! Entering results again for the same (exam, student) replaces the score.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use super::{ensure_active, ensure_exists};
use crate::error::{DbError, DbResult};
use campus_core::validation::{validate_bulk_size, validate_name, validate_score};
use campus_core::{BulkResult, CoreError, Exam, ExamResult, ValidationError, MAX_NAME_LEN};

const EXAM_COLUMNS: &str = "id, name, class_id, subject_id, exam_date, max_score, created_at";
const RESULT_COLUMNS: &str = "id, exam_id, student_id, score, remarks, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExam {
    pub name: String,
    pub class_id: String,
    pub subject_id: String,
    pub exam_date: NaiveDate,
    pub max_score: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEntry {
    pub student_id: String,
    pub score: i64,
    #[serde(default)]
    pub remarks: Option<String>,
}

/// Repository for exams and results.
#[derive(Debug, Clone)]
pub struct ExamRepository {
    pool: SqlitePool,
}

impl ExamRepository {
    /// Creates a new ExamRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ExamRepository { pool }
    }

    pub async fn create(&self, input: &NewExam) -> DbResult<Exam> {
        validate_name("name", &input.name, MAX_NAME_LEN)?;
        if input.max_score <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "max_score".to_string(),
            }
            .into());
        }

        let mut tx = self.pool.begin().await?;
        ensure_active(&mut tx, "classes", "Class", &input.class_id).await?;
        ensure_exists(&mut tx, "subjects", "Subject", &input.subject_id).await?;

        let exam = Exam {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            class_id: input.class_id.clone(),
            subject_id: input.subject_id.clone(),
            exam_date: input.exam_date,
            max_score: input.max_score,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO exams (id, name, class_id, subject_id, exam_date, max_score, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&exam.id)
        .bind(&exam.name)
        .bind(&exam.class_id)
        .bind(&exam.subject_id)
        .bind(exam.exam_date)
        .bind(exam.max_score)
        .bind(exam.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(id = %exam.id, name = %exam.name, class_id = %exam.class_id, "Exam created");
        Ok(exam)
    }

    pub async fn get(&self, id: &str) -> DbResult<Exam> {
        let sql = format!("SELECT {EXAM_COLUMNS} FROM exams WHERE id = ?1");
        sqlx::query_as::<_, Exam>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Exam", id))
    }

    /// Exams of a class, most recent first.
    pub async fn list_for_class(&self, class_id: &str) -> DbResult<Vec<Exam>> {
        let sql = format!(
            "SELECT {EXAM_COLUMNS} FROM exams WHERE class_id = ?1 ORDER BY exam_date DESC, name"
        );
        let exams = sqlx::query_as::<_, Exam>(&sql)
            .bind(class_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(exams)
    }

    /// Enters scores for an exam. Out-of-range scores and unknown
    /// students are reported per row.
    pub async fn record_results(
        &self,
        exam_id: &str,
        entries: Vec<ResultEntry>,
    ) -> DbResult<BulkResult<ExamResult, ResultEntry>> {
        validate_bulk_size("results", entries.len())?;
        let exam = self.get(exam_id).await?;

        let mut result = BulkResult::new();
        for entry in entries {
            let outcome = self.record_one(&exam, &entry).await;
            if let Err(e) = &outcome {
                warn!(exam_id = %exam.id, student_id = %entry.student_id, error = %e, "Exam result rejected");
            }
            result.record(entry, outcome);
        }

        info!(
            exam_id = %exam.id,
            recorded = result.success.len(),
            failed = result.failed.len(),
            "Exam results recorded"
        );
        Ok(result)
    }

    async fn record_one(&self, exam: &Exam, entry: &ResultEntry) -> DbResult<ExamResult> {
        validate_score(entry.score, exam.max_score)?;

        let class_id: Option<String> = sqlx::query_scalar::<_, Option<String>>(
            "SELECT class_id FROM students WHERE id = ?1 AND is_active = 1",
        )
        .bind(&entry.student_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Student", &entry.student_id))?;

        if class_id.as_deref() != Some(exam.class_id.as_str()) {
            return Err(CoreError::NotEnrolled {
                student_id: entry.student_id.clone(),
                class_id: exam.class_id.clone(),
            }
            .into());
        }

        let sql = format!(
            r#"
            INSERT INTO exam_results (id, exam_id, student_id, score, remarks, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            ON CONFLICT(exam_id, student_id) DO UPDATE SET
                score = excluded.score,
                remarks = excluded.remarks,
                updated_at = excluded.updated_at
            RETURNING {RESULT_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, ExamResult>(&sql)
            .bind(Uuid::new_v4().to_string())
            .bind(&exam.id)
            .bind(&entry.student_id)
            .bind(entry.score)
            .bind(&entry.remarks)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;

        Ok(row)
    }

    /// Results of an exam, highest score first.
    pub async fn results(&self, exam_id: &str) -> DbResult<Vec<ExamResult>> {
        {
            let mut conn = self.pool.acquire().await?;
            ensure_exists(&mut conn, "exams", "Exam", exam_id).await?;
        }

        let sql = format!(
            "SELECT {RESULT_COLUMNS} FROM exam_results WHERE exam_id = ?1 ORDER BY score DESC, student_id"
        );
        let rows = sqlx::query_as::<_, ExamResult>(&sql)
            .bind(exam_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::catalog::NewSubject;
    use crate::repository::class::NewClass;
    use crate::repository::student::NewStudent;
    use campus_core::{ErrorKind, Student};

    struct Setup {
        db: Database,
        exam: Exam,
        students: Vec<Student>,
    }

    async fn setup() -> Setup {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let class = db
            .classes()
            .create(&NewClass {
                name: "Grade 6".to_string(),
                academic_year: "2025".to_string(),
                class_teacher_id: None,
            })
            .await
            .unwrap();
        let subject = db
            .catalog()
            .create_subject(&NewSubject {
                code: "SCI".to_string(),
                name: "Science".to_string(),
            })
            .await
            .unwrap();

        let mut students = Vec::new();
        for name in ["Njeri", "Otieno"] {
            students.push(
                db.students()
                    .create(&NewStudent {
                        first_name: name.to_string(),
                        last_name: "Kamau".to_string(),
                        class_id: Some(class.id.clone()),
                        date_of_birth: None,
                        guardian_name: None,
                        guardian_phone: None,
                        admission_date: None,
                    })
                    .await
                    .unwrap(),
            );
        }

        let exam = db
            .exams()
            .create(&NewExam {
                name: "Mid-term".to_string(),
                class_id: class.id,
                subject_id: subject.id,
                exam_date: NaiveDate::from_ymd_opt(2025, 6, 12).unwrap(),
                max_score: 50,
            })
            .await
            .unwrap();

        Setup { db, exam, students }
    }

    fn score(student: &Student, score: i64) -> ResultEntry {
        ResultEntry {
            student_id: student.id.clone(),
            score,
            remarks: None,
        }
    }

    #[tokio::test]
    async fn test_out_of_range_scores_fail_per_row() {
        let s = setup().await;

        let result = s
            .db
            .exams()
            .record_results(&s.exam.id, vec![score(&s.students[0], 42), score(&s.students[1], 51)])
            .await
            .unwrap();

        assert_eq!(result.success.len(), 1);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].data.score, 51);
        assert_eq!(s.db.exams().results(&s.exam.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reentry_replaces_score() {
        let s = setup().await;
        s.db.exams().record_results(&s.exam.id, vec![score(&s.students[0], 30)]).await.unwrap();
        s.db.exams().record_results(&s.exam.id, vec![score(&s.students[0], 35)]).await.unwrap();

        let results = s.db.exams().results(&s.exam.id).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].score, 35);
    }

    #[tokio::test]
    async fn test_list_and_unknown_exam() {
        let s = setup().await;
        assert_eq!(s.db.exams().list_for_class(&s.exam.class_id).await.unwrap().len(), 1);

        let err = s
            .db
            .exams()
            .record_results("missing", vec![score(&s.students[0], 1)])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_create_requires_positive_max() {
        let s = setup().await;
        let err = s
            .db
            .exams()
            .create(&NewExam {
                name: "Broken".to_string(),
                class_id: s.exam.class_id.clone(),
                subject_id: s.exam.subject_id.clone(),
                exam_date: s.exam.exam_date,
                max_score: 0,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Validation));
    }
}
