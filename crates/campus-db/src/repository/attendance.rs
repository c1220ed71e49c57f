//! # Attendance Repository
//!
//! One mark per student per school day. Marking a class again for the
//! same date overwrites the earlier marks (UNIQUE(student_id, date) upsert).

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use super::ensure_active;
use crate::error::{DbError, DbResult};
use campus_core::validation::validate_bulk_size;
use campus_core::{AttendanceRecord, AttendanceStatus, BulkResult, CoreError, ValidationError};

const ATTENDANCE_COLUMNS: &str =
    "id, student_id, class_id, date, status, remarks, recorded_by, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
    pub student_id: String,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub remarks: Option<String>,
}

/// A class register for one day.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAttendance {
    pub date: NaiveDate,
    #[serde(default)]
    pub recorded_by: Option<String>,
    pub entries: Vec<AttendanceEntry>,
}

/// Counts by status over a date range (inclusive).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub student_id: String,
    pub present: i64,
    pub absent: i64,
    pub late: i64,
    pub excused: i64,
    pub total: i64,
}

/// Repository for attendance records.
#[derive(Debug, Clone)]
pub struct AttendanceRepository {
    pool: SqlitePool,
}

impl AttendanceRepository {
    /// Creates a new AttendanceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AttendanceRepository { pool }
    }

    /// Records a day's register for a class. Rows for students outside the
    /// class are reported as failed; the others are written.
    pub async fn mark(
        &self,
        class_id: &str,
        register: MarkAttendance,
    ) -> DbResult<BulkResult<AttendanceRecord, AttendanceEntry>> {
        validate_bulk_size("entries", register.entries.len())?;
        {
            let mut conn = self.pool.acquire().await?;
            ensure_active(&mut conn, "classes", "Class", class_id).await?;
        }

        let mut result = BulkResult::new();
        for entry in register.entries {
            let outcome = self
                .mark_one(class_id, register.date, register.recorded_by.as_deref(), &entry)
                .await;
            if let Err(e) = &outcome {
                warn!(student_id = %entry.student_id, date = %register.date, error = %e, "Attendance row rejected");
            }
            result.record(entry, outcome);
        }

        info!(
            class_id = %class_id,
            date = %register.date,
            marked = result.success.len(),
            failed = result.failed.len(),
            "Attendance marked"
        );
        Ok(result)
    }

    async fn mark_one(
        &self,
        class_id: &str,
        date: NaiveDate,
        recorded_by: Option<&str>,
        entry: &AttendanceEntry,
    ) -> DbResult<AttendanceRecord> {
        if let Some(remarks) = &entry.remarks {
            if remarks.len() > 500 {
                return Err(ValidationError::TooLong {
                    field: "remarks".to_string(),
                    max: 500,
                }
                .into());
            }
        }

        let enrolled_in: Option<String> = sqlx::query_scalar::<_, Option<String>>(
            "SELECT class_id FROM students WHERE id = ?1 AND is_active = 1",
        )
        .bind(&entry.student_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Student", &entry.student_id))?;

        if enrolled_in.as_deref() != Some(class_id) {
            return Err(CoreError::NotEnrolled {
                student_id: entry.student_id.clone(),
                class_id: class_id.to_string(),
            }
            .into());
        }

        let now = Utc::now();
        let sql = format!(
            r#"
            INSERT INTO attendance_records (
                id, student_id, class_id, date, status, remarks, recorded_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            ON CONFLICT(student_id, date) DO UPDATE SET
                class_id = excluded.class_id,
                status = excluded.status,
                remarks = excluded.remarks,
                recorded_by = excluded.recorded_by,
                updated_at = excluded.updated_at
            RETURNING {ATTENDANCE_COLUMNS}
            "#
        );

        let record = sqlx::query_as::<_, AttendanceRecord>(&sql)
            .bind(Uuid::new_v4().to_string())
            .bind(&entry.student_id)
            .bind(class_id)
            .bind(date)
            .bind(entry.status)
            .bind(&entry.remarks)
            .bind(recorded_by)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        Ok(record)
    }

    /// The register of a class for one day.
    pub async fn for_class(&self, class_id: &str, date: NaiveDate) -> DbResult<Vec<AttendanceRecord>> {
        let sql = format!(
            r#"
            SELECT a.{}
            FROM attendance_records a
            JOIN students s ON s.id = a.student_id
            WHERE a.class_id = ?1 AND a.date = ?2
            ORDER BY s.last_name, s.first_name
            "#,
            ATTENDANCE_COLUMNS.replace(", ", ", a.")
        );
        let records = sqlx::query_as::<_, AttendanceRecord>(&sql)
            .bind(class_id)
            .bind(date)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    /// Counts a student's marks between `from` and `to` inclusive.
    pub async fn student_summary(
        &self,
        student_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DbResult<AttendanceSummary> {
        if to < from {
            return Err(ValidationError::InvalidFormat {
                field: "to".to_string(),
                reason: "must not be before from".to_string(),
            }
            .into());
        }

        let counts: Vec<(AttendanceStatus, i64)> = sqlx::query_as(
            r#"
            SELECT status, COUNT(*)
            FROM attendance_records
            WHERE student_id = ?1 AND date BETWEEN ?2 AND ?3
            GROUP BY status
            "#,
        )
        .bind(student_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        let mut summary = AttendanceSummary {
            student_id: student_id.to_string(),
            ..Default::default()
        };
        for (status, count) in counts {
            match status {
                AttendanceStatus::Present => summary.present = count,
                AttendanceStatus::Absent => summary.absent = count,
                AttendanceStatus::Late => summary.late = count,
                AttendanceStatus::Excused => summary.excused = count,
            }
            summary.total += count;
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::class::NewClass;
    use crate::repository::student::NewStudent;
    use campus_core::{ErrorKind, Student};

    async fn class_with_students(db: &Database, name: &str, names: &[&str]) -> (String, Vec<Student>) {
        let class = db
            .classes()
            .create(&NewClass {
                name: name.to_string(),
                academic_year: "2025".to_string(),
                class_teacher_id: None,
            })
            .await
            .unwrap();

        let mut students = Vec::new();
        for first_name in names {
            let student = db
                .students()
                .create(&NewStudent {
                    first_name: first_name.to_string(),
                    last_name: "Ochieng".to_string(),
                    class_id: Some(class.id.clone()),
                    date_of_birth: None,
                    guardian_name: None,
                    guardian_phone: None,
                    admission_date: None,
                })
                .await
                .unwrap();
            students.push(student);
        }
        (class.id, students)
    }

    fn entry(student: &Student, status: AttendanceStatus) -> AttendanceEntry {
        AttendanceEntry {
            student_id: student.id.clone(),
            status,
            remarks: None,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[tokio::test]
    async fn test_mark_rejects_other_class() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (grade4, pupils) = class_with_students(&db, "Grade 4", &["Akinyi", "Baraka"]).await;
        let (_, others) = class_with_students(&db, "Grade 5", &["Chebet"]).await;

        let result = db
            .attendance()
            .mark(
                &grade4,
                MarkAttendance {
                    date: day(3),
                    recorded_by: None,
                    entries: vec![
                        entry(&pupils[0], AttendanceStatus::Present),
                        entry(&pupils[1], AttendanceStatus::Late),
                        entry(&others[0], AttendanceStatus::Present),
                    ],
                },
            )
            .await
            .unwrap();

        assert_eq!(result.success.len(), 2);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].data.student_id, others[0].id);
        assert!(result.failed[0].error.contains("not enrolled"));

        assert_eq!(db.attendance().for_class(&grade4, day(3)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_remark_overwrites() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (grade4, pupils) = class_with_students(&db, "Grade 4", &["Akinyi"]).await;

        let register = |status| MarkAttendance {
            date: day(3),
            recorded_by: Some("t-1".to_string()),
            entries: vec![entry(&pupils[0], status)],
        };

        let first = db.attendance().mark(&grade4, register(AttendanceStatus::Absent)).await.unwrap();
        let second = db.attendance().mark(&grade4, register(AttendanceStatus::Excused)).await.unwrap();

        assert_eq!(first.success[0].id, second.success[0].id);
        let records = db.attendance().for_class(&grade4, day(3)).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, AttendanceStatus::Excused);
    }

    #[tokio::test]
    async fn test_student_summary() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (grade4, pupils) = class_with_students(&db, "Grade 4", &["Akinyi"]).await;

        for (d, status) in [
            (3, AttendanceStatus::Present),
            (4, AttendanceStatus::Present),
            (5, AttendanceStatus::Late),
            (6, AttendanceStatus::Absent),
            (10, AttendanceStatus::Present),
        ] {
            db.attendance()
                .mark(
                    &grade4,
                    MarkAttendance {
                        date: day(d),
                        recorded_by: None,
                        entries: vec![entry(&pupils[0], status)],
                    },
                )
                .await
                .unwrap();
        }

        let summary = db.attendance().student_summary(&pupils[0].id, day(3), day(7)).await.unwrap();
        assert_eq!(summary.present, 2);
        assert_eq!(summary.late, 1);
        assert_eq!(summary.absent, 1);
        assert_eq!(summary.excused, 0);
        assert_eq!(summary.total, 4);

        let err = db
            .attendance()
            .student_summary(&pupils[0].id, day(7), day(3))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Validation));
    }

    #[tokio::test]
    async fn test_empty_register_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (grade4, _) = class_with_students(&db, "Grade 4", &[]).await;
        let err = db
            .attendance()
            .mark(
                &grade4,
                MarkAttendance {
                    date: day(3),
                    recorded_by: None,
                    entries: Vec::new(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Validation));
    }
}
