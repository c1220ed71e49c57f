//! # Timetable Repository
//!
//! Conflict-checked bookings of (class, subject, teacher, room?) into a
//! (period, day, academic year) slot.
//!
//! ## Booking
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create(NewTimetableEntry)                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BookingSlot::validate()            day 1..=7, year, ids present       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN                                                                 │
//! │  ├── referenced class / subject / teacher / room / period exist        │
//! │  ├── load active entries in (period, day, year)                        │
//! │  ├── campus_core::timetable::check_conflicts  class → teacher → room   │
//! │  ├── INSERT (partial unique indexes back up the check)                 │
//! │  └── COMMIT                                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use super::{ensure_active, ensure_exists};
use crate::error::{DbError, DbResult};
use campus_core::timetable::{check_conflicts, BookingSlot};
use campus_core::{TimetableEntry, ValidationError};

const ENTRY_COLUMNS: &str = "t.id, t.class_id, t.subject_id, t.teacher_id, t.room_id, t.period_id, \
                             t.day_of_week, t.academic_year, t.is_active, t.created_at, t.updated_at, t.deleted_at";

/// Input for [`TimetableRepository::create`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTimetableEntry {
    pub class_id: String,
    pub subject_id: String,
    pub teacher_id: String,
    #[serde(default)]
    pub room_id: Option<String>,
    pub period_id: String,
    pub day_of_week: i64,
    pub academic_year: String,
}

impl NewTimetableEntry {
    fn slot(&self) -> BookingSlot {
        BookingSlot {
            class_id: self.class_id.clone(),
            teacher_id: self.teacher_id.clone(),
            room_id: self.room_id.clone(),
            period_id: self.period_id.clone(),
            day_of_week: self.day_of_week,
            academic_year: self.academic_year.clone(),
        }
    }
}

/// Partial update; merged with the stored entry and re-checked.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableUpdate {
    pub class_id: Option<String>,
    pub subject_id: Option<String>,
    pub teacher_id: Option<String>,
    pub room_id: Option<String>,
    /// Drops the room from the booking; exclusive with `room_id`.
    #[serde(default)]
    pub clear_room: bool,
    pub period_id: Option<String>,
    pub day_of_week: Option<i64>,
    pub academic_year: Option<String>,
}

impl TimetableUpdate {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::EmptyUpdate);
        }
        if self.clear_room && self.room_id.is_some() {
            return Err(ValidationError::InvalidFormat {
                field: "roomId".to_string(),
                reason: "cannot set and clear the room together".to_string(),
            });
        }
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.class_id.is_none()
            && self.subject_id.is_none()
            && self.teacher_id.is_none()
            && self.room_id.is_none()
            && !self.clear_room
            && self.period_id.is_none()
            && self.day_of_week.is_none()
            && self.academic_year.is_none()
    }

    fn merge_into(&self, entry: &mut TimetableEntry) {
        if let Some(v) = &self.class_id {
            entry.class_id = v.clone();
        }
        if let Some(v) = &self.subject_id {
            entry.subject_id = v.clone();
        }
        if let Some(v) = &self.teacher_id {
            entry.teacher_id = v.clone();
        }
        if self.clear_room {
            entry.room_id = None;
        } else if let Some(v) = &self.room_id {
            entry.room_id = Some(v.clone());
        }
        if let Some(v) = &self.period_id {
            entry.period_id = v.clone();
        }
        if let Some(v) = self.day_of_week {
            entry.day_of_week = v;
        }
        if let Some(v) = &self.academic_year {
            entry.academic_year = v.clone();
        }
    }
}

/// Repository for timetable database operations.
#[derive(Debug, Clone)]
pub struct TimetableRepository {
    pool: SqlitePool,
}

impl TimetableRepository {
    /// Creates a new TimetableRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TimetableRepository { pool }
    }

    /// Checks a proposed slot against active bookings without writing.
    ///
    /// `exclude_id` leaves that entry out of the comparison (update in place).
    pub async fn check_conflicts(&self, slot: &BookingSlot, exclude_id: Option<&str>) -> DbResult<()> {
        slot.validate()?;
        let mut conn = self.pool.acquire().await?;
        let occupants = load_occupants(&mut conn, slot).await?;
        check_conflicts(slot, &occupants, exclude_id)?;
        Ok(())
    }

    /// Books a lesson.
    ///
    /// ## Errors
    /// - Validation: malformed slot
    /// - NotFound: a referenced class, subject, teacher, room or period is missing
    /// - Conflict: class, teacher or room already booked for the slot (first hit wins)
    pub async fn create(&self, input: &NewTimetableEntry) -> DbResult<TimetableEntry> {
        let slot = input.slot();
        slot.validate()?;

        let mut tx = self.pool.begin().await?;

        ensure_references(&mut tx, &slot, &input.subject_id).await?;

        let occupants = load_occupants(&mut tx, &slot).await?;
        check_conflicts(&slot, &occupants, None)?;

        let now = Utc::now();
        let entry = TimetableEntry {
            id: Uuid::new_v4().to_string(),
            class_id: input.class_id.clone(),
            subject_id: input.subject_id.clone(),
            teacher_id: input.teacher_id.clone(),
            room_id: input.room_id.clone(),
            period_id: input.period_id.clone(),
            day_of_week: input.day_of_week,
            academic_year: input.academic_year.clone(),
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        debug!(
            id = %entry.id,
            class_id = %entry.class_id,
            teacher_id = %entry.teacher_id,
            day = entry.day_of_week,
            "Booking timetable entry"
        );

        sqlx::query(
            r#"
            INSERT INTO timetable_entries (
                id, class_id, subject_id, teacher_id, room_id, period_id,
                day_of_week, academic_year, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, ?9)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.class_id)
        .bind(&entry.subject_id)
        .bind(&entry.teacher_id)
        .bind(&entry.room_id)
        .bind(&entry.period_id)
        .bind(entry.day_of_week)
        .bind(&entry.academic_year)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::from(e).into_slot_conflict())?;

        tx.commit().await?;

        info!(id = %entry.id, "Timetable entry created");
        Ok(entry)
    }

    /// Gets an active entry by ID.
    pub async fn get(&self, id: &str) -> DbResult<TimetableEntry> {
        let mut conn = self.pool.acquire().await?;
        fetch_active(&mut conn, id).await
    }

    /// Moves or reassigns an entry, re-checking the merged slot with itself excluded.
    pub async fn update(&self, id: &str, changes: &TimetableUpdate) -> DbResult<TimetableEntry> {
        changes.validate()?;

        let mut tx = self.pool.begin().await?;

        let mut entry = fetch_active(&mut tx, id).await?;
        changes.merge_into(&mut entry);

        let slot = BookingSlot::of(&entry);
        slot.validate()?;
        ensure_references(&mut tx, &slot, &entry.subject_id).await?;

        let occupants = load_occupants(&mut tx, &slot).await?;
        check_conflicts(&slot, &occupants, Some(id))?;

        entry.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE timetable_entries SET
                class_id = ?2,
                subject_id = ?3,
                teacher_id = ?4,
                room_id = ?5,
                period_id = ?6,
                day_of_week = ?7,
                academic_year = ?8,
                updated_at = ?9
            WHERE id = ?1 AND is_active = 1
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.class_id)
        .bind(&entry.subject_id)
        .bind(&entry.teacher_id)
        .bind(&entry.room_id)
        .bind(&entry.period_id)
        .bind(entry.day_of_week)
        .bind(&entry.academic_year)
        .bind(entry.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::from(e).into_slot_conflict())?;

        tx.commit().await?;

        info!(id = %id, "Timetable entry updated");
        Ok(entry)
    }

    /// Soft-deletes an entry, freeing its slot.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE timetable_entries SET is_active = 0, deleted_at = ?2, updated_at = ?2 WHERE id = ?1 AND is_active = 1",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("TimetableEntry", id));
        }

        info!(id = %id, "Timetable entry removed");
        Ok(())
    }

    /// A class's week, ordered by day then period.
    pub async fn class_timetable(&self, class_id: &str, academic_year: &str) -> DbResult<Vec<TimetableEntry>> {
        self.week("t.class_id", class_id, academic_year).await
    }

    /// A teacher's week, ordered by day then period.
    pub async fn teacher_timetable(&self, teacher_id: &str, academic_year: &str) -> DbResult<Vec<TimetableEntry>> {
        self.week("t.teacher_id", teacher_id, academic_year).await
    }

    async fn week(&self, owner_column: &'static str, owner_id: &str, academic_year: &str) -> DbResult<Vec<TimetableEntry>> {
        let sql = format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM timetable_entries t
            JOIN periods p ON p.id = t.period_id
            WHERE {owner_column} = ?1
              AND t.academic_year = ?2
              AND t.is_active = 1
            ORDER BY t.day_of_week, p.sort_order
            "#
        );
        let entries = sqlx::query_as::<_, TimetableEntry>(&sql)
            .bind(owner_id)
            .bind(academic_year)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }
}

async fn fetch_active(conn: &mut SqliteConnection, id: &str) -> DbResult<TimetableEntry> {
    let sql = format!("SELECT {ENTRY_COLUMNS} FROM timetable_entries t WHERE t.id = ?1 AND t.is_active = 1");
    sqlx::query_as::<_, TimetableEntry>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("TimetableEntry", id))
}

/// Active entries sharing the slot's (period, day, year).
async fn load_occupants(conn: &mut SqliteConnection, slot: &BookingSlot) -> DbResult<Vec<TimetableEntry>> {
    let sql = format!(
        r#"
        SELECT {ENTRY_COLUMNS}
        FROM timetable_entries t
        WHERE t.is_active = 1
          AND t.period_id = ?1
          AND t.day_of_week = ?2
          AND t.academic_year = ?3
        "#
    );
    let entries = sqlx::query_as::<_, TimetableEntry>(&sql)
        .bind(&slot.period_id)
        .bind(slot.day_of_week)
        .bind(&slot.academic_year)
        .fetch_all(&mut *conn)
        .await?;
    Ok(entries)
}

async fn ensure_references(conn: &mut SqliteConnection, slot: &BookingSlot, subject_id: &str) -> DbResult<()> {
    ensure_active(conn, "classes", "Class", &slot.class_id).await?;
    ensure_exists(conn, "subjects", "Subject", subject_id).await?;
    ensure_active(conn, "teachers", "Teacher", &slot.teacher_id).await?;
    if let Some(room_id) = &slot.room_id {
        ensure_exists(conn, "rooms", "Room", room_id).await?;
    }
    ensure_exists(conn, "periods", "Period", &slot.period_id).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::catalog::{NewPeriod, NewRoom, NewSubject};
    use crate::repository::class::NewClass;
    use crate::repository::teacher::NewTeacher;
    use campus_core::{CoreError, ErrorKind, SlotConflict};

    struct School {
        db: Database,
        classes: Vec<String>,
        teachers: Vec<String>,
        rooms: Vec<String>,
        subject: String,
        periods: Vec<String>,
    }

    async fn school() -> School {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut classes = Vec::new();
        for name in ["Grade 4 East", "Grade 4 West"] {
            let class = db
                .classes()
                .create(&NewClass {
                    name: name.to_string(),
                    academic_year: "2025".to_string(),
                    class_teacher_id: None,
                })
                .await
                .unwrap();
            classes.push(class.id);
        }

        let mut teachers = Vec::new();
        for (first, email) in [("Mark", "mark@school.test"), ("Grace", "grace@school.test")] {
            let teacher = db
                .teachers()
                .create(&NewTeacher {
                    first_name: first.to_string(),
                    last_name: "Teacher".to_string(),
                    email: email.to_string(),
                    phone: None,
                    hire_date: None,
                })
                .await
                .unwrap();
            teachers.push(teacher.id);
        }

        let mut rooms = Vec::new();
        for name in ["Lab 1", "Room 12"] {
            let room = db
                .catalog()
                .create_room(&NewRoom {
                    name: name.to_string(),
                    capacity: None,
                })
                .await
                .unwrap();
            rooms.push(room.id);
        }

        let subject = db
            .catalog()
            .create_subject(&NewSubject {
                code: "MATH".to_string(),
                name: "Mathematics".to_string(),
            })
            .await
            .unwrap()
            .id;

        let mut periods = Vec::new();
        for (name, start, end, order) in [("Period 1", "08:00", "08:40", 1), ("Period 2", "08:40", "09:20", 2)] {
            let period = db
                .catalog()
                .create_period(&NewPeriod {
                    name: name.to_string(),
                    start_time: start.to_string(),
                    end_time: end.to_string(),
                    sort_order: order,
                })
                .await
                .unwrap();
            periods.push(period.id);
        }

        School {
            db,
            classes,
            teachers,
            rooms,
            subject,
            periods,
        }
    }

    fn booking(s: &School, class: usize, teacher: usize, room: Option<usize>) -> NewTimetableEntry {
        NewTimetableEntry {
            class_id: s.classes[class].clone(),
            subject_id: s.subject.clone(),
            teacher_id: s.teachers[teacher].clone(),
            room_id: room.map(|r| s.rooms[r].clone()),
            period_id: s.periods[0].clone(),
            day_of_week: 1,
            academic_year: "2025".to_string(),
        }
    }

    fn conflict_of(err: DbError) -> SlotConflict {
        match err {
            DbError::Domain(CoreError::Timetable(conflict)) => conflict,
            other => panic!("expected timetable conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_class_conflict() {
        let s = school().await;
        s.db.timetable().create(&booking(&s, 0, 0, None)).await.unwrap();

        let err = s.db.timetable().create(&booking(&s, 0, 1, None)).await.unwrap_err();
        assert_eq!(conflict_of(err), SlotConflict::Class);
    }

    #[tokio::test]
    async fn test_teacher_conflict() {
        let s = school().await;
        s.db.timetable().create(&booking(&s, 0, 0, None)).await.unwrap();

        let err = s.db.timetable().create(&booking(&s, 1, 0, None)).await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Conflict));
        assert_eq!(err.to_string(), "Teacher is already booked for this period");
    }

    #[tokio::test]
    async fn test_room_conflict_only_when_room_given() {
        let s = school().await;
        s.db.timetable().create(&booking(&s, 0, 0, Some(0))).await.unwrap();

        let err = s.db.timetable().create(&booking(&s, 1, 1, Some(0))).await.unwrap_err();
        assert_eq!(conflict_of(err), SlotConflict::Room);

        assert!(s.db.timetable().create(&booking(&s, 1, 1, None)).await.is_ok());
    }

    #[tokio::test]
    async fn test_other_day_or_period_is_free() {
        let s = school().await;
        s.db.timetable().create(&booking(&s, 0, 0, Some(0))).await.unwrap();

        let mut tuesday = booking(&s, 0, 0, Some(0));
        tuesday.day_of_week = 2;
        assert!(s.db.timetable().create(&tuesday).await.is_ok());

        let mut second_period = booking(&s, 0, 0, Some(0));
        second_period.period_id = s.periods[1].clone();
        assert!(s.db.timetable().create(&second_period).await.is_ok());

        let week = s.db.timetable().class_timetable(&s.classes[0], "2025").await.unwrap();
        assert_eq!(week.len(), 3);
        assert_eq!(week[0].day_of_week, 1);
        assert_eq!(week[0].period_id, s.periods[0]);
        assert_eq!(week[1].period_id, s.periods[1]);
        assert_eq!(week[2].day_of_week, 2);
    }

    #[tokio::test]
    async fn test_update_in_place_and_move() {
        let s = school().await;
        let entry = s.db.timetable().create(&booking(&s, 0, 0, Some(0))).await.unwrap();
        let other = s.db.timetable().create(&booking(&s, 1, 1, Some(1))).await.unwrap();

        // Re-saving the same slot must not collide with its own row.
        let updated = s
            .db
            .timetable()
            .update(
                &entry.id,
                &TimetableUpdate {
                    day_of_week: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.id, entry.id);

        // Moving the first class's teacher onto the second booking's teacher collides.
        let err = s
            .db
            .timetable()
            .update(
                &entry.id,
                &TimetableUpdate {
                    teacher_id: Some(s.teachers[1].clone()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(conflict_of(err), SlotConflict::Teacher);

        let teacher_week = s.db.timetable().teacher_timetable(&s.teachers[1], "2025").await.unwrap();
        assert_eq!(teacher_week.len(), 1);
        assert_eq!(teacher_week[0].id, other.id);
    }

    #[tokio::test]
    async fn test_update_clears_room() {
        let s = school().await;
        let entry = s.db.timetable().create(&booking(&s, 0, 0, Some(0))).await.unwrap();

        let err = s
            .db
            .timetable()
            .update(
                &entry.id,
                &TimetableUpdate {
                    room_id: Some(s.rooms[1].clone()),
                    clear_room: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Validation));

        let updated = s
            .db
            .timetable()
            .update(
                &entry.id,
                &TimetableUpdate {
                    clear_room: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.room_id, None);
        assert_eq!(s.db.timetable().get(&entry.id).await.unwrap().room_id, None);

        // The freed room can now host another class in the same slot.
        assert!(s.db.timetable().create(&booking(&s, 1, 1, Some(0))).await.is_ok());
    }

    #[tokio::test]
    async fn test_soft_delete_frees_slot() {
        let s = school().await;
        let entry = s.db.timetable().create(&booking(&s, 0, 0, None)).await.unwrap();

        s.db.timetable().delete(&entry.id).await.unwrap();
        assert!(s.db.timetable().create(&booking(&s, 0, 0, None)).await.is_ok());
        assert_eq!(s.db.timetable().get(&entry.id).await.unwrap_err().kind(), Some(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_validation_before_lookup() {
        let s = school().await;
        let mut bad = booking(&s, 0, 0, None);
        bad.day_of_week = 9;
        let err = s.db.timetable().create(&bad).await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Validation));

        let mut unknown = booking(&s, 0, 0, None);
        unknown.period_id = "nope".to_string();
        let err = s.db.timetable().create(&unknown).await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_standalone_check() {
        let s = school().await;
        let entry = s.db.timetable().create(&booking(&s, 0, 0, None)).await.unwrap();

        let slot = BookingSlot::of(&entry);
        assert!(s.db.timetable().check_conflicts(&slot, None).await.is_err());
        assert!(s.db.timetable().check_conflicts(&slot, Some(&entry.id)).await.is_ok());
    }
}
