//! # Catalog Repository
//!
//! Reference data the timetable books against: subjects, rooms, periods.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use super::duplicate_on;
use crate::error::DbResult;
use campus_core::validation::{validate_name, validate_time_of_day};
use campus_core::{Period, Room, Subject, ValidationError, MAX_NAME_LEN};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubject {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRoom {
    pub name: String,
    #[serde(default)]
    pub capacity: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPeriod {
    pub name: String,
    pub start_time: String,
    pub end_time: String,
    pub sort_order: i64,
}

impl NewPeriod {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_name("name", &self.name, MAX_NAME_LEN)?;
        validate_time_of_day("start_time", &self.start_time)?;
        validate_time_of_day("end_time", &self.end_time)?;
        // Zero-padded HH:MM compares correctly as text.
        if self.end_time <= self.start_time {
            return Err(ValidationError::InvalidFormat {
                field: "end_time".to_string(),
                reason: "must be after start_time".to_string(),
            });
        }
        Ok(())
    }
}

/// Repository for subjects, rooms and periods.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    pub async fn create_subject(&self, input: &NewSubject) -> DbResult<Subject> {
        validate_name("code", &input.code, 20)?;
        validate_name("name", &input.name, MAX_NAME_LEN)?;

        let subject = Subject {
            id: Uuid::new_v4().to_string(),
            code: input.code.trim().to_uppercase(),
            name: input.name.trim().to_string(),
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO subjects (id, code, name, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(&subject.id)
            .bind(&subject.code)
            .bind(&subject.name)
            .bind(subject.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| duplicate_on(e.into(), "Subject", "code", &subject.code))?;

        info!(id = %subject.id, code = %subject.code, "Subject created");
        Ok(subject)
    }

    pub async fn list_subjects(&self) -> DbResult<Vec<Subject>> {
        let subjects = sqlx::query_as::<_, Subject>(
            "SELECT id, code, name, created_at FROM subjects ORDER BY code",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(subjects)
    }

    pub async fn create_room(&self, input: &NewRoom) -> DbResult<Room> {
        validate_name("name", &input.name, MAX_NAME_LEN)?;
        if let Some(capacity) = input.capacity {
            if capacity <= 0 {
                return Err(ValidationError::MustBePositive {
                    field: "capacity".to_string(),
                }
                .into());
            }
        }

        let room = Room {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            capacity: input.capacity,
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO rooms (id, name, capacity, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(&room.id)
            .bind(&room.name)
            .bind(room.capacity)
            .bind(room.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| duplicate_on(e.into(), "Room", "name", &room.name))?;

        info!(id = %room.id, name = %room.name, "Room created");
        Ok(room)
    }

    pub async fn list_rooms(&self) -> DbResult<Vec<Room>> {
        let rooms = sqlx::query_as::<_, Room>(
            "SELECT id, name, capacity, created_at FROM rooms ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rooms)
    }

    pub async fn create_period(&self, input: &NewPeriod) -> DbResult<Period> {
        input.validate()?;

        let period = Period {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            start_time: input.start_time.clone(),
            end_time: input.end_time.clone(),
            sort_order: input.sort_order,
        };

        sqlx::query(
            "INSERT INTO periods (id, name, start_time, end_time, sort_order) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&period.id)
        .bind(&period.name)
        .bind(&period.start_time)
        .bind(&period.end_time)
        .bind(period.sort_order)
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_on(e.into(), "Period", "name", &period.name))?;

        info!(id = %period.id, name = %period.name, "Period created");
        Ok(period)
    }

    /// Periods in school-day order.
    pub async fn list_periods(&self) -> DbResult<Vec<Period>> {
        let periods = sqlx::query_as::<_, Period>(
            "SELECT id, name, start_time, end_time, sort_order FROM periods ORDER BY sort_order, start_time",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(periods)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use campus_core::ErrorKind;

    #[tokio::test]
    async fn test_subjects_unique_by_code() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let math = NewSubject {
            code: "math".to_string(),
            name: "Mathematics".to_string(),
        };

        let created = db.catalog().create_subject(&math).await.unwrap();
        assert_eq!(created.code, "MATH");

        let err = db.catalog().create_subject(&math).await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Conflict));
        assert_eq!(db.catalog().list_subjects().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_periods_ordered() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        for (name, start, end, order) in [("Period 2", "08:40", "09:20", 2), ("Period 1", "08:00", "08:40", 1)] {
            db.catalog()
                .create_period(&NewPeriod {
                    name: name.to_string(),
                    start_time: start.to_string(),
                    end_time: end.to_string(),
                    sort_order: order,
                })
                .await
                .unwrap();
        }

        let periods = db.catalog().list_periods().await.unwrap();
        assert_eq!(periods[0].name, "Period 1");
        assert_eq!(periods[1].name, "Period 2");
    }

    #[tokio::test]
    async fn test_period_must_end_after_start() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db
            .catalog()
            .create_period(&NewPeriod {
                name: "Broken".to_string(),
                start_time: "09:00".to_string(),
                end_time: "08:00".to_string(),
                sort_order: 1,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Validation));
    }

    #[tokio::test]
    async fn test_rooms() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.catalog()
            .create_room(&NewRoom {
                name: "Lab 1".to_string(),
                capacity: Some(40),
            })
            .await
            .unwrap();
        assert!(db
            .catalog()
            .create_room(&NewRoom {
                name: "Hall".to_string(),
                capacity: Some(0),
            })
            .await
            .is_err());
        assert_eq!(db.catalog().list_rooms().await.unwrap().len(), 1);
    }
}
