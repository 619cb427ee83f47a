// SQLite-backed store used by the CLI

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, SubsecRound, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{migrate::MigrateDatabase, Row};
use tracing::{debug, info};

use super::{status_write_allowed, AppointmentStore, InstructorStore, StoreError};
use crate::appointments::{
    Appointment, AppointmentId, AppointmentStatus, NewAppointment, StudentSnapshot,
};
use crate::instructors::{Availability, Instructor, InstructorId};
use crate::sync::{ChangeEvent, ChangeKind, SyncHub, Table};

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database {
            message: err.to_string(),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::Database {
            message: format!("migration failed: {err}"),
        }
    }
}

fn corrupt(table: &'static str, message: impl Into<String>) -> StoreError {
    StoreError::Corrupt {
        table,
        message: message.into(),
    }
}

pub struct SqliteStore {
    pool: SqlitePool,
    hub: Option<SyncHub>,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `database_url`.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        auto_migrate: bool,
    ) -> Result<Self, StoreError> {
        if !sqlx::Sqlite::database_exists(database_url).await? {
            info!("Creating database at {}", database_url);
            sqlx::Sqlite::create_database(database_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await?;

        let store = Self { pool, hub: None };
        if auto_migrate {
            store.migrate().await?;
        }
        Ok(store)
    }

    pub fn with_sync(mut self, hub: SyncHub) -> Self {
        self.hub = Some(hub);
        self
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn shutdown(&self) {
        info!("Shutting down database connections...");
        self.pool.close().await;
    }

    fn publish(&self, table: Table, kind: ChangeKind) {
        if let Some(hub) = &self.hub {
            hub.publish(ChangeEvent::new(table, kind));
        }
    }
}

fn appointment_from_row(row: &SqliteRow) -> Result<Appointment, StoreError> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let date: String = row.try_get("appointment_date")?;
    let time: String = row.try_get("appointment_time")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(Appointment {
        id: id
            .parse()
            .map_err(|_| corrupt("appointments", format!("bad id {id}")))?,
        instructor_id: InstructorId(row.try_get("instructor_id")?),
        student: StudentSnapshot {
            student_name: row.try_get("student_name")?,
            student_id: row.try_get("student_id")?,
            student_email: row.try_get("student_email")?,
            student_program: row.try_get("student_program")?,
            student_year_level: row.try_get("student_year_level")?,
            mobile_number: row.try_get("mobile_number")?,
        },
        reason: row.try_get("reason")?,
        appointment_date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .map_err(|e| corrupt("appointments", format!("bad date {date}: {e}")))?,
        appointment_time: NaiveTime::parse_from_str(&time, "%H:%M:%S")
            .map_err(|e| corrupt("appointments", format!("bad time {time}: {e}")))?,
        status: status
            .parse()
            .map_err(|e: crate::appointments::ParseStatusError| corrupt("appointments", e.to_string()))?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| corrupt("appointments", format!("bad created_at {created_at}: {e}")))?
            .with_timezone(&Utc),
    })
}

fn instructor_from_row(row: &SqliteRow) -> Result<Instructor, StoreError> {
    let availability: String = row.try_get("availability")?;
    Ok(Instructor {
        id: InstructorId(row.try_get("id")?),
        name: row.try_get("name")?,
        availability: availability
            .parse()
            .map_err(|e: crate::instructors::ParseAvailabilityError| corrupt("instructors", e.to_string()))?,
        remarks: row.try_get("remarks")?,
        verified: row.try_get::<i64, _>("verified")? != 0,
        profile_image_url: row.try_get("profile_image_url")?,
    })
}

#[async_trait]
impl AppointmentStore for SqliteStore {
    async fn create(&self, payload: NewAppointment) -> Result<Appointment, StoreError> {
        // Stored with microsecond precision; match it so the returned row equals a re-read.
        let appointment = payload.into_appointment(AppointmentId::new(), Utc::now().trunc_subsecs(6));

        sqlx::query(
            r#"
            INSERT INTO appointments (
                id, instructor_id, student_name, student_id, student_email,
                student_program, student_year_level, mobile_number, reason,
                appointment_date, appointment_time, status, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(appointment.id.to_string())
        .bind(&appointment.instructor_id.0)
        .bind(&appointment.student.student_name)
        .bind(&appointment.student.student_id)
        .bind(&appointment.student.student_email)
        .bind(&appointment.student.student_program)
        .bind(&appointment.student.student_year_level)
        .bind(&appointment.student.mobile_number)
        .bind(&appointment.reason)
        .bind(appointment.appointment_date.format("%Y-%m-%d").to_string())
        .bind(appointment.appointment_time.format("%H:%M:%S").to_string())
        .bind(appointment.status.as_str())
        .bind(appointment.created_at.to_rfc3339_opts(SecondsFormat::Micros, true))
        .execute(&self.pool)
        .await?;

        debug!(appointment.id = %appointment.id, "Inserted appointment");
        self.publish(Table::Appointments, ChangeKind::Insert);
        Ok(appointment)
    }

    async fn list_by_instructor(&self, instructor: &InstructorId) -> Result<Vec<Appointment>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM appointments
            WHERE instructor_id = ?1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(&instructor.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(appointment_from_row).collect()
    }

    async fn get(&self, id: AppointmentId) -> Result<Appointment, StoreError> {
        let row = sqlx::query("SELECT * FROM appointments WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => appointment_from_row(&row),
            None => Err(StoreError::AppointmentNotFound(id)),
        }
    }

    async fn update_status(&self, id: AppointmentId, status: AppointmentStatus) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<String> = sqlx::query_scalar("SELECT status FROM appointments WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await?;
        let current: AppointmentStatus = current
            .ok_or(StoreError::AppointmentNotFound(id))?
            .parse()
            .map_err(|e: crate::appointments::ParseStatusError| corrupt("appointments", e.to_string()))?;

        if !status_write_allowed(current, status) {
            return Err(StoreError::StatusConflict {
                id,
                current,
                requested: status,
            });
        }

        sqlx::query(
            r#"
            UPDATE appointments
            SET status = ?1,
                notified_status = CASE WHEN ?3 THEN NULL ELSE notified_status END
            WHERE id = ?2
            "#,
        )
        .bind(status.as_str())
        .bind(id.to_string())
        .bind(status.is_terminal())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        self.publish(Table::Appointments, ChangeKind::Update);
        Ok(())
    }

    async fn record_notified(&self, id: AppointmentId, status: AppointmentStatus) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE appointments SET notified_status = ?1 WHERE id = ?2")
            .bind(status.as_str())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::AppointmentNotFound(id));
        }
        Ok(())
    }

    async fn notified_unrecorded(&self, id: AppointmentId) -> Result<Option<AppointmentStatus>, StoreError> {
        let notified: Option<Option<String>> =
            sqlx::query_scalar("SELECT notified_status FROM appointments WHERE id = ?1")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;
        notified
            .ok_or(StoreError::AppointmentNotFound(id))?
            .map(|status| {
                status
                    .parse()
                    .map_err(|e: crate::appointments::ParseStatusError| corrupt("appointments", e.to_string()))
            })
            .transpose()
    }
}

#[async_trait]
impl InstructorStore for SqliteStore {
    async fn get_instructor(&self, id: &InstructorId) -> Result<Option<Instructor>, StoreError> {
        let row = sqlx::query("SELECT * FROM instructors WHERE id = ?1")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(instructor_from_row).transpose()
    }

    async fn list_verified(&self) -> Result<Vec<Instructor>, StoreError> {
        let rows = sqlx::query("SELECT * FROM instructors WHERE verified = 1 ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(instructor_from_row).collect()
    }

    async fn update_availability(&self, id: &InstructorId, availability: Availability) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE instructors SET availability = ?1 WHERE id = ?2")
            .bind(availability.as_str())
            .bind(&id.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::InstructorNotFound(id.clone()));
        }
        self.publish(Table::Instructors, ChangeKind::Update);
        Ok(())
    }

    async fn update_remarks(&self, id: &InstructorId, remarks: &str) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE instructors SET remarks = ?1 WHERE id = ?2")
            .bind(remarks)
            .bind(&id.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::InstructorNotFound(id.clone()));
        }
        self.publish(Table::Instructors, ChangeKind::Update);
        Ok(())
    }

    async fn upsert_instructor(&self, instructor: Instructor) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO instructors (id, name, availability, remarks, verified, profile_image_url)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                availability = excluded.availability,
                remarks = excluded.remarks,
                verified = excluded.verified,
                profile_image_url = excluded.profile_image_url
            "#,
        )
        .bind(&instructor.id.0)
        .bind(&instructor.name)
        .bind(instructor.availability.as_str())
        .bind(&instructor.remarks)
        .bind(instructor.verified as i64)
        .bind(&instructor.profile_image_url)
        .execute(&self.pool)
        .await?;

        self.publish(Table::Instructors, ChangeKind::Update);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("office-hours.db").display());
        let store = SqliteStore::connect(&url, 1, true).await.unwrap();
        (store, dir)
    }

    fn payload(instructor: &InstructorId) -> NewAppointment {
        NewAppointment {
            instructor_id: instructor.clone(),
            student: StudentSnapshot {
                student_name: "Carla".to_string(),
                student_email: Some("carla@school.edu".to_string()),
                student_program: "BSCS".to_string(),
                ..Default::default()
            },
            reason: "Project review".to_string(),
            appointment_date: NaiveDate::from_ymd_opt(2026, 11, 4).unwrap(),
            appointment_time: NaiveTime::from_hms_opt(14, 30, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_round_trip_and_conditional_update() {
        let (store, _dir) = store().await;
        let instructor = Instructor::new("instr-9", "Prof. Tan").verified();
        store.upsert_instructor(instructor.clone()).await.unwrap();

        let created = store.create(payload(&instructor.id)).await.unwrap();
        let listed = store.list_by_instructor(&instructor.id).await.unwrap();
        assert_eq!(listed, vec![created.clone()]);

        store.update_status(created.id, AppointmentStatus::Read).await.unwrap();
        store.update_status(created.id, AppointmentStatus::NotApproved).await.unwrap();
        let err = store
            .update_status(created.id, AppointmentStatus::Approved)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::StatusConflict { .. }));
        assert_eq!(store.get(created.id).await.unwrap().status, AppointmentStatus::NotApproved);
    }

    #[tokio::test]
    async fn test_notified_marker_survives_until_status_lands() {
        let (store, _dir) = store().await;
        let instructor = Instructor::new("instr-9", "Prof. Tan").verified();
        store.upsert_instructor(instructor.clone()).await.unwrap();
        let created = store.create(payload(&instructor.id)).await.unwrap();

        assert_eq!(store.notified_unrecorded(created.id).await.unwrap(), None);
        store
            .record_notified(created.id, AppointmentStatus::Approved)
            .await
            .unwrap();
        assert_eq!(
            store.notified_unrecorded(created.id).await.unwrap(),
            Some(AppointmentStatus::Approved)
        );

        store.update_status(created.id, AppointmentStatus::Approved).await.unwrap();
        assert_eq!(store.notified_unrecorded(created.id).await.unwrap(), None);

        let missing = AppointmentId::new();
        assert_eq!(
            store.record_notified(missing, AppointmentStatus::Approved).await,
            Err(StoreError::AppointmentNotFound(missing))
        );
    }

    #[tokio::test]
    async fn test_instructor_updates() {
        let (store, _dir) = store().await;
        let id = InstructorId::from("instr-1");
        store.upsert_instructor(Instructor::new("instr-1", "Prof. Uy")).await.unwrap();
        assert!(store.list_verified().await.unwrap().is_empty());

        store.update_availability(&id, Availability::InClass).await.unwrap();
        store.update_remarks(&id, "Back at 3 PM").await.unwrap();
        let loaded = store.get_instructor(&id).await.unwrap().unwrap();
        assert_eq!(loaded.availability, Availability::InClass);
        assert_eq!(loaded.remarks, "Back at 3 PM");

        let missing = store
            .update_remarks(&InstructorId::from("nobody"), "x")
            .await
            .unwrap_err();
        assert_eq!(missing, StoreError::InstructorNotFound(InstructorId::from("nobody")));
    }
}
