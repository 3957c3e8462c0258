//! PostgreSQL implementation of the relational store.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{
    format_case_id, NewPerson, NewRegistration, Person, PersonCounts, PersonData, Registration,
    RegistrationStatus, StoreError,
};

/// Application-wide advisory lock key serializing case-id allocation.
const CASE_ALLOC_LOCK: i64 = 0x5245_554e_4954_4531;

/// PostgreSQL-backed person/registration store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    case_prefix: String,
}

/// Row type for registration queries.
#[derive(FromRow)]
struct RegistrationRow {
    id: Uuid,
    person_data: Json<PersonData>,
    person_image_url: String,
    aadhar_image_url: Option<String>,
    #[sqlx(try_from = "String")]
    status: RegistrationStatus,
    submitted_at: DateTime<Utc>,
    reviewed_by: Option<String>,
    reviewed_at: Option<DateTime<Utc>>,
}

impl From<RegistrationRow> for Registration {
    fn from(row: RegistrationRow) -> Self {
        Self {
            id: row.id,
            person_data: row.person_data.0,
            person_image_url: row.person_image_url,
            aadhar_image_url: row.aadhar_image_url,
            status: row.status,
            submitted_at: row.submitted_at,
            reviewed_by: row.reviewed_by,
            reviewed_at: row.reviewed_at,
        }
    }
}

impl PostgresStore {
    /// Connect with the given database URL.
    ///
    /// Runs migrations automatically on connection.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        case_prefix: &str,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;

        tracing::info!("Relational store connected and migrations applied");

        Ok(Self {
            pool,
            case_prefix: case_prefix.to_string(),
        })
    }

    /// Create a store from an existing pool (for testing).
    pub fn from_pool(pool: PgPool, case_prefix: &str) -> Self {
        Self {
            pool,
            case_prefix: case_prefix.to_string(),
        }
    }

    pub async fn check_health(&self) -> Result<(), StoreError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn create_registration(
        &self,
        input: NewRegistration,
    ) -> Result<Registration, StoreError> {
        let row: RegistrationRow = sqlx::query_as(
            r#"
            INSERT INTO registrations (id, person_data, person_image_url, aadhar_image_url, status)
            VALUES ($1, $2, $3, $4, 'pending')
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(Json(&input.person_data))
        .bind(&input.person_image_url)
        .bind(&input.aadhar_image_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    pub async fn registration(&self, id: Uuid) -> Result<Option<Registration>, StoreError> {
        let row: Option<RegistrationRow> =
            sqlx::query_as("SELECT * FROM registrations WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(Into::into))
    }

    pub async fn registrations_by_status(
        &self,
        status: RegistrationStatus,
        limit: i64,
    ) -> Result<Vec<Registration>, StoreError> {
        let rows: Vec<RegistrationRow> = sqlx::query_as(
            r#"
            SELECT * FROM registrations
            WHERE status = $1
            ORDER BY submitted_at DESC
            LIMIT $2
            "#,
        )
        .bind(status.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn reject_registration(
        &self,
        id: Uuid,
        reviewed_by: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE registrations
            SET status = 'rejected', reviewed_by = $2, reviewed_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(reviewed_by)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.decision_failure(id).await?);
        }
        Ok(())
    }

    pub async fn promote_registration(
        &self,
        registration_id: Uuid,
        person: NewPerson,
        reviewed_by: &str,
    ) -> Result<Person, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Serialize the read-max/insert sequence across concurrent
        // approvals. The UNIQUE constraint on case_id is the backstop.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(CASE_ALLOC_LOCK)
            .execute(&mut *tx)
            .await?;

        let max_suffix: i32 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(MAX((substring(case_id FROM $1::int))::int), 0)
            FROM persons
            WHERE case_id LIKE $2
            "#,
        )
        .bind(self.case_prefix.len() as i32 + 1)
        .bind(format!("{}%", self.case_prefix))
        .fetch_one(&mut *tx)
        .await?;

        let case_id = format_case_id(&self.case_prefix, max_suffix as u32 + 1);
        let data = &person.data;

        let inserted: Person = sqlx::query_as(
            r#"
            INSERT INTO persons (
                id, name, age, gender, last_seen_location, last_seen_date,
                last_seen_time, contact_info, height, additional_details,
                case_id, case_status, reported_by, reporter_contact,
                image_url, verified
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'active', $12, $13, $14, TRUE)
            RETURNING *
            "#,
        )
        .bind(person.id)
        .bind(&data.name)
        .bind(data.age)
        .bind(&data.gender)
        .bind(&data.last_seen_location)
        .bind(&data.last_seen_date)
        .bind(&data.last_seen_time)
        .bind(&data.contact_info)
        .bind(&data.height)
        .bind(&data.additional_details)
        .bind(&case_id)
        .bind(data.reporter.clone().unwrap_or_else(|| "Self".to_string()))
        .bind(&data.reporter_contact)
        .bind(&person.image_url)
        .fetch_one(&mut *tx)
        .await?;

        let updated = sqlx::query(
            r#"
            UPDATE registrations
            SET status = 'approved', reviewed_by = $2, reviewed_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(registration_id)
        .bind(reviewed_by)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(self.decision_failure(registration_id).await?);
        }

        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn person(&self, id: Uuid) -> Result<Option<Person>, StoreError> {
        let person: Option<Person> = sqlx::query_as("SELECT * FROM persons WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(person)
    }

    pub async fn recent_persons(&self, limit: i64) -> Result<Vec<Person>, StoreError> {
        let persons: Vec<Person> =
            sqlx::query_as("SELECT * FROM persons ORDER BY created_at DESC LIMIT $1")
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;
        Ok(persons)
    }

    pub async fn person_counts(&self) -> Result<PersonCounts, StoreError> {
        let (total, verified): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE verified) FROM persons",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(PersonCounts { total, verified })
    }

    pub async fn pending_count(&self) -> Result<i64, StoreError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM registrations WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Distinguish "never existed" from "already decided" after a guarded
    /// decision update touched zero rows.
    async fn decision_failure(&self, id: Uuid) -> Result<StoreError, StoreError> {
        Ok(match self.registration(id).await? {
            Some(_) => StoreError::RegistrationDecided,
            None => StoreError::RegistrationNotFound,
        })
    }
}
