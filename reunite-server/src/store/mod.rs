//! Relational store for verified persons and pending registrations.
//!
//! Two backends behind one enum:
//! - **PostgreSQL** (production): durable, transactional, migrations applied
//!   on connect.
//! - **In-memory** (development fallback and tests): single-mutex map that
//!   serializes case-id allocation the same way the Postgres advisory lock
//!   does.
//!
//! Persons are created exclusively by promoting a pending registration;
//! decided registrations are retained with a terminal status for audit.

mod error;
mod memory;
mod postgres;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle state of a registration.
///
/// Transitions are pending -> approved or pending -> rejected, both
/// terminal and performed exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Pending,
    Approved,
    Rejected,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for RegistrationStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown registration status '{other}'")),
        }
    }
}

/// Case state of a verified person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Active,
    Found,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Found => "found",
        }
    }
}

impl TryFrom<String> for CaseStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "active" => Ok(Self::Active),
            "found" => Ok(Self::Found),
            other => Err(format!("unknown case status '{other}'")),
        }
    }
}

/// Descriptive payload submitted with a registration.
///
/// Immutable until moderation; promoted verbatim into the Person row.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PersonData {
    pub name: String,
    pub age: i32,
    pub gender: String,
    pub last_seen_location: String,
    pub last_seen_date: String,
    pub last_seen_time: String,
    pub contact_info: String,
    pub additional_details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reporter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reporter_contact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aadhar_number: Option<String>,
    /// Whether an embedding could be computed at submission time. A human
    /// reviews the image either way.
    pub face_embedding_available: bool,
}

/// Verified, searchable identity. Created only by promotion.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Person {
    pub id: Uuid,
    pub name: String,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub last_seen_location: Option<String>,
    pub last_seen_date: Option<String>,
    pub last_seen_time: Option<String>,
    pub contact_info: Option<String>,
    pub height: Option<String>,
    pub additional_details: Option<String>,
    /// Human-facing case identifier, unique, assigned exactly once.
    pub case_id: String,
    #[sqlx(try_from = "String")]
    pub case_status: CaseStatus,
    pub reported_by: Option<String>,
    pub reporter_contact: Option<String>,
    pub image_url: String,
    /// Always true for promoted persons; search never returns rows where
    /// this is false.
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Pending identity claim awaiting moderation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub id: Uuid,
    pub person_data: PersonData,
    pub person_image_url: String,
    pub aadhar_image_url: Option<String>,
    pub status: RegistrationStatus,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Input for creating a registration.
#[derive(Debug, Clone)]
pub struct NewRegistration {
    pub person_data: PersonData,
    pub person_image_url: String,
    pub aadhar_image_url: Option<String>,
}

/// Input for promoting a registration into a Person.
///
/// The id is generated by the caller so the vector index can be written
/// under it before the row exists.
#[derive(Debug, Clone)]
pub struct NewPerson {
    pub id: Uuid,
    pub data: PersonData,
    pub image_url: String,
}

/// Aggregate person counts for the dashboard.
#[derive(Debug, Clone, Copy)]
pub struct PersonCounts {
    pub total: i64,
    pub verified: i64,
}

/// Extract the numeric suffix of a case id.
///
/// The prefix itself may end in digits (`MP2024`), so the suffix is
/// whatever follows the configured prefix - never a bare trailing-digits
/// scan.
pub(crate) fn case_id_suffix(prefix: &str, case_id: &str) -> Option<u32> {
    case_id.strip_prefix(prefix)?.parse().ok()
}

/// Format a case id from a prefix and a 1-based counter.
pub(crate) fn format_case_id(prefix: &str, suffix: u32) -> String {
    format!("{prefix}{suffix:04}")
}

/// Build a Person from a promotion input and an allocated case id.
///
/// Shared by both backends so field mapping (including the `reported_by`
/// default) cannot drift between them.
pub(crate) fn person_from_parts(
    input: &NewPerson,
    case_id: String,
    now: DateTime<Utc>,
) -> Person {
    let data = &input.data;
    Person {
        id: input.id,
        name: data.name.clone(),
        age: Some(data.age),
        gender: Some(data.gender.clone()),
        last_seen_location: Some(data.last_seen_location.clone()),
        last_seen_date: Some(data.last_seen_date.clone()),
        last_seen_time: Some(data.last_seen_time.clone()),
        contact_info: Some(data.contact_info.clone()),
        height: data.height.clone(),
        additional_details: Some(data.additional_details.clone()),
        case_id,
        case_status: CaseStatus::Active,
        reported_by: Some(
            data.reporter
                .clone()
                .unwrap_or_else(|| "Self".to_string()),
        ),
        reporter_contact: data.reporter_contact.clone(),
        image_url: input.image_url.clone(),
        verified: true,
        created_at: now,
        updated_at: now,
    }
}

/// Relational store backend.
pub enum Store {
    /// PostgreSQL storage (production)
    Postgres(PostgresStore),
    /// In-memory storage (development fallback and tests)
    Memory(MemoryStore),
}

impl Store {
    /// Connect to PostgreSQL and run migrations.
    pub async fn connect_postgres(
        database_url: &str,
        max_connections: u32,
        case_prefix: &str,
    ) -> Result<Self, StoreError> {
        let store = PostgresStore::connect(database_url, max_connections, case_prefix).await?;
        Ok(Self::Postgres(store))
    }

    /// Create an in-memory store (development and tests).
    pub fn in_memory(case_prefix: &str) -> Self {
        Self::Memory(MemoryStore::new(case_prefix))
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Postgres(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Memory(_) => "memory",
        }
    }

    /// Check store health (always Ok for the memory backend).
    pub async fn check_health(&self) -> Result<(), StoreError> {
        match self {
            Self::Postgres(pg) => pg.check_health().await,
            Self::Memory(_) => Ok(()),
        }
    }

    /// Insert a new pending registration.
    pub async fn create_registration(
        &self,
        input: NewRegistration,
    ) -> Result<Registration, StoreError> {
        match self {
            Self::Postgres(pg) => pg.create_registration(input).await,
            Self::Memory(mem) => mem.create_registration(input).await,
        }
    }

    /// Fetch a registration by id.
    pub async fn registration(&self, id: Uuid) -> Result<Option<Registration>, StoreError> {
        match self {
            Self::Postgres(pg) => pg.registration(id).await,
            Self::Memory(mem) => mem.registration(id).await,
        }
    }

    /// List registrations with the given status, most recent first.
    pub async fn registrations_by_status(
        &self,
        status: RegistrationStatus,
        limit: i64,
    ) -> Result<Vec<Registration>, StoreError> {
        match self {
            Self::Postgres(pg) => pg.registrations_by_status(status, limit).await,
            Self::Memory(mem) => mem.registrations_by_status(status, limit).await,
        }
    }

    /// Reject a pending registration. Terminal; fails with
    /// `RegistrationDecided` if it was already decided.
    pub async fn reject_registration(
        &self,
        id: Uuid,
        reviewed_by: &str,
    ) -> Result<(), StoreError> {
        match self {
            Self::Postgres(pg) => pg.reject_registration(id, reviewed_by).await,
            Self::Memory(mem) => mem.reject_registration(id, reviewed_by).await,
        }
    }

    /// Promote a pending registration into a verified Person.
    ///
    /// Allocates the next case id and flips the registration to approved in
    /// the same serialized unit of work, so concurrent approvals can neither
    /// share a case id nor double-promote one registration.
    pub async fn promote_registration(
        &self,
        registration_id: Uuid,
        person: NewPerson,
        reviewed_by: &str,
    ) -> Result<Person, StoreError> {
        match self {
            Self::Postgres(pg) => {
                pg.promote_registration(registration_id, person, reviewed_by)
                    .await
            }
            Self::Memory(mem) => {
                mem.promote_registration(registration_id, person, reviewed_by)
                    .await
            }
        }
    }

    /// Fetch a person by id.
    pub async fn person(&self, id: Uuid) -> Result<Option<Person>, StoreError> {
        match self {
            Self::Postgres(pg) => pg.person(id).await,
            Self::Memory(mem) => mem.person(id).await,
        }
    }

    /// The most recently created persons, newest first.
    pub async fn recent_persons(&self, limit: i64) -> Result<Vec<Person>, StoreError> {
        match self {
            Self::Postgres(pg) => pg.recent_persons(limit).await,
            Self::Memory(mem) => mem.recent_persons(limit).await,
        }
    }

    /// Total and verified person counts.
    pub async fn person_counts(&self) -> Result<PersonCounts, StoreError> {
        match self {
            Self::Postgres(pg) => pg.person_counts().await,
            Self::Memory(mem) => mem.person_counts().await,
        }
    }

    /// Number of registrations still pending.
    pub async fn pending_count(&self) -> Result<i64, StoreError> {
        match self {
            Self::Postgres(pg) => pg.pending_count().await,
            Self::Memory(mem) => mem.pending_count().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_id_suffix() {
        // The prefix ends in digits; parsing must not swallow it.
        assert_eq!(case_id_suffix("MP2024", "MP20240001"), Some(1));
        assert_eq!(case_id_suffix("MP2024", "MP20240042"), Some(42));
        assert_eq!(case_id_suffix("MP2024", "OTHER0001"), None);
        assert_eq!(case_id_suffix("MP2024", "MP2024"), None);
    }

    #[test]
    fn test_format_case_id_zero_pads() {
        assert_eq!(format_case_id("MP2024", 1), "MP20240001");
        assert_eq!(format_case_id("MP2024", 42), "MP20240042");
        // Past 9999 the counter simply keeps growing.
        assert_eq!(format_case_id("MP2024", 10_001), "MP202410001");
    }

    #[test]
    fn test_case_id_roundtrip() {
        let id = format_case_id("CASE", 37);
        assert_eq!(case_id_suffix("CASE", &id), Some(37));
    }

    #[test]
    fn test_registration_status_parsing() {
        assert_eq!(
            RegistrationStatus::try_from("pending".to_string()).unwrap(),
            RegistrationStatus::Pending
        );
        assert_eq!(
            RegistrationStatus::try_from("rejected".to_string()).unwrap(),
            RegistrationStatus::Rejected
        );
        assert!(RegistrationStatus::try_from("bogus".to_string()).is_err());
    }

    #[test]
    fn test_person_from_parts_defaults_reporter() {
        let data = PersonData {
            name: "Asha".into(),
            age: 23,
            gender: "female".into(),
            last_seen_location: "Pune".into(),
            last_seen_date: "2024-03-01".into(),
            last_seen_time: "18:30".into(),
            contact_info: "+91-0000000000".into(),
            additional_details: "None".into(),
            height: None,
            reporter: None,
            reporter_contact: None,
            aadhar_number: None,
            face_embedding_available: true,
        };
        let input = NewPerson {
            id: Uuid::new_v4(),
            data,
            image_url: "https://cdn.test/face.jpg".into(),
        };
        let person = person_from_parts(&input, "MP20240001".into(), Utc::now());
        assert_eq!(person.reported_by.as_deref(), Some("Self"));
        assert!(person.verified);
        assert_eq!(person.case_status, CaseStatus::Active);
        assert_eq!(person.case_id, "MP20240001");
    }
}
