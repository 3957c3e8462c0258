//! In-memory implementation of the relational store.
//!
//! Development fallback and test double. A single async mutex over the
//! whole dataset serializes case-id allocation exactly like the Postgres
//! advisory lock does.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    case_id_suffix, format_case_id, person_from_parts, NewPerson, NewRegistration, Person,
    PersonCounts, Registration, RegistrationStatus, StoreError,
};

#[derive(Default)]
struct MemoryInner {
    persons: HashMap<Uuid, Person>,
    registrations: HashMap<Uuid, Registration>,
}

/// In-memory person/registration store.
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
    case_prefix: String,
}

impl MemoryStore {
    pub fn new(case_prefix: &str) -> Self {
        Self {
            inner: Mutex::new(MemoryInner::default()),
            case_prefix: case_prefix.to_string(),
        }
    }

    pub async fn create_registration(
        &self,
        input: NewRegistration,
    ) -> Result<Registration, StoreError> {
        let registration = Registration {
            id: Uuid::new_v4(),
            person_data: input.person_data,
            person_image_url: input.person_image_url,
            aadhar_image_url: input.aadhar_image_url,
            status: RegistrationStatus::Pending,
            submitted_at: Utc::now(),
            reviewed_by: None,
            reviewed_at: None,
        };

        let mut inner = self.inner.lock().await;
        inner
            .registrations
            .insert(registration.id, registration.clone());
        Ok(registration)
    }

    pub async fn registration(&self, id: Uuid) -> Result<Option<Registration>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.registrations.get(&id).cloned())
    }

    pub async fn registrations_by_status(
        &self,
        status: RegistrationStatus,
        limit: i64,
    ) -> Result<Vec<Registration>, StoreError> {
        let inner = self.inner.lock().await;
        let mut matching: Vec<Registration> = inner
            .registrations
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        matching.truncate(limit.max(0) as usize);
        Ok(matching)
    }

    pub async fn reject_registration(
        &self,
        id: Uuid,
        reviewed_by: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let registration = inner
            .registrations
            .get_mut(&id)
            .ok_or(StoreError::RegistrationNotFound)?;

        if registration.status != RegistrationStatus::Pending {
            return Err(StoreError::RegistrationDecided);
        }

        registration.status = RegistrationStatus::Rejected;
        registration.reviewed_by = Some(reviewed_by.to_string());
        registration.reviewed_at = Some(Utc::now());
        Ok(())
    }

    pub async fn promote_registration(
        &self,
        registration_id: Uuid,
        person: NewPerson,
        reviewed_by: &str,
    ) -> Result<Person, StoreError> {
        let mut inner = self.inner.lock().await;

        {
            let registration = inner
                .registrations
                .get(&registration_id)
                .ok_or(StoreError::RegistrationNotFound)?;
            if registration.status != RegistrationStatus::Pending {
                return Err(StoreError::RegistrationDecided);
            }
        }

        let max_suffix = inner
            .persons
            .values()
            .filter_map(|p| case_id_suffix(&self.case_prefix, &p.case_id))
            .max()
            .unwrap_or(0);
        let case_id = format_case_id(&self.case_prefix, max_suffix + 1);

        let created = person_from_parts(&person, case_id, Utc::now());
        inner.persons.insert(created.id, created.clone());

        if let Some(registration) = inner.registrations.get_mut(&registration_id) {
            registration.status = RegistrationStatus::Approved;
            registration.reviewed_by = Some(reviewed_by.to_string());
            registration.reviewed_at = Some(Utc::now());
        }

        Ok(created)
    }

    pub async fn person(&self, id: Uuid) -> Result<Option<Person>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.persons.get(&id).cloned())
    }

    pub async fn recent_persons(&self, limit: i64) -> Result<Vec<Person>, StoreError> {
        let inner = self.inner.lock().await;
        let mut persons: Vec<Person> = inner.persons.values().cloned().collect();
        persons.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        persons.truncate(limit.max(0) as usize);
        Ok(persons)
    }

    pub async fn person_counts(&self) -> Result<PersonCounts, StoreError> {
        let inner = self.inner.lock().await;
        let total = inner.persons.len() as i64;
        let verified = inner.persons.values().filter(|p| p.verified).count() as i64;
        Ok(PersonCounts { total, verified })
    }

    pub async fn pending_count(&self) -> Result<i64, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .registrations
            .values()
            .filter(|r| r.status == RegistrationStatus::Pending)
            .count() as i64)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::Store;
    use super::*;
    use crate::store::PersonData;

    fn person_data(name: &str) -> PersonData {
        PersonData {
            name: name.into(),
            age: 30,
            gender: "male".into(),
            last_seen_location: "Mumbai".into(),
            last_seen_date: "2024-02-11".into(),
            last_seen_time: "09:00".into(),
            contact_info: "+91-1111111111".into(),
            additional_details: "Wearing a blue jacket".into(),
            height: Some("5'9\"".into()),
            reporter: Some("Ravi".into()),
            reporter_contact: Some("+91-2222222222".into()),
            aadhar_number: None,
            face_embedding_available: true,
        }
    }

    fn new_registration(name: &str) -> NewRegistration {
        NewRegistration {
            person_data: person_data(name),
            person_image_url: format!("memory://{name}"),
            aadhar_image_url: None,
        }
    }

    #[tokio::test]
    async fn test_registration_lifecycle() {
        let store = Store::in_memory("MP2024");
        let reg = store
            .create_registration(new_registration("Asha"))
            .await
            .unwrap();
        assert_eq!(reg.status, RegistrationStatus::Pending);

        let pending = store
            .registrations_by_status(RegistrationStatus::Pending, 50)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);

        store.reject_registration(reg.id, "moderator").await.unwrap();

        let pending = store
            .registrations_by_status(RegistrationStatus::Pending, 50)
            .await
            .unwrap();
        assert!(pending.is_empty());

        let rejected = store
            .registrations_by_status(RegistrationStatus::Rejected, 50)
            .await
            .unwrap();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].reviewed_by.as_deref(), Some("moderator"));
    }

    #[tokio::test]
    async fn test_rejection_is_terminal() {
        let store = Store::in_memory("MP2024");
        let reg = store
            .create_registration(new_registration("Asha"))
            .await
            .unwrap();
        store.reject_registration(reg.id, "moderator").await.unwrap();

        let err = store
            .reject_registration(reg.id, "moderator")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::RegistrationDecided));

        let person = NewPerson {
            id: Uuid::new_v4(),
            data: person_data("Asha"),
            image_url: "memory://asha".into(),
        };
        let err = store
            .promote_registration(reg.id, person, "moderator")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::RegistrationDecided));
    }

    #[tokio::test]
    async fn test_unknown_registration_is_not_found() {
        let store = Store::in_memory("MP2024");
        let err = store
            .reject_registration(Uuid::new_v4(), "moderator")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::RegistrationNotFound));
    }

    #[tokio::test]
    async fn test_promotion_creates_verified_person_and_consumes_registration() {
        let store = Store::in_memory("MP2024");
        let reg = store
            .create_registration(new_registration("Asha"))
            .await
            .unwrap();

        let person_id = Uuid::new_v4();
        let person = store
            .promote_registration(
                reg.id,
                NewPerson {
                    id: person_id,
                    data: person_data("Asha"),
                    image_url: "memory://asha".into(),
                },
                "moderator",
            )
            .await
            .unwrap();

        assert_eq!(person.id, person_id);
        assert_eq!(person.case_id, "MP20240001");
        assert!(person.verified);

        let counts = store.person_counts().await.unwrap();
        assert_eq!(counts.total, 1);
        assert_eq!(counts.verified, 1);
        assert_eq!(store.pending_count().await.unwrap(), 0);

        // Already decided now.
        let err = store
            .promote_registration(
                reg.id,
                NewPerson {
                    id: Uuid::new_v4(),
                    data: person_data("Asha"),
                    image_url: "memory://asha".into(),
                },
                "moderator",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::RegistrationDecided));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_promotions_allocate_contiguous_case_ids() {
        let store = Arc::new(Store::in_memory("MP2024"));

        let mut registration_ids = Vec::new();
        for i in 0..8 {
            let reg = store
                .create_registration(new_registration(&format!("person-{i}")))
                .await
                .unwrap();
            registration_ids.push(reg.id);
        }

        let mut handles = Vec::new();
        for reg_id in registration_ids {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .promote_registration(
                        reg_id,
                        NewPerson {
                            id: Uuid::new_v4(),
                            data: person_data("concurrent"),
                            image_url: "memory://concurrent".into(),
                        },
                        "moderator",
                    )
                    .await
                    .unwrap()
                    .case_id
            }));
        }

        let mut case_ids = Vec::new();
        for handle in handles {
            case_ids.push(handle.await.unwrap());
        }
        case_ids.sort();

        let expected: Vec<String> = (1..=8).map(|i| format!("MP2024{i:04}")).collect();
        assert_eq!(case_ids, expected);
    }

    #[tokio::test]
    async fn test_recent_persons_ordering_and_limit() {
        let store = Store::in_memory("MP2024");
        for i in 0..7 {
            let reg = store
                .create_registration(new_registration(&format!("p{i}")))
                .await
                .unwrap();
            store
                .promote_registration(
                    reg.id,
                    NewPerson {
                        id: Uuid::new_v4(),
                        data: person_data(&format!("p{i}")),
                        image_url: "memory://x".into(),
                    },
                    "moderator",
                )
                .await
                .unwrap();
        }

        let recent = store.recent_persons(5).await.unwrap();
        assert_eq!(recent.len(), 5);
        for pair in recent.windows(2) {
            assert!(pair[0].created_at >= pair[1].created_at);
        }
    }
}
