//! ReUnite Server Library - REST API components for the missing-person
//! face-search service.
//!
//! This library exposes the server components for use in integration
//! tests. The main binary uses these same components.

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod index;
pub mod media;
pub mod multipart;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod store;
pub mod validation;

pub use auth::{AdminUser, JwksCache};
pub use cache::{CacheBackend, CacheLayer, MemoryCache, RedisCache};
pub use config::Config;
pub use error::ApiError;
pub use index::{
    person_id_from_payload, FaceHit, FaceIndex, FacePayload, IndexError, MemoryFaceIndex,
    QdrantFaceIndex,
};
pub use media::{HttpMediaStore, MediaError, MediaStorage, MemoryMediaStore};
pub use openapi::ApiDoc;
pub use routes::create_router;
pub use state::{AppState, BootstrapError};
pub use store::{
    CaseStatus, MemoryStore, NewPerson, NewRegistration, Person, PersonCounts, PersonData,
    PostgresStore, Registration, RegistrationStatus, Store, StoreError,
};
