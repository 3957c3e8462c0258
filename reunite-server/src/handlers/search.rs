//! Search handler
//!
//! Turns a query image into a ranked list of verified persons: decode,
//! embedding (cache-or-compute), cached search results, vector search,
//! metadata join, threshold filter.

use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use reunite_core::{content_hash, FacePipeline};

use crate::error::ApiError;
use crate::index::person_id_from_payload;
use crate::multipart::MultipartFields;
use crate::state::AppState;
use crate::store::Person;

/// One ranked search match.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MatchItem {
    /// Internal person identifier
    #[schema(value_type = String, example = "550e8400-e29b-41d4-a716-446655440000")]
    pub person_id: Uuid,
    /// Cosine similarity in [-1, 1]
    #[schema(example = 0.87)]
    pub similarity: f32,
    /// Canonical face image
    pub image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen_location: Option<String>,
    /// Human-facing case identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "MP20240001")]
    pub case_id: Option<String>,
}

/// Response for a search request. An empty list is a valid outcome,
/// distinct from the no-face client error.
#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResponse {
    pub matches: Vec<MatchItem>,
}

/// Display metadata snapshot kept in the person cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonMetadata {
    pub person_id: Uuid,
    pub name: Option<String>,
    pub age: Option<i32>,
    pub image_url: String,
    pub last_seen_location: Option<String>,
    pub case_id: Option<String>,
}

impl From<&Person> for PersonMetadata {
    fn from(person: &Person) -> Self {
        Self {
            person_id: person.id,
            name: Some(person.name.clone()),
            age: person.age,
            image_url: person.image_url.clone(),
            last_seen_location: person.last_seen_location.clone(),
            case_id: Some(person.case_id.clone()),
        }
    }
}

/// A hit counts as a match when its similarity reaches the configured
/// threshold. The boundary is inclusive.
fn meets_threshold(similarity: f32, threshold: f32) -> bool {
    similarity >= threshold
}

/// Search for registered persons matching an uploaded face image
///
/// Accepts multipart/form-data with:
/// - **file** (required): The query image (max 25MB)
///
/// Returns ranked matches above the similarity threshold. Responds 400
/// with distinct codes for an undecodable image (`INVALID_IMAGE`) and for
/// a decodable image with no detectable face (`NO_FACE_DETECTED`); an
/// empty match list is a success, not an error.
#[utoipa::path(
    post,
    path = "/search",
    tag = "Search",
    request_body(
        content_type = "multipart/form-data",
        description = "Query image"
    ),
    responses(
        (status = 200, description = "Ranked matches (possibly empty)", body = SearchResponse),
        (status = 400, description = "Undecodable image or no face detected"),
        (status = 502, description = "Vector index or engine unavailable")
    )
)]
pub async fn search_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SearchResponse>, ApiError> {
    let max_file_size = state.config.max_file_size_mb * 1024 * 1024;
    let fields = MultipartFields::parse(&mut multipart, &["file"], max_file_size).await?;
    let file = fields.require_file("file")?;

    let image = FacePipeline::decode(&file.data)?;

    // Embedding: content-addressed cache first, pipeline on miss. A
    // decodable image with no face is a client error the caller can act
    // on, not an empty result.
    let hash = content_hash(&file.data);
    let embedding = match state.cache.embedding(&hash).await {
        Some(embedding) => {
            tracing::debug!(content_hash = %hash, "Embedding cache hit");
            embedding
        }
        None => {
            let Some(embedding) = state.pipeline.extract_embedding(&image).await? else {
                return Err(ApiError::NoFaceDetected);
            };
            state.cache.store_embedding(&hash, &embedding).await;
            embedding
        }
    };

    // Ranked-result cache. Stale for up to its TTL after new admissions,
    // which is the accepted latency tradeoff.
    let fingerprint = embedding.fingerprint();
    if let Some(matches) = state.cache.search_results::<Vec<MatchItem>>(&fingerprint).await {
        tracing::debug!(fingerprint = %fingerprint, "Search cache hit");
        return Ok(Json(SearchResponse { matches }));
    }

    let hits = state.index.search(&embedding, state.config.top_k).await?;

    let mut matches = Vec::new();
    for hit in hits {
        // Index/DB drift degrades the individual hit, never the request.
        let Some(person_id) = person_id_from_payload(&hit.payload) else {
            tracing::warn!(payload = %hit.payload, "Skipping hit without resolvable person id");
            continue;
        };

        let metadata = match state.cache.person_metadata::<PersonMetadata>(person_id).await {
            Some(metadata) => metadata,
            None => {
                let Some(person) = state.store.person(person_id).await? else {
                    tracing::warn!(%person_id, "Skipping hit with no matching person row");
                    continue;
                };
                let metadata = PersonMetadata::from(&person);
                state.cache.store_person_metadata(person_id, &metadata).await;
                metadata
            }
        };

        if meets_threshold(hit.score, state.config.similarity_threshold) {
            matches.push(MatchItem {
                person_id: metadata.person_id,
                similarity: hit.score,
                image_url: metadata.image_url,
                name: metadata.name,
                age: metadata.age,
                last_seen_location: metadata.last_seen_location,
                case_id: metadata.case_id,
            });
        }
    }

    state.cache.store_search_results(&fingerprint, &matches).await;

    tracing::info!(matches = matches.len(), "Search completed");
    Ok(Json(SearchResponse { matches }))
}
