//! Registration handler
//!
//! Accepts a public missing-person submission: descriptive fields plus a
//! required face image and an optional supporting document. Nothing
//! becomes searchable here - the submission waits for moderation.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use reunite_core::{content_hash, FacePipeline};

use crate::error::ApiError;
use crate::multipart::MultipartFields;
use crate::state::AppState;
use crate::store::{NewRegistration, PersonData, RegistrationStatus};

/// Response for a successful registration submission
#[derive(Debug, Serialize, ToSchema)]
pub struct RegistrationResponse {
    /// Identifier to quote when following up on the submission
    #[schema(value_type = String, example = "550e8400-e29b-41d4-a716-446655440000")]
    pub registration_id: Uuid,
    /// Always `pending` on submission
    pub status: RegistrationStatus,
}

/// Submit a new missing-person registration
///
/// Accepts multipart/form-data with:
/// - **name, age, gender, last_seen_location, last_seen_date,
///   last_seen_time, contact_info, additional_details** (required text)
/// - **height, reporter, reporter_contact, aadhar_number** (optional text)
/// - **image** (required): face photograph
/// - **aadhar_image** (optional): supporting document
///
/// The face image is uploaded to durable storage before anything is
/// persisted; an upload failure aborts the whole submission. A photograph
/// in which no face can be detected is still accepted - a moderator
/// reviews the image either way - and recorded with
/// `face_embedding_available = false`.
#[utoipa::path(
    post,
    path = "/register",
    tag = "Registration",
    request_body(
        content_type = "multipart/form-data",
        description = "Descriptive fields plus face image"
    ),
    responses(
        (status = 201, description = "Registration submitted", body = RegistrationResponse),
        (status = 400, description = "Missing required field or undecodable image"),
        (status = 502, description = "Image upload failed")
    )
)]
pub async fn register_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<RegistrationResponse>), ApiError> {
    let max_file_size = state.config.max_file_size_mb * 1024 * 1024;
    let fields =
        MultipartFields::parse(&mut multipart, &["image", "aadhar_image"], max_file_size).await?;

    let image = fields.require_file("image")?;

    let name = fields.require_text("name")?.to_string();
    let age: i32 = fields
        .require_text("age")?
        .parse()
        .map_err(|_| ApiError::bad_request("Field 'age' must be an integer"))?;
    let gender = fields.require_text("gender")?.to_string();
    let last_seen_location = fields.require_text("last_seen_location")?.to_string();
    let last_seen_date = fields.require_text("last_seen_date")?.to_string();
    let last_seen_time = fields.require_text("last_seen_time")?.to_string();
    let contact_info = fields.require_text("contact_info")?.to_string();
    let additional_details = fields.require_text("additional_details")?.to_string();

    let height = fields.get_text("height").map(str::to_string);
    let reporter = fields.get_text("reporter").map(str::to_string);
    let reporter_contact = fields.get_text("reporter_contact").map(str::to_string);
    let aadhar_number = fields.get_text("aadhar_number").map(str::to_string);

    // Validate the image before any side effect is performed.
    let decoded = FacePipeline::decode(&image.data)?;

    // Durable storage first; nothing else is written if the upload fails.
    let face_url = state.media.upload(image.data.clone()).await?;
    let aadhar_url = match fields.get_file("aadhar_image") {
        Some(document) => Some(state.media.upload(document.data.clone()).await?),
        None => None,
    };

    // Best-effort embedding. No face does not block the submission.
    let embedding = state.pipeline.extract_embedding(&decoded).await?;
    let face_embedding_available = embedding.is_some();
    if let Some(ref embedding) = embedding {
        // A later search or re-approval with the same bytes skips
        // re-inference.
        state
            .cache
            .store_embedding(&content_hash(&image.data), embedding)
            .await;
    } else {
        tracing::warn!("No face detected in registration image, storing for manual review");
    }

    let registration = state
        .store
        .create_registration(NewRegistration {
            person_data: PersonData {
                name,
                age,
                gender,
                last_seen_location,
                last_seen_date,
                last_seen_time,
                contact_info,
                additional_details,
                height,
                reporter,
                reporter_contact,
                aadhar_number,
                face_embedding_available,
            },
            person_image_url: face_url,
            aadhar_image_url: aadhar_url,
        })
        .await?;

    // A new pending item changes dashboard counts.
    state.cache.invalidate_dashboard().await;

    tracing::info!(
        registration_id = %registration.id,
        face_embedding_available,
        "Registration submitted"
    );

    Ok((
        StatusCode::CREATED,
        Json(RegistrationResponse {
            registration_id: registration.id,
            status: registration.status,
        }),
    ))
}
