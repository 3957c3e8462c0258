//! Admin moderation handlers
//!
//! Admin-only: listing submissions, deciding them, and the aggregate
//! dashboard. Every route authenticates before any other processing via
//! the `AdminUser` extractor.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use reunite_core::FacePipeline;

use crate::auth::AdminUser;
use crate::error::ApiError;
use crate::handlers::search::PersonMetadata;
use crate::index::FacePayload;
use crate::state::AppState;
use crate::store::{NewPerson, PersonData, Registration, RegistrationStatus};

/// A moderation decision. Carries no data beyond the case split - the
/// registration id arrives separately in the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Approve,
    Reject,
}

impl From<bool> for Decision {
    fn from(approve: bool) -> Self {
        if approve {
            Self::Approve
        } else {
            Self::Reject
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListParams {
    /// Maximum number of registrations returned (default 50)
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct VerifyParams {
    /// true to approve, false to reject (default true)
    #[serde(default = "default_approve")]
    pub approve: bool,
}

fn default_approve() -> bool {
    true
}

/// One registration as shown to moderators.
#[derive(Debug, Serialize, ToSchema)]
pub struct RegistrationItem {
    #[schema(value_type = String)]
    pub registration_id: Uuid,
    pub person_data: PersonData,
    pub person_image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aadhar_image_url: Option<String>,
    #[schema(value_type = String, example = "2024-03-01T10:00:00Z")]
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl From<Registration> for RegistrationItem {
    fn from(registration: Registration) -> Self {
        Self {
            registration_id: registration.id,
            person_data: registration.person_data,
            person_image_url: registration.person_image_url,
            aadhar_image_url: registration.aadhar_image_url,
            submitted_at: registration.submitted_at,
            reviewed_by: registration.reviewed_by,
            reviewed_at: registration.reviewed_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PendingListResponse {
    pub pending: Vec<RegistrationItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApprovedListResponse {
    pub approved: Vec<RegistrationItem>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RejectedListResponse {
    pub rejected: Vec<RegistrationItem>,
}

/// Response for a moderation decision
#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyResponse {
    #[schema(example = "approved")]
    pub status: &'static str,
    /// Present only on approval
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub person_id: Option<Uuid>,
}

/// Dashboard entry for a recently created person.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecentCase {
    #[schema(value_type = String)]
    pub person_id: Uuid,
    pub name: String,
    #[schema(example = "MP20240001")]
    pub case_id: String,
    pub image_url: String,
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
}

/// Aggregate dashboard snapshot
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardResponse {
    pub total_persons: i64,
    pub verified_persons: i64,
    pub pending_registrations: i64,
    /// 5 most recently created persons, newest first
    pub recent_cases: Vec<RecentCase>,
}

/// List pending registrations
///
/// Most recent submissions first, capped by `limit`.
#[utoipa::path(
    get,
    path = "/admin/registrations",
    tag = "Moderation",
    params(ListParams),
    responses(
        (status = 200, description = "Pending registrations", body = PendingListResponse),
        (status = 401, description = "Missing or invalid credential"),
        (status = 403, description = "Valid credential without admin role")
    )
)]
pub async fn list_pending_handler(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<PendingListResponse>, ApiError> {
    let registrations = state
        .store
        .registrations_by_status(RegistrationStatus::Pending, params.limit)
        .await?;

    Ok(Json(PendingListResponse {
        pending: registrations.into_iter().map(Into::into).collect(),
    }))
}

/// List approved registrations (audit trail)
#[utoipa::path(
    get,
    path = "/admin/approved",
    tag = "Moderation",
    params(ListParams),
    responses(
        (status = 200, description = "Approved registrations", body = ApprovedListResponse),
        (status = 401, description = "Missing or invalid credential")
    )
)]
pub async fn list_approved_handler(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ApprovedListResponse>, ApiError> {
    let registrations = state
        .store
        .registrations_by_status(RegistrationStatus::Approved, params.limit)
        .await?;

    Ok(Json(ApprovedListResponse {
        approved: registrations.into_iter().map(Into::into).collect(),
    }))
}

/// List rejected registrations (audit trail)
#[utoipa::path(
    get,
    path = "/admin/rejected",
    tag = "Moderation",
    params(ListParams),
    responses(
        (status = 200, description = "Rejected registrations", body = RejectedListResponse),
        (status = 401, description = "Missing or invalid credential")
    )
)]
pub async fn list_rejected_handler(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<RejectedListResponse>, ApiError> {
    let registrations = state
        .store
        .registrations_by_status(RegistrationStatus::Rejected, params.limit)
        .await?;

    Ok(Json(RejectedListResponse {
        rejected: registrations.into_iter().map(Into::into).collect(),
    }))
}

/// Decide a pending registration
///
/// `approve=true` promotes the registration into a verified, searchable
/// person; `approve=false` rejects it. Both outcomes are terminal: a
/// second decision on the same registration fails with 409, an unknown id
/// with 404.
#[utoipa::path(
    post,
    path = "/admin/verify/{registration_id}",
    tag = "Moderation",
    params(
        ("registration_id" = String, Path, description = "Registration to decide"),
        VerifyParams
    ),
    responses(
        (status = 200, description = "Decision applied", body = VerifyResponse),
        (status = 401, description = "Missing or invalid credential"),
        (status = 404, description = "Unknown registration id"),
        (status = 409, description = "Registration already decided"),
        (status = 502, description = "Image fetch or index upsert failed; registration untouched")
    )
)]
pub async fn verify_handler(
    admin: AdminUser,
    State(state): State<AppState>,
    Path(registration_id): Path<Uuid>,
    Query(params): Query<VerifyParams>,
) -> Result<Json<VerifyResponse>, ApiError> {
    match Decision::from(params.approve) {
        Decision::Reject => {
            state
                .store
                .reject_registration(registration_id, &admin.subject)
                .await?;
            state.cache.invalidate_dashboard().await;

            tracing::info!(%registration_id, reviewed_by = %admin.subject, "Registration rejected");
            Ok(Json(VerifyResponse {
                status: "rejected",
                person_id: None,
            }))
        }
        Decision::Approve => approve(&state, registration_id, &admin).await,
    }
}

async fn approve(
    state: &AppState,
    registration_id: Uuid,
    admin: &AdminUser,
) -> Result<Json<VerifyResponse>, ApiError> {
    let registration = state
        .store
        .registration(registration_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Registration not found"))?;

    if registration.status != RegistrationStatus::Pending {
        return Err(ApiError::conflict("Registration already decided"));
    }

    // Fetch the stored face image. A failed or timed-out fetch is a
    // retryable error; the registration stays pending and untouched.
    let bytes = state.media.fetch(&registration.person_image_url).await?;
    let image = FacePipeline::decode(&bytes)
        .map_err(|e| ApiError::upstream(format!("Stored image is not decodable: {e}")))?;

    // Always recompute from the fetched bytes. A client-supplied vector is
    // never admitted, so an image cannot be registered under someone
    // else's embedding.
    let embedding = state.pipeline.extract_embedding(&image).await?;

    // Vector first, row second: a crash in between leaves a dangling index
    // point that search already tolerates, whereas the reverse order could
    // mint duplicate persons on retry.
    let person_id = Uuid::new_v4();
    match embedding {
        Some(ref embedding) => {
            let payload = FacePayload::new(person_id, registration.person_image_url.clone());
            state.index.upsert(person_id, embedding, &payload).await?;
        }
        None => {
            // Accepted degraded outcome: the person exists but is not
            // searchable until an embedding rebuild is triggered.
            tracing::warn!(
                %registration_id,
                "No embedding available at approval, person will not be searchable"
            );
        }
    }

    let person = state
        .store
        .promote_registration(
            registration_id,
            NewPerson {
                id: person_id,
                data: registration.person_data.clone(),
                image_url: registration.person_image_url.clone(),
            },
            &admin.subject,
        )
        .await?;

    state
        .cache
        .store_person_metadata(person.id, &PersonMetadata::from(&person))
        .await;
    state.cache.invalidate_dashboard().await;

    tracing::info!(
        %registration_id,
        person_id = %person.id,
        case_id = %person.case_id,
        reviewed_by = %admin.subject,
        "Registration approved"
    );

    Ok(Json(VerifyResponse {
        status: "approved",
        person_id: Some(person.id),
    }))
}

/// Aggregate dashboard
///
/// Served from a 30-second cache singleton; every person/registration
/// mutation invalidates it explicitly, so a fetch right after an approval
/// reflects the new counts.
#[utoipa::path(
    get,
    path = "/admin/dashboard",
    tag = "Moderation",
    responses(
        (status = 200, description = "Aggregate snapshot", body = DashboardResponse),
        (status = 401, description = "Missing or invalid credential")
    )
)]
pub async fn dashboard_handler(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<DashboardResponse>, ApiError> {
    if let Some(snapshot) = state.cache.dashboard::<DashboardResponse>().await {
        return Ok(Json(snapshot));
    }

    let counts = state.store.person_counts().await?;
    let pending = state.store.pending_count().await?;
    let recent = state.store.recent_persons(5).await?;

    let snapshot = DashboardResponse {
        total_persons: counts.total,
        verified_persons: counts.verified,
        pending_registrations: pending,
        recent_cases: recent
            .into_iter()
            .map(|person| RecentCase {
                person_id: person.id,
                name: person.name,
                case_id: person.case_id,
                image_url: person.image_url,
                created_at: person.created_at,
            })
            .collect(),
    };

    state.cache.store_dashboard(&snapshot).await;
    Ok(Json(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_from_flag() {
        assert_eq!(Decision::from(true), Decision::Approve);
        assert_eq!(Decision::from(false), Decision::Reject);
    }

    #[test]
    fn test_verify_params_default_to_approve() {
        let params: VerifyParams = serde_json::from_str("{}").unwrap();
        assert!(params.approve);

        let params: VerifyParams = serde_json::from_str(r#"{"approve": false}"#).unwrap();
        assert!(!params.approve);
    }

    #[test]
    fn test_list_params_default_limit() {
        let params: ListParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.limit, 50);
    }
}
