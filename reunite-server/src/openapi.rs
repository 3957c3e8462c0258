//! OpenAPI documentation aggregation.

use utoipa::OpenApi;

use crate::handlers::{
    ApprovedListResponse, DashboardResponse, HealthResponse, MatchItem, PendingListResponse,
    ReadyResponse, RecentCase, RegistrationItem, RegistrationResponse, RejectedListResponse,
    SearchResponse, VerifyResponse,
};
use crate::store::{CaseStatus, PersonData, RegistrationStatus};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ReUnite API",
        description = "Missing-person face-search service: submit search \
                       images, register missing persons, moderate pending \
                       registrations."
    ),
    paths(
        crate::handlers::search::search_handler,
        crate::handlers::register::register_handler,
        crate::handlers::admin::list_pending_handler,
        crate::handlers::admin::list_approved_handler,
        crate::handlers::admin::list_rejected_handler,
        crate::handlers::admin::verify_handler,
        crate::handlers::admin::dashboard_handler,
        crate::handlers::health::health,
        crate::handlers::health::ready,
    ),
    components(schemas(
        MatchItem,
        SearchResponse,
        RegistrationResponse,
        RegistrationItem,
        PendingListResponse,
        ApprovedListResponse,
        RejectedListResponse,
        VerifyResponse,
        DashboardResponse,
        RecentCase,
        PersonData,
        RegistrationStatus,
        CaseStatus,
        HealthResponse,
        ReadyResponse,
    )),
    tags(
        (name = "Search", description = "Face similarity search"),
        (name = "Registration", description = "Public missing-person submissions"),
        (name = "Moderation", description = "Admin-only review workflow"),
        (name = "Health", description = "Monitoring endpoints")
    )
)]
pub struct ApiDoc;
