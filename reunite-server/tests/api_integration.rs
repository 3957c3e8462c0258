//! API integration tests for reunite-server.
//!
//! These tests drive the full HTTP surface with realistic multipart
//! requests over in-memory backends and the deterministic mock engine:
//! no Postgres, Redis, Qdrant, or inference service required.

use std::io::Cursor;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use reunite_core::MockFaceEngine;
use reunite_server::{create_router, AppState, Config};

const ADMIN_TOKEN: &str = "test-admin-token";
const BOUNDARY: &str = "----TestBoundary7MA4YWxkTrZu0gW";

fn test_config() -> Config {
    Config {
        admin_token: Some(ADMIN_TOKEN.to_string()),
        ..Config::default()
    }
}

fn test_app() -> Router {
    create_router(AppState::in_memory(test_config()))
}

/// A decodable PNG photograph, large enough to bypass both the close-up
/// passthrough and the small-image fallback.
fn png_image(seed: u8) -> Vec<u8> {
    let img = image::RgbImage::from_fn(640, 480, |x, y| {
        image::Rgb([seed, (x % 251) as u8, ((x + y) % 241) as u8])
    });
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// Build a multipart body from text fields and named file fields.
fn multipart_body(text_fields: &[(&str, &str)], files: &[(&str, &[u8])]) -> (String, Vec<u8>) {
    let mut body = Vec::new();

    for (name, value) in text_fields {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }

    for (name, data) in files {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"; filename=\"photo.png\"\r\n")
                .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

fn register_fields(name: &str) -> Vec<(&str, &str)> {
    vec![
        ("name", name),
        ("age", "23"),
        ("gender", "female"),
        ("last_seen_location", "Pune"),
        ("last_seen_date", "2024-03-01"),
        ("last_seen_time", "18:30"),
        ("contact_info", "+91-0000000000"),
        ("additional_details", "Wearing a red scarf"),
    ]
}

async fn post_multipart(
    app: &Router,
    uri: &str,
    content_type: &str,
    body: Vec<u8>,
) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("Content-Type", content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn admin_get(app: &Router, uri: &str, token: Option<&str>) -> Response {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header("x-admin-token", token);
    }
    app.clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn admin_verify(app: &Router, registration_id: &str, approve: bool) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/admin/verify/{registration_id}?approve={approve}"))
                .header("x-admin-token", ADMIN_TOKEN)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn register_person(app: &Router, name: &str, image: &[u8]) -> String {
    let (content_type, body) = multipart_body(&register_fields(name), &[("image", image)]);
    let response = post_multipart(app, "/register", &content_type, body).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_eq!(json["status"], "pending");
    json["registration_id"].as_str().unwrap().to_string()
}

async fn search(app: &Router, image: &[u8]) -> Response {
    let (content_type, body) = multipart_body(&[], &[("file", image)]);
    post_multipart(app, "/search", &content_type, body).await
}

// ============================================================================
// Health & Readiness Tests
// ============================================================================

#[tokio::test]
async fn test_health_endpoint_reports_backends() {
    let app = test_app();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "reunite-server");
    assert_eq!(json["store_backend"], "memory");
    assert_eq!(json["index_backend"], "memory");
    assert_eq!(json["engine"], "mock");
}

#[tokio::test]
async fn test_ready_endpoint_returns_ok() {
    let app = test_app();

    let response = app
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// ============================================================================
// Search Input Validation
// ============================================================================

#[tokio::test]
async fn test_search_rejects_undecodable_image() {
    let app = test_app();

    let (content_type, body) = multipart_body(&[], &[("file", b"not an image at all")]);
    let response = post_multipart(&app, "/search", &content_type, body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "INVALID_IMAGE");
}

#[tokio::test]
async fn test_search_rejects_missing_file() {
    let app = test_app();

    let (content_type, body) = multipart_body(&[("note", "no file here")], &[]);
    let response = post_multipart(&app, "/search", &content_type, body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_search_with_no_face_is_a_distinct_client_error() {
    let state =
        AppState::in_memory_with_engine(test_config(), Arc::new(MockFaceEngine::without_faces()));
    let app = create_router(state);

    let response = search(&app, &png_image(1)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NO_FACE_DETECTED");
}

#[tokio::test]
async fn test_search_with_empty_index_returns_empty_matches() {
    let app = test_app();

    let response = search(&app, &png_image(1)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["matches"], serde_json::json!([]));
}

// ============================================================================
// Registration Tests
// ============================================================================

#[tokio::test]
async fn test_register_requires_descriptive_fields() {
    let app = test_app();

    // Everything but contact_info.
    let fields: Vec<(&str, &str)> = register_fields("Asha")
        .into_iter()
        .filter(|(name, _)| *name != "contact_info")
        .collect();
    let image = png_image(1);
    let (content_type, body) = multipart_body(&fields, &[("image", &image)]);
    let response = post_multipart(&app, "/register", &content_type, body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_register_requires_face_image() {
    let app = test_app();

    let (content_type, body) = multipart_body(&register_fields("Asha"), &[]);
    let response = post_multipart(&app, "/register", &content_type, body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_rejects_non_numeric_age() {
    let app = test_app();

    let mut fields = register_fields("Asha");
    for field in fields.iter_mut() {
        if field.0 == "age" {
            field.1 = "twenty-three";
        }
    }
    let image = png_image(1);
    let (content_type, body) = multipart_body(&fields, &[("image", &image)]);
    let response = post_multipart(&app, "/register", &content_type, body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_accepts_optional_document_image() {
    let app = test_app();

    let image = png_image(1);
    let document = png_image(2);
    let (content_type, body) = multipart_body(
        &register_fields("Asha"),
        &[("image", &image), ("aadhar_image", &document)],
    );
    let response = post_multipart(&app, "/register", &content_type, body).await;

    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_register_without_detectable_face_is_still_accepted() {
    let state =
        AppState::in_memory_with_engine(test_config(), Arc::new(MockFaceEngine::without_faces()));
    let app = create_router(state);

    let registration_id = register_person(&app, "Asha", &png_image(1)).await;

    // The flag is visible to moderators in the pending listing.
    let response = admin_get(&app, "/admin/registrations", Some(ADMIN_TOKEN)).await;
    let json = body_json(response).await;
    assert_eq!(
        json["pending"][0]["registration_id"].as_str().unwrap(),
        registration_id
    );
    assert_eq!(
        json["pending"][0]["person_data"]["face_embedding_available"],
        false
    );
}

// ============================================================================
// Admin Authentication
// ============================================================================

#[tokio::test]
async fn test_admin_routes_require_credentials() {
    let app = test_app();

    for uri in [
        "/admin/registrations",
        "/admin/dashboard",
        "/admin/approved",
        "/admin/rejected",
    ] {
        let response = admin_get(&app, uri, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "uri: {uri}");
    }
}

#[tokio::test]
async fn test_admin_routes_reject_wrong_token() {
    let app = test_app();

    let response = admin_get(&app, "/admin/registrations", Some("wrong-token")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Moderation Workflow
// ============================================================================

#[tokio::test]
async fn test_full_register_approve_search_scenario() {
    let app = test_app();
    let image = png_image(42);

    // Submit a registration; nothing is searchable yet.
    let registration_id = register_person(&app, "Asha", &image).await;

    // The admin sees it in the pending list.
    let response = admin_get(&app, "/admin/registrations", Some(ADMIN_TOKEN)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["pending"].as_array().unwrap().len(), 1);
    assert_eq!(json["pending"][0]["person_data"]["name"], "Asha");

    // Approval promotes it: first case id ever is MP20240001.
    let response = admin_verify(&app, &registration_id, true).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "approved");
    let person_id = json["person_id"].as_str().unwrap().to_string();

    // The pending list is now empty.
    let response = admin_get(&app, "/admin/registrations", Some(ADMIN_TOKEN)).await;
    let json = body_json(response).await;
    assert_eq!(json["pending"].as_array().unwrap().len(), 0);

    // The approved audit listing retains it.
    let response = admin_get(&app, "/admin/approved", Some(ADMIN_TOKEN)).await;
    let json = body_json(response).await;
    assert_eq!(json["approved"].as_array().unwrap().len(), 1);

    // Searching with the same image self-matches at similarity ~1.0
    // (same bytes, same embedding).
    let response = search(&app, &image).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let matches = json["matches"].as_array().unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["person_id"].as_str().unwrap(), person_id);
    assert_eq!(matches[0]["case_id"], "MP20240001");
    assert_eq!(matches[0]["name"], "Asha");
    assert!(matches[0]["similarity"].as_f64().unwrap() > 0.99);
}

#[tokio::test]
async fn test_search_cache_serves_stale_results_within_ttl() {
    // The search-result cache is deliberately not invalidated by new
    // admissions: a pre-approval search pins its (empty) result for the
    // same query embedding until the TTL expires.
    let app = test_app();
    let image = png_image(42);

    let registration_id = register_person(&app, "Asha", &image).await;

    let response = search(&app, &image).await;
    let json = body_json(response).await;
    assert_eq!(json["matches"].as_array().unwrap().len(), 0);

    let response = admin_verify(&app, &registration_id, true).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = search(&app, &image).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(
        json["matches"].as_array().unwrap().len(),
        0,
        "bounded staleness: cached pre-approval result is served unchanged"
    );
}

#[tokio::test]
async fn test_approval_is_terminal() {
    let app = test_app();
    let registration_id = register_person(&app, "Asha", &png_image(7)).await;

    let response = admin_verify(&app, &registration_id, true).await;
    assert_eq!(response.status(), StatusCode::OK);

    // A second decision of either kind hits a terminal state.
    let response = admin_verify(&app, &registration_id, true).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = admin_verify(&app, &registration_id, false).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_rejection_is_final_and_audited() {
    let app = test_app();
    let registration_id = register_person(&app, "Asha", &png_image(9)).await;

    let response = admin_verify(&app, &registration_id, false).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "rejected");
    assert!(json.get("person_id").is_none());

    // Never again in the pending list, never promotable.
    let response = admin_get(&app, "/admin/registrations", Some(ADMIN_TOKEN)).await;
    let json = body_json(response).await;
    assert_eq!(json["pending"].as_array().unwrap().len(), 0);

    let response = admin_verify(&app, &registration_id, true).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Retained in the rejected audit listing with the reviewer recorded.
    let response = admin_get(&app, "/admin/rejected", Some(ADMIN_TOKEN)).await;
    let json = body_json(response).await;
    assert_eq!(json["rejected"].as_array().unwrap().len(), 1);
    assert_eq!(json["rejected"][0]["reviewed_by"], "static-admin");
}

#[tokio::test]
async fn test_deciding_unknown_registration_is_not_found() {
    let app = test_app();

    let response = admin_verify(&app, &uuid::Uuid::new_v4().to_string(), true).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = admin_verify(&app, &uuid::Uuid::new_v4().to_string(), false).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_approval_without_embedding_degrades_gracefully() {
    let state =
        AppState::in_memory_with_engine(test_config(), Arc::new(MockFaceEngine::without_faces()));
    let app = create_router(state);

    let registration_id = register_person(&app, "Asha", &png_image(3)).await;
    let response = admin_verify(&app, &registration_id, true).await;

    // Approval succeeds even though the person cannot be indexed.
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "approved");
    assert!(json["person_id"].is_string());

    // The person counts toward the dashboard totals.
    let response = admin_get(&app, "/admin/dashboard", Some(ADMIN_TOKEN)).await;
    let json = body_json(response).await;
    assert_eq!(json["total_persons"], 1);
}

// ============================================================================
// Dashboard
// ============================================================================

#[tokio::test]
async fn test_dashboard_reflects_mutations_despite_caching() {
    let app = test_app();
    let registration_id = register_person(&app, "Asha", &png_image(5)).await;

    // Cached snapshot with one pending registration, no persons.
    let response = admin_get(&app, "/admin/dashboard", Some(ADMIN_TOKEN)).await;
    let json = body_json(response).await;
    assert_eq!(json["total_persons"], 0);
    assert_eq!(json["verified_persons"], 0);
    assert_eq!(json["pending_registrations"], 1);

    let response = admin_verify(&app, &registration_id, true).await;
    assert_eq!(response.status(), StatusCode::OK);

    // The approval invalidated the singleton; a fresh fetch sees the new
    // counts even though the 30s TTL has not elapsed.
    let response = admin_get(&app, "/admin/dashboard", Some(ADMIN_TOKEN)).await;
    let json = body_json(response).await;
    assert_eq!(json["total_persons"], 1);
    assert_eq!(json["verified_persons"], 1);
    assert_eq!(json["pending_registrations"], 0);
    assert_eq!(json["recent_cases"].as_array().unwrap().len(), 1);
    assert_eq!(json["recent_cases"][0]["case_id"], "MP20240001");
}

// ============================================================================
// Caching & Thresholds
// ============================================================================

#[tokio::test]
async fn test_byte_identical_searches_compute_the_embedding_once() {
    let engine = Arc::new(MockFaceEngine::new());
    let state = AppState::in_memory_with_engine(test_config(), engine.clone());
    let app = create_router(state);
    let image = png_image(11);

    let response = search(&app, &image).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(engine.embed_call_count(), 1);

    // Second identical search is served from the embedding cache.
    let response = search(&app, &image).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(engine.embed_call_count(), 1);
}

#[tokio::test]
async fn test_search_below_threshold_returns_empty_success() {
    let app = test_app();

    // Index person A, then search with an unrelated image: two independent
    // 512-d directions sit far below the 0.55 threshold.
    let registration_id = register_person(&app, "Asha", &png_image(21)).await;
    let response = admin_verify(&app, &registration_id, true).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = search(&app, &png_image(99)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["matches"].as_array().unwrap().len(), 0);
}
