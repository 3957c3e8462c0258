//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod admin;
pub mod health;
pub mod register;
pub mod search;

pub use crate::state::AppState;
pub use admin::{
    dashboard_handler, list_approved_handler, list_pending_handler, list_rejected_handler,
    verify_handler, ApprovedListResponse, DashboardResponse, ListParams, PendingListResponse,
    RecentCase, RegistrationItem, RejectedListResponse, VerifyParams, VerifyResponse,
};
pub use health::{health, ready, HealthResponse, ReadyResponse};
pub use register::{register_handler, RegistrationResponse};
pub use search::{search_handler, MatchItem, PersonMetadata, SearchResponse};
