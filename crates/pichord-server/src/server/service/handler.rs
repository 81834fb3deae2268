//! axum routes for the sequence service.
//!
//! Participant routes verify the caller through an [`IdentityVerifier`] and
//! upsert the caller's public profile before touching their assignment.
//! Everything that may hit the store's write path or the renderer runs on
//! tokio's blocking pool.

use crate::server::{
    identity::{IdentityVerifier, bearer_token, secrets_match},
    service::error::ApiError,
    telemetry::{increment_assignments_created, increment_duplicate_assigns, increment_requests},
};
use axum::{
    Json, Router,
    extract::{Path, Request, State},
    http::{HeaderMap, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use pichord::{
    AssignmentStore, AssignmentView, ChordService, RenderReport, SequenceState, TimelineEntry,
    WallpaperUrls,
};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;

/// Store type the server runs on, chosen at startup.
pub type Store = Box<dyn AssignmentStore>;

pub type Service = ChordService<Store>;

#[derive(Clone)]
pub struct AppState {
    service: Arc<Service>,
    verifier: Arc<dyn IdentityVerifier>,
    admin_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(
        service: Arc<Service>,
        verifier: impl IdentityVerifier + 'static,
        admin_token: Option<String>,
    ) -> Self {
        Self {
            service,
            verifier: Arc::new(verifier),
            admin_token: admin_token.map(Arc::from),
        }
    }

    /// Runs `f` against the service on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Service) -> pichord::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let service = Arc::clone(&self.service);
        Ok(tokio::task::spawn_blocking(move || f(&service)).await??)
    }

    fn authorize_admin(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let Some(expected) = &self.admin_token else {
            return Err(ApiError::NotFound);
        };
        match bearer_token(headers) {
            Ok(token) if secrets_match(token, expected) => Ok(()),
            _ => Err(ApiError::AdminToken),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/state", get(sequence_state))
        .route("/my-assignment", get(my_assignment))
        .route("/assign-digit", post(assign_digit))
        .route("/timeline", get(timeline))
        .route("/wallpaper-urls", get(wallpaper_urls))
        .route("/wallpapers/{file}", get(wallpaper))
        .route("/admin/render", post(admin_render))
        .route("/admin/reset", post(admin_reset))
        .layer(middleware::from_fn(count_requests))
        .with_state(state)
}

async fn count_requests(request: Request, next: Next) -> Response {
    increment_requests();
    next.run(request).await
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn sequence_state(State(state): State<AppState>) -> Result<Json<SequenceState>, ApiError> {
    Ok(Json(state.blocking(|service| service.state()).await?))
}

#[tracing::instrument(skip_all)]
async fn my_assignment(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Option<AssignmentView>>, ApiError> {
    let identity = state.verifier.verify(&headers)?;
    let view = state
        .blocking(move |service| {
            service.remember(&identity.participant_id, identity.claimant)?;
            let assignment = service.assignment(&identity.participant_id)?;
            Ok(assignment.map(|a| service.view(&a)))
        })
        .await?;
    Ok(Json(view))
}

#[tracing::instrument(skip_all)]
async fn assign_digit(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AssignmentView>, ApiError> {
    let identity = state.verifier.verify(&headers)?;
    let (created, view) = state
        .blocking(move |service| {
            service.remember(&identity.participant_id, identity.claimant)?;
            let claim = service.assign(&identity.participant_id)?;
            Ok((claim.is_created(), service.view(claim.assignment())))
        })
        .await?;

    if created {
        increment_assignments_created();
    } else {
        increment_duplicate_assigns();
    }
    Ok(Json(view))
}

async fn timeline(State(state): State<AppState>) -> Result<Json<Vec<TimelineEntry>>, ApiError> {
    Ok(Json(state.blocking(|service| service.timeline()).await?))
}

async fn wallpaper_urls(State(state): State<AppState>) -> Json<WallpaperUrls> {
    Json(state.service.wallpaper_urls())
}

async fn wallpaper(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Response, ApiError> {
    let name = file.strip_suffix(".png").ok_or(ApiError::NotFound)?;
    let png = state.service.image(name).ok_or(ApiError::NotFound)?;
    Ok((
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        png,
    )
        .into_response())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RenderSummary {
    assigned_count: u64,
    elapsed_ms: u64,
}

impl From<RenderReport> for RenderSummary {
    fn from(report: RenderReport) -> Self {
        Self {
            assigned_count: report.assigned_count,
            elapsed_ms: report.elapsed.as_millis() as u64,
        }
    }
}

async fn admin_render(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RenderSummary>, ApiError> {
    state.authorize_admin(&headers)?;
    let report = state.blocking(|service| service.rerender()).await?;
    Ok(Json(report.into()))
}

async fn admin_reset(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RenderSummary>, ApiError> {
    state.authorize_admin(&headers)?;
    let report = state.blocking(|service| service.reset()).await?;
    tracing::warn!("Sequence reset by admin request");
    Ok(Json(report.into()))
}
