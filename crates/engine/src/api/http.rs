//! HTTP routes for the generation and dispatch trigger surface.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use uuid::Uuid;

use quillcast_domain::{ContentId, DomainError, Platform, PublishResult};
use quillcast_shared::{
    CreateContentRequest, CreateContentResponse, DispatchResponse,
    GenerateContent as GeneratePayload, PublishRequest, PublishResultData, ScheduleRequest,
    ScheduleResponse, UnpublishResponse,
};

use super::bearer_token;
use crate::app::App;
use crate::infrastructure::ports::PublishError;
use crate::use_cases::content::TransitionError;
use crate::use_cases::generation::GenerationFailure;
use crate::use_cases::publishing::DispatchError;

/// Create all HTTP routes.
pub fn routes() -> Router<Arc<App>> {
    Router::new()
        .route("/", get(health))
        .route("/api/health", get(health))
        .route("/api/content", post(create))
        .route("/api/content/{id}/publish", post(publish))
        .route("/api/content/{id}/schedule", post(schedule))
        .route("/api/content/{id}/publish/{platform}", delete(unpublish))
}

async fn health() -> &'static str {
    "OK"
}

/// Queue a content record and generate it in the background.
async fn create(
    State(app): State<Arc<App>>,
    headers: HeaderMap,
    Json(request): Json<CreateContentRequest>,
) -> Result<(StatusCode, Json<CreateContentResponse>), ApiError> {
    let token = bearer_token(&headers).unwrap_or_default();
    let owner = app
        .auth
        .verify(&token)
        .await
        .map_err(|e| ApiError::Unauthorized(e.to_string()))?;

    let payload = GeneratePayload {
        content_type: request.content_type,
        prompt: request.prompt,
        title: request.title,
        campaign_id: request.campaign_id,
        content_id: None,
        metadata: request.metadata,
    };
    let (content, prompt) = app.use_cases.generate.enqueue(owner, payload).await?;

    let generate = app.use_cases.generate.clone();
    let content_id = content.id;
    tokio::spawn(async move {
        if let Err(e) = generate.execute_queued(content_id, &prompt).await {
            tracing::debug!(
                content_id = %content_id,
                error = %e,
                "Queued generation ended with error"
            );
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateContentResponse {
            content_id: content_id.to_uuid(),
            status: content.status.to_string(),
        }),
    ))
}

async fn publish(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    Json(request): Json<PublishRequest>,
) -> Result<Json<DispatchResponse>, ApiError> {
    let platforms = parse_platforms(&request.platforms)?;
    let report = app
        .use_cases
        .publish
        .execute(ContentId::from_uuid(id), &platforms)
        .await?;

    Ok(Json(DispatchResponse {
        content_id: report.content_id.to_uuid(),
        status: report.status.to_string(),
        results: report
            .results
            .into_iter()
            .map(|(platform, result)| (platform.to_string(), result_data(result)))
            .collect::<BTreeMap<_, _>>(),
    }))
}

async fn schedule(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    Json(request): Json<ScheduleRequest>,
) -> Result<Json<ScheduleResponse>, ApiError> {
    let platforms = parse_platforms(&request.platforms)?;
    let content = app
        .use_cases
        .schedule
        .execute(ContentId::from_uuid(id), request.scheduled_for, platforms)
        .await?;

    Ok(Json(ScheduleResponse {
        content_id: content.id.to_uuid(),
        status: content.status.to_string(),
        scheduled_for: content.scheduled_for.unwrap_or(request.scheduled_for),
        platforms: content
            .scheduled_platforms()
            .iter()
            .map(ToString::to_string)
            .collect(),
    }))
}

async fn unpublish(
    State(app): State<Arc<App>>,
    Path((id, platform)): Path<(Uuid, String)>,
) -> Result<Json<UnpublishResponse>, ApiError> {
    let platform: Platform = platform.parse()?;
    let result = app
        .use_cases
        .unpublish
        .execute(ContentId::from_uuid(id), platform)
        .await?;

    let deleted_at = result
        .deleted_at
        .ok_or_else(|| ApiError::Internal("deletion was not recorded".to_string()))?;
    Ok(Json(UnpublishResponse {
        content_id: id,
        platform: platform.to_string(),
        deleted_at,
    }))
}

fn parse_platforms(names: &[String]) -> Result<Vec<Platform>, ApiError> {
    if names.is_empty() {
        return Err(ApiError::BadRequest(
            "at least one platform is required".to_string(),
        ));
    }
    names
        .iter()
        .map(|name| name.parse::<Platform>().map_err(ApiError::from))
        .collect()
}

fn result_data(result: PublishResult) -> PublishResultData {
    PublishResultData {
        success: result.success,
        external_id: result.external_id,
        external_url: result.external_url,
        error: result.error,
        attempts: result.attempts,
        last_attempted_at: result.last_attempted_at,
    }
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Conflict(String),
    /// A platform refused or failed the request.
    Upstream(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg).into_response(),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg).into_response(),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg).into_response(),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<TransitionError> for ApiError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::NotFound(_) => ApiError::NotFound(e.to_string()),
            TransitionError::Illegal { .. } | TransitionError::Conflict { .. } => {
                ApiError::Conflict(e.to_string())
            }
            TransitionError::Domain(_) => ApiError::BadRequest(e.to_string()),
            TransitionError::Repo(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<GenerationFailure> for ApiError {
    fn from(e: GenerationFailure) -> Self {
        match e {
            GenerationFailure::Validation(_) => ApiError::BadRequest(e.to_string()),
            GenerationFailure::InProgress(_) => ApiError::Conflict(e.to_string()),
            GenerationFailure::Transition(e) => e.into(),
            GenerationFailure::Generation { .. } => ApiError::Upstream(e.to_string()),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::Validation(_) => ApiError::BadRequest(e.to_string()),
            DispatchError::NotFound(_) => ApiError::NotFound(e.to_string()),
            DispatchError::NotPublishable { .. } | DispatchError::Conflict { .. } => {
                ApiError::Conflict(e.to_string())
            }
            DispatchError::Platform(PublishError::NotConfigured(_)) => {
                ApiError::BadRequest(e.to_string())
            }
            DispatchError::Platform(_) => ApiError::Upstream(e.to_string()),
            DispatchError::Transition(TransitionError::Illegal { .. }) => {
                ApiError::Conflict(e.to_string())
            }
            DispatchError::Transition(TransitionError::Domain(_)) => {
                ApiError::BadRequest(e.to_string())
            }
            DispatchError::Transition(_) | DispatchError::Repo(_) => {
                ApiError::Internal(e.to_string())
            }
        }
    }
}
