//! The axum router exposing `WorkerService` as the `WorkerService` RPC
//! surface of section 6, mirroring how `master::http` wires
//! `MasterService` — routes here, argument extraction only, the real
//! work delegates to `WorkerService`.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use cache_common::CoreError;

use crate::service::WorkerService;

pub struct ApiError(CoreError);

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CoreError::FileDoesNotExist { .. } => StatusCode::NOT_FOUND,
            CoreError::SuspectedFileSize { .. } => StatusCode::CONFLICT,
            CoreError::FailedToCheckpoint { .. } => StatusCode::BAD_GATEWAY,
            CoreError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn router(service: WorkerService) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/dataFolder", get(get_data_folder))
        .route("/userTempFolder", get(get_user_temp_folder))
        .route("/userUnderfsTempFolder", get(get_user_underfs_temp_folder))
        .route("/userHeartbeat", post(user_heartbeat))
        .route("/requestSpace", post(request_space))
        .route("/returnSpace", post(return_space))
        .route("/lockFile", post(lock_file))
        .route("/unlockFile", post(unlock_file))
        .route("/accessFile", post(access_file))
        .route("/cacheFile", post(cache_file))
        .route("/addCheckpoint", post(add_checkpoint))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(service)
}

async fn get_data_folder(State(service): State<WorkerService>) -> Json<String> {
    Json(service.get_data_folder())
}

#[derive(Deserialize)]
struct UserIdQuery {
    user_id: i64,
}

async fn get_user_temp_folder(
    State(service): State<WorkerService>,
    Query(q): Query<UserIdQuery>,
) -> ApiResult<String> {
    Ok(Json(service.get_user_temp_folder(q.user_id)?))
}

async fn get_user_underfs_temp_folder(
    State(service): State<WorkerService>,
    Query(q): Query<UserIdQuery>,
) -> ApiResult<String> {
    Ok(Json(service.get_user_underfs_temp_folder(q.user_id)?))
}

#[derive(Deserialize)]
struct UserIdBody {
    user_id: i64,
}

async fn user_heartbeat(State(service): State<WorkerService>, Json(body): Json<UserIdBody>) -> StatusCode {
    service.user_heartbeat(body.user_id);
    StatusCode::OK
}

#[derive(Deserialize)]
struct RequestSpaceBody {
    user_id: i64,
    bytes: i64,
    #[serde(default)]
    file_id: Option<i32>,
}

async fn request_space(State(service): State<WorkerService>, Json(body): Json<RequestSpaceBody>) -> Json<bool> {
    Json(service.request_space(body.user_id, body.bytes, body.file_id).await)
}

#[derive(Deserialize)]
struct SpaceBody {
    user_id: i64,
    bytes: i64,
}

async fn return_space(State(service): State<WorkerService>, Json(body): Json<SpaceBody>) -> StatusCode {
    service.return_space(body.user_id, body.bytes);
    StatusCode::OK
}

#[derive(Deserialize)]
struct FileUserBody {
    file_id: i32,
    user_id: i64,
}

async fn lock_file(State(service): State<WorkerService>, Json(body): Json<FileUserBody>) -> StatusCode {
    service.lock_file(body.file_id, body.user_id);
    StatusCode::OK
}

async fn unlock_file(State(service): State<WorkerService>, Json(body): Json<FileUserBody>) -> StatusCode {
    service.unlock_file(body.file_id, body.user_id);
    StatusCode::OK
}

#[derive(Deserialize)]
struct FileIdBody {
    file_id: i32,
}

async fn access_file(State(service): State<WorkerService>, Json(body): Json<FileIdBody>) -> StatusCode {
    service.access_file(body.file_id);
    StatusCode::OK
}

#[derive(Deserialize)]
struct UserFileBody {
    user_id: i64,
    file_id: i32,
}

async fn cache_file(State(service): State<WorkerService>, Json(body): Json<UserFileBody>) -> Result<StatusCode, ApiError> {
    service.cache_file(body.user_id, body.file_id).await?;
    Ok(StatusCode::OK)
}

async fn add_checkpoint(State(service): State<WorkerService>, Json(body): Json<UserFileBody>) -> ApiResult<bool> {
    Ok(Json(service.add_checkpoint(body.user_id, body.file_id).await?))
}
