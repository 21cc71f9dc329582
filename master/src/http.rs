//! The axum router and handlers that expose `MasterService` as the
//! `MasterService` RPC surface of section 6, over HTTP/JSON. Follows the
//! teacher's `server/src/main.rs` + `handlers.rs` split: routes are wired
//! here, each handler does argument extraction and delegates the actual
//! work to `MasterService`.

use std::collections::HashMap;
use std::collections::HashSet;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;

use cache_common::{
    AddCheckpointRequest, CacheFileRequest, ClientFileInfo, ClientRawTableInfo, ClientWorkerInfo,
    Command, CoreError, CreateRawTableRequest, GetWorkerRequest, HeartbeatRequest,
    NetAddress, RegisterRequest, RenameRequest, UpdateRawTableMetadataRequest,
};

use crate::service::MasterService;

/// Wraps `CoreError` for the `IntoResponse` impl; keeps the mapping to
/// HTTP status colocated with the error kinds instead of scattered across
/// every handler.
pub struct ApiError(CoreError);

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CoreError::FileAlreadyExist { .. } => StatusCode::CONFLICT,
            CoreError::FileDoesNotExist { .. } => StatusCode::NOT_FOUND,
            CoreError::InvalidPath { .. } => StatusCode::BAD_REQUEST,
            CoreError::SuspectedFileSize { .. } => StatusCode::CONFLICT,
            CoreError::TableColumn { .. } => StatusCode::BAD_REQUEST,
            CoreError::TableDoesNotExist { .. } => StatusCode::NOT_FOUND,
            CoreError::NoLocalWorker { .. } => StatusCode::SERVICE_UNAVAILABLE,
            CoreError::OutOfMemoryForPinFile { .. } => StatusCode::INSUFFICIENT_STORAGE,
            CoreError::FailedToCheckpoint { .. } => StatusCode::BAD_GATEWAY,
            CoreError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn router(service: MasterService) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/workers", get(get_workers_info))
        .route("/worker/register", post(worker_register))
        .route("/worker/heartbeat", post(worker_heartbeat))
        .route("/worker/cacheFile", post(worker_cache_file))
        .route("/worker/addCheckpoint", post(worker_add_checkpoint))
        .route("/worker/pinIdList", get(worker_get_pin_id_list))
        .route("/liststatus", get(liststatus_root))
        .route("/liststatus/*path", get(liststatus))
        .route("/user/createFile", post(user_create_file))
        .route("/user/mkdir", post(user_mkdir))
        .route("/user/fileId", get(user_get_file_id))
        .route("/user/userId", get(user_get_user_id))
        .route("/user/worker", get(user_get_worker))
        .route("/user/fileInfo/id/:id", get(user_get_client_file_info_by_id))
        .route("/user/fileInfo/path/*path", get(user_get_client_file_info_by_path))
        .route("/user/fileLocations/id/:id", get(user_get_file_locations_by_id))
        .route("/user/fileLocations/path/*path", get(user_get_file_locations_by_path))
        .route("/user/listFiles/*path", get(user_list_files))
        .route("/user/ls/*path", get(user_ls))
        .route("/user/delete/id/:id", delete(user_delete_by_id))
        .route("/user/delete/path/*path", delete(user_delete_by_path))
        .route("/user/rename", post(user_rename_file))
        .route("/user/unpin/:id", post(user_unpin_file))
        .route("/user/outOfMemoryForPin/:id", post(user_out_of_memory_for_pin_file))
        .route("/user/createRawTable", post(user_create_raw_table))
        .route("/user/rawTableId", get(user_get_raw_table_id))
        .route("/user/rawTableInfo/id/:id", get(user_get_raw_table_info_by_id))
        .route("/user/rawTableInfo/path/*path", get(user_get_raw_table_info_by_path))
        .route("/user/updateRawTableMetadata/:id", post(user_update_raw_table_metadata))
        .route("/user/numberOfFiles", get(user_get_number_of_files))
        .route("/user/underfsAddress", get(user_get_underfs_address))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(service)
}

fn with_leading_slash(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

// --- worker-facing handlers ------------------------------------------

async fn worker_register(State(service): State<MasterService>, Json(req): Json<RegisterRequest>) -> Json<i64> {
    let encoded = service.worker_register(req.address, req.total_bytes, req.used_bytes, req.current_files);
    Json(encoded)
}

async fn worker_heartbeat(
    State(service): State<MasterService>,
    Json(req): Json<HeartbeatRequest>,
) -> Json<Command> {
    let command = service.worker_heartbeat(req.worker_id, req.used_bytes, &req.removed_file_ids);
    Json(command)
}

async fn worker_cache_file(
    State(service): State<MasterService>,
    Json(req): Json<CacheFileRequest>,
) -> Result<StatusCode, ApiError> {
    service.worker_cache_file(req.worker_id, req.worker_used_bytes, req.file_id, req.file_size_bytes)?;
    Ok(StatusCode::OK)
}

async fn worker_add_checkpoint(
    State(service): State<MasterService>,
    Json(req): Json<AddCheckpointRequest>,
) -> ApiResult<bool> {
    let ok = service.add_checkpoint(req.worker_id, req.file_id, req.file_size_bytes, req.checkpoint_path)?;
    Ok(Json(ok))
}

async fn worker_get_pin_id_list(State(service): State<MasterService>) -> Json<HashSet<i32>> {
    Json(service.worker_get_pin_id_list())
}

async fn get_workers_info(State(service): State<MasterService>) -> Json<Vec<ClientWorkerInfo>> {
    Json(service.get_workers_info())
}

// --- listing ----------------------------------------------------------

async fn liststatus(State(service): State<MasterService>, Path(path): Path<String>) -> ApiResult<Vec<ClientFileInfo>> {
    Ok(Json(service.liststatus(&with_leading_slash(&path))?))
}

async fn liststatus_root(State(service): State<MasterService>) -> ApiResult<Vec<ClientFileInfo>> {
    Ok(Json(service.liststatus("/")?))
}

// --- user-facing handlers ----------------------------------------------

#[derive(Deserialize)]
struct PathBody {
    path: String,
}

async fn user_create_file(State(service): State<MasterService>, Json(body): Json<PathBody>) -> ApiResult<i32> {
    Ok(Json(service.user_create_file(&body.path)?))
}

async fn user_mkdir(State(service): State<MasterService>, Json(body): Json<PathBody>) -> ApiResult<i32> {
    Ok(Json(service.user_mkdir(&body.path)?))
}

#[derive(Deserialize)]
struct PathQuery {
    path: String,
}

async fn user_get_file_id(State(service): State<MasterService>, Query(q): Query<PathQuery>) -> ApiResult<i32> {
    Ok(Json(service.user_get_file_id(&q.path)?))
}

async fn user_get_user_id(State(service): State<MasterService>) -> Json<i64> {
    Json(service.user_get_user_id())
}

async fn user_get_worker(
    State(service): State<MasterService>,
    Query(q): Query<GetWorkerRequest>,
) -> ApiResult<NetAddress> {
    Ok(Json(service.user_get_worker(q.random, &q.host)?))
}

async fn user_get_client_file_info_by_id(
    State(service): State<MasterService>,
    Path(id): Path<i32>,
) -> ApiResult<ClientFileInfo> {
    Ok(Json(service.user_get_client_file_info_by_id(id)?))
}

async fn user_get_client_file_info_by_path(
    State(service): State<MasterService>,
    Path(path): Path<String>,
) -> ApiResult<ClientFileInfo> {
    Ok(Json(service.user_get_client_file_info_by_path(&with_leading_slash(&path))?))
}

async fn user_get_file_locations_by_id(
    State(service): State<MasterService>,
    Path(id): Path<i32>,
) -> ApiResult<Vec<NetAddress>> {
    Ok(Json(service.user_get_file_locations_by_id(id)?))
}

async fn user_get_file_locations_by_path(
    State(service): State<MasterService>,
    Path(path): Path<String>,
) -> ApiResult<Vec<NetAddress>> {
    Ok(Json(service.user_get_file_locations_by_path(&with_leading_slash(&path))?))
}

async fn user_list_files(State(service): State<MasterService>, Path(path): Path<String>) -> ApiResult<Vec<i32>> {
    Ok(Json(service.user_list_files(&with_leading_slash(&path))?))
}

async fn user_ls(State(service): State<MasterService>, Path(path): Path<String>) -> ApiResult<Vec<ClientFileInfo>> {
    Ok(Json(service.user_ls(&with_leading_slash(&path))?))
}

#[derive(Deserialize)]
struct RecursiveQuery {
    #[serde(default)]
    recursive: bool,
}

async fn user_delete_by_id(
    State(service): State<MasterService>,
    Path(id): Path<i32>,
    Query(q): Query<RecursiveQuery>,
) -> ApiResult<bool> {
    Ok(Json(service.user_delete_by_id(id, q.recursive)?))
}

async fn user_delete_by_path(
    State(service): State<MasterService>,
    Path(path): Path<String>,
    Query(q): Query<RecursiveQuery>,
) -> ApiResult<bool> {
    Ok(Json(service.user_delete_by_path(&with_leading_slash(&path), q.recursive)?))
}

async fn user_rename_file(
    State(service): State<MasterService>,
    Query(q): Query<HashMap<String, String>>,
    Json(body): Json<RenameRequest>,
) -> Result<StatusCode, ApiError> {
    let src = q.get("src").cloned().unwrap_or_default();
    service.user_rename_file(&src, &body.dst)?;
    Ok(StatusCode::OK)
}

async fn user_unpin_file(State(service): State<MasterService>, Path(id): Path<i32>) -> Result<StatusCode, ApiError> {
    service.user_unpin_file(id)?;
    Ok(StatusCode::OK)
}

async fn user_out_of_memory_for_pin_file(
    State(service): State<MasterService>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    service.user_out_of_memory_for_pin_file(id)?;
    Ok(StatusCode::OK)
}

async fn user_create_raw_table(
    State(service): State<MasterService>,
    Json(req): Json<CreateRawTableRequest>,
) -> ApiResult<i32> {
    Ok(Json(service.user_create_raw_table(&req.path, req.columns, req.metadata)?))
}

async fn user_get_raw_table_id(State(service): State<MasterService>, Query(q): Query<PathQuery>) -> ApiResult<i32> {
    Ok(Json(service.user_get_raw_table_id(&q.path)?))
}

async fn user_get_raw_table_info_by_id(
    State(service): State<MasterService>,
    Path(id): Path<i32>,
) -> ApiResult<ClientRawTableInfo> {
    Ok(Json(service.user_get_client_raw_table_info_by_id(id)?))
}

async fn user_get_raw_table_info_by_path(
    State(service): State<MasterService>,
    Path(path): Path<String>,
) -> ApiResult<ClientRawTableInfo> {
    Ok(Json(service.user_get_client_raw_table_info_by_path(&with_leading_slash(&path))?))
}

async fn user_update_raw_table_metadata(
    State(service): State<MasterService>,
    Path(id): Path<i32>,
    Json(req): Json<UpdateRawTableMetadataRequest>,
) -> Result<StatusCode, ApiError> {
    service.user_update_raw_table_metadata(id, req.metadata)?;
    Ok(StatusCode::OK)
}

async fn user_get_number_of_files(State(service): State<MasterService>, Query(q): Query<PathQuery>) -> ApiResult<i64> {
    Ok(Json(service.user_get_number_of_files(&q.path)?))
}

async fn user_get_underfs_address(State(service): State<MasterService>) -> Json<String> {
    Json(service.user_get_underfs_address())
}
