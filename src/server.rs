//!
//! filedex HTTP server
//! -------------------
//! This module defines the Axum-based HTTP API for filedex: one endpoint per
//! index operation, JSON in and out, multipart decoding for uploads.
//!
//! Responsibilities:
//! - Extract parameters (query/JSON/multipart) and invoke one index operation.
//! - Map typed index failures onto HTTP statuses; the index itself never sees
//!   HTTP concepts.
//! - First-run demo namespace creation and startup logs.
//!
//! Handlers contain no hierarchy logic. Multipart uploads are fully buffered
//! before the index is invoked, so a transport abort mid-stream commits
//! nothing.

use std::net::SocketAddr;

use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::error::AppError;
use crate::index::{EntryKind, SharedIndex, UploadItem};

/// Shared server state injected into all handlers. Just the index handle;
/// sessions and auth are out of scope for this service.
#[derive(Clone)]
pub struct AppState {
    pub index: SharedIndex,
}

/// Build the route table over a given state. Exposed separately so tests can
/// mount the full API on an ephemeral listener.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "filedex ok" }))
        .route("/scandir", get(scandir))
        .route("/listdir", get(listdir))
        .route("/mkdir", post(mkdir))
        .route("/makedirs", post(makedirs))
        .route("/remove", post(remove))
        .route("/removedirs", post(removedirs))
        .route("/rmdir", post(rmdir))
        .route("/rename", post(rename))
        .route("/renames", post(renames))
        .route("/replace", post(replace))
        .route("/copyFile", post(copy_file))
        .route("/moveFile", post(move_file))
        .route("/updateTags", post(update_tags))
        .route("/uploadFile", post(upload_file))
        .route("/uploadFiles", post(upload_files))
        .route("/uploadFolder", post(upload_folder))
        .with_state(state)
}

/// Construct the shared state, seeding the demo namespace when the index is
/// empty (first run).
pub fn build_state() -> AppState {
    let index = SharedIndex::new();
    {
        let mut ix = index.0.write();
        if ix.is_empty() {
            if let Err(e) = seed_demo_namespace(&mut ix) {
                error!("failed to seed demo namespace: {}", e);
            }
        }
    }
    AppState { index }
}

/// Seed the namespace every fresh instance starts from: the root folder plus
/// one sample text file.
fn seed_demo_namespace(ix: &mut crate::index::FsIndex) -> anyhow::Result<()> {
    println!("Empty startup detected, creating demo namespace");
    ix.insert_folder("/", "Root folder")?;
    ix.insert_file("/demo.txt", "Demo text file", Some("text/plain".to_string()), 1024)?;
    info!(target: "startup", "demo namespace created: {} entries", ix.len());
    Ok(())
}

/// Start the filedex HTTP server bound to the given port.
pub async fn run_with_port(http_port: u16) -> anyhow::Result<()> {
    let state = build_state();
    let app = router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Convenience entry point using the default port (5000).
pub async fn run() -> anyhow::Result<()> {
    run_with_port(5000).await
}

// -- payloads ---------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PathParams {
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PathPayload {
    path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenamePayload {
    old_path: String,
    new_path: String,
}

#[derive(Debug, Deserialize)]
struct ReplacePayload {
    src: String,
    dest: String,
}

#[derive(Debug, Deserialize)]
struct CopyPayload {
    source: String,
    destination: String,
}

#[derive(Debug, Deserialize)]
struct TagsPayload {
    path: String,
    tags: Vec<String>,
}

// -- response helpers -------------------------------------------------------

type ApiResponse = (StatusCode, Json<serde_json::Value>);

fn ok_message(op: &str) -> ApiResponse {
    (StatusCode::OK, Json(json!({"message": format!("{} success", op)})))
}

fn err_response(e: AppError) -> ApiResponse {
    let status = StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({"error": e.message()})))
}

// -- read handlers ----------------------------------------------------------

async fn scandir(State(state): State<AppState>, Query(params): Query<PathParams>) -> ApiResponse {
    let prefix = params.path.unwrap_or_else(|| "/".to_string());
    let entries = state.index.0.read().scan(&prefix);
    (StatusCode::OK, Json(json!(entries)))
}

async fn listdir(State(state): State<AppState>, Query(params): Query<PathParams>) -> ApiResponse {
    let path = params.path.unwrap_or_else(|| "/".to_string());
    match state.index.0.read().list(&path) {
        Ok(names) => (StatusCode::OK, Json(json!(names))),
        Err(e) => err_response(e),
    }
}

// -- mutation handlers ------------------------------------------------------

async fn mkdir(State(state): State<AppState>, Json(payload): Json<PathPayload>) -> ApiResponse {
    match state.index.0.write().create(&payload.path, EntryKind::Folder) {
        Ok(_) => ok_message("mkdir"),
        Err(e) => err_response(e),
    }
}

async fn makedirs(State(state): State<AppState>, Json(payload): Json<PathPayload>) -> ApiResponse {
    match state.index.0.write().makedirs(&payload.path) {
        Ok(_) => ok_message("makedirs"),
        Err(e) => err_response(e),
    }
}

async fn remove(State(state): State<AppState>, Json(payload): Json<PathPayload>) -> ApiResponse {
    match state.index.0.write().remove(&payload.path) {
        Ok(()) => ok_message("remove"),
        Err(e) => err_response(e),
    }
}

async fn removedirs(State(state): State<AppState>, Json(payload): Json<PathPayload>) -> ApiResponse {
    match state.index.0.write().remove_subtree(&payload.path) {
        Ok(_) => ok_message("removedirs"),
        Err(e) => err_response(e),
    }
}

async fn rmdir(State(state): State<AppState>, Json(payload): Json<PathPayload>) -> ApiResponse {
    match state.index.0.write().rmdir(&payload.path) {
        Ok(()) => ok_message("rmdir"),
        Err(e) => err_response(e),
    }
}

async fn rename(State(state): State<AppState>, Json(payload): Json<RenamePayload>) -> ApiResponse {
    match state.index.0.write().rename(&payload.old_path, &payload.new_path) {
        Ok(_) => ok_message("rename"),
        Err(e) => err_response(e),
    }
}

async fn renames(State(state): State<AppState>, Json(payload): Json<RenamePayload>) -> ApiResponse {
    match state.index.0.write().rename_subtree(&payload.old_path, &payload.new_path) {
        Ok(_) => ok_message("renames"),
        Err(e) => err_response(e),
    }
}

async fn replace(State(state): State<AppState>, Json(payload): Json<ReplacePayload>) -> ApiResponse {
    match state.index.0.write().replace(&payload.src, &payload.dest) {
        Ok(_) => ok_message("replace"),
        Err(e) => err_response(e),
    }
}

async fn copy_file(State(state): State<AppState>, Json(payload): Json<CopyPayload>) -> ApiResponse {
    match state.index.0.write().copy(&payload.source, &payload.destination) {
        Ok(_) => ok_message("copyFile"),
        Err(e) => err_response(e),
    }
}

// Same index operation as /rename; only the payload field names differ.
async fn move_file(State(state): State<AppState>, Json(payload): Json<CopyPayload>) -> ApiResponse {
    match state.index.0.write().rename(&payload.source, &payload.destination) {
        Ok(_) => ok_message("moveFile"),
        Err(e) => err_response(e),
    }
}

async fn update_tags(State(state): State<AppState>, Json(payload): Json<TagsPayload>) -> ApiResponse {
    match state.index.0.write().update_tags(&payload.path, &payload.tags) {
        Ok(_) => ok_message("updateTags"),
        Err(e) => err_response(e),
    }
}

// -- upload handlers --------------------------------------------------------

/// Drain a multipart request into a destination folder and a list of upload
/// items. `part_name` is the expected name of the file part(s); a `path` text
/// field names the destination folder. Every part is read to completion here,
/// before the index lock is ever taken.
async fn collect_multipart(
    multipart: &mut Multipart,
    part_name: &str,
) -> Result<(String, Vec<UploadItem>), AppError> {
    let mut folder: Option<String> = None;
    let mut items: Vec<UploadItem> = Vec::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(f)) => f,
            Ok(None) => break,
            Err(e) => return Err(AppError::internal("upload_stream", e.to_string())),
        };
        let name = field.name().unwrap_or("").to_string();
        if name == "path" {
            let text = field
                .text()
                .await
                .map_err(|e| AppError::internal("upload_stream", e.to_string()))?;
            folder = Some(text);
        } else if name == part_name {
            let file_name = field.file_name().unwrap_or("").to_string();
            let mime_type = field.content_type().map(|m| m.to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::internal("upload_stream", e.to_string()))?;
            items.push(UploadItem { file_name, mime_type, size: bytes.len() as u64 });
        }
        // Unknown fields are drained and ignored.
    }
    let folder = folder
        .ok_or_else(|| AppError::invalid("missing_path_field", "upload is missing the 'path' field"))?;
    if items.is_empty() {
        return Err(AppError::invalid(
            "missing_file_part",
            format!("upload is missing a '{}' part", part_name),
        ));
    }
    Ok((folder, items))
}

fn run_ingest(
    state: &AppState,
    folder: &str,
    items: &[UploadItem],
    op: &str,
    description: &str,
) -> ApiResponse {
    match state.index.0.write().ingest_uploads(folder, items, description) {
        Ok(report) => (
            StatusCode::OK,
            Json(json!({
                "message": format!("{} success", op),
                "created": report.created.len(),
                "skipped": report.skipped,
            })),
        ),
        Err(e) => err_response(e),
    }
}

async fn upload_file(State(state): State<AppState>, mut multipart: Multipart) -> ApiResponse {
    match collect_multipart(&mut multipart, "file").await {
        Ok((folder, items)) => run_ingest(&state, &folder, &items, "uploadFile", "Uploaded file"),
        Err(e) => err_response(e),
    }
}

async fn upload_files(State(state): State<AppState>, mut multipart: Multipart) -> ApiResponse {
    match collect_multipart(&mut multipart, "files").await {
        Ok((folder, items)) => run_ingest(&state, &folder, &items, "uploadFiles", "Uploaded file"),
        Err(e) => err_response(e),
    }
}

/// Folder uploads use the same wire shape as /uploadFiles; the declared
/// filenames carry the relative paths that recreate the folder structure.
async fn upload_folder(State(state): State<AppState>, mut multipart: Multipart) -> ApiResponse {
    match collect_multipart(&mut multipart, "files").await {
        Ok((folder, items)) => {
            run_ingest(&state, &folder, &items, "uploadFolder", "Uploaded folder file")
        }
        Err(e) => err_response(e),
    }
}
