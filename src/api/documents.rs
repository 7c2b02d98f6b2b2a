//! Document endpoints: upload, list, and delete.

use std::path::Path;

use axum::extract::{Multipart, Path as UrlPath, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::api::error_response;
use crate::models::{
    DeleteResponse, Document, DocumentInfo, DocumentListResponse, DocumentStatus, UploadResponse,
};
use crate::state::AppState;

type ApiError = (StatusCode, Json<serde_json::Value>);

/// POST /api/documents — multipart upload with `user_id` and `file`
/// fields. The raw bytes are stored immediately; chunking, embedding, and
/// indexing happen in a background job. Poll the list endpoint for status.
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let mut user_id: Option<String> = None;
    let mut filename: Option<String> = None;
    let mut bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        error_response(StatusCode::BAD_REQUEST, format!("Invalid multipart body: {e}"))
    })? {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("user_id") => {
                let value = field.text().await.map_err(|e| {
                    error_response(StatusCode::BAD_REQUEST, format!("Invalid user_id field: {e}"))
                })?;
                user_id = Some(value);
            }
            Some("file") => {
                filename = field.file_name().map(|s| s.to_string());
                let data = field.bytes().await.map_err(|e| {
                    error_response(StatusCode::BAD_REQUEST, format!("Failed to read upload: {e}"))
                })?;
                bytes = Some(data.to_vec());
            }
            _ => {}
        }
    }

    let user_id = user_id
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, "Missing user_id field"))?;
    let bytes = bytes.ok_or_else(|| error_response(StatusCode::BAD_REQUEST, "Missing file field"))?;
    let filename = filename.unwrap_or_else(|| "upload.txt".to_string());

    let doc_id = Uuid::new_v4();

    // Store under a fresh name; the original filename is metadata only.
    let extension = Path::new(&filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("txt");
    let location = state
        .config
        .uploads_dir()
        .join(format!("{}.{extension}", doc_id.simple()));
    tokio::fs::write(&location, &bytes).await.map_err(|e| {
        tracing::error!("Failed to store upload for {doc_id}: {e}");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store upload")
    })?;

    let document = Document {
        id: doc_id,
        user_id,
        filename,
        location: location.to_string_lossy().to_string(),
        status: DocumentStatus::Queued,
        uploaded_at: chrono::Utc::now(),
        indexed_at: None,
        chunk_count: 0,
    };
    let location_str = document.location.clone();
    state.pipeline.store.insert_document(document).map_err(|e| {
        tracing::error!("Failed to record document {doc_id}: {e}");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to record document")
    })?;

    spawn_ingest(state, doc_id);

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadResponse {
            doc_id,
            location: location_str,
        }),
    ))
}

/// Run the ingestion job in the background, bounded by the semaphore so a
/// burst of uploads queues rather than overwhelming the embedding
/// provider. Failures are already recorded on the document's status.
fn spawn_ingest(state: AppState, doc_id: Uuid) {
    tokio::spawn(async move {
        let _permit = match state.ingest_semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return, // semaphore closed, shutting down
        };
        if let Err(e) = state.pipeline.ingest_document(doc_id).await {
            tracing::error!("Ingestion failed for {doc_id}: {e}");
        }
    });
}

/// GET /api/documents/{user_id} — list a user's documents with status.
pub async fn list_documents(
    State(state): State<AppState>,
    UrlPath(user_id): UrlPath<String>,
) -> Json<DocumentListResponse> {
    let documents = state
        .pipeline
        .store
        .list_documents(&user_id)
        .into_iter()
        .map(|d| DocumentInfo {
            doc_id: d.id,
            filename: d.filename,
            status: d.status,
            location: d.location,
        })
        .collect();

    Json(DocumentListResponse { user_id, documents })
}

/// DELETE /api/documents/{doc_id} — remove a document and all derived
/// data. Safe to repeat; deleting an unknown or already-deleted document
/// succeeds. A document mid-ingestion is refused with 409.
pub async fn delete_document(
    State(state): State<AppState>,
    UrlPath(doc_id): UrlPath<Uuid>,
) -> Result<Json<DeleteResponse>, ApiError> {
    if let Some(document) = state.pipeline.store.get_document(&doc_id) {
        if document.status == DocumentStatus::Processing {
            return Err(error_response(
                StatusCode::CONFLICT,
                "Document is being processed; retry when ingestion finishes",
            ));
        }
    }

    let deleted = state.pipeline.delete_document(&doc_id).await.map_err(|e| {
        tracing::error!("Deletion failed for {doc_id}: {e}");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "Deletion failed")
    })?;

    Ok(Json(DeleteResponse { doc_id, deleted }))
}
