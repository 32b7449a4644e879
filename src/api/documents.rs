//! Document library endpoints.

use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};

use super::{read_multipart, success, ApiResult};
use crate::errors::AppError;
use crate::models::{
    DocumentNode, DocumentType, ListDocumentsQuery, NewDocument, RemovedDocuments,
    UpdateDocumentRequest, ROOT_PARENT_ID,
};
use crate::AppState;

/// GET /api/documents - Children of a directory, directories first.
pub async fn list_documents(
    State(state): State<AppState>,
    Query(query): Query<ListDocumentsQuery>,
) -> ApiResult<Vec<DocumentNode>> {
    success(
        state
            .documents
            .list_documents(query.parent_id, query.include_private)
            .await?,
    )
}

/// POST /api/documents - Create a directory or upload a file.
///
/// Multipart fields: `parentId`, `name`, `type` (`dir` or `file`),
/// `isPrivate` and, for files, `file`.
pub async fn create_document(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<DocumentNode> {
    let mut form = read_multipart(multipart, state.config.max_upload_bytes).await?;

    let parent_id = match form.field("parentId").map(str::trim) {
        None | Some("") => ROOT_PARENT_ID,
        Some(raw) => raw
            .parse::<i64>()
            .map_err(|_| AppError::validation("parentId must be an integer"))?,
    };
    let doc_type = form
        .field("type")
        .and_then(|raw| DocumentType::parse(raw.trim()))
        .ok_or_else(|| AppError::validation("type must be 'dir' or 'file'"))?;
    let is_private = match form.field("isPrivate").map(str::trim) {
        None | Some("") | Some("false") | Some("0") => false,
        Some("true") | Some("1") => true,
        Some(_) => return Err(AppError::validation("isPrivate must be a boolean")),
    };
    let name = form.field("name").unwrap_or_default().to_string();
    let file = form.take_file("file");

    let document = NewDocument {
        parent_id,
        name,
        doc_type,
        is_private,
    };
    success(state.documents.create_document(document, file).await?)
}

/// PUT /api/documents/:id - Rename or change privacy.
pub async fn update_document(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateDocumentRequest>,
) -> ApiResult<DocumentNode> {
    success(state.documents.edit_document(id, request).await?)
}

/// DELETE /api/documents/:id - Remove a node and its whole subtree.
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<RemovedDocuments> {
    let removed = state.documents.remove_document(id).await?;
    success(RemovedDocuments { removed })
}
