//! Document upload and download for `document` columns.

use crate::error::AppError;
use crate::response::success_one_ok;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, StatusCode},
};

/// PUT /:resource/:id/documents/:field with the raw document as body.
pub async fn upload(
    State(state): State<AppState>,
    Path((resource, id, field)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let service = state.service(&resource)?;
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let row = service.attach_document(&id, &field, body.to_vec(), content_type).await?;
    Ok(success_one_ok(row))
}

/// POST /:resource/:id/documents/:field: multipart form with a `file` or `document` field.
pub async fn upload_multipart(
    State(state): State<AppState>,
    Path((resource, id, field)): Path<(String, String, String)>,
    mut multipart: Multipart,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let service = state.service(&resource)?;
    let mut upload: Option<(Vec<u8>, Option<String>)> = None;
    while let Some(part) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = part.name().unwrap_or("").to_string();
        if name == "file" || name == "document" {
            let content_type = part.content_type().map(str::to_string);
            let data = part.bytes().await.map_err(|e| AppError::BadRequest(e.to_string()))?;
            upload = Some((data.to_vec(), content_type));
            break;
        }
    }
    let (bytes, content_type) =
        upload.ok_or_else(|| AppError::BadRequest("missing 'file' or 'document' field in multipart body".into()))?;
    let row = service.attach_document(&id, &field, bytes, content_type).await?;
    Ok(success_one_ok(row))
}

/// GET /:resource/:id/documents/:field
pub async fn download(
    State(state): State<AppState>,
    Path((resource, id, field)): Path<(String, String, String)>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let service = state.service(&resource)?;
    let bytes = service.load_document(&id, &field).await?;
    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "application/octet-stream")], bytes))
}
