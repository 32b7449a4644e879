//! REST API module.
//!
//! Thin handlers: decode the request, call a service, wrap the result in the
//! response envelope.

mod cashflows;
mod documents;
mod dues;
mod members;
mod obligations;
mod periods;
mod positions;

pub use cashflows::*;
pub use documents::*;
pub use dues::*;
pub use members::*;
pub use obligations::*;
pub use periods::*;
pub use positions::*;

use std::collections::HashMap;

use axum::{
    extract::Multipart,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::errors::AppError;
use crate::models::UploadedFile;

/// Success response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse::new(data))
}

/// Text fields and files of a multipart body.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl MultipartForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }
}

/// Drain a multipart body, rejecting any file larger than `max_bytes`.
pub async fn read_multipart(mut multipart: Multipart, max_bytes: usize) -> Result<MultipartForm, AppError> {
    let mut form = MultipartForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match field.file_name().map(str::to_string) {
            Some(filename) => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("invalid file {}: {}", name, e)))?;
                if bytes.len() > max_bytes {
                    return Err(AppError::validation(format!(
                        "{} exceeds the upload limit of {} bytes",
                        name, max_bytes
                    )));
                }
                form.files.insert(
                    name,
                    UploadedFile {
                        filename,
                        bytes: bytes.to_vec(),
                    },
                );
            }
            None => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("invalid field {}: {}", name, e)))?;
                form.fields.insert(name, value);
            }
        }
    }

    Ok(form)
}
