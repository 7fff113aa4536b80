use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use axum::extract::{Json, Multipart, State};
use axum::http::StatusCode;
use bytes::BytesMut;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::orders::service::{Stage, SubmissionError, SubmittedOrder};
use crate::orders::validation::{
    is_allowed_file_type, MAX_FILES, MAX_FILE_SIZE_BYTES, MAX_TEXT_FIELD_BYTES,
};
use crate::orders::{IncomingFile, RawSubmission, UploadedFile};
use crate::state::AppState;

const NEXT_STEPS: &[&str] = &[
    "We received your files and will review them shortly.",
    "You will get an email with a quote and proof within 24 business hours.",
    "Keep your order number to follow the order status.",
];

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: &'static str,
    pub data: OrderReceipt,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderReceipt {
    pub order_id: String,
    pub record_id: String,
    pub files_count: usize,
    pub files: Vec<UploadedFile>,
    pub folder_path: String,
    pub next_steps: &'static [&'static str],
}

impl From<SubmittedOrder> for OrderReceipt {
    fn from(submitted: SubmittedOrder) -> Self {
        Self {
            order_id: submitted.order.order_id,
            record_id: submitted.record_id,
            files_count: submitted.files.len(),
            files: submitted.files,
            folder_path: submitted.folder_path,
            next_steps: NEXT_STEPS,
        }
    }
}

pub async fn upload_order(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<UploadResponse>> {
    let multipart = multipart.map_err(|rejection| {
        warn!(error = %rejection, "upload rejected: body is not multipart form data");
        AppError::bad_request("INVALID_MULTIPART", rejection.body_text())
    })?;
    let service = state.order_service().ok_or_else(|| {
        warn!("upload rejected: object storage or order store not configured");
        AppError::unavailable("order intake is temporarily unavailable")
    })?;

    let raw = read_submission(multipart).await?;
    let file_count = raw.files.len();

    let submitted = service.submit(raw).await.map_err(|err| {
        err.log();
        into_app_error(err)
    })?;

    info!(
        order_id = %submitted.order.order_id,
        files = file_count,
        stage = %Stage::Responding,
        "order submission completed"
    );

    Ok(Json(UploadResponse {
        success: true,
        message: "Order received successfully",
        data: submitted.into(),
    }))
}

fn into_app_error(err: SubmissionError) -> AppError {
    match err {
        SubmissionError::Validation(validation) => {
            AppError::bad_request(validation.code(), validation.to_string())
        }
        other => AppError::internal().with_order_id(other.order_id().map(str::to_string)),
    }
}

/// Reads the form, enforcing the per-request file count, per-file size and
/// file type limits while streaming.
async fn read_submission(mut multipart: Multipart) -> AppResult<RawSubmission> {
    let mut raw = RawSubmission::default();

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("nome") => raw.name = Some(read_text(field).await?),
            Some("email") => raw.email = Some(read_text(field).await?),
            Some("telefone") => raw.phone = Some(read_text(field).await?),
            Some("comentarios") => raw.description = Some(read_text(field).await?),
            Some("ficheiros") => {
                // Browsers send an unnamed empty part when no file was chosen.
                let Some(original_name) = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|name| !name.is_empty())
                else {
                    continue;
                };

                if raw.files.len() >= MAX_FILES {
                    warn!(limit = MAX_FILES, "upload rejected: too many files");
                    return Err(AppError::bad_request(
                        "TOO_MANY_FILES",
                        format!("at most {MAX_FILES} files can be uploaded per order"),
                    ));
                }

                let content_type = field.content_type().map(str::to_string);
                if !is_allowed_file_type(content_type.as_deref(), &original_name) {
                    warn!(
                        file = %original_name,
                        content_type = content_type.as_deref().unwrap_or("-"),
                        "upload rejected: unsupported file type"
                    );
                    return Err(AppError::bad_request(
                        "UNSUPPORTED_FILE_TYPE",
                        format!("file type not allowed: {original_name}"),
                    ));
                }

                let bytes = read_file(&mut field, &original_name).await?;
                raw.files.push(IncomingFile {
                    original_name,
                    content_type,
                    bytes,
                });
            }
            _ => {}
        }
    }

    Ok(raw)
}

async fn read_text(mut field: Field<'_>) -> AppResult<String> {
    let name = field.name().unwrap_or("-").to_string();
    let mut buffer = BytesMut::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if buffer.len() + chunk.len() > MAX_TEXT_FIELD_BYTES {
            warn!(field = %name, limit = MAX_TEXT_FIELD_BYTES, "upload rejected: text field too large");
            return Err(AppError::bad_request(
                "FIELD_TOO_LARGE",
                format!(
                    "field {name} must be at most {} KiB",
                    MAX_TEXT_FIELD_BYTES / 1024
                ),
            ));
        }
        buffer.extend_from_slice(&chunk);
    }
    String::from_utf8(buffer.to_vec()).map_err(|_| {
        warn!(field = %name, "upload rejected: text field is not valid UTF-8");
        AppError::bad_request("INVALID_MULTIPART", format!("field {name} is not valid UTF-8"))
    })
}

async fn read_file(field: &mut Field<'_>, original_name: &str) -> AppResult<Vec<u8>> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if buffer.len() + chunk.len() > MAX_FILE_SIZE_BYTES {
            warn!(file = %original_name, limit = MAX_FILE_SIZE_BYTES, "upload rejected: file too large");
            return Err(file_too_large());
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer.to_vec())
}

fn file_too_large() -> AppError {
    AppError::bad_request(
        "FILE_TOO_LARGE",
        format!(
            "each file must be at most {} MiB",
            MAX_FILE_SIZE_BYTES / (1024 * 1024)
        ),
    )
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        warn!(error = %err, "upload rejected: request body too large");
        return file_too_large();
    }
    warn!(error = %err, "invalid multipart data");
    AppError::bad_request("INVALID_MULTIPART", format!("invalid multipart data: {err}"))
}
