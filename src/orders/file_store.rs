use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, error};

use super::{IncomingFile, UploadedFile};
use crate::storage::ObjectStorage;

const MAX_SANITIZED_NAME_LEN: usize = 100;

#[derive(Debug, Error)]
#[error("failed to upload {display_name}: {cause:#}")]
pub struct UploadFailed {
    pub display_name: String,
    pub cause: anyhow::Error,
}

/// Places order attachments in object storage under
/// `/<namespace>/orders/<YYYY-MM-DD>/<orderId>/<orderId>_<index>_<name>`.
#[derive(Clone)]
pub struct FileStore {
    storage: Arc<dyn ObjectStorage>,
    namespace: String,
}

impl FileStore {
    pub fn new(storage: Arc<dyn ObjectStorage>, namespace: impl Into<String>) -> Self {
        Self {
            storage,
            namespace: namespace.into(),
        }
    }

    pub fn folder_path(&self, date: NaiveDate, order_id: &str) -> String {
        folder_path(&self.namespace, date, order_id)
    }

    pub async fn store(
        &self,
        file: IncomingFile,
        order_id: &str,
        index: usize,
        date: NaiveDate,
    ) -> Result<UploadedFile, UploadFailed> {
        let IncomingFile {
            original_name,
            content_type,
            bytes,
        } = file;

        let sanitized_name = sanitize_file_name(&original_name);
        let storage_key = storage_key(order_id, index, &sanitized_name);
        let folder_path = self.folder_path(date, order_id);
        let object_key = format!("{}{}", folder_path.trim_start_matches('/'), storage_key);
        let size_bytes = bytes.len() as u64;
        let content_type = content_type.or_else(|| {
            mime_guess::from_path(&original_name)
                .first()
                .map(|mime| mime.to_string())
        });

        debug!(%order_id, index, key = %object_key, size_bytes, "uploading order file");

        let result = async {
            self.storage
                .put_object(
                    &object_key,
                    bytes,
                    content_type.clone(),
                    inline_content_disposition(&original_name),
                )
                .await?;
            self.storage.object_url(&object_key).await
        }
        .await;

        let url = result.map_err(|cause| {
            error!(%order_id, index, key = %object_key, error = ?cause, "order file upload failed");
            UploadFailed {
                display_name: original_name.clone(),
                cause,
            }
        })?;

        Ok(UploadedFile {
            original_name,
            sanitized_name,
            storage_key,
            folder_path,
            remote_id: object_key,
            url,
            thumbnail_url: None,
            size_bytes,
            content_type,
        })
    }
}

/// Replaces every character outside `[A-Za-z0-9.-]` with `_`, merges runs of
/// `_` and caps the result at 100 characters.
pub fn sanitize_file_name(name: &str) -> String {
    let mut sanitized = String::with_capacity(name.len().min(MAX_SANITIZED_NAME_LEN));
    for ch in name.chars() {
        let ch = if ch.is_ascii_alphanumeric() || ch == '.' || ch == '-' {
            ch
        } else {
            '_'
        };
        if ch == '_' && sanitized.ends_with('_') {
            continue;
        }
        sanitized.push(ch);
    }
    sanitized.truncate(MAX_SANITIZED_NAME_LEN);
    sanitized
}

pub fn storage_key(order_id: &str, index: usize, sanitized_name: &str) -> String {
    format!("{order_id}_{index}_{sanitized_name}")
}

pub fn folder_path(namespace: &str, date: NaiveDate, order_id: &str) -> String {
    format!("/{namespace}/orders/{}/{order_id}/", date.format("%Y-%m-%d"))
}

fn inline_content_disposition(filename: &str) -> Option<String> {
    if filename.is_empty() {
        return None;
    }

    let fallback: String = filename
        .chars()
        .map(|ch| match ch {
            '"' | '\\' => '_',
            ch if ch.is_ascii() && !ch.is_ascii_control() => ch,
            _ => '_',
        })
        .collect();
    let encoded =
        percent_encoding::utf8_percent_encode(filename, percent_encoding::NON_ALPHANUMERIC);

    Some(format!(
        "inline; filename=\"{fallback}\"; filename*=UTF-8''{encoded}"
    ))
}
