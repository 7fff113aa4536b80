//! Order submission pipeline: validation, identifier minting, file storage,
//! order persistence and notification, sequenced by [`service::OrderService`].

pub mod file_store;
pub mod identifier;
pub mod notifier;
pub mod repository;
pub mod service;
pub mod validation;

use chrono::NaiveDate;
use serde::Serialize;

/// One file part as received from the client, before it is stored.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub original_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Submitted form fields exactly as they arrived.
#[derive(Debug, Clone, Default)]
pub struct RawSubmission {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub description: Option<String>,
    pub files: Vec<IncomingFile>,
}

/// A submission that passed validation.
#[derive(Debug, Clone)]
pub struct OrderSubmission {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub description: Option<String>,
    pub files: Vec<IncomingFile>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub order_id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub description: Option<String>,
    pub submitted_at: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub original_name: String,
    pub sanitized_name: String,
    pub storage_key: String,
    pub folder_path: String,
    pub remote_id: String,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub size_bytes: u64,
    pub content_type: Option<String>,
}
