use std::path::Path;

use thiserror::Error;

use super::{OrderSubmission, RawSubmission};

pub const MAX_FILES: usize = 10;
pub const MAX_FILE_SIZE_BYTES: usize = 40 * 1024 * 1024;
/// Ceiling for each of the customer text fields.
pub const MAX_TEXT_FIELD_BYTES: usize = 8 * 1024;

const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/svg+xml",
    "image/webp",
    "application/pdf",
    "text/plain",
    "application/postscript",
    "application/illustrator",
];

const ALLOWED_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "svg", "webp", "pdf", "txt", "ai", "eps", "ps",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("name and email are required")]
    MissingRequiredFields,
    #[error("email address is not valid")]
    InvalidEmail,
    #[error("at least one file is required")]
    NoFiles,
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::MissingRequiredFields => "MISSING_REQUIRED_FIELDS",
            ValidationError::InvalidEmail => "INVALID_EMAIL",
            ValidationError::NoFiles => "NO_FILES",
        }
    }
}

/// Checks the business-required fields; per-file limits are enforced while the
/// request body is read.
pub fn validate(raw: RawSubmission) -> Result<OrderSubmission, ValidationError> {
    let name = required(raw.name);
    let email = required(raw.email);
    let (Some(name), Some(email)) = (name, email) else {
        return Err(ValidationError::MissingRequiredFields);
    };

    if !is_valid_email(&email) {
        return Err(ValidationError::InvalidEmail);
    }

    if raw.files.is_empty() {
        return Err(ValidationError::NoFiles);
    }

    Ok(OrderSubmission {
        name,
        email,
        phone: required(raw.phone),
        description: required(raw.description),
        files: raw.files,
    })
}

fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Shape check only: `local@domain.tld` with no whitespace and a single `@`.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    let clean = |part: &str| {
        !part.is_empty() && !part.contains('@') && !part.contains(char::is_whitespace)
    };
    if !clean(local) || !clean(domain) {
        return false;
    }

    domain
        .char_indices()
        .any(|(idx, ch)| ch == '.' && idx > 0 && idx + 1 < domain.len())
}

/// A file is accepted when either its declared MIME type or its extension is allowed.
pub fn is_allowed_file_type(content_type: Option<&str>, file_name: &str) -> bool {
    let mime_allowed = content_type
        .map(|ct| {
            let essence = ct.split(';').next().unwrap_or_default().trim().to_lowercase();
            ALLOWED_CONTENT_TYPES.contains(&essence.as_str())
        })
        .unwrap_or(false);

    let extension_allowed = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false);

    mime_allowed || extension_allowed
}
