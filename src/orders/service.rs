use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;
use chrono::{NaiveDate, Utc};
use futures_util::stream::{FuturesUnordered, StreamExt};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::file_store::{FileStore, UploadFailed};
use super::identifier;
use super::notifier::Notifier;
use super::repository::OrderRepository;
use super::validation::{self, ValidationError};
use super::{IncomingFile, Order, RawSubmission, UploadedFile};

/// Pipeline stages a submission moves through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    GeneratingId,
    Uploading,
    Persisting,
    Notifying,
    Responding,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validating => "validation",
            Stage::GeneratingId => "generating-id",
            Stage::Uploading => "upload",
            Stage::Persisting => "persist",
            Stage::Notifying => "notify",
            Stage::Responding => "respond",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("order {order_id}: {source}")]
    Upload {
        order_id: String,
        #[source]
        source: UploadFailed,
    },
    #[error("order {order_id}: failed to persist order: {cause:#}")]
    Persist {
        order_id: String,
        cause: anyhow::Error,
    },
}

impl SubmissionError {
    pub fn stage(&self) -> Stage {
        match self {
            SubmissionError::Validation(_) => Stage::Validating,
            SubmissionError::Upload { .. } => Stage::Uploading,
            SubmissionError::Persist { .. } => Stage::Persisting,
        }
    }

    pub fn order_id(&self) -> Option<&str> {
        match self {
            SubmissionError::Validation(_) => None,
            SubmissionError::Upload { order_id, .. } | SubmissionError::Persist { order_id, .. } => {
                Some(order_id)
            }
        }
    }

    /// Logs upstream failures with their full cause; validation failures are the client's.
    pub fn log(&self) {
        match self {
            SubmissionError::Validation(err) => {
                info!(code = err.code(), "order submission rejected");
            }
            other => {
                error!(
                    order_id = other.order_id().unwrap_or("-"),
                    stage = %other.stage(),
                    error = %other,
                    "order submission failed"
                );
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubmittedOrder {
    pub order: Order,
    pub record_id: String,
    pub files: Vec<UploadedFile>,
    pub folder_path: String,
}

/// Turns one validated upload request into stored files, one order row and a
/// best-effort notification.
///
/// Nothing is rolled back on failure: files stored before a later failure stay
/// in object storage and are only reported in the log.
#[derive(Clone)]
pub struct OrderService {
    files: FileStore,
    repository: Arc<dyn OrderRepository>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl OrderService {
    pub fn new(
        files: FileStore,
        repository: Arc<dyn OrderRepository>,
        notifier: Option<Arc<dyn Notifier>>,
    ) -> Self {
        Self {
            files,
            repository,
            notifier,
        }
    }

    pub async fn submit(&self, raw: RawSubmission) -> Result<SubmittedOrder, SubmissionError> {
        let submission = validation::validate(raw)?;

        let order_id = identifier::generate();
        debug!(%order_id, stage = %Stage::GeneratingId, "order id minted");
        let submitted_at = Utc::now().date_naive();
        let folder_path = self.files.folder_path(submitted_at, &order_id);
        info!(
            %order_id,
            files = submission.files.len(),
            stage = %Stage::Uploading,
            "order accepted"
        );

        let files = self
            .upload_all(&order_id, submitted_at, submission.files)
            .await
            .map_err(|source| SubmissionError::Upload {
                order_id: order_id.clone(),
                source,
            })?;

        let order = Order {
            order_id: order_id.clone(),
            name: submission.name,
            email: submission.email,
            phone: submission.phone,
            description: submission.description,
            submitted_at,
        };

        let created = match self.repository.create_order(&order, &files).await {
            Ok(created) => created,
            Err(cause) => {
                warn!(
                    %order_id,
                    orphaned = ?files.iter().map(|f| f.remote_id.as_str()).collect::<Vec<_>>(),
                    "order not recorded; stored files are orphaned"
                );
                return Err(SubmissionError::Persist { order_id, cause });
            }
        };
        info!(%order_id, record_id = %created.record_id, stage = %Stage::Persisting, "order recorded");

        self.notify(&order, &folder_path).await;

        Ok(SubmittedOrder {
            order,
            record_id: created.record_id,
            files,
            folder_path,
        })
    }

    /// Uploads every file concurrently and returns them in submission order.
    ///
    /// The first failure is returned immediately. Uploads still in flight run
    /// to completion in the background and their results are discarded.
    async fn upload_all(
        &self,
        order_id: &str,
        date: NaiveDate,
        files: Vec<IncomingFile>,
    ) -> Result<Vec<UploadedFile>, UploadFailed> {
        let names: Vec<String> = files.iter().map(|f| f.original_name.clone()).collect();
        let mut pending: FuturesUnordered<_> = files
            .into_iter()
            .enumerate()
            .map(|(index, file)| {
                let store = self.files.clone();
                let order_id = order_id.to_string();
                let handle =
                    tokio::spawn(async move { store.store(file, &order_id, index, date).await });
                async move { (index, handle.await) }
            })
            .collect();

        let mut uploaded: Vec<Option<UploadedFile>> = names.iter().map(|_| None).collect();
        while let Some((index, joined)) = pending.next().await {
            let result = joined.unwrap_or_else(|err| {
                Err(UploadFailed {
                    display_name: names[index].clone(),
                    cause: anyhow!("upload task aborted: {err}"),
                })
            });

            match result {
                Ok(file) => uploaded[index] = Some(file),
                Err(failure) => {
                    let stored: Vec<&str> = uploaded
                        .iter()
                        .flatten()
                        .map(|f| f.remote_id.as_str())
                        .collect();
                    if !stored.is_empty() {
                        warn!(
                            %order_id,
                            orphaned = ?stored,
                            "upload failed after sibling files were stored; they are orphaned"
                        );
                    }
                    return Err(failure);
                }
            }
        }

        Ok(uploaded.into_iter().flatten().collect())
    }

    async fn notify(&self, order: &Order, folder_path: &str) {
        let Some(notifier) = &self.notifier else {
            info!(order_id = %order.order_id, "notifier not configured; skipping notification");
            return;
        };

        if let Err(err) = notifier.notify(order, folder_path).await {
            warn!(
                order_id = %order.order_id,
                stage = %Stage::Notifying,
                error = ?err,
                "order notification failed"
            );
        }
    }
}
