pub mod memory;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{CallbackUrl, Submission, SubmissionKind, SubmissionStatus};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug)]
pub enum StoreError {
    /// Another writer already holds the `(kind, consent_id)` slot.
    UniqueConstraintViolation { kind: SubmissionKind, consent_id: String },
    /// A persisted row could not be mapped back into a model.
    Corrupt(String),
    Database(sqlx::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::UniqueConstraintViolation { kind, consent_id } => {
                write!(f, "A {kind} submission already exists for consent '{consent_id}'")
            }
            StoreError::Corrupt(msg) => write!(f, "Corrupt record: {msg}"),
            StoreError::Database(err) => write!(f, "Database error: {err}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err)
    }
}

/// Persistence for write-type submissions.
///
/// `save` must be a compare-and-create on `(kind, consent_id)`: a second
/// submission for a claimed consent fails with
/// [`StoreError::UniqueConstraintViolation`] and leaves the first untouched.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Submission>, StoreError>;

    async fn find_by_consent_id(
        &self,
        kind: SubmissionKind,
        consent_id: &str,
    ) -> Result<Option<Submission>, StoreError>;

    async fn save(&self, submission: Submission) -> Result<Submission, StoreError>;

    /// Set a new status and bump `updated_at`. `None` if the id is unknown.
    async fn update_status(
        &self,
        id: Uuid,
        status: SubmissionStatus,
    ) -> Result<Option<Submission>, StoreError>;
}

#[async_trait]
pub trait CallbackUrlStore: Send + Sync {
    async fn create_callback_url(&self, callback: CallbackUrl) -> Result<CallbackUrl, StoreError>;

    async fn list_callback_urls(&self) -> Result<Vec<CallbackUrl>, StoreError>;

    async fn find_callback_url(&self, id: Uuid) -> Result<Option<CallbackUrl>, StoreError>;

    /// Returns `true` if a row was removed.
    async fn delete_callback_url(&self, id: Uuid) -> Result<bool, StoreError>;
}
