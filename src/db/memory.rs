use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::{CallbackUrl, Submission, SubmissionKind, SubmissionStatus};

use super::{CallbackUrlStore, StoreError, SubmissionStore};

/// Process-local store used when no `DATABASE_URL` is configured, and by tests.
///
/// Submissions live in a map keyed by `(kind, consent_id)`; the entry lock on
/// that key is the linearization point for concurrent creates. Nothing awaits
/// while the lock is held.
#[derive(Default)]
pub struct MemoryStore {
    /// (kind, consent_id) -> submission
    submissions: DashMap<(SubmissionKind, String), Submission>,
    /// id -> (kind, consent_id)
    ids: DashMap<Uuid, (SubmissionKind, String)>,
    callback_urls: DashMap<Uuid, CallbackUrl>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.len()
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Submission>, StoreError> {
        let Some(key) = self.ids.get(&id).map(|k| k.value().clone()) else {
            return Ok(None);
        };
        Ok(self.submissions.get(&key).map(|s| s.value().clone()))
    }

    async fn find_by_consent_id(
        &self,
        kind: SubmissionKind,
        consent_id: &str,
    ) -> Result<Option<Submission>, StoreError> {
        Ok(self
            .submissions
            .get(&(kind, consent_id.to_string()))
            .map(|s| s.value().clone()))
    }

    async fn save(&self, submission: Submission) -> Result<Submission, StoreError> {
        let key = (submission.kind, submission.consent_id.clone());
        match self.submissions.entry(key.clone()) {
            Entry::Occupied(_) => Err(StoreError::UniqueConstraintViolation {
                kind: key.0,
                consent_id: key.1,
            }),
            Entry::Vacant(slot) => {
                self.ids.insert(submission.id, key);
                slot.insert(submission.clone());
                Ok(submission)
            }
        }
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: SubmissionStatus,
    ) -> Result<Option<Submission>, StoreError> {
        let Some(key) = self.ids.get(&id).map(|k| k.value().clone()) else {
            return Ok(None);
        };
        Ok(self.submissions.get_mut(&key).map(|mut s| {
            s.status = status;
            s.updated_at = Utc::now();
            s.value().clone()
        }))
    }
}

#[async_trait]
impl CallbackUrlStore for MemoryStore {
    async fn create_callback_url(&self, callback: CallbackUrl) -> Result<CallbackUrl, StoreError> {
        self.callback_urls.insert(callback.id, callback.clone());
        Ok(callback)
    }

    async fn list_callback_urls(&self) -> Result<Vec<CallbackUrl>, StoreError> {
        let mut all: Vec<CallbackUrl> = self
            .callback_urls
            .iter()
            .map(|c| c.value().clone())
            .collect();
        all.sort_by_key(|c| c.created_at);
        Ok(all)
    }

    async fn find_callback_url(&self, id: Uuid) -> Result<Option<CallbackUrl>, StoreError> {
        Ok(self.callback_urls.get(&id).map(|c| c.value().clone()))
    }

    async fn delete_callback_url(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.callback_urls.remove(&id).is_some())
    }
}
