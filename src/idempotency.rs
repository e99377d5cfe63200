use std::fmt;

use serde::{Deserialize, Serialize};

use crate::db::{StoreError, SubmissionStore};
use crate::models::Submission;
use crate::visibility::is_visible;

/// How many times a lost create race is re-resolved before giving up.
const MAX_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The candidate was persisted.
    Created(Submission),
    /// An equivalent request already exists; nothing was written.
    Replayed(Submission),
    Conflict(ConflictReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictReason {
    /// Same idempotency key, materially different request body.
    PayloadMismatch,
    /// The consent was already claimed by a request with another key.
    IdempotencyKeyMismatch,
    /// A matching request exists, but it came in through a later release than
    /// this one and so cannot be shown here.
    CreatedInNewerVersion,
}

impl ConflictReason {
    pub fn code(self) -> &'static str {
        match self {
            ConflictReason::PayloadMismatch => "PayloadMismatch",
            ConflictReason::IdempotencyKeyMismatch => "IdempotencyKeyMismatch",
            ConflictReason::CreatedInNewerVersion => "CreatedInNewerVersion",
        }
    }
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictReason::PayloadMismatch => {
                write!(f, "Idempotency key was reused with a different request body")
            }
            ConflictReason::IdempotencyKeyMismatch => {
                write!(f, "Consent was already used by a request with a different idempotency key")
            }
            ConflictReason::CreatedInNewerVersion => {
                write!(f, "Consent was already used through a newer API version")
            }
        }
    }
}

/// What makes a repeated request a replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdempotencyPolicy {
    /// Same key and the same payload content.
    #[default]
    KeyAndPayload,
    /// Same key only; the body is not compared.
    KeyOnly,
}

impl IdempotencyPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "key-and-payload" => Some(IdempotencyPolicy::KeyAndPayload),
            "key-only" => Some(IdempotencyPolicy::KeyOnly),
            _ => None,
        }
    }
}

/// Create-or-replay for write submissions, partitioned by `(kind, consent_id)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdempotencyResolver {
    policy: IdempotencyPolicy,
}

impl IdempotencyResolver {
    pub fn new(policy: IdempotencyPolicy) -> Self {
        Self { policy }
    }

    pub async fn resolve(
        &self,
        store: &dyn SubmissionStore,
        candidate: Submission,
    ) -> Result<Resolution, StoreError> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            if let Some(existing) = store
                .find_by_consent_id(candidate.kind, &candidate.consent_id)
                .await?
            {
                tracing::info!(
                    "A {} with consent id '{}' already exists, checking idempotency key",
                    candidate.kind,
                    candidate.consent_id
                );
                return Ok(self.compare(&candidate, existing));
            }

            tracing::debug!("No {} for consent id '{}', creating it", candidate.kind, candidate.consent_id);
            match store.save(candidate.clone()).await {
                Ok(saved) => {
                    tracing::info!("Created {} submission {}", saved.kind, saved.id);
                    return Ok(Resolution::Created(saved));
                }
                Err(StoreError::UniqueConstraintViolation { .. }) if attempt < MAX_ATTEMPTS => {
                    tracing::debug!(
                        "Lost create race for consent id '{}', re-resolving",
                        candidate.consent_id
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn compare(&self, candidate: &Submission, existing: Submission) -> Resolution {
        if candidate.idempotency_key.is_empty()
            || existing.idempotency_key.is_empty()
            || candidate.idempotency_key != existing.idempotency_key
        {
            tracing::warn!(
                "Consent id '{}' already claimed by submission {} with another idempotency key",
                existing.consent_id,
                existing.id
            );
            return Resolution::Conflict(ConflictReason::IdempotencyKeyMismatch);
        }

        if self.policy == IdempotencyPolicy::KeyAndPayload
            && candidate.payload_hash != existing.payload_hash
        {
            tracing::warn!(
                "Idempotency key '{}' reused with a different payload for consent id '{}'",
                existing.idempotency_key,
                existing.consent_id
            );
            return Resolution::Conflict(ConflictReason::PayloadMismatch);
        }

        // The candidate carries the release the call arrived on.
        if !is_visible(existing.api_version, candidate.api_version) {
            tracing::warn!(
                "Submission {} was created in {} and is not visible through {}",
                existing.id,
                existing.api_version,
                candidate.api_version
            );
            return Resolution::Conflict(ConflictReason::CreatedInNewerVersion);
        }

        tracing::info!("Idempotent replay of submission {}, no further action", existing.id);
        Resolution::Replayed(existing)
    }
}
