use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{CallbackUrl, Submission, SubmissionKind, SubmissionStatus};
use crate::version::ApiVersion;

use super::{CallbackUrlStore, StoreError, SubmissionStore};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SubmissionRow {
    id: Uuid,
    kind: String,
    consent_id: String,
    idempotency_key: String,
    payload: serde_json::Value,
    payload_hash: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    api_version: String,
}

impl TryFrom<SubmissionRow> for Submission {
    type Error = StoreError;

    fn try_from(row: SubmissionRow) -> Result<Self, Self::Error> {
        let kind = SubmissionKind::parse(&row.kind)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown kind '{}'", row.kind)))?;
        let status = SubmissionStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown status '{}'", row.status)))?;
        let api_version = ApiVersion::parse(&row.api_version)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(Submission {
            id: row.id,
            kind,
            consent_id: row.consent_id,
            idempotency_key: row.idempotency_key,
            payload: row.payload,
            payload_hash: row.payload_hash,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
            api_version,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CallbackUrlRow {
    id: Uuid,
    url: String,
    version: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<CallbackUrlRow> for CallbackUrl {
    type Error = StoreError;

    fn try_from(row: CallbackUrlRow) -> Result<Self, Self::Error> {
        let version =
            ApiVersion::parse(&row.version).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(CallbackUrl {
            id: row.id,
            url: row.url,
            version,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl SubmissionStore for PgStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Submission>, StoreError> {
        sqlx::query_as::<_, SubmissionRow>("SELECT * FROM submissions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Submission::try_from)
            .transpose()
    }

    async fn find_by_consent_id(
        &self,
        kind: SubmissionKind,
        consent_id: &str,
    ) -> Result<Option<Submission>, StoreError> {
        sqlx::query_as::<_, SubmissionRow>(
            "SELECT * FROM submissions WHERE kind = $1 AND consent_id = $2",
        )
        .bind(kind.as_str())
        .bind(consent_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Submission::try_from)
        .transpose()
    }

    async fn save(&self, submission: Submission) -> Result<Submission, StoreError> {
        let row = sqlx::query_as::<_, SubmissionRow>(
            "INSERT INTO submissions
                (id, kind, consent_id, idempotency_key, payload, payload_hash,
                 status, created_at, updated_at, api_version)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING *",
        )
        .bind(submission.id)
        .bind(submission.kind.as_str())
        .bind(&submission.consent_id)
        .bind(&submission.idempotency_key)
        .bind(&submission.payload)
        .bind(&submission.payload_hash)
        .bind(submission.status.as_str())
        .bind(submission.created_at)
        .bind(submission.updated_at)
        .bind(submission.api_version.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                StoreError::UniqueConstraintViolation {
                    kind: submission.kind,
                    consent_id: submission.consent_id.clone(),
                }
            }
            _ => StoreError::Database(e),
        })?;
        Submission::try_from(row)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: SubmissionStatus,
    ) -> Result<Option<Submission>, StoreError> {
        sqlx::query_as::<_, SubmissionRow>(
            "UPDATE submissions SET status = $2, updated_at = now()
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?
        .map(Submission::try_from)
        .transpose()
    }
}

#[async_trait]
impl CallbackUrlStore for PgStore {
    async fn create_callback_url(&self, callback: CallbackUrl) -> Result<CallbackUrl, StoreError> {
        let row = sqlx::query_as::<_, CallbackUrlRow>(
            "INSERT INTO callback_urls (id, url, version, created_at)
             VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(callback.id)
        .bind(&callback.url)
        .bind(callback.version.as_str())
        .bind(callback.created_at)
        .fetch_one(&self.pool)
        .await?;
        CallbackUrl::try_from(row)
    }

    async fn list_callback_urls(&self) -> Result<Vec<CallbackUrl>, StoreError> {
        sqlx::query_as::<_, CallbackUrlRow>("SELECT * FROM callback_urls ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(CallbackUrl::try_from)
            .collect()
    }

    async fn find_callback_url(&self, id: Uuid) -> Result<Option<CallbackUrl>, StoreError> {
        sqlx::query_as::<_, CallbackUrlRow>("SELECT * FROM callback_urls WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(CallbackUrl::try_from)
            .transpose()
    }

    async fn delete_callback_url(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM callback_urls WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
