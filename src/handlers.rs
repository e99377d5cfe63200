//! Per-release handlers for the write-type payment resources.
//!
//! Every `(kind, version)` pair maps to exactly one handler. A handler either
//! does the work itself ([`AuthoritativeHandler`]) or hands the call to the
//! handler of the immediately preceding release ([`ForwardingHandler`]). The
//! earliest release is always authoritative, so every chain terminates.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::db::SubmissionStore;
use crate::error::AppError;
use crate::idempotency::{IdempotencyResolver, Resolution};
use crate::models::{Submission, SubmissionKind};
use crate::version::ApiVersion;
use crate::visibility::is_visible;

/// Placeholder forwarded to older releases in place of the
/// `x-fapi-financial-id` header newer callers no longer send.
pub const DUMMY_FINANCIAL_ID: &str = "0015800001041RHAAY";

/// Idempotency keys are limited to 40 characters.
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 40;

/// Releases with their own implementation for every kind; the rest forward.
pub const DEFAULT_AUTHORITATIVE: &[ApiVersion] = &[ApiVersion::V3_0, ApiVersion::V3_1];

/// Fixed for the lifetime of one external call, whichever handler runs it.
#[derive(Debug, Clone, Copy)]
pub struct CallContext {
    /// The release whose route the external request arrived on.
    pub origin_version: ApiVersion,
}

/// Caller-supplied fields of a write request.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteCall {
    pub consent_id: String,
    pub idempotency_key: String,
    pub payload: serde_json::Value,
    pub financial_id: Option<String>,
}

#[async_trait]
pub trait SubmissionHandler: Send + Sync {
    fn kind(&self) -> SubmissionKind;
    fn version(&self) -> ApiVersion;
    fn is_authoritative(&self) -> bool;
    async fn create(&self, ctx: &CallContext, call: WriteCall) -> Result<Resolution, AppError>;
    async fn get(&self, ctx: &CallContext, id: Uuid) -> Result<Option<Submission>, AppError>;
}

pub struct AuthoritativeHandler {
    kind: SubmissionKind,
    version: ApiVersion,
    store: Arc<dyn SubmissionStore>,
    resolver: IdempotencyResolver,
}

impl AuthoritativeHandler {
    pub fn new(
        kind: SubmissionKind,
        version: ApiVersion,
        store: Arc<dyn SubmissionStore>,
        resolver: IdempotencyResolver,
    ) -> Self {
        Self {
            kind,
            version,
            store,
            resolver,
        }
    }

    fn validate(&self, call: &WriteCall) -> Result<(), AppError> {
        if self.version.receives_financial_id()
            && call.financial_id.as_deref().is_none_or(|id| id.trim().is_empty())
        {
            return Err(AppError::BadRequest(
                "x-fapi-financial-id header is required".to_string(),
            ));
        }
        if call.consent_id.trim().is_empty() {
            return Err(AppError::BadRequest("Data.ConsentId is required".to_string()));
        }
        validate_idempotency_key(&call.idempotency_key)
    }
}

pub fn validate_idempotency_key(key: &str) -> Result<(), AppError> {
    if key.trim().is_empty() {
        return Err(AppError::BadRequest(
            "x-idempotency-key header is required".to_string(),
        ));
    }
    if key.chars().count() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(AppError::BadRequest(format!(
            "x-idempotency-key must be at most {MAX_IDEMPOTENCY_KEY_LEN} characters"
        )));
    }
    Ok(())
}

#[async_trait]
impl SubmissionHandler for AuthoritativeHandler {
    fn kind(&self) -> SubmissionKind {
        self.kind
    }

    fn version(&self) -> ApiVersion {
        self.version
    }

    fn is_authoritative(&self) -> bool {
        true
    }

    async fn create(&self, ctx: &CallContext, call: WriteCall) -> Result<Resolution, AppError> {
        self.validate(&call)?;

        let candidate = Submission::new(
            self.kind,
            call.consent_id,
            call.idempotency_key,
            call.payload,
            ctx.origin_version,
        );
        tracing::debug!(
            "{} {} handling {} submission {} for consent '{}'",
            self.kind,
            self.version,
            ctx.origin_version,
            candidate.id,
            candidate.consent_id
        );

        Ok(self.resolver.resolve(self.store.as_ref(), candidate).await?)
    }

    async fn get(&self, ctx: &CallContext, id: Uuid) -> Result<Option<Submission>, AppError> {
        let submission = self.store.find_by_id(id).await?;
        Ok(submission.filter(|s| {
            s.kind == self.kind && is_visible(s.api_version, ctx.origin_version)
        }))
    }
}

pub struct ForwardingHandler {
    version: ApiVersion,
    previous: Arc<dyn SubmissionHandler>,
}

impl ForwardingHandler {
    pub fn new(version: ApiVersion, previous: Arc<dyn SubmissionHandler>) -> Self {
        Self { version, previous }
    }

    /// Fill in what this release dropped but the previous one still expects.
    fn adapt(&self, mut call: WriteCall) -> WriteCall {
        if !self.version.receives_financial_id() && self.previous.version().receives_financial_id()
        {
            call.financial_id = Some(DUMMY_FINANCIAL_ID.to_string());
        }
        call
    }
}

#[async_trait]
impl SubmissionHandler for ForwardingHandler {
    fn kind(&self) -> SubmissionKind {
        self.previous.kind()
    }

    fn version(&self) -> ApiVersion {
        self.version
    }

    fn is_authoritative(&self) -> bool {
        false
    }

    async fn create(&self, ctx: &CallContext, call: WriteCall) -> Result<Resolution, AppError> {
        self.previous.create(ctx, self.adapt(call)).await
    }

    async fn get(&self, ctx: &CallContext, id: Uuid) -> Result<Option<Submission>, AppError> {
        self.previous.get(ctx, id).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    EarliestNotAuthoritative(SubmissionKind),
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::EarliestNotAuthoritative(kind) => write!(
                f,
                "{kind} has no authoritative handler for {}",
                ApiVersion::EARLIEST
            ),
        }
    }
}

impl std::error::Error for ChainError {}

pub struct HandlerRegistry {
    handlers: HashMap<(SubmissionKind, ApiVersion), Arc<dyn SubmissionHandler>>,
}

impl HandlerRegistry {
    /// Build one chain per kind. `authoritative` lists, per kind, the releases
    /// that carry their own implementation.
    pub fn build(
        store: Arc<dyn SubmissionStore>,
        resolver: IdempotencyResolver,
        authoritative: &[(SubmissionKind, &[ApiVersion])],
    ) -> Result<Self, ChainError> {
        let mut handlers: HashMap<(SubmissionKind, ApiVersion), Arc<dyn SubmissionHandler>> =
            HashMap::new();

        for &(kind, versions) in authoritative {
            if !versions.contains(&ApiVersion::EARLIEST) {
                return Err(ChainError::EarliestNotAuthoritative(kind));
            }

            let mut previous: Option<Arc<dyn SubmissionHandler>> = None;
            for version in ApiVersion::ALL {
                let handler: Arc<dyn SubmissionHandler> = match previous {
                    Some(prev) if !versions.contains(&version) => {
                        Arc::new(ForwardingHandler::new(version, prev))
                    }
                    _ => Arc::new(AuthoritativeHandler::new(
                        kind,
                        version,
                        store.clone(),
                        resolver,
                    )),
                };
                handlers.insert((kind, version), handler.clone());
                previous = Some(handler);
            }
        }

        Ok(Self { handlers })
    }

    /// Every kind authoritative at [`DEFAULT_AUTHORITATIVE`].
    pub fn with_defaults(
        store: Arc<dyn SubmissionStore>,
        resolver: IdempotencyResolver,
    ) -> Result<Self, ChainError> {
        let declaration: Vec<(SubmissionKind, &[ApiVersion])> = SubmissionKind::ALL
            .iter()
            .map(|&kind| (kind, DEFAULT_AUTHORITATIVE))
            .collect();
        Self::build(store, resolver, &declaration)
    }

    pub fn get(&self, kind: SubmissionKind, version: ApiVersion) -> Option<&Arc<dyn SubmissionHandler>> {
        self.handlers.get(&(kind, version))
    }

    /// The release that actually runs a call arriving on `version`.
    pub fn authoritative_for(&self, kind: SubmissionKind, version: ApiVersion) -> Option<ApiVersion> {
        let mut current = version;
        loop {
            let handler = self.get(kind, current)?;
            if handler.is_authoritative() {
                return Some(current);
            }
            current = current.previous()?;
        }
    }
}
