use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use ob_rs_simulator::db::{MemoryStore, SubmissionStore};
use ob_rs_simulator::error::AppError;
use ob_rs_simulator::handlers::{
    AuthoritativeHandler, CallContext, ChainError, ForwardingHandler, HandlerRegistry,
    SubmissionHandler, WriteCall, DUMMY_FINANCIAL_ID,
};
use ob_rs_simulator::idempotency::{ConflictReason, IdempotencyResolver, Resolution};
use ob_rs_simulator::models::{Submission, SubmissionKind, SubmissionStatus};
use ob_rs_simulator::version::ApiVersion;

fn call(consent_id: &str, key: &str, financial_id: Option<&str>) -> WriteCall {
    WriteCall {
        consent_id: consent_id.to_string(),
        idempotency_key: key.to_string(),
        payload: json!({ "Data": { "ConsentId": consent_id, "Initiation": { "Amount": "10.00" } } }),
        financial_id: financial_id.map(str::to_string),
    }
}

fn ctx(origin_version: ApiVersion) -> CallContext {
    CallContext { origin_version }
}

fn created(resolution: Resolution) -> Submission {
    match resolution {
        Resolution::Created(s) => s,
        other => panic!("expected Created, got {other:?}"),
    }
}

/// Authoritative stand-in that records what reached it.
struct Recorder {
    version: ApiVersion,
    calls: Mutex<Vec<WriteCall>>,
}

impl Recorder {
    fn new(version: ApiVersion) -> Arc<Self> {
        Arc::new(Self {
            version,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn last_financial_id(&self) -> Option<String> {
        self.calls.lock().unwrap().last().and_then(|c| c.financial_id.clone())
    }
}

#[async_trait]
impl SubmissionHandler for Recorder {
    fn kind(&self) -> SubmissionKind {
        SubmissionKind::DomesticPayment
    }

    fn version(&self) -> ApiVersion {
        self.version
    }

    fn is_authoritative(&self) -> bool {
        true
    }

    async fn create(&self, _ctx: &CallContext, call: WriteCall) -> Result<Resolution, AppError> {
        self.calls.lock().unwrap().push(call);
        Ok(Resolution::Conflict(ConflictReason::IdempotencyKeyMismatch))
    }

    async fn get(&self, _ctx: &CallContext, _id: Uuid) -> Result<Option<Submission>, AppError> {
        Ok(None)
    }
}

#[test]
fn default_chains_resolve_to_nearest_authoritative_release() {
    let store: Arc<dyn SubmissionStore> = Arc::new(MemoryStore::new());
    let registry = HandlerRegistry::with_defaults(store, IdempotencyResolver::default()).unwrap();

    for kind in SubmissionKind::ALL {
        assert_eq!(registry.authoritative_for(kind, ApiVersion::V3_0), Some(ApiVersion::V3_0));
        assert_eq!(registry.authoritative_for(kind, ApiVersion::V3_1), Some(ApiVersion::V3_1));
        assert_eq!(
            registry.authoritative_for(kind, ApiVersion::V3_1_10),
            Some(ApiVersion::V3_1)
        );
        for version in ApiVersion::ALL {
            let handler = registry.get(kind, version).expect("every pair has a handler");
            assert_eq!(handler.version(), version);
            assert_eq!(handler.kind(), kind);
        }
    }
}

#[test]
fn chain_without_earliest_release_is_rejected() {
    let store: Arc<dyn SubmissionStore> = Arc::new(MemoryStore::new());
    let only_v3_1: &[ApiVersion] = &[ApiVersion::V3_1];

    let result = HandlerRegistry::build(
        store,
        IdempotencyResolver::default(),
        &[(SubmissionKind::DomesticPayment, only_v3_1)],
    );

    assert_eq!(
        result.err(),
        Some(ChainError::EarliestNotAuthoritative(SubmissionKind::DomesticPayment))
    );
}

#[tokio::test]
async fn forwarded_call_matches_direct_authoritative_call() {
    let store: Arc<dyn SubmissionStore> = Arc::new(MemoryStore::new());
    let registry =
        HandlerRegistry::with_defaults(store.clone(), IdempotencyResolver::default()).unwrap();
    let handler = registry
        .get(SubmissionKind::DomesticPayment, ApiVersion::V3_1_10)
        .unwrap();

    let via_chain = created(
        handler
            .create(&ctx(ApiVersion::V3_1_10), call("C1", "K1", None))
            .await
            .unwrap(),
    );

    let direct_store: Arc<dyn SubmissionStore> = Arc::new(MemoryStore::new());
    let direct = AuthoritativeHandler::new(
        SubmissionKind::DomesticPayment,
        ApiVersion::V3_1,
        direct_store,
        IdempotencyResolver::default(),
    );
    let direct = created(
        direct
            .create(&ctx(ApiVersion::V3_1), call("C1", "K1", Some("0015800001041RHAAY")))
            .await
            .unwrap(),
    );

    assert_eq!(via_chain.api_version, ApiVersion::V3_1_10);
    assert_eq!(direct.api_version, ApiVersion::V3_1);
    assert_eq!(via_chain.kind, direct.kind);
    assert_eq!(via_chain.consent_id, direct.consent_id);
    assert_eq!(via_chain.idempotency_key, direct.idempotency_key);
    assert_eq!(via_chain.payload, direct.payload);
    assert_eq!(via_chain.payload_hash, direct.payload_hash);
    assert_eq!(via_chain.status, direct.status);
    assert_eq!(via_chain.status, SubmissionStatus::Pending);

    assert_eq!(store.find_by_id(via_chain.id).await.unwrap(), Some(via_chain));
}

#[tokio::test]
async fn origin_version_survives_any_chain_length() {
    let store: Arc<dyn SubmissionStore> = Arc::new(MemoryStore::new());
    let only_v3_0: &[ApiVersion] = &[ApiVersion::V3_0];
    let registry = HandlerRegistry::build(
        store,
        IdempotencyResolver::default(),
        &[(SubmissionKind::DomesticPayment, only_v3_0)],
    )
    .unwrap();
    assert_eq!(
        registry.authoritative_for(SubmissionKind::DomesticPayment, ApiVersion::V3_1_11),
        Some(ApiVersion::V3_0)
    );

    let handler = registry
        .get(SubmissionKind::DomesticPayment, ApiVersion::V3_1_2)
        .unwrap();
    let submission = created(
        handler
            .create(&ctx(ApiVersion::V3_1_2), call("C2", "K1", Some("fid")))
            .await
            .unwrap(),
    );
    assert_eq!(submission.api_version, ApiVersion::V3_1_2);

    let older = registry
        .get(SubmissionKind::DomesticPayment, ApiVersion::V3_1)
        .unwrap();
    assert_eq!(older.get(&ctx(ApiVersion::V3_1), submission.id).await.unwrap(), None);

    let newer = registry
        .get(SubmissionKind::DomesticPayment, ApiVersion::V3_1_11)
        .unwrap();
    assert_eq!(
        newer
            .get(&ctx(ApiVersion::V3_1_11), submission.id)
            .await
            .unwrap()
            .map(|s| s.id),
        Some(submission.id)
    );
}

#[tokio::test]
async fn financial_id_still_required_before_3_1_3() {
    let store: Arc<dyn SubmissionStore> = Arc::new(MemoryStore::new());
    let registry = HandlerRegistry::with_defaults(store, IdempotencyResolver::default()).unwrap();

    for version in [ApiVersion::V3_0, ApiVersion::V3_1, ApiVersion::V3_1_2] {
        let handler = registry.get(SubmissionKind::DomesticPayment, version).unwrap();
        let result = handler.create(&ctx(version), call("C3", "K1", None)).await;
        assert!(
            matches!(result, Err(AppError::BadRequest(_))),
            "{version} should require a financial id"
        );
    }

    let handler = registry
        .get(SubmissionKind::DomesticPayment, ApiVersion::V3_1_3)
        .unwrap();
    let result = handler
        .create(&ctx(ApiVersion::V3_1_3), call("C3", "K1", None))
        .await
        .unwrap();
    assert!(matches!(result, Resolution::Created(_)));
}

#[tokio::test]
async fn dummy_financial_id_added_at_the_boundary() {
    let recorder = Recorder::new(ApiVersion::V3_1_2);
    let forwarder = ForwardingHandler::new(ApiVersion::V3_1_3, recorder.clone());

    forwarder
        .create(&ctx(ApiVersion::V3_1_3), call("C4", "K1", None))
        .await
        .unwrap();

    assert_eq!(recorder.last_financial_id().as_deref(), Some(DUMMY_FINANCIAL_ID));
    assert_eq!(forwarder.kind(), SubmissionKind::DomesticPayment);
    assert!(!forwarder.is_authoritative());
}

#[tokio::test]
async fn financial_id_untouched_away_from_the_boundary() {
    let recorder = Recorder::new(ApiVersion::V3_1_3);
    let forwarder = ForwardingHandler::new(ApiVersion::V3_1_4, recorder.clone());
    forwarder
        .create(&ctx(ApiVersion::V3_1_4), call("C5", "K1", None))
        .await
        .unwrap();
    assert_eq!(recorder.last_financial_id(), None);

    let recorder = Recorder::new(ApiVersion::V3_1_1);
    let forwarder = ForwardingHandler::new(ApiVersion::V3_1_2, recorder.clone());
    forwarder
        .create(&ctx(ApiVersion::V3_1_2), call("C6", "K1", Some("caller-fid")))
        .await
        .unwrap();
    assert_eq!(recorder.last_financial_id().as_deref(), Some("caller-fid"));
}

#[tokio::test]
async fn forwarding_chain_shares_one_claim_per_consent() {
    let store: Arc<dyn SubmissionStore> = Arc::new(MemoryStore::new());
    let registry = HandlerRegistry::with_defaults(store, IdempotencyResolver::default()).unwrap();

    let mid = registry
        .get(SubmissionKind::DomesticPayment, ApiVersion::V3_1_5)
        .unwrap();
    let first = created(
        mid.create(&ctx(ApiVersion::V3_1_5), call("C7", "K1", None))
            .await
            .unwrap(),
    );

    let newest = registry
        .get(SubmissionKind::DomesticPayment, ApiVersion::V3_1_11)
        .unwrap();
    let replay = newest
        .create(&ctx(ApiVersion::V3_1_11), call("C7", "K1", None))
        .await
        .unwrap();
    assert_eq!(replay, Resolution::Replayed(first));

    let conflict = newest
        .create(&ctx(ApiVersion::V3_1_11), call("C7", "K2", None))
        .await
        .unwrap();
    assert_eq!(
        conflict,
        Resolution::Conflict(ConflictReason::IdempotencyKeyMismatch)
    );
}

#[tokio::test]
async fn replay_through_older_release_is_rejected() {
    let store: Arc<dyn SubmissionStore> = Arc::new(MemoryStore::new());
    let registry = HandlerRegistry::with_defaults(store, IdempotencyResolver::default()).unwrap();

    let newest = registry
        .get(SubmissionKind::DomesticPayment, ApiVersion::V3_1_11)
        .unwrap();
    let first = created(
        newest
            .create(&ctx(ApiVersion::V3_1_11), call("C8", "K1", None))
            .await
            .unwrap(),
    );

    let mid = registry
        .get(SubmissionKind::DomesticPayment, ApiVersion::V3_1_5)
        .unwrap();
    let outcome = mid
        .create(&ctx(ApiVersion::V3_1_5), call("C8", "K1", None))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        Resolution::Conflict(ConflictReason::CreatedInNewerVersion)
    );

    // The older release cannot read it either.
    assert_eq!(mid.get(&ctx(ApiVersion::V3_1_5), first.id).await.unwrap(), None);
}
