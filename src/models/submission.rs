use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::version::ApiVersion;
use crate::visibility::VersionedResource;

/// Write-type resource collections. Each keeps its own consent partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubmissionKind {
    DomesticPayment,
    InternationalPayment,
    DomesticStandingOrder,
    DomesticScheduledPayment,
    FilePayment,
}

impl SubmissionKind {
    pub const ALL: [SubmissionKind; 5] = [
        SubmissionKind::DomesticPayment,
        SubmissionKind::InternationalPayment,
        SubmissionKind::DomesticStandingOrder,
        SubmissionKind::DomesticScheduledPayment,
        SubmissionKind::FilePayment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionKind::DomesticPayment => "domestic_payment",
            SubmissionKind::InternationalPayment => "international_payment",
            SubmissionKind::DomesticStandingOrder => "domestic_standing_order",
            SubmissionKind::DomesticScheduledPayment => "domestic_scheduled_payment",
            SubmissionKind::FilePayment => "file_payment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == s)
    }

    /// Path segment under `/pisp`.
    pub fn resource_path(self) -> &'static str {
        match self {
            SubmissionKind::DomesticPayment => "domestic-payments",
            SubmissionKind::InternationalPayment => "international-payments",
            SubmissionKind::DomesticStandingOrder => "domestic-standing-orders",
            SubmissionKind::DomesticScheduledPayment => "domestic-scheduled-payments",
            SubmissionKind::FilePayment => "file-payments",
        }
    }

    pub fn from_resource_path(segment: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.resource_path() == segment)
    }

    /// Name of the id field in response bodies, e.g. `DomesticPaymentId`.
    pub fn id_field(self) -> &'static str {
        match self {
            SubmissionKind::DomesticPayment => "DomesticPaymentId",
            SubmissionKind::InternationalPayment => "InternationalPaymentId",
            SubmissionKind::DomesticStandingOrder => "DomesticStandingOrderId",
            SubmissionKind::DomesticScheduledPayment => "DomesticScheduledPaymentId",
            SubmissionKind::FilePayment => "FilePaymentId",
        }
    }

    /// Standing orders and scheduled payments wait for initiation; the rest start pending.
    pub fn initial_status(self) -> SubmissionStatus {
        match self {
            SubmissionKind::DomesticStandingOrder | SubmissionKind::DomesticScheduledPayment => {
                SubmissionStatus::InitiationPending
            }
            _ => SubmissionStatus::Pending,
        }
    }
}

impl fmt::Display for SubmissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionStatus {
    Pending,
    InitiationPending,
    Accepted,
    Rejected,
}

impl SubmissionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "Pending",
            SubmissionStatus::InitiationPending => "InitiationPending",
            SubmissionStatus::Accepted => "Accepted",
            SubmissionStatus::Rejected => "Rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(SubmissionStatus::Pending),
            "InitiationPending" => Some(SubmissionStatus::InitiationPending),
            "Accepted" => Some(SubmissionStatus::Accepted),
            "Rejected" => Some(SubmissionStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub kind: SubmissionKind,
    pub consent_id: String,
    pub idempotency_key: String,
    pub payload: serde_json::Value,
    pub payload_hash: String,
    pub status: SubmissionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub api_version: ApiVersion,
}

impl Submission {
    /// A not-yet-persisted submission in the kind's initial status.
    pub fn new(
        kind: SubmissionKind,
        consent_id: String,
        idempotency_key: String,
        payload: serde_json::Value,
        api_version: ApiVersion,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            kind,
            consent_id,
            idempotency_key,
            payload_hash: payload_hash(&payload),
            payload,
            status: kind.initial_status(),
            created_at: now,
            updated_at: now,
            api_version,
        }
    }
}

impl VersionedResource for Submission {
    fn created_in_version(&self) -> ApiVersion {
        self.api_version
    }
}

/// Hex SHA-256 over the canonical JSON encoding. `serde_json::Map` keeps keys
/// sorted, so objects differing only in key order hash the same. Integral
/// floats are written as integers, so `10` and `10.0` hash the same too.
pub fn payload_hash(payload: &serde_json::Value) -> String {
    let canonical = canonicalize(payload).to_string();
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
    use serde_json::Value;

    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                Value::from(f as i64)
            }
            _ => value.clone(),
        },
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), canonicalize(v)))
                .collect(),
        ),
        _ => value.clone(),
    }
}

