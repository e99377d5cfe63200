use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::AppError;
use crate::handlers::{CallContext, SubmissionHandler, WriteCall};
use crate::idempotency::Resolution;
use crate::models::{Submission, SubmissionKind};
use crate::state::SharedState;
use crate::version::ApiVersion;
use crate::visibility::{insert_section, EnvelopeSection};

use super::header_value;

fn resolve_handler<'a>(
    state: &'a SharedState,
    version: &str,
    resource: &str,
) -> Result<(ApiVersion, &'a dyn SubmissionHandler), AppError> {
    let version = ApiVersion::parse(version)?;
    let kind = SubmissionKind::from_resource_path(resource)
        .ok_or_else(|| AppError::NotFound(format!("Unknown payment resource '{resource}'")))?;
    let handler = state
        .handlers
        .get(kind, version)
        .ok_or_else(|| AppError::NotFound(format!("{resource} is not available in {version}")))?;
    Ok((version, handler.as_ref()))
}

pub async fn create(
    State(state): State<SharedState>,
    Path((version, resource)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    let (version, handler) = resolve_handler(&state, &version, &resource)?;

    let consent_id = body["Data"]["ConsentId"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    // Releases from 3.1.3 on no longer define the header; ignore it if sent.
    let financial_id = if version.receives_financial_id() {
        header_value(&headers, "x-fapi-financial-id")
    } else {
        None
    };
    let call = WriteCall {
        consent_id,
        idempotency_key: header_value(&headers, "x-idempotency-key").unwrap_or_default(),
        payload: body,
        financial_id,
    };

    let ctx = CallContext {
        origin_version: version,
    };
    match handler.create(&ctx, call).await? {
        Resolution::Created(submission) | Resolution::Replayed(submission) => Ok((
            StatusCode::CREATED,
            Json(render(&submission, version, &state.config.base_url)),
        )
            .into_response()),
        Resolution::Conflict(reason) => Err(AppError::ConsentAlreadyClaimed(reason)),
    }
}

pub async fn get(
    State(state): State<SharedState>,
    Path((version, resource, id)): Path<(String, String, Uuid)>,
) -> Result<Json<Value>, AppError> {
    let (version, handler) = resolve_handler(&state, &version, &resource)?;

    let ctx = CallContext {
        origin_version: version,
    };
    let submission = handler
        .get(&ctx, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Payment submission '{id}' can't be found")))?;

    Ok(Json(render(&submission, version, &state.config.base_url)))
}

/// Response body for a submission as seen through `version`.
pub fn render(submission: &Submission, version: ApiVersion, base_url: &str) -> Value {
    let kind = submission.kind;

    let mut data = Map::new();
    data.insert(kind.id_field().to_string(), json!(submission.id));
    data.insert("ConsentId".to_string(), json!(submission.consent_id));
    data.insert("Status".to_string(), json!(submission.status.as_str()));
    data.insert("CreationDateTime".to_string(), json!(submission.created_at));
    data.insert(
        "StatusUpdateDateTime".to_string(),
        json!(submission.updated_at),
    );
    if let Some(initiation) = submission.payload["Data"].get("Initiation") {
        data.insert("Initiation".to_string(), initiation.clone());
    }

    let mut body = Map::new();
    body.insert("Data".to_string(), Value::Object(data));
    insert_section(&mut body, EnvelopeSection::PAYMENT_LINKS, version, || {
        json!({
            "Self": format!(
                "{base_url}/open-banking/{version}/pisp/{}/{}",
                kind.resource_path(),
                submission.id
            )
        })
    });
    insert_section(&mut body, EnvelopeSection::PAYMENT_META, version, || json!({}));
    Value::Object(body)
}
