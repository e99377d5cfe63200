use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::CallbackUrl;
use crate::state::SharedState;
use crate::version::ApiVersion;
use crate::visibility::{filter_visible, insert_section, is_visible, EnvelopeSection};

#[derive(Deserialize)]
pub struct CreateCallbackUrl {
    #[serde(rename = "Data")]
    pub data: CreateCallbackUrlData,
}

#[derive(Deserialize)]
pub struct CreateCallbackUrlData {
    #[serde(rename = "Url")]
    pub url: String,
    #[serde(rename = "Version")]
    pub version: Option<String>,
}

pub async fn create(
    State(state): State<SharedState>,
    Path(version): Path<String>,
    Json(req): Json<CreateCallbackUrl>,
) -> Result<Response, AppError> {
    let version = ApiVersion::parse(&version)?;

    if req.data.url.trim().is_empty() {
        return Err(AppError::BadRequest("Data.Url is required".to_string()));
    }
    if let Some(requested) = req.data.version.as_deref() {
        let requested = ApiVersion::parse(requested)
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        if requested != version {
            return Err(AppError::BadRequest(format!(
                "Data.Version {requested} does not match the API version {version}"
            )));
        }
    }

    let callback = state
        .callback_urls
        .create_callback_url(CallbackUrl::new(req.data.url, version))
        .await?;
    tracing::info!("Registered callback URL {} in {version}", callback.id);

    let mut body = Map::new();
    body.insert("Data".to_string(), data(&callback));
    envelope(&mut body, version, &state.config.base_url);
    Ok((StatusCode::CREATED, Json(Value::Object(body))).into_response())
}

pub async fn list(
    State(state): State<SharedState>,
    Path(version): Path<String>,
) -> Result<Json<Value>, AppError> {
    let version = ApiVersion::parse(&version)?;

    let all = state.callback_urls.list_callback_urls().await?;
    let visible: Vec<Value> = filter_visible(all, version).iter().map(data).collect();

    let mut body = Map::new();
    body.insert("Data".to_string(), json!({ "CallbackUrl": visible }));
    envelope(&mut body, version, &state.config.base_url);
    Ok(Json(Value::Object(body)))
}

pub async fn delete(
    State(state): State<SharedState>,
    Path((version, id)): Path<(String, Uuid)>,
) -> Result<StatusCode, AppError> {
    let version = ApiVersion::parse(&version)?;

    let callback = state
        .callback_urls
        .find_callback_url(id)
        .await?
        .filter(|c| is_visible(c.version, version))
        .ok_or_else(|| AppError::NotFound(format!("Callback URL '{id}' can't be found")))?;

    state.callback_urls.delete_callback_url(callback.id).await?;
    tracing::info!("Deleted callback URL {id} via {version}");
    Ok(StatusCode::NO_CONTENT)
}

fn data(callback: &CallbackUrl) -> Value {
    json!({
        "CallbackUrlId": callback.id,
        "Url": callback.url,
        "Version": callback.version,
    })
}

fn envelope(body: &mut Map<String, Value>, version: ApiVersion, base_url: &str) {
    insert_section(body, EnvelopeSection::CALLBACK_LINKS, version, || {
        json!({ "Self": format!("{base_url}/open-banking/{version}/callback-urls") })
    });
    insert_section(body, EnvelopeSection::CALLBACK_META, version, || json!({}));
}
