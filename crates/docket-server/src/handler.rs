use std::future::Future;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use docket_core::{
    CancellationToken, Collection, CollectionRegistry, CoreResult, Entries, EntryKey,
    SearchOutcome,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<CollectionRegistry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    /// Maximum number of hits to return.
    pub limit: Option<usize>,
}

/// Health check handler.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "collections": state.registry.len(),
    }))
}

/// `GET /{coll}`
pub async fn get_collection(
    State(state): State<AppState>,
    Path(coll): Path<String>,
) -> Result<Json<Entries>, ApiError> {
    let collection = state.registry.resolve(&coll)?;
    Ok(Json(collection.get_all().await?))
}

/// `GET /{coll}/{key}`
pub async fn get_entry(
    State(state): State<AppState>,
    Path((coll, key)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let collection = state.registry.resolve(&coll)?;
    match collection.get(&EntryKey::from(key.as_str())).await? {
        Some(data) => Ok(Json(json!({ "key": key, "data": data }))),
        None => Err(ApiError::NotFound(format!(
            "no entry with key={key} in collection={coll}"
        ))),
    }
}

/// `GET /{coll}/search/{query}?limit=N`
///
/// The scan is cancelled if the client disconnects and the handler future
/// is dropped.
pub async fn search_collection(
    State(state): State<AppState>,
    Path((coll, query)): Path<(String, String)>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Entries>, ApiError> {
    let collection = state.registry.resolve(&coll)?;
    let outcome =
        search_until_dropped(&collection, &query, params.limit, CancellationToken::new()).await?;
    Ok(Json(outcome.hits))
}

/// Run a search that is cancelled through `cancel` as soon as the returned
/// future is dropped.
async fn search_until_dropped(
    collection: &Collection,
    query: &str,
    limit: Option<usize>,
    cancel: CancellationToken,
) -> CoreResult<SearchOutcome> {
    let _guard = cancel.clone().drop_guard();
    collection.search(query, limit, &cancel).await
}

/// `POST /{coll}`
pub async fn add_entry(
    State(state): State<AppState>,
    Path(coll): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let collection = state.registry.resolve(&coll)?;
    let data = parse_json(&body)?;
    let value = data.clone();
    let key = run_detached(async move { collection.add(value).await }).await?;
    Ok(Json(json!({ "key": key.to_string(), "data": data })))
}

/// `PUT /{coll}/{key}`
pub async fn put_entry(
    State(state): State<AppState>,
    Path((coll, key)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let collection = state.registry.resolve(&coll)?;
    let data = parse_json(&body)?;
    let value = data.clone();
    let entry_key = EntryKey::from(key.as_str());
    run_detached(async move { collection.put(&entry_key, value).await }).await?;
    Ok(Json(json!({ "key": key, "data": data })))
}

/// `DELETE /{coll}/{key}`
pub async fn delete_entry(
    State(state): State<AppState>,
    Path((coll, key)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let collection = state.registry.resolve(&coll)?;
    let entry_key = EntryKey::from(key);
    run_detached(async move { collection.delete(&entry_key).await }).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /{coll}`: overwrite the whole collection.
pub async fn replace_collection(
    State(state): State<AppState>,
    Path(coll): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let collection = state.registry.resolve(&coll)?;
    let entries = parse_object(&body)?;
    let n = run_detached(async move { collection.replace(entries).await }).await?;
    Ok(Json(json!({ "n": n })))
}

/// `PATCH /{coll}`: upsert every entry of the body.
pub async fn merge_collection(
    State(state): State<AppState>,
    Path(coll): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let collection = state.registry.resolve(&coll)?;
    let entries = parse_object(&body)?;
    let n = run_detached(async move { collection.merge(entries).await }).await?;
    Ok(Json(json!({ "n": n })))
}

/// `DELETE /{coll}`
pub async fn clear_collection(
    State(state): State<AppState>,
    Path(coll): Path<String>,
) -> Result<StatusCode, ApiError> {
    let collection = state.registry.resolve(&coll)?;
    run_detached(async move { collection.clear().await }).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Run a mutation on its own task so that a client disconnect cannot
/// abandon it between the in-memory update and the persist.
async fn run_detached<T, F>(op: F) -> Result<T, ApiError>
where
    F: Future<Output = CoreResult<T>> + Send + 'static,
    T: Send + 'static,
{
    match tokio::spawn(op).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(e) => Err(ApiError::Internal(format!("operation aborted: {e}"))),
    }
}

/// Bodies are parsed as JSON regardless of the declared content type.
fn parse_json(body: &[u8]) -> Result<Value, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))
}

fn parse_object(body: &[u8]) -> Result<Entries, ApiError> {
    match parse_json(body)? {
        Value::Object(entries) => Ok(entries),
        _ => Err(ApiError::BadRequest("body must be a JSON object".into())),
    }
}
