use axum::{extract::Extension, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::hub::HubHandle;

pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

async fn health(Extension(hub): Extension<HubHandle>) -> Json<Value> {
    Json(json!({ "status": "ok", "sessions": hub.member_count().await }))
}
