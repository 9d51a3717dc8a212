use std::sync::Arc;

use axum::{
    extract::{ws::WebSocketUpgrade, Extension},
    response::IntoResponse,
    routing::get,
    Router,
};

use crate::{config::SessionSettings, hub::HubHandle, session};

pub fn router() -> Router {
    Router::new().route("/ws", get(ws_handler))
}

/* ---------------- upgrade ---------------- */
async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(hub): Extension<HubHandle>,
    Extension(settings): Extension<Arc<SessionSettings>>,
) -> impl IntoResponse {
    ws.max_message_size(settings.max_message_size)
        .on_upgrade(move |socket| session::serve(socket, hub, settings))
}
