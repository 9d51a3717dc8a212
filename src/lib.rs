//! Watch-party relay: chat fan-out plus a shared playback state and
//! per-user watch-hour counters, all over one WebSocket endpoint.

pub mod config;
pub mod error;
pub mod hub;
pub mod message;
pub mod routes;
pub mod session;
pub mod state;

use std::sync::Arc;

use axum::{Extension, Router};
use tower_http::services::ServeDir;

use crate::{config::SessionSettings, hub::HubHandle};

/// Full router with hub and session settings attached.
pub fn app(hub: HubHandle, settings: SessionSettings, static_dir: Option<&str>) -> Router {
    let mut app = routes::router();
    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }
    app.layer(Extension(hub))
        .layer(Extension(Arc::new(settings)))
}
