use axum::Router;

pub mod health;
pub mod ws;

pub fn router() -> Router {
    Router::new()
        .merge(ws::router())
        .merge(health::router())
}
