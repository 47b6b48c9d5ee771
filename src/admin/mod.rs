//! Admin surface: backend membership at runtime and pool status.
//!
//! `POST /add-server` and `POST /remove-server` keep their historical paths;
//! read-only endpoints live under `/admin`.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth;
use self::handlers::*;
use crate::http::server::AppState;

pub fn admin_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/add-server", post(add_server))
        .route("/remove-server", post(remove_server))
        .route("/admin/status", get(get_status))
        .route("/admin/backends", get(get_backends))
        .route_layer(middleware::from_fn_with_state(state.clone(), admin_auth))
}
