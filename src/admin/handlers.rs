use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::http::server::AppState;
use crate::load_balancer::{backend::Backend, error::PoolError};

#[derive(Debug, Deserialize)]
pub struct AddServerRequest {
    pub server_url: String,
    pub weight: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RemoveServerRequest {
    pub server_url: String,
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub strategy: String,
    pub backends: usize,
    pub alive: usize,
}

#[derive(Debug, Serialize)]
pub struct BackendStatus {
    pub address: String,
    pub identity: String,
    pub weight: u32,
    pub alive: bool,
    pub state: &'static str,
}

impl From<&Backend> for BackendStatus {
    fn from(backend: &Backend) -> Self {
        Self {
            address: backend.addr().origin(),
            identity: backend.identity().to_string(),
            weight: backend.weight(),
            alive: backend.is_alive(),
            state: backend.state().as_str(),
        }
    }
}

/// Admin request failures.
#[derive(Debug)]
pub enum AdminError {
    BadRequest(&'static str),
    Pool(PoolError),
}

impl From<PoolError> for AdminError {
    fn from(e: PoolError) -> Self {
        AdminError::Pool(e)
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AdminError::BadRequest(message) => (StatusCode::BAD_REQUEST, message.to_string()),
            AdminError::Pool(e) => {
                let status = match e {
                    PoolError::InvalidAddress { .. } => StatusCode::BAD_REQUEST,
                    PoolError::AlreadyRegistered(_) => StatusCode::CONFLICT,
                    PoolError::NotFound(_) => StatusCode::NOT_FOUND,
                    PoolError::LocalBackend { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Bodies are decoded regardless of `Content-Type`.
fn decode<T: DeserializeOwned>(body: &Bytes, message: &'static str) -> Result<T, AdminError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "Malformed admin request body");
        AdminError::BadRequest(message)
    })
}

pub async fn add_server(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<BackendStatus>, AdminError> {
    let request: AddServerRequest = decode(&body, "Invalid Request to add a new server")?;
    if request.weight == Some(0) {
        return Err(AdminError::BadRequest("weight must be at least 1"));
    }
    let backend = state
        .pool
        .add_backend(&request.server_url, request.weight.unwrap_or(1))
        .await?;
    Ok(Json(BackendStatus::from(backend.as_ref())))
}

pub async fn remove_server(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<BackendStatus>, AdminError> {
    let request: RemoveServerRequest = decode(&body, "Invalid Request to remove a server")?;
    let backend = state.pool.remove_backend(&request.server_url)?;
    Ok(Json(BackendStatus::from(backend.as_ref())))
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let snapshot = state.pool.snapshot();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        strategy: state.strategy.to_string(),
        backends: snapshot.len(),
        alive: snapshot.backends().iter().filter(|b| b.is_alive()).count(),
    })
}

pub async fn get_backends(State(state): State<AppState>) -> Json<Vec<BackendStatus>> {
    let snapshot = state.pool.snapshot();
    Json(
        snapshot
            .backends()
            .iter()
            .map(|b| BackendStatus::from(b.as_ref()))
            .collect(),
    )
}
