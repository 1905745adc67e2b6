//! HTTP API over a built pipeline
//!
//! Routes:
//! - `GET /`: service banner
//! - `GET /health`: liveness plus indexed corpus size
//! - `POST /query`: `{"question": "..."}` to a `QueryResult`

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::errors::{RagError, Result};
use crate::rag::RagPipeline;
use crate::types::QueryResult;

/// Router state: the pipeline built at startup
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RagPipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<RagPipeline>) -> Self {
        Self { pipeline }
    }
}

/// Body of `POST /query`
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    #[serde(alias = "query")]
    pub question: String,
}

/// A pipeline error rendered as `{"error": ...}`
#[derive(Debug)]
pub struct ApiError(pub RagError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            RagError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            RagError::Retrieval(_) | RagError::Generation(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = %status, error = %self.0, "request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Build the router with CORS and request tracing
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/query", post(query_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `address` and serve until the process is stopped
pub async fn serve(state: AppState, address: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!(address = %address, "listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "message": "fusionrag API",
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "passages": state.pipeline.corpus_size(),
    }))
}

async fn query_handler(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> std::result::Result<Json<QueryResult>, ApiError> {
    let result = state.pipeline.answer(&request.question).await?;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let status = |e: RagError| ApiError(e).status();
        assert_eq!(status(RagError::InvalidQuery("blank".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(RagError::Retrieval("down".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(status(RagError::Generation("quota".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status(RagError::Configuration("weights".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_query_request_accepts_alias() {
        let request: QueryRequest = serde_json::from_str(r#"{"query": "Why?"}"#).unwrap();
        assert_eq!(request.question, "Why?");
    }
}
