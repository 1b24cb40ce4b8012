//! HTTP server mode for REST API access to connector operations

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::{configuration_form, SourceConfig, TEST_CONNECT, TEST_TABLE};
use crate::database::{ChangeSource, SingleStoreConnection};
use crate::engine::{join_sync, selected_columns, start_sync, Selection, SyncConfig};
use crate::error::{Error, Result};
use crate::state::State as OffsetState;

/// Server configuration
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Settings applied to every sync started through `/update`
    pub sync: SyncConfig,
}

/// App state shared across handlers
#[derive(Clone)]
struct AppState {
    config: ServerConfig,
}

/// Request body for the test endpoint
#[derive(Debug, Deserialize)]
struct TestRequest {
    /// Test name from the configuration form
    name: String,
    configuration: Value,
}

/// Request body for the schema endpoint
#[derive(Debug, Deserialize)]
struct SchemaRequest {
    configuration: Value,
}

/// Request body for the update endpoint
#[derive(Debug, Deserialize)]
struct UpdateRequest {
    configuration: Value,
    /// Columns to read; absent selects everything
    #[serde(default)]
    selection: Option<Selection>,
    /// Offset state from the previous sync
    #[serde(default)]
    state_json: Option<String>,
}

/// Response wrapper
#[derive(Debug, Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn error(msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

fn bad_request(msg: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(ApiResponse::<()>::error(msg))).into_response()
}

/// Build the router with all endpoints
pub fn router(config: ServerConfig) -> Router {
    let state = AppState { config };

    // Allow all origins; the service is meant to sit behind a gateway
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/configuration-form", get(form))
        .route("/test", post(run_test))
        .route("/schema", post(schema))
        .route("/update", post(update))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Start the HTTP server
pub async fn serve(config: ServerConfig, port: u16) -> Result<()> {
    let app = router(config);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::config(format!("Failed to bind to port {port}: {e}")))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| Error::config(format!("Server error: {e}")))?;

    Ok(())
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Configuration form endpoint
async fn form() -> impl IntoResponse {
    Json(configuration_form())
}

/// Run one named configuration test
async fn run_test(Json(req): Json<TestRequest>) -> Response {
    let config = match SourceConfig::from_json_value(&req.configuration) {
        Ok(c) => c,
        Err(e) => return bad_request(format!("Invalid configuration: {e}")),
    };
    let connection = SingleStoreConnection::new(config);

    let result = match req.name.as_str() {
        TEST_CONNECT => connection.check_connection().await,
        TEST_TABLE => connection.check_table_existence().await,
        other => return bad_request(format!("Unknown test: {other}")),
    };

    match result {
        Ok(()) => Json(ApiResponse::success(json!({ "test": req.name }))).into_response(),
        Err(e) => {
            warn!(test = %req.name, error = %e, "Configuration test failed");
            Json(ApiResponse::<()>::error(e.to_string())).into_response()
        }
    }
}

/// Describe the configured table
async fn schema(Json(req): Json<SchemaRequest>) -> Response {
    let config = match SourceConfig::from_json_value(&req.configuration) {
        Ok(c) => c,
        Err(e) => return bad_request(format!("Invalid configuration: {e}")),
    };

    match SingleStoreConnection::new(config).schema().await {
        Ok(schemas) => Json(json!({ "schemas": schemas })).into_response(),
        Err(e) => {
            if e.is_discovery_failure() {
                warn!(error = %e, "Table cannot be described");
            } else {
                error!(error = %e, "Schema discovery failed");
            }
            Json(json!({
                "schema_response_not_supported": true,
                "error": e.to_string(),
            }))
            .into_response()
        }
    }
}

/// Stream changes as NDJSON until the change stream ends or the client
/// disconnects. A failed sync ends the body with an `ERROR` line.
async fn update(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateRequest>,
) -> Response {
    let config = match SourceConfig::from_json_value(&req.configuration) {
        Ok(c) => c,
        Err(e) => return bad_request(format!("Invalid configuration: {e}")),
    };
    let prior_state = match OffsetState::from_prior_json(req.state_json.as_deref()) {
        Ok(s) => s,
        Err(e) => return bad_request(format!("Invalid state: {e}")),
    };

    let connection = SingleStoreConnection::new(config);
    let table = connection.table_ref();
    let selection = selected_columns(req.selection.as_ref(), &table);
    let source: Arc<dyn ChangeSource> = Arc::new(connection);

    let (messages, handle) = start_sync(
        source,
        table,
        selection,
        prior_state,
        state.config.sync.clone(),
        CancellationToken::new(),
    );

    let lines = messages.map(|msg| ndjson_line(&msg.to_json()));
    let tail = futures::stream::once(async move {
        match join_sync(handle).await {
            Ok(outcome) => {
                info!(status = ?outcome.status, events = outcome.stats.events(), "Update finished");
                None
            }
            Err(e) => Some(ndjson_line(&json!({
                "type": "ERROR",
                "message": e.to_string(),
                "stale_offset": e.is_stale_offset(),
                "retryable": e.is_retryable(),
                "discovery_failure": e.is_discovery_failure(),
            }))),
        }
    })
    .filter_map(futures::future::ready);

    let body = Body::from_stream(lines.chain(tail).map(Ok::<_, Infallible>));
    ([(header::CONTENT_TYPE, "application/x-ndjson")], body).into_response()
}

fn ndjson_line(value: &Value) -> Bytes {
    let mut line = serde_json::to_vec(value).unwrap_or_default();
    line.push(b'\n');
    Bytes::from(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    async fn call(request: Request<Body>) -> (StatusCode, Value) {
        let response = router(ServerConfig::default()).oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn valid_configuration() -> Value {
        json!({
            "host": "localhost",
            "port": "3306",
            "database": "db",
            "table": "t",
            "user": "root",
        })
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_configuration_form() {
        let (status, body) = call(
            Request::get("/configuration-form")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let tests: Vec<&str> = body["tests"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|t| t["name"].as_str())
            .collect();
        assert_eq!(tests, vec![TEST_CONNECT, TEST_TABLE]);
    }

    #[tokio::test]
    async fn test_unknown_test_is_rejected() {
        let (status, body) = call(post_json(
            "/test",
            &json!({ "name": "nope", "configuration": valid_configuration() }),
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], json!(false));
    }

    #[tokio::test]
    async fn test_invalid_configuration_is_rejected() {
        let (status, body) = call(post_json(
            "/schema",
            &json!({ "configuration": { "host": "localhost" } }),
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("port"));
    }

    #[tokio::test]
    async fn test_update_rejects_malformed_state() {
        let (status, body) = call(post_json(
            "/update",
            &json!({
                "configuration": valid_configuration(),
                "state_json": "{\"offsets\": 7}",
            }),
        ))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid state"));
    }

    #[test]
    fn test_ndjson_line() {
        assert_eq!(ndjson_line(&json!({"a": 1})), Bytes::from_static(b"{\"a\":1}\n"));
    }
}
