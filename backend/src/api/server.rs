//! HTTP server for the reconciliation engine.
//!
//! The server only reconciles: it takes the current rows and the new batch,
//! and answers with the grid to write plus the trim to apply. Talking to the
//! remote store stays with the caller (or the `sync` CLI command).
//!
//! # API Endpoints
//!
//! | Method | Path                     | Description                          |
//! |--------|--------------------------|--------------------------------------|
//! | GET    | `/health`                | Health check                         |
//! | POST   | `/api/reconcile`         | Merge new records into sheet rows    |
//! | POST   | `/api/transform/check`   | Compile a transform program          |
//! | GET    | `/api/operations`        | Transform DSL reference              |
//! | GET    | `/api/logs`              | SSE stream for real-time logs        |

use axum::{
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, log_success, LOG_BROADCASTER};
use super::types::{error_response, ReconcileRequest, ReconcileResponse};
use crate::error::{PipelineError, ServerError};
use crate::pipeline::reconcile;
use crate::transform::{compile, operations_description};

impl ServerError {
    fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Pipeline(e) => match e {
                PipelineError::Config(_)
                | PipelineError::Transform(_)
                | PipelineError::Codec(_)
                | PipelineError::Source(_)
                | PipelineError::Json(_) => StatusCode::BAD_REQUEST,
                PipelineError::Budget(_) => StatusCode::PAYLOAD_TOO_LARGE,
                PipelineError::Remote(_) => StatusCode::BAD_GATEWAY,
                PipelineError::Backup(_) | PipelineError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        log_error(self.to_string());
        (self.status(), Json(error_response(&self.to_string()))).into_response()
    }
}

/// Build the application router
pub fn router() -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/reconcile", post(reconcile_rows))
        .route("/api/transform/check", post(check_transform))
        .route("/api/operations", get(operations))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
}

/// Start the HTTP server
pub async fn start_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 Sheetsync server running on http://localhost:{}", port);
    println!("   POST /api/reconcile       - Merge new records into sheet rows");
    println!("   POST /api/transform/check - Compile a transform program");
    println!("   GET  /api/logs            - SSE log stream");
    println!("   GET  /health              - Health check");
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router()).await?;

    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "sheetsync",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "reconcile": "POST /api/reconcile",
            "checkTransform": "POST /api/transform/check",
            "operations": "GET /api/operations",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

async fn operations() -> String {
    operations_description()
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // Lagged receivers skip what they missed
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

async fn reconcile_rows(body: String) -> Result<Json<ReconcileResponse>, ServerError> {
    let request: ReconcileRequest =
        serde_json::from_str(&body).map_err(|e| ServerError::BadRequest(e.to_string()))?;

    log_info(format!(
        "NEW RECONCILE: {} new records, {} existing rows",
        request.new_records.len(),
        request.old_rows.as_ref().map_or(0, Vec::len)
    ));

    let input = request.into_input()?;
    let output = reconcile(&input)?;
    log_success(format!(
        "{} rows to write, {} cells",
        output.stats.rows, output.stats.cells
    ));

    Ok(Json(ReconcileResponse::from(output)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckTransformRequest {
    #[serde(default)]
    transform_function: Option<String>,
}

async fn check_transform(body: String) -> Result<Json<Value>, ServerError> {
    let request: CheckTransformRequest =
        serde_json::from_str(&body).map_err(|e| ServerError::BadRequest(e.to_string()))?;

    let compiled = compile(request.transform_function.as_deref()).map_err(PipelineError::from)?;
    let steps = compiled
        .as_ref()
        .and_then(|t| t.program())
        .map_or(0, |p| p.steps.len());

    Ok(Json(json!({
        "status": "ok",
        "active": compiled.is_some(),
        "steps": steps,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::DEFAULT_MAX_CELLS;
    use crate::error::BudgetError;

    #[tokio::test]
    async fn test_reconcile_endpoint() {
        let body = json!({
            "oldRows": [["url"], ["a.com"]],
            "newRecords": [{"url": "a.com"}, {"url": "b.com"}],
            "deduplicateByField": "url"
        })
        .to_string();

        let Json(response) = reconcile_rows(body).await.unwrap();
        assert_eq!(response.stats.rows, 3);
        assert_eq!(response.stats.merge.duplicates_dropped, 1);
    }

    #[tokio::test]
    async fn test_reconcile_endpoint_bad_body() {
        let err = reconcile_rows("{not json".to_string()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = reconcile_rows(json!({"mode": "upsert"}).to_string()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_budget_status() {
        let err = ServerError::from(PipelineError::from(BudgetError::Exceeded {
            cells: DEFAULT_MAX_CELLS + 1,
            max: DEFAULT_MAX_CELLS,
        }));
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_check_transform_endpoint() {
        let Json(inactive) = check_transform(json!({"transformFunction": "// off"}).to_string())
            .await
            .unwrap();
        assert_eq!(inactive["active"], false);

        let err = check_transform(json!({"transformFunction": "42"}).to_string())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
