//! HTTP Server for the layer CV API.
//!
//! Stands in for the upload/download UI: the browser posts a spreadsheet
//! and gets the long-format CSV back as a download.
//!
//! # API Endpoints
//!
//! | Method | Path                     | Description                          |
//! |--------|--------------------------|--------------------------------------|
//! | GET    | `/health`                | Health check                         |
//! | POST   | `/api/reshape`           | Upload wide table, download CSV      |
//! | POST   | `/api/reshape/preview`   | Upload wide table, JSON records      |
//! | GET    | `/api/library`           | List the chemical library            |
//! | GET    | `/api/library/search`    | Search library (`?q=`)               |
//! | GET    | `/api/library/download`  | Download the library CSV             |
//! | POST   | `/api/library`           | Replace the library with an upload   |
//! | GET    | `/api/logs`              | SSE stream for real-time logs        |
//!
//! Upload endpoints take multipart form data: `file` (required), and
//! optionally `skip_rows` and `setups` (comma-separated) to override the
//! server configuration for that request. Request bodies are capped at
//! [`MAX_UPLOAD_BYTES`].

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, LOG_BROADCASTER};
use super::types::{error_response, LibraryResponse, PreviewResponse, SearchParams};
use crate::config::{parse_setups, ReshapeConfig};
use crate::error::{ConfigError, LibraryError, PipelineError, ReshapeError, ServerError};
use crate::export::{export_csv, DEFAULT_FILE_NAME};
use crate::library::ChemicalLibrary;
use crate::transform::pipeline::{process_bytes, ReshapeOutput};

type ApiError = (StatusCode, Json<Value>);

/// Largest accepted request body (spreadsheets can be several MB).
pub const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Shared, read-only server state.
pub struct AppState {
    pub config: ReshapeConfig,
}

/// Start the HTTP server
pub async fn start_server(port: u16, config: ReshapeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(config);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    eprintln!("🚀 layercv server running on http://localhost:{}", port);
    eprintln!("   POST /api/reshape          - Upload spreadsheet, download CSV");
    eprintln!("   POST /api/reshape/preview  - Upload spreadsheet, JSON preview");
    eprintln!("   GET  /api/library[/search] - Chemical library");
    eprintln!("   GET  /api/logs             - SSE log stream");
    eprintln!("   GET  /health               - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the application router.
pub fn router(config: ReshapeConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    let state = Arc::new(AppState { config });

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/reshape", post(reshape_download))
        .route("/api/reshape/preview", post(reshape_preview))
        .route("/api/library", get(library_list).post(library_replace))
        .route("/api/library/search", get(library_search))
        .route("/api/library/download", get(library_download))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "layercv",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "setups": state.config.setups,
        "skipRows": state.config.skip_rows,
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

// =============================================================================
// Reshape
// =============================================================================

/// A parsed multipart upload.
struct Upload {
    bytes: Vec<u8>,
    file_name: Option<String>,
    skip_rows: Option<String>,
    setups: Option<String>,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, ServerError> {
    let mut upload = Upload {
        bytes: Vec::new(),
        file_name: None,
        skip_rows: None,
        setups: None,
    };
    let mut has_file = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                upload.file_name = field.file_name().map(|s| s.to_string());
                upload.bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?
                    .to_vec();
                has_file = true;
            }
            "skip_rows" | "setups" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
                if name == "skip_rows" {
                    upload.skip_rows = Some(text);
                } else {
                    upload.setups = Some(text);
                }
            }
            _ => {}
        }
    }

    if !has_file {
        return Err(ServerError::BadRequest("No file provided".to_string()));
    }
    Ok(upload)
}

/// Server config with the per-request form overrides applied.
fn request_config(base: &ReshapeConfig, upload: &Upload) -> Result<ReshapeConfig, ServerError> {
    let mut config = base.clone();
    if let Some(ref raw) = upload.skip_rows {
        config.skip_rows = raw.trim().parse().map_err(|_| {
            ServerError::BadRequest(format!("skip_rows: '{}' is not a row count", raw))
        })?;
    }
    if let Some(ref raw) = upload.setups {
        config.setups = parse_setups(raw);
    }
    config
        .validate()
        .map_err(|e| ServerError::Pipeline(PipelineError::Config(e)))?;
    Ok(config)
}

async fn run_upload(state: &AppState, multipart: Multipart) -> Result<ReshapeOutput, ServerError> {
    let upload = read_upload(multipart).await?;
    let config = request_config(&state.config, &upload)?;
    run_blocking(move || {
        Ok(process_bytes(&upload.bytes, upload.file_name.as_deref(), &config)?)
    })
    .await
}

/// Run parsing and library file I/O off the async executor.
async fn run_blocking<T, F>(work: F) -> Result<T, ServerError>
where
    F: FnOnce() -> Result<T, ServerError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ServerError::Task(e.to_string()))?
}

/// Upload a wide table, get the CSV back as an attachment.
async fn reshape_download(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let output = run_upload(&state, multipart).await.map_err(api_error)?;
    let bytes = export_csv(&output.table)
        .map_err(|e| api_error(ServerError::Pipeline(e.into())))?;

    Ok(csv_attachment(bytes, DEFAULT_FILE_NAME))
}

/// Upload a wide table, get the records and statistics as JSON.
async fn reshape_preview(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<PreviewResponse>, ApiError> {
    let output = run_upload(&state, multipart).await.map_err(api_error)?;
    Ok(Json(PreviewResponse::from(output)))
}

// =============================================================================
// Chemical Library
// =============================================================================

async fn load_library(state: &AppState) -> Result<ChemicalLibrary, ApiError> {
    let path = state.config.library_path.clone();
    run_blocking(move || Ok(ChemicalLibrary::load(&path)?))
        .await
        .map_err(api_error)
}

async fn library_list(State(state): State<Arc<AppState>>) -> Result<Json<LibraryResponse>, ApiError> {
    let library = load_library(&state).await?;
    let all: Vec<&[String]> = library.rows.iter().map(Vec::as_slice).collect();
    let chemicals = library.rows_as_maps(&all);
    Ok(Json(LibraryResponse::new(library.headers.clone(), chemicals)))
}

async fn library_search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<LibraryResponse>, ApiError> {
    let library = load_library(&state).await?;
    let hits = library.search(&params.q);
    let chemicals = library.rows_as_maps(&hits);
    Ok(Json(LibraryResponse::new(library.headers.clone(), chemicals)))
}

async fn library_download(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let library = load_library(&state).await?;
    let bytes = library.to_csv().map_err(|e| api_error(e.into()))?;
    Ok(csv_attachment(bytes, "chemical_library.csv"))
}

/// Replace the library with an uploaded CSV.
async fn library_replace(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<LibraryResponse>, ApiError> {
    let upload = read_upload(multipart).await.map_err(api_error)?;
    let path = state.config.library_path.clone();
    let library = run_blocking(move || {
        let library = ChemicalLibrary::from_csv_bytes(&upload.bytes)?;
        library.save(&path)?;
        Ok(library)
    })
    .await
    .map_err(api_error)?;

    let all: Vec<&[String]> = library.rows.iter().map(Vec::as_slice).collect();
    let chemicals = library.rows_as_maps(&all);
    Ok(Json(LibraryResponse::new(library.headers.clone(), chemicals)))
}

// =============================================================================
// Responses
// =============================================================================

fn csv_attachment(bytes: Vec<u8>, file_name: &str) -> Response {
    let headers = [
        (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file_name),
        ),
    ];
    (headers, bytes).into_response()
}

/// HTTP status for a server error.
pub fn status_for(error: &ServerError) -> StatusCode {
    match error {
        ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        ServerError::Pipeline(PipelineError::Parse(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        ServerError::Pipeline(PipelineError::Reshape(ReshapeError::ColumnCountMismatch { .. })) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ServerError::Pipeline(PipelineError::Config(ConfigError::NoSetups))
        | ServerError::Pipeline(PipelineError::Config(ConfigError::InvalidValue { .. })) => {
            StatusCode::BAD_REQUEST
        }
        ServerError::Library(LibraryError::Csv(_)) | ServerError::Library(LibraryError::NoHeaders) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(error: ServerError) -> ApiError {
    log_error(error.to_string());
    (status_for(&error), Json(error_response(&error.to_string())))
}
