use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::apis::{Article, HostError, SearchResults};
use crate::config::{Config, HostRegistry, HostStatus};
use crate::store::{AvailablePdf, SavedArticles, StoreError};

/// Shared handler state, cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<HostRegistry>,
    pub store: Arc<SavedArticles>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: &Config, store: SavedArticles) -> Self {
        Self {
            registry: Arc::new(config.build_registry()),
            store: Arc::new(store),
            http: reqwest::Client::builder()
                .user_agent("paperdesk/0.1")
                .build()
                .unwrap(),
        }
    }
}

/// Everything a request can fail with. The wire shape stays flat:
/// `{"error": ..., "details"?: ...}` with the status carrying the category.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("query parameter '{0}' is required")]
    MissingParam(&'static str),
    #[error("unknown host '{0}'")]
    UnknownHost(String),
    #[error("search for {0} is not implemented yet")]
    NotImplemented(String),
    #[error("search failed")]
    Search(#[source] HostError),
    #[error("could not fetch PDF from {url}")]
    PdfFetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("could not save article")]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::MissingParam(_) | ApiError::UnknownHost(_) => StatusCode::BAD_REQUEST,
            ApiError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            ApiError::Search(_) | ApiError::PdfFetch { .. } | ApiError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let details = std::error::Error::source(&self).map(|s| s.to_string());
        if status.is_server_error() {
            tracing::error!(error = %self, details = details.as_deref().unwrap_or(""), "request failed");
        }
        let body = match details {
            Some(details) => json!({ "error": self.to_string(), "details": details }),
            None => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let pdf_dir = ServeDir::new(state.store.root());
    Router::new()
        .route("/api/search", get(search))
        .route("/api/save", post(save))
        .route("/api/available-pdfs", get(available_pdfs))
        .route("/api/hosts", get(hosts))
        .route("/health", get(health))
        .nest_service("/api/pdf", pdf_dir)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: Option<String>,
    host: Option<String>,
}

/// `GET /api/search?q=&host=`: dispatch one search to one host.
/// Parameter problems answer 400 before anything leaves the process;
/// a listed host without an adapter answers 501.
async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResults>, ApiError> {
    let query = match params.q.as_deref().map(str::trim) {
        Some(q) if !q.is_empty() => q,
        _ => return Err(ApiError::MissingParam("q")),
    };
    let host = match params.host.as_deref().map(str::trim) {
        Some(h) if !h.is_empty() => h,
        _ => return Err(ApiError::MissingParam("host")),
    };
    let entry = state
        .registry
        .get(host)
        .ok_or_else(|| ApiError::UnknownHost(host.to_string()))?;
    let adapter = entry
        .adapter
        .as_ref()
        .ok_or_else(|| ApiError::NotImplemented(entry.name.clone()))?;

    tracing::info!(host, query, "search");
    let results = adapter.search(query).await.map_err(ApiError::Search)?;
    Ok(Json(results))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SaveResponse {
    success: bool,
    folder_id: String,
}

/// `POST /api/save`: persist one article. The PDF, when linked, is
/// downloaded before anything touches disk; any failure aborts the whole
/// save.
async fn save(
    State(state): State<AppState>,
    Json(article): Json<Article>,
) -> Result<Json<SaveResponse>, ApiError> {
    let pdf = match &article.pdf_link {
        Some(url) => {
            let bytes = fetch_pdf(&state.http, url).await.map_err(|source| ApiError::PdfFetch {
                url: url.clone(),
                source,
            })?;
            Some(bytes)
        }
        None => None,
    };
    let folder_id = state.store.save(&article, pdf.as_deref()).await?;
    Ok(Json(SaveResponse { success: true, folder_id }))
}

async fn fetch_pdf(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, reqwest::Error> {
    let bytes = client.get(url).send().await?.error_for_status()?.bytes().await?;
    Ok(bytes.to_vec())
}

/// `GET /api/available-pdfs`: saved articles whose PDF is present.
async fn available_pdfs(State(state): State<AppState>) -> Result<Json<Vec<AvailablePdf>>, ApiError> {
    Ok(Json(state.store.list_available().await?))
}

/// `GET /api/hosts`: the host table with implemented flags, for the
/// frontend's host picker.
async fn hosts(State(state): State<AppState>) -> Json<Vec<HostStatus>> {
    Json(state.registry.statuses())
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok", version: env!("CARGO_PKG_VERSION") })
}
