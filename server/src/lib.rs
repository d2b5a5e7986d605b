use anyhow::Result;
use axum::{extract::{Query, State}, http::StatusCode, routing::get, Json, Router};
use bsbi_core::{EnglishNormalizer, IndexError, Scoring, Searcher};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const PREVIEW_CHARS: usize = 500;
const MAX_K: usize = 1000;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default)]
    pub mode: Scoring,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}
fn default_k() -> usize { 100 }
fn default_page() -> usize { 1 }
fn default_page_size() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub mode: Scoring,
    pub took_s: f64,
    pub total_hits: usize,
    pub page: usize,
    pub page_size: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub rank: usize,
    pub score: f64,
    pub doc_key: String,
    pub preview: Option<String>,
}

#[derive(Deserialize)]
pub struct DocParams {
    pub key: String,
}

#[derive(Clone)]
pub struct AppState {
    pub searcher: Arc<Searcher>,
}

/// Open the merged index once and serve it from every handler.
pub fn build_app<P: AsRef<Path>, Q: AsRef<Path>>(index_dir: P, data_dir: Q, index_name: &str) -> Result<Router> {
    let searcher = Searcher::open(index_dir, index_name, data_dir, Arc::new(EnglishNormalizer))?;
    tracing::info!(docs = searcher.document_count(), terms = searcher.term_id_map().len(), "index loaded");
    Ok(router(Arc::new(searcher)))
}

pub fn router(searcher: Arc<Searcher>) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc", get(doc_handler))
        .with_state(AppState { searcher })
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let start = std::time::Instant::now();
    let k = params.k.min(MAX_K);
    let page = params.page.max(1);
    let page_size = params.page_size.clamp(1, 100);

    let hits = state
        .searcher
        .retrieve(&params.q, k, params.mode)
        .map_err(|e| error_response(&e))?;
    let total_hits = hits.len();

    let results = hits
        .into_iter()
        .enumerate()
        .skip((page - 1).saturating_mul(page_size))
        .take(page_size)
        .map(|(i, (score, doc_key))| {
            let preview = state.searcher.document_content(&doc_key).ok().map(|text| preview(&text));
            SearchHit { rank: i + 1, score, doc_key, preview }
        })
        .collect();

    let elapsed = start.elapsed();
    Ok(Json(SearchResponse {
        query: params.q,
        mode: params.mode,
        took_s: elapsed.as_secs_f64(),
        total_hits,
        page,
        page_size,
        results,
    }))
}

pub async fn doc_handler(
    State(state): State<AppState>,
    Query(params): Query<DocParams>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let text = state.searcher.document_content(&params.key).map_err(|e| error_response(&e))?;
    Ok(Json(serde_json::json!({ "doc_key": params.key, "text": text })))
}

fn error_response(err: &IndexError) -> (StatusCode, String) {
    let status = match err {
        IndexError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        IndexError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "request failed");
    }
    (status, err.to_string())
}

/// First `PREVIEW_CHARS` characters, marked when cut.
fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{} ...", &text[..cut]),
        None => text.to_string(),
    }
}
