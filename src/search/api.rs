//! HTTP surface of the search service.

use crate::config::Config;
use crate::search::engine;
use crate::store::Store;
use crate::words::WordFilter;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone)]
pub struct ApiState {
    store: Arc<Store>,
    filter: Arc<WordFilter>,
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: Option<String>,
}

/// One entry of the JSON response body.
#[derive(Debug, Serialize)]
struct SearchResult {
    url: String,
    title: String,
    description: String,
    score: f64,
}

fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(search_handler))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn search_handler(
    State(state): State<ApiState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Response {
    let query = match params {
        Ok(Query(SearchParams { q: Some(q) })) if !q.trim().is_empty() => q,
        Ok(_) => return (StatusCode::BAD_REQUEST, "No query provided").into_response(),
        Err(rejection) => {
            tracing::warn!(error = %rejection, "rejected malformed query string");
            return (StatusCode::BAD_REQUEST, "Invalid query").into_response();
        }
    };

    match engine::search(&state.store, &state.filter, &query).await {
        Ok(pages) => {
            let results: Vec<SearchResult> = pages
                .into_iter()
                .map(|page| SearchResult {
                    url: page.url,
                    title: page.title.unwrap_or_default(),
                    description: page.description.unwrap_or_default(),
                    score: page.score,
                })
                .collect();
            Json(results).into_response()
        }
        Err(error) => {
            tracing::error!(%error, query = %query, "search failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Search is temporarily unavailable",
            )
                .into_response()
        }
    }
}

/// Run the search API until interrupted.
pub async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let store = Store::connect(&config.database_url).await?;
    store.ensure_schema().await?;

    let state = ApiState {
        store: Arc::new(store),
        filter: Arc::new(config.word_filter()),
    };

    let listener = tokio::net::TcpListener::bind(&config.listen_address).await?;
    tracing::info!(address = %config.listen_address, "search API listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(crate::crawler::shutdown_signal())
        .await?;

    tracing::info!("search API stopped");
    Ok(())
}
