//! JSON API consumed by the chart front end.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use wdi_db::{
    group_by_country, pivot_wide, Country, CountrySeries, Indicator, IndicatorPoint,
    IndicatorQuery, IndicatorRepository, QueryError, RepoError, WideTable,
};
use wdi_telemetry::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn IndicatorRepository>,
    pub metrics: Metrics,
}

/// Query string of the series endpoints.
#[derive(Debug, Deserialize)]
pub struct SeriesParams {
    /// Comma-separated ISO3 codes.
    pub countries: String,
    pub indicator: String,
    pub from: i32,
    pub to: i32,
    #[serde(default)]
    pub drop_missing: bool,
}

impl SeriesParams {
    fn to_query(&self) -> Result<IndicatorQuery, QueryError> {
        let countries = self
            .countries
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty());
        Ok(IndicatorQuery::new(countries, &self.indicator, self.from, self.to)?
            .drop_missing(self.drop_missing))
    }
}

#[derive(Debug, Serialize)]
pub struct SeriesResponse {
    pub rows: Vec<IndicatorPoint>,
    pub series: Vec<CountrySeries>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Failure of an API request.
#[derive(Debug)]
pub enum ApiFailure {
    BadRequest(QueryError),
    Repo(RepoError),
}

impl From<QueryError> for ApiFailure {
    fn from(err: QueryError) -> Self {
        ApiFailure::BadRequest(err)
    }
}

impl From<RepoError> for ApiFailure {
    fn from(err: RepoError) -> Self {
        ApiFailure::Repo(err)
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiFailure::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiFailure::Repo(RepoError::Connectivity(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiFailure::Repo(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match self {
            ApiFailure::BadRequest(e) => e.to_string(),
            ApiFailure::Repo(e) => {
                error!("Request failed: {}", e);
                e.to_string()
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

async fn series_handler(
    State(state): State<AppState>,
    Query(params): Query<SeriesParams>,
) -> Result<Json<SeriesResponse>, ApiFailure> {
    let query = params.to_query()?;
    let rows = state.repo.fetch(&query).await?;
    let series = group_by_country(&rows);
    Ok(Json(SeriesResponse { rows, series }))
}

async fn wide_handler(
    State(state): State<AppState>,
    Query(params): Query<SeriesParams>,
) -> Result<Json<WideTable>, ApiFailure> {
    let query = params.to_query()?;
    let rows = state.repo.fetch(&query).await?;
    Ok(Json(pivot_wide(&rows)))
}

async fn countries_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<Country>>, ApiFailure> {
    Ok(Json(state.repo.countries().await?))
}

async fn indicators_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<Indicator>>, ApiFailure> {
    Ok(Json(state.repo.indicators().await?))
}

async fn metrics_handler(State(state): State<AppState>) -> Result<impl IntoResponse, StatusCode> {
    match state.metrics.gather() {
        Ok(body) => Ok((StatusCode::OK, body)),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

async fn health_handler() -> &'static str {
    "ok"
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/series", get(series_handler))
        .route("/api/series/wide", get(wide_handler))
        .route("/api/countries", get(countries_handler))
        .route("/api/indicators", get(indicators_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the API until Ctrl-C.
pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API server listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    info!("API server stopped");
    Ok(())
}
