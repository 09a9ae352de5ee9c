//! HTTP adapter for the dashboard.
//!
//! Routes:
//! - `GET /`                         dashboard page (`?grade=`)
//! - `GET /api/grades`               dropdown options
//! - `GET /api/charts`               all five outcomes as JSON (`?grade=`)
//! - `GET /api/charts/:chart`        one chart as SVG, e.g. `/api/charts/loan-int.svg`
//! - `GET /api/health`               liveness
//!
//! The store is synchronous, so every store-touching handler runs its cycle on
//! the blocking pool.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::app::pipeline::{derive_chart, grade_options, resolve_grade, update_charts};
use crate::data::LoanStore;
use crate::domain::{ChartId, DashboardCharts, DashboardConfig, GradeOption};
use crate::error::{AppError, ErrorKind};
use crate::plot::{render_chart_svg, DEFAULT_HEIGHT, DEFAULT_WIDTH};

pub mod page;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<dyn LoanStore>,
    pub config: Arc<DashboardConfig>,
}

impl AppContext {
    pub fn new(store: Arc<dyn LoanStore>, config: DashboardConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct GradeQuery {
    pub grade: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// `AppError` as an HTTP response: `{ "error": message }` with a status per kind.
pub struct ApiError(AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.kind());
        if status.is_server_error() {
            error!(kind = ?self.0.kind(), error = %self.0, "request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.message().to_string(),
            }),
        )
            .into_response()
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::NoData => StatusCode::NOT_FOUND,
        ErrorKind::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Query | ErrorKind::Render | ErrorKind::Io | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/", get(dashboard_page))
        .route("/api/grades", get(api_grades))
        .route("/api/charts", get(api_charts))
        .route("/api/charts/:chart", get(api_chart_svg))
        .route("/api/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Bind `host:port` and serve until the process is stopped.
pub async fn serve(ctx: AppContext) -> Result<(), AppError> {
    let addr = format!("{}:{}", ctx.config.host, ctx.config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::new(ErrorKind::Io, format!("Failed to bind {addr}: {e}")))?;

    info!(
        %addr,
        db = %ctx.config.db_path.display(),
        table = %ctx.config.table,
        debug = ctx.config.debug,
        "loan dashboard listening on http://{addr}/"
    );

    axum::serve(listener, router(ctx))
        .await
        .map_err(|e| AppError::new(ErrorKind::Io, format!("Server error: {e}")))
}

/// Run `f` against the store on the blocking pool.
async fn with_store<T, F>(ctx: &AppContext, f: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce(&dyn LoanStore) -> Result<T, AppError> + Send + 'static,
{
    let store = Arc::clone(&ctx.store);
    tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .map_err(|e| AppError::new(ErrorKind::Internal, format!("Dashboard worker failed: {e}")))?
}

/// Runs one full cycle and renders the page, SVGs included, off the async
/// workers. A failed cycle still returns the page with an error banner.
async fn dashboard_page(State(ctx): State<AppContext>, Query(q): Query<GradeQuery>) -> Html<String> {
    let selected = q.grade.filter(|g| !g.trim().is_empty());
    let config = Arc::clone(&ctx.config);
    let requested = selected.clone();

    let result = with_store(&ctx, move |store| {
        let options = grade_options(store)?;
        let charts = update_charts(store, requested.as_deref())?;
        Ok(page::render_dashboard(&page::DashboardView {
            options: &options,
            selected: requested.as_deref(),
            charts: Some(&charts),
            banner: None,
            table: &config.table,
        }))
    })
    .await;

    let body = result.unwrap_or_else(|err| {
        error!(kind = ?err.kind(), error = %err, "dashboard cycle failed");
        page::render_dashboard(&page::DashboardView {
            options: &[],
            selected: selected.as_deref(),
            charts: None,
            banner: Some(err.message()),
            table: &ctx.config.table,
        })
    });

    Html(body)
}

async fn api_grades(State(ctx): State<AppContext>) -> Result<Json<Vec<GradeOption>>, ApiError> {
    let options = with_store(&ctx, grade_options).await?;
    Ok(Json(options))
}

async fn api_charts(
    State(ctx): State<AppContext>,
    Query(q): Query<GradeQuery>,
) -> Result<Json<DashboardCharts>, ApiError> {
    let charts = with_store(&ctx, move |store| update_charts(store, q.grade.as_deref())).await?;
    Ok(Json(charts))
}

async fn api_chart_svg(
    State(ctx): State<AppContext>,
    Path(chart): Path<String>,
    Query(q): Query<GradeQuery>,
) -> Result<Response, ApiError> {
    let slug = chart.strip_suffix(".svg").unwrap_or(&chart);
    let id = ChartId::from_slug(slug)
        .ok_or_else(|| AppError::invalid_input(format!("Unknown chart '{chart}'.")))?;

    let svg = with_store(&ctx, move |store| {
        let grade = resolve_grade(store, q.grade.as_deref())?;
        let spec = derive_chart(store, id, &grade)?;
        render_chart_svg(&spec, DEFAULT_WIDTH, DEFAULT_HEIGHT)
    })
    .await?;

    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
