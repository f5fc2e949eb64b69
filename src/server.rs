use crate::config::AppConfig;
use crate::data;
use crate::select::{self, RenderRequest};
use crate::types::{ColorScale, GeoBoundary, HviTable, RenderOutcome, VizMode};
use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::info;

pub struct AppState {
    pub table: Arc<HviTable>,
    pub boundary: Option<Arc<GeoBoundary>>,
    pub config: AppConfig,
}

#[derive(Deserialize)]
pub struct RenderParams {
    mode: Option<String>,
    scale: Option<String>,
    low: Option<u8>,
    high: Option<u8>,
}

#[derive(Deserialize)]
pub struct ExportParams {
    low: Option<u8>,
    high: Option<u8>,
}

#[derive(Serialize)]
pub struct StatsResponse {
    records: usize,
    max_hvi: u8,
    /// Zip codes at hvi 4 or above, the "high risk" count the sidebar shows.
    high_risk_zipcodes: usize,
}

pub async fn start_server(
    config: AppConfig,
    table: Arc<HviTable>,
    boundary: Option<Arc<GeoBoundary>>,
) -> Result<()> {
    let port = config.server.port;
    let static_dir = config.server.static_dir.clone();
    let state = Arc::new(AppState {
        table,
        boundary,
        config,
    });

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("starting server on http://{}", addr);

    let app = Router::new()
        .route("/api/render", get(render_handler))
        .route("/api/stats", get(stats_handler))
        .route("/api/export", get(export_handler))
        .nest_service("/", ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn render_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RenderParams>,
) -> Result<Json<RenderOutcome>, Response> {
    let request = parse_request(&params).map_err(bad_request)?;
    let outcome = select::select(
        &state.table,
        state.boundary.as_ref(),
        &request,
        &state.config.map,
    );
    Ok(Json(outcome))
}

async fn stats_handler(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let table = &state.table;
    Json(StatsResponse {
        records: table.records.len(),
        max_hvi: table.max_hvi().unwrap_or(5),
        high_risk_zipcodes: table.records.iter().filter(|r| r.hvi >= 4).count(),
    })
}

/// Streams the currently filtered table as a CSV attachment, the data path
/// behind the dashboard's download button.
async fn export_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ExportParams>,
) -> Result<Response, Response> {
    let table = &state.table;
    let low = params.low.unwrap_or_else(|| table.min_hvi().unwrap_or(1));
    let high = params.high.unwrap_or_else(|| table.max_hvi().unwrap_or(5));
    let filtered = table.filter(low, high);

    let bytes = data::table_to_csv(&filtered).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("export failed: {:#}", e),
        )
            .into_response()
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"nyc_heat_vulnerability_filtered.csv\"".to_string(),
            ),
        ],
        bytes,
    )
        .into_response())
}

fn parse_request(params: &RenderParams) -> Result<RenderRequest, String> {
    let mode = match &params.mode {
        Some(s) => s.parse::<VizMode>()?,
        None => VizMode::Choropleth,
    };
    let color_scale = match &params.scale {
        Some(s) => s.parse::<ColorScale>()?,
        None => ColorScale::Reds,
    };
    Ok(RenderRequest {
        mode,
        color_scale,
        low: params.low,
        high: params.high,
    })
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, message).into_response()
}
