use crate::config::AppConfig;
use crate::data::load_dataset;
use crate::error::ExportError;
use crate::fetch::Retriever;
use crate::locator::require_map_id;
use crate::processing::Viewport;
use crate::session::{ExportOptions, SessionStore, SessionSummary};
use crate::types::BoundingBox;
use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

const INDEX_HTML: &str = include_str!("../static/index.html");
const SESSION_COOKIE: &str = "mymaps_session";

pub struct AppState {
    pub config: AppConfig,
    pub retriever: Retriever,
    pub sessions: SessionStore,
}

#[derive(Deserialize)]
pub struct LoadRequest {
    url: String,
}

#[derive(Deserialize)]
pub struct LayerUpdate {
    visible: Option<bool>,
    color: Option<String>,
}

/// Viewport bounds as reported by the map widget; any side may be missing.
#[derive(Debug, Deserialize, Default)]
pub struct ReportedBounds {
    north: Option<f64>,
    south: Option<f64>,
    east: Option<f64>,
    west: Option<f64>,
}

#[derive(Deserialize)]
pub struct ExportRequest {
    bounds: Option<ReportedBounds>,
    #[serde(default)]
    include_all: bool,
    include_csv: Option<bool>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ExportError {
    fn into_response(self) -> Response {
        let status = match &self {
            ExportError::Input(_) | ExportError::Config(_) => StatusCode::BAD_REQUEST,
            ExportError::Fetch(_) => StatusCode::BAD_GATEWAY,
            ExportError::Format(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ExportError::NoVisibleData => StatusCode::NOT_FOUND,
            ExportError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!("Request failed: {}", self);
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/load", post(load_handler))
        .route("/api/layers", get(layers_handler))
        .route("/api/layers/:name", put(update_layer_handler))
        .route("/api/export", post(export_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: AppConfig) -> Result<()> {
    let state = Arc::new(AppState {
        retriever: Retriever::new(&config.fetch)?,
        sessions: SessionStore::new(config.render.default_color),
        config: config.clone(),
    });

    let addr = SocketAddr::from(([127, 0, 0, 1], config.server.port));
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// The caller's session id from the `Cookie` header, if any.
fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == SESSION_COOKIE)
        .map(|(_, value)| value)
}

fn set_session_cookie(id: &str) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Strict", SESSION_COOKIE, id)
}

async fn load_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<LoadRequest>,
) -> Result<Response, ExportError> {
    let map_id = require_map_id(&req.url)?.to_string();
    let raw = state.retriever.fetch(&map_id).await?;
    let extraction = load_dataset(&raw.bytes, raw.content_type.as_deref())?;

    let (id, summary) = state
        .sessions
        .load(session_cookie(&headers), Some(map_id), extraction);
    Ok(([(header::SET_COOKIE, set_session_cookie(&id))], Json(summary)).into_response())
}

async fn layers_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<SessionSummary> {
    Json(state.sessions.summary(session_cookie(&headers)))
}

async fn update_layer_handler(
    Path(name): Path<String>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(update): Json<LayerUpdate>,
) -> Result<Json<SessionSummary>, ExportError> {
    let summary = state.sessions.with_session(session_cookie(&headers), |session| {
        session.update_layer(&name, update.visible, update.color.as_deref())?;
        Ok(session.summary())
    })?;
    Ok(Json(summary))
}

async fn export_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ExportRequest>,
) -> Result<Response, ExportError> {
    let viewport = resolve_viewport(req.bounds.as_ref(), req.include_all)?;

    let mut options = ExportOptions::from_config(&state.config);
    if let Some(include_csv) = req.include_csv {
        options.include_csv = include_csv;
    }

    let bundle = state
        .sessions
        .with_session(session_cookie(&headers), |session| session.export(&viewport, &options))?;
    info!(
        "Exported {} points across {} layers",
        bundle.point_count,
        bundle.layers.len()
    );

    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", state.config.output.archive_name),
        ),
    ];
    Ok((headers, bundle.archive).into_response())
}

/// Turn what the browser sent into a [`Viewport`].
pub fn resolve_viewport(bounds: Option<&ReportedBounds>, include_all: bool) -> Result<Viewport, ExportError> {
    if include_all {
        return Ok(Viewport::IncludeAll);
    }
    let bounds = bounds.ok_or_else(|| {
        ExportError::Input("zoom or move the map to activate export".to_string())
    })?;
    match (bounds.west, bounds.east, bounds.south, bounds.north) {
        (Some(west), Some(east), Some(south), Some(north)) => {
            Ok(Viewport::Within(BoundingBox::new(west, east, south, north)?))
        }
        _ => Err(ExportError::Input(
            "incomplete map bounds, try zooming or panning again".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn include_all_needs_no_bounds() {
        assert_eq!(resolve_viewport(None, true).unwrap(), Viewport::IncludeAll);
    }

    #[test]
    fn missing_bounds_ask_user_to_move_map() {
        match resolve_viewport(None, false) {
            Err(ExportError::Input(msg)) => assert!(msg.contains("zoom or move")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn partial_bounds_are_rejected() {
        let partial = ReportedBounds { north: Some(1.0), south: Some(0.0), east: None, west: Some(0.0) };
        assert!(matches!(
            resolve_viewport(Some(&partial), false),
            Err(ExportError::Input(_))
        ));
    }

    #[test]
    fn complete_bounds_become_a_box() {
        let bounds: ReportedBounds =
            serde_json::from_str(r#"{"north": -30, "south": -40, "east": 155, "west": 140}"#).unwrap();
        assert_eq!(
            resolve_viewport(Some(&bounds), false).unwrap(),
            Viewport::Within(BoundingBox { west: 140.0, east: 155.0, south: -40.0, north: -30.0 })
        );
    }

    #[test]
    fn antimeridian_bounds_are_a_config_error() {
        let bounds = ReportedBounds { north: Some(10.0), south: Some(0.0), east: Some(-170.0), west: Some(170.0) };
        assert!(matches!(
            resolve_viewport(Some(&bounds), false),
            Err(ExportError::Config(_))
        ));
    }

    #[test]
    fn errors_map_to_status_codes() {
        let status = |e: ExportError| e.into_response().status();
        assert_eq!(status(ExportError::Input("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(ExportError::Fetch("x".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status(crate::error::FormatError::NoPoints.into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status(ExportError::NoVisibleData), StatusCode::NOT_FOUND);
        assert_eq!(status(ExportError::Io("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn reads_session_id_from_cookie_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_cookie(&headers), None);

        headers.insert(
            header::COOKIE,
            "theme=dark; mymaps_session=abc123; other=1".parse().unwrap(),
        );
        assert_eq!(session_cookie(&headers), Some("abc123"));
    }

    #[test]
    fn session_cookie_round_trips_through_set_cookie() {
        let mut headers = HeaderMap::new();
        let set = set_session_cookie("deadbeef");
        let pair = set.split(';').next().unwrap().to_string();
        headers.insert(header::COOKIE, pair.parse().unwrap());
        assert_eq!(session_cookie(&headers), Some("deadbeef"));
        assert!(set.contains("HttpOnly"));
    }

    #[test]
    fn router_builds() {
        let config = AppConfig::default();
        let state = Arc::new(AppState {
            retriever: Retriever::new(&config.fetch).unwrap(),
            sessions: SessionStore::new(None),
            config,
        });
        let _ = router(state);
    }
}
