//! Endpoints API REST de WebRadio
//!
//! Ce module expose chaque opération du service en JSON, plus le flux SSE
//! des événements publiés. Le router est monté sous `/api/webradio`.

use crate::error::Error;
use crate::events::{bridge, WebRadioEvent};
use crate::favorites::FavoriteEntry;
use crate::models::{ChannelMatch, StationInfo};
use crate::service::{PlaybackState, WebRadioService};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

pub type ApiState = Arc<WebRadioService>;

// ============ Gestion des erreurs ============

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::UnknownProfile(_) | Error::Configuration(_) => StatusCode::BAD_REQUEST,
            Error::Fetch { .. } | Error::Http(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!("API error: {}", err);
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

// ============ Corps des requêtes et réponses ============

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindRequest {
    #[serde(default)]
    pub query: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayRequest {
    pub uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResponse {
    pub stage: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EqualizerResponse {
    pub profiles: Vec<String>,
    pub current: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileBody {
    pub profile: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WishRequest {
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WishResponse {
    pub title: String,
    pub wished: bool,
}

/// Crée le router pour l'API WebRadio
pub fn create_router(service: ApiState) -> Router {
    Router::new()
        .route("/stations", get(get_stations))
        .route("/stations/{id}", get(get_station))
        .route("/find", post(find))
        .route("/tags", get(get_tags))
        .route("/stage", get(get_stage))
        .route("/state", get(get_state))
        .route("/stream_tags", get(get_stream_tags))
        .route("/play", post(play))
        .route("/pause", post(pause))
        .route("/resume", post(resume))
        .route("/quit", post(quit))
        .route("/equalizer", get(get_equalizer))
        .route("/equalizer/profile", get(get_profile).post(set_profile))
        .route("/favorites", get(get_favorites))
        .route("/wishlist", get(get_wishlist))
        .route("/wishlist/toggle", post(toggle_wish))
        .route("/events", get(events_sse))
        .with_state(service)
}

// ============================================================================
// Route Handlers
// ============================================================================

/// GET /api/webradio/stations
async fn get_stations(State(service): State<ApiState>) -> Json<Vec<StationInfo>> {
    Json(service.stations())
}

/// GET /api/webradio/stations/{id}
async fn get_station(
    State(service): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<StationInfo>, AppError> {
    service
        .catalog()
        .station(&id)
        .map(|station| Json(station.info()))
        .ok_or_else(|| AppError::not_found(format!("Unknown station: {id}")))
}

/// POST /api/webradio/find
async fn find(
    State(service): State<ApiState>,
    Json(request): Json<FindRequest>,
) -> Json<Vec<ChannelMatch>> {
    Json(service.find(request.query.as_slice()))
}

async fn get_tags(State(service): State<ApiState>) -> Json<Vec<String>> {
    Json(service.tags())
}

async fn get_stage(State(service): State<ApiState>) -> Json<StageResponse> {
    Json(StageResponse {
        stage: service.data_stage().as_u8(),
    })
}

async fn get_state(State(service): State<ApiState>) -> Json<PlaybackState> {
    Json(service.state())
}

async fn get_stream_tags(State(service): State<ApiState>) -> Json<BTreeMap<String, String>> {
    Json(service.stream_tags())
}

/// POST /api/webradio/play
async fn play(
    State(service): State<ApiState>,
    Json(request): Json<PlayRequest>,
) -> Result<StatusCode, AppError> {
    service.play(&request.uri)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn pause(State(service): State<ApiState>) -> Result<StatusCode, AppError> {
    service.pause()?;
    Ok(StatusCode::NO_CONTENT)
}

async fn resume(State(service): State<ApiState>) -> Result<StatusCode, AppError> {
    service.resume()?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/webradio/quit
/// Arrête la lecture et le serveur
async fn quit(State(service): State<ApiState>) -> StatusCode {
    service.quit();
    StatusCode::NO_CONTENT
}

async fn get_equalizer(State(service): State<ApiState>) -> Json<EqualizerResponse> {
    Json(EqualizerResponse {
        profiles: service.equalizer_profiles(),
        current: service.equalizer_profile(),
    })
}

async fn get_profile(State(service): State<ApiState>) -> Json<ProfileBody> {
    Json(ProfileBody {
        profile: service.equalizer_profile(),
    })
}

async fn set_profile(
    State(service): State<ApiState>,
    Json(body): Json<ProfileBody>,
) -> Result<Json<ProfileBody>, AppError> {
    service.set_equalizer_profile(&body.profile)?;
    Ok(Json(body))
}

async fn get_favorites(State(service): State<ApiState>) -> Json<Vec<FavoriteEntry>> {
    Json(service.favorites())
}

async fn get_wishlist(State(service): State<ApiState>) -> Json<Vec<String>> {
    Json(service.wishlist())
}

async fn toggle_wish(
    State(service): State<ApiState>,
    Json(request): Json<WishRequest>,
) -> Result<Json<WishResponse>, AppError> {
    let wished = service.toggle_wishlist(&request.title)?;
    Ok(Json(WishResponse {
        title: request.title,
        wished,
    }))
}

/// GET /api/webradio/events
///
/// Flux SSE des événements publiés, en JSON étiqueté par `type`.
async fn events_sse(State(service): State<ApiState>) -> impl IntoResponse {
    let mut rx = bridge(service.events().subscribe());

    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            let name = event_name(&event);
            if let Ok(json) = serde_json::to_string(&event) {
                yield Ok::<_, axum::Error>(Event::default().event(name).data(json));
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn event_name(event: &WebRadioEvent) -> &'static str {
    match event {
        WebRadioEvent::StationAdded { .. } => "station_added",
        WebRadioEvent::ChannelAdded { .. } => "channel_added",
        WebRadioEvent::DataStageChanged { .. } => "data_stage_changed",
        WebRadioEvent::StateChanged { .. } => "state_changed",
        WebRadioEvent::StreamTagsChanged { .. } => "stream_tags_changed",
    }
}
