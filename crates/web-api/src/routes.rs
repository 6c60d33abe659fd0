use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        ws::WebSocketUpgrade,
        Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use application::{
    CandidatePage, CrossedPathDto, DiscoverRequest, MatchDto, MessageDto, PingSummary,
    PublicProfile, RecordSwipeRequest, SendMessageRequest, SwipeOutcome,
};
use domain::{GeoPoint, SwipeAction};

use crate::{error::ApiError, state::AppState, ws_connection::WebSocketConnection};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiscoverQuery {
    lat: f64,
    lng: f64,
    max_distance_km: Option<f64>,
    gender: Option<String>,
    /// 逗号分隔的兴趣标签
    interests: Option<String>,
    limit: Option<u32>,
    skip: Option<u32>,
}

impl DiscoverQuery {
    fn into_request(self, viewer: Uuid) -> Result<DiscoverRequest, ApiError> {
        let location = GeoPoint::new(self.lng, self.lat).map_err(application::ApplicationError::from)?;
        let mut request = DiscoverRequest::new(viewer, location);
        request.max_distance_km = self.max_distance_km;
        request.gender = self.gender.filter(|gender| !gender.trim().is_empty());
        request.interests = self
            .interests
            .map(|raw| split_tags(&raw))
            .unwrap_or_default();
        request.limit = self.limit;
        request.skip = self.skip;
        Ok(request)
    }
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_owned)
        .collect()
}

#[derive(Debug, Deserialize)]
struct SwipePayload {
    action: String,
    source: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PingPayload {
    coordinates: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct CrossedPathsQuery {
    since: Option<String>,
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SendMessagePayload {
    content: String,
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    online_users: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(websocket_upgrade))
        .nest("/api/v1", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/discover", get(discover))
        .route("/queue", get(queue))
        .route("/swipe/{user_id}", post(record_swipe))
        .route("/likes/pending", get(pending_likes))
        .route("/matches", get(list_matches))
        .route("/location/ping", post(ping_location))
        .route("/crossed-paths", get(crossed_paths))
        .route(
            "/matches/{match_id}/messages",
            post(send_message).get(list_messages),
        )
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        online_users: state.registry.online_count().await,
    })
}

async fn discover(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<DiscoverQuery>, QueryRejection>,
) -> Result<Json<CandidatePage>, ApiError> {
    let viewer = state.jwt_service.extract_user_from_headers(&headers)?;
    let Query(query) = query?;

    let page = state
        .proximity_service
        .discover(query.into_request(viewer)?)
        .await?;
    Ok(Json(page))
}

async fn queue(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<DiscoverQuery>, QueryRejection>,
) -> Result<Json<CandidatePage>, ApiError> {
    let viewer = state.jwt_service.extract_user_from_headers(&headers)?;
    let Query(query) = query?;

    let page = state
        .proximity_service
        .next_in_queue(query.into_request(viewer)?)
        .await?;
    Ok(Json(page))
}

async fn record_swipe(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(to_user): Path<Uuid>,
    payload: Result<Json<SwipePayload>, JsonRejection>,
) -> Result<(StatusCode, Json<SwipeOutcome>), ApiError> {
    let from_user = state.jwt_service.extract_user_from_headers(&headers)?;
    let Json(payload) = payload?;
    let action: SwipeAction = payload
        .action
        .parse()
        .map_err(application::ApplicationError::from)?;

    let outcome = state
        .swipe_service
        .record_swipe(RecordSwipeRequest {
            from_user,
            to_user,
            action,
            source: payload.source.unwrap_or_default(),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn pending_likes(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<PublicProfile>>, ApiError> {
    let user = state.jwt_service.extract_user_from_headers(&headers)?;
    let profiles = state.swipe_service.mutual_interest_backlog(user).await?;
    Ok(Json(profiles))
}

async fn list_matches(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<MatchDto>>, ApiError> {
    let user = state.jwt_service.extract_user_from_headers(&headers)?;
    let matches = state.swipe_service.list_matches(user).await?;
    Ok(Json(matches))
}

async fn ping_location(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<PingPayload>, JsonRejection>,
) -> Result<Json<PingSummary>, ApiError> {
    let user = state.jwt_service.extract_user_from_headers(&headers)?;
    let Json(payload) = payload?;

    let summary = state
        .proximity_service
        .ping_location(user, &payload.coordinates)
        .await?;
    Ok(Json(summary))
}

async fn crossed_paths(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<CrossedPathsQuery>, QueryRejection>,
) -> Result<Json<Vec<CrossedPathDto>>, ApiError> {
    let user = state.jwt_service.extract_user_from_headers(&headers)?;
    let Query(query) = query?;

    let records = state
        .proximity_service
        .crossed_paths(user, query.since.as_deref(), query.limit)
        .await?;
    Ok(Json(records))
}

async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(match_id): Path<Uuid>,
    payload: Result<Json<SendMessagePayload>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageDto>), ApiError> {
    let sender_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let Json(payload) = payload?;

    let dto = state
        .message_service
        .send_message(SendMessageRequest {
            match_id,
            sender_id,
            content: payload.content,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(dto)))
}

async fn list_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(match_id): Path<Uuid>,
) -> Result<Json<Vec<MessageDto>>, ApiError> {
    let user = state.jwt_service.extract_user_from_headers(&headers)?;
    let messages = state.message_service.list_messages(match_id, user).await?;
    Ok(Json(messages))
}

async fn websocket_upgrade(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let user_id = state
        .jwt_service
        .extract_user(&headers, query.token.as_deref())?;

    Ok(ws.on_upgrade(move |socket| WebSocketConnection::new(socket, state, user_id).run()))
}
