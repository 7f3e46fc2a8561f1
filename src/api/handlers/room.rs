//! Room management handlers: create, list, get, join, leave, ready,
//! start, update, blacklist.
//!
//! The caller's identity arrives in the `x-member-id` header, placed
//! there by the upstream authentication layer. Membership mutations
//! return `204 No Content`; errors use the structured error body.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    CreateRoomRequest, JoinRoomParams, LeaveWithIdParams, RoomResponse, UpdateRoomRequest,
};
use crate::app_state::AppState;
use crate::domain::{MemberId, RoomId};
use crate::error::{ErrorResponse, GatewayError};

/// Extracts the validated caller identity from the `x-member-id` header.
fn caller(headers: &HeaderMap) -> Result<MemberId, GatewayError> {
    headers
        .get("x-member-id")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(MemberId::from)
        .ok_or_else(|| GatewayError::Validation("missing x-member-id header".to_string()))
}

/// `POST /rooms` — Create a new quiz room.
///
/// # Errors
///
/// Returns [`GatewayError`] on invalid settings.
#[utoipa::path(
    post,
    path = "/api/v1/rooms",
    tag = "Rooms",
    summary = "Create a room",
    description = "Creates a room in WAITING state with the caller as owner and sole player. A password makes the room private and must be exactly four digits.",
    request_body = CreateRoomRequest,
    responses(
        (status = 201, description = "Room created", body = RoomResponse),
        (status = 400, description = "Invalid settings", body = ErrorResponse),
    )
)]
pub async fn create_room(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateRoomRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let owner = caller(&headers)?;
    let room = state.room_service.create(owner, req.into()).await?;
    Ok((StatusCode::CREATED, Json(RoomResponse::from(&room))))
}

/// `GET /rooms` — List all active rooms.
///
/// # Errors
///
/// Returns [`GatewayError`] on store failures.
#[utoipa::path(
    get,
    path = "/api/v1/rooms",
    tag = "Rooms",
    summary = "List active rooms",
    description = "Returns every active room for the lobby view.",
    responses(
        (status = 200, description = "Active rooms", body = Vec<RoomResponse>),
    )
)]
pub async fn list_rooms(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, GatewayError> {
    let rooms = state.room_service.list_active().await?;
    let responses: Vec<RoomResponse> = rooms.iter().map(RoomResponse::from).collect();
    Ok(Json(responses))
}

/// `GET /rooms/{id}` — Get one room.
///
/// # Errors
///
/// Returns [`GatewayError::RoomNotFound`] when absent.
#[utoipa::path(
    get,
    path = "/api/v1/rooms/{id}",
    tag = "Rooms",
    summary = "Get room details",
    description = "Returns one room for lobby partial refresh.",
    params(("id" = uuid::Uuid, Path, description = "Room UUID")),
    responses(
        (status = 200, description = "Room details", body = RoomResponse),
        (status = 404, description = "Room not found", body = ErrorResponse),
    )
)]
pub async fn get_room(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    let room = state.room_service.get(RoomId::from_uuid(id)).await?;
    Ok(Json(RoomResponse::from(&room)))
}

/// `POST /rooms/{id}/join` — Join a room.
///
/// # Errors
///
/// Returns [`GatewayError`] on blacklist, capacity, or password
/// failures.
#[utoipa::path(
    post,
    path = "/api/v1/rooms/{id}/join",
    tag = "Rooms",
    summary = "Join a room",
    description = "Adds the caller to the room. Private rooms require the password query parameter.",
    params(
        ("id" = uuid::Uuid, Path, description = "Room UUID"),
        ("password" = Option<String>, Query, description = "Password for private rooms"),
    ),
    responses(
        (status = 204, description = "Joined"),
        (status = 403, description = "Blacklisted or wrong password", body = ErrorResponse),
        (status = 422, description = "Room full", body = ErrorResponse),
    )
)]
pub async fn join_room(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    Query(params): Query<JoinRoomParams>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, GatewayError> {
    let member = caller(&headers)?;
    state
        .room_service
        .join(RoomId::from_uuid(id), member, params.password.as_deref())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /rooms/{id}/leave` — Leave a room.
///
/// # Errors
///
/// Returns [`GatewayError::NotMember`] if the caller is not in the room.
#[utoipa::path(
    post,
    path = "/api/v1/rooms/{id}/leave",
    tag = "Rooms",
    summary = "Leave a room",
    description = "Removes the caller. Ownership transfers to the earliest-joined remaining member; an emptied room is deleted.",
    params(("id" = uuid::Uuid, Path, description = "Room UUID")),
    responses(
        (status = 204, description = "Left"),
        (status = 404, description = "Room not found", body = ErrorResponse),
    )
)]
pub async fn leave_room(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, GatewayError> {
    let member = caller(&headers)?;
    state.room_service.leave(RoomId::from_uuid(id), member).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /rooms/{id}/leave-with-id` — Leave with an explicit member id,
/// used by browser-close and refresh cleanup where no session header is
/// available.
///
/// # Errors
///
/// Returns [`GatewayError::NotMember`] if the member is not in the room.
#[utoipa::path(
    post,
    path = "/api/v1/rooms/{id}/leave-with-id",
    tag = "Rooms",
    summary = "Leave a room by member id",
    params(
        ("id" = uuid::Uuid, Path, description = "Room UUID"),
        ("user_id" = String, Query, description = "Member identity leaving the room"),
    ),
    responses(
        (status = 204, description = "Left"),
        (status = 404, description = "Room not found", body = ErrorResponse),
    )
)]
pub async fn leave_room_with_id(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    Query(params): Query<LeaveWithIdParams>,
) -> Result<impl IntoResponse, GatewayError> {
    state
        .room_service
        .leave(RoomId::from_uuid(id), MemberId::from(params.user_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /rooms/{id}/ready` — Toggle the caller's ready flag.
///
/// # Errors
///
/// Returns [`GatewayError::NotMember`] if the caller is not in the room.
#[utoipa::path(
    post,
    path = "/api/v1/rooms/{id}/ready",
    tag = "Rooms",
    summary = "Toggle ready state",
    description = "Flips the caller's ready flag. Owners are implicitly ready; for them this is a no-op.",
    params(("id" = uuid::Uuid, Path, description = "Room UUID")),
    responses(
        (status = 204, description = "Toggled"),
        (status = 404, description = "Room not found", body = ErrorResponse),
    )
)]
pub async fn toggle_ready(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, GatewayError> {
    let member = caller(&headers)?;
    state
        .room_service
        .toggle_ready(RoomId::from_uuid(id), member)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /rooms/{id}/start` — Start the game.
///
/// # Errors
///
/// Returns [`GatewayError`] unless the caller owns the room and every
/// non-owner player is ready.
#[utoipa::path(
    post,
    path = "/api/v1/rooms/{id}/start",
    tag = "Rooms",
    summary = "Start the game",
    description = "Owner only. Fails unless every non-owner player is ready; a player leaving during the start surfaces as a 422.",
    params(("id" = uuid::Uuid, Path, description = "Room UUID")),
    responses(
        (status = 204, description = "Game started"),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 422, description = "Not all players ready", body = ErrorResponse),
    )
)]
pub async fn start_game(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, GatewayError> {
    let member = caller(&headers)?;
    state.room_service.start(RoomId::from_uuid(id), member).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /rooms/{id}` — Update room settings (owner only).
///
/// # Errors
///
/// Returns [`GatewayError::NotOwner`] for non-owners and
/// [`GatewayError::Validation`] on bad fields.
#[utoipa::path(
    put,
    path = "/api/v1/rooms/{id}",
    tag = "Rooms",
    summary = "Update room settings",
    description = "Owner only; only present fields overwrite. Requesting privacy without a password keeps the room public and emits a warning event.",
    params(("id" = uuid::Uuid, Path, description = "Room UUID")),
    request_body = UpdateRoomRequest,
    responses(
        (status = 200, description = "Updated room", body = RoomResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
    )
)]
pub async fn update_room(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    headers: HeaderMap,
    Json(req): Json<UpdateRoomRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let member = caller(&headers)?;
    let room = state
        .room_service
        .update(RoomId::from_uuid(id), member, req.into())
        .await?;
    Ok(Json(RoomResponse::from(&room)))
}

/// `POST /rooms/{id}/blacklist/{member_id}` — Blacklist a member
/// (owner only).
///
/// # Errors
///
/// Returns [`GatewayError::NotOwner`] for non-owners.
#[utoipa::path(
    post,
    path = "/api/v1/rooms/{id}/blacklist/{member_id}",
    tag = "Rooms",
    summary = "Blacklist a member",
    description = "Owner only. The target is ejected from the room and barred from rejoining.",
    params(
        ("id" = uuid::Uuid, Path, description = "Room UUID"),
        ("member_id" = String, Path, description = "Member to blacklist"),
    ),
    responses(
        (status = 204, description = "Blacklisted"),
        (status = 403, description = "Not the owner", body = ErrorResponse),
    )
)]
pub async fn blacklist_member(
    State(state): State<AppState>,
    Path((id, member_id)): Path<(uuid::Uuid, String)>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, GatewayError> {
    let member = caller(&headers)?;
    state
        .room_service
        .add_to_blacklist(RoomId::from_uuid(id), member, MemberId::from(member_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Room routes mounted under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/rooms", post(create_room).get(list_rooms))
        .route("/rooms/{id}", get(get_room).put(update_room))
        .route("/rooms/{id}/join", post(join_room))
        .route("/rooms/{id}/leave", post(leave_room))
        .route("/rooms/{id}/leave-with-id", post(leave_room_with_id))
        .route("/rooms/{id}/ready", post(toggle_ready))
        .route("/rooms/{id}/start", post(start_game))
        .route("/rooms/{id}/blacklist/{member_id}", post(blacklist_member))
}
