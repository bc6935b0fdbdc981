// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Chat room endpoints.
//!
//! Every mutation and the transcript read go through
//! [`ResourceAccessPolicy`]: the room's author or an admin may proceed,
//! anyone else gets 403, and a missing or deleted room is 404.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;

use crate::{
    auth::Auth,
    error::ApiError,
    models::{
        ChatMessageResponse, CreateRoomRequest, PublicRoomDetailResponse, ReactionRequest,
        RoomResponse, TranscriptResponse, UpdateRoomSettingsRequest,
    },
    policy::{
        count_reactions, toggle_reaction, Action, DenyReason, ReactionCounts,
        ResourceAccessPolicy,
    },
    state::AppState,
    storage::{ResourceStore, ResourceType, RoomFilter, RoomTag, SortOrder},
};

/// Longest accepted room title, in characters.
const MAX_TITLE_CHARS: usize = 100;

/// Query parameters for room listings.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RoomListParams {
    /// Only rooms with this tag (`IN_PROGRESS`, `ADOPTED`, `REJECTED`, `CLOSED`)
    pub tag: Option<String>,
    /// `RECENT` (default) or `OLDEST`
    pub sort: Option<SortOrder>,
}

impl RoomListParams {
    pub(crate) fn into_filter(self) -> Result<RoomFilter, ApiError> {
        let tag = match self.tag.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(
                RoomTag::from_str(raw)
                    .ok_or_else(|| ApiError::bad_request(format!("Unknown room tag: {raw}")))?,
            ),
        };

        Ok(RoomFilter {
            tag,
            sort: self.sort.unwrap_or_default(),
            ..RoomFilter::default()
        })
    }
}

/// Query parameters for the public title search.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RoomSearchParams {
    /// Case-insensitive fragment of the room title
    pub query: Option<String>,
}

/// Create a chat room owned by the caller.
#[utoipa::path(
    post,
    path = "/v1/rooms",
    tag = "Rooms",
    request_body = CreateRoomRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Room created", body = RoomResponse),
        (status = 400, description = "Invalid title"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn create_room(
    Auth(identity): Auth,
    State(state): State<AppState>,
    Json(request): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<RoomResponse>), ApiError> {
    let title = request.title.trim();
    if title.is_empty() || title.chars().count() > MAX_TITLE_CHARS {
        return Err(ApiError::bad_request(format!(
            "Title must be between 1 and {MAX_TITLE_CHARS} characters"
        )));
    }

    let room = state
        .store
        .write()
        .await
        .insert_room(title.to_string(), identity.user_id);

    info!(user_id = identity.user_id, room_id = room.id, "room created");
    Ok((StatusCode::CREATED, Json(RoomResponse::from(&room))))
}

/// List public rooms.
#[utoipa::path(
    get,
    path = "/v1/rooms",
    tag = "Rooms",
    params(RoomListParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Public rooms", body = Vec<RoomResponse>),
        (status = 400, description = "Invalid filter"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_public_rooms(
    Auth(_identity): Auth,
    State(state): State<AppState>,
    Query(params): Query<RoomListParams>,
) -> Result<Json<Vec<RoomResponse>>, ApiError> {
    let filter = RoomFilter {
        public_only: true,
        ..params.into_filter()?
    };

    let rooms = state.store.read().await.list_rooms(&filter);
    Ok(Json(rooms.iter().map(RoomResponse::from).collect()))
}

/// Search public rooms by title, most recent first.
#[utoipa::path(
    get,
    path = "/v1/rooms/search",
    tag = "Rooms",
    params(RoomSearchParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Matching public rooms", body = Vec<RoomResponse>),
        (status = 400, description = "Missing query"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn search_public_rooms(
    Auth(_identity): Auth,
    State(state): State<AppState>,
    Query(params): Query<RoomSearchParams>,
) -> Result<Json<Vec<RoomResponse>>, ApiError> {
    let query = params.query.as_deref().map(str::trim).unwrap_or_default();
    if query.is_empty() {
        return Err(ApiError::bad_request("Search query is required"));
    }

    let filter = RoomFilter {
        public_only: true,
        title_contains: Some(query.to_string()),
        ..RoomFilter::default()
    };
    let rooms = state.store.read().await.list_rooms(&filter);
    Ok(Json(rooms.iter().map(RoomResponse::from).collect()))
}

/// List the caller's own rooms, public or not.
#[utoipa::path(
    get,
    path = "/v1/rooms/mine",
    tag = "Rooms",
    params(RoomListParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller's rooms", body = Vec<RoomResponse>),
        (status = 400, description = "Invalid filter"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_my_rooms(
    Auth(identity): Auth,
    State(state): State<AppState>,
    Query(params): Query<RoomListParams>,
) -> Result<Json<Vec<RoomResponse>>, ApiError> {
    let filter = RoomFilter {
        author_id: Some(identity.user_id),
        ..params.into_filter()?
    };

    let rooms = state.store.read().await.list_rooms(&filter);
    Ok(Json(rooms.iter().map(RoomResponse::from).collect()))
}

/// Public detail of a public room: messages and reaction counts.
///
/// Private rooms are reported as missing. Anonymous rooms hide their
/// author's messages' sender.
#[utoipa::path(
    get,
    path = "/v1/rooms/{room_id}",
    tag = "Rooms",
    params(("room_id" = u64, Path, description = "Room ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Room detail", body = PublicRoomDetailResponse),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Room not found or not public")
    )
)]
pub async fn public_room_detail(
    Auth(_identity): Auth,
    State(state): State<AppState>,
    Path(room_id): Path<u64>,
) -> Result<Json<PublicRoomDetailResponse>, ApiError> {
    let store = state.store.read().await;
    let room = store
        .find_room_if_active(room_id)
        .filter(|room| room.is_public)
        .ok_or(DenyReason::NotFound)?;

    let counts = count_reactions(&*store, room.id);
    let items = store
        .messages_for_room(room.id)
        .iter()
        .map(|message| ChatMessageResponse::public(message, &room))
        .collect();

    Ok(Json(PublicRoomDetailResponse {
        room_id: room.id,
        title: room.title,
        tag: room.tag,
        like_count: counts.like_count,
        dislike_count: counts.dislike_count,
        items,
        created_at: room.created_at,
    }))
}

/// Soft-delete a room.
#[utoipa::path(
    delete,
    path = "/v1/rooms/{room_id}",
    tag = "Rooms",
    params(("room_id" = u64, Path, description = "Room ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Room deleted"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not the room's author"),
        (status = 404, description = "Room not found")
    )
)]
pub async fn delete_room(
    Auth(identity): Auth,
    State(state): State<AppState>,
    Path(room_id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    let mut store = state.store.write().await;
    let mut room = ResourceAccessPolicy::new(&*store)
        .room(Some(&identity), room_id, Action::DeleteRoom)
        .map_err(|reason| ApiError::denied(reason, ResourceType::Room))?;

    room.is_deleted = true;
    room.updated_at = Utc::now();
    store.save_room(&room)?;

    info!(user_id = identity.user_id, room_id, "room deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Change a room's visibility settings.
///
/// Only possible once an admin has moved the room out of `IN_PROGRESS`.
#[utoipa::path(
    patch,
    path = "/v1/rooms/{room_id}/settings",
    tag = "Rooms",
    params(("room_id" = u64, Path, description = "Room ID")),
    request_body = UpdateRoomSettingsRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Updated room", body = RoomResponse),
        (status = 400, description = "Room is still in progress"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not the room's author"),
        (status = 404, description = "Room not found")
    )
)]
pub async fn update_room_settings(
    Auth(identity): Auth,
    State(state): State<AppState>,
    Path(room_id): Path<u64>,
    Json(request): Json<UpdateRoomSettingsRequest>,
) -> Result<Json<RoomResponse>, ApiError> {
    let mut store = state.store.write().await;
    let mut room = ResourceAccessPolicy::new(&*store)
        .room(Some(&identity), room_id, Action::UpdateSettings)
        .map_err(|reason| ApiError::denied(reason, ResourceType::Room))?;

    if !room.tag.is_terminal() {
        return Err(ApiError::bad_request(
            "Room settings can only change after the room has been tagged",
        ));
    }

    if let Some(is_anonymous) = request.is_anonymous {
        room.is_anonymous = is_anonymous;
    }
    if let Some(is_public) = request.is_public {
        room.is_public = is_public;
    }
    room.updated_at = Utc::now();
    store.save_room(&room)?;

    info!(
        user_id = identity.user_id,
        room_id,
        is_anonymous = room.is_anonymous,
        is_public = room.is_public,
        "room settings updated"
    );
    Ok(Json(RoomResponse::from(&room)))
}

/// Full transcript of a room, oldest message first.
#[utoipa::path(
    get,
    path = "/v1/rooms/{room_id}/messages",
    tag = "Rooms",
    params(("room_id" = u64, Path, description = "Room ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Transcript", body = TranscriptResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not the room's author"),
        (status = 404, description = "Room not found")
    )
)]
pub async fn get_transcript(
    Auth(identity): Auth,
    State(state): State<AppState>,
    Path(room_id): Path<u64>,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let store = state.store.read().await;
    let room = ResourceAccessPolicy::new(&*store)
        .room(Some(&identity), room_id, Action::ReadTranscript)
        .map_err(|reason| ApiError::denied(reason, ResourceType::Room))?;

    let items = store
        .messages_for_room(room.id)
        .iter()
        .map(ChatMessageResponse::from)
        .collect();

    Ok(Json(TranscriptResponse {
        room_id: room.id,
        title: room.title,
        items,
        created_at: room.created_at,
    }))
}

/// Toggle the caller's reaction on a public room.
///
/// Same kind again removes it; the other kind switches it.
#[utoipa::path(
    post,
    path = "/v1/rooms/{room_id}/reactions",
    tag = "Rooms",
    params(("room_id" = u64, Path, description = "Room ID")),
    request_body = ReactionRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Counts after the toggle", body = ReactionCounts),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Room not found or not public")
    )
)]
pub async fn toggle_room_reaction(
    Auth(identity): Auth,
    State(state): State<AppState>,
    Path(room_id): Path<u64>,
    Json(request): Json<ReactionRequest>,
) -> Result<Json<ReactionCounts>, ApiError> {
    let mut store = state.store.write().await;
    let (_, counts) = toggle_reaction(&mut *store, &identity, room_id, request.reaction_type)?;
    Ok(Json(counts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Identity, Role};
    use crate::state::testing::{seed_user, test_state};
    use crate::storage::ReactionKind;

    async fn room_for(state: &AppState, owner: &Identity, title: &str) -> RoomResponse {
        let (_, Json(room)) = create_room(
            Auth(owner.clone()),
            State(state.clone()),
            Json(CreateRoomRequest {
                title: title.to_string(),
            }),
        )
        .await
        .unwrap();
        room
    }

    async fn tag_room(state: &AppState, room_id: u64, tag: RoomTag) {
        let mut store = state.store.write().await;
        let mut room = store.find_room_if_active(room_id).unwrap();
        room.tag = tag;
        store.save_room(&room).unwrap();
    }

    #[tokio::test]
    async fn create_room_defaults() {
        let state = test_state();
        let (owner, _) = seed_user(&state, "owner@example.com", Role::User).await;

        let room = room_for(&state, &owner, "  Broken heater  ").await;
        assert_eq!(room.title, "Broken heater");
        assert_eq!(room.author_id, owner.user_id);
        assert_eq!(room.tag, RoomTag::InProgress);
        assert!(room.is_public);
        assert!(!room.is_anonymous);
    }

    #[tokio::test]
    async fn search_matches_public_titles_only() {
        let state = test_state();
        let (owner, _) = seed_user(&state, "owner@example.com", Role::User).await;
        let heating = room_for(&state, &owner, "Dorm heating").await;
        room_for(&state, &owner, "Wifi").await;
        let hidden = room_for(&state, &owner, "Heating budget").await;
        {
            let mut store = state.store.write().await;
            let mut room = store.find_room_if_active(hidden.room_id).unwrap();
            room.is_public = false;
            store.save_room(&room).unwrap();
        }

        let Json(found) = search_public_rooms(
            Auth(owner.clone()),
            State(state.clone()),
            Query(RoomSearchParams {
                query: Some(" HEAT ".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(found, vec![heating]);

        let err = search_public_rooms(Auth(owner), State(state), Query(RoomSearchParams::default()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_room_rejects_blank_title() {
        let state = test_state();
        let (owner, _) = seed_user(&state, "owner@example.com", Role::User).await;

        let err = create_room(
            Auth(owner),
            State(state),
            Json(CreateRoomRequest {
                title: "   ".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn listings_filter_by_visibility_owner_and_tag() {
        let state = test_state();
        let (owner, _) = seed_user(&state, "owner@example.com", Role::User).await;
        let (other, _) = seed_user(&state, "other@example.com", Role::User).await;

        let first = room_for(&state, &owner, "First").await;
        let second = room_for(&state, &owner, "Second").await;
        room_for(&state, &other, "Theirs").await;
        tag_room(&state, first.room_id, RoomTag::Closed).await;
        {
            let mut store = state.store.write().await;
            let mut room = store.find_room_if_active(second.room_id).unwrap();
            room.is_public = false;
            store.save_room(&room).unwrap();
        }

        let Json(public) = list_public_rooms(
            Auth(other.clone()),
            State(state.clone()),
            Query(RoomListParams::default()),
        )
        .await
        .unwrap();
        assert_eq!(public.len(), 2);
        assert!(public.iter().all(|room| room.is_public));

        let Json(mine) = list_my_rooms(
            Auth(owner.clone()),
            State(state.clone()),
            Query(RoomListParams::default()),
        )
        .await
        .unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|room| room.author_id == owner.user_id));

        let Json(closed) = list_my_rooms(
            Auth(owner),
            State(state.clone()),
            Query(RoomListParams {
                tag: Some("closed".to_string()),
                sort: Some(SortOrder::Oldest),
            }),
        )
        .await
        .unwrap();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].room_id, first.room_id);

        let err = list_public_rooms(
            Auth(other),
            State(state),
            Query(RoomListParams {
                tag: Some("archived".to_string()),
                sort: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_room_owner_admin_stranger() {
        let state = test_state();
        let (owner, _) = seed_user(&state, "owner@example.com", Role::User).await;
        let (stranger, _) = seed_user(&state, "stranger@example.com", Role::User).await;
        let (admin, _) = seed_user(&state, "admin@example.com", Role::Admin).await;

        let mine = room_for(&state, &owner, "Mine").await;
        let other = room_for(&state, &owner, "Other").await;

        let denied = delete_room(Auth(stranger), State(state.clone()), Path(mine.room_id))
            .await
            .unwrap_err();
        assert_eq!(denied.status, StatusCode::FORBIDDEN);

        let status = delete_room(Auth(owner.clone()), State(state.clone()), Path(mine.room_id))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let again = delete_room(Auth(owner), State(state.clone()), Path(mine.room_id))
            .await
            .unwrap_err();
        assert_eq!(again.status, StatusCode::NOT_FOUND);

        let status = delete_room(Auth(admin), State(state.clone()), Path(other.room_id))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(state.store.read().await.find_room_if_active(other.room_id).is_none());
    }

    #[tokio::test]
    async fn settings_require_tagged_room() {
        let state = test_state();
        let (owner, _) = seed_user(&state, "owner@example.com", Role::User).await;
        let room = room_for(&state, &owner, "Room").await;
        let request = || UpdateRoomSettingsRequest {
            is_anonymous: Some(true),
            is_public: None,
        };

        let err = update_room_settings(
            Auth(owner.clone()),
            State(state.clone()),
            Path(room.room_id),
            Json(request()),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        tag_room(&state, room.room_id, RoomTag::Adopted).await;
        let Json(updated) = update_room_settings(
            Auth(owner),
            State(state),
            Path(room.room_id),
            Json(request()),
        )
        .await
        .unwrap();
        assert!(updated.is_anonymous);
        assert!(updated.is_public);
    }

    #[tokio::test]
    async fn admin_may_change_any_room_settings() {
        let state = test_state();
        let (owner, _) = seed_user(&state, "owner@example.com", Role::User).await;
        let (admin, _) = seed_user(&state, "admin@example.com", Role::Admin).await;
        let room = room_for(&state, &owner, "Room").await;
        tag_room(&state, room.room_id, RoomTag::Rejected).await;

        let Json(updated) = update_room_settings(
            Auth(admin),
            State(state),
            Path(room.room_id),
            Json(UpdateRoomSettingsRequest {
                is_anonymous: None,
                is_public: Some(false),
            }),
        )
        .await
        .unwrap();
        assert!(!updated.is_public);
    }

    #[tokio::test]
    async fn transcript_is_owner_only_and_skips_deleted_messages() {
        let state = test_state();
        let (owner, _) = seed_user(&state, "owner@example.com", Role::User).await;
        let (stranger, _) = seed_user(&state, "stranger@example.com", Role::User).await;
        let room = room_for(&state, &owner, "Room").await;
        {
            let mut store = state.store.write().await;
            store.insert_message(room.room_id, owner.user_id, "first".to_string());
            let mut second = store.insert_message(room.room_id, owner.user_id, "second".to_string());
            store.insert_message(room.room_id, owner.user_id, "third".to_string());
            second.is_deleted = true;
            store.save_message(&second).unwrap();
        }

        let Json(transcript) = get_transcript(Auth(owner), State(state.clone()), Path(room.room_id))
            .await
            .unwrap();
        let bodies: Vec<&str> = transcript.items.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(bodies, ["first", "third"]);

        let err = get_transcript(Auth(stranger), State(state.clone()), Path(room.room_id))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn public_detail_hides_anonymous_author() {
        let state = test_state();
        let (owner, _) = seed_user(&state, "owner@example.com", Role::User).await;
        let (viewer, _) = seed_user(&state, "viewer@example.com", Role::User).await;
        let room = room_for(&state, &owner, "Room").await;
        {
            let mut store = state.store.write().await;
            store.insert_message(room.room_id, owner.user_id, "question".to_string());
            let mut stored = store.find_room_if_active(room.room_id).unwrap();
            stored.is_anonymous = true;
            store.save_room(&stored).unwrap();
        }
        toggle_room_reaction(
            Auth(viewer.clone()),
            State(state.clone()),
            Path(room.room_id),
            Json(ReactionRequest {
                reaction_type: ReactionKind::Like,
            }),
        )
        .await
        .unwrap();

        let Json(detail) = public_room_detail(Auth(viewer), State(state), Path(room.room_id))
            .await
            .unwrap();
        assert_eq!(detail.like_count, 1);
        assert_eq!(detail.dislike_count, 0);
        assert_eq!(detail.items.len(), 1);
        assert_eq!(detail.items[0].sender, None);
    }

    #[tokio::test]
    async fn private_room_is_hidden_from_public_detail_and_reactions() {
        let state = test_state();
        let (owner, _) = seed_user(&state, "owner@example.com", Role::User).await;
        let room = room_for(&state, &owner, "Room").await;
        {
            let mut store = state.store.write().await;
            let mut stored = store.find_room_if_active(room.room_id).unwrap();
            stored.is_public = false;
            store.save_room(&stored).unwrap();
        }

        let err = public_room_detail(Auth(owner.clone()), State(state.clone()), Path(room.room_id))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err = toggle_room_reaction(
            Auth(owner),
            State(state),
            Path(room.room_id),
            Json(ReactionRequest {
                reaction_type: ReactionKind::Dislike,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn reaction_toggle_round_trip_through_handler() {
        let state = test_state();
        let (owner, _) = seed_user(&state, "owner@example.com", Role::User).await;
        let room = room_for(&state, &owner, "Room").await;
        let react = |kind| {
            toggle_room_reaction(
                Auth(owner.clone()),
                State(state.clone()),
                Path(room.room_id),
                Json(ReactionRequest { reaction_type: kind }),
            )
        };

        let Json(counts) = react(ReactionKind::Like).await.unwrap();
        assert_eq!((counts.like_count, counts.dislike_count), (1, 0));
        let Json(counts) = react(ReactionKind::Dislike).await.unwrap();
        assert_eq!((counts.like_count, counts.dislike_count), (0, 1));
        let Json(counts) = react(ReactionKind::Dislike).await.unwrap();
        assert_eq!((counts.like_count, counts.dislike_count), (0, 0));
    }
}
