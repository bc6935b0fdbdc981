// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::Request,
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info_span, Span};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{authenticate_request, Identity, Role},
    models::{
        AccessTokenResponse, AdminUpdateUserRequest, ChangePasswordRequest, ChatMessageResponse,
        CreateRoomRequest, DeleteAccountRequest, LoginRequest, PublicRoomDetailResponse,
        ReactionRequest, RefreshRequest, RoomResponse, SignupRequest, SignupResponse,
        TokenPairResponse, TranscriptResponse, UpdateProfileRequest, UpdateRoomSettingsRequest,
        UpdateRoomTagRequest, UserResponse,
    },
    policy::ReactionCounts,
    session::ws_chat,
    state::AppState,
    storage::{ReactionKind, RoomTag, SortOrder},
};

pub mod admin;
pub mod auth;
pub mod health;
pub mod messages;
pub mod rooms;
pub mod users;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route(
            "/users/me",
            get(users::me).put(users::update_me).delete(users::delete_me),
        )
        .route("/users/me/password", patch(users::change_password))
        .route(
            "/rooms",
            get(rooms::list_public_rooms).post(rooms::create_room),
        )
        .route("/rooms/mine", get(rooms::list_my_rooms))
        .route("/rooms/search", get(rooms::search_public_rooms))
        .route(
            "/rooms/{room_id}",
            get(rooms::public_room_detail).delete(rooms::delete_room),
        )
        .route(
            "/rooms/{room_id}/settings",
            patch(rooms::update_room_settings),
        )
        .route("/rooms/{room_id}/messages", get(rooms::get_transcript))
        .route(
            "/rooms/{room_id}/reactions",
            post(rooms::toggle_room_reaction),
        )
        .route("/messages/{message_id}", delete(messages::delete_message))
        .route("/admin/users", get(admin::list_users))
        .route(
            "/admin/users/{user_id}",
            patch(admin::update_user).delete(admin::delete_user),
        )
        .route("/admin/rooms", get(admin::list_rooms))
        .route("/admin/rooms/{room_id}/tag", patch(admin::set_room_tag));

    Router::new()
        .nest("/v1", v1_routes)
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/ws-chat", get(ws_chat))
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            authenticate_request,
        ))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn request_span(request: &Request) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-");

    info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id
    )
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup,
        auth::login,
        auth::refresh,
        users::me,
        users::update_me,
        users::change_password,
        users::delete_me,
        rooms::create_room,
        rooms::list_public_rooms,
        rooms::search_public_rooms,
        rooms::list_my_rooms,
        rooms::public_room_detail,
        rooms::delete_room,
        rooms::update_room_settings,
        rooms::get_transcript,
        rooms::toggle_room_reaction,
        messages::delete_message,
        admin::list_users,
        admin::update_user,
        admin::delete_user,
        admin::list_rooms,
        admin::set_room_tag,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            Identity,
            Role,
            RoomTag,
            ReactionKind,
            SortOrder,
            SignupRequest,
            SignupResponse,
            LoginRequest,
            TokenPairResponse,
            RefreshRequest,
            AccessTokenResponse,
            UserResponse,
            UpdateProfileRequest,
            ChangePasswordRequest,
            DeleteAccountRequest,
            AdminUpdateUserRequest,
            CreateRoomRequest,
            RoomResponse,
            UpdateRoomSettingsRequest,
            UpdateRoomTagRequest,
            ChatMessageResponse,
            TranscriptResponse,
            PublicRoomDetailResponse,
            ReactionRequest,
            ReactionCounts,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Signup, login and token refresh"),
        (name = "Users", description = "Caller account, password and deletion"),
        (name = "Rooms", description = "Chat rooms, transcripts and reactions"),
        (name = "Messages", description = "Chat message moderation"),
        (name = "Admin", description = "Administrative endpoints"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;
