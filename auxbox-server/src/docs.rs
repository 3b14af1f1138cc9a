use std::borrow::BorrowMut;

use axum::{response::IntoResponse, Json};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::{auth, rooms, schemas, serialized, sse};

#[derive(OpenApi)]
#[openapi(
    modifiers(&Security),
    info(
        description = "auxbox-server exposes endpoints to interact with this auxbox instance"
    ),
    paths(
        auth::login,
        auth::logout,
        auth::user,
        rooms::create_room,
        rooms::room,
        rooms::close_room,
        rooms::join_room,
        rooms::queue,
        rooms::add_to_queue,
        rooms::remove_from_queue,
        rooms::cast_vote,
        rooms::playback,
        rooms::playback_action,
        sse::event_stream,
    ),
    components(schemas(
        schemas::NewSessionSchema,
        schemas::NewQueueItemSchema,
        schemas::VoteSchema,
        schemas::VoteChoice,
        schemas::PlaybackActionSchema,
        serialized::User,
        serialized::LoginResult,
        serialized::Room,
        serialized::Participant,
        serialized::Song,
        serialized::QueueItem,
        serialized::PlaybackState,
        serialized::JoinResult,
        serialized::VoteResult,
        sse::ServerEvent,
    ))
)]
pub struct ApiDoc;

struct Security;

impl Modify for Security {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.borrow_mut() {
            let scheme = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("Bearer <token>")
                .build();

            components.add_security_scheme("BearerAuth", SecurityScheme::Http(scheme))
        }
    }
}

pub async fn docs() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
