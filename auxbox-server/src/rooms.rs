use auxbox_collab::{Input, VoteOutcome};
use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json,
};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::{NewQueueItemSchema, PlaybackActionSchema, ValidatedJson, VoteSchema},
    serialized::{JoinResult, PlaybackState, QueueItem, Room, Song, ToSerialized, VoteResult},
    Router,
};

#[utoipa::path(
    post,
    path = "/v1/rooms",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Room)
    )
)]
pub(crate) async fn create_room(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Room>> {
    let room = context.collab.rooms.create_room(&session.user()).await?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{code}",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Room)
    )
)]
pub(crate) async fn room(
    _session: Session,
    State(context): State<ServerContext>,
    Path(code): Path<String>,
) -> ServerResult<Json<Room>> {
    let room = context.collab.rooms.room_by_code(&code).await?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/rooms/{code}",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Room was closed")
    )
)]
pub(crate) async fn close_room(
    session: Session,
    State(context): State<ServerContext>,
    Path(code): Path<String>,
) -> ServerResult<()> {
    let room = context.collab.rooms.room_by_code(&code).await?;
    room.close(&session.user().id).await?;

    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{code}/members",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = JoinResult)
    )
)]
pub(crate) async fn join_room(
    session: Session,
    State(context): State<ServerContext>,
    Path(code): Path<String>,
) -> ServerResult<Json<JoinResult>> {
    let room = context.collab.rooms.room_by_code(&code).await?;

    let (participant, is_new_member) = room.join(&session.user()).await?;
    let playback = room.playback().state_for_new_participant().await?;

    Ok(Json(JoinResult::new(participant, playback, is_new_member)))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{code}/queue",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<QueueItem>)
    )
)]
pub(crate) async fn queue(
    session: Session,
    State(context): State<ServerContext>,
    Path(code): Path<String>,
) -> ServerResult<Json<Vec<QueueItem>>> {
    let user = session.user();

    let room = context.collab.rooms.room_by_code(&code).await?;
    room.participant(&user.id)?;

    let items = room.queue().ranked(Some(&user.id)).await?;

    Ok(Json(items.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{code}/queue",
    tag = "rooms",
    request_body = NewQueueItemSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Song)
    )
)]
pub(crate) async fn add_to_queue(
    session: Session,
    State(context): State<ServerContext>,
    Path(code): Path<String>,
    ValidatedJson(body): ValidatedJson<NewQueueItemSchema>,
) -> ServerResult<Json<Song>> {
    let user = session.user();

    let room = context.collab.rooms.room_by_code(&code).await?;
    room.participant(&user.id)?;
    room.require_active()?;

    let input = Input::parse(&body.query)?;
    let metadata = context.collab.context().metadata;
    let track = input.resolve(metadata.as_ref()).await?;

    let song = room.queue().add(&user.id, track).await?;

    Ok(Json(song.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/rooms/{code}/queue/{song_id}",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Song was removed from the queue")
    )
)]
pub(crate) async fn remove_from_queue(
    session: Session,
    State(context): State<ServerContext>,
    Path((code, song_id)): Path<(String, i64)>,
) -> ServerResult<()> {
    let user = session.user();

    let room = context.collab.rooms.room_by_code(&code).await?;
    room.participant(&user.id)?;
    room.require_active()?;

    room.queue().remove(song_id).await?;

    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{code}/queue/{song_id}/votes",
    tag = "rooms",
    request_body = VoteSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = VoteResult)
    )
)]
pub(crate) async fn cast_vote(
    session: Session,
    State(context): State<ServerContext>,
    Path((code, song_id)): Path<(String, i64)>,
    ValidatedJson(body): ValidatedJson<VoteSchema>,
) -> ServerResult<Json<VoteResult>> {
    let user = session.user();

    let room = context.collab.rooms.room_by_code(&code).await?;
    room.participant(&user.id)?;
    room.require_active()?;

    let votes = room.votes();
    let outcome = votes.cast(song_id, &user.id, body.direction.into()).await?;

    let outcome_label = match outcome {
        VoteOutcome::Added(_) => "added",
        VoteOutcome::Flipped(_) => "flipped",
        VoteOutcome::Removed(_) => "removed",
    };

    let tally = votes
        .tally(&[song_id])
        .await?
        .get(&song_id)
        .copied()
        .unwrap_or_default();

    Ok(Json(VoteResult::new(outcome_label, tally.up, tally.down)))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{code}/playback",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = PlaybackState)
    )
)]
pub(crate) async fn playback(
    session: Session,
    State(context): State<ServerContext>,
    Path(code): Path<String>,
) -> ServerResult<Json<PlaybackState>> {
    let user = session.user();

    let room = context.collab.rooms.room_by_code(&code).await?;
    room.participant(&user.id)?;

    let state = room.playback().state().await?;

    Ok(Json(state.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{code}/playback/actions",
    tag = "rooms",
    request_body = PlaybackActionSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = PlaybackState)
    )
)]
pub(crate) async fn playback_action(
    session: Session,
    State(context): State<ServerContext>,
    Path(code): Path<String>,
    Json(body): Json<PlaybackActionSchema>,
) -> ServerResult<Json<PlaybackState>> {
    let user = session.user();

    let room = context.collab.rooms.room_by_code(&code).await?;
    room.participant(&user.id)?;
    room.require_active()?;

    let playback = room.playback();

    let state = match body {
        PlaybackActionSchema::Play { from } => playback.play(from).await?,
        PlaybackActionSchema::Pause => playback.pause().await?,
        PlaybackActionSchema::Seek { to } => playback.seek(to).await?,
        PlaybackActionSchema::Advance { ended_song_id } => match ended_song_id {
            Some(ended) => playback.advance_from(ended).await?,
            None => playback.advance().await?,
        },
    };

    Ok(Json(state.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_room))
        .route("/:code", get(room).delete(close_room))
        .route("/:code/members", post(join_room))
        .route("/:code/queue", get(queue).post(add_to_queue))
        .route("/:code/queue/:song_id", delete(remove_from_queue))
        .route("/:code/queue/:song_id/votes", post(cast_vote))
        .route("/:code/playback", get(playback))
        .route("/:code/playback/actions", post(playback_action))
}
