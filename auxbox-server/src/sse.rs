use std::{
    convert::Infallible,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
    task::{Context, Poll, Waker},
};

use auxbox_collab::CollabEvent;
use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive},
        Sse,
    },
    routing::get,
};
use futures_util::Stream;
use parking_lot::Mutex;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    serialized::{Participant, PlaybackState, ToSerialized},
    Router,
};

type ConnectionId = u64;

static CONNECTION_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum ServerEvent {
    /// The queue or its ordering changed. Clients should re-fetch it.
    QueueUpdate { room_code: String },
    /// The room's playback state changed.
    PlaybackUpdate {
        room_code: String,
        new_state: PlaybackState,
    },
    /// A user became a participant of the room.
    UserJoined {
        room_code: String,
        new_participant: Participant,
    },
    /// The host closed the room. Clients should release their
    /// subscriptions and timers.
    RoomClosed { room_code: String },
}

impl ServerEvent {
    fn room_code(&self) -> &str {
        match self {
            Self::QueueUpdate { room_code } => room_code,
            Self::PlaybackUpdate { room_code, .. } => room_code,
            Self::UserJoined { room_code, .. } => room_code,
            Self::RoomClosed { room_code } => room_code,
        }
    }
}

impl From<CollabEvent> for ServerEvent {
    fn from(value: CollabEvent) -> Self {
        match value {
            CollabEvent::QueueUpdate { room_code } => Self::QueueUpdate { room_code },
            CollabEvent::PlaybackUpdate {
                room_code,
                new_state,
            } => Self::PlaybackUpdate {
                room_code,
                new_state: new_state.to_serialized(),
            },
            CollabEvent::UserJoined {
                room_code,
                new_participant,
            } => Self::UserJoined {
                room_code,
                new_participant: new_participant.to_serialized(),
            },
            CollabEvent::RoomClosed { room_code } => Self::RoomClosed { room_code },
        }
    }
}

/// Manages server sent event connections
pub struct ServerSentEvents {
    me: Weak<Self>,
    connections: Mutex<Vec<Connection>>,
}

struct Connection {
    id: ConnectionId,
    room_code: String,
    pending_messages: Arc<Mutex<Vec<ServerEvent>>>,
    waker: Arc<Mutex<Option<Waker>>>,
}

pub struct ConnectionHandle {
    id: ConnectionId,
    /// A reference to [Connection]'s pending messages
    pending_messages: Arc<Mutex<Vec<ServerEvent>>>,
    /// A reference to [Connection]'s stored [Waker]
    waker: Arc<Mutex<Option<Waker>>>,
    /// Required to remove connection when dropped
    manager: Weak<ServerSentEvents>,
}

impl ServerSentEvents {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            connections: Default::default(),
        })
    }

    /// Delivers an event to every connection watching its room.
    pub fn broadcast(&self, event: ServerEvent) {
        let connections = self.connections.lock();

        for connection in connections.iter() {
            if connection.room_code == event.room_code() {
                connection.send(event.clone())
            }
        }
    }

    fn connect(&self, room_code: String) -> ConnectionHandle {
        let connection = Connection::new(room_code);
        let handle = connection.handle(self.me.clone());

        self.connections.lock().push(connection);
        handle
    }

    fn disconnect(&self, id: ConnectionId) {
        self.connections.lock().retain(|c| c.id != id)
    }
}

impl Connection {
    fn new(room_code: String) -> Self {
        Self {
            id: CONNECTION_COUNTER.fetch_add(1, Ordering::SeqCst),
            room_code,
            pending_messages: Default::default(),
            waker: Default::default(),
        }
    }

    fn send(&self, message: ServerEvent) {
        self.pending_messages.lock().push(message);

        if let Some(waker) = self.waker.lock().take() {
            waker.wake()
        }
    }

    fn handle(&self, manager: Weak<ServerSentEvents>) -> ConnectionHandle {
        ConnectionHandle {
            id: self.id,
            pending_messages: self.pending_messages.clone(),
            waker: self.waker.clone(),
            manager,
        }
    }
}

impl Stream for ConnectionHandle {
    type Item = Result<Event, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut pending_messages = self.pending_messages.lock();

        let next_event = pending_messages
            .pop()
            .map(|m| serde_json::to_string(&m).expect("serializes properly"));

        if let Some(event) = next_event {
            return Poll::Ready(Some(Ok(Event::default().data(event))));
        }

        *self.waker.lock() = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.disconnect(self.id)
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{code}/events",
    tag = "events",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (
            status = 200,
            content_type = "text/event-stream",
            description = "A stream of change events for the room",
            body = ServerEvent
        )
    )
)]
pub(crate) async fn event_stream(
    session: Session,
    State(context): State<ServerContext>,
    Path(code): Path<String>,
) -> ServerResult<Sse<ConnectionHandle>> {
    let room = context.collab.rooms.room_by_code(&code).await?;
    room.participant(&session.user().id)?;

    let handle = context.sse.connect(room.code());

    Ok(Sse::new(handle).keep_alive(KeepAlive::default()))
}

pub fn router() -> Router {
    Router::new().route("/:code/events", get(event_stream))
}
