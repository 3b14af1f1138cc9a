use crossbeam::channel::{Receiver, Sender};

use crate::{ParticipantData, PlaybackData, RoomCode};

pub type EventSender = Sender<CollabEvent>;
pub type EventReceiver = Receiver<CollabEvent>;

/// Events emitted by the collab system whenever room state mutates.
///
/// These are invalidation hints. Consumers should re-read authoritative
/// state instead of reconstructing it from event payloads, which is why
/// most variants carry little more than the room code.
#[derive(Debug, Clone)]
pub enum CollabEvent {
    /// The queue or its ordering changed: a song was added, removed,
    /// voted on, or marked played.
    QueueUpdate { room_code: RoomCode },
    /// The room's playback row changed.
    PlaybackUpdate {
        room_code: RoomCode,
        new_state: PlaybackData,
    },
    /// A user became a participant of a room.
    UserJoined {
        room_code: RoomCode,
        new_participant: ParticipantData,
    },
    /// The host closed the room. Connected clients should release their
    /// subscriptions and timers when they see this.
    RoomClosed { room_code: RoomCode },
}

impl CollabEvent {
    /// The room this event belongs to.
    pub fn room_code(&self) -> &str {
        match self {
            Self::QueueUpdate { room_code } => room_code,
            Self::PlaybackUpdate { room_code, .. } => room_code,
            Self::UserJoined { room_code, .. } => room_code,
            Self::RoomClosed { room_code } => room_code,
        }
    }
}
