use auxbox_collab::{
    AuthError, DatabaseError, InputError, PlaybackError, QueueError, RoomError, VoteError,
};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{resource}:{identifier} not found")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        resource: &'static str,
        field: &'static str,
        value: String,
    },
    /// The request contradicts the room's current state
    #[error("{0}")]
    InvalidState(&'static str),
    #[error("{0}")]
    BadRequest(String),
    #[error("Unknown internal error: {0}")]
    Unknown(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::InvalidState(_) => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.as_status_code(), self.to_string()).into_response()
    }
}

impl From<DatabaseError> for ServerError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier,
            },
            DatabaseError::Conflict {
                resource,
                field,
                value,
            } => Self::Conflict {
                resource,
                field,
                value,
            },
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<AuthError> for ServerError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::UnknownSession => Self::Unauthorized("Session does not exist"),
            AuthError::Db(e) => e.into(),
        }
    }
}

impl From<RoomError> for ServerError {
    fn from(value: RoomError) -> Self {
        match value {
            RoomError::RoomClosed => Self::Forbidden("Room is closed"),
            RoomError::NotAParticipant => Self::Forbidden("User is not a participant of this room"),
            RoomError::NotHost => Self::Forbidden("Only the host can do this"),
            RoomError::Db(e) => e.into(),
        }
    }
}

impl From<QueueError> for ServerError {
    fn from(value: QueueError) -> Self {
        match value {
            QueueError::RoomClosed => Self::Forbidden("Room is closed"),
            QueueError::Duplicate => Self::Conflict {
                resource: "song",
                field: "video_id",
                value: "an unplayed copy".to_string(),
            },
            QueueError::TooLong { limit } => {
                Self::BadRequest(format!("Song is longer than {} seconds", limit))
            }
            QueueError::ForeignSong => Self::Forbidden("Song does not belong to this room"),
            QueueError::Db(e) => e.into(),
        }
    }
}

impl From<VoteError> for ServerError {
    fn from(value: VoteError) -> Self {
        match value {
            VoteError::RoomClosed => Self::Forbidden("Room is closed"),
            VoteError::ForeignSong => Self::Forbidden("Song does not belong to this room"),
            VoteError::Db(e) => e.into(),
        }
    }
}

impl From<PlaybackError> for ServerError {
    fn from(value: PlaybackError) -> Self {
        match value {
            PlaybackError::RoomClosed => Self::Forbidden("Room is closed"),
            PlaybackError::NothingQueued => Self::InvalidState("Nothing is queued to play"),
            PlaybackError::Db(e) => e.into(),
        }
    }
}

impl From<InputError> for ServerError {
    fn from(value: InputError) -> Self {
        match value {
            InputError::NotFound => Self::NotFound {
                resource: "video",
                identifier: "id",
            },
            e @ (InputError::NoMatch | InputError::Invalid(_)) => Self::BadRequest(e.to_string()),
            e => Self::Unknown(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn songs_outside_the_room_are_forbidden_not_missing() {
        let from_queue: ServerError = QueueError::ForeignSong.into();
        assert_eq!(from_queue.as_status_code(), StatusCode::FORBIDDEN);

        let from_votes: ServerError = VoteError::ForeignSong.into();
        assert_eq!(from_votes.as_status_code(), StatusCode::FORBIDDEN);
    }
}
