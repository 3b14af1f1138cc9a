use async_trait::async_trait;
use thiserror::Error;

mod data;
pub use data::*;

mod memory;
pub use memory::*;

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

impl DatabaseError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Represents a type that can store and fetch auxbox data.
///
/// The persistent engine behind this trait is an external collaborator.
/// Correctness of the concurrent operations above it relies on the
/// conditional-write methods (`mark_song_played`,
/// `update_playback_guarded`) and the uniqueness checks in the create
/// methods, not on any cross-entity transaction.
#[async_trait]
pub trait Database: Send + Sync + 'static {
    /// Inserts the user if unseen, otherwise refreshes the identity snapshot.
    async fn upsert_user(&self, user: UserData) -> Result<UserData>;

    async fn session_by_token(&self, token: &str) -> Result<SessionData>;
    async fn create_session(&self, new_session: NewSession) -> Result<SessionData>;
    async fn delete_session_by_token(&self, token: &str) -> Result<()>;

    async fn room_by_code(&self, code: &str) -> Result<RoomData>;
    async fn list_rooms(&self) -> Result<Vec<RoomData>>;
    /// Fails with [DatabaseError::Conflict] when the code is taken.
    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData>;
    async fn set_room_active(&self, code: &str, active: bool) -> Result<RoomData>;
    /// Bumps the room's last-modified marker, waking pollers.
    async fn touch_room(&self, code: &str) -> Result<()>;

    async fn participant(&self, code: &str, user_id: &str) -> Result<ParticipantData>;
    /// Fails with [DatabaseError::Conflict] when the (room, user) pair exists.
    async fn create_participant(&self, new_participant: NewParticipant)
        -> Result<ParticipantData>;

    async fn song_by_id(&self, song_id: SongId) -> Result<SongData>;
    /// Songs in creation order. Ranking is not the store's job.
    async fn songs_by_room(&self, code: &str, unplayed_only: bool) -> Result<Vec<SongData>>;
    /// Fails with [DatabaseError::Conflict] when an unplayed song with the
    /// same video id exists in the room.
    async fn create_song(&self, new_song: NewSong) -> Result<SongData>;
    /// Flips the played flag only if it is currently false. The returned
    /// flag tells the caller whether this invocation did the flip.
    async fn mark_song_played(&self, song_id: SongId) -> Result<bool>;
    /// Hard delete, cascading the song's votes.
    async fn delete_song(&self, song_id: SongId) -> Result<()>;

    async fn vote(&self, song_id: SongId, user_id: &str) -> Result<VoteData>;
    async fn votes_by_songs(&self, song_ids: &[SongId]) -> Result<Vec<VoteData>>;
    /// Inserts the vote, or overwrites the stored direction in place.
    async fn upsert_vote(&self, vote: VoteData) -> Result<()>;
    async fn delete_vote(&self, song_id: SongId, user_id: &str) -> Result<()>;

    async fn playback_by_room(&self, code: &str) -> Result<PlaybackData>;
    async fn create_playback(&self, new_playback: NewPlayback) -> Result<PlaybackData>;
    async fn update_playback(&self, code: &str, update: UpdatedPlayback) -> Result<PlaybackData>;
    /// Applies the update only while the current-song pointer still equals
    /// `expected_current`. Returns false when another writer moved the
    /// pointer first, in which case nothing is written.
    async fn update_playback_guarded(
        &self,
        code: &str,
        expected_current: Option<SongId>,
        update: UpdatedPlayback,
    ) -> Result<bool>;
}
