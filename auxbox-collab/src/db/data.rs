use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The type used for song identifiers. Songs are numbered in submission
/// order, which makes the id usable as a stable ranking tiebreak.
pub type SongId = i64;

/// Opaque user identifier, issued by the external identity provider.
pub type UserId = String;

/// A short human-shareable room code.
pub type RoomCode = String;

/// A snapshot of an externally authenticated user
#[derive(Debug, Clone, PartialEq)]
pub struct UserData {
    pub id: UserId,
    pub display_name: String,
    pub email: Option<String>,
    pub avatar: Option<String>,
}

/// Login session data for authentication
#[derive(Debug, Clone)]
pub struct SessionData {
    /// The session token, or key if you will
    pub token: String,
    /// The user that is logged in
    pub user: UserData,
}

/// An auxbox room
#[derive(Debug, Clone)]
pub struct RoomData {
    /// The shareable code used to identify the room
    pub code: RoomCode,
    pub host_id: UserId,
    /// Closed rooms stay around for history but reject joins and controls
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    /// Last-modified marker, bumped on every mutation. Pollers watch this.
    pub updated_at: DateTime<Utc>,
    pub participants: Vec<ParticipantData>,
}

/// A participant of a room. Unique per (room, user).
#[derive(Debug, Clone)]
pub struct ParticipantData {
    pub room_code: RoomCode,
    pub user_id: UserId,
    /// Display name snapshot taken at join time
    pub display_name: String,
    /// If this is true, the participant created the room and may close it
    pub is_host: bool,
    pub joined_at: DateTime<Utc>,
}

/// A queued song. Content fields never change after creation, only the
/// played flag flips.
#[derive(Debug, Clone)]
pub struct SongData {
    pub id: SongId,
    pub room_code: RoomCode,
    /// External media reference
    pub video_id: String,
    pub title: String,
    pub thumbnail: String,
    pub duration_secs: u32,
    pub added_by: UserId,
    pub is_played: bool,
    pub created_at: DateTime<Utc>,
}

/// The direction of a vote on a queued song
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

/// A single vote. Unique per (song, voter).
#[derive(Debug, Clone)]
pub struct VoteData {
    pub song_id: SongId,
    pub user_id: UserId,
    pub direction: VoteDirection,
}

/// The authoritative playback row of a room. One per room, created
/// lazily, never deleted while the room lives.
#[derive(Debug, Clone)]
pub struct PlaybackData {
    pub room_code: RoomCode,
    pub current_song_id: Option<SongId>,
    pub is_playing: bool,
    pub position_secs: f32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct NewSession {
    pub token: String,
    pub user_id: UserId,
}

#[derive(Debug)]
pub struct NewRoom {
    pub code: RoomCode,
    pub host_id: UserId,
}

#[derive(Debug)]
pub struct NewParticipant {
    pub room_code: RoomCode,
    pub user_id: UserId,
    pub display_name: String,
    pub is_host: bool,
}

#[derive(Debug)]
pub struct NewSong {
    pub room_code: RoomCode,
    pub video_id: String,
    pub title: String,
    pub thumbnail: String,
    pub duration_secs: u32,
    pub added_by: UserId,
}

#[derive(Debug)]
pub struct NewPlayback {
    pub room_code: RoomCode,
    pub current_song_id: Option<SongId>,
    pub is_playing: bool,
    pub position_secs: f32,
}

/// A partial playback update. `None` fields are left untouched.
#[derive(Debug, Default, Clone)]
pub struct UpdatedPlayback {
    pub current_song_id: Option<Option<SongId>>,
    pub is_playing: Option<bool>,
    pub position_secs: Option<f32>,
}
