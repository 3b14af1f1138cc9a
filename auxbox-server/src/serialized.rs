//! All schemas that are exposed from endpoints are defined here
//! along with the [ToSerialized] impls

use std::sync::Arc;

use auxbox_collab::{
    ParticipantData, PlaybackData, RankedSong, Room as CollabRoom, SessionData, SongData, UserData,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{schemas::VoteChoice, Database};

#[derive(Debug, Serialize, ToSchema)]
pub struct User {
    id: String,
    display_name: String,
    avatar: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResult {
    token: String,
    user: User,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Room {
    code: String,
    host_id: String,
    is_active: bool,
    participants: Vec<Participant>,
    created_at: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Participant {
    user_id: String,
    display_name: String,
    is_host: bool,
    joined_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Song {
    id: i64,
    video_id: String,
    title: String,
    thumbnail: String,
    duration_secs: u32,
    added_by: String,
    is_played: bool,
    created_at: String,
}

/// A queue entry in rank order, with its tally and the vote of the
/// user requesting the queue.
#[derive(Debug, Serialize, ToSchema)]
pub struct QueueItem {
    song: Song,
    up_votes: u32,
    down_votes: u32,
    score: i64,
    own_vote: Option<VoteChoice>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlaybackState {
    current_song_id: Option<i64>,
    is_playing: bool,
    position_secs: f32,
    updated_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct JoinResult {
    participant: Participant,
    /// Playback as the joiner should render it, always paused
    playback: PlaybackState,
    is_new_member: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VoteResult {
    /// What the cast did: "added", "flipped", or "removed"
    outcome: String,
    up_votes: u32,
    down_votes: u32,
    score: i64,
}

impl JoinResult {
    pub fn new(participant: ParticipantData, playback: PlaybackData, is_new_member: bool) -> Self {
        Self {
            participant: participant.to_serialized(),
            playback: playback.to_serialized(),
            is_new_member,
        }
    }
}

impl VoteResult {
    pub fn new(outcome: &'static str, up_votes: u32, down_votes: u32) -> Self {
        Self {
            outcome: outcome.to_string(),
            up_votes,
            down_votes,
            score: up_votes as i64 - down_votes as i64,
        }
    }
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl ToSerialized<User> for UserData {
    fn to_serialized(&self) -> User {
        User {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            avatar: self.avatar.clone(),
        }
    }
}

impl ToSerialized<LoginResult> for SessionData {
    fn to_serialized(&self) -> LoginResult {
        LoginResult {
            token: self.token.clone(),
            user: self.user.to_serialized(),
        }
    }
}

impl ToSerialized<Room> for Arc<CollabRoom<Database>> {
    fn to_serialized(&self) -> Room {
        let data = self.data();

        Room {
            code: data.code,
            host_id: data.host_id,
            is_active: data.is_active,
            participants: data.participants.to_serialized(),
            created_at: data.created_at.to_rfc3339(),
        }
    }
}

impl ToSerialized<Participant> for ParticipantData {
    fn to_serialized(&self) -> Participant {
        Participant {
            user_id: self.user_id.clone(),
            display_name: self.display_name.clone(),
            is_host: self.is_host,
            joined_at: self.joined_at.to_rfc3339(),
        }
    }
}

impl ToSerialized<Song> for SongData {
    fn to_serialized(&self) -> Song {
        Song {
            id: self.id,
            video_id: self.video_id.clone(),
            title: self.title.clone(),
            thumbnail: self.thumbnail.clone(),
            duration_secs: self.duration_secs,
            added_by: self.added_by.clone(),
            is_played: self.is_played,
            created_at: self.created_at.to_rfc3339(),
        }
    }
}

impl ToSerialized<QueueItem> for RankedSong {
    fn to_serialized(&self) -> QueueItem {
        QueueItem {
            song: self.song.to_serialized(),
            up_votes: self.tally.up,
            down_votes: self.tally.down,
            score: self.tally.score(),
            own_vote: self.viewer_vote.map(Into::into),
        }
    }
}

impl ToSerialized<PlaybackState> for PlaybackData {
    fn to_serialized(&self) -> PlaybackState {
        PlaybackState {
            current_song_id: self.current_song_id,
            is_playing: self.is_playing,
            position_secs: self.position_secs,
            updated_at: self.updated_at.to_rfc3339(),
        }
    }
}
