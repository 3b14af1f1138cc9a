use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::{
    Database, DatabaseError, NewParticipant, NewPlayback, NewRoom, NewSession, NewSong,
    ParticipantData, PlaybackData, Result, RoomCode, RoomData, SessionData, SongData, SongId,
    UpdatedPlayback, UserData, UserId, VoteData,
};

/// An in-memory database implementation for auxbox.
///
/// The store is a single writer-locked set of maps, so every operation is
/// atomic with respect to every other. This is the per-row linearization
/// the playback guards depend on.
#[derive(Default)]
pub struct MemoryDatabase {
    inner: RwLock<Inner>,
    song_counter: AtomicI64,
}

#[derive(Debug, Clone)]
struct RoomRow {
    code: RoomCode,
    host_id: UserId,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<UserId, UserData>,
    sessions: HashMap<String, UserId>,
    rooms: HashMap<RoomCode, RoomRow>,
    participants: Vec<ParticipantData>,
    songs: BTreeMap<SongId, SongData>,
    votes: HashMap<(SongId, UserId), VoteData>,
    playback: HashMap<RoomCode, PlaybackData>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    fn room_data(&self, row: &RoomRow) -> RoomData {
        let participants = self
            .participants
            .iter()
            .filter(|p| p.room_code == row.code)
            .cloned()
            .collect();

        RoomData {
            code: row.code.clone(),
            host_id: row.host_id.clone(),
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
            participants,
        }
    }

    fn room_row(&self, code: &str) -> Result<&RoomRow> {
        self.rooms.get(code).ok_or(DatabaseError::NotFound {
            resource: "room",
            identifier: "code",
        })
    }
}

fn apply_update(state: &mut PlaybackData, update: UpdatedPlayback) {
    if let Some(current) = update.current_song_id {
        state.current_song_id = current;
    }

    if let Some(playing) = update.is_playing {
        state.is_playing = playing;
    }

    if let Some(position) = update.position_secs {
        state.position_secs = position;
    }

    state.updated_at = Utc::now();
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn upsert_user(&self, user: UserData) -> Result<UserData> {
        self.inner
            .write()
            .users
            .insert(user.id.clone(), user.clone());

        Ok(user)
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        let inner = self.inner.read();

        let user_id = inner.sessions.get(token).ok_or(DatabaseError::NotFound {
            resource: "session",
            identifier: "token",
        })?;

        let user = inner
            .users
            .get(user_id)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "user",
                identifier: "id",
            })?;

        Ok(SessionData {
            token: token.to_string(),
            user,
        })
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        {
            let mut inner = self.inner.write();

            if inner.sessions.contains_key(&new_session.token) {
                return Err(DatabaseError::Conflict {
                    resource: "session",
                    field: "token",
                    value: new_session.token,
                });
            }

            inner
                .sessions
                .insert(new_session.token.clone(), new_session.user_id);
        }

        self.session_by_token(&new_session.token).await
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        self.inner
            .write()
            .sessions
            .remove(token)
            .map(|_| ())
            .ok_or(DatabaseError::NotFound {
                resource: "session",
                identifier: "token",
            })
    }

    async fn room_by_code(&self, code: &str) -> Result<RoomData> {
        let inner = self.inner.read();
        let row = inner.room_row(code)?;

        Ok(inner.room_data(row))
    }

    async fn list_rooms(&self) -> Result<Vec<RoomData>> {
        let inner = self.inner.read();

        Ok(inner.rooms.values().map(|r| inner.room_data(r)).collect())
    }

    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData> {
        let mut inner = self.inner.write();

        if inner.rooms.contains_key(&new_room.code) {
            return Err(DatabaseError::Conflict {
                resource: "room",
                field: "code",
                value: new_room.code,
            });
        }

        let now = Utc::now();
        let row = RoomRow {
            code: new_room.code.clone(),
            host_id: new_room.host_id,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        inner.rooms.insert(new_room.code, row.clone());

        Ok(inner.room_data(&row))
    }

    async fn set_room_active(&self, code: &str, active: bool) -> Result<RoomData> {
        let mut inner = self.inner.write();

        let row = inner.rooms.get_mut(code).ok_or(DatabaseError::NotFound {
            resource: "room",
            identifier: "code",
        })?;

        row.is_active = active;
        row.updated_at = Utc::now();

        let row = row.clone();
        Ok(inner.room_data(&row))
    }

    async fn touch_room(&self, code: &str) -> Result<()> {
        let mut inner = self.inner.write();

        let row = inner.rooms.get_mut(code).ok_or(DatabaseError::NotFound {
            resource: "room",
            identifier: "code",
        })?;

        row.updated_at = Utc::now();
        Ok(())
    }

    async fn participant(&self, code: &str, user_id: &str) -> Result<ParticipantData> {
        self.inner
            .read()
            .participants
            .iter()
            .find(|p| p.room_code == code && p.user_id == user_id)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "participant",
                identifier: "room:user",
            })
    }

    async fn create_participant(
        &self,
        new_participant: NewParticipant,
    ) -> Result<ParticipantData> {
        let mut inner = self.inner.write();

        inner.room_row(&new_participant.room_code)?;

        let exists = inner
            .participants
            .iter()
            .any(|p| p.room_code == new_participant.room_code && p.user_id == new_participant.user_id);

        if exists {
            return Err(DatabaseError::Conflict {
                resource: "participant",
                field: "room:user",
                value: format!(
                    "{}:{}",
                    new_participant.room_code, new_participant.user_id
                ),
            });
        }

        let participant = ParticipantData {
            room_code: new_participant.room_code,
            user_id: new_participant.user_id,
            display_name: new_participant.display_name,
            is_host: new_participant.is_host,
            joined_at: Utc::now(),
        };

        inner.participants.push(participant.clone());
        Ok(participant)
    }

    async fn song_by_id(&self, song_id: SongId) -> Result<SongData> {
        self.inner
            .read()
            .songs
            .get(&song_id)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "song",
                identifier: "id",
            })
    }

    async fn songs_by_room(&self, code: &str, unplayed_only: bool) -> Result<Vec<SongData>> {
        let inner = self.inner.read();
        inner.room_row(code)?;

        Ok(inner
            .songs
            .values()
            .filter(|s| s.room_code == code && (!unplayed_only || !s.is_played))
            .cloned()
            .collect())
    }

    async fn create_song(&self, new_song: NewSong) -> Result<SongData> {
        let mut inner = self.inner.write();

        inner.room_row(&new_song.room_code)?;

        let duplicate = inner.songs.values().any(|s| {
            s.room_code == new_song.room_code && s.video_id == new_song.video_id && !s.is_played
        });

        if duplicate {
            return Err(DatabaseError::Conflict {
                resource: "song",
                field: "video_id",
                value: new_song.video_id,
            });
        }

        let song = SongData {
            id: self.song_counter.fetch_add(1, Ordering::SeqCst) + 1,
            room_code: new_song.room_code,
            video_id: new_song.video_id,
            title: new_song.title,
            thumbnail: new_song.thumbnail,
            duration_secs: new_song.duration_secs,
            added_by: new_song.added_by,
            is_played: false,
            created_at: Utc::now(),
        };

        inner.songs.insert(song.id, song.clone());
        Ok(song)
    }

    async fn mark_song_played(&self, song_id: SongId) -> Result<bool> {
        let mut inner = self.inner.write();

        let song = inner
            .songs
            .get_mut(&song_id)
            .ok_or(DatabaseError::NotFound {
                resource: "song",
                identifier: "id",
            })?;

        if song.is_played {
            return Ok(false);
        }

        song.is_played = true;
        Ok(true)
    }

    async fn delete_song(&self, song_id: SongId) -> Result<()> {
        let mut inner = self.inner.write();

        inner.songs.remove(&song_id).ok_or(DatabaseError::NotFound {
            resource: "song",
            identifier: "id",
        })?;

        inner.votes.retain(|(id, _), _| *id != song_id);
        Ok(())
    }

    async fn vote(&self, song_id: SongId, user_id: &str) -> Result<VoteData> {
        self.inner
            .read()
            .votes
            .get(&(song_id, user_id.to_string()))
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "vote",
                identifier: "song:user",
            })
    }

    async fn votes_by_songs(&self, song_ids: &[SongId]) -> Result<Vec<VoteData>> {
        Ok(self
            .inner
            .read()
            .votes
            .values()
            .filter(|v| song_ids.contains(&v.song_id))
            .cloned()
            .collect())
    }

    async fn upsert_vote(&self, vote: VoteData) -> Result<()> {
        self.inner
            .write()
            .votes
            .insert((vote.song_id, vote.user_id.clone()), vote);

        Ok(())
    }

    async fn delete_vote(&self, song_id: SongId, user_id: &str) -> Result<()> {
        self.inner
            .write()
            .votes
            .remove(&(song_id, user_id.to_string()))
            .map(|_| ())
            .ok_or(DatabaseError::NotFound {
                resource: "vote",
                identifier: "song:user",
            })
    }

    async fn playback_by_room(&self, code: &str) -> Result<PlaybackData> {
        self.inner
            .read()
            .playback
            .get(code)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "playback",
                identifier: "room",
            })
    }

    async fn create_playback(&self, new_playback: NewPlayback) -> Result<PlaybackData> {
        let mut inner = self.inner.write();

        inner.room_row(&new_playback.room_code)?;

        if inner.playback.contains_key(&new_playback.room_code) {
            return Err(DatabaseError::Conflict {
                resource: "playback",
                field: "room",
                value: new_playback.room_code,
            });
        }

        let state = PlaybackData {
            room_code: new_playback.room_code.clone(),
            current_song_id: new_playback.current_song_id,
            is_playing: new_playback.is_playing,
            position_secs: new_playback.position_secs,
            updated_at: Utc::now(),
        };

        inner.playback.insert(new_playback.room_code, state.clone());
        Ok(state)
    }

    async fn update_playback(&self, code: &str, update: UpdatedPlayback) -> Result<PlaybackData> {
        let mut inner = self.inner.write();

        let state = inner
            .playback
            .get_mut(code)
            .ok_or(DatabaseError::NotFound {
                resource: "playback",
                identifier: "room",
            })?;

        apply_update(state, update);
        Ok(state.clone())
    }

    async fn update_playback_guarded(
        &self,
        code: &str,
        expected_current: Option<SongId>,
        update: UpdatedPlayback,
    ) -> Result<bool> {
        let mut inner = self.inner.write();

        let state = inner
            .playback
            .get_mut(code)
            .ok_or(DatabaseError::NotFound {
                resource: "playback",
                identifier: "room",
            })?;

        if state.current_song_id != expected_current {
            return Ok(false);
        }

        apply_update(state, update);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VoteDirection;

    fn user(id: &str) -> UserData {
        UserData {
            id: id.to_string(),
            display_name: id.to_string(),
            email: None,
            avatar: None,
        }
    }

    async fn seeded_room(db: &MemoryDatabase) -> RoomData {
        db.upsert_user(user("host")).await.unwrap();

        db.create_room(NewRoom {
            code: "ABCDEF".to_string(),
            host_id: "host".to_string(),
        })
        .await
        .unwrap()
    }

    fn new_song(room: &str, video_id: &str) -> NewSong {
        NewSong {
            room_code: room.to_string(),
            video_id: video_id.to_string(),
            title: "a title".to_string(),
            thumbnail: String::new(),
            duration_secs: 200,
            added_by: "host".to_string(),
        }
    }

    #[tokio::test]
    async fn duplicate_unplayed_song_conflicts() {
        let db = MemoryDatabase::new();
        let room = seeded_room(&db).await;

        db.create_song(new_song(&room.code, "dQw4w9WgXcQ"))
            .await
            .unwrap();

        let err = db
            .create_song(new_song(&room.code, "dQw4w9WgXcQ"))
            .await
            .unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(db.songs_by_room(&room.code, false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn played_copy_allows_resubmission() {
        let db = MemoryDatabase::new();
        let room = seeded_room(&db).await;

        let song = db
            .create_song(new_song(&room.code, "dQw4w9WgXcQ"))
            .await
            .unwrap();

        assert!(db.mark_song_played(song.id).await.unwrap());
        assert!(!db.mark_song_played(song.id).await.unwrap());

        db.create_song(new_song(&room.code, "dQw4w9WgXcQ"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn guarded_playback_update_rejects_stale_pointer() {
        let db = MemoryDatabase::new();
        let room = seeded_room(&db).await;

        let song = db.create_song(new_song(&room.code, "abc")).await.unwrap();

        db.create_playback(NewPlayback {
            room_code: room.code.clone(),
            current_song_id: Some(song.id),
            is_playing: false,
            position_secs: 0.0,
        })
        .await
        .unwrap();

        let applied = db
            .update_playback_guarded(
                &room.code,
                Some(song.id),
                UpdatedPlayback {
                    current_song_id: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(applied);

        // The pointer moved, so the same guard no longer matches.
        let applied = db
            .update_playback_guarded(
                &room.code,
                Some(song.id),
                UpdatedPlayback {
                    is_playing: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!applied);
    }

    #[tokio::test]
    async fn deleting_a_song_cascades_votes() {
        let db = MemoryDatabase::new();
        let room = seeded_room(&db).await;

        let song = db.create_song(new_song(&room.code, "abc")).await.unwrap();

        db.upsert_vote(VoteData {
            song_id: song.id,
            user_id: "host".to_string(),
            direction: VoteDirection::Up,
        })
        .await
        .unwrap();

        db.delete_song(song.id).await.unwrap();

        assert!(db.votes_by_songs(&[song.id]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn participant_pair_is_unique() {
        let db = MemoryDatabase::new();
        let room = seeded_room(&db).await;

        let new = || NewParticipant {
            room_code: room.code.clone(),
            user_id: "host".to_string(),
            display_name: "host".to_string(),
            is_host: true,
        };

        db.create_participant(new()).await.unwrap();
        let err = db.create_participant(new()).await.unwrap_err();

        assert!(err.is_conflict());
    }
}
