use thiserror::Error;

use crate::{
    CollabContext, CollabEvent, Database, DatabaseError, NewPlayback, PlaybackData, QueueError,
    RoomCode, SongId, SongQueue, UpdatedPlayback,
};

/// The synchronized playback state of a room. Clients render audio
/// themselves; this is the authoritative description of what they
/// should be rendering.
pub struct Playback<Db> {
    context: CollabContext<Db>,
    room_code: RoomCode,
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("Room is closed")]
    RoomClosed,
    #[error("Nothing is queued to play")]
    NothingQueued,
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

/// The three stages playback can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStage {
    Empty,
    LoadedPaused,
    LoadedPlaying,
}

impl PlaybackData {
    pub fn stage(&self) -> PlaybackStage {
        match (self.current_song_id, self.is_playing) {
            (None, _) => PlaybackStage::Empty,
            (Some(_), false) => PlaybackStage::LoadedPaused,
            (Some(_), true) => PlaybackStage::LoadedPlaying,
        }
    }
}

impl<Db> Playback<Db>
where
    Db: Database,
{
    pub(crate) fn new(context: &CollabContext<Db>, room_code: RoomCode) -> Self {
        Self {
            context: context.clone(),
            room_code,
        }
    }

    /// The room's playback state, lazily seeded on first read and
    /// repaired if its song pointer went stale.
    pub async fn state(&self) -> Result<PlaybackData, PlaybackError> {
        let state = match self
            .context
            .database
            .playback_by_room(&self.room_code)
            .await
        {
            Ok(state) => state,
            Err(e) if e.is_not_found() => return self.seed().await,
            Err(e) => return Err(e.into()),
        };

        self.reconcile(state).await
    }

    /// State as presented to a freshly joined participant. Always paused,
    /// so joining never starts audio by itself. Does not mutate the
    /// authoritative state.
    pub async fn state_for_new_participant(&self) -> Result<PlaybackData, PlaybackError> {
        let mut state = self.state().await?;
        state.is_playing = false;

        Ok(state)
    }

    /// Starts or resumes playback. Pass a position to also seek.
    pub async fn play(&self, from: Option<f32>) -> Result<PlaybackData, PlaybackError> {
        self.require_active().await?;

        let state = self.state().await?;

        if state.current_song_id.is_none() {
            return Err(PlaybackError::NothingQueued);
        }

        self.apply(UpdatedPlayback {
            is_playing: Some(true),
            position_secs: from.map(|p| p.max(0.)),
            ..Default::default()
        })
        .await
    }

    /// Pauses playback, keeping the position. Pausing an empty or already
    /// paused room is a no-op.
    pub async fn pause(&self) -> Result<PlaybackData, PlaybackError> {
        self.require_active().await?;
        self.state().await?;

        self.apply(UpdatedPlayback {
            is_playing: Some(false),
            ..Default::default()
        })
        .await
    }

    /// Moves the position within the current song.
    pub async fn seek(&self, to: f32) -> Result<PlaybackData, PlaybackError> {
        self.require_active().await?;

        let state = self.state().await?;

        if state.current_song_id.is_none() {
            return Err(PlaybackError::NothingQueued);
        }

        self.apply(UpdatedPlayback {
            position_secs: Some(to.max(0.)),
            ..Default::default()
        })
        .await
    }

    /// Marks the current song played and loads the next ranked one,
    /// continuing playback if there is one.
    pub async fn advance(&self) -> Result<PlaybackData, PlaybackError> {
        self.require_active().await?;

        let state = self.state().await?;

        match state.current_song_id {
            Some(ended) => self.advance_from(ended).await,
            None => Ok(state),
        }
    }

    /// Advances past a specific song. A second call for a song that
    /// already finished is a no-op, which makes duplicate completion
    /// reports from racing clients safe.
    pub async fn advance_from(&self, ended: SongId) -> Result<PlaybackData, PlaybackError> {
        self.require_active().await?;

        let ended_song = match self.context.database.song_by_id(ended).await {
            Ok(song) => song,
            // The song was removed since the client saw it finish
            Err(e) if e.is_not_found() => return self.state().await,
            Err(e) => return Err(e.into()),
        };

        if ended_song.room_code != self.room_code {
            return self.state().await;
        }

        // Whoever flips the played flag gets to move the pointer.
        if !self.context.database.mark_song_played(ended).await? {
            return self.state().await;
        }

        self.context.emit(CollabEvent::QueueUpdate {
            room_code: self.room_code.clone(),
        });

        let next = self.queue().current().await?;

        let moved = self
            .context
            .database
            .update_playback_guarded(
                &self.room_code,
                Some(ended),
                UpdatedPlayback {
                    current_song_id: Some(next.as_ref().map(|s| s.id)),
                    is_playing: Some(next.is_some()),
                    position_secs: Some(0.),
                },
            )
            .await?;

        let state = self
            .context
            .database
            .playback_by_room(&self.room_code)
            .await?;

        if moved {
            self.notify(state.clone()).await?;
        }

        Ok(state)
    }

    async fn seed(&self) -> Result<PlaybackData, PlaybackError> {
        let current = self.queue().current().await?;

        let result = self
            .context
            .database
            .create_playback(NewPlayback {
                room_code: self.room_code.clone(),
                current_song_id: current.map(|s| s.id),
                is_playing: false,
                position_secs: 0.,
            })
            .await;

        match result {
            Ok(state) => Ok(state),
            // Lost a seeding race, the other writer's row is the truth
            Err(e) if e.is_conflict() => Ok(self
                .context
                .database
                .playback_by_room(&self.room_code)
                .await?),
            Err(e) => Err(e.into()),
        }
    }

    /// Repairs the song pointer when the song it references was removed
    /// or marked played behind playback's back. A live pointer is left
    /// alone so vote reshuffles never interrupt the playing song.
    async fn reconcile(&self, state: PlaybackData) -> Result<PlaybackData, PlaybackError> {
        if let Some(id) = state.current_song_id {
            let live = match self.context.database.song_by_id(id).await {
                Ok(song) => !song.is_played && song.room_code == self.room_code,
                Err(e) if e.is_not_found() => false,
                Err(e) => return Err(e.into()),
            };

            if live {
                return Ok(state);
            }
        }

        let next = self.queue().current().await?;

        if state.current_song_id.is_none() && next.is_none() {
            return Ok(state);
        }

        self.context
            .database
            .update_playback_guarded(
                &self.room_code,
                state.current_song_id,
                UpdatedPlayback {
                    current_song_id: Some(next.as_ref().map(|s| s.id)),
                    is_playing: Some(state.is_playing && next.is_some()),
                    position_secs: Some(0.),
                },
            )
            .await?;

        Ok(self
            .context
            .database
            .playback_by_room(&self.room_code)
            .await?)
    }

    async fn apply(&self, update: UpdatedPlayback) -> Result<PlaybackData, PlaybackError> {
        let state = self
            .context
            .database
            .update_playback(&self.room_code, update)
            .await?;

        self.notify(state.clone()).await?;
        Ok(state)
    }

    async fn notify(&self, new_state: PlaybackData) -> Result<(), DatabaseError> {
        self.context.database.touch_room(&self.room_code).await?;

        self.context.emit(CollabEvent::PlaybackUpdate {
            room_code: self.room_code.clone(),
            new_state,
        });

        Ok(())
    }

    async fn require_active(&self) -> Result<(), PlaybackError> {
        if self.context.room_is_active(&self.room_code).await? {
            Ok(())
        } else {
            Err(PlaybackError::RoomClosed)
        }
    }

    fn queue(&self) -> SongQueue<Db> {
        SongQueue::new(&self.context, self.room_code.clone())
    }
}

impl From<QueueError> for PlaybackError {
    fn from(error: QueueError) -> Self {
        match error {
            QueueError::RoomClosed => Self::RoomClosed,
            QueueError::Db(e) => Self::Db(e),
            // Queue reads only surface database errors
            other => Self::Db(DatabaseError::Internal(Box::new(other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{collab_fixture, host_user, track};

    #[tokio::test]
    async fn first_read_seeds_a_paused_state() {
        let collab = collab_fixture();
        let host = host_user();
        let room = collab.rooms.create_room(&host).await.unwrap();

        let song = room.queue().add(&host.id, track("one", 100)).await.unwrap();
        let state = room.playback().state().await.unwrap();

        assert_eq!(state.current_song_id, Some(song.id));
        assert_eq!(state.stage(), PlaybackStage::LoadedPaused);
        assert_eq!(state.position_secs, 0.);
    }

    #[tokio::test]
    async fn empty_room_rejects_play_and_seek() {
        let collab = collab_fixture();
        let host = host_user();
        let room = collab.rooms.create_room(&host).await.unwrap();
        let playback = room.playback();

        assert_eq!(
            playback.state().await.unwrap().stage(),
            PlaybackStage::Empty
        );
        assert!(matches!(
            playback.play(None).await,
            Err(PlaybackError::NothingQueued)
        ));
        assert!(matches!(
            playback.seek(10.).await,
            Err(PlaybackError::NothingQueued)
        ));

        // Pause stays a harmless no-op
        let state = playback.pause().await.unwrap();
        assert_eq!(state.stage(), PlaybackStage::Empty);
    }

    #[tokio::test]
    async fn play_pause_and_seek_round_trip() {
        let collab = collab_fixture();
        let host = host_user();
        let room = collab.rooms.create_room(&host).await.unwrap();
        room.queue().add(&host.id, track("one", 100)).await.unwrap();

        let playback = room.playback();

        let playing = playback.play(None).await.unwrap();
        assert_eq!(playing.stage(), PlaybackStage::LoadedPlaying);

        let seeked = playback.seek(42.5).await.unwrap();
        assert_eq!(seeked.position_secs, 42.5);
        assert!(seeked.is_playing);

        let paused = playback.pause().await.unwrap();
        assert_eq!(paused.stage(), PlaybackStage::LoadedPaused);
        assert_eq!(paused.position_secs, 42.5);

        let resumed = playback.play(None).await.unwrap();
        assert_eq!(resumed.position_secs, 42.5);

        let restarted = playback.play(Some(0.)).await.unwrap();
        assert_eq!(restarted.position_secs, 0.);

        // Negative positions clamp to the start
        let clamped = playback.play(Some(-5.)).await.unwrap();
        assert_eq!(clamped.position_secs, 0.);
    }

    #[tokio::test]
    async fn closed_rooms_refuse_playback_controls() {
        let collab = collab_fixture();
        let host = host_user();
        let room = collab.rooms.create_room(&host).await.unwrap();
        let song = room.queue().add(&host.id, track("one", 100)).await.unwrap();

        let playback = room.playback();
        playback.play(None).await.unwrap();
        room.close(&host.id).await.unwrap();

        assert!(matches!(
            playback.play(None).await,
            Err(PlaybackError::RoomClosed)
        ));
        assert!(matches!(
            playback.pause().await,
            Err(PlaybackError::RoomClosed)
        ));
        assert!(matches!(
            playback.seek(10.).await,
            Err(PlaybackError::RoomClosed)
        ));
        assert!(matches!(
            playback.advance().await,
            Err(PlaybackError::RoomClosed)
        ));
        assert!(matches!(
            playback.advance_from(song.id).await,
            Err(PlaybackError::RoomClosed)
        ));

        // The last state stays readable for members
        let state = playback.state().await.unwrap();
        assert_eq!(state.current_song_id, Some(song.id));
    }

    #[tokio::test]
    async fn advance_loads_the_next_ranked_song() {
        let collab = collab_fixture();
        let host = host_user();
        let room = collab.rooms.create_room(&host).await.unwrap();
        let queue = room.queue();

        let first = queue.add(&host.id, track("one", 100)).await.unwrap();
        let second = queue.add(&host.id, track("two", 100)).await.unwrap();

        let playback = room.playback();
        playback.play(None).await.unwrap();

        // Newest submission ranks first, so it plays first
        assert_eq!(
            playback.state().await.unwrap().current_song_id,
            Some(second.id)
        );

        let state = playback.advance().await.unwrap();

        assert_eq!(state.current_song_id, Some(first.id));
        assert_eq!(state.stage(), PlaybackStage::LoadedPlaying);
        assert_eq!(state.position_secs, 0.);
    }

    #[tokio::test]
    async fn advancing_the_last_song_empties_playback() {
        let collab = collab_fixture();
        let host = host_user();
        let room = collab.rooms.create_room(&host).await.unwrap();
        room.queue().add(&host.id, track("one", 100)).await.unwrap();

        let playback = room.playback();
        playback.play(None).await.unwrap();

        let state = playback.advance().await.unwrap();

        assert_eq!(state.stage(), PlaybackStage::Empty);
        assert!(!state.is_playing);

        // Advancing an empty room does nothing
        let state = playback.advance().await.unwrap();
        assert_eq!(state.stage(), PlaybackStage::Empty);
    }

    #[tokio::test]
    async fn duplicate_completion_reports_advance_once() {
        let collab = collab_fixture();
        let host = host_user();
        let room = collab.rooms.create_room(&host).await.unwrap();
        let queue = room.queue();

        queue.add(&host.id, track("one", 100)).await.unwrap();
        let second = queue.add(&host.id, track("two", 100)).await.unwrap();
        let third = queue.add(&host.id, track("three", 100)).await.unwrap();

        let playback = room.playback();
        playback.play(None).await.unwrap();

        // `third` plays first. Two clients both report it finished.
        assert_eq!(
            playback.state().await.unwrap().current_song_id,
            Some(third.id)
        );

        let after_first = playback.advance_from(third.id).await.unwrap();
        let after_second = playback.advance_from(third.id).await.unwrap();

        assert_eq!(after_first.current_song_id, Some(second.id));
        assert_eq!(after_second.current_song_id, Some(second.id));

        let unplayed = queue.list(true).await.unwrap();
        assert_eq!(unplayed.len(), 2);
    }

    #[tokio::test]
    async fn removing_the_current_song_repairs_the_pointer() {
        let collab = collab_fixture();
        let host = host_user();
        let room = collab.rooms.create_room(&host).await.unwrap();
        let queue = room.queue();

        let first = queue.add(&host.id, track("one", 100)).await.unwrap();
        let second = queue.add(&host.id, track("two", 100)).await.unwrap();

        let playback = room.playback();
        playback.play(None).await.unwrap();
        assert_eq!(
            playback.state().await.unwrap().current_song_id,
            Some(second.id)
        );

        queue.remove(second.id).await.unwrap();

        let state = playback.state().await.unwrap();
        assert_eq!(state.current_song_id, Some(first.id));
        assert_eq!(state.position_secs, 0.);
    }

    #[tokio::test]
    async fn new_participants_see_a_paused_view() {
        let collab = collab_fixture();
        let host = host_user();
        let room = collab.rooms.create_room(&host).await.unwrap();
        room.queue().add(&host.id, track("one", 100)).await.unwrap();

        let playback = room.playback();
        playback.play(None).await.unwrap();

        let view = playback.state_for_new_participant().await.unwrap();
        assert!(!view.is_playing);

        // The authoritative state is untouched
        assert!(playback.state().await.unwrap().is_playing);
    }
}
