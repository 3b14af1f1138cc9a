mod ranking;

use std::collections::HashMap;

use thiserror::Error;

pub use ranking::*;

use crate::{
    CollabContext, CollabEvent, Database, DatabaseError, NewSong, RoomCode, SongData, SongId,
    TrackDetails, VoteDirection,
};

/// The per-room queue store. Raw reads come out in creation order;
/// display and play order is the ranking engine's job.
pub struct SongQueue<Db> {
    context: CollabContext<Db>,
    room_code: RoomCode,
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Room is closed")]
    RoomClosed,
    #[error("Song is already in the queue")]
    Duplicate,
    #[error("Song is longer than {limit} seconds")]
    TooLong { limit: u32 },
    #[error("Song does not belong to this room")]
    ForeignSong,
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

/// A song joined with its tally and the viewer's own vote.
#[derive(Debug, Clone)]
pub struct RankedSong {
    pub song: SongData,
    pub tally: Tally,
    pub viewer_vote: Option<VoteDirection>,
}

impl<Db> SongQueue<Db>
where
    Db: Database,
{
    pub(crate) fn new(context: &CollabContext<Db>, room_code: RoomCode) -> Self {
        Self {
            context: context.clone(),
            room_code,
        }
    }

    /// Adds a resolved track to the queue. Rejects songs over the duration
    /// cap and duplicates of an unplayed submission.
    pub async fn add(&self, submitter: &str, track: TrackDetails) -> Result<SongData, QueueError> {
        self.require_active().await?;

        let limit = self.context.config.max_song_duration_secs;

        if track.duration_secs > limit {
            return Err(QueueError::TooLong { limit });
        }

        let song = self
            .context
            .database
            .create_song(NewSong {
                room_code: self.room_code.clone(),
                video_id: track.video_id,
                title: track.title,
                thumbnail: track.thumbnail,
                duration_secs: track.duration_secs,
                added_by: submitter.to_string(),
            })
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    QueueError::Duplicate
                } else {
                    QueueError::Db(e)
                }
            })?;

        self.notify().await?;
        Ok(song)
    }

    /// Songs in creation order.
    pub async fn list(&self, unplayed_only: bool) -> Result<Vec<SongData>, QueueError> {
        Ok(self
            .context
            .database
            .songs_by_room(&self.room_code, unplayed_only)
            .await?)
    }

    /// The full queue in rank order, with tallies and the viewer's vote.
    pub async fn ranked(&self, viewer: Option<&str>) -> Result<Vec<RankedSong>, QueueError> {
        let songs = self.list(false).await?;
        let (tallies, own_votes) = self.tallies_for(&songs, viewer).await?;

        Ok(rank(&songs, &tallies)
            .into_iter()
            .map(|song| RankedSong {
                tally: tallies.get(&song.id).copied().unwrap_or_default(),
                viewer_vote: own_votes.get(&song.id).copied(),
                song,
            })
            .collect())
    }

    /// The song that should be playing right now, if any.
    pub async fn current(&self) -> Result<Option<SongData>, QueueError> {
        let songs = self.list(true).await?;
        let (tallies, _) = self.tallies_for(&songs, None).await?;

        Ok(current_song(&songs, &tallies))
    }

    /// Flips the played flag. Returns whether this call did the flip.
    pub async fn mark_played(&self, song_id: SongId) -> Result<bool, QueueError> {
        self.require_active().await?;
        self.owned_song(song_id).await?;

        let flipped = self.context.database.mark_song_played(song_id).await?;

        if flipped {
            self.notify().await?;
        }

        Ok(flipped)
    }

    /// Hard delete. The song's votes go with it.
    pub async fn remove(&self, song_id: SongId) -> Result<(), QueueError> {
        self.require_active().await?;
        self.owned_song(song_id).await?;
        self.context.database.delete_song(song_id).await?;
        self.notify().await?;

        Ok(())
    }

    async fn tallies_for(
        &self,
        songs: &[SongData],
        viewer: Option<&str>,
    ) -> Result<(HashMap<SongId, Tally>, HashMap<SongId, VoteDirection>), QueueError> {
        let ids: Vec<_> = songs.iter().map(|s| s.id).collect();
        let votes = self.context.database.votes_by_songs(&ids).await?;

        let mut tallies: HashMap<SongId, Tally> = HashMap::new();
        let mut own_votes = HashMap::new();

        for vote in votes {
            let tally = tallies.entry(vote.song_id).or_default();

            match vote.direction {
                VoteDirection::Up => tally.up += 1,
                VoteDirection::Down => tally.down += 1,
            }

            if viewer == Some(vote.user_id.as_str()) {
                own_votes.insert(vote.song_id, vote.direction);
            }
        }

        Ok((tallies, own_votes))
    }

    async fn require_active(&self) -> Result<(), QueueError> {
        if self.context.room_is_active(&self.room_code).await? {
            Ok(())
        } else {
            Err(QueueError::RoomClosed)
        }
    }

    async fn owned_song(&self, song_id: SongId) -> Result<SongData, QueueError> {
        let song = self.context.database.song_by_id(song_id).await?;

        if song.room_code != self.room_code {
            return Err(QueueError::ForeignSong);
        }

        Ok(song)
    }

    async fn notify(&self) -> Result<(), DatabaseError> {
        self.context.database.touch_room(&self.room_code).await?;

        self.context.emit(CollabEvent::QueueUpdate {
            room_code: self.room_code.clone(),
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{collab_fixture, host_user, track};

    #[tokio::test]
    async fn duplicate_unplayed_submission_is_rejected() {
        let collab = collab_fixture();
        let host = host_user();
        let room = collab.rooms.create_room(&host).await.unwrap();
        let queue = room.queue();

        queue.add(&host.id, track("abc", 200)).await.unwrap();
        let err = queue.add(&host.id, track("abc", 200)).await.unwrap_err();

        assert!(matches!(err, QueueError::Duplicate));
        assert_eq!(queue.list(false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn oversized_songs_are_rejected() {
        let collab = collab_fixture();
        let host = host_user();
        let room = collab.rooms.create_room(&host).await.unwrap();

        let err = room
            .queue()
            .add(&host.id, track("longone", 601))
            .await
            .unwrap_err();

        assert!(matches!(err, QueueError::TooLong { limit: 600 }));
    }

    #[tokio::test]
    async fn ranked_reflects_votes_and_viewer_choice() {
        let collab = collab_fixture();
        let host = host_user();
        let room = collab.rooms.create_room(&host).await.unwrap();
        let queue = room.queue();

        let first = queue.add(&host.id, track("one", 100)).await.unwrap();
        let second = queue.add(&host.id, track("two", 100)).await.unwrap();

        room.votes()
            .cast(first.id, &host.id, VoteDirection::Up)
            .await
            .unwrap();

        let ranked = queue.ranked(Some(&host.id)).await.unwrap();

        assert_eq!(ranked[0].song.id, first.id);
        assert_eq!(ranked[0].tally, Tally { up: 1, down: 0 });
        assert_eq!(ranked[0].viewer_vote, Some(VoteDirection::Up));
        assert_eq!(ranked[1].song.id, second.id);
        assert_eq!(ranked[1].viewer_vote, None);
    }

    #[tokio::test]
    async fn marking_played_excludes_from_current() {
        let collab = collab_fixture();
        let host = host_user();
        let room = collab.rooms.create_room(&host).await.unwrap();
        let queue = room.queue();

        let first = queue.add(&host.id, track("one", 100)).await.unwrap();
        let second = queue.add(&host.id, track("two", 100)).await.unwrap();

        // Newest-first tiebreak puts the second submission on top.
        assert_eq!(queue.current().await.unwrap().unwrap().id, second.id);

        assert!(queue.mark_played(second.id).await.unwrap());
        assert!(!queue.mark_played(second.id).await.unwrap());

        assert_eq!(queue.current().await.unwrap().unwrap().id, first.id);
    }

    #[tokio::test]
    async fn closed_rooms_refuse_queue_changes() {
        let collab = collab_fixture();
        let host = host_user();
        let room = collab.rooms.create_room(&host).await.unwrap();
        let queue = room.queue();

        let song = queue.add(&host.id, track("one", 100)).await.unwrap();
        room.close(&host.id).await.unwrap();

        assert!(matches!(
            queue.add(&host.id, track("two", 100)).await,
            Err(QueueError::RoomClosed)
        ));
        assert!(matches!(
            queue.remove(song.id).await,
            Err(QueueError::RoomClosed)
        ));

        // The queue stays readable after closing
        assert_eq!(queue.list(false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn removal_is_fenced_to_the_room() {
        let collab = collab_fixture();
        let host = host_user();
        let room_a = collab.rooms.create_room(&host).await.unwrap();
        let room_b = collab.rooms.create_room(&host).await.unwrap();

        let song = room_a
            .queue()
            .add(&host.id, track("one", 100))
            .await
            .unwrap();

        let err = room_b.queue().remove(song.id).await.unwrap_err();
        assert!(matches!(err, QueueError::ForeignSong));

        room_a.queue().remove(song.id).await.unwrap();
        assert!(room_a.queue().list(false).await.unwrap().is_empty());
    }
}
