use std::collections::HashMap;

use thiserror::Error;

use crate::{
    CollabContext, CollabEvent, Database, DatabaseError, RoomCode, SongId, Tally, VoteData,
    VoteDirection,
};

/// The at-most-one-vote-per-song ledger for a room.
pub struct VoteLedger<Db> {
    context: CollabContext<Db>,
    room_code: RoomCode,
}

#[derive(Debug, Error)]
pub enum VoteError {
    #[error("Room is closed")]
    RoomClosed,
    #[error("Song does not belong to this room")]
    ForeignSong,
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

/// What a cast did to the voter's stored vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    Added(VoteDirection),
    Flipped(VoteDirection),
    Removed(VoteDirection),
}

/// Tally adjustment produced by a cast, so a cached tally can be
/// updated without a full re-read.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TallyDelta {
    pub up: i32,
    pub down: i32,
}

impl VoteOutcome {
    pub fn delta(&self) -> TallyDelta {
        match self {
            Self::Added(VoteDirection::Up) => TallyDelta { up: 1, down: 0 },
            Self::Added(VoteDirection::Down) => TallyDelta { up: 0, down: 1 },
            Self::Flipped(VoteDirection::Up) => TallyDelta { up: 1, down: -1 },
            Self::Flipped(VoteDirection::Down) => TallyDelta { up: -1, down: 1 },
            Self::Removed(VoteDirection::Up) => TallyDelta { up: -1, down: 0 },
            Self::Removed(VoteDirection::Down) => TallyDelta { up: 0, down: -1 },
        }
    }
}

impl<Db> VoteLedger<Db>
where
    Db: Database,
{
    pub(crate) fn new(context: &CollabContext<Db>, room_code: RoomCode) -> Self {
        Self {
            context: context.clone(),
            room_code,
        }
    }

    /// Casts a vote. Same direction twice toggles the vote off, the
    /// opposite direction flips it.
    pub async fn cast(
        &self,
        song_id: SongId,
        voter: &str,
        direction: VoteDirection,
    ) -> Result<VoteOutcome, VoteError> {
        self.require_active().await?;
        self.owned_song(song_id).await?;

        let existing = match self.context.database.vote(song_id, voter).await {
            Ok(vote) => Some(vote.direction),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };

        let outcome = match existing {
            Some(current) if current == direction => {
                self.context.database.delete_vote(song_id, voter).await?;
                VoteOutcome::Removed(direction)
            }
            Some(_) => {
                self.store(song_id, voter, direction).await?;
                VoteOutcome::Flipped(direction)
            }
            None => {
                self.store(song_id, voter, direction).await?;
                VoteOutcome::Added(direction)
            }
        };

        self.notify().await?;
        Ok(outcome)
    }

    /// Up and down counts for the given songs. Songs without votes are
    /// absent from the map.
    pub async fn tally(&self, song_ids: &[SongId]) -> Result<HashMap<SongId, Tally>, VoteError> {
        let votes = self.context.database.votes_by_songs(song_ids).await?;
        let mut tallies: HashMap<SongId, Tally> = HashMap::new();

        for vote in votes {
            let tally = tallies.entry(vote.song_id).or_default();

            match vote.direction {
                VoteDirection::Up => tally.up += 1,
                VoteDirection::Down => tally.down += 1,
            }
        }

        Ok(tallies)
    }

    /// The voter's current choice on a song, if they have one.
    pub async fn choice(
        &self,
        song_id: SongId,
        voter: &str,
    ) -> Result<Option<VoteDirection>, VoteError> {
        match self.context.database.vote(song_id, voter).await {
            Ok(vote) => Ok(Some(vote.direction)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn store(
        &self,
        song_id: SongId,
        voter: &str,
        direction: VoteDirection,
    ) -> Result<(), DatabaseError> {
        self.context
            .database
            .upsert_vote(VoteData {
                song_id,
                user_id: voter.to_string(),
                direction,
            })
            .await
    }

    async fn require_active(&self) -> Result<(), VoteError> {
        if self.context.room_is_active(&self.room_code).await? {
            Ok(())
        } else {
            Err(VoteError::RoomClosed)
        }
    }

    async fn owned_song(&self, song_id: SongId) -> Result<(), VoteError> {
        let song = self.context.database.song_by_id(song_id).await?;

        if song.room_code != self.room_code {
            return Err(VoteError::ForeignSong);
        }

        Ok(())
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
    use crate::testing::{collab_fixture, host_user, track, user};

    #[tokio::test]
    async fn repeating_a_vote_toggles_it_off() {
        let collab = collab_fixture();
        let host = host_user();
        let room = collab.rooms.create_room(&host).await.unwrap();
        let song = room.queue().add(&host.id, track("one", 100)).await.unwrap();
        let votes = room.votes();

        let first = votes
            .cast(song.id, &host.id, VoteDirection::Up)
            .await
            .unwrap();
        let second = votes
            .cast(song.id, &host.id, VoteDirection::Up)
            .await
            .unwrap();

        assert_eq!(first, VoteOutcome::Added(VoteDirection::Up));
        assert_eq!(second, VoteOutcome::Removed(VoteDirection::Up));
        assert_eq!(votes.choice(song.id, &host.id).await.unwrap(), None);
        assert!(votes.tally(&[song.id]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn opposite_vote_flips_without_intermediate_state() {
        let collab = collab_fixture();
        let host = host_user();
        let room = collab.rooms.create_room(&host).await.unwrap();
        let song = room.queue().add(&host.id, track("one", 100)).await.unwrap();
        let votes = room.votes();

        votes
            .cast(song.id, &host.id, VoteDirection::Up)
            .await
            .unwrap();
        let outcome = votes
            .cast(song.id, &host.id, VoteDirection::Down)
            .await
            .unwrap();

        assert_eq!(outcome, VoteOutcome::Flipped(VoteDirection::Down));
        assert_eq!(
            votes.choice(song.id, &host.id).await.unwrap(),
            Some(VoteDirection::Down)
        );

        let tally = votes.tally(&[song.id]).await.unwrap()[&song.id];
        assert_eq!(tally, Tally { up: 0, down: 1 });
    }

    #[tokio::test]
    async fn tallies_aggregate_across_voters() {
        let collab = collab_fixture();
        let host = host_user();
        let room = collab.rooms.create_room(&host).await.unwrap();
        let song = room.queue().add(&host.id, track("one", 100)).await.unwrap();
        let votes = room.votes();

        let alice = user("alice");
        let bob = user("bob");
        room.join(&alice).await.unwrap();
        room.join(&bob).await.unwrap();

        votes
            .cast(song.id, &host.id, VoteDirection::Up)
            .await
            .unwrap();
        votes
            .cast(song.id, &alice.id, VoteDirection::Up)
            .await
            .unwrap();
        votes
            .cast(song.id, &bob.id, VoteDirection::Down)
            .await
            .unwrap();

        let tally = votes.tally(&[song.id]).await.unwrap()[&song.id];
        assert_eq!(tally, Tally { up: 2, down: 1 });
        assert_eq!(tally.score(), 1);
    }

    #[tokio::test]
    async fn outcome_deltas_match_their_transitions() {
        assert_eq!(
            VoteOutcome::Added(VoteDirection::Up).delta(),
            TallyDelta { up: 1, down: 0 }
        );
        assert_eq!(
            VoteOutcome::Flipped(VoteDirection::Up).delta(),
            TallyDelta { up: 1, down: -1 }
        );
        assert_eq!(
            VoteOutcome::Removed(VoteDirection::Down).delta(),
            TallyDelta { up: 0, down: -1 }
        );
    }

    #[tokio::test]
    async fn closed_rooms_refuse_votes() {
        let collab = collab_fixture();
        let host = host_user();
        let room = collab.rooms.create_room(&host).await.unwrap();
        let song = room.queue().add(&host.id, track("one", 100)).await.unwrap();
        let votes = room.votes();

        votes
            .cast(song.id, &host.id, VoteDirection::Up)
            .await
            .unwrap();
        room.close(&host.id).await.unwrap();

        let err = votes
            .cast(song.id, &host.id, VoteDirection::Down)
            .await
            .unwrap_err();
        assert!(matches!(err, VoteError::RoomClosed));

        // The stored vote is untouched and still readable
        assert_eq!(
            votes.choice(song.id, &host.id).await.unwrap(),
            Some(VoteDirection::Up)
        );
    }

    #[tokio::test]
    async fn votes_are_fenced_to_the_room() {
        let collab = collab_fixture();
        let host = host_user();
        let room_a = collab.rooms.create_room(&host).await.unwrap();
        let room_b = collab.rooms.create_room(&host).await.unwrap();

        let song = room_a
            .queue()
            .add(&host.id, track("one", 100))
            .await
            .unwrap();

        let err = room_b
            .votes()
            .cast(song.id, &host.id, VoteDirection::Up)
            .await
            .unwrap_err();

        assert!(matches!(err, VoteError::ForeignSong));
    }
}
