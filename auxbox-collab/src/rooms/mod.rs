mod room;

use std::sync::Arc;

use log::info;
use thiserror::Error;

pub use room::Room;

use crate::{
    util::room_code, CollabContext, Database, DatabaseError, NewParticipant, NewPlayback, NewRoom,
    UserData,
};

/// Creates rooms and hands out their process-wide handles.
pub struct RoomManager<Db> {
    context: CollabContext<Db>,
}

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Room is closed")]
    RoomClosed,
    #[error("User is not a participant of this room")]
    NotAParticipant,
    #[error("Only the host can do this")]
    NotHost,
    #[error(transparent)]
    Db(#[from] DatabaseError),
}

impl<Db> RoomManager<Db>
where
    Db: Database,
{
    pub fn new(context: &CollabContext<Db>) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Loads existing rooms into the registry. Called once on startup.
    pub async fn restore(&self) -> Result<(), DatabaseError> {
        let rooms = self.context.database.list_rooms().await?;
        let amount = rooms.len();

        for data in rooms {
            let room = Arc::new(Room::new(&self.context, data));
            self.context.rooms.insert(room.code(), room);
        }

        info!("Restored {} room(s)", amount);
        Ok(())
    }

    /// Creates a room with a fresh code and the creator as host.
    pub async fn create_room(&self, host: &UserData) -> Result<Arc<Room<Db>>, RoomError> {
        let created = loop {
            let code = room_code(self.context.config.room_code_length);

            let result = self
                .context
                .database
                .create_room(NewRoom {
                    code,
                    host_id: host.id.clone(),
                })
                .await;

            match result {
                Ok(data) => break data,
                // Code collision, roll a new one
                Err(e) if e.is_conflict() => continue,
                Err(e) => return Err(e.into()),
            }
        };

        self.context
            .database
            .create_participant(NewParticipant {
                room_code: created.code.clone(),
                user_id: host.id.clone(),
                display_name: host.display_name.clone(),
                is_host: true,
            })
            .await?;

        self.context
            .database
            .create_playback(NewPlayback {
                room_code: created.code.clone(),
                current_song_id: None,
                is_playing: false,
                position_secs: 0.,
            })
            .await?;

        let data = self.context.database.room_by_code(&created.code).await?;
        let room = Arc::new(Room::new(&self.context, data));

        self.context.rooms.insert(room.code(), room.clone());
        info!("Room {} created by {}", room.code(), host.display_name);

        Ok(room)
    }

    /// The room behind a code, registering it if this process has not
    /// seen it yet.
    pub async fn room_by_code(&self, code: &str) -> Result<Arc<Room<Db>>, RoomError> {
        if let Some(room) = self.context.rooms.get(code) {
            return Ok(room.clone());
        }

        let data = self.context.database.room_by_code(code).await?;
        let room = Arc::new(Room::new(&self.context, data));

        self.context.rooms.insert(room.code(), room.clone());
        Ok(room)
    }

    /// Every room this process knows about.
    pub fn list_all(&self) -> Vec<Arc<Room<Db>>> {
        self.context
            .rooms
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{collab_fixture, host_user, user};

    #[tokio::test]
    async fn created_rooms_have_a_host_and_come_back_by_code() {
        let collab = collab_fixture();
        let host = host_user();

        let room = collab.rooms.create_room(&host).await.unwrap();
        let code = room.code();

        assert_eq!(code.len(), 6);
        assert!(room.is_active());

        let participant = room.participant(&host.id).unwrap();
        assert!(participant.is_host);

        let found = collab.rooms.room_by_code(&code).await.unwrap();
        assert_eq!(found.code(), code);
    }

    #[tokio::test]
    async fn unknown_codes_surface_not_found() {
        let collab = collab_fixture();

        let result = collab.rooms.room_by_code("ZZZZZZ").await;
        assert!(matches!(result, Err(RoomError::Db(e)) if e.is_not_found()));
    }

    #[tokio::test]
    async fn restore_registers_persisted_rooms() {
        let collab = collab_fixture();
        let host = host_user();

        let room = collab.rooms.create_room(&host).await.unwrap();
        let code = room.code();

        // A fresh collab over the same database starts with an empty
        // registry until restore runs.
        let restored = crate::Collab::from_shared(
            collab.context().database.clone(),
            collab.context().config.clone(),
        );
        assert!(restored.rooms.list_all().is_empty());

        restored.rooms.restore().await.unwrap();
        assert!(restored.rooms.room_by_code(&code).await.is_ok());
    }

    #[tokio::test]
    async fn joining_is_idempotent() {
        let collab = collab_fixture();
        let host = host_user();
        let member = user("alice");

        let room = collab.rooms.create_room(&host).await.unwrap();

        let (first, is_new) = room.join(&member).await.unwrap();
        assert!(is_new);
        assert!(!first.is_host);

        let (second, is_new) = room.join(&member).await.unwrap();
        assert!(!is_new);
        assert_eq!(second.joined_at, first.joined_at);

        assert_eq!(room.data().participants.len(), 2);
    }

    #[tokio::test]
    async fn only_the_host_closes_a_room() {
        let collab = collab_fixture();
        let host = host_user();
        let member = user("alice");

        let room = collab.rooms.create_room(&host).await.unwrap();
        room.join(&member).await.unwrap();

        let err = room.close(&member.id).await.unwrap_err();
        assert!(matches!(err, RoomError::NotHost));

        room.close(&host.id).await.unwrap();
        assert!(!room.is_active());

        // Closed rooms refuse new joins but stay readable
        let late = user("bob");
        let err = room.join(&late).await.unwrap_err();
        assert!(matches!(err, RoomError::RoomClosed));
        assert!(room.participant(&member.id).is_ok());
    }

    #[tokio::test]
    async fn outsiders_are_not_participants() {
        let collab = collab_fixture();
        let host = host_user();
        let outsider = user("mallory");

        let room = collab.rooms.create_room(&host).await.unwrap();

        let err = room.participant(&outsider.id).unwrap_err();
        assert!(matches!(err, RoomError::NotAParticipant));
    }
}
