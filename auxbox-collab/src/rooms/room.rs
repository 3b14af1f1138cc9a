use log::info;
use parking_lot::Mutex;

use super::RoomError;
use crate::{
    CollabContext, CollabEvent, Database, NewParticipant, ParticipantData, Playback, RoomCode,
    RoomData, SongQueue, UserData, VoteLedger,
};

/// A single room. Holds a cached copy of the room row and hands out
/// the queue, vote, and playback handles scoped to it.
pub struct Room<Db> {
    context: CollabContext<Db>,
    data: Mutex<RoomData>,
}

impl<Db> Room<Db>
where
    Db: Database,
{
    pub(crate) fn new(context: &CollabContext<Db>, data: RoomData) -> Self {
        Self {
            context: context.clone(),
            data: Mutex::new(data),
        }
    }

    pub fn data(&self) -> RoomData {
        self.data.lock().clone()
    }

    pub fn code(&self) -> RoomCode {
        self.data.lock().code.clone()
    }

    pub fn is_active(&self) -> bool {
        self.data.lock().is_active
    }

    pub fn require_active(&self) -> Result<(), RoomError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(RoomError::RoomClosed)
        }
    }

    /// The membership record of a user, if they have one.
    pub fn participant(&self, user_id: &str) -> Result<ParticipantData, RoomError> {
        self.data
            .lock()
            .participants
            .iter()
            .find(|p| p.user_id == user_id)
            .cloned()
            .ok_or(RoomError::NotAParticipant)
    }

    /// Adds a user as a member. Rejoining is a no-op that returns the
    /// existing record. The boolean is true when membership was created.
    pub async fn join(&self, user: &UserData) -> Result<(ParticipantData, bool), RoomError> {
        self.require_active()?;

        if let Ok(existing) = self.participant(&user.id) {
            return Ok((existing, false));
        }

        let code = self.code();

        let result = self
            .context
            .database
            .create_participant(NewParticipant {
                room_code: code.clone(),
                user_id: user.id.clone(),
                display_name: user.display_name.clone(),
                is_host: false,
            })
            .await;

        let new_participant = match result {
            Ok(participant) => participant,
            // Raced another join for the same user
            Err(e) if e.is_conflict() => {
                let existing = self.context.database.participant(&code, &user.id).await?;
                self.data.lock().participants.push(existing.clone());
                return Ok((existing, false));
            }
            Err(e) => return Err(e.into()),
        };

        self.data.lock().participants.push(new_participant.clone());
        self.context.database.touch_room(&code).await?;

        self.context.emit(CollabEvent::UserJoined {
            room_code: code.clone(),
            new_participant: new_participant.clone(),
        });

        info!("{} joined room {}", new_participant.display_name, code);
        Ok((new_participant, true))
    }

    /// Permanently deactivates the room. Host only. State stays readable
    /// for members, but joins and control actions stop.
    pub async fn close(&self, acting_user_id: &str) -> Result<(), RoomError> {
        let actor = self.participant(acting_user_id)?;

        if !actor.is_host {
            return Err(RoomError::NotHost);
        }

        let code = self.code();

        self.context.database.set_room_active(&code, false).await?;
        self.data.lock().is_active = false;

        self.context.emit(CollabEvent::RoomClosed {
            room_code: code.clone(),
        });

        info!("Room {} closed by its host", code);
        Ok(())
    }

    pub fn queue(&self) -> SongQueue<Db> {
        SongQueue::new(&self.context, self.code())
    }

    pub fn votes(&self) -> VoteLedger<Db> {
        VoteLedger::new(&self.context, self.code())
    }

    pub fn playback(&self) -> Playback<Db> {
        Playback::new(&self.context, self.code())
    }
}
