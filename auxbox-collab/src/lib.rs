mod auth;
mod changefeed;
mod config;
mod db;
mod events;
mod input;
mod playback;
mod queue;
mod rooms;
mod util;
mod votes;

use std::sync::Arc;

use crossbeam::channel::unbounded;
use dashmap::DashMap;

pub use auth::*;
pub use changefeed::*;
pub use config::*;
pub use db::*;
pub use events::*;
pub use input::*;
pub use playback::*;
pub use queue::*;
pub use rooms::*;
pub use votes::*;

/// The auxbox collab system, facilitating rooms, shared queues, votes,
/// and synchronized playback.
pub struct Collab<Db> {
    context: CollabContext<Db>,
    event_receiver: EventReceiver,

    pub auth: Auth<Db>,
    pub rooms: RoomManager<Db>,
}

/// A type passed to various components of the collab system, to access
/// state, emit events, and dispatch actions.
pub struct CollabContext<Db> {
    pub config: CollabConfig,
    pub database: Arc<Db>,
    pub metadata: Arc<MetadataClient>,
    pub changes: Arc<PushFeed>,

    pub rooms: Arc<DashMap<RoomCode, Arc<Room<Db>>>>,

    event_sender: EventSender,
}

impl<Db> Collab<Db>
where
    Db: Database,
{
    pub fn new(database: Db, config: CollabConfig) -> Self {
        Self::from_shared(Arc::new(database), config)
    }

    pub fn from_shared(database: Arc<Db>, config: CollabConfig) -> Self {
        let (event_sender, event_receiver) = unbounded();
        let metadata = Arc::new(MetadataClient::new(config.youtube_api_key.clone()));

        let context = CollabContext {
            config,
            database,
            metadata,
            changes: Arc::new(PushFeed::new()),

            rooms: Default::default(),

            event_sender,
        };

        let auth = Auth::new(&context.database);
        let rooms = RoomManager::new(&context);

        Self {
            context,
            event_receiver,
            auth,
            rooms,
        }
    }

    /// Loads persisted state into memory. Called once on startup.
    pub async fn init(&self) -> Result<()> {
        self.rooms.restore().await
    }

    pub fn context(&self) -> CollabContext<Db> {
        self.context.clone()
    }

    /// Blocks until an event is emitted, then returns it.
    pub fn wait_for_event(&self) -> CollabEvent {
        self.event_receiver
            .recv()
            .expect("event sender is never dropped while collab lives")
    }

    /// A change feed that prefers push delivery and falls back to
    /// polling the store when push is unavailable.
    pub fn change_feed(&self) -> ResilientFeed<Db> {
        ResilientFeed::new(
            self.context.changes.clone(),
            PollingFeed::new(&self.context.database, self.context.config.poll_interval),
        )
    }
}

impl<Db> CollabContext<Db>
where
    Db: Database,
{
    /// Emits an event to the server layer and nudges the room's change
    /// feed subscribers.
    pub fn emit(&self, event: CollabEvent) {
        self.changes.publish(event.room_code());

        self.event_sender.send(event).expect("event is sent");
    }

    /// Whether a room still accepts control actions. Reads stay allowed
    /// on closed rooms, mutations check this first.
    pub(crate) async fn room_is_active(&self, code: &str) -> Result<bool> {
        if let Some(room) = self.rooms.get(code) {
            return Ok(room.is_active());
        }

        Ok(self.database.room_by_code(code).await?.is_active)
    }
}

impl<Db> Clone for CollabContext<Db>
where
    Db: Database,
{
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            database: self.database.clone(),
            metadata: self.metadata.clone(),
            changes: self.changes.clone(),

            rooms: self.rooms.clone(),

            event_sender: self.event_sender.clone(),
        }
    }
}
