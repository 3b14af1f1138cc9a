use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{Database, RoomCode};

/// Hint that a room's state changed and a re-read is warranted. Carries
/// no payload, clients fetch what they need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomChanged {
    pub room_code: RoomCode,
}

/// A stream of change hints for one room. Dropping it releases the
/// underlying subscription or polling task.
pub struct ChangeSubscription {
    receiver: mpsc::UnboundedReceiver<RoomChanged>,
    _guard: SubscriptionGuard,
}

enum SubscriptionGuard {
    Push {
        feed: Arc<PushFeed>,
        room_code: RoomCode,
        id: u64,
    },
    Task(JoinHandle<()>),
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        match self {
            Self::Push {
                feed,
                room_code,
                id,
            } => feed.unsubscribe(room_code, *id),
            Self::Task(handle) => handle.abort(),
        }
    }
}

impl ChangeSubscription {
    /// Waits for the next hint. Returns None when the feed shut down.
    pub async fn next(&mut self) -> Option<RoomChanged> {
        self.receiver.recv().await
    }
}

/// The push half of the change notifier: in-process fan-out of hints to
/// per-room subscribers.
#[derive(Default)]
pub struct PushFeed {
    subscribers: DashMap<RoomCode, Vec<(u64, mpsc::UnboundedSender<RoomChanged>)>>,
    counter: AtomicU64,
}

impl PushFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers a hint to everyone subscribed to the room.
    pub fn publish(&self, room_code: &str) {
        if let Some(mut subscribers) = self.subscribers.get_mut(room_code) {
            subscribers.retain(|(_, sender)| {
                sender
                    .send(RoomChanged {
                        room_code: room_code.to_string(),
                    })
                    .is_ok()
            });
        }
    }

    pub fn subscribe(self: &Arc<Self>, room_code: &str) -> ChangeSubscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.counter.fetch_add(1, Ordering::SeqCst);

        self.subscribers
            .entry(room_code.to_string())
            .or_default()
            .push((id, sender));

        ChangeSubscription {
            receiver,
            _guard: SubscriptionGuard::Push {
                feed: self.clone(),
                room_code: room_code.to_string(),
                id,
            },
        }
    }

    /// Severs every subscription, as a lost transport would.
    pub fn disconnect_all(&self) {
        self.subscribers.clear();
    }

    fn unsubscribe(&self, room_code: &str, id: u64) {
        if let Some(mut subscribers) = self.subscribers.get_mut(room_code) {
            subscribers.retain(|(other, _)| *other != id);
        }
    }
}

/// The fallback half of the change notifier: watches a room's
/// last-modified marker at a fixed interval and emits a hint whenever
/// it moves.
pub struct PollingFeed<Db> {
    database: Arc<Db>,
    interval: Duration,
}

impl<Db> PollingFeed<Db>
where
    Db: Database,
{
    pub fn new(database: &Arc<Db>, interval: Duration) -> Self {
        Self {
            database: database.clone(),
            interval,
        }
    }

    pub fn subscribe(&self, room_code: &str) -> ChangeSubscription {
        let (sender, receiver) = mpsc::unbounded_channel();

        let database = self.database.clone();
        let interval = self.interval;
        let room_code = room_code.to_string();

        let handle = tokio::spawn(async move {
            let mut last_seen: Option<DateTime<Utc>> = None;

            loop {
                // Room gone means the feed is over
                let Ok(room) = database.room_by_code(&room_code).await else {
                    break;
                };

                match last_seen {
                    // First read establishes the baseline without a hint
                    None => last_seen = Some(room.updated_at),
                    Some(seen) if room.updated_at > seen => {
                        last_seen = Some(room.updated_at);

                        let hint = RoomChanged {
                            room_code: room_code.clone(),
                        };

                        if sender.send(hint).is_err() {
                            break;
                        }
                    }
                    Some(_) => {}
                }

                tokio::time::sleep(interval).await;
            }
        });

        ChangeSubscription {
            receiver,
            _guard: SubscriptionGuard::Task(handle),
        }
    }
}

impl<Db> Clone for PollingFeed<Db> {
    fn clone(&self) -> Self {
        Self {
            database: self.database.clone(),
            interval: self.interval,
        }
    }
}

/// The notifier clients actually subscribe to. Prefers push delivery
/// and degrades to polling the store while the push channel is down,
/// switching back as soon as push delivers again. Subscribers see one
/// uninterrupted stream either way.
pub struct ResilientFeed<Db> {
    push: Arc<PushFeed>,
    polling: PollingFeed<Db>,
}

impl<Db> ResilientFeed<Db>
where
    Db: Database,
{
    pub fn new(push: Arc<PushFeed>, polling: PollingFeed<Db>) -> Self {
        Self { push, polling }
    }

    pub fn subscribe(&self, room_code: &str) -> ChangeSubscription {
        let (sender, receiver) = mpsc::unbounded_channel();

        let push = self.push.clone();
        let polling = self.polling.clone();
        let room_code = room_code.to_string();

        // Attach to the push feed before the task is spawned, so hints
        // published before its first poll are not lost
        let mut subscription = push.subscribe(&room_code);

        let handle = tokio::spawn(async move {
            loop {
                // Healthy path: forward push hints until the channel dies
                while let Some(hint) = subscription.next().await {
                    if sender.send(hint).is_err() {
                        return;
                    }
                }

                drop(subscription);

                // Degraded path: poll the store, and keep a probe on the
                // push channel so recovery is noticed immediately
                let mut fallback = polling.subscribe(&room_code);
                let mut probe = push.subscribe(&room_code);

                subscription = loop {
                    tokio::select! {
                        hint = fallback.next() => {
                            let Some(hint) = hint else { return };

                            if sender.send(hint).is_err() {
                                return;
                            }
                        }
                        hint = probe.next() => {
                            match hint {
                                // The probe delivered, push is healthy
                                // again. It stays attached, so nothing
                                // slips by during the switch.
                                Some(hint) => {
                                    let _ = sender.send(hint);
                                    break probe;
                                }
                                // Probe got severed too, re-arm it
                                None => probe = push.subscribe(&room_code),
                            }
                        }
                    }
                };
            }
        });

        ChangeSubscription {
            receiver,
            _guard: SubscriptionGuard::Task(handle),
        }
    }
}
