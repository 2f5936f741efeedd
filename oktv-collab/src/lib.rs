//! The domain layer of OkTV: rooms, queues, participants, search, and the
//! reconciler that keeps shared playback state consistent.

use std::sync::Arc;

use crossbeam::channel::unbounded;

pub mod config;
pub mod events;
pub mod rooms;
pub mod search;
pub mod sessions;
pub mod store;

pub use config::CollabConfig;
pub use events::{CollabEvent, EventReceiver, EventSender};
pub use rooms::{RoomError, RoomManager};
pub use search::{SearchError, SearchProvider, VideoResult, YouTubeSearch};
pub use sessions::{SessionContext, SessionError, SessionRequest, Sessions};

use store::RoomStore;

/// The collab system as a whole.
pub struct Collab<S, P> {
    store: Arc<S>,
    pub rooms: RoomManager<S>,
    pub sessions: Sessions<S>,
    pub search: Arc<P>,
    pub config: CollabConfig,
    event_receiver: EventReceiver,
}

/// A cheaply clonable handle to the pieces every component needs.
pub struct CollabContext<S> {
    pub store: Arc<S>,
    pub config: CollabConfig,
    event_sender: EventSender,
}

impl<S, P> Collab<S, P>
where
    S: RoomStore,
    P: SearchProvider,
{
    pub fn new(store: S, search: P, config: CollabConfig) -> Self {
        let (event_sender, event_receiver) = unbounded();
        let store = Arc::new(store);

        let context = CollabContext {
            store: store.clone(),
            config: config.clone(),
            event_sender,
        };

        Self {
            rooms: RoomManager::new(&context),
            sessions: Sessions::new(&context),
            search: Arc::new(search),
            store,
            config,
            event_receiver,
        }
    }

    /// Blocks until an event is emitted by any component.
    pub fn wait_for_event(&self) -> CollabEvent {
        self.event_receiver
            .recv()
            .expect("event channel is never closed while collab is alive")
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

impl<S> CollabContext<S> {
    /// Emits an event to whatever is draining the bus. Dropped silently when
    /// no one is listening anymore.
    pub fn emit(&self, event: CollabEvent) {
        self.event_sender.send(event).ok();
    }
}

impl<S> Clone for CollabContext<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            config: self.config.clone(),
            event_sender: self.event_sender.clone(),
        }
    }
}

#[cfg(test)]
impl CollabContext<store::MemoryStore> {
    pub fn mock() -> (Self, EventReceiver) {
        Self::mock_with_config(CollabConfig::default())
    }

    pub fn mock_with_config(config: CollabConfig) -> (Self, EventReceiver) {
        let (event_sender, event_receiver) = unbounded();

        let context = Self {
            store: Arc::new(store::MemoryStore::new()),
            config,
            event_sender,
        };

        (context, event_receiver)
    }
}
