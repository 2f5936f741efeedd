use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

mod data;
mod memory;

pub use data::*;
pub use memory::MemoryStore;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0}")]
    Internal(String),
    #[error("{resource} with identifier {identifier} already exists")]
    Conflict {
        resource: &'static str,
        identifier: String,
    },
    #[error("{resource} with identifier {identifier} does not exist")]
    NotFound {
        resource: &'static str,
        identifier: String,
    },
}

/// Which part of a room document changed. Published on the room's
/// subscription channel after every successful mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomChange {
    Queue,
    CurrentSong,
    PlayerFlags,
    Users,
}

/// A realtime multi-writer room store.
///
/// Multi-field updates are separate calls and are not transactional. Writers
/// race at single-key granularity, first write wins, and the reconciler is
/// responsible for converging whatever interleaving results.
#[async_trait]
pub trait RoomStore: Send + Sync + 'static {
    async fn create_room(&self, id: &RoomId) -> Result<RoomData>;
    async fn room_exists(&self, id: &RoomId) -> Result<bool>;
    async fn room_by_id(&self, id: &RoomId) -> Result<RoomData>;

    async fn current_song(&self, id: &RoomId) -> Result<Option<Song>>;
    async fn set_current_song(&self, id: &RoomId, song: Option<Song>) -> Result<()>;

    async fn player_flags(&self, id: &RoomId) -> Result<PlayerFlags>;
    async fn set_player_flags(&self, id: &RoomId, flags: PlayerFlags) -> Result<()>;

    async fn queue(&self, id: &RoomId) -> Result<Vec<Song>>;
    /// Appends a song, assigning its key. Returns the stored entry.
    async fn queue_push(&self, id: &RoomId, song: NewSong) -> Result<Song>;
    /// Removes and returns the entry with the given key.
    async fn queue_remove(&self, id: &RoomId, key: &SongKey) -> Result<Song>;
    /// Removes and returns the queue head, if any.
    async fn queue_pop_front(&self, id: &RoomId) -> Result<Option<Song>>;
    /// Atomically promotes the queue head to current. Returns the promoted
    /// song, or `None` when a current song already exists or the queue is
    /// empty. Concurrent callers racing over the same head see exactly one
    /// winner.
    async fn promote_head(&self, id: &RoomId) -> Result<Option<Song>>;

    async fn users(&self, id: &RoomId) -> Result<Vec<User>>;
    /// Registers a user, assigning their id. The admin gets the sentinel id.
    async fn add_user(&self, id: &RoomId, user: NewUser) -> Result<User>;
    async fn remove_user(&self, id: &RoomId, user_id: &UserId) -> Result<()>;
    async fn user_by_id(&self, id: &RoomId, user_id: &UserId) -> Result<Option<User>>;
    async fn user_by_name(&self, id: &RoomId, name: &str) -> Result<Option<User>>;
    /// Refreshes the user's `last_seen` timestamp.
    async fn touch_user(&self, id: &RoomId, user_id: &UserId) -> Result<()>;
    async fn set_user_mic(
        &self,
        id: &RoomId,
        user_id: &UserId,
        mic_on: Option<bool>,
        muted_by_admin: Option<bool>,
    ) -> Result<User>;

    /// Returns a receiver of change notifications for the given room.
    /// Subscribing to a room that does not exist yet is allowed.
    fn subscribe(&self, id: &RoomId) -> broadcast::Receiver<RoomChange>;
}
