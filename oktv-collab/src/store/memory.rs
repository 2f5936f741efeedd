use chrono::Utc;
use crossbeam::atomic::AtomicCell;
use dashmap::DashMap;
use tokio::sync::broadcast;

use async_trait::async_trait;

use super::{
    NewSong, NewUser, PlayerFlags, Result, RoomChange, RoomData, RoomId, RoomStore, Song, SongKey,
    StoreError, User, UserId, ADMIN_USER_ID,
};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// An in-memory [`RoomStore`]. Rooms live for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rooms: DashMap<RoomId, RoomDocument>,
    watchers: DashMap<RoomId, broadcast::Sender<RoomChange>>,
    key_counter: AtomicCell<u64>,
}

#[derive(Debug)]
struct RoomDocument {
    data: RoomData,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_key(&self) -> String {
        self.key_counter.fetch_add(1).to_string()
    }

    fn with_room<T, F>(&self, id: &RoomId, f: F) -> Result<T>
    where
        F: FnOnce(&mut RoomData) -> Result<T>,
    {
        let mut document = self.rooms.get_mut(id).ok_or(StoreError::NotFound {
            resource: "room",
            identifier: id.to_string(),
        })?;

        f(&mut document.data)
    }

    /// Publishes a change after the room guard has been dropped. Receivers
    /// that lagged or disconnected are ignored.
    fn publish(&self, id: &RoomId, change: RoomChange) {
        if let Some(sender) = self.watchers.get(id) {
            sender.send(change).ok();
        }
    }
}

#[async_trait]
impl RoomStore for MemoryStore {
    async fn create_room(&self, id: &RoomId) -> Result<RoomData> {
        if self.rooms.contains_key(id) {
            return Err(StoreError::Conflict {
                resource: "room",
                identifier: id.to_string(),
            });
        }

        let data = RoomData {
            id: id.clone(),
            created_at: Utc::now(),
            current_song: None,
            flags: PlayerFlags::default(),
            mic_feature_enabled: true,
            queue: vec![],
            users: vec![],
        };

        self.rooms
            .insert(id.clone(), RoomDocument { data: data.clone() });

        Ok(data)
    }

    async fn room_exists(&self, id: &RoomId) -> Result<bool> {
        Ok(self.rooms.contains_key(id))
    }

    async fn room_by_id(&self, id: &RoomId) -> Result<RoomData> {
        self.with_room(id, |room| Ok(room.clone()))
    }

    async fn current_song(&self, id: &RoomId) -> Result<Option<Song>> {
        self.with_room(id, |room| Ok(room.current_song.clone()))
    }

    async fn set_current_song(&self, id: &RoomId, song: Option<Song>) -> Result<()> {
        self.with_room(id, |room| {
            room.current_song = song;
            Ok(())
        })?;

        self.publish(id, RoomChange::CurrentSong);
        Ok(())
    }

    async fn player_flags(&self, id: &RoomId) -> Result<PlayerFlags> {
        self.with_room(id, |room| Ok(room.flags))
    }

    async fn set_player_flags(&self, id: &RoomId, flags: PlayerFlags) -> Result<()> {
        self.with_room(id, |room| {
            room.flags = flags;
            Ok(())
        })?;

        self.publish(id, RoomChange::PlayerFlags);
        Ok(())
    }

    async fn queue(&self, id: &RoomId) -> Result<Vec<Song>> {
        self.with_room(id, |room| Ok(room.queue.clone()))
    }

    async fn queue_push(&self, id: &RoomId, song: NewSong) -> Result<Song> {
        let key = self.next_key();

        let stored = self.with_room(id, |room| {
            let stored = Song {
                video_id: song.video_id,
                title: song.title,
                thumbnail: song.thumbnail,
                added_by: song.added_by,
                added_at: Utc::now(),
                key,
            };

            room.queue.push(stored.clone());
            Ok(stored)
        })?;

        self.publish(id, RoomChange::Queue);
        Ok(stored)
    }

    async fn queue_remove(&self, id: &RoomId, key: &SongKey) -> Result<Song> {
        let removed = self.with_room(id, |room| {
            let position = room
                .queue
                .iter()
                .position(|song| &song.key == key)
                .ok_or(StoreError::NotFound {
                    resource: "song",
                    identifier: key.clone(),
                })?;

            Ok(room.queue.remove(position))
        })?;

        self.publish(id, RoomChange::Queue);
        Ok(removed)
    }

    async fn queue_pop_front(&self, id: &RoomId) -> Result<Option<Song>> {
        let popped = self.with_room(id, |room| {
            if room.queue.is_empty() {
                Ok(None)
            } else {
                Ok(Some(room.queue.remove(0)))
            }
        })?;

        if popped.is_some() {
            self.publish(id, RoomChange::Queue);
        }

        Ok(popped)
    }

    async fn promote_head(&self, id: &RoomId) -> Result<Option<Song>> {
        let promoted = self.with_room(id, |room| {
            if room.current_song.is_some() || room.queue.is_empty() {
                return Ok(None);
            }

            let song = room.queue.remove(0);
            room.current_song = Some(song.clone());
            Ok(Some(song))
        })?;

        if promoted.is_some() {
            self.publish(id, RoomChange::Queue);
            self.publish(id, RoomChange::CurrentSong);
        }

        Ok(promoted)
    }

    async fn users(&self, id: &RoomId) -> Result<Vec<User>> {
        self.with_room(id, |room| Ok(room.users.clone()))
    }

    async fn add_user(&self, id: &RoomId, user: NewUser) -> Result<User> {
        let assigned_id = if user.is_admin {
            ADMIN_USER_ID.to_string()
        } else {
            self.next_key()
        };

        let stored = self.with_room(id, |room| {
            if user.is_admin && room.users.iter().any(|u| u.is_admin) {
                return Err(StoreError::Conflict {
                    resource: "user",
                    identifier: ADMIN_USER_ID.to_string(),
                });
            }

            let now = Utc::now();
            let stored = User {
                id: assigned_id,
                name: user.name,
                is_admin: user.is_admin,
                joined_at: now,
                last_seen: now,
                mic_on: false,
                muted_by_admin: false,
            };

            room.users.push(stored.clone());
            Ok(stored)
        })?;

        self.publish(id, RoomChange::Users);
        Ok(stored)
    }

    async fn remove_user(&self, id: &RoomId, user_id: &UserId) -> Result<()> {
        self.with_room(id, |room| {
            let position = room
                .users
                .iter()
                .position(|user| &user.id == user_id)
                .ok_or(StoreError::NotFound {
                    resource: "user",
                    identifier: user_id.clone(),
                })?;

            room.users.remove(position);
            Ok(())
        })?;

        self.publish(id, RoomChange::Users);
        Ok(())
    }

    async fn user_by_id(&self, id: &RoomId, user_id: &UserId) -> Result<Option<User>> {
        self.with_room(id, |room| {
            Ok(room.users.iter().find(|user| &user.id == user_id).cloned())
        })
    }

    async fn user_by_name(&self, id: &RoomId, name: &str) -> Result<Option<User>> {
        self.with_room(id, |room| {
            Ok(room.users.iter().find(|user| user.name == name).cloned())
        })
    }

    async fn touch_user(&self, id: &RoomId, user_id: &UserId) -> Result<()> {
        self.with_room(id, |room| {
            let user = room
                .users
                .iter_mut()
                .find(|user| &user.id == user_id)
                .ok_or(StoreError::NotFound {
                    resource: "user",
                    identifier: user_id.clone(),
                })?;

            user.last_seen = Utc::now();
            Ok(())
        })
    }

    async fn set_user_mic(
        &self,
        id: &RoomId,
        user_id: &UserId,
        mic_on: Option<bool>,
        muted_by_admin: Option<bool>,
    ) -> Result<User> {
        let updated = self.with_room(id, |room| {
            let user = room
                .users
                .iter_mut()
                .find(|user| &user.id == user_id)
                .ok_or(StoreError::NotFound {
                    resource: "user",
                    identifier: user_id.clone(),
                })?;

            if let Some(mic_on) = mic_on {
                user.mic_on = mic_on;
            }

            if let Some(muted) = muted_by_admin {
                user.muted_by_admin = muted;
            }

            Ok(user.clone())
        })?;

        self.publish(id, RoomChange::Users);
        Ok(updated)
    }

    fn subscribe(&self, id: &RoomId) -> broadcast::Receiver<RoomChange> {
        self.watchers
            .entry(id.clone())
            .or_insert_with(|| broadcast::channel(CHANGE_CHANNEL_CAPACITY).0)
            .subscribe()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn room_id() -> RoomId {
        RoomId::parse("ABC123").unwrap()
    }

    async fn store_with_room() -> (MemoryStore, RoomId) {
        let store = MemoryStore::new();
        let id = room_id();
        store.create_room(&id).await.unwrap();
        (store, id)
    }

    #[tokio::test]
    async fn create_room_conflicts_on_existing_code() {
        let (store, id) = store_with_room().await;

        let result = store.create_room(&id).await;
        assert!(matches!(result, Err(StoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn queue_keys_are_unique_and_ordered() {
        let (store, id) = store_with_room().await;

        let first = store
            .queue_push(&id, NewSong::mock("one", "Alice"))
            .await
            .unwrap();
        let second = store
            .queue_push(&id, NewSong::mock("two", "Bob"))
            .await
            .unwrap();

        assert_ne!(first.key, second.key);

        let queue = store.queue(&id).await.unwrap();
        assert_eq!(queue, vec![first, second]);
    }

    #[tokio::test]
    async fn remove_by_key_picks_exact_entry_among_duplicates() {
        let (store, id) = store_with_room().await;

        let mut duplicate = NewSong::mock("same", "Alice");
        duplicate.video_id = "dup".to_string();

        let first = store.queue_push(&id, duplicate.clone()).await.unwrap();
        let second = store.queue_push(&id, duplicate).await.unwrap();

        let removed = store.queue_remove(&id, &second.key).await.unwrap();
        assert_eq!(removed.key, second.key);

        let queue = store.queue(&id).await.unwrap();
        assert_eq!(queue, vec![first]);
    }

    #[tokio::test]
    async fn promote_head_has_exactly_one_winner() {
        let (store, id) = store_with_room().await;

        let first = store
            .queue_push(&id, NewSong::mock("first", "Alice"))
            .await
            .unwrap();
        store
            .queue_push(&id, NewSong::mock("second", "Bob"))
            .await
            .unwrap();

        let promoted = store.promote_head(&id).await.unwrap().unwrap();
        assert_eq!(promoted.key, first.key);
        assert_eq!(store.current_song(&id).await.unwrap().unwrap().key, first.key);
        assert_eq!(store.queue(&id).await.unwrap().len(), 1);

        // A current song blocks further promotion.
        assert_eq!(store.promote_head(&id).await.unwrap(), None);

        store.set_current_song(&id, None).await.unwrap();
        store.queue_pop_front(&id).await.unwrap();

        // Nothing left to promote.
        assert_eq!(store.promote_head(&id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn admin_gets_sentinel_id_and_is_unique() {
        let (store, id) = store_with_room().await;

        let admin = store
            .add_user(
                &id,
                NewUser {
                    name: "Room Admin".to_string(),
                    is_admin: true,
                },
            )
            .await
            .unwrap();

        assert_eq!(admin.id, ADMIN_USER_ID);

        let result = store
            .add_user(
                &id,
                NewUser {
                    name: "Impostor".to_string(),
                    is_admin: true,
                },
            )
            .await;

        assert!(matches!(result, Err(StoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn subscribers_receive_changes() {
        let (store, id) = store_with_room().await;
        let mut changes = store.subscribe(&id);

        store
            .queue_push(&id, NewSong::mock("one", "Alice"))
            .await
            .unwrap();

        assert_eq!(changes.recv().await.unwrap(), RoomChange::Queue);
    }

    #[tokio::test]
    async fn missing_room_is_not_found() {
        let store = MemoryStore::new();

        let result = store.queue(&room_id()).await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }
}
