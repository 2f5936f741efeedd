use log::info;
use thiserror::Error;

use crate::store::{
    NewSong, NewUser, PlayerFlags, RoomCodeError, RoomData, RoomId, RoomStore, Song, SongKey,
    StoreError, User, UserId, ADMIN_DISPLAY_NAME,
};
use crate::{CollabContext, CollabEvent, SessionContext};

mod reconciler;
mod validation;

pub use reconciler::{HealOutcome, Reconciler};
pub use validation::{validate_room, RoomValidation};

#[derive(Debug, Error)]
pub enum RoomError {
    #[error(transparent)]
    InvalidCode(#[from] RoomCodeError),
    #[error("Room {0} does not exist")]
    RoomNotFound(String),
    #[error("Only the room admin can do this")]
    AdminOnly,
    #[error("You are not allowed to modify this entry")]
    NotAuthorized,
    #[error("Song does not exist in the queue")]
    SongNotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Manages rooms and enforces the rules merging concurrent participant
/// actions into a single queue and a single "now playing" pointer.
pub struct RoomManager<S> {
    context: CollabContext<S>,
    reconciler: Reconciler<S>,
}

impl<S> RoomManager<S>
where
    S: RoomStore,
{
    pub fn new(context: &CollabContext<S>) -> Self {
        Self {
            context: context.clone(),
            reconciler: Reconciler::new(context),
        }
    }

    /// Creates a room with the given code, or a random one. Creating a room
    /// that already exists returns it unchanged, since the admin path
    /// revalidates by recreating.
    pub async fn create_room(&self, code: Option<&str>) -> Result<RoomData, RoomError> {
        let id = match code {
            Some(code) => RoomId::parse(code)?,
            None => RoomId::random(),
        };

        if self.context.store.room_exists(&id).await? {
            return Ok(self.context.store.room_by_id(&id).await?);
        }

        let room = self.context.store.create_room(&id).await?;

        let admin = self
            .context
            .store
            .add_user(
                &id,
                NewUser {
                    name: ADMIN_DISPLAY_NAME.to_string(),
                    is_admin: true,
                },
            )
            .await?;

        self.reconciler.attach(&id);
        self.context.emit(CollabEvent::UserJoined {
            room_id: id.clone(),
            user: admin,
        });

        info!("Created room {id}");
        Ok(self.context.store.room_by_id(&id).await.unwrap_or(room))
    }

    /// Validates a raw room code, returning the normalized id.
    pub async fn validate(&self, raw: &str, is_admin: bool) -> Result<RoomId, RoomError> {
        validate_room(self.context.store.as_ref(), raw, is_admin).await
    }

    pub async fn room(&self, id: &RoomId) -> Result<RoomData, RoomError> {
        Ok(self.context.store.room_by_id(id).await?)
    }

    pub async fn queue(&self, id: &RoomId) -> Result<Vec<Song>, RoomError> {
        Ok(self.context.store.queue(id).await?)
    }

    pub async fn users(&self, id: &RoomId) -> Result<Vec<User>, RoomError> {
        Ok(self.context.store.users(id).await?)
    }

    pub async fn flags(&self, id: &RoomId) -> Result<PlayerFlags, RoomError> {
        Ok(self.context.store.player_flags(id).await?)
    }

    /// Appends a song to the queue. Never dedupes: queueing the same video
    /// twice is two entries. When the room is idle and the actor is the
    /// admin, the queue head is promoted to current and playback starts.
    pub async fn add_song(
        &self,
        id: &RoomId,
        song: NewSong,
        actor: &SessionContext,
    ) -> Result<Song, RoomError> {
        let store = &self.context.store;

        let was_idle = store.current_song(id).await?.is_none();

        let stored = store.queue_push(id, song).await?;
        store.touch_user(id, &actor.user_id).await.ok();

        if was_idle && actor.is_admin {
            // The attached watcher heals on the same queue change and may win
            // the promotion; `promote_head` returns `None` in that case.
            // Either way the room was idle when the admin queued, so playback
            // starts.
            if let Some(promoted) = store.promote_head(id).await? {
                self.context.emit(CollabEvent::CurrentSongUpdate {
                    room_id: id.clone(),
                    song: Some(promoted),
                });
            }

            let mut flags = store.player_flags(id).await?;

            if !flags.is_playing {
                flags.is_playing = true;
                store.set_player_flags(id, flags).await?;

                self.context.emit(CollabEvent::PlayerStateUpdate {
                    room_id: id.clone(),
                    flags,
                });
            }
        }

        self.context.emit(CollabEvent::QueueUpdate {
            room_id: id.clone(),
            items: store.queue(id).await?,
        });

        Ok(stored)
    }

    /// Removes a queued song. Allowed for the admin or the participant who
    /// added it. The key pins the exact entry; without one, the first entry
    /// matching the video id is taken. Titles are never matched.
    pub async fn remove_song(
        &self,
        id: &RoomId,
        video_id: &str,
        key: Option<&SongKey>,
        actor: &SessionContext,
    ) -> Result<Song, RoomError> {
        let store = &self.context.store;
        let queue = store.queue(id).await?;

        let target = match key {
            Some(key) => queue.iter().find(|song| &song.key == key),
            None => queue.iter().find(|song| song.video_id == video_id),
        }
        .ok_or(RoomError::SongNotFound)?;

        if !actor.is_admin && target.added_by != actor.display_name {
            return Err(RoomError::NotAuthorized);
        }

        store.touch_user(id, &actor.user_id).await.ok();
        let removed = store.queue_remove(id, &target.key).await?;

        self.context.emit(CollabEvent::QueueUpdate {
            room_id: id.clone(),
            items: store.queue(id).await?,
        });

        Ok(removed)
    }

    /// Advances to the next song. Admin only.
    pub async fn skip(&self, id: &RoomId, actor: &SessionContext) -> Result<(), RoomError> {
        self.ensure_admin(actor)?;
        self.advance(id).await
    }

    /// Handles the playback surface reporting that the current song finished.
    /// Same advancement as a skip, distinct trigger.
    pub async fn song_ended(&self, id: &RoomId, actor: &SessionContext) -> Result<(), RoomError> {
        self.ensure_admin(actor)?;
        self.advance(id).await
    }

    async fn advance(&self, id: &RoomId) -> Result<(), RoomError> {
        let store = &self.context.store;

        let next = store.queue_pop_front(id).await?;
        store.set_current_song(id, next.clone()).await?;

        if next.is_none() {
            let mut flags = store.player_flags(id).await?;

            if flags.is_playing {
                flags.is_playing = false;
                store.set_player_flags(id, flags).await?;

                self.context.emit(CollabEvent::PlayerStateUpdate {
                    room_id: id.clone(),
                    flags,
                });
            }
        }

        self.context.emit(CollabEvent::CurrentSongUpdate {
            room_id: id.clone(),
            song: next,
        });
        self.context.emit(CollabEvent::QueueUpdate {
            room_id: id.clone(),
            items: store.queue(id).await?,
        });

        Ok(())
    }

    /// Writes the play and mute flags. Admin only. Guests' read-only views
    /// follow through the store subscription.
    pub async fn set_player_state(
        &self,
        id: &RoomId,
        flags: PlayerFlags,
        actor: &SessionContext,
    ) -> Result<(), RoomError> {
        self.ensure_admin(actor)?;

        self.context.store.set_player_flags(id, flags).await?;
        self.context.emit(CollabEvent::PlayerStateUpdate {
            room_id: id.clone(),
            flags,
        });

        Ok(())
    }

    /// Updates a user's mic state. Users toggle their own mic; only the
    /// admin can mute someone else or set the admin-mute flag.
    pub async fn set_user_mic(
        &self,
        id: &RoomId,
        user_id: &UserId,
        mic_on: Option<bool>,
        muted_by_admin: Option<bool>,
        actor: &SessionContext,
    ) -> Result<User, RoomError> {
        let acting_on_self = &actor.user_id == user_id;

        if muted_by_admin.is_some() && !actor.is_admin {
            return Err(RoomError::AdminOnly);
        }

        if mic_on.is_some() && !acting_on_self && !actor.is_admin {
            return Err(RoomError::NotAuthorized);
        }

        let user = self
            .context
            .store
            .set_user_mic(id, user_id, mic_on, muted_by_admin)
            .await?;

        self.context.emit(CollabEvent::UserUpdated {
            room_id: id.clone(),
            user: user.clone(),
        });

        Ok(user)
    }

    pub fn reconciler(&self) -> &Reconciler<S> {
        &self.reconciler
    }

    fn ensure_admin(&self, actor: &SessionContext) -> Result<(), RoomError> {
        if actor.is_admin {
            Ok(())
        } else {
            Err(RoomError::AdminOnly)
        }
    }
}
