use chrono::{Duration as ChronoDuration, Utc};
use log::{info, warn};
use tokio::sync::broadcast::error::RecvError;

use crate::store::{RoomChange, RoomId, RoomStore, Song};
use crate::{CollabContext, CollabEvent};

/// Converges a room back to a consistent state. Participant actions are
/// separate non-transactional store writes, so an interrupted sequence (or a
/// plain crash between writes) can leave a room idle with a populated queue,
/// or "playing" with nothing current. Every pass here is idempotent and safe
/// to run redundantly.
pub struct Reconciler<S> {
    context: CollabContext<S>,
}

/// What a healing pass did, mostly for logging and tests.
#[derive(Debug, Default, PartialEq)]
pub struct HealOutcome {
    pub promoted: Option<Song>,
    pub stopped_playback: bool,
    pub purged_users: usize,
}

impl<S> Reconciler<S>
where
    S: RoomStore,
{
    pub fn new(context: &CollabContext<S>) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Spawns a task that re-heals the room on every relevant store change.
    /// The task ends when the room's change channel closes.
    pub fn attach(&self, id: &RoomId) {
        let reconciler = self.clone();
        let id = id.clone();
        let mut changes = self.context.store.subscribe(&id);

        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    // User list changes cannot invalidate playback state.
                    Ok(RoomChange::Users) => continue,
                    Ok(_) => {
                        if let Err(err) = reconciler.heal(&id).await {
                            warn!("Healing room {id} failed: {err}");
                        }
                    }
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    /// A single healing pass:
    /// 1. No current song but a populated queue: promote the head.
    /// 2. No current song while flagged as playing: stop playback.
    /// 3. Purge guests not seen within the configured staleness window.
    pub async fn heal(&self, id: &RoomId) -> Result<HealOutcome, crate::store::StoreError> {
        let store = &self.context.store;
        let mut outcome = HealOutcome::default();

        if let Some(next) = store.promote_head(id).await? {
            info!("Healed room {id}: promoted {} to current", next.title);
            self.context.emit(CollabEvent::CurrentSongUpdate {
                room_id: id.clone(),
                song: Some(next.clone()),
            });
            self.context.emit(CollabEvent::QueueUpdate {
                room_id: id.clone(),
                items: store.queue(id).await?,
            });

            outcome.promoted = Some(next);
        }

        // The promotion above (or a concurrent writer) may have filled the
        // slot, so read again before judging the playback flag.
        if store.current_song(id).await?.is_none() {
            let mut flags = store.player_flags(id).await?;

            if flags.is_playing {
                flags.is_playing = false;
                store.set_player_flags(id, flags).await?;

                info!("Healed room {id}: stopped playback with nothing current");
                self.context.emit(CollabEvent::PlayerStateUpdate {
                    room_id: id.clone(),
                    flags,
                });

                outcome.stopped_playback = true;
            }
        }

        outcome.purged_users = self.purge_stale_users(id).await?;

        Ok(outcome)
    }

    /// Removes guests whose `last_seen` predates the staleness window. The
    /// admin is never purged. Disabled unless a window is configured.
    async fn purge_stale_users(&self, id: &RoomId) -> Result<usize, crate::store::StoreError> {
        let Some(timeout) = self.context.config.stale_user_timeout else {
            return Ok(0);
        };

        let store = &self.context.store;
        let cutoff = Utc::now()
            - ChronoDuration::from_std(timeout).unwrap_or_else(|_| ChronoDuration::seconds(0));

        let stale: Vec<_> = store
            .users(id)
            .await?
            .into_iter()
            .filter(|user| !user.is_admin && user.last_seen < cutoff)
            .collect();

        for user in &stale {
            store.remove_user(id, &user.id).await?;

            info!("Purged stale user {} from room {id}", user.name);
            self.context.emit(CollabEvent::UserLeft {
                room_id: id.clone(),
                user_id: user.id.clone(),
            });
        }

        Ok(stale.len())
    }
}

impl<S> Clone for Reconciler<S> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;
    use crate::store::{MemoryStore, NewSong, NewUser, PlayerFlags};
    use crate::{CollabConfig, EventReceiver};

    async fn reconciler_with_room() -> (Reconciler<MemoryStore>, RoomId, EventReceiver) {
        reconciler_with_config(CollabConfig::default()).await
    }

    async fn reconciler_with_config(
        config: CollabConfig,
    ) -> (Reconciler<MemoryStore>, RoomId, EventReceiver) {
        let (context, events) = CollabContext::mock_with_config(config);

        let id = RoomId::parse("ABC123").unwrap();
        context.store.create_room(&id).await.unwrap();

        (Reconciler::new(&context), id, events)
    }

    #[tokio::test]
    async fn heal_promotes_queue_head_when_idle() {
        let (reconciler, id, _events) = reconciler_with_room().await;
        let store = reconciler.context.store.clone();

        let first = store
            .queue_push(&id, NewSong::mock("first", "Alice"))
            .await
            .unwrap();
        store
            .queue_push(&id, NewSong::mock("second", "Bob"))
            .await
            .unwrap();

        let outcome = reconciler.heal(&id).await.unwrap();
        assert_eq!(outcome.promoted.unwrap().key, first.key);

        let current = store.current_song(&id).await.unwrap().unwrap();
        assert_eq!(current.key, first.key);
        assert_eq!(store.queue(&id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn heal_stops_playback_with_nothing_current() {
        let (reconciler, id, _events) = reconciler_with_room().await;
        let store = reconciler.context.store.clone();

        store
            .set_player_flags(
                &id,
                PlayerFlags {
                    is_playing: true,
                    is_muted: false,
                },
            )
            .await
            .unwrap();

        let outcome = reconciler.heal(&id).await.unwrap();
        assert!(outcome.stopped_playback);
        assert!(!store.player_flags(&id).await.unwrap().is_playing);
    }

    #[tokio::test]
    async fn heal_is_idempotent() {
        let (reconciler, id, _events) = reconciler_with_room().await;
        let store = reconciler.context.store.clone();

        store
            .queue_push(&id, NewSong::mock("only", "Alice"))
            .await
            .unwrap();

        let first = reconciler.heal(&id).await.unwrap();
        assert!(first.promoted.is_some());

        let second = reconciler.heal(&id).await.unwrap();
        assert_eq!(second, HealOutcome::default());
    }

    #[tokio::test]
    async fn purge_removes_stale_guests_but_never_the_admin() {
        let config = CollabConfig {
            stale_user_timeout: Some(Duration::ZERO),
            ..Default::default()
        };
        let (reconciler, id, _events) = reconciler_with_config(config).await;
        let store = reconciler.context.store.clone();

        store
            .add_user(
                &id,
                NewUser {
                    name: "Room Admin".to_string(),
                    is_admin: true,
                },
            )
            .await
            .unwrap();
        store
            .add_user(
                &id,
                NewUser {
                    name: "Alice".to_string(),
                    is_admin: false,
                },
            )
            .await
            .unwrap();

        // A zero window makes anything older than "now" stale.
        tokio::time::sleep(Duration::from_millis(5)).await;

        let outcome = reconciler.heal(&id).await.unwrap();
        assert_eq!(outcome.purged_users, 1);

        let users = store.users(&id).await.unwrap();
        assert_eq!(users.len(), 1);
        assert!(users[0].is_admin);
    }

    #[tokio::test]
    async fn attached_reconciler_converges_after_store_changes() {
        let (reconciler, id, _events) = reconciler_with_room().await;
        let store = reconciler.context.store.clone();

        reconciler.attach(&id);

        store
            .queue_push(&id, NewSong::mock("pushed", "Alice"))
            .await
            .unwrap();

        // Give the watcher task a moment to run its healing pass.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let current = store.current_song(&id).await.unwrap();
        assert_eq!(current.unwrap().title, "pushed");
    }
}
