use log::info;
use thiserror::Error;

use crate::store::{
    NewUser, RoomId, RoomStore, StoreError, UserId, ADMIN_DISPLAY_NAME, ADMIN_USER_ID,
};
use crate::{CollabContext, CollabEvent};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("A display name is required to join a room")]
    NameRequired,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What a client presents when resolving its identity in a room.
#[derive(Debug, Clone, Default)]
pub struct SessionRequest {
    pub admin: bool,
    pub display_name: Option<String>,
    /// The user id a returning client persisted for this room, if any.
    pub user_id: Option<UserId>,
}

/// A resolved identity, scoped to one room. Clients persist the
/// `(user_id, display_name)` pair per room so a reload rejoins as the same
/// participant.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub display_name: String,
    pub is_admin: bool,
}

/// Resolves room-scoped identities. These are roles in a room, not durable
/// accounts: there is no credential to verify, only a name and a stored id.
pub struct Sessions<S> {
    context: CollabContext<S>,
}

impl<S> Sessions<S>
where
    S: RoomStore,
{
    pub fn new(context: &CollabContext<S>) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Resolves a session in an already-validated room.
    ///
    /// Admins get the sentinel identity. Guests are matched by stored id
    /// first, then by display name, and registered as new users only when
    /// neither finds them. A guest without a name is rejected before any
    /// identity is created.
    pub async fn resolve(
        &self,
        room_id: &RoomId,
        request: SessionRequest,
    ) -> Result<SessionContext, SessionError> {
        if request.admin {
            return Ok(SessionContext {
                room_id: room_id.clone(),
                user_id: ADMIN_USER_ID.to_string(),
                display_name: ADMIN_DISPLAY_NAME.to_string(),
                is_admin: true,
            });
        }

        let name = request
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or(SessionError::NameRequired)?;

        let store = &self.context.store;

        if let Some(stored_id) = &request.user_id {
            if let Some(user) = store.user_by_id(room_id, stored_id).await? {
                store.touch_user(room_id, &user.id).await?;

                return Ok(SessionContext {
                    room_id: room_id.clone(),
                    user_id: user.id,
                    display_name: user.name,
                    is_admin: false,
                });
            }
        }

        if let Some(user) = store.user_by_name(room_id, name).await? {
            store.touch_user(room_id, &user.id).await?;

            return Ok(SessionContext {
                room_id: room_id.clone(),
                user_id: user.id,
                display_name: user.name,
                is_admin: false,
            });
        }

        let user = store
            .add_user(
                room_id,
                NewUser {
                    name: name.to_string(),
                    is_admin: false,
                },
            )
            .await?;

        info!("{} joined room {room_id}", user.name);
        self.context.emit(CollabEvent::UserJoined {
            room_id: room_id.clone(),
            user: user.clone(),
        });

        Ok(SessionContext {
            room_id: room_id.clone(),
            user_id: user.id,
            display_name: user.name,
            is_admin: false,
        })
    }

    /// Removes a guest from the room. The admin identity is never removed,
    /// and an already-gone user is not an error.
    pub async fn leave(&self, room_id: &RoomId, user_id: &UserId) -> Result<(), SessionError> {
        if user_id == ADMIN_USER_ID {
            return Ok(());
        }

        match self.context.store.remove_user(room_id, user_id).await {
            Ok(()) => {
                self.context.emit(CollabEvent::UserLeft {
                    room_id: room_id.clone(),
                    user_id: user_id.clone(),
                });
                Ok(())
            }
            Err(StoreError::NotFound { .. }) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::MemoryStore;
    use crate::EventReceiver;

    async fn sessions_with_room() -> (Sessions<MemoryStore>, RoomId, EventReceiver) {
        let (context, events) = CollabContext::mock();

        let id = RoomId::parse("ABC123").unwrap();
        context.store.create_room(&id).await.unwrap();

        (Sessions::new(&context), id, events)
    }

    fn guest_request(name: &str) -> SessionRequest {
        SessionRequest {
            admin: false,
            display_name: Some(name.to_string()),
            user_id: None,
        }
    }

    #[tokio::test]
    async fn admin_resolves_to_sentinel_identity() {
        let (sessions, id, _events) = sessions_with_room().await;

        let session = sessions
            .resolve(
                &id,
                SessionRequest {
                    admin: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(session.user_id, ADMIN_USER_ID);
        assert_eq!(session.display_name, ADMIN_DISPLAY_NAME);
        assert!(session.is_admin);
    }

    #[tokio::test]
    async fn guest_without_name_is_rejected_without_registration() {
        let (sessions, id, _events) = sessions_with_room().await;
        let store = sessions.context.store.clone();

        let result = sessions.resolve(&id, SessionRequest::default()).await;
        assert!(matches!(result, Err(SessionError::NameRequired)));

        let blank = sessions.resolve(&id, guest_request("   ")).await;
        assert!(matches!(blank, Err(SessionError::NameRequired)));

        assert!(store.users(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn new_guest_is_registered() {
        let (sessions, id, _events) = sessions_with_room().await;

        let session = sessions.resolve(&id, guest_request("Alice")).await.unwrap();

        assert_eq!(session.display_name, "Alice");
        assert!(!session.is_admin);

        let users = sessions.context.store.users(&id).await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, session.user_id);
    }

    #[tokio::test]
    async fn returning_guest_keeps_their_id() {
        let (sessions, id, _events) = sessions_with_room().await;

        let first = sessions.resolve(&id, guest_request("Alice")).await.unwrap();

        // Reload with the stored id.
        let by_id = sessions
            .resolve(
                &id,
                SessionRequest {
                    admin: false,
                    display_name: Some("Alice".to_string()),
                    user_id: Some(first.user_id.clone()),
                },
            )
            .await
            .unwrap();
        assert_eq!(by_id.user_id, first.user_id);

        // Reload that lost the id but kept the name.
        let by_name = sessions.resolve(&id, guest_request("Alice")).await.unwrap();
        assert_eq!(by_name.user_id, first.user_id);

        assert_eq!(sessions.context.store.users(&id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn leave_is_best_effort() {
        let (sessions, id, _events) = sessions_with_room().await;

        let session = sessions.resolve(&id, guest_request("Alice")).await.unwrap();

        sessions.leave(&id, &session.user_id).await.unwrap();
        assert!(sessions.context.store.users(&id).await.unwrap().is_empty());

        // Leaving twice, or as the admin, is a no-op.
        sessions.leave(&id, &session.user_id).await.unwrap();
        sessions.leave(&id, &ADMIN_USER_ID.to_string()).await.unwrap();
    }
}
