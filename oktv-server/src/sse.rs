use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive},
        Sse,
    },
};
use futures_util::Stream;
use oktv_collab::CollabEvent;
use parking_lot::Mutex;
use serde::Serialize;
use std::{
    convert::Infallible,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
    task::{Context, Poll, Waker},
};
use utoipa::ToSchema;

use crate::{
    context::ServerContext,
    errors::ServerResult,
    serialized::{PlayerState, Song, ToSerialized, User},
};

type ConnectionId = u64;

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum ServerEvent {
    /// The pending queue of a room was modified.
    #[serde(rename_all = "camelCase")]
    QueueUpdate { room_id: String, items: Vec<Song> },
    /// The currently playing song of a room changed.
    #[serde(rename_all = "camelCase")]
    CurrentSongUpdate {
        room_id: String,
        song: Option<Song>,
    },
    /// The play or mute flags of a room changed.
    #[serde(rename_all = "camelCase")]
    PlayerStateUpdate {
        room_id: String,
        new_state: PlayerState,
    },
    /// A user joined a room.
    #[serde(rename_all = "camelCase")]
    UserJoined { room_id: String, user: User },
    /// A user left a room, or was purged as stale.
    #[serde(rename_all = "camelCase")]
    UserLeft { room_id: String, user_id: String },
    /// A user's mic state changed.
    #[serde(rename_all = "camelCase")]
    UserUpdated { room_id: String, user: User },
}

impl ServerEvent {
    /// The room this event belongs to. Connections only receive events for
    /// the room they subscribed to.
    fn room_id(&self) -> &str {
        match self {
            Self::QueueUpdate { room_id, .. }
            | Self::CurrentSongUpdate { room_id, .. }
            | Self::PlayerStateUpdate { room_id, .. }
            | Self::UserJoined { room_id, .. }
            | Self::UserLeft { room_id, .. }
            | Self::UserUpdated { room_id, .. } => room_id,
        }
    }
}

impl From<CollabEvent> for ServerEvent {
    fn from(value: CollabEvent) -> Self {
        match value {
            CollabEvent::QueueUpdate { room_id, items } => Self::QueueUpdate {
                room_id: room_id.to_string(),
                items: items.to_serialized(),
            },
            CollabEvent::CurrentSongUpdate { room_id, song } => Self::CurrentSongUpdate {
                room_id: room_id.to_string(),
                song: song.to_serialized(),
            },
            CollabEvent::PlayerStateUpdate { room_id, flags } => Self::PlayerStateUpdate {
                room_id: room_id.to_string(),
                new_state: flags.to_serialized(),
            },
            CollabEvent::UserJoined { room_id, user } => Self::UserJoined {
                room_id: room_id.to_string(),
                user: user.to_serialized(),
            },
            CollabEvent::UserLeft { room_id, user_id } => Self::UserLeft {
                room_id: room_id.to_string(),
                user_id,
            },
            CollabEvent::UserUpdated { room_id, user } => Self::UserUpdated {
                room_id: room_id.to_string(),
                user: user.to_serialized(),
            },
        }
    }
}

/// Manages server sent event connections
pub struct ServerSentEvents {
    me: Weak<Self>,
    connections: Mutex<Vec<Connection>>,
}

struct Connection {
    id: ConnectionId,
    room_id: String,
    pending_messages: Arc<Mutex<Vec<ServerEvent>>>,
    waker: Arc<Mutex<Option<Waker>>>,
}

pub struct ConnectionHandle {
    id: ConnectionId,
    /// A reference to [Connection]'s pending messages
    pending_messages: Arc<Mutex<Vec<ServerEvent>>>,
    /// A reference to [Connection]'s stored [Waker]
    waker: Arc<Mutex<Option<Waker>>>,
    /// Required to remove connection when dropped
    manager: Weak<ServerSentEvents>,
}

impl ServerSentEvents {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            connections: Default::default(),
        })
    }

    pub fn broadcast(&self, event: ServerEvent) {
        let connections = self.connections.lock();

        for connection in connections.iter() {
            if connection.room_id == event.room_id() {
                connection.send(event.clone())
            }
        }
    }

    fn connect(&self, room_id: String) -> ConnectionHandle {
        let connection = Connection::new(room_id);
        let handle = connection.handle(self.me.clone());

        self.connections.lock().push(connection);
        handle
    }

    fn disconnect(&self, id: ConnectionId) {
        self.connections.lock().retain(|c| c.id != id)
    }
}

impl Connection {
    fn new(room_id: String) -> Self {
        Self {
            id: ID_COUNTER.fetch_add(1, Ordering::Relaxed),
            room_id,
            pending_messages: Default::default(),
            waker: Default::default(),
        }
    }

    fn send(&self, message: ServerEvent) {
        self.pending_messages.lock().push(message);

        if let Some(waker) = self.waker.lock().take() {
            waker.wake()
        }
    }

    fn handle(&self, manager: Weak<ServerSentEvents>) -> ConnectionHandle {
        ConnectionHandle {
            id: self.id,
            pending_messages: self.pending_messages.clone(),
            waker: self.waker.clone(),
            manager,
        }
    }
}

impl Stream for ConnectionHandle {
    type Item = Result<Event, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut pending_messages = self.pending_messages.lock();

        let next_event = pending_messages
            .pop()
            .map(|m| serde_json::to_string(&m).expect("serializes properly"));

        if let Some(event) = next_event {
            return Poll::Ready(Some(Ok(Event::default().data(event))));
        }

        *self.waker.lock() = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.disconnect(self.id)
        }
    }
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{code}/events",
    tag = "rooms",
    responses(
        (
            status = 200,
            content_type = "text/event-stream",
            description = "A stream of events scoped to the given room",
            body = ServerEvent
        )
    )
)]
pub async fn event_stream(
    State(context): State<ServerContext>,
    Path(code): Path<String>,
) -> ServerResult<Sse<ConnectionHandle>> {
    let room_id = context.collab.rooms.validate(&code, false).await?;

    Ok(Sse::new(context.sse.connect(room_id.to_string())).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Utc;
    use oktv_collab::store::{PlayerFlags, RoomId, Song as CollabSong};

    #[test]
    fn events_carry_their_room_and_tag() {
        let room_id = RoomId::parse("ABC123").unwrap();

        let event: ServerEvent = CollabEvent::PlayerStateUpdate {
            room_id: room_id.clone(),
            flags: PlayerFlags {
                is_playing: true,
                is_muted: false,
            },
        }
        .into();

        assert_eq!(event.room_id(), "ABC123");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "player-state-update");
        assert_eq!(json["roomId"], "ABC123");
        assert_eq!(json["newState"]["isPlaying"], true);
    }

    #[test]
    fn queue_updates_serialize_songs() {
        let room_id = RoomId::parse("ABC123").unwrap();

        let event: ServerEvent = CollabEvent::QueueUpdate {
            room_id,
            items: vec![CollabSong {
                video_id: "abc".to_string(),
                title: "Song".to_string(),
                thumbnail: "https://img".to_string(),
                added_by: "Alice".to_string(),
                added_at: Utc::now(),
                key: "1".to_string(),
            }],
        }
        .into();

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "queue-update");
        assert_eq!(json["items"][0]["id"], "abc");
        assert_eq!(json["items"][0]["addedBy"], "Alice");
    }
}
