use crossbeam::channel::{Receiver, Sender};

use crate::store::{PlayerFlags, RoomId, Song, User, UserId};

pub type EventSender = Sender<CollabEvent>;
pub type EventReceiver = Receiver<CollabEvent>;

/// An event emitted by the collab layer, intended for realtime distribution
/// to connected clients.
#[derive(Debug, Clone)]
pub enum CollabEvent {
    QueueUpdate {
        room_id: RoomId,
        items: Vec<Song>,
    },
    CurrentSongUpdate {
        room_id: RoomId,
        song: Option<Song>,
    },
    PlayerStateUpdate {
        room_id: RoomId,
        flags: PlayerFlags,
    },
    UserJoined {
        room_id: RoomId,
        user: User,
    },
    UserLeft {
        room_id: RoomId,
        user_id: UserId,
    },
    UserUpdated {
        room_id: RoomId,
        user: User,
    },
}
