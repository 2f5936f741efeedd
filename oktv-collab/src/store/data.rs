use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use thiserror::Error;

/// The fixed length of a room code.
pub const ROOM_CODE_LENGTH: usize = 6;

/// The sentinel identity of a room's host.
pub const ADMIN_USER_ID: &str = "admin";
/// The fixed display name of a room's host.
pub const ADMIN_DISPLAY_NAME: &str = "Room Admin";

/// The type used for store-assigned queue entry keys.
pub type SongKey = String;
/// The type used for store-assigned user identifiers.
pub type UserId = String;

/// A validated room code, normalized to uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomId(String);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomCodeError {
    #[error("Room code must be exactly {ROOM_CODE_LENGTH} characters")]
    WrongLength,
    #[error("Room code must be alphanumeric")]
    InvalidCharacters,
}

impl RoomId {
    /// Parses and normalizes a raw room code.
    /// Codes that fail here never reach the store.
    pub fn parse(raw: &str) -> Result<Self, RoomCodeError> {
        let normalized = raw.trim().to_ascii_uppercase();

        if normalized.chars().count() != ROOM_CODE_LENGTH {
            return Err(RoomCodeError::WrongLength);
        }

        if !normalized.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(RoomCodeError::InvalidCharacters);
        }

        Ok(Self(normalized))
    }

    /// Generates a random room code for a newly created room.
    pub fn random() -> Self {
        let mut rng = thread_rng();

        let code: String = std::iter::repeat(())
            .map(|_| rng.sample(Alphanumeric) as char)
            .take(ROOM_CODE_LENGTH)
            .collect();

        Self(code.to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A song queued in a room.
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    /// The external video identifier, playable by the embedded player.
    pub video_id: String,
    pub title: String,
    pub thumbnail: String,
    /// The display name of the participant who queued it.
    pub added_by: String,
    pub added_at: DateTime<Utc>,
    /// The store-assigned key distinguishing duplicate video ids.
    pub key: SongKey,
}

/// A song as submitted by a participant, before the store assigns its key.
#[derive(Debug, Clone)]
pub struct NewSong {
    pub video_id: String,
    pub title: String,
    pub thumbnail: String,
    pub added_by: String,
}

/// A participant in a room. This is a room-scoped role, not a durable account.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub is_admin: bool,
    pub joined_at: DateTime<Utc>,
    /// Refreshed whenever the user authors an action. Stale guests may be
    /// purged against this after an ungraceful disconnect.
    pub last_seen: DateTime<Utc>,
    pub mic_on: bool,
    pub muted_by_admin: bool,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub is_admin: bool,
}

/// The play and mute flags mirrored to guests' read-only views.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerFlags {
    pub is_playing: bool,
    pub is_muted: bool,
}

/// A full snapshot of a room document.
#[derive(Debug, Clone)]
pub struct RoomData {
    pub id: RoomId,
    pub created_at: DateTime<Utc>,
    pub current_song: Option<Song>,
    pub flags: PlayerFlags,
    pub mic_feature_enabled: bool,
    /// Pending songs in store insertion order.
    pub queue: Vec<Song>,
    pub users: Vec<User>,
}

#[cfg(test)]
impl NewSong {
    pub fn mock(title: &str, added_by: &str) -> Self {
        Self {
            video_id: format!("vid-{title}"),
            title: title.to_string(),
            thumbnail: format!("https://thumbs.example/{title}.jpg"),
            added_by: added_by.to_string(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_room_codes() {
        assert_eq!(RoomId::parse("abc123").unwrap().as_str(), "ABC123");
        assert_eq!(RoomId::parse(" QWE456 ").unwrap().as_str(), "QWE456");

        assert_eq!(RoomId::parse("ABC12"), Err(RoomCodeError::WrongLength));
        assert_eq!(RoomId::parse("ABC1234"), Err(RoomCodeError::WrongLength));
        assert_eq!(RoomId::parse(""), Err(RoomCodeError::WrongLength));
        assert_eq!(
            RoomId::parse("AB-123"),
            Err(RoomCodeError::InvalidCharacters)
        );
    }

    #[test]
    fn random_codes_are_valid() {
        for _ in 0..100 {
            let code = RoomId::random();
            assert!(RoomId::parse(code.as_str()).is_ok());
        }
    }
}
