//! All schemas that are exposed from endpoints are defined here
//! along with the conversion impls

use chrono::{DateTime, Utc};
use oktv_collab::store::{
    PlayerFlags, RoomData, Song as CollabSong, User as CollabUser,
};
use oktv_collab::{SessionContext, VideoResult};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    /// The external video id, playable by the embedded player.
    id: String,
    title: String,
    thumbnail: String,
    added_by: String,
    added_at: DateTime<Utc>,
    /// Distinguishes duplicate entries of the same video.
    key: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    id: String,
    name: String,
    is_admin: bool,
    mic_on: bool,
    muted_by_admin: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    id: String,
    created_at: DateTime<Utc>,
    current_song: Option<Song>,
    is_playing: bool,
    is_muted: bool,
    mic_feature_enabled: bool,
    queue: Vec<Song>,
    users: Vec<User>,
    join_link: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    room_id: String,
    user_id: String,
    display_name: String,
    is_admin: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    video_id: String,
    title: String,
    thumbnail: String,
    channel_title: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub is_playing: bool,
    pub is_muted: bool,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl<I, O> ToSerialized<Option<O>> for Option<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Option<O> {
        self.as_ref().map(|x| x.to_serialized())
    }
}

impl ToSerialized<Song> for CollabSong {
    fn to_serialized(&self) -> Song {
        Song {
            id: self.video_id.clone(),
            title: self.title.clone(),
            thumbnail: self.thumbnail.clone(),
            added_by: self.added_by.clone(),
            added_at: self.added_at,
            key: self.key.clone(),
        }
    }
}

impl ToSerialized<User> for CollabUser {
    fn to_serialized(&self) -> User {
        User {
            id: self.id.clone(),
            name: self.name.clone(),
            is_admin: self.is_admin,
            mic_on: self.mic_on,
            muted_by_admin: self.muted_by_admin,
        }
    }
}

impl ToSerialized<PlayerState> for PlayerFlags {
    fn to_serialized(&self) -> PlayerState {
        PlayerState {
            is_playing: self.is_playing,
            is_muted: self.is_muted,
        }
    }
}

impl ToSerialized<Session> for SessionContext {
    fn to_serialized(&self) -> Session {
        Session {
            room_id: self.room_id.to_string(),
            user_id: self.user_id.clone(),
            display_name: self.display_name.clone(),
            is_admin: self.is_admin,
        }
    }
}

impl ToSerialized<SearchResult> for VideoResult {
    fn to_serialized(&self) -> SearchResult {
        SearchResult {
            video_id: self.video_id.clone(),
            title: self.title.clone(),
            thumbnail: self.thumbnail.clone(),
            channel_title: self.channel.clone(),
        }
    }
}

impl Room {
    pub fn from_data(data: &RoomData, join_link: String) -> Self {
        Self {
            id: data.id.to_string(),
            created_at: data.created_at,
            current_song: data.current_song.to_serialized(),
            is_playing: data.flags.is_playing,
            is_muted: data.flags.is_muted,
            mic_feature_enabled: data.mic_feature_enabled,
            queue: data.queue.to_serialized(),
            users: data.users.to_serialized(),
            join_link,
        }
    }
}
