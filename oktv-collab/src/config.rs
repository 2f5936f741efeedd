use std::time::Duration;

use url::Url;

use crate::store::RoomId;

/// Runtime configuration for the collab layer.
#[derive(Debug, Clone)]
pub struct CollabConfig {
    /// The public base url of the deployment, used to build join links.
    pub public_url: String,
    /// Api key for the video search provider. Search is disabled when empty.
    pub youtube_api_key: String,
    /// Maximum number of results returned per search.
    pub search_limit: usize,
    /// Guests whose `last_seen` is older than this are purged during healing.
    /// `None` disables purging entirely.
    pub stale_user_timeout: Option<Duration>,
}

impl Default for CollabConfig {
    fn default() -> Self {
        Self {
            public_url: "http://localhost:3000".to_string(),
            youtube_api_key: String::new(),
            search_limit: 10,
            stale_user_timeout: None,
        }
    }
}

impl CollabConfig {
    /// Builds the link guests follow to join a room.
    pub fn join_link(&self, room_id: &RoomId) -> String {
        let mut url = match Url::parse(&self.public_url) {
            Ok(url) => url,
            Err(_) => return format!("{}/join?room={}", self.public_url, room_id),
        };

        url.set_path("/join");
        url.set_query(Some(&format!("room={room_id}")));
        url.to_string()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn join_link_includes_room_code() {
        let config = CollabConfig {
            public_url: "https://oktv.example".to_string(),
            ..Default::default()
        };

        let room_id = RoomId::parse("abc123").unwrap();
        assert_eq!(
            config.join_link(&room_id),
            "https://oktv.example/join?room=ABC123"
        );
    }
}
