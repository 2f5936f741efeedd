use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Request},
    http::{request::Parts, StatusCode},
    Json,
};
use oktv_collab::store::{RoomId, ADMIN_DISPLAY_NAME, ADMIN_USER_ID};
use oktv_collab::SessionContext;
use serde::{de::DeserializeOwned, Deserialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewRoomSchema {
    /// A client-chosen room code. A random one is generated when omitted.
    #[validate(length(equal = 6))]
    pub code: Option<String>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SessionSchema {
    #[serde(default)]
    pub admin: bool,
    #[validate(length(min = 1, max = 64))]
    pub display_name: Option<String>,
    /// The user id this client persisted for the room, if any.
    pub user_id: Option<String>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddSongSchema {
    #[validate(length(min = 1, max = 64))]
    pub video_id: String,
    #[validate(length(min = 1, max = 256))]
    pub title: String,
    #[serde(default)]
    pub thumbnail: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct RemoveSongQuery {
    /// Pins the exact queue entry. Without it, the first entry matching the
    /// video id is removed.
    pub key: Option<String>,
    pub video_id: Option<String>,
}

#[derive(Debug, ToSchema, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "action")]
pub enum RoomActionSchema {
    Play,
    Pause,
    Mute,
    Unmute,
    Skip,
    Ended,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MicSchema {
    pub mic_on: Option<bool>,
    pub muted_by_admin: Option<bool>,
}

#[derive(Debug, ToSchema, Validate, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    #[validate(length(min = 1, max = 256))]
    pub query: String,
}

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extracted_json: Json<T> = Json::from_request(req, state)
            .await
            .map_err(|_| (StatusCode::BAD_REQUEST, "JSON parse failed"))?;

        extracted_json
            .0
            .validate()
            .map_err(|_| (StatusCode::BAD_REQUEST, "Request body is invalid"))?;

        Ok(Self(extracted_json.0))
    }
}

/// The acting participant, carried in headers. Room identities are roles,
/// not accounts, so there is no token to verify: the id was handed out by
/// the session endpoint and the admin is recognized by its sentinel value.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: String,
    pub display_name: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or((StatusCode::UNAUTHORIZED, "Missing x-user-id header"))?;

        let display_name = parts
            .headers
            .get("x-user-name")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| {
                if user_id == ADMIN_USER_ID {
                    ADMIN_DISPLAY_NAME.to_string()
                } else {
                    String::new()
                }
            });

        Ok(Self {
            user_id,
            display_name,
        })
    }
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.user_id == ADMIN_USER_ID
    }

    pub fn into_session(self, room_id: RoomId) -> SessionContext {
        let is_admin = self.is_admin();

        SessionContext {
            room_id,
            user_id: self.user_id,
            display_name: self.display_name,
            is_admin,
        }
    }
}
