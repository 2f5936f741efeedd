use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Json,
};
use oktv_collab::store::{NewSong, PlayerFlags};
use oktv_collab::SessionRequest;

use crate::{
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::{
        Actor, AddSongSchema, MicSchema, NewRoomSchema, RemoveSongQuery, RoomActionSchema,
        SessionSchema, ValidatedJson,
    },
    serialized::{Room, Session, Song, ToSerialized, User},
    Router,
};

#[utoipa::path(
    post,
    path = "/v1/rooms",
    tag = "rooms",
    request_body = NewRoomSchema,
    responses(
        (status = 200, body = Room)
    )
)]
async fn create_room(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<NewRoomSchema>,
) -> ServerResult<Json<Room>> {
    let data = context.collab.rooms.create_room(body.code.as_deref()).await?;
    let join_link = context.collab.config.join_link(&data.id);

    Ok(Json(Room::from_data(&data, join_link)))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{code}",
    tag = "rooms",
    responses(
        (status = 200, body = Room),
        (status = 404, description = "The code is malformed or the room does not exist")
    )
)]
async fn room(
    State(context): State<ServerContext>,
    Path(code): Path<String>,
    actor: Option<Actor>,
) -> ServerResult<Json<Room>> {
    let is_admin = actor.map(|actor| actor.is_admin()).unwrap_or(false);

    // The admin's room page creates the room lazily if it is gone.
    let data = if is_admin {
        context.collab.rooms.create_room(Some(&code)).await?
    } else {
        let room_id = context.collab.rooms.validate(&code, false).await?;
        context.collab.rooms.room(&room_id).await?
    };

    let join_link = context.collab.config.join_link(&data.id);
    Ok(Json(Room::from_data(&data, join_link)))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{code}/session",
    tag = "rooms",
    request_body = SessionSchema,
    responses(
        (status = 200, body = Session),
        (status = 422, description = "A display name is required to join")
    )
)]
async fn resolve_session(
    State(context): State<ServerContext>,
    Path(code): Path<String>,
    ValidatedJson(body): ValidatedJson<SessionSchema>,
) -> ServerResult<Json<Session>> {
    let room_id = if body.admin {
        context.collab.rooms.create_room(Some(&code)).await?.id
    } else {
        context.collab.rooms.validate(&code, false).await?
    };

    let session = context
        .collab
        .sessions
        .resolve(
            &room_id,
            SessionRequest {
                admin: body.admin,
                display_name: body.display_name,
                user_id: body.user_id,
            },
        )
        .await?;

    Ok(Json(session.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{code}/users",
    tag = "rooms",
    responses(
        (status = 200, body = Vec<User>)
    )
)]
async fn users(
    State(context): State<ServerContext>,
    Path(code): Path<String>,
) -> ServerResult<Json<Vec<User>>> {
    let room_id = context.collab.rooms.validate(&code, false).await?;
    let users = context.collab.rooms.users(&room_id).await?;

    Ok(Json(users.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/rooms/{code}/users/{id}",
    tag = "rooms",
    responses(
        (status = 200, description = "The user left the room")
    )
)]
async fn leave_room(
    State(context): State<ServerContext>,
    Path((code, user_id)): Path<(String, String)>,
) -> ServerResult<()> {
    let room_id = context.collab.rooms.validate(&code, false).await?;
    context.collab.sessions.leave(&room_id, &user_id).await?;

    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{code}/users/{id}/mic",
    tag = "rooms",
    request_body = MicSchema,
    responses(
        (status = 200, body = User),
        (status = 403, description = "Only the admin can mute other users")
    )
)]
async fn set_user_mic(
    State(context): State<ServerContext>,
    Path((code, user_id)): Path<(String, String)>,
    actor: Actor,
    ValidatedJson(body): ValidatedJson<MicSchema>,
) -> ServerResult<Json<User>> {
    let room_id = context.collab.rooms.validate(&code, false).await?;
    let session = actor.into_session(room_id.clone());

    let user = context
        .collab
        .rooms
        .set_user_mic(&room_id, &user_id, body.mic_on, body.muted_by_admin, &session)
        .await?;

    Ok(Json(user.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{code}/queue",
    tag = "rooms",
    responses(
        (status = 200, body = Vec<Song>)
    )
)]
async fn queue(
    State(context): State<ServerContext>,
    Path(code): Path<String>,
) -> ServerResult<Json<Vec<Song>>> {
    let room_id = context.collab.rooms.validate(&code, false).await?;
    let queue = context.collab.rooms.queue(&room_id).await?;

    Ok(Json(queue.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{code}/queue",
    tag = "rooms",
    request_body = AddSongSchema,
    responses(
        (status = 200, body = Song)
    )
)]
async fn add_to_queue(
    State(context): State<ServerContext>,
    Path(code): Path<String>,
    actor: Actor,
    ValidatedJson(body): ValidatedJson<AddSongSchema>,
) -> ServerResult<Json<Song>> {
    let room_id = context
        .collab
        .rooms
        .validate(&code, actor.is_admin())
        .await?;
    let session = actor.into_session(room_id.clone());

    let song = context
        .collab
        .rooms
        .add_song(
            &room_id,
            NewSong {
                video_id: body.video_id,
                title: body.title,
                thumbnail: body.thumbnail,
                added_by: session.display_name.clone(),
            },
            &session,
        )
        .await?;

    Ok(Json(song.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/rooms/{code}/queue",
    tag = "rooms",
    params(RemoveSongQuery),
    responses(
        (status = 200, body = Song),
        (status = 403, description = "Only the admin or the adder can remove an entry")
    )
)]
async fn remove_from_queue(
    State(context): State<ServerContext>,
    Path(code): Path<String>,
    actor: Actor,
    Query(query): Query<RemoveSongQuery>,
) -> ServerResult<Json<Song>> {
    let room_id = context.collab.rooms.validate(&code, false).await?;
    let session = actor.into_session(room_id.clone());

    if query.key.is_none() && query.video_id.is_none() {
        return Err(ServerError::BadRequest(
            "A key or videoId is required".to_string(),
        ));
    }

    let removed = context
        .collab
        .rooms
        .remove_song(
            &room_id,
            query.video_id.as_deref().unwrap_or_default(),
            query.key.as_ref(),
            &session,
        )
        .await?;

    Ok(Json(removed.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/rooms/{code}/actions",
    tag = "rooms",
    request_body = RoomActionSchema,
    responses(
        (status = 200, description = "Action was performed."),
        (status = 403, description = "Transport controls are admin only")
    )
)]
async fn perform_room_action(
    State(context): State<ServerContext>,
    Path(code): Path<String>,
    actor: Actor,
    Json(body): Json<RoomActionSchema>,
) -> ServerResult<()> {
    let room_id = context.collab.rooms.validate(&code, false).await?;
    let session = actor.into_session(room_id.clone());
    let rooms = &context.collab.rooms;

    let flags = rooms.flags(&room_id).await?;

    match body {
        RoomActionSchema::Play => {
            rooms
                .set_player_state(
                    &room_id,
                    PlayerFlags {
                        is_playing: true,
                        ..flags
                    },
                    &session,
                )
                .await?
        }
        RoomActionSchema::Pause => {
            rooms
                .set_player_state(
                    &room_id,
                    PlayerFlags {
                        is_playing: false,
                        ..flags
                    },
                    &session,
                )
                .await?
        }
        RoomActionSchema::Mute => {
            rooms
                .set_player_state(
                    &room_id,
                    PlayerFlags {
                        is_muted: true,
                        ..flags
                    },
                    &session,
                )
                .await?
        }
        RoomActionSchema::Unmute => {
            rooms
                .set_player_state(
                    &room_id,
                    PlayerFlags {
                        is_muted: false,
                        ..flags
                    },
                    &session,
                )
                .await?
        }
        RoomActionSchema::Skip => rooms.skip(&room_id, &session).await?,
        RoomActionSchema::Ended => rooms.song_ended(&room_id, &session).await?,
    };

    Ok(())
}

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_room))
        .route("/:code", get(room))
        .route("/:code/session", post(resolve_session))
        .route("/:code/users", get(users))
        .route("/:code/users/:id", delete(leave_room))
        .route("/:code/users/:id/mic", post(set_user_mic))
        .route(
            "/:code/queue",
            get(queue).post(add_to_queue).delete(remove_from_queue),
        )
        .route("/:code/actions", post(perform_room_action))
        .route("/:code/events", get(crate::sse::event_stream))
}
