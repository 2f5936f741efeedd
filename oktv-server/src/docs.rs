use axum::{response::IntoResponse, Json};
use utoipa::OpenApi;
use utoipauto::utoipauto;

#[utoipauto(paths = "./oktv-server/src")]
#[derive(OpenApi)]
#[openapi(info(
    description = "oktv-server exposes endpoints to interact with this OkTV instance"
))]
pub struct ApiDoc;

pub async fn docs() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
