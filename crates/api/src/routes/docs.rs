//! OpenAPI document and interactive docs

use axum::response::Html;
use axum::Json;
use utoipa::OpenApi;

use super::ApiDoc;

/// `GET /api/openapi.json`
pub async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// `GET /api/docs`; Swagger UI pointed at the document above
pub async fn swagger_ui() -> Html<&'static str> {
    Html(include_str!("../../static/docs.html"))
}
