use std::sync::Arc;

use axum::{
    extract::Path,
    response::IntoResponse,
    routing::{get, put},
    Extension, Json, Router,
};
use uuid::Uuid;

use crate::{
    dtos::contactdtos::{PostMessageDto, PostMessageResponseDto},
    error::HttpError,
    middleware::JWTAuthMiddeware,
    AppState,
};

pub fn chat_handler() -> Router {
    Router::new()
        .route("/:request_id/messages", get(get_messages).post(send_message))
        .route("/:request_id/read", put(mark_chat_as_read))
}

pub async fn get_messages(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(request_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let messages = app_state
        .contact_service
        .list_messages(request_id, &auth.user)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": messages
    })))
}

pub async fn send_message(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(request_id): Path<Uuid>,
    Json(body): Json<PostMessageDto>,
) -> Result<impl IntoResponse, HttpError> {
    let (message, request) = app_state
        .contact_service
        .post_message(request_id, &auth.user, body)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": PostMessageResponseDto { message, request }
    })))
}

pub async fn mark_chat_as_read(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(request_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let request = app_state
        .contact_service
        .mark_read(request_id, &auth.user)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": {
            "unreadCountWorker": request.unread_count_worker,
            "unreadCountLawyer": request.unread_count_lawyer
        }
    })))
}
