use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use uuid::Uuid;

use crate::{
    dtos::contactdtos::*,
    error::HttpError,
    middleware::{role_check, JWTAuthMiddeware},
    models::usermodel::UserRole,
    AppState,
};

pub fn contact_handler() -> Router {
    Router::new()
        .route(
            "/",
            post(create_contact_request).layer(middleware::from_fn(|req, next| {
                role_check(req, next, vec![UserRole::Worker])
            })),
        )
        .route("/mine", get(list_my_requests))
        .route(
            "/received",
            get(list_received_requests).layer(middleware::from_fn(|req, next| {
                role_check(
                    req,
                    next,
                    vec![
                        UserRole::Lawyer,
                        UserRole::Admin,
                        UserRole::SuperAdmin,
                        UserRole::Supervisor,
                    ],
                )
            })),
        )
        .route("/:id", get(get_contact_request))
        .route("/:id/accept", put(accept_contact_request))
        .route("/:id/reject", put(reject_contact_request))
        .route("/:id/crm-status", put(set_crm_status))
        .route("/:id/contact-info", get(get_contact_info))
}

pub async fn create_contact_request(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateContactRequestDto>,
) -> Result<impl IntoResponse, HttpError> {
    let created = app_state
        .contact_service
        .create(&auth.user, body)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "message": "Contact request sent. The lawyer has 48 hours to respond.",
        "data": created
    })))
}

pub async fn list_my_requests(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let requests = app_state.contact_service.list_for_worker(&auth.user).await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": requests
    })))
}

pub async fn list_received_requests(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Query(query): Query<ReceivedQueryDto>,
) -> Result<impl IntoResponse, HttpError> {
    let leads = app_state
        .contact_service
        .list_for_lawyer(&auth.user, query)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": leads
    })))
}

pub async fn get_contact_request(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(request_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let view = app_state
        .contact_service
        .get_request(request_id, &auth.user)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": view
    })))
}

pub async fn accept_contact_request(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(request_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let request = app_state
        .contact_service
        .accept(request_id, &auth.user)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "message": "Request accepted. The chat with the worker is now open.",
        "data": request
    })))
}

pub async fn reject_contact_request(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(request_id): Path<Uuid>,
    body: Option<Json<RejectContactDto>>,
) -> Result<impl IntoResponse, HttpError> {
    let body = body.map(|Json(body)| body).unwrap_or_default();

    let request = app_state
        .contact_service
        .reject(request_id, &auth.user, body)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "message": "Request rejected. The worker's payment hold was released.",
        "data": request
    })))
}

pub async fn set_crm_status(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(request_id): Path<Uuid>,
    Json(body): Json<SetCrmStatusDto>,
) -> Result<impl IntoResponse, HttpError> {
    let request = app_state
        .contact_service
        .set_crm_status(request_id, &auth.user, body.crm_status)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": request
    })))
}

pub async fn get_contact_info(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(request_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let contact = app_state
        .contact_service
        .get_contact_info(request_id, &auth.user)
        .await?;

    Ok(Json(serde_json::json!({
        "status": "success",
        "data": contact
    })))
}
