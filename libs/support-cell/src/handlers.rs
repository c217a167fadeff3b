use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AddCommentRequest, AssignTicketRequest, CreateTicketRequest, SupportTicket, TicketComment, TicketQuery,
    UpdateTicketStatusRequest,
};
use crate::services::TicketService;

#[axum::debug_handler]
pub async fn create_ticket(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateTicketRequest>,
) -> Result<Json<SupportTicket>, AppError> {
    let ticket = TicketService::new(&config)
        .create_ticket(request, &user, auth.token())
        .await?;
    Ok(Json(ticket))
}

#[axum::debug_handler]
pub async fn list_tickets(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<TicketQuery>,
) -> Result<Json<Value>, AppError> {
    let tickets = TicketService::new(&config)
        .list_tickets(query, &user, auth.token())
        .await?;

    Ok(Json(json!({
        "tickets": tickets,
        "total": tickets.len()
    })))
}

#[axum::debug_handler]
pub async fn get_ticket(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(ticket_id): Path<String>,
) -> Result<Json<SupportTicket>, AppError> {
    let ticket = TicketService::new(&config)
        .get_ticket(&ticket_id, &user, auth.token())
        .await?;
    Ok(Json(ticket))
}

#[axum::debug_handler]
pub async fn update_ticket_status(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(ticket_id): Path<String>,
    Json(request): Json<UpdateTicketStatusRequest>,
) -> Result<Json<SupportTicket>, AppError> {
    let ticket = TicketService::new(&config)
        .update_status(&ticket_id, request.status, &user, auth.token())
        .await?;
    Ok(Json(ticket))
}

#[axum::debug_handler]
pub async fn assign_ticket(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(ticket_id): Path<String>,
    Json(request): Json<AssignTicketRequest>,
) -> Result<Json<SupportTicket>, AppError> {
    let ticket = TicketService::new(&config)
        .assign_ticket(&ticket_id, request, &user, auth.token())
        .await?;
    Ok(Json(ticket))
}

#[axum::debug_handler]
pub async fn add_comment(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(ticket_id): Path<String>,
    Json(request): Json<AddCommentRequest>,
) -> Result<Json<TicketComment>, AppError> {
    let comment = TicketService::new(&config)
        .add_comment(&ticket_id, request, &user, auth.token())
        .await?;
    Ok(Json(comment))
}

#[axum::debug_handler]
pub async fn list_comments(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(ticket_id): Path<String>,
) -> Result<Json<Vec<TicketComment>>, AppError> {
    let comments = TicketService::new(&config)
        .list_comments(&ticket_id, &user, auth.token())
        .await?;
    Ok(Json(comments))
}
