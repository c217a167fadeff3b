use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{filter_value, SupabaseClient};
use shared_models::auth::{Role, User};
use shared_models::FieldErrors;

use crate::models::{
    AddCommentRequest, AssignTicketRequest, CreateTicketRequest, SupportError, SupportTicket, TicketComment,
    TicketQuery, TicketStatus,
};

const MAX_SUBJECT: usize = 200;
const MAX_BODY: usize = 5000;

/// Legal ticket moves. Staying put is not a move.
pub fn ticket_transition(from: TicketStatus, to: TicketStatus) -> Result<(), SupportError> {
    use TicketStatus::*;

    let allowed = matches!(
        (from, to),
        (Open, InProgress) | (Open, Closed) | (InProgress, Resolved) | (InProgress, Open) | (Resolved, Closed) | (Resolved, InProgress)
    );
    if allowed {
        Ok(())
    } else {
        Err(SupportError::InvalidTransition { from, to })
    }
}

#[derive(Debug, Deserialize)]
struct AppUserRole {
    role: String,
}

fn user_uuid(user: &User) -> Result<Uuid, SupportError> {
    Uuid::parse_str(&user.id).map_err(|_| SupportError::Unauthorized)
}

fn ensure_can_view(ticket: &SupportTicket, user: &User) -> Result<(), SupportError> {
    if user.is_self(&ticket.raised_by) || user.is_staff_or_admin() {
        Ok(())
    } else {
        Err(SupportError::Unauthorized)
    }
}

pub struct TicketService {
    supabase: SupabaseClient,
}

impl TicketService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create_ticket(
        &self,
        request: CreateTicketRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<SupportTicket, SupportError> {
        let raised_by = user_uuid(user)?;

        let mut errors = FieldErrors::new();
        errors.require_text("subject", &request.subject);
        errors.check(request.subject.trim().chars().count() <= MAX_SUBJECT, "subject", "Subject is too long");
        errors.require_text("description", &request.description);
        errors.check(request.description.chars().count() <= MAX_BODY, "description", "Description is too long");
        errors.into_result()?;

        let now = Utc::now().to_rfc3339();
        let row = json!({
            "id": Uuid::new_v4(),
            "raised_by": raised_by,
            "clinic_id": request.clinic_id,
            "subject": request.subject.trim(),
            "description": request.description.trim(),
            "category": request.category,
            "priority": request.priority,
            "status": TicketStatus::Open,
            "assigned_to": null,
            "created_at": now,
            "updated_at": now
        });

        let ticket: SupportTicket = self.supabase.insert("support_tickets", Some(auth_token), row).await?;
        info!("Support ticket {} raised by {}", ticket.id, ticket.raised_by);
        Ok(ticket)
    }

    /// Staff and admins see every ticket, everyone else only their own.
    pub async fn list_tickets(
        &self,
        query: TicketQuery,
        user: &User,
        auth_token: &str,
    ) -> Result<Vec<SupportTicket>, SupportError> {
        let mut parts = Vec::new();
        if !user.is_staff_or_admin() {
            parts.push(format!("raised_by=eq.{}", filter_value(&user.id)));
        }
        if let Some(status) = query.status {
            parts.push(format!("status=eq.{}", status.as_str()));
        }
        parts.push("order=created_at.desc".to_string());

        debug!("Listing tickets for {} with {:?}", user.id, query.status);
        Ok(self.supabase.select("support_tickets", &parts.join("&"), Some(auth_token)).await?)
    }

    async fn find_ticket(&self, ticket_id: &str, auth_token: &str) -> Result<SupportTicket, SupportError> {
        let query = format!("id=eq.{}", filter_value(ticket_id));
        self.supabase
            .select_one("support_tickets", &query, Some(auth_token))
            .await?
            .ok_or(SupportError::NotFound)
    }

    pub async fn get_ticket(&self, ticket_id: &str, user: &User, auth_token: &str) -> Result<SupportTicket, SupportError> {
        let ticket = self.find_ticket(ticket_id, auth_token).await?;
        ensure_can_view(&ticket, user)?;
        Ok(ticket)
    }

    /// Staff and admins drive the workflow; the raiser may only close.
    pub async fn update_status(
        &self,
        ticket_id: &str,
        to: TicketStatus,
        user: &User,
        auth_token: &str,
    ) -> Result<SupportTicket, SupportError> {
        let ticket = self.find_ticket(ticket_id, auth_token).await?;
        let raiser_closing = user.is_self(&ticket.raised_by) && to == TicketStatus::Closed;
        if !(user.is_staff_or_admin() || raiser_closing) {
            return Err(SupportError::Unauthorized);
        }

        if let Err(e) = ticket_transition(ticket.status, to) {
            warn!("Rejected ticket {} move: {}", ticket.id, e);
            return Err(e);
        }

        let filter = format!("id=eq.{}&status=eq.{}", ticket.id, ticket.status.as_str());
        let changes = json!({ "status": to, "updated_at": Utc::now().to_rfc3339() });
        let updated: SupportTicket = self
            .supabase
            .update("support_tickets", &filter, Some(auth_token), changes)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    SupportError::InvalidTransition { from: ticket.status, to }
                } else {
                    e.into()
                }
            })?;

        info!("Ticket {} moved from {} to {}", updated.id, ticket.status, updated.status);
        Ok(updated)
    }

    pub async fn assign_ticket(
        &self,
        ticket_id: &str,
        request: AssignTicketRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<SupportTicket, SupportError> {
        if !user.is_staff_or_admin() {
            return Err(SupportError::Unauthorized);
        }

        let ticket = self.find_ticket(ticket_id, auth_token).await?;
        if ticket.status == TicketStatus::Closed {
            return Err(SupportError::Closed);
        }

        let assignee: Option<AppUserRole> = self
            .supabase
            .select_one("app_users", &format!("id=eq.{}&select=role", request.assignee_id), Some(auth_token))
            .await?;
        let can_handle = assignee
            .and_then(|a| Role::parse(&a.role))
            .is_some_and(|role| matches!(role, Role::Staff | Role::Admin));
        let mut errors = FieldErrors::new();
        errors.check(can_handle, "assignee_id", "Tickets can only be assigned to staff or admins");
        errors.into_result()?;

        let changes = json!({ "assigned_to": request.assignee_id, "updated_at": Utc::now().to_rfc3339() });
        let updated: SupportTicket = self
            .supabase
            .update("support_tickets", &format!("id=eq.{}", ticket.id), Some(auth_token), changes)
            .await?;

        info!("Ticket {} assigned to {}", updated.id, request.assignee_id);
        Ok(updated)
    }

    pub async fn add_comment(
        &self,
        ticket_id: &str,
        request: AddCommentRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<TicketComment, SupportError> {
        let ticket = self.find_ticket(ticket_id, auth_token).await?;
        ensure_can_view(&ticket, user)?;
        if ticket.status == TicketStatus::Closed {
            return Err(SupportError::Closed);
        }

        let mut errors = FieldErrors::new();
        errors.require_text("body", &request.body);
        errors.check(request.body.chars().count() <= MAX_BODY, "body", "Comment is too long");
        errors.into_result()?;

        let row = json!({
            "id": Uuid::new_v4(),
            "ticket_id": ticket.id,
            "author_id": user_uuid(user)?,
            "body": request.body.trim(),
            "created_at": Utc::now().to_rfc3339()
        });

        let comment: TicketComment = self.supabase.insert("ticket_comments", Some(auth_token), row).await?;
        debug!("Comment {} added to ticket {}", comment.id, ticket.id);
        Ok(comment)
    }

    pub async fn list_comments(
        &self,
        ticket_id: &str,
        user: &User,
        auth_token: &str,
    ) -> Result<Vec<TicketComment>, SupportError> {
        let ticket = self.find_ticket(ticket_id, auth_token).await?;
        ensure_can_view(&ticket, user)?;

        let query = format!("ticket_id=eq.{}&order=created_at.asc", ticket.id);
        Ok(self.supabase.select("ticket_comments", &query, Some(auth_token)).await?)
    }
}
