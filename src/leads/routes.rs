//! Lead and contact-form intake, plus the admin views over both.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::model::{ContactMessage, ContactRequest, Lead, LeadStatus, validate_payload};
use crate::chat::model::LeadPayload;
use crate::error::{ApiError, ValidationError};
use crate::notify::{Notifier, notify_in_background};
use crate::server::ListQuery;
use crate::store::Database;

/// Shared state for intake routes.
#[derive(Clone)]
pub struct LeadRouteState {
    pub db: Arc<dyn Database>,
    pub notifier: Arc<dyn Notifier>,
}

/// POST /api/leads
async fn create_lead(
    State(state): State<LeadRouteState>,
    Json(mut payload): Json<LeadPayload>,
) -> Result<impl IntoResponse, ApiError> {
    validate_payload(&payload)?;
    payload.name = payload.name.trim().to_string();
    payload.email = payload.email.trim().to_string();

    let lead = Lead::from_payload(payload);
    state.db.insert_lead(&lead).await?;
    info!(lead_id = %lead.id, source = %lead.source, "Lead received");

    notify_in_background(
        Arc::clone(&state.notifier),
        format!("New lead: {}", lead.name),
        lead.summary(),
    );

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "success": true, "id": lead.id })),
    ))
}

/// POST /api/contact
async fn create_contact(
    State(state): State<LeadRouteState>,
    Json(req): Json<ContactRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    let message = ContactMessage::from_request(req);
    state.db.insert_contact(&message).await?;
    info!(contact_id = %message.id, "Contact message received");

    let subject = match message.subject {
        Some(ref s) => format!("Contact form: {s}"),
        None => format!("Contact form: message from {}", message.name),
    };
    notify_in_background(
        Arc::clone(&state.notifier),
        subject,
        format!("From: {} <{}>\n\n{}", message.name, message.email, message.message),
    );

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "success": true, "id": message.id })),
    ))
}

/// Build the public intake routes.
pub fn intake_routes(state: LeadRouteState) -> Router {
    Router::new()
        .route("/api/leads", post(create_lead))
        .route("/api/contact", post(create_contact))
        .with_state(state)
}

// ── Admin ───────────────────────────────────────────────────────────


/// GET /api/admin/leads
async fn list_leads(
    State(state): State<LeadRouteState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Lead>>, ApiError> {
    Ok(Json(state.db.list_leads(query.limit()).await?))
}

#[derive(Debug, Deserialize)]
struct StatusUpdate {
    status: String,
}

/// PATCH /api/admin/leads/{id}
async fn update_lead_status(
    State(state): State<LeadRouteState>,
    Path(id): Path<Uuid>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Lead>, ApiError> {
    let status = update
        .status
        .parse::<LeadStatus>()
        .map_err(|reason| ValidationError::InvalidField {
            field: "status",
            reason,
        })?;
    state.db.update_lead_status(id, status).await?;
    info!(lead_id = %id, status = %status, "Lead status changed");

    state
        .db
        .get_lead(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("No lead with id {id}")))
}

/// GET /api/admin/contacts
async fn list_contacts(
    State(state): State<LeadRouteState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ContactMessage>>, ApiError> {
    Ok(Json(state.db.list_contacts(query.limit()).await?))
}

/// Build the admin lead routes. The caller adds the auth layer.
pub fn admin_lead_routes(state: LeadRouteState) -> Router {
    Router::new()
        .route("/api/admin/leads", get(list_leads))
        .route("/api/admin/leads/{id}", patch(update_lead_status))
        .route("/api/admin/contacts", get(list_contacts))
        .with_state(state)
}
