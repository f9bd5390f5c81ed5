use axum::extract::{Json, Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use chrono::{NaiveDate, NaiveTime, Utc};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::AuthenticatedAdmin;
use crate::error::{AppError, AppResult};
use crate::models::{NewTicket, Ticket, VisitorRequest};
use crate::permit::{self, PermitWindow, QrPayload};
use crate::routes::requests::{attachment_content_disposition, to_iso};
use crate::schema::{tickets, visitor_requests};
use crate::state::AppState;
use crate::submission::RequestStatus;

#[derive(Deserialize, Default)]
pub struct IssueTicketRequest {
    pub entry_date: Option<NaiveDate>,
    pub entry_time: Option<NaiveTime>,
    pub exit_date: Option<NaiveDate>,
    pub exit_time: Option<NaiveTime>,
}

#[derive(Serialize)]
pub struct TicketResponse {
    pub id: Uuid,
    pub visitor_request_id: Uuid,
    pub permitted_entry_date: NaiveDate,
    pub permitted_entry_time: NaiveTime,
    pub permitted_exit_date: Option<NaiveDate>,
    pub permitted_exit_time: Option<NaiveTime>,
    pub qr_code_data: String,
    pub is_used: bool,
    pub used_at: Option<String>,
    pub issued_by: Uuid,
    pub issued_at: String,
}

#[derive(Serialize)]
pub struct TicketDetailResponse {
    pub ticket: TicketResponse,
}

fn to_ticket_response(ticket: Ticket) -> TicketResponse {
    TicketResponse {
        id: ticket.id,
        visitor_request_id: ticket.visitor_request_id,
        permitted_entry_date: ticket.permitted_entry_date,
        permitted_entry_time: ticket.permitted_entry_time,
        permitted_exit_date: ticket.permitted_exit_date,
        permitted_exit_time: ticket.permitted_exit_time,
        qr_code_data: ticket.qr_code_data,
        is_used: ticket.is_used,
        used_at: ticket.used_at.map(to_iso),
        issued_by: ticket.issued_by,
        issued_at: to_iso(ticket.issued_at),
    }
}

/// Issues an entry permit for an approved request. The ticket id is generated
/// up front so the QR payload is serialized once with the real id, and the
/// printable permit is uploaded before the insert; if the insert fails the
/// uploaded permit is deleted, mirroring the submission flow's compensation.
/// At most one ticket exists per request; a duplicate issuance is a conflict.
pub async fn issue_ticket(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    admin: AuthenticatedAdmin,
    Json(payload): Json<IssueTicketRequest>,
) -> AppResult<(StatusCode, Json<TicketDetailResponse>)> {
    let request: VisitorRequest = {
        let mut conn = state.db()?;
        let row: Option<VisitorRequest> = visitor_requests::table
            .find(request_id)
            .first(&mut conn)
            .optional()?;
        row.ok_or_else(AppError::not_found)?
    };

    if request.status != RequestStatus::Approved.as_str() {
        return Err(AppError::conflict(format!(
            "tickets can only be issued for approved requests (current status: {})",
            request.status
        )));
    }

    let defaults = permit::default_permit_window(Utc::now().date_naive());
    let window = PermitWindow {
        entry_date: payload.entry_date.unwrap_or(defaults.entry_date),
        entry_time: payload.entry_time.unwrap_or(defaults.entry_time),
        exit_date: payload.exit_date.or(defaults.exit_date),
        exit_time: payload.exit_time.or(defaults.exit_time),
    };

    let ticket_id = Uuid::new_v4();
    let qr_payload = QrPayload {
        ticket_id,
        visitor_name: request.visitor_name.clone(),
        purpose_of_visit: request.purpose_of_visit.clone(),
        permitted_entry_date: window.entry_date,
        permitted_entry_time: window.entry_time,
        permitted_exit_date: window.exit_date,
        permitted_exit_time: window.exit_time,
        gate_pass_id: request.id,
    };
    let qr_json = serde_json::to_string(&qr_payload)?;

    let permit_html = permit::render_permit(&state.config, &request, ticket_id, &window, &qr_json);
    let permit_key = format!("permits/{ticket_id}.html");

    state
        .storage
        .put_object(
            &permit_key,
            permit_html.into_bytes(),
            Some("text/html; charset=utf-8".to_string()),
        )
        .await
        .map_err(|err| {
            error!(error = %err, key = %permit_key, "failed to store entry permit");
            AppError::storage(format!("failed to store entry permit: {err}"))
        })?;

    let new_ticket = NewTicket {
        id: ticket_id,
        visitor_request_id: request.id,
        permitted_entry_date: window.entry_date,
        permitted_entry_time: window.entry_time,
        permitted_exit_date: window.exit_date,
        permitted_exit_time: window.exit_time,
        qr_code_data: qr_json,
        permit_key: permit_key.clone(),
        issued_by: admin.user_id,
        issued_at: Utc::now().naive_utc(),
    };

    let inserted = {
        let mut conn = state.db()?;
        diesel::insert_into(tickets::table)
            .values(&new_ticket)
            .execute(&mut conn)
            .and_then(|_| tickets::table.find(ticket_id).first::<Ticket>(&mut conn))
    };

    let ticket = match inserted {
        Ok(ticket) => ticket,
        Err(err) => {
            if let Err(cleanup_err) = state.storage.delete_object(&permit_key).await {
                warn!(
                    key = %permit_key,
                    error = %cleanup_err,
                    "failed to delete permit after ticket insert failure"
                );
            }
            return Err(match err {
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                    AppError::conflict("a ticket has already been issued for this request")
                }
                other => AppError::from(other),
            });
        }
    };

    info!(
        ticket_id = %ticket.id,
        request_id = %request.id,
        issued_by = %admin.username,
        "entry permit issued"
    );

    Ok((
        StatusCode::CREATED,
        Json(TicketDetailResponse {
            ticket: to_ticket_response(ticket),
        }),
    ))
}

pub async fn get_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    _admin: AuthenticatedAdmin,
) -> AppResult<Json<TicketDetailResponse>> {
    let mut conn = state.db()?;
    let ticket: Ticket = tickets::table.find(ticket_id).first(&mut conn)?;
    Ok(Json(TicketDetailResponse {
        ticket: to_ticket_response(ticket),
    }))
}

/// Streams the stored printable permit as a named download.
pub async fn download_permit(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    _admin: AuthenticatedAdmin,
) -> AppResult<impl IntoResponse> {
    let mut conn = state.db()?;
    let ticket: Ticket = tickets::table.find(ticket_id).first(&mut conn)?;
    drop(conn);

    let bytes = state
        .storage
        .get_object(&ticket.permit_key)
        .await
        .map_err(|err| {
            error!(key = %ticket.permit_key, error = %err, "failed to fetch entry permit");
            AppError::storage(format!("failed to fetch entry permit: {err}"))
        })?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        attachment_content_disposition(&format!("entry-permit-{ticket_id}.html")),
    );

    Ok((headers, bytes))
}

/// Marks a ticket as used, exactly once. The update is predicated on the
/// ticket being unused, so a second scan yields a conflict instead of
/// silently rewriting the usage timestamp.
pub async fn use_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    _admin: AuthenticatedAdmin,
) -> AppResult<Json<TicketDetailResponse>> {
    let mut conn = state.db()?;
    let now = Utc::now().naive_utc();

    let updated = diesel::update(
        tickets::table
            .find(ticket_id)
            .filter(tickets::is_used.eq(false)),
    )
    .set((
        tickets::is_used.eq(true),
        tickets::used_at.eq(now),
        tickets::updated_at.eq(now),
    ))
    .execute(&mut conn)?;

    if updated == 0 {
        let existing: Option<Ticket> = tickets::table
            .find(ticket_id)
            .first(&mut conn)
            .optional()?;
        return match existing {
            None => Err(AppError::not_found()),
            Some(_) => Err(AppError::conflict("ticket has already been used")),
        };
    }

    let ticket: Ticket = tickets::table.find(ticket_id).first(&mut conn)?;
    Ok(Json(TicketDetailResponse {
        ticket: to_ticket_response(ticket),
    }))
}
