use axum::extract::{Json, Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::AuthenticatedAdmin;
use crate::error::{AppError, AppResult, FieldError};
use crate::models::{NewVisitorRequest, Ticket, VisitorRequest};
use crate::schema::{tickets, visitor_requests};
use crate::state::AppState;
use crate::submission::{
    validate_id_proof, validate_submission, Designation, DesignationDetails, RawSubmission,
    RequestStatus, VisitorSubmission,
};

pub const DEFAULT_PAGE_SIZE: i64 = 25;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Serialize)]
pub struct RequestResponse {
    pub id: Uuid,
    pub visitor_name: String,
    pub mobile_number: String,
    pub email: String,
    pub address: String,
    pub purpose_of_visit: String,
    #[serde(flatten)]
    pub details: DesignationDetails,
    pub id_proof_name: String,
    pub status: String,
    pub admin_comments: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize)]
pub struct RequestDetailResponse {
    pub request: RequestResponse,
}

#[derive(Serialize)]
pub struct RequestListResponse {
    pub requests: Vec<RequestResponse>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

#[derive(Deserialize)]
pub struct RequestListQuery {
    pub status: Option<String>,
    pub designation: Option<String>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Deserialize)]
pub struct DecisionRequest {
    pub status: String,
    pub comments: Option<String>,
}

#[derive(Deserialize)]
pub struct DownloadQuery {
    pub filename: Option<String>,
}

pub(crate) fn to_iso(value: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(value, Utc).to_rfc3339()
}

/// Reconstructs the designation sum type from a stored row. A row whose
/// conditional columns do not match its designation is corrupt and reported
/// as an internal error rather than papered over.
pub(crate) fn details_from_row(row: &VisitorRequest) -> AppResult<DesignationDetails> {
    let designation = Designation::parse(&row.designation)
        .ok_or_else(|| AppError::internal(format!("unknown designation '{}'", row.designation)))?;

    let details = match designation {
        Designation::Parent => DesignationDetails::Parent {
            student_name: row
                .student_name
                .clone()
                .ok_or_else(|| inconsistent(row.id, "student_name"))?,
            class_name: row
                .class_name
                .clone()
                .ok_or_else(|| inconsistent(row.id, "class_name"))?,
            admission_number: row
                .admission_number
                .clone()
                .ok_or_else(|| inconsistent(row.id, "admission_number"))?,
        },
        Designation::Alumni => DesignationDetails::Alumni,
        Designation::Maintenance => DesignationDetails::Maintenance {
            authorized_person: row
                .authorized_person
                .clone()
                .ok_or_else(|| inconsistent(row.id, "authorized_person"))?,
        },
        Designation::Other => DesignationDetails::Other {
            person_to_meet: row
                .person_to_meet
                .clone()
                .ok_or_else(|| inconsistent(row.id, "person_to_meet"))?,
        },
    };

    Ok(details)
}

fn inconsistent(id: Uuid, field: &str) -> AppError {
    AppError::internal(format!("request {id} is missing {field} for its designation"))
}

pub(crate) fn to_request_response(row: VisitorRequest) -> AppResult<RequestResponse> {
    let details = details_from_row(&row)?;
    Ok(RequestResponse {
        id: row.id,
        visitor_name: row.visitor_name,
        mobile_number: row.mobile_number,
        email: row.email,
        address: row.address,
        purpose_of_visit: row.purpose_of_visit,
        details,
        id_proof_name: row.id_proof_name,
        status: row.status,
        admin_comments: row.admin_comments,
        created_at: to_iso(row.created_at),
        updated_at: to_iso(row.updated_at),
    })
}

pub(crate) fn attachment_content_disposition(filename: &str) -> HeaderValue {
    let sanitized: String = filename
        .chars()
        .map(|ch| match ch {
            '"' | '\\' | '\r' | '\n' => '_',
            _ => ch,
        })
        .collect();

    let encoded =
        percent_encoding::utf8_percent_encode(&sanitized, percent_encoding::NON_ALPHANUMERIC);
    let value = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized, encoded
    );
    HeaderValue::from_str(&value)
        .unwrap_or_else(|_| HeaderValue::from_static("attachment; filename=\"download\""))
}

fn sanitize_object_name(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "id-proof".to_string()
    } else {
        cleaned
    }
}

struct SubmissionUpload {
    raw: RawSubmission,
    file_bytes: Option<Vec<u8>>,
    file_name: Option<String>,
    content_type: Option<String>,
}

async fn collect_submission(multipart: &mut Multipart) -> AppResult<SubmissionUpload> {
    let mut upload = SubmissionUpload {
        raw: RawSubmission::default(),
        file_bytes: None,
        file_name: None,
        content_type: None,
    };

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, "invalid multipart data");
        AppError::bad_request(format!("invalid multipart data: {err}"))
    })? {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("id_proof") => {
                upload.file_name = field.file_name().map(|n| n.to_string());
                upload.content_type = field.content_type().map(|mime| mime.to_string());
                let data = field.bytes().await.map_err(|err| {
                    error!(error = %err, "failed to read ID proof bytes");
                    AppError::bad_request(format!("failed to read ID proof: {err}"))
                })?;
                upload.file_bytes = Some(data.to_vec());
            }
            Some(text_field) => {
                let field_name = text_field.to_string();
                let value = field.text().await.map_err(|err| {
                    AppError::bad_request(format!("invalid value for {field_name}: {err}"))
                })?;
                match field_name.as_str() {
                    "visitor_name" => upload.raw.visitor_name = value,
                    "mobile_number" => upload.raw.mobile_number = value,
                    "email" => upload.raw.email = value,
                    "address" => upload.raw.address = value,
                    "purpose_of_visit" => upload.raw.purpose_of_visit = value,
                    "designation" => upload.raw.designation = value,
                    "student_name" => upload.raw.student_name = Some(value),
                    "class_name" => upload.raw.class_name = Some(value),
                    "admission_number" => upload.raw.admission_number = Some(value),
                    "person_to_meet" => upload.raw.person_to_meet = Some(value),
                    "authorized_person" => upload.raw.authorized_person = Some(value),
                    _ => {}
                }
            }
            None => {}
        }
    }

    Ok(upload)
}

/// Public submission endpoint: validate everything, upload the ID proof,
/// then insert the row. An insert failure after a successful upload deletes
/// the uploaded object so no orphaned file outlives a failed submission.
pub async fn submit_request(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<RequestDetailResponse>)> {
    let upload = collect_submission(&mut multipart).await?;

    let mut errors = Vec::new();
    let submission = match validate_submission(&upload.raw) {
        Ok(submission) => Some(submission),
        Err(field_errors) => {
            errors = field_errors;
            None
        }
    };

    match upload.file_bytes.as_ref() {
        Some(bytes) => errors.extend(validate_id_proof(
            upload.content_type.as_deref(),
            bytes.len(),
            state.config.max_upload_bytes,
        )),
        None => errors.push(FieldError::new("id_proof", "ID proof file is required")),
    }

    let (submission, file_bytes) = match (submission, upload.file_bytes) {
        (Some(submission), Some(bytes)) if errors.is_empty() => (submission, bytes),
        _ => return Err(AppError::validation(errors)),
    };

    let original_name = upload
        .file_name
        .unwrap_or_else(|| "id-proof".to_string());
    let content_type = upload.content_type;

    let object_key = format!(
        "id-proofs/{}-{:08x}/{}",
        Utc::now().timestamp_millis(),
        rand::random::<u32>(),
        sanitize_object_name(&original_name)
    );

    state
        .storage
        .put_object(&object_key, file_bytes, content_type.clone())
        .await
        .map_err(|err| {
            error!(error = %err, key = %object_key, "failed to store ID proof");
            AppError::storage(format!("failed to store ID proof: {err}"))
        })?;

    match insert_request(&state, &submission, &object_key, &original_name, content_type) {
        Ok(row) => {
            info!(
                request_id = %row.id,
                designation = %row.designation,
                "gate-pass request submitted"
            );
            let response = RequestDetailResponse {
                request: to_request_response(row)?,
            };
            Ok((StatusCode::CREATED, Json(response)))
        }
        Err(err) => {
            // Compensating action: the row never landed, so the uploaded
            // object must not outlive the failed submission.
            if let Err(cleanup_err) = state.storage.delete_object(&object_key).await {
                warn!(
                    key = %object_key,
                    error = %cleanup_err,
                    "failed to delete orphaned ID proof after insert failure"
                );
            }
            error!(error = ?err, "gate-pass submission insert failed");
            Err(err)
        }
    }
}

fn insert_request(
    state: &AppState,
    submission: &VisitorSubmission,
    object_key: &str,
    original_name: &str,
    content_type: Option<String>,
) -> AppResult<VisitorRequest> {
    let (student_name, class_name, admission_number, person_to_meet, authorized_person) =
        match &submission.details {
            DesignationDetails::Parent {
                student_name,
                class_name,
                admission_number,
            } => (
                Some(student_name.clone()),
                Some(class_name.clone()),
                Some(admission_number.clone()),
                None,
                None,
            ),
            DesignationDetails::Alumni => (None, None, None, None, None),
            DesignationDetails::Maintenance { authorized_person } => {
                (None, None, None, None, Some(authorized_person.clone()))
            }
            DesignationDetails::Other { person_to_meet } => {
                (None, None, None, Some(person_to_meet.clone()), None)
            }
        };

    let new_request = NewVisitorRequest {
        id: Uuid::new_v4(),
        visitor_name: submission.visitor_name.clone(),
        mobile_number: submission.mobile_number.clone(),
        email: submission.email.clone(),
        address: submission.address.clone(),
        purpose_of_visit: submission.purpose_of_visit.clone(),
        designation: submission.details.designation().as_str().to_string(),
        student_name,
        class_name,
        admission_number,
        person_to_meet,
        authorized_person,
        id_proof_key: object_key.to_string(),
        id_proof_name: original_name.to_string(),
        id_proof_content_type: content_type
            .unwrap_or_else(|| "application/octet-stream".to_string()),
        status: RequestStatus::Pending.as_str().to_string(),
    };

    let mut conn = state.db()?;
    diesel::insert_into(visitor_requests::table)
        .values(&new_request)
        .execute(&mut conn)?;

    let row = visitor_requests::table
        .find(new_request.id)
        .first(&mut conn)?;
    Ok(row)
}

/// Admin list with server-side filtering and paging. Filters AND together;
/// an unset or "all" filter is a no-op; the text search is a case-insensitive
/// substring match over name, email and mobile.
pub async fn list_requests(
    State(state): State<AppState>,
    Query(params): Query<RequestListQuery>,
    _admin: AuthenticatedAdmin,
) -> AppResult<Json<RequestListResponse>> {
    let mut conn = state.db()?;

    let page = params.page.unwrap_or(1).max(1);
    let per_page = params
        .per_page
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let status_filter = normalize_filter(params.status.as_deref());
    if let Some(status) = status_filter.as_deref() {
        if RequestStatus::parse(status).is_none() {
            return Err(AppError::bad_request(format!("unknown status '{status}'")));
        }
    }
    let designation_filter = normalize_filter(params.designation.as_deref());
    if let Some(designation) = designation_filter.as_deref() {
        if Designation::parse(designation).is_none() {
            return Err(AppError::bad_request(format!(
                "unknown designation '{designation}'"
            )));
        }
    }
    let search = params
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_owned());

    let apply_filters = |mut query: visitor_requests::BoxedQuery<'static, diesel::pg::Pg>| {
        if let Some(status) = status_filter.clone() {
            query = query.filter(visitor_requests::status.eq(status));
        }
        if let Some(designation) = designation_filter.clone() {
            query = query.filter(visitor_requests::designation.eq(designation));
        }
        if let Some(term) = search.clone() {
            let pattern = format!("%{}%", escape_like(&term));
            query = query.filter(
                visitor_requests::visitor_name
                    .ilike(pattern.clone())
                    .or(visitor_requests::email.ilike(pattern.clone()))
                    .or(visitor_requests::mobile_number.ilike(pattern)),
            );
        }
        query
    };

    let total: i64 = apply_filters(visitor_requests::table.into_boxed())
        .count()
        .get_result(&mut conn)?;

    let rows: Vec<VisitorRequest> = apply_filters(visitor_requests::table.into_boxed())
        .order(visitor_requests::created_at.desc())
        .limit(per_page)
        .offset(page.saturating_sub(1).saturating_mul(per_page))
        .load(&mut conn)?;

    let mut requests = Vec::with_capacity(rows.len());
    for row in rows {
        requests.push(to_request_response(row)?);
    }

    Ok(Json(RequestListResponse {
        requests,
        total,
        page,
        per_page,
    }))
}

fn normalize_filter(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
        .map(|v| v.to_lowercase())
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

pub async fn get_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    _admin: AuthenticatedAdmin,
) -> AppResult<Json<RequestDetailResponse>> {
    let mut conn = state.db()?;
    let row: VisitorRequest = visitor_requests::table.find(request_id).first(&mut conn)?;
    Ok(Json(RequestDetailResponse {
        request: to_request_response(row)?,
    }))
}

/// Decision workflow. The update only applies while the row is still pending,
/// so two admins racing on the same request cannot silently overwrite each
/// other: the slower one gets a conflict instead.
pub async fn decide_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    admin: AuthenticatedAdmin,
    Json(payload): Json<DecisionRequest>,
) -> AppResult<Json<RequestDetailResponse>> {
    let target = match RequestStatus::parse(payload.status.trim()) {
        Some(RequestStatus::Approved) => RequestStatus::Approved,
        Some(RequestStatus::Rejected) => RequestStatus::Rejected,
        _ => {
            return Err(AppError::bad_request(
                "decision status must be approved or rejected",
            ))
        }
    };

    let comments = payload
        .comments
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| c.to_string());

    if target == RequestStatus::Rejected && comments.is_none() {
        return Err(AppError::validation(vec![FieldError::new(
            "comments",
            "comments are required when rejecting a request",
        )]));
    }

    let mut conn = state.db()?;
    let now = Utc::now().naive_utc();

    let updated = diesel::update(
        visitor_requests::table
            .find(request_id)
            .filter(visitor_requests::status.eq(RequestStatus::Pending.as_str())),
    )
    .set((
        visitor_requests::status.eq(target.as_str()),
        visitor_requests::admin_comments.eq(comments.clone()),
        visitor_requests::updated_at.eq(now),
    ))
    .execute(&mut conn)?;

    if updated == 0 {
        let existing: Option<VisitorRequest> = visitor_requests::table
            .find(request_id)
            .first(&mut conn)
            .optional()?;
        return match existing {
            None => Err(AppError::not_found()),
            Some(row) => Err(AppError::conflict(format!(
                "request was already {}",
                row.status
            ))),
        };
    }

    let row: VisitorRequest = visitor_requests::table.find(request_id).first(&mut conn)?;
    info!(
        request_id = %request_id,
        status = %row.status,
        decided_by = %admin.username,
        "gate-pass request decided"
    );

    Ok(Json(RequestDetailResponse {
        request: to_request_response(row)?,
    }))
}

/// Explicit admin delete: removes the row (the ticket follows via cascade)
/// and best-effort deletes the stored objects.
pub async fn delete_request(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    admin: AuthenticatedAdmin,
) -> AppResult<impl IntoResponse> {
    let mut conn = state.db()?;

    let row: Option<VisitorRequest> = visitor_requests::table
        .find(request_id)
        .first(&mut conn)
        .optional()?;
    let row = row.ok_or_else(AppError::not_found)?;

    let ticket: Option<Ticket> = tickets::table
        .filter(tickets::visitor_request_id.eq(request_id))
        .first(&mut conn)
        .optional()?;

    diesel::delete(visitor_requests::table.find(request_id)).execute(&mut conn)?;
    drop(conn);

    let mut object_keys = vec![row.id_proof_key];
    if let Some(ticket) = &ticket {
        object_keys.push(ticket.permit_key.clone());
    }
    for key in object_keys {
        if let Err(err) = state.storage.delete_object(&key).await {
            warn!(key = %key, error = %err, "failed to delete stored object for removed request");
        }
    }

    info!(request_id = %request_id, deleted_by = %admin.username, "gate-pass request deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Streams the stored ID proof back as a named attachment download.
pub async fn download_id_proof(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    Query(query): Query<DownloadQuery>,
    _admin: AuthenticatedAdmin,
) -> AppResult<impl IntoResponse> {
    let mut conn = state.db()?;
    let row: VisitorRequest = visitor_requests::table.find(request_id).first(&mut conn)?;
    drop(conn);

    let bytes = state
        .storage
        .get_object(&row.id_proof_key)
        .await
        .map_err(|err| {
            error!(key = %row.id_proof_key, error = %err, "failed to fetch ID proof");
            AppError::storage(format!("failed to fetch ID proof: {err}"))
        })?;

    let display_name = query
        .filename
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .unwrap_or(&row.id_proof_name);

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&row.id_proof_content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        attachment_content_disposition(display_name),
    );

    Ok((headers, bytes))
}
