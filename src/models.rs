use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub role: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = refresh_tokens)]
#[diesel(belongs_to(User))]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub revoked_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = refresh_tokens)]
pub struct NewRefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

/// A gate-pass request row. The designation-conditional columns are nullable
/// here; the domain layer converts to and from the `DesignationDetails` sum
/// type so only the columns matching the designation are ever populated.
#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = visitor_requests)]
pub struct VisitorRequest {
    pub id: Uuid,
    pub visitor_name: String,
    pub mobile_number: String,
    pub email: String,
    pub address: String,
    pub purpose_of_visit: String,
    pub designation: String,
    pub student_name: Option<String>,
    pub class_name: Option<String>,
    pub admission_number: Option<String>,
    pub person_to_meet: Option<String>,
    pub authorized_person: Option<String>,
    pub id_proof_key: String,
    pub id_proof_name: String,
    pub id_proof_content_type: String,
    pub status: String,
    pub admin_comments: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = visitor_requests)]
pub struct NewVisitorRequest {
    pub id: Uuid,
    pub visitor_name: String,
    pub mobile_number: String,
    pub email: String,
    pub address: String,
    pub purpose_of_visit: String,
    pub designation: String,
    pub student_name: Option<String>,
    pub class_name: Option<String>,
    pub admission_number: Option<String>,
    pub person_to_meet: Option<String>,
    pub authorized_person: Option<String>,
    pub id_proof_key: String,
    pub id_proof_name: String,
    pub id_proof_content_type: String,
    pub status: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = tickets)]
#[diesel(belongs_to(VisitorRequest))]
pub struct Ticket {
    pub id: Uuid,
    pub visitor_request_id: Uuid,
    pub permitted_entry_date: NaiveDate,
    pub permitted_entry_time: NaiveTime,
    pub permitted_exit_date: Option<NaiveDate>,
    pub permitted_exit_time: Option<NaiveTime>,
    pub qr_code_data: String,
    pub permit_key: String,
    pub is_used: bool,
    pub used_at: Option<NaiveDateTime>,
    pub issued_by: Uuid,
    pub issued_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = tickets)]
pub struct NewTicket {
    pub id: Uuid,
    pub visitor_request_id: Uuid,
    pub permitted_entry_date: NaiveDate,
    pub permitted_entry_time: NaiveTime,
    pub permitted_exit_date: Option<NaiveDate>,
    pub permitted_exit_time: Option<NaiveTime>,
    pub qr_code_data: String,
    pub permit_key: String,
    pub issued_by: Uuid,
    pub issued_at: NaiveDateTime,
}
