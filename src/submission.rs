use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::FieldError;

/// Indian mobile numbers: a leading 6-9 followed by exactly nine digits.
static MOBILE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[6-9][0-9]{9}$").expect("valid regex"));

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex"));

pub const ALLOWED_ID_PROOF_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "application/pdf",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Designation {
    Parent,
    Alumni,
    Maintenance,
    Other,
}

impl Designation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Designation::Parent => "parent",
            Designation::Alumni => "alumni",
            Designation::Maintenance => "maintenance",
            Designation::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "parent" => Some(Designation::Parent),
            "alumni" => Some(Designation::Alumni),
            "maintenance" => Some(Designation::Maintenance),
            "other" => Some(Designation::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(RequestStatus::Pending),
            "approved" => Some(RequestStatus::Approved),
            "rejected" => Some(RequestStatus::Rejected),
            _ => None,
        }
    }
}

/// Which extra fields a request carries is fully determined by the
/// designation, so it is a sum type rather than a bag of optional columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "designation", rename_all = "snake_case")]
pub enum DesignationDetails {
    Parent {
        student_name: String,
        class_name: String,
        admission_number: String,
    },
    Alumni,
    Maintenance {
        authorized_person: String,
    },
    Other {
        person_to_meet: String,
    },
}

impl DesignationDetails {
    pub fn designation(&self) -> Designation {
        match self {
            DesignationDetails::Parent { .. } => Designation::Parent,
            DesignationDetails::Alumni => Designation::Alumni,
            DesignationDetails::Maintenance { .. } => Designation::Maintenance,
            DesignationDetails::Other { .. } => Designation::Other,
        }
    }
}

/// A fully validated submission, ready to persist.
#[derive(Debug, Clone)]
pub struct VisitorSubmission {
    pub visitor_name: String,
    pub mobile_number: String,
    pub email: String,
    pub address: String,
    pub purpose_of_visit: String,
    pub details: DesignationDetails,
}

/// Raw text fields as collected from the multipart form, before validation.
#[derive(Debug, Clone, Default)]
pub struct RawSubmission {
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
}

/// Discriminated validation keyed on designation. All-or-nothing: every
/// violated constraint is reported, and nothing is persisted unless the whole
/// submission passes.
pub fn validate_submission(raw: &RawSubmission) -> Result<VisitorSubmission, Vec<FieldError>> {
    let mut errors = Vec::new();

    let visitor_name = raw.visitor_name.trim().to_string();
    if visitor_name.chars().count() < 2 || visitor_name.chars().count() > 100 {
        errors.push(FieldError::new(
            "visitor_name",
            "name must be between 2 and 100 characters",
        ));
    }

    let mobile_number = raw.mobile_number.trim().to_string();
    if !MOBILE_RE.is_match(&mobile_number) {
        errors.push(FieldError::new(
            "mobile_number",
            "mobile number must be 10 digits starting with 6-9",
        ));
    }

    let email = raw.email.trim().to_string();
    if email.len() > 254 || !EMAIL_RE.is_match(&email) {
        errors.push(FieldError::new("email", "email address is not valid"));
    }

    let address = raw.address.trim().to_string();
    if address.chars().count() < 10 || address.chars().count() > 500 {
        errors.push(FieldError::new(
            "address",
            "address must be between 10 and 500 characters",
        ));
    }

    let purpose_of_visit = raw.purpose_of_visit.trim().to_string();
    if purpose_of_visit.chars().count() < 5 || purpose_of_visit.chars().count() > 500 {
        errors.push(FieldError::new(
            "purpose_of_visit",
            "purpose must be between 5 and 500 characters",
        ));
    }

    let student_name = non_empty(raw.student_name.as_deref());
    let class_name = non_empty(raw.class_name.as_deref());
    let admission_number = non_empty(raw.admission_number.as_deref());
    let person_to_meet = non_empty(raw.person_to_meet.as_deref());
    let authorized_person = non_empty(raw.authorized_person.as_deref());

    let details = match Designation::parse(raw.designation.trim()) {
        None => {
            errors.push(FieldError::new(
                "designation",
                "designation must be one of parent, alumni, maintenance, other",
            ));
            None
        }
        Some(Designation::Parent) => {
            reject_foreign(&mut errors, "person_to_meet", &person_to_meet, "parent");
            reject_foreign(&mut errors, "authorized_person", &authorized_person, "parent");
            let student_name = require(&mut errors, "student_name", student_name, 100);
            let class_name = require(&mut errors, "class_name", class_name, 20);
            let admission_number = require(&mut errors, "admission_number", admission_number, 30);
            match (student_name, class_name, admission_number) {
                (Some(student_name), Some(class_name), Some(admission_number)) => {
                    Some(DesignationDetails::Parent {
                        student_name,
                        class_name,
                        admission_number,
                    })
                }
                _ => None,
            }
        }
        Some(Designation::Alumni) => {
            reject_foreign(&mut errors, "student_name", &student_name, "alumni");
            reject_foreign(&mut errors, "class_name", &class_name, "alumni");
            reject_foreign(&mut errors, "admission_number", &admission_number, "alumni");
            reject_foreign(&mut errors, "person_to_meet", &person_to_meet, "alumni");
            reject_foreign(&mut errors, "authorized_person", &authorized_person, "alumni");
            Some(DesignationDetails::Alumni)
        }
        Some(Designation::Maintenance) => {
            reject_foreign(&mut errors, "student_name", &student_name, "maintenance");
            reject_foreign(&mut errors, "class_name", &class_name, "maintenance");
            reject_foreign(&mut errors, "admission_number", &admission_number, "maintenance");
            reject_foreign(&mut errors, "person_to_meet", &person_to_meet, "maintenance");
            require(&mut errors, "authorized_person", authorized_person, 100)
                .map(|authorized_person| DesignationDetails::Maintenance { authorized_person })
        }
        Some(Designation::Other) => {
            reject_foreign(&mut errors, "student_name", &student_name, "other");
            reject_foreign(&mut errors, "class_name", &class_name, "other");
            reject_foreign(&mut errors, "admission_number", &admission_number, "other");
            reject_foreign(&mut errors, "authorized_person", &authorized_person, "other");
            require(&mut errors, "person_to_meet", person_to_meet, 100)
                .map(|person_to_meet| DesignationDetails::Other { person_to_meet })
        }
    };

    match details {
        Some(details) if errors.is_empty() => Ok(VisitorSubmission {
            visitor_name,
            mobile_number,
            email,
            address,
            purpose_of_visit,
            details,
        }),
        _ => Err(errors),
    }
}

/// Checks the uploaded ID proof against the allowed types and the configured
/// size cap. Runs alongside field validation so the caller surfaces one
/// combined error list.
pub fn validate_id_proof(
    content_type: Option<&str>,
    size_bytes: usize,
    max_bytes: usize,
) -> Vec<FieldError> {
    let mut errors = Vec::new();

    match content_type {
        Some(content_type) if ALLOWED_ID_PROOF_TYPES.contains(&content_type) => {}
        _ => errors.push(FieldError::new(
            "id_proof",
            "ID proof must be a JPEG, PNG, WebP image or a PDF",
        )),
    }

    if size_bytes == 0 {
        errors.push(FieldError::new("id_proof", "ID proof file is empty"));
    } else if size_bytes > max_bytes {
        errors.push(FieldError::new(
            "id_proof",
            format!("ID proof must not exceed {max_bytes} bytes"),
        ));
    }

    errors
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn require(
    errors: &mut Vec<FieldError>,
    field: &str,
    value: Option<String>,
    max_len: usize,
) -> Option<String> {
    match value {
        Some(value) if value.chars().count() <= max_len => Some(value),
        Some(_) => {
            errors.push(FieldError::new(
                field,
                format!("{field} must not exceed {max_len} characters"),
            ));
            None
        }
        None => {
            errors.push(FieldError::new(field, format!("{field} is required")));
            None
        }
    }
}

fn reject_foreign(
    errors: &mut Vec<FieldError>,
    field: &str,
    value: &Option<String>,
    designation: &str,
) {
    if value.is_some() {
        errors.push(FieldError::new(
            field,
            format!("{field} is not allowed for designation {designation}"),
        ));
    }
}
