use chrono::{Days, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::models::VisitorRequest;

/// The payload embedded in a ticket's QR code. The ticket id is generated
/// before the row is inserted, so this is serialized exactly once with the
/// final id; there is no placeholder rewrite.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QrPayload {
    pub ticket_id: Uuid,
    pub visitor_name: String,
    pub purpose_of_visit: String,
    pub permitted_entry_date: NaiveDate,
    pub permitted_entry_time: NaiveTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permitted_exit_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permitted_exit_time: Option<NaiveTime>,
    pub gate_pass_id: Uuid,
}

#[derive(Debug, Clone, Copy)]
pub struct PermitWindow {
    pub entry_date: NaiveDate,
    pub entry_time: NaiveTime,
    pub exit_date: Option<NaiveDate>,
    pub exit_time: Option<NaiveTime>,
}

/// Default permit window: tomorrow, 09:00 to 17:00.
pub fn default_permit_window(today: NaiveDate) -> PermitWindow {
    let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
    PermitWindow {
        entry_date: tomorrow,
        entry_time: NaiveTime::from_hms_opt(9, 0, 0).expect("valid time"),
        exit_date: Some(tomorrow),
        exit_time: Some(NaiveTime::from_hms_opt(17, 0, 0).expect("valid time")),
    }
}

const PERMIT_FOOTER: &str = "This permit is valid only for the date and time \
window printed above and must be presented together with a government-issued \
photo ID at the school gate. Entry is subject to verification by security \
staff.";

/// Assembles the printable entry permit as a single bordered HTML page:
/// letterhead band, title and ticket number, the visitor fields, the QR
/// payload block and the fixed footer disclaimer. Rasterizing the QR payload
/// and converting to PDF are downstream concerns.
pub fn render_permit(
    config: &AppConfig,
    request: &VisitorRequest,
    ticket_id: Uuid,
    window: &PermitWindow,
    qr_payload_json: &str,
) -> String {
    let exit_window = match (window.exit_date, window.exit_time) {
        (Some(date), Some(time)) => format!("{date} {time}"),
        (Some(date), None) => date.to_string(),
        _ => "—".to_string(),
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Entry Permit {ticket_id}</title>
<style>
  body {{ font-family: serif; margin: 2em; }}
  .page {{ border: 3px double #333; padding: 2em; }}
  .letterhead {{ text-align: center; border-bottom: 1px solid #333; padding-bottom: 1em; }}
  .fields td {{ padding: 0.25em 1em 0.25em 0; }}
  .qr {{ text-align: center; margin: 2em 0; font-family: monospace; word-break: break-all; }}
  .footer {{ font-size: 0.8em; border-top: 1px solid #333; padding-top: 1em; }}
</style>
</head>
<body>
<div class="page">
  <div class="letterhead">
    <h1>{school_name}</h1>
    <p>{school_address}</p>
    <p>{school_contact} | DHSE Code: {school_dhse_code}</p>
  </div>
  <h2>Visitor Entry Permit</h2>
  <p>Ticket No: {ticket_id}</p>
  <table class="fields">
    <tr><td>Visitor Name</td><td>{visitor_name}</td></tr>
    <tr><td>Mobile</td><td>{mobile_number}</td></tr>
    <tr><td>Designation</td><td>{designation}</td></tr>
    <tr><td>Purpose of Visit</td><td>{purpose_of_visit}</td></tr>
    <tr><td>Permitted Entry</td><td>{entry_date} {entry_time}</td></tr>
    <tr><td>Permitted Exit</td><td>{exit_window}</td></tr>
  </table>
  <div class="qr" data-payload="{qr_payload}">{qr_payload}</div>
  <div class="footer">{footer}</div>
</div>
</body>
</html>
"#,
        school_name = escape_html(&config.school_name),
        school_address = escape_html(&config.school_address),
        school_contact = escape_html(&config.school_contact),
        school_dhse_code = escape_html(&config.school_dhse_code),
        visitor_name = escape_html(&request.visitor_name),
        mobile_number = escape_html(&request.mobile_number),
        designation = escape_html(&request.designation),
        purpose_of_visit = escape_html(&request.purpose_of_visit),
        entry_date = window.entry_date,
        entry_time = window.entry_time,
        qr_payload = escape_html(qr_payload_json),
        footer = PERMIT_FOOTER,
    )
}

fn escape_html(value: &str) -> String {
    value
        .chars()
        .map(|ch| match ch {
            '&' => "&amp;".to_string(),
            '<' => "&lt;".to_string(),
            '>' => "&gt;".to_string(),
            '"' => "&quot;".to_string(),
            _ => ch.to_string(),
        })
        .collect()
}
