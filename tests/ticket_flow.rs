mod common;

use anyhow::{anyhow, Result};
use axum::http::{header, StatusCode};
use common::{acquire_db_lock, body_to_json, body_to_vec, parent_fields, TestApp, PNG_STUB};
use uuid::Uuid;

async fn submit_and_approve(app: &TestApp, token: &str) -> Result<Uuid> {
    let response = app
        .submit_gate_pass(&parent_fields(), Some(("aadhaar.png", "image/png", PNG_STUB)))
        .await?;
    anyhow::ensure!(
        response.status() == StatusCode::CREATED,
        "submission failed with status {}",
        response.status()
    );
    let body = body_to_json(response.into_body()).await?;
    let id = body["request"]["id"]
        .as_str()
        .ok_or_else(|| anyhow!("no request id in response"))?;
    let request_id = Uuid::parse_str(id)?;

    let decision = app
        .post_json(
            &format!("/api/admin/gate-pass/{request_id}/decision"),
            &serde_json::json!({ "status": "approved", "comments": "OK, verified" }),
            Some(token),
        )
        .await?;
    anyhow::ensure!(
        decision.status() == StatusCode::OK,
        "approval failed with status {}",
        decision.status()
    );

    Ok(request_id)
}

#[tokio::test]
async fn issued_ticket_embeds_a_matching_qr_payload() -> Result<()> {
    let _guard = acquire_db_lock().await;
    let app = TestApp::new().await?;

    app.insert_admin("gatekeeper", "correct horse").await?;
    let token = app.login_token("gatekeeper", "correct horse").await?;
    let request_id = submit_and_approve(&app, &token).await?;

    let response = app
        .post_json(
            &format!("/api/admin/gate-pass/{request_id}/ticket"),
            &serde_json::json!({}),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_to_json(response.into_body()).await?;
    let ticket = &body["ticket"];
    let ticket_id = ticket["id"].as_str().ok_or_else(|| anyhow!("no ticket id"))?;
    assert_eq!(ticket["visitor_request_id"], request_id.to_string());
    assert_eq!(ticket["is_used"], false);

    let qr: serde_json::Value = serde_json::from_str(
        ticket["qr_code_data"]
            .as_str()
            .ok_or_else(|| anyhow!("no qr payload"))?,
    )?;
    assert_eq!(qr["ticketId"], ticket_id.to_string());
    assert_eq!(qr["gatePassId"], request_id.to_string());
    assert_eq!(qr["visitorName"], "A. Kumar");
    assert_eq!(qr["purposeOfVisit"], "Fee payment for my son");
    assert_eq!(
        qr["permittedEntryDate"],
        ticket["permitted_entry_date"].clone()
    );

    // ID proof plus the rendered permit.
    assert_eq!(app.storage().object_count().await, 2);
    let permit_key = format!("permits/{ticket_id}.html");
    assert!(app.storage().get(&permit_key).await.is_some());

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn a_request_gets_at_most_one_ticket() -> Result<()> {
    let _guard = acquire_db_lock().await;
    let app = TestApp::new().await?;

    app.insert_admin("gatekeeper", "correct horse").await?;
    let token = app.login_token("gatekeeper", "correct horse").await?;
    let request_id = submit_and_approve(&app, &token).await?;

    let first = app
        .post_json(
            &format!("/api/admin/gate-pass/{request_id}/ticket"),
            &serde_json::json!({}),
            Some(&token),
        )
        .await?;
    assert_eq!(first.status(), StatusCode::CREATED);
    let objects_after_first = app.storage().object_count().await;

    let second = app
        .post_json(
            &format!("/api/admin/gate-pass/{request_id}/ticket"),
            &serde_json::json!({}),
            Some(&token),
        )
        .await?;
    assert_eq!(second.status(), StatusCode::CONFLICT);

    // The duplicate's permit upload was compensated away.
    assert_eq!(app.storage().object_count().await, objects_after_first);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn tickets_are_only_issued_for_approved_requests() -> Result<()> {
    let _guard = acquire_db_lock().await;
    let app = TestApp::new().await?;

    app.insert_admin("gatekeeper", "correct horse").await?;
    let token = app.login_token("gatekeeper", "correct horse").await?;

    let response = app
        .submit_gate_pass(&parent_fields(), Some(("aadhaar.png", "image/png", PNG_STUB)))
        .await?;
    let body = body_to_json(response.into_body()).await?;
    let request_id = body["request"]["id"]
        .as_str()
        .ok_or_else(|| anyhow!("no request id"))?
        .to_string();

    let issue = app
        .post_json(
            &format!("/api/admin/gate-pass/{request_id}/ticket"),
            &serde_json::json!({}),
            Some(&token),
        )
        .await?;
    assert_eq!(issue.status(), StatusCode::CONFLICT);

    let unknown = app
        .post_json(
            &format!("/api/admin/gate-pass/{}/ticket", Uuid::new_v4()),
            &serde_json::json!({}),
            Some(&token),
        )
        .await?;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn an_explicit_entry_window_is_honored() -> Result<()> {
    let _guard = acquire_db_lock().await;
    let app = TestApp::new().await?;

    app.insert_admin("gatekeeper", "correct horse").await?;
    let token = app.login_token("gatekeeper", "correct horse").await?;
    let request_id = submit_and_approve(&app, &token).await?;

    let response = app
        .post_json(
            &format!("/api/admin/gate-pass/{request_id}/ticket"),
            &serde_json::json!({
                "entry_date": "2026-09-01",
                "entry_time": "10:30:00",
                "exit_date": "2026-09-01",
                "exit_time": "12:00:00"
            }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_to_json(response.into_body()).await?;
    let ticket = &body["ticket"];
    assert_eq!(ticket["permitted_entry_date"], "2026-09-01");
    assert_eq!(ticket["permitted_entry_time"], "10:30:00");
    assert_eq!(ticket["permitted_exit_time"], "12:00:00");

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn the_permit_download_names_the_visitor() -> Result<()> {
    let _guard = acquire_db_lock().await;
    let app = TestApp::new().await?;

    app.insert_admin("gatekeeper", "correct horse").await?;
    let token = app.login_token("gatekeeper", "correct horse").await?;
    let request_id = submit_and_approve(&app, &token).await?;

    let issued = app
        .post_json(
            &format!("/api/admin/gate-pass/{request_id}/ticket"),
            &serde_json::json!({}),
            Some(&token),
        )
        .await?;
    let issued = body_to_json(issued.into_body()).await?;
    let ticket_id = issued["ticket"]["id"]
        .as_str()
        .ok_or_else(|| anyhow!("no ticket id"))?
        .to_string();

    let response = app
        .get(&format!("/api/admin/tickets/{ticket_id}/permit"), Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(disposition.contains(&format!("entry-permit-{ticket_id}.html")));

    let html = String::from_utf8(body_to_vec(response.into_body()).await?)?;
    assert!(html.contains("A. Kumar"));
    assert!(html.contains("Test Higher Secondary School"));
    assert!(html.contains("Visitor Entry Permit"));

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn a_ticket_is_used_exactly_once() -> Result<()> {
    let _guard = acquire_db_lock().await;
    let app = TestApp::new().await?;

    app.insert_admin("gatekeeper", "correct horse").await?;
    let token = app.login_token("gatekeeper", "correct horse").await?;
    let request_id = submit_and_approve(&app, &token).await?;

    let issued = app
        .post_json(
            &format!("/api/admin/gate-pass/{request_id}/ticket"),
            &serde_json::json!({}),
            Some(&token),
        )
        .await?;
    let issued = body_to_json(issued.into_body()).await?;
    let ticket_id = issued["ticket"]["id"]
        .as_str()
        .ok_or_else(|| anyhow!("no ticket id"))?
        .to_string();

    let first = app
        .post_json(
            &format!("/api/admin/tickets/{ticket_id}/use"),
            &serde_json::json!({}),
            Some(&token),
        )
        .await?;
    assert_eq!(first.status(), StatusCode::OK);
    let first = body_to_json(first.into_body()).await?;
    assert_eq!(first["ticket"]["is_used"], true);
    assert!(first["ticket"]["used_at"].is_string());

    let second = app
        .post_json(
            &format!("/api/admin/tickets/{ticket_id}/use"),
            &serde_json::json!({}),
            Some(&token),
        )
        .await?;
    assert_eq!(second.status(), StatusCode::CONFLICT);

    let unknown = app
        .post_json(
            &format!("/api/admin/tickets/{}/use", Uuid::new_v4()),
            &serde_json::json!({}),
            Some(&token),
        )
        .await?;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn deleting_a_request_removes_its_ticket_and_objects() -> Result<()> {
    let _guard = acquire_db_lock().await;
    let app = TestApp::new().await?;

    app.insert_admin("gatekeeper", "correct horse").await?;
    let token = app.login_token("gatekeeper", "correct horse").await?;
    let request_id = submit_and_approve(&app, &token).await?;

    let issued = app
        .post_json(
            &format!("/api/admin/gate-pass/{request_id}/ticket"),
            &serde_json::json!({}),
            Some(&token),
        )
        .await?;
    assert_eq!(issued.status(), StatusCode::CREATED);
    assert_eq!(app.storage().object_count().await, 2);

    let deleted = app
        .delete(&format!("/api/admin/gate-pass/{request_id}"), Some(&token))
        .await?;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.storage().object_count().await, 0);

    let gone = app
        .get(&format!("/api/admin/gate-pass/{request_id}"), Some(&token))
        .await?;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);

    app.cleanup().await?;
    Ok(())
}
