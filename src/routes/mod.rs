use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::{auth::AuthenticatedAdmin, state::AppState};

pub mod auth;
pub mod health;
pub mod requests;
pub mod tickets;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        let allow_origin = AllowOrigin::list(headers);

        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me));

    let gate_pass_routes = Router::new()
        .route("/", get(requests::list_requests))
        .route(
            "/:id",
            get(requests::get_request).delete(requests::delete_request),
        )
        .route("/:id/decision", post(requests::decide_request))
        .route("/:id/id-proof", get(requests::download_id_proof))
        .route("/:id/ticket", post(tickets::issue_ticket));

    let ticket_routes = Router::new()
        .route("/:id", get(tickets::get_ticket))
        .route("/:id/permit", get(tickets::download_permit))
        .route("/:id/use", post(tickets::use_ticket));

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/gate-pass", gate_pass_routes)
        .nest("/tickets", ticket_routes)
        .layer(middleware::from_extractor_with_state::<AuthenticatedAdmin, _>(protected_state));

    // Submission stays public so visitors can apply without an account.
    Router::new()
        .route("/api/gate-pass", post(requests::submit_request))
        .nest("/api/admin", protected_routes)
        .nest("/api/auth", auth_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state.clone())
        .layer(cors)
        .layer(DefaultBodyLimit::max(
            state.config.max_upload_bytes + 64 * 1024,
        ))
}
