//! Admin session endpoints. Login verifies the password and opens a session:
//! a short-lived bearer token for the API plus a rotating refresh cookie.
//! Every refresh revokes the presented cookie and hands out a new one, so a
//! replayed cookie is dead on arrival.

use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    Json,
};
use axum_extra::{headers::Cookie, typed_header::TypedHeader};
use chrono::{Duration as ChronoDuration, Utc};
use diesel::prelude::*;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    auth::{password, AuthenticatedAdmin},
    config::AppConfig,
    error::{AppError, AppResult},
    models::{NewRefreshToken, RefreshToken, User},
    schema::refresh_tokens::dsl as tokens_dsl,
    schema::users::dsl as users_dsl,
    schema::{refresh_tokens, users},
    state::AppState,
};

const REFRESH_COOKIE_NAME: &str = "gatepass_refresh";

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<(HeaderMap, Json<SessionResponse>)> {
    let mut conn = state.db()?;

    let user: User = users_dsl::users
        .filter(users::username.eq(payload.username.trim()))
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::unauthorized)?;

    let valid = password::verify_password(&payload.password, &user.password_hash)
        .map_err(|_| AppError::unauthorized())?;
    if !valid {
        return Err(AppError::unauthorized());
    }

    // Drop this admin's dead sessions so the table does not accrete a row
    // per login forever.
    let now = Utc::now().naive_utc();
    diesel::delete(
        tokens_dsl::refresh_tokens
            .filter(refresh_tokens::user_id.eq(user.id))
            .filter(
                refresh_tokens::expires_at
                    .le(now)
                    .or(refresh_tokens::revoked_at.is_not_null()),
            ),
    )
    .execute(&mut conn)?;

    let (cookie, session) = start_session(&state, &mut conn, &user)?;
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);
    Ok((headers, Json(session)))
}

pub async fn refresh(
    State(state): State<AppState>,
    jar: Option<TypedHeader<Cookie>>,
) -> AppResult<(HeaderMap, Json<SessionResponse>)> {
    let presented = jar
        .as_ref()
        .and_then(|cookies| cookies.get(REFRESH_COOKIE_NAME))
        .ok_or_else(AppError::unauthorized)?;

    let mut conn = state.db()?;
    let now = Utc::now().naive_utc();

    let token: RefreshToken = tokens_dsl::refresh_tokens
        .filter(refresh_tokens::token_hash.eq(digest(presented)))
        .filter(refresh_tokens::revoked_at.is_null())
        .filter(refresh_tokens::expires_at.gt(now))
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::unauthorized)?;

    // Rotation: the presented cookie is spent before its replacement exists.
    diesel::update(tokens_dsl::refresh_tokens.find(token.id))
        .set((
            refresh_tokens::revoked_at.eq(now),
            refresh_tokens::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

    let user: User = users_dsl::users.find(token.user_id).first(&mut conn)?;

    let (cookie, session) = start_session(&state, &mut conn, &user)?;
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);
    Ok((headers, Json(session)))
}

pub async fn logout(
    State(state): State<AppState>,
    admin: AuthenticatedAdmin,
    jar: Option<TypedHeader<Cookie>>,
) -> AppResult<(HeaderMap, StatusCode)> {
    let mut conn = state.db()?;
    let now = Utc::now().naive_utc();

    let presented = jar
        .as_ref()
        .and_then(|cookies| cookies.get(REFRESH_COOKIE_NAME));

    let revoked = match presented {
        Some(value) => diesel::update(
            tokens_dsl::refresh_tokens
                .filter(refresh_tokens::token_hash.eq(digest(value)))
                .filter(refresh_tokens::user_id.eq(admin.user_id))
                .filter(refresh_tokens::revoked_at.is_null()),
        )
        .set((
            refresh_tokens::revoked_at.eq(now),
            refresh_tokens::updated_at.eq(now),
        ))
        .execute(&mut conn)?,
        None => 0,
    };

    // Without a matching cookie, end every session this admin still has.
    if revoked == 0 {
        diesel::update(
            tokens_dsl::refresh_tokens
                .filter(refresh_tokens::user_id.eq(admin.user_id))
                .filter(refresh_tokens::revoked_at.is_null()),
        )
        .set((
            refresh_tokens::revoked_at.eq(now),
            refresh_tokens::updated_at.eq(now),
        ))
        .execute(&mut conn)?;
    }

    let mut headers = HeaderMap::new();
    headers.insert(
        SET_COOKIE,
        session_cookie(&state.config, "", 0, "Thu, 01 Jan 1970 00:00:00 GMT"),
    );
    Ok((headers, StatusCode::NO_CONTENT))
}

pub async fn me(admin: AuthenticatedAdmin) -> Json<AuthenticatedAdmin> {
    Json(admin)
}

/// Issues the access token and a fresh refresh cookie for `user`, persisting
/// only the sha256 of the cookie value.
fn start_session(
    state: &AppState,
    conn: &mut PgConnection,
    user: &User,
) -> AppResult<(HeaderValue, SessionResponse)> {
    let access_token = state
        .jwt
        .generate_token(user.id, &user.username, &user.role)?;

    let mut raw = [0u8; 32];
    OsRng.fill_bytes(&mut raw);
    let refresh_value = hex::encode(raw);

    let now = Utc::now();
    let lifetime = ChronoDuration::days(state.config.refresh_token_expiry_days);
    let expires_at = now + lifetime;

    diesel::insert_into(refresh_tokens::table)
        .values(&NewRefreshToken {
            id: Uuid::new_v4(),
            user_id: user.id,
            token_hash: digest(&refresh_value),
            issued_at: now.naive_utc(),
            expires_at: expires_at.naive_utc(),
        })
        .execute(conn)?;

    let cookie = session_cookie(
        &state.config,
        &refresh_value,
        lifetime.num_seconds(),
        &expires_at.to_rfc2822(),
    );

    Ok((
        cookie,
        SessionResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: state.config.jwt_expiry_minutes * 60,
        },
    ))
}

fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn session_cookie(config: &AppConfig, value: &str, max_age: i64, expires: &str) -> HeaderValue {
    let mut cookie = format!(
        "{REFRESH_COOKIE_NAME}={value}; Path=/; HttpOnly; SameSite=Strict; \
Max-Age={max_age}; Expires={expires}"
    );
    if config.refresh_cookie_secure {
        cookie.push_str("; Secure");
    }
    if let Some(domain) = &config.refresh_cookie_domain {
        cookie.push_str("; Domain=");
        cookie.push_str(domain);
    }

    // The value is hex and the date is rfc2822; nothing here can fail to be
    // a header value.
    HeaderValue::from_str(&cookie).expect("ASCII cookie")
}
