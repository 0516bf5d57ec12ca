//!
//! campsite HTTP server
//! --------------------
//! This module defines the Axum-based HTTP API for campsite.
//!
//! Responsibilities:
//! - Session management with a simple cookie + CSRF token model.
//! - Login/logout and bearer-token endpoints backed by the `identity` module.
//! - Camp and speaker CRUD delegating to the store, with policy and
//!   ownership checks run before any mutation.
//! - Configuration reload endpoint re-reading the config file on demand.
//!
//! Authentication is an explicit pipeline: `authenticate_request` turns the
//! request headers into a `RequestContext`, which handlers pass into the
//! authorization checks. There is no implicit per-request global state.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::config::{AppConfig, ConfigHandle};
use crate::error::{AppError, AppResult};
use crate::identity::{
    check_credentials, check_owner, check_policy, issue_token, verify_token, CredentialCheck,
    LoginRequest, Policy, Principal, RequestContext, SessionManager, TokenError,
};
use crate::models::{CampModel, CredentialModel, SpeakerModel};
use crate::storage::{self, Camp, SharedStore, Speaker};

const SESSION_COOKIE: &str = "campsite_session";

type ErrResp = (StatusCode, Json<Value>);

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub config: Arc<ConfigHandle>,
    pub sessions: SessionManager,
}

fn log_startup(cfg: &AppConfig) {
    info!(
        target: "startup",
        "campsite starting: http_port={}, data_root='{}', token_issuer='{}', token_audience='{}', token_ttl_secs={}",
        cfg.http_port, cfg.data_root, cfg.tokens.issuer, cfg.tokens.audience, cfg.tokens.token_ttl_secs
    );
    if cfg.tokens.secret.is_empty() {
        warn!("token signing secret is not configured; token issuance will fail until it is set");
    }
}

/// Start the campsite HTTP server using the configuration at `config_path`.
pub async fn run(config_path: &str) -> anyhow::Result<()> {
    let config = Arc::new(ConfigHandle::load(config_path)?);
    let snapshot = config.snapshot();
    log_startup(&snapshot);

    let store = SharedStore::new(&snapshot.data_root)?;
    storage::ensure_default_users(&store)?;

    let state = AppState { store, config, sessions: SessionManager::default() };
    let app = router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", snapshot.http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Mount all HTTP routes onto the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "campsite ok" }))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/csrf", get(get_csrf))
        .route("/api/auth/token", post(create_token))
        .route("/api/operations/reload-config", post(reload_config))
        .route("/api/camps", get(camps_index).post(camps_create))
        .route(
            "/api/camps/{moniker}",
            get(camps_get).put(camps_update).delete(camps_delete),
        )
        .route(
            "/api/camps/{moniker}/speakers",
            get(speakers_index).post(speakers_create),
        )
        .route(
            "/api/camps/{moniker}/speakers/{id}",
            get(speakers_get).put(speakers_update).delete(speakers_delete),
        )
        .with_state(state)
}

// --- request authentication pipeline ---

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie").or_else(|| headers.get("Cookie"))?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name {
                return Some(v[1..].to_string());
            }
        }
    }
    None
}

fn set_session_cookie(sid: &str) -> HeaderValue {
    // HttpOnly cookie scoped to path / with SameSite=Strict
    HeaderValue::from_str(&format!(
        "{}={}; HttpOnly; Secure; SameSite=Strict; Path=/",
        SESSION_COOKIE, sid
    ))
    .unwrap()
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_str(&format!(
        "{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; Secure; SameSite=Strict; Path=/",
        SESSION_COOKIE
    ))
    .unwrap()
}

/// Resolve the request's credential into a `RequestContext`.
///
/// Bearer tokens are checked first; any validation failure downgrades to
/// anonymous rather than erroring, and downstream authorization denies.
/// Cookie sessions are consulted only when no bearer token is presented.
pub fn authenticate_request(state: &AppState, headers: &HeaderMap) -> RequestContext {
    if let Some(value) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ") {
            let cfg = state.config.tokens();
            return match verify_token(&cfg, token.trim()) {
                Ok(principal) => RequestContext { principal: Some(principal), session_id: None },
                Err(e) => {
                    debug!("bearer token rejected: {e}");
                    RequestContext::anonymous()
                }
            };
        }
    }
    if let Some(sid) = parse_cookie(headers, SESSION_COOKIE) {
        if let Some(principal) = state.sessions.validate(&sid) {
            return RequestContext { principal: Some(principal), session_id: Some(sid) };
        }
    }
    RequestContext::anonymous()
}

struct Authed {
    principal: Principal,
    session_id: Option<String>,
}

fn require_auth(state: &AppState, headers: &HeaderMap) -> Result<Authed, ErrResp> {
    let ctx = authenticate_request(state, headers);
    match ctx.principal {
        Some(principal) => Ok(Authed { principal, session_id: ctx.session_id }),
        None => Err((StatusCode::UNAUTHORIZED, Json(json!({"status":"unauthorized"})))),
    }
}

/// Cookie-mode mutations must echo the session's CSRF token; bearer requests
/// carry no ambient credential and are exempt.
fn require_csrf(state: &AppState, headers: &HeaderMap, auth: &Authed) -> Result<(), ErrResp> {
    let Some(sid) = &auth.session_id else { return Ok(()) };
    let provided = headers.get("x-csrf-token").and_then(|v| v.to_str().ok());
    match (state.sessions.csrf_for(sid), provided) {
        (Some(expected), Some(got)) if expected == got => Ok(()),
        _ => Err((
            StatusCode::FORBIDDEN,
            Json(json!({"status":"forbidden","error":"invalid csrf"})),
        )),
    }
}

fn error_response(err: &AppError) -> ErrResp {
    if matches!(err, AppError::Internal { .. } | AppError::Io { .. }) {
        error!("request failed: {err}");
    }
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(json!({"status":"error","code": err.code_str(),"message": err.message()})),
    )
}

// --- auth endpoints ---

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<CredentialModel>,
) -> impl IntoResponse {
    if payload.validate().is_err() {
        return (
            StatusCode::BAD_REQUEST,
            HeaderMap::new(),
            Json(json!({"status":"error","message":"failed to login"})),
        );
    }
    let req = LoginRequest { username: payload.username, password: payload.password };
    match check_credentials(&state.store, &req) {
        CredentialCheck::Verified(principal) => {
            let sess = state.sessions.issue(principal);
            let mut headers = HeaderMap::new();
            headers.insert("Set-Cookie", set_session_cookie(&sess.session_id));
            (StatusCode::OK, headers, Json(json!({"status":"ok"})))
        }
        // unknown user and wrong password are indistinguishable here
        CredentialCheck::Rejected => (
            StatusCode::BAD_REQUEST,
            HeaderMap::new(),
            Json(json!({"status":"error","message":"failed to login"})),
        ),
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let auth = match require_auth(&state, &headers) {
        Ok(a) => a,
        Err(e) => return (e.0, HeaderMap::new(), e.1),
    };
    if let Err(e) = require_csrf(&state, &headers, &auth) {
        return (e.0, HeaderMap::new(), e.1);
    }
    if let Some(sid) = &auth.session_id {
        state.sessions.logout(sid);
    }
    let mut h = HeaderMap::new();
    h.insert("Set-Cookie", clear_session_cookie());
    (StatusCode::OK, h, Json(json!({"status":"ok"})))
}

async fn get_csrf(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let Some(sid) = parse_cookie(&headers, SESSION_COOKIE) else {
        return (StatusCode::UNAUTHORIZED, Json(json!({"status":"unauthorized"})));
    };
    match state.sessions.csrf_for(&sid) {
        Some(token) => (StatusCode::OK, Json(json!({"status":"ok","csrf": token}))),
        None => (StatusCode::UNAUTHORIZED, Json(json!({"status":"unauthorized"}))),
    }
}

async fn create_token(
    State(state): State<AppState>,
    Json(payload): Json<CredentialModel>,
) -> impl IntoResponse {
    if payload.validate().is_err() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"status":"error","message":"failed to generate token"})),
        );
    }
    let req = LoginRequest { username: payload.username, password: payload.password };
    match check_credentials(&state.store, &req) {
        CredentialCheck::Verified(principal) => {
            let cfg = state.config.tokens();
            match issue_token(&cfg, &principal) {
                Ok(issued) => (
                    StatusCode::OK,
                    Json(json!({
                        "status": "ok",
                        "token": issued.token,
                        "expiration": issued.expires_at.to_rfc3339(),
                    })),
                ),
                Err(e @ (TokenError::MissingKey | TokenError::Signing(_))) => {
                    error!("token issuance failed: {e}");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({"status":"error","message":"internal server error"})),
                    )
                }
                Err(e) => {
                    error!("token issuance failed: {e}");
                    (
                        StatusCode::BAD_REQUEST,
                        Json(json!({"status":"error","message":"failed to generate token"})),
                    )
                }
            }
        }
        CredentialCheck::Rejected => (
            StatusCode::BAD_REQUEST,
            Json(json!({"status":"error","message":"failed to generate token"})),
        ),
    }
}

// --- operations ---

async fn reload_config(State(state): State<AppState>) -> impl IntoResponse {
    match state.config.reload() {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({"status":"ok","message":"configuration reloaded"})),
        ),
        Err(e) => {
            error!("configuration reload failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"status":"error","message":"could not reload configuration"})),
            )
        }
    }
}

// --- resource gateway ---
// Existence checks run before ownership checks: a missing record is "not
// found" regardless of who asks. Policy denial is always "forbidden".

/// Create a camp. Requires the SuperUsers policy.
pub fn create_camp(
    store: &SharedStore,
    principal: &Principal,
    model: CampModel,
) -> AppResult<Camp> {
    if !check_policy(principal, Policy::SuperUsers).allowed() {
        return Err(AppError::forbidden("forbidden", "super user required"));
    }
    model
        .validate()
        .map_err(|m| AppError::user("invalid_camp".to_string(), m))?;
    let camp = model.into_camp();
    let mut guard = store.0.write();
    if guard.get_camp(&camp.moniker).is_some() {
        return Err(AppError::conflict(
            "camp_exists",
            "a camp with this moniker already exists",
        ));
    }
    guard.insert_camp(camp.clone()).map_err(AppError::from)?;
    Ok(camp)
}

pub fn update_camp(store: &SharedStore, moniker: &str, mut model: CampModel) -> AppResult<Camp> {
    model.moniker = moniker.to_string();
    model
        .validate()
        .map_err(|m| AppError::user("invalid_camp".to_string(), m))?;
    let mut guard = store.0.write();
    if guard.get_camp(moniker).is_none() {
        return Err(AppError::not_found("camp_not_found", "camp was not found"));
    }
    let camp = model.into_camp();
    guard.update_camp(camp.clone()).map_err(AppError::from)?;
    Ok(camp)
}

pub fn delete_camp(store: &SharedStore, moniker: &str) -> AppResult<()> {
    let mut guard = store.0.write();
    if guard.get_camp(moniker).is_none() {
        return Err(AppError::not_found("camp_not_found", "camp was not found"));
    }
    guard.delete_camp(moniker).map_err(AppError::from)?;
    Ok(())
}

/// Create a speaker under a camp, recording the creator as owner.
pub fn create_speaker(
    store: &SharedStore,
    principal: &Principal,
    moniker: &str,
    model: SpeakerModel,
) -> AppResult<Speaker> {
    model
        .validate()
        .map_err(|m| AppError::user("invalid_speaker".to_string(), m))?;
    let mut guard = store.0.write();
    if guard.get_camp(moniker).is_none() {
        return Err(AppError::user("camp_not_found", "could not find camp"));
    }
    let speaker = Speaker {
        id: 0,
        camp_moniker: moniker.to_string(),
        owner: principal.username.clone(),
        name: model.name.clone(),
        company_name: model.company_name.clone(),
        phone_number: model.phone_number.clone(),
        website_url: model.website_url.clone(),
        bio: model.bio.clone(),
        head_shot_url: model.head_shot_url.clone(),
    };
    let stored = guard.add_speaker(speaker).map_err(AppError::from)?;
    Ok(stored)
}

/// Update a speaker: resolve, verify the camp, check ownership, persist.
pub fn update_speaker(
    store: &SharedStore,
    principal: &Principal,
    moniker: &str,
    id: i64,
    model: SpeakerModel,
) -> AppResult<Speaker> {
    model
        .validate()
        .map_err(|m| AppError::user("invalid_speaker".to_string(), m))?;
    let mut guard = store.0.write();
    let Some(existing) = guard.get_speaker(id) else {
        return Err(AppError::not_found("speaker_not_found", "speaker was not found"));
    };
    if existing.camp_moniker != moniker {
        return Err(AppError::user(
            "speaker_camp_mismatch",
            "speaker and camp do not match",
        ));
    }
    if !check_owner(principal, &existing.owner).allowed() {
        return Err(AppError::forbidden(
            "forbidden",
            "only the owner may modify this speaker",
        ));
    }
    let mut updated = existing.clone();
    model.apply_to(&mut updated);
    guard.update_speaker(updated.clone()).map_err(AppError::from)?;
    Ok(updated)
}

/// Delete a speaker under the same ordering as update.
pub fn delete_speaker(
    store: &SharedStore,
    principal: &Principal,
    moniker: &str,
    id: i64,
) -> AppResult<()> {
    let mut guard = store.0.write();
    let Some(existing) = guard.get_speaker(id) else {
        return Err(AppError::not_found("speaker_not_found", "speaker was not found"));
    };
    if existing.camp_moniker != moniker {
        return Err(AppError::user(
            "speaker_camp_mismatch",
            "speaker and camp do not match",
        ));
    }
    if !check_owner(principal, &existing.owner).allowed() {
        return Err(AppError::forbidden(
            "forbidden",
            "only the owner may delete this speaker",
        ));
    }
    guard.delete_speaker(id).map_err(AppError::from)?;
    Ok(())
}

// --- camp handlers ---

#[derive(Debug, Deserialize)]
struct CampQuery {
    #[serde(default)]
    include_speakers: bool,
}

async fn camps_index(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Err(e) = require_auth(&state, &headers) {
        return e;
    }
    let camps = state.store.0.read().list_camps();
    (StatusCode::OK, Json(json!({"status":"ok","camps": camps})))
}

async fn camps_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(moniker): Path<String>,
    Query(query): Query<CampQuery>,
) -> impl IntoResponse {
    if let Err(e) = require_auth(&state, &headers) {
        return e;
    }
    let guard = state.store.0.read();
    let Some(camp) = guard.get_camp(&moniker) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"status":"error","message": format!("camp {} was not found", moniker)})),
        );
    };
    if query.include_speakers {
        let speakers: Vec<SpeakerModel> =
            guard.speakers_for(&moniker).iter().map(SpeakerModel::from).collect();
        (
            StatusCode::OK,
            Json(json!({"status":"ok","camp": camp, "speakers": speakers})),
        )
    } else {
        (StatusCode::OK, Json(json!({"status":"ok","camp": camp})))
    }
}

async fn camps_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CampModel>,
) -> impl IntoResponse {
    let auth = match require_auth(&state, &headers) {
        Ok(a) => a,
        Err(e) => return e,
    };
    if let Err(e) = require_csrf(&state, &headers, &auth) {
        return e;
    }
    match create_camp(&state.store, &auth.principal, payload) {
        Ok(camp) => (
            StatusCode::CREATED,
            Json(json!({"status":"ok","camp": camp})),
        ),
        Err(err) => error_response(&err),
    }
}

async fn camps_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(moniker): Path<String>,
    Json(payload): Json<CampModel>,
) -> impl IntoResponse {
    let auth = match require_auth(&state, &headers) {
        Ok(a) => a,
        Err(e) => return e,
    };
    if let Err(e) = require_csrf(&state, &headers, &auth) {
        return e;
    }
    match update_camp(&state.store, &moniker, payload) {
        Ok(camp) => (StatusCode::OK, Json(json!({"status":"ok","camp": camp}))),
        Err(err) => error_response(&err),
    }
}

async fn camps_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(moniker): Path<String>,
) -> impl IntoResponse {
    let auth = match require_auth(&state, &headers) {
        Ok(a) => a,
        Err(e) => return e,
    };
    if let Err(e) = require_csrf(&state, &headers, &auth) {
        return e;
    }
    match delete_camp(&state.store, &moniker) {
        Ok(()) => (StatusCode::OK, Json(json!({"status":"ok"}))),
        Err(err) => error_response(&err),
    }
}

// --- speaker handlers ---

async fn speakers_index(
    State(state): State<AppState>,
    Path(moniker): Path<String>,
) -> impl IntoResponse {
    let guard = state.store.0.read();
    if guard.get_camp(&moniker).is_none() {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"status":"error","message": format!("camp {} was not found", moniker)})),
        );
    }
    let speakers: Vec<SpeakerModel> =
        guard.speakers_for(&moniker).iter().map(SpeakerModel::from).collect();
    (StatusCode::OK, Json(json!({"status":"ok","speakers": speakers})))
}

async fn speakers_get(
    State(state): State<AppState>,
    Path((moniker, id)): Path<(String, i64)>,
) -> impl IntoResponse {
    let guard = state.store.0.read();
    let Some(speaker) = guard.get_speaker(id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"status":"error","message":"speaker was not found"})),
        );
    };
    if speaker.camp_moniker != moniker {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"status":"error","message":"speaker not in specified camp"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({"status":"ok","speaker": SpeakerModel::from(speaker)})),
    )
}

async fn speakers_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(moniker): Path<String>,
    Json(payload): Json<SpeakerModel>,
) -> impl IntoResponse {
    let auth = match require_auth(&state, &headers) {
        Ok(a) => a,
        Err(e) => return e,
    };
    if let Err(e) = require_csrf(&state, &headers, &auth) {
        return e;
    }
    match create_speaker(&state.store, &auth.principal, &moniker, payload) {
        Ok(speaker) => (
            StatusCode::CREATED,
            Json(json!({"status":"ok","speaker": SpeakerModel::from(&speaker)})),
        ),
        Err(err) => error_response(&err),
    }
}

async fn speakers_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((moniker, id)): Path<(String, i64)>,
    Json(payload): Json<SpeakerModel>,
) -> impl IntoResponse {
    let auth = match require_auth(&state, &headers) {
        Ok(a) => a,
        Err(e) => return e,
    };
    if let Err(e) = require_csrf(&state, &headers, &auth) {
        return e;
    }
    match update_speaker(&state.store, &auth.principal, &moniker, id, payload) {
        Ok(speaker) => (
            StatusCode::OK,
            Json(json!({"status":"ok","speaker": SpeakerModel::from(&speaker)})),
        ),
        Err(err) => error_response(&err),
    }
}

async fn speakers_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((moniker, id)): Path<(String, i64)>,
) -> impl IntoResponse {
    let auth = match require_auth(&state, &headers) {
        Ok(a) => a,
        Err(e) => return e,
    };
    if let Err(e) = require_csrf(&state, &headers, &auth) {
        return e;
    }
    match delete_speaker(&state.store, &auth.principal, &moniker, id) {
        Ok(()) => (StatusCode::OK, Json(json!({"status":"ok"}))),
        Err(err) => error_response(&err),
    }
}
