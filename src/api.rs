use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;
use tracing::warn;

use crate::{
    admin::resolve_page_params,
    error::DeskError,
    models::{DeleteResponse, ListingResponse, PageParams},
    panel::render_admin_page,
    telegram::{decode_update, TelegramUpdate},
    AppState,
};

pub const WEBHOOK_SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

pub async fn root() -> impl IntoResponse {
    (StatusCode::OK, "NovaDesk bot OK")
}

pub async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true, "timestamp": Utc::now() }))
}

pub async fn webhook_probe() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub async fn telegram_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(update): Json<TelegramUpdate>,
) -> Response {
    let expected_secret = state
        .config
        .telegram
        .as_ref()
        .and_then(|t| t.webhook_secret.as_deref());
    if let Some(expected) = expected_secret {
        let provided = headers
            .get(WEBHOOK_SECRET_HEADER)
            .and_then(|v| v.to_str().ok());
        if provided != Some(expected) {
            warn!("Rejected webhook call with missing or wrong secret token");
            return DeskError::Unauthorized.into_response();
        }
    }

    let Some(updates_tx) = &state.updates_tx else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "error": {
                    "code": "CHAT_DISABLED",
                    "message": "Chat transport is not configured."
                }
            })),
        )
            .into_response();
    };

    let update_id = update.update_id;
    let Some(inbound) = decode_update(update) else {
        return Json(json!({ "ok": true })).into_response();
    };

    if updates_tx.send(inbound).await.is_err() {
        warn!(update_id, "Update queue unavailable");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "error": {
                    "code": "QUEUE_UNAVAILABLE",
                    "message": "Update queue is unavailable."
                }
            })),
        )
            .into_response();
    }

    Json(json!({ "ok": true })).into_response()
}

pub async fn list_reservations(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(params): Query<PageParams>,
) -> Response {
    let access = match state.guard.admit(addr.ip(), &headers).await {
        Ok(access) => access,
        Err(rejection) => return rejection.into_response(),
    };

    let result = async {
        let (page, size) = resolve_page_params(&params, state.admin.listing_page_size())?;
        let listing = state.admin.render_listing(page, size).await?;
        Ok::<_, DeskError>(ListingResponse::from(listing))
    }
    .await;

    match result {
        Ok(body) => access.respond(Json(body)),
        Err(err) => access.respond(err),
    }
}

pub async fn export_reservations_csv(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(params): Query<PageParams>,
) -> Response {
    let access = match state.guard.admit(addr.ip(), &headers).await {
        Ok(access) => access,
        Err(rejection) => return rejection.into_response(),
    };

    let result = async {
        let (page, size) = resolve_page_params(&params, state.admin.csv_page_size())?;
        state.admin.export_csv(page, size).await
    }
    .await;

    match result {
        Ok(csv_text) => access.respond((
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"reservas.csv\"",
                ),
            ],
            csv_text,
        )),
        Err(err) => access.respond(err),
    }
}

pub async fn delete_reservation(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(raw_id): Path<String>,
) -> Response {
    let access = match state.guard.admit(addr.ip(), &headers).await {
        Ok(access) => access,
        Err(rejection) => return rejection.into_response(),
    };

    match state.admin.delete_one(&raw_id).await {
        Ok(outcome) => access.respond(Json(DeleteResponse {
            ok: true,
            deleted: outcome.deleted,
        })),
        Err(err) => access.respond(err),
    }
}

pub async fn admin_panel(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(params): Query<PageParams>,
) -> Response {
    let access = match state.guard.admit(addr.ip(), &headers).await {
        Ok(access) => access,
        Err(rejection) => return rejection.into_response(),
    };

    let result = async {
        let (page, size) = resolve_page_params(&params, state.admin.listing_page_size())?;
        let listing = state.admin.render_listing(page, size).await?;
        Ok::<_, DeskError>(render_admin_page(&listing))
    }
    .await;

    match result {
        Ok(html) => access.respond(Html(html)),
        Err(err) => access.respond(err),
    }
}
