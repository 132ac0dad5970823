//! HTTP API
//!
//! All routes are `GET` with query parameters and always answer `200` with a
//! JSON body. Failures are reported through `success: false` plus either
//! `msg` (session not connected) or `error` (bad request or send failure).

use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use axum_extra::extract::Query;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use wr_core::SessionHandle;
use wr_protocol::{Jid, UserInfo};

use crate::dispatch::{DispatchError, DispatchGateway, DEFAULT_FILE_NAME};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub session: SessionHandle,
    pub dispatch: Arc<DispatchGateway>,
}

/// `GET /status` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub connected: bool,
    pub user: Option<UserInfo>,
}

/// Body of every send route
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SendResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl SendResponse {
    fn not_connected(msg: &str) -> Self {
        Self {
            msg: Some(msg.to_string()),
            ..Default::default()
        }
    }

    fn error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    fn sent(ids: Vec<String>) -> Self {
        Self {
            success: true,
            sent_count: Some(ids.len()),
            ids: Some(ids),
            ..Default::default()
        }
    }

    fn single(id: String) -> Self {
        Self {
            success: true,
            id: Some(id),
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SendParams {
    to: Option<String>,
    /// Repeat `msg` to send several messages in one request
    #[serde(default)]
    msg: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ImageParams {
    to: Option<String>,
    url: Option<String>,
    caption: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FileParams {
    to: Option<String>,
    url: Option<String>,
    filename: Option<String>,
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/send", get(send))
        .route("/image", get(image))
        .route("/file", get(file))
        .with_state(state)
}

/// Serve `app` on `listener` until `cancel` fires
pub async fn serve(
    listener: TcpListener,
    app: Router,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
            tracing::info!("HTTP server shutting down");
        })
        .await
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = state.session.status();
    Json(StatusResponse {
        connected: status.is_connected(),
        user: status.user,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

async fn send(
    State(state): State<AppState>,
    Query(params): Query<SendParams>,
) -> Json<SendResponse> {
    if !state.dispatch.is_connected() {
        return Json(SendResponse::not_connected("WhatsApp not connected"));
    }

    let to = params.to.as_deref().and_then(Jid::from_phone);
    let has_text = params.msg.iter().any(|m| !m.is_empty());
    let Some(to) = to.filter(|_| has_text) else {
        return Json(SendResponse::error("to & msg required"));
    };

    match state.dispatch.send_text(&to, &params.msg).await {
        Ok(ids) => Json(SendResponse::sent(ids)),
        Err(DispatchError::NotConnected) => {
            Json(SendResponse::not_connected("WhatsApp not connected"))
        }
        Err(e) => {
            let ids = e.sent_ids().to_vec();
            Json(SendResponse {
                error: Some(e.to_string()),
                sent_count: Some(ids.len()),
                ids: Some(ids),
                ..Default::default()
            })
        }
    }
}

async fn image(
    State(state): State<AppState>,
    Query(params): Query<ImageParams>,
) -> Json<SendResponse> {
    if !state.dispatch.is_connected() {
        return Json(SendResponse::not_connected("Not connected"));
    }

    let to = params.to.as_deref().and_then(Jid::from_phone);
    let (Some(to), Some(url)) = (to, non_empty(params.url)) else {
        return Json(SendResponse::error("to & url required"));
    };
    let caption = params.caption.unwrap_or_default();

    Json(single_result(state.dispatch.send_image(&to, &url, &caption).await))
}

async fn file(
    State(state): State<AppState>,
    Query(params): Query<FileParams>,
) -> Json<SendResponse> {
    if !state.dispatch.is_connected() {
        return Json(SendResponse::not_connected("Not connected"));
    }

    let to = params.to.as_deref().and_then(Jid::from_phone);
    let (Some(to), Some(url)) = (to, non_empty(params.url)) else {
        return Json(SendResponse::error("to & url required"));
    };
    let file_name = non_empty(params.filename).unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());

    Json(single_result(state.dispatch.send_file(&to, &url, &file_name).await))
}

fn single_result(result: Result<String, DispatchError>) -> SendResponse {
    match result {
        Ok(id) => SendResponse::single(id),
        Err(DispatchError::NotConnected) => SendResponse::not_connected("Not connected"),
        Err(e) => SendResponse::error(e.to_string()),
    }
}
