//! Request handlers
//!
//! Every handler resolves the caller's session from the session cookie,
//! runs one session action to completion, and answers with either the
//! rendered page, a CSV download, or a JSON envelope.
//!
//! Session actions parse and write workbook files, so they run on the
//! blocking thread pool rather than on an async worker.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Multipart, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

use super::page::{render_page, UPLOAD_FIELD};
use super::server::AppState;
use crate::error::{PriceEditorError, PriceEditorResult};
use crate::export::CsvExport;
use crate::layout::{PRICE_COUNT, PRICE_LAYOUT};
use crate::prices::{read_prices, PriceValues};
use crate::session::{Notice, Session, SessionId, SessionView};

/// Cookie carrying the session id
pub const SESSION_COOKIE: &str = "price_editor_session";

/// Read the session id from the request's cookies
pub fn session_id(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

/// `Set-Cookie` value for a session id
pub fn session_cookie(id: SessionId) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, id)
}

/// HTTP status for a failed action
pub fn status_for(err: &PriceEditorError) -> StatusCode {
    match err {
        PriceEditorError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        PriceEditorError::Load(_) => StatusCode::BAD_REQUEST,
        PriceEditorError::Export(_) => StatusCode::NOT_FOUND,
        PriceEditorError::Save(_) | PriceEditorError::Io(_) | PriceEditorError::Config(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Run `action` on the caller's session on the blocking pool.
/// `Err` carries a ready 500 response when the task panicked.
async fn in_session<T, F>(
    state: &Arc<AppState>,
    headers: &HeaderMap,
    action: F,
) -> Result<(SessionId, T), Response>
where
    F: FnOnce(&mut Session) -> T + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    let id = session_id(headers);
    tokio::task::spawn_blocking(move || {
        state
            .sessions
            .with_session(id, &state.config.workbook, action)
    })
    .await
    .map_err(|e| {
        error!(error = %e, "session task failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
    })
}

fn render(id: SessionId, status: StatusCode, view: &SessionView) -> Response {
    (
        status,
        [(header::SET_COOKIE, session_cookie(id))],
        Html(render_page(view)),
    )
        .into_response()
}

/// GET / - Editor page
pub async fn page(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    match in_session(&state, &headers, |s| s.view()).await {
        Ok((id, view)) => render(id, StatusCode::OK, &view),
        Err(response) => response,
    }
}

/// Price form submission
#[derive(Debug, Default, Deserialize)]
pub struct PriceSubmission {
    #[serde(default)]
    pub d4: String,
    #[serde(default)]
    pub d5: String,
    #[serde(default)]
    pub d6: String,
    #[serde(default)]
    pub d7: String,
}

impl PriceSubmission {
    pub fn into_inputs(self) -> [String; PRICE_COUNT] {
        [self.d4, self.d5, self.d6, self.d7]
    }
}

/// POST /prices - Validate and save the four prices
pub async fn submit_prices(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(submission): Form<PriceSubmission>,
) -> Response {
    let outcome = in_session(&state, &headers, move |session| {
        let status = match session.submit_prices(submission.into_inputs()) {
            Ok(_) => StatusCode::OK,
            Err(e) => status_for(&e),
        };
        (status, session.view())
    })
    .await;

    match outcome {
        Ok((id, (status, view))) => render(id, status, &view),
        Err(response) => response,
    }
}

async fn read_upload(multipart: &mut Multipart) -> PriceEditorResult<(String, Vec<u8>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| PriceEditorError::Load(format!("Invalid upload: {}", e)))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload.xlsx").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| PriceEditorError::Load(format!("Failed to read upload: {}", e)))?;
        return Ok((filename, bytes.to_vec()));
    }

    Err(PriceEditorError::Load(format!(
        "No file in upload (expected field '{}')",
        UPLOAD_FIELD
    )))
}

/// POST /upload - Replace the session's workbook
pub async fn upload(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let upload = read_upload(&mut multipart).await;
    let upload_dir = state.config.upload_dir.clone();

    let outcome = in_session(&state, &headers, move |session| {
        let result = match upload {
            Ok((filename, bytes)) => session.upload(&filename, &bytes, &upload_dir),
            Err(e) => {
                session.notify(Notice::error(&e));
                Err(e)
            }
        };
        let status = match result {
            Ok(()) => StatusCode::OK,
            Err(e) => status_for(&e),
        };
        (status, session.view())
    })
    .await;

    match outcome {
        Ok((id, (status, view))) => render(id, status, &view),
        Err(response) => response,
    }
}

/// GET /export.csv - Download the Export sheet as CSV
pub async fn export_csv(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let outcome = in_session(&state, &headers, |session| match session.export() {
        Ok(csv) => Ok(csv),
        Err(e) => Err((status_for(&e), session.view())),
    })
    .await;
    let (id, outcome) = match outcome {
        Ok(done) => done,
        Err(response) => return response,
    };

    match outcome {
        Ok(csv) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, CsvExport::CONTENT_TYPE.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", csv.filename),
                ),
                (header::SET_COOKIE, session_cookie(id)),
            ],
            csv.bytes,
        )
            .into_response(),
        Err((status, view)) => render(id, status, &view),
    }
}

/// Standard API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            request_id: Uuid::new_v4().to_string(),
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            request_id: Uuid::new_v4().to_string(),
            data: None,
            error: Some(message.into()),
        }
    }
}

fn json_reply<T: Serialize>(
    id: SessionId,
    result: PriceEditorResult<T>,
) -> Response {
    let (status, body) = match result {
        Ok(data) => (StatusCode::OK, ApiResponse::ok(data)),
        Err(e) => {
            warn!(session = %id, kind = e.kind(), error = %e, "API request failed");
            (status_for(&e), ApiResponse::err(e.to_string()))
        }
    };
    (status, [(header::SET_COOKIE, session_cookie(id))], Json(body)).into_response()
}

/// One price cell in the JSON API
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PriceEntry {
    pub cell: String,
    pub label: String,
    /// Numeric value, if the cell holds a number
    pub value: Option<f64>,
    /// Display text of the cell
    pub text: String,
}

/// GET /api/v1/prices response
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PricesResponse {
    pub source: Option<String>,
    pub sheet_names: Vec<String>,
    pub prices: Vec<PriceEntry>,
}

/// GET /api/v1/prices - Current prices of the session's workbook
pub async fn get_prices(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let outcome = in_session(
        &state,
        &headers,
        |session| -> PriceEditorResult<PricesResponse> {
            let workbook = session.workbook().ok_or_else(|| {
                PriceEditorError::Load("No workbook loaded".to_string())
            })?;
            let values = read_prices(workbook)?;
            let prices = PRICE_LAYOUT
                .cells
                .iter()
                .zip(values)
                .map(|(p, v)| PriceEntry {
                    cell: p.cell.a1(),
                    label: p.label.to_string(),
                    value: v.as_number(),
                    text: v.to_string(),
                })
                .collect();
            Ok(PricesResponse {
                source: session.source().map(|s| s.describe()),
                sheet_names: workbook.sheet_names(),
                prices,
            })
        },
    )
    .await;

    match outcome {
        Ok((id, result)) => json_reply(id, result),
        Err(response) => response,
    }
}

/// POST /api/v1/prices request
#[derive(Debug, Deserialize)]
pub struct UpdatePricesRequest {
    pub values: [f64; PRICE_COUNT],
}

/// POST /api/v1/prices response
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct UpdatePricesResponse {
    pub saved: Vec<(String, f64)>,
    pub saved_at: String,
}

/// POST /api/v1/prices - Save four prices
pub async fn update_prices(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<UpdatePricesRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            warn!(error = %rejection, "rejected price update body");
            let body = ApiResponse::<()>::err(rejection.body_text());
            return (rejection.status(), Json(body)).into_response();
        }
    };

    let outcome = in_session(&state, &headers, move |session| {
        session
            .save_values(&PriceValues::new(req.values))
            .map(|report| UpdatePricesResponse {
                saved: report.cells,
                saved_at: report.saved_at.to_rfc3339(),
            })
    })
    .await;

    match outcome {
        Ok((id, result)) => json_reply(id, result),
        Err(response) => response,
    }
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub sessions: usize,
}

/// GET /health - Health check
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(HealthResponse {
        status: "healthy".to_string(),
        sessions: state.sessions.len(),
    }))
}

/// Version response
#[derive(Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub features: Vec<String>,
}

/// GET /version - Server version
pub async fn version(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(VersionResponse {
        version: state.version.clone(),
        features: vec![
            "edit".to_string(),
            "upload".to_string(),
            "export".to_string(),
        ],
    }))
}
