//! Upload form: a small axum app in front of an [`Extractor`].
//!
//! `GET /` serves the form, `POST /upload` renders the three fields as an
//! HTML page and `POST /api/extract` returns the same [`PipelineOutput`] as
//! JSON. Both POST routes expect a multipart body with the PDF in the
//! `pdf_file` field.

use crate::error::ExtractError;
use crate::extract::Extractor;
use crate::output::{FieldValue, HoldingRecord, PipelineOutput};
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Name of the multipart field carrying the PDF.
pub const UPLOAD_FIELD: &str = "pdf_file";

/// Largest accepted request body.
pub const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    extractor: Arc<Extractor>,
}

impl AppState {
    pub fn new(extractor: Arc<Extractor>) -> Self {
        Self { extractor }
    }
}

type HandlerError = (StatusCode, String);

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(upload_form))
        .route("/upload", post(upload_html))
        .route("/api/extract", post(upload_json))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve the upload form until the process is stopped.
pub async fn serve(addr: SocketAddr, extractor: Arc<Extractor>) -> std::io::Result<()> {
    let app = router(AppState::new(extractor));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Serving upload form on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await
}

async fn upload_form() -> Html<&'static str> {
    Html(FORM_PAGE)
}

async fn upload_html(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Html<String>, HandlerError> {
    let output = run_upload(&state, multipart).await?;
    Ok(Html(render_results(&output)))
}

async fn upload_json(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<PipelineOutput>, HandlerError> {
    Ok(Json(run_upload(&state, multipart).await?))
}

async fn run_upload(state: &AppState, multipart: Multipart) -> Result<PipelineOutput, HandlerError> {
    let bytes = read_pdf_field(multipart).await?;
    info!("Received {} byte upload", bytes.len());

    state.extractor.run_bytes(&bytes).await.map_err(|e| {
        let status = status_for(&e);
        if status.is_server_error() {
            error!("Extraction failed: {}", e);
        } else {
            warn!("Rejected upload: {}", e);
        }
        (status, e.to_string())
    })
}

async fn read_pdf_field(mut multipart: Multipart) -> Result<Bytes, HandlerError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            return field
                .bytes()
                .await
                .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()));
        }
    }
    Err((
        StatusCode::BAD_REQUEST,
        format!("missing '{UPLOAD_FIELD}' file field"),
    ))
}

fn status_for(err: &ExtractError) -> StatusCode {
    match err {
        ExtractError::NotAPdf { .. }
        | ExtractError::InvalidInput { .. }
        | ExtractError::PasswordRequired { .. }
        | ExtractError::WrongPassword { .. }
        | ExtractError::CorruptPdf { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Union of record keys in first-seen order.
fn columns(records: &[HoldingRecord]) -> Vec<&str> {
    let mut cols: Vec<&str> = Vec::new();
    for key in records.iter().flat_map(|r| r.keys()) {
        if !cols.contains(&key.as_str()) {
            cols.push(key);
        }
    }
    cols
}

fn render_records(records: &[HoldingRecord]) -> String {
    if records.is_empty() {
        return "<p><em>No holdings found.</em></p>\n".to_string();
    }

    let cols = columns(records);
    let mut html = String::from("<table>\n<tr>");
    for col in &cols {
        html.push_str(&format!("<th>{}</th>", escape_html(col)));
    }
    html.push_str("</tr>\n");
    for record in records {
        html.push_str("<tr>");
        for col in &cols {
            let cell = record.get(*col).map(cell_text).unwrap_or_default();
            html.push_str(&format!("<td>{}</td>", escape_html(&cell)));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</table>\n");
    html
}

fn render_results(output: &PipelineOutput) -> String {
    let mut body = String::new();
    for entry in output.entries() {
        body.push_str(&format!("<h2>{}</h2>\n", escape_html(entry.label)));
        match &entry.value {
            FieldValue::Text(text) => {
                body.push_str(&format!("<p>{}</p>\n", escape_html(text)));
            }
            FieldValue::Records(records) => body.push_str(&render_records(records)),
        }
    }
    RESULTS_PAGE.replace("{body}", &body)
}

const FORM_PAGE: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Statement extraction</title></head>
<body>
<h1>Upload a statement</h1>
<form action="/upload" method="post" enctype="multipart/form-data">
<input type="file" name="pdf_file" accept="application/pdf" required>
<button type="submit">Extract</button>
</form>
</body>
</html>
"#;

const RESULTS_PAGE: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>Extraction results</title></head>
<body>
<h1>Extraction results</h1>
{body}<p><a href="/">Upload another</a></p>
</body>
</html>
"#;
