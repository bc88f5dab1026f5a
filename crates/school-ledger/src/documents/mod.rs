//! Printable documents and exports: layouts built at fixed coordinates, a renderer that turns
//! them into bytes, and the HTTP endpoints that hand the bytes back as attachments.

pub mod certificate;
pub mod export;
pub mod layout;
pub mod pdf;
pub mod receipt;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::{Local, NaiveDate};
use mime::Mime;
use serde_json::json;
use tracing::{info, warn};

pub use certificate::{certificate_layout, CertificateRequest, FrequencyCertificate};
pub use export::{class_status_sheet, Spreadsheet};
pub use layout::{Align, Column, DrawOp, Font, PageLayout, TableRow, TableStyle};
pub use pdf::PdfRenderer;
pub use receipt::{receipt_layout, Letterhead, PaymentReceipt, ReceiptRequest};

/// Turns a page layout into the bytes of one output format.
pub trait DocumentRenderer: Send + Sync {
    fn content_type(&self) -> Mime;
    fn extension(&self) -> &'static str;
    fn render(&self, layout: &PageLayout) -> Result<Vec<u8>, RenderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("page size must be positive (got {width} x {height})")]
    InvalidPage { width: f32, height: f32 },
    #[error("invalid document payload: {0}")]
    InvalidPayload(String),
    #[error("spreadsheet write failed: {0}")]
    Spreadsheet(#[from] csv::Error),
    #[error("spreadsheet flush failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Binary response served with `Content-Disposition: attachment`.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub content_type: Mime,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(filename: impl AsRef<str>, content_type: Mime, bytes: Vec<u8>) -> Self {
        Self {
            filename: sanitize_filename(filename.as_ref()),
            content_type,
            bytes,
        }
    }

    /// Render `layout` and name the file `{stem}.{extension}`.
    pub fn render(
        renderer: &dyn DocumentRenderer,
        stem: &str,
        layout: &PageLayout,
    ) -> Result<Self, RenderError> {
        let bytes = renderer.render(layout)?;
        Ok(Self::new(
            format!("{stem}.{}", renderer.extension()),
            renderer.content_type(),
            bytes,
        ))
    }

    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.filename)
    }
}

impl IntoResponse for Attachment {
    fn into_response(self) -> Response {
        let disposition = HeaderValue::from_str(&self.content_disposition())
            .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
        let content_type = HeaderValue::from_str(self.content_type.as_ref())
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, content_type),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            self.bytes,
        )
            .into_response()
    }
}

/// ASCII-only file name: accents folded, anything else outside `[A-Za-z0-9._-]` becomes `-`.
pub fn sanitize_filename(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.trim().chars() {
        let mapped = match ch {
            'à' | 'â' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'î' | 'ï' => 'i',
            'ô' | 'ö' => 'o',
            'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            'À' | 'Â' => 'A',
            'É' | 'È' | 'Ê' => 'E',
            'Ç' => 'C',
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') => c,
            _ => '-',
        };
        if mapped == '-' && out.ends_with('-') {
            continue;
        }
        out.push(mapped);
    }

    let trimmed = out.trim_matches(|c: char| c == '-' || c == '.');
    if trimmed.is_empty() {
        "document".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `dd/mm/yyyy`, as printed on documents.
pub fn french_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// School name, contact lines and a rule under them. Returns the y below the rule.
pub(crate) fn draw_letterhead(page: &mut PageLayout, letterhead: &Letterhead) -> f32 {
    page.centered_text(58.0, 16.0, Font::Bold, letterhead.school_name.to_uppercase());

    let mut y = 74.0;
    let contact: Vec<String> = [
        letterhead.address.clone(),
        letterhead.phone.as_ref().map(|phone| format!("Tél : {phone}")),
        letterhead.email.as_ref().map(|email| format!("Email : {email}")),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !contact.is_empty() {
        page.centered_text(y, 9.0, Font::Regular, contact.join("  |  "));
        y += 12.0;
    }

    let rule = y + 4.0;
    page.line(40.0, rule, page.width - 40.0, rule, 1.0);
    rule
}

pub(crate) fn draw_footer(page: &mut PageLayout, text: &str) {
    let y = page.height - 30.0;
    page.line(40.0, y - 12.0, page.width - 40.0, y - 12.0, 0.5);
    page.centered_text(y, 8.0, Font::Regular, text);
}

#[derive(Clone)]
struct DocumentState {
    renderer: Arc<dyn DocumentRenderer>,
    letterhead: Letterhead,
}

/// Endpoints that turn already-aggregated JSON payloads into downloadable files.
pub fn document_router(renderer: Arc<dyn DocumentRenderer>, letterhead: Letterhead) -> Router {
    Router::new()
        .route("/api/pdf/tuition-payment-receipt", post(receipt_handler))
        .route("/api/pdf/frequency-certificate", post(certificate_handler))
        .route("/api/export/excel", post(spreadsheet_handler))
        .with_state(DocumentState {
            renderer,
            letterhead,
        })
}

async fn receipt_handler(
    State(state): State<DocumentState>,
    Json(request): Json<ReceiptRequest>,
) -> Response {
    let today = Local::now().date_naive();
    let result = request
        .into_receipt(&state.letterhead, today)
        .and_then(|receipt| {
            Attachment::render(
                state.renderer.as_ref(),
                &receipt.file_stem(),
                &receipt_layout(&receipt),
            )
        });
    attachment_response(result, "tuition payment receipt")
}

async fn certificate_handler(
    State(state): State<DocumentState>,
    Json(request): Json<CertificateRequest>,
) -> Response {
    let today = Local::now().date_naive();
    let result = request
        .into_certificate(&state.letterhead, today)
        .and_then(|certificate| {
            Attachment::render(
                state.renderer.as_ref(),
                &certificate.file_stem(),
                &certificate_layout(&certificate),
            )
        });
    attachment_response(result, "frequency certificate")
}

async fn spreadsheet_handler(Json(sheet): Json<Spreadsheet>) -> Response {
    attachment_response(sheet.into_attachment(), "spreadsheet export")
}

fn attachment_response(
    result: Result<Attachment, RenderError>,
    document: &'static str,
) -> Response {
    match result {
        Ok(attachment) => {
            info!(
                document,
                filename = %attachment.filename,
                bytes = attachment.bytes.len(),
                "document generated"
            );
            attachment.into_response()
        }
        Err(RenderError::InvalidPayload(reason)) => {
            let payload = json!({ "error": reason });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        Err(other) => {
            warn!(document, error = %other, "document generation failed");
            let payload = json!({ "error": other.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_are_ascii_and_quoted() {
        assert_eq!(sanitize_filename("reçu élève 01.pdf"), "recu-eleve-01.pdf");
        assert_eq!(sanitize_filename("../../etc"), "etc");
        assert_eq!(sanitize_filename("\"\""), "document");

        let attachment =
            Attachment::new("Certificat Année.pdf", mime::APPLICATION_PDF, Vec::new());
        assert_eq!(
            attachment.content_disposition(),
            "attachment; filename=\"Certificat-Annee.pdf\""
        );
    }

    #[test]
    fn french_dates_are_day_first() {
        let date = NaiveDate::from_ymd_opt(2025, 9, 4).expect("valid");
        assert_eq!(french_date(date), "04/09/2025");
    }
}
