//! Axum route handlers for the Branding API.

use std::path::{Path, PathBuf};

use axum::{
    extract::{Multipart, State},
    http::{header, HeaderName, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::branding::archive::ARCHIVE_NAME;
use crate::branding::batch::{BatchReport, UploadedDocument};
use crate::branding::pdf::Letterhead;
use crate::errors::AppError;
use crate::state::AppState;

/// Multipart field carrying the optional letterhead upload.
pub const LETTERHEAD_FIELD: &str = "letterhead";
/// Multipart field carrying CV uploads; repeat it once per file.
pub const CV_FIELD: &str = "cvs";

const UPLOAD_FORM: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>CV Branding with Letterhead</title></head>
<body>
<h1>CV Branding with Letterhead</h1>
<form action="/api/v1/brand" method="post" enctype="multipart/form-data">
  <h2>Letterhead</h2>
  <p>Upload a custom letterhead (PDF only), or leave empty to use the default.</p>
  <input type="file" name="letterhead" accept="application/pdf">
  <h2>Upload CVs to Brand</h2>
  <input type="file" name="cvs" accept="application/pdf" multiple>
  <p><button type="submit">Download All Branded CVs</button></p>
</form>
</body>
</html>
"#;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum LetterheadSource {
    Uploaded,
    Default { path: PathBuf },
}

#[derive(Debug, Serialize)]
pub struct LetterheadInfo {
    #[serde(flatten)]
    pub source: LetterheadSource,
    pub width: f64,
    pub height: f64,
}

struct BrandUpload {
    letterhead: Option<Bytes>,
    documents: Vec<UploadedDocument>,
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

async fn read_upload(mut multipart: Multipart) -> Result<BrandUpload, AppError> {
    let mut upload = BrandUpload {
        letterhead: None,
        documents: Vec::new(),
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed upload: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read field '{name}': {e}")))?;

        match name.as_str() {
            // Browsers send an empty part for an untouched file input.
            LETTERHEAD_FIELD if data.is_empty() => {}
            LETTERHEAD_FIELD => upload.letterhead = Some(data),
            CV_FIELD if data.is_empty() && file_name.is_empty() => {}
            CV_FIELD => {
                let file_name = if file_name.is_empty() {
                    format!("cv-{}.pdf", upload.documents.len() + 1)
                } else {
                    file_name
                };
                upload.documents.push(UploadedDocument::new(file_name, data));
            }
            other => debug!("Ignoring unknown multipart field '{other}'"),
        }
    }

    Ok(upload)
}

/// Picks the uploaded letterhead, falling back to the configured default.
async fn resolve_letterhead(
    uploaded: Option<Bytes>,
    default_path: Option<&Path>,
) -> Result<(Bytes, LetterheadSource), AppError> {
    if let Some(bytes) = uploaded {
        info!("Using uploaded letterhead");
        return Ok((bytes, LetterheadSource::Uploaded));
    }

    let Some(path) = default_path else {
        return Err(AppError::LetterheadMissing(
            "No default letterhead configured. Upload a letterhead to proceed.".to_string(),
        ));
    };

    match tokio::fs::read(path).await {
        Ok(bytes) => {
            info!("Using default letterhead from {}", path.display());
            Ok((
                Bytes::from(bytes),
                LetterheadSource::Default {
                    path: path.to_path_buf(),
                },
            ))
        }
        Err(e) => {
            warn!("Default letterhead unreadable at {}: {e}", path.display());
            Err(AppError::LetterheadMissing(format!(
                "Default letterhead not found at {}. Upload a letterhead to proceed.",
                path.display()
            )))
        }
    }
}

fn join_error(e: tokio::task::JoinError) -> AppError {
    AppError::Internal(anyhow::anyhow!("Branding task failed: {e}"))
}

fn archive_response(archive: Vec<u8>, report: &BatchReport) -> Response {
    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{ARCHIVE_NAME}\""),
        ),
        (
            HeaderName::from_static("x-branded-count"),
            report.written_count().to_string(),
        ),
        (
            HeaderName::from_static("x-failed-count"),
            report.failed_count().to_string(),
        ),
        (
            HeaderName::from_static("x-letterhead-size"),
            format!("{}x{}", report.letterhead.width, report.letterhead.height),
        ),
    ];
    (StatusCode::OK, headers, archive).into_response()
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /
pub async fn handle_index() -> Html<&'static str> {
    Html(UPLOAD_FORM)
}

/// POST /api/v1/brand
///
/// Brands every uploaded CV with the letterhead and returns the ZIP of all
/// documents that were written. Per-document failures are reported in the
/// count headers and in `GET /api/v1/brand/last-report`.
pub async fn handle_brand(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let upload = read_upload(multipart).await?;
    if upload.documents.is_empty() {
        return Err(AppError::Validation(format!(
            "Upload at least one CV in the '{CV_FIELD}' field"
        )));
    }

    let (letterhead, source) =
        resolve_letterhead(upload.letterhead, state.config.default_letterhead.as_deref()).await?;
    debug!("Letterhead source: {source:?}");

    let _run = state.run_lock.lock().await;
    let driver = state.driver.clone();
    let documents = upload.documents;
    let outcome = tokio::task::spawn_blocking(move || driver.process(&letterhead, &documents))
        .await
        .map_err(join_error)??;

    let response = archive_response(outcome.archive, &outcome.report);
    *state.last_report.write().await = Some(outcome.report);
    Ok(response)
}

/// GET /api/v1/brand/last-report
///
/// Per-document results and notices of the most recent run.
pub async fn handle_last_report(
    State(state): State<AppState>,
) -> Result<Json<BatchReport>, AppError> {
    state
        .last_report
        .read()
        .await
        .clone()
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No branding run has completed yet".to_string()))
}

/// GET /api/v1/letterhead
///
/// Describes the default letterhead used when a request uploads none.
pub async fn handle_default_letterhead(
    State(state): State<AppState>,
) -> Result<Json<LetterheadInfo>, AppError> {
    let path = state
        .config
        .default_letterhead
        .clone()
        .ok_or_else(|| AppError::NotFound("No default letterhead configured".to_string()))?;

    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        AppError::NotFound(format!(
            "Default letterhead not readable at {}: {e}",
            path.display()
        ))
    })?;

    let letterhead = tokio::task::spawn_blocking(move || Letterhead::parse(&bytes))
        .await
        .map_err(join_error)??;
    let size = letterhead.size();

    Ok(Json(LetterheadInfo {
        source: LetterheadSource::Default { path },
        width: size.width,
        height: size.height,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branding::test_support::sample_pdf;
    use crate::config::Config;
    use crate::routes::build_router;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use axum::Router;
    use std::io::Cursor;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "brander-test-boundary";

    struct Harness {
        dir: TempDir,
        router: Router,
    }

    fn harness(with_default: bool) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let default_letterhead = with_default.then(|| {
            let path = dir.path().join("default-letterhead.pdf");
            std::fs::write(&path, sample_pdf(&[(595.0, 842.0)])).unwrap();
            path
        });
        let config = Config {
            port: 0,
            rust_log: "debug".to_string(),
            default_letterhead,
            output_dir: dir.path().join("branded_cvs"),
            max_upload_bytes: 10 * 1024 * 1024,
            write_retry_base_ms: 0,
        };
        Harness {
            router: build_router(AppState::new(config)),
            dir,
        }
    }

    fn multipart_request(parts: &[(&str, &str, Vec<u8>)]) -> Request<Body> {
        let mut body = Vec::new();
        for (field, file_name, data) in parts {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\n\
                     Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
                     Content-Type: application/pdf\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/v1/brand")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    async fn error_code(response: Response) -> String {
        let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        json["error"]["code"].as_str().unwrap().to_string()
    }

    fn header(response: &Response, name: &str) -> String {
        response.headers()[name].to_str().unwrap().to_string()
    }

    fn zip_names(bytes: Vec<u8>) -> Vec<String> {
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_brand_returns_archive_without_corrupt_upload() {
        let h = harness(false);
        let request = multipart_request(&[
            ("letterhead", "brand.pdf", sample_pdf(&[(612.0, 792.0)])),
            ("cvs", "one.pdf", sample_pdf(&[(612.0, 792.0)])),
            ("cvs", "two.pdf", b"corrupt".to_vec()),
            ("cvs", "three.pdf", sample_pdf(&[(700.0, 900.0), (612.0, 792.0)])),
        ]);

        let response = h.router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "content-type"), "application/zip");
        assert!(header(&response, "content-disposition").contains(ARCHIVE_NAME));
        assert_eq!(header(&response, "x-branded-count"), "2");
        assert_eq!(header(&response, "x-failed-count"), "1");
        assert_eq!(header(&response, "x-letterhead-size"), "612x792");
        assert_eq!(zip_names(body_bytes(response).await), vec!["one.pdf", "three.pdf"]);
        assert!(h.dir.path().join("branded_cvs/one.pdf").is_file());
    }

    #[tokio::test]
    async fn test_brand_falls_back_to_default_letterhead() {
        let h = harness(true);
        let request = multipart_request(&[
            ("letterhead", "", Vec::new()),
            ("cvs", "cv.pdf", sample_pdf(&[(612.0, 792.0)])),
        ]);

        let response = h.router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "x-letterhead-size"), "595x842");
    }

    #[tokio::test]
    async fn test_brand_without_any_letterhead_is_rejected() {
        let h = harness(false);
        let request = multipart_request(&[("cvs", "cv.pdf", sample_pdf(&[(612.0, 792.0)]))]);

        let response = h.router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_code(response).await, "LETTERHEAD_MISSING");
    }

    #[tokio::test]
    async fn test_brand_with_corrupt_letterhead_is_unprocessable() {
        let h = harness(true);
        let request = multipart_request(&[
            ("letterhead", "bad.pdf", b"nope".to_vec()),
            ("cvs", "cv.pdf", sample_pdf(&[(612.0, 792.0)])),
        ]);

        let response = h.router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error_code(response).await, "LETTERHEAD_ERROR");
    }

    #[tokio::test]
    async fn test_brand_requires_at_least_one_cv() {
        let h = harness(true);
        let request = multipart_request(&[("cvs", "", Vec::new())]);

        let response = h.router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_code(response).await, "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_last_report_after_run() {
        let h = harness(true);

        let before = h
            .router
            .clone()
            .oneshot(Request::get("/api/v1/brand/last-report").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(before.status(), StatusCode::NOT_FOUND);

        let run = h
            .router
            .clone()
            .oneshot(multipart_request(&[
                ("cvs", "good.pdf", sample_pdf(&[(612.0, 792.0)])),
                ("cvs", "bad.pdf", b"junk".to_vec()),
            ]))
            .await
            .unwrap();
        assert_eq!(run.status(), StatusCode::OK);

        let after = h
            .router
            .oneshot(Request::get("/api/v1/brand/last-report").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(after.status(), StatusCode::OK);
        let report: serde_json::Value = serde_json::from_slice(&body_bytes(after).await).unwrap();
        let documents = report["documents"].as_array().unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0]["status"], "written");
        assert_eq!(documents[1]["status"], "skipped");
        assert!(!report["notices"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_default_letterhead_info() {
        let h = harness(true);
        let response = h
            .router
            .oneshot(Request::get("/api/v1/letterhead").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(json["source"], "default");
        assert_eq!(json["width"], 595.0);
        assert_eq!(json["height"], 842.0);
    }

    #[tokio::test]
    async fn test_default_letterhead_info_when_unconfigured() {
        let h = harness(false);
        let response = h
            .router
            .oneshot(Request::get("/api/v1/letterhead").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_index_serves_upload_form() {
        let h = harness(false);
        let response = h
            .router
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = String::from_utf8(body_bytes(response).await).unwrap();
        assert!(html.contains("name=\"letterhead\""));
        assert!(html.contains("name=\"cvs\""));
    }
}
