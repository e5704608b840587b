//! HTTP endpoint for merging uploaded slide decks
//!
//! `POST /merge` (also `/merge-pdfs/`) accepts a multipart form with one or
//! more PDF files and an optional `options` JSON field, and answers with the
//! merged PDF.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use tempfile::TempDir;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::error::{Error, Result};
use crate::layout::{LayoutConfig, LayoutOverrides};
use crate::pdf::{count_pages_in_bytes, MergedPdf, SlideMerger};

const X_PDF_NAME: HeaderName = HeaderName::from_static("x-pdf-name");
const X_PDF_SIZE: HeaderName = HeaderName::from_static("x-pdf-size");
const X_PDF_PAGES: HeaderName = HeaderName::from_static("x-pdf-pages");

/// Origins allowed to call the endpoint from a browser
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://127.0.0.1:3000",
    "http://localhost:8000",
    "http://127.0.0.1:8000",
];

/// Default request body limit (256 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

/// Settings for the HTTP service
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on
    pub bind: SocketAddr,
    /// Browser origins allowed by CORS
    pub allowed_origins: Vec<String>,
    /// Maximum request body size in bytes
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8000)),
            allowed_origins: DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Shared request state
#[derive(Clone)]
pub struct AppState {
    merger: Arc<SlideMerger>,
    base_layout: LayoutConfig,
}

impl AppState {
    /// `base_layout` is the starting point that each request's options override
    pub fn new(merger: SlideMerger, base_layout: LayoutConfig) -> Self {
        Self {
            merger: Arc::new(merger),
            base_layout,
        }
    }
}

/// Error response: 400 for bad input, 500 for everything else
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            log::warn!("Rejected merge request: {}", self.0);
            StatusCode::BAD_REQUEST
        } else {
            log::error!("Merge failed: {}", self.0);
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}

/// Build the application router
pub fn router(state: AppState, config: &ServerConfig) -> Result<Router> {
    let origins = config
        .allowed_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|_| Error::Configuration(format!("Invalid CORS origin: {}", origin)))
        })
        .collect::<Result<Vec<_>>>()?;

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .expose_headers([X_PDF_NAME, X_PDF_SIZE, X_PDF_PAGES]);

    Ok(Router::new()
        .route("/merge", post(merge_pdfs))
        .route("/merge-pdfs/", post(merge_pdfs))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors)
        .with_state(state))
}

/// Listen on `config.bind` until Ctrl-C
pub async fn serve(config: ServerConfig, state: AppState) -> Result<()> {
    let app = router(state, &config)?;
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    log::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Unable to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutting down");
}

struct Upload {
    file_name: String,
    data: Vec<u8>,
}

async fn merge_pdfs(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> std::result::Result<Response, ApiError> {
    let mut uploads = Vec::new();
    let mut options = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidInput(format!("Malformed form data: {}", e)))?
    {
        if let Some(file_name) = field.file_name().map(str::to_string) {
            if !is_pdf_name(&file_name) {
                return Err(Error::InvalidInput(format!("File {} is not a PDF", file_name)).into());
            }
            let data = field
                .bytes()
                .await
                .map_err(|e| Error::InvalidInput(format!("Unable to read {}: {}", file_name, e)))?;
            uploads.push(Upload {
                file_name,
                data: data.to_vec(),
            });
        } else if field.name() == Some("options") {
            let text = field
                .text()
                .await
                .map_err(|e| Error::InvalidInput(format!("Unable to read options: {}", e)))?;
            options = Some(text);
        }
    }

    if uploads.is_empty() {
        return Err(Error::InvalidInput("No PDF files uploaded".to_string()).into());
    }

    let layout = match options.as_deref().map(str::trim) {
        Some(json) if !json.is_empty() => LayoutOverrides::from_json(json)?.apply(&state.base_layout),
        _ => state.base_layout.clone(),
    };
    layout.validate()?;

    let download_name = merged_file_name(&uploads[0].file_name);
    log::info!("Merging {} uploaded documents", uploads.len());

    let merger = Arc::clone(&state.merger);
    let merged = tokio::task::spawn_blocking(move || -> Result<Option<MergedPdf>> {
        let workspace = TempDir::new()?;
        let paths = save_uploads(workspace.path(), &uploads)?;
        merger.merge_to_bytes(&paths, &layout)
    })
    .await
    .map_err(|e| Error::General(format!("Merge task failed: {}", e)))??;

    let merged = merged
        .ok_or_else(|| Error::InvalidInput("The uploaded PDFs contain no pages".to_string()))?;
    let page_count = count_pages_in_bytes(&merged.bytes)?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/pdf"));
    headers.insert(
        header::CONTENT_DISPOSITION,
        header_value(&format!("attachment; filename=\"{}\"", download_name))?,
    );
    headers.insert(X_PDF_NAME, header_value(&download_name)?);
    headers.insert(X_PDF_SIZE, HeaderValue::from(merged.bytes.len()));
    headers.insert(X_PDF_PAGES, HeaderValue::from(page_count));

    Ok((headers, Body::from(merged.bytes)).into_response())
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| Error::General(format!("Invalid header value {}: {}", value, e)))
}

fn is_pdf_name(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Store each upload as `<dir>/<index>/<name>` so names can repeat safely
fn save_uploads(dir: &Path, uploads: &[Upload]) -> Result<Vec<PathBuf>> {
    uploads
        .iter()
        .enumerate()
        .map(|(index, upload)| {
            let slot = dir.join(format!("{:03}", index));
            std::fs::create_dir(&slot)?;
            let path = slot.join(sanitize_file_name(&upload.file_name));
            std::fs::write(&path, &upload.data)?;
            Ok(path)
        })
        .collect()
}

/// Strip directories and control characters from a client-supplied file name
fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>();
    let base = base.trim().trim_start_matches('.');

    if base.is_empty() {
        "document.pdf".to_string()
    } else {
        base.to_string()
    }
}

/// Download name for the merged PDF: the first upload's stem plus `_merged.pdf`
fn merged_file_name(first_upload: &str) -> String {
    let file_name = sanitize_file_name(first_upload);
    let stem = Path::new(&file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    // Header values must be visible ASCII
    let stem: String = stem
        .chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '_' })
        .filter(|&c| c != '"')
        .collect();
    format!("{}_merged.pdf", stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::raster::testing::StubRasterizer;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const BOUNDARY: &str = "slide-grid-test-boundary";

    enum Part<'a> {
        File(&'a str, &'a str),
        Text(&'a str, &'a str),
    }

    fn multipart_body(parts: &[Part]) -> Vec<u8> {
        let mut body = String::new();
        for part in parts {
            body.push_str(&format!("--{}\r\n", BOUNDARY));
            match part {
                Part::File(name, content) => {
                    body.push_str(&format!(
                        "Content-Disposition: form-data; name=\"files\"; filename=\"{}\"\r\n",
                        name
                    ));
                    body.push_str("Content-Type: application/pdf\r\n\r\n");
                    body.push_str(content);
                }
                Part::Text(name, value) => {
                    body.push_str(&format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name));
                    body.push_str(value);
                }
            }
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{}--\r\n", BOUNDARY));
        body.into_bytes()
    }

    fn app() -> Router {
        let merger = SlideMerger::new(Arc::new(StubRasterizer::default()), Some(2)).unwrap();
        let layout = LayoutConfig {
            page_width: 200,
            page_height: 150,
            slides_per_row: 1,
            slides_per_column: 1,
            show_titles: false,
            ..LayoutConfig::default()
        };
        router(AppState::new(merger, layout), &ServerConfig::default()).unwrap()
    }

    async fn post_form(uri: &str, parts: &[Part<'_>]) -> Response {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();
        app().oneshot(request).await.unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        response.into_body().collect().await.unwrap().to_bytes().to_vec()
    }

    fn header_str<'a>(response: &'a Response, name: &str) -> &'a str {
        response.headers().get(name).unwrap().to_str().unwrap()
    }

    #[tokio::test]
    async fn test_merge_returns_pdf_with_headers() {
        let response = post_form(
            "/merge",
            &[Part::File("Lecture 1.pdf", "3 10"), Part::File("Lecture 2.pdf", "2 20")],
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_str(&response, "content-type"), "application/pdf");
        assert_eq!(header_str(&response, "x-pdf-name"), "Lecture 1_merged.pdf");
        assert_eq!(
            header_str(&response, "content-disposition"),
            "attachment; filename=\"Lecture 1_merged.pdf\""
        );
        let size: usize = header_str(&response, "x-pdf-size").parse().unwrap();
        let pages: usize = header_str(&response, "x-pdf-pages").parse().unwrap();

        let body = body_bytes(response).await;
        assert_eq!(size, body.len());
        assert_eq!(pages, 5);
        assert_eq!(pages, count_pages_in_bytes(&body).unwrap());
    }

    #[tokio::test]
    async fn test_legacy_route() {
        let response = post_form("/merge-pdfs/", &[Part::File("deck.pdf", "1 5")]).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_options_override_layout() {
        let response = post_form(
            "/merge",
            &[
                Part::File("deck.PDF", "3 5"),
                Part::Text("options", r#"{"SLIDES_PER_ROW": 2, "PAGE_WIDTH": 300.0}"#),
            ],
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_str(&response, "x-pdf-pages"), "2");
    }

    #[tokio::test]
    async fn test_null_options_use_base_layout() {
        let response = post_form(
            "/merge",
            &[Part::File("deck.pdf", "1 5"), Part::Text("options", "null")],
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_str(&response, "x-pdf-pages"), "1");
    }

    #[tokio::test]
    async fn test_non_pdf_upload_is_rejected() {
        let response = post_form(
            "/merge",
            &[Part::File("deck.pdf", "1 5"), Part::File("notes.txt", "hello")],
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_files_are_rejected() {
        let response = post_form("/merge", &[Part::Text("options", "{}")]).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_invalid_options_json_is_rejected() {
        let response = post_form(
            "/merge",
            &[Part::File("deck.pdf", "1 5"), Part::Text("options", "{not json")],
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_bytes(response).await;
        let detail: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(detail["detail"].as_str().unwrap().contains("Invalid JSON"));
    }

    #[tokio::test]
    async fn test_degenerate_layout_is_rejected() {
        let response = post_form(
            "/merge",
            &[Part::File("deck.pdf", "1 5"), Part::Text("options", r#"{"MARGIN": 500}"#)],
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_processing_failure_is_server_error() {
        let response = post_form("/merge", &[Part::File("broken.pdf", "garbage")]).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let preflight = |origin: &'static str| {
            Request::builder()
                .method("OPTIONS")
                .uri("/merge")
                .header(header::ORIGIN, origin)
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap()
        };

        let allowed = app().oneshot(preflight("http://localhost:3000")).await.unwrap();
        assert_eq!(
            header_str(&allowed, "access-control-allow-origin"),
            "http://localhost:3000"
        );

        let denied = app().oneshot(preflight("http://evil.example")).await.unwrap();
        assert!(denied.headers().get("access-control-allow-origin").is_none());
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("../../etc/passwd.pdf"), "passwd.pdf");
        assert_eq!(sanitize_file_name("C:\\slides\\Week 1.pdf"), "Week 1.pdf");
        assert_eq!(sanitize_file_name("..."), "document.pdf");
        assert_eq!(sanitize_file_name("Übung.pdf"), "Übung.pdf");
    }

    #[test]
    fn test_merged_file_name() {
        assert_eq!(merged_file_name("intro.pdf"), "intro_merged.pdf");
        assert_eq!(merged_file_name("Übung \"3\".pdf"), "_bung 3_merged.pdf");
    }

    #[test]
    fn test_save_uploads_keeps_duplicates_apart() {
        let temp = TempDir::new().unwrap();
        let uploads = vec![
            Upload { file_name: "deck.pdf".to_string(), data: b"1 1".to_vec() },
            Upload { file_name: "deck.pdf".to_string(), data: b"2 2".to_vec() },
        ];

        let paths = save_uploads(temp.path(), &uploads).unwrap();
        assert_eq!(paths.len(), 2);
        assert_ne!(paths[0], paths[1]);
        assert_eq!(paths[0].file_name().unwrap(), "deck.pdf");
        assert_eq!(std::fs::read(&paths[1]).unwrap(), b"2 2");
    }
}
