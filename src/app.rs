use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::{HeaderName, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::archive::ARCHIVE_FILE_NAME;
use crate::convert::{ConversionSummary, ConvertOptions, convert};
use crate::error::ConvertError;
use crate::loader::{SheetFormat, read_table};
use crate::mapping::{MappingEntry, suggest_mapping};
use crate::template::Template;

const X_ROWS_TOTAL: HeaderName = HeaderName::from_static("x-rows-total");
const X_ROWS_PRODUCED: HeaderName = HeaderName::from_static("x-rows-produced");
const X_ROWS_SKIPPED: HeaderName = HeaderName::from_static("x-rows-skipped");
const X_SKIPPED_DETAIL: HeaderName = HeaderName::from_static("x-skipped-detail");

/// Skipped-row messages carried in `X-Skipped-Detail`; the rest are counted
const MAX_SKIPPED_DETAIL: usize = 20;

/// Where the server listens and how large an upload it accepts
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
            max_upload_bytes: 32 * 1024 * 1024,
        }
    }
}

pub struct AppState {
    config: ServerConfig,
}

#[derive(Serialize)]
struct StatusResponse {
    status: String,
    message: Option<String>,
}

#[derive(Serialize)]
struct InspectResponse {
    columns: Vec<String>,
    key_paths: Vec<String>,
    placeholders: Vec<String>,
    row_count: usize,
    suggested: Vec<MappingEntry>,
}

/// A request failure, rendered as `{"status": "error", "message": ...}`
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<ConvertError> for ApiError {
    fn from(e: ConvertError) -> Self {
        let status = match e {
            ConvertError::Archive(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        };
        ApiError {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(status = %self.status, "request failed: {}", self.message);
        let body = StatusResponse {
            status: "error".to_string(),
            message: Some(self.message),
        };
        (self.status, Json(body)).into_response()
    }
}

/// Form parts of an upload
#[derive(Default)]
struct Upload {
    template: Option<Vec<u8>>,
    spreadsheet: Option<Vec<u8>>,
    spreadsheet_name: Option<String>,
    mapping: Option<String>,
    options: Option<String>,
    sheet: Option<String>,
}

impl Upload {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut upload = Upload::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Malformed upload: {e}")))?
        {
            let name = field.name().unwrap_or("unknown").to_string();
            if name == "spreadsheet" {
                upload.spreadsheet_name = field.file_name().map(str::to_string);
            }

            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("Failed to read field '{name}': {e}")))?;

            match name.as_str() {
                "template" => upload.template = Some(data.to_vec()),
                "spreadsheet" => upload.spreadsheet = Some(data.to_vec()),
                "mapping" => upload.mapping = Some(text_field(&name, &data)?),
                "options" => upload.options = Some(text_field(&name, &data)?),
                "sheet" => upload.sheet = Some(text_field(&name, &data)?).filter(|s| !s.is_empty()),
                _ => {}
            }
        }

        Ok(upload)
    }

    fn template(&self) -> Result<&[u8], ApiError> {
        match self.template.as_deref() {
            Some(bytes) if !bytes.is_empty() => Ok(bytes),
            _ => Err(ApiError::bad_request(
                "Upload both a JSON template and a spreadsheet",
            )),
        }
    }

    fn spreadsheet(&self) -> Result<(&[u8], SheetFormat), ApiError> {
        let bytes = match self.spreadsheet.as_deref() {
            Some(bytes) if !bytes.is_empty() => bytes,
            _ => {
                return Err(ApiError::bad_request(
                    "Upload both a JSON template and a spreadsheet",
                ));
            }
        };
        let format = match &self.spreadsheet_name {
            Some(name) => SheetFormat::from_path(name)
                .map_err(|e| ApiError::from(ConvertError::from(e)))?,
            None => SheetFormat::Workbook,
        };
        Ok((bytes, format))
    }
}

fn text_field(name: &str, data: &[u8]) -> Result<String, ApiError> {
    String::from_utf8(data.to_vec())
        .map(|s| s.trim().to_string())
        .map_err(|_| ApiError::bad_request(format!("Field '{name}' is not UTF-8 text")))
}

/// Build the router
pub fn router(config: ServerConfig) -> Router {
    let max_upload_bytes = config.max_upload_bytes;
    let app_state = Arc::new(AppState { config });

    Router::new()
        .route("/", get(serve_landing))
        .route("/api/inspect", post(inspect))
        .route("/api/convert", post(convert_upload))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

pub async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let address = format!("{}:{}", config.host, config.port);
    let app = router(config);

    // Start server
    let listener = TcpListener::bind(&address).await?;
    info!("Listening on http://{}", address);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_landing(State(state): State<Arc<AppState>>) -> Html<String> {
    let limit_mb = state.config.max_upload_bytes / (1024 * 1024);
    Html(include_str!("./static/index.html").replace("{{MAX_UPLOAD_MB}}", &limit_mb.to_string()))
}

async fn inspect(multipart: Multipart) -> Result<Json<InspectResponse>, ApiError> {
    let upload = Upload::read(multipart).await?;
    let template_bytes = upload.template()?.to_vec();
    let (bytes, format) = upload.spreadsheet()?;
    let bytes = bytes.to_vec();
    let sheet = upload.sheet.clone();

    let response = tokio::task::spawn_blocking(move || -> Result<InspectResponse, ConvertError> {
        let template = Template::from_slice(&template_bytes)?;
        let table = read_table(&bytes, format, sheet.as_deref())?;
        Ok(InspectResponse {
            suggested: suggest_mapping(&template, &table.headers),
            key_paths: template.key_paths().iter().map(ToString::to_string).collect(),
            placeholders: template.placeholders(),
            row_count: table.row_count(),
            columns: table.headers,
        })
    })
    .await
    .map_err(|e| ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: format!("Inspection task failed: {e}"),
    })??;

    Ok(Json(response))
}

// URL-encoded JSON array of the first skipped-row messages, plus one line
// counting the ones left out.
fn skipped_detail(summary: &ConversionSummary) -> String {
    let mut messages: Vec<String> = summary
        .skipped
        .iter()
        .take(MAX_SKIPPED_DETAIL)
        .map(ToString::to_string)
        .collect();
    let omitted = summary.skipped.len().saturating_sub(MAX_SKIPPED_DETAIL);
    if omitted > 0 {
        messages.push(format!("... and {omitted} more skipped rows"));
    }
    let json = serde_json::to_string(&messages).unwrap_or_default();
    urlencoding::encode(&json).into_owned()
}

async fn convert_upload(multipart: Multipart) -> Result<Response, ApiError> {
    let upload = Upload::read(multipart).await?;
    let template_bytes = upload.template()?.to_vec();
    let (bytes, format) = upload.spreadsheet()?;
    let bytes = bytes.to_vec();

    let mapping: Vec<MappingEntry> = match upload.mapping.as_deref() {
        Some(text) if !text.is_empty() => serde_json::from_str(text)
            .map_err(|e| ApiError::bad_request(format!("Mapping is not valid JSON: {e}")))?,
        _ => Vec::new(),
    };
    // Blank rows in the mapping form mean "not mapped"
    let mapping: Vec<MappingEntry> = mapping
        .into_iter()
        .filter(|entry| !entry.target.trim().is_empty())
        .collect();

    let mut options: ConvertOptions = match upload.options.as_deref() {
        Some(text) if !text.is_empty() => serde_json::from_str(text)
            .map_err(|e| ApiError::bad_request(format!("Options are not valid JSON: {e}")))?,
        _ => ConvertOptions::default(),
    };
    if upload.sheet.is_some() {
        options.sheet = upload.sheet.clone();
    }

    let output = tokio::task::spawn_blocking(move || {
        convert(&template_bytes, &bytes, format, &mapping, &options)
    })
    .await
    .map_err(|e| ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: format!("Conversion task failed: {e}"),
    })??;

    let summary = output.summary;
    let detail = skipped_detail(&summary);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{ARCHIVE_FILE_NAME}\""),
            ),
            (X_ROWS_TOTAL, summary.total_rows.to_string()),
            (X_ROWS_PRODUCED, summary.produced.to_string()),
            (X_ROWS_SKIPPED, summary.skipped.len().to_string()),
            (X_SKIPPED_DETAIL, detail),
        ],
        output.archive,
    )
        .into_response())
}
