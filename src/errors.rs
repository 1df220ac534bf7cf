use crate::ui::render_error_page;
use axum::http::StatusCode;
use axum::response::Html;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("request to {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: StatusCode },
    #[error("{name} could not be decoded as any of [{tried}]")]
    Decode { name: String, tried: String },
    #[error("malformed table {name}: {source}")]
    Csv {
        name: String,
        #[source]
        source: csv::Error,
    },
    #[error("boundary data is unusable: {0}")]
    GeoJson(String),
    #[error("column `{column}` missing from {table}")]
    MissingColumn { table: String, column: String },
    #[error("joining {left} onto {right} matched no areas")]
    EmptyJoin { left: String, right: String },
    #[error("chart rendering failed: {0}")]
    Render(String),
}

impl SourceError {
    pub fn missing_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::MissingColumn {
            table: table.into(),
            column: column.into(),
        }
    }

    pub fn render(err: impl std::fmt::Display) -> Self {
        Self::Render(err.to_string())
    }
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: "資料載入失敗，請檢查資料來源與網路連線。".to_string(),
        }
    }
}

impl From<SourceError> for AppError {
    fn from(err: SourceError) -> Self {
        error!("page preparation failed: {err}");
        Self::unavailable()
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Html(render_error_page(&self.message))).into_response()
    }
}
