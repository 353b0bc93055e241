use poem_openapi::{
    ApiResponse, Enum, Object,
    payload::{Binary, Json},
};
use serde::{Deserialize, Serialize};

use super::common::{
    BadRequestResponse, InternalServerErrorResponse, NotFoundResponse, ServiceUnavailableResponse,
};
use crate::core::error::ChartError;
use crate::core::registry::ChartFormat;
use crate::core::renderer::RenderedChart;
use crate::core::request::ErrorCorrection;

#[derive(Enum, Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[oai(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    Jpeg,
    Gif,
}

impl From<OutputFormat> for ChartFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Png => ChartFormat::Png,
            OutputFormat::Jpeg => ChartFormat::Jpeg,
            OutputFormat::Gif => ChartFormat::Gif,
        }
    }
}

#[derive(Enum, Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCorrectionLevel {
    L,
    M,
    Q,
    H,
}

impl From<ErrorCorrectionLevel> for ErrorCorrection {
    fn from(level: ErrorCorrectionLevel) -> Self {
        match level {
            ErrorCorrectionLevel::L => ErrorCorrection::L,
            ErrorCorrectionLevel::M => ErrorCorrection::M,
            ErrorCorrectionLevel::Q => ErrorCorrection::Q,
            ErrorCorrectionLevel::H => ErrorCorrection::H,
        }
    }
}

#[derive(Object, Deserialize, Clone, Debug)]
pub struct RenderRequest {
    /// Text to encode
    pub content: String,

    /// Image width in pixels, bounded by the configured maximum dimension
    #[oai(validator(minimum(value = "1")))]
    pub width: u32,

    /// Image height in pixels, bounded by the configured maximum dimension
    #[oai(validator(minimum(value = "1")))]
    pub height: u32,

    /// Output format
    pub format: OutputFormat,

    /// Error correction level, default L
    pub error_correction: Option<ErrorCorrectionLevel>,

    /// Quiet zone in modules, default 4
    #[oai(validator(maximum(value = "100")))]
    pub margin: Option<u32>,

    /// JPEG quality (1-100)
    #[oai(validator(minimum(value = "1"), maximum(value = "100")))]
    pub quality: Option<u8>,

    /// Return base64 encoded string instead of binary
    pub return_base64: Option<bool>,
}

#[derive(Object, Serialize, Debug)]
pub struct Base64Response {
    /// Base64 encoded image data
    pub data: String,

    /// MIME type of the image
    pub mime_type: String,
}

#[derive(Object, Serialize, Debug, Clone)]
pub struct FormatInfo {
    /// File extension accepted in the request path
    pub extension: String,
    pub format: String,
    pub content_type: String,
}

#[derive(ApiResponse)]
pub enum ChartResponse {
    /// PNG image
    #[oai(status = 200, content_type = "image/png")]
    Png(Binary<Vec<u8>>),

    /// JPEG image
    #[oai(status = 200, content_type = "image/jpeg")]
    Jpeg(Binary<Vec<u8>>),

    /// GIF image
    #[oai(status = 200, content_type = "image/gif")]
    Gif(Binary<Vec<u8>>),

    #[oai(status = 400)]
    BadRequest(Json<BadRequestResponse>),

    #[oai(status = 404)]
    NotFound(Json<NotFoundResponse>),

    #[oai(status = 500)]
    InternalServerError(Json<InternalServerErrorResponse>),

    #[oai(status = 503)]
    ServiceUnavailable(Json<ServiceUnavailableResponse>),
}

impl From<RenderedChart> for ChartResponse {
    fn from(chart: RenderedChart) -> Self {
        match chart.format {
            ChartFormat::Png => ChartResponse::Png(Binary(chart.body)),
            ChartFormat::Jpeg => ChartResponse::Jpeg(Binary(chart.body)),
            ChartFormat::Gif => ChartResponse::Gif(Binary(chart.body)),
        }
    }
}

impl ChartResponse {
    pub fn from_error(function: &str, err: ChartError) -> Self {
        match err {
            ChartError::Validation { .. } => ChartResponse::BadRequest(Json(BadRequestResponse {
                message: err.to_string(),
            })),
            ChartError::UnsupportedFormat(_) => ChartResponse::NotFound(Json(NotFoundResponse {
                message: err.to_string(),
            })),
            ChartError::Unavailable => {
                ChartResponse::ServiceUnavailable(Json(ServiceUnavailableResponse::default()))
            }
            ChartError::Encode(_) | ChartError::Task(_) => ChartResponse::InternalServerError(
                Json(InternalServerErrorResponse::new(
                    "route.chart",
                    function,
                    "Rendering failed",
                    &err.to_string(),
                )),
            ),
        }
    }
}

#[derive(ApiResponse)]
pub enum RenderResponse {
    #[oai(status = 200, content_type = "image/png")]
    Png(Binary<Vec<u8>>),

    #[oai(status = 200, content_type = "image/jpeg")]
    Jpeg(Binary<Vec<u8>>),

    #[oai(status = 200, content_type = "image/gif")]
    Gif(Binary<Vec<u8>>),

    #[oai(status = 200, content_type = "application/json")]
    Base64(Json<Base64Response>),

    #[oai(status = 400)]
    BadRequest(Json<BadRequestResponse>),

    #[oai(status = 500)]
    InternalServerError(Json<InternalServerErrorResponse>),

    #[oai(status = 503)]
    ServiceUnavailable(Json<ServiceUnavailableResponse>),
}

impl From<ChartResponse> for RenderResponse {
    fn from(response: ChartResponse) -> Self {
        match response {
            ChartResponse::Png(body) => RenderResponse::Png(body),
            ChartResponse::Jpeg(body) => RenderResponse::Jpeg(body),
            ChartResponse::Gif(body) => RenderResponse::Gif(body),
            ChartResponse::BadRequest(body) => RenderResponse::BadRequest(body),
            // the JSON API has no file name, so this only comes from a bug
            ChartResponse::NotFound(Json(body)) => {
                RenderResponse::BadRequest(Json(BadRequestResponse {
                    message: body.message,
                }))
            }
            ChartResponse::InternalServerError(body) => RenderResponse::InternalServerError(body),
            ChartResponse::ServiceUnavailable(body) => RenderResponse::ServiceUnavailable(body),
        }
    }
}
