use std::sync::Arc;

use poem::web::Data;
use poem_openapi::{
    OpenApi, Tags,
    param::{Path, Query},
    payload::{Json, PlainText},
};

use crate::{
    AppState,
    core::{
        error::ChartError,
        registry::FORMAT_REGISTRY,
        request::{ChartParams, ChartRequest, DEFAULT_MARGIN, TextEncoding},
    },
    schemas::chart::{ChartResponse, FormatInfo, RenderRequest, RenderResponse},
};

#[derive(Tags)]
enum ApiChartTags {
    Chart,
    Service,
}

pub struct ApiChart;

impl ApiChart {
    async fn respond(
        state: &AppState,
        function: &str,
        request: Result<ChartRequest, ChartError>,
    ) -> ChartResponse {
        let request = match request {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("Rejected chart request: {}", e);
                return ChartResponse::from_error(function, e);
            }
        };

        match state.engine.render(request).await {
            Ok(chart) => chart.into(),
            Err(e) if e.is_client_error() => {
                tracing::warn!("Rejected chart content: {}", e);
                ChartResponse::from_error(function, e)
            }
            Err(e) => {
                tracing::error!("Render error: {}", e);
                ChartResponse::from_error(function, e)
            }
        }
    }
}

#[OpenApi()]
impl ApiChart {
    /// Chart
    ///
    /// Render `chl` as a QR code. The image format follows the extension of
    /// the file name: `png`, `jpeg` (or `jpg`) and `gif`.
    ///
    /// - `chl`: content to encode
    /// - `chs`: size as `WIDTHxHEIGHT`
    /// - `chld`: error correction level, optionally followed by `|margin`
    /// - `choe`: content encoding, `UTF-8` or `ISO-8859-1`
    /// - `cht`: chart type, only `qr`
    ///
    /// # Example Request
    /// `GET /image.png?chl=foo&chs=100x100&chld=M|4`
    #[oai(path = "/:file", method = "get", tag = "ApiChartTags::Chart")]
    #[allow(clippy::too_many_arguments)]
    async fn chart(
        &self,
        file: Path<String>,
        chl: Query<Option<String>>,
        chs: Query<Option<String>>,
        chld: Query<Option<String>>,
        choe: Query<Option<String>>,
        cht: Query<Option<String>>,
        state: Data<&Arc<AppState>>,
    ) -> ChartResponse {
        let params = ChartParams {
            chl: chl.0,
            chs: chs.0,
            chld: chld.0,
            choe: choe.0,
            cht: cht.0,
        };
        tracing::info!("Chart: file={}, chs={:?}", file.0, params.chs);

        let request = ChartRequest::from_query(&file.0, params, state.engine.limits());
        Self::respond(state.0, "chart", request).await
    }

    /// Chart from body
    ///
    /// Same as the GET form, but the content to encode is the request body.
    #[oai(path = "/:file", method = "post", tag = "ApiChartTags::Chart")]
    async fn chart_from_body(
        &self,
        file: Path<String>,
        body: PlainText<String>,
        chs: Query<Option<String>>,
        chld: Query<Option<String>>,
        choe: Query<Option<String>>,
        cht: Query<Option<String>>,
        state: Data<&Arc<AppState>>,
    ) -> ChartResponse {
        let params = ChartParams {
            chl: None,
            chs: chs.0,
            chld: chld.0,
            choe: choe.0,
            cht: cht.0,
        };
        tracing::info!(
            "Chart from body: file={}, chs={:?}, {} bytes",
            file.0,
            params.chs,
            body.0.len()
        );

        let request = ChartRequest::from_body(&file.0, body.0, params, state.engine.limits());
        Self::respond(state.0, "chart_from_body", request).await
    }

    /// Render
    ///
    /// Render a QR code from a JSON description.
    ///
    /// # Example Request
    /// ```json
    /// {
    ///   "content": "https://example.com",
    ///   "width": 300,
    ///   "height": 300,
    ///   "format": "png",
    ///   "error_correction": "M"
    /// }
    /// ```
    #[oai(path = "/render", method = "post", tag = "ApiChartTags::Chart")]
    async fn render(
        &self,
        Json(json): Json<RenderRequest>,
        state: Data<&Arc<AppState>>,
    ) -> RenderResponse {
        tracing::info!(
            "Rendering: format={:?}, size={}x{}",
            json.format,
            json.width,
            json.height
        );

        let limits = state.engine.limits();
        let return_base64 = json.return_base64.unwrap_or(false);
        let request = ChartRequest {
            format: json.format.into(),
            content: json.content,
            width: json.width,
            height: json.height,
            error_correction: json.error_correction.map(Into::into).unwrap_or_default(),
            margin: json.margin.unwrap_or(DEFAULT_MARGIN),
            encoding: TextEncoding::Utf8,
            quality: json.quality.unwrap_or(limits.jpeg_quality),
        };
        if let Err(e) = request.validate(limits) {
            tracing::warn!("Rejected render request: {}", e);
            return ChartResponse::from_error("render", e).into();
        }

        if return_base64 {
            match state.engine.render_base64(request).await {
                Ok(res) => RenderResponse::Base64(Json(res)),
                Err(e) if e.is_client_error() => {
                    tracing::warn!("Rejected chart content: {}", e);
                    ChartResponse::from_error("render", e).into()
                }
                Err(e) => {
                    tracing::error!("Render error: {}", e);
                    ChartResponse::from_error("render", e).into()
                }
            }
        } else {
            Self::respond(state.0, "render", Ok(request)).await.into()
        }
    }

    /// List Supported Formats
    ///
    /// File extensions accepted by the chart endpoint
    #[oai(path = "/formats", method = "get", tag = "ApiChartTags::Service")]
    async fn list_formats(&self) -> Json<Vec<FormatInfo>> {
        let mut formats: Vec<FormatInfo> = FORMAT_REGISTRY
            .iter()
            .map(|(extension, format)| FormatInfo {
                extension: extension.to_string(),
                format: format.name().to_string(),
                content_type: format.content_type().to_string(),
            })
            .collect();
        formats.sort_by(|a, b| a.extension.cmp(&b.extension));

        Json(formats)
    }

    #[oai(path = "/health", method = "get", tag = "ApiChartTags::Service")]
    async fn health(&self, state: Data<&Arc<AppState>>) -> Json<serde_json::Value> {
        let status = state.engine.health_check();
        let health = if status.closed { "shutting_down" } else { "healthy" };

        Json(serde_json::json!({
            "status": health,
            "render_slots": {
                "available": status.available_permits,
                "capacity": status.max_concurrent,
                "utilization_pct": ((status.max_concurrent - status.available_permits) as f64 / status.max_concurrent as f64 * 100.0)
            },
            "rate_limit": {
                "enabled": state.rate_limit_per_sec > 0,
                "per_sec": state.rate_limit_per_sec
            }
        }))
    }
}
