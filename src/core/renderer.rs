use base64::{Engine as _, engine::general_purpose};
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::core::bitmap::{self, Layout, Symbol};
use crate::core::error::{ChartError, ChartResult};
use crate::core::registry::ChartFormat;
use crate::core::request::{ChartRequest, RequestLimits};
use crate::schemas::chart::Base64Response;

#[derive(Debug, Clone)]
pub struct RenderedChart {
    pub format: ChartFormat,
    pub width: u32,
    pub height: u32,
    pub body: Vec<u8>,
}

impl RenderedChart {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HealthStatus {
    pub available_permits: usize,
    pub max_concurrent: usize,
    pub closed: bool,
}

/// Renders QR charts off the async executor, bounded by a fixed number of
/// render slots. Holds no per-request state.
#[derive(Clone)]
pub struct RenderingEngine {
    slots: Arc<Semaphore>,
    max_concurrent: usize,
    limits: RequestLimits,
}

impl RenderingEngine {
    pub fn new(max_concurrent: usize, limits: RequestLimits) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            slots: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            limits,
        }
    }

    pub fn limits(&self) -> &RequestLimits {
        &self.limits
    }

    pub async fn render(&self, request: ChartRequest) -> ChartResult<RenderedChart> {
        let _permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ChartError::Unavailable)?;

        tokio::task::spawn_blocking(move || render_sync(&request)).await?
    }

    pub async fn render_base64(&self, request: ChartRequest) -> ChartResult<Base64Response> {
        let chart = self.render(request).await?;

        Ok(Base64Response {
            data: general_purpose::STANDARD.encode(&chart.body),
            mime_type: chart.content_type().to_string(),
        })
    }

    pub fn health_check(&self) -> HealthStatus {
        HealthStatus {
            available_permits: self.slots.available_permits(),
            max_concurrent: self.max_concurrent,
            closed: self.slots.is_closed(),
        }
    }

    /// Stops handing out render slots. Renders already running finish;
    /// later calls fail with [`ChartError::Unavailable`].
    pub fn shutdown(&self) {
        self.slots.close();
        tracing::info!("rendering engine shut down");
    }
}

fn render_sync(request: &ChartRequest) -> ChartResult<RenderedChart> {
    let data = request.content_bytes()?;
    let symbol = Symbol::encode(&data, request.error_correction)?;
    let layout = Layout::compute(symbol.size(), request.margin, request.width, request.height);
    tracing::debug!(
        "layout: modules={}, scale={}, offset=({}, {})",
        symbol.size(),
        layout.scale,
        layout.left,
        layout.top
    );

    let image = bitmap::draw(&symbol, &layout);
    let body = bitmap::encode(&image, request.format, request.quality)?;

    tracing::info!(
        "Rendered {} chart {}x{}, ec={}, {} bytes",
        request.format.name(),
        layout.width,
        layout.height,
        request.error_correction.as_str(),
        body.len()
    );

    Ok(RenderedChart {
        format: request.format,
        width: layout.width,
        height: layout.height,
        body,
    })
}
