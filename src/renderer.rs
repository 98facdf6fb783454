//! Main render service orchestrating the HTML-to-image pipeline
//!
//! This module provides the `ImageRenderer` that resolves options, builds the
//! renderer command, runs it once per request and interprets what came back.

use crate::command::{build_command, ensure_executable, CommandLine};
use crate::config::{resolve_format, ImageFormat, RenderRequest, RenderedImage, RendererConfig};
use crate::error::Result;
use crate::interpret::interpret;
use crate::metrics::RenderMetrics;
use crate::runner::{Execute, ProcessRunner};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Command and output format settled for one request
#[derive(Debug, Clone)]
pub struct PreparedRender {
    pub command: CommandLine,
    pub format: ImageFormat,
}

/// HTML-to-image renderer backed by an external `wkhtmltoimage`
///
/// Every call spawns exactly one renderer process; nothing is pooled or
/// cached between calls.
///
/// # Examples
///
/// ```rust,no_run
/// use html_to_image::{ImageRenderer, RendererConfig, RenderRequest};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let renderer = ImageRenderer::new(RendererConfig::default())?;
///
///     let request = RenderRequest {
///         html: "<h1>Hello</h1>".to_string(),
///         extension: Some("png".to_string()),
///         ..Default::default()
///     };
///     let image = renderer.render_request(request).await?;
///     println!("Rendered {} bytes of {}", image.data.len(), image.content_type());
///     Ok(())
/// }
/// ```
pub struct ImageRenderer {
    config: RendererConfig,
    executor: Arc<dyn Execute>,
    metrics: Arc<RenderMetrics>,
}

impl ImageRenderer {
    pub fn new(config: RendererConfig) -> Result<Self> {
        config.validate()?;
        let executor = Arc::new(ProcessRunner::with_timeout(config.timeout));
        Ok(Self::with_executor(config, executor))
    }

    pub fn with_executor(config: RendererConfig, executor: Arc<dyn Execute>) -> Self {
        Self {
            config,
            executor,
            metrics: Arc::new(RenderMetrics::new()),
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Resolve options and build the command without running anything.
    pub fn prepare(&self, request: &RenderRequest) -> Result<PreparedRender> {
        ensure_executable(&self.config.binary)?;

        let mut options = self.config.image_options.clone();
        options.merge(&request.image_options);

        let format = resolve_format(&mut options, request.extension.as_deref())?;
        let command = build_command(&self.config.binary, &options)?;

        Ok(PreparedRender { command, format })
    }

    pub async fn render_request(&self, request: RenderRequest) -> Result<RenderedImage> {
        let start_time = Instant::now();
        info!(
            request_id = %request.id,
            "Rendering {} bytes of HTML",
            request.html.len()
        );

        let result = self.render_prepared(&request, start_time).await;

        match &result {
            Ok(image) => {
                self.metrics.record_success(image.duration, image.data.len());
                info!(
                    request_id = %request.id,
                    "Rendered {} bytes of {} in {:?}",
                    image.data.len(),
                    image.format,
                    image.duration
                );
            }
            Err(e) => {
                self.metrics.record_failure(start_time.elapsed(), e);
                warn!(request_id = %request.id, kind = e.kind(), "Render failed: {}", e);
            }
        }

        result
    }

    /// Render `html` with the configured options and return the image bytes.
    pub async fn render(&self, html: &str) -> Result<Vec<u8>> {
        self.render_request(RenderRequest::new(html))
            .await
            .map(|image| image.data)
    }

    async fn render_prepared(
        &self,
        request: &RenderRequest,
        start_time: Instant,
    ) -> Result<RenderedImage> {
        let prepared = self.prepare(request)?;
        let command_text = prepared.command.to_shell_string();
        debug!(request_id = %request.id, "Running {}", command_text);

        let execution = self
            .executor
            .execute(&prepared.command, request.html.as_bytes())
            .await?;
        let data = interpret(execution, &command_text)?;

        check_output_format(&data, prepared.format, &request.id);

        Ok(RenderedImage {
            request_id: request.id.clone(),
            data,
            format: prepared.format,
            duration: start_time.elapsed(),
        })
    }
}

/// Render `html` once with `config`.
pub async fn render(html: &str, config: &RendererConfig) -> Result<Vec<u8>> {
    ImageRenderer::new(config.clone())?.render(html).await
}

fn check_output_format(data: &[u8], expected: ImageFormat, request_id: &str) {
    let expected_sniffed = match expected {
        ImageFormat::Jpg => image::ImageFormat::Jpeg,
        ImageFormat::Png => image::ImageFormat::Png,
        ImageFormat::Bmp => image::ImageFormat::Bmp,
        // Text output, nothing to sniff
        ImageFormat::Svg => return,
    };

    match image::guess_format(data) {
        Ok(actual) if actual != expected_sniffed => {
            warn!(
                request_id = %request_id,
                "Renderer output looks like {:?}, expected {}",
                actual,
                expected
            );
        }
        Err(_) => debug!(request_id = %request_id, "Could not identify renderer output"),
        _ => {}
    }
}
