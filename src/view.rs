//! Response adapter for web frameworks
//!
//! Hosts route image requests here with the HTML their templates produced.
//! Responses that are still HTML (error pages) pass through untouched;
//! everything else is converted to image bytes with a matching content type.

use crate::config::RenderRequest;
use crate::error::Result;
use crate::renderer::ImageRenderer;

pub const HTML_CONTENT_TYPE: &str = "text/html";

/// Request extensions routed to [`ImageView`].
pub const IMAGE_EXTENSIONS: [&str; 2] = ["jpg", "png"];

/// What the host expects the view to produce
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewTarget {
    Html,
    Image { extension: Option<String> },
}

impl ViewTarget {
    /// Pick a target from the response's declared content type.
    pub fn from_response(content_type: &str, extension: Option<&str>) -> Self {
        let mime = content_type.split(';').next().unwrap_or_default().trim();
        if mime.eq_ignore_ascii_case(HTML_CONTENT_TYPE) {
            ViewTarget::Html
        } else {
            ViewTarget::Image {
                extension: extension.map(str::to_string),
            }
        }
    }

    /// Error templates are always served as HTML.
    pub fn error_page() -> Self {
        ViewTarget::Html
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewOutput {
    pub content_type: String,
    pub body: Vec<u8>,
}

pub struct ImageView {
    renderer: ImageRenderer,
}

impl ImageView {
    pub fn new(renderer: ImageRenderer) -> Self {
        Self { renderer }
    }

    pub fn handles_extension(extension: &str) -> bool {
        IMAGE_EXTENSIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(extension))
    }

    pub fn renderer(&self) -> &ImageRenderer {
        &self.renderer
    }

    pub async fn render(&self, html: String, target: ViewTarget) -> Result<ViewOutput> {
        match target {
            ViewTarget::Html => Ok(ViewOutput {
                content_type: HTML_CONTENT_TYPE.to_string(),
                body: html.into_bytes(),
            }),
            ViewTarget::Image { extension } => {
                let image = self
                    .renderer
                    .render_request(RenderRequest {
                        html,
                        extension,
                        ..Default::default()
                    })
                    .await?;

                Ok(ViewOutput {
                    content_type: image.content_type().to_string(),
                    body: image.data,
                })
            }
        }
    }
}
