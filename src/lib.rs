//! # HTML to Image
//!
//! A view-layer adapter that turns server-rendered HTML into JPEG/PNG images by
//! piping it through the external `wkhtmltoimage` renderer. The HTML goes in on
//! the renderer's stdin, the image comes back on its stdout, and failures are
//! mapped to typed errors.
//!
//! ## Pipeline
//!
//! | Stage | Module | Responsibility |
//! |-------|--------|----------------|
//! | Command Builder | [`command`] | Allow-list filtering, escaping, `--quiet - -` suffix |
//! | Process Runner | [`runner`] | One process per render, full-duplex stdin/stdout/stderr |
//! | Result Interpreter | [`interpret`] | stderr ⇒ error, empty stdout ⇒ error, else image bytes |
//!
//! Only these options reach the renderer: `crop-w`, `crop-h`, `crop-x`,
//! `crop-y`, `width`, `height`, `format`, `quality` and `zoom`. Anything else in
//! the option map is dropped silently.
//!
//! ## Output format
//!
//! The format is taken from the `format` option, then from the request
//! extension, and falls back to `jpg`. It also decides the response content
//! type.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use html_to_image::{render, ImageOptions, RendererConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RendererConfig {
//!         image_options: ImageOptions::new().with("format", "png").with("width", 800),
//!         ..Default::default()
//!     };
//!
//!     let png = render("<h1>Hello</h1>", &config).await?;
//!     println!("Rendered {} bytes", png.len());
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! html-to-image render --input page.html --output page.png --width 800
//! html-to-image batch --input-dir pages/ --output-dir images/ --format jpg --quality 80
//! ```

/// Configuration, image options and request/result types
pub mod config;

/// Error types
pub mod error;

/// Renderer command-line assembly and platform quoting
pub mod command;

/// Renderer process execution
pub mod runner;

/// Interpretation of renderer output
pub mod interpret;

/// Render service orchestrating the pipeline
pub mod renderer;

/// Response adapter for web frameworks
pub mod view;

/// Command-line interface implementation
pub mod cli;

/// Render metrics
pub mod metrics;


pub use cli::*;
pub use command::*;
pub use config::*;
pub use error::*;
pub use interpret::*;
pub use self::metrics::*;
pub use renderer::*;
pub use runner::*;
pub use view::*;
