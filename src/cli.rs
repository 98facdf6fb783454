use crate::{ImageOptions, ImageRenderer, RenderRequest, RendererConfig};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "html-to-image")]
#[command(about = "Render HTML into JPEG/PNG images with wkhtmltoimage")]
#[command(version = "0.1.0")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, help = "Configuration file path (JSON)")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "wkhtmltoimage executable path")]
    pub binary: Option<PathBuf>,

    #[arg(long, help = "Renderer timeout in seconds")]
    pub timeout: Option<u64>,

    #[arg(long, help = "Enable verbose logging")]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render a single HTML document
    Render {
        #[arg(short, long, help = "Input HTML file, or - for stdin")]
        input: PathBuf,

        #[arg(short, long, help = "Output image file, or - for stdout")]
        output: PathBuf,

        #[command(flatten)]
        options: ImageArgs,
    },

    /// Render every .html file in a directory
    Batch {
        #[arg(short, long, help = "Directory containing HTML files")]
        input_dir: PathBuf,

        #[arg(short, long, help = "Output directory for images")]
        output_dir: PathBuf,

        #[arg(short, long, help = "Concurrent renderer processes (default: CPU count)")]
        concurrency: Option<usize>,

        #[command(flatten)]
        options: ImageArgs,
    },

    /// Validate configuration and show the renderer command it produces
    Validate {
        #[arg(short, long, help = "Configuration file to validate")]
        config: PathBuf,
    },
}

/// Image options accepted on the command line
#[derive(Args, Debug, Clone, Default)]
pub struct ImageArgs {
    #[arg(long, help = "Output format (jpg, png, bmp, svg)")]
    pub format: Option<String>,

    #[arg(long, help = "Screen width in pixels")]
    pub width: Option<u32>,

    #[arg(long, help = "Screen height in pixels")]
    pub height: Option<u32>,

    #[arg(long, help = "Output quality (0-100)")]
    pub quality: Option<u8>,

    #[arg(long, help = "Zoom factor")]
    pub zoom: Option<f64>,

    #[arg(long, help = "Crop width")]
    pub crop_w: Option<u32>,

    #[arg(long, help = "Crop height")]
    pub crop_h: Option<u32>,

    #[arg(long, help = "Crop x offset")]
    pub crop_x: Option<u32>,

    #[arg(long, help = "Crop y offset")]
    pub crop_y: Option<u32>,

    #[arg(long = "option", value_parser = parse_key_val, help = "Extra option as key=value")]
    pub extra: Vec<(String, String)>,
}

impl ImageArgs {
    pub fn to_options(&self) -> ImageOptions {
        let mut options = ImageOptions::new();

        let pairs = [
            ("crop-w", self.crop_w.map(|v| v.to_string())),
            ("crop-h", self.crop_h.map(|v| v.to_string())),
            ("crop-x", self.crop_x.map(|v| v.to_string())),
            ("crop-y", self.crop_y.map(|v| v.to_string())),
            ("width", self.width.map(|v| v.to_string())),
            ("height", self.height.map(|v| v.to_string())),
            ("format", self.format.clone()),
            ("quality", self.quality.map(|v| v.to_string())),
            ("zoom", self.zoom.map(|v| v.to_string())),
        ];

        for (key, value) in pairs {
            if let Some(value) = value {
                options.insert(key, value);
            }
        }

        for (key, value) in &self.extra {
            options.insert(key.clone(), value.clone());
        }

        options
    }
}

pub fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid key=value: no '=' found in '{s}'"))?;

    if key.trim().is_empty() {
        return Err(format!("invalid key=value: empty key in '{s}'"));
    }

    Ok((key.trim().to_string(), value.to_string()))
}

/// Apply command-line overrides on top of a loaded configuration.
pub fn apply_overrides(config: &mut RendererConfig, args: &Cli) {
    if let Some(binary) = &args.binary {
        config.binary = binary.clone();
    }

    if let Some(timeout) = args.timeout {
        config.timeout = Some(std::time::Duration::from_secs(timeout));
    }
}

pub struct CliRunner {
    pub config: RendererConfig,
    pub renderer: Arc<ImageRenderer>,
}

impl CliRunner {
    pub fn new(config: RendererConfig) -> Result<Self> {
        let renderer = Arc::new(
            ImageRenderer::new(config.clone()).context("Invalid renderer configuration")?,
        );

        Ok(Self { config, renderer })
    }

    pub async fn run(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Render {
                input,
                output,
                options,
            } => self.run_render(input, output, options).await,
            Commands::Batch {
                input_dir,
                output_dir,
                concurrency,
                options,
            } => {
                let concurrency = concurrency.unwrap_or_else(num_cpus::get).max(1);
                self.run_batch(input_dir, output_dir, concurrency, options)
                    .await
            }
            Commands::Validate { config } => self.validate_config(config).await,
        }
    }

    pub async fn run_render(&self, input: PathBuf, output: PathBuf, options: ImageArgs) -> Result<()> {
        let html = read_input(&input).await?;

        let request = RenderRequest {
            html,
            extension: extension_of(&output),
            image_options: options.to_options(),
            ..Default::default()
        };

        let image = self
            .renderer
            .render_request(request)
            .await
            .with_context(|| format!("Failed to render {}", input.display()))?;

        write_output(&output, &image.data).await?;

        if !is_stdio(&output) {
            println!("Image rendered successfully:");
            println!("  Input: {}", input.display());
            println!("  Output: {}", output.display());
            println!("  Format: {} ({})", image.format, image.content_type());
            println!("  Size: {} bytes", image.data.len());
            println!("  Duration: {:?}", image.duration);
        }

        Ok(())
    }

    pub async fn run_batch(
        &self,
        input_dir: PathBuf,
        output_dir: PathBuf,
        concurrency: usize,
        options: ImageArgs,
    ) -> Result<()> {
        info!("Starting batch rendering from {}", input_dir.display());

        let files = list_html_files(&input_dir).await?;
        info!("Found {} HTML files", files.len());

        fs::create_dir_all(&output_dir)
            .await
            .with_context(|| format!("Failed to create {}", output_dir.display()))?;

        let semaphore = Arc::new(Semaphore::new(concurrency));
        let image_options = options.to_options();

        let tasks: Vec<_> = files
            .into_iter()
            .map(|path| {
                let renderer = self.renderer.clone();
                let semaphore = semaphore.clone();
                let image_options = image_options.clone();
                let output_dir = output_dir.clone();

                tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await?;
                    render_file(&renderer, &path, &output_dir, image_options).await
                })
            })
            .collect();

        let mut success_count = 0;
        let mut error_count = 0;

        for result in join_all(tasks).await {
            match result {
                Ok(Ok(saved)) => {
                    success_count += 1;
                    info!("Saved image: {}", saved.display());
                }
                Ok(Err(e)) => {
                    error_count += 1;
                    warn!("{:#}", e);
                }
                Err(e) => {
                    error_count += 1;
                    error!("Render task panicked: {}", e);
                }
            }
        }

        info!(
            "Batch rendering completed. Success: {}, Errors: {}",
            success_count, error_count
        );

        if error_count > 0 {
            bail!("{error_count} of {} renders failed", success_count + error_count);
        }

        Ok(())
    }

    pub async fn validate_config(&self, config_path: PathBuf) -> Result<()> {
        println!("Validating configuration: {}", config_path.display());

        let config = load_config_file(&config_path).await?;
        config.validate()?;

        println!("Configuration is valid:");
        println!("  Binary: {}", config.binary.display());
        println!("  Timeout: {:?}", config.timeout);
        println!("  Image options: {}", serde_json::to_string(&config.image_options)?);

        let renderer = ImageRenderer::new(config)?;
        match renderer.prepare(&RenderRequest::default()) {
            Ok(prepared) => {
                println!("  Command: {}", prepared.command);
                println!("  Content type: {}", prepared.format.content_type());
            }
            Err(e) => println!("  Command: unavailable ({e})"),
        }

        Ok(())
    }
}

pub async fn load_config_file(path: &Path) -> Result<RendererConfig> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    RendererConfig::from_json(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

async fn render_file(
    renderer: &ImageRenderer,
    path: &Path,
    output_dir: &Path,
    image_options: ImageOptions,
) -> Result<PathBuf> {
    let html = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let image = renderer
        .render_request(RenderRequest {
            html,
            image_options,
            ..Default::default()
        })
        .await
        .with_context(|| format!("Failed to render {}", path.display()))?;

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| image.request_id.clone());
    let target = output_dir.join(format!("{stem}.{}", image.format.extension()));

    fs::write(&target, &image.data)
        .await
        .with_context(|| format!("Failed to write {}", target.display()))?;

    Ok(target)
}

pub async fn list_html_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to read directory {}", dir.display()))?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_html = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"))
            .unwrap_or(false);

        if is_html && entry.file_type().await?.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Extension of an output path, used as the format hint.
pub fn extension_of(path: &Path) -> Option<String> {
    if is_stdio(path) {
        return None;
    }
    path.extension().map(|ext| ext.to_string_lossy().to_lowercase())
}

async fn read_input(path: &Path) -> Result<String> {
    if is_stdio(path) {
        let mut html = String::new();
        tokio::io::stdin()
            .read_to_string(&mut html)
            .await
            .context("Failed to read HTML from stdin")?;
        return Ok(html);
    }

    fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

async fn write_output(path: &Path, data: &[u8]) -> Result<()> {
    if is_stdio(path) {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(data).await?;
        stdout.flush().await?;
        return Ok(());
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    fs::write(path, data)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

pub fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}


#[cfg(all(test, unix))]
mod runner_tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// Renderer stand-in: echoes stdin, or complains on stderr when the page says "fail".
    const STUB_RENDERER: &str = "#!/bin/sh\ninput=$(cat)\ncase \"$input\" in\n  *fail*) echo \"bad page\" >&2 ;;\n  *) printf '%s' \"$input\" ;;\nesac\n";

    fn install_stub(dir: &Path) -> PathBuf {
        let path = dir.join("wkhtmltoimage");
        std::fs::write(&path, STUB_RENDERER).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn runner_for(binary: PathBuf) -> CliRunner {
        CliRunner::new(RendererConfig::default().with_binary(binary)).unwrap()
    }

    #[tokio::test]
    async fn test_run_render_writes_image() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner_for(install_stub(dir.path()));

        let input = dir.path().join("page.html");
        let output = dir.path().join("out").join("page.png");
        fs::write(&input, "<p>chart</p>").await.unwrap();

        runner
            .run_render(input, output.clone(), ImageArgs::default())
            .await
            .unwrap();

        assert_eq!(fs::read(&output).await.unwrap(), b"<p>chart</p>");
    }

    #[tokio::test]
    async fn test_run_batch_renders_every_page() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner_for(install_stub(dir.path()));

        let input_dir = dir.path().join("pages");
        let output_dir = dir.path().join("images");
        fs::create_dir_all(&input_dir).await.unwrap();
        fs::write(input_dir.join("a.html"), "<p>a</p>").await.unwrap();
        fs::write(input_dir.join("b.html"), "<p>b</p>").await.unwrap();
        fs::write(input_dir.join("readme.txt"), "skip").await.unwrap();

        let options = ImageArgs {
            format: Some("png".to_string()),
            ..Default::default()
        };
        runner
            .run_batch(input_dir, output_dir.clone(), 2, options)
            .await
            .unwrap();

        assert_eq!(fs::read(output_dir.join("a.png")).await.unwrap(), b"<p>a</p>");
        assert_eq!(fs::read(output_dir.join("b.png")).await.unwrap(), b"<p>b</p>");
        assert!(!output_dir.join("readme.png").exists());
    }

    #[tokio::test]
    async fn test_run_batch_reports_failed_pages() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner_for(install_stub(dir.path()));

        let input_dir = dir.path().join("pages");
        let output_dir = dir.path().join("images");
        fs::create_dir_all(&input_dir).await.unwrap();
        fs::write(input_dir.join("good.html"), "<p>ok</p>").await.unwrap();
        fs::write(input_dir.join("bad.html"), "<p>fail</p>").await.unwrap();

        let err = runner
            .run_batch(input_dir, output_dir.clone(), 1, ImageArgs::default())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "1 of 2 renders failed");
        assert_eq!(fs::read(output_dir.join("good.jpg")).await.unwrap(), b"<p>ok</p>");
        assert!(!output_dir.join("bad.jpg").exists());
    }

    #[tokio::test]
    async fn test_validate_config_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let binary = install_stub(dir.path());
        let runner = runner_for(binary.clone());

        let path = dir.path().join("config.json");
        let json = serde_json::json!({
            "binary": binary,
            "image_options": {"format": "png", "width": 320},
        });
        fs::write(&path, json.to_string()).await.unwrap();
        runner.validate_config(path.clone()).await.unwrap();

        fs::write(&path, r#"{"timeout": {"secs": 0, "nanos": 0}}"#).await.unwrap();
        assert!(runner.validate_config(path).await.is_err());
    }
}
