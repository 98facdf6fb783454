//! Configuration management with serde serialization/deserialization
//!
//! This module holds the renderer configuration, the ordered image option map
//! forwarded to `wkhtmltoimage`, and the request/result types that flow through
//! the render pipeline.

use crate::error::{RenderError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default location of the renderer executable.
pub const DEFAULT_BINARY: &str = "/usr/bin/wkhtmltoimage";

/// Format used when neither the options nor the request name one.
pub const DEFAULT_FORMAT: &str = "jpg";

/// Option names forwarded to the renderer. Anything else is dropped.
pub const ALLOWED_IMAGE_OPTIONS: [&str; 9] = [
    "crop-w", "crop-h", "crop-x", "crop-y", "width", "height", "format", "quality", "zoom",
];

/// Main configuration for rendering HTML into images
///
/// Constructed once per render request and treated as immutable afterwards.
///
/// # Examples
///
/// ```rust
/// use html_to_image::{ImageOptions, RendererConfig};
///
/// // Use the system wkhtmltoimage with no explicit options
/// let config = RendererConfig::default();
///
/// // Point at a custom binary and ask for a cropped PNG
/// let config = RendererConfig {
///     binary: "/opt/wkhtmltox/bin/wkhtmltoimage".into(),
///     image_options: ImageOptions::new()
///         .with("format", "png")
///         .with("crop-w", 800),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Path to the wkhtmltoimage executable (default: `/usr/bin/wkhtmltoimage`)
    pub binary: PathBuf,

    /// Image options forwarded to the renderer after allow-list filtering
    pub image_options: ImageOptions,

    /// Deadline for a single renderer process (default: none)
    ///
    /// When set, a renderer that runs longer is killed and the render fails
    /// with a timeout error instead of hanging the caller.
    pub timeout: Option<Duration>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_BINARY),
            image_options: ImageOptions::default(),
            timeout: None,
        }
    }
}

impl RendererConfig {
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_options(mut self, options: ImageOptions) -> Self {
        self.image_options = options;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Parse a JSON configuration document.
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.binary.as_os_str().is_empty() {
            return Err(RenderError::ConfigurationError(
                "Renderer binary path must not be empty".to_string(),
            ));
        }

        if matches!(self.timeout, Some(timeout) if timeout.is_zero()) {
            return Err(RenderError::ConfigurationError(
                "Renderer timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// A single image option value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum OptionValue {
    /// No value; the option is skipped
    #[default]
    Absent,
    /// Bare flag when true, skipped when false
    Flag(bool),
    /// Textual value, numbers kept in their canonical form
    Scalar(String),
    /// Repeated `--name key value` triples
    Nested(Vec<(String, String)>),
}

impl OptionValue {
    /// Values that never reach the command line.
    ///
    /// `"0"` counts as empty, matching how the view layer has always treated it.
    pub fn is_empty(&self) -> bool {
        match self {
            OptionValue::Absent => true,
            OptionValue::Flag(enabled) => !enabled,
            OptionValue::Scalar(value) => value.is_empty() || value == "0",
            OptionValue::Nested(entries) => entries.is_empty(),
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Absent => Ok(()),
            OptionValue::Flag(enabled) => write!(f, "{enabled}"),
            OptionValue::Scalar(value) => f.write_str(value),
            OptionValue::Nested(entries) => {
                let pairs: Vec<String> = entries.iter().map(|(k, v)| format!("{k}={v}")).collect();
                f.write_str(&pairs.join(","))
            }
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Flag(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Scalar(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Scalar(value)
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        OptionValue::Scalar(value.to_string())
    }
}

macro_rules! scalar_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for OptionValue {
                fn from(value: $ty) -> Self {
                    OptionValue::Scalar(value.to_string())
                }
            }
        )*
    };
}

scalar_from_integer!(i32, i64, u8, u16, u32, u64, usize);

impl<T: Into<OptionValue>> From<Option<T>> for OptionValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

impl<K: Into<String>, V: Into<String>> From<Vec<(K, V)>> for OptionValue {
    fn from(entries: Vec<(K, V)>) -> Self {
        OptionValue::Nested(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl TryFrom<serde_json::Value> for OptionValue {
    type Error = String;

    fn try_from(value: serde_json::Value) -> std::result::Result<Self, Self::Error> {
        use serde_json::Value;

        match value {
            Value::Null => Ok(OptionValue::Absent),
            Value::Bool(enabled) => Ok(OptionValue::Flag(enabled)),
            Value::Number(number) => Ok(OptionValue::Scalar(number_text(&number))),
            Value::String(text) => Ok(OptionValue::Scalar(text)),
            Value::Object(map) => map
                .into_iter()
                .map(|(key, value)| match value {
                    Value::String(text) => Ok((key, text)),
                    Value::Number(number) => Ok((key, number_text(&number))),
                    other => Err(format!("nested option '{key}' must be a string or number, got {other}")),
                })
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(OptionValue::Nested),
            Value::Array(_) => Err("array option values are not supported".to_string()),
        }
    }
}

/// Same text `From<f64>` produces, so `0.0` reads as `"0"`.
fn number_text(number: &serde_json::Number) -> String {
    if number.is_f64() {
        number
            .as_f64()
            .map(|value| value.to_string())
            .unwrap_or_else(|| number.to_string())
    } else {
        number.to_string()
    }
}

impl From<&OptionValue> for serde_json::Value {
    fn from(value: &OptionValue) -> Self {
        use serde_json::Value;

        match value {
            OptionValue::Absent => Value::Null,
            OptionValue::Flag(enabled) => Value::Bool(*enabled),
            OptionValue::Scalar(text) => Value::String(text.clone()),
            OptionValue::Nested(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            ),
        }
    }
}

impl Serialize for OptionValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serde_json::Value::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for OptionValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        OptionValue::try_from(value).map_err(serde::de::Error::custom)
    }
}

/// Insertion-ordered map of image options
///
/// Inserting an existing key replaces its value without moving it, so the
/// order in which options reach the command line is the order they were
/// first configured in.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ImageOptions(IndexMap<String, OptionValue>);

impl ImageOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.0.get(key)
    }

    /// Overlay `other` on top of these options, key by key.
    pub fn merge(&mut self, other: &ImageOptions) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<OptionValue>> FromIterator<(K, V)> for ImageOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// Image formats wkhtmltoimage can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpg,
    Png,
    Bmp,
    Svg,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Bmp => "bmp",
            ImageFormat::Svg => "svg",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Bmp => "image/bmp",
            ImageFormat::Svg => "image/svg+xml",
        }
    }
}

impl FromStr for ImageFormat {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(ImageFormat::Jpg),
            "png" => Ok(ImageFormat::Png),
            "bmp" => Ok(ImageFormat::Bmp),
            "svg" => Ok(ImageFormat::Svg),
            _ => Err(RenderError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Settle the output format and make sure `options` carries it.
///
/// Precedence: a non-empty `format` option, then the request extension, then
/// [`DEFAULT_FORMAT`].
pub fn resolve_format(options: &mut ImageOptions, extension: Option<&str>) -> Result<ImageFormat> {
    let explicit = options.get("format").filter(|value| !value.is_empty()).cloned();

    match explicit {
        Some(OptionValue::Scalar(format)) => format.parse(),
        Some(other) => Err(RenderError::UnsupportedFormat(other.to_string())),
        None => {
            let fallback = extension
                .filter(|ext| !ext.is_empty())
                .unwrap_or(DEFAULT_FORMAT)
                .to_string();
            let format = fallback.parse()?;
            options.insert("format", fallback);
            Ok(format)
        }
    }
}

/// One HTML document to render
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub id: String,
    pub html: String,
    /// Extension of the incoming request (`jpg`, `png`), used as a format hint
    pub extension: Option<String>,
    /// Per-request options overlaid on the configured ones
    pub image_options: ImageOptions,
}

impl RenderRequest {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            ..Default::default()
        }
    }
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            html: String::new(),
            extension: None,
            image_options: ImageOptions::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderedImage {
    pub request_id: String,
    pub data: Vec<u8>,
    pub format: ImageFormat,
    pub duration: Duration,
}

impl RenderedImage {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}
