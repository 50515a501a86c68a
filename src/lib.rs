//! Hi-hat capture
//!
//! Full-page and responsive page capture for developer tooling, plus a small
//! STORE-only ZIP writer for bundling the resulting images into one download.
//!
//! # Features
//!
//! - **Paged capture**: scroll a page one viewport at a time, capture each
//!   step, and stitch the steps into a single tall image
//! - **Responsive capture**: repeat the full-page capture for a list of
//!   viewport presets and bundle the images into a ZIP archive
//! - **Adapter-based surfaces**: anything implementing [`PageSurface`] can be
//!   captured; a headless Chrome adapter is available behind the `cdp` feature
//!
//! # Example
//!
//! ```
//! use hihat_capture::{CaptureConfig, PagedCapture};
//! use hihat_capture::synthetic::SyntheticPage;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CaptureConfig {
//!     settle_delay_ms: 0,
//!     ..Default::default()
//! };
//!
//! let mut page = SyntheticPage::new(320, 200, 500);
//! let image = PagedCapture::new(config).capture_full_page(&mut page)?;
//! assert_eq!((image.width, image.height), (320, 500));
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub mod error;
pub use error::{Error, Result};

pub mod archive;
pub mod capture;
pub mod naming;
pub mod responsive;
pub mod synthetic;
pub mod worker;

// Chrome DevTools Protocol surface (requires a local Chrome/Chromium)
#[cfg(feature = "cdp")]
pub mod cdp;

pub use archive::{crc32, ArchiveEntry, ZipWriter};
pub use capture::{CaptureProgress, CapturedSegment, PagedCapture, StitchedImage};
pub use responsive::{ResponsiveCapture, ViewportPreset};
pub use worker::CaptureWorker;

/// Configuration shared by the capture pipeline and its surfaces
///
/// Every field has a default, so a JSON config file only needs to name the
/// values it overrides.
///
/// # Examples
///
/// ```
/// let cfg = hihat_capture::CaptureConfig::default();
/// assert_eq!(cfg.settle_delay_ms, 300);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Initial viewport dimensions for surfaces that launch a browser
    pub viewport: Viewport,
    /// Delay between scrolling and capturing, allowing re-layout and lazy images
    pub settle_delay_ms: u64,
    /// Wait bound handed to browser-backed surfaces (navigation waits)
    pub step_timeout_ms: u64,
    /// Upper bound for one whole request handled by the async worker
    pub operation_timeout_ms: u64,
    /// Encoding used for stitched output
    pub format: OutputFormat,
    /// JPEG quality (1-100), ignored for PNG
    pub jpeg_quality: u8,
    /// Viewport sizes used by responsive capture
    pub presets: Vec<ViewportPreset>,
    /// Optional user agent override for browser-backed surfaces
    pub user_agent: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            settle_delay_ms: 300,
            step_timeout_ms: 10_000,
            operation_timeout_ms: 120_000,
            format: OutputFormat::Png,
            jpeg_quality: 90,
            presets: ViewportPreset::defaults(),
            user_agent: None,
        }
    }
}

impl CaptureConfig {
    /// Parse a JSON config, filling unspecified fields from `Default`
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: CaptureConfig =
            serde_json::from_str(json).map_err(|e| Error::ConfigError(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load a JSON config file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(Error::ConfigError("viewport dimensions must be non-zero".into()));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(Error::ConfigError(format!(
                "jpeg_quality must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        if self.step_timeout_ms == 0 || self.operation_timeout_ms == 0 {
            return Err(Error::ConfigError("timeouts must be non-zero".into()));
        }
        for (i, p) in self.presets.iter().enumerate() {
            if p.width == 0 || p.height == 0 {
                return Err(Error::ConfigError(format!("preset {:?} has a zero dimension", p.label)));
            }
            if self.presets[..i].iter().any(|q| q.label == p.label) {
                return Err(Error::ConfigError(format!("duplicate preset label {:?}", p.label)));
            }
        }
        Ok(())
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Viewport dimensions in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Encoding of a stitched capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }
}

/// Page dimensions as measured when a capture starts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageMetrics {
    /// Width of the visible viewport
    pub viewport_width: u32,
    /// Height of the visible viewport
    pub viewport_height: u32,
    /// Total scrollable height of the document
    pub total_height: u32,
    /// Current vertical scroll offset
    pub scroll_y: u32,
    /// Device pixels per CSS pixel; captures are only stitchable at 1.0
    pub device_pixel_ratio: f64,
}

/// A scrollable page that can be captured one viewport at a time
///
/// Implementations wrap whatever actually hosts the page (a browser tab, an
/// in-memory raster). Calls are made strictly in sequence by the capture
/// pipeline; an implementation never sees overlapping calls.
pub trait PageSurface {
    /// Measure the viewport and document dimensions plus the current scroll offset
    fn metrics(&self) -> Result<PageMetrics>;

    /// Scroll to an absolute vertical offset
    fn scroll_to(&mut self, y: u32) -> Result<()>;

    /// Wait for the page to re-layout after a scroll. Defaults to sleeping.
    fn settle(&mut self, delay: Duration) {
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }

    /// Capture the currently visible viewport as an encoded raster image
    fn capture_viewport(&mut self) -> Result<Vec<u8>>;

    /// Resize the viewport (used by responsive capture)
    fn set_viewport(&mut self, viewport: Viewport) -> Result<()>;

    /// URL of the page being captured, if the surface knows it
    fn url(&self) -> Option<String> {
        None
    }
}

impl<S: PageSurface + ?Sized> PageSurface for Box<S> {
    fn metrics(&self) -> Result<PageMetrics> {
        (**self).metrics()
    }

    fn scroll_to(&mut self, y: u32) -> Result<()> {
        (**self).scroll_to(y)
    }

    fn settle(&mut self, delay: Duration) {
        (**self).settle(delay)
    }

    fn capture_viewport(&mut self) -> Result<Vec<u8>> {
        (**self).capture_viewport()
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        (**self).set_viewport(viewport)
    }

    fn url(&self) -> Option<String> {
        (**self).url()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CaptureConfig::default();
        assert_eq!(config.viewport.width, 1280);
        assert_eq!(config.viewport.height, 720);
        assert_eq!(config.format, OutputFormat::Png);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_config_keeps_defaults() {
        let cfg = CaptureConfig::from_json_str(r#"{ "settle_delay_ms": 0, "format": "jpeg" }"#)
            .expect("parse");
        assert_eq!(cfg.settle_delay_ms, 0);
        assert_eq!(cfg.format, OutputFormat::Jpeg);
        assert_eq!(cfg.step_timeout_ms, 10_000);
        assert_eq!(cfg.presets.len(), ViewportPreset::defaults().len());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = CaptureConfig::from_json_str(r#"{ "jpeg_quality": 0 }"#).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));

        let err = CaptureConfig::from_json_str(
            r#"{ "presets": [ {"label":"a","width":10,"height":10}, {"label":"a","width":20,"height":20} ] }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate preset"));

        assert!(CaptureConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn output_format_extensions() {
        assert_eq!(OutputFormat::Png.extension(), "png");
        assert_eq!(OutputFormat::Jpeg.extension(), "jpg");
        assert_eq!(OutputFormat::Jpeg.mime_type(), "image/jpeg");
    }
}
