//! Paged full-page capture
//!
//! A page taller than its viewport is captured by scrolling one viewport at a
//! time, grabbing each visible region, and compositing the regions onto one
//! canvas of the full page height.
//!
//! The page is measured once, when capture starts. Content that appears or
//! grows mid-capture (lazy loading below the fold) is not re-measured, so the
//! stitched image reflects the height seen at the start.

pub mod plan;
pub mod stitch;

pub use plan::scroll_stops;
pub use stitch::Stitcher;

use crate::archive::ArchiveEntry;
use crate::{naming, CaptureConfig, Error, OutputFormat, PageMetrics, PageSurface, Result};
use base64::Engine as Base64Engine;
use image::{DynamicImage, ImageFormat, RgbaImage};
use log::{debug, warn};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

type ProgressHandler = Arc<dyn Fn(&CaptureProgress) + Send + Sync>;

/// One viewport-sized capture taken at a specific scroll offset
#[derive(Debug, Clone)]
pub struct CapturedSegment {
    /// Encoded raster (PNG or JPEG) as returned by the surface
    pub image_data: Vec<u8>,
    /// Scroll offset the capture was taken at
    pub vertical_offset: u32,
    /// Whether this is the last segment of the page
    pub is_final: bool,
}

impl CapturedSegment {
    /// Build a segment from a `data:image/...;base64,` URL, the format browser
    /// capture APIs hand back
    pub fn from_data_url(data_url: &str, vertical_offset: u32, is_final: bool) -> Result<Self> {
        Ok(Self {
            image_data: decode_data_url(data_url)?,
            vertical_offset,
            is_final,
        })
    }
}

/// Progress notification emitted after each captured segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureProgress {
    /// Number of segments captured so far (1-based)
    pub captured: usize,
    /// Total number of segments planned
    pub total: usize,
    /// Scroll offset of the segment just captured
    pub vertical_offset: u32,
}

/// A composited page image
#[derive(Debug, Clone)]
pub struct StitchedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: RgbaImage,
}

impl StitchedImage {
    pub fn from_rgba(pixels: RgbaImage) -> Self {
        Self {
            width: pixels.width(),
            height: pixels.height(),
            pixels,
        }
    }

    /// Encode the image; `jpeg_quality` is only used for JPEG
    pub fn encode(&self, format: OutputFormat, jpeg_quality: u8) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        match format {
            OutputFormat::Png => {
                self.pixels.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
            }
            OutputFormat::Jpeg => {
                // JPEG has no alpha channel
                let rgb = DynamicImage::ImageRgba8(self.pixels.clone()).into_rgb8();
                let mut encoder =
                    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, jpeg_quality);
                encoder.encode_image(&rgb)?;
            }
        }
        Ok(buf)
    }

    /// Encode as a `data:` URL
    pub fn to_data_url(&self, format: OutputFormat, jpeg_quality: u8) -> Result<String> {
        let bytes = self.encode(format, jpeg_quality)?;
        Ok(format!(
            "data:{};base64,{}",
            format.mime_type(),
            base64::engine::general_purpose::STANDARD.encode(bytes)
        ))
    }

    /// Encode into a named archive entry
    pub fn into_entry(self, name: impl Into<String>, format: OutputFormat, jpeg_quality: u8) -> Result<ArchiveEntry> {
        Ok(ArchiveEntry::new(name, self.encode(format, jpeg_quality)?))
    }
}

fn decode_data_url(data_url: &str) -> Result<Vec<u8>> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or_else(|| Error::ImageError("not a data URL".into()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::ImageError("data URL has no payload".into()))?;
    if !meta.ends_with(";base64") {
        return Err(Error::ImageError(format!("unsupported data URL encoding: {}", meta)));
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| Error::ImageError(format!("invalid base64 payload: {}", e)))
}

/// Lazy, ordered walk over the scroll stops of a page
///
/// Each call to `next` scrolls, waits for the page to settle, and captures.
/// The original scroll offset is put back by [`Segments::restore`], or on
/// drop if the walk is abandoned early. Iteration stops after the first
/// error.
pub struct Segments<'a, S: PageSurface + ?Sized> {
    surface: &'a mut S,
    metrics: PageMetrics,
    stops: Vec<u32>,
    next: usize,
    settle: Duration,
    failed: bool,
    restored: bool,
}

impl<'a, S: PageSurface + ?Sized> Segments<'a, S> {
    /// Page dimensions measured when the walk started
    pub fn metrics(&self) -> PageMetrics {
        self.metrics
    }

    pub fn stops(&self) -> &[u32] {
        &self.stops
    }

    /// Scroll back to where the page was before the walk started
    pub fn restore(&mut self) -> Result<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        let offset = self.metrics.scroll_y;
        self.surface
            .scroll_to(offset)
            .map_err(|e| Error::RestoreError {
                offset,
                reason: e.to_string(),
            })
    }

    fn capture_stop(&mut self, index: usize) -> Result<CapturedSegment> {
        let y = self.stops[index];
        self.surface.scroll_to(y)?;
        self.surface.settle(self.settle);
        let image_data = self.surface.capture_viewport()?;
        Ok(CapturedSegment {
            image_data,
            vertical_offset: y,
            is_final: index + 1 == self.stops.len(),
        })
    }
}

impl<'a, S: PageSurface + ?Sized> Iterator for Segments<'a, S> {
    type Item = Result<CapturedSegment>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.next >= self.stops.len() {
            return None;
        }
        let index = self.next;
        self.next += 1;
        let res = self.capture_stop(index);
        if res.is_err() {
            self.failed = true;
        }
        Some(res)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = if self.failed { 0 } else { self.stops.len() - self.next };
        (0, Some(left))
    }
}

impl<'a, S: PageSurface + ?Sized> Drop for Segments<'a, S> {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            warn!("{}", e);
        }
    }
}

/// Full-page capture driver
///
/// Captures of one page must not overlap: every step depends on the scroll
/// position left by the previous one. The `&mut` borrow of the surface
/// enforces that within a thread; across threads use
/// [`CaptureWorker`](crate::CaptureWorker).
pub struct PagedCapture {
    config: CaptureConfig,
    on_progress: Option<ProgressHandler>,
}

impl PagedCapture {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            on_progress: None,
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Register a callback invoked after every captured segment
    pub fn on_progress<F>(&mut self, cb: F)
    where
        F: Fn(&CaptureProgress) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(cb));
    }

    /// Remove a previously registered progress callback
    pub fn clear_on_progress(&mut self) {
        self.on_progress = None;
    }

    /// Measure the page and start a lazy walk over its scroll stops
    pub fn segments<'a, S: PageSurface + ?Sized>(&self, surface: &'a mut S) -> Result<Segments<'a, S>> {
        if let Some(url) = surface.url() {
            naming::ensure_capturable(&url)?;
        }
        let metrics = surface.metrics()?;
        if metrics.device_pixel_ratio != 1.0 {
            return Err(Error::InvalidMetrics(format!(
                "device pixel ratio {} would capture {}px segments for {}px scroll steps",
                metrics.device_pixel_ratio,
                (f64::from(metrics.viewport_height) * metrics.device_pixel_ratio).round(),
                metrics.viewport_height
            )));
        }
        let stops = scroll_stops(metrics.total_height, metrics.viewport_height)?;
        debug!(
            "paged capture: page {}px, viewport {}x{}, {} stops",
            metrics.total_height,
            metrics.viewport_width,
            metrics.viewport_height,
            stops.len()
        );
        Ok(Segments {
            surface,
            metrics,
            stops,
            next: 0,
            settle: self.config.settle_delay(),
            failed: false,
            restored: false,
        })
    }

    /// Capture the whole page as one stitched image
    ///
    /// On any failure the scroll offset is restored and the error returned;
    /// a partial image is never produced.
    pub fn capture_full_page<S: PageSurface + ?Sized>(&self, surface: &mut S) -> Result<StitchedImage> {
        let mut segments = self.segments(surface)?;
        let metrics = segments.metrics();
        let mut stitcher = Stitcher::new(metrics.total_height, metrics.viewport_height);

        let outcome = self.drain(&mut segments, &mut stitcher);
        let restored = segments.restore();
        drop(segments);

        if let Err(e) = outcome {
            if let Err(r) = restored {
                warn!("{}", r);
            }
            return Err(e);
        }
        restored?;
        stitcher.finish()
    }

    fn drain<S: PageSurface + ?Sized>(&self, segments: &mut Segments<'_, S>, stitcher: &mut Stitcher) -> Result<()> {
        let total = segments.stops().len();
        let mut captured = 0;
        for segment in segments {
            let segment = segment?;
            stitcher.push(&segment)?;
            captured += 1;
            if let Some(cb) = &self.on_progress {
                cb(&CaptureProgress {
                    captured,
                    total,
                    vertical_offset: segment.vertical_offset,
                });
            }
        }
        Ok(())
    }

    /// Capture only the currently visible viewport, without scrolling
    pub fn capture_visible<S: PageSurface + ?Sized>(&self, surface: &mut S) -> Result<StitchedImage> {
        if let Some(url) = surface.url() {
            naming::ensure_capturable(&url)?;
        }
        let bytes = surface.capture_viewport()?;
        let img = image::load_from_memory(&bytes)?.into_rgba8();
        Ok(StitchedImage::from_rgba(img))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_round_trip() {
        let img = StitchedImage::from_rgba(RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 255])));
        let url = img.to_data_url(OutputFormat::Png, 90).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        let seg = CapturedSegment::from_data_url(&url, 0, true).unwrap();
        let back = image::load_from_memory(&seg.image_data).unwrap().into_rgba8();
        assert_eq!(back.dimensions(), (3, 2));
        assert_eq!(back.get_pixel(2, 1).0, [1, 2, 3, 255]);
    }

    #[test]
    fn malformed_data_urls_are_rejected() {
        assert!(CapturedSegment::from_data_url("image/png;base64,AAAA", 0, true).is_err());
        assert!(CapturedSegment::from_data_url("data:image/png;base64", 0, true).is_err());
        assert!(CapturedSegment::from_data_url("data:text/plain,hello", 0, true).is_err());
        assert!(CapturedSegment::from_data_url("data:image/png;base64,@@@", 0, true).is_err());
    }

    #[test]
    fn jpeg_encoding_drops_alpha() {
        let img = StitchedImage::from_rgba(RgbaImage::from_pixel(8, 8, image::Rgba([200, 10, 10, 128])));
        let bytes = img.encode(OutputFormat::Jpeg, 80).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }
}
