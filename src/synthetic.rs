//! Deterministic in-memory page surface
//!
//! `SyntheticPage` renders a page whose every row has a colour derived from
//! its row index, so a correctly stitched capture can be verified pixel by
//! pixel. It records every scroll and settle request and can be told to fail
//! on a given capture, which makes it the workhorse of the test suite and of
//! the CLI's offline mode.

use crate::{Error, PageMetrics, PageSurface, Result, Viewport};
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::time::Duration;

/// Colour of page row `y`; unique for the first 2^16 rows
pub fn row_color(y: u32) -> Rgba<u8> {
    Rgba([(y & 0xFF) as u8, ((y >> 8) & 0xFF) as u8, 0x80, 0xFF])
}

/// A fake scrollable page backed by a generated raster
#[derive(Debug, Clone)]
pub struct SyntheticPage {
    viewport: Viewport,
    total_height: u32,
    scroll_y: u32,
    url: Option<String>,
    /// Fail the n-th capture (0-based) with a capture error
    fail_capture_at: Option<usize>,
    /// Fail every scroll to this offset
    fail_scroll_to: Option<u32>,
    /// Narrowest viewport the page accepts; narrower requests are widened
    min_viewport_width: u32,
    device_pixel_ratio: f64,
    captures: usize,
    scroll_log: Vec<u32>,
    settle_log: Vec<Duration>,
    viewport_log: Vec<Viewport>,
}

impl SyntheticPage {
    pub fn new(viewport_width: u32, viewport_height: u32, total_height: u32) -> Self {
        Self {
            viewport: Viewport {
                width: viewport_width,
                height: viewport_height,
            },
            total_height,
            scroll_y: 0,
            url: None,
            fail_capture_at: None,
            fail_scroll_to: None,
            min_viewport_width: 0,
            device_pixel_ratio: 1.0,
            captures: 0,
            scroll_log: Vec::new(),
            settle_log: Vec::new(),
            viewport_log: Vec::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Start the page already scrolled to `y`
    pub fn scrolled_to(mut self, y: u32) -> Self {
        self.scroll_y = y;
        self
    }

    pub fn fail_capture_at(mut self, index: usize) -> Self {
        self.fail_capture_at = Some(index);
        self
    }

    pub fn fail_scroll_to(mut self, y: u32) -> Self {
        self.fail_scroll_to = Some(y);
        self
    }

    /// Widen narrower viewport requests to `width`, like a browser window
    /// with a minimum size
    pub fn with_min_viewport_width(mut self, width: u32) -> Self {
        self.min_viewport_width = width;
        self
    }

    /// Report a device pixel ratio; captures stay at one pixel per CSS pixel
    pub fn with_device_pixel_ratio(mut self, ratio: f64) -> Self {
        self.device_pixel_ratio = ratio;
        self
    }

    pub fn scroll_y(&self) -> u32 {
        self.scroll_y
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn captures(&self) -> usize {
        self.captures
    }

    /// Every offset passed to `scroll_to`, in order
    pub fn scroll_log(&self) -> &[u32] {
        &self.scroll_log
    }

    pub fn settle_log(&self) -> &[Duration] {
        &self.settle_log
    }

    pub fn viewport_log(&self) -> &[Viewport] {
        &self.viewport_log
    }

    fn max_scroll(&self) -> u32 {
        self.total_height.saturating_sub(self.viewport.height)
    }
}

impl PageSurface for SyntheticPage {
    fn metrics(&self) -> Result<PageMetrics> {
        Ok(PageMetrics {
            viewport_width: self.viewport.width,
            viewport_height: self.viewport.height,
            total_height: self.total_height,
            scroll_y: self.scroll_y,
            device_pixel_ratio: self.device_pixel_ratio,
        })
    }

    fn scroll_to(&mut self, y: u32) -> Result<()> {
        self.scroll_log.push(y);
        if self.fail_scroll_to == Some(y) {
            return Err(Error::ScrollError(format!("scroll to {} rejected", y)));
        }
        // Browsers clamp scroll offsets to the scrollable range
        self.scroll_y = y.min(self.max_scroll());
        Ok(())
    }

    fn settle(&mut self, delay: Duration) {
        self.settle_log.push(delay);
    }

    fn capture_viewport(&mut self) -> Result<Vec<u8>> {
        let index = self.captures;
        self.captures += 1;
        if self.fail_capture_at == Some(index) {
            return Err(Error::CaptureError(format!("capture {} failed: tab closed", index)));
        }

        let top = self.scroll_y;
        let img = RgbaImage::from_fn(self.viewport.width, self.viewport.height, |_, y| {
            let page_row = top + y;
            if page_row < self.total_height {
                row_color(page_row)
            } else {
                // Below the document: browser background
                Rgba([0xFF, 0xFF, 0xFF, 0xFF])
            }
        });
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        Ok(buf)
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        if viewport.width == 0 || viewport.height == 0 {
            return Err(Error::InvalidMetrics(format!(
                "viewport {}x{} is empty",
                viewport.width, viewport.height
            )));
        }
        self.viewport_log.push(viewport);
        self.viewport = Viewport {
            width: viewport.width.max(self.min_viewport_width),
            height: viewport.height,
        };
        self.scroll_y = self.scroll_y.min(self.max_scroll());
        Ok(())
    }

    fn url(&self) -> Option<String> {
        self.url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_reflects_scroll_position() {
        let mut page = SyntheticPage::new(4, 10, 30);
        page.scroll_to(12).unwrap();
        let png = page.capture_viewport().unwrap();
        let img = image::load_from_memory(&png).unwrap().into_rgba8();
        assert_eq!(img.dimensions(), (4, 10));
        assert_eq!(*img.get_pixel(0, 0), row_color(12));
        assert_eq!(*img.get_pixel(3, 9), row_color(21));
    }

    #[test]
    fn scroll_is_clamped_to_scrollable_range() {
        let mut page = SyntheticPage::new(4, 10, 25);
        page.scroll_to(100).unwrap();
        assert_eq!(page.scroll_y(), 15);
        assert_eq!(page.scroll_log(), &[100]);
    }

    #[test]
    fn failure_injection() {
        let mut page = SyntheticPage::new(4, 10, 25).fail_capture_at(1).fail_scroll_to(7);
        assert!(page.capture_viewport().is_ok());
        assert!(matches!(page.capture_viewport(), Err(Error::CaptureError(_))));
        assert!(matches!(page.scroll_to(7), Err(Error::ScrollError(_))));
        assert!(page.set_viewport(Viewport { width: 0, height: 1 }).is_err());
    }

    #[test]
    fn narrow_viewports_are_widened_to_minimum() {
        let mut page = SyntheticPage::new(800, 600, 1000).with_min_viewport_width(500);
        page.set_viewport(Viewport { width: 375, height: 667 }).unwrap();
        assert_eq!(page.viewport(), Viewport { width: 500, height: 667 });
        assert_eq!(page.viewport_log(), &[Viewport { width: 375, height: 667 }]);
    }
}
