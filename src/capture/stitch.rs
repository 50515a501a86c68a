//! Compositing of captured segments into one page-tall raster

use super::{CapturedSegment, StitchedImage};
use crate::{Error, Result};
use image::{imageops, RgbaImage};
use log::warn;

/// Accumulates segments onto a canvas as they arrive
///
/// Segments are decoded and drawn immediately, so only the canvas and the
/// segment being drawn are held in memory at any time.
pub struct Stitcher {
    canvas: Option<RgbaImage>,
    total_height: u32,
    viewport_height: u32,
    // Highest row covered so far; rows are drawn top-down
    covered: u32,
}

impl Stitcher {
    pub fn new(total_height: u32, viewport_height: u32) -> Self {
        Self {
            canvas: None,
            total_height,
            viewport_height,
            covered: 0,
        }
    }

    /// Decode `segment` and draw it at its vertical offset
    pub fn push(&mut self, segment: &CapturedSegment) -> Result<()> {
        let y = segment.vertical_offset;
        if y >= self.total_height {
            return Err(Error::ImageError(format!(
                "segment offset {} lies outside a page of height {}",
                y, self.total_height
            )));
        }

        if y > self.covered {
            return Err(Error::ImageError(format!(
                "gap in stitched image: rows {}..{} were never captured",
                self.covered, y
            )));
        }

        let img = image::load_from_memory(&segment.image_data)?.into_rgba8();
        // Offsets are CSS pixels; a scaled capture would be drawn at the
        // wrong rows
        if img.height() != self.viewport_height {
            return Err(Error::ImageError(format!(
                "segment at {} is {}px tall, viewport is {}px",
                y,
                img.height(),
                self.viewport_height
            )));
        }
        let total_height = self.total_height;
        let canvas = self
            .canvas
            .get_or_insert_with(|| RgbaImage::new(img.width(), total_height));
        if img.width() != canvas.width() {
            warn!(
                "segment at {} is {}px wide, canvas is {}px; clipping",
                y,
                img.width(),
                canvas.width()
            );
        }

        // Only the final segment can overhang the page bottom: keep its top
        // `H - y` rows so the overlap is not drawn twice.
        let drawn = if segment.is_final && y + self.viewport_height > self.total_height {
            let rows = (self.total_height - y).min(img.height());
            let slice = imageops::crop_imm(&img, 0, 0, img.width(), rows).to_image();
            imageops::replace(canvas, &slice, 0, i64::from(y));
            rows
        } else {
            imageops::replace(canvas, &img, 0, i64::from(y));
            img.height().min(self.total_height - y)
        };

        self.covered = self.covered.max(y + drawn);
        Ok(())
    }

    /// Finish stitching; fails if any row of the page is uncovered
    pub fn finish(self) -> Result<StitchedImage> {
        let canvas = self
            .canvas
            .ok_or_else(|| Error::ImageError("no segments were captured".into()))?;
        if self.covered < self.total_height {
            return Err(Error::ImageError(format!(
                "stitched image covers {} of {} rows",
                self.covered, self.total_height
            )));
        }
        Ok(StitchedImage::from_rgba(canvas))
    }
}
