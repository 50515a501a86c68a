//! Multi-viewport capture bundled into a ZIP archive
//!
//! For each preset the surface is resized, the page captured in full, and the
//! image named after the preset. A surface that cannot honour a preset size
//! exactly is an error, so entry names always describe the real viewport. The
//! surface's original viewport and scroll offset are put back afterwards
//! whether or not every preset succeeded.

use crate::archive::{ArchiveEntry, ZipWriter};
use crate::capture::PagedCapture;
use crate::{naming, CaptureConfig, Error, PageSurface, Result, Viewport};
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// A named viewport size
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportPreset {
    pub label: String,
    pub width: u32,
    pub height: u32,
}

impl ViewportPreset {
    pub fn new(label: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            label: label.into(),
            width,
            height,
        }
    }

    pub fn defaults() -> Vec<ViewportPreset> {
        vec![
            ViewportPreset::new("mobile", 375, 667),
            ViewportPreset::new("tablet", 768, 1024),
            ViewportPreset::new("laptop", 1366, 768),
            ViewportPreset::new("desktop", 1920, 1080),
        ]
    }

    pub fn viewport(&self) -> Viewport {
        Viewport {
            width: self.width,
            height: self.height,
        }
    }

    /// Archive entry name, e.g. `mobile-375x667.png`
    pub fn entry_name(&self, extension: &str) -> String {
        format!("{}-{}x{}.{}", self.label, self.width, self.height, extension)
    }

    /// Parse `label=WIDTHxHEIGHT` or bare `WIDTHxHEIGHT` (label defaults to the size)
    pub fn parse(spec: &str) -> Result<Self> {
        let (label, size) = match spec.split_once('=') {
            Some((l, s)) => (l.trim().to_string(), s.trim()),
            None => (spec.trim().to_string(), spec.trim()),
        };
        let (w, h) = size
            .split_once(['x', 'X'])
            .ok_or_else(|| Error::ConfigError(format!("viewport {:?} is not WIDTHxHEIGHT", spec)))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| Error::ConfigError(format!("invalid dimension {:?} in {:?}", v, spec)))
        };
        if label.is_empty() {
            return Err(Error::ConfigError(format!("viewport {:?} has an empty label", spec)));
        }
        Ok(Self {
            label,
            width: parse(w)?,
            height: parse(h)?,
        })
    }
}

/// Drives a full-page capture per preset and bundles the results
pub struct ResponsiveCapture {
    capture: PagedCapture,
    presets: Vec<ViewportPreset>,
    zip: ZipWriter,
}

impl ResponsiveCapture {
    /// Use the presets from `config`
    pub fn new(config: CaptureConfig) -> Self {
        let presets = config.presets.clone();
        Self {
            capture: PagedCapture::new(config),
            presets,
            zip: ZipWriter::new(),
        }
    }

    pub fn with_presets(mut self, presets: Vec<ViewportPreset>) -> Self {
        self.presets = presets;
        self
    }

    /// Replace the archive writer (e.g. one with a fixed timestamp)
    pub fn with_zip_writer(mut self, zip: ZipWriter) -> Self {
        self.zip = zip;
        self
    }

    pub fn presets(&self) -> &[ViewportPreset] {
        &self.presets
    }

    /// Access the underlying capture driver, e.g. to register progress callbacks
    pub fn capture_mut(&mut self) -> &mut PagedCapture {
        &mut self.capture
    }

    /// Capture every preset and return one encoded image entry per preset
    pub fn capture_all<S: PageSurface + ?Sized>(&self, surface: &mut S) -> Result<Vec<ArchiveEntry>> {
        if self.presets.is_empty() {
            return Err(Error::ConfigError("no viewport presets configured".into()));
        }
        if let Some(url) = surface.url() {
            naming::ensure_capturable(&url)?;
        }

        let original = surface.metrics()?;
        let outcome = self.capture_presets(surface);

        // The preset viewports may have clamped the scroll offset, so the
        // offset goes back only after the viewport does.
        let restored = surface
            .set_viewport(Viewport {
                width: original.viewport_width,
                height: original.viewport_height,
            })
            .and_then(|()| {
                surface.scroll_to(original.scroll_y).map_err(|e| Error::RestoreError {
                    offset: original.scroll_y,
                    reason: e.to_string(),
                })
            });
        match (outcome, restored) {
            (Err(e), Err(r)) => {
                warn!("failed to restore page after error: {}", r);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(_), Err(r)) => Err(r),
            (Ok(entries), Ok(())) => Ok(entries),
        }
    }

    fn capture_presets<S: PageSurface + ?Sized>(&self, surface: &mut S) -> Result<Vec<ArchiveEntry>> {
        let cfg = self.capture.config();
        let mut entries = Vec::with_capacity(self.presets.len());
        for preset in &self.presets {
            surface.set_viewport(preset.viewport())?;
            let actual = surface.metrics()?;
            if actual.viewport_width != preset.width || actual.viewport_height != preset.height {
                return Err(Error::InvalidMetrics(format!(
                    "preset {:?} asked for {}x{} but the viewport is {}x{}",
                    preset.label, preset.width, preset.height, actual.viewport_width, actual.viewport_height
                )));
            }
            let image = self.capture.capture_full_page(surface)?;
            info!(
                "captured {} at {}x{} -> {}x{}",
                preset.label, preset.width, preset.height, image.width, image.height
            );
            entries.push(image.into_entry(
                preset.entry_name(cfg.format.extension()),
                cfg.format,
                cfg.jpeg_quality,
            )?);
        }
        Ok(entries)
    }

    /// Capture every preset and bundle the images into a ZIP archive
    pub fn capture_archive<S: PageSurface + ?Sized>(&self, surface: &mut S) -> Result<Vec<u8>> {
        let entries = self.capture_all(surface)?;
        self.zip.build(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_names() {
        let p = ViewportPreset::new("mobile", 375, 667);
        assert_eq!(p.entry_name("png"), "mobile-375x667.png");
        assert_eq!(p.viewport(), Viewport { width: 375, height: 667 });
    }

    #[test]
    fn preset_parsing() {
        assert_eq!(
            ViewportPreset::parse("phone=360x640").unwrap(),
            ViewportPreset::new("phone", 360, 640)
        );
        assert_eq!(
            ViewportPreset::parse("1024X768").unwrap(),
            ViewportPreset::new("1024X768", 1024, 768)
        );
        assert!(ViewportPreset::parse("wide").is_err());
        assert!(ViewportPreset::parse("a=0x10").is_err());
        assert!(ViewportPreset::parse("=10x10").is_err());
    }

    #[test]
    fn default_labels_are_unique() {
        let d = ViewportPreset::defaults();
        for (i, p) in d.iter().enumerate() {
            assert!(d[i + 1..].iter().all(|q| q.label != p.label));
        }
    }
}
