//! Chrome DevTools Protocol page surface

use crate::{naming, CaptureConfig, Error, PageMetrics, PageSurface, Result, Viewport};
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::types::Bounds;
use headless_chrome::{Browser, LaunchOptions};
use log::debug;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const METRICS_SCRIPT: &str = r#"
(function() {
    const body = document.body;
    const root = document.documentElement;
    return JSON.stringify({
        viewport_width: window.innerWidth,
        viewport_height: window.innerHeight,
        total_height: Math.max(
            body ? body.scrollHeight : 0,
            body ? body.offsetHeight : 0,
            root.clientHeight,
            root.scrollHeight,
            root.offsetHeight
        ),
        scroll_y: Math.round(window.pageYOffset || root.scrollTop || 0),
        device_pixel_ratio: window.devicePixelRatio || 1
    });
})()
"#;

#[derive(Deserialize)]
struct RawMetrics {
    viewport_width: u32,
    viewport_height: u32,
    total_height: u32,
    scroll_y: u32,
    device_pixel_ratio: f64,
}

/// Headless Chrome tab exposed as a [`PageSurface`]
///
/// Launches its own browser with a single tab. `step_timeout_ms` becomes the
/// tab's default wait timeout, which only bounds navigation waits; evaluate,
/// screenshot and resize calls block until Chrome answers. Drive the surface
/// through [`CaptureWorker`](crate::CaptureWorker) to put a deadline on a
/// whole capture.
pub struct CdpSurface {
    // Keeps the browser process alive for as long as the tab is in use
    _browser: Browser,
    tab: Arc<Tab>,
}

impl CdpSurface {
    pub fn launch(config: &CaptureConfig) -> Result<Self> {
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some((config.viewport.width, config.viewport.height)))
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::InitializationError(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::InitializationError(format!("Failed to create tab: {}", e)))?;
        tab.set_default_timeout(Duration::from_millis(config.step_timeout_ms));

        if let Some(ua) = &config.user_agent {
            tab.set_user_agent(ua, None, None)
                .map_err(|e| Error::InitializationError(format!("Failed to set user agent: {}", e)))?;
        }

        Ok(Self { _browser: browser, tab })
    }

    /// Load `url` and wait for navigation to finish
    pub fn navigate(&mut self, url: &str) -> Result<()> {
        naming::ensure_capturable(url)?;
        self.tab
            .navigate_to(url)
            .map_err(|e| Error::CdpError(format!("Navigation failed: {}", e)))?
            .wait_until_navigated()
            .map_err(|e| Error::CdpError(format!("Wait for navigation failed: {}", e)))?;
        debug!("navigated to {}", url);
        Ok(())
    }

    fn eval(&self, script: &str) -> Result<serde_json::Value> {
        let remote = self
            .tab
            .evaluate(script, false)
            .map_err(|e| Error::CdpError(format!("Evaluation failed: {}", e)))?;
        Ok(remote.value.unwrap_or(serde_json::Value::Null))
    }
}

impl PageSurface for CdpSurface {
    fn metrics(&self) -> Result<PageMetrics> {
        let value = self.eval(METRICS_SCRIPT)?;
        let json = value
            .as_str()
            .ok_or_else(|| Error::InvalidMetrics(format!("unexpected metrics value: {}", value)))?;
        let raw: RawMetrics =
            serde_json::from_str(json).map_err(|e| Error::InvalidMetrics(e.to_string()))?;
        Ok(PageMetrics {
            viewport_width: raw.viewport_width,
            viewport_height: raw.viewport_height,
            total_height: raw.total_height,
            scroll_y: raw.scroll_y,
            device_pixel_ratio: raw.device_pixel_ratio,
        })
    }

    fn scroll_to(&mut self, y: u32) -> Result<()> {
        self.eval(&format!("window.scrollTo({{ top: {}, left: 0, behavior: 'instant' }})", y))
            .map(|_| ())
            .map_err(|e| Error::ScrollError(e.to_string()))
    }

    fn capture_viewport(&mut self) -> Result<Vec<u8>> {
        self.tab
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| Error::CaptureError(format!("Screenshot failed: {}", e)))
    }

    // Resizes the window, not the layout viewport: browser chrome and the
    // minimum window size can leave innerWidth/innerHeight different from the
    // request, which responsive capture checks through `metrics`.
    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.tab
            .set_bounds(Bounds::Normal {
                left: None,
                top: None,
                width: Some(f64::from(viewport.width)),
                height: Some(f64::from(viewport.height)),
            })
            .map_err(|e| Error::CdpError(format!("Resize failed: {}", e)))?;
        Ok(())
    }

    fn url(&self) -> Option<String> {
        Some(self.tab.get_url())
    }
}
