//! Download names and capture eligibility for page URLs

use crate::{Error, OutputFormat, Result};
use chrono::{DateTime, Utc};
use url::Url;

/// URL prefixes of browser-internal pages that refuse to be captured
const RESTRICTED_PREFIXES: &[&str] = &["chrome://", "chrome-extension://", "edge://", "about:"];

/// What kind of capture a file holds; selects the filename prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    Visible,
    FullPage,
    Responsive,
}

impl CaptureKind {
    pub fn prefix(self) -> &'static str {
        match self {
            CaptureKind::Visible => "screenshot",
            CaptureKind::FullPage => "fullpage-screenshot",
            CaptureKind::Responsive => "responsive-screenshots",
        }
    }
}

pub fn is_restricted_url(url: &str) -> bool {
    RESTRICTED_PREFIXES.iter().any(|p| url.starts_with(p))
}

/// Fail with `RestrictedUrl` for pages that cannot be captured
pub fn ensure_capturable(url: &str) -> Result<()> {
    if is_restricted_url(url) {
        return Err(Error::RestrictedUrl(url.to_string()));
    }
    Ok(())
}

/// Host of `url` with every character outside `[A-Za-z0-9]` replaced by `-`
///
/// Falls back to `page` for URLs without a host (files, data URLs, garbage).
pub fn domain_slug(url: &str) -> String {
    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .filter(|h| !h.is_empty());
    match host {
        Some(h) => h
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect(),
        None => "page".to_string(),
    }
}

/// `2024-05-01T12-00-00`: ISO-8601 UTC to the second, filename-safe
pub fn timestamp_slug(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H-%M-%S").to_string()
}

/// Image file name, e.g. `fullpage-screenshot-example-com-2024-05-01T12-00-00.png`
pub fn screenshot_filename(kind: CaptureKind, url: &str, format: OutputFormat, at: DateTime<Utc>) -> String {
    format!(
        "{}-{}-{}.{}",
        kind.prefix(),
        domain_slug(url),
        timestamp_slug(at),
        format.extension()
    )
}

/// Archive file name for a responsive capture bundle
pub fn archive_filename(url: &str, at: DateTime<Utc>) -> String {
    format!(
        "{}-{}-{}.zip",
        CaptureKind::Responsive.prefix(),
        domain_slug(url),
        timestamp_slug(at)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 3, 9).unwrap()
    }

    #[test]
    fn restricted_pages() {
        assert!(is_restricted_url("chrome://settings"));
        assert!(is_restricted_url("chrome-extension://abc/popup.html"));
        assert!(is_restricted_url("edge://flags"));
        assert!(is_restricted_url("about:blank"));
        assert!(!is_restricted_url("https://example.com/about:blank"));
        assert!(matches!(ensure_capturable("about:blank"), Err(Error::RestrictedUrl(_))));
        assert!(ensure_capturable("https://example.com").is_ok());
    }

    #[test]
    fn domain_is_slugged() {
        assert_eq!(domain_slug("https://www.example.co.uk/path?q=1"), "www-example-co-uk");
        assert_eq!(domain_slug("http://localhost:8080/"), "localhost");
        assert_eq!(domain_slug("http://127.0.0.1/"), "127-0-0-1");
        assert_eq!(domain_slug("not a url"), "page");
        assert_eq!(domain_slug("file:///tmp/x.html"), "page");
    }

    #[test]
    fn filenames() {
        assert_eq!(
            screenshot_filename(CaptureKind::FullPage, "https://example.com", OutputFormat::Png, at()),
            "fullpage-screenshot-example-com-2024-05-01T12-03-09.png"
        );
        assert_eq!(
            screenshot_filename(CaptureKind::Visible, "https://example.com", OutputFormat::Jpeg, at()),
            "screenshot-example-com-2024-05-01T12-03-09.jpg"
        );
        assert_eq!(
            archive_filename("https://example.com", at()),
            "responsive-screenshots-example-com-2024-05-01T12-03-09.zip"
        );
    }
}
