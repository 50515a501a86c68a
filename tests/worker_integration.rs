//! Async capture worker: serialized requests and bounded waits

use hihat_capture::synthetic::SyntheticPage;
use hihat_capture::{CaptureConfig, CaptureWorker, Error, PageMetrics, PageSurface, Result, Viewport};
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn config() -> CaptureConfig {
    CaptureConfig {
        settle_delay_ms: 0,
        ..Default::default()
    }
}

/// Wraps a synthetic page, sleeping on capture and tracking overlap
struct SlowPage {
    inner: SyntheticPage,
    capture_delay: Duration,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl PageSurface for SlowPage {
    fn metrics(&self) -> Result<PageMetrics> {
        self.inner.metrics()
    }

    fn scroll_to(&mut self, y: u32) -> Result<()> {
        self.inner.scroll_to(y)
    }

    fn capture_viewport(&mut self) -> Result<Vec<u8>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.capture_delay);
        let res = self.inner.capture_viewport();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        res
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.inner.set_viewport(viewport)
    }
}

#[tokio::test]
async fn full_page_through_worker() {
    let worker = CaptureWorker::spawn(config(), |_| Ok(SyntheticPage::new(50, 100, 250)))
        .await
        .unwrap();
    let metrics = worker.metrics().await.unwrap();
    assert_eq!(metrics.total_height, 250);

    let image = worker.capture_full_page().await.unwrap();
    assert_eq!((image.width, image.height), (50, 250));

    let visible = worker.capture_visible().await.unwrap();
    assert_eq!(visible.height, 100);

    worker.close().await.unwrap();
}

#[tokio::test]
async fn responsive_archive_through_worker() {
    let cfg = CaptureConfig {
        presets: vec![hihat_capture::ViewportPreset::new("a", 30, 40)],
        ..config()
    };
    let worker = CaptureWorker::spawn(cfg, |_| Ok(SyntheticPage::new(50, 100, 90)))
        .await
        .unwrap();
    let bundle = worker.capture_responsive().await.unwrap();
    let mut archive = zip::ZipArchive::new(Cursor::new(bundle)).unwrap();
    let mut file = archive.by_name("a-30x40.png").unwrap();
    let mut png = Vec::new();
    file.read_to_end(&mut png).unwrap();
    assert_eq!(image::load_from_memory(&png).unwrap().height(), 90);
}

#[tokio::test]
async fn concurrent_requests_never_overlap() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_in_flight = Arc::new(AtomicUsize::new(0));
    let (a, b) = (in_flight.clone(), max_in_flight.clone());
    let worker = CaptureWorker::spawn(config(), move |_| {
        Ok(SlowPage {
            inner: SyntheticPage::new(20, 50, 120),
            capture_delay: Duration::from_millis(5),
            in_flight: a,
            max_in_flight: b,
        })
    })
    .await
    .unwrap();

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let w = worker.clone();
        tasks.push(tokio::spawn(async move { w.capture_full_page().await }));
    }
    for t in tasks {
        let image = t.await.unwrap().unwrap();
        assert_eq!(image.height, 120);
    }
    assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stalled_capture_times_out() {
    let cfg = CaptureConfig {
        operation_timeout_ms: 50,
        ..config()
    };
    let worker = CaptureWorker::spawn(cfg, |_| {
        Ok(SlowPage {
            inner: SyntheticPage::new(20, 50, 120),
            capture_delay: Duration::from_millis(200),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        })
    })
    .await
    .unwrap();

    match worker.capture_full_page().await {
        Err(Error::Timeout(ms)) => assert_eq!(ms, 50),
        other => panic!("expected timeout, got {:?}", other.map(|i| i.height)),
    }
}
