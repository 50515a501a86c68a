use crate::capture::{PagedCapture, StitchedImage};
use crate::responsive::ResponsiveCapture;
use crate::{CaptureConfig, Error, PageMetrics, PageSurface, Result};
use log::{debug, warn};
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;

enum Command {
    Metrics(oneshot::Sender<Result<PageMetrics>>),
    CaptureVisible(oneshot::Sender<Result<StitchedImage>>),
    CaptureFullPage(oneshot::Sender<Result<StitchedImage>>),
    CaptureResponsive(oneshot::Sender<Result<Vec<u8>>>),
    Close(oneshot::Sender<Result<()>>),
}

/// An async-friendly capture queue backed by a dedicated worker thread.
///
/// The worker thread owns the page surface and executes commands one at a
/// time, so captures against the same page never overlap even when many
/// async tasks share a handle. The surface itself never crosses threads; it
/// is built on the worker by the factory passed to [`CaptureWorker::spawn`].
///
/// Building the surface and every request are bounded by
/// `operation_timeout_ms`. A request that times out returns
/// [`Error::Timeout`] to its caller; the worker still finishes it (restoring
/// scroll state) before taking the next command.
#[derive(Clone)]
pub struct CaptureWorker {
    cmd_tx: Sender<Command>,
    timeout: Duration,
}

impl CaptureWorker {
    /// Spawn the worker thread and build the surface on it.
    ///
    /// If the factory is still running when the timeout elapses, the thread
    /// is left to exit on its own once it does.
    pub async fn spawn<S, F>(config: CaptureConfig, make_surface: F) -> Result<Self>
    where
        S: PageSurface + 'static,
        F: FnOnce(&CaptureConfig) -> Result<S> + Send + 'static,
    {
        config.validate()?;
        let timeout = Duration::from_millis(config.operation_timeout_ms);

        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx) = oneshot::channel::<Result<()>>();

        thread::spawn(move || {
            let mut surface = match make_surface(&config) {
                Ok(s) => s,
                Err(err) => {
                    let _ = init_tx.send(Err(err));
                    return;
                }
            };
            let _ = init_tx.send(Ok(()));

            let paged = PagedCapture::new(config.clone());
            let responsive = ResponsiveCapture::new(config);

            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    Command::Metrics(resp) => {
                        let _ = resp.send(surface.metrics());
                    }
                    Command::CaptureVisible(resp) => {
                        let _ = resp.send(paged.capture_visible(&mut surface));
                    }
                    Command::CaptureFullPage(resp) => {
                        let res = paged.capture_full_page(&mut surface);
                        if resp.send(res).is_err() {
                            debug!("full-page capture finished after its caller gave up");
                        }
                    }
                    Command::CaptureResponsive(resp) => {
                        let res = responsive.capture_archive(&mut surface);
                        if resp.send(res).is_err() {
                            debug!("responsive capture finished after its caller gave up");
                        }
                    }
                    Command::Close(resp) => {
                        let _ = resp.send(Ok(()));
                        break;
                    }
                }
            }
            debug!("capture worker exiting");
        });

        let init_res = match tokio::time::timeout(timeout, init_rx).await {
            Ok(res) => res.map_err(|e| Error::Other(format!("Worker init canceled: {}", e)))?,
            Err(_) => {
                warn!("surface setup exceeded {:?}", timeout);
                return Err(Error::Timeout(timeout.as_millis() as u64));
            }
        };
        init_res?;

        Ok(Self { cmd_tx, timeout })
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<Result<T>>) -> Command, what: &str) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .map_err(|_| Error::Other(format!("{}: worker is closed", what)))?;
        match tokio::time::timeout(self.timeout, rx).await {
            Ok(res) => res.map_err(|e| Error::Other(format!("{} canceled: {}", what, e)))?,
            Err(_) => {
                warn!("{} exceeded {:?}", what, self.timeout);
                Err(Error::Timeout(self.timeout.as_millis() as u64))
            }
        }
    }

    /// Measure the page
    pub async fn metrics(&self) -> Result<PageMetrics> {
        self.request(Command::Metrics, "Metrics").await
    }

    /// Capture the visible viewport only
    pub async fn capture_visible(&self) -> Result<StitchedImage> {
        self.request(Command::CaptureVisible, "CaptureVisible").await
    }

    /// Capture the whole page, stitched
    pub async fn capture_full_page(&self) -> Result<StitchedImage> {
        self.request(Command::CaptureFullPage, "CaptureFullPage").await
    }

    /// Capture every configured preset and return the ZIP archive bytes
    pub async fn capture_responsive(&self) -> Result<Vec<u8>> {
        self.request(Command::CaptureResponsive, "CaptureResponsive").await
    }

    /// Shut the worker down once queued commands have run.
    pub async fn close(self) -> Result<()> {
        self.request(Command::Close, "Close").await
    }
}
