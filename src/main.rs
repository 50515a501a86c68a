use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use hihat_capture::naming::{self, CaptureKind};
use hihat_capture::synthetic::SyntheticPage;
use hihat_capture::{ArchiveEntry, CaptureConfig, CaptureWorker, OutputFormat, PageSurface, ViewportPreset, ZipWriter};
use log::info;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "hihat", version, about = "Full-page and responsive page capture")]
struct Cli {
    #[command(flatten)]
    opts: CommonOpts,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct CommonOpts {
    /// JSON config file; flags override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Delay between scrolling and capturing, in milliseconds
    #[arg(long, global = true)]
    settle_ms: Option<u64>,

    /// Output image format
    #[arg(long, global = true, value_enum)]
    format: Option<FormatArg>,

    /// Viewport preset for responsive capture, `label=WIDTHxHEIGHT` (repeatable)
    #[arg(long = "viewport", global = true)]
    viewports: Vec<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Png,
    Jpeg,
}

#[derive(Subcommand)]
enum Command {
    /// Bundle files into a STORE-only ZIP archive
    Zip {
        /// Archive to write
        #[arg(short, long)]
        output: PathBuf,
        /// Files to add; entries are named after the file name
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Capture a generated test page (no browser needed)
    Synthetic {
        #[arg(long, default_value_t = 800)]
        width: u32,
        #[arg(long, default_value_t = 600)]
        height: u32,
        #[arg(long, default_value_t = 1500)]
        page_height: u32,
        #[command(flatten)]
        mode: ModeArgs,
    },
    /// Capture a live page through headless Chrome
    #[cfg(feature = "cdp")]
    Capture {
        url: String,
        #[command(flatten)]
        mode: ModeArgs,
    },
}

#[derive(Args)]
struct ModeArgs {
    /// Capture the whole page instead of the visible viewport
    #[arg(long, conflicts_with = "responsive")]
    full_page: bool,
    /// Capture every viewport preset into a ZIP archive
    #[arg(long)]
    responsive: bool,
    /// Output path; defaults to a name derived from the page URL and time
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Print the image as a data URL instead of writing a file
    #[arg(long, conflicts_with_all = ["responsive", "output"])]
    data_url: bool,
}

fn load_config(opts: &CommonOpts) -> anyhow::Result<CaptureConfig> {
    let mut cfg = match &opts.config {
        Some(path) => CaptureConfig::from_json_file(path)?,
        None => CaptureConfig::default(),
    };
    if let Some(ms) = opts.settle_ms {
        cfg.settle_delay_ms = ms;
    }
    if let Some(f) = opts.format {
        cfg.format = match f {
            FormatArg::Png => OutputFormat::Png,
            FormatArg::Jpeg => OutputFormat::Jpeg,
        };
    }
    if !opts.viewports.is_empty() {
        cfg.presets = opts
            .viewports
            .iter()
            .map(|v| ViewportPreset::parse(v))
            .collect::<hihat_capture::Result<_>>()?;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn run_zip(output: &Path, files: &[PathBuf]) -> anyhow::Result<()> {
    let mut entries = Vec::with_capacity(files.len());
    for path in files {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("{} has no usable file name", path.display()))?;
        let content = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        entries.push(ArchiveEntry::new(name, content));
    }
    ZipWriter::new().write_to_path(output, &entries)?;
    info!("wrote {} ({} entries)", output.display(), entries.len());
    Ok(())
}

/// Run one capture on a worker thread so `operation_timeout_ms` bounds both
/// surface setup and the capture itself.
async fn run_capture<S, F>(cfg: CaptureConfig, url: &str, mode: &ModeArgs, make_surface: F) -> anyhow::Result<()>
where
    S: PageSurface + 'static,
    F: FnOnce(&CaptureConfig) -> hihat_capture::Result<S> + Send + 'static,
{
    let (format, quality) = (cfg.format, cfg.jpeg_quality);
    let worker = CaptureWorker::spawn(cfg, make_surface).await?;
    let now = chrono::Utc::now();

    if mode.responsive {
        let archive = worker.capture_responsive().await?;
        let out = mode
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(naming::archive_filename(url, now)));
        std::fs::write(&out, archive).with_context(|| format!("writing {}", out.display()))?;
        println!("{}", out.display());
        return worker.close().await.map_err(Into::into);
    }

    let (kind, image) = if mode.full_page {
        info!("Capturing full page...");
        (CaptureKind::FullPage, worker.capture_full_page().await?)
    } else {
        (CaptureKind::Visible, worker.capture_visible().await?)
    };
    worker.close().await?;

    if mode.data_url {
        println!("{}", image.to_data_url(format, quality)?);
        return Ok(());
    }
    let out = mode
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(naming::screenshot_filename(kind, url, format, now)));
    std::fs::write(&out, image.encode(format, quality)?).with_context(|| format!("writing {}", out.display()))?;
    println!("{}", out.display());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let cfg = load_config(&cli.opts)?;

    match cli.command {
        Command::Zip { output, files } => run_zip(&output, &files),
        Command::Synthetic {
            width,
            height,
            page_height,
            mode,
        } => {
            if width == 0 || height == 0 || page_height == 0 {
                bail!("synthetic page dimensions must be non-zero");
            }
            let url = "http://synthetic.local/";
            run_capture(cfg, url, &mode, move |_| {
                Ok(SyntheticPage::new(width, height, page_height).with_url(url))
            })
            .await
        }
        #[cfg(feature = "cdp")]
        Command::Capture { url, mode } => {
            naming::ensure_capturable(&url)?;
            let target = url.clone();
            run_capture(cfg, &url, &mode, move |cfg| {
                let mut surface = hihat_capture::cdp::CdpSurface::launch(cfg)?;
                surface.navigate(&target)?;
                Ok(surface)
            })
            .await
        }
    }
}
