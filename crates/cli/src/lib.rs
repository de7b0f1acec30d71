use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pdf_viewer_core::{DownloadProgress, PdfRendererView, ViewEvent, ViewerConfig};
use pdf_viewer_download::Downloader;
use pdf_viewer_render::{default_engine, PageRenderer, PdfEngine};
use pdf_viewer_scheduler::CancellationToken;
use serde::Serialize;
use std::cell::RefCell;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

const PUMP_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Parser)]
#[command(name = "pdf-viewer")]
#[command(about = "Headless PDF renderer view")]
pub struct Cli {
    /// Viewer configuration file (TOML). Defaults to environment variables.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Render pages of a local file or URL to PNG files.
    Render {
        #[arg(value_name = "SOURCE")]
        source: String,
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
        #[arg(long)]
        scale: Option<f32>,
        /// 1-based page numbers, comma separated. Defaults to every page.
        #[arg(long, value_delimiter = ',')]
        pages: Vec<u32>,
    },
    /// Download a PDF to a local file.
    Fetch {
        #[arg(value_name = "URL")]
        url: String,
        #[arg(long)]
        output: PathBuf,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    first_page_size_pt: Option<PageSizeOutput>,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::Render {
            source,
            output_dir,
            scale,
            pages,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(scale) = scale {
                config = config.with_render_scale(scale);
            }
            run_render(config, &source, &output_dir, &pages)
        }
        Commands::Fetch { url, output } => {
            let config = load_config(cli.config.as_deref())?;
            run_fetch(&config, &url, &output)
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ViewerConfig> {
    match path {
        Some(path) => ViewerConfig::from_file(path)
            .and_then(ViewerConfig::merge_env)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => ViewerConfig::from_env().context("invalid configuration in environment"),
    }
}

/// Engine for the current build: PDFium when compiled in and loadable
#[cfg(feature = "pdfium")]
fn engine() -> Box<dyn PdfEngine + Send> {
    match pdf_viewer_render::PdfiumEngine::new() {
        Ok(engine) => Box::new(engine),
        Err(err) => {
            log::warn!("{err}; falling back to the built-in engine");
            Box::new(default_engine())
        }
    }
}

#[cfg(not(feature = "pdfium"))]
fn engine() -> Box<dyn PdfEngine + Send> {
    Box::new(default_engine())
}

fn run_info(file: &Path) -> Result<()> {
    ensure_pdf_exists(file)?;

    let renderer = PageRenderer::new(engine());
    let page_count = renderer.open(file).context("failed to open PDF")?;
    let first_page_size_pt = if page_count > 0 {
        let size = renderer.page_size(0)?;
        Some(PageSizeOutput {
            width: size.width_pt,
            height: size.height_pt,
        })
    } else {
        None
    };

    let payload = InfoOutput {
        path: file.display().to_string(),
        page_count,
        first_page_size_pt,
    };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    renderer.close();

    Ok(())
}

fn run_render(config: ViewerConfig, source: &str, output_dir: &Path, pages: &[u32]) -> Result<()> {
    let mut view = PdfRendererView::with_engine(config, engine())?;

    let failure: Rc<RefCell<Option<String>>> = Rc::default();
    let sink = failure.clone();
    view.set_status_listener(move |event: &ViewEvent| match event {
        ViewEvent::DownloadProgress(progress) => log_progress(*progress),
        ViewEvent::DownloadSuccess => log::info!("download complete"),
        ViewEvent::Display => log::debug!("first page displayed"),
        ViewEvent::Error(err) => {
            sink.borrow_mut().get_or_insert_with(|| err.to_string());
        }
    });

    if is_remote(source) {
        view.load_url(source);
        drain(&mut view);
    } else {
        let path = Path::new(source);
        ensure_pdf_exists(path)?;
        view.load_file(path).context("failed to open PDF")?;
    }
    if let Some(err) = failure.borrow_mut().take() {
        anyhow::bail!("failed to load {source}: {err}");
    }

    let page_count = view.item_count();
    let pages: Vec<u32> = if pages.is_empty() {
        (1..=page_count).collect()
    } else {
        pages.to_vec()
    };
    for &page in &pages {
        if page == 0 || page > page_count {
            anyhow::bail!("page {page} is out of range (document has {page_count} page(s))");
        }
    }

    for &page in &pages {
        view.bind_row(page as usize, page - 1)?;
    }
    drain(&mut view);
    if let Some(err) = failure.borrow_mut().take() {
        anyhow::bail!("failed to render {source}: {err}");
    }

    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    for &page in &pages {
        let bitmap = view
            .row(page as usize)
            .and_then(|row| row.bitmap.clone())
            .with_context(|| format!("page {page} was not rendered"))?;
        let output = output_dir.join(format!("page-{page}.png"));
        bitmap
            .image
            .save(&output)
            .with_context(|| format!("failed to write image to {}", output.display()))?;
        println!("{}", output.display());
    }

    Ok(())
}

fn run_fetch(config: &ViewerConfig, url: &str, output: &Path) -> Result<()> {
    let downloader = Downloader::new(&config.download_config());
    let download = downloader
        .download(url, output, &CancellationToken::new(), log_progress)
        .with_context(|| format!("failed to download {url}"))?;

    println!("{}", download.path.display());
    Ok(())
}

fn drain(view: &mut PdfRendererView) {
    while view.is_busy() {
        view.pump_timeout(PUMP_INTERVAL);
    }
}

fn log_progress(progress: DownloadProgress) {
    match progress {
        DownloadProgress::Percent(percent) => log::info!("downloaded {percent}%"),
        DownloadProgress::Indeterminate { bytes_received } => {
            log::info!("downloaded {bytes_received} bytes")
        }
    }
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}
