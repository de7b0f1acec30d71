//! The top-level PDF renderer view.
//!
//! [`PdfRendererView`] lives on the UI context. Downloads and page renders
//! run on a [`BackgroundPool`]; they never touch the view directly but post
//! messages to its inbox, which the host drains with [`PdfRendererView::pump`].
//! Every background task is registered in the view's [`TaskScope`], so a new
//! document, [`close`](PdfRendererView::close), [`detach`](PdfRendererView::detach)
//! or drop cancels whatever is still outstanding.

use crate::adapter::{Binding, Delivery, PageListAdapter, PageRequest, RowId, RowState};
use crate::config::ViewerConfig;
use crate::error::{ViewError, ViewResult};
use crate::events::{StatusListener, ViewEvent};
use crate::transform::{Transform, TransformController, TouchEvent};
use flume::{Receiver, Sender};
use pdf_viewer_cache::{CacheStats, PageBitmap};
use pdf_viewer_download::{DownloadError, DownloadProgress, Downloader};
use pdf_viewer_render::{default_engine, PageRenderer, PdfEngine, RenderError};
use pdf_viewer_scheduler::{BackgroundPool, TaskScope};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Messages posted by background tasks to the UI context
enum UiMessage {
    DownloadProgress {
        epoch: u64,
        progress: DownloadProgress,
    },
    DownloadFinished {
        epoch: u64,
        result: Result<PathBuf, DownloadError>,
    },
    PageRendered {
        request: PageRequest,
        result: Result<Arc<PageBitmap>, RenderError>,
    },
}

/// Headless PDF page list with download, rendering and pan/zoom
///
/// # Example
///
/// ```no_run
/// use pdf_viewer_core::{PdfRendererView, ViewEvent, ViewerConfig};
/// use std::time::Duration;
///
/// let mut view = PdfRendererView::new(ViewerConfig::default())?;
/// view.set_status_listener(|event: &ViewEvent| println!("{event:?}"));
/// view.load_url("https://example.com/manual.pdf");
///
/// // Drive the view from the host's event loop.
/// while view.is_busy() {
///     view.pump_timeout(Duration::from_millis(50));
/// }
/// # Ok::<(), pdf_viewer_core::ViewError>(())
/// ```
pub struct PdfRendererView {
    config: ViewerConfig,
    renderer: Arc<PageRenderer>,
    adapter: PageListAdapter,
    transform: TransformController,
    downloader: Arc<Downloader>,
    pool: BackgroundPool,
    scope: TaskScope,
    sender: Sender<UiMessage>,
    inbox: Receiver<UiMessage>,
    listener: Option<Box<dyn StatusListener>>,
    file_path: Option<PathBuf>,
    attached: bool,
    /// Bumped whenever outstanding work is cancelled; download messages
    /// from an older epoch are dropped
    epoch: u64,
}

impl PdfRendererView {
    /// Create a view rendering through the default engine
    pub fn new(config: ViewerConfig) -> ViewResult<Self> {
        Self::with_engine(config, Box::new(default_engine()))
    }

    /// Create a view rendering through `engine`
    pub fn with_engine(config: ViewerConfig, engine: Box<dyn PdfEngine + Send>) -> ViewResult<Self> {
        config.validate()?;

        let renderer = Arc::new(PageRenderer::new(engine));
        let adapter = PageListAdapter::new(renderer.clone(), config.render_scale);
        let transform = TransformController::new(config.min_scale, config.max_scale);
        let downloader = Arc::new(Downloader::new(&config.download_config()));
        let pool = BackgroundPool::new(config.pool_config())?;
        let (sender, inbox) = flume::unbounded();

        Ok(Self {
            config,
            renderer,
            adapter,
            transform,
            downloader,
            pool,
            scope: TaskScope::new(),
            sender,
            inbox,
            listener: None,
            file_path: None,
            attached: true,
            epoch: 0,
        })
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Set the receiver of status events, replacing any previous one
    pub fn set_status_listener<L>(&mut self, listener: L)
    where
        L: StatusListener + 'static,
    {
        self.listener = Some(Box::new(listener));
    }

    pub fn clear_status_listener(&mut self) {
        self.listener = None;
    }

    /// Download `url` into the cache file, then open it
    ///
    /// Emits `DownloadProgress(Percent(0))` right away. Progress, success
    /// and errors are delivered from [`pump`](Self::pump).
    pub fn load_url(&mut self, url: &str) {
        self.emit(ViewEvent::DownloadProgress(DownloadProgress::Percent(0)));
        self.cancel_outstanding();

        let dest = self.config.cache_file_path();
        let epoch = self.epoch;
        let url = url.to_string();
        let downloader = self.downloader.clone();
        let sender = self.sender.clone();
        let (task_id, token) = self.scope.register();
        let guard = self.scope.finish_on_drop(task_id);

        log::debug!("scheduling download of {}", url);

        let submitted = self.pool.submit(token, move |token| {
            let _guard = guard;
            let result = downloader
                .download(&url, &dest, token, |progress| {
                    let _ = sender.send(UiMessage::DownloadProgress { epoch, progress });
                })
                .map(|download| download.path);
            let _ = sender.send(UiMessage::DownloadFinished { epoch, result });
        });

        if !submitted {
            self.emit(ViewEvent::Error(ViewError::PoolClosed));
        }
    }

    /// Open a local document
    ///
    /// Returns the page count. A document that fails to open also emits
    /// [`ViewEvent::Error`] and leaves the list empty.
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> ViewResult<u32> {
        let path = path.as_ref();
        self.cancel_outstanding();
        self.file_path = Some(path.to_path_buf());

        let opened = self.renderer.open(path);
        self.adapter.reset();
        self.transform.reset();

        match opened {
            Ok(page_count) => Ok(page_count),
            Err(err) => {
                log::warn!("failed to open {}: {}", path.display(), err);
                self.emit(ViewEvent::Error(ViewError::Render(err.clone())));
                Err(err.into())
            }
        }
    }

    /// Path of the last document loaded, local or downloaded
    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Close the document; the list becomes empty
    pub fn close(&mut self) {
        self.cancel_outstanding();
        self.renderer.close();
        self.adapter.reset();
        self.transform.reset();
    }

    pub fn is_open(&self) -> bool {
        self.renderer.is_open()
    }

    pub fn item_count(&self) -> u32 {
        self.adapter.item_count()
    }

    /// Bind a row slot to a page
    ///
    /// A cached page is shown immediately; otherwise the page is rendered in
    /// the background and shown during a later [`pump`](Self::pump).
    pub fn bind_row(&mut self, row: RowId, page: u32) -> ViewResult<()> {
        match self.adapter.bind(row, page)? {
            Binding::Revealed { first_display } => {
                if first_display {
                    self.emit(ViewEvent::Display);
                }
            }
            Binding::Pending(request) => self.schedule_render(request),
        }
        Ok(())
    }

    /// Forget a row slot the host stopped showing
    pub fn recycle_row(&mut self, row: RowId) {
        self.adapter.recycle(row);
    }

    pub fn row(&self, row: RowId) -> Option<&RowState> {
        self.adapter.row(row)
    }

    /// Apply every message posted by background work
    ///
    /// Returns the number of messages handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.inbox.try_recv() {
            self.handle(message);
            handled += 1;
        }
        handled
    }

    /// Wait up to `timeout` for background work, then [`pump`](Self::pump)
    pub fn pump_timeout(&mut self, timeout: Duration) -> usize {
        match self.inbox.recv_timeout(timeout) {
            Ok(message) => {
                self.handle(message);
                1 + self.pump()
            }
            Err(_) => 0,
        }
    }

    /// Whether background work is still outstanding or undelivered
    pub fn is_busy(&self) -> bool {
        !self.scope.is_empty() || !self.inbox.is_empty()
    }

    /// Resume delivering events
    ///
    /// Rows left hidden by [`detach`](Self::detach) are bound again, so
    /// their pages are revealed from the cache or rendered anew.
    pub fn attach(&mut self) {
        if self.attached {
            return;
        }
        self.attached = true;

        for (row, page) in self.adapter.hidden_rows() {
            if let Err(err) = self.bind_row(row, page) {
                log::warn!("failed to rebind row {} to page {}: {}", row, page, err);
            }
        }
    }

    /// Cancel all background work and stop delivering events
    ///
    /// Bound rows are kept; [`attach`](Self::attach) resumes their renders.
    pub fn detach(&mut self) {
        self.cancel_outstanding();
        self.attached = false;
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn set_view_size(&mut self, width: f32, height: f32) {
        self.transform.set_view_size(width, height);
    }

    pub fn on_touch_event(&mut self, event: &TouchEvent) -> bool {
        self.transform.on_touch_event(event)
    }

    /// Pinch update from the host's gesture recognizer
    pub fn on_scale(&mut self, factor: f32, focus_x: f32, focus_y: f32) -> bool {
        self.transform.on_scale(factor, focus_x, focus_y)
    }

    /// Transform to apply to the page list for this frame
    pub fn draw(&mut self) -> Transform {
        self.transform.draw()
    }

    pub fn transform(&self) -> &TransformController {
        &self.transform
    }

    pub fn renderer(&self) -> &Arc<PageRenderer> {
        &self.renderer
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.renderer.cache_stats()
    }

    fn schedule_render(&mut self, request: PageRequest) {
        let renderer = self.renderer.clone();
        let sender = self.sender.clone();
        let (task_id, token) = self.scope.register();
        let guard = self.scope.finish_on_drop(task_id);

        let submitted = self.pool.submit(token, move |token| {
            let _guard = guard;
            if !token.is_cancelled() {
                let result = renderer.render_page(request.page, request.scale);
                let _ = sender.send(UiMessage::PageRendered { request, result });
            }
        });

        if !submitted {
            self.emit(ViewEvent::Error(ViewError::PoolClosed));
        }
    }

    fn handle(&mut self, message: UiMessage) {
        if !self.attached {
            return;
        }

        match message {
            UiMessage::DownloadProgress { epoch, progress } => {
                if epoch == self.epoch {
                    self.emit(ViewEvent::DownloadProgress(progress));
                }
            }
            UiMessage::DownloadFinished { epoch, result } => {
                if epoch != self.epoch {
                    return;
                }
                match result {
                    Ok(path) => {
                        if self.load_file(&path).is_ok() {
                            self.emit(ViewEvent::DownloadSuccess);
                        }
                    }
                    Err(DownloadError::Cancelled) => log::debug!("download cancelled"),
                    Err(err) => {
                        log::warn!("download failed: {}", err);
                        self.emit(ViewEvent::Error(err.into()));
                    }
                }
            }
            UiMessage::PageRendered { request, result } => {
                match self.adapter.deliver(request, result) {
                    Delivery::Revealed { first_display: true } => self.emit(ViewEvent::Display),
                    Delivery::Revealed { .. } => {}
                    Delivery::Stale => {
                        log::debug!("dropped stale render of page {}", request.page)
                    }
                    Delivery::Failed(err) => self.emit(ViewEvent::Error(err.into())),
                }
            }
        }
    }

    fn cancel_outstanding(&mut self) {
        self.scope.cancel_all();
        self.epoch += 1;
        let dropped = self.inbox.drain().count();
        if dropped > 0 {
            log::debug!("discarded {} pending message(s)", dropped);
        }
    }

    fn emit(&mut self, event: ViewEvent) {
        if !self.attached {
            return;
        }
        if let Some(listener) = self.listener.as_mut() {
            listener.on_event(&event);
        }
    }
}

impl Drop for PdfRendererView {
    fn drop(&mut self) {
        self.scope.cancel_all();
    }
}
