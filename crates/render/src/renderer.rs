//! Serialized page rendering with a per-document bitmap cache
//!
//! [`PageRenderer`] is the single access point to the open document. Every
//! call that touches the engine (open, close, page count, page size,
//! rasterization) goes through one mutex, so background workers can request
//! pages concurrently without ever driving the engine from two threads.

use crate::engine::{DocumentSource, EngineError, PageGeometry, PdfEngine};
use pdf_viewer_cache::{BitmapCache, CacheStats, PageBitmap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Two scales closer than this are treated as the same render scale
const SCALE_EPSILON: f32 = 1e-4;

/// Errors surfaced by [`PageRenderer`]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("no document open")]
    NoDocument,
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("failed to open document: {0}")]
    Open(String),
    #[error("failed to render page {page}: {reason}")]
    Render { page: u32, reason: String },
    #[error("invalid render scale {0}")]
    InvalidScale(f32),
}

impl RenderError {
    fn from_engine(page: u32, err: EngineError) -> Self {
        match err {
            EngineError::PageOutOfRange { page, page_count } => {
                RenderError::PageOutOfRange { page, page_count }
            }
            other => RenderError::Render {
                page,
                reason: other.to_string(),
            },
        }
    }
}

struct OpenDocument {
    page_count: u32,
    source: Option<PathBuf>,
}

struct RendererState {
    engine: Box<dyn PdfEngine + Send>,
    document: Option<OpenDocument>,
}

impl RendererState {
    fn document(&self) -> Result<&OpenDocument, RenderError> {
        self.document.as_ref().ok_or(RenderError::NoDocument)
    }

    fn close_current(&mut self) -> bool {
        if self.document.take().is_none() {
            return false;
        }
        self.unload_engine();
        true
    }

    fn unload_engine(&mut self) {
        if let Err(err) = self.engine.unload() {
            log::warn!("unloading document failed: {}", err);
        }
    }
}

/// Page renderer owning the open document and the bitmap cache
///
/// # Example
///
/// ```
/// use pdf_viewer_render::{default_engine, PageRenderer, RenderError};
///
/// let renderer = PageRenderer::new(Box::new(default_engine()));
/// assert_eq!(renderer.page_count(), 0);
/// assert_eq!(renderer.render_page(0, 1.0).unwrap_err(), RenderError::NoDocument);
/// ```
pub struct PageRenderer {
    state: Mutex<RendererState>,
    cache: BitmapCache,
    generation: AtomicU64,
}

impl PageRenderer {
    pub fn new(engine: Box<dyn PdfEngine + Send>) -> Self {
        Self {
            state: Mutex::new(RendererState {
                engine,
                document: None,
            }),
            cache: BitmapCache::new(),
            generation: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RendererState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a document from a file, replacing the current one
    ///
    /// Returns the new document's page count.
    pub fn open(&self, path: &Path) -> Result<u32, RenderError> {
        self.open_source(DocumentSource::from(path))
    }

    /// Open a document from a path or in-memory bytes, replacing the current one
    ///
    /// The previous document is unloaded and the cache cleared before the
    /// new document is parsed, so a failed open leaves no document open.
    pub fn open_source(&self, source: DocumentSource) -> Result<u32, RenderError> {
        let path = match &source {
            DocumentSource::File(path) => Some(path.clone()),
            DocumentSource::Memory(_) => None,
        };

        let mut state = self.lock();
        state.close_current();
        self.cache.clear();
        self.generation.fetch_add(1, Ordering::AcqRel);

        state
            .engine
            .load(source)
            .map_err(|err| RenderError::Open(err.to_string()))?;
        let page_count = match state.engine.page_count() {
            Ok(count) => count,
            Err(err) => {
                state.unload_engine();
                return Err(RenderError::Open(err.to_string()));
            }
        };

        log::info!(
            "opened {} ({} page(s))",
            path.as_deref()
                .map_or_else(|| "in-memory document".to_string(), |p| p.display().to_string()),
            page_count
        );

        state.document = Some(OpenDocument {
            page_count,
            source: path,
        });
        Ok(page_count)
    }

    /// Unload the document and drop every cached bitmap
    ///
    /// Returns `false` if no document was open.
    pub fn close(&self) -> bool {
        let mut state = self.lock();
        let closed = state.close_current();
        self.cache.clear();
        if closed {
            self.generation.fetch_add(1, Ordering::AcqRel);
            log::debug!("closed document");
        }
        closed
    }

    /// Check if a document is open
    pub fn is_open(&self) -> bool {
        self.lock().document.is_some()
    }

    /// Page count of the open document, 0 when none is open
    pub fn page_count(&self) -> u32 {
        self.lock().document.as_ref().map_or(0, |doc| doc.page_count)
    }

    /// Path of the open document, if it was opened from a file
    pub fn source_path(&self) -> Option<PathBuf> {
        self.lock()
            .document
            .as_ref()
            .and_then(|doc| doc.source.clone())
    }

    /// Counter bumped on every open and close
    ///
    /// Work started against one generation can compare it later to detect
    /// that the document it rendered for is gone.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Size of a page in points
    pub fn page_size(&self, page_index: u32) -> Result<PageGeometry, RenderError> {
        let state = self.lock();
        check_bounds(page_index, state.document()?.page_count)?;
        state
            .engine
            .geometry(page_index)
            .map_err(|err| RenderError::from_engine(page_index, err))
    }

    /// Render a page at `scale`× its native size
    ///
    /// Returns the cached bitmap when the page was already rendered at this
    /// scale. Otherwise the page is rasterized under the document lock and
    /// cached; a page already cached at another scale is rendered fresh and
    /// returned without replacing the cached entry.
    pub fn render_page(&self, page_index: u32, scale: f32) -> Result<Arc<PageBitmap>, RenderError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(RenderError::InvalidScale(scale));
        }

        let mut state = self.lock();
        check_bounds(page_index, state.document()?.page_count)?;

        let cached = self.cache.get(page_index);
        if let Some(bitmap) = &cached {
            if (bitmap.scale - scale).abs() < SCALE_EPSILON {
                return Ok(bitmap.clone());
            }
        }

        let image = state
            .engine
            .rasterize(page_index, scale)
            .map_err(|err| RenderError::from_engine(page_index, err))?;
        let bitmap = PageBitmap::new(page_index, scale, image);

        log::debug!(
            "rendered page {} at {}x{} (scale {})",
            page_index,
            bitmap.width(),
            bitmap.height(),
            scale
        );

        match cached {
            Some(_) => Ok(Arc::new(bitmap)),
            None => Ok(self.cache.insert(bitmap)),
        }
    }

    /// Cached bitmap for a page, without rendering
    pub fn cached(&self, page_index: u32) -> Option<Arc<PageBitmap>> {
        self.cache.peek(page_index)
    }

    /// Cached bitmap for a page if it was rendered at `scale`
    pub fn cached_at(&self, page_index: u32, scale: f32) -> Option<Arc<PageBitmap>> {
        self.cache
            .peek(page_index)
            .filter(|bitmap| (bitmap.scale - scale).abs() < SCALE_EPSILON)
    }

    /// Statistics of the page cache
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

fn check_bounds(page_index: u32, page_count: u32) -> Result<(), RenderError> {
    if page_index >= page_count {
        return Err(RenderError::PageOutOfRange {
            page: page_index,
            page_count,
        });
    }
    Ok(())
}
