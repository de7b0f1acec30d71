//! Row binding for the virtual page list.
//!
//! The host owns a small pool of recycled row slots and asks the adapter to
//! bind a slot to a page. The adapter hides the row, serves the page from
//! the bitmap cache when it can, and otherwise hands back a [`PageRequest`]
//! to be rendered in the background. The result comes back through
//! [`PageListAdapter::deliver`] on the UI context.

use pdf_viewer_cache::PageBitmap;
use pdf_viewer_render::{PageRenderer, RenderError};
use std::collections::HashMap;
use std::sync::Arc;

/// Host-chosen identifier of a recycled row slot
pub type RowId = usize;

/// What a row currently shows
#[derive(Debug, Clone)]
pub struct RowState {
    pub page: u32,
    pub visible: bool,
    pub bitmap: Option<Arc<PageBitmap>>,
}

/// A page that must be rendered before a row can be revealed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRequest {
    pub row: RowId,
    pub page: u32,
    pub scale: f32,
    /// Document generation the request was made for
    pub generation: u64,
}

/// Outcome of [`PageListAdapter::bind`]
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// The page was cached and the row is already visible
    Revealed { first_display: bool },
    /// The row stays hidden until the request is rendered and delivered
    Pending(PageRequest),
}

/// Outcome of [`PageListAdapter::deliver`]
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Revealed { first_display: bool },
    /// The row was rebound or the document replaced; the result was dropped
    Stale,
    Failed(RenderError),
}

/// Adapter between the page list and the renderer
pub struct PageListAdapter {
    renderer: Arc<PageRenderer>,
    render_scale: f32,
    item_count: u32,
    generation: u64,
    rows: HashMap<RowId, RowState>,
    displayed: bool,
}

impl PageListAdapter {
    pub fn new(renderer: Arc<PageRenderer>, render_scale: f32) -> Self {
        Self {
            renderer,
            render_scale,
            item_count: 0,
            generation: 0,
            rows: HashMap::new(),
            displayed: false,
        }
    }

    /// Number of rows in the list: the open document's page count
    pub fn item_count(&self) -> u32 {
        self.item_count
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn render_scale(&self) -> f32 {
        self.render_scale
    }

    /// Reset after the renderer opened or closed a document
    ///
    /// Every row is forgotten and the first-display signal is re-armed.
    pub fn reset(&mut self) {
        self.item_count = self.renderer.page_count();
        self.generation = self.renderer.generation();
        self.rows.clear();
        self.displayed = false;
        log::debug!(
            "page list reset to {} item(s), generation {}",
            self.item_count,
            self.generation
        );
    }

    /// Bind `row` to `page`
    ///
    /// The row is hidden first. If the page is cached at the render scale
    /// it is revealed immediately; otherwise the returned request must be
    /// rendered and passed to [`deliver`](Self::deliver).
    pub fn bind(&mut self, row: RowId, page: u32) -> Result<Binding, RenderError> {
        if page >= self.item_count {
            return Err(if self.item_count == 0 && !self.renderer.is_open() {
                RenderError::NoDocument
            } else {
                RenderError::PageOutOfRange {
                    page,
                    page_count: self.item_count,
                }
            });
        }

        self.rows.insert(
            row,
            RowState {
                page,
                visible: false,
                bitmap: None,
            },
        );

        if let Some(bitmap) = self.renderer.cached_at(page, self.render_scale) {
            let first_display = self.reveal(row, bitmap);
            return Ok(Binding::Revealed { first_display });
        }

        Ok(Binding::Pending(PageRequest {
            row,
            page,
            scale: self.render_scale,
            generation: self.generation,
        }))
    }

    /// Apply a finished render
    pub fn deliver(
        &mut self,
        request: PageRequest,
        result: Result<Arc<PageBitmap>, RenderError>,
    ) -> Delivery {
        if request.generation != self.generation {
            return Delivery::Stale;
        }
        match self.rows.get(&request.row) {
            Some(state) if state.page == request.page => {}
            _ => return Delivery::Stale,
        }

        match result {
            Ok(bitmap) => Delivery::Revealed {
                first_display: self.reveal(request.row, bitmap),
            },
            Err(err) => {
                log::warn!("page {} failed to render: {}", request.page, err);
                Delivery::Failed(err)
            }
        }
    }

    /// Forget a row the host no longer shows
    pub fn recycle(&mut self, row: RowId) -> Option<RowState> {
        self.rows.remove(&row)
    }

    pub fn row(&self, row: RowId) -> Option<&RowState> {
        self.rows.get(&row)
    }

    /// Rows still waiting for their page, ordered by row id
    pub fn hidden_rows(&self) -> Vec<(RowId, u32)> {
        let mut hidden: Vec<_> = self
            .rows
            .iter()
            .filter(|(_, state)| !state.visible)
            .map(|(&row, state)| (row, state.page))
            .collect();
        hidden.sort_unstable();
        hidden
    }

    /// Whether the first page has been shown for the current document
    pub fn has_displayed(&self) -> bool {
        self.displayed
    }

    fn reveal(&mut self, row: RowId, bitmap: Arc<PageBitmap>) -> bool {
        let Some(state) = self.rows.get_mut(&row) else {
            return false;
        };
        state.visible = true;
        state.bitmap = Some(bitmap);

        if state.page == 0 && !self.displayed {
            self.displayed = true;
            return true;
        }
        false
    }
}
