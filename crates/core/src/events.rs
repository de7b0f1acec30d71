//! Events delivered to the host.

use crate::error::ViewError;
use pdf_viewer_download::DownloadProgress;

/// Status events emitted by a [`PdfRendererView`](crate::PdfRendererView)
///
/// Events are delivered on the UI context, from the operation that caused
/// them or from [`pump`](crate::PdfRendererView::pump).
#[derive(Debug)]
pub enum ViewEvent {
    /// Bytes arrived for a remote document
    DownloadProgress(DownloadProgress),
    /// The remote document is stored locally and has been opened
    DownloadSuccess,
    /// The first page was shown; fires once per opened document
    Display,
    Error(ViewError),
}

/// Receiver for [`ViewEvent`]s
///
/// Implemented for every `FnMut(&ViewEvent)`, so a closure can be passed
/// directly to [`set_status_listener`](crate::PdfRendererView::set_status_listener).
pub trait StatusListener {
    fn on_event(&mut self, event: &ViewEvent);
}

impl<F> StatusListener for F
where
    F: FnMut(&ViewEvent),
{
    fn on_event(&mut self, event: &ViewEvent) {
        self(event)
    }
}
