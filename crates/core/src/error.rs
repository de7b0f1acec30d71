//! Errors surfaced by the viewer.

use crate::config::ConfigError;
use pdf_viewer_download::DownloadError;
use pdf_viewer_render::RenderError;

/// Errors reported by [`PdfRendererView`](crate::PdfRendererView) operations
/// and through [`ViewEvent::Error`](crate::ViewEvent::Error)
#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error("download failed: {0}")]
    Download(#[from] DownloadError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to start background workers: {0}")]
    Io(#[from] std::io::Error),
    #[error("background workers are shut down")]
    PoolClosed,
}

pub type ViewResult<T> = Result<T, ViewError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_errors_keep_their_message() {
        let err: ViewError = RenderError::PageOutOfRange {
            page: 4,
            page_count: 2,
        }
        .into();

        assert!(matches!(
            err,
            ViewError::Render(RenderError::PageOutOfRange { page: 4, .. })
        ));
        assert_eq!(
            err.to_string(),
            RenderError::PageOutOfRange {
                page: 4,
                page_count: 2
            }
            .to_string()
        );
    }

    #[test]
    fn test_download_error_display() {
        let err = ViewError::from(DownloadError::Status(500));
        assert_eq!(err.to_string(), "download failed: server responded with HTTP 500");
    }
}
