//! PDF Viewer Render Library
//!
//! Page rasterization behind a pluggable [`PdfEngine`], and the
//! [`PageRenderer`] that serializes access to the open document and caches
//! every page it renders.

pub mod engine;
pub mod renderer;

#[cfg(feature = "pdfium")]
pub use engine::pdfium_backend::PdfiumEngine;
pub use engine::{
    default_engine, page_tint, DocumentSource, EngineError, LopdfEngine, PageGeometry, PdfEngine,
};
pub use renderer::{PageRenderer, RenderError};
