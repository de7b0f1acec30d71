//! PDF Viewer Core Library
//!
//! The renderer view and its collaborators: configuration, the page list
//! adapter, the pan/zoom controller and the events delivered to the host.

pub mod adapter;
pub mod config;
pub mod error;
pub mod events;
pub mod transform;
pub mod view;

pub use adapter::{Binding, Delivery, PageListAdapter, PageRequest, RowId, RowState};
pub use config::{ConfigError, ViewerConfig};
pub use error::{ViewError, ViewResult};
pub use events::{StatusListener, ViewEvent};
pub use transform::{
    Pointer, PointerId, TouchAction, TouchEvent, Transform, TransformController, ZoomState,
};
pub use view::PdfRendererView;

pub use pdf_viewer_download::DownloadProgress;
