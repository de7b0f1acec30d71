//! PDF Viewer Cache Library
//!
//! In-memory cache of rasterized pages, keyed by zero-based page index.

pub mod bitmap;
pub mod page_cache;

pub use bitmap::{PageBitmap, RgbaImage};
pub use page_cache::{BitmapCache, CacheStats};
