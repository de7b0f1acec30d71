//! Page bitmap cache
//!
//! Holds at most one bitmap per page index for the lifetime of a document.
//! Entries are shared as `Arc<PageBitmap>` so every consumer of a page sees
//! the same allocation; the cache is cleared wholesale when the document
//! changes.

use crate::PageBitmap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Statistics about cache usage
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    /// Number of pages currently cached
    pub entry_count: usize,

    /// Total pixel memory held by cached bitmaps (bytes)
    pub memory_used: usize,

    /// Number of cache hits
    pub hits: u64,

    /// Number of cache misses
    pub misses: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct CacheState {
    bitmaps: HashMap<u32, Arc<PageBitmap>>,
    stats: CacheStats,
}

impl CacheState {
    fn refresh_size(&mut self) {
        self.stats.entry_count = self.bitmaps.len();
        self.stats.memory_used = self.bitmaps.values().map(|b| b.memory_size()).sum();
    }
}

/// Thread-safe map from page index to rendered bitmap
///
/// # Example
///
/// ```
/// use pdf_viewer_cache::{BitmapCache, PageBitmap, RgbaImage};
/// use std::sync::Arc;
///
/// let cache = BitmapCache::new();
/// let stored = cache.insert(PageBitmap::new(0, 1.0, RgbaImage::new(8, 8)));
///
/// let hit = cache.get(0).expect("page 0 is cached");
/// assert!(Arc::ptr_eq(&stored, &hit));
/// ```
#[derive(Default)]
pub struct BitmapCache {
    state: Mutex<CacheState>,
}

impl BitmapCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a page, recording a hit or miss
    pub fn get(&self, page_index: u32) -> Option<Arc<PageBitmap>> {
        let mut state = self.state.lock().unwrap();
        match state.bitmaps.get(&page_index).cloned() {
            Some(bitmap) => {
                state.stats.hits += 1;
                Some(bitmap)
            }
            None => {
                state.stats.misses += 1;
                None
            }
        }
    }

    /// Look up a page without touching statistics
    pub fn peek(&self, page_index: u32) -> Option<Arc<PageBitmap>> {
        let state = self.state.lock().unwrap();
        state.bitmaps.get(&page_index).cloned()
    }

    /// Store a bitmap under its page index
    ///
    /// The first bitmap stored for a page wins: if the page is already
    /// cached, the existing entry is returned and `bitmap` is dropped.
    pub fn insert(&self, bitmap: PageBitmap) -> Arc<PageBitmap> {
        let mut state = self.state.lock().unwrap();
        let page_index = bitmap.page_index;
        if let Some(existing) = state.bitmaps.get(&page_index) {
            return existing.clone();
        }

        let bitmap = Arc::new(bitmap);
        state.bitmaps.insert(page_index, bitmap.clone());
        state.refresh_size();
        bitmap
    }

    /// Check if a page is cached
    pub fn contains(&self, page_index: u32) -> bool {
        let state = self.state.lock().unwrap();
        state.bitmaps.contains_key(&page_index)
    }

    /// Remove a single page
    pub fn remove(&self, page_index: u32) -> Option<Arc<PageBitmap>> {
        let mut state = self.state.lock().unwrap();
        let removed = state.bitmaps.remove(&page_index);
        state.refresh_size();
        removed
    }

    /// Drop every cached page
    ///
    /// Returns the number of entries removed. Hit/miss counters are kept.
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock().unwrap();
        let count = state.bitmaps.len();
        state.bitmaps.clear();
        state.refresh_size();
        if count > 0 {
            log::debug!("cleared {} cached page bitmap(s)", count);
        }
        count
    }

    /// Number of cached pages
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().bitmaps.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get current cache statistics
    pub fn stats(&self) -> CacheStats {
        self.state.lock().unwrap().stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RgbaImage;

    fn bitmap(page_index: u32, width: u32, height: u32) -> PageBitmap {
        PageBitmap::new(page_index, 1.0, RgbaImage::new(width, height))
    }

    #[test]
    fn test_insert_then_get_returns_same_instance() {
        let cache = BitmapCache::new();
        let stored = cache.insert(bitmap(3, 10, 10));

        let first = cache.get(3).expect("page should be cached");
        let second = cache.get(3).expect("page should be cached");

        assert!(Arc::ptr_eq(&stored, &first));
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_cache_miss() {
        let cache = BitmapCache::new();

        assert!(cache.get(999).is_none());

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
    }

    #[test]
    fn test_first_insert_wins() {
        let cache = BitmapCache::new();
        let first = cache.insert(bitmap(0, 10, 10));
        let second = cache.insert(bitmap(0, 20, 20));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.peek(0).map(|b| b.width()), Some(10));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_peek_does_not_count() {
        let cache = BitmapCache::new();
        cache.insert(bitmap(1, 2, 2));

        assert!(cache.peek(1).is_some());
        assert!(cache.peek(2).is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_remove() {
        let cache = BitmapCache::new();
        cache.insert(bitmap(1, 2, 2));

        assert!(cache.remove(1).is_some());
        assert!(!cache.contains(1));
        assert!(cache.remove(1).is_none());
    }

    #[test]
    fn test_clear() {
        let cache = BitmapCache::new();
        for page in 0..3 {
            cache.insert(bitmap(page, 4, 4));
        }
        assert_eq!(cache.len(), 3);

        assert_eq!(cache.clear(), 3);

        assert!(cache.is_empty());
        assert_eq!(cache.stats().memory_used, 0);
        assert!(!cache.contains(0));
    }

    #[test]
    fn test_stats() {
        let cache = BitmapCache::new();
        cache.insert(bitmap(0, 16, 16));
        cache.insert(bitmap(1, 8, 8));

        cache.get(0);
        cache.get(0);
        cache.get(5);

        let stats = cache.stats();
        assert_eq!(stats.entry_count, 2);
        assert_eq!(stats.memory_used, 16 * 16 * 4 + 8 * 8 * 4);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_hit_rate_empty() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}
