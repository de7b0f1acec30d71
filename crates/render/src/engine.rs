//! PDF engine abstraction
//!
//! A [`PdfEngine`] holds at most one loaded document, the one the viewer is
//! showing, and rasterizes its pages on request. [`LopdfEngine`] is the
//! pure-Rust default: it knows page geometry but not page content, so it
//! draws a page-sized sheet marked with the page index. Real pixels come
//! from the `pdfium` feature.

use image::Rgba;
use lopdf::{Document, Object, ObjectId};
use pdf_viewer_cache::RgbaImage;
use std::fs;
use std::path::{Path, PathBuf};

/// Geometry assumed for a page with no readable MediaBox (US Letter)
const LETTER: PageGeometry = PageGeometry {
    width_pt: 612.0,
    height_pt: 792.0,
};

/// Where a document is read from
#[derive(Debug, Clone)]
pub enum DocumentSource {
    File(PathBuf),
    Memory(Vec<u8>),
}

impl DocumentSource {
    fn into_bytes(self) -> Result<Vec<u8>, EngineError> {
        match self {
            DocumentSource::File(path) => Ok(fs::read(path)?),
            DocumentSource::Memory(bytes) => Ok(bytes),
        }
    }
}

impl From<&Path> for DocumentSource {
    fn from(path: &Path) -> Self {
        DocumentSource::File(path.to_path_buf())
    }
}

impl From<Vec<u8>> for DocumentSource {
    fn from(bytes: Vec<u8>) -> Self {
        DocumentSource::Memory(bytes)
    }
}

/// Displayed size of a page in points (1/72 inch), rotation applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageGeometry {
    /// Bitmap dimensions at `scale`, rounded, at least one pixel each way
    pub fn raster_dims(&self, scale: f32) -> (u32, u32) {
        let px = |points: f32| (points * scale).round().max(1.0) as u32;
        (px(self.width_pt), px(self.height_pt))
    }

    fn rotated(self, degrees: i64) -> Self {
        if degrees.rem_euclid(180) == 90 {
            PageGeometry {
                width_pt: self.height_pt,
                height_pt: self.width_pt,
            }
        } else {
            self
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("no document loaded")]
    NotLoaded,
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("backend error: {0}")]
    Backend(String),
}

/// A PDF backend holding the document on screen
///
/// Loading replaces whatever was loaded before. Callers serialize access
/// (see `PageRenderer`), so implementations only need to be `Send`.
pub trait PdfEngine {
    fn load(&mut self, source: DocumentSource) -> Result<(), EngineError>;
    fn unload(&mut self) -> Result<(), EngineError>;
    fn page_count(&self) -> Result<u32, EngineError>;
    fn geometry(&self, page: u32) -> Result<PageGeometry, EngineError>;
    fn rasterize(&mut self, page: u32, scale: f32) -> Result<RgbaImage, EngineError>;
}

/// Pure-Rust engine reading page geometry with `lopdf`
#[derive(Debug, Default)]
pub struct LopdfEngine {
    pages: Option<Vec<PageGeometry>>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn pages(&self) -> Result<&[PageGeometry], EngineError> {
        self.pages.as_deref().ok_or(EngineError::NotLoaded)
    }
}

impl PdfEngine for LopdfEngine {
    fn load(&mut self, source: DocumentSource) -> Result<(), EngineError> {
        self.pages = None;
        let doc = Document::load_mem(&source.into_bytes()?)?;
        let geometry = doc
            .get_pages()
            .values()
            .map(|&page_id| page_geometry(&doc, page_id))
            .collect();
        self.pages = Some(geometry);
        Ok(())
    }

    fn unload(&mut self) -> Result<(), EngineError> {
        self.pages.take().map(drop).ok_or(EngineError::NotLoaded)
    }

    fn page_count(&self) -> Result<u32, EngineError> {
        Ok(self.pages()?.len() as u32)
    }

    fn geometry(&self, page: u32) -> Result<PageGeometry, EngineError> {
        let pages = self.pages()?;
        pages
            .get(page as usize)
            .copied()
            .ok_or(EngineError::PageOutOfRange {
                page,
                page_count: pages.len() as u32,
            })
    }

    fn rasterize(&mut self, page: u32, scale: f32) -> Result<RgbaImage, EngineError> {
        let (width, height) = self.geometry(page)?.raster_dims(scale);
        Ok(page_sheet(page, width, height))
    }
}

/// Look up `key` on a page, falling back to the page tree ancestors
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    // Page trees are shallow; the bound only stops reference cycles.
    for _ in 0..64 {
        if let Ok(value) = node.get(key) {
            return doc.dereference(value).ok().map(|(_, object)| object);
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn page_geometry(doc: &Document, page_id: ObjectId) -> PageGeometry {
    let media_box = inherited(doc, page_id, b"MediaBox")
        .and_then(|object| object.as_array().ok())
        .and_then(|corners| {
            let numbers: Vec<f32> = corners
                .iter()
                .filter_map(|n| n.as_float().ok())
                .collect();
            match numbers[..] {
                [llx, lly, urx, ury] => Some(PageGeometry {
                    width_pt: (urx - llx).abs(),
                    height_pt: (ury - lly).abs(),
                }),
                _ => None,
            }
        })
        .unwrap_or(LETTER);

    let rotation = inherited(doc, page_id, b"Rotate")
        .and_then(|object| object.as_i64().ok())
        .unwrap_or(0);
    media_box.rotated(rotation)
}

/// Marker color for a page: a small palette cycled by page index
pub fn page_tint(page: u32) -> Rgba<u8> {
    const PALETTE: [[u8; 3]; 6] = [
        [66, 133, 244],
        [219, 68, 55],
        [244, 180, 0],
        [15, 157, 88],
        [171, 71, 188],
        [0, 172, 193],
    ];
    let [r, g, b] = PALETTE[page as usize % PALETTE.len()];
    Rgba([r, g, b, 255])
}

/// White sheet with a header band in the page's tint
///
/// Below the band sits one square notch per full lap of the palette, so
/// pages sharing a tint are still told apart on screen.
fn page_sheet(page: u32, width: u32, height: u32) -> RgbaImage {
    let mut sheet = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
    let band = (height / 32).max(1);
    let tint = page_tint(page);
    for y in 0..band {
        for x in 0..width {
            sheet.put_pixel(x, y, tint);
        }
    }

    let laps = page / 6;
    let notch = band.max(2);
    for lap in 0..laps {
        let x0 = lap * notch * 2;
        if x0 + notch > width || band + notch > height {
            break;
        }
        for y in band..band + notch {
            for x in x0..x0 + notch {
                sheet.put_pixel(x, y, tint);
            }
        }
    }
    sheet
}

#[cfg(feature = "pdfium")]
pub mod pdfium_backend {
    use super::*;
    use pdfium_render::prelude::{PdfDocument, PdfPage, PdfRenderConfig, Pdfium};

    /// PDFium-backed engine producing real page rasters
    pub struct PdfiumEngine {
        pdfium: &'static Pdfium,
        document: Option<PdfDocument<'static>>,
    }

    fn backend(err: impl std::fmt::Display) -> EngineError {
        EngineError::Backend(err.to_string())
    }

    impl PdfiumEngine {
        /// Bind PDFium from the executable's directory, the working
        /// directory, or the system library path, in that order
        pub fn new() -> Result<Self, EngineError> {
            let mut dirs: Vec<PathBuf> = std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf))
                .into_iter()
                .collect();
            dirs.push(PathBuf::from("./"));

            let bindings = dirs
                .iter()
                .find_map(|dir| {
                    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)).ok()
                })
                .map(Ok)
                .unwrap_or_else(Pdfium::bind_to_system_library)
                .map_err(|err| backend(format!("failed to bind pdfium library: {err}")))?;

            Ok(Self {
                pdfium: Box::leak(Box::new(Pdfium::new(bindings))),
                document: None,
            })
        }

        fn page(&self, page: u32) -> Result<PdfPage<'_>, EngineError> {
            let page_count = self.page_count()?;
            if page >= page_count {
                return Err(EngineError::PageOutOfRange { page, page_count });
            }
            let document = self.document.as_ref().ok_or(EngineError::NotLoaded)?;
            document.pages().get(page as u16).map_err(backend)
        }
    }

    // SAFETY: the engine is only ever driven from behind `PageRenderer`'s
    // mutex, so its PDFium document is never used from two threads at once.
    unsafe impl Send for PdfiumEngine {}

    impl PdfEngine for PdfiumEngine {
        fn load(&mut self, source: DocumentSource) -> Result<(), EngineError> {
            self.document = None;
            let document = self
                .pdfium
                .load_pdf_from_byte_vec(source.into_bytes()?, None)
                .map_err(backend)?;
            self.document = Some(document);
            Ok(())
        }

        fn unload(&mut self) -> Result<(), EngineError> {
            self.document.take().map(drop).ok_or(EngineError::NotLoaded)
        }

        fn page_count(&self) -> Result<u32, EngineError> {
            let document = self.document.as_ref().ok_or(EngineError::NotLoaded)?;
            Ok(u32::from(document.pages().len()))
        }

        fn geometry(&self, page: u32) -> Result<PageGeometry, EngineError> {
            let page = self.page(page)?;
            Ok(PageGeometry {
                width_pt: page.width().value,
                height_pt: page.height().value,
            })
        }

        fn rasterize(&mut self, page: u32, scale: f32) -> Result<RgbaImage, EngineError> {
            let (width, height) = self.geometry(page)?.raster_dims(scale);
            let config = PdfRenderConfig::new()
                .set_target_width(width as i32)
                .set_target_height(height as i32);
            let bitmap = self
                .page(page)?
                .render_with_config(&config)
                .map_err(backend)?;

            RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes().to_vec())
                .ok_or_else(|| backend(format!("bitmap is not {width}x{height}")))
        }
    }
}

/// Engine used when the host does not supply one
pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}

#[cfg(any(test, feature = "test-utils"))]
pub mod fixtures {
    //! Synthetic PDF documents for tests.

    use lopdf::{dictionary, Dictionary, Document, Object, Stream};

    /// Build a PDF whose pages have the given sizes in points
    pub fn pdf_with_pages(sizes: &[(f32, f32)]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut kids: Vec<Object> = Vec::with_capacity(sizes.len());
        for &(width, height) in sizes {
            let content_id = doc.add_object(Stream::new(Dictionary::new(), Vec::new()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(width),
                    Object::Real(height),
                ],
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => sizes.len() as i64,
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)
            .expect("writing a PDF to memory should not fail");
        bytes
    }
}
