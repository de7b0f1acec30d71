//! Rasterized page bitmaps

pub use image::RgbaImage;

/// A fully decoded page raster (8 bits per channel, RGBA)
#[derive(Debug, Clone, PartialEq)]
pub struct PageBitmap {
    /// Zero-based page index this bitmap was rendered from
    pub page_index: u32,

    /// Render scale relative to the page's native size in points
    pub scale: f32,

    /// Pixel data
    pub image: RgbaImage,
}

impl PageBitmap {
    /// Wrap a rendered image
    pub fn new(page_index: u32, scale: f32, image: RgbaImage) -> Self {
        Self {
            page_index,
            scale,
            image,
        }
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Raw RGBA bytes, row-major
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Memory held by the pixel buffer in bytes
    pub fn memory_size(&self) -> usize {
        self.image.as_raw().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_dimensions_and_size() {
        let image = RgbaImage::from_pixel(4, 3, Rgba([255, 0, 0, 255]));
        let bitmap = PageBitmap::new(2, 1.0, image);

        assert_eq!(bitmap.width(), 4);
        assert_eq!(bitmap.height(), 3);
        assert_eq!(bitmap.memory_size(), 4 * 3 * 4);
        assert_eq!(&bitmap.pixels()[..4], &[255, 0, 0, 255]);
    }
}
