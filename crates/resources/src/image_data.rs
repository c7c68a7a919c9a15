//! Decoded image pixels ready for texture upload.

use std::path::Path;

use tracing::info;

use crate::error::{ResourceError, ResourceResult};

/// Tightly packed RGBA8 pixels, rows top to bottom.
#[derive(Debug, Clone)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl ImageData {
    /// Decode a PNG or JPEG file and convert it to RGBA8.
    pub fn load(path: &Path) -> ResourceResult<Self> {
        if !path.exists() {
            return Err(ResourceError::FileNotFound(path.to_path_buf()));
        }
        let image = image::open(path)?.to_rgba8();
        let data = Self::from_rgba(image);
        info!("Loaded image {:?}: {}x{}", path, data.width, data.height);
        Ok(data)
    }

    /// Decode an in-memory encoded image.
    pub fn from_memory(bytes: &[u8]) -> ResourceResult<Self> {
        Ok(Self::from_rgba(image::load_from_memory(bytes)?.to_rgba8()))
    }

    fn from_rgba(image: image::RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            pixels: image.into_raw(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode_png(image: &image::RgbImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("encode png");
        bytes
    }

    #[test]
    fn test_rgb_image_expanded_to_rgba() {
        let rgb = image::RgbImage::from_pixel(3, 2, image::Rgb([10, 20, 30]));
        let data = ImageData::from_memory(&encode_png(&rgb)).expect("decode");
        assert_eq!((data.width, data.height), (3, 2));
        assert_eq!(data.pixels.len(), 3 * 2 * 4);
        assert_eq!(&data.pixels[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        assert!(matches!(
            ImageData::from_memory(b"not an image"),
            Err(ResourceError::Image(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            ImageData::load(Path::new("no/such/texture.png")),
            Err(ResourceError::FileNotFound(_))
        ));
    }
}
