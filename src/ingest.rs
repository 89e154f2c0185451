use crate::{Error, Result};
use image::{ImageFormat, RgbImage};
use std::{io::Cursor, sync::Arc};
use tracing::debug;

const ACCEPTED_MIME_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png"];

/// Raw upload as received from the client.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

impl UploadedImage {
    pub fn new(bytes: impl Into<Vec<u8>>, content_type: Option<&str>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.map(str::to_string),
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }
}

/// Decoded 3-channel RGB image. Clones share the pixel buffer.
#[derive(Debug, Clone)]
pub struct Bitmap {
    pixels: Arc<RgbImage>,
}

impl Bitmap {
    pub fn from_rgb(pixels: RgbImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn channels(&self) -> usize {
        3
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.pixels
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|e| Error::internal(format!("failed to encode preview: {e}")))?;
        Ok(buf)
    }
}

/// Decodes an uploaded JPEG or PNG into an RGB bitmap.
pub fn ingest(upload: &UploadedImage) -> Result<Bitmap> {
    check_declared_type(upload.content_type.as_deref())?;

    if upload.bytes.is_empty() {
        return Err(Error::decode("empty upload"));
    }

    let format = image::guess_format(&upload.bytes)
        .map_err(|_| Error::decode("payload is not a recognised image"))?;
    if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png) {
        return Err(Error::decode(format!(
            "{:?} images are not accepted, upload a JPEG or PNG",
            format
        )));
    }

    let decoded = image::load_from_memory_with_format(&upload.bytes, format)
        .map_err(|e| Error::decode(e.to_string()))?;

    debug!(
        "Decoded {:?} upload {:?}: {}x{} {:?}",
        format,
        upload.file_name,
        decoded.width(),
        decoded.height(),
        decoded.color()
    );

    Ok(Bitmap::from_rgb(decoded.into_rgb8()))
}

fn check_declared_type(content_type: Option<&str>) -> Result<()> {
    let Some(content_type) = content_type else {
        return Ok(());
    };

    // Strip parameters such as "; charset=binary"
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if essence.is_empty()
        || essence == "application/octet-stream"
        || ACCEPTED_MIME_TYPES.contains(&essence.as_str())
    {
        Ok(())
    } else {
        Err(Error::UnsupportedMediaType(essence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage};

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        image.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    #[test]
    fn test_declared_type_parameters_are_ignored() {
        assert!(check_declared_type(Some("image/PNG; charset=binary")).is_ok());
        assert!(check_declared_type(Some("application/octet-stream")).is_ok());
        assert!(check_declared_type(None).is_ok());
    }

    #[test]
    fn test_declared_type_rejects_other_media() {
        let err = check_declared_type(Some("text/plain")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedMediaType(ref t) if t == "text/plain"));
    }

    #[test]
    fn test_rgba_png_drops_alpha() {
        let rgba = RgbaImage::from_pixel(4, 2, Rgba([10, 20, 30, 0]));
        let bytes = encode(DynamicImage::ImageRgba8(rgba), ImageFormat::Png);

        let bitmap = ingest(&UploadedImage::new(bytes, Some("image/png"))).unwrap();

        assert_eq!(bitmap.channels(), 3);
        assert_eq!((bitmap.width(), bitmap.height()), (4, 2));
        assert_eq!(bitmap.as_rgb().get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn test_grayscale_jpeg_expands_to_rgb() {
        let gray = GrayImage::from_pixel(8, 8, Luma([128]));
        let bytes = encode(DynamicImage::ImageLuma8(gray), ImageFormat::Jpeg);

        let bitmap = ingest(&UploadedImage::new(bytes, Some("image/jpeg"))).unwrap();

        let [r, g, b] = bitmap.as_rgb().get_pixel(3, 3).0;
        assert_eq!(r, g);
        assert_eq!(g, b);
    }

    #[test]
    fn test_preview_round_trips_dimensions() {
        let bitmap = Bitmap::from_rgb(RgbImage::new(5, 7));
        let png = bitmap.to_png().unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (5, 7));
    }
}
