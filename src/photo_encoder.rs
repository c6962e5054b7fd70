//! Prepares uploaded photos for a card slot.
//!
//! Camera and gallery uploads arrive in arbitrary sizes and orientations.
//! Before they are stored they are:
//! 1. Rotated/flipped according to their EXIF orientation tag
//! 2. Cropped to the centered square of side `min(width, height)`
//! 3. Resized to `side` x `side`
//! 4. Encoded as JPEG and wrapped in a `data:` URL

use std::io::Cursor;

use exif::{In, Tag};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use log::debug;

use crate::card::ImageRef;
use crate::collage::loader::encode_data_url;

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Upload is empty")]
    Empty,
    #[error("Image processing error: {0}")]
    ImageError(#[from] image::ImageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SquareCropOptions {
    pub side: u32,
    pub quality: u8,
}

impl Default for SquareCropOptions {
    fn default() -> Self {
        Self {
            side: 1024,
            quality: 72,
        }
    }
}

/// Crops an uploaded image to a centered square and returns it as a JPEG data URL.
pub fn square_data_url(
    bytes: &[u8],
    options: SquareCropOptions,
) -> Result<ImageRef, EncodeError> {
    if bytes.is_empty() {
        return Err(EncodeError::Empty);
    }

    let image = image::load_from_memory(bytes)?;
    let image = apply_orientation(image, read_orientation(bytes));
    let square = center_square(&image, options.side.max(1));

    let mut jpeg = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut jpeg, options.quality.clamp(1, 100));
    square.to_rgb8().write_with_encoder(encoder)?;

    debug!(
        "Encoded {}x{} upload as {}px square ({} bytes)",
        image.width(),
        image.height(),
        options.side,
        jpeg.len()
    );
    Ok(ImageRef::DataUrl(encode_data_url("image/jpeg", &jpeg)))
}

/// Crops the centered square of side `min(w, h)` and scales it to `side`.
pub fn center_square(image: &DynamicImage, side: u32) -> DynamicImage {
    let (w, h) = image.dimensions();
    let min_side = w.min(h);
    let x = (w - min_side) / 2;
    let y = (h - min_side) / 2;

    image
        .crop_imm(x, y, min_side, min_side)
        .resize_exact(side, side, FilterType::Lanczos3)
}

fn read_orientation(bytes: &[u8]) -> Option<u32> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()?;
    exif.get_field(Tag::Orientation, In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
}

fn apply_orientation(image: DynamicImage, orientation: Option<u32>) -> DynamicImage {
    match orientation {
        Some(2) => image.fliph(),
        Some(3) => image.rotate180(),
        Some(4) => image.flipv(),
        Some(5) => image.fliph().rotate270(),
        Some(6) => image.rotate90(),
        Some(7) => image.fliph().rotate90(),
        Some(8) => image.rotate270(),
        _ => image, // 1 or unknown = no transformation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collage::loader::decode_data_url;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn png_bytes(image: &RgbaImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_center_square_crops_middle() {
        // Wide image: red | green | blue thirds, the square is the green middle
        let mut image = RgbaImage::from_pixel(300, 100, Rgba([255, 0, 0, 255]));
        for y in 0..100 {
            for x in 100..200 {
                image.put_pixel(x, y, Rgba([0, 255, 0, 255]));
            }
            for x in 200..300 {
                image.put_pixel(x, y, Rgba([0, 0, 255, 255]));
            }
        }
        let square = center_square(&DynamicImage::ImageRgba8(image), 50);
        assert_eq!(square.dimensions(), (50, 50));
        let center = square.get_pixel(25, 25);
        assert!(center.0[1] > 240 && center.0[0] < 15 && center.0[2] < 15);
    }

    #[test]
    fn test_square_data_url_is_jpeg() {
        let image = RgbaImage::from_pixel(64, 32, Rgba([200, 10, 10, 255]));
        let options = SquareCropOptions {
            side: 16,
            quality: 80,
        };
        let reference = square_data_url(&png_bytes(&image), options).unwrap();
        assert!(reference.as_str().starts_with("data:image/jpeg;base64,"));

        let jpeg = decode_data_url(reference.as_str()).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.dimensions(), (16, 16));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            square_data_url(&[], SquareCropOptions::default()),
            Err(EncodeError::Empty)
        ));
        assert!(matches!(
            square_data_url(b"garbage", SquareCropOptions::default()),
            Err(EncodeError::ImageError(_))
        ));
    }

    #[test]
    fn test_orientation_rotates() {
        let image = DynamicImage::ImageRgba8(RgbaImage::new(4, 2));
        assert_eq!(apply_orientation(image.clone(), Some(6)).dimensions(), (2, 4));
        assert_eq!(apply_orientation(image.clone(), Some(3)).dimensions(), (4, 2));
        assert_eq!(apply_orientation(image, None).dimensions(), (4, 2));
    }
}
