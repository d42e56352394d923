use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use qrcode::{Color, EcLevel, QrCode};
use std::io::Cursor;
use thiserror::Error;

/// Sapphire, the brand colour used for dark modules.
pub const DARK_RGB: [u8; 3] = [0x1a, 0x36, 0x5d];
const LIGHT_RGB: [u8; 3] = [0xff, 0xff, 0xff];

/// Pixels per module in the stored PNG.
pub const PNG_MODULE_PX: u32 = 8;
/// Quiet zone around the symbol, in modules.
pub const QUIET_ZONE_MODULES: u32 = 1;

#[derive(Debug, Error)]
pub enum QrError {
    #[error("failed to encode QR payload: {0}")]
    Encode(#[from] qrcode::types::QrError),

    #[error("failed to encode QR PNG: {0}")]
    Png(#[from] image::ImageError),
}

/// Module matrix of a QR symbol. The PNG stored for scanning apps and the
/// vector drawing in the ticket PDF are both produced from it.
#[derive(Debug, Clone)]
pub struct QrMatrix {
    width: usize,
    dark: Vec<bool>,
}

impl QrMatrix {
    /// Encodes `payload` at error-correction level H.
    pub fn encode(payload: &str) -> Result<Self, QrError> {
        let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::H)?;
        let dark = code
            .to_colors()
            .into_iter()
            .map(|color| color == Color::Dark)
            .collect();

        Ok(Self {
            width: code.width(),
            dark,
        })
    }

    /// Modules per side, excluding the quiet zone.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.width && self.dark[y * self.width + x]
    }

    pub fn to_png(&self) -> Result<Vec<u8>, QrError> {
        let side = (self.width as u32 + 2 * QUIET_ZONE_MODULES) * PNG_MODULE_PX;
        let image = RgbImage::from_fn(side, side, |px, py| {
            let module_x = (px / PNG_MODULE_PX).checked_sub(QUIET_ZONE_MODULES);
            let module_y = (py / PNG_MODULE_PX).checked_sub(QUIET_ZONE_MODULES);
            match (module_x, module_y) {
                (Some(x), Some(y)) if self.is_dark(x as usize, y as usize) => Rgb(DARK_RGB),
                _ => Rgb(LIGHT_RGB),
            }
        });

        let mut png = Vec::new();
        DynamicImage::ImageRgb8(image).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        Ok(png)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_is_square_and_has_finder_pattern() {
        let matrix = QrMatrix::encode("NE-0A1B2C3D-4821").unwrap();
        // Version 1 is 21 modules wide; level H pushes a 16 byte payload past it
        assert!(matrix.width() > 21);
        assert_eq!((matrix.width() - 17) % 4, 0);
        // Top-left finder pattern: dark ring, light gap, dark core
        assert!(matrix.is_dark(0, 0));
        assert!(!matrix.is_dark(1, 1));
        assert!(matrix.is_dark(3, 3));
        assert!(!matrix.is_dark(matrix.width(), 0));
    }

    #[test]
    fn test_png_uses_brand_colour_and_quiet_zone() {
        let matrix = QrMatrix::encode("NE-0A1B2C3D-4821").unwrap();
        let png = matrix.to_png().unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = image::load_from_memory(&png).unwrap().to_rgb8();
        let expected_side = (matrix.width() as u32 + 2) * PNG_MODULE_PX;
        assert_eq!(decoded.dimensions(), (expected_side, expected_side));
        assert_eq!(decoded.get_pixel(0, 0), &Rgb(LIGHT_RGB));
        assert_eq!(
            decoded.get_pixel(PNG_MODULE_PX, PNG_MODULE_PX),
            &Rgb(DARK_RGB)
        );
    }
}
