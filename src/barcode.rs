//! Распознавание QR поверх `rqrr`.

use image::{DynamicImage, GrayImage};

pub const DEFAULT_MAX_SYMBOLS: usize = 10;

/// Читатель QR-кодов: только QR, с попыткой инверсии и лимитом символов.
#[derive(Debug, Clone, Copy)]
pub struct BarcodeReader {
    pub max_symbols: usize,
    pub try_invert: bool,
}

impl Default for BarcodeReader {
    fn default() -> Self {
        Self {
            max_symbols: DEFAULT_MAX_SYMBOLS,
            try_invert: true,
        }
    }
}

impl BarcodeReader {
    pub fn new(max_symbols: usize, try_invert: bool) -> Self {
        Self {
            max_symbols,
            try_invert,
        }
    }

    /// Все распознанные тексты, не больше `max_symbols`.
    pub fn decode(&self, image: &DynamicImage) -> Vec<String> {
        let luma = image.to_luma8();
        let mut found = decode_luma(&luma);

        if found.is_empty() && self.try_invert {
            let mut inverted = luma;
            image::imageops::invert(&mut inverted);
            found = decode_luma(&inverted);
            if !found.is_empty() {
                log::debug!("decoded {} symbol(s) from inverted image", found.len());
            }
        }

        found.truncate(self.max_symbols);
        log::info!(
            "{} QR symbol(s) in {}x{} image",
            found.len(),
            image.width(),
            image.height()
        );
        found
    }
}

fn decode_luma(luma: &GrayImage) -> Vec<String> {
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        luma.width() as usize,
        luma.height() as usize,
        |x, y| luma.get_pixel(x as u32, y as u32).0[0],
    );

    prepared
        .detect_grids()
        .into_iter()
        .filter_map(|grid| match grid.decode() {
            Ok((_, content)) => Some(content),
            Err(e) => {
                log::debug!("skipping undecodable QR grid: {e:?}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, RgbImage};
    use qrcode::{Color, QrCode};

    const SCALE: u32 = 4;
    const QUIET: u32 = 4;

    fn qr_image(text: &str) -> GrayImage {
        let code = QrCode::new(text.as_bytes()).unwrap();
        let n = code.width() as u32;
        let colors = code.to_colors();
        let size = (n + 2 * QUIET) * SCALE;
        GrayImage::from_fn(size, size, |x, y| {
            let (mx, my) = (x / SCALE, y / SCALE);
            if mx < QUIET || my < QUIET || mx >= n + QUIET || my >= n + QUIET {
                return Luma([255]);
            }
            match colors[((my - QUIET) * n + (mx - QUIET)) as usize] {
                Color::Dark => Luma([0]),
                Color::Light => Luma([255]),
            }
        })
    }

    #[test]
    fn blank_image_has_no_symbols() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(64, 64));
        assert!(BarcodeReader::default().decode(&img).is_empty());
    }

    #[test]
    fn defaults() {
        let reader = BarcodeReader::default();
        assert_eq!(reader.max_symbols, 10);
        assert!(reader.try_invert);
    }

    #[test]
    fn decodes_a_real_symbol() {
        let text = "otpauth://totp/ACME:bob?secret=JBSWY3DPEHPK3PXP";
        let img = DynamicImage::ImageLuma8(qr_image(text));
        assert_eq!(BarcodeReader::default().decode(&img), vec![text.to_string()]);
    }

    #[test]
    fn inverted_symbol_needs_try_invert() {
        let mut luma = qr_image("inverted");
        image::imageops::invert(&mut luma);
        let img = DynamicImage::ImageLuma8(luma);

        assert_eq!(
            BarcodeReader::new(10, true).decode(&img),
            vec!["inverted".to_string()]
        );
        assert!(BarcodeReader::new(10, false).decode(&img).is_empty());
    }

    #[test]
    fn results_are_capped_at_max_symbols() {
        let left = qr_image("left");
        let right = qr_image("right");
        let mut canvas = GrayImage::from_pixel(
            left.width() + right.width(),
            left.height().max(right.height()),
            Luma([255]),
        );
        image::imageops::replace(&mut canvas, &left, 0, 0);
        image::imageops::replace(&mut canvas, &right, left.width() as i64, 0);
        let img = DynamicImage::ImageLuma8(canvas);

        let mut both = BarcodeReader::new(10, true).decode(&img);
        both.sort();
        assert_eq!(both, vec!["left".to_string(), "right".to_string()]);

        let one = BarcodeReader::new(1, true).decode(&img);
        assert_eq!(one.len(), 1);
        assert!(one[0] == "left" || one[0] == "right");
    }
}
