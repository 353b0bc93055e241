use image::codecs::{gif::GifEncoder, jpeg::JpegEncoder, png::PngEncoder};
use image::{DynamicImage, ExtendedColorType, GrayImage, ImageEncoder, Luma};
use qrcode::{Color, EcLevel, QrCode};

use crate::core::error::{ChartError, ChartResult};
use crate::core::registry::ChartFormat;
use crate::core::request::ErrorCorrection;

const DARK: Luma<u8> = Luma([0]);
const LIGHT: Luma<u8> = Luma([255]);
const GIF_SPEED: i32 = 10;

impl From<ErrorCorrection> for EcLevel {
    fn from(level: ErrorCorrection) -> Self {
        match level {
            ErrorCorrection::L => EcLevel::L,
            ErrorCorrection::M => EcLevel::M,
            ErrorCorrection::Q => EcLevel::Q,
            ErrorCorrection::H => EcLevel::H,
        }
    }
}

/// A QR symbol as a square grid of modules, `true` meaning dark.
pub struct Symbol {
    size: u32,
    modules: Vec<bool>,
}

impl Symbol {
    pub fn encode(data: &[u8], level: ErrorCorrection) -> ChartResult<Self> {
        let code = QrCode::with_error_correction_level(data, level.into()).map_err(|e| {
            ChartError::validation(
                "chl",
                format!("cannot encode content at level {}: {e}", level.as_str()),
            )
        })?;
        let size = code.width() as u32;
        let modules = code
            .to_colors()
            .into_iter()
            .map(|c| c == Color::Dark)
            .collect();
        Ok(Self { size, modules })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn is_dark(&self, x: u32, y: u32) -> bool {
        self.modules[(y * self.size + x) as usize]
    }
}

/// Placement of a symbol inside the output image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub width: u32,
    pub height: u32,
    pub scale: u32,
    pub left: u32,
    pub top: u32,
}

impl Layout {
    /// The output is never smaller than the symbol plus its quiet zone; the
    /// symbol is scaled by a whole number and centred.
    pub fn compute(modules: u32, margin: u32, width: u32, height: u32) -> Self {
        let full = modules + 2 * margin;
        let out_width = width.max(full);
        let out_height = height.max(full);
        let scale = (out_width / full).min(out_height / full);
        Self {
            width: out_width,
            height: out_height,
            scale,
            left: (out_width - modules * scale) / 2,
            top: (out_height - modules * scale) / 2,
        }
    }
}

pub fn draw(symbol: &Symbol, layout: &Layout) -> GrayImage {
    let mut image = GrayImage::from_pixel(layout.width, layout.height, LIGHT);
    for y in 0..symbol.size() {
        for x in 0..symbol.size() {
            if !symbol.is_dark(x, y) {
                continue;
            }
            let px = layout.left + x * layout.scale;
            let py = layout.top + y * layout.scale;
            for dy in 0..layout.scale {
                for dx in 0..layout.scale {
                    image.put_pixel(px + dx, py + dy, DARK);
                }
            }
        }
    }
    image
}

pub fn encode(bitmap: &GrayImage, format: ChartFormat, quality: u8) -> ChartResult<Vec<u8>> {
    let (width, height) = bitmap.dimensions();
    let mut bytes = Vec::new();
    match format {
        ChartFormat::Png => {
            PngEncoder::new(&mut bytes).write_image(
                bitmap.as_raw(),
                width,
                height,
                ExtendedColorType::L8,
            )?;
        }
        ChartFormat::Jpeg => {
            JpegEncoder::new_with_quality(&mut bytes, quality).write_image(
                bitmap.as_raw(),
                width,
                height,
                ExtendedColorType::L8,
            )?;
        }
        ChartFormat::Gif => {
            // the GIF encoder only takes RGB(A)
            let rgb = DynamicImage::ImageLuma8(bitmap.clone()).to_rgb8();
            let mut encoder = GifEncoder::new_with_speed(&mut bytes, GIF_SPEED);
            encoder.encode(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)?;
        }
    }
    Ok(bytes)
}
