//! Модуль декодирования QR-кодов
//!
//! rqrr как основной декодер с fallback на rxing. Если исходное изображение
//! не читается, перебираются его варианты: инверсия, контраст + резкость,
//! жёсткая бинаризация.

use image::GrayImage;
use imageproc::filter::sharpen3x3;
use rxing::qrcode::QRCodeReader;
use rxing::{BarcodeFormat, DecodingHintDictionary, Reader};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Порог для последней попытки
const HARD_THRESHOLD: u8 = 128;

/// Ошибки декодирования
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("No QR code found in image")]
    NotFound,

    #[error("Failed to decode QR: {0}")]
    DecodeFailed(String),
}

/// Уровень коррекции ошибок
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum ErrorCorrectionLevel {
    L,
    M,
    Q,
    H,
    Unknown,
}

impl From<u16> for ErrorCorrectionLevel {
    fn from(ecc: u16) -> Self {
        match ecc {
            0 => ErrorCorrectionLevel::L,
            1 => ErrorCorrectionLevel::M,
            2 => ErrorCorrectionLevel::Q,
            3 => ErrorCorrectionLevel::H,
            _ => ErrorCorrectionLevel::Unknown,
        }
    }
}

/// Декодированный QR-код
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedQR {
    /// Декодированный текст
    pub content: String,
    pub error_correction: ErrorCorrectionLevel,
    /// Версия QR-кода (1-40), если декодер её сообщил
    pub version: Option<u8>,
    /// Контур найденного кода в координатах изображения
    pub points: Vec<(f32, f32)>,
}

/// Вариант изображения, на котором пробуем декодировать
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Original,
    Inverted,
    Enhanced,
    EnhancedInverted,
    Thresholded,
}

impl Variant {
    pub const ALL: [Variant; 5] = [
        Variant::Original,
        Variant::Inverted,
        Variant::Enhanced,
        Variant::EnhancedInverted,
        Variant::Thresholded,
    ];

    /// Построение варианта изображения
    fn render(self, img: &GrayImage) -> GrayImage {
        match self {
            Variant::Original => img.clone(),
            Variant::Inverted => invert(img),
            Variant::Enhanced => sharpen3x3(&stretch_contrast(img)),
            Variant::EnhancedInverted => invert(&sharpen3x3(&stretch_contrast(img))),
            Variant::Thresholded => hard_threshold(img, HARD_THRESHOLD),
        }
    }
}

/// Декодер QR-кодов с fallback
pub struct QRDecoder;

impl Default for QRDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl QRDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Декодирование QR-кода. Пустое содержимое считается отсутствием кода.
    pub fn decode(&self, img: &GrayImage) -> Result<DecodedQR, DecodeError> {
        let mut last_error = DecodeError::NotFound;

        for variant in Variant::ALL {
            if variant != Variant::Original {
                log::info!("FALLBACK: trying {:?} image", variant);
            }

            let candidate = variant.render(img);
            match self.decode_variant(&candidate) {
                Ok(decoded) if decoded.content.is_empty() => {
                    log::debug!("{:?}: decoded empty payload, ignoring", variant);
                }
                Ok(decoded) => {
                    log::info!("SUCCESS: {:?} image decoded", variant);
                    return Ok(decoded);
                }
                Err(e) => last_error = e,
            }
        }

        Err(last_error)
    }

    fn decode_variant(&self, img: &GrayImage) -> Result<DecodedQR, DecodeError> {
        match self.decode_with_rqrr(img) {
            Ok(result) => Ok(result),
            Err(rqrr_err) => self.decode_with_rxing(img).map_err(|rxing_err| match rxing_err {
                DecodeError::NotFound => rqrr_err,
                other => other,
            }),
        }
    }

    /// Декодирование через rqrr
    fn decode_with_rqrr(&self, img: &GrayImage) -> Result<DecodedQR, DecodeError> {
        let (width, height) = img.dimensions();
        log::debug!("RQRR: Starting detection on {}x{} image", width, height);

        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            width as usize,
            height as usize,
            |x, y| img.get_pixel(x as u32, y as u32).0[0],
        );
        let grids = prepared.detect_grids();
        log::debug!("RQRR: Detected {} grids", grids.len());

        let grid = grids.first().ok_or(DecodeError::NotFound)?;
        let (meta, content) = grid
            .decode()
            .map_err(|e| DecodeError::DecodeFailed(format!("{:?}", e)))?;

        Ok(DecodedQR {
            content,
            error_correction: ErrorCorrectionLevel::from(meta.ecc_level),
            version: Some(meta.version.0 as u8),
            points: grid.bounds.iter().map(|p| (p.x as f32, p.y as f32)).collect(),
        })
    }

    /// Декодирование через rxing: HybridBinarizer, затем GlobalHistogramBinarizer
    fn decode_with_rxing(&self, img: &GrayImage) -> Result<DecodedQR, DecodeError> {
        let (width, height) = img.dimensions();
        log::debug!("RXING: Starting decode on {}x{} image", width, height);

        // Формат 0xAARRGGBB, серый повторён в каждом канале
        let pixels: Vec<u32> = img
            .as_raw()
            .iter()
            .map(|&gray| {
                let g = gray as u32;
                0xFF000000 | (g << 16) | (g << 8) | g
            })
            .collect();

        let mut hints = DecodingHintDictionary::new();
        hints.insert(
            rxing::DecodeHintType::POSSIBLE_FORMATS,
            rxing::DecodeHintValue::PossibleFormats(std::collections::HashSet::from([
                BarcodeFormat::QR_CODE,
            ])),
        );
        hints.insert(
            rxing::DecodeHintType::TRY_HARDER,
            rxing::DecodeHintValue::TryHarder(true),
        );

        let mut reader = QRCodeReader::new();

        let source = rxing::RGBLuminanceSource::new_with_width_height_pixels(
            width as usize,
            height as usize,
            &pixels,
        );
        let mut hybrid = rxing::BinaryBitmap::new(rxing::common::HybridBinarizer::new(source));
        if let Ok(result) = reader.decode_with_hints(&mut hybrid, &hints) {
            log::debug!("RXING: Decode success (HybridBinarizer)");
            return Ok(Self::from_rxing(&result));
        }

        let source = rxing::RGBLuminanceSource::new_with_width_height_pixels(
            width as usize,
            height as usize,
            &pixels,
        );
        let mut global =
            rxing::BinaryBitmap::new(rxing::common::GlobalHistogramBinarizer::new(source));
        match reader.decode_with_hints(&mut global, &hints) {
            Ok(result) => {
                log::debug!("RXING: Decode success (GlobalHistogramBinarizer)");
                Ok(Self::from_rxing(&result))
            }
            Err(e) => {
                log::debug!("RXING: Not found: {}", e);
                Err(DecodeError::NotFound)
            }
        }
    }

    fn from_rxing(result: &rxing::RXingResult) -> DecodedQR {
        DecodedQR {
            content: result.getText().to_string(),
            error_correction: ErrorCorrectionLevel::Unknown,
            version: None,
            points: result.getPoints().iter().map(|p| (p.x, p.y)).collect(),
        }
    }
}

fn invert(img: &GrayImage) -> GrayImage {
    let mut result = img.clone();
    image::imageops::invert(&mut result);
    result
}

/// Жёсткая бинаризация по порогу
fn hard_threshold(img: &GrayImage, level: u8) -> GrayImage {
    let mut result = img.clone();
    for p in result.pixels_mut() {
        p.0[0] = if p.0[0] < level { 0 } else { 255 };
    }
    result
}

/// Растяжение гистограммы на весь диапазон 0..255
fn stretch_contrast(img: &GrayImage) -> GrayImage {
    let (min_val, max_val) = img
        .pixels()
        .fold((255u8, 0u8), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));

    if min_val >= max_val {
        return img.clone();
    }

    let range = (max_val - min_val) as f32;
    let mut result = img.clone();
    for p in result.pixels_mut() {
        p.0[0] = ((p.0[0] - min_val) as f32 / range * 255.0) as u8;
    }
    result
}
