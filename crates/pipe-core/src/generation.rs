//! Модуль генерации QR-кодов
//!
//! Кодирует идентификатор трубы в QR и рисует его в `GrayImage`.
//! Рендер сделан вручную: `qrcode` тянет свою версию `image`.

use image::{GrayImage, Luma};
use qrcode::types::QrError;
use qrcode::{Color, EcLevel, QrCode, Version};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Максимальная версия QR (40)
const MAX_VERSION: i16 = 40;

/// Ошибки генерации
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Data does not fit into any QR version up to 40")]
    DataTooLong,

    #[error("Invalid QR version: {0}")]
    InvalidVersion(i16),

    #[error("Invalid layout: {0}")]
    InvalidLayout(String),

    #[error("QR encoding failed: {0}")]
    Encoding(String),
}

/// Уровень коррекции ошибок
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCorrection {
    L, // ~7%
    M, // ~15%
    Q, // ~25%
    H, // ~30%
}

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

/// Конфигурация генератора
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QrGenConfig {
    /// Начальная версия QR; при нехватке места версия повышается
    pub version: i16,
    pub error_correction: ErrorCorrection,
    /// Размер модуля в пикселях
    pub box_size: u32,
    /// Ширина тихой зоны в модулях
    pub border: u32,
}

impl Default for QrGenConfig {
    fn default() -> Self {
        Self {
            version: 2,
            error_correction: ErrorCorrection::M,
            box_size: 10,
            border: 4,
        }
    }
}

/// Генератор QR-кодов
pub struct QrGenerator {
    config: QrGenConfig,
}

impl Default for QrGenerator {
    fn default() -> Self {
        Self::new(QrGenConfig::default())
    }
}

impl QrGenerator {
    pub fn new(config: QrGenConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QrGenConfig {
        &self.config
    }

    /// Кодирование с подбором минимальной подходящей версии, начиная с заданной
    pub fn encode(&self, data: &str) -> Result<QrCode, GenerationError> {
        let start = self.config.version;
        if !(1..=MAX_VERSION).contains(&start) {
            return Err(GenerationError::InvalidVersion(start));
        }
        let ec_level: EcLevel = self.config.error_correction.into();

        for version in start..=MAX_VERSION {
            match QrCode::with_version(data.as_bytes(), Version::Normal(version), ec_level) {
                Ok(code) => {
                    log::info!("Encoded {} bytes as QR version {}", data.len(), version);
                    return Ok(code);
                }
                Err(QrError::DataTooLong) => {
                    log::debug!("Version {} is too small, trying next", version);
                }
                Err(e) => return Err(GenerationError::Encoding(e.to_string())),
            }
        }

        Err(GenerationError::DataTooLong)
    }

    /// Генерация изображения QR-кода: чёрные модули на белом фоне
    pub fn generate(&self, data: &str) -> Result<GrayImage, GenerationError> {
        let code = self.encode(data)?;
        self.render(&code)
    }

    /// Растеризация готового QR-кода
    pub fn render(&self, code: &QrCode) -> Result<GrayImage, GenerationError> {
        let module_size = self.config.box_size;
        if module_size == 0 {
            return Err(GenerationError::InvalidLayout("box_size must be positive".into()));
        }

        let quiet_zone = self.config.border;
        let width = code.width() as u32;
        let doc_width = (width + quiet_zone * 2) * module_size;
        let mut img = GrayImage::from_pixel(doc_width, doc_width, Luma([255]));

        for y in 0..width {
            for x in 0..width {
                if code[(x as usize, y as usize)] != Color::Dark {
                    continue;
                }
                let px = (quiet_zone + x) * module_size;
                let py = (quiet_zone + y) * module_size;
                for dy in 0..module_size {
                    for dx in 0..module_size {
                        img.put_pixel(px + dx, py + dy, Luma([0]));
                    }
                }
            }
        }

        Ok(img)
    }
}
