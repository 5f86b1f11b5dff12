//! Pipe Core - Модуль осмотра труб
//!
//! Библиотека для демонстрационного конвейера осмотра:
//! - Генерация QR-кода с идентификатором трубы
//! - Декодирование QR через rqrr с fallback на rxing
//! - Поиск паспорта трубы в справочнике
//! - Классическое обнаружение дефектов (CLAHE, Canny, контуры)
//! - Текстовая инструкция для маркировщика

pub mod actuator;
pub mod annotate;
pub mod catalog;
pub mod config;
pub mod decoding;
pub mod detection;
pub mod generation;
pub mod io;
pub mod preprocessing;

pub use actuator::SprayInstruction;
pub use catalog::{PipeCatalog, PipeDetails, PipeRecord};
pub use config::InspectionConfig;
pub use decoding::{DecodeError, DecodedQR, QRDecoder};
pub use detection::{BoundingBox, DefectConfig, DefectDetection, DefectDetector, DefectRegion};
pub use generation::{GenerationError, QrGenConfig, QrGenerator};
pub use preprocessing::{ImageProcessor, ProcessingConfig};

use image::{DynamicImage, GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Основные ошибки модуля
#[derive(Error, Debug)]
pub enum InspectionError {
    #[error("{} not found", .0.display())]
    ImageNotFound(PathBuf),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("No QR code detected")]
    NoQrCode,

    #[error("Decode error: {0}")]
    Decode(DecodeError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<DecodeError> for InspectionError {
    fn from(e: DecodeError) -> Self {
        match e {
            DecodeError::NotFound => InspectionError::NoQrCode,
            other => InspectionError::Decode(other),
        }
    }
}

/// Результат сканирования QR-метки трубы
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOutcome {
    /// Идентификатор трубы из QR-кода
    pub pipe_id: String,
    /// Паспорт из справочника
    pub details: PipeDetails,
    /// Контур QR-кода на исходном изображении
    pub points: Vec<(f32, f32)>,
}

/// Итог осмотра одной трубы
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionReport {
    pub pipe_id: String,
    pub details: PipeDetails,
    pub regions: Vec<DefectRegion>,
    pub instruction: SprayInstruction,
}

/// Главный объект демо: сканирование метки и осмотр поверхности
pub struct PipeInspector {
    decoder: QRDecoder,
    detector: DefectDetector,
    catalog: PipeCatalog,
}

impl Default for PipeInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl PipeInspector {
    /// Инспектор с настройками по умолчанию и встроенным справочником
    pub fn new() -> Self {
        Self {
            decoder: QRDecoder::new(),
            detector: DefectDetector::default(),
            catalog: PipeCatalog::demo(),
        }
    }

    /// Пороги проверяются здесь же: `canny_low > canny_high` даёт `Config`
    pub fn with_config(
        processing: ProcessingConfig,
        defects: DefectConfig,
        catalog: PipeCatalog,
    ) -> Result<Self, InspectionError> {
        Ok(Self {
            decoder: QRDecoder::new(),
            detector: DefectDetector::new(processing, defects)?,
            catalog,
        })
    }

    /// Инспектор по общей конфигурации (пороги режима `inspection`)
    pub fn from_config(config: &InspectionConfig) -> Result<Self, InspectionError> {
        config.validate()?;
        let catalog = config.load_catalog()?;
        Self::with_config(config.processing.clone(), config.inspection.clone(), catalog)
    }

    pub fn catalog(&self) -> &PipeCatalog {
        &self.catalog
    }

    /// Сканирование метки: декодирование QR и поиск в справочнике
    pub fn scan_barcode(&self, img: &DynamicImage) -> Result<ScanOutcome, InspectionError> {
        self.scan_gray(&img.to_luma8())
    }

    pub fn scan_gray(&self, gray: &GrayImage) -> Result<ScanOutcome, InspectionError> {
        log::info!("Scanning barcode image {:?}", gray.dimensions());
        let decoded = self.decoder.decode(gray)?;
        if decoded.content.is_empty() {
            return Err(InspectionError::NoQrCode);
        }

        let details = self.catalog.fetch_details(&decoded.content);
        log::info!("Scanned id {:?}, found in catalog: {}", decoded.content, details.is_found());

        Ok(ScanOutcome {
            pipe_id: decoded.content,
            details,
            points: decoded.points,
        })
    }

    /// Поиск дефектов на изображении поверхности
    pub fn detect_defects(&self, surface: &RgbImage) -> DefectDetection {
        self.detector.detect(surface)
    }

    /// Полный осмотр: сначала метка, затем поверхность.
    /// Без читаемого QR поверхность не обрабатывается.
    pub fn inspect(
        &self,
        barcode: &DynamicImage,
        surface: &DynamicImage,
    ) -> Result<(InspectionReport, DefectDetection), InspectionError> {
        let scan = self.scan_barcode(barcode)?;
        let detection = self.detect_defects(&surface.to_rgb8());
        let instruction = SprayInstruction::from_regions(&detection.bboxes());
        log::info!("Inspection of {} complete: {} region(s)", scan.pipe_id, detection.regions.len());

        let report = InspectionReport {
            pipe_id: scan.pipe_id,
            details: scan.details,
            regions: detection.regions.clone(),
            instruction,
        };
        Ok((report, detection))
    }
}
