//! Общая конфигурация демо
//!
//! Все поля имеют значения по умолчанию, поэтому JSON-файл может задавать
//! только то, что нужно переопределить.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::catalog::PipeCatalog;
use crate::detection::DefectConfig;
use crate::generation::QrGenConfig;
use crate::preprocessing::ProcessingConfig;
use crate::InspectionError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectionConfig {
    pub processing: ProcessingConfig,
    /// Пороги для команды `preprocess`
    pub survey: DefectConfig,
    /// Пороги для команды `inspect`
    pub inspection: DefectConfig,
    pub qr: QrGenConfig,
    /// Внешний справочник вместо встроенного
    pub catalog: Option<PathBuf>,
}

impl Default for InspectionConfig {
    fn default() -> Self {
        Self {
            processing: ProcessingConfig::default(),
            survey: DefectConfig::survey(),
            inspection: DefectConfig::inspection(),
            qr: QrGenConfig::default(),
            catalog: None,
        }
    }
}

impl InspectionConfig {
    pub fn from_json_str(json: &str) -> Result<Self, InspectionError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, InspectionError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), InspectionError> {
        let p = &self.processing;
        if p.width == 0 || p.height == 0 {
            return Err(InspectionError::Config("processing size must be positive".into()));
        }
        if p.clahe_tiles.0 == 0 || p.clahe_tiles.1 == 0 {
            return Err(InspectionError::Config("clahe_tiles must be positive".into()));
        }
        for (name, defect) in [("survey", &self.survey), ("inspection", &self.inspection)] {
            defect.validate().map_err(|e| match e {
                InspectionError::Config(msg) => InspectionError::Config(format!("{name}: {msg}")),
                other => other,
            })?;
        }
        Ok(())
    }

    /// Справочник из файла, если он задан, иначе встроенный
    pub fn load_catalog(&self) -> Result<PipeCatalog, InspectionError> {
        match &self.catalog {
            Some(path) => PipeCatalog::from_json_file(path),
            None => Ok(PipeCatalog::demo()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config() {
        let config = InspectionConfig::from_json_str(r#"{ "inspection": { "min_area": 42.0 } }"#).unwrap();
        assert_eq!(config.inspection.min_area, 42.0);
        assert_eq!(config.inspection.canny_low, 30.0);
        assert_eq!(config.inspection.dilate_kernel, (2, 2));
        assert_eq!(config.survey.min_area, 150.0);
        assert_eq!(config.processing.width, 512);
        assert!(config.catalog.is_none());
    }

    #[test]
    fn test_invalid_thresholds() {
        let json = r#"{ "survey": { "canny_low": 200.0, "canny_high": 100.0 } }"#;
        assert!(matches!(
            InspectionConfig::from_json_str(json),
            Err(InspectionError::Config(_))
        ));
    }

    #[test]
    fn test_dilate_kernel_from_json() {
        let json = r#"{ "survey": { "dilate_kernel": [5, 1] } }"#;
        let config = InspectionConfig::from_json_str(json).unwrap();
        assert_eq!(config.survey.dilate_kernel, (5, 1));
        assert_eq!(config.survey.canny_low, 30.0);
    }

    #[test]
    fn test_default_catalog() {
        let catalog = InspectionConfig::default().load_catalog().unwrap();
        assert_eq!(catalog, PipeCatalog::demo());
    }
}
