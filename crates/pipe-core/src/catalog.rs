//! Модуль справочника труб
//!
//! Имитация учётной системы: два захардкоженных паспорта труб.
//! Поиск — точное совпадение идентификатора из QR-кода.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::InspectionError;

/// Пометка для идентификатора, которого нет в справочнике
pub const NOT_FOUND_NOTE: &str = "Not found in demo DB";

/// Паспорт трубы
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipeRecord {
    /// Марка стали (X52, X60, ...)
    pub grade: String,
    /// Номер плавки
    pub heat: String,
    /// Длина в метрах
    pub length_m: f64,
}

impl PipeRecord {
    pub fn new(grade: &str, heat: &str, length_m: f64) -> Self {
        Self {
            grade: grade.to_string(),
            heat: heat.to_string(),
            length_m,
        }
    }
}

/// Результат поиска в справочнике
///
/// Сериализуется без тега, поэтому JSON совпадает по форме с исходной записью
/// либо с `{"note": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PipeDetails {
    Found(PipeRecord),
    NotFound { note: String },
}

impl PipeDetails {
    pub fn not_found() -> Self {
        PipeDetails::NotFound {
            note: NOT_FOUND_NOTE.to_string(),
        }
    }

    pub fn record(&self) -> Option<&PipeRecord> {
        match self {
            PipeDetails::Found(record) => Some(record),
            PipeDetails::NotFound { .. } => None,
        }
    }

    pub fn is_found(&self) -> bool {
        self.record().is_some()
    }
}

impl fmt::Display for PipeDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipeDetails::Found(r) => write!(
                f,
                "{{'grade': '{}', 'heat': '{}', 'length_m': {:?}}}",
                r.grade, r.heat, r.length_m
            ),
            PipeDetails::NotFound { note } => write!(f, "{{'note': '{}'}}", note),
        }
    }
}

/// Справочник труб
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipeCatalog {
    records: BTreeMap<String, PipeRecord>,
}

impl Default for PipeCatalog {
    fn default() -> Self {
        Self::demo()
    }
}

impl PipeCatalog {
    /// Демонстрационный справочник из двух записей
    pub fn demo() -> Self {
        let mut records = BTreeMap::new();
        records.insert("PIPE12345".to_string(), PipeRecord::new("X52", "H9001", 12.0));
        records.insert("PIPE67890".to_string(), PipeRecord::new("X60", "H9002", 10.0));
        Self { records }
    }

    /// Загрузка справочника из JSON-объекта `{ "<id>": { grade, heat, length_m } }`
    pub fn from_json_str(json: &str) -> Result<Self, InspectionError> {
        let records: BTreeMap<String, PipeRecord> = serde_json::from_str(json)?;
        Ok(Self { records })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, InspectionError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let catalog = Self::from_json_str(&raw)?;
        log::info!("Loaded catalog with {} records from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    /// Поиск паспорта по идентификатору
    pub fn fetch_details(&self, pipe_id: &str) -> PipeDetails {
        match self.records.get(pipe_id) {
            Some(record) => PipeDetails::Found(record.clone()),
            None => {
                log::debug!("Pipe id {:?} is not in the catalog", pipe_id);
                PipeDetails::not_found()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }
}
