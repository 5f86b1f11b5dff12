//! Инструкция для маркировщика
//!
//! Реального контроллера нет: инструкция только формируется и печатается.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::detection::BoundingBox;

/// Сколько областей перечислять в тексте инструкции
pub const PREVIEW_LIMIT: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SprayInstruction {
    NoSpray,
    Mark { regions: Vec<BoundingBox> },
}

impl SprayInstruction {
    pub fn from_regions(regions: &[BoundingBox]) -> Self {
        if regions.is_empty() {
            SprayInstruction::NoSpray
        } else {
            SprayInstruction::Mark {
                regions: regions.to_vec(),
            }
        }
    }

    pub fn region_count(&self) -> usize {
        match self {
            SprayInstruction::NoSpray => 0,
            SprayInstruction::Mark { regions } => regions.len(),
        }
    }
}

impl fmt::Display for SprayInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let regions = match self {
            SprayInstruction::NoSpray => return write!(f, "No defects detected → No spray"),
            SprayInstruction::Mark { regions } => regions,
        };

        let preview: Vec<String> = regions.iter().take(PREVIEW_LIMIT).map(|b| b.to_string()).collect();
        write!(f, "Spray mark on {} region(s): [{}]", regions.len(), preview.join(", "))?;
        if regions.len() > PREVIEW_LIMIT {
            write!(f, "...")?;
        }
        Ok(())
    }
}
