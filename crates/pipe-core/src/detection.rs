//! Модуль обнаружения дефектов
//!
//! Классический конвейер: предобработка -> Canny -> дилатация -> внешние контуры.
//! Контуры с площадью ниже порога считаются шумом.

use image::{GrayImage, Luma, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::morphology::dilate;
use imageproc::point::Point;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::annotate;
use crate::preprocessing::{ImageProcessor, ProcessingConfig};
use crate::InspectionError;

/// Конфигурация детектора дефектов
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefectConfig {
    /// Нижний порог гистерезиса Canny
    pub canny_low: f32,
    /// Верхний порог гистерезиса Canny
    pub canny_high: f32,
    /// Размер прямоугольного ядра дилатации (ширина, высота);
    /// нулевая сторона отключает дилатацию
    pub dilate_kernel: (u32, u32),
    /// Минимальная площадь контура в пикселях
    pub min_area: f64,
}

impl DefectConfig {
    /// Обзорный режим: чувствительнее к мелким царапинам
    pub fn survey() -> Self {
        Self {
            canny_low: 50.0,
            canny_high: 150.0,
            dilate_kernel: (3, 3),
            min_area: 150.0,
        }
    }

    /// Режим осмотра трубы: более низкие пороги, только крупные области
    pub fn inspection() -> Self {
        Self {
            canny_low: 30.0,
            canny_high: 120.0,
            dilate_kernel: (2, 2),
            min_area: 500.0,
        }
    }

    /// Проверка порогов: `canny` требует `canny_low <= canny_high`
    pub fn validate(&self) -> Result<(), InspectionError> {
        if !(self.canny_low >= 0.0 && self.canny_low <= self.canny_high) {
            return Err(InspectionError::Config(format!(
                "canny_low ({}) must be in 0..=canny_high ({})",
                self.canny_low, self.canny_high
            )));
        }
        if self.min_area < 0.0 {
            return Err(InspectionError::Config("min_area is negative".into()));
        }
        Ok(())
    }
}

impl Default for DefectConfig {
    fn default() -> Self {
        Self::inspection()
    }
}

/// Прямоугольник [x, y, width, height] в координатах уменьшенного изображения
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Охватывающий прямоугольник набора точек (включительно)
    pub fn from_points(points: &[Point<i32>]) -> Option<Self> {
        let min_x = points.iter().map(|p| p.x).min()?;
        let max_x = points.iter().map(|p| p.x).max()?;
        let min_y = points.iter().map(|p| p.y).min()?;
        let max_y = points.iter().map(|p| p.y).max()?;

        Some(Self {
            x: min_x.max(0) as u32,
            y: min_y.max(0) as u32,
            width: (max_x - min_x + 1) as u32,
            height: (max_y - min_y + 1) as u32,
        })
    }

    pub fn as_tuple(&self) -> (u32, u32, u32, u32) {
        (self.x, self.y, self.width, self.height)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x, self.y, self.width, self.height)
    }
}

/// Область-кандидат в дефекты
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefectRegion {
    pub bbox: BoundingBox,
    /// Площадь контура (формула шнурования)
    pub area: f64,
    #[serde(skip)]
    pub contour: Vec<Point<i32>>,
}

/// Результат обнаружения вместе со всеми промежуточными изображениями
#[derive(Debug, Clone)]
pub struct DefectDetection {
    pub resized: RgbImage,
    pub gray: GrayImage,
    pub enhanced: GrayImage,
    pub edges: GrayImage,
    pub dilated: GrayImage,
    pub regions: Vec<DefectRegion>,
}

impl DefectDetection {
    pub fn bboxes(&self) -> Vec<BoundingBox> {
        self.regions.iter().map(|r| r.bbox).collect()
    }

    /// Маска: каждый найденный контур залит белым
    pub fn mask(&self) -> GrayImage {
        let (width, height) = self.gray.dimensions();
        let mut mask = GrayImage::from_pixel(width, height, Luma([0]));
        for region in &self.regions {
            annotate::fill_contour(&mut mask, &region.contour, Luma([255]));
        }
        mask
    }

    /// Исходное (уменьшенное) изображение с нарисованными рамками
    pub fn annotated(&self) -> RgbImage {
        annotate::draw_boxes(
            &self.resized,
            &self.bboxes(),
            annotate::BOX_COLOR,
            annotate::BOX_THICKNESS,
        )
    }
}

/// Детектор дефектов
pub struct DefectDetector {
    processor: ImageProcessor,
    config: DefectConfig,
}

impl Default for DefectDetector {
    fn default() -> Self {
        Self {
            processor: ImageProcessor::default(),
            config: DefectConfig::default(),
        }
    }
}

impl DefectDetector {
    pub fn new(processing: ProcessingConfig, config: DefectConfig) -> Result<Self, InspectionError> {
        config.validate()?;
        Ok(Self {
            processor: ImageProcessor::new(processing),
            config,
        })
    }

    pub fn config(&self) -> &DefectConfig {
        &self.config
    }

    /// Полный проход конвейера по изображению поверхности
    pub fn detect(&self, img: &RgbImage) -> DefectDetection {
        let stages = self.processor.process(img);

        log::info!(
            "Running Canny ({}, {})",
            self.config.canny_low, self.config.canny_high
        );
        let edges = canny(&stages.enhanced, self.config.canny_low, self.config.canny_high);

        let dilated = dilate_rect(&edges, self.config.dilate_kernel);

        let regions = self.find_regions(&dilated);
        log::info!("Detection done, found: {}", regions.len());

        DefectDetection {
            resized: stages.resized,
            gray: stages.gray,
            enhanced: stages.enhanced,
            edges,
            dilated,
            regions,
        }
    }

    /// Внешние контуры бинарной маски, прошедшие фильтр по площади
    pub fn find_regions(&self, binary: &GrayImage) -> Vec<DefectRegion> {
        let contours = find_contours::<i32>(binary);
        log::debug!("Found {} raw contours", contours.len());

        contours
            .into_iter()
            .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
            .filter_map(|c| {
                let area = contour_area(&c.points);
                if area < self.config.min_area {
                    return None;
                }
                let bbox = BoundingBox::from_points(&c.points)?;
                Some(DefectRegion {
                    bbox,
                    area,
                    contour: c.points,
                })
            })
            .collect()
    }
}

/// Дилатация прямоугольным ядром `w x h` с якорем в `(w / 2, h / 2)`, как в OpenCV.
/// Квадратные ядра нечётного размера идут через `imageproc::morphology::dilate`.
pub fn dilate_rect(img: &GrayImage, (kw, kh): (u32, u32)) -> GrayImage {
    if kw == 0 || kh == 0 || (kw == 1 && kh == 1) {
        return img.clone();
    }
    if kw == kh && kw % 2 == 1 && kw / 2 <= u8::MAX as u32 {
        return dilate(img, Norm::LInf, (kw / 2) as u8);
    }

    let (width, height) = img.dimensions();
    let (ax, ay) = ((kw / 2) as i64, (kh / 2) as i64);
    let mut result = GrayImage::new(width, height);

    for y in 0..height as i64 {
        for x in 0..width as i64 {
            let mut value = 0u8;
            for dy in 0..kh as i64 {
                let sy = y + dy - ay;
                if sy < 0 || sy >= height as i64 {
                    continue;
                }
                for dx in 0..kw as i64 {
                    let sx = x + dx - ax;
                    if sx < 0 || sx >= width as i64 {
                        continue;
                    }
                    value = value.max(img.get_pixel(sx as u32, sy as u32).0[0]);
                }
            }
            result.put_pixel(x as u32, y as u32, Luma([value]));
        }
    }

    result
}

/// Площадь многоугольника по формуле шнурования
pub fn contour_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }

    let twice_area: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum();

    twice_area.abs() as f64 / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: i32, y: i32, side: i32) -> Vec<Point<i32>> {
        vec![
            Point::new(x, y),
            Point::new(x + side, y),
            Point::new(x + side, y + side),
            Point::new(x, y + side),
        ]
    }

    #[test]
    fn test_presets() {
        let survey = DefectConfig::survey();
        assert_eq!((survey.canny_low, survey.canny_high), (50.0, 150.0));
        assert_eq!(survey.min_area, 150.0);

        assert_eq!(survey.dilate_kernel, (3, 3));

        let default = DefectConfig::default();
        assert_eq!((default.canny_low, default.canny_high), (30.0, 120.0));
        assert_eq!(default.min_area, 500.0);
        assert_eq!(default.dilate_kernel, (2, 2));
    }

    fn lit(img: &GrayImage) -> Vec<(u32, u32)> {
        img.enumerate_pixels()
            .filter(|(_, _, p)| p.0[0] > 0)
            .map(|(x, y, _)| (x, y))
            .collect()
    }

    #[test]
    fn test_dilate_2x2_grows_down_and_right() {
        let mut edges = GrayImage::new(10, 10);
        edges.put_pixel(5, 5, Luma([255]));

        let dilated = dilate_rect(&edges, DefectConfig::inspection().dilate_kernel);
        assert_eq!(lit(&dilated), vec![(5, 5), (6, 5), (5, 6), (6, 6)]);
    }

    #[test]
    fn test_dilate_3x3_and_disabled() {
        let mut edges = GrayImage::new(10, 10);
        edges.put_pixel(5, 5, Luma([255]));

        assert_eq!(lit(&dilate_rect(&edges, (3, 3))).len(), 9);
        assert_eq!(dilate_rect(&edges, (0, 0)), edges);

        // Ядро у границы не выходит за изображение
        let mut corner = GrayImage::new(4, 4);
        corner.put_pixel(0, 0, Luma([255]));
        assert_eq!(lit(&dilate_rect(&corner, (2, 2))), vec![(0, 0), (1, 0), (0, 1), (1, 1)]);
    }

    #[test]
    fn test_detector_rejects_inverted_thresholds() {
        let config = DefectConfig {
            canny_low: 200.0,
            canny_high: 100.0,
            ..DefectConfig::survey()
        };
        assert!(matches!(
            DefectDetector::new(ProcessingConfig::default(), config),
            Err(InspectionError::Config(_))
        ));
    }

    #[test]
    fn test_contour_area() {
        assert_eq!(contour_area(&square(5, 5, 10)), 100.0);
        // Обход в обратную сторону даёт ту же площадь
        let mut reversed = square(5, 5, 10);
        reversed.reverse();
        assert_eq!(contour_area(&reversed), 100.0);
        assert_eq!(contour_area(&[Point::new(0, 0), Point::new(4, 4)]), 0.0);
    }

    #[test]
    fn test_bounding_box_is_inclusive() {
        let bbox = BoundingBox::from_points(&square(3, 4, 10)).unwrap();
        assert_eq!(bbox.as_tuple(), (3, 4, 11, 11));
        assert_eq!(bbox.to_string(), "(3, 4, 11, 11)");
        assert!(BoundingBox::from_points(&[]).is_none());
    }

    #[test]
    fn test_find_regions_filters_small_and_inner() {
        let detector = DefectDetector::new(ProcessingConfig::default(), DefectConfig::survey()).unwrap();

        let mut binary = GrayImage::new(100, 100);
        // Крупная рамка 40x40 с пустым центром
        for i in 10..50 {
            for t in 0..2 {
                binary.put_pixel(i, 10 + t, Luma([255]));
                binary.put_pixel(i, 48 + t, Luma([255]));
                binary.put_pixel(10 + t, i, Luma([255]));
                binary.put_pixel(48 + t, i, Luma([255]));
            }
        }
        // Точка внутри рамки: вложенный контур, не внешний
        for y in 28..32 {
            for x in 28..32 {
                binary.put_pixel(x, y, Luma([255]));
            }
        }
        // Мелкий шум снаружи
        for y in 80..83 {
            for x in 80..83 {
                binary.put_pixel(x, y, Luma([255]));
            }
        }

        let regions = detector.find_regions(&binary);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].bbox.as_tuple(), (10, 10, 40, 40));
        assert!(regions[0].area >= 150.0);
    }

    #[test]
    fn test_blank_surface_has_no_defects() {
        let detector = DefectDetector::default();
        let img = RgbImage::from_pixel(300, 200, image::Rgb([120, 120, 120]));
        let detection = detector.detect(&img);
        assert!(detection.regions.is_empty());
        assert!(detection.mask().pixels().all(|p| p.0[0] == 0));
        assert_eq!(detection.edges.dimensions(), (512, 512));
    }
}
