//! Модуль предобработки изображений
//!
//! Общая часть конвейера осмотра поверхности:
//! - Приведение к фиксированному размеру
//! - Перевод в оттенки серого
//! - Гауссово размытие
//! - Повышение контрастности (CLAHE)

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbImage};
use imageproc::filter::gaussian_blur_f32;
use imageproc::map::map_colors;
use serde::{Deserialize, Serialize};

/// Коэффициенты BT.601, умноженные на 2^14
const GRAY_R: u32 = 4899;
const GRAY_G: u32 = 9617;
const GRAY_B: u32 = 1868;
const GRAY_SHIFT: u32 = 14;

/// Конфигурация предобработки
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Целевая ширина после ресайза
    pub width: u32,
    /// Целевая высота после ресайза
    pub height: u32,
    /// Sigma гауссова размытия (0 — без размытия).
    /// 0.8 соответствует ядру 3x3.
    pub blur_sigma: f32,
    /// Порог ограничения гистограммы CLAHE
    pub clahe_clip_limit: f32,
    /// Сетка тайлов CLAHE (по X, по Y)
    pub clahe_tiles: (u32, u32),
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            blur_sigma: 0.8,
            clahe_clip_limit: 3.0,
            clahe_tiles: (8, 8),
        }
    }
}

/// Промежуточные результаты предобработки
#[derive(Debug, Clone)]
pub struct ProcessedStages {
    pub resized: RgbImage,
    pub gray: GrayImage,
    pub enhanced: GrayImage,
}

/// Процессор изображений
pub struct ImageProcessor {
    config: ProcessingConfig,
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self::new(ProcessingConfig::default())
    }
}

impl ImageProcessor {
    /// Создание процессора с конфигурацией
    pub fn new(config: ProcessingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// Полная обработка изображения
    pub fn process(&self, img: &RgbImage) -> ProcessedStages {
        log::info!("Preprocessing {:?} image", img.dimensions());
        let resized = self.resize(img);
        let gray = self.to_gray(&resized);
        let blurred = self.blur(&gray);
        let enhanced = self.enhance_contrast(&blurred);
        log::info!("Preprocessing done, resulting size: {:?}", enhanced.dimensions());

        ProcessedStages {
            resized,
            gray,
            enhanced,
        }
    }

    /// Ресайз до точного размера (пропорции не сохраняются)
    pub fn resize(&self, img: &RgbImage) -> RgbImage {
        let (width, height) = (self.config.width, self.config.height);
        if img.dimensions() == (width, height) {
            return img.clone();
        }
        imageops::resize(img, width, height, FilterType::Triangle)
    }

    /// Яркость по BT.601 (0.299 R + 0.587 G + 0.114 B) в фиксированной точке,
    /// с округлением как в OpenCV
    pub fn to_gray(&self, img: &RgbImage) -> GrayImage {
        map_colors(img, |p| {
            let [r, g, b] = p.0;
            let y = r as u32 * GRAY_R + g as u32 * GRAY_G + b as u32 * GRAY_B;
            Luma([((y + (1 << (GRAY_SHIFT - 1))) >> GRAY_SHIFT) as u8])
        })
    }

    /// Подавление шумов
    pub fn blur(&self, img: &GrayImage) -> GrayImage {
        if self.config.blur_sigma <= 0.0 {
            return img.clone();
        }
        gaussian_blur_f32(img, self.config.blur_sigma)
    }

    /// Повышение контрастности через CLAHE
    pub fn enhance_contrast(&self, img: &GrayImage) -> GrayImage {
        let (tiles_x, tiles_y) = self.config.clahe_tiles;
        clahe(img, tiles_x, tiles_y, self.config.clahe_clip_limit)
    }
}

/// Contrast Limited Adaptive Histogram Equalization.
///
/// Each tile gets a clipped, equalized lookup table; every pixel is mapped
/// through the four nearest tile tables and bilinearly blended. Tiles on the
/// right and bottom edges absorb the remainder when the image size is not a
/// multiple of the grid.
pub fn clahe(img: &GrayImage, tiles_x: u32, tiles_y: u32, clip_limit: f32) -> GrayImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 || tiles_x == 0 || tiles_y == 0 {
        return img.clone();
    }

    let tile_w = width.div_ceil(tiles_x);
    let tile_h = height.div_ceil(tiles_y);

    let mut luts = vec![[0u8; 256]; (tiles_x * tiles_y) as usize];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = (tx * tile_w).min(width);
            let y0 = (ty * tile_h).min(height);
            let x1 = ((tx + 1) * tile_w).min(width);
            let y1 = ((ty + 1) * tile_h).min(height);
            luts[(ty * tiles_x + tx) as usize] = tile_lut(img, x0, y0, x1, y1, clip_limit);
        }
    }

    let inv_tw = 1.0 / tile_w as f32;
    let inv_th = 1.0 / tile_h as f32;
    let mut result = GrayImage::new(width, height);

    for y in 0..height {
        let tyf = y as f32 * inv_th - 0.5;
        let ty1 = tyf.floor() as i64;
        let ya = tyf - ty1 as f32;
        let ty2 = (ty1 + 1).min(tiles_y as i64 - 1) as usize;
        let ty1 = ty1.max(0) as usize;

        for x in 0..width {
            let txf = x as f32 * inv_tw - 0.5;
            let tx1 = txf.floor() as i64;
            let xa = txf - tx1 as f32;
            let tx2 = (tx1 + 1).min(tiles_x as i64 - 1) as usize;
            let tx1 = tx1.max(0) as usize;

            let v = img.get_pixel(x, y).0[0] as usize;
            let row1 = ty1 * tiles_x as usize;
            let row2 = ty2 * tiles_x as usize;

            let top = luts[row1 + tx1][v] as f32 * (1.0 - xa) + luts[row1 + tx2][v] as f32 * xa;
            let bottom = luts[row2 + tx1][v] as f32 * (1.0 - xa) + luts[row2 + tx2][v] as f32 * xa;
            let value = top * (1.0 - ya) + bottom * ya;

            result.put_pixel(x, y, Luma([value.round().clamp(0.0, 255.0) as u8]));
        }
    }

    result
}

/// Таблица преобразования одного тайла
fn tile_lut(img: &GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, clip_limit: f32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    let area = (x1 - x0) * (y1 - y0);
    if area == 0 {
        for (i, v) in lut.iter_mut().enumerate() {
            *v = i as u8;
        }
        return lut;
    }

    let mut hist = [0u32; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[img.get_pixel(x, y).0[0] as usize] += 1;
        }
    }

    if clip_limit > 0.0 {
        let clip = ((clip_limit * area as f32 / 256.0) as u32).max(1);
        let mut excess = 0u32;
        for bin in hist.iter_mut() {
            if *bin > clip {
                excess += *bin - clip;
                *bin = clip;
            }
        }

        let per_bin = excess / 256;
        let remainder = (excess % 256) as usize;
        for bin in hist.iter_mut() {
            *bin += per_bin;
        }
        if remainder > 0 {
            let step = (256 / remainder).max(1);
            for bin in hist.iter_mut().step_by(step).take(remainder) {
                *bin += 1;
            }
        }
    }

    let scale = 255.0 / area as f32;
    let mut cdf = 0u32;
    for (i, bin) in hist.iter().enumerate() {
        cdf += bin;
        lut[i] = (cdf as f32 * scale).round().min(255.0) as u8;
    }
    lut
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_resize_to_fixed_size() {
        let processor = ImageProcessor::default();
        let img = RgbImage::from_pixel(1024, 300, Rgb([10, 20, 30]));
        assert_eq!(processor.resize(&img).dimensions(), (512, 512));
    }

    #[test]
    fn test_process_stages_share_size() {
        let processor = ImageProcessor::default();
        let img = RgbImage::from_pixel(200, 100, Rgb([90, 90, 90]));
        let stages = processor.process(&img);
        assert_eq!(stages.resized.dimensions(), (512, 512));
        assert_eq!(stages.gray.dimensions(), (512, 512));
        assert_eq!(stages.enhanced.dimensions(), (512, 512));
    }

    #[test]
    fn test_blur_disabled() {
        let processor = ImageProcessor::new(ProcessingConfig {
            blur_sigma: 0.0,
            ..Default::default()
        });
        let mut img = GrayImage::from_pixel(16, 16, Luma([0]));
        img.put_pixel(8, 8, Luma([255]));
        assert_eq!(processor.blur(&img), img);
    }

    #[test]
    fn test_gray_uses_bt601_weights() {
        let processor = ImageProcessor::default();
        let mut img = RgbImage::new(4, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img.put_pixel(1, 0, Rgb([0, 255, 0]));
        img.put_pixel(2, 0, Rgb([0, 0, 255]));
        img.put_pixel(3, 0, Rgb([255, 255, 255]));

        let gray = processor.to_gray(&img);
        assert_eq!(gray.get_pixel(0, 0).0[0], 76);
        assert_eq!(gray.get_pixel(1, 0).0[0], 150);
        assert_eq!(gray.get_pixel(2, 0).0[0], 29);
        assert_eq!(gray.get_pixel(3, 0).0[0], 255);
    }

    #[test]
    fn test_clahe_preserves_dimensions() {
        let img = GrayImage::from_pixel(80, 60, Luma([128]));
        assert_eq!(clahe(&img, 8, 8, 3.0).dimensions(), (80, 60));

        let odd = GrayImage::from_pixel(37, 5, Luma([128]));
        assert_eq!(clahe(&odd, 8, 8, 3.0).dimensions(), (37, 5));
    }

    #[test]
    fn test_clahe_uniform_image_stays_uniform() {
        let img = GrayImage::from_pixel(64, 64, Luma([128]));
        let result = clahe(&img, 8, 8, 3.0);
        let first = result.get_pixel(0, 0).0[0];
        assert!(result.pixels().all(|p| p.0[0] == first));
    }

    #[test]
    fn test_clahe_zero_dimensions_returns_copy() {
        let img = GrayImage::new(0, 0);
        assert_eq!(clahe(&img, 8, 8, 3.0).dimensions(), (0, 0));

        let img = GrayImage::from_pixel(4, 4, Luma([7]));
        assert_eq!(clahe(&img, 0, 8, 3.0), img);
    }

    #[test]
    fn test_clahe_stretches_low_contrast() {
        // Две полосы 100/150 — после выравнивания разница должна вырасти
        let mut img = GrayImage::new(64, 64);
        for (x, _, p) in img.enumerate_pixels_mut() {
            *p = Luma([if x < 32 { 100 } else { 150 }]);
        }
        let result = clahe(&img, 1, 1, 0.0);
        let dark = result.get_pixel(0, 0).0[0] as i32;
        let bright = result.get_pixel(63, 0).0[0] as i32;
        assert!(bright - dark > 50);
    }
}
