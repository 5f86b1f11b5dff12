//! Рисование результатов: рамки дефектов, контур QR-кода, маски

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point;
use imageproc::rect::Rect;

use crate::detection::BoundingBox;

/// Зелёный, как у всех аннотаций демо
pub const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const BOX_THICKNESS: u32 = 2;

/// Копия изображения с прямоугольниками вокруг областей
pub fn draw_boxes(img: &RgbImage, boxes: &[BoundingBox], color: Rgb<u8>, thickness: u32) -> RgbImage {
    let mut output = img.clone();
    for bbox in boxes {
        draw_box_mut(&mut output, bbox, color, thickness);
    }
    output
}

/// Прямоугольник толщиной `thickness`, утолщение внутрь
pub fn draw_box_mut(canvas: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>, thickness: u32) {
    for t in 0..thickness.max(1) {
        let (w, h) = (bbox.width.saturating_sub(2 * t), bbox.height.saturating_sub(2 * t));
        if w == 0 || h == 0 {
            break;
        }
        let rect = Rect::at((bbox.x + t) as i32, (bbox.y + t) as i32).of_size(w, h);
        draw_hollow_rect_mut(canvas, rect, color);
    }
}

/// Замкнутая ломаная через точки (контур найденного QR-кода)
pub fn draw_polygon_outline(canvas: &mut RgbImage, points: &[(f32, f32)], color: Rgb<u8>, thickness: u32) {
    if points.len() < 2 {
        return;
    }
    let offsets: Vec<f32> = (0..thickness.max(1)).map(|t| t as f32).collect();

    for (i, &start) in points.iter().enumerate() {
        let end = points[(i + 1) % points.len()];
        for &dx in &offsets {
            for &dy in &offsets {
                draw_line_segment_mut(
                    canvas,
                    (start.0 + dx, start.1 + dy),
                    (end.0 + dx, end.1 + dy),
                    color,
                );
            }
        }
    }
}

/// Заливка контура вместе с его границей
pub fn fill_contour(mask: &mut GrayImage, contour: &[Point<i32>], color: Luma<u8>) {
    let mut poly: Vec<Point<i32>> = Vec::with_capacity(contour.len());
    for &p in contour {
        if poly.last() != Some(&p) {
            poly.push(p);
        }
    }
    // draw_polygon_mut не принимает явно замкнутый многоугольник
    while poly.len() > 1 && poly.first() == poly.last() {
        poly.pop();
    }

    if poly.len() >= 3 {
        draw_polygon_mut(mask, &poly, color);
    }

    let (width, height) = mask.dimensions();
    for p in contour {
        if p.x >= 0 && p.y >= 0 && (p.x as u32) < width && (p.y as u32) < height {
            mask.put_pixel(p.x as u32, p.y as u32, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_boxes_thickness() {
        let img = RgbImage::from_pixel(50, 50, Rgb([0, 0, 0]));
        let out = draw_boxes(&img, &[BoundingBox::new(10, 10, 20, 20)], BOX_COLOR, 2);

        assert_eq!(*out.get_pixel(10, 10), BOX_COLOR);
        assert_eq!(*out.get_pixel(11, 15), BOX_COLOR);
        assert_eq!(*out.get_pixel(12, 15), Rgb([0, 0, 0]));
        assert_eq!(*out.get_pixel(29, 29), BOX_COLOR);
        // Исходное изображение не тронуто
        assert_eq!(*img.get_pixel(10, 10), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_degenerate_box_is_skipped() {
        let mut img = RgbImage::new(10, 10);
        draw_box_mut(&mut img, &BoundingBox::new(2, 2, 0, 5), BOX_COLOR, 2);
        assert!(img.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn test_polygon_outline() {
        let mut img = RgbImage::new(40, 40);
        let square = [(5.0, 5.0), (30.0, 5.0), (30.0, 30.0), (5.0, 30.0)];
        draw_polygon_outline(&mut img, &square, BOX_COLOR, 2);
        assert_eq!(*img.get_pixel(15, 5), BOX_COLOR);
        assert_eq!(*img.get_pixel(5, 20), BOX_COLOR);
        assert_eq!(*img.get_pixel(15, 15), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_fill_contour() {
        let mut mask = GrayImage::new(20, 20);
        let contour = vec![
            Point::new(2, 2),
            Point::new(10, 2),
            Point::new(10, 10),
            Point::new(2, 10),
            Point::new(2, 2),
        ];
        fill_contour(&mut mask, &contour, Luma([255]));
        assert_eq!(mask.get_pixel(6, 6).0[0], 255);
        assert_eq!(mask.get_pixel(2, 2).0[0], 255);
        assert_eq!(mask.get_pixel(15, 15).0[0], 0);
    }
}
