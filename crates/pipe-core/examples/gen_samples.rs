//! Generator of sample inputs for the CLI demos
//!
//! Usage: cargo run -p pipe-core --example gen_samples [output_dir]
//!
//! Writes `barcode.jpg` (QR tag) and `input.jpg` (scratched pipe surface).

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_ellipse_mut, draw_line_segment_mut};
use imageproc::filter::gaussian_blur_f32;
use pipe_core::io::save_image;
use pipe_core::QrGenerator;
use rand::Rng;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&output_dir)?;

    let barcode = QrGenerator::default().generate("PIPE12345")?;
    save_image(&DynamicImage::ImageLuma8(barcode), output_dir.join("barcode.jpg"))?;
    println!("Created barcode.jpg");

    let surface = scratched_surface(800, 600);
    save_image(&DynamicImage::ImageRgb8(surface), output_dir.join("input.jpg"))?;
    println!("Created input.jpg");

    Ok(())
}

fn scratched_surface(width: u32, height: u32) -> RgbImage {
    let mut rng = rand::thread_rng();
    let mut img = RgbImage::new(width, height);

    // Metallic background: horizontal shading plus fine noise
    for (_, y, p) in img.enumerate_pixels_mut() {
        let shade = 140.0 + 30.0 * (y as f32 / height as f32 * std::f32::consts::PI).sin();
        let noise: f32 = rng.gen_range(-6.0..6.0);
        let v = (shade + noise).clamp(0.0, 255.0) as u8;
        *p = Rgb([v, v, v.saturating_add(5)]);
    }

    // Scratches
    for _ in 0..4 {
        let x0 = rng.gen_range(50.0..width as f32 - 50.0);
        let y0 = rng.gen_range(50.0..height as f32 - 50.0);
        let len: f32 = rng.gen_range(80.0..220.0);
        let angle: f32 = rng.gen_range(0.0..std::f32::consts::PI);
        let end = (x0 + len * angle.cos(), y0 + len * angle.sin());
        for offset in 0..3 {
            let o = offset as f32;
            draw_line_segment_mut(&mut img, (x0, y0 + o), (end.0, end.1 + o), Rgb([45, 45, 50]));
        }
    }

    // Corrosion pits
    for _ in 0..2 {
        let cx = rng.gen_range(60..width as i32 - 60);
        let cy = rng.gen_range(60..height as i32 - 60);
        draw_filled_ellipse_mut(&mut img, (cx, cy), 25, 15, Rgb([70, 55, 40]));
    }

    gaussian_blur_f32(&img, 0.7)
}
