//! Реализация команд CLI

use std::path::Path;

use anyhow::Context;
use image::DynamicImage;
use pipe_core::annotate::{draw_polygon_outline, BOX_COLOR, BOX_THICKNESS};
use pipe_core::io::{load_image, save_image};
use pipe_core::{DefectDetector, InspectionConfig, PipeInspector, QrGenerator};

/// Файлы стадий команды `preprocess` в порядке конвейера
const STAGE_FILES: [&str; 7] = [
    "01_resized.jpg",
    "02_gray.jpg",
    "03_enhanced.jpg",
    "04_edges.jpg",
    "05_dilated.jpg",
    "06_mask.jpg",
    "07_bboxes.jpg",
];

/// Генерация QR-метки
pub fn generate_qr(config: &InspectionConfig, data: &str, output: &Path) -> anyhow::Result<()> {
    let generator = QrGenerator::new(config.qr.clone());
    let img = generator.generate(data)?;
    save_image(&DynamicImage::ImageLuma8(img), output)?;

    println!("✅ Created {} with value: {}", output.display(), data);
    Ok(())
}

/// Сканирование метки и разметка найденного кода
pub fn scan(config: &InspectionConfig, input: &Path, output: &Path) -> anyhow::Result<()> {
    let img = load_image(input)?;
    let inspector = PipeInspector::from_config(config)?;
    let outcome = inspector.scan_barcode(&img)?;

    println!("✅ Scanned ID: {}", outcome.pipe_id);
    println!("✅ Fetched details: {}", outcome.details);

    let mut annotated = img.to_rgb8();
    draw_polygon_outline(&mut annotated, &outcome.points, BOX_COLOR, BOX_THICKNESS);
    save_image(&DynamicImage::ImageRgb8(annotated), output)?;

    println!("✅ Saved annotated image: {}", output.display());
    Ok(())
}

/// Сохранение всех промежуточных изображений поиска дефектов
pub fn preprocess(config: &InspectionConfig, input: &Path, out_dir: &Path) -> anyhow::Result<()> {
    let img = load_image(input)?;
    let detector = DefectDetector::new(config.processing.clone(), config.survey.clone())?;
    let detection = detector.detect(&img.to_rgb8());

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    let stages = [
        DynamicImage::ImageRgb8(detection.resized.clone()),
        DynamicImage::ImageLuma8(detection.gray.clone()),
        DynamicImage::ImageLuma8(detection.enhanced.clone()),
        DynamicImage::ImageLuma8(detection.edges.clone()),
        DynamicImage::ImageLuma8(detection.dilated.clone()),
        DynamicImage::ImageLuma8(detection.mask()),
        DynamicImage::ImageRgb8(detection.annotated()),
    ];
    for (stage, name) in stages.iter().zip(STAGE_FILES) {
        save_image(stage, out_dir.join(name))?;
    }

    log::info!("{} region(s) passed the area filter", detection.regions.len());
    println!("✅ Saved: {}", STAGE_FILES[3..].join(", "));
    Ok(())
}

/// Полный осмотр: метка, поверхность, команда маркировщику
pub fn inspect(
    config: &InspectionConfig,
    input: &Path,
    barcode: &Path,
    out_dir: &Path,
    report_path: Option<&Path>,
) -> anyhow::Result<()> {
    let surface = load_image(input)?;
    let barcode_img = load_image(barcode)?;
    let inspector = PipeInspector::from_config(config)?;

    let (report, detection) = inspector.inspect(&barcode_img, &surface)?;

    println!("✅ Pipe ID: {}", report.pipe_id);
    println!("✅ Pipe details: {}", report.details);
    println!("🟦 Actuator instruction: {}", report.instruction);

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;
    save_image(
        &DynamicImage::ImageLuma8(detection.enhanced.clone()),
        out_dir.join("pipeline_enhanced.jpg"),
    )?;
    save_image(
        &DynamicImage::ImageRgb8(detection.annotated()),
        out_dir.join("pipeline_bboxes.jpg"),
    )?;
    println!("✅ Saved: pipeline_enhanced.jpg, pipeline_bboxes.jpg");

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json).with_context(|| format!("writing report {}", path.display()))?;
        println!("✅ Saved report: {}", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_then_scan() {
        let dir = tempfile::tempdir().unwrap();
        let config = InspectionConfig::default();
        let barcode = dir.path().join("barcode.jpg");
        let result = dir.path().join("barcode_result.jpg");

        generate_qr(&config, "PIPE12345", &barcode).unwrap();
        scan(&config, &barcode, &result).unwrap();
        assert!(result.is_file());
    }

    #[test]
    fn test_preprocess_writes_all_stages() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.png");
        let surface = image::RgbImage::from_pixel(64, 48, image::Rgb([120, 120, 120]));
        save_image(&DynamicImage::ImageRgb8(surface), &input).unwrap();

        let out_dir = dir.path().join("stages");
        preprocess(&InspectionConfig::default(), &input, &out_dir).unwrap();
        for name in STAGE_FILES {
            assert!(out_dir.join(name).is_file(), "{} missing", name);
        }
    }

    #[test]
    fn test_missing_input_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = scan(
            &InspectionConfig::default(),
            &dir.path().join("barcode.jpg"),
            &dir.path().join("out.jpg"),
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<pipe_core::InspectionError>(),
            Some(pipe_core::InspectionError::ImageNotFound(_))
        ));
    }

    fn write_blank(path: &Path) {
        let blank = image::GrayImage::from_pixel(200, 200, image::Luma([255]));
        save_image(&DynamicImage::ImageLuma8(blank), path).unwrap();
    }

    fn is_no_qr(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<pipe_core::InspectionError>(),
            Some(pipe_core::InspectionError::NoQrCode)
        )
    }

    #[test]
    fn test_blank_barcode_reports_no_qr() {
        let dir = tempfile::tempdir().unwrap();
        let config = InspectionConfig::default();
        let barcode = dir.path().join("barcode.jpg");
        let surface = dir.path().join("input.jpg");
        write_blank(&barcode);
        write_blank(&surface);

        let err = scan(&config, &barcode, &dir.path().join("barcode_result.jpg")).unwrap_err();
        assert!(is_no_qr(&err), "scan: {err:#}");

        let out_dir = dir.path().join("out");
        let err = inspect(&config, &surface, &barcode, &out_dir, None).unwrap_err();
        assert!(is_no_qr(&err), "inspect: {err:#}");
        assert!(!out_dir.join("pipeline_bboxes.jpg").exists());
    }
}
