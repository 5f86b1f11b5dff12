//! Чтение и запись изображений

use image::DynamicImage;
use std::path::Path;

use crate::InspectionError;

/// Загрузка изображения; отсутствующий файл — отдельная ошибка
pub fn load_image(path: impl AsRef<Path>) -> Result<DynamicImage, InspectionError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(InspectionError::ImageNotFound(path.to_path_buf()));
    }
    let img = image::open(path)?;
    log::info!("Loaded {} ({}x{})", path.display(), img.width(), img.height());
    Ok(img)
}

/// Сохранение изображения; формат определяется по расширению
pub fn save_image(img: &DynamicImage, path: impl AsRef<Path>) -> Result<(), InspectionError> {
    let path = path.as_ref();
    // JPEG не поддерживает альфу
    let img = match img {
        DynamicImage::ImageRgba8(_) | DynamicImage::ImageLumaA8(_) => DynamicImage::ImageRgb8(img.to_rgb8()),
        _ => img.clone(),
    };
    img.save(path)?;
    log::info!("Saved {}", path.display());
    Ok(())
}
