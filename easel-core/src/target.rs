//! Target image loading and the images directory.

use std::path::Path;

use crate::canvas::{Rgb, TargetImage};
use crate::error::PaintError;

/// Decodes an image file into a target pixel grid.
pub trait TargetLoader: Send + Sync + 'static {
    fn load(&self, path: &Path) -> Result<TargetImage, PaintError>;
}

/// Decodes PNG/JPEG/BMP/GIF files with the `image` crate. Alpha is dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageFileLoader;

impl TargetLoader for ImageFileLoader {
    fn load(&self, path: &Path) -> Result<TargetImage, PaintError> {
        let img = image::open(path)?.to_rgb8();
        let (width, height) = img.dimensions();
        let width = u16::try_from(width)
            .map_err(|_| PaintError::ImageDecode(format!("{} is too wide", path.display())))?;
        let height = u16::try_from(height)
            .map_err(|_| PaintError::ImageDecode(format!("{} is too tall", path.display())))?;
        let pixels = img.pixels().map(|p| Rgb::new(p[0], p[1], p[2])).collect();
        TargetImage::new(width, height, pixels)
    }
}

/// Names of the regular files in `dir`, sorted.
pub fn list_images(dir: &Path) -> Result<Vec<String>, PaintError> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Resolve `name` inside `dir`, rejecting anything that escapes it.
pub fn resolve_image(dir: &Path, name: &str) -> Result<std::path::PathBuf, PaintError> {
    let candidate = Path::new(name);
    let plain = candidate.components().count() == 1
        && matches!(
            candidate.components().next(),
            Some(std::path::Component::Normal(_))
        );
    let path = dir.join(candidate);
    if !plain || !path.is_file() {
        return Err(PaintError::ImageNotFound(name.to_string()));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_only_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.png"), b"x").unwrap();
        std::fs::write(dir.path().join("a.png"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        assert_eq!(list_images(dir.path()).unwrap(), vec!["a.png", "b.png"]);
    }

    #[test]
    fn resolve_rejects_missing_and_traversal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cat.png"), b"x").unwrap();
        assert!(resolve_image(dir.path(), "cat.png").is_ok());
        assert!(matches!(
            resolve_image(dir.path(), "dog.png"),
            Err(PaintError::ImageNotFound(_))
        ));
        assert!(resolve_image(dir.path(), "../cat.png").is_err());
        assert!(resolve_image(dir.path(), "sub/cat.png").is_err());
    }

    #[test]
    fn decodes_png_to_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.png");
        let mut img = image::RgbaImage::new(2, 1);
        img.put_pixel(0, 0, image::Rgba([10, 20, 30, 255]));
        img.put_pixel(1, 0, image::Rgba([40, 50, 60, 0]));
        img.save(&path).unwrap();

        let target = ImageFileLoader.load(&path).unwrap();
        assert_eq!((target.width(), target.height()), (2, 1));
        assert_eq!(target.pixel(0, 0), Rgb::new(10, 20, 30));
        assert_eq!(target.pixel(1, 0), Rgb::new(40, 50, 60));
    }
}
