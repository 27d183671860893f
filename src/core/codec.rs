//! Image decode/encode at the job boundary.

use crate::core::error::IoError;
use crate::core::types::Origin;
use image::RgbaImage;
use std::path::Path;

/// Loads and saves RGBA8 images.
pub trait ImageCodec: Send + Sync {
    /// Read an image and convert it to row-major RGBA8.
    fn load(&self, path: &Path) -> Result<RgbaImage, IoError>;

    /// Write an RGBA8 image.
    fn save(&self, path: &Path, image: &RgbaImage) -> Result<(), IoError>;
}

/// Codec backed by the `image` crate; the format follows the file extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileCodec {
    origin: Origin,
}

impl FileCodec {
    /// Create a codec with a top-left origin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the row origin. With [`Origin::BottomLeft`] rows are flipped on
    /// both load and save.
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    /// The configured origin.
    pub fn origin(&self) -> Origin {
        self.origin
    }
}

impl ImageCodec for FileCodec {
    fn load(&self, path: &Path) -> Result<RgbaImage, IoError> {
        if path.as_os_str().is_empty() {
            return Err(IoError::Load {
                path: path.to_path_buf(),
                error: "the input file name cannot be empty".to_string(),
            });
        }

        let mut image = image::open(path)
            .map_err(|e| IoError::Load {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?
            .to_rgba8();

        if self.origin == Origin::BottomLeft {
            image::imageops::flip_vertical_in_place(&mut image);
        }
        log::debug!(
            "Loaded {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );
        Ok(image)
    }

    fn save(&self, path: &Path, image: &RgbaImage) -> Result<(), IoError> {
        if path.as_os_str().is_empty() {
            return Err(IoError::Save {
                path: path.to_path_buf(),
                error: "the output file name cannot be empty".to_string(),
            });
        }

        let result = match self.origin {
            Origin::TopLeft => image.save(path),
            Origin::BottomLeft => image::imageops::flip_vertical(image).save(path),
        };
        result.map_err(|e| IoError::Save {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        log::debug!("Saved {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn two_row_image() -> RgbaImage {
        let mut image = RgbaImage::new(2, 2);
        image.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        image.put_pixel(1, 1, Rgba([0, 0, 255, 128]));
        image
    }

    #[test]
    fn test_save_then_load_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tile.png");
        let codec = FileCodec::new();

        codec.save(&path, &two_row_image()).unwrap();
        assert_eq!(codec.load(&path).unwrap(), two_row_image());
    }

    #[test]
    fn test_bottom_left_origin_flips_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flipped.png");
        FileCodec::new().save(&path, &two_row_image()).unwrap();

        let codec = FileCodec::new().with_origin(Origin::BottomLeft);
        let loaded = codec.load(&path).unwrap();
        assert_eq!(loaded.get_pixel(0, 1), &Rgba([255, 0, 0, 255]));
        assert_eq!(loaded.get_pixel(1, 0), &Rgba([0, 0, 255, 128]));

        // Saving with the same origin restores the file's row order.
        let back = dir.path().join("back.png");
        codec.save(&back, &loaded).unwrap();
        assert_eq!(FileCodec::new().load(&back).unwrap(), two_row_image());
    }

    #[test]
    fn test_load_errors() {
        let codec = FileCodec::new();
        assert!(matches!(
            codec.load(Path::new("")),
            Err(IoError::Load { .. })
        ));

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.png");
        assert!(matches!(codec.load(&missing), Err(IoError::Load { .. })));

        let garbage = dir.path().join("garbage.png");
        std::fs::write(&garbage, b"not an image").unwrap();
        assert!(matches!(codec.load(&garbage), Err(IoError::Load { .. })));
    }

    #[test]
    fn test_save_errors() {
        let dir = tempfile::tempdir().unwrap();
        let unknown = dir.path().join("image.unknownext");
        assert!(matches!(
            FileCodec::new().save(&unknown, &two_row_image()),
            Err(IoError::Save { .. })
        ));
    }
}
