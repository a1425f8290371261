use std::fs;
use std::path::{Path, PathBuf};

use image::ImageFormat;

use crate::boxes::CropBox;
use crate::enums::{CaptureFormat, Orientation};
use crate::error::Result;
use crate::overlay::Overlay;
use crate::render;
use crate::roi::RoiSet;
use crate::volume::Volume;

/// Series export parameters.
#[derive(Clone, Copy, Debug)]
pub struct CaptureOptions {
    /// Slices advanced between consecutive images.
    pub step: usize,
    pub format: CaptureFormat,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            step: 2,
            format: CaptureFormat::Png,
        }
    }
}

fn image_format(format: CaptureFormat) -> ImageFormat {
    match format {
        CaptureFormat::Png => ImageFormat::Png,
        CaptureFormat::Jpeg => ImageFormat::Jpeg,
        CaptureFormat::Bmp => ImageFormat::Bmp,
        CaptureFormat::Tiff => ImageFormat::Tiff,
    }
}

/// Export one composited image per `step` slices along the through-plane
/// axis.
///
/// Files are written as `{basename}_{000..n}.{ext}` into a freshly created
/// directory named after the basename, next to it. A failed save of one file
/// is logged and does not abort the remaining files; the returned list holds
/// the files actually written.
pub fn export_series(
    volume: &Volume,
    orientation: Orientation,
    overlays: &[Overlay],
    rois: &RoiSet,
    crop: Option<&CropBox>,
    basename: &Path,
    options: CaptureOptions,
) -> Result<Vec<PathBuf>> {
    let stem = basename
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "capture".to_string());
    let directory = basename.parent().unwrap_or(Path::new(".")).join(&stem);
    fs::create_dir_all(&directory)?;

    let step = options.step.max(1);
    let extension = options.format.extension();
    let format = image_format(options.format);

    let mut written = Vec::new();
    for (number, index) in (0..volume.slice_count(orientation)).step_by(step).enumerate() {
        let Some(image) = render::compose_slice(volume, orientation, index, overlays, rois, crop)
        else {
            continue;
        };
        let path = directory.join(format!("{stem}_{number:03}.{extension}"));
        // JPEG and BMP encoders reject RGBA input
        let rgb = image::DynamicImage::ImageRgba8(image).to_rgb8();
        match rgb.save_with_format(&path, format) {
            Ok(()) => written.push(path),
            Err(error) => {
                log::warn!("failed to save {}: {error}", path.display());
            }
        }
    }
    log::info!(
        "exported {} {orientation:?} slices to {}",
        written.len(),
        directory.display()
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn volume() -> Volume {
        let data = Array3::from_shape_fn((16, 16, 16), |(z, y, x)| (z + y + x) as f32);
        Volume::new(data, [1.0; 3])
    }

    #[test]
    fn series_lands_in_a_sibling_directory() {
        let dir = tempfile::tempdir().unwrap();
        let volume = volume();
        let rois = RoiSet::default();
        let written = export_series(
            &volume,
            Orientation::Axial,
            &[],
            &rois,
            None,
            &dir.path().join("scan.png"),
            CaptureOptions::default(),
        )
        .unwrap();
        // 16 slices at step 2
        assert_eq!(written.len(), 8);
        assert_eq!(
            written[0],
            dir.path().join("scan").join("scan_000.png")
        );
        assert_eq!(
            written[7],
            dir.path().join("scan").join("scan_007.png")
        );
        assert!(written.iter().all(|p| p.is_file()));
    }

    #[test]
    fn step_one_exports_every_slice() {
        let dir = tempfile::tempdir().unwrap();
        let volume = volume();
        let rois = RoiSet::default();
        let written = export_series(
            &volume,
            Orientation::Sagittal,
            &[],
            &rois,
            None,
            &dir.path().join("out.bmp"),
            CaptureOptions {
                step: 1,
                format: CaptureFormat::Bmp,
            },
        )
        .unwrap();
        assert_eq!(written.len(), 16);
        assert!(written[3].to_string_lossy().ends_with("out_003.bmp"));
    }
}
