//! Symmetric save operation for loaded images.
//!
//! The target suffix decides the output format with the same classification
//! rules as loading. A metadata handle from a previous load of the same
//! backend family carries spacing and orientation over to the written file;
//! handles from other families are ignored.

use std::path::Path;

use image::{ImageBuffer, Luma, Rgb};
use medio_core::{supported_descriptions, ImageType, LoadError, Result};
use ndarray::ArrayD;
use nifti::writer::WriterOptions;

use crate::formats::{meta, nrrd};
use crate::header::{ImageHeader, ToolkitHeader};
use crate::loader::last_suffix;

/// Save an array to `path`, routed by the target suffix.
///
/// `header` may be the handle from a previous [`crate::load`]; pass `None`
/// to write with default metadata. Within one backend family, saving and
/// reloading preserves shape and values exactly. Writing DICOM files is not
/// supported.
pub fn save<P: AsRef<Path>>(arr: &ArrayD<f32>, path: P, header: Option<&ImageHeader>) -> Result<()> {
    let path = path.as_ref();
    tracing::info!("saving image {}...", path.display());

    let Some(kind) = ImageType::of_path(path) else {
        return Err(LoadError::unknown_type(format!(
            "the suffix {:?} of {} could not be associated with any known image type; \
             supported types are: {}",
            last_suffix(path),
            path.display(),
            supported_descriptions()
        )));
    };

    match kind {
        ImageType::Nifti | ImageType::Analyze => write_nifti(arr, path, header),
        ImageType::Dicom => Err(LoadError::loading(
            "saving DICOM images is not supported".to_string(),
        )),
        ImageType::Meta => meta::write(arr, path, toolkit_reference(header)),
        ImageType::Nrrd => nrrd::write(arr, path, toolkit_reference(header)),
        ImageType::Png | ImageType::Bmp | ImageType::Tif | ImageType::Jpg => {
            write_raster(arr, path)
        }
    }
}

fn toolkit_reference(header: Option<&ImageHeader>) -> Option<&ToolkitHeader> {
    match header {
        Some(ImageHeader::Toolkit(h)) => Some(h),
        _ => None,
    }
}

fn write_nifti(arr: &ArrayD<f32>, path: &Path, header: Option<&ImageHeader>) -> Result<()> {
    let mut options = WriterOptions::new(path);
    if let Some(ImageHeader::Nifti(h)) = header {
        options = options.reference_header(h);
    }
    options
        .write_nifti(arr)
        .map_err(|e| LoadError::loading(format!("failed to write NIfTI file: {e}")))
}

fn write_raster(arr: &ArrayD<f32>, path: &Path) -> Result<()> {
    let fail = |e: image::ImageError| {
        LoadError::loading(format!("failed to write {}: {e}", path.display()))
    };

    match arr.ndim() {
        2 => {
            let height = arr.shape()[0] as u32;
            let width = arr.shape()[1] as u32;
            let max = arr.iter().copied().fold(0.0f32, f32::max);
            if max > 255.0 {
                let data: Vec<u16> = arr
                    .iter()
                    .map(|&v| v.round().clamp(0.0, 65535.0) as u16)
                    .collect();
                let img = ImageBuffer::<Luma<u16>, _>::from_raw(width, height, data)
                    .ok_or_else(|| LoadError::loading("raster buffer size mismatch"))?;
                img.save(path).map_err(fail)
            } else {
                let data: Vec<u8> = arr
                    .iter()
                    .map(|&v| v.round().clamp(0.0, 255.0) as u8)
                    .collect();
                let img = ImageBuffer::<Luma<u8>, _>::from_raw(width, height, data)
                    .ok_or_else(|| LoadError::loading("raster buffer size mismatch"))?;
                img.save(path).map_err(fail)
            }
        }
        3 if arr.shape()[2] == 3 => {
            let height = arr.shape()[0] as u32;
            let width = arr.shape()[1] as u32;
            let data: Vec<u8> = arr
                .iter()
                .map(|&v| v.round().clamp(0.0, 255.0) as u8)
                .collect();
            let img = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, data)
                .ok_or_else(|| LoadError::loading("raster buffer size mismatch"))?;
            img.save(path).map_err(fail)
        }
        _ => Err(LoadError::loading(format!(
            "raster formats require a 2-D grayscale or HxWx3 RGB array, got shape {:?}",
            arr.shape()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;
    use tempfile::tempdir;

    #[test]
    fn test_unknown_suffix_is_rejected() {
        let dir = tempdir().unwrap();
        let arr = ArrayD::from_elem(IxDyn(&[2, 2]), 1.0f32);
        let err = save(&arr, dir.path().join("out.xyz"), None).unwrap_err();
        assert!(matches!(err, LoadError::UnknownType(_)));
    }

    #[test]
    fn test_dicom_save_is_rejected() {
        let dir = tempdir().unwrap();
        let arr = ArrayD::from_elem(IxDyn(&[2, 2]), 1.0f32);
        let err = save(&arr, dir.path().join("out.dcm"), None).unwrap_err();
        assert!(matches!(err, LoadError::Loading(_)));
    }

    #[test]
    fn test_raster_rejects_odd_rank() {
        let dir = tempdir().unwrap();
        let arr = ArrayD::from_elem(IxDyn(&[2, 2, 2, 2]), 1.0f32);
        assert!(save(&arr, dir.path().join("out.png"), None).is_err());
    }
}
