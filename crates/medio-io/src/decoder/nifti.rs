//! Backend for NIfTI and Analyze files, backed by the `nifti` crate.

use std::path::Path;

use medio_core::{LoadError, Result};
use ndarray::ArrayD;
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};

use crate::header::ImageHeader;

use super::{squeeze, Decoder};

/// Pure-format decoder for NIfTI (.nii, .nii.gz) and Analyze
/// (.hdr/.img, .img.gz) files.
///
/// Redundant singleton dimensions are removed from the returned array, so a
/// volume stored as `64x64x32x1` comes back as `64x64x32`.
pub struct FormatDecoder;

impl Decoder for FormatDecoder {
    fn name(&self) -> &'static str {
        "nifti"
    }

    fn try_load(&self, path: &Path) -> Result<(ArrayD<f32>, ImageHeader)> {
        tracing::debug!("loading image {} with the nifti backend", path.display());

        let obj = ReaderOptions::new()
            .read_file(path)
            .map_err(|e| LoadError::loading(format!("failed to read NIfTI file: {e}")))?;
        let header = obj.header().clone();

        let volume = obj.into_volume();
        let arr = volume
            .into_ndarray::<f32>()
            .map_err(|e| LoadError::loading(format!("failed to convert volume: {e}")))?;
        let arr = squeeze(arr)?;

        Ok((arr, ImageHeader::Nifti(header)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use ndarray::{Array3, Array4};
    use nifti::writer::WriterOptions;
    use tempfile::tempdir;

    #[test]
    fn test_read_basic_volume() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("test.nii");

        let data: Vec<f32> = (0..3 * 4 * 5).map(|v| v as f32).collect();
        let array = Array3::from_shape_vec((3, 4, 5), data)?;
        WriterOptions::new(&path).write_nifti(&array)?;

        let (arr, header) = FormatDecoder.try_load(&path)?;
        assert_eq!(arr.shape(), &[3, 4, 5]);
        assert_eq!(arr[[0, 0, 0]], 0.0);
        assert_eq!(arr[[2, 3, 4]], 59.0);
        assert!(matches!(header, ImageHeader::Nifti(_)));
        Ok(())
    }

    #[test]
    fn test_singleton_dimension_is_squeezed() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("test.nii");

        let data: Vec<f32> = (0..3 * 4).map(|v| v as f32).collect();
        let array = Array4::from_shape_vec((3, 4, 1, 1), data)?;
        WriterOptions::new(&path).write_nifti(&array)?;

        let (arr, _) = FormatDecoder.try_load(&path)?;
        assert_eq!(arr.shape(), &[3, 4]);
        Ok(())
    }

    #[test]
    fn test_junk_file_fails_to_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("junk.nii");
        std::fs::write(&path, b"definitely not a nifti file").unwrap();

        let err = FormatDecoder.try_load(&path).unwrap_err();
        assert!(matches!(err, LoadError::Loading(_)));
    }
}
