pub mod trait_;

pub mod dicom;
pub mod nifti;
pub mod toolkit;

pub use self::dicom::TagDecoder;
pub use self::nifti::FormatDecoder;
pub use self::toolkit::GenericToolkitDecoder;
pub use self::trait_::Decoder;

use medio_core::{LoadError, Result};
use ndarray::{ArrayD, IxDyn};

/// Drop all singleton dimensions from an array, keeping at least one axis.
pub(crate) fn squeeze(arr: ArrayD<f32>) -> Result<ArrayD<f32>> {
    let kept: Vec<usize> = arr.shape().iter().copied().filter(|&d| d != 1).collect();
    if kept.len() == arr.ndim() {
        return Ok(arr);
    }
    let shape = if kept.is_empty() { vec![1] } else { kept };
    let values: Vec<f32> = arr.iter().copied().collect();
    ArrayD::from_shape_vec(IxDyn(&shape), values)
        .map_err(|e| LoadError::loading(format!("failed to squeeze array: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    #[test]
    fn test_squeeze_removes_singleton_axes() {
        let arr = ArrayD::from_shape_vec(IxDyn(&[1, 3, 4, 1]), (0..12).map(|v| v as f32).collect())
            .unwrap();
        let squeezed = squeeze(arr).unwrap();
        assert_eq!(squeezed.shape(), &[3, 4]);
        assert_eq!(squeezed[[0, 1]], 1.0);
    }

    #[test]
    fn test_squeeze_keeps_one_axis() {
        let arr = ArrayD::from_shape_vec(IxDyn(&[1, 1]), vec![7.0]).unwrap();
        let squeezed = squeeze(arr).unwrap();
        assert_eq!(squeezed.shape(), &[1]);
        assert_eq!(squeezed[[0]], 7.0);
    }

    #[test]
    fn test_squeeze_noop_without_singletons() {
        let arr = ArrayD::from_shape_vec(IxDyn(&[2, 3]), (0..6).map(|v| v as f32).collect())
            .unwrap();
        let squeezed = squeeze(arr).unwrap();
        assert_eq!(squeezed.shape(), &[2, 3]);
    }
}
