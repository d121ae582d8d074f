//! The common seam implemented by every backend.

use std::path::Path;

use medio_core::Result;
use ndarray::ArrayD;

use crate::header::ImageHeader;

/// A backend that can decode an image file into a pixel array plus a
/// format-specific metadata handle.
///
/// A backend reports [`medio_core::LoadError::Dependency`] when the file
/// needs support this build does not carry, and
/// [`medio_core::LoadError::Loading`] for every other failure. The loader
/// never surfaces these directly; it translates them into its own
/// diagnostics.
pub trait Decoder {
    /// Short name used in log output.
    fn name(&self) -> &'static str;

    /// Attempt to decode the file at `path`.
    fn try_load(&self, path: &Path) -> Result<(ArrayD<f32>, ImageHeader)>;
}
