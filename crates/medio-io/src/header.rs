//! The opaque metadata handle returned alongside every loaded image.
//!
//! The handle's concrete type depends on which backend performed the read.
//! It can be passed back to [`crate::save`] for the same backend family to
//! carry metadata over to the written file; no cross-family compatibility is
//! guaranteed.

use dicom::object::{FileDicomObject, InMemDicomObject};
use nifti::NiftiHeader;

/// Native element type of a file decoded by the toolkit backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelType {
    UInt8,
    Int8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float32,
    Float64,
}

impl PixelType {
    /// Element size in bytes.
    pub fn size_bytes(&self) -> usize {
        match self {
            PixelType::UInt8 | PixelType::Int8 => 1,
            PixelType::UInt16 | PixelType::Int16 => 2,
            PixelType::UInt32 | PixelType::Int32 | PixelType::Float32 => 4,
            PixelType::Float64 => 8,
        }
    }
}

/// Pixel type plus dimension sizes, probed from a file before the actual
/// reader is constructed. Dimension sizes are in the file's native order
/// (fastest-varying axis first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelDescriptor {
    pub pixel: PixelType,
    pub dims: Vec<usize>,
}

/// Which native format the toolkit backend decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolkitFormat {
    Meta,
    Nrrd,
    Raster,
}

/// Metadata handle produced by the toolkit backend.
#[derive(Debug, Clone)]
pub struct ToolkitHeader {
    /// The native pixel descriptor the file was probed to.
    pub descriptor: PixelDescriptor,
    /// Element spacing per axis, when the format records it.
    pub spacing: Option<Vec<f64>>,
    /// Physical offset of the first element, when the format records it.
    pub origin: Option<Vec<f64>>,
    /// The format that produced this header.
    pub format: ToolkitFormat,
}

/// Backend-specific metadata handle for a loaded image.
#[derive(Debug)]
pub enum ImageHeader {
    /// Parsed NIfTI/Analyze header from the format backend.
    Nifti(NiftiHeader),
    /// The full DICOM object from the tag backend.
    Dicom(Box<FileDicomObject<InMemDicomObject>>),
    /// Native descriptor from the toolkit backend.
    Toolkit(ToolkitHeader),
}

impl ImageHeader {
    /// Name of the backend family that produced this handle.
    pub fn family(&self) -> &'static str {
        match self {
            ImageHeader::Nifti(_) => "nifti",
            ImageHeader::Dicom(_) => "dicom",
            ImageHeader::Toolkit(_) => "toolkit",
        }
    }
}
