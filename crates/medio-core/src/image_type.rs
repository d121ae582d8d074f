//! Logical image type tags and the static suffix tables.
//!
//! These tables decide which backend is responsible for which file. They are
//! fixed at compile time and never mutated; extending the loader means adding
//! a suffix arm here and registering a decoder for it.

use std::path::Path;

/// Logical tag grouping file suffixes that share a decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageType {
    Nifti,
    Analyze,
    Dicom,
    Meta,
    Nrrd,
    Png,
    Bmp,
    Tif,
    Jpg,
}

impl ImageType {
    /// Every known image type, in table order.
    pub const ALL: [ImageType; 9] = [
        ImageType::Nifti,
        ImageType::Analyze,
        ImageType::Dicom,
        ImageType::Meta,
        ImageType::Nrrd,
        ImageType::Png,
        ImageType::Bmp,
        ImageType::Tif,
        ImageType::Jpg,
    ];

    /// Map a lowercase file suffix (single or compound, e.g. "nii.gz") to
    /// its image type.
    pub fn from_suffix(suffix: &str) -> Option<ImageType> {
        match suffix {
            "nii" | "nii.gz" => Some(ImageType::Nifti),
            "hdr" | "img" | "img.gz" => Some(ImageType::Analyze),
            "dcm" | "dicom" => Some(ImageType::Dicom),
            "mhd" | "mha" => Some(ImageType::Meta),
            "nrrd" | "nhdr" => Some(ImageType::Nrrd),
            "png" => Some(ImageType::Png),
            "bmp" => Some(ImageType::Bmp),
            "tif" | "tiff" => Some(ImageType::Tif),
            "jpg" | "jpeg" => Some(ImageType::Jpg),
            _ => None,
        }
    }

    /// Classify a path by its suffix.
    ///
    /// The suffix is the substring after the last `.`, lowercased. When that
    /// is not a known suffix, the compound of the last two dot-separated
    /// segments is tried (covers "nii.gz" and "img.gz"). `None` when both
    /// lookups miss.
    pub fn of_path<P: AsRef<Path>>(path: P) -> Option<ImageType> {
        let name = path.as_ref().to_string_lossy();
        let segments: Vec<&str> = name.split('.').collect();

        let last = segments.last()?.to_lowercase();
        if let Some(t) = ImageType::from_suffix(&last) {
            return Some(t);
        }

        if segments.len() >= 2 {
            let compound = segments[segments.len() - 2..].join(".").to_lowercase();
            return ImageType::from_suffix(&compound);
        }
        None
    }

    /// Human-readable description, used only in error messages.
    pub fn description(&self) -> &'static str {
        match self {
            ImageType::Nifti => {
                "NifTi - Neuroimaging Informatics Technology Initiative (.nii, .nii.gz)"
            }
            ImageType::Analyze => "Analyze (plain, SPM99, SPM2) (.hdr/.img, .img.gz)",
            ImageType::Dicom => {
                "Dicom - Digital Imaging and Communications in Medicine (.dcm, .dicom)"
            }
            ImageType::Meta => "Itk/Vtk MetaImage (.mhd, .mha/.raw)",
            ImageType::Nrrd => "Nrrd - Nearly Raw Raster Data (.nhdr, .nrrd)",
            ImageType::Png => "Portable Network Graphics (.png)",
            ImageType::Bmp => "Bitmap Image File (.bmp)",
            ImageType::Tif => "Tagged Image File Format (.tif, .tiff)",
            ImageType::Jpg => "Joint Photographic Experts Group (.jpg, .jpeg)",
        }
    }
}

/// All supported type descriptions joined into one list, for the
/// unknown-type error message.
pub fn supported_descriptions() -> String {
    ImageType::ALL
        .iter()
        .map(|t| t.description())
        .collect::<Vec<_>>()
        .join(", ")
}
