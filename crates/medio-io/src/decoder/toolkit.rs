//! Generic multi-format backend: native MetaImage/NRRD codecs plus raster
//! formats through the `image` crate.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use image::{DynamicImage, ImageReader};
use medio_core::{LoadError, Result};
use ndarray::{ArrayD, IxDyn};

use crate::formats::{meta, nrrd};
use crate::header::{ImageHeader, PixelDescriptor, PixelType, ToolkitFormat, ToolkitHeader};

use super::Decoder;

/// Generic toolkit decoder for MetaImage, NRRD, and the raster formats
/// (PNG, BMP, TIFF, JPEG).
///
/// The file content is sniffed to a native pixel descriptor first; only then
/// is the matching reader constructed. Because it sniffs content rather than
/// trusting the suffix, it also serves as the last resort during brute-force
/// fallback.
pub struct GenericToolkitDecoder;

impl Decoder for GenericToolkitDecoder {
    fn name(&self) -> &'static str {
        "toolkit"
    }

    fn try_load(&self, path: &Path) -> Result<(ArrayD<f32>, ImageHeader)> {
        tracing::debug!("loading image {} with the toolkit backend", path.display());

        let mut head = [0u8; 512];
        let n = File::open(path)
            .and_then(|mut f| f.read(&mut head))
            .map_err(|e| LoadError::loading(format!("could not read {}: {e}", path.display())))?;
        let head = &head[..n];

        let (arr, header) = if nrrd::looks_like(head) {
            nrrd::read(path)?
        } else if meta::looks_like(head) {
            meta::read(path)?
        } else {
            read_raster(path)?
        };
        Ok((arr, ImageHeader::Toolkit(header)))
    }
}

fn read_raster(path: &Path) -> Result<(ArrayD<f32>, ToolkitHeader)> {
    let reader = ImageReader::open(path)
        .map_err(|e| LoadError::loading(format!("could not open {}: {e}", path.display())))?
        .with_guessed_format()
        .map_err(|e| LoadError::loading(format!("could not probe {}: {e}", path.display())))?;
    if reader.format().is_none() {
        return Err(LoadError::loading(format!(
            "no native pixel descriptor could be determined for {}",
            path.display()
        )));
    }
    let img = reader
        .decode()
        .map_err(|e| LoadError::loading(format!("failed to decode {}: {e}", path.display())))?;

    let width = img.width() as usize;
    let height = img.height() as usize;

    let (pixel, channels, values): (PixelType, usize, Vec<f32>) = match img {
        DynamicImage::ImageLuma8(buf) => (
            PixelType::UInt8,
            1,
            buf.into_raw().into_iter().map(|v| v as f32).collect(),
        ),
        DynamicImage::ImageLuma16(buf) => (
            PixelType::UInt16,
            1,
            buf.into_raw().into_iter().map(|v| v as f32).collect(),
        ),
        DynamicImage::ImageRgb8(buf) => (
            PixelType::UInt8,
            3,
            buf.into_raw().into_iter().map(|v| v as f32).collect(),
        ),
        other => (
            PixelType::UInt8,
            4,
            other
                .to_rgba8()
                .into_raw()
                .into_iter()
                .map(|v| v as f32)
                .collect(),
        ),
    };

    let (shape, dims) = if channels == 1 {
        (vec![height, width], vec![width, height])
    } else {
        (vec![height, width, channels], vec![channels, width, height])
    };
    let arr = ArrayD::from_shape_vec(IxDyn(&shape), values)
        .map_err(|e| LoadError::loading(format!("failed to shape raster data: {e}")))?;

    let header = ToolkitHeader {
        descriptor: PixelDescriptor { pixel, dims },
        spacing: None,
        origin: None,
        format: ToolkitFormat::Raster,
    };
    Ok((arr, header))
}
