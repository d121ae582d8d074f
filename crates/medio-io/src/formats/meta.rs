//! MetaImage (.mhd/.mha) reading and writing.
//!
//! The header is a sequence of `Key = Value` text lines terminated by the
//! `ElementDataFile` entry; element data is either appended to the header
//! file (`LOCAL`) or stored in a sibling raw file, optionally
//! zlib-compressed.

use std::fs;
use std::io::Read;
use std::path::Path;

use flate2::read::ZlibDecoder;
use medio_core::{LoadError, Result};
use ndarray::{ArrayD, IxDyn};

use crate::header::{PixelDescriptor, PixelType, ToolkitFormat, ToolkitHeader};

/// Whether a file head looks like a MetaImage header.
pub(crate) fn looks_like(head: &[u8]) -> bool {
    let text = String::from_utf8_lossy(head);
    let first = text.lines().next().unwrap_or("");
    match first.split_once('=') {
        Some((key, _)) => matches!(
            key.trim(),
            "ObjectType" | "NDims" | "Comment" | "TransformType"
        ),
        None => false,
    }
}

fn element_type(name: &str) -> Result<PixelType> {
    match name {
        "MET_UCHAR" => Ok(PixelType::UInt8),
        "MET_CHAR" => Ok(PixelType::Int8),
        "MET_USHORT" => Ok(PixelType::UInt16),
        "MET_SHORT" => Ok(PixelType::Int16),
        "MET_UINT" => Ok(PixelType::UInt32),
        "MET_INT" => Ok(PixelType::Int32),
        "MET_FLOAT" => Ok(PixelType::Float32),
        "MET_DOUBLE" => Ok(PixelType::Float64),
        other => Err(LoadError::loading(format!(
            "unsupported MetaImage element type {other:?}"
        ))),
    }
}

fn parse_bool(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}

fn parse_usizes(value: &str) -> Result<Vec<usize>> {
    value
        .split_whitespace()
        .map(|v| {
            v.parse::<usize>()
                .map_err(|e| LoadError::loading(format!("invalid MetaImage size {v:?}: {e}")))
        })
        .collect()
}

fn parse_floats(value: &str) -> Result<Vec<f64>> {
    value
        .split_whitespace()
        .map(|v| {
            v.parse::<f64>()
                .map_err(|e| LoadError::loading(format!("invalid MetaImage number {v:?}: {e}")))
        })
        .collect()
}

/// Read a MetaImage file into an array plus its toolkit header.
pub fn read(path: &Path) -> Result<(ArrayD<f32>, ToolkitHeader)> {
    let bytes = fs::read(path)
        .map_err(|e| LoadError::loading(format!("could not read {}: {e}", path.display())))?;

    let mut pos = 0usize;
    let mut dims: Vec<usize> = Vec::new();
    let mut ndims: Option<usize> = None;
    let mut pixel: Option<PixelType> = None;
    let mut spacing: Option<Vec<f64>> = None;
    let mut origin: Option<Vec<f64>> = None;
    let mut big_endian = false;
    let mut compressed = false;
    let mut channels = 1usize;
    let mut data_source: Option<String> = None;

    while pos < bytes.len() {
        let end = bytes[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|i| pos + i)
            .unwrap_or(bytes.len());
        let line = String::from_utf8_lossy(&bytes[pos..end])
            .trim_end_matches('\r')
            .to_string();
        pos = end + 1;

        let Some((key, value)) = line.split_once('=') else {
            return Err(LoadError::loading(format!(
                "malformed MetaImage header line {line:?}"
            )));
        };
        let key = key.trim();
        let value = value.trim();
        match key {
            "ObjectType" => {
                if !value.eq_ignore_ascii_case("image") {
                    return Err(LoadError::loading(format!(
                        "unsupported MetaImage object type {value:?}"
                    )));
                }
            }
            "NDims" => ndims = Some(parse_usizes(value)?.first().copied().unwrap_or(0)),
            "DimSize" => dims = parse_usizes(value)?,
            "ElementType" => pixel = Some(element_type(value)?),
            "ElementSpacing" => spacing = Some(parse_floats(value)?),
            "Offset" | "Origin" | "Position" => origin = Some(parse_floats(value)?),
            "BinaryData" => {
                if !parse_bool(value) {
                    return Err(LoadError::loading(
                        "ASCII MetaImage element data is not supported",
                    ));
                }
            }
            "BinaryDataByteOrderMSB" | "ElementByteOrderMSB" => big_endian = parse_bool(value),
            "CompressedData" => compressed = parse_bool(value),
            "ElementNumberOfChannels" => {
                channels = parse_usizes(value)?.first().copied().unwrap_or(1)
            }
            "ElementDataFile" => {
                data_source = Some(value.to_string());
                break;
            }
            // TransformMatrix, AnatomicalOrientation and friends carry no
            // information this reader needs.
            _ => {}
        }
    }

    let data_source = data_source
        .ok_or_else(|| LoadError::loading("MetaImage header has no ElementDataFile entry"))?;
    let pixel =
        pixel.ok_or_else(|| LoadError::loading("MetaImage header has no ElementType entry"))?;
    if dims.is_empty() {
        return Err(LoadError::loading("MetaImage header has no DimSize entry"));
    }
    if let Some(n) = ndims {
        if n != dims.len() {
            return Err(LoadError::loading(format!(
                "MetaImage NDims {} does not match DimSize rank {}",
                n,
                dims.len()
            )));
        }
    }
    if channels != 1 {
        return Err(LoadError::loading(
            "multi-channel MetaImage data is not supported",
        ));
    }
    if data_source == "LIST" || data_source.contains('%') {
        return Err(LoadError::loading(
            "MetaImage slice lists are not supported",
        ));
    }

    let raw = if data_source == "LOCAL" {
        bytes[pos.min(bytes.len())..].to_vec()
    } else {
        let data_path = path.parent().unwrap_or(Path::new(".")).join(&data_source);
        fs::read(&data_path).map_err(|e| {
            LoadError::loading(format!(
                "could not read element data file {}: {e}",
                data_path.display()
            ))
        })?
    };
    let raw = if compressed {
        let mut decoded = Vec::new();
        ZlibDecoder::new(raw.as_slice())
            .read_to_end(&mut decoded)
            .map_err(|e| LoadError::loading(format!("zlib decompression failed: {e}")))?;
        decoded
    } else {
        raw
    };

    let values = super::decode_elements(&raw, pixel, big_endian)?;
    let expected: usize = dims.iter().product();
    if values.len() != expected {
        return Err(LoadError::loading(format!(
            "MetaImage element count {} does not match DimSize ({} expected)",
            values.len(),
            expected
        )));
    }

    // DimSize is fastest-axis first; the array shape is slowest first.
    let shape: Vec<usize> = dims.iter().rev().copied().collect();
    let arr = ArrayD::from_shape_vec(IxDyn(&shape), values)
        .map_err(|e| LoadError::loading(format!("failed to shape MetaImage data: {e}")))?;

    let header = ToolkitHeader {
        descriptor: PixelDescriptor { pixel, dims },
        spacing,
        origin,
        format: ToolkitFormat::Meta,
    };
    Ok((arr, header))
}

fn join<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Write an array as a MetaImage file.
///
/// `.mhd` targets get a detached sibling `.raw` data file; every other
/// suffix stores the data inline (`LOCAL`). Elements are written as
/// MET_FLOAT, so reloading reproduces the exact values.
pub fn write(arr: &ArrayD<f32>, path: &Path, reference: Option<&ToolkitHeader>) -> Result<()> {
    let dims: Vec<usize> = arr.shape().iter().rev().copied().collect();
    let ndims = dims.len();
    let spacing = reference
        .and_then(|h| h.spacing.as_ref())
        .filter(|s| s.len() == ndims)
        .cloned()
        .unwrap_or_else(|| vec![1.0; ndims]);
    let origin = reference
        .and_then(|h| h.origin.as_ref())
        .filter(|o| o.len() == ndims)
        .cloned()
        .unwrap_or_else(|| vec![0.0; ndims]);

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    let detached = extension == "mhd";

    let mut header = String::new();
    header.push_str("ObjectType = Image\n");
    header.push_str(&format!("NDims = {ndims}\n"));
    header.push_str(&format!("DimSize = {}\n", join(&dims)));
    header.push_str("BinaryData = True\n");
    header.push_str("BinaryDataByteOrderMSB = False\n");
    header.push_str("CompressedData = False\n");
    header.push_str(&format!("ElementSpacing = {}\n", join(&spacing)));
    header.push_str(&format!("Offset = {}\n", join(&origin)));
    header.push_str("ElementType = MET_FLOAT\n");

    let data = super::encode_f32_le(arr.iter().copied());
    if detached {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let raw_name = format!("{stem}.raw");
        header.push_str(&format!("ElementDataFile = {raw_name}\n"));
        fs::write(path, header.as_bytes())
            .map_err(|e| LoadError::loading(format!("could not write {}: {e}", path.display())))?;
        let raw_path = path.parent().unwrap_or(Path::new(".")).join(raw_name);
        fs::write(&raw_path, &data).map_err(|e| {
            LoadError::loading(format!("could not write {}: {e}", raw_path.display()))
        })?;
    } else {
        header.push_str("ElementDataFile = LOCAL\n");
        let mut bytes = header.into_bytes();
        bytes.extend_from_slice(&data);
        fs::write(path, &bytes)
            .map_err(|e| LoadError::loading(format!("could not write {}: {e}", path.display())))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::tempdir;

    fn sample_array() -> ArrayD<f32> {
        ArrayD::from_shape_vec(IxDyn(&[2, 3, 4]), (0..24).map(|v| v as f32).collect()).unwrap()
    }

    #[test]
    fn test_local_roundtrip() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("vol.mha");
        let arr = sample_array();

        write(&arr, &path, None)?;
        let (reloaded, header) = read(&path)?;

        assert_eq!(reloaded, arr);
        assert_eq!(header.descriptor.dims, vec![4, 3, 2]);
        assert_eq!(header.descriptor.pixel, PixelType::Float32);
        assert_eq!(header.format, ToolkitFormat::Meta);
        Ok(())
    }

    #[test]
    fn test_detached_roundtrip() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("vol.mhd");
        let arr = sample_array();

        write(&arr, &path, None)?;
        assert!(dir.path().join("vol.raw").exists());

        let (reloaded, _) = read(&path)?;
        assert_eq!(reloaded, arr);
        Ok(())
    }

    #[test]
    fn test_compressed_big_endian_shorts() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("vol.mha");

        let mut data = Vec::new();
        for v in [-2i16, -1, 0, 1, 2, 300] {
            data.extend_from_slice(&v.to_be_bytes());
        }
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&data)?;
        let compressed = encoder.finish()?;

        let mut bytes = Vec::new();
        bytes.extend_from_slice(
            b"ObjectType = Image\n\
              NDims = 2\n\
              DimSize = 3 2\n\
              BinaryData = True\n\
              BinaryDataByteOrderMSB = True\n\
              CompressedData = True\n\
              ElementType = MET_SHORT\n\
              ElementDataFile = LOCAL\n",
        );
        bytes.extend_from_slice(&compressed);
        std::fs::write(&path, &bytes)?;

        let (arr, header) = read(&path)?;
        assert_eq!(arr.shape(), &[2, 3]);
        assert_eq!(
            arr.iter().copied().collect::<Vec<_>>(),
            vec![-2.0, -1.0, 0.0, 1.0, 2.0, 300.0]
        );
        assert_eq!(header.descriptor.pixel, PixelType::Int16);
        Ok(())
    }

    #[test]
    fn test_spacing_carried_through_reference() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("vol.mha");
        let arr = sample_array();

        let reference = ToolkitHeader {
            descriptor: PixelDescriptor {
                pixel: PixelType::Float32,
                dims: vec![4, 3, 2],
            },
            spacing: Some(vec![0.5, 0.5, 2.0]),
            origin: Some(vec![10.0, 0.0, -4.0]),
            format: ToolkitFormat::Meta,
        };
        write(&arr, &path, Some(&reference))?;
        let (_, header) = read(&path)?;
        assert_eq!(header.spacing, Some(vec![0.5, 0.5, 2.0]));
        assert_eq!(header.origin, Some(vec![10.0, 0.0, -4.0]));
        Ok(())
    }

    #[test]
    fn test_rejects_missing_element_type() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vol.mha");
        std::fs::write(&path, b"ObjectType = Image\nDimSize = 2 2\nElementDataFile = LOCAL\n")
            .unwrap();
        assert!(read(&path).is_err());
    }

    #[test]
    fn test_looks_like() {
        assert!(looks_like(b"ObjectType = Image\nNDims = 3\n"));
        assert!(looks_like(b"NDims = 2\n"));
        assert!(!looks_like(b"\x89PNG\r\n"));
        assert!(!looks_like(b"NRRD0004\n"));
    }
}
