//! NRRD (.nrrd/.nhdr) reading and writing.
//!
//! A NRRD file starts with a `NRRD000x` magic line followed by `field: value`
//! lines up to an empty line; element data follows inline, or lives in a
//! detached file named by the `data file` field.

use std::fs;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use medio_core::{LoadError, Result};
use ndarray::{ArrayD, IxDyn};

use crate::header::{PixelDescriptor, PixelType, ToolkitFormat, ToolkitHeader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Raw,
    Gzip,
    Ascii,
}

/// Whether a file head carries the NRRD magic.
pub(crate) fn looks_like(head: &[u8]) -> bool {
    head.starts_with(b"NRRD")
}

fn element_type(name: &str) -> Result<PixelType> {
    match name {
        "uchar" | "unsigned char" | "uint8" | "uint8_t" => Ok(PixelType::UInt8),
        "char" | "signed char" | "int8" | "int8_t" => Ok(PixelType::Int8),
        "ushort" | "unsigned short" | "unsigned short int" | "uint16" | "uint16_t" => {
            Ok(PixelType::UInt16)
        }
        "short" | "short int" | "signed short" | "signed short int" | "int16" | "int16_t" => {
            Ok(PixelType::Int16)
        }
        "uint" | "unsigned int" | "uint32" | "uint32_t" => Ok(PixelType::UInt32),
        "int" | "signed int" | "int32" | "int32_t" => Ok(PixelType::Int32),
        "float" => Ok(PixelType::Float32),
        "double" => Ok(PixelType::Float64),
        other => Err(LoadError::loading(format!(
            "unsupported NRRD element type {other:?}"
        ))),
    }
}

fn encoding(name: &str) -> Result<Encoding> {
    match name {
        "raw" => Ok(Encoding::Raw),
        "gzip" | "gz" => Ok(Encoding::Gzip),
        "ascii" | "text" | "txt" => Ok(Encoding::Ascii),
        // bzip2 is a legal NRRD encoding this build carries no codec for.
        "bzip2" | "bz2" => Err(LoadError::dependency(
            "bzip2-encoded NRRD data requires bzip2 support that is not built in",
        )),
        other => Err(LoadError::loading(format!(
            "unknown NRRD encoding {other:?}"
        ))),
    }
}

/// Read a NRRD file into an array plus its toolkit header.
pub fn read(path: &Path) -> Result<(ArrayD<f32>, ToolkitHeader)> {
    let bytes = fs::read(path)
        .map_err(|e| LoadError::loading(format!("could not read {}: {e}", path.display())))?;

    if !looks_like(&bytes) {
        return Err(LoadError::loading(format!(
            "{} has no NRRD magic",
            path.display()
        )));
    }

    let mut pos = 0usize;
    let mut first = true;
    let mut dims: Vec<usize> = Vec::new();
    let mut dimension: Option<usize> = None;
    let mut pixel: Option<PixelType> = None;
    let mut enc = Encoding::Raw;
    let mut big_endian = false;
    let mut spacing: Option<Vec<f64>> = None;
    let mut origin: Option<Vec<f64>> = None;
    let mut data_file: Option<String> = None;

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

        if first {
            // magic line, already checked
            first = false;
            continue;
        }
        if line.is_empty() {
            break;
        }
        if line.starts_with('#') {
            continue;
        }
        let Some((field, value)) = line.split_once(':') else {
            return Err(LoadError::loading(format!(
                "malformed NRRD header line {line:?}"
            )));
        };
        let field = field.trim().to_lowercase();
        let value = value.trim();
        match field.as_str() {
            "dimension" => {
                dimension = Some(value.parse::<usize>().map_err(|e| {
                    LoadError::loading(format!("invalid NRRD dimension {value:?}: {e}"))
                })?)
            }
            "sizes" => {
                dims = value
                    .split_whitespace()
                    .map(|v| {
                        v.parse::<usize>().map_err(|e| {
                            LoadError::loading(format!("invalid NRRD size {v:?}: {e}"))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?
            }
            "type" => pixel = Some(element_type(value)?),
            "encoding" => enc = encoding(value)?,
            "endian" => big_endian = value.eq_ignore_ascii_case("big"),
            "spacings" => {
                spacing = Some(
                    value
                        .split_whitespace()
                        .map(|v| {
                            v.parse::<f64>().map_err(|e| {
                                LoadError::loading(format!("invalid NRRD spacing {v:?}: {e}"))
                            })
                        })
                        .collect::<Result<Vec<_>>>()?,
                )
            }
            "space origin" => {
                origin = Some(
                    value
                        .trim_start_matches('(')
                        .trim_end_matches(')')
                        .split(',')
                        .map(|v| {
                            v.trim().parse::<f64>().map_err(|e| {
                                LoadError::loading(format!("invalid NRRD origin {v:?}: {e}"))
                            })
                        })
                        .collect::<Result<Vec<_>>>()?,
                )
            }
            "data file" | "datafile" => data_file = Some(value.to_string()),
            // space directions, kinds, content and the rest are not needed
            // to reconstruct the pixel buffer
            _ => {}
        }
    }

    let pixel = pixel.ok_or_else(|| LoadError::loading("NRRD header has no type field"))?;
    if dims.is_empty() {
        return Err(LoadError::loading("NRRD header has no sizes field"));
    }
    if let Some(d) = dimension {
        if d != dims.len() {
            return Err(LoadError::loading(format!(
                "NRRD dimension {} does not match sizes rank {}",
                d,
                dims.len()
            )));
        }
    }

    let raw = match data_file {
        Some(name) => {
            if name.contains('%') || name == "LIST" {
                return Err(LoadError::loading("NRRD data file lists are not supported"));
            }
            let data_path = path.parent().unwrap_or(Path::new(".")).join(&name);
            fs::read(&data_path).map_err(|e| {
                LoadError::loading(format!(
                    "could not read data file {}: {e}",
                    data_path.display()
                ))
            })?
        }
        None => bytes[pos.min(bytes.len())..].to_vec(),
    };

    let values = match enc {
        Encoding::Raw => super::decode_elements(&raw, pixel, big_endian)?,
        Encoding::Gzip => {
            let mut decoded = Vec::new();
            GzDecoder::new(raw.as_slice())
                .read_to_end(&mut decoded)
                .map_err(|e| LoadError::loading(format!("gzip decompression failed: {e}")))?;
            super::decode_elements(&decoded, pixel, big_endian)?
        }
        Encoding::Ascii => String::from_utf8_lossy(&raw)
            .split_whitespace()
            .map(|v| {
                v.parse::<f32>()
                    .map_err(|e| LoadError::loading(format!("invalid ASCII element {v:?}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?,
    };

    let expected: usize = dims.iter().product();
    if values.len() != expected {
        return Err(LoadError::loading(format!(
            "NRRD element count {} does not match sizes ({} expected)",
            values.len(),
            expected
        )));
    }

    // sizes are fastest-axis first; the array shape is slowest first.
    let shape: Vec<usize> = dims.iter().rev().copied().collect();
    let arr = ArrayD::from_shape_vec(IxDyn(&shape), values)
        .map_err(|e| LoadError::loading(format!("failed to shape NRRD data: {e}")))?;

    let header = ToolkitHeader {
        descriptor: PixelDescriptor { pixel, dims },
        spacing,
        origin,
        format: ToolkitFormat::Nrrd,
    };
    Ok((arr, header))
}

/// Write an array as a NRRD file.
///
/// `.nhdr` targets get a detached sibling `.raw` data file; every other
/// suffix stores the data inline. Elements are written as little-endian
/// floats with raw encoding.
pub fn write(arr: &ArrayD<f32>, path: &Path, reference: Option<&ToolkitHeader>) -> Result<()> {
    let dims: Vec<usize> = arr.shape().iter().rev().copied().collect();
    let sizes = dims
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(" ");

    let mut header = String::new();
    header.push_str("NRRD0004\n");
    header.push_str("type: float\n");
    header.push_str(&format!("dimension: {}\n", dims.len()));
    header.push_str(&format!("sizes: {sizes}\n"));
    header.push_str("endian: little\n");
    header.push_str("encoding: raw\n");
    if let Some(spacing) = reference
        .and_then(|h| h.spacing.as_ref())
        .filter(|s| s.len() == dims.len())
    {
        let joined = spacing
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        header.push_str(&format!("spacings: {joined}\n"));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    let data = super::encode_f32_le(arr.iter().copied());

    if extension == "nhdr" {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let raw_name = format!("{stem}.raw");
        header.push_str(&format!("data file: {raw_name}\n"));
        header.push('\n');
        fs::write(path, header.as_bytes())
            .map_err(|e| LoadError::loading(format!("could not write {}: {e}", path.display())))?;
        let raw_path = path.parent().unwrap_or(Path::new(".")).join(raw_name);
        fs::write(&raw_path, &data).map_err(|e| {
            LoadError::loading(format!("could not write {}: {e}", raw_path.display()))
        })?;
    } else {
        header.push('\n');
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
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::tempdir;

    fn sample_array() -> ArrayD<f32> {
        ArrayD::from_shape_vec(IxDyn(&[3, 2]), vec![0.0, 1.5, -2.0, 3.25, 4.0, 5.5]).unwrap()
    }

    #[test]
    fn test_attached_roundtrip() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("img.nrrd");
        let arr = sample_array();

        write(&arr, &path, None)?;
        let (reloaded, header) = read(&path)?;

        assert_eq!(reloaded, arr);
        assert_eq!(header.descriptor.dims, vec![2, 3]);
        assert_eq!(header.descriptor.pixel, PixelType::Float32);
        assert_eq!(header.format, ToolkitFormat::Nrrd);
        Ok(())
    }

    #[test]
    fn test_detached_roundtrip() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("img.nhdr");
        let arr = sample_array();

        write(&arr, &path, None)?;
        assert!(dir.path().join("img.raw").exists());

        let (reloaded, _) = read(&path)?;
        assert_eq!(reloaded, arr);
        Ok(())
    }

    #[test]
    fn test_gzip_encoding() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("img.nrrd");

        let mut raw = Vec::new();
        for v in [1u16, 2, 3, 4] {
            raw.extend_from_slice(&v.to_le_bytes());
        }
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw)?;
        let compressed = encoder.finish()?;

        let mut bytes = Vec::new();
        bytes.extend_from_slice(
            b"NRRD0004\n\
              # created by hand\n\
              type: ushort\n\
              dimension: 2\n\
              sizes: 2 2\n\
              endian: little\n\
              encoding: gzip\n\
              \n",
        );
        bytes.extend_from_slice(&compressed);
        std::fs::write(&path, &bytes)?;

        let (arr, _) = read(&path)?;
        assert_eq!(arr.shape(), &[2, 2]);
        assert_eq!(
            arr.iter().copied().collect::<Vec<_>>(),
            vec![1.0, 2.0, 3.0, 4.0]
        );
        Ok(())
    }

    #[test]
    fn test_ascii_encoding() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("img.nrrd");
        std::fs::write(
            &path,
            b"NRRD0001\ntype: int\ndimension: 1\nsizes: 3\nencoding: ascii\n\n10 -20 30\n",
        )?;

        let (arr, _) = read(&path)?;
        assert_eq!(arr.shape(), &[3]);
        assert_eq!(arr.iter().copied().collect::<Vec<_>>(), vec![10.0, -20.0, 30.0]);
        Ok(())
    }

    #[test]
    fn test_bzip2_is_a_dependency_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("img.nrrd");
        std::fs::write(
            &path,
            b"NRRD0004\ntype: float\ndimension: 1\nsizes: 2\nencoding: bzip2\n\n",
        )
        .unwrap();

        let err = read(&path).unwrap_err();
        assert!(matches!(err, medio_core::LoadError::Dependency(_)));
    }
}
