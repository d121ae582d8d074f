//! Native codecs for the ITK-family formats the toolkit backend carries
//! itself (MetaImage and NRRD have no ecosystem crate).

pub mod meta;
pub mod nrrd;

use medio_core::{LoadError, Result};

use crate::header::PixelType;

/// Decode a raw element slab into f32 values.
pub(crate) fn decode_elements(bytes: &[u8], pixel: PixelType, big_endian: bool) -> Result<Vec<f32>> {
    let size = pixel.size_bytes();
    if bytes.len() % size != 0 {
        return Err(LoadError::loading(format!(
            "element data length {} is not a multiple of the element size {}",
            bytes.len(),
            size
        )));
    }

    macro_rules! convert {
        ($ty:ty) => {
            bytes
                .chunks_exact(size)
                .map(|c| {
                    let raw: [u8; std::mem::size_of::<$ty>()] =
                        c.try_into().expect("chunk size matches element size");
                    let v = if big_endian {
                        <$ty>::from_be_bytes(raw)
                    } else {
                        <$ty>::from_le_bytes(raw)
                    };
                    v as f32
                })
                .collect()
        };
    }

    let values: Vec<f32> = match pixel {
        PixelType::UInt8 => bytes.iter().map(|&b| b as f32).collect(),
        PixelType::Int8 => bytes.iter().map(|&b| b as i8 as f32).collect(),
        PixelType::UInt16 => convert!(u16),
        PixelType::Int16 => convert!(i16),
        PixelType::UInt32 => convert!(u32),
        PixelType::Int32 => convert!(i32),
        PixelType::Float32 => convert!(f32),
        PixelType::Float64 => convert!(f64),
    };
    Ok(values)
}

/// Encode f32 values as little-endian bytes.
pub(crate) fn encode_f32_le(values: impl Iterator<Item = f32>) -> Vec<u8> {
    let mut out = Vec::new();
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}
