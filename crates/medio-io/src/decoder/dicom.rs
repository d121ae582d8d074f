//! Backend for DICOM files, backed by the `dicom` crate.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use dicom::core::Tag;
use dicom::dictionary_std::{tags, uids};
use dicom::encoding::TransferSyntaxIndex;
use dicom::object::{open_file, FileDicomObject, FileMetaTableBuilder, InMemDicomObject};
use dicom::pixeldata::PixelDecoder;
use dicom::transfer_syntax::entries::IMPLICIT_VR_LITTLE_ENDIAN;
use dicom::transfer_syntax::TransferSyntaxRegistry;
use medio_core::{LoadError, Result};
use ndarray::{ArrayD, IxDyn};

use crate::header::ImageHeader;

use super::{squeeze, Decoder};

/// Tag-oriented decoder for DICOM (.dcm, .dicom) files.
///
/// A file that fails the strict open (bad or missing preamble and file meta
/// group) is retried once in a forced mode that reads the raw data set as
/// implicit VR little endian. The returned array has its axes reversed so
/// the ordering matches the convention of the other backends.
pub struct TagDecoder;

impl Decoder for TagDecoder {
    fn name(&self) -> &'static str {
        "dicom"
    }

    fn try_load(&self, path: &Path) -> Result<(ArrayD<f32>, ImageHeader)> {
        tracing::debug!("loading image {} with the dicom backend", path.display());

        let obj = match open_file(path) {
            Ok(obj) => obj,
            Err(e) => {
                tracing::debug!("strict DICOM open failed ({e}), retrying in forced mode");
                open_forced(path)?
            }
        };

        let ts_uid = obj.meta().transfer_syntax().trim_end_matches('\0').to_string();
        if TransferSyntaxRegistry.get(&ts_uid).is_none() {
            return Err(LoadError::dependency(format!(
                "transfer syntax {ts_uid} is not registered in this build"
            )));
        }

        let decoded = obj
            .decode_pixel_data()
            .map_err(|e| LoadError::loading(format!("failed to decode pixel data: {e}")))?;
        let frames = decoded.number_of_frames() as usize;
        let rows = decoded.rows() as usize;
        let cols = decoded.columns() as usize;
        let samples = decoded.samples_per_pixel() as usize;

        // to_vec applies the modality LUT, so no extra rescale pass
        let values = decoded
            .to_vec::<f32>()
            .map_err(|e| LoadError::loading(format!("pixel data conversion error: {e}")))?;

        let arr = ArrayD::from_shape_vec(IxDyn(&[frames, rows, cols, samples]), values)
            .map_err(|e| LoadError::loading(format!("pixel data size mismatch: {e}")))?;
        let arr = squeeze(arr)?;
        // this backend's native ordering is reversed relative to the others
        let arr = arr.reversed_axes().as_standard_layout().to_owned();

        Ok((arr, ImageHeader::Dicom(Box::new(obj))))
    }
}

/// Read a data set with no usable file meta group, assuming implicit VR
/// little endian, and attach a synthetic meta table.
fn open_forced(path: &Path) -> Result<FileDicomObject<InMemDicomObject>> {
    let mut file = File::open(path)
        .map_err(|e| LoadError::loading(format!("could not open {}: {e}", path.display())))?;

    // skip the 128-byte preamble and "DICM" marker when present
    let mut preamble = [0u8; 132];
    let has_marker = match file.read_exact(&mut preamble) {
        Ok(()) => &preamble[128..] == b"DICM",
        Err(_) => false,
    };
    if !has_marker {
        file.seek(SeekFrom::Start(0))
            .map_err(|e| LoadError::loading(format!("seek failed: {e}")))?;
    }

    let ts = IMPLICIT_VR_LITTLE_ENDIAN.erased();
    let mut reader = BufReader::new(file);
    let dataset = InMemDicomObject::read_dataset_with_ts(&mut reader, &ts)
        .map_err(|e| LoadError::loading(format!("forced DICOM read failed: {e}")))?;

    let sop_class = element_str(&dataset, tags::SOP_CLASS_UID)
        .unwrap_or_else(|| uids::SECONDARY_CAPTURE_IMAGE_STORAGE.to_string());
    let sop_instance =
        element_str(&dataset, tags::SOP_INSTANCE_UID).unwrap_or_else(|| "0.0".to_string());
    let meta = FileMetaTableBuilder::new()
        .transfer_syntax(IMPLICIT_VR_LITTLE_ENDIAN.uid())
        .media_storage_sop_class_uid(sop_class)
        .media_storage_sop_instance_uid(sop_instance)
        .build()
        .map_err(|e| LoadError::loading(format!("could not build file meta table: {e}")))?;

    Ok(dataset.with_exact_meta(meta))
}

fn element_str(obj: &InMemDicomObject, tag: Tag) -> Option<String> {
    obj.element(tag)
        .ok()?
        .to_str()
        .ok()
        .map(|s| s.trim_end_matches('\0').trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_junk_file_fails_in_both_modes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("junk.dcm");
        std::fs::write(&path, b"this is not dicom at all").unwrap();

        let err = TagDecoder.try_load(&path).unwrap_err();
        assert!(matches!(err, LoadError::Loading(_)));
    }

    #[test]
    fn test_empty_file_fails_cleanly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.dcm");
        std::fs::write(&path, b"").unwrap();

        assert!(TagDecoder.try_load(&path).is_err());
    }
}
