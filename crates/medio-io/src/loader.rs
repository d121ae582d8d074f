//! The dispatching image loader.
//!
//! Loading is two-tiered: the file suffix routes to the registered backend,
//! and when classification or the registered backend fails, every backend is
//! tried in a fixed order (brute force). In some cases a backend can load an
//! image it is not registered for, so the fallback is attempted even for
//! unrecognized suffixes. The diagnostic raised at the end is always the one
//! from the primary attempt, never from a fallback attempt.

use std::path::Path;

use medio_core::{supported_descriptions, ImageType, LoadError, Result};
use ndarray::ArrayD;

use crate::decoder::{Decoder, FormatDecoder, GenericToolkitDecoder, TagDecoder};
use crate::header::ImageHeader;

/// A successful load: the pixel array plus the backend-specific metadata
/// handle.
pub type LoadResult = (ArrayD<f32>, ImageHeader);

static FORMAT: FormatDecoder = FormatDecoder;
static TAG: TagDecoder = TagDecoder;
static TOOLKIT: GenericToolkitDecoder = GenericToolkitDecoder;

/// Image loader over a fixed set of three backends.
///
/// The static tables it consults are never mutated, so a single loader (or
/// the free [`load`] function) is safe to use from multiple threads.
pub struct Loader<'a> {
    format: &'a dyn Decoder,
    tag: &'a dyn Decoder,
    toolkit: &'a dyn Decoder,
}

impl Loader<'static> {
    /// Loader over the built-in backends.
    pub fn new() -> Self {
        Loader {
            format: &FORMAT,
            tag: &TAG,
            toolkit: &TOOLKIT,
        }
    }
}

impl Default for Loader<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Loader<'a> {
    /// Loader over custom backends, in registration order (format, tag,
    /// toolkit). Mainly useful for tests.
    pub fn with_decoders(
        format: &'a dyn Decoder,
        tag: &'a dyn Decoder,
        toolkit: &'a dyn Decoder,
    ) -> Self {
        Loader {
            format,
            tag,
            toolkit,
        }
    }

    /// The backend registered for an image type.
    fn decoder_for(&self, kind: ImageType) -> &'a dyn Decoder {
        match kind {
            ImageType::Nifti | ImageType::Analyze => self.format,
            ImageType::Dicom => self.tag,
            _ => self.toolkit,
        }
    }

    /// Fixed order of backends for the brute-force fallback.
    fn fallback_order(&self) -> [&'a dyn Decoder; 3] {
        [self.format, self.tag, self.toolkit]
    }

    /// Load the image at `path`.
    ///
    /// Returns the pixel array and a format-specific metadata handle that
    /// can be passed to [`crate::save`] for the same backend family.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<LoadResult> {
        let path = path.as_ref();
        tracing::info!("loading image {}...", path.display());

        // never retried in fallback
        if !path.exists() {
            return Err(LoadError::loading(format!(
                "the supplied image {} does not exist",
                path.display()
            )));
        }

        let pending = match ImageType::of_path(path) {
            Some(kind) => match self.decoder_for(kind).try_load(path) {
                Ok(result) => return Ok(result),
                Err(LoadError::Dependency(reason)) => LoadError::dependency(format!(
                    "loading images of type {} requires third-party support that is not \
                     available: {reason}",
                    kind.description()
                )),
                Err(LoadError::Loading(reason)) | Err(LoadError::UnknownType(reason)) => {
                    LoadError::loading(format!(
                        "failed to load image {} as {}; reason signaled by the backend: {reason}",
                        path.display(),
                        kind.description()
                    ))
                }
            },
            None => LoadError::unknown_type(format!(
                "the suffix {:?} of {} could not be associated with any known image type; \
                 supported types are: {}",
                last_suffix(path),
                path.display(),
                supported_descriptions()
            )),
        };

        // Brute force: every backend in fixed order, the primary backend
        // included. The first success wins and the pending diagnostic is
        // dropped.
        tracing::debug!("normal loading failed, entering brute force mode");
        for decoder in self.fallback_order() {
            match decoder.try_load(path) {
                Ok(result) => return Ok(result),
                Err(e) => tracing::debug!("backend {} signaled error: {e}", decoder.name()),
            }
        }

        Err(pending)
    }
}

/// The substring after the last `.` of the path, or the whole name when
/// there is no dot. Used only for diagnostics.
pub(crate) fn last_suffix(path: &Path) -> String {
    let name = path.to_string_lossy();
    name.rsplit('.').next().unwrap_or_default().to_string()
}

/// Load an image using the built-in backends.
///
/// See [`Loader::load`] for the routing and fallback rules and the error
/// contract.
pub fn load<P: AsRef<Path>>(path: P) -> Result<LoadResult> {
    Loader::new().load(path)
}
