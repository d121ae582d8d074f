pub mod error;
pub mod image_type;

pub use error::{LoadError, Result};
pub use image_type::{supported_descriptions, ImageType};
