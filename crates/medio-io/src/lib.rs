pub mod decoder;
pub mod formats;
pub mod header;
pub mod loader;
pub mod save;

pub use header::{ImageHeader, PixelDescriptor, PixelType, ToolkitFormat, ToolkitHeader};
pub use loader::{load, LoadResult, Loader};
pub use medio_core::{supported_descriptions, ImageType, LoadError, Result};
pub use save::save;
