//! Image processing, pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader::into_dimensions` |
//! | **Resize → JPEG/WebP/AVIF/PNG** | Lanczos3 + `image` encoders |
//! | **Placeholder** | downscale + `blur` + JPEG, base64 inlined |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for widths, heights, `srcset`/`sizes` (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{calculate_widths, sizes_attribute};
pub use operations::{
    GeneratedVariants, ResponsiveConfig, create_placeholder, create_responsive_images,
    get_dimensions,
};
pub use params::{OutputFormat, PlaceholderParams, Quality, WidthPolicy};
pub use rust_backend::{RustBackend, supported_input_extensions};
