//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three operations every backend must
//! support: identify, resize, and placeholder.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Tests use a recording mock so variant policy can be checked without
//! encoding pixels.

use super::params::{PlaceholderParams, ResizeParams};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// `Sync` because variants of one image are written from rayon workers.
pub trait ImageBackend: Sync {
    /// Get image dimensions.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Write one resized variant to `params.output`.
    ///
    /// Implementations must never leave a partially written file at the
    /// output path: either the complete encoding lands there or nothing does.
    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError>;

    /// Encode a blurred, downscaled preview and return the JPEG bytes.
    fn placeholder(&self, source: &Path, params: &PlaceholderParams)
    -> Result<Vec<u8>, BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::params::{OutputFormat, Quality};
    use std::sync::Mutex;

    /// Mock backend that records operations without decoding anything.
    ///
    /// `resize` writes a small stub file at the output path so existence
    /// checks behave like they do against a real output directory. Uses
    /// Mutex (not RefCell) so it is Sync and works with rayon's par_iter.
    #[derive(Default)]
    pub struct MockBackend {
        pub identify_results: Mutex<Vec<Dimensions>>,
        pub operations: Mutex<Vec<RecordedOp>>,
        /// When set, `resize` fails for outputs with this extension.
        pub fail_format: Option<OutputFormat>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(String),
        Resize {
            source: String,
            output: String,
            width: u32,
            height: u32,
            format: OutputFormat,
            quality: u32,
        },
        Placeholder {
            source: String,
            width: u32,
        },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        /// Dimensions are popped, so the last entry is returned first.
        pub fn with_dimensions(dims: Vec<Dimensions>) -> Self {
            Self {
                identify_results: Mutex::new(dims),
                ..Self::default()
            }
        }

        pub fn failing_on(format: OutputFormat, dims: Vec<Dimensions>) -> Self {
            Self {
                identify_results: Mutex::new(dims),
                fail_format: Some(format),
                ..Self::default()
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn resize_count(&self) -> usize {
            self.get_operations()
                .iter()
                .filter(|op| matches!(op, RecordedOp::Resize { .. }))
                .count()
        }
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Identify(path.to_string_lossy().to_string()));

            self.identify_results
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| BackendError::ProcessingFailed("No mock dimensions".to_string()))
        }

        fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Resize {
                source: params.source.to_string_lossy().to_string(),
                output: params.output.to_string_lossy().to_string(),
                width: params.width,
                height: params.height,
                format: params.format,
                quality: params.quality.value(),
            });
            if self.fail_format == Some(params.format) {
                return Err(BackendError::ProcessingFailed(format!(
                    "{} encode failed",
                    params.format
                )));
            }
            std::fs::write(
                &params.output,
                format!("{}x{} {}", params.width, params.height, params.format),
            )?;
            Ok(())
        }

        fn placeholder(
            &self,
            source: &Path,
            params: &PlaceholderParams,
        ) -> Result<Vec<u8>, BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Placeholder {
                source: source.to_string_lossy().to_string(),
                width: params.width,
            });
            Ok(b"blur".to_vec())
        }
    }

    #[test]
    fn mock_records_identify() {
        let backend = MockBackend::with_dimensions(vec![Dimensions {
            width: 800,
            height: 600,
        }]);

        let result = backend.identify(Path::new("/test/image.jpg")).unwrap();
        assert_eq!(result.width, 800);
        assert_eq!(result.height, 600);

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], RecordedOp::Identify(p) if p == "/test/image.jpg"));
    }

    #[test]
    fn mock_identify_without_dimensions_errors() {
        let backend = MockBackend::new();
        assert!(backend.identify(Path::new("/x.jpg")).is_err());
    }

    #[test]
    fn mock_resize_writes_stub_output() {
        let tmp = tempfile::TempDir::new().unwrap();
        let output = tmp.path().join("out.webp");
        let backend = MockBackend::new();

        backend
            .resize(&ResizeParams {
                source: "/source.jpg".into(),
                output: output.clone(),
                width: 800,
                height: 400,
                format: OutputFormat::Webp,
                quality: Quality::new(75),
            })
            .unwrap();

        assert!(output.exists());
        assert_eq!(backend.resize_count(), 1);
        assert!(matches!(
            &backend.get_operations()[0],
            RecordedOp::Resize {
                width: 800,
                height: 400,
                format: OutputFormat::Webp,
                quality: 75,
                ..
            }
        ));
    }

    #[test]
    fn mock_resize_failure_leaves_no_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let output = tmp.path().join("out.jpeg");
        let backend = MockBackend::failing_on(OutputFormat::Jpeg, vec![]);

        let result = backend.resize(&ResizeParams {
            source: "/source.jpg".into(),
            output: output.clone(),
            width: 320,
            height: 160,
            format: OutputFormat::Jpeg,
            quality: Quality::default(),
        });

        assert!(result.is_err());
        assert!(!output.exists());
    }
}
