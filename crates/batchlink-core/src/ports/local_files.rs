//! Local file port (driven/secondary port)
//!
//! Reads the bytes of a selected file. A file that vanished since
//! selection is reported as [`ServiceError::NotFound`].

use crate::domain::{ServiceError, SourceFile};

/// Port trait for reading selected files
#[async_trait::async_trait]
pub trait ILocalFiles: Send + Sync {
    /// Reads the full contents of `file`
    async fn read(&self, file: &SourceFile) -> Result<Vec<u8>, ServiceError>;
}
