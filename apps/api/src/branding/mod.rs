// Letterhead branding: fit-and-center geometry, PDF compositing, the batch
// driver with its retrying writer, and the ZIP archive of the results.
// PDF work is synchronous and CPU-bound; handlers run it inside
// tokio::task::spawn_blocking.

pub mod archive;
pub mod batch;
pub mod geometry;
pub mod handlers;
pub mod pdf;
pub mod writer;

#[cfg(test)]
pub(crate) mod test_support;

use thiserror::Error;

pub use batch::BatchDriver;
pub use geometry::FitSettings;
pub use writer::{FsWriter, RetryPolicy};

/// Errors raised while branding documents.
///
/// Only the letterhead variants and output-location failures abort a run;
/// the batch driver turns every other variant into a per-document notice.
#[derive(Debug, Error)]
pub enum BrandError {
    #[error("letterhead could not be parsed: {0}")]
    LetterheadParse(String),

    #[error("letterhead has no pages")]
    LetterheadEmpty,

    #[error("document could not be parsed: {0}")]
    DocumentParse(String),

    #[error("document has no pages")]
    DocumentEmpty,

    #[error("page {page} has no usable MediaBox")]
    PageGeometry { page: u32 },

    #[error("page {page} content could not be decoded: {reason}")]
    PageContent { page: u32, reason: String },

    #[error("failed to serialize PDF: {0}")]
    Serialize(String),

    #[error("failed to write output after {attempts} attempt(s): {source}")]
    Write {
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build archive: {0}")]
    Archive(String),

    #[error("output location error: {0}")]
    Io(#[from] std::io::Error),
}

impl BrandError {
    /// True for failures that make the whole run impossible.
    pub fn is_letterhead_error(&self) -> bool {
        matches!(
            self,
            BrandError::LetterheadParse(_) | BrandError::LetterheadEmpty
        )
    }
}
