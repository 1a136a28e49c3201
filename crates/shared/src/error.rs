use thiserror::Error;

use crate::domain::PlanCategory;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("not a plan file: expected file_type {expected:?}, got {actual:?}")]
    WrongFileType { expected: String, actual: String },
    #[error("unsupported plan file version {actual} (supported: {supported})")]
    UnsupportedVersion { actual: u32, supported: u32 },
    #[error("section category mismatch: controller handles {expected:?}, got {actual:?}")]
    CategoryMismatch {
        expected: PlanCategory,
        actual: PlanCategory,
    },
    #[error("malformed plan document: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("plan file i/o error: {0}")]
    Io(#[from] std::io::Error),
}
