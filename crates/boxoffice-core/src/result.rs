//! Convenience result type alias for BoxOffice.

use crate::error::AppError;

/// A specialized `Result` type for BoxOffice operations.
pub type AppResult<T> = Result<T, AppError>;
