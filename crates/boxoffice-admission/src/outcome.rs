//! Ordinary admission outcomes.
//!
//! A rejected purchase is an expected result, not a failure, so it travels
//! in the `Ok` arm of an [`AppResult`](boxoffice_core::AppResult) as the
//! `Err` arm of a [`Verdict`]. Only infrastructure problems use `AppError`.

use std::time::Duration;

use thiserror::Error;

/// Why a gate turned an attempt away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    /// Fewer units remain than were requested.
    #[error("Not enough tickets available")]
    OutOfStock,
    /// The sale window has not opened yet.
    #[error("Ticket sale has not started yet")]
    SaleNotStarted,
    /// The sale window has closed.
    #[error("Ticket sale has ended")]
    SaleEnded,
    /// The ticket type does not exist or has been retired.
    #[error("Ticket type not found")]
    NotFound,
    /// The caller exhausted its request window.
    #[error("Rate limit exceeded, retry in {}s", retry_after.as_secs().max(1))]
    RateLimitExceeded {
        /// Limit of the profile that denied the request.
        limit: u64,
        /// Time until the window resets.
        retry_after: Duration,
    },
    /// This client already holds a claim on the ticket type.
    #[error("A purchase for this ticket type was already made from this client")]
    DuplicateClaim,
    /// The reservation was never issued, already settled, or has expired.
    #[error("Reservation is unknown or already settled")]
    UnknownReservation,
}

impl Rejection {
    /// Stable machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::OutOfStock => "OUT_OF_STOCK",
            Self::SaleNotStarted => "SALE_NOT_STARTED",
            Self::SaleEnded => "SALE_ENDED",
            Self::NotFound => "NOT_FOUND",
            Self::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            Self::DuplicateClaim => "DUPLICATE_CLAIM",
            Self::UnknownReservation => "UNKNOWN_RESERVATION",
        }
    }
}

/// Result of a gate that can turn an attempt away.
pub type Verdict<T> = Result<T, Rejection>;
