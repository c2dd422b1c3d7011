//! Request DTOs with validation.

use serde::{Deserialize, Serialize};
use validator::Validate;

use boxoffice_admission::RateIdentity;
use boxoffice_core::error::AppError;
use boxoffice_core::result::AppResult;
use boxoffice_core::types::{TicketTypeId, UserId};

/// Query string of the availability check.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AvailabilityQuery {
    /// Requested quantity; defaults to 1.
    pub quantity: Option<String>,
}

impl AvailabilityQuery {
    /// Parse the quantity, rejecting non-numeric and non-positive values.
    pub fn quantity(&self) -> AppResult<u32> {
        match self.quantity.as_deref().map(str::trim) {
            None | Some("") => Ok(1),
            Some(raw) => match raw.parse::<i64>() {
                Ok(n) if n > 0 => u32::try_from(n)
                    .map_err(|_| AppError::validation("Quantity is too large")),
                Ok(_) => Err(AppError::validation("Quantity must be positive")),
                Err(_) => Err(AppError::validation(format!("Invalid quantity '{raw}'"))),
            },
        }
    }
}

/// Purchase attempt body.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PurchaseRequest {
    /// Ticket type to reserve.
    pub ticket_type_id: TicketTypeId,
    /// Units to reserve. The upper bound is configuration, enforced by the
    /// inventory ledger.
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: u32,
}

/// Administrative rate-limit reset body.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ResetRateLimitRequest {
    /// `ip:{addr}` or `user:{id}`.
    #[validate(length(min = 1))]
    pub identity: String,
    /// Route path of the window.
    #[validate(length(min = 1))]
    pub route: String,
}

impl ResetRateLimitRequest {
    pub fn rate_identity(&self) -> AppResult<RateIdentity> {
        if let Some(addr) = self.identity.strip_prefix("ip:") {
            return Ok(RateIdentity::Address(addr.to_string()));
        }
        if let Some(id) = self.identity.strip_prefix("user:") {
            let user_id: UserId = id
                .parse()
                .map_err(|_| AppError::validation(format!("Invalid user id '{id}'")))?;
            return Ok(RateIdentity::User(user_id));
        }
        Err(AppError::validation(
            "Identity must look like 'ip:{addr}' or 'user:{id}'",
        ))
    }
}

/// Parse a ticket type id from a path segment.
pub fn parse_ticket_type_id(raw: &str) -> AppResult<TicketTypeId> {
    raw.parse()
        .map_err(|_| AppError::validation(format!("Invalid ticket type id '{raw}'")))
}
