//! Exchange Error Taxonomy
//!
//! The closed set of failure signals the core surfaces. Transport layers
//! translate these into wire codes; nothing else escapes the service
//! boundary.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Convenience alias used across the services.
pub type Result<T> = std::result::Result<T, ExchangeError>;

/// Message plus structured detail map carried by every error variant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorInfo {
    pub message: String,
    pub details: BTreeMap<String, String>,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: BTreeMap::new(),
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Core-level errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("{0}")]
    InsufficientBalance(ErrorInfo),

    #[error("{0}")]
    InvalidOrder(ErrorInfo),

    #[error("{0}")]
    EntityNotFound(ErrorInfo),

    #[error("{0}")]
    Settlement(ErrorInfo),

    #[error("{0}")]
    OrderLink(ErrorInfo),

    #[error("{0}")]
    StopOrder(ErrorInfo),

    #[error("{0}")]
    AdminPermission(ErrorInfo),

    #[error("{0}")]
    WithdrawalApproval(ErrorInfo),
}

impl ExchangeError {
    pub fn insufficient_balance(message: impl Into<String>) -> Self {
        Self::InsufficientBalance(ErrorInfo::new(message))
    }

    pub fn invalid_order(message: impl Into<String>) -> Self {
        Self::InvalidOrder(ErrorInfo::new(message))
    }

    pub fn entity_not_found(message: impl Into<String>) -> Self {
        Self::EntityNotFound(ErrorInfo::new(message))
    }

    pub fn settlement(message: impl Into<String>) -> Self {
        Self::Settlement(ErrorInfo::new(message))
    }

    pub fn order_link(message: impl Into<String>) -> Self {
        Self::OrderLink(ErrorInfo::new(message))
    }

    pub fn stop_order(message: impl Into<String>) -> Self {
        Self::StopOrder(ErrorInfo::new(message))
    }

    pub fn admin_permission(message: impl Into<String>) -> Self {
        Self::AdminPermission(ErrorInfo::new(message))
    }

    pub fn withdrawal_approval(message: impl Into<String>) -> Self {
        Self::WithdrawalApproval(ErrorInfo::new(message))
    }

    /// Attach a structured detail entry.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.info_mut().details.insert(key.into(), value.to_string());
        self
    }

    /// Stable code for transport-level mapping.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InsufficientBalance(_) => "INSUFFICIENT_BALANCE",
            Self::InvalidOrder(_) => "INVALID_ORDER",
            Self::EntityNotFound(_) => "ENTITY_NOT_FOUND",
            Self::Settlement(_) => "SETTLEMENT_ERROR",
            Self::OrderLink(_) => "ORDER_LINK_ERROR",
            Self::StopOrder(_) => "STOP_ORDER_ERROR",
            Self::AdminPermission(_) => "ADMIN_PERMISSION_ERROR",
            Self::WithdrawalApproval(_) => "WITHDRAWAL_APPROVAL_ERROR",
        }
    }

    pub fn info(&self) -> &ErrorInfo {
        match self {
            Self::InsufficientBalance(info)
            | Self::InvalidOrder(info)
            | Self::EntityNotFound(info)
            | Self::Settlement(info)
            | Self::OrderLink(info)
            | Self::StopOrder(info)
            | Self::AdminPermission(info)
            | Self::WithdrawalApproval(info) => info,
        }
    }

    fn info_mut(&mut self) -> &mut ErrorInfo {
        match self {
            Self::InsufficientBalance(info)
            | Self::InvalidOrder(info)
            | Self::EntityNotFound(info)
            | Self::Settlement(info)
            | Self::OrderLink(info)
            | Self::StopOrder(info)
            | Self::AdminPermission(info)
            | Self::WithdrawalApproval(info) => info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_messages() {
        let err = ExchangeError::insufficient_balance("Insufficient available balance for order")
            .with_detail("asset", "USDT")
            .with_detail("required", "1001");

        assert_eq!(err.code(), "INSUFFICIENT_BALANCE");
        assert_eq!(
            err.to_string(),
            "Insufficient available balance for order"
        );
        assert_eq!(err.info().details.get("asset").map(String::as_str), Some("USDT"));
    }

    #[test]
    fn test_variant_matching() {
        let err = ExchangeError::invalid_order("Amount must be positive");
        assert!(matches!(err, ExchangeError::InvalidOrder(_)));
        assert_eq!(err.code(), "INVALID_ORDER");
    }
}
