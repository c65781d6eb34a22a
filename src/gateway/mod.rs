//! Typed transport boundary to the backend ledger

use serde::{Deserialize, Serialize};

use crate::types::{SettlementError, SettlementResult};

pub mod http;

pub use http::{GatewayConfig, HttpGateway};

/// Standard response envelope wrapping every backend payload
///
/// `success: false` is a recoverable application error carrying the
/// server-provided message; callers convert it through
/// [`into_result`](Self::into_result) or [`into_ack`](Self::into_ack)
/// and are forced to handle the failure branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    /// Whether the operation succeeded application-side
    pub success: bool,
    /// Backend status code for the operation
    pub status: u16,
    /// Payload, present on success for data-carrying endpoints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Server-provided message, usually present on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    /// Unwrap the payload of a data-carrying endpoint
    pub fn into_result(self) -> SettlementResult<T> {
        if !self.success {
            return Err(SettlementError::Backend {
                status: self.status,
                message: self
                    .message
                    .unwrap_or_else(|| "Backend reported failure without a message".to_string()),
            });
        }

        self.data.ok_or_else(|| {
            SettlementError::InvalidResponse(
                "Successful response carried no data".to_string(),
            )
        })
    }

    /// Unwrap an acknowledgement-only endpoint, discarding any payload
    pub fn into_ack(self) -> SettlementResult<()> {
        if !self.success {
            return Err(SettlementError::Backend {
                status: self.status,
                message: self
                    .message
                    .unwrap_or_else(|| "Backend reported failure without a message".to_string()),
            });
        }
        Ok(())
    }
}
