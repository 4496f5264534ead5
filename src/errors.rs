use alloy::primitives::{TxHash, U256};
use derive_more::Display;
use thiserror::Error;

use crate::config::ConfigError;
use crate::services::lifecycle::TxState;

/// User-facing input fields that can carry a validation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum InputField {
    #[display(fmt = "pool id")]
    PoolId,
    #[display(fmt = "amount")]
    Amount,
    #[display(fmt = "flow rate")]
    FlowRate,
    #[display(fmt = "duration")]
    Duration,
    #[display(fmt = "total amount")]
    TotalAmount,
    #[display(fmt = "pool name")]
    PoolName,
    #[display(fmt = "pool symbol")]
    PoolSymbol,
}

/// Why a submitted (or attempted) transaction did not confirm.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxFailure {
    #[error("Transaction rejected in wallet: {0}")]
    Rejected(String),

    #[error("Transaction submission failed: {0}")]
    Submission(String),

    #[error("Failed to fetch transaction receipt: {0}")]
    Receipt(String),

    #[error(
        "Transaction reverted: {}",
        .reason.as_deref().unwrap_or("the contract did not provide a reason")
    )]
    Reverted {
        hash: Option<TxHash>,
        reason: Option<String>,
    },
}

impl TxFailure {
    pub fn is_rejection(&self) -> bool {
        matches!(self, TxFailure::Rejected(_))
    }
}

#[derive(Debug, Error)]
pub enum FundingError {
    #[error("Invalid {field}: {message}")]
    Validation { field: InputField, message: String },

    #[error("Token approval required: need {required}, current allowance is {allowance}")]
    ApprovalRequired { required: String, allowance: String },

    #[error("Token allowance has not been loaded")]
    AllowanceNotLoaded,

    #[error("A transaction for this action is already pending")]
    AlreadyPending,

    #[error("Wallet not connected")]
    WalletNotConnected,

    #[error("Pool not found: {0}")]
    PoolNotFound(U256),

    #[error("Invalid transaction lifecycle transition from {from} to {to}")]
    InvalidTransition { from: TxState, to: TxState },

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error(transparent)]
    Transaction(#[from] TxFailure),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl FundingError {
    pub fn validation(field: InputField, message: impl Into<String>) -> Self {
        FundingError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn rpc(error: impl std::fmt::Display) -> Self {
        FundingError::Rpc(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FundingError>;
