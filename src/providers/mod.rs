mod alloy_wallet;
mod chain_reader;
pub mod utils;

pub use alloy_wallet::*;
pub use chain_reader::*;
pub use utils::*;

use alloy::primitives::{Address, TxHash, I256, U256};
use async_trait::async_trait;
use serde::Serialize;

use crate::errors::{Result, TxFailure};
use crate::models::Token;

/// A state-changing call against the distributor or the distribution token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCall {
    Approve {
        token: Address,
        spender: Address,
        amount: U256,
    },
    CreatePool {
        super_token: Address,
        name: String,
        symbol: String,
    },
    AirdropDistribution {
        pool_id: U256,
        amount: U256,
    },
    StreamDistribution {
        pool_id: U256,
        amount: U256,
        duration: U256,
    },
    IncreasePoolUnits {
        pool_id: U256,
    },
    DecreasePoolUnits {
        pool_id: U256,
    },
}

impl WriteCall {
    pub fn function_name(&self) -> &'static str {
        match self {
            WriteCall::Approve { .. } => "approve",
            WriteCall::CreatePool { .. } => "createPool",
            WriteCall::AirdropDistribution { .. } => "airdropDistribution",
            WriteCall::StreamDistribution { .. } => "streamDistribution",
            WriteCall::IncreasePoolUnits { .. } => "increasePoolUnits",
            WriteCall::DecreasePoolUnits { .. } => "decreasePoolUnits",
        }
    }

    /// Short human description used in logs and notifications.
    pub fn summary(&self) -> String {
        match self {
            WriteCall::Approve { spender, .. } => format!("Token approval for {:?}", spender),
            WriteCall::CreatePool { name, symbol, .. } => {
                format!("Create pool {} ({})", name, symbol)
            }
            WriteCall::AirdropDistribution { pool_id, .. } => format!("Airdrop to pool {}", pool_id),
            WriteCall::StreamDistribution {
                pool_id, duration, ..
            } => format!("Stream to pool {} over {}s", pool_id, duration),
            WriteCall::IncreasePoolUnits { pool_id } => format!("Collect units in pool {}", pool_id),
            WriteCall::DecreasePoolUnits { pool_id } => {
                format!("Decrease units in pool {}", pool_id)
            }
        }
    }
}

/// Summary of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxReceiptInfo {
    pub hash: TxHash,
    pub success: bool,
    pub block_number: Option<u64>,
    pub gas_used: u64,
}

/// Signing capability of the connected account.
#[async_trait]
pub trait Wallet: Send + Sync {
    fn account(&self) -> Option<Address>;

    fn is_connected(&self) -> bool {
        self.account().is_some()
    }

    /// Signs and broadcasts `call`, returning the transaction hash.
    async fn sign_and_send(&self, call: WriteCall) -> std::result::Result<TxHash, TxFailure>;

    /// Resolves once the transaction is mined. Never times out.
    async fn wait_for_receipt(&self, hash: TxHash)
        -> std::result::Result<TxReceiptInfo, TxFailure>;
}

/// Raw pool state as exposed by the pool contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub admin: Address,
    pub super_token: Address,
    pub total_units: u128,
    pub member_units: u128,
    pub total_flow_rate: I256,
}

/// Read-only view of the distributor, its pools and the distribution token.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn pool_count(&self) -> Result<U256>;

    /// Address stored for `pool_id`; the zero address when no such pool exists.
    async fn pool_address(&self, pool_id: U256) -> Result<Address>;

    async fn pool_snapshot(&self, pool: Address, member: Option<Address>) -> Result<PoolSnapshot>;

    /// Token the distributor streams.
    async fn super_token(&self) -> Result<Address>;

    async fn token(&self, token: Address) -> Result<Token>;

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256>;

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256>;
}
