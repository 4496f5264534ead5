use alloy::primitives::{Address, I256, U256};
use log::warn;
use serde::{Deserialize, Serialize};

use super::Token;
use crate::errors::{FundingError, InputField, Result};
use crate::providers::PoolSnapshot;

/// A distribution pool as read from the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    /// Index of the pool in the distributor
    pub id: U256,
    pub name: String,
    pub symbol: String,
    /// Pool contract address
    pub address: Address,
    /// Pool admin, the distributor that created it
    pub admin: Address,
    /// Distribution token
    pub token: Token,
    /// Total flow rate in smallest token units per second
    pub flow_rate: I256,
    pub total_units: u128,
    /// Units held by the connected account, zero without one
    pub user_units: u128,
    /// Not exposed by the contract
    pub created_at: Option<u64>,
}

impl Pool {
    pub fn from_snapshot(id: U256, snapshot: PoolSnapshot, token: Token) -> Self {
        let mut user_units = snapshot.member_units;
        if user_units > snapshot.total_units {
            warn!(
                "Pool {} reported member units {} above total units {}, capping",
                id, user_units, snapshot.total_units
            );
            user_units = snapshot.total_units;
        }

        Self {
            id,
            name: snapshot.name,
            symbol: snapshot.symbol,
            address: snapshot.address,
            admin: snapshot.admin,
            token,
            flow_rate: snapshot.total_flow_rate,
            total_units: snapshot.total_units,
            user_units,
            created_at: None,
        }
    }

    /// Share of the pool held by the connected account, in percent.
    pub fn user_share_percent(&self) -> f64 {
        if self.total_units == 0 {
            return 0.0;
        }
        self.user_units as f64 / self.total_units as f64 * 100.0
    }

    /// Portion of the pool flow rate routed to the connected account.
    pub fn estimated_rewards_per_second(&self) -> I256 {
        if self.total_units == 0 || self.user_units == 0 {
            return I256::ZERO;
        }
        let user_units = I256::from_raw(U256::from(self.user_units));
        let total_units = I256::from_raw(U256::from(self.total_units));
        self.flow_rate * user_units / total_units
    }

    pub fn is_member(&self) -> bool {
        self.user_units > 0
    }
}

/// Parses a pool identifier typed by the user.
pub fn parse_pool_id(value: &str) -> Result<U256> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FundingError::validation(InputField::PoolId, "is required"));
    }
    value
        .parse::<u64>()
        .map(U256::from)
        .map_err(|_| FundingError::validation(InputField::PoolId, "must be a non-negative integer"))
}
