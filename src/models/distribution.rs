use alloy::primitives::{TxHash, U256};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A confirmed funding event. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    /// Hash of the funding transaction
    pub id: TxHash,
    pub pool_id: U256,
    /// Total amount in smallest units
    pub amount: U256,
    /// Smallest units per second, zero for airdrops
    pub flow_rate: U256,
    pub start_time: u64,
    pub end_time: Option<u64>,
    pub is_streaming: bool,
}

impl Distribution {
    pub fn airdrop(id: TxHash, pool_id: U256, amount: U256) -> Self {
        Self {
            id,
            pool_id,
            amount,
            flow_rate: U256::ZERO,
            start_time: Utc::now().timestamp() as u64,
            end_time: None,
            is_streaming: false,
        }
    }

    pub fn stream(id: TxHash, pool_id: U256, amount: U256, duration: u64) -> Self {
        let start_time = Utc::now().timestamp() as u64;
        let flow_rate = if duration == 0 {
            U256::ZERO
        } else {
            amount / U256::from(duration)
        };
        Self {
            id,
            pool_id,
            amount,
            flow_rate,
            start_time,
            end_time: Some(start_time + duration),
            is_streaming: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_distribution_window() {
        let distribution =
            Distribution::stream(TxHash::ZERO, U256::from(2u64), U256::from(8_640u64), 86_400);
        assert!(distribution.is_streaming);
        assert_eq!(distribution.end_time, Some(distribution.start_time + 86_400));
        assert_eq!(distribution.flow_rate, U256::ZERO);

        let distribution =
            Distribution::stream(TxHash::ZERO, U256::from(2u64), U256::from(864_000u64), 86_400);
        assert_eq!(distribution.flow_rate, U256::from(10u64));
    }

    #[test]
    fn test_airdrop_distribution() {
        let distribution = Distribution::airdrop(TxHash::ZERO, U256::from(1u64), U256::from(5u64));
        assert!(!distribution.is_streaming);
        assert_eq!(distribution.end_time, None);
        assert_eq!(distribution.flow_rate, U256::ZERO);
    }
}
