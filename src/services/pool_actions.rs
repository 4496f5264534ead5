use alloy::primitives::{Address, U256};
use log::info;
use std::sync::Arc;

use super::lifecycle::{InFlight, TxLifecycle, TxObserver};
use super::pools::{PoolLookup, PoolService};
use crate::errors::{FundingError, InputField, Result};
use crate::models::Pool;
use crate::providers::WriteCall;

const MIN_POOL_NAME_LEN: usize = 3;

/// Pool creation and membership writes.
pub struct PoolActions {
    observer: TxObserver,
    pools: Arc<PoolService>,
    super_token: Address,
    in_flight: InFlight,
}

impl PoolActions {
    pub fn new(observer: TxObserver, pools: Arc<PoolService>, super_token: Address) -> Self {
        Self {
            observer,
            pools,
            super_token,
            in_flight: InFlight::new(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.in_flight.is_active()
    }

    pub async fn create_pool(&self, name: &str, symbol: &str) -> Result<TxLifecycle> {
        let (name, symbol) = validate_pool_metadata(name, symbol)?;
        self.run(WriteCall::CreatePool {
            super_token: self.super_token,
            name,
            symbol,
        })
        .await
    }

    /// Claims units in the pool for the connected account.
    pub async fn collect_units(&self, pool_id: U256) -> Result<TxLifecycle> {
        self.existing_pool(pool_id).await?;
        self.run(WriteCall::IncreasePoolUnits { pool_id }).await
    }

    pub async fn decrease_units(&self, pool_id: U256) -> Result<TxLifecycle> {
        let pool = self.existing_pool(pool_id).await?;
        if !pool.is_member() {
            return Err(FundingError::validation(
                InputField::PoolId,
                format!("no units held in pool {}", pool_id),
            ));
        }
        self.run(WriteCall::DecreasePoolUnits { pool_id }).await
    }

    async fn existing_pool(&self, pool_id: U256) -> Result<Pool> {
        match self.pools.get_pool(pool_id).await? {
            PoolLookup::Found(pool) => Ok(*pool),
            PoolLookup::NotFound(id) => Err(FundingError::PoolNotFound(id)),
        }
    }

    async fn run(&self, call: WriteCall) -> Result<TxLifecycle> {
        let _guard = self.in_flight.acquire()?;
        let lifecycle = self.observer.execute(call).await?;
        if lifecycle.is_confirmed() {
            info!("{} confirmed, refreshing pools", lifecycle.action());
            self.pools.invalidate().await;
        }
        Ok(lifecycle)
    }
}

pub fn validate_pool_metadata(name: &str, symbol: &str) -> Result<(String, String)> {
    let name = name.trim();
    let symbol = symbol.trim();
    if name.chars().count() < MIN_POOL_NAME_LEN {
        return Err(FundingError::validation(
            InputField::PoolName,
            format!("must be at least {} characters", MIN_POOL_NAME_LEN),
        ));
    }
    if symbol.is_empty() {
        return Err(FundingError::validation(InputField::PoolSymbol, "is required"));
    }
    Ok((name.to_string(), symbol.to_string()))
}
