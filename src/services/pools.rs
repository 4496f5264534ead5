use alloy::primitives::{Address, I256, U256};
use futures::future::try_join_all;
use log::{debug, info};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::errors::{FundingError, Result};
use crate::models::{Pool, Token, TokenRegistry};
use crate::providers::ChainReader;

/// Result of looking up a single pool.
#[derive(Debug, Clone, PartialEq)]
pub enum PoolLookup {
    Found(Box<Pool>),
    NotFound(U256),
}

impl PoolLookup {
    pub fn into_option(self) -> Option<Pool> {
        match self {
            PoolLookup::Found(pool) => Some(*pool),
            PoolLookup::NotFound(_) => None,
        }
    }
}

/// A pool the member holds units in, with its cut of the pool flow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberReward {
    pub pool: Pool,
    pub share_percent: f64,
    /// Smallest token units per second
    pub rewards_per_second: I256,
}

impl MemberReward {
    fn from_pool(pool: Pool) -> Self {
        Self {
            share_percent: pool.user_share_percent(),
            rewards_per_second: pool.estimated_rewards_per_second(),
            pool,
        }
    }
}

/// Reads pools from the distributor and caches the list until invalidated.
pub struct PoolService {
    reader: Arc<dyn ChainReader>,
    member: Option<Address>,
    cache: RwLock<Option<Vec<Pool>>>,
    tokens: RwLock<TokenRegistry>,
}

impl PoolService {
    /// `member` is the account whose units are reported, if any.
    pub fn new(reader: Arc<dyn ChainReader>, member: Option<Address>) -> Self {
        Self {
            reader,
            member,
            cache: RwLock::new(None),
            tokens: RwLock::new(TokenRegistry::new()),
        }
    }

    pub async fn pool_count(&self) -> Result<U256> {
        self.reader.pool_count().await
    }

    pub async fn get_pool(&self, pool_id: U256) -> Result<PoolLookup> {
        let address = self.reader.pool_address(pool_id).await?;
        if address.is_zero() {
            debug!("Pool {} does not exist", pool_id);
            return Ok(PoolLookup::NotFound(pool_id));
        }
        let pool = self.load_pool(pool_id, address).await?;
        Ok(PoolLookup::Found(Box::new(pool)))
    }

    /// All pools with ids `0..poolCount`, served from cache when available.
    pub async fn list_pools(&self) -> Result<Vec<Pool>> {
        if let Some(pools) = self.cache.read().await.as_ref() {
            return Ok(pools.clone());
        }
        self.refresh().await
    }

    pub async fn refresh(&self) -> Result<Vec<Pool>> {
        let count = self.reader.pool_count().await?;
        let count = u64::try_from(count)
            .map_err(|_| FundingError::rpc(format!("pool count {} out of range", count)))?;

        let pools = try_join_all((0..count).map(|id| async move {
            let pool_id = U256::from(id);
            let address = self.reader.pool_address(pool_id).await?;
            if address.is_zero() {
                return Ok(None);
            }
            self.load_pool(pool_id, address).await.map(Some)
        }))
        .await?;
        let pools: Vec<Pool> = pools.into_iter().flatten().collect();

        info!("Loaded {} pools", pools.len());
        *self.cache.write().await = Some(pools.clone());
        Ok(pools)
    }

    /// Forces the next listing to hit the chain.
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    pub async fn is_cached(&self) -> bool {
        self.cache.read().await.is_some()
    }

    /// Pools where the member account holds units.
    pub async fn member_pools(&self) -> Result<Vec<Pool>> {
        let pools = self.list_pools().await?;
        Ok(pools.into_iter().filter(Pool::is_member).collect())
    }

    /// Share and estimated income for every pool the member is in.
    pub async fn rewards(&self) -> Result<Vec<MemberReward>> {
        let pools = self.member_pools().await?;
        Ok(pools.into_iter().map(MemberReward::from_pool).collect())
    }

    async fn load_pool(&self, pool_id: U256, address: Address) -> Result<Pool> {
        let snapshot = self.reader.pool_snapshot(address, self.member).await?;
        let token = self.token(snapshot.super_token).await?;
        Ok(Pool::from_snapshot(pool_id, snapshot, token))
    }

    async fn token(&self, address: Address) -> Result<Token> {
        if let Some(token) = self.tokens.read().await.get_token(address) {
            return Ok(token.clone());
        }
        let token = self.reader.token(address).await?;
        self.tokens.write().await.add_token(token.clone());
        Ok(token)
    }
}
