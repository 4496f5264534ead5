use std::future::IntoFuture;

use alloy::primitives::{Address, I256, U256};
use alloy::providers::DynProvider;
use async_trait::async_trait;
use log::debug;

use super::{ChainReader, PoolSnapshot};
use crate::contracts::{PoolDistributor, SuperfluidPool, IERC20};
use crate::errors::{FundingError, Result};
use crate::models::Token;

/// [`ChainReader`] backed by an alloy provider.
#[derive(Debug, Clone)]
pub struct AlloyChainReader {
    provider: DynProvider,
    distributor: Address,
}

impl AlloyChainReader {
    pub fn new(provider: DynProvider, distributor: Address) -> Self {
        Self {
            provider,
            distributor,
        }
    }
}

#[async_trait]
impl ChainReader for AlloyChainReader {
    async fn pool_count(&self) -> Result<U256> {
        let distributor = PoolDistributor::new(self.distributor, self.provider.clone());
        distributor
            .poolCount()
            .call()
            .await
            .map_err(FundingError::rpc)
    }

    async fn pool_address(&self, pool_id: U256) -> Result<Address> {
        let distributor = PoolDistributor::new(self.distributor, self.provider.clone());
        distributor
            .pools(pool_id)
            .call()
            .await
            .map_err(FundingError::rpc)
    }

    async fn pool_snapshot(&self, pool: Address, member: Option<Address>) -> Result<PoolSnapshot> {
        debug!("Fetching pool state for {:?}", pool);
        let instance = SuperfluidPool::new(pool, self.provider.clone());

        let name_call = instance.name();
        let symbol_call = instance.symbol();
        let admin_call = instance.admin();
        let token_call = instance.superToken();
        let units_call = instance.getTotalUnits();
        let flow_rate_call = instance.getTotalFlowRate();

        let (name, symbol, admin, super_token, total_units, total_flow_rate) = futures::try_join!(
            name_call.call().into_future(),
            symbol_call.call().into_future(),
            admin_call.call().into_future(),
            token_call.call().into_future(),
            units_call.call().into_future(),
            flow_rate_call.call().into_future(),
        )
        .map_err(FundingError::rpc)?;

        let member_units = match member {
            Some(member) => instance
                .getUnits(member)
                .call()
                .await
                .map_err(FundingError::rpc)?,
            None => 0,
        };

        let total_flow_rate =
            I256::from_dec_str(&total_flow_rate.to_string()).map_err(FundingError::rpc)?;

        Ok(PoolSnapshot {
            address: pool,
            name,
            symbol,
            admin,
            super_token,
            total_units,
            member_units,
            total_flow_rate,
        })
    }

    async fn super_token(&self) -> Result<Address> {
        let distributor = PoolDistributor::new(self.distributor, self.provider.clone());
        distributor
            .superToken()
            .call()
            .await
            .map_err(FundingError::rpc)
    }

    async fn token(&self, token: Address) -> Result<Token> {
        let instance = IERC20::new(token, self.provider.clone());
        let name_call = instance.name();
        let symbol_call = instance.symbol();
        let decimals_call = instance.decimals();

        let (name, symbol, decimals) =
            futures::try_join!(name_call.call().into_future(), symbol_call.call().into_future(), decimals_call.call().into_future())
                .map_err(FundingError::rpc)?;

        Ok(Token::new(token, name, symbol, decimals))
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        IERC20::new(token, self.provider.clone())
            .allowance(owner, spender)
            .call()
            .await
            .map_err(FundingError::rpc)
    }

    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256> {
        IERC20::new(token, self.provider.clone())
            .balanceOf(owner)
            .call()
            .await
            .map_err(FundingError::rpc)
    }
}
