use alloy::network::ReceiptResponse;
use alloy::primitives::{Address, TxHash};
use alloy::providers::{DynProvider, Provider};
use alloy::rpc::types::TransactionRequest;
use alloy::sol_types::{decode_revert_reason, SolError};
use alloy::transports::TransportError;
use async_trait::async_trait;
use log::{debug, info};
use std::time::Duration;

use super::{TxReceiptInfo, Wallet, WriteCall};
use crate::contracts::{PoolDistributor, IERC20};
use crate::errors::TxFailure;

/// EIP-1193 code returned when the user declines a request.
const USER_REJECTED_CODE: i64 = 4001;

/// [`Wallet`] that signs locally and broadcasts through an alloy provider.
#[derive(Debug, Clone)]
pub struct AlloyWallet {
    provider: DynProvider,
    account: Option<Address>,
    distributor: Address,
    poll_interval: Duration,
}

impl AlloyWallet {
    /// `provider` must carry the signer for `account` when `account` is set.
    pub fn new(
        provider: DynProvider,
        account: Option<Address>,
        distributor: Address,
        poll_interval: Duration,
    ) -> Self {
        Self {
            provider,
            account,
            distributor,
            poll_interval,
        }
    }

    fn build_request(&self, call: &WriteCall) -> TransactionRequest {
        let distributor = PoolDistributor::new(self.distributor, self.provider.clone());
        let mut request = match call {
            WriteCall::Approve {
                token,
                spender,
                amount,
            } => IERC20::new(*token, self.provider.clone())
                .approve(*spender, *amount)
                .into_transaction_request(),
            WriteCall::CreatePool {
                super_token,
                name,
                symbol,
            } => distributor
                .createPool(*super_token, name.clone(), symbol.clone())
                .into_transaction_request(),
            WriteCall::AirdropDistribution { pool_id, amount } => distributor
                .airdropDistribution(*pool_id, *amount)
                .into_transaction_request(),
            WriteCall::StreamDistribution {
                pool_id,
                amount,
                duration,
            } => distributor
                .streamDistribution(*pool_id, *amount, *duration)
                .into_transaction_request(),
            WriteCall::IncreasePoolUnits { pool_id } => distributor
                .increasePoolUnits(*pool_id)
                .into_transaction_request(),
            WriteCall::DecreasePoolUnits { pool_id } => distributor
                .decreasePoolUnits(*pool_id)
                .into_transaction_request(),
        };
        request.from = self.account;
        request
    }
}

#[async_trait]
impl Wallet for AlloyWallet {
    fn account(&self) -> Option<Address> {
        self.account
    }

    async fn sign_and_send(&self, call: WriteCall) -> Result<TxHash, TxFailure> {
        let request = self.build_request(&call);
        debug!("Sending {} from {:?}", call.function_name(), self.account);

        let pending = self
            .provider
            .send_transaction(request)
            .await
            .map_err(classify_send_error)?;
        let hash = *pending.tx_hash();
        info!("{} submitted: {:?}", call.summary(), hash);
        Ok(hash)
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> Result<TxReceiptInfo, TxFailure> {
        loop {
            match self.provider.get_transaction_receipt(hash).await {
                Ok(Some(receipt)) => {
                    return Ok(TxReceiptInfo {
                        hash,
                        success: receipt.status(),
                        block_number: receipt.block_number(),
                        gas_used: receipt.gas_used(),
                    });
                }
                Ok(None) => {
                    debug!("Transaction {:?} not mined yet", hash);
                    tokio::time::sleep(self.poll_interval).await;
                }
                Err(e) => return Err(TxFailure::Receipt(e.to_string())),
            }
        }
    }
}

/// Maps a send error onto the failure taxonomy.
///
/// Gas estimation surfaces contract reverts here, before anything is broadcast.
fn classify_send_error(error: TransportError) -> TxFailure {
    if let Some(payload) = error.as_error_resp() {
        if let Some(data) = payload.as_revert_data() {
            return TxFailure::Reverted {
                hash: None,
                reason: decode_revert(&data),
            };
        }

        let message = payload.message.to_string();
        let lowered = message.to_lowercase();
        if payload.code == USER_REJECTED_CODE
            || lowered.contains("user denied")
            || lowered.contains("user rejected")
        {
            return TxFailure::Rejected(message);
        }
        if lowered.contains("execution reverted") {
            return TxFailure::Reverted {
                hash: None,
                reason: Some(message),
            };
        }
        return TxFailure::Submission(message);
    }
    TxFailure::Submission(error.to_string())
}

/// Decodes `Error(string)`, panics and the distributor's custom errors.
pub fn decode_revert(data: &[u8]) -> Option<String> {
    if PoolDistributor::PoolDoesNotExist::abi_decode(data).is_ok() {
        return Some("PoolDoesNotExist".to_string());
    }
    if let Ok(err) = PoolDistributor::SafeCastOverflowedIntDowncast::abi_decode(data) {
        return Some(format!(
            "SafeCastOverflowedIntDowncast(bits={}, value={})",
            err.bits, err.value
        ));
    }
    decode_revert_reason(data)
}
