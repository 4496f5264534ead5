use alloy::primitives::U256;
use log::info;

use super::allowance::AllowanceTracker;
use super::lifecycle::{InFlight, TxLifecycle, TxObserver};
use super::notification_handler::Notifier;
use super::stream_form::StreamForm;
use crate::errors::{FundingError, InputField, Result};
use crate::models::token::to_raw_amount;
use crate::models::Distribution;
use crate::providers::WriteCall;

/// What the user asked to send to a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FundingRequest {
    /// One-off transfer of `amount` whole tokens.
    Airdrop { amount: String },
    Stream(StreamForm),
}

impl FundingRequest {
    pub fn airdrop(amount: impl Into<String>) -> Self {
        FundingRequest::Airdrop {
            amount: amount.into(),
        }
    }
}

/// A validated funding call with the amount the distributor will pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedFunding {
    pub pool_id: U256,
    pub call: WriteCall,
    pub amount: U256,
    /// Stream length in seconds; `None` for airdrops
    pub duration: Option<u64>,
}

/// Converts the request into contract arguments using the token's decimals.
pub fn prepare_funding(
    pool_id: U256,
    request: &FundingRequest,
    decimals: u8,
) -> Result<PreparedFunding> {
    match request {
        FundingRequest::Airdrop { amount } => {
            let amount = to_raw_amount(InputField::Amount, amount, decimals)?;
            Ok(PreparedFunding {
                pool_id,
                call: WriteCall::AirdropDistribution { pool_id, amount },
                amount,
                duration: None,
            })
        }
        FundingRequest::Stream(form) => {
            let mut form = form.clone();
            if form.decimals() != decimals {
                form = StreamForm::from_inputs(
                    decimals,
                    None,
                    Some(form.duration()),
                    Some(form.total_amount()),
                )?;
            }
            let resolved = form.resolve()?;
            Ok(PreparedFunding {
                pool_id,
                call: WriteCall::StreamDistribution {
                    pool_id,
                    amount: resolved.total_raw,
                    duration: U256::from(resolved.duration),
                },
                amount: resolved.total_raw,
                duration: Some(resolved.duration),
            })
        }
    }
}

/// Result of a funding submission.
#[derive(Debug, Clone)]
pub struct FundingOutcome {
    pub lifecycle: TxLifecycle,
    /// Present only when the transaction confirmed
    pub distribution: Option<Distribution>,
}

/// Sends airdrop and stream transactions to the distributor.
pub struct FundingStep {
    observer: TxObserver,
    in_flight: InFlight,
}

impl FundingStep {
    pub fn new(observer: TxObserver) -> Self {
        Self {
            observer,
            in_flight: InFlight::new(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.in_flight.is_active()
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.observer.notifier().as_ref()
    }

    /// Submits `prepared` if the tracked allowance covers it.
    ///
    /// Fails with `ApprovalRequired` (or `AllowanceNotLoaded`) without
    /// contacting the wallet otherwise.
    pub async fn submit(
        &self,
        prepared: PreparedFunding,
        tracker: &AllowanceTracker,
    ) -> Result<FundingOutcome> {
        tracker.check(prepared.amount)?;
        let _guard = self.in_flight.acquire()?;

        let lifecycle = self.observer.execute(prepared.call.clone()).await?;
        let distribution = match (lifecycle.is_confirmed(), lifecycle.hash()) {
            (true, Some(hash)) => {
                let record = match prepared.duration {
                    Some(duration) => {
                        Distribution::stream(hash, prepared.pool_id, prepared.amount, duration)
                    }
                    None => Distribution::airdrop(hash, prepared.pool_id, prepared.amount),
                };
                info!(
                    "Pool {} funded with {} (streaming: {})",
                    prepared.pool_id, prepared.amount, record.is_streaming
                );
                Some(record)
            }
            _ => None,
        };

        Ok(FundingOutcome {
            lifecycle,
            distribution,
        })
    }

    pub async fn airdrop(
        &self,
        pool_id: U256,
        amount: &str,
        tracker: &AllowanceTracker,
    ) -> Result<FundingOutcome> {
        let decimals = tracker
            .decimals()
            .ok_or(FundingError::AllowanceNotLoaded)?;
        let prepared = prepare_funding(pool_id, &FundingRequest::airdrop(amount), decimals)?;
        self.submit(prepared, tracker).await
    }

    pub async fn stream(
        &self,
        pool_id: U256,
        form: &StreamForm,
        tracker: &AllowanceTracker,
    ) -> Result<FundingOutcome> {
        let decimals = tracker
            .decimals()
            .ok_or(FundingError::AllowanceNotLoaded)?;
        let prepared =
            prepare_funding(pool_id, &FundingRequest::Stream(form.clone()), decimals)?;
        self.submit(prepared, tracker).await
    }
}
