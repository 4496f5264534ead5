//! Approval-then-fund sequencing.

use alloy::primitives::{Address, U256};
use log::{info, warn};
use std::sync::Arc;

use super::allowance::AllowanceTracker;
use super::approval::ApprovalStep;
use super::funding::{prepare_funding, FundingRequest, FundingStep};
use super::lifecycle::TxLifecycle;
use super::notification_handler::Notification;
use super::pools::PoolService;
use crate::errors::{FundingError, Result};
use crate::models::token::to_human_amount;
use crate::models::Distribution;

/// Adds `percent` on top of `raw`, rounding up.
pub fn apply_buffer(raw: U256, percent: u32) -> U256 {
    if percent == 0 {
        return raw;
    }
    let extra = raw
        .saturating_mul(U256::from(percent))
        .saturating_add(U256::from(99u64))
        / U256::from(100u64);
    raw.saturating_add(extra)
}

#[derive(Debug, Clone, Default)]
pub struct WorkflowOutcome {
    /// Set when an approval had to be submitted first
    pub approval: Option<TxLifecycle>,
    /// Unset when the approval did not confirm
    pub funding: Option<TxLifecycle>,
    pub distribution: Option<Distribution>,
}

impl WorkflowOutcome {
    pub fn is_funded(&self) -> bool {
        self.funding.as_ref().is_some_and(TxLifecycle::is_confirmed)
    }
}

/// Funds a pool, approving the distributor first when the allowance is short.
pub struct FundingWorkflow {
    tracker: AllowanceTracker,
    approval: ApprovalStep,
    funding: FundingStep,
    spender: Address,
    approval_buffer_percent: u32,
    pools: Option<Arc<PoolService>>,
}

impl FundingWorkflow {
    pub fn new(
        tracker: AllowanceTracker,
        approval: ApprovalStep,
        funding: FundingStep,
        approval_buffer_percent: u32,
    ) -> Self {
        let spender = tracker.spender();
        Self {
            tracker,
            approval,
            funding,
            spender,
            approval_buffer_percent,
            pools: None,
        }
    }

    /// Pool cache to invalidate after a confirmed funding transaction.
    pub fn with_pools(mut self, pools: Arc<PoolService>) -> Self {
        self.pools = Some(pools);
        self
    }

    pub fn tracker(&self) -> &AllowanceTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut AllowanceTracker {
        &mut self.tracker
    }

    pub async fn fund(
        &mut self,
        pool_id: U256,
        request: &FundingRequest,
    ) -> Result<WorkflowOutcome> {
        if self.approval.is_pending() || self.funding.is_pending() {
            return Err(FundingError::AlreadyPending);
        }
        if self.tracker.state().is_none() {
            self.tracker.refetch().await?;
        }
        let decimals = self
            .tracker
            .decimals()
            .ok_or(FundingError::AllowanceNotLoaded)?;
        let prepared = prepare_funding(pool_id, request, decimals)?;
        self.warn_on_short_balance(pool_id, prepared.amount).await;

        let mut outcome = WorkflowOutcome::default();
        if !self.tracker.covers(prepared.amount) {
            let target = apply_buffer(prepared.amount, self.approval_buffer_percent);
            info!(
                "Allowance below {} for pool {}, approving {}",
                prepared.amount, pool_id, target
            );
            let approval = self
                .approval
                .approve_raw(self.spender, target, &mut self.tracker)
                .await?;
            let confirmed = approval.is_confirmed();
            outcome.approval = Some(approval);
            if !confirmed {
                warn!("Approval did not confirm, pool {} not funded", pool_id);
                return Ok(outcome);
            }
        }

        let funded = match self.funding.submit(prepared, &self.tracker).await {
            Ok(funded) => funded,
            // The approval is on chain; report it even though funding never started.
            Err(e @ (FundingError::AllowanceNotLoaded | FundingError::ApprovalRequired { .. }))
                if outcome.approval.is_some() =>
            {
                warn!("Approval confirmed but pool {} not funded: {}", pool_id, e);
                return Ok(outcome);
            }
            Err(e) => return Err(e),
        };
        if funded.lifecycle.is_confirmed() {
            if let Err(e) = self.tracker.refetch().await {
                warn!("Failed to refresh allowance after funding: {}", e);
                self.tracker.invalidate();
            }
            if let Some(pools) = &self.pools {
                pools.invalidate().await;
            }
        }
        outcome.funding = Some(funded.lifecycle);
        outcome.distribution = funded.distribution;
        Ok(outcome)
    }

    /// The contract rejects the pull on a short balance; submission still goes ahead.
    async fn warn_on_short_balance(&self, pool_id: U256, required: U256) {
        if self.tracker.balance_covers(required) {
            return;
        }
        let (Some(state), Some(balance)) = (self.tracker.state(), self.tracker.formatted_balance())
        else {
            return;
        };
        let required = format!("{} {}", to_human_amount(required, state.decimals), state.symbol);
        warn!(
            "Balance {} does not cover {} for pool {}",
            balance, required, pool_id
        );
        self.funding
            .notifier()
            .notify(Notification::warning(
                "Insufficient balance",
                format!("Funding pool {} needs {}, balance is {}", pool_id, required, balance),
            ))
            .await;
    }
}
